//! Numeric routines behind the built-in function bodies.
//!
//! Every routine is total over `f64`: a domain failure yields `NaN` (or an
//! infinity) and the calling function category turns that into `#NUM!`.

/// Round half away from zero to `places` decimal places (negative places
/// round to the left of the decimal point).
pub fn round(n: f64, places: f64) -> f64 {
    scaled(n, places, f64::round)
}

/// Round away from zero.
pub fn round_up(n: f64, places: f64) -> f64 {
    scaled(n, places, |v| v.abs().ceil().copysign(v))
}

/// Round toward zero.
pub fn round_down(n: f64, places: f64) -> f64 {
    scaled(n, places, f64::trunc)
}

fn scaled(n: f64, places: f64, op: fn(f64) -> f64) -> f64 {
    if !n.is_finite() || !places.is_finite() {
        return f64::NAN;
    }
    let places = places.trunc() as i32;
    let factor = 10f64.powi(places);
    if !factor.is_finite() || factor == 0.0 {
        return if places > 0 { n } else { 0.0 };
    }
    op(n * factor) / factor
}

/// Round `n` up to the nearest multiple of `significance`.
pub fn ceiling(n: f64, significance: f64) -> f64 {
    if n > 0.0 && significance < 0.0 {
        return f64::NAN;
    }
    if significance == 0.0 {
        return 0.0;
    }
    (n / significance).ceil() * significance
}

/// Round `n` down to the nearest multiple of `significance`.
pub fn floor(n: f64, significance: f64) -> f64 {
    if significance == 0.0 {
        return if n == 0.0 { 0.0 } else { f64::NAN };
    }
    if n > 0.0 && significance < 0.0 {
        return f64::NAN;
    }
    (n / significance).floor() * significance
}

pub fn sign(n: f64) -> f64 {
    if n > 0.0 {
        1.0
    } else if n < 0.0 {
        -1.0
    } else {
        0.0
    }
}

/// Factorial of the integer part of `n`; `NaN` for negatives and above 170.
pub fn factorial(n: f64) -> f64 {
    if !(0.0..171.0).contains(&n) {
        return f64::NAN;
    }
    let n = n.floor() as u32;
    (1..=n).fold(1.0, |acc, i| acc * f64::from(i))
}

/// Number of `k`-element subsets of an `n`-element set.
///
/// Returns infinity as soon as the running product overflows.
pub fn n_choose_k(n: i32, k: i32) -> f64 {
    if n < 0 || k < 0 || n < k {
        return f64::NAN;
    }
    let k = k.min(n - k);
    let mut result = 1.0;
    for i in 1..=k {
        result = result * f64::from(n - k + i) / f64::from(i);
        if result.is_infinite() {
            return f64::INFINITY;
        }
    }
    result.round()
}

pub fn even(n: f64) -> f64 {
    let magnitude = (n.abs() / 2.0).ceil() * 2.0;
    magnitude.copysign(n)
}

pub fn odd(n: f64) -> f64 {
    let magnitude = n.abs();
    let mut rounded = magnitude.ceil();
    if rounded % 2.0 == 0.0 {
        rounded += 1.0;
    }
    rounded.copysign(n)
}

pub fn sum(values: &[f64]) -> f64 {
    values.iter().sum()
}

pub fn sum_sq(values: &[f64]) -> f64 {
    values.iter().map(|v| v * v).sum()
}

/// Product of the values; an empty input yields 0.
pub fn product(values: &[f64]) -> f64 {
    if values.is_empty() {
        return 0.0;
    }
    values.iter().product()
}

pub fn average(values: &[f64]) -> f64 {
    sum(values) / values.len() as f64
}

/// Largest value; an empty input yields 0.
pub fn max(values: &[f64]) -> f64 {
    values.iter().copied().reduce(f64::max).unwrap_or(0.0)
}

/// Smallest value; an empty input yields 0.
pub fn min(values: &[f64]) -> f64 {
    values.iter().copied().reduce(f64::min).unwrap_or(0.0)
}

pub fn median(values: &[f64]) -> f64 {
    if values.is_empty() {
        return f64::NAN;
    }
    let mut sorted = values.to_vec();
    sorted.sort_by(f64::total_cmp);
    let mid = sorted.len() / 2;
    if sorted.len() % 2 == 0 {
        (sorted[mid - 1] + sorted[mid]) / 2.0
    } else {
        sorted[mid]
    }
}

/// Sum of squared deviations from the mean.
pub fn devsq(values: &[f64]) -> f64 {
    if values.is_empty() {
        return f64::NAN;
    }
    let mean = average(values);
    values.iter().map(|v| (v - mean).powi(2)).sum()
}

/// Mean absolute deviation from the mean.
pub fn avedev(values: &[f64]) -> f64 {
    let mean = average(values);
    values.iter().map(|v| (v - mean).abs()).sum::<f64>() / values.len() as f64
}

/// Sample variance.
pub fn var(values: &[f64]) -> f64 {
    if values.len() < 2 {
        return f64::NAN;
    }
    devsq(values) / (values.len() - 1) as f64
}

/// Population variance.
pub fn varp(values: &[f64]) -> f64 {
    devsq(values) / values.len() as f64
}

/// Sample standard deviation.
pub fn stdev(values: &[f64]) -> f64 {
    var(values).sqrt()
}

/// Population standard deviation.
pub fn stdevp(values: &[f64]) -> f64 {
    varp(values).sqrt()
}
