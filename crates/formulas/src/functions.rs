//! Built-in function bodies and the tables the registry is assembled from.

use crate::function::{Args, Arity, TextBody};
use crate::math;
use crate::policy::CoercionPolicy;
use crate::{ParamType, ReturnType};
use cellcalc_primitives::{ErrorCode, Value};

/// Longest string a text function may produce.
pub const MAX_TEXT_LENGTH: usize = 32_767;

pub type UnaryOp = fn(f64) -> f64;
pub type BinaryOp = fn(f64, f64) -> f64;
pub type Reducer = fn(&[f64]) -> f64;
pub type Predicate = fn(&Value) -> bool;

pub const UNARY: &[(&str, UnaryOp)] = &[
    ("ABS", f64::abs),
    ("ACOS", f64::acos),
    ("ACOSH", f64::acosh),
    ("ASIN", f64::asin),
    ("ASINH", f64::asinh),
    ("ATAN", f64::atan),
    ("ATANH", f64::atanh),
    ("COS", f64::cos),
    ("COSH", f64::cosh),
    ("DEGREES", f64::to_degrees),
    ("EVEN", math::even),
    ("EXP", f64::exp),
    ("FACT", math::factorial),
    ("INT", f64::floor),
    ("LN", f64::ln),
    ("LOG10", f64::log10),
    ("ODD", math::odd),
    ("RADIANS", f64::to_radians),
    ("SIGN", math::sign),
    ("SIN", f64::sin),
    ("SINH", f64::sinh),
    ("SQRT", f64::sqrt),
    ("TAN", f64::tan),
    ("TANH", f64::tanh),
];

/// Name, routine, and the default for an omitted second operand.
pub const BINARY: &[(&str, BinaryOp, Option<f64>)] = &[
    ("ATAN2", atan2, None),
    ("POWER", power, None),
    ("ROUND", math::round, None),
    ("ROUNDUP", math::round_up, None),
    ("ROUNDDOWN", math::round_down, None),
    ("TRUNC", math::round_down, Some(0.0)),
    ("LOG", log, Some(10.0)),
    ("CEILING", math::ceiling, None),
    ("FLOOR", math::floor, None),
];

pub const AGGREGATES: &[(&str, &CoercionPolicy, Reducer)] = &[
    ("SUM", &CoercionPolicy::SPREAD, math::sum),
    ("PRODUCT", &CoercionPolicy::SPREAD, math::product),
    ("SUMSQ", &CoercionPolicy::SPREAD, math::sum_sq),
    ("AVERAGE", &CoercionPolicy::SPREAD, math::average),
    ("MAX", &CoercionPolicy::SPREAD, math::max),
    ("MIN", &CoercionPolicy::SPREAD, math::min),
    ("MEDIAN", &CoercionPolicy::SPREAD, math::median),
    ("STDEV", &CoercionPolicy::SPREAD, math::stdev),
    ("STDEVP", &CoercionPolicy::SPREAD, math::stdevp),
    ("VAR", &CoercionPolicy::SPREAD, math::var),
    ("VARP", &CoercionPolicy::SPREAD, math::varp),
    ("DEVSQ", &CoercionPolicy::SPREAD, math::devsq),
    ("AVEDEV", &CoercionPolicy::SPREAD, math::avedev),
    ("AVERAGEA", &CoercionPolicy::MAXIMAL, math::average),
    ("MAXA", &CoercionPolicy::MAXIMAL, math::max),
    ("MINA", &CoercionPolicy::MAXIMAL, math::min),
    ("STDEVA", &CoercionPolicy::MAXIMAL, math::stdev),
    ("VARA", &CoercionPolicy::MAXIMAL, math::var),
];

pub struct TextEntry {
    pub name: &'static str,
    pub arity: Arity,
    pub params: &'static [ParamType],
    pub return_type: ReturnType,
    pub body: TextBody,
}

const fn text_entry(
    name: &'static str,
    arity: Arity,
    params: &'static [ParamType],
    return_type: ReturnType,
    body: TextBody,
) -> TextEntry {
    TextEntry {
        name,
        arity,
        params,
        return_type,
        body,
    }
}

pub const TEXT: &[TextEntry] = &[
    text_entry("LEN", Arity::exactly(1), &[ParamType::Text], ReturnType::Number, len),
    text_entry("UPPER", Arity::exactly(1), &[ParamType::Text], ReturnType::Text, upper),
    text_entry("LOWER", Arity::exactly(1), &[ParamType::Text], ReturnType::Text, lower),
    text_entry("TRIM", Arity::exactly(1), &[ParamType::Text], ReturnType::Text, trim),
    text_entry("PROPER", Arity::exactly(1), &[ParamType::Text], ReturnType::Text, proper),
    text_entry(
        "EXACT",
        Arity::exactly(2),
        &[ParamType::Text, ParamType::Text],
        ReturnType::Logical,
        exact,
    ),
    text_entry(
        "LEFT",
        Arity::range(1, 2),
        &[ParamType::Text, ParamType::Number],
        ReturnType::Text,
        left,
    ),
    text_entry(
        "RIGHT",
        Arity::range(1, 2),
        &[ParamType::Text, ParamType::Number],
        ReturnType::Text,
        right,
    ),
    text_entry(
        "MID",
        Arity::exactly(3),
        &[ParamType::Text, ParamType::Number, ParamType::Number],
        ReturnType::Text,
        mid,
    ),
    text_entry(
        "REPT",
        Arity::exactly(2),
        &[ParamType::Text, ParamType::Number],
        ReturnType::Text,
        rept,
    ),
    text_entry(
        "CONCATENATE",
        Arity::at_least(1),
        &[],
        ReturnType::Text,
        concatenate,
    ),
];

pub const INFO: &[(&str, Predicate)] = &[
    ("ISBLANK", is_blank),
    ("ISERROR", is_error),
    ("ISERR", is_err),
    ("ISNA", is_na),
    ("ISNUMBER", is_number),
    ("ISTEXT", is_text),
    ("ISLOGICAL", is_logical),
    ("ISNONTEXT", is_non_text),
];

/// ATAN2 function - angle of the point (x, y); undefined at the origin
fn atan2(x: f64, y: f64) -> f64 {
    if x == 0.0 && y == 0.0 {
        return f64::NAN;
    }
    y.atan2(x)
}

/// POWER function - 0^0 is undefined
fn power(base: f64, exponent: f64) -> f64 {
    if base == 0.0 && exponent == 0.0 {
        return f64::NAN;
    }
    base.powf(exponent)
}

/// LOG function - logarithm in an arbitrary base
fn log(n: f64, base: f64) -> f64 {
    n.ln() / base.ln()
}

fn char_count(n: f64) -> Result<usize, ErrorCode> {
    if n < 0.0 {
        return Err(ErrorCode::ValueInvalid);
    }
    Ok(n.floor() as usize)
}

/// LEN function - number of characters
fn len(args: &mut Args<'_>) -> Result<Value, ErrorCode> {
    let text = args.text()?;
    Ok(Value::Number(text.chars().count() as f64))
}

/// UPPER function - converts text to uppercase
fn upper(args: &mut Args<'_>) -> Result<Value, ErrorCode> {
    Ok(Value::Text(args.text()?.to_uppercase()))
}

/// LOWER function - converts text to lowercase
fn lower(args: &mut Args<'_>) -> Result<Value, ErrorCode> {
    Ok(Value::Text(args.text()?.to_lowercase()))
}

/// TRIM function - strips outer spaces and collapses inner runs to one
fn trim(args: &mut Args<'_>) -> Result<Value, ErrorCode> {
    let text = args.text()?;
    let words: Vec<&str> = text.split(' ').filter(|word| !word.is_empty()).collect();
    Ok(Value::Text(words.join(" ")))
}

/// PROPER function - capitalizes first letter of each word
fn proper(args: &mut Args<'_>) -> Result<Value, ErrorCode> {
    let text = args.text()?;
    let mut result = String::with_capacity(text.len());
    let mut prev_is_letter = false;
    for c in text.chars() {
        if !prev_is_letter && c.is_alphabetic() {
            result.extend(c.to_uppercase());
        } else {
            result.extend(c.to_lowercase());
        }
        prev_is_letter = c.is_alphabetic();
    }
    Ok(Value::Text(result))
}

/// EXACT function - case-sensitive comparison
fn exact(args: &mut Args<'_>) -> Result<Value, ErrorCode> {
    let left = args.text()?;
    let right = args.text()?;
    Ok(Value::Boolean(left == right))
}

/// LEFT function - leading characters, one by default
fn left(args: &mut Args<'_>) -> Result<Value, ErrorCode> {
    let text = args.text()?;
    let count = char_count(args.optional_number(1.0)?)?;
    Ok(Value::Text(text.chars().take(count).collect()))
}

/// RIGHT function - trailing characters, one by default
fn right(args: &mut Args<'_>) -> Result<Value, ErrorCode> {
    let text = args.text()?;
    let count = char_count(args.optional_number(1.0)?)?;
    let skip = text.chars().count().saturating_sub(count);
    Ok(Value::Text(text.chars().skip(skip).collect()))
}

/// MID function - substring from a one-based start
fn mid(args: &mut Args<'_>) -> Result<Value, ErrorCode> {
    let text = args.text()?;
    let start = args.number()?;
    let count = char_count(args.number()?)?;
    if start < 1.0 {
        return Err(ErrorCode::ValueInvalid);
    }
    let skip = start.floor() as usize - 1;
    Ok(Value::Text(text.chars().skip(skip).take(count).collect()))
}

/// REPT function - repeats text a whole number of times
fn rept(args: &mut Args<'_>) -> Result<Value, ErrorCode> {
    let text = args.text()?;
    let times = char_count(args.number()?)?;
    if text.chars().count().saturating_mul(times) > MAX_TEXT_LENGTH {
        return Err(ErrorCode::ValueInvalid);
    }
    Ok(Value::Text(text.repeat(times)))
}

/// CONCATENATE function - joins every operand's text
fn concatenate(args: &mut Args<'_>) -> Result<Value, ErrorCode> {
    let mut result = String::new();
    while args.remaining() > 0 {
        result.push_str(&args.text()?);
    }
    if result.chars().count() > MAX_TEXT_LENGTH {
        return Err(ErrorCode::ValueInvalid);
    }
    Ok(Value::Text(result))
}

fn is_blank(value: &Value) -> bool {
    value.is_blank()
}

fn is_error(value: &Value) -> bool {
    matches!(value, Value::Error(_))
}

/// Any error except `#N/A`.
fn is_err(value: &Value) -> bool {
    matches!(value, Value::Error(code) if *code != ErrorCode::NA)
}

fn is_na(value: &Value) -> bool {
    matches!(value, Value::Error(ErrorCode::NA))
}

fn is_number(value: &Value) -> bool {
    matches!(value, Value::Number(_))
}

fn is_text(value: &Value) -> bool {
    matches!(value, Value::Text(_))
}

fn is_logical(value: &Value) -> bool {
    matches!(value, Value::Boolean(_))
}

fn is_non_text(value: &Value) -> bool {
    !is_text(value)
}
