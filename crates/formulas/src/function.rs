//! The calling convention shared by every built-in function, and the
//! categories the catalogue is assembled from.
//!
//! A function receives its operands exactly as the operand builder produced
//! them, plus the address of the cell being evaluated, and always answers
//! with a single [`Value`]. Failures are `Value::Error`, never panics.

use crate::flatten::{flatten_numbers, walk_operands, DEFAULT_MAX_OPERANDS};
use crate::policy::{Coercion, CoercionPolicy};
use crate::resolve::{resolve_scalar, resolve_text, resolve_value};
use cellcalc_primitives::{CellAddress, ErrorCode, Value};
use serde::{Deserialize, Serialize};
use std::fmt;
use tracing::debug;

/// Supported operand counts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Arity {
    pub min: usize,
    pub max: Option<usize>,
}

impl Arity {
    pub const fn exactly(count: usize) -> Self {
        Self {
            min: count,
            max: Some(count),
        }
    }

    pub const fn range(min: usize, max: usize) -> Self {
        Self {
            min,
            max: Some(max),
        }
    }

    pub const fn at_least(min: usize) -> Self {
        Self { min, max: None }
    }

    pub fn accepts(&self, count: usize) -> bool {
        count >= self.min && self.max.map_or(true, |max| count <= max)
    }

    pub fn label(&self) -> String {
        match self.max {
            Some(max) if max == self.min => format!("{}", self.min),
            Some(max) => format!("{}..{}", self.min, max),
            None => format!("{}+", self.min),
        }
    }
}

impl fmt::Display for Arity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.label())
    }
}

/// A built-in worksheet function.
pub trait Function: Send + Sync {
    fn arity(&self) -> Arity;

    /// Compute the result for an operand count already known to be supported.
    fn evaluate(&self, operands: &[Value], src: CellAddress) -> Value;

    /// Check the operand count, then evaluate.
    ///
    /// An unsupported count is `#VALUE!` and no operand is looked at, even
    /// one that is itself an error.
    fn call(&self, operands: &[Value], src: CellAddress) -> Value {
        let arity = self.arity();
        if !arity.accepts(operands.len()) {
            debug!(expected = %arity, got = operands.len(), cell = %src, "unsupported operand count");
            return Value::Error(ErrorCode::ValueInvalid);
        }
        self.evaluate(operands, src)
    }
}

/// What a numeric operand that stays blank after coercion turns into.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum BlankFallback {
    /// Treat it as 0.
    Zero,
    /// Fail with `#VALUE!`.
    Reject,
    /// Return `Blank` as the function result.
    PassThrough,
}

/// Turn a computed number into a result; non-finite values are `#NUM!`.
pub fn finish(n: f64) -> Value {
    if n.is_finite() {
        Value::Number(n)
    } else {
        Value::Error(ErrorCode::NumError)
    }
}

fn settle(result: Result<Value, ErrorCode>) -> Value {
    result.unwrap_or_else(Value::Error)
}

/// `Ok(None)` only for a blank under [`BlankFallback::PassThrough`].
fn numeric_operand(
    operand: &Value,
    src: CellAddress,
    policy: &CoercionPolicy,
    blank: BlankFallback,
) -> Result<Option<f64>, ErrorCode> {
    match resolve_scalar(operand, src, policy)? {
        Value::Number(n) => Ok(Some(n)),
        _ => match blank {
            BlankFallback::Zero => Ok(Some(0.0)),
            BlankFallback::Reject => Err(ErrorCode::ValueInvalid),
            BlankFallback::PassThrough => Ok(None),
        },
    }
}

/// One numeric operand in, one number out.
pub struct UnaryNumeric {
    policy: &'static CoercionPolicy,
    blank: BlankFallback,
    op: fn(f64) -> f64,
}

impl UnaryNumeric {
    pub const fn new(op: fn(f64) -> f64) -> Self {
        Self {
            policy: &CoercionPolicy::PERMISSIVE,
            blank: BlankFallback::Zero,
            op,
        }
    }

    pub const fn with_policy(mut self, policy: &'static CoercionPolicy) -> Self {
        self.policy = policy;
        self
    }

    pub const fn with_blank(mut self, blank: BlankFallback) -> Self {
        self.blank = blank;
        self
    }
}

impl Function for UnaryNumeric {
    fn arity(&self) -> Arity {
        Arity::exactly(1)
    }

    fn evaluate(&self, operands: &[Value], src: CellAddress) -> Value {
        let [operand] = operands else {
            return Value::Error(ErrorCode::ValueInvalid);
        };
        match numeric_operand(operand, src, self.policy, self.blank) {
            Ok(Some(n)) => finish((self.op)(n)),
            Ok(None) => Value::Blank,
            Err(code) => Value::Error(code),
        }
    }
}

/// Two numeric operands, the second optionally defaulted.
pub struct BinaryNumeric {
    policy: &'static CoercionPolicy,
    op: fn(f64, f64) -> f64,
    default_second: Option<f64>,
}

impl BinaryNumeric {
    pub const fn new(op: fn(f64, f64) -> f64) -> Self {
        Self {
            policy: &CoercionPolicy::PERMISSIVE,
            op,
            default_second: None,
        }
    }

    /// Allow the second operand to be omitted.
    pub const fn with_default(mut self, second: f64) -> Self {
        self.default_second = Some(second);
        self
    }
}

impl Function for BinaryNumeric {
    fn arity(&self) -> Arity {
        if self.default_second.is_some() {
            Arity::range(1, 2)
        } else {
            Arity::exactly(2)
        }
    }

    fn evaluate(&self, operands: &[Value], src: CellAddress) -> Value {
        let number = |operand: &Value| {
            numeric_operand(operand, src, self.policy, BlankFallback::Zero)
                .map(|n| n.unwrap_or(0.0))
        };
        let result = match (operands, self.default_second) {
            ([first, second], _) => number(first).and_then(|a| number(second).map(|b| (a, b))),
            ([first], Some(default)) => number(first).map(|a| (a, default)),
            _ => Err(ErrorCode::ValueInvalid),
        };
        match result {
            Ok((a, b)) => finish((self.op)(a, b)),
            Err(code) => Value::Error(code),
        }
    }
}

/// Two integer operands `(n, k)` fed to a counting routine.
///
/// Operands are truncated toward zero. Anything outside the 32-bit signed
/// range, negative, or with `k > n` is `#NUM!` and the routine is not run.
pub struct Combinatorial {
    policy: &'static CoercionPolicy,
    routine: fn(i32, i32) -> f64,
}

impl Combinatorial {
    pub const fn new(routine: fn(i32, i32) -> f64) -> Self {
        Self {
            policy: &CoercionPolicy::PERMISSIVE,
            routine,
        }
    }
}

fn to_i32(n: f64) -> Result<i32, ErrorCode> {
    let truncated = n.trunc();
    if (f64::from(i32::MIN)..=f64::from(i32::MAX)).contains(&truncated) {
        Ok(truncated as i32)
    } else {
        Err(ErrorCode::NumError)
    }
}

impl Function for Combinatorial {
    fn arity(&self) -> Arity {
        Arity::exactly(2)
    }

    fn evaluate(&self, operands: &[Value], src: CellAddress) -> Value {
        let [first, second] = operands else {
            return Value::Error(ErrorCode::ValueInvalid);
        };
        let pair = || -> Result<(i32, i32), ErrorCode> {
            let n = numeric_operand(first, src, self.policy, BlankFallback::Zero)?.unwrap_or(0.0);
            let k = numeric_operand(second, src, self.policy, BlankFallback::Zero)?.unwrap_or(0.0);
            Ok((to_i32(n)?, to_i32(k)?))
        };
        match pair() {
            Ok((n, k)) if n < 0 || k < 0 || k > n => Value::Error(ErrorCode::NumError),
            Ok((n, k)) => finish((self.routine)(n, k)),
            Err(code) => Value::Error(code),
        }
    }
}

/// Many operands, possibly areas, reduced to one number.
pub struct Aggregate {
    policy: &'static CoercionPolicy,
    max_operands: usize,
    reduce: fn(&[f64]) -> f64,
}

impl Aggregate {
    pub const fn new(policy: &'static CoercionPolicy, reduce: fn(&[f64]) -> f64) -> Self {
        Self {
            policy,
            max_operands: DEFAULT_MAX_OPERANDS,
            reduce,
        }
    }

    pub const fn with_max_operands(mut self, max_operands: usize) -> Self {
        self.max_operands = max_operands;
        self
    }
}

impl Function for Aggregate {
    fn arity(&self) -> Arity {
        Arity::range(1, self.max_operands)
    }

    fn evaluate(&self, operands: &[Value], src: CellAddress) -> Value {
        match flatten_numbers(operands, src, self.policy, self.max_operands) {
            Ok(numbers) => finish((self.reduce)(&numbers)),
            Err(code) => Value::Error(code),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum CountMode {
    /// Values the spread policy accepts as numbers.
    Numbers,
    /// Every value that is not blank, errors included.
    NonBlank,
}

/// Counting over operands. Error values are counted or skipped, never
/// propagated; only a self-referencing area fails the call.
pub struct Count {
    mode: CountMode,
    max_operands: usize,
}

impl Count {
    pub const fn new(mode: CountMode) -> Self {
        Self {
            mode,
            max_operands: DEFAULT_MAX_OPERANDS,
        }
    }

    pub const fn with_max_operands(mut self, max_operands: usize) -> Self {
        self.max_operands = max_operands;
        self
    }
}

impl Function for Count {
    fn arity(&self) -> Arity {
        Arity::range(1, self.max_operands)
    }

    fn evaluate(&self, operands: &[Value], src: CellAddress) -> Value {
        let mut count = 0usize;
        let walked = walk_operands(operands, src, |value, origin| {
            let counted = match self.mode {
                CountMode::Numbers => matches!(
                    CoercionPolicy::SPREAD.classify(&value, origin),
                    Ok(Coercion::Number(_))
                ),
                CountMode::NonBlank => !value.is_blank(),
            };
            if counted {
                count += 1;
            }
            Ok(())
        });
        match walked {
            Ok(()) => Value::Number(count as f64),
            Err(code) => Value::Error(code),
        }
    }
}

/// Positional access to the operands of a text function.
pub struct Args<'a> {
    operands: &'a [Value],
    src: CellAddress,
    position: usize,
}

impl<'a> Args<'a> {
    pub fn new(operands: &'a [Value], src: CellAddress) -> Self {
        Self {
            operands,
            src,
            position: 0,
        }
    }

    pub fn remaining(&self) -> usize {
        self.operands.len().saturating_sub(self.position)
    }

    fn next(&mut self) -> Result<&'a Value, ErrorCode> {
        let operand = self
            .operands
            .get(self.position)
            .ok_or(ErrorCode::ValueInvalid)?;
        self.position += 1;
        Ok(operand)
    }

    pub fn text(&mut self) -> Result<String, ErrorCode> {
        let operand = self.next()?;
        resolve_text(operand, self.src)
    }

    /// Next operand as a number; blanks count as 0.
    pub fn number(&mut self) -> Result<f64, ErrorCode> {
        let operand = self.next()?;
        Ok(numeric_operand(operand, self.src, &CoercionPolicy::PERMISSIVE, BlankFallback::Zero)?
            .unwrap_or(0.0))
    }

    pub fn optional_number(&mut self, default: f64) -> Result<f64, ErrorCode> {
        if self.remaining() == 0 {
            Ok(default)
        } else {
            self.number()
        }
    }
}

pub type TextBody = fn(&mut Args<'_>) -> Result<Value, ErrorCode>;

/// Functions over text operands.
pub struct TextFunction {
    arity: Arity,
    body: TextBody,
}

impl TextFunction {
    pub const fn new(arity: Arity, body: TextBody) -> Self {
        Self { arity, body }
    }
}

impl Function for TextFunction {
    fn arity(&self) -> Arity {
        self.arity
    }

    fn evaluate(&self, operands: &[Value], src: CellAddress) -> Value {
        settle((self.body)(&mut Args::new(operands, src)))
    }
}

/// A predicate over the uncoerced value of one operand.
///
/// Error values are observed, not propagated. A self-referencing area is
/// still `CircularRef`.
pub struct InfoFunction {
    test: fn(&Value) -> bool,
}

impl InfoFunction {
    pub const fn new(test: fn(&Value) -> bool) -> Self {
        Self { test }
    }
}

impl Function for InfoFunction {
    fn arity(&self) -> Arity {
        Arity::exactly(1)
    }

    fn evaluate(&self, operands: &[Value], src: CellAddress) -> Value {
        let [operand] = operands else {
            return Value::Error(ErrorCode::ValueInvalid);
        };
        match resolve_value(operand, src) {
            Ok(value) => Value::Boolean((self.test)(&value)),
            Err(ErrorCode::CircularRef) => Value::Error(ErrorCode::CircularRef),
            Err(code) => Value::Boolean((self.test)(&Value::Error(code))),
        }
    }
}
