//! Coercion policies: which value kinds convert to numbers, and in which context.
//!
//! A policy is a fixed set of switches, one per (source kind × context) pair.
//! Policies are `const` data; every function category binds exactly one of
//! them at construction time and shares it by `'static` reference.

use cellcalc_primitives::{ErrorCode, Value};
use serde::{Deserialize, Serialize};

/// How a value was reached by the function that is coercing it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Origin {
    /// Typed directly as an operand.
    Direct,
    /// Read through a cell or area reference.
    Reference,
    /// Read through a reference to a cell whose value came from its own formula.
    EvaluatedReference,
}

/// Outcome of pushing one value through a policy.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Coercion {
    Number(f64),
    /// A blank the policy leaves unresolved; the caller decides what it means.
    Blank,
    /// A kind the policy does not convert in this context.
    Excluded,
}

/// Immutable per-category coercion rules.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct CoercionPolicy {
    bool_direct: bool,
    bool_ref: bool,
    bool_evaluated_ref: bool,
    text_direct: bool,
    text_ref: bool,
    text_evaluated_ref: bool,
    text_failure_direct: bool,
    text_failure_ref: bool,
    blank_direct: bool,
    blank_ref: bool,
}

impl CoercionPolicy {
    /// Simple numeric functions: booleans and text convert everywhere, blanks
    /// stay unresolved, unparsable text is `#VALUE!`.
    pub const PERMISSIVE: Self = Self::new()
        .booleans(true, true, true)
        .text(true, true, true)
        .text_failure_is_error(true, true);

    /// Spread and aggregate functions: only directly typed booleans and text
    /// convert; anything read through a reference is skipped.
    pub const SPREAD: Self = Self::new()
        .booleans(true, false, false)
        .text(true, false, false)
        .text_failure_is_error(true, true);

    /// Count-everything functions: every switch on. Directly typed text that
    /// does not parse is `#VALUE!`; the same text read from a cell counts as
    /// zero.
    pub const MAXIMAL: Self = Self::new()
        .booleans(true, true, true)
        .text(true, true, true)
        .text_failure_is_error(true, false)
        .blanks_as_zero(true, true);

    /// A policy that converts nothing but numbers.
    pub const fn new() -> Self {
        Self {
            bool_direct: false,
            bool_ref: false,
            bool_evaluated_ref: false,
            text_direct: false,
            text_ref: false,
            text_evaluated_ref: false,
            text_failure_direct: false,
            text_failure_ref: false,
            blank_direct: false,
            blank_ref: false,
        }
    }

    pub const fn booleans(mut self, direct: bool, reference: bool, evaluated: bool) -> Self {
        self.bool_direct = direct;
        self.bool_ref = reference;
        self.bool_evaluated_ref = evaluated;
        self
    }

    pub const fn text(mut self, direct: bool, reference: bool, evaluated: bool) -> Self {
        self.text_direct = direct;
        self.text_ref = reference;
        self.text_evaluated_ref = evaluated;
        self
    }

    /// Per origin: when set, text that fails to parse is `#VALUE!`;
    /// otherwise it is 0. Evaluated references follow `reference`.
    pub const fn text_failure_is_error(mut self, direct: bool, reference: bool) -> Self {
        self.text_failure_direct = direct;
        self.text_failure_ref = reference;
        self
    }

    pub const fn blanks_as_zero(mut self, direct: bool, reference: bool) -> Self {
        self.blank_direct = direct;
        self.blank_ref = reference;
        self
    }

    pub fn converts_boolean(&self, origin: Origin) -> bool {
        match origin {
            Origin::Direct => self.bool_direct,
            Origin::Reference => self.bool_ref,
            Origin::EvaluatedReference => self.bool_evaluated_ref,
        }
    }

    pub fn converts_text(&self, origin: Origin) -> bool {
        match origin {
            Origin::Direct => self.text_direct,
            Origin::Reference => self.text_ref,
            Origin::EvaluatedReference => self.text_evaluated_ref,
        }
    }

    pub fn text_failure_is_error_for(&self, origin: Origin) -> bool {
        match origin {
            Origin::Direct => self.text_failure_direct,
            Origin::Reference | Origin::EvaluatedReference => self.text_failure_ref,
        }
    }

    pub fn blank_is_zero(&self, origin: Origin) -> bool {
        match origin {
            Origin::Direct => self.blank_direct,
            Origin::Reference | Origin::EvaluatedReference => self.blank_ref,
        }
    }

    /// Classify `value` under this policy.
    ///
    /// A `CellRef` supplies its own origin and is looked through one level.
    /// Error values come back as `Err` unchanged, as does text that fails to
    /// parse when the policy treats that as an error. Areas are never
    /// numbers; they must be reduced before coercion.
    pub fn classify(&self, value: &Value, origin: Origin) -> Result<Coercion, ErrorCode> {
        match value {
            Value::Number(n) => Ok(Coercion::Number(*n)),
            Value::Boolean(b) => Ok(if self.converts_boolean(origin) {
                Coercion::Number(if *b { 1.0 } else { 0.0 })
            } else {
                Coercion::Excluded
            }),
            Value::Text(text) => {
                if !self.converts_text(origin) {
                    return Ok(Coercion::Excluded);
                }
                match parse_number(text) {
                    Some(n) => Ok(Coercion::Number(n)),
                    None if self.text_failure_is_error_for(origin) => {
                        Err(ErrorCode::ValueInvalid)
                    }
                    None => Ok(Coercion::Number(0.0)),
                }
            }
            Value::Blank => Ok(if self.blank_is_zero(origin) {
                Coercion::Number(0.0)
            } else {
                Coercion::Blank
            }),
            Value::Error(code) => Err(*code),
            Value::CellRef(cell) => self.classify(cell.inner(), reference_origin(cell.is_evaluated())),
            Value::AreaRef(_) => Ok(Coercion::Excluded),
        }
    }

    /// Convert `value` to a number.
    ///
    /// `Ok(None)` is an unresolved blank. A kind the policy rejects is
    /// `#VALUE!`; error values propagate unchanged.
    pub fn coerce_to_number(&self, value: &Value, origin: Origin) -> Result<Option<f64>, ErrorCode> {
        match self.classify(value, origin)? {
            Coercion::Number(n) => Ok(Some(n)),
            Coercion::Blank => Ok(None),
            Coercion::Excluded => Err(ErrorCode::ValueInvalid),
        }
    }
}

impl Default for CoercionPolicy {
    fn default() -> Self {
        Self::PERMISSIVE
    }
}

pub(crate) fn reference_origin(evaluated: bool) -> Origin {
    if evaluated {
        Origin::EvaluatedReference
    } else {
        Origin::Reference
    }
}

/// Locale-invariant numeric parse: surrounding whitespace is ignored and
/// only finite results are accepted.
pub fn parse_number(text: &str) -> Option<f64> {
    let trimmed = text.trim();
    if trimmed.is_empty() {
        return None;
    }
    trimmed.parse::<f64>().ok().filter(|n| n.is_finite())
}
