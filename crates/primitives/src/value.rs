//! Runtime value model shared by every worksheet function.
//!
//! A [`Value`] is one of a closed set of kinds. Scalars (`Number`, `Text`,
//! `Boolean`, `Blank`, `Error`) are plain data; the two reference kinds keep
//! enough information for a function to decide how a range collapses onto
//! the evaluating cell. Values are created per evaluation and never mutated.

use crate::{CellAddress, CellRange};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;

/// Error codes a formula can evaluate to.
///
/// `ValueInvalid`, `NumError` and `CircularRef` are produced by the
/// evaluation core; the remaining codes belong to other subsystems and are
/// only ever propagated.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ErrorCode {
    ValueInvalid, // #VALUE!
    NumError,     // #NUM!
    CircularRef,  // ~CIRCULAR~REF~
    DivZero,      // #DIV/0!
    RefInvalid,   // #REF!
    NameInvalid,  // #NAME?
    NA,           // #N/A
    Null,         // #NULL!
}

impl ErrorCode {
    /// Host-style error label
    pub fn label(&self) -> &'static str {
        match self {
            Self::ValueInvalid => "#VALUE!",
            Self::NumError => "#NUM!",
            Self::CircularRef => "~CIRCULAR~REF~",
            Self::DivZero => "#DIV/0!",
            Self::RefInvalid => "#REF!",
            Self::NameInvalid => "#NAME?",
            Self::NA => "#N/A",
            Self::Null => "#NULL!",
        }
    }

    /// Parse a label produced by [`ErrorCode::label`] (case-insensitive).
    pub fn from_label(label: &str) -> Option<Self> {
        const ALL: [ErrorCode; 8] = [
            ErrorCode::ValueInvalid,
            ErrorCode::NumError,
            ErrorCode::CircularRef,
            ErrorCode::DivZero,
            ErrorCode::RefInvalid,
            ErrorCode::NameInvalid,
            ErrorCode::NA,
            ErrorCode::Null,
        ];
        let label = label.trim();
        ALL.into_iter()
            .find(|code| code.label().eq_ignore_ascii_case(label))
    }
}

impl fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// Read access to cell contents, implemented by the sheet store.
///
/// Coordinates are absolute and zero-based. Implementations return the
/// stored value, or `Value::Blank` for an empty cell; they may return a
/// [`CellRef`] when the cell should be seen through a reference, but never an
/// [`AreaRef`].
pub trait CellSource: Send + Sync {
    fn value_at(&self, row: u32, col: u32) -> Value;
}

/// Geometric classification of an area.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum AreaShape {
    /// Exactly one row (a single cell also lands here).
    SingleRow,
    /// Exactly one column spanning several rows.
    SingleColumn,
    /// Several rows and several columns.
    Grid,
}

/// A rectangular range operand backed by a [`CellSource`].
#[derive(Clone)]
pub struct AreaRef {
    range: CellRange,
    source: Arc<dyn CellSource>,
}

impl AreaRef {
    /// Create an area over `range`; the corners are normalized.
    pub fn new(range: CellRange, source: Arc<dyn CellSource>) -> Self {
        Self {
            range: range.normalized(),
            source,
        }
    }

    /// Create an area from explicit bounds, rejecting inverted corners.
    pub fn from_bounds(
        first_row: u32,
        last_row: u32,
        first_col: u32,
        last_col: u32,
        source: Arc<dyn CellSource>,
    ) -> Result<Self, ValueError> {
        if first_row > last_row || first_col > last_col {
            return Err(ValueError::InvertedBounds {
                first_row,
                last_row,
                first_col,
                last_col,
            });
        }
        Ok(Self {
            range: CellRange::new(
                CellAddress::new(first_row, first_col),
                CellAddress::new(last_row, last_col),
            ),
            source,
        })
    }

    pub fn range(&self) -> CellRange {
        self.range
    }

    pub fn first_row(&self) -> u32 {
        self.range.start.row
    }

    pub fn last_row(&self) -> u32 {
        self.range.end.row
    }

    pub fn first_col(&self) -> u32 {
        self.range.start.col
    }

    pub fn last_col(&self) -> u32 {
        self.range.end.col
    }

    pub fn contains(&self, addr: &CellAddress) -> bool {
        self.range.contains(addr)
    }

    pub fn contains_row(&self, row: u32) -> bool {
        self.range.contains_row(row)
    }

    pub fn contains_column(&self, col: u32) -> bool {
        self.range.contains_column(col)
    }

    pub fn shape(&self) -> AreaShape {
        if self.range.rows() == 1 {
            AreaShape::SingleRow
        } else if self.range.cols() == 1 {
            AreaShape::SingleColumn
        } else {
            AreaShape::Grid
        }
    }

    /// Value at an absolute coordinate, `None` when outside the area.
    pub fn get(&self, row: u32, col: u32) -> Option<Value> {
        if self.contains_row(row) && self.contains_column(col) {
            Some(self.source.value_at(row, col))
        } else {
            None
        }
    }

    /// All cell values in row-major order.
    pub fn values(&self) -> impl Iterator<Item = Value> + '_ {
        self.range
            .iter()
            .map(|addr| self.source.value_at(addr.row, addr.col))
    }
}

impl fmt::Debug for AreaRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AreaRef").field("range", &self.range).finish()
    }
}

impl PartialEq for AreaRef {
    fn eq(&self, other: &Self) -> bool {
        self.range == other.range && Arc::ptr_eq(&self.source, &other.source)
    }
}

/// A single-cell reference together with the value it points at.
///
/// `inner` is dereferenced exactly one level, so it is always a scalar.
/// `evaluated` marks a cell whose value came out of evaluating its own formula.
#[derive(Debug, Clone, PartialEq)]
pub struct CellRef {
    addr: CellAddress,
    inner: Box<Value>,
    evaluated: bool,
}

impl CellRef {
    pub fn new(addr: CellAddress, inner: Value, evaluated: bool) -> Result<Self, ValueError> {
        if inner.is_reference() {
            return Err(ValueError::NestedReference(addr));
        }
        Ok(Self {
            addr,
            inner: Box::new(inner),
            evaluated,
        })
    }

    pub fn addr(&self) -> CellAddress {
        self.addr
    }

    pub fn row(&self) -> u32 {
        self.addr.row
    }

    pub fn col(&self) -> u32 {
        self.addr.col
    }

    pub fn inner(&self) -> &Value {
        &self.inner
    }

    pub fn into_inner(self) -> Value {
        *self.inner
    }

    pub fn is_evaluated(&self) -> bool {
        self.evaluated
    }
}

/// Value kinds that flow into and out of worksheet functions
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    Number(f64),
    Text(String),
    Boolean(bool),
    Blank,
    Error(ErrorCode),
    CellRef(CellRef),
    AreaRef(AreaRef),
}

impl Value {
    pub fn is_reference(&self) -> bool {
        matches!(self, Value::CellRef(_) | Value::AreaRef(_))
    }

    pub fn is_blank(&self) -> bool {
        matches!(self, Value::Blank)
    }

    /// The error code carried by an `Error` value.
    pub fn error(&self) -> Option<ErrorCode> {
        match self {
            Value::Error(code) => Some(*code),
            _ => None,
        }
    }

    /// Short kind name, used in diagnostics.
    pub fn kind_name(&self) -> &'static str {
        match self {
            Value::Number(_) => "number",
            Value::Text(_) => "text",
            Value::Boolean(_) => "boolean",
            Value::Blank => "blank",
            Value::Error(_) => "error",
            Value::CellRef(_) => "cell reference",
            Value::AreaRef(_) => "area reference",
        }
    }
}

/// Render a number the way text functions see it.
///
/// Values are rounded to 15 significant digits, integral values carry no
/// fractional part and negative zero prints as `0`. Magnitudes from `1e21`
/// up, or below `1e-9`, use scientific notation (`1E+21`).
pub fn format_number(n: f64) -> String {
    if n == 0.0 {
        return "0".to_string();
    }
    if !n.is_finite() {
        return n.to_string();
    }
    let rounded: f64 = format!("{n:.14e}").parse().unwrap_or(n);
    if (1e-9..1e21).contains(&rounded.abs()) {
        return rounded.to_string();
    }
    let scientific = format!("{rounded:E}");
    match scientific.split_once('E') {
        Some((mantissa, exponent)) => {
            let exponent: i32 = exponent.parse().unwrap_or(0);
            format!("{mantissa}E{exponent:+03}")
        }
        None => scientific,
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Number(n) => f.write_str(&format_number(*n)),
            Value::Text(s) => f.write_str(s),
            Value::Boolean(b) => f.write_str(if *b { "TRUE" } else { "FALSE" }),
            Value::Blank => Ok(()),
            Value::Error(code) => write!(f, "{code}"),
            Value::CellRef(cell) => write!(f, "{}", cell.addr),
            Value::AreaRef(area) => write!(f, "{}", area.range),
        }
    }
}

impl From<f64> for Value {
    fn from(n: f64) -> Self {
        Value::Number(n)
    }
}

impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Value::Boolean(b)
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Value::Text(s.to_string())
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Value::Text(s)
    }
}

impl From<ErrorCode> for Value {
    fn from(code: ErrorCode) -> Self {
        Value::Error(code)
    }
}

/// Errors raised while building reference values
#[derive(Debug, thiserror::Error)]
pub enum ValueError {
    #[error("Cell reference {0} cannot wrap another reference")]
    NestedReference(CellAddress),
    #[error("Inverted area bounds: rows {first_row}..{last_row}, columns {first_col}..{last_col}")]
    InvertedBounds {
        first_row: u32,
        last_row: u32,
        first_col: u32,
        last_col: u32,
    },
}
