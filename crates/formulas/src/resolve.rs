//! Collapsing operands onto the evaluating cell.
//!
//! A scalar-consuming function that receives an area picks the single cell
//! that shares a row or a column with the cell being evaluated (implicit
//! intersection). An area that covers the evaluating cell itself is a
//! self-reference and resolves to `CircularRef` before anything is read.

use crate::policy::{reference_origin, CoercionPolicy, Origin};
use cellcalc_primitives::{format_number, AreaRef, CellAddress, ErrorCode, Value};
use tracing::{debug, trace};

/// Pick the cell of `area` that lines up with `src`.
///
/// Single-row areas intersect on the column, single-column areas on the row.
/// A one-cell area is a single row, so it yields its only cell whenever the
/// column matches. Anything else is `#VALUE!`.
pub fn intersect(area: &AreaRef, src: CellAddress) -> Result<Value, ErrorCode> {
    if area.contains(&src) {
        debug!(area = %area.range(), cell = %src, "area covers the evaluating cell");
        return Err(ErrorCode::CircularRef);
    }

    let picked = if area.first_row() == area.last_row() && area.contains_column(src.col) {
        area.get(area.first_row(), src.col)
    } else if area.first_col() == area.last_col() && area.contains_row(src.row) {
        area.get(src.row, area.first_col())
    } else {
        None
    };

    match picked {
        Some(value) => {
            trace!(area = %area.range(), cell = %src, kind = value.kind_name(), "intersected");
            Ok(value)
        }
        None => {
            trace!(area = %area.range(), cell = %src, "no intersection");
            Err(ErrorCode::ValueInvalid)
        }
    }
}

/// Reduce an operand to one scalar and the context it was reached in.
///
/// Areas are intersected; a cell read from an area that turns out to be a
/// `CellRef` is looked through once more so its own evaluated flag applies.
pub fn reduce_operand(operand: &Value, src: CellAddress) -> Result<(Value, Origin), ErrorCode> {
    match operand {
        Value::AreaRef(area) => match intersect(area, src)? {
            Value::CellRef(cell) => {
                let origin = reference_origin(cell.is_evaluated());
                Ok((cell.into_inner(), origin))
            }
            Value::AreaRef(_) => Err(ErrorCode::ValueInvalid),
            value => Ok((value, Origin::Reference)),
        },
        Value::CellRef(cell) => Ok((cell.inner().clone(), reference_origin(cell.is_evaluated()))),
        value => Ok((value.clone(), Origin::Direct)),
    }
}

/// Resolve `operand` to a single scalar that `policy` accepts.
///
/// The result is a `Number` or `Blank`; blanks are left for the caller to
/// interpret. Error values anywhere along the way come back as `Err`.
pub fn resolve_scalar(
    operand: &Value,
    src: CellAddress,
    policy: &CoercionPolicy,
) -> Result<Value, ErrorCode> {
    let (value, origin) = reduce_operand(operand, src)?;
    Ok(match policy.coerce_to_number(&value, origin)? {
        Some(n) => Value::Number(n),
        None => Value::Blank,
    })
}

/// Resolve `operand` to a number, failing on blanks with `#VALUE!`.
pub fn resolve_number(
    operand: &Value,
    src: CellAddress,
    policy: &CoercionPolicy,
) -> Result<f64, ErrorCode> {
    match resolve_scalar(operand, src, policy)? {
        Value::Number(n) => Ok(n),
        _ => Err(ErrorCode::ValueInvalid),
    }
}

/// Reduce `operand` to a scalar without coercing it. Errors stay values.
pub fn resolve_value(operand: &Value, src: CellAddress) -> Result<Value, ErrorCode> {
    reduce_operand(operand, src).map(|(value, _)| value)
}

/// Reduce `operand` to its text rendering; error values propagate.
pub fn resolve_text(operand: &Value, src: CellAddress) -> Result<String, ErrorCode> {
    match resolve_value(operand, src)? {
        Value::Text(text) => Ok(text),
        Value::Number(n) => Ok(format_number(n)),
        Value::Boolean(b) => Ok(if b { "TRUE" } else { "FALSE" }.to_string()),
        Value::Blank => Ok(String::new()),
        Value::Error(code) => Err(code),
        Value::CellRef(_) | Value::AreaRef(_) => Err(ErrorCode::ValueInvalid),
    }
}
