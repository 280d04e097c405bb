//! Flattening variable-length operand lists into numeric sequences.

use crate::policy::{reference_origin, Coercion, CoercionPolicy, Origin};
use cellcalc_primitives::{CellAddress, ErrorCode, Value};
use tracing::{debug, trace};

/// Operand ceiling for multi-operand functions unless configured otherwise.
pub const DEFAULT_MAX_OPERANDS: usize = 30;

/// Visit every scalar reachable from `operands`, in order.
///
/// Areas are walked row-major, and every cell read out of one is reported
/// with a reference origin. A `CellRef`, whether typed directly or found in
/// an area, is unwrapped once and reports its own origin. An area covering
/// `src` stops the walk with `CircularRef` before any of its cells is read.
/// The first error returned by `visit` ends the walk.
pub fn walk_operands<F>(operands: &[Value], src: CellAddress, mut visit: F) -> Result<(), ErrorCode>
where
    F: FnMut(Value, Origin) -> Result<(), ErrorCode>,
{
    for operand in operands {
        match operand {
            Value::AreaRef(area) => {
                if area.contains(&src) {
                    debug!(area = %area.range(), cell = %src, "area covers the evaluating cell");
                    return Err(ErrorCode::CircularRef);
                }
                for value in area.values() {
                    match value {
                        Value::CellRef(cell) => {
                            let origin = reference_origin(cell.is_evaluated());
                            visit(cell.into_inner(), origin)?;
                        }
                        // A source handing out nested areas is outside the accessor contract.
                        Value::AreaRef(_) => return Err(ErrorCode::ValueInvalid),
                        value => visit(value, Origin::Reference)?,
                    }
                }
            }
            Value::CellRef(cell) => {
                visit(cell.inner().clone(), reference_origin(cell.is_evaluated()))?;
            }
            value => visit(value.clone(), Origin::Direct)?,
        }
    }
    Ok(())
}

/// Collect the numbers `policy` accepts from `operands`.
///
/// More than `max_operands` operands is `#VALUE!` before anything is read.
/// Kinds the policy excludes are skipped when reached through a reference
/// and rejected with `#VALUE!` when typed directly. Unresolved blanks are
/// skipped. The first error value met ends the walk and is returned.
pub fn flatten_numbers(
    operands: &[Value],
    src: CellAddress,
    policy: &CoercionPolicy,
    max_operands: usize,
) -> Result<Vec<f64>, ErrorCode> {
    if operands.len() > max_operands {
        debug!(
            count = operands.len(),
            max_operands, "too many operands to flatten"
        );
        return Err(ErrorCode::ValueInvalid);
    }

    let mut numbers = Vec::new();
    walk_operands(operands, src, |value, origin| {
        match policy.classify(&value, origin)? {
            Coercion::Number(n) => numbers.push(n),
            Coercion::Blank => {}
            Coercion::Excluded if origin == Origin::Direct => {
                return Err(ErrorCode::ValueInvalid);
            }
            Coercion::Excluded => {
                trace!(kind = value.kind_name(), "skipping excluded value");
            }
        }
        Ok(())
    })?;
    Ok(numbers)
}

#[cfg(test)]
mod tests {
    use super::*;
    use cellcalc_primitives::{AreaRef, CellRef, CellSource};
    use std::sync::Arc;

    struct Column(Vec<Value>);

    impl CellSource for Column {
        fn value_at(&self, row: u32, _col: u32) -> Value {
            self.0.get(row as usize).cloned().unwrap_or(Value::Blank)
        }
    }

    fn column(values: Vec<Value>) -> Value {
        let last = values.len() as u32 - 1;
        Value::AreaRef(AreaRef::from_bounds(0, last, 0, 0, Arc::new(Column(values))).unwrap())
    }

    const AWAY: CellAddress = CellAddress::new(100, 100);

    #[test]
    fn test_area_values_in_order() {
        let operands = [
            column(vec![Value::Number(1.0), Value::Number(2.0), Value::Number(3.0)]),
            Value::Number(4.0),
        ];
        let numbers = flatten_numbers(&operands, AWAY, &CoercionPolicy::SPREAD, 30).unwrap();
        assert_eq!(numbers, vec![1.0, 2.0, 3.0, 4.0]);
    }

    #[test]
    fn test_operand_ceiling() {
        let operands = vec![Value::Number(1.0); 31];
        assert_eq!(
            flatten_numbers(&operands, AWAY, &CoercionPolicy::SPREAD, 30),
            Err(ErrorCode::ValueInvalid)
        );
        assert!(flatten_numbers(&operands[..30], AWAY, &CoercionPolicy::SPREAD, 30).is_ok());
    }

    #[test]
    fn test_excluded_in_area_skipped_direct_rejected() {
        let in_area = [column(vec![Value::from("north"), Value::Number(5.0)])];
        assert_eq!(
            flatten_numbers(&in_area, AWAY, &CoercionPolicy::SPREAD, 30),
            Ok(vec![5.0])
        );
        let direct = [Value::from("north"), Value::Number(5.0)];
        assert_eq!(
            flatten_numbers(&direct, AWAY, &CoercionPolicy::SPREAD, 30),
            Err(ErrorCode::ValueInvalid)
        );
    }

    #[test]
    fn test_cell_ref_in_area_uses_its_own_origin() {
        let evaluated = CellRef::new(CellAddress::new(0, 0), Value::Boolean(true), true).unwrap();
        let operands = [column(vec![Value::CellRef(evaluated), Value::Boolean(true)])];
        let policy = CoercionPolicy::new().booleans(false, false, true);
        assert_eq!(flatten_numbers(&operands, AWAY, &policy, 30), Ok(vec![1.0]));
    }

    #[test]
    fn test_error_anywhere_wins() {
        for position in 0..4 {
            let mut values = vec![Value::Number(1.0); 4];
            values[position] = Value::Error(ErrorCode::DivZero);
            let operands = [column(values)];
            assert_eq!(
                flatten_numbers(&operands, AWAY, &CoercionPolicy::SPREAD, 30),
                Err(ErrorCode::DivZero)
            );
        }
    }

    #[test]
    fn test_self_reference_in_walk() {
        let operands = [column(vec![Value::Number(1.0), Value::Number(2.0)])];
        assert_eq!(
            flatten_numbers(&operands, CellAddress::new(1, 0), &CoercionPolicy::SPREAD, 30),
            Err(ErrorCode::CircularRef)
        );
    }

    #[test]
    fn test_blanks() {
        let operands = [column(vec![Value::Blank, Value::Number(2.0)]), Value::Blank];
        assert_eq!(
            flatten_numbers(&operands, AWAY, &CoercionPolicy::SPREAD, 30),
            Ok(vec![2.0])
        );
        assert_eq!(
            flatten_numbers(&operands, AWAY, &CoercionPolicy::MAXIMAL, 30),
            Ok(vec![0.0, 2.0, 0.0])
        );
    }
}
