use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use cellcalc_formulas::{
    flatten_numbers, resolve_scalar, BlankFallback, CoercionPolicy, Combinatorial, Function,
    FunctionRegistry, Origin, UnaryNumeric,
};
use cellcalc_primitives::{AreaRef, CellAddress, CellSource, ErrorCode, Value};

/// Answers every read with the same value and counts the reads.
struct CountingSource {
    reads: AtomicUsize,
    value: Value,
}

impl CountingSource {
    fn new(value: Value) -> Arc<Self> {
        Arc::new(Self {
            reads: AtomicUsize::new(0),
            value,
        })
    }

    fn reads(&self) -> usize {
        self.reads.load(Ordering::SeqCst)
    }
}

impl CellSource for CountingSource {
    fn value_at(&self, _row: u32, _col: u32) -> Value {
        self.reads.fetch_add(1, Ordering::SeqCst);
        self.value.clone()
    }
}

fn area_over(
    source: &Arc<CountingSource>,
    first_row: u32,
    last_row: u32,
    first_col: u32,
    last_col: u32,
) -> Value {
    let source: Arc<dyn CellSource> = source.clone();
    Value::AreaRef(AreaRef::from_bounds(first_row, last_row, first_col, last_col, source).unwrap())
}

const SRC: CellAddress = CellAddress::new(50, 50);

#[test]
fn test_unsupported_operand_count_reads_nothing() {
    let registry = FunctionRegistry::default();
    for name in registry.names() {
        let arity = registry.get(name).unwrap().arity();
        let mut counts = Vec::new();
        if arity.min > 0 {
            counts.push(arity.min - 1);
        }
        if let Some(max) = arity.max {
            counts.push(max + 1);
        }
        for count in counts {
            let source = CountingSource::new(Value::Number(1.0));
            let operands: Vec<Value> = (0..count)
                .map(|_| area_over(&source, 0, 3, 0, 0))
                .collect();
            let result = registry.call(name, &operands, SRC).unwrap();
            assert_eq!(
                result,
                Value::Error(ErrorCode::ValueInvalid),
                "{name} with {count} operands"
            );
            assert_eq!(source.reads(), 0, "{name} read cells with {count} operands");
        }
    }
}

#[test]
fn test_unsupported_count_beats_error_operand() {
    let registry = FunctionRegistry::default();
    let operands = [Value::Error(ErrorCode::NA), Value::Number(1.0)];
    assert_eq!(
        registry.call("ABS", &operands, SRC).unwrap(),
        Value::Error(ErrorCode::ValueInvalid)
    );
    assert_eq!(
        registry.call("ISNA", &operands, SRC).unwrap(),
        Value::Error(ErrorCode::ValueInvalid)
    );
}

#[test]
fn test_self_reference_for_every_function() {
    let registry = FunctionRegistry::default();
    for name in registry.names() {
        let arity = registry.get(name).unwrap().arity();
        let source = CountingSource::new(Value::Number(7.0));
        let mut operands = vec![area_over(&source, 40, 60, 50, 50)];
        while operands.len() < arity.min {
            operands.push(Value::Number(1.0));
        }
        assert_eq!(
            registry.call(name, &operands, SRC).unwrap(),
            Value::Error(ErrorCode::CircularRef),
            "{name}"
        );
        assert_eq!(source.reads(), 0, "{name} read a self-referencing area");
    }
}

#[test]
fn test_implicit_intersection_row() {
    let registry = FunctionRegistry::default();
    let source = CountingSource::new(Value::Number(-3.0));
    let row = area_over(&source, 10, 10, 2, 5);

    let same_column = CellAddress::new(20, 3);
    assert_eq!(
        registry.call("ABS", std::slice::from_ref(&row), same_column).unwrap(),
        Value::Number(3.0)
    );
    assert_eq!(source.reads(), 1);

    let outside = CellAddress::new(20, 9);
    assert_eq!(
        registry.call("ABS", std::slice::from_ref(&row), outside).unwrap(),
        Value::Error(ErrorCode::ValueInvalid)
    );

    // The evaluating cell sits inside the row itself.
    let inside = CellAddress::new(10, 3);
    assert_eq!(
        registry.call("ABS", std::slice::from_ref(&row), inside).unwrap(),
        Value::Error(ErrorCode::CircularRef)
    );
    assert_eq!(source.reads(), 1);
}

#[test]
fn test_implicit_intersection_column() {
    let registry = FunctionRegistry::default();
    let source = CountingSource::new(Value::Number(16.0));
    let column = area_over(&source, 2, 5, 10, 10);

    assert_eq!(
        registry
            .call("SQRT", std::slice::from_ref(&column), CellAddress::new(3, 20))
            .unwrap(),
        Value::Number(4.0)
    );
    assert_eq!(
        registry
            .call("SQRT", std::slice::from_ref(&column), CellAddress::new(9, 20))
            .unwrap(),
        Value::Error(ErrorCode::ValueInvalid)
    );
}

#[test]
fn test_grid_is_ambiguous_for_scalars() {
    let registry = FunctionRegistry::default();
    let source = CountingSource::new(Value::Number(1.0));
    let grid = area_over(&source, 0, 3, 0, 3);
    assert_eq!(
        registry
            .call("ABS", &[grid], CellAddress::new(1, 10))
            .unwrap(),
        Value::Error(ErrorCode::ValueInvalid)
    );
    assert_eq!(source.reads(), 0);
}

#[test]
fn test_boolean_coercion_is_deterministic() {
    let no_booleans = CoercionPolicy::PERMISSIVE.booleans(false, false, false);
    for _ in 0..5 {
        assert_eq!(
            CoercionPolicy::PERMISSIVE.coerce_to_number(&Value::Boolean(true), Origin::Direct),
            Ok(Some(1.0))
        );
        assert_eq!(
            no_booleans.coerce_to_number(&Value::Boolean(true), Origin::Direct),
            Err(ErrorCode::ValueInvalid)
        );
    }
}

#[test]
fn test_single_error_wins_wherever_it_sits() {
    for position in 0..6 {
        let mut operands = vec![Value::Number(2.0); 6];
        operands[position] = Value::Error(ErrorCode::RefInvalid);
        assert_eq!(
            flatten_numbers(&operands, SRC, &CoercionPolicy::SPREAD, 30),
            Err(ErrorCode::RefInvalid)
        );
    }
}

#[test]
fn test_text_in_area_skipped_but_direct_text_rejected() {
    let registry = FunctionRegistry::default();
    let text = Value::from("Q3 total");
    let source = CountingSource::new(text.clone());
    let area = area_over(&source, 0, 2, 0, 0);

    assert_eq!(
        registry.call("SUM", &[area, Value::Number(4.0)], SRC).unwrap(),
        Value::Number(4.0)
    );
    assert_eq!(
        registry.call("SUM", &[text, Value::Number(4.0)], SRC).unwrap(),
        Value::Error(ErrorCode::ValueInvalid)
    );
}

#[test]
fn test_a_functions_zero_referenced_text_but_reject_direct_text() {
    let registry = FunctionRegistry::default();
    let text = Value::from("north");
    let source = CountingSource::new(text.clone());
    let area = area_over(&source, 0, 1, 0, 0);

    // Referenced text counts as zero: (0 + 0 + 6) / 3.
    assert_eq!(
        registry
            .call("AVERAGEA", &[area, Value::Number(6.0)], SRC)
            .unwrap(),
        Value::Number(2.0)
    );
    for name in ["AVERAGEA", "MAXA", "MINA", "STDEVA", "VARA"] {
        let operands = [text.clone(), Value::Number(5.0), Value::Number(7.0)];
        assert_eq!(
            registry.call(name, &operands, SRC).unwrap(),
            Value::Error(ErrorCode::ValueInvalid),
            "{name}"
        );
    }
    assert_eq!(
        registry
            .call("AVERAGEA", &[Value::from("4"), Value::Number(6.0)], SRC)
            .unwrap(),
        Value::Number(5.0)
    );
}

static ZERO_BLANKS: CoercionPolicy = CoercionPolicy::PERMISSIVE.blanks_as_zero(true, true);

#[test]
fn test_blank_follows_configured_policy() {
    let blank = [Value::Blank];
    let zeroing = UnaryNumeric::new(f64::exp)
        .with_policy(&ZERO_BLANKS)
        .with_blank(BlankFallback::Reject);
    assert_eq!(zeroing.call(&blank, SRC), Value::Number(1.0));

    let rejecting = UnaryNumeric::new(f64::exp).with_blank(BlankFallback::Reject);
    assert_eq!(
        rejecting.call(&blank, SRC),
        Value::Error(ErrorCode::ValueInvalid)
    );

    let passing = UnaryNumeric::new(f64::exp).with_blank(BlankFallback::PassThrough);
    assert_eq!(passing.call(&blank, SRC), Value::Blank);

    assert_eq!(
        resolve_scalar(&Value::Blank, SRC, &ZERO_BLANKS),
        Ok(Value::Number(0.0))
    );
    assert_eq!(
        resolve_scalar(&Value::Blank, SRC, &CoercionPolicy::PERMISSIVE),
        Ok(Value::Blank)
    );
}

fn exploding_routine(_n: i32, _k: i32) -> f64 {
    panic!("routine must not run for out-of-range operands");
}

#[test]
fn test_combinatorial_exact_and_out_of_range() {
    let registry = FunctionRegistry::default();
    assert_eq!(
        registry
            .call("COMBIN", &[Value::Number(5.0), Value::Number(2.0)], SRC)
            .unwrap(),
        Value::Number(10.0)
    );

    let guarded = Combinatorial::new(exploding_routine);
    assert_eq!(
        guarded.call(&[Value::Number(5.0), Value::Number(2_000_000_000.0)], SRC),
        Value::Error(ErrorCode::NumError)
    );
    assert_eq!(
        guarded.call(&[Value::Number(5.0), Value::Number(3e9)], SRC),
        Value::Error(ErrorCode::NumError)
    );
    assert_eq!(
        guarded.call(&[Value::Number(-1.0), Value::Number(0.0)], SRC),
        Value::Error(ErrorCode::NumError)
    );
}

#[test]
fn test_combin_overflow_returns_promptly() {
    let registry = FunctionRegistry::default();
    let start = std::time::Instant::now();
    assert_eq!(
        registry
            .call(
                "COMBIN",
                &[Value::Number(2e9), Value::Number(1e9)],
                SRC
            )
            .unwrap(),
        Value::Error(ErrorCode::NumError)
    );
    assert!(start.elapsed() < std::time::Duration::from_secs(1));
}
