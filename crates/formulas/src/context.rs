//! In-memory cell store used to build operands for function calls.

use cellcalc_primitives::{AreaRef, CellAddress, CellRange, CellRef, CellSource, Value, ValueError};
use std::collections::{HashMap, HashSet};
use std::sync::Arc;

/// A sparse sheet: stored values plus the set of cells whose value came
/// from evaluating a formula.
#[derive(Debug, Default, Clone)]
pub struct SheetContext {
    cells: HashMap<CellAddress, Value>,
    formula_cells: HashSet<CellAddress>,
}

impl SheetContext {
    pub fn new() -> Self {
        Self::default()
    }

    /// Store a plain value. References cannot be stored.
    pub fn set(&mut self, addr: CellAddress, value: Value) -> Result<(), ValueError> {
        if value.is_reference() {
            return Err(ValueError::NestedReference(addr));
        }
        self.formula_cells.remove(&addr);
        self.cells.insert(addr, value);
        Ok(())
    }

    /// Store the result of a formula living in `addr`.
    pub fn set_evaluated(&mut self, addr: CellAddress, value: Value) -> Result<(), ValueError> {
        self.set(addr, value)?;
        self.formula_cells.insert(addr);
        Ok(())
    }

    pub fn get(&self, addr: &CellAddress) -> Value {
        self.cells.get(addr).cloned().unwrap_or(Value::Blank)
    }

    pub fn is_formula(&self, addr: &CellAddress) -> bool {
        self.formula_cells.contains(addr)
    }

    pub fn len(&self) -> usize {
        self.cells.len()
    }

    pub fn is_empty(&self) -> bool {
        self.cells.is_empty()
    }

    /// A single-cell reference operand to `addr`.
    pub fn cell(&self, addr: CellAddress) -> Result<Value, ValueError> {
        CellRef::new(addr, self.get(&addr), self.is_formula(&addr)).map(Value::CellRef)
    }

    /// An area operand over `range`, reading from this store.
    pub fn area(self: &Arc<Self>, range: CellRange) -> Value {
        let source: Arc<dyn CellSource> = self.clone();
        Value::AreaRef(AreaRef::new(range, source))
    }
}

impl CellSource for SheetContext {
    /// Formula cells come back as evaluated `CellRef`s so their origin
    /// survives area walks.
    fn value_at(&self, row: u32, col: u32) -> Value {
        let addr = CellAddress::new(row, col);
        let value = self.get(&addr);
        if self.is_formula(&addr) {
            if let Ok(cell) = CellRef::new(addr, value.clone(), true) {
                return Value::CellRef(cell);
            }
        }
        value
    }
}

impl FromIterator<(CellAddress, Value)> for SheetContext {
    /// Collect plain values; references are dropped.
    fn from_iter<I: IntoIterator<Item = (CellAddress, Value)>>(iter: I) -> Self {
        let cells = iter
            .into_iter()
            .filter(|(_, value)| !value.is_reference())
            .collect();
        Self {
            cells,
            formula_cells: HashSet::new(),
        }
    }
}
