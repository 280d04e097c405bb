//! # Cellcalc Primitives
//!
//! Core primitives for formula evaluation: cell addresses, rectangular
//! ranges, and the closed runtime value model every worksheet function
//! consumes and produces.

use serde::{Deserialize, Serialize};
use std::fmt;

pub mod value;

pub use value::{
    format_number, AreaRef, AreaShape, CellRef, CellSource, ErrorCode, Value, ValueError,
};

/// A cell address in the worksheet, zero-based (`A1` is row 0, column 0).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct CellAddress {
    pub row: u32,
    pub col: u32,
}

impl CellAddress {
    /// Create a new cell address
    pub const fn new(row: u32, col: u32) -> Self {
        Self { row, col }
    }

    /// Parse from A1 notation (e.g., "A1", "$B$2")
    pub fn from_a1(s: &str) -> Result<Self, AddressError> {
        let trimmed = s.trim();
        if trimmed.is_empty() {
            return Err(AddressError::InvalidRange("Empty A1 reference".to_string()));
        }

        let mut chars = trimmed.chars().peekable();

        // Optional $ for absolute column
        if matches!(chars.peek(), Some('$')) {
            chars.next();
        }

        let mut col_letters = String::new();
        while let Some(ch) = chars.peek().copied() {
            if ch.is_ascii_alphabetic() {
                col_letters.push(ch);
                chars.next();
            } else {
                break;
            }
        }

        if col_letters.is_empty() {
            return Err(AddressError::InvalidColumn(trimmed.to_string()));
        }

        // Optional $ for absolute row
        if matches!(chars.peek(), Some('$')) {
            chars.next();
        }

        let mut row_digits = String::new();
        while let Some(ch) = chars.peek().copied() {
            if ch.is_ascii_digit() {
                row_digits.push(ch);
                chars.next();
            } else {
                break;
            }
        }

        if row_digits.is_empty() || chars.peek().is_some() {
            return Err(AddressError::InvalidRow(trimmed.to_string()));
        }

        let row_num: u32 = row_digits
            .parse()
            .map_err(|_| AddressError::InvalidRow(row_digits.clone()))?;

        if row_num == 0 {
            return Err(AddressError::InvalidRow(row_digits));
        }

        let col_index = column_letters_to_index(&col_letters)?;
        Ok(Self {
            row: row_num - 1,
            col: col_index,
        })
    }

    /// Convert to A1 notation
    pub fn to_a1(&self) -> String {
        format!("{}{}", column_index_to_letters(self.col), self.row + 1)
    }
}

/// A rectangular range of cells (e.g., A1:B10).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct CellRange {
    pub start: CellAddress,
    pub end: CellAddress,
}

impl CellRange {
    /// Create a new cell range
    pub const fn new(start: CellAddress, end: CellAddress) -> Self {
        Self { start, end }
    }

    /// Parse `A1:B3` (or a lone `A1`, which becomes a one-cell range).
    pub fn from_a1(s: &str) -> Result<Self, AddressError> {
        let trimmed = s.trim();
        match trimmed.split_once(':') {
            Some((start, end)) => Ok(Self::new(
                CellAddress::from_a1(start)?,
                CellAddress::from_a1(end)?,
            )
            .normalized()),
            None => {
                let addr = CellAddress::from_a1(trimmed)?;
                Ok(Self::new(addr, addr))
            }
        }
    }

    /// Return a normalized range where start <= end
    pub fn normalized(&self) -> Self {
        Self {
            start: CellAddress::new(
                self.start.row.min(self.end.row),
                self.start.col.min(self.end.col),
            ),
            end: CellAddress::new(
                self.start.row.max(self.end.row),
                self.start.col.max(self.end.col),
            ),
        }
    }

    /// Number of rows in the range, saturating at `u32::MAX`
    pub fn rows(&self) -> u32 {
        let range = self.normalized();
        (range.end.row - range.start.row).saturating_add(1)
    }

    /// Number of columns in the range, saturating at `u32::MAX`
    pub fn cols(&self) -> u32 {
        let range = self.normalized();
        (range.end.col - range.start.col).saturating_add(1)
    }

    /// Check if a cell is within this range
    pub fn contains(&self, addr: &CellAddress) -> bool {
        self.contains_row(addr.row) && self.contains_column(addr.col)
    }

    /// Check if `row` falls inside the range's row span
    pub fn contains_row(&self, row: u32) -> bool {
        let range = self.normalized();
        row >= range.start.row && row <= range.end.row
    }

    /// Check if `col` falls inside the range's column span
    pub fn contains_column(&self, col: u32) -> bool {
        let range = self.normalized();
        col >= range.start.col && col <= range.end.col
    }

    /// Get total number of cells in range
    pub fn size(&self) -> usize {
        (self.rows() as usize).saturating_mul(self.cols() as usize)
    }

    /// Iterate over all addresses in row-major order
    pub fn iter(&self) -> CellRangeIter {
        let range = self.normalized();
        CellRangeIter {
            current: range.start,
            start: range.start,
            end: range.end,
            done: false,
        }
    }
}

/// Errors that can occur when parsing addresses
#[derive(Debug, thiserror::Error)]
pub enum AddressError {
    #[error("Invalid column: {0}")]
    InvalidColumn(String),
    #[error("Invalid row: {0}")]
    InvalidRow(String),
    #[error("Invalid range: {0}")]
    InvalidRange(String),
}

fn column_letters_to_index(col: &str) -> Result<u32, AddressError> {
    let mut result: u32 = 0;
    for ch in col.chars() {
        let upper = ch.to_ascii_uppercase();
        if !upper.is_ascii_alphabetic() {
            return Err(AddressError::InvalidColumn(col.to_string()));
        }
        let value = u32::from(upper as u8 - b'A' + 1);
        result = result
            .checked_mul(26)
            .and_then(|v| v.checked_add(value))
            .ok_or_else(|| AddressError::InvalidColumn(col.to_string()))?;
    }
    // Convert to zero-based index
    Ok(result - 1)
}

fn column_index_to_letters(mut index: u32) -> String {
    let mut letters = Vec::new();
    index += 1; // 1-based for conversion
    while index > 0 {
        let rem = ((index - 1) % 26) as u8;
        letters.push((b'A' + rem) as char);
        index = (index - 1) / 26;
    }
    letters.iter().rev().collect()
}

impl fmt::Display for CellAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_a1())
    }
}

impl fmt::Display for CellRange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.start, self.end)
    }
}

/// Iterator over a cell range in row-major order
pub struct CellRangeIter {
    current: CellAddress,
    start: CellAddress,
    end: CellAddress,
    done: bool,
}

impl Iterator for CellRangeIter {
    type Item = CellAddress;

    fn next(&mut self) -> Option<Self::Item> {
        if self.done {
            return None;
        }

        let result = self.current;

        if self.current.row == self.end.row && self.current.col == self.end.col {
            self.done = true;
            return Some(result);
        }

        if self.current.col < self.end.col {
            self.current.col += 1;
        } else {
            self.current.col = self.start.col;
            self.current.row += 1;
        }

        Some(result)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cell_range_contains() {
        let range = CellRange::new(
            CellAddress::new(1, 1), // B2
            CellAddress::new(3, 3), // D4
        );

        assert!(range.contains(&CellAddress::new(2, 2))); // C3
        assert!(!range.contains(&CellAddress::new(0, 0))); // A1
        assert!(!range.contains(&CellAddress::new(4, 4))); // E5
    }

    #[test]
    fn test_range_spans() {
        let range = CellRange::new(CellAddress::new(9, 1), CellAddress::new(9, 4));
        assert!(range.contains_row(9));
        assert!(!range.contains_row(10));
        assert!(range.contains_column(1));
        assert!(range.contains_column(4));
        assert!(!range.contains_column(5));
        assert_eq!(range.size(), 4);
    }

    #[test]
    fn test_range_normalized_contains() {
        let range = CellRange::new(CellAddress::new(3, 3), CellAddress::new(1, 1));
        assert!(range.contains(&CellAddress::new(2, 2)));
        assert_eq!(range.rows(), 3);
        assert_eq!(range.cols(), 3);
    }

    #[test]
    fn test_full_span_saturates() {
        let range = CellRange::new(CellAddress::new(0, 0), CellAddress::new(u32::MAX, 0));
        assert_eq!(range.rows(), u32::MAX);
        assert_eq!(range.cols(), 1);
        assert_eq!(range.size(), u32::MAX as usize);
    }

    #[test]
    fn test_range_iter() {
        let range = CellRange::new(CellAddress::new(0, 0), CellAddress::new(1, 1));
        let collected: Vec<_> = range.iter().collect();
        assert_eq!(
            collected,
            vec![
                CellAddress::new(0, 0),
                CellAddress::new(0, 1),
                CellAddress::new(1, 0),
                CellAddress::new(1, 1),
            ]
        );
    }

    #[test]
    fn test_a1_parse_with_dollar() {
        let addr = CellAddress::from_a1("$B$2").unwrap();
        assert_eq!(addr, CellAddress::new(1, 1));
    }

    #[test]
    fn test_column_letters_to_index_invalid() {
        assert!(column_letters_to_index("A!").is_err());
        let long_col = "Z".repeat(20);
        assert!(column_letters_to_index(&long_col).is_err());
    }
}
