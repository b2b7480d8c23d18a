//! Digit cells for code entry.
//!
//! # Design
//! - One optional digit per cell plus the focused index; no widget handles.
//! - Typing advances focus, backspace on an empty cell steps back, paste fills from the left.

use crate::error::ValidationError;
use crate::otp::CODE_LENGTH;

/// State of the code entry cells.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct CodeInput {
    cells: Vec<Option<char>>,
    focus: usize,
}

impl Default for CodeInput {
    fn default() -> Self {
        Self::new(CODE_LENGTH)
    }
}

impl CodeInput {
    /// Empty input with `length` cells, focused on the first.
    #[must_use]
    pub fn new(length: usize) -> Self {
        Self {
            cells: vec![None; length.max(1)],
            focus: 0,
        }
    }

    /// Number of cells.
    #[must_use]
    pub fn len(&self) -> usize {
        self.cells.len()
    }

    /// Always false; inputs have at least one cell.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.cells.is_empty()
    }

    /// Index of the focused cell.
    #[must_use]
    pub const fn focus(&self) -> usize {
        self.focus
    }

    /// Digit held by a cell.
    #[must_use]
    pub fn cell(&self, index: usize) -> Option<char> {
        self.cells.get(index).copied().flatten()
    }

    /// Handle a change event on `index`.
    ///
    /// Multi-character values and non-digits are ignored; an empty value
    /// clears the cell. A digit moves focus to the next cell.
    pub fn input(&mut self, index: usize, value: &str) {
        if index >= self.cells.len() {
            return;
        }
        let mut chars = value.chars();
        match (chars.next(), chars.next()) {
            (None, _) => {
                self.cells[index] = None;
                self.focus = index;
            }
            (Some(ch), None) if ch.is_ascii_digit() => {
                self.cells[index] = Some(ch);
                self.focus = (index + 1).min(self.cells.len() - 1);
            }
            _ => {}
        }
    }

    /// Handle backspace pressed on `index`.
    ///
    /// A filled cell is cleared in place; an empty cell moves focus to the
    /// previous cell.
    pub fn backspace(&mut self, index: usize) {
        if index >= self.cells.len() {
            return;
        }
        if self.cells[index].is_some() {
            self.cells[index] = None;
            self.focus = index;
        } else if index > 0 {
            self.focus = index - 1;
        }
    }

    /// Distribute pasted text across the cells.
    ///
    /// Non-digits are stripped and only the first `len()` digits are used,
    /// filling from the first cell. Focus lands on the last filled cell when
    /// every cell was filled, otherwise on the next empty one.
    pub fn paste(&mut self, text: &str) {
        let digits: Vec<char> = text
            .chars()
            .filter(char::is_ascii_digit)
            .take(self.cells.len())
            .collect();
        if digits.is_empty() {
            return;
        }
        for (cell, digit) in self.cells.iter_mut().zip(&digits) {
            *cell = Some(*digit);
        }
        self.focus = digits.len().min(self.cells.len() - 1);
    }

    /// Reset every cell and focus the first.
    pub fn clear(&mut self) {
        self.cells.iter_mut().for_each(|cell| *cell = None);
        self.focus = 0;
    }

    /// Concatenation of filled cells in left-to-right order.
    #[must_use]
    pub fn value(&self) -> String {
        self.cells.iter().flatten().collect()
    }

    /// Whether every cell holds a digit.
    #[must_use]
    pub fn is_complete(&self) -> bool {
        self.cells.iter().all(Option::is_some)
    }

    /// Complete code ready for submission.
    ///
    /// # Errors
    /// Returns [`ValidationError::IncompleteCode`] when any cell is empty.
    pub fn code(&self) -> Result<String, ValidationError> {
        if self.is_complete() {
            Ok(self.value())
        } else {
            Err(ValidationError::IncompleteCode {
                expected: self.cells.len(),
            })
        }
    }

    /// Build a filled input from a typed string, as a paste would.
    #[must_use]
    pub fn from_text(text: &str) -> Self {
        let mut input = Self::default();
        input.paste(text);
        input
    }
}
