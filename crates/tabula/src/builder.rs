// SPDX-License-Identifier: AGPL-3.0-only
// Copyright (C) 2024 Jonathan Lee
// This program is free software: you can redistribute it and/or modify
// it under the terms of the GNU Affero General Public License version 3
// as published by the Free Software Foundation.
// This program is distributed in the hope that it will be useful,
// but WITHOUT ANY WARRANTY; without even the implied warranty of
// MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE.
// See the GNU Affero General Public License for more details.
// You should have received a copy of the GNU Affero General Public License
// along with this program. If not, see https://www.gnu.org/licenses/.

use crate::table::{Column, ColumnValues};

/// One parsed cell before column type resolution.
#[derive(Debug, Clone, PartialEq)]
pub enum CellScalar {
    Int(i64),
    Float(f64),
    Bool(bool),
    Text(String),
}

impl CellScalar {
    fn render(&self) -> String {
        match self {
            CellScalar::Int(n) => n.to_string(),
            CellScalar::Float(n) => n.to_string(),
            CellScalar::Bool(b) => b.to_string(),
            CellScalar::Text(s) => s.clone(),
        }
    }
}

/// Accumulates one column's cells and resolves the narrowest storage type
/// that holds them all: integers widen to floats, anything mixed with text
/// falls back to text. Empty cells are nulls and do not influence the type.
#[derive(Debug)]
pub struct ColumnBuilder {
    name: String,
    cells: Vec<Option<CellScalar>>,
}

impl ColumnBuilder {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            cells: Vec::new(),
        }
    }

    pub fn with_leading_nulls(name: impl Into<String>, count: usize) -> Self {
        Self {
            name: name.into(),
            cells: vec![None; count],
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn len(&self) -> usize {
        self.cells.len()
    }

    pub fn is_empty(&self) -> bool {
        self.cells.is_empty()
    }

    pub fn push(&mut self, cell: Option<CellScalar>) {
        self.cells.push(cell);
    }

    pub fn push_null(&mut self) {
        self.cells.push(None);
    }

    /// Parses a raw text field (CSV path). Empty fields are nulls.
    pub fn push_raw(&mut self, field: &str) {
        let trimmed = field.trim();
        if trimmed.is_empty() {
            self.cells.push(None);
            return;
        }
        let cell = if let Ok(n) = trimmed.parse::<i64>() {
            CellScalar::Int(n)
        } else if let Ok(n) = trimmed.parse::<f64>() {
            CellScalar::Float(n)
        } else if trimmed.eq_ignore_ascii_case("true") {
            CellScalar::Bool(true)
        } else if trimmed.eq_ignore_ascii_case("false") {
            CellScalar::Bool(false)
        } else {
            CellScalar::Text(field.to_string())
        };
        self.cells.push(Some(cell));
    }

    pub fn finish(self) -> Column {
        let mut has_int = false;
        let mut has_float = false;
        let mut has_bool = false;
        let mut has_text = false;
        for cell in self.cells.iter().flatten() {
            match cell {
                CellScalar::Int(_) => has_int = true,
                CellScalar::Float(_) => has_float = true,
                CellScalar::Bool(_) => has_bool = true,
                CellScalar::Text(_) => has_text = true,
            }
        }

        let values = if has_text || (has_bool && (has_int || has_float)) {
            ColumnValues::Text(
                self.cells
                    .into_iter()
                    .map(|c| c.map(|cell| cell.render()))
                    .collect(),
            )
        } else if has_float {
            ColumnValues::Float64(
                self.cells
                    .into_iter()
                    .map(|c| {
                        c.map(|cell| match cell {
                            CellScalar::Int(n) => n as f64,
                            CellScalar::Float(n) => n,
                            _ => unreachable!("non-numeric cell in float column"),
                        })
                    })
                    .collect(),
            )
        } else if has_int {
            ColumnValues::Int64(
                self.cells
                    .into_iter()
                    .map(|c| {
                        c.map(|cell| match cell {
                            CellScalar::Int(n) => n,
                            _ => unreachable!("non-integer cell in integer column"),
                        })
                    })
                    .collect(),
            )
        } else if has_bool {
            ColumnValues::Boolean(
                self.cells
                    .into_iter()
                    .map(|c| {
                        c.map(|cell| match cell {
                            CellScalar::Bool(b) => b,
                            _ => unreachable!("non-boolean cell in boolean column"),
                        })
                    })
                    .collect(),
            )
        } else {
            // All nulls; text is the least surprising carrier.
            ColumnValues::Text(self.cells.into_iter().map(|_| None).collect())
        };

        Column {
            name: self.name,
            values,
        }
    }
}
