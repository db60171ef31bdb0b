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

use crate::error::LoadError;
use serde::Serialize;
use serde_json::Value;
use std::collections::HashSet;

#[derive(Debug, Clone, PartialEq)]
pub enum ColumnValues {
    Int64(Vec<Option<i64>>),
    Float64(Vec<Option<f64>>),
    Boolean(Vec<Option<bool>>),
    Text(Vec<Option<String>>),
}

impl ColumnValues {
    pub fn len(&self) -> usize {
        match self {
            ColumnValues::Int64(v) => v.len(),
            ColumnValues::Float64(v) => v.len(),
            ColumnValues::Boolean(v) => v.len(),
            ColumnValues::Text(v) => v.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn null_count(&self) -> usize {
        match self {
            ColumnValues::Int64(v) => v.iter().filter(|c| c.is_none()).count(),
            ColumnValues::Float64(v) => v.iter().filter(|c| c.is_none()).count(),
            ColumnValues::Boolean(v) => v.iter().filter(|c| c.is_none()).count(),
            ColumnValues::Text(v) => v.iter().filter(|c| c.is_none()).count(),
        }
    }

    pub fn is_numeric(&self) -> bool {
        matches!(self, ColumnValues::Int64(_) | ColumnValues::Float64(_))
    }

    pub fn get_string(&self, index: usize) -> Option<String> {
        match self {
            ColumnValues::Int64(v) => v.get(index)?.map(|n| n.to_string()),
            ColumnValues::Float64(v) => v.get(index)?.map(|n| n.to_string()),
            ColumnValues::Boolean(v) => v.get(index)?.map(|b| b.to_string()),
            ColumnValues::Text(v) => v.get(index)?.clone(),
        }
    }

    pub fn to_f64(&self, index: usize) -> Option<f64> {
        match self {
            ColumnValues::Int64(v) => v.get(index)?.map(|n| n as f64),
            ColumnValues::Float64(v) => *v.get(index)?,
            ColumnValues::Boolean(_) | ColumnValues::Text(_) => None,
        }
    }

    /// JSON value for one cell, null when the cell is missing.
    pub fn json_value(&self, index: usize) -> Value {
        match self {
            ColumnValues::Int64(v) => v
                .get(index)
                .copied()
                .flatten()
                .map_or(Value::Null, Value::from),
            ColumnValues::Float64(v) => v
                .get(index)
                .copied()
                .flatten()
                .map_or(Value::Null, Value::from),
            ColumnValues::Boolean(v) => v
                .get(index)
                .copied()
                .flatten()
                .map_or(Value::Null, Value::from),
            ColumnValues::Text(v) => v
                .get(index)
                .cloned()
                .flatten()
                .map_or(Value::Null, Value::from),
        }
    }
}

#[derive(Debug, Clone)]
pub struct Column {
    pub name: String,
    pub values: ColumnValues,
}

impl Column {
    pub fn json_values(&self) -> Vec<Value> {
        (0..self.values.len())
            .map(|i| self.values.json_value(i))
            .collect()
    }
}

/// One uploaded dataset held in memory: uniquely-named columns of equal
/// length plus the original per-sheet row indices (not renumbered after
/// sheet flattening).
#[derive(Debug, Clone)]
pub struct Table {
    columns: Vec<Column>,
    row_ids: Vec<usize>,
}

#[derive(Debug, Clone, Serialize)]
pub struct TablePreview {
    pub headers: Vec<String>,
    pub rows: Vec<Vec<String>>,
}

impl Table {
    pub fn new(columns: Vec<Column>, row_ids: Vec<usize>) -> Result<Self, LoadError> {
        let expected = row_ids.len();
        let mut seen = HashSet::new();
        for column in &columns {
            if !seen.insert(column.name.clone()) {
                return Err(LoadError::DuplicateColumn(column.name.clone()));
            }
            if column.values.len() != expected {
                return Err(LoadError::LengthMismatch {
                    name: column.name.clone(),
                    expected,
                    actual: column.values.len(),
                });
            }
        }
        Ok(Self { columns, row_ids })
    }

    pub fn row_count(&self) -> usize {
        self.row_ids.len()
    }

    pub fn row_ids(&self) -> &[usize] {
        &self.row_ids
    }

    pub fn columns(&self) -> &[Column] {
        &self.columns
    }

    pub fn column_names(&self) -> Vec<String> {
        self.columns.iter().map(|c| c.name.clone()).collect()
    }

    pub fn column(&self, name: &str) -> Option<&Column> {
        self.columns.iter().find(|c| c.name == name)
    }

    pub fn has_column(&self, name: &str) -> bool {
        self.column(name).is_some()
    }

    /// Canonical CSV serialization: header row plus data rows, no index
    /// column. Cached by the caller so it is produced once per upload.
    pub fn to_csv(&self) -> Result<String, LoadError> {
        let mut writer = csv::Writer::from_writer(Vec::new());
        writer.write_record(self.columns.iter().map(|c| c.name.as_str()))?;
        for row in 0..self.row_count() {
            let record: Vec<String> = self
                .columns
                .iter()
                .map(|c| c.values.get_string(row).unwrap_or_default())
                .collect();
            writer.write_record(&record)?;
        }
        let buffer = writer.into_inner().map_err(|e| e.into_error())?;
        Ok(String::from_utf8_lossy(&buffer).into_owned())
    }

    pub fn preview(&self, limit: usize) -> TablePreview {
        let rows = (0..self.row_count().min(limit))
            .map(|row| {
                self.columns
                    .iter()
                    .map(|c| c.values.get_string(row).unwrap_or_default())
                    .collect()
            })
            .collect();
        TablePreview {
            headers: self.column_names(),
            rows,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_table() -> Table {
        Table::new(
            vec![
                Column {
                    name: "city".into(),
                    values: ColumnValues::Text(vec![
                        Some("Leeds".into()),
                        Some("York".into()),
                        None,
                    ]),
                },
                Column {
                    name: "population".into(),
                    values: ColumnValues::Int64(vec![Some(793), Some(202), Some(150)]),
                },
            ],
            vec![0, 1, 2],
        )
        .unwrap()
    }

    #[test]
    fn rejects_duplicate_column_names() {
        let col = Column {
            name: "a".into(),
            values: ColumnValues::Int64(vec![Some(1)]),
        };
        let err = Table::new(vec![col.clone(), col], vec![0]).unwrap_err();
        assert!(matches!(err, LoadError::DuplicateColumn(name) if name == "a"));
    }

    #[test]
    fn rejects_ragged_columns() {
        let short = Column {
            name: "a".into(),
            values: ColumnValues::Int64(vec![Some(1)]),
        };
        let err = Table::new(vec![short], vec![0, 1]).unwrap_err();
        assert!(matches!(err, LoadError::LengthMismatch { .. }));
    }

    #[test]
    fn csv_serialization_has_header_and_all_rows() {
        let csv = sample_table().to_csv().unwrap();
        let mut lines = csv.lines();
        assert_eq!(lines.next(), Some("city,population"));
        assert_eq!(lines.next(), Some("Leeds,793"));
        assert_eq!(lines.next(), Some("York,202"));
        assert_eq!(lines.next(), Some(",150"));
        assert_eq!(lines.next(), None);
    }

    #[test]
    fn preview_clamps_to_row_count() {
        let preview = sample_table().preview(10);
        assert_eq!(preview.headers, vec!["city", "population"]);
        assert_eq!(preview.rows.len(), 3);
    }

    #[test]
    fn json_values_carry_nulls() {
        let table = sample_table();
        let values = table.column("city").unwrap().json_values();
        assert_eq!(values[0], serde_json::json!("Leeds"));
        assert_eq!(values[2], serde_json::Value::Null);
    }
}
