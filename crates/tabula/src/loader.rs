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

use crate::builder::ColumnBuilder;
use crate::error::LoadError;
use crate::sheet::{read_workbook, RawSheet};
use crate::table::Table;
use std::collections::HashMap;
use std::path::Path;
use tracing::info;

/// Prefix assigned to blank header cells during sheet flattening. Columns
/// carrying it are dropped before the table is stored.
pub const UNNAMED_MARKER: &str = "Unnamed:";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SourceFormat {
    Csv,
    Spreadsheet,
}

impl SourceFormat {
    /// Format sniffing uses the filename extension only; the payload is
    /// never inspected.
    pub fn from_filename(filename: &str) -> Option<Self> {
        let extension = Path::new(filename).extension()?.to_str()?.to_lowercase();
        match extension.as_str() {
            "csv" => Some(SourceFormat::Csv),
            "xls" | "xlsx" | "xlsm" | "xlsb" | "ods" => Some(SourceFormat::Spreadsheet),
            _ => None,
        }
    }
}

/// Parses uploaded bytes into a [`Table`], or a typed failure the handler
/// turns into a user notice. The loader is pure: storing the result in
/// session state is the caller's business.
pub fn load_table(bytes: &[u8], filename: &str) -> Result<Table, LoadError> {
    let format =
        SourceFormat::from_filename(filename).ok_or_else(|| LoadError::UnsupportedFormat {
            name: filename.to_string(),
        })?;
    let table = match format {
        SourceFormat::Csv => parse_csv(bytes)?,
        SourceFormat::Spreadsheet => flatten_sheets(read_workbook(bytes)?)?,
    };
    info!(
        source = %filename,
        rows = table.row_count(),
        columns = table.columns().len(),
        "table loaded"
    );
    Ok(table)
}

fn parse_csv(bytes: &[u8]) -> Result<Table, LoadError> {
    let text = std::str::from_utf8(bytes)?;
    let mut reader = csv::Reader::from_reader(text.as_bytes());
    let headers = reader.headers()?.clone();
    if headers.is_empty() {
        return Err(LoadError::MissingHeaderRow);
    }

    let mut builders: Vec<ColumnBuilder> = headers.iter().map(ColumnBuilder::new).collect();
    let mut row_ids = Vec::new();
    for (index, record) in reader.records().enumerate() {
        let record = record?;
        for (builder, field) in builders.iter_mut().zip(record.iter()) {
            builder.push_raw(field);
        }
        row_ids.push(index);
    }

    Table::new(
        builders.into_iter().map(ColumnBuilder::finish).collect(),
        row_ids,
    )
}

/// Row-wise concatenation of every sheet into one table. Columns align by
/// name across sheets (first-seen order, missing cells become nulls), blank
/// headers get the synthetic `Unnamed: {position}` name, and every column
/// still carrying that marker afterwards is dropped. Original per-sheet row
/// indices are preserved, not renumbered.
pub fn flatten_sheets(sheets: Vec<RawSheet>) -> Result<Table, LoadError> {
    if sheets.is_empty() {
        return Err(LoadError::MissingHeaderRow);
    }

    let mut order: Vec<String> = Vec::new();
    let mut builders: HashMap<String, ColumnBuilder> = HashMap::new();
    let mut row_ids: Vec<usize> = Vec::new();
    let mut total_rows = 0usize;

    for sheet in &sheets {
        let mut names = Vec::with_capacity(sheet.header.len());
        for (position, header) in sheet.header.iter().enumerate() {
            let name = if header.is_empty() {
                format!("{UNNAMED_MARKER} {position}")
            } else {
                header.clone()
            };
            if names.contains(&name) {
                return Err(LoadError::DuplicateColumn(name));
            }
            if !builders.contains_key(&name) {
                builders.insert(
                    name.clone(),
                    ColumnBuilder::with_leading_nulls(name.clone(), total_rows),
                );
                order.push(name.clone());
            }
            names.push(name);
        }

        for (index, row) in sheet.rows.iter().enumerate() {
            for (position, name) in names.iter().enumerate() {
                let cell = row.get(position).cloned().flatten();
                if let Some(builder) = builders.get_mut(name) {
                    builder.push(cell);
                }
            }
            // Columns introduced by other sheets stay null for this row.
            for name in &order {
                if !names.contains(name) {
                    if let Some(builder) = builders.get_mut(name) {
                        builder.push_null();
                    }
                }
            }
            row_ids.push(index);
            total_rows += 1;
        }
    }

    let columns = order
        .into_iter()
        .filter(|name| !name.starts_with(UNNAMED_MARKER))
        .filter_map(|name| builders.remove(&name))
        .map(ColumnBuilder::finish)
        .collect();
    Table::new(columns, row_ids)
}
