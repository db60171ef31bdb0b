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

use crate::builder::CellScalar;
use crate::error::LoadError;
use calamine::{open_workbook_auto_from_rs, Data, Reader};
use std::io::Cursor;
use tracing::debug;

/// One worksheet, read but not yet typed: the first populated row is taken
/// as the header, everything below it as data.
#[derive(Debug, Clone)]
pub struct RawSheet {
    pub name: String,
    pub header: Vec<String>,
    pub rows: Vec<Vec<Option<CellScalar>>>,
}

/// Reads every sheet of a workbook held in memory. Sheets with no used
/// range are skipped; format detection is calamine's (xls, xlsx, xlsm,
/// xlsb, ods).
pub fn read_workbook(bytes: &[u8]) -> Result<Vec<RawSheet>, LoadError> {
    let cursor = Cursor::new(bytes.to_vec());
    let mut workbook = open_workbook_auto_from_rs(cursor)?;

    let mut sheets = Vec::new();
    for name in workbook.sheet_names().to_owned() {
        let range = workbook.worksheet_range(&name)?;
        let mut rows = range.rows();
        let Some(header_row) = rows.next() else {
            debug!(sheet = %name, "skipping empty sheet");
            continue;
        };
        let header = header_row.iter().map(header_name).collect();
        let data_rows = rows
            .map(|row| row.iter().map(cell_to_scalar).collect())
            .collect();
        sheets.push(RawSheet {
            name,
            header,
            rows: data_rows,
        });
    }
    Ok(sheets)
}

fn header_name(cell: &Data) -> String {
    match cell_to_scalar(cell) {
        Some(CellScalar::Text(s)) => s.trim().to_string(),
        Some(CellScalar::Int(n)) => n.to_string(),
        Some(CellScalar::Float(n)) => n.to_string(),
        Some(CellScalar::Bool(b)) => b.to_string(),
        None => String::new(),
    }
}

fn cell_to_scalar(cell: &Data) -> Option<CellScalar> {
    match cell {
        Data::Empty | Data::Error(_) => None,
        Data::Int(n) => Some(CellScalar::Int(*n)),
        Data::Float(n) => Some(CellScalar::Float(*n)),
        Data::Bool(b) => Some(CellScalar::Bool(*b)),
        Data::String(s) => {
            if s.trim().is_empty() {
                None
            } else {
                Some(CellScalar::Text(s.clone()))
            }
        }
        Data::DateTime(dt) => dt
            .as_datetime()
            .map(|naive| CellScalar::Text(naive.format("%Y-%m-%d %H:%M:%S").to_string())),
        Data::DateTimeIso(s) | Data::DurationIso(s) => Some(CellScalar::Text(s.clone())),
    }
}
