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

use thiserror::Error;

#[derive(Debug, Error)]
pub enum LoadError {
    #[error("Unsupported file format: '{name}'")]
    UnsupportedFormat { name: String },

    #[error("Upload payload is missing the base64 content separator")]
    MissingPayloadSeparator,

    #[error("Base64 decode failed: {0}")]
    Decode(#[from] base64::DecodeError),

    #[error("File is not valid UTF-8: {0}")]
    Utf8(#[from] std::str::Utf8Error),

    #[error("CSV parse error: {0}")]
    Csv(#[from] csv::Error),

    #[error("Spreadsheet parse error: {0}")]
    Spreadsheet(#[from] calamine::Error),

    #[error("Duplicate column name: '{0}'")]
    DuplicateColumn(String),

    #[error("Missing header row")]
    MissingHeaderRow,

    #[error("Column '{name}' has {actual} rows, expected {expected}")]
    LengthMismatch {
        name: String,
        expected: usize,
        actual: usize,
    },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl LoadError {
    /// True for the "wrong kind of file" failure, which gets its own user
    /// notice; everything else is presented as a parse failure.
    pub fn is_unsupported_format(&self) -> bool {
        matches!(self, LoadError::UnsupportedFormat { .. })
    }
}
