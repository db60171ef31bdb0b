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

//! The presentation adapter: maps pipeline outcomes onto the notices and
//! payloads the page displays. Selection only, no business logic. Gateway
//! and execution failures collapse into one generic retry notice here;
//! their distinct kinds go to the log sink alone.

use axum::http::StatusCode;
use chartgen::Figure;
use serde::Serialize;
use tabula::{LoadError, TablePreview};

pub const UPLOAD_SUCCESS_NOTICE: &str = "File uploaded and processed successfully.";
pub const UNSUPPORTED_FORMAT_NOTICE: &str =
    "Unsupported file format. Please upload a CSV or Excel file.";
pub const PARSE_ERROR_NOTICE: &str = "There was an error processing this file.";
pub const NO_DATASET_NOTICE: &str =
    "No data available to generate the graph. Upload a dataset first.";
pub const RETRY_NOTICE: &str = "The chart could not be generated. Please try again.";

#[derive(Debug, Serialize)]
pub struct UploadResponse {
    pub notice: String,
    pub source_name: String,
    pub row_count: usize,
    pub preview: TablePreview,
    /// The browser-reported modification timestamp, echoed back for the
    /// status line.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_modified: Option<i64>,
}

#[derive(Debug, Serialize)]
pub struct GenerateResponse {
    /// The figure document, when the model's code executed.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub figure: Option<Figure>,
    /// Explanatory text, when the response carried no code block.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub content: Option<String>,
    /// Transient toast, on success and failure alike.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub notice: Option<String>,
}

impl GenerateResponse {
    pub fn figure(figure: Figure) -> Self {
        Self {
            figure: Some(figure),
            content: None,
            notice: None,
        }
    }

    pub fn narrative(content: String) -> Self {
        Self {
            figure: None,
            content: Some(content),
            notice: None,
        }
    }

    pub fn retry() -> Self {
        Self {
            figure: None,
            content: None,
            notice: Some(RETRY_NOTICE.to_string()),
        }
    }
}

#[derive(Debug, Serialize)]
pub struct ErrorNotice {
    pub kind: &'static str,
    pub notice: String,
}

/// Upload failures keep their two user-facing shapes: wrong kind of file,
/// or a file that would not parse.
pub fn upload_failure(error: &LoadError) -> (StatusCode, ErrorNotice) {
    if error.is_unsupported_format() {
        (
            StatusCode::UNSUPPORTED_MEDIA_TYPE,
            ErrorNotice {
                kind: "unsupported_format",
                notice: UNSUPPORTED_FORMAT_NOTICE.to_string(),
            },
        )
    } else {
        (
            StatusCode::UNPROCESSABLE_ENTITY,
            ErrorNotice {
                kind: "parse_error",
                notice: PARSE_ERROR_NOTICE.to_string(),
            },
        )
    }
}

pub fn no_dataset() -> (StatusCode, ErrorNotice) {
    (
        StatusCode::CONFLICT,
        ErrorNotice {
            kind: "no_dataset",
            notice: NO_DATASET_NOTICE.to_string(),
        },
    )
}
