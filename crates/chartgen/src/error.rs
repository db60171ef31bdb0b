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

/// Execution failures of the restricted interpreter. All of them are fatal
/// to the request and collapse into the generic retry notice at the
/// presentation boundary; the distinct kinds exist for the log sink.
#[derive(Debug, Error)]
pub enum ExecError {
    #[error("Syntax error in generated code: {0}")]
    Parse(String),

    #[error("Import of '{0}' is not permitted")]
    ForbiddenImport(String),

    #[error("Unknown function: {0}")]
    UnknownFunction(String),

    #[error("Unknown chart type: {0}")]
    UnknownChart(String),

    #[error("Unknown name: {0}")]
    UnknownBinding(String),

    #[error("Unsupported construct: {0}")]
    UnsupportedConstruct(String),

    #[error("Column '{0}' does not exist in the loaded table")]
    UnknownColumn(String),

    #[error("Chart '{chart}' does not accept argument '{arg}'")]
    UnknownArgument { chart: String, arg: String },

    #[error("Chart '{chart}' is missing required argument '{arg}'")]
    MissingArgument { chart: String, arg: String },

    #[error("Column '{column}' has too many distinct values to colour by ({cardinality})")]
    ExcessiveCardinality { column: String, cardinality: usize },

    #[error("Cannot read '{0}': only the uploaded dataset is available")]
    UnknownSource(String),

    #[error("Generated code did not bind the expected 'fig' variable")]
    MissingFigure,
}
