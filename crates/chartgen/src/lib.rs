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

//! Chart generation pipeline: prompt composition, fenced-block extraction
//! and restricted execution of the model's chart code into a Plotly-shaped
//! figure document.

pub mod composer;
pub mod error;
pub mod extractor;
pub mod figure;
pub mod interpreter;

pub use composer::{compose, system_instruction, PREVIEW_ROWS};
pub use error::ExecError;
pub use extractor::{prepare_fragment, Extraction, PLACEHOLDER_COLUMN};
pub use figure::Figure;
pub use interpreter::{Interpreter, FIGURE_BINDING};
