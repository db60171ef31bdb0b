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

//! Tabular loading: upload decoding, CSV/spreadsheet parsing, sheet
//! flattening, canonical serialization and column profiling.

pub mod builder;
pub mod decode;
pub mod error;
pub mod loader;
pub mod profile;
pub mod sheet;
pub mod table;

pub use builder::{CellScalar, ColumnBuilder};
pub use decode::decode_data_url;
pub use error::LoadError;
pub use loader::{load_table, SourceFormat, UNNAMED_MARKER};
pub use profile::{
    describe_profiles, profile_table, ColumnProfile, NumericSummary, ProfilingConfig, SemanticType,
};
pub use sheet::RawSheet;
pub use table::{Column, ColumnValues, Table, TablePreview};
