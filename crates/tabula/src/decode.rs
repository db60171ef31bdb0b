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
use base64::engine::general_purpose::STANDARD;
use base64::Engine as _;

/// Decodes an upload payload of the form `data:<mime>;base64,<payload>`.
/// Only the part after the first comma is decoded; the MIME prefix is
/// ignored (format detection relies on the filename alone).
pub fn decode_data_url(contents: &str) -> Result<Vec<u8>, LoadError> {
    let (_prefix, payload) = contents
        .split_once(',')
        .ok_or(LoadError::MissingPayloadSeparator)?;
    Ok(STANDARD.decode(payload.trim())?)
}
