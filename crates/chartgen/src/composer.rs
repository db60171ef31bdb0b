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

use chart_contracts::GenerationRequest;
use tabula::{describe_profiles, ColumnProfile};

/// Rows of the canonical serialization shown to the model.
pub const PREVIEW_ROWS: usize = 5;

/// The fixed system instruction. One substitution point: the source
/// filename. The serialized data never gets spliced into this string; it
/// travels in the request's data context.
pub fn system_instruction(source_name: &str) -> String {
    format!(
        "You are a data visualisation expert and you use your favourite graphing \
         library Plotly exclusively. Suppose the data is provided as a file named \
         '{source_name}'. Reply with exactly one fenced code block that builds the \
         requested chart using px.<chart>(...) keyword calls on the columns of that \
         file and assigns the result to a variable named fig. \
         Follow the user's indications when creating the graph."
    )
}

/// Pure composition of one generation request from the loaded dataset and
/// the user's free text. No I/O, no side effects.
pub fn compose(
    source_name: &str,
    serialization: &str,
    profiles: &[ColumnProfile],
    user_text: &str,
) -> GenerationRequest {
    let head: Vec<&str> = serialization.lines().take(PREVIEW_ROWS + 1).collect();
    let data_context = format!(
        "First rows of {source_name}:\n{}\n\nColumns:\n{}",
        head.join("\n"),
        describe_profiles(profiles)
    );
    GenerationRequest::new(
        system_instruction(source_name),
        data_context,
        user_text.to_string(),
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn instruction_substitutes_the_filename_once() {
        let instruction = system_instruction("sales.xlsx");
        assert_eq!(instruction.matches("sales.xlsx").count(), 1);
        assert!(instruction.contains("Plotly"));
        assert!(instruction.contains("fig"));
    }

    #[test]
    fn data_context_is_separate_from_the_instruction() {
        let serialization = "a,b\n1,2\n3,4\n5,6\n7,8\n9,10\n11,12\n13,14\n";
        let request = compose("data.csv", serialization, &[], "plot a against b");
        assert!(!request.system_instruction.contains("1,2"));
        assert!(request.data_context.contains("a,b"));
        assert!(request.data_context.contains("9,10"));
        // Only the header plus PREVIEW_ROWS data rows are carried.
        assert!(!request.data_context.contains("11,12"));
        assert_eq!(request.user_text, "plot a against b");
    }
}
