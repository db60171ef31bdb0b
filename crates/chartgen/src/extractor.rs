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

use once_cell::sync::Lazy;
use regex::Regex;

/// Generic column token the model is expected to use when it does not
/// commit to a concrete column. Replaced textually with the real column
/// names; a heuristic, not a guarantee - it only maps unambiguously when
/// the token occurs exactly once.
pub const PLACEHOLDER_COLUMN: &str = "Column1";

/// First fenced block, optional language tag on the opening fence.
static FENCED_BLOCK: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?s)```(?:[A-Za-z0-9_+-]*\n)?(.*?)```").expect("fenced block pattern")
});

/// A line that is exactly the display call, modulo surrounding whitespace.
/// The call is meaningless in headless execution and is stripped before
/// the fragment reaches the interpreter.
static SHOW_LINE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?m)^\s*fig\.show\(\)\s*$").expect("show line pattern"));

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Extraction {
    /// An executable fragment, cleaned and with the placeholder column
    /// substituted.
    Code(String),
    /// No fenced block was present; the raw response is surfaced verbatim
    /// as explanatory content instead of a chart.
    Narrative(String),
}

/// Runs the full extraction pipeline over a raw model response.
pub fn prepare_fragment(response: &str, columns: &[String]) -> Extraction {
    match extract_code_block(response) {
        Some(block) => {
            let cleaned = strip_show_calls(&block);
            Extraction::Code(substitute_placeholder(&cleaned, columns))
        }
        None => Extraction::Narrative(response.to_string()),
    }
}

fn extract_code_block(response: &str) -> Option<String> {
    FENCED_BLOCK
        .captures(response)
        .map(|captures| captures[1].trim().to_string())
}

fn strip_show_calls(code: &str) -> String {
    SHOW_LINE.replace_all(code, "").into_owned()
}

/// Replaces every occurrence of the placeholder token with each column name
/// in turn. Kept as plain textual find/replace for behavioural parity: the
/// first pass consumes every occurrence, so with several real columns the
/// first one wins.
fn substitute_placeholder(code: &str, columns: &[String]) -> String {
    let mut substituted = code.to_string();
    for column in columns {
        substituted = substituted.replace(PLACEHOLDER_COLUMN, column);
    }
    substituted
}

#[cfg(test)]
mod tests {
    use super::*;

    fn columns(names: &[&str]) -> Vec<String> {
        names.iter().map(|n| n.to_string()).collect()
    }

    #[test]
    fn finds_a_tagged_fenced_block() {
        let response = "Here you go:\n```python\nfig = px.bar(df, x=\"a\", y=\"b\")\n```\nEnjoy!";
        let Extraction::Code(code) = prepare_fragment(response, &columns(&["a", "b"])) else {
            panic!("expected code");
        };
        assert_eq!(code, "fig = px.bar(df, x=\"a\", y=\"b\")");
    }

    #[test]
    fn finds_an_untagged_fenced_block() {
        let response = "```\nfig = px.line(df, x=\"a\", y=\"b\")\n```";
        assert!(matches!(
            prepare_fragment(response, &columns(&["a", "b"])),
            Extraction::Code(_)
        ));
    }

    #[test]
    fn no_block_surfaces_the_raw_response() {
        let response = "I cannot draw that chart from these columns.";
        assert_eq!(
            prepare_fragment(response, &columns(&["a"])),
            Extraction::Narrative(response.to_string())
        );
    }

    #[test]
    fn show_lines_are_stripped() {
        let response = "```\nfig = px.bar(df, x=\"a\", y=\"b\")\n  fig.show()  \n```";
        let Extraction::Code(code) = prepare_fragment(response, &columns(&["a", "b"])) else {
            panic!("expected code");
        };
        assert!(!code.contains("fig.show()"));
        assert!(code.contains("px.bar"));
    }

    #[test]
    fn inline_show_calls_survive_the_line_anchor() {
        let code = "captured = fig.show()";
        assert_eq!(strip_show_calls(code), code);
    }

    #[test]
    fn single_placeholder_occurrence_becomes_the_first_column() {
        let response = "```\nfig = px.histogram(df, x=\"Column1\")\n```";
        let Extraction::Code(code) = prepare_fragment(response, &columns(&["age", "height"]))
        else {
            panic!("expected code");
        };
        assert_eq!(code, "fig = px.histogram(df, x=\"age\")");
        assert!(!code.contains(PLACEHOLDER_COLUMN));
    }

    #[test]
    fn only_the_first_fenced_block_is_used() {
        let response = "```\nfig = px.bar(df, x=\"a\", y=\"b\")\n```\ntext\n```\nfig = px.pie(df)\n```";
        let Extraction::Code(code) = prepare_fragment(response, &columns(&["a", "b"])) else {
            panic!("expected code");
        };
        assert!(code.contains("px.bar"));
        assert!(!code.contains("px.pie"));
    }
}
