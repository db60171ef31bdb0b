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

use crate::table::{Column, ColumnValues, Table};
use chrono::NaiveDate;
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::fmt::Write as _;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub enum SemanticType {
    Numeric,
    Categorical,
    Temporal,
}

#[derive(Debug, Clone)]
pub struct ProfilingConfig {
    pub max_sample_values: usize,
    pub type_confidence_threshold: f64,
    pub temporal_formats: Vec<String>,
}

impl Default for ProfilingConfig {
    fn default() -> Self {
        Self {
            max_sample_values: 5,
            type_confidence_threshold: 0.8,
            temporal_formats: vec![
                "%Y-%m-%d".to_string(),
                "%Y-%m-%d %H:%M:%S".to_string(),
                "%Y-%m-%dT%H:%M:%S".to_string(),
                "%m/%d/%Y".to_string(),
                "%d/%m/%Y".to_string(),
                "%Y%m%d".to_string(),
            ],
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ColumnProfile {
    pub name: String,
    pub semantic_type: SemanticType,
    pub total_count: usize,
    pub null_count: usize,
    pub null_percentage: f64,
    pub cardinality: Option<usize>,
    pub sample_values: Vec<String>,
    pub numeric: Option<NumericSummary>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NumericSummary {
    pub min: Option<f64>,
    pub max: Option<f64>,
    pub mean: Option<f64>,
}

/// Profiles every column, column-parallel. The result feeds the prompt's
/// data context, so it stays deliberately small: semantic type, null share,
/// cardinality, a few samples and basic numeric bounds.
pub fn profile_table(table: &Table, config: &ProfilingConfig) -> Vec<ColumnProfile> {
    table
        .columns()
        .par_iter()
        .map(|column| profile_column(column, table.row_count(), config))
        .collect()
}

fn profile_column(column: &Column, total_rows: usize, config: &ProfilingConfig) -> ColumnProfile {
    let null_count = column.values.null_count();
    let null_percentage = if total_rows > 0 {
        null_count as f64 / total_rows as f64
    } else {
        0.0
    };

    let semantic_type = detect_semantic_type(&column.values, config);
    let numeric = if semantic_type == SemanticType::Numeric {
        Some(numeric_summary(&column.values))
    } else {
        None
    };
    let cardinality = if semantic_type == SemanticType::Categorical {
        Some(distinct_count(&column.values))
    } else {
        None
    };

    ColumnProfile {
        name: column.name.clone(),
        semantic_type,
        total_count: total_rows,
        null_count,
        null_percentage,
        cardinality,
        sample_values: sample_values(&column.values, config.max_sample_values),
        numeric,
    }
}

fn detect_semantic_type(values: &ColumnValues, config: &ProfilingConfig) -> SemanticType {
    if values.is_numeric() {
        return SemanticType::Numeric;
    }
    if let ColumnValues::Text(cells) = values {
        let non_null: Vec<&String> = cells.iter().flatten().collect();
        if non_null.is_empty() {
            return SemanticType::Categorical;
        }
        let parsed = non_null
            .iter()
            .filter(|cell| parses_as_date(cell, &config.temporal_formats))
            .count();
        if parsed as f64 / non_null.len() as f64 >= config.type_confidence_threshold {
            return SemanticType::Temporal;
        }
    }
    SemanticType::Categorical
}

fn parses_as_date(value: &str, formats: &[String]) -> bool {
    let trimmed = value.trim();
    formats
        .iter()
        .any(|format| NaiveDate::parse_from_str(trimmed, format).is_ok())
        || trimmed.parse::<chrono::NaiveDateTime>().is_ok()
}

fn numeric_summary(values: &ColumnValues) -> NumericSummary {
    let numbers: Vec<f64> = (0..values.len()).filter_map(|i| values.to_f64(i)).collect();
    if numbers.is_empty() {
        return NumericSummary {
            min: None,
            max: None,
            mean: None,
        };
    }
    let min = numbers.iter().copied().fold(f64::INFINITY, f64::min);
    let max = numbers.iter().copied().fold(f64::NEG_INFINITY, f64::max);
    let mean = numbers.iter().sum::<f64>() / numbers.len() as f64;
    NumericSummary {
        min: Some(min),
        max: Some(max),
        mean: Some(mean),
    }
}

fn distinct_count(values: &ColumnValues) -> usize {
    let mut seen = HashSet::new();
    for index in 0..values.len() {
        if let Some(value) = values.get_string(index) {
            seen.insert(value);
        }
    }
    seen.len()
}

fn sample_values(values: &ColumnValues, limit: usize) -> Vec<String> {
    let mut seen = HashSet::new();
    let mut samples = Vec::new();
    for index in 0..values.len() {
        if samples.len() == limit {
            break;
        }
        if let Some(value) = values.get_string(index) {
            if seen.insert(value.clone()) {
                samples.push(value);
            }
        }
    }
    samples
}

/// Renders profiles as the column summary block of the prompt's data
/// context.
pub fn describe_profiles(profiles: &[ColumnProfile]) -> String {
    let mut out = String::new();
    for profile in profiles {
        let _ = write!(out, "- {} (", profile.name);
        match profile.semantic_type {
            SemanticType::Numeric => {
                let _ = write!(out, "numeric");
                if let Some(numeric) = &profile.numeric {
                    if let (Some(min), Some(max)) = (numeric.min, numeric.max) {
                        let _ = write!(out, ", range {min} to {max}");
                    }
                }
            }
            SemanticType::Categorical => {
                let _ = write!(out, "categorical");
                if let Some(cardinality) = profile.cardinality {
                    let _ = write!(out, ", {cardinality} distinct");
                }
            }
            SemanticType::Temporal => {
                let _ = write!(out, "temporal");
            }
        }
        if profile.null_count > 0 {
            let _ = write!(out, ", {} null", profile.null_count);
        }
        let _ = out.write_str(")");
        if !profile.sample_values.is_empty() {
            let _ = write!(out, ": e.g. {}", profile.sample_values.join(", "));
        }
        out.push('\n');
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::table::Table;

    fn table() -> Table {
        Table::new(
            vec![
                Column {
                    name: "day".into(),
                    values: ColumnValues::Text(vec![
                        Some("2024-01-01".into()),
                        Some("2024-01-02".into()),
                        Some("2024-01-03".into()),
                    ]),
                },
                Column {
                    name: "visits".into(),
                    values: ColumnValues::Int64(vec![Some(10), Some(30), None]),
                },
                Column {
                    name: "channel".into(),
                    values: ColumnValues::Text(vec![
                        Some("web".into()),
                        Some("app".into()),
                        Some("web".into()),
                    ]),
                },
            ],
            vec![0, 1, 2],
        )
        .unwrap()
    }

    #[test]
    fn semantic_types_are_detected() {
        let profiles = profile_table(&table(), &ProfilingConfig::default());
        assert_eq!(profiles[0].semantic_type, SemanticType::Temporal);
        assert_eq!(profiles[1].semantic_type, SemanticType::Numeric);
        assert_eq!(profiles[2].semantic_type, SemanticType::Categorical);
    }

    #[test]
    fn numeric_summary_ignores_nulls() {
        let profiles = profile_table(&table(), &ProfilingConfig::default());
        let numeric = profiles[1].numeric.as_ref().unwrap();
        assert_eq!(numeric.min, Some(10.0));
        assert_eq!(numeric.max, Some(30.0));
        assert_eq!(numeric.mean, Some(20.0));
        assert_eq!(profiles[1].null_count, 1);
    }

    #[test]
    fn categorical_cardinality_counts_distinct_values() {
        let profiles = profile_table(&table(), &ProfilingConfig::default());
        assert_eq!(profiles[2].cardinality, Some(2));
        assert_eq!(profiles[2].sample_values, vec!["web", "app"]);
    }

    #[test]
    fn description_mentions_every_column() {
        let profiles = profile_table(&table(), &ProfilingConfig::default());
        let text = describe_profiles(&profiles);
        assert!(text.contains("- day (temporal)"));
        assert!(text.contains("- visits (numeric, range 10 to 30, 1 null)"));
        assert!(text.contains("- channel (categorical, 2 distinct)"));
    }
}
