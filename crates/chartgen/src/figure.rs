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

use crate::error::ExecError;
use serde::Serialize;
use serde_json::{json, Map, Value};
use std::collections::BTreeMap;
use tabula::Table;

/// Colour grouping above this many distinct values produces an unreadable
/// chart and an unbounded trace count, so it is refused.
const MAX_COLOUR_GROUPS: usize = 50;

/// A Plotly-shaped figure document: `data` traces plus a `layout`. This is
/// the chart object handed to the presentation layer; the page renders it
/// with `Plotly.newPlot(figure.data, figure.layout)`.
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct Figure {
    pub data: Vec<Value>,
    pub layout: Value,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum ChartKind {
    Bar,
    Line,
    Scatter,
    Area,
    Histogram,
    Box,
    Pie,
}

impl ChartKind {
    pub(crate) fn from_name(name: &str) -> Option<Self> {
        match name {
            "bar" => Some(ChartKind::Bar),
            "line" => Some(ChartKind::Line),
            "scatter" => Some(ChartKind::Scatter),
            "area" => Some(ChartKind::Area),
            "histogram" => Some(ChartKind::Histogram),
            "box" => Some(ChartKind::Box),
            "pie" => Some(ChartKind::Pie),
            _ => None,
        }
    }

    fn name(self) -> &'static str {
        match self {
            ChartKind::Bar => "bar",
            ChartKind::Line => "line",
            ChartKind::Scatter => "scatter",
            ChartKind::Area => "area",
            ChartKind::Histogram => "histogram",
            ChartKind::Box => "box",
            ChartKind::Pie => "pie",
        }
    }
}

/// Typed keyword arguments of one chart constructor call, already reduced
/// from the parsed fragment.
#[derive(Debug, Default, Clone)]
pub(crate) struct ChartArgs {
    pub x: Option<String>,
    pub y: Vec<String>,
    pub color: Option<String>,
    pub names: Option<String>,
    pub values: Option<String>,
    pub title: Option<String>,
    pub nbins: Option<i64>,
    pub orientation: Option<String>,
    pub labels: BTreeMap<String, String>,
}

impl ChartArgs {
    /// Every argument that names a column of the loaded table.
    fn referenced_columns(&self) -> Vec<&String> {
        let mut columns: Vec<&String> = Vec::new();
        columns.extend(self.x.iter());
        columns.extend(self.y.iter());
        columns.extend(self.color.iter());
        columns.extend(self.names.iter());
        columns.extend(self.values.iter());
        columns
    }

    fn label_for<'a>(&'a self, column: &'a str) -> &'a str {
        self.labels.get(column).map_or(column, String::as_str)
    }
}

/// Builds the figure for one chart constructor call. Every referenced
/// column is checked against the table before any trace is assembled, so a
/// hallucinated column name fails here rather than rendering an empty
/// chart.
pub(crate) fn build_chart(
    kind: ChartKind,
    table: &Table,
    args: &ChartArgs,
) -> Result<Figure, ExecError> {
    for column in args.referenced_columns() {
        if !table.has_column(column) {
            return Err(ExecError::UnknownColumn(column.clone()));
        }
    }

    let traces = match kind {
        ChartKind::Pie => build_pie(table, args)?,
        ChartKind::Histogram => build_histogram(table, args)?,
        ChartKind::Box => build_box(table, args)?,
        ChartKind::Bar | ChartKind::Line | ChartKind::Scatter | ChartKind::Area => {
            build_cartesian(kind, table, args)?
        }
    };

    Ok(Figure {
        layout: build_layout(kind, args, traces.len()),
        data: traces,
    })
}

fn require<'a>(
    value: Option<&'a String>,
    kind: ChartKind,
    arg: &str,
) -> Result<&'a String, ExecError> {
    value.ok_or_else(|| ExecError::MissingArgument {
        chart: kind.name().to_string(),
        arg: arg.to_string(),
    })
}

fn column_values(table: &Table, name: &str) -> Vec<Value> {
    table
        .column(name)
        .map(tabula::Column::json_values)
        .unwrap_or_default()
}

fn build_cartesian(
    kind: ChartKind,
    table: &Table,
    args: &ChartArgs,
) -> Result<Vec<Value>, ExecError> {
    let x_name = require(args.x.as_ref(), kind, "x")?;
    if args.y.is_empty() {
        return Err(ExecError::MissingArgument {
            chart: kind.name().to_string(),
            arg: "y".to_string(),
        });
    }

    if let Some(color) = &args.color {
        if args.y.len() > 1 {
            return Err(ExecError::UnsupportedConstruct(
                "color grouping combined with multiple y columns".to_string(),
            ));
        }
        return build_grouped(kind, table, args, x_name, &args.y[0], color);
    }

    let xs = column_values(table, x_name);
    let traces = args
        .y
        .iter()
        .map(|y_name| trace_for(kind, args, xs.clone(), column_values(table, y_name), y_name))
        .collect();
    Ok(traces)
}

fn build_grouped(
    kind: ChartKind,
    table: &Table,
    args: &ChartArgs,
    x_name: &str,
    y_name: &str,
    color_name: &str,
) -> Result<Vec<Value>, ExecError> {
    // Partition row indices by the colour column's rendered value,
    // first-seen order.
    let color_column = &table.column(color_name).expect("column checked").values;
    let mut groups: Vec<(String, Vec<usize>)> = Vec::new();
    for row in 0..table.row_count() {
        let key = color_column
            .get_string(row)
            .unwrap_or_else(|| "null".to_string());
        match groups.iter_mut().find(|(name, _)| *name == key) {
            Some((_, rows)) => rows.push(row),
            None => {
                if groups.len() == MAX_COLOUR_GROUPS {
                    return Err(ExecError::ExcessiveCardinality {
                        column: color_name.to_string(),
                        cardinality: groups.len() + 1,
                    });
                }
                groups.push((key, vec![row]));
            }
        }
    }

    let x_column = &table.column(x_name).expect("column checked").values;
    let y_column = &table.column(y_name).expect("column checked").values;
    let traces = groups
        .into_iter()
        .map(|(group, rows)| {
            let xs = rows.iter().map(|&r| x_column.json_value(r)).collect();
            let ys = rows.iter().map(|&r| y_column.json_value(r)).collect();
            trace_for(kind, args, xs, ys, &group)
        })
        .collect();
    Ok(traces)
}

fn trace_for(
    kind: ChartKind,
    args: &ChartArgs,
    xs: Vec<Value>,
    ys: Vec<Value>,
    name: &str,
) -> Value {
    let horizontal = args.orientation.as_deref() == Some("h");
    let (xs, ys) = if horizontal { (ys, xs) } else { (xs, ys) };
    let mut trace = Map::new();
    trace.insert("name".to_string(), json!(name));
    trace.insert("x".to_string(), Value::Array(xs));
    trace.insert("y".to_string(), Value::Array(ys));
    match kind {
        ChartKind::Bar => {
            trace.insert("type".to_string(), json!("bar"));
            if horizontal {
                trace.insert("orientation".to_string(), json!("h"));
            }
        }
        ChartKind::Line => {
            trace.insert("type".to_string(), json!("scatter"));
            trace.insert("mode".to_string(), json!("lines"));
        }
        ChartKind::Scatter => {
            trace.insert("type".to_string(), json!("scatter"));
            trace.insert("mode".to_string(), json!("markers"));
        }
        ChartKind::Area => {
            trace.insert("type".to_string(), json!("scatter"));
            trace.insert("mode".to_string(), json!("lines"));
            trace.insert("fill".to_string(), json!("tozeroy"));
        }
        ChartKind::Histogram | ChartKind::Box | ChartKind::Pie => {
            unreachable!("handled by dedicated builders")
        }
    }
    Value::Object(trace)
}

fn build_histogram(table: &Table, args: &ChartArgs) -> Result<Vec<Value>, ExecError> {
    let column = match (&args.x, args.y.first()) {
        (Some(x), _) => x,
        (None, Some(y)) => y,
        (None, None) => {
            return Err(ExecError::MissingArgument {
                chart: "histogram".to_string(),
                arg: "x".to_string(),
            })
        }
    };
    let mut trace = json!({
        "type": "histogram",
        "name": column,
        "x": column_values(table, column),
    });
    if let Some(nbins) = args.nbins {
        trace["nbinsx"] = json!(nbins);
    }
    Ok(vec![trace])
}

fn build_box(table: &Table, args: &ChartArgs) -> Result<Vec<Value>, ExecError> {
    if args.y.is_empty() {
        return Err(ExecError::MissingArgument {
            chart: "box".to_string(),
            arg: "y".to_string(),
        });
    }
    let traces = args
        .y
        .iter()
        .map(|y_name| {
            let mut trace = json!({
                "type": "box",
                "name": y_name,
                "y": column_values(table, y_name),
            });
            if let Some(x_name) = &args.x {
                trace["x"] = Value::Array(column_values(table, x_name));
            }
            trace
        })
        .collect();
    Ok(traces)
}

fn build_pie(table: &Table, args: &ChartArgs) -> Result<Vec<Value>, ExecError> {
    let names = require(args.names.as_ref(), ChartKind::Pie, "names")?;
    let values = require(args.values.as_ref(), ChartKind::Pie, "values")?;
    Ok(vec![json!({
        "type": "pie",
        "labels": column_values(table, names),
        "values": column_values(table, values),
    })])
}

fn build_layout(kind: ChartKind, args: &ChartArgs, trace_count: usize) -> Value {
    let mut layout = Map::new();
    if let Some(title) = &args.title {
        layout.insert("title".to_string(), json!({ "text": title }));
    }
    if kind != ChartKind::Pie {
        let horizontal = args.orientation.as_deref() == Some("h");
        let (x_label, y_label) = if horizontal {
            (args.y.first().map(String::as_str), args.x.as_deref())
        } else {
            (args.x.as_deref(), args.y.first().map(String::as_str))
        };
        if let Some(x_label) = x_label {
            layout.insert(
                "xaxis".to_string(),
                json!({ "title": { "text": args.label_for(x_label) } }),
            );
        }
        if let Some(y_label) = y_label {
            layout.insert(
                "yaxis".to_string(),
                json!({ "title": { "text": args.label_for(y_label) } }),
            );
        }
    }
    if kind == ChartKind::Bar && trace_count > 1 {
        layout.insert("barmode".to_string(), json!("group"));
    }
    Value::Object(layout)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tabula::{Column, ColumnValues};

    fn table() -> Table {
        Table::new(
            vec![
                Column {
                    name: "city".into(),
                    values: ColumnValues::Text(vec![
                        Some("Leeds".into()),
                        Some("York".into()),
                        Some("Hull".into()),
                    ]),
                },
                Column {
                    name: "population".into(),
                    values: ColumnValues::Int64(vec![Some(793), Some(202), Some(260)]),
                },
                Column {
                    name: "region".into(),
                    values: ColumnValues::Text(vec![
                        Some("west".into()),
                        Some("north".into()),
                        Some("east".into()),
                    ]),
                },
            ],
            vec![0, 1, 2],
        )
        .unwrap()
    }

    fn args() -> ChartArgs {
        ChartArgs {
            x: Some("city".into()),
            y: vec!["population".into()],
            ..ChartArgs::default()
        }
    }

    #[test]
    fn bar_chart_carries_both_columns() {
        let figure = build_chart(ChartKind::Bar, &table(), &args()).unwrap();
        assert_eq!(figure.data.len(), 1);
        assert_eq!(figure.data[0]["type"], json!("bar"));
        assert_eq!(figure.data[0]["x"][0], json!("Leeds"));
        assert_eq!(figure.data[0]["y"][2], json!(260));
    }

    #[test]
    fn unknown_column_is_refused_before_building() {
        let mut bad = args();
        bad.y = vec!["altitude".into()];
        let err = build_chart(ChartKind::Bar, &table(), &bad).unwrap_err();
        assert!(matches!(err, ExecError::UnknownColumn(name) if name == "altitude"));
    }

    #[test]
    fn colour_grouping_splits_traces() {
        let mut grouped = args();
        grouped.color = Some("region".into());
        let figure = build_chart(ChartKind::Bar, &table(), &grouped).unwrap();
        assert_eq!(figure.data.len(), 3);
        assert_eq!(figure.data[0]["name"], json!("west"));
        assert_eq!(figure.layout["barmode"], json!("group"));
    }

    #[test]
    fn horizontal_orientation_swaps_axes() {
        let mut horizontal = args();
        horizontal.orientation = Some("h".into());
        let figure = build_chart(ChartKind::Bar, &table(), &horizontal).unwrap();
        assert_eq!(figure.data[0]["y"][0], json!("Leeds"));
        assert_eq!(figure.data[0]["orientation"], json!("h"));
        assert_eq!(figure.layout["xaxis"]["title"]["text"], json!("population"));
    }

    #[test]
    fn pie_requires_names_and_values() {
        let err = build_chart(ChartKind::Pie, &table(), &args()).unwrap_err();
        assert!(matches!(err, ExecError::MissingArgument { .. }));

        let pie = ChartArgs {
            names: Some("city".into()),
            values: Some("population".into()),
            ..ChartArgs::default()
        };
        let figure = build_chart(ChartKind::Pie, &table(), &pie).unwrap();
        assert_eq!(figure.data[0]["labels"][1], json!("York"));
    }

    #[test]
    fn labels_rename_axis_titles() {
        let mut labelled = args();
        labelled
            .labels
            .insert("city".into(), "City of residence".into());
        let figure = build_chart(ChartKind::Bar, &table(), &labelled).unwrap();
        assert_eq!(
            figure.layout["xaxis"]["title"]["text"],
            json!("City of residence")
        );
    }

    #[test]
    fn line_chart_renders_as_scatter_with_lines() {
        let figure = build_chart(ChartKind::Line, &table(), &args()).unwrap();
        assert_eq!(figure.data[0]["type"], json!("scatter"));
        assert_eq!(figure.data[0]["mode"], json!("lines"));
    }
}
