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

//! Restricted execution of extracted chart code. The namespace starts with
//! exactly the two module bindings the system instruction promises (`px`,
//! `pd`) plus the loaded table as `df`; nothing else is reachable, so a
//! hostile response cannot touch the process, the filesystem or the
//! network.

pub mod parser;

use crate::error::ExecError;
use crate::figure::{build_chart, ChartArgs, ChartKind, Figure};
use parser::{CallExpr, Expr, PyValue, Stmt};
use serde_json::{json, Value};
use std::collections::HashMap;
use tabula::Table;
use tracing::debug;

/// The namespace variable the executed fragment must bind.
pub const FIGURE_BINDING: &str = "fig";

#[derive(Debug, Clone)]
enum Binding {
    ChartModule,
    DataModule,
    Frame,
    Figure(Figure),
    Value(PyValue),
}

pub struct Interpreter<'a> {
    table: &'a Table,
    source_name: &'a str,
}

impl<'a> Interpreter<'a> {
    pub fn new(table: &'a Table, source_name: &'a str) -> Self {
        Self { table, source_name }
    }

    /// Runs the fragment and retrieves the bound figure. Failure anywhere
    /// is fatal to the request; no partial figure escapes.
    pub fn execute(&self, fragment: &str) -> Result<Figure, ExecError> {
        let statements = parser::parse(fragment)?;

        let mut namespace: HashMap<String, Binding> = HashMap::from([
            ("px".to_string(), Binding::ChartModule),
            ("pd".to_string(), Binding::DataModule),
            ("df".to_string(), Binding::Frame),
        ]);

        for statement in statements {
            match statement {
                Stmt::Import { module, alias } => {
                    bind_import(&mut namespace, &module, alias)?;
                }
                Stmt::Assign { name, expr } => {
                    let value = self.eval(&mut namespace, &expr)?;
                    namespace.insert(name, value);
                }
                Stmt::Expr(expr) => {
                    self.eval(&mut namespace, &expr)?;
                }
            }
        }

        match namespace.remove(FIGURE_BINDING) {
            Some(Binding::Figure(figure)) => Ok(figure),
            _ => Err(ExecError::MissingFigure),
        }
    }

    fn eval(
        &self,
        namespace: &mut HashMap<String, Binding>,
        expr: &Expr,
    ) -> Result<Binding, ExecError> {
        match expr {
            Expr::Value(value) => Ok(Binding::Value(value.clone())),
            Expr::Name(path) => match path.as_slice() {
                [name] => namespace
                    .get(name)
                    .cloned()
                    .ok_or_else(|| ExecError::UnknownBinding(name.clone())),
                _ => Err(ExecError::UnsupportedConstruct(format!(
                    "attribute reference '{}'",
                    path.join(".")
                ))),
            },
            Expr::Call(call) => self.eval_call(namespace, call),
        }
    }

    fn eval_call(
        &self,
        namespace: &mut HashMap<String, Binding>,
        call: &CallExpr,
    ) -> Result<Binding, ExecError> {
        let (head, rest) = resolve_head(namespace, &call.path)?;
        match head {
            Head::Chart => {
                let [chart_name] = rest else {
                    return Err(ExecError::UnknownFunction(call.path.join(".")));
                };
                let kind = ChartKind::from_name(chart_name)
                    .ok_or_else(|| ExecError::UnknownChart(chart_name.clone()))?;
                let args = self.reduce_chart_args(namespace, chart_name, call)?;
                Ok(Binding::Figure(build_chart(kind, self.table, &args)?))
            }
            Head::Data => {
                let [method] = rest else {
                    return Err(ExecError::UnknownFunction(call.path.join(".")));
                };
                match method.as_str() {
                    "read_csv" | "read_excel" => self.read_source(namespace, call),
                    "DataFrame" => Err(ExecError::UnsupportedConstruct(
                        "constructing a new DataFrame".to_string(),
                    )),
                    other => Err(ExecError::UnknownFunction(format!("pd.{other}"))),
                }
            }
            Head::FigureVar(var) => {
                let [method] = rest else {
                    return Err(ExecError::UnknownFunction(call.path.join(".")));
                };
                let method = method.clone();
                let kwargs = self.reduce_json_kwargs(namespace, call)?;
                let Some(Binding::Figure(figure)) = namespace.get_mut(&var) else {
                    return Err(ExecError::UnknownBinding(var));
                };
                apply_figure_method(figure, &method, &kwargs)?;
                Ok(Binding::Figure(figure.clone()))
            }
        }
    }

    /// `pd.read_csv(...)` resolves only the recorded source name back to
    /// the loaded table; there is no filesystem underneath.
    fn read_source(
        &self,
        namespace: &mut HashMap<String, Binding>,
        call: &CallExpr,
    ) -> Result<Binding, ExecError> {
        let Some(first) = call.positional.first() else {
            return Err(ExecError::UnknownSource(String::new()));
        };
        match self.eval(namespace, first)? {
            Binding::Value(PyValue::Str(path)) if path == self.source_name => Ok(Binding::Frame),
            Binding::Value(PyValue::Str(path)) => Err(ExecError::UnknownSource(path)),
            _ => Err(ExecError::UnsupportedConstruct(
                "read_csv expects a string path".to_string(),
            )),
        }
    }

    fn reduce_chart_args(
        &self,
        namespace: &mut HashMap<String, Binding>,
        chart_name: &str,
        call: &CallExpr,
    ) -> Result<ChartArgs, ExecError> {
        let mut args = ChartArgs::default();

        let mut positional = call.positional.iter();
        let mut pending = positional.next();
        if let Some(first) = pending {
            if matches!(self.eval(namespace, first)?, Binding::Frame) {
                pending = positional.next();
            }
        }
        // Positional x and y after the data frame, as plotly-express
        // allows.
        for slot in ["x", "y"] {
            let Some(expr) = pending else { break };
            let Binding::Value(PyValue::Str(column)) = self.eval(namespace, expr)? else {
                return Err(ExecError::UnsupportedConstruct(
                    "positional arguments must be column names".to_string(),
                ));
            };
            match slot {
                "x" => args.x = Some(column),
                _ => args.y.push(column),
            }
            pending = positional.next();
        }
        if pending.is_some() {
            return Err(ExecError::UnsupportedConstruct(
                "too many positional arguments".to_string(),
            ));
        }

        for (name, expr) in &call.keywords {
            let value = match self.eval(namespace, expr)? {
                Binding::Value(value) => value,
                _ => {
                    return Err(ExecError::UnsupportedConstruct(format!(
                        "argument '{name}' must be a literal"
                    )))
                }
            };
            apply_chart_kwarg(&mut args, chart_name, name, value)?;
        }
        Ok(args)
    }

    fn reduce_json_kwargs(
        &self,
        namespace: &mut HashMap<String, Binding>,
        call: &CallExpr,
    ) -> Result<Vec<(String, Value)>, ExecError> {
        let mut kwargs = Vec::with_capacity(call.keywords.len());
        for (name, expr) in &call.keywords {
            let Binding::Value(value) = self.eval(namespace, expr)? else {
                return Err(ExecError::UnsupportedConstruct(format!(
                    "argument '{name}' must be a literal"
                )));
            };
            kwargs.push((name.clone(), py_to_json(&value)));
        }
        Ok(kwargs)
    }
}

enum Head {
    Chart,
    Data,
    FigureVar(String),
}

/// Resolves the leading segment(s) of a dotted path against the namespace.
/// An unaliased `import plotly.express` leaves a two-segment module key, so
/// both one- and two-segment prefixes are tried.
fn resolve_head<'p>(
    namespace: &HashMap<String, Binding>,
    path: &'p [String],
) -> Result<(Head, &'p [String]), ExecError> {
    for prefix_len in [1usize, 2] {
        if path.len() <= prefix_len - 1 {
            break;
        }
        let key = path[..prefix_len].join(".");
        match namespace.get(&key) {
            Some(Binding::ChartModule) => return Ok((Head::Chart, &path[prefix_len..])),
            Some(Binding::DataModule) => return Ok((Head::Data, &path[prefix_len..])),
            Some(Binding::Figure(_)) => return Ok((Head::FigureVar(key), &path[prefix_len..])),
            Some(Binding::Frame | Binding::Value(_)) => {
                return Err(ExecError::UnsupportedConstruct(format!(
                    "method call on '{key}'"
                )))
            }
            None => {}
        }
    }
    Err(ExecError::UnknownBinding(path.join(".")))
}

fn bind_import(
    namespace: &mut HashMap<String, Binding>,
    module: &str,
    alias: Option<String>,
) -> Result<(), ExecError> {
    // The allowlist is exactly the two libraries the system instruction
    // promises; everything else is refused.
    let binding = match module {
        "plotly.express" => Binding::ChartModule,
        "pandas" => Binding::DataModule,
        _ => return Err(ExecError::ForbiddenImport(module.to_string())),
    };
    namespace.insert(alias.unwrap_or_else(|| module.to_string()), binding);
    Ok(())
}

fn apply_chart_kwarg(
    args: &mut ChartArgs,
    chart_name: &str,
    name: &str,
    value: PyValue,
) -> Result<(), ExecError> {
    let unknown = || ExecError::UnknownArgument {
        chart: chart_name.to_string(),
        arg: name.to_string(),
    };
    match name {
        "x" => args.x = Some(expect_str(value, name)?),
        "y" => match value {
            PyValue::Str(column) => args.y.push(column),
            PyValue::List(items) => {
                for item in items {
                    args.y.push(expect_str(item, name)?);
                }
            }
            _ => return Err(unknown()),
        },
        "color" => args.color = Some(expect_str(value, name)?),
        "names" => args.names = Some(expect_str(value, name)?),
        "values" => args.values = Some(expect_str(value, name)?),
        "title" => args.title = Some(expect_str(value, name)?),
        "orientation" => args.orientation = Some(expect_str(value, name)?),
        "nbins" => match value {
            PyValue::Int(n) => args.nbins = Some(n),
            _ => return Err(unknown()),
        },
        "labels" => match value {
            PyValue::Dict(entries) => {
                for (key, entry) in entries {
                    args.labels.insert(key, expect_str(entry, name)?);
                }
            }
            _ => return Err(unknown()),
        },
        _ => return Err(unknown()),
    }
    Ok(())
}

fn expect_str(value: PyValue, argument: &str) -> Result<String, ExecError> {
    match value {
        PyValue::Str(s) => Ok(s),
        other => Err(ExecError::UnsupportedConstruct(format!(
            "argument '{argument}' expects a string, found {other:?}"
        ))),
    }
}

fn apply_figure_method(
    figure: &mut Figure,
    method: &str,
    kwargs: &[(String, Value)],
) -> Result<(), ExecError> {
    match method {
        "update_layout" => {
            for (key, value) in kwargs {
                apply_layout_kwarg(&mut figure.layout, key, value.clone());
            }
            Ok(())
        }
        "update_traces" => {
            for trace in &mut figure.data {
                for (key, value) in kwargs {
                    apply_trace_kwarg(trace, key, value.clone());
                }
            }
            Ok(())
        }
        // Stragglers the line-anchored strip did not catch are harmless
        // here; there is nothing to display headless.
        "show" => {
            debug!("ignoring fig.show() in headless execution");
            Ok(())
        }
        other => Err(ExecError::UnknownFunction(format!("fig.{other}"))),
    }
}

fn apply_layout_kwarg(layout: &mut Value, key: &str, value: Value) {
    if !layout.is_object() {
        *layout = json!({});
    }
    match key {
        "title" if value.is_string() => {
            layout["title"] = json!({ "text": value });
        }
        "xaxis_title" => layout["xaxis"] = json!({ "title": { "text": value } }),
        "yaxis_title" => layout["yaxis"] = json!({ "title": { "text": value } }),
        _ => layout[key] = value,
    }
}

fn apply_trace_kwarg(trace: &mut Value, key: &str, value: Value) {
    match key.split_once('_') {
        Some((group @ ("marker" | "line"), field)) => {
            if trace[group].is_null() {
                trace[group] = json!({});
            }
            trace[group][field] = value;
        }
        _ => trace[key] = value,
    }
}

fn py_to_json(value: &PyValue) -> Value {
    match value {
        PyValue::Str(s) => json!(s),
        PyValue::Int(n) => json!(n),
        PyValue::Float(n) => json!(n),
        PyValue::Bool(b) => json!(b),
        PyValue::None => Value::Null,
        PyValue::List(items) => Value::Array(items.iter().map(py_to_json).collect()),
        PyValue::Dict(entries) => Value::Object(
            entries
                .iter()
                .map(|(k, v)| (k.clone(), py_to_json(v)))
                .collect(),
        ),
    }
}
