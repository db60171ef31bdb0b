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

//! Parser for the statement subset the interpreter accepts: imports,
//! assignments of call expressions, and bare method calls. Anything the
//! grammar does not cover is a typed parse failure, never a crash.

use crate::error::ExecError;

#[derive(Debug, Clone, PartialEq)]
pub enum Stmt {
    Import {
        module: String,
        alias: Option<String>,
    },
    Assign {
        name: String,
        expr: Expr,
    },
    Expr(Expr),
}

#[derive(Debug, Clone, PartialEq)]
pub enum Expr {
    Call(CallExpr),
    Value(PyValue),
    Name(Vec<String>),
}

#[derive(Debug, Clone, PartialEq)]
pub struct CallExpr {
    pub path: Vec<String>,
    pub positional: Vec<Expr>,
    pub keywords: Vec<(String, Expr)>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum PyValue {
    Str(String),
    Int(i64),
    Float(f64),
    Bool(bool),
    None,
    List(Vec<PyValue>),
    Dict(Vec<(String, PyValue)>),
}

#[derive(Debug, Clone, PartialEq)]
enum Token {
    Ident(String),
    Str(String),
    Int(i64),
    Float(f64),
    Symbol(char),
    Newline,
}

/// Lexes the fragment. Comments run to end of line; newlines inside
/// brackets do not terminate a statement.
fn lex(fragment: &str) -> Result<Vec<Token>, ExecError> {
    let mut tokens = Vec::new();
    let mut chars = fragment.chars().peekable();
    let mut depth = 0usize;

    while let Some(&c) = chars.peek() {
        match c {
            '#' => {
                for next in chars.by_ref() {
                    if next == '\n' {
                        if depth == 0 {
                            tokens.push(Token::Newline);
                        }
                        break;
                    }
                }
            }
            '\n' | ';' => {
                chars.next();
                if depth == 0 {
                    tokens.push(Token::Newline);
                }
            }
            c if c.is_whitespace() => {
                chars.next();
            }
            '\'' | '"' => {
                let quote = c;
                chars.next();
                let mut value = String::new();
                let mut closed = false;
                while let Some(next) = chars.next() {
                    match next {
                        '\\' => {
                            let Some(escaped) = chars.next() else { break };
                            value.push(match escaped {
                                'n' => '\n',
                                't' => '\t',
                                other => other,
                            });
                        }
                        _ if next == quote => {
                            closed = true;
                            break;
                        }
                        other => value.push(other),
                    }
                }
                if !closed {
                    return Err(ExecError::Parse("unterminated string literal".to_string()));
                }
                tokens.push(Token::Str(value));
            }
            c if c.is_ascii_digit() => {
                let mut number = String::new();
                let mut is_float = false;
                while let Some(&next) = chars.peek() {
                    if next.is_ascii_digit() || next == '_' {
                        number.push(next);
                        chars.next();
                    } else if next == '.' && !is_float {
                        is_float = true;
                        number.push(next);
                        chars.next();
                    } else {
                        break;
                    }
                }
                let number = number.replace('_', "");
                if is_float {
                    let parsed = number
                        .parse::<f64>()
                        .map_err(|e| ExecError::Parse(format!("bad number '{number}': {e}")))?;
                    tokens.push(Token::Float(parsed));
                } else {
                    let parsed = number
                        .parse::<i64>()
                        .map_err(|e| ExecError::Parse(format!("bad number '{number}': {e}")))?;
                    tokens.push(Token::Int(parsed));
                }
            }
            c if c.is_alphabetic() || c == '_' => {
                let mut ident = String::new();
                while let Some(&next) = chars.peek() {
                    if next.is_alphanumeric() || next == '_' {
                        ident.push(next);
                        chars.next();
                    } else {
                        break;
                    }
                }
                tokens.push(Token::Ident(ident));
            }
            '(' | '[' | '{' => {
                depth += 1;
                tokens.push(Token::Symbol(c));
                chars.next();
            }
            ')' | ']' | '}' => {
                depth = depth.saturating_sub(1);
                tokens.push(Token::Symbol(c));
                chars.next();
            }
            '=' | ',' | ':' | '.' | '-' => {
                tokens.push(Token::Symbol(c));
                chars.next();
            }
            other => {
                return Err(ExecError::Parse(format!("unexpected character '{other}'")));
            }
        }
    }
    Ok(tokens)
}

pub fn parse(fragment: &str) -> Result<Vec<Stmt>, ExecError> {
    let tokens = lex(fragment)?;
    let mut statements = Vec::new();
    for line in tokens.split(|t| *t == Token::Newline) {
        if line.is_empty() {
            continue;
        }
        statements.push(parse_statement(line)?);
    }
    Ok(statements)
}

/// Cursor over one statement's tokens.
struct Cursor<'a> {
    tokens: &'a [Token],
    position: usize,
}

impl<'a> Cursor<'a> {
    fn new(tokens: &'a [Token]) -> Self {
        Self {
            tokens,
            position: 0,
        }
    }

    fn peek(&self) -> Option<&'a Token> {
        self.tokens.get(self.position)
    }

    fn next(&mut self) -> Option<&'a Token> {
        let token = self.tokens.get(self.position);
        self.position += 1;
        token
    }

    fn eat_symbol(&mut self, symbol: char) -> bool {
        if self.peek() == Some(&Token::Symbol(symbol)) {
            self.position += 1;
            true
        } else {
            false
        }
    }

    fn expect_symbol(&mut self, symbol: char) -> Result<(), ExecError> {
        if self.eat_symbol(symbol) {
            Ok(())
        } else {
            Err(ExecError::Parse(format!("expected '{symbol}'")))
        }
    }

    fn expect_ident(&mut self) -> Result<&'a str, ExecError> {
        match self.next() {
            Some(Token::Ident(name)) => Ok(name),
            other => Err(ExecError::Parse(format!(
                "expected identifier, found {other:?}"
            ))),
        }
    }

    fn at_end(&self) -> bool {
        self.position >= self.tokens.len()
    }

    fn expect_end(&self) -> Result<(), ExecError> {
        if self.at_end() {
            Ok(())
        } else {
            Err(ExecError::Parse(format!(
                "trailing tokens after statement: {:?}",
                &self.tokens[self.position..]
            )))
        }
    }
}

fn parse_statement(tokens: &[Token]) -> Result<Stmt, ExecError> {
    let mut cursor = Cursor::new(tokens);

    if let Some(Token::Ident(head)) = cursor.peek() {
        match head.as_str() {
            "import" => return parse_import(&mut cursor),
            "from" => {
                return Err(ExecError::UnsupportedConstruct(
                    "from-imports are not supported".to_string(),
                ))
            }
            _ => {}
        }
    }

    // `name = expr` when the second token is a bare '='.
    if matches!(cursor.tokens.first(), Some(Token::Ident(_)))
        && cursor.tokens.get(1) == Some(&Token::Symbol('='))
    {
        let name = cursor.expect_ident()?.to_string();
        cursor.expect_symbol('=')?;
        let expr = parse_expr(&mut cursor)?;
        cursor.expect_end()?;
        return Ok(Stmt::Assign { name, expr });
    }

    let expr = parse_expr(&mut cursor)?;
    cursor.expect_end()?;
    Ok(Stmt::Expr(expr))
}

fn parse_import(cursor: &mut Cursor) -> Result<Stmt, ExecError> {
    cursor.expect_ident()?; // "import"
    let mut module = cursor.expect_ident()?.to_string();
    while cursor.eat_symbol('.') {
        module.push('.');
        module.push_str(cursor.expect_ident()?);
    }
    let alias = if let Some(Token::Ident(word)) = cursor.peek() {
        if word == "as" {
            cursor.next();
            Some(cursor.expect_ident()?.to_string())
        } else {
            return Err(ExecError::Parse(format!("unexpected token '{word}'")));
        }
    } else {
        None
    };
    cursor.expect_end()?;
    Ok(Stmt::Import { module, alias })
}

fn parse_expr(cursor: &mut Cursor) -> Result<Expr, ExecError> {
    match cursor.peek() {
        Some(Token::Ident(word)) if matches!(word.as_str(), "True" | "False" | "None") => {
            let value = parse_value(cursor)?;
            Ok(Expr::Value(value))
        }
        Some(Token::Ident(_)) => {
            let mut path = vec![cursor.expect_ident()?.to_string()];
            while cursor.eat_symbol('.') {
                path.push(cursor.expect_ident()?.to_string());
            }
            if cursor.peek() == Some(&Token::Symbol('(')) {
                let (positional, keywords) = parse_arguments(cursor)?;
                if cursor.eat_symbol('.') {
                    return Err(ExecError::UnsupportedConstruct(
                        "chained method calls are not supported".to_string(),
                    ));
                }
                Ok(Expr::Call(CallExpr {
                    path,
                    positional,
                    keywords,
                }))
            } else if cursor.peek() == Some(&Token::Symbol('[')) {
                Err(ExecError::UnsupportedConstruct(
                    "subscript expressions are not supported".to_string(),
                ))
            } else {
                Ok(Expr::Name(path))
            }
        }
        Some(_) => Ok(Expr::Value(parse_value(cursor)?)),
        None => Err(ExecError::Parse("unexpected end of statement".to_string())),
    }
}

fn parse_arguments(cursor: &mut Cursor) -> Result<(Vec<Expr>, Vec<(String, Expr)>), ExecError> {
    cursor.expect_symbol('(')?;
    let mut positional = Vec::new();
    let mut keywords = Vec::new();

    loop {
        if cursor.eat_symbol(')') {
            break;
        }
        // `ident = value` is a keyword argument, a lone expression is
        // positional.
        if matches!(cursor.peek(), Some(Token::Ident(_)))
            && cursor.tokens.get(cursor.position + 1) == Some(&Token::Symbol('='))
        {
            let name = cursor.expect_ident()?.to_string();
            cursor.expect_symbol('=')?;
            keywords.push((name, parse_expr(cursor)?));
        } else {
            positional.push(parse_expr(cursor)?);
        }
        if !cursor.eat_symbol(',') && cursor.peek() != Some(&Token::Symbol(')')) {
            return Err(ExecError::Parse(
                "expected ',' or ')' in argument list".to_string(),
            ));
        }
    }
    Ok((positional, keywords))
}

fn parse_value(cursor: &mut Cursor) -> Result<PyValue, ExecError> {
    let negative = cursor.eat_symbol('-');
    match cursor.next() {
        Some(Token::Str(s)) => {
            if negative {
                return Err(ExecError::Parse("cannot negate a string".to_string()));
            }
            Ok(PyValue::Str(s.clone()))
        }
        Some(Token::Int(n)) => Ok(PyValue::Int(if negative { -n } else { *n })),
        Some(Token::Float(n)) => Ok(PyValue::Float(if negative { -n } else { *n })),
        Some(Token::Ident(word)) => match word.as_str() {
            "True" => Ok(PyValue::Bool(true)),
            "False" => Ok(PyValue::Bool(false)),
            "None" => Ok(PyValue::None),
            other => Err(ExecError::Parse(format!(
                "expected literal, found '{other}'"
            ))),
        },
        Some(Token::Symbol('[')) => {
            let mut items = Vec::new();
            loop {
                if cursor.eat_symbol(']') {
                    break;
                }
                items.push(parse_value(cursor)?);
                if !cursor.eat_symbol(',') && cursor.peek() != Some(&Token::Symbol(']')) {
                    return Err(ExecError::Parse("expected ',' or ']' in list".to_string()));
                }
            }
            Ok(PyValue::List(items))
        }
        Some(Token::Symbol('{')) => {
            let mut entries = Vec::new();
            loop {
                if cursor.eat_symbol('}') {
                    break;
                }
                let key = match cursor.next() {
                    Some(Token::Str(s)) => s.clone(),
                    other => {
                        return Err(ExecError::Parse(format!(
                            "dict keys must be strings, found {other:?}"
                        )))
                    }
                };
                cursor.expect_symbol(':')?;
                entries.push((key, parse_value(cursor)?));
                if !cursor.eat_symbol(',') && cursor.peek() != Some(&Token::Symbol('}')) {
                    return Err(ExecError::Parse("expected ',' or '}' in dict".to_string()));
                }
            }
            Ok(PyValue::Dict(entries))
        }
        other => Err(ExecError::Parse(format!(
            "expected literal, found {other:?}"
        ))),
    }
}
