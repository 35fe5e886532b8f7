//! Guard expressions gating step execution
//!
//! Guards are parsed once when a workflow is loaded and evaluated as pure
//! predicates over a job instance's matrix values. The accepted language is
//! the subset of CI expression syntax that only needs matrix values:
//!
//! ```text
//! matrix.os == 'ubuntu-latest' && !(matrix.toolchain == 'nightly')
//! ${{ startsWith(matrix.os, 'windows') || contains(matrix.features, 'full') }}
//! ```
//!
//! String comparisons are case-insensitive.

use crate::core::error::ConfigError;
use crate::core::matrix::JobInstance;
use std::fmt;

/// A parsed guard condition
#[derive(Debug, Clone, PartialEq)]
pub struct Guard {
    source: String,
    expr: Expr,
}

#[derive(Debug, Clone, PartialEq)]
enum Expr {
    Literal(Value),
    Axis(String),
    Not(Box<Expr>),
    And(Box<Expr>, Box<Expr>),
    Or(Box<Expr>, Box<Expr>),
    Eq(Box<Expr>, Box<Expr>),
    Ne(Box<Expr>, Box<Expr>),
    Call(Function, Vec<Expr>),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Function {
    Contains,
    StartsWith,
    EndsWith,
}

#[derive(Debug, Clone, PartialEq)]
enum Value {
    Str(String),
    Bool(bool),
}

impl Value {
    fn truthy(&self) -> bool {
        match self {
            Value::Str(s) => !s.is_empty(),
            Value::Bool(b) => *b,
        }
    }

    fn as_text(&self) -> String {
        match self {
            Value::Str(s) => s.to_lowercase(),
            Value::Bool(b) => b.to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
enum Token {
    LParen,
    RParen,
    Comma,
    Not,
    And,
    Or,
    Eq,
    Ne,
    Str(String),
    Ident(String),
}

impl Guard {
    /// Parse a guard, with or without the `${{ }}` wrapper
    pub fn parse(source: &str) -> Result<Self, ConfigError> {
        let trimmed = source.trim();
        let inner = trimmed
            .strip_prefix("${{")
            .and_then(|s| s.strip_suffix("}}"))
            .unwrap_or(trimmed);

        let invalid = |message: String| ConfigError::InvalidGuard {
            expression: source.to_string(),
            message,
        };

        let tokens = tokenize(inner).map_err(invalid)?;
        if tokens.is_empty() {
            return Err(invalid("empty expression".to_string()));
        }

        let mut parser = Parser { tokens, pos: 0 };
        let expr = parser.parse_or().map_err(invalid)?;
        if parser.pos != parser.tokens.len() {
            return Err(invalid(format!(
                "unexpected token {:?}",
                parser.tokens[parser.pos]
            )));
        }

        Ok(Self {
            source: source.to_string(),
            expr,
        })
    }

    /// Matrix axes referenced by this guard
    pub fn referenced_axes(&self) -> Vec<String> {
        let mut axes = Vec::new();
        collect_axes(&self.expr, &mut axes);
        axes.sort();
        axes.dedup();
        axes
    }

    /// Evaluate against an instance's matrix values
    pub fn evaluate(&self, instance: &JobInstance) -> bool {
        eval(&self.expr, instance).truthy()
    }
}

impl fmt::Display for Guard {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.source)
    }
}

fn collect_axes(expr: &Expr, out: &mut Vec<String>) {
    match expr {
        Expr::Literal(_) => {}
        Expr::Axis(name) => out.push(name.clone()),
        Expr::Not(inner) => collect_axes(inner, out),
        Expr::And(l, r) | Expr::Or(l, r) | Expr::Eq(l, r) | Expr::Ne(l, r) => {
            collect_axes(l, out);
            collect_axes(r, out);
        }
        Expr::Call(_, args) => args.iter().for_each(|a| collect_axes(a, out)),
    }
}

fn eval(expr: &Expr, instance: &JobInstance) -> Value {
    match expr {
        Expr::Literal(v) => v.clone(),
        Expr::Axis(name) => Value::Str(instance.get(name).unwrap_or_default().to_string()),
        Expr::Not(inner) => Value::Bool(!eval(inner, instance).truthy()),
        Expr::And(l, r) => Value::Bool(eval(l, instance).truthy() && eval(r, instance).truthy()),
        Expr::Or(l, r) => Value::Bool(eval(l, instance).truthy() || eval(r, instance).truthy()),
        Expr::Eq(l, r) => Value::Bool(eval(l, instance).as_text() == eval(r, instance).as_text()),
        Expr::Ne(l, r) => Value::Bool(eval(l, instance).as_text() != eval(r, instance).as_text()),
        Expr::Call(func, args) => {
            let haystack = eval(&args[0], instance).as_text();
            let needle = eval(&args[1], instance).as_text();
            Value::Bool(match func {
                Function::Contains => haystack.contains(&needle),
                Function::StartsWith => haystack.starts_with(&needle),
                Function::EndsWith => haystack.ends_with(&needle),
            })
        }
    }
}

fn tokenize(input: &str) -> Result<Vec<Token>, String> {
    let chars: Vec<char> = input.chars().collect();
    let mut tokens = Vec::new();
    let mut i = 0;

    while i < chars.len() {
        let c = chars[i];
        match c {
            c if c.is_whitespace() => i += 1,
            '(' => {
                tokens.push(Token::LParen);
                i += 1;
            }
            ')' => {
                tokens.push(Token::RParen);
                i += 1;
            }
            ',' => {
                tokens.push(Token::Comma);
                i += 1;
            }
            '!' if chars.get(i + 1) == Some(&'=') => {
                tokens.push(Token::Ne);
                i += 2;
            }
            '!' => {
                tokens.push(Token::Not);
                i += 1;
            }
            '=' if chars.get(i + 1) == Some(&'=') => {
                tokens.push(Token::Eq);
                i += 2;
            }
            '&' if chars.get(i + 1) == Some(&'&') => {
                tokens.push(Token::And);
                i += 2;
            }
            '|' if chars.get(i + 1) == Some(&'|') => {
                tokens.push(Token::Or);
                i += 2;
            }
            '\'' => {
                // '' escapes a quote inside a literal
                let mut literal = String::new();
                i += 1;
                loop {
                    match chars.get(i) {
                        None => return Err("unterminated string literal".to_string()),
                        Some('\'') if chars.get(i + 1) == Some(&'\'') => {
                            literal.push('\'');
                            i += 2;
                        }
                        Some('\'') => {
                            i += 1;
                            break;
                        }
                        Some(ch) => {
                            literal.push(*ch);
                            i += 1;
                        }
                    }
                }
                tokens.push(Token::Str(literal));
            }
            c if c.is_alphanumeric() || c == '_' => {
                let start = i;
                while i < chars.len()
                    && (chars[i].is_alphanumeric() || matches!(chars[i], '_' | '-' | '.'))
                {
                    i += 1;
                }
                tokens.push(Token::Ident(chars[start..i].iter().collect()));
            }
            other => return Err(format!("unexpected character '{}'", other)),
        }
    }

    Ok(tokens)
}

struct Parser {
    tokens: Vec<Token>,
    pos: usize,
}

impl Parser {
    fn peek(&self) -> Option<&Token> {
        self.tokens.get(self.pos)
    }

    fn next(&mut self) -> Option<Token> {
        let token = self.tokens.get(self.pos).cloned();
        self.pos += 1;
        token
    }

    fn expect(&mut self, expected: Token) -> Result<(), String> {
        match self.next() {
            Some(ref t) if *t == expected => Ok(()),
            Some(t) => Err(format!("expected {:?}, found {:?}", expected, t)),
            None => Err(format!("expected {:?}, found end of expression", expected)),
        }
    }

    fn parse_or(&mut self) -> Result<Expr, String> {
        let mut left = self.parse_and()?;
        while self.peek() == Some(&Token::Or) {
            self.pos += 1;
            let right = self.parse_and()?;
            left = Expr::Or(Box::new(left), Box::new(right));
        }
        Ok(left)
    }

    fn parse_and(&mut self) -> Result<Expr, String> {
        let mut left = self.parse_comparison()?;
        while self.peek() == Some(&Token::And) {
            self.pos += 1;
            let right = self.parse_comparison()?;
            left = Expr::And(Box::new(left), Box::new(right));
        }
        Ok(left)
    }

    fn parse_comparison(&mut self) -> Result<Expr, String> {
        let left = self.parse_unary()?;
        match self.peek() {
            Some(Token::Eq) => {
                self.pos += 1;
                Ok(Expr::Eq(Box::new(left), Box::new(self.parse_unary()?)))
            }
            Some(Token::Ne) => {
                self.pos += 1;
                Ok(Expr::Ne(Box::new(left), Box::new(self.parse_unary()?)))
            }
            _ => Ok(left),
        }
    }

    /// `!` binds tighter than comparisons: `!a == b` is `(!a) == b`
    fn parse_unary(&mut self) -> Result<Expr, String> {
        if self.peek() == Some(&Token::Not) {
            self.pos += 1;
            return Ok(Expr::Not(Box::new(self.parse_unary()?)));
        }
        self.parse_primary()
    }

    fn parse_primary(&mut self) -> Result<Expr, String> {
        match self.next() {
            Some(Token::LParen) => {
                let inner = self.parse_or()?;
                self.expect(Token::RParen)?;
                Ok(inner)
            }
            Some(Token::Str(s)) => Ok(Expr::Literal(Value::Str(s))),
            Some(Token::Ident(ident)) => self.parse_identifier(ident),
            Some(t) => Err(format!("unexpected token {:?}", t)),
            None => Err("unexpected end of expression".to_string()),
        }
    }

    fn parse_identifier(&mut self, ident: String) -> Result<Expr, String> {
        if self.peek() == Some(&Token::LParen) {
            let func = match ident.to_lowercase().as_str() {
                "contains" => Function::Contains,
                "startswith" => Function::StartsWith,
                "endswith" => Function::EndsWith,
                _ => return Err(format!("unknown function '{}'", ident)),
            };
            self.pos += 1;
            let first = self.parse_or()?;
            self.expect(Token::Comma)?;
            let second = self.parse_or()?;
            self.expect(Token::RParen)?;
            return Ok(Expr::Call(func, vec![first, second]));
        }

        match ident.as_str() {
            "true" => Ok(Expr::Literal(Value::Bool(true))),
            "false" => Ok(Expr::Literal(Value::Bool(false))),
            _ => match ident.strip_prefix("matrix.") {
                Some(axis) if !axis.is_empty() => Ok(Expr::Axis(axis.to_string())),
                _ => Err(format!(
                    "'{}' is not available; only matrix.<axis> references are supported",
                    ident
                )),
            },
        }
    }
}
