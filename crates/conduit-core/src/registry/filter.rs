//! LDAP-style filter expressions over provider metadata.
//!
//! Grammar (whitespace between tokens is ignored):
//!
//! ```text
//! filter   := "*" | "" | item
//! item     := "(" ( "&" item+ | "|" item+ | "!" item | attr op value ) ")"
//! op       := "=" | ">=" | "<=" | "~="
//! ```
//!
//! `(key=*)` tests presence. `~=` takes a semver requirement and matches
//! properties holding a version string. Inside values, `(`, `)`, `*` and `\`
//! are escaped with a backslash.
use std::cmp::Ordering;
use std::fmt;
use std::str::FromStr;

use semver::{Version, VersionReq};
use serde_json::Value;

use crate::registry::error::FilterError;
use crate::registry::Properties;

/// Parsed filter expression
#[derive(Debug, Clone, PartialEq, Default)]
pub enum Filter {
    /// Matches everything
    #[default]
    Any,
    Equals { key: String, value: String },
    Present { key: String },
    GreaterOrEqual { key: String, value: String },
    LessOrEqual { key: String, value: String },
    VersionMatches { key: String, requirement: VersionReq },
    And(Vec<Filter>),
    Or(Vec<Filter>),
    Not(Box<Filter>),
}

impl Filter {
    /// Parse a filter expression. An empty string or `*` yields [`Filter::Any`].
    pub fn parse(expression: &str) -> Result<Self, FilterError> {
        let trimmed = expression.trim();
        if trimmed.is_empty() || trimmed == "*" {
            return Ok(Filter::Any);
        }
        let mut parser = Parser::new(expression);
        parser.skip_whitespace();
        let filter = parser.parse_item()?;
        parser.skip_whitespace();
        if parser.peek().is_some() {
            return Err(FilterError::TrailingInput {
                position: parser.pos,
            });
        }
        Ok(filter)
    }

    pub fn is_any(&self) -> bool {
        matches!(self, Filter::Any)
    }

    /// Conjunction of two filters, collapsing `Any` and nested `And`s.
    pub fn and(self, other: Filter) -> Filter {
        match (self, other) {
            (Filter::Any, f) | (f, Filter::Any) => f,
            (Filter::And(mut left), Filter::And(right)) => {
                left.extend(right);
                Filter::And(left)
            }
            (Filter::And(mut left), f) => {
                left.push(f);
                Filter::And(left)
            }
            (f, Filter::And(mut right)) => {
                right.insert(0, f);
                Filter::And(right)
            }
            (left, right) => Filter::And(vec![left, right]),
        }
    }

    /// Evaluate the filter against a metadata map.
    pub fn matches(&self, properties: &Properties) -> bool {
        match self {
            Filter::Any => true,
            Filter::Present { key } => properties.get(key).is_some_and(|v| !v.is_null()),
            Filter::Equals { key, value } => properties
                .get(key)
                .is_some_and(|v| any_scalar(v, &|s| scalar_equals(s, value))),
            Filter::GreaterOrEqual { key, value } => properties.get(key).is_some_and(|v| {
                any_scalar(v, &|s| {
                    matches!(
                        scalar_compare(s, value),
                        Some(Ordering::Greater | Ordering::Equal)
                    )
                })
            }),
            Filter::LessOrEqual { key, value } => properties.get(key).is_some_and(|v| {
                any_scalar(v, &|s| {
                    matches!(
                        scalar_compare(s, value),
                        Some(Ordering::Less | Ordering::Equal)
                    )
                })
            }),
            Filter::VersionMatches { key, requirement } => properties.get(key).is_some_and(|v| {
                any_scalar(v, &|s| match s {
                    Value::String(text) => {
                        Version::parse(text).is_ok_and(|version| requirement.matches(&version))
                    }
                    _ => false,
                })
            }),
            Filter::And(items) => items.iter().all(|f| f.matches(properties)),
            Filter::Or(items) => items.iter().any(|f| f.matches(properties)),
            Filter::Not(inner) => !inner.matches(properties),
        }
    }
}

fn any_scalar(value: &Value, predicate: &dyn Fn(&Value) -> bool) -> bool {
    match value {
        Value::Array(items) => items.iter().any(predicate),
        other => predicate(other),
    }
}

fn scalar_equals(value: &Value, expected: &str) -> bool {
    match value {
        Value::String(s) => s == expected,
        Value::Number(n) => match (n.as_f64(), expected.parse::<f64>()) {
            (Some(actual), Ok(wanted)) => actual == wanted,
            _ => n.to_string() == expected,
        },
        Value::Bool(b) => expected.parse::<bool>() == Ok(*b),
        _ => false,
    }
}

fn scalar_compare(value: &Value, expected: &str) -> Option<Ordering> {
    match value {
        Value::Number(n) => n.as_f64()?.partial_cmp(&expected.parse::<f64>().ok()?),
        Value::String(s) => match (s.parse::<f64>(), expected.parse::<f64>()) {
            (Ok(actual), Ok(wanted)) => actual.partial_cmp(&wanted),
            _ => Some(s.as_str().cmp(expected)),
        },
        _ => None,
    }
}

impl FromStr for Filter {
    type Err = FilterError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Filter::parse(s)
    }
}

fn write_escaped(f: &mut fmt::Formatter<'_>, value: &str) -> fmt::Result {
    for c in value.chars() {
        if matches!(c, '(' | ')' | '*' | '\\') {
            write!(f, "\\")?;
        }
        write!(f, "{}", c)?;
    }
    Ok(())
}

impl fmt::Display for Filter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Filter::Any => write!(f, "*"),
            Filter::Present { key } => write!(f, "({}=*)", key),
            Filter::Equals { key, value } => {
                write!(f, "({}=", key)?;
                write_escaped(f, value)?;
                write!(f, ")")
            }
            Filter::GreaterOrEqual { key, value } => {
                write!(f, "({}>=", key)?;
                write_escaped(f, value)?;
                write!(f, ")")
            }
            Filter::LessOrEqual { key, value } => {
                write!(f, "({}<=", key)?;
                write_escaped(f, value)?;
                write!(f, ")")
            }
            Filter::VersionMatches { key, requirement } => {
                write!(f, "({}~={})", key, requirement)
            }
            Filter::And(items) => {
                write!(f, "(&")?;
                for item in items {
                    write!(f, "{}", item)?;
                }
                write!(f, ")")
            }
            Filter::Or(items) => {
                write!(f, "(|")?;
                for item in items {
                    write!(f, "{}", item)?;
                }
                write!(f, ")")
            }
            Filter::Not(inner) => write!(f, "(!{})", inner),
        }
    }
}

enum Operator {
    Equals,
    GreaterOrEqual,
    LessOrEqual,
    Approx,
}

struct Parser {
    chars: Vec<char>,
    pos: usize,
}

impl Parser {
    fn new(input: &str) -> Self {
        Self {
            chars: input.chars().collect(),
            pos: 0,
        }
    }

    fn peek(&self) -> Option<char> {
        self.chars.get(self.pos).copied()
    }

    fn next(&mut self) -> Option<char> {
        let c = self.peek();
        if c.is_some() {
            self.pos += 1;
        }
        c
    }

    fn skip_whitespace(&mut self) {
        while self.peek().is_some_and(char::is_whitespace) {
            self.pos += 1;
        }
    }

    fn expect(&mut self, wanted: char) -> Result<(), FilterError> {
        let position = self.pos;
        match self.next() {
            Some(c) if c == wanted => Ok(()),
            Some(found) => Err(FilterError::UnexpectedChar { found, position }),
            None => Err(FilterError::UnexpectedEnd { position }),
        }
    }

    fn parse_item(&mut self) -> Result<Filter, FilterError> {
        self.expect('(')?;
        self.skip_whitespace();
        let filter = match self.peek() {
            Some('&') => {
                self.pos += 1;
                Filter::And(self.parse_list()?)
            }
            Some('|') => {
                self.pos += 1;
                Filter::Or(self.parse_list()?)
            }
            Some('!') => {
                self.pos += 1;
                self.skip_whitespace();
                Filter::Not(Box::new(self.parse_item()?))
            }
            Some(_) => self.parse_comparison()?,
            None => return Err(FilterError::UnexpectedEnd { position: self.pos }),
        };
        self.skip_whitespace();
        self.expect(')')?;
        Ok(filter)
    }

    fn parse_list(&mut self) -> Result<Vec<Filter>, FilterError> {
        let position = self.pos;
        let mut items = Vec::new();
        loop {
            self.skip_whitespace();
            if self.peek() != Some('(') {
                break;
            }
            items.push(self.parse_item()?);
        }
        if items.is_empty() {
            return Err(FilterError::EmptyComposite { position });
        }
        Ok(items)
    }

    fn parse_comparison(&mut self) -> Result<Filter, FilterError> {
        let start = self.pos;
        let mut key = String::new();
        while let Some(c) = self.peek() {
            if matches!(c, '=' | '<' | '>' | '~' | '(' | ')') {
                break;
            }
            key.push(c);
            self.pos += 1;
        }
        let key = key.trim().to_string();
        if key.is_empty() {
            return Err(FilterError::MissingAttribute { position: start });
        }

        let op_position = self.pos;
        let operator = match self.next() {
            Some('=') => Operator::Equals,
            Some('>') => {
                self.expect('=')?;
                Operator::GreaterOrEqual
            }
            Some('<') => {
                self.expect('=')?;
                Operator::LessOrEqual
            }
            Some('~') => {
                self.expect('=')?;
                Operator::Approx
            }
            Some(found) => {
                return Err(FilterError::UnexpectedChar {
                    found,
                    position: op_position,
                });
            }
            None => return Err(FilterError::UnexpectedEnd { position: op_position }),
        };

        let (value, bare_star) = self.parse_value()?;
        Ok(match operator {
            Operator::Equals if bare_star => Filter::Present { key },
            Operator::Equals => Filter::Equals { key, value },
            Operator::GreaterOrEqual => Filter::GreaterOrEqual { key, value },
            Operator::LessOrEqual => Filter::LessOrEqual { key, value },
            Operator::Approx => {
                let requirement = VersionReq::parse(&value).map_err(|e| {
                    FilterError::InvalidVersionRequirement {
                        requirement: value.clone(),
                        message: e.to_string(),
                    }
                })?;
                Filter::VersionMatches { key, requirement }
            }
        })
    }

    /// Reads up to the closing parenthesis. Returns the unescaped value and
    /// whether it was a lone unescaped `*`.
    fn parse_value(&mut self) -> Result<(String, bool), FilterError> {
        let mut value = String::new();
        let mut escaped_any = false;
        loop {
            match self.peek() {
                None => return Err(FilterError::UnexpectedEnd { position: self.pos }),
                Some(')') => break,
                Some('(') => {
                    return Err(FilterError::UnexpectedChar {
                        found: '(',
                        position: self.pos,
                    });
                }
                Some('\\') => {
                    self.pos += 1;
                    match self.next() {
                        Some(c) => {
                            value.push(c);
                            escaped_any = true;
                        }
                        None => return Err(FilterError::UnexpectedEnd { position: self.pos }),
                    }
                }
                Some(c) => {
                    value.push(c);
                    self.pos += 1;
                }
            }
        }
        let trimmed = value.trim().to_string();
        let bare_star = !escaped_any && trimmed == "*";
        Ok((trimmed, bare_star))
    }
}
