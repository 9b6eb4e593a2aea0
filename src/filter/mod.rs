//! SCIM filter expressions (RFC 7644 §3.4.2.2).
//!
//! Filters are parsed into a [`FilterExpression`] tree with [`parse`] and
//! evaluated against JSON values with a [`FilterEvaluator`]. The PATCH engine
//! uses them to address elements of multi-valued attributes, e.g.
//! `emails[type eq "work"]`.
//!
//! ```rust
//! use scim_patch::filter::{self, FilterExpression};
//!
//! let expr = filter::parse(r#"type eq "work" and not (primary eq true)"#).unwrap();
//! assert!(matches!(expr, FilterExpression::And(..)));
//! assert_eq!(expr.to_string(), r#"type eq "work" and not (primary eq true)"#);
//! ```

mod eval;
mod parser;

pub use eval::{FilterEvaluator, FilterScope};
pub use parser::parse;

use serde_json::Value;
use std::fmt;
use std::str::FromStr;

/// Boolean filter tree.
#[derive(Debug, Clone, PartialEq)]
pub enum FilterExpression {
    /// The empty filter, which matches every value
    MatchAll,
    And(Box<FilterExpression>, Box<FilterExpression>),
    Or(Box<FilterExpression>, Box<FilterExpression>),
    Not(Box<FilterExpression>),
    Comparison {
        /// Attribute path relative to the filter scope
        path: String,
        operator: ComparisonOperator,
        /// Literal to compare with, `Value::Null` for `pr`
        value: Value,
    },
}

impl FilterExpression {
    pub fn comparison(path: impl Into<String>, operator: ComparisonOperator, value: Value) -> Self {
        Self::Comparison {
            path: path.into(),
            operator,
            value,
        }
    }

    pub fn and(self, other: FilterExpression) -> Self {
        Self::And(Box::new(self), Box::new(other))
    }

    pub fn or(self, other: FilterExpression) -> Self {
        Self::Or(Box::new(self), Box::new(other))
    }

    pub fn negate(self) -> Self {
        Self::Not(Box::new(self))
    }

    /// Attribute paths referenced by every comparison, in order of appearance.
    pub fn attribute_paths(&self) -> Vec<&str> {
        let mut paths = Vec::new();
        self.collect_paths(&mut paths);
        paths
    }

    fn collect_paths<'a>(&'a self, paths: &mut Vec<&'a str>) {
        match self {
            Self::MatchAll => {}
            Self::And(left, right) | Self::Or(left, right) => {
                left.collect_paths(paths);
                right.collect_paths(paths);
            }
            Self::Not(inner) => inner.collect_paths(paths),
            Self::Comparison { path, .. } => paths.push(path),
        }
    }

    fn fmt_operand(&self, f: &mut fmt::Formatter<'_>, parent_is_and: bool) -> fmt::Result {
        if parent_is_and && matches!(self, Self::Or(..)) {
            write!(f, "({})", self)
        } else {
            write!(f, "{}", self)
        }
    }
}

impl fmt::Display for FilterExpression {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::MatchAll => Ok(()),
            Self::And(left, right) => {
                left.fmt_operand(f, true)?;
                f.write_str(" and ")?;
                right.fmt_operand(f, true)
            }
            Self::Or(left, right) => write!(f, "{} or {}", left, right),
            Self::Not(inner) => write!(f, "not ({})", inner),
            Self::Comparison {
                path,
                operator: ComparisonOperator::Pr,
                ..
            } => write!(f, "{} pr", path),
            Self::Comparison {
                path,
                operator,
                value,
            } => write!(f, "{} {} {}", path, operator, value),
        }
    }
}

/// Attribute comparison operators.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ComparisonOperator {
    Eq,
    Ne,
    Co,
    Sw,
    Ew,
    Gt,
    Ge,
    Lt,
    Le,
    /// Present (has value)
    Pr,
}

impl FromStr for ComparisonOperator {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let op = match s.to_ascii_lowercase().as_str() {
            "eq" => Self::Eq,
            "ne" => Self::Ne,
            "co" => Self::Co,
            "sw" => Self::Sw,
            "ew" => Self::Ew,
            "gt" => Self::Gt,
            "ge" => Self::Ge,
            "lt" => Self::Lt,
            "le" => Self::Le,
            "pr" => Self::Pr,
            _ => return Err(()),
        };
        Ok(op)
    }
}

impl fmt::Display for ComparisonOperator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Eq => "eq",
            Self::Ne => "ne",
            Self::Co => "co",
            Self::Sw => "sw",
            Self::Ew => "ew",
            Self::Gt => "gt",
            Self::Ge => "ge",
            Self::Lt => "lt",
            Self::Le => "le",
            Self::Pr => "pr",
        };
        f.write_str(name)
    }
}
