//! Typed AST for filter expressions.
//!
//! The AST is produced by the parser and consumed by the translator; it
//! never touches data. Nodes are comparison, logical, function-call,
//! literal, and property-reference — nothing storage-specific.
//!
//! Parsing is deterministic: the same filter string always yields a
//! structurally identical AST (all node types derive `PartialEq` so tests
//! can assert this directly).

use crate::functions::FilterFunction;
use obsdb_core::{GeometryValue, Timestamp};
use std::fmt;

/// Comparison operators.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CompareOp {
    Eq,
    Ne,
    Gt,
    Ge,
    Lt,
    Le,
}

impl CompareOp {
    /// Parse the grammar's operator keyword.
    pub fn from_keyword(kw: &str) -> Option<Self> {
        match kw {
            "eq" => Some(CompareOp::Eq),
            "ne" => Some(CompareOp::Ne),
            "gt" => Some(CompareOp::Gt),
            "ge" => Some(CompareOp::Ge),
            "lt" => Some(CompareOp::Lt),
            "le" => Some(CompareOp::Le),
            _ => None,
        }
    }

    pub fn keyword(&self) -> &'static str {
        match self {
            CompareOp::Eq => "eq",
            CompareOp::Ne => "ne",
            CompareOp::Gt => "gt",
            CompareOp::Ge => "ge",
            CompareOp::Lt => "lt",
            CompareOp::Le => "le",
        }
    }
}

/// A property reference, possibly traversing navigation hops:
/// `name`, `Datastream/name`, `Datastream/Thing/name`.
#[derive(Debug, Clone, PartialEq)]
pub struct PropertyPath {
    pub segments: Vec<String>,
}

impl PropertyPath {
    pub fn new(segments: Vec<String>) -> Self {
        Self { segments }
    }

    /// The final segment: the property name itself.
    pub fn property(&self) -> &str {
        self.segments.last().map(String::as_str).unwrap_or("")
    }

    /// Navigation segments preceding the property name.
    pub fn navigations(&self) -> &[String] {
        &self.segments[..self.segments.len().saturating_sub(1)]
    }
}

impl fmt::Display for PropertyPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.segments.join("/"))
    }
}

/// Literal values appearing in filter text.
#[derive(Debug, Clone, PartialEq)]
pub enum Literal {
    Number(f64),
    Text(String),
    Bool(bool),
    DateTime(Timestamp),
    Geometry(GeometryValue),
    Null,
}

/// A filter expression node.
#[derive(Debug, Clone, PartialEq)]
pub enum Expr {
    /// `lhs and rhs`
    And(Box<Expr>, Box<Expr>),
    /// `lhs or rhs`
    Or(Box<Expr>, Box<Expr>),
    /// `not inner`
    Not(Box<Expr>),
    /// `lhs <op> rhs`
    Compare {
        op: CompareOp,
        lhs: Box<Expr>,
        rhs: Box<Expr>,
    },
    /// `func(arg, ...)`
    Function {
        func: FilterFunction,
        args: Vec<Expr>,
    },
    /// `name` or `Datastream/Thing/name`
    Property(PropertyPath),
    /// `'text'`, `42`, `true`, `2024-01-15T10:30:00Z`, `geography'...'`
    Literal(Literal),
}
