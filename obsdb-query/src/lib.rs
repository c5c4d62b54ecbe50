//! # obsdb Query
//!
//! The filter expression compiler and query translator.
//!
//! This crate provides:
//! - A tokenizer + recursive-descent parser for the textual filter grammar
//! - A typed AST (`Expr`) independent of storage
//! - `QueryOptions` for paging, ordering, shaping, and counting
//! - A translator lowering AST + options into a parameterized store query
//!   (`StoreQuery`): a template tree plus bound parameters
//!
//! ## Design Principles
//!
//! 1. **The compiler never executes against data** — parsing yields an AST
//!    of typed nodes, nothing else
//! 2. **Every literal becomes a bound parameter** — templates reference
//!    parameters by index and are never built by string concatenation
//! 3. **Function lowering is data, not control flow** — the function table
//!    is a static map; adding a function is a table entry
//!
//! ## Precedence
//!
//! `not` binds tighter than `and`, which binds tighter than `or`;
//! parentheses override. `a or b and c` groups as `a or (b and c)`.

pub mod ast;
pub mod error;
pub mod functions;
pub mod options;
pub mod parse;
pub mod token;
pub mod translate;

pub use ast::{CompareOp, Expr, Literal, PropertyPath};
pub use error::{FilterError, Result};
pub use functions::{FilterFunction, FunctionKind, FunctionSpec, lookup_function};
pub use options::{OrderBySpec, QueryOptions};
pub use parse::parse_filter;
pub use translate::{
    translate, BoolFunc, Column, FieldRef, Operand, ParamValue, QueryTemplate, ResolvedOrderBy,
    ScalarFunc, StoreQuery,
};
