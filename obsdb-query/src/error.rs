//! Error types for filter parsing and translation.
//!
//! `Syntax` and `UnsupportedFunction` are distinct failure modes: callers
//! must be able to report "your filter text is malformed" separately from
//! "that function name is recognized but not available". Neither is ever
//! silently ignored — a filter that fails to compile fails the request.

use thiserror::Error;

/// Result type alias using FilterError
pub type Result<T> = std::result::Result<T, FilterError>;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum FilterError {
    /// Malformed filter text (lexical or grammatical).
    #[error("filter syntax error at position {position}: {message}")]
    Syntax { position: usize, message: String },

    /// A function name that is not in the function table.
    #[error("unsupported filter function: {name}")]
    UnsupportedFunction { name: String },

    /// Wrong number of arguments for a known function.
    #[error("function {name} expects {expected} argument(s), got {got}")]
    Arity {
        name: &'static str,
        expected: String,
        got: usize,
    },

    /// A property name that does not exist on the queried entity type.
    #[error("unknown property for {entity_type}: {path}")]
    UnknownProperty { entity_type: String, path: String },

    /// AST shape the translator cannot lower (e.g. a boolean predicate used
    /// as a comparison operand).
    #[error("cannot translate filter: {0}")]
    Translate(String),
}

impl FilterError {
    pub fn syntax(position: usize, message: impl Into<String>) -> Self {
        FilterError::Syntax {
            position,
            message: message.into(),
        }
    }

    pub fn unsupported(name: impl Into<String>) -> Self {
        FilterError::UnsupportedFunction { name: name.into() }
    }

    pub fn translate(msg: impl Into<String>) -> Self {
        FilterError::Translate(msg.into())
    }

    /// True when the error is the unsupported-function case, which callers
    /// report with a distinct machine-readable code.
    pub fn is_unsupported_function(&self) -> bool {
        matches!(self, FilterError::UnsupportedFunction { .. })
    }
}
