use std::fmt;

use thiserror::Error;

use crate::ast::Span;
use crate::diagnostics::{Diagnostic, render_diagnostics};

/// A failure while running a compiled script.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum EffectError {
    /// Integer division by zero.
    #[error("division by zero")]
    DivisionByZero {
        /// The division.
        span: Span,
    },

    /// `randint` with `low > high`.
    #[error("randint({low}, {high}) has an empty range")]
    EmptyRange {
        /// Lower bound given.
        low: i64,
        /// Upper bound given.
        high: i64,
        /// The call.
        span: Span,
    },

    /// A `choose` with no positive weight, or weights too large to add up.
    #[error("choose has no usable weight")]
    ZeroWeights {
        /// The `choose` expression.
        span: Span,
    },

    /// Integer arithmetic left the `i64` range.
    #[error("arithmetic overflow")]
    Overflow {
        /// The overflowing expression.
        span: Span,
    },

    /// A value of the wrong type reached an operation. The compiler rules
    /// these out; seeing one means a host returned something unexpected.
    #[error("type error: {message}")]
    Type {
        /// What was expected and found.
        message: String,
    },
}

impl EffectError {
    /// Location of the failing expression, when known.
    pub fn span(&self) -> Option<&Span> {
        match self {
            EffectError::DivisionByZero { span }
            | EffectError::EmptyRange { span, .. }
            | EffectError::ZeroWeights { span }
            | EffectError::Overflow { span } => Some(span),
            EffectError::Type { .. } => None,
        }
    }
}

/// Result alias for script execution.
pub type EffectResult<T> = Result<T, EffectError>;

/// Which piece of an item definition failed to compile.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScriptPart {
    /// The catalog file itself.
    Catalog,
    /// An item's `effect` body.
    Effect,
    /// An item's `predicate` body.
    Predicate,
}

impl fmt::Display for ScriptPart {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            ScriptPart::Catalog => "catalog",
            ScriptPart::Effect => "effect",
            ScriptPart::Predicate => "predicate",
        })
    }
}

/// An item script that does not compile. Raised at startup so a broken
/// catalog never reaches a live session.
#[derive(Debug, Clone, PartialEq, Error)]
#[error("{part} for `{item}` does not compile: {}", first_error(.diagnostics))]
pub struct ScriptDefinitionError {
    /// Item id, or the catalog file name for [`ScriptPart::Catalog`].
    pub item: String,
    /// What failed.
    pub part: ScriptPart,
    /// The text the diagnostics point into.
    pub script: String,
    /// At least one of these is an error.
    pub diagnostics: Vec<Diagnostic>,
}

impl ScriptDefinitionError {
    /// Pretty report of every diagnostic.
    pub fn render(&self) -> String {
        let name = match self.part {
            ScriptPart::Catalog => self.item.clone(),
            part => format!("{}.{part}", self.item),
        };
        render_diagnostics(&self.script, &name, &self.diagnostics)
    }
}

fn first_error(diagnostics: &[Diagnostic]) -> String {
    diagnostics
        .iter()
        .find(|d| d.is_error())
        .map(|d| d.message.clone())
        .unwrap_or_else(|| "unknown error".to_owned())
}
