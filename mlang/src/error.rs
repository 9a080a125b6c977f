use std::ops::Range;

use codespan_reporting::diagnostic::{self, Label, Severity};
use thiserror::Error;

/// Every failure the macro language can report.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum MacroError {
    // Definition
    #[error("DEFINE: {0}")]
    Definition(String),

    // Argument binding
    #[error("macro `{macro_name}`: {message}")]
    ArgumentBinding { macro_name: String, message: String },

    // Limits
    #[error("maximum nesting level {limit} exceeded expanding `{macro_name}`; set MNEST to raise it")]
    NestingLimit { macro_name: String, limit: usize },

    #[error("!DO loop stopped after {limit} iterations; set MITERATE to raise it")]
    IterationLimit { limit: usize },

    #[error("!EVAL nested more than {limit} levels deep")]
    EvalNestingLimit { limit: usize },

    // Evaluation
    #[error("{0}")]
    Evaluation(String),

    #[error("{function}: {message}")]
    Function { function: String, message: String },

    #[error("SET {setting}: {message}")]
    InvalidSetting { setting: String, message: String },
}

/// Coarse classification used to decide severity and for filtering.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    Definition,
    ExpansionLimit,
    ArgumentBinding,
    Evaluation,
}

impl MacroError {
    pub fn definition(message: impl Into<String>) -> Self {
        MacroError::Definition(message.into())
    }

    pub fn binding(macro_name: impl Into<String>, message: impl Into<String>) -> Self {
        MacroError::ArgumentBinding {
            macro_name: macro_name.into(),
            message: message.into(),
        }
    }

    pub fn evaluation(message: impl Into<String>) -> Self {
        MacroError::Evaluation(message.into())
    }

    pub fn function(function: impl Into<String>, message: impl Into<String>) -> Self {
        MacroError::Function {
            function: function.into(),
            message: message.into(),
        }
    }

    pub fn kind(&self) -> ErrorKind {
        match self {
            MacroError::Definition(_) => ErrorKind::Definition,
            MacroError::ArgumentBinding { .. } => ErrorKind::ArgumentBinding,
            MacroError::NestingLimit { .. }
            | MacroError::IterationLimit { .. }
            | MacroError::EvalNestingLimit { .. } => ErrorKind::ExpansionLimit,
            MacroError::Evaluation(_)
            | MacroError::Function { .. }
            | MacroError::InvalidSetting { .. } => ErrorKind::Evaluation,
        }
    }
}

/// A [`MacroError`] together with where it happened.
#[derive(Debug, Clone)]
pub struct Diagnostic {
    pub error: MacroError,
    pub span: Option<Range<usize>>,
    pub severity: Severity,
    /// Innermost frame last, e.g. `["!outer", "!inner", "!DO"]`.
    pub stack: Vec<String>,
}

impl Diagnostic {
    pub fn error(error: MacroError, span: Option<Range<usize>>) -> Self {
        Diagnostic {
            error,
            span,
            severity: Severity::Error,
            stack: Vec::new(),
        }
    }

    pub fn warning(error: MacroError, span: Option<Range<usize>>) -> Self {
        Diagnostic {
            error,
            span,
            severity: Severity::Warning,
            stack: Vec::new(),
        }
    }

    /// Severity follows the error kind: limit violations are warnings.
    pub fn from_error(error: MacroError, span: Option<Range<usize>>) -> Self {
        match error.kind() {
            ErrorKind::ExpansionLimit => Diagnostic::warning(error, span),
            _ => Diagnostic::error(error, span),
        }
    }

    pub fn with_stack(mut self, stack: Vec<String>) -> Self {
        self.stack = stack;
        self
    }

    pub fn is_warning(&self) -> bool {
        self.severity == Severity::Warning
    }

    pub fn kind(&self) -> ErrorKind {
        self.error.kind()
    }

    /// Convert to a codespan-reporting diagnostic for display.
    pub fn to_codespan(&self, file_id: usize) -> diagnostic::Diagnostic<usize> {
        let mut out = diagnostic::Diagnostic::new(self.severity).with_message(self.error.to_string());
        if let Some(span) = &self.span {
            out = out.with_labels(vec![Label::primary(file_id, span.clone())]);
        }
        let notes: Vec<String> = self
            .stack
            .iter()
            .rev()
            .map(|frame| format!("in expansion of {}", frame))
            .collect();
        out.with_notes(notes)
    }
}

impl std::fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        self.error.fmt(f)
    }
}
