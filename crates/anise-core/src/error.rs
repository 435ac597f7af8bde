use std::fmt;

use thiserror::Error;

use crate::ast::Span;

pub const ERROR_TAG: &str = "\x1b[31m[ERROR]\x1b[0m";

#[derive(Clone, Debug, Default)]
pub struct ErrorData {
    pub message: String,
    pub span: Option<Span>,
}

impl ErrorData {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            span: None,
        }
    }
}

impl fmt::Display for ErrorData {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.message)
    }
}

/// Analysis surfaces the first diagnostic in source order and stops;
/// nothing is accumulated or retried.
#[derive(Error, Debug, Clone)]
pub enum AniseError {
    #[error("Parse error: {0}")]
    Parse(ErrorData),

    #[error("{0}")]
    Shape(ErrorData),

    #[error("{0}")]
    Name(ErrorData),

    #[error("{0}")]
    Position(ErrorData),

    #[error("Type mismatch: expected {expected}, got {actual}")]
    TypeMismatch { expected: String, actual: String },

    #[error("{0}")]
    Interpolation(ErrorData),

    #[error("ICE: {0}")]
    Internal(ErrorData),
}

impl AniseError {
    pub fn parse(message: impl Into<String>) -> Self {
        AniseError::Parse(ErrorData::new(message))
    }

    pub fn shape(message: impl Into<String>) -> Self {
        AniseError::Shape(ErrorData::new(message))
    }

    pub fn name(message: impl Into<String>) -> Self {
        AniseError::Name(ErrorData::new(message))
    }

    pub fn position(message: impl Into<String>) -> Self {
        AniseError::Position(ErrorData::new(message))
    }

    pub fn type_mismatch(expected: impl Into<String>, actual: impl Into<String>) -> Self {
        AniseError::TypeMismatch {
            expected: expected.into(),
            actual: actual.into(),
        }
    }

    pub fn interpolation(message: impl Into<String>) -> Self {
        AniseError::Interpolation(ErrorData::new(message))
    }

    pub fn internal(message: impl Into<String>) -> Self {
        AniseError::Internal(ErrorData::new(message))
    }

    pub fn with_span(mut self, span: Span) -> Self {
        if let Some(data) = self.data_mut() {
            if data.span.is_none() {
                data.span = Some(span);
            }
        }
        self
    }

    pub fn span(&self) -> Option<Span> {
        self.data_ref().and_then(|data| data.span)
    }

    fn data_ref(&self) -> Option<&ErrorData> {
        match self {
            AniseError::Parse(data)
            | AniseError::Shape(data)
            | AniseError::Name(data)
            | AniseError::Position(data)
            | AniseError::Interpolation(data)
            | AniseError::Internal(data) => Some(data),
            AniseError::TypeMismatch { .. } => None,
        }
    }

    fn data_mut(&mut self) -> Option<&mut ErrorData> {
        match self {
            AniseError::Parse(data)
            | AniseError::Shape(data)
            | AniseError::Name(data)
            | AniseError::Position(data)
            | AniseError::Interpolation(data)
            | AniseError::Internal(data) => Some(data),
            AniseError::TypeMismatch { .. } => None,
        }
    }
}

/// Renders a diagnostic for display: the tagged message line, then the
/// source location when one is known.
pub fn format_error(err: &AniseError) -> Vec<String> {
    let mut lines = vec![format!("{} {}", ERROR_TAG, err)];
    if let Some(span) = err.span() {
        lines.push(format!("  at {}:{}", span.line, span.col));
    }
    lines
}
