//! Error types for expression resolution
//!
//! Covers parsing, evaluation, the nesting bound and the per-parameter
//! failures raised by the strict pass.

use envset_param::ValueKind;

/// Errors raised while resolving parameter expressions
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ExpressionError {
    /// Malformed placeholder or expression
    #[error("syntax error in expression '{expression}': {message}")]
    Syntax { expression: String, message: String },

    /// Reference to a name that is not bound
    #[error("unknown variable: {0}")]
    UnknownVariable(String),

    /// Filter or method that does not exist in the dialect
    #[error("unknown function: {0}")]
    UnknownFunction(String),

    /// Filter or method called with the wrong number of arguments
    #[error("{function} expects {expected} argument(s), got {found}")]
    Arity {
        function: String,
        expected: usize,
        found: usize,
    },

    /// Operation applied to an unsupported value
    #[error("cannot apply {operation} to {found}")]
    TypeMismatch { operation: String, found: ValueKind },

    /// Placeholders still present after the maximum number of evaluations
    #[error(
        "Too much nesting in value {value}. It may be result of recursive transitive expressions."
    )]
    NestingExceeded { value: String, attempts: usize },

    /// Template engine failed and the legacy fallback failed too
    #[error("template engine: {template}; legacy engine: {legacy}")]
    EnginesFailed {
        template: Box<ExpressionError>,
        legacy: Box<ExpressionError>,
    },

    /// Strict-pass failure for one parameter
    #[error("could not process expression for parameter {key} with value: {value}: {source}")]
    Unresolved {
        key: String,
        value: String,
        #[source]
        source: Box<ExpressionError>,
    },

    /// Credential lookups through `cmdb.creds[...]` are not available
    #[error("expressions started with \"cmdb\" are not supported (parameter {key}, value: {value})")]
    UnsupportedExpression { key: String, value: String },
}

impl ExpressionError {
    /// Create syntax error for an expression
    pub fn syntax(expression: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Syntax {
            expression: expression.into(),
            message: message.into(),
        }
    }

    /// Create unknown variable error
    pub fn unknown_variable(name: impl Into<String>) -> Self {
        Self::UnknownVariable(name.into())
    }

    /// Create type mismatch error
    pub fn type_mismatch(operation: impl Into<String>, found: ValueKind) -> Self {
        Self::TypeMismatch {
            operation: operation.into(),
            found,
        }
    }

    /// Check whether the nesting bound was hit anywhere in the chain
    #[must_use]
    pub fn is_nesting_exceeded(&self) -> bool {
        self.nesting_attempts().is_some()
    }

    /// Number of evaluations made before the nesting bound stopped resolution
    #[must_use]
    pub fn nesting_attempts(&self) -> Option<usize> {
        match self {
            Self::NestingExceeded { attempts, .. } => Some(*attempts),
            Self::EnginesFailed { template, legacy } => legacy
                .nesting_attempts()
                .or_else(|| template.nesting_attempts()),
            Self::Unresolved { source, .. } => source.nesting_attempts(),
            _ => None,
        }
    }

    /// Check for a per-parameter strict-pass failure
    #[inline]
    #[must_use]
    pub fn is_parameter_failure(&self) -> bool {
        matches!(
            self,
            Self::Unresolved { .. } | Self::UnsupportedExpression { .. }
        )
    }
}

/// Result type for expression operations
pub type Result<T> = std::result::Result<T, ExpressionError>;
