//! Error types for the rules crate.
//!
//! All of these surface at startup while the route table is compiled;
//! nothing in this crate fails at request time.

use std::fmt;

/// Errors from compiling rules and matcher expressions.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RuleError {
    /// A rule has an empty name.
    EmptyName,
    /// Two rules share a name.
    DuplicateName { name: String },
    /// A rule has no matcher expression.
    EmptyExpression { rule: String },
    /// The expression could not be parsed.
    Syntax {
        expression: String,
        position: usize,
        reason: String,
    },
    /// The expression calls a matcher that does not exist.
    UnknownMatcher { name: String },
    /// A matcher was called without arguments.
    MissingArguments { matcher: String },
    /// A host or path template does not compile.
    InvalidPattern { pattern: String, reason: String },
}

impl RuleError {
    pub(crate) fn syntax(expression: &str, position: usize, reason: impl Into<String>) -> Self {
        Self::Syntax {
            expression: expression.to_string(),
            position,
            reason: reason.into(),
        }
    }
}

impl fmt::Display for RuleError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::EmptyName => write!(f, "route name is required"),
            Self::DuplicateName { name } => write!(f, "duplicate rule name '{name}'"),
            Self::EmptyExpression { rule } => write!(f, "rule '{rule}' has no match expression"),
            Self::Syntax {
                expression,
                position,
                reason,
            } => write!(
                f,
                "invalid rule expression '{expression}' at offset {position}: {reason}"
            ),
            Self::UnknownMatcher { name } => write!(f, "unknown matcher '{name}'"),
            Self::MissingArguments { matcher } => {
                write!(f, "matcher '{matcher}' needs at least one argument")
            }
            Self::InvalidPattern { pattern, reason } => {
                write!(f, "invalid pattern '{pattern}': {reason}")
            }
        }
    }
}

impl std::error::Error for RuleError {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn syntax_error_display() {
        let err = RuleError::syntax("Host(`a`", 8, "expected ')'");
        let text = err.to_string();
        assert!(text.contains("Host(`a`"));
        assert!(text.contains("offset 8"));
        assert!(text.contains("expected ')'"));
    }

    #[test]
    fn empty_name_display() {
        assert_eq!(RuleError::EmptyName.to_string(), "route name is required");
    }
}
