//! Named failure categories for repository and configuration work.
//!
//! Tracker fetch failures do not appear here; they become error tasks.

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum EvidenceError {
    #[error("git operation '{operation}' failed: {reason}")]
    Git { operation: String, reason: String },

    #[error("validation failed for {field}='{value}': {reason}")]
    Validation {
        field: String,
        value: String,
        reason: String,
    },
}

impl EvidenceError {
    pub fn git(operation: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::Git {
            operation: operation.into(),
            reason: reason.into(),
        }
    }

    pub fn validation(
        field: impl Into<String>,
        value: impl Into<String>,
        reason: impl Into<String>,
    ) -> Self {
        Self::Validation {
            field: field.into(),
            value: value.into(),
            reason: reason.into(),
        }
    }

    /// The git operation that failed, for version-control errors.
    pub fn operation(&self) -> Option<&str> {
        match self {
            Self::Git { operation, .. } => Some(operation),
            Self::Validation { .. } => None,
        }
    }

    /// The offending field, for validation errors.
    pub fn field(&self) -> Option<&str> {
        match self {
            Self::Validation { field, .. } => Some(field),
            Self::Git { .. } => None,
        }
    }

    pub fn is_git(&self) -> bool {
        matches!(self, Self::Git { .. })
    }
}

pub type Result<T> = std::result::Result<T, EvidenceError>;
