//! Error types for the mirrorcal ecosystem.

use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

/// How a provider call failed, as reported across the adapter boundary.
///
/// The reconciliation engine keys its behavior off this: `RateLimited` and
/// `Transient` are retried on the next pass, `Unauthorized` aborts the
/// calendar's pass, and `NotFound` on a delete counts as already satisfied.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProviderErrorKind {
    RateLimited,
    Unauthorized,
    NotFound,
    Transient,
}

impl fmt::Display for ProviderErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ProviderErrorKind::RateLimited => write!(f, "rate limited"),
            ProviderErrorKind::Unauthorized => write!(f, "unauthorized"),
            ProviderErrorKind::NotFound => write!(f, "not found"),
            ProviderErrorKind::Transient => write!(f, "transient"),
        }
    }
}

/// Errors that can occur in mirrorcal operations.
#[derive(Error, Debug)]
pub enum MirrorError {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Calendar not found: {0}")]
    CalendarNotFound(String),

    #[error("Provider error ({kind}): {message}")]
    Provider {
        kind: ProviderErrorKind,
        message: String,
    },

    #[error("Provider '{0}' not found in PATH")]
    ProviderNotInstalled(String),

    #[error("Provider request timed out after {0}s")]
    ProviderTimeout(u64),

    #[error("Duplicate correlation id: {0}")]
    DuplicateCorrelationId(String),

    #[error("No record for correlation id: {0}")]
    RecordNotFound(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(String),
}

/// Result type alias for mirrorcal operations.
pub type MirrorResult<T> = Result<T, MirrorError>;

impl MirrorError {
    pub fn provider(kind: ProviderErrorKind, message: impl Into<String>) -> Self {
        MirrorError::Provider {
            kind,
            message: message.into(),
        }
    }

    /// Whether retrying the failed operation (this pass or the next) can
    /// succeed without operator action.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            MirrorError::Provider {
                kind: ProviderErrorKind::RateLimited | ProviderErrorKind::Transient,
                ..
            } | MirrorError::ProviderTimeout(_)
        )
    }

    pub fn is_unauthorized(&self) -> bool {
        matches!(
            self,
            MirrorError::Provider {
                kind: ProviderErrorKind::Unauthorized,
                ..
            }
        )
    }

    pub fn is_not_found(&self) -> bool {
        matches!(
            self,
            MirrorError::Provider {
                kind: ProviderErrorKind::NotFound,
                ..
            }
        )
    }
}
