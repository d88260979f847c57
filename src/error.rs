//! Error types for spec loading, interaction and extraction

use thiserror::Error;

/// Failures raised by a `LiveDocument` implementation
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum DocumentError {
    /// The node path no longer addresses an element in the current snapshot
    #[error("node path {0:?} does not address an element")]
    StaleNode(Vec<usize>),
    /// The host failed to dispatch the activation
    #[error("activation failed: {0}")]
    Activation(String),
}

/// Errors surfaced by the extraction engine.
///
/// Only `SpecNotFound`, `Timeout`, `Document` and `Cancelled` end a run. The
/// remaining variants are built so the condition can be logged with a stable
/// message, then absorbed.
#[derive(Debug, Error)]
pub enum ExtractError {
    #[error("no extraction spec for document type `{doc_type}`: {reason}")]
    SpecNotFound { doc_type: String, reason: String },

    #[error("timed out after {timeout_ms}ms waiting for {context}")]
    Timeout { context: String, timeout_ms: u64 },

    #[error("malformed cleanup pattern `{pattern}`: {source}")]
    MalformedCleanupPattern {
        pattern: String,
        #[source]
        source: regex::Error,
    },

    #[error("unknown action step `{0}`")]
    UnknownActionStep(String),

    #[error(transparent)]
    Document(#[from] DocumentError),

    #[error("extraction run was cancelled")]
    Cancelled,
}

impl ExtractError {
    pub fn spec_not_found(doc_type: &str, reason: impl Into<String>) -> Self {
        ExtractError::SpecNotFound {
            doc_type: doc_type.to_string(),
            reason: reason.into(),
        }
    }

    pub fn timeout(context: impl Into<String>, timeout_ms: u64) -> Self {
        ExtractError::Timeout {
            context: context.into(),
            timeout_ms,
        }
    }

    /// Whether this error aborts an extraction run
    pub fn is_fatal(&self) -> bool {
        !matches!(
            self,
            ExtractError::MalformedCleanupPattern { .. } | ExtractError::UnknownActionStep(_)
        )
    }
}

pub type Result<T, E = ExtractError> = std::result::Result<T, E>;
