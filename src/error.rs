//! Error taxonomy for the assistant core.
//!
//! The guiding rule: errors local to a single context source are absorbed at
//! that source's call site and never reach the caller. Only provider
//! exhaustion and unknown-session lookups cross the API boundary, and both do
//! so as structured values rather than panics.

use thiserror::Error;

/// Failure of a single language-model backend.
#[derive(Debug, Error)]
pub enum ProviderError {
    /// The backend could not be reached or returned a non-success status.
    #[error("provider {provider} unavailable: {reason}")]
    Unavailable { provider: String, reason: String },

    /// The backend did not answer within its generation timeout.
    #[error("provider {provider} timed out after {seconds}s")]
    Timeout { provider: String, seconds: u64 },
}

impl ProviderError {
    /// Name of the provider that failed.
    pub fn provider(&self) -> &str {
        match self {
            Self::Unavailable { provider, .. } | Self::Timeout { provider, .. } => provider,
        }
    }
}

/// Failure of the vector-search service. Callers in the context assembler
/// treat any variant as "no results".
#[derive(Debug, Error)]
pub enum IndexError {
    #[error("vector index unavailable: {0}")]
    Unavailable(String),

    #[error("vector index timed out after {0}s")]
    Timeout(u64),

    #[error("unexpected index response: {0}")]
    BadResponse(String),
}

/// Errors surfaced by the chat orchestrator and session operations.
#[derive(Debug, Error)]
pub enum FamulusError {
    /// Every configured provider failed for this request. Carries the
    /// per-provider failure messages in attempt order.
    #[error("all providers exhausted ({})", attempts.join("; "))]
    AllProvidersExhausted { attempts: Vec<String> },

    /// Lookup of an unknown session id.
    #[error("session not found: {id}")]
    SessionNotFound { id: String },

    /// A side-channel write (memory document, decision log) failed. Logged
    /// and swallowed on the chat path; surfaced only by explicit admin calls.
    #[error("persist failed: {0}")]
    Persist(String),
}

impl FamulusError {
    /// Stable machine-readable code for the HTTP layer.
    pub fn code(&self) -> &'static str {
        match self {
            Self::AllProvidersExhausted { .. } => "all_providers_exhausted",
            Self::SessionNotFound { .. } => "session_not_found",
            Self::Persist(_) => "persist_error",
        }
    }
}
