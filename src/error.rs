//! Error types shared across the crate.
//!
//! Mirrors the five error kinds the gateway maps to HTTP status codes:
//! `InvalidArgument` (400), `NotFound` (404), `Conflict` (409),
//! `Unavailable` (503, degrades silently where the spec requires it) and
//! `Internal` (500). The hybrid search engine and the event bus never
//! surface these for a failed retrieval leg or handler — they log and
//! degrade instead; only the authority/taxonomy services and request
//! validation raise them to the caller.

use thiserror::Error;

/// Crate-wide error type.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum NeoError {
    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    #[error("not found: {0}")]
    NotFound(String),

    #[error("conflict: {0}")]
    Conflict(String),

    #[error("unavailable: {0}")]
    Unavailable(String),

    #[error("internal error: {0}")]
    Internal(String),
}

/// Result alias used throughout the crate.
pub type NeoResult<T> = Result<T, NeoError>;

impl NeoError {
    /// Stable status-code-like tag for gateway mapping (see spec §7).
    pub fn kind(&self) -> &'static str {
        match self {
            NeoError::InvalidArgument(_) => "InvalidArgument",
            NeoError::NotFound(_) => "NotFound",
            NeoError::Conflict(_) => "Conflict",
            NeoError::Unavailable(_) => "Unavailable",
            NeoError::Internal(_) => "Internal",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn kind_matches_variant() {
        assert_eq!(NeoError::InvalidArgument("x".into()).kind(), "InvalidArgument");
        assert_eq!(NeoError::NotFound("x".into()).kind(), "NotFound");
        assert_eq!(NeoError::Conflict("x".into()).kind(), "Conflict");
        assert_eq!(NeoError::Unavailable("x".into()).kind(), "Unavailable");
        assert_eq!(NeoError::Internal("x".into()).kind(), "Internal");
    }
}
