//! Common error types for citadel

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Common result type for citadel operations
pub type Result<T> = std::result::Result<T, Error>;

/// A field-level failure attached to a validation error.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Detail {
    pub field: String,
    pub error: String,
}

/// Closed error taxonomy shared across the citadel services.
///
/// Every error maps to an HTTP status via [`Error::status`]; the API layer
/// renders that status together with the JSON error envelope.
#[derive(Debug, Error)]
pub enum Error {
    #[error("not found: {0}")]
    NotFound(String),

    #[error("conflict: {0}")]
    Conflict(String),

    #[error("{message}")]
    Invalid {
        status: u16,
        message: String,
        details: Vec<Detail>,
    },

    #[error("upstream failure ({status}): {message}")]
    Upstream { status: u16, message: String },

    #[error("rate limited: {0}")]
    RateLimit(String),

    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("configuration error: {0}")]
    Config(String),

    #[error("internal error: {0}")]
    Internal(String),
}

impl Error {
    /// A 400 validation failure.
    pub fn invalid(message: impl Into<String>) -> Self {
        Error::Invalid {
            status: 400,
            message: message.into(),
            details: Vec::new(),
        }
    }

    /// A 422 validation failure (well-formed input that fails a policy check).
    pub fn unprocessable(message: impl Into<String>) -> Self {
        Error::Invalid {
            status: 422,
            message: message.into(),
            details: Vec::new(),
        }
    }

    /// A 401 for requests missing a valid session.
    pub fn unauthenticated() -> Self {
        Error::Invalid {
            status: 401,
            message: "authentication required".to_string(),
            details: Vec::new(),
        }
    }

    pub fn with_detail(mut self, field: impl Into<String>, error: impl Into<String>) -> Self {
        if let Error::Invalid { details, .. } = &mut self {
            details.push(Detail {
                field: field.into(),
                error: error.into(),
            });
        }
        self
    }

    /// The HTTP status this error surfaces as at the API edge.
    pub fn status(&self) -> u16 {
        match self {
            Error::NotFound(_) => 404,
            Error::Conflict(_) => 409,
            Error::Invalid { status, .. } => *status,
            Error::Upstream { .. } => 502,
            Error::RateLimit(_) => 429,
            Error::Database(_) | Error::Config(_) | Error::Internal(_) => 500,
        }
    }

    /// The details attached to this error, if any.
    pub fn details(&self) -> &[Detail] {
        match self {
            Error::Invalid { details, .. } => details,
            _ => &[],
        }
    }

    /// Whether the underlying failure is SQLite lock contention.
    pub fn is_locked(&self) -> bool {
        match self {
            Error::Database(err) => err.to_string().contains("database is locked"),
            _ => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_mapping() {
        assert_eq!(Error::NotFound("x".into()).status(), 404);
        assert_eq!(Error::Conflict("x".into()).status(), 409);
        assert_eq!(Error::invalid("x").status(), 400);
        assert_eq!(Error::unprocessable("x").status(), 422);
        assert_eq!(Error::unauthenticated().status(), 401);
        assert_eq!(
            Error::Upstream {
                status: 500,
                message: "x".into()
            }
            .status(),
            502
        );
        assert_eq!(Error::RateLimit("x".into()).status(), 429);
        assert_eq!(Error::Internal("x".into()).status(), 500);
    }

    #[test]
    fn details_accumulate() {
        let err = Error::invalid("bad request").with_detail("feed_url", "is required");
        assert_eq!(err.details().len(), 1);
        assert_eq!(err.details()[0].field, "feed_url");
    }

    #[test]
    fn non_invalid_errors_carry_no_details() {
        let err = Error::Conflict("dup".into()).with_detail("f", "e");
        assert!(err.details().is_empty());
    }
}
