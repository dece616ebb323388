//! Unified error types and result handling.
//!
//! Every failure the transfer protocol can report is a variant of [`Error`].
//! The HTTP layer that sits on top of this crate only needs [`Error::kind`] to
//! pick a status code; the variant itself carries the user-facing message.

use sea_orm::{DbErr, SqlErr};
use thiserror::Error;

/// Coarse classification used by callers to map errors to responses.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// Unknown TAC, transfer, student or placement.
    NotFound,
    /// The request collides with the current state of the transfer.
    Conflict,
    /// The request is well-formed but not acceptable.
    BadRequest,
    /// The acting school is not a party allowed to do this.
    Forbidden,
    /// Storage or configuration failure.
    Internal,
}

/// Errors produced by the transfer protocol.
#[derive(Debug, Error)]
pub enum Error {
    /// A referenced record does not exist
    #[error("{entity} not found: {id}")]
    NotFound {
        /// Kind of record (e.g. "transfer", "student")
        entity: &'static str,
        /// Identifier that was looked up
        id: String,
    },

    /// The operation conflicts with the transfer's state
    #[error("Conflict: {message}")]
    Conflict {
        /// Description of the conflict
        message: String,
    },

    /// The request was rejected by validation
    #[error("Bad request: {message}")]
    BadRequest {
        /// Description of the failed validation
        message: String,
    },

    /// The acting school may not perform this operation
    #[error("Forbidden: {message}")]
    Forbidden {
        /// Description of the missing permission
        message: String,
    },

    /// No unique TAC could be produced within the attempt bound
    #[error("Could not generate a unique transfer access code after {attempts} attempts")]
    TokenGenerationExhausted {
        /// Number of attempts made
        attempts: u32,
    },

    /// Invalid or unreadable configuration
    #[error("Configuration error: {message}")]
    Config {
        /// Description of the configuration problem
        message: String,
    },

    /// Storage failure
    #[error("Database error: {0}")]
    Database(#[from] DbErr),
}

impl Error {
    /// Classifies the error for the API layer.
    #[must_use]
    pub const fn kind(&self) -> ErrorKind {
        match self {
            Self::NotFound { .. } => ErrorKind::NotFound,
            Self::Conflict { .. } => ErrorKind::Conflict,
            Self::BadRequest { .. } | Self::TokenGenerationExhausted { .. } => {
                ErrorKind::BadRequest
            }
            Self::Forbidden { .. } => ErrorKind::Forbidden,
            Self::Config { .. } | Self::Database(_) => ErrorKind::Internal,
        }
    }

    pub(crate) fn not_found(entity: &'static str, id: impl ToString) -> Self {
        Self::NotFound {
            entity,
            id: id.to_string(),
        }
    }

    pub(crate) fn conflict(message: impl Into<String>) -> Self {
        Self::Conflict {
            message: message.into(),
        }
    }

    pub(crate) fn bad_request(message: impl Into<String>) -> Self {
        Self::BadRequest {
            message: message.into(),
        }
    }

    pub(crate) fn forbidden(message: impl Into<String>) -> Self {
        Self::Forbidden {
            message: message.into(),
        }
    }
}

/// Returns true when the storage error is a unique-constraint violation.
#[must_use]
pub fn is_unique_violation(err: &DbErr) -> bool {
    matches!(err.sql_err(), Some(SqlErr::UniqueConstraintViolation(_)))
}

/// Convenience `Result` type
pub type Result<T> = std::result::Result<T, Error>;
