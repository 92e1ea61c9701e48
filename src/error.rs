//! Crate-wide error type and its HTTP mapping.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
};
use tracing::error;

pub type Result<T> = std::result::Result<T, Error>;

/// Errors surfaced by the domain services.
///
/// Storage and decryption failures carry internal detail that must never reach
/// a client; their HTTP mapping logs the cause and answers with a bare 500.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// Unknown email or wrong password. Deliberately indistinguishable.
    #[error("invalid credentials")]
    InvalidCredentials,

    /// The account exists and the password matched, but the user is disabled.
    #[error("account disabled")]
    AccountDisabled,

    /// Wrong code, or a stale or unknown challenge reference. One error kind
    /// for all three so callers cannot probe which it was.
    #[error("invalid mfa code")]
    InvalidMfaCode,

    /// The caller's role sits below the required rung.
    #[error("insufficient role")]
    Forbidden,

    /// Missing record, or a record owned by another organization.
    #[error("not found")]
    NotFound,

    /// No invitation matches the presented token.
    #[error("invitation not found")]
    InviteNotFound,

    /// The invitation exists but was already accepted or its window passed.
    #[error("invitation expired")]
    InviteExpired,

    /// A uniqueness or state conflict (duplicate email, MFA already enabled).
    #[error("{0}")]
    Conflict(String),

    /// Malformed or missing input.
    #[error("{0}")]
    Validation(String),

    /// Stored ciphertext failed to decrypt under the configured key.
    #[error("decryption failed")]
    Decryption,

    #[error("storage error: {0}")]
    Storage(anyhow::Error),
}

impl From<anyhow::Error> for Error {
    fn from(err: anyhow::Error) -> Self {
        Self::Storage(err)
    }
}

impl Error {
    pub fn validation(message: impl Into<String>) -> Self {
        Self::Validation(message.into())
    }

    pub fn conflict(message: impl Into<String>) -> Self {
        Self::Conflict(message.into())
    }
}

impl IntoResponse for Error {
    fn into_response(self) -> Response {
        match self {
            Self::InvalidCredentials | Self::InvalidMfaCode => {
                (StatusCode::UNAUTHORIZED, self.to_string()).into_response()
            }
            Self::AccountDisabled | Self::Forbidden => {
                (StatusCode::FORBIDDEN, self.to_string()).into_response()
            }
            Self::NotFound | Self::InviteNotFound => {
                (StatusCode::NOT_FOUND, self.to_string()).into_response()
            }
            Self::InviteExpired => (StatusCode::GONE, self.to_string()).into_response(),
            Self::Conflict(message) => (StatusCode::CONFLICT, message).into_response(),
            Self::Validation(message) => (StatusCode::BAD_REQUEST, message).into_response(),
            Self::Decryption => {
                error!("Failed to decrypt stored credential");
                StatusCode::INTERNAL_SERVER_ERROR.into_response()
            }
            Self::Storage(err) => {
                error!("Storage error: {err}");
                StatusCode::INTERNAL_SERVER_ERROR.into_response()
            }
        }
    }
}
