mod extractors;
mod lookup;
/// Authentication middleware
pub mod middleware;
/// Password hashing and verification
pub mod password;
/// Session storage and cookies
pub mod sessions;

use axum::{http::StatusCode, response::IntoResponse};
pub use extractors::*;
pub use lookup::AuthLookup;
pub use sessions::*;
use thiserror::Error;

use crate::{errors::HttpError, make_id};

make_id!(
    /// The ID of a registered user
    UserId
);

/// An error related to authentication
#[derive(Debug, Error)]
pub enum AuthError {
    /// The user is not logged in
    #[error("Unauthorized")]
    Unauthenticated,
    /// The username or password did not match
    #[error("Invalid username or password")]
    InvalidCredentials,
    /// The password hasher failed to run
    #[error("Failed to hash password: {0}")]
    PasswordHasherError(String),
    /// The session backend failed
    #[error("Session backend error")]
    SessionBackend,
}

impl AuthError {
    /// Return true if this error means that no valid user is present
    pub fn is_unauthenticated(&self) -> bool {
        matches!(self, Self::Unauthenticated | Self::InvalidCredentials)
    }
}

impl HttpError for AuthError {
    fn status_code(&self) -> StatusCode {
        match self {
            Self::Unauthenticated | Self::InvalidCredentials => StatusCode::UNAUTHORIZED,
            Self::PasswordHasherError(_) | Self::SessionBackend => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }

    fn error_kind(&self) -> &'static str {
        match self {
            Self::Unauthenticated => "unauthenticated",
            Self::InvalidCredentials => "invalid_credentials",
            Self::PasswordHasherError(_) => "password_hasher",
            Self::SessionBackend => "session_backend",
        }
    }
}

impl IntoResponse for AuthError {
    fn into_response(self) -> axum::response::Response {
        self.to_response()
    }
}
