//! Authentication error types.

use thiserror::Error;

use gemvault_core::{EmailError, ValidationErrors};

use crate::api::ApiError;

/// Errors that can occur during authentication operations.
#[derive(Debug, Error)]
pub enum AuthError {
    /// No access token in the session.
    #[error("not signed in")]
    NotAuthenticated,

    /// Invalid email format.
    #[error("invalid email: {0}")]
    InvalidEmail(#[from] EmailError),

    /// Registration form problems.
    #[error("{0}")]
    Validation(#[from] ValidationErrors),

    /// Profile refresh failed.
    #[error("profile refresh failed: {0}")]
    Refresh(#[source] ApiError),

    /// Backend call failed.
    #[error(transparent)]
    Api(#[from] ApiError),

    /// Session store operation failed.
    #[error("session error: {0}")]
    Session(#[from] tower_sessions::session::Error),
}

impl AuthError {
    /// Message suitable for an alert banner.
    #[must_use]
    pub fn user_message(&self) -> String {
        match self {
            Self::NotAuthenticated => "Please sign in to continue.".to_string(),
            Self::InvalidEmail(_) => "Please enter a valid email address.".to_string(),
            Self::Validation(errors) => errors
                .iter()
                .map(|e| e.message.as_str())
                .collect::<Vec<_>>()
                .join(". "),
            Self::Refresh(err) => format!("Could not refresh your profile. {}", err.user_message()),
            Self::Api(ApiError::Unauthorized) => "Invalid email or password.".to_string(),
            Self::Api(err) => err.user_message(),
            Self::Session(_) => "Your session could not be saved. Please try again.".to_string(),
        }
    }
}
