//! Authentication and profile endpoints.

use reqwest::Method;
use secrecy::SecretString;
use serde::Serialize;
use tracing::instrument;

use gemvault_core::{Email, Registration, User};

use super::types::{Ack, LoginResponse, UserPayload};
use super::{ApiClient, ApiError};

#[derive(Serialize)]
struct Credentials<'a> {
    email: &'a str,
    password: &'a str,
}

impl ApiClient {
    /// Exchange credentials for a user and access token.
    ///
    /// # Errors
    ///
    /// Returns [`ApiError::Unauthorized`] for bad credentials.
    #[instrument(skip(self, email, password), fields(email_domain = %email.domain()))]
    pub async fn login(&self, email: &Email, password: &str) -> Result<LoginResponse, ApiError> {
        let url = self.endpoint(&["api", "auth", "login"])?;
        let body = Credentials {
            email: email.as_str(),
            password,
        };
        self.send(self.request(Method::POST, url, None).json(&body))
            .await
    }

    /// Submit a registration. New accounts start out pending approval.
    ///
    /// # Errors
    ///
    /// Returns an error if the API request fails (for example, a duplicate email).
    #[instrument(skip(self, registration))]
    pub async fn register(&self, registration: &Registration) -> Result<Option<String>, ApiError> {
        let url = self.endpoint(&["api", "auth", "register"])?;
        let ack: Ack = self
            .send(self.request(Method::POST, url, None).json(registration))
            .await?;
        Ok(ack.message)
    }

    /// Invalidate the access token on the backend.
    ///
    /// # Errors
    ///
    /// Returns an error if the API request fails.
    #[instrument(skip(self, token))]
    pub async fn logout(&self, token: &SecretString) -> Result<(), ApiError> {
        let url = self.endpoint(&["api", "auth", "logout"])?;
        self.send_empty(self.request(Method::POST, url, Some(token)))
            .await
    }

    /// The signed-in user's current profile.
    ///
    /// # Errors
    ///
    /// Returns [`ApiError::Unauthorized`] if the token is no longer valid.
    #[instrument(skip(self, token))]
    pub async fn profile(&self, token: &SecretString) -> Result<User, ApiError> {
        let url = self.endpoint(&["profile"])?;
        let payload: UserPayload = self.send(self.request(Method::GET, url, Some(token))).await?;
        Ok(payload.into_user())
    }
}
