//! Quotation endpoints.

use reqwest::Method;
use secrecy::SecretString;
use tracing::instrument;

use gemvault_core::{Quotation, QuotationDecision, QuotationId, QuotationInput, QuotationStatus};

use super::types::Payload;
use super::{ApiClient, ApiError};

impl ApiClient {
    /// Submit a price inquiry.
    ///
    /// # Errors
    ///
    /// Returns an error if the API request fails.
    #[instrument(skip(self, token, input))]
    pub async fn create_quotation(
        &self,
        token: &SecretString,
        input: &QuotationInput,
    ) -> Result<Quotation, ApiError> {
        let url = self.endpoint(&["api", "quotations"])?;
        let payload: Payload<Quotation> = self
            .send(self.request(Method::POST, url, Some(token)).json(input))
            .await?;
        Ok(payload.into_inner())
    }

    /// The signed-in user's quotations.
    ///
    /// # Errors
    ///
    /// Returns an error if the API request fails.
    #[instrument(skip(self, token))]
    pub async fn my_quotations(&self, token: &SecretString) -> Result<Vec<Quotation>, ApiError> {
        let url = self.endpoint(&["api", "quotations", "mine"])?;
        let payload: Payload<Vec<Quotation>> =
            self.send(self.request(Method::GET, url, Some(token))).await?;
        Ok(payload.into_inner())
    }

    /// Every quotation, optionally filtered by status (staff only).
    ///
    /// # Errors
    ///
    /// Returns an error if the API request fails.
    #[instrument(skip(self, token))]
    pub async fn all_quotations(
        &self,
        token: &SecretString,
        status: Option<QuotationStatus>,
    ) -> Result<Vec<Quotation>, ApiError> {
        let mut url = self.endpoint(&["api", "quotations"])?;
        if let Some(status) = status {
            url.query_pairs_mut().append_pair("status", status.as_str());
        }
        let payload: Payload<Vec<Quotation>> =
            self.send(self.request(Method::GET, url, Some(token))).await?;
        Ok(payload.into_inner())
    }

    /// Record a staff decision on a quotation.
    ///
    /// # Errors
    ///
    /// Returns an error if the API request fails.
    #[instrument(skip(self, token, decision), fields(quotation_id = %id, status = %decision.status))]
    pub async fn decide_quotation(
        &self,
        token: &SecretString,
        id: &QuotationId,
        decision: &QuotationDecision,
    ) -> Result<Quotation, ApiError> {
        let url = self.endpoint(&["api", "quotations", id.as_str(), "status"])?;
        let payload: Payload<Quotation> = self
            .send(self.request(Method::PUT, url, Some(token)).json(decision))
            .await?;
        Ok(payload.into_inner())
    }
}
