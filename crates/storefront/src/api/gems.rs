//! Gem inventory endpoints.

use reqwest::Method;
use secrecy::SecretString;
use tracing::instrument;

use gemvault_core::query::{GemPage, GemQuery, PageMeta};
use gemvault_core::{Gem, GemId, GemInput, StockId};

use super::types::{GemList, GemPayload, UploadResponse};
use super::uploads::{AssetKind, UploadBatch};
use super::{ApiClient, ApiError};

impl ApiClient {
    /// One page of gems matching `query`.
    ///
    /// Uses `/api/gems/search` when the query carries search text, otherwise
    /// `/api/gems`. Filters go out as repeated query keys.
    ///
    /// # Errors
    ///
    /// Returns an error if the API request fails.
    #[instrument(skip(self, token, query), fields(page = query.page, search = query.is_search()))]
    pub async fn list_gems(
        &self,
        token: Option<&SecretString>,
        query: &GemQuery,
    ) -> Result<GemPage, ApiError> {
        let segments: &[&str] = if query.is_search() {
            &["api", "gems", "search"]
        } else {
            &["api", "gems"]
        };
        let mut url = self.endpoint(segments)?;
        url.query_pairs_mut().extend_pairs(query.to_query_pairs());

        let list: GemList = self.send(self.request(Method::GET, url, token)).await?;
        let total = list.total_count();
        Ok(GemPage {
            gems: list.data,
            meta: PageMeta::new(query.page, query.page_size, total),
        })
    }

    /// A single gem by backend id.
    ///
    /// # Errors
    ///
    /// Returns [`ApiError::NotFound`] if no such gem exists.
    #[instrument(skip(self, token), fields(gem_id = %id))]
    pub async fn get_gem(&self, token: Option<&SecretString>, id: &GemId) -> Result<Gem, ApiError> {
        let url = self.endpoint(&["api", "gems", id.as_str()])?;
        let payload: GemPayload = self.send(self.request(Method::GET, url, token)).await?;
        Ok(payload.into_gem())
    }

    /// Create a gem.
    ///
    /// # Errors
    ///
    /// Returns an error if the API request fails.
    #[instrument(skip(self, token, input), fields(stock_id = %input.stock_id))]
    pub async fn create_gem(&self, token: &SecretString, input: &GemInput) -> Result<Gem, ApiError> {
        let url = self.endpoint(&["api", "gems", "create"])?;
        let payload: GemPayload = self
            .send(self.request(Method::POST, url, Some(token)).json(input))
            .await?;
        self.invalidate_filter_options();
        Ok(payload.into_gem())
    }

    /// Replace a gem's fields.
    ///
    /// # Errors
    ///
    /// Returns an error if the API request fails.
    #[instrument(skip(self, token, input), fields(gem_id = %id))]
    pub async fn update_gem(
        &self,
        token: &SecretString,
        id: &GemId,
        input: &GemInput,
    ) -> Result<Gem, ApiError> {
        let url = self.endpoint(&["api", "gems", id.as_str()])?;
        let payload: GemPayload = self
            .send(self.request(Method::PUT, url, Some(token)).json(input))
            .await?;
        self.invalidate_filter_options();
        Ok(payload.into_gem())
    }

    /// Delete a gem.
    ///
    /// # Errors
    ///
    /// Returns an error if the API request fails.
    #[instrument(skip(self, token), fields(gem_id = %id))]
    pub async fn delete_gem(&self, token: &SecretString, id: &GemId) -> Result<(), ApiError> {
        let url = self.endpoint(&["api", "gems", id.as_str()])?;
        self.send_empty(self.request(Method::DELETE, url, Some(token)))
            .await?;
        self.invalidate_filter_options();
        Ok(())
    }

    /// Append an encoded batch of files to a gem's asset list.
    ///
    /// Returns the URLs the backend reports for the stored files.
    ///
    /// # Errors
    ///
    /// Returns an error if the API request fails.
    #[instrument(skip(self, token, batch), fields(kind = %kind, stock_id = %stock_id, files = batch.len()))]
    pub async fn upload_assets(
        &self,
        token: &SecretString,
        kind: AssetKind,
        stock_id: &StockId,
        batch: &UploadBatch,
    ) -> Result<Vec<String>, ApiError> {
        let url = self.endpoint(&[
            "api",
            "gems",
            "S3Bucket",
            "insert",
            kind.as_str(),
            stock_id.as_str(),
        ])?;
        let response: UploadResponse = self
            .send(self.request(Method::POST, url, Some(token)).json(batch))
            .await?;
        tracing::info!(stored = response.urls.len(), "Uploaded gem assets");
        Ok(response.urls)
    }
}
