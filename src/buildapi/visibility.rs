//! HTTP client for the builder visibility service.

use std::time::Duration;

use reqwest::header::ACCEPT;
use tracing::instrument;

use super::error::BuildApiError;
use super::retry::{RetryConfig, retry_with_backoff};
use super::services::{BuilderVisibility, BuilderVisibilityRecord};
use crate::types::{Branch, Revision};

/// Client for `GET {root}/{branch}/rev/{revision}/builders`.
#[derive(Debug, Clone)]
pub struct VisibilityClient {
    http: reqwest::Client,
    root: String,
    retry: RetryConfig,
}

impl VisibilityClient {
    pub fn new(root: impl Into<String>, timeout: Duration) -> Result<Self, BuildApiError> {
        let http = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(BuildApiError::from_reqwest)?;

        Ok(VisibilityClient {
            http,
            root: root.into().trim_end_matches('/').to_string(),
            retry: RetryConfig::DEFAULT,
        })
    }

    pub fn with_retry_config(mut self, retry: RetryConfig) -> Self {
        self.retry = retry;
        self
    }
}

impl BuilderVisibility for VisibilityClient {
    #[instrument(skip(self), fields(branch = %branch, revision = %revision))]
    async fn builders(
        &self,
        branch: &Branch,
        revision: &Revision,
    ) -> Result<Vec<BuilderVisibilityRecord>, BuildApiError> {
        let url = format!("{}/{}/rev/{}/builders", self.root, branch, revision);
        let (http, url) = (&self.http, &url);

        retry_with_backoff(self.retry, move || async move {
            http.get(url)
                .header(ACCEPT, "application/json")
                .send()
                .await
                .map_err(BuildApiError::from_reqwest)?
                .error_for_status()
                .map_err(BuildApiError::from_reqwest)?
                .json()
                .await
                .map_err(BuildApiError::from_reqwest)
        })
        .await
    }
}
