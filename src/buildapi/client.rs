//! HTTP client for the self-serve build API.

use std::time::Duration;

use chrono::NaiveDate;
use reqwest::header::ACCEPT;
use serde::de::DeserializeOwned;
use tracing::{debug, info, instrument};

use super::error::BuildApiError;
use super::records::{BuildRecord, RebuildTarget};
use super::retry::{RetryConfig, retry_with_backoff};
use super::services::{BuildLookup, RebuildTrigger};
use crate::config::Credential;
use crate::stats::Job;
use crate::types::{Branch, Revision};

const APPLICATION_JSON: &str = "application/json";

/// Authenticated client for `{root}/{branch}/...` endpoints.
///
/// Lookups are retried on transient failures. Rebuild requests are sent
/// once: a timeout or gateway error says nothing about whether the runs were
/// already queued.
#[derive(Debug, Clone)]
pub struct BuildApiClient {
    http: reqwest::Client,
    root: String,
    auth: Credential,
    retry: RetryConfig,
}

impl BuildApiClient {
    /// Every request is bounded by `timeout`.
    pub fn new(
        root: impl Into<String>,
        auth: Credential,
        timeout: Duration,
    ) -> Result<Self, BuildApiError> {
        let http = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(BuildApiError::from_reqwest)?;

        Ok(BuildApiClient {
            http,
            root: root.into().trim_end_matches('/').to_string(),
            auth,
            retry: RetryConfig::DEFAULT,
        })
    }

    /// Overrides the transient-failure retry schedule.
    pub fn with_retry_config(mut self, retry: RetryConfig) -> Self {
        self.retry = retry;
        self
    }

    pub fn root(&self) -> &str {
        &self.root
    }

    /// Lists every job on a branch for one day.
    pub async fn jobs_on(&self, branch: &Branch, date: NaiveDate) -> Result<Vec<Job>, BuildApiError> {
        let url = format!("{}/{}", self.root, branch);
        let date = date.format("%Y-%m-%d").to_string();
        self.get_json(&url, &[("date", date.as_str()), ("format", "json")])
            .await
    }

    async fn get_json<T: DeserializeOwned>(
        &self,
        url: &str,
        query: &[(&str, &str)],
    ) -> Result<T, BuildApiError> {
        let http = &self.http;
        let auth = &self.auth;
        retry_with_backoff(self.retry, move || async move {
            let response = http
                .get(url)
                .query(query)
                .header(ACCEPT, APPLICATION_JSON)
                .basic_auth(&auth.username, Some(&auth.password))
                .send()
                .await
                .map_err(BuildApiError::from_reqwest)?
                .error_for_status()
                .map_err(BuildApiError::from_reqwest)?;

            response.json::<T>().await.map_err(BuildApiError::from_reqwest)
        })
        .await
    }
}

impl BuildLookup for BuildApiClient {
    #[instrument(skip(self), fields(branch = %branch, revision = %revision))]
    async fn lookup(
        &self,
        branch: &Branch,
        revision: &Revision,
    ) -> Result<Vec<BuildRecord>, BuildApiError> {
        let url = format!("{}/{}/rev/{}", self.root, branch, revision);
        let records: Vec<BuildRecord> = self.get_json(&url, &[("format", "json")]).await?;
        debug!(records = records.len(), "Looked up builds for revision");
        Ok(records)
    }
}

impl RebuildTrigger for BuildApiClient {
    #[instrument(skip(self), fields(branch = %branch))]
    async fn trigger(
        &self,
        branch: &Branch,
        target: RebuildTarget,
        count: u32,
    ) -> Result<(), BuildApiError> {
        let url = format!("{}/{}/{}", self.root, branch, target.endpoint());
        let id = target.id().to_string();
        let count = count.to_string();
        let form = [(target.field(), id.as_str()), ("count", count.as_str())];

        info!(url = %url, "Triggering rebuild");
        debug!(?form, "Trigger payload");

        let status = self
            .http
            .post(&url)
            .header(ACCEPT, APPLICATION_JSON)
            .basic_auth(&self.auth.username, Some(&self.auth.password))
            .form(&form)
            .send()
            .await
            .map_err(BuildApiError::from_reqwest)?
            .error_for_status()
            .map_err(BuildApiError::from_reqwest)?
            .status();

        info!(status = %status, "Requested job");
        Ok(())
    }
}
