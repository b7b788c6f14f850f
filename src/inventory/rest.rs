//! HTTP/JSON inventory service adapter.
//!
//! Talks to an inventory export service exposing one collection endpoint
//! per resource category, with bearer auth and `pageToken` cursors:
//!
//! `GET {base}/{segment}?region=..[&pageToken=..]` returning
//! `{"items": [...], "nextPageToken": "..."}`.

use anyhow::{Context, Result};
use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use serde::de::DeserializeOwned;

use super::provider::{Page, ResourceProvider};
use super::types::{
    Bucket, EbsSnapshot, Instance, PasswordPolicy, SecurityGroup, User, Volume,
};

const HTTP_TIMEOUT_SECS: u64 = 60;

pub struct RestInventoryProvider {
    http: Client,
    base_url: String,
    bearer_token: Option<String>,
}

impl RestInventoryProvider {
    pub fn new(base_url: &str, bearer_token: Option<String>) -> Result<Self> {
        let http = Client::builder()
            .timeout(std::time::Duration::from_secs(HTTP_TIMEOUT_SECS))
            .build()
            .context("Failed to create HTTP client")?;

        Ok(Self {
            http,
            base_url: base_url.trim_end_matches('/').to_string(),
            bearer_token,
        })
    }

    async fn fetch_page<T: DeserializeOwned>(
        &self,
        segment: &str,
        region: &str,
        page_token: Option<&str>,
    ) -> Result<Page<T>> {
        let url = format!("{}/{}", self.base_url, segment);
        let mut request = self.http.get(&url).query(&[("region", region)]);
        if let Some(token) = &self.bearer_token {
            request = request.bearer_auth(token);
        }
        if let Some(token) = page_token {
            request = request.query(&[("pageToken", token)]);
        }

        let response = request
            .send()
            .await
            .with_context(|| format!("Failed to list {}", segment))?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            anyhow::bail!("inventory API returned {} for {}: {}", status, segment, body);
        }

        response
            .json::<Page<T>>()
            .await
            .with_context(|| format!("Failed to decode {} page", segment))
    }
}

#[async_trait]
impl ResourceProvider for RestInventoryProvider {
    async fn security_groups(
        &self,
        region: &str,
        page_token: Option<&str>,
    ) -> Result<Page<SecurityGroup>> {
        self.fetch_page("security-groups", region, page_token).await
    }

    async fn instances(&self, region: &str, page_token: Option<&str>) -> Result<Page<Instance>> {
        self.fetch_page("instances", region, page_token).await
    }

    async fn volumes(&self, region: &str, page_token: Option<&str>) -> Result<Page<Volume>> {
        self.fetch_page("volumes", region, page_token).await
    }

    async fn snapshots(
        &self,
        region: &str,
        page_token: Option<&str>,
    ) -> Result<Page<EbsSnapshot>> {
        self.fetch_page("snapshots", region, page_token).await
    }

    async fn buckets(&self, region: &str, page_token: Option<&str>) -> Result<Page<Bucket>> {
        self.fetch_page("buckets", region, page_token).await
    }

    async fn users(&self, region: &str, page_token: Option<&str>) -> Result<Page<User>> {
        self.fetch_page("users", region, page_token).await
    }

    async fn password_policy(&self, region: &str) -> Result<Option<PasswordPolicy>> {
        let url = format!("{}/password-policy", self.base_url);
        let mut request = self.http.get(&url).query(&[("region", region)]);
        if let Some(token) = &self.bearer_token {
            request = request.bearer_auth(token);
        }

        let response = request
            .send()
            .await
            .context("Failed to fetch password policy")?;

        // No policy configured at all.
        if response.status() == StatusCode::NOT_FOUND {
            return Ok(None);
        }

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            anyhow::bail!("inventory API returned {} for password-policy: {}", status, body);
        }

        let policy = response
            .json::<PasswordPolicy>()
            .await
            .context("Failed to decode password policy")?;
        Ok(Some(policy))
    }
}
