use std::collections::BTreeMap;
use std::time::Duration;

use async_trait::async_trait;
use serde::Deserialize;
use tracing::debug;

use super::{TokenBatch, TokenVault};
use crate::core::{Result, StoreError};

#[derive(Debug, Deserialize)]
struct BulkResponse {
    #[serde(default)]
    created: BTreeMap<String, String>,
}

/// Vault reached over HTTP.
///
/// Sends the batch as JSON to `POST {base_url}/tokens/bulk` and expects
/// `{"created": {"<column>": "<token>"}}` back.
#[derive(Debug, Clone)]
pub struct HttpTokenVault {
    client: reqwest::Client,
    endpoint: String,
    auth_token: Option<String>,
}

impl HttpTokenVault {
    pub fn new(base_url: &str) -> Result<Self> {
        Self::with_timeout(base_url, Duration::from_secs(10))
    }

    pub fn with_timeout(base_url: &str, timeout: Duration) -> Result<Self> {
        let base = base_url.trim_end_matches('/');
        if !(base.starts_with("http://") || base.starts_with("https://")) {
            return Err(StoreError::config(format!(
                "vault url must start with http:// or https:// (got '{base_url}')"
            )));
        }

        let client = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(Self {
            client,
            endpoint: format!("{base}/tokens/bulk"),
            auth_token: None,
        })
    }

    pub fn auth_token(mut self, token: impl Into<String>) -> Self {
        self.auth_token = Some(token.into());
        self
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }
}

#[async_trait]
impl TokenVault for HttpTokenVault {
    async fn reconcile(&self, batch: TokenBatch) -> Result<BTreeMap<String, String>> {
        debug!(
            endpoint = %self.endpoint,
            create = batch.create.len(),
            update = batch.update.len(),
            delete = batch.delete.len(),
            "vault bulk request"
        );

        let mut request = self.client.post(&self.endpoint).json(&batch);
        if let Some(token) = &self.auth_token {
            request = request.bearer_auth(token);
        }

        let response = request.send().await?;
        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(StoreError::vault(format!(
                "vault responded {status}: {body}"
            )));
        }

        let body: BulkResponse = response.json().await?;

        if let Some(missing) = batch.create.keys().find(|c| !body.created.contains_key(*c)) {
            return Err(StoreError::vault(format!(
                "vault did not return a token for column {missing}"
            )));
        }

        Ok(body.created)
    }
}
