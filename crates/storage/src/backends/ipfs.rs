//! IPFS HTTP API provider (Infura-compatible).

use crate::error::{StorageError, StorageResult};
use crate::http::{RetryPolicy, check_status, join_url, retry_request};
use crate::traits::AssetStore;
use async_trait::async_trait;
use bytes::Bytes;
use reqwest::multipart::{Form, Part};
use serde::Deserialize;
use std::time::Duration;
use tessera_core::{ContentType, Locator};
use tracing::{debug, instrument};

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct AddResponse {
    hash: String,
}

/// Adds and pins each artifact through `/api/v0/add`.
pub struct IpfsStore {
    client: reqwest::Client,
    api_url: String,
    gateway_url: String,
    project_id: String,
    secret_key: String,
    retry: RetryPolicy,
}

impl std::fmt::Debug for IpfsStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("IpfsStore")
            .field("api_url", &self.api_url)
            .field("gateway_url", &self.gateway_url)
            .field("project_id", &self.project_id)
            .finish_non_exhaustive()
    }
}

impl IpfsStore {
    pub fn new(
        api_url: impl Into<String>,
        gateway_url: impl Into<String>,
        project_id: impl Into<String>,
        secret_key: impl Into<String>,
    ) -> StorageResult<Self> {
        let project_id = project_id.into();
        let secret_key = secret_key.into();
        if project_id.is_empty() || secret_key.is_empty() {
            return Err(StorageError::Config(
                "ipfs storage requires both project_id and secret_key".to_string(),
            ));
        }
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(120))
            .build()?;
        Ok(Self {
            client,
            api_url: api_url.into(),
            gateway_url: gateway_url.into(),
            project_id,
            secret_key,
            retry: RetryPolicy::default(),
        })
    }

    pub fn with_retry_policy(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }
}

#[async_trait]
impl AssetStore for IpfsStore {
    fn name(&self) -> &'static str {
        "ipfs"
    }

    #[instrument(skip(self, payload), fields(backend = "ipfs", size = payload.len()))]
    async fn store(&self, payload: Bytes, content_type: ContentType) -> StorageResult<Locator> {
        let url = join_url(&self.api_url, "api/v0/add?pin=true");
        let file_name = format!("asset.{}", content_type.extension());

        let response = retry_request(self.retry, || {
            let part = Part::bytes(payload.to_vec()).file_name(file_name.clone());
            self.client
                .post(&url)
                .basic_auth(&self.project_id, Some(&self.secret_key))
                .multipart(Form::new().part("file", part))
                .send()
        })
        .await?;
        let response = check_status("ipfs", response).await?;

        let added: AddResponse = response
            .json()
            .await
            .map_err(|e| StorageError::InvalidResponse(format!("ipfs add: {e}")))?;
        debug!(hash = %added.hash, "Pinned artifact");
        Ok(Locator::new(join_url(
            &self.gateway_url,
            &format!("ipfs/{}", added.hash),
        )))
    }
}
