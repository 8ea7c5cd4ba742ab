//! Bundling ledger gateway.
//!
//! Every artifact becomes a data item whose id is the SHA-256 of its content
//! type and payload. Because ids are known before anything is sent, a pair's
//! manifest can be rewritten to reference its image and both go out in the
//! same bundle.
//!
//! Bundle layout:
//!
//! ```text
//! item count                    32 bytes, little endian
//! per item: size, id            32 bytes LE + 32 bytes
//! per item: data item           2-byte LE type length, type, payload
//! ```

use crate::error::{StorageError, StorageResult};
use crate::http::{RetryPolicy, check_status, join_url, retry_request};
use crate::traits::{BundleStore, PreparedPair, UploadedPair};
use async_trait::async_trait;
use bytes::Bytes;
use std::time::Duration;
use tessera_core::{ContentHash, ContentType, Locator};
use tracing::{info, instrument};

pub const APP_NAME: &str = "tessera";
pub const APP_VERSION: &str = env!("CARGO_PKG_VERSION");

const FIELD_LEN: usize = 32;

/// One artifact inside a bundle.
#[derive(Clone, Debug)]
pub struct DataItem {
    pub id: ContentHash,
    pub content_type: ContentType,
    pub payload: Bytes,
}

impl DataItem {
    pub fn new(payload: Bytes, content_type: ContentType) -> Self {
        let mut hasher = ContentHash::hasher();
        hasher.update(content_type.mime().as_bytes());
        hasher.update(&payload);
        Self {
            id: hasher.finalize(),
            content_type,
            payload,
        }
    }

    fn encoded_len(&self) -> usize {
        2 + self.content_type.mime().len() + self.payload.len()
    }

    fn encode_into(&self, buf: &mut Vec<u8>) {
        let mime = self.content_type.mime().as_bytes();
        // Mime strings are a handful of bytes.
        buf.extend_from_slice(&(mime.len() as u16).to_le_bytes());
        buf.extend_from_slice(mime);
        buf.extend_from_slice(&self.payload);
    }
}

fn push_le(buf: &mut Vec<u8>, value: u64) {
    let mut field = [0u8; FIELD_LEN];
    field[..8].copy_from_slice(&value.to_le_bytes());
    buf.extend_from_slice(&field);
}

/// Encoded size of a bundle holding `items`.
pub fn bundle_len(items: &[DataItem]) -> u64 {
    let headers = FIELD_LEN + items.len() * FIELD_LEN * 2;
    let bodies: usize = items.iter().map(DataItem::encoded_len).sum();
    (headers + bodies) as u64
}

/// Serialize items into one bundle.
pub fn encode_bundle(items: &[DataItem]) -> Bytes {
    let mut buf = Vec::with_capacity(bundle_len(items) as usize);
    push_le(&mut buf, items.len() as u64);
    for item in items {
        push_le(&mut buf, item.encoded_len() as u64);
        buf.extend_from_slice(item.id.as_bytes());
    }
    for item in items {
        item.encode_into(&mut buf);
    }
    Bytes::from(buf)
}

/// Client that posts bundles to a bundler endpoint.
pub struct BundleClient {
    client: reqwest::Client,
    bundler_url: String,
    gateway_url: String,
    max_bundle_size: u64,
    retry: RetryPolicy,
}

impl BundleClient {
    pub fn new(
        bundler_url: impl Into<String>,
        gateway_url: impl Into<String>,
        max_bundle_size: u64,
    ) -> StorageResult<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(300))
            .build()?;
        Ok(Self {
            client,
            bundler_url: bundler_url.into(),
            gateway_url: gateway_url.into(),
            max_bundle_size,
            retry: RetryPolicy::default(),
        })
    }

    pub fn with_retry_policy(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    fn locator(&self, id: &ContentHash) -> Locator {
        Locator::new(join_url(&self.gateway_url, &id.to_base64url()))
    }

    async fn post(&self, body: Bytes) -> StorageResult<()> {
        let response = retry_request(self.retry, || {
            self.client
                .post(&self.bundler_url)
                .header(reqwest::header::CONTENT_TYPE, "application/octet-stream")
                .header("App-Name", APP_NAME)
                .header("App-Version", APP_VERSION)
                .body(body.clone())
                .send()
        })
        .await?;
        check_status("bundler", response).await?;
        Ok(())
    }
}

#[async_trait]
impl BundleStore for BundleClient {
    fn name(&self) -> &'static str {
        "bundle"
    }

    fn max_bundle_size(&self) -> u64 {
        self.max_bundle_size
    }

    #[instrument(skip(self, pairs), fields(backend = "bundle", pairs = pairs.len()))]
    async fn store_batch(&self, pairs: Vec<PreparedPair>) -> StorageResult<Vec<UploadedPair>> {
        let mut items = Vec::with_capacity(pairs.len() * 2);
        let mut uploaded = Vec::with_capacity(pairs.len());

        for pair in pairs {
            let image = DataItem::new(pair.image, ContentType::Image);
            let image_link = self.locator(&image.id);
            let manifest = pair.manifest.with_image(&image_link);
            let metadata = DataItem::new(Bytes::from(manifest.to_vec()?), ContentType::Metadata);
            let link = self.locator(&metadata.id);

            uploaded.push(UploadedPair {
                key: pair.key,
                image: image_link,
                manifest,
                link,
            });
            items.push(image);
            items.push(metadata);
        }

        let size = bundle_len(&items);
        if size > self.max_bundle_size {
            return Err(StorageError::BatchTooLarge {
                size,
                limit: self.max_bundle_size,
            });
        }

        self.post(encode_bundle(&items)).await?;
        info!(items = items.len(), bytes = size, "Bundle posted");
        Ok(uploaded)
    }
}
