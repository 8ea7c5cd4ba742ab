//! S3-compatible object storage provider using the AWS SDK.

use crate::error::{StorageError, StorageResult};
use crate::http::join_url;
use crate::traits::AssetStore;
use async_trait::async_trait;
use aws_config::BehaviorVersion;
use aws_sdk_s3::Client;
use aws_sdk_s3::primitives::ByteStream;
use bytes::Bytes;
use tessera_core::{ContentHash, ContentType, Locator};
use tracing::instrument;

/// Connection settings for [`S3Store`].
#[derive(Clone, Debug, Default)]
pub struct S3Options {
    pub bucket: String,
    pub endpoint: Option<String>,
    pub region: Option<String>,
    pub prefix: Option<String>,
    pub access_key_id: Option<String>,
    pub secret_access_key: Option<String>,
    pub force_path_style: bool,
    pub public_base_url: Option<String>,
}

/// Stores each artifact as `<prefix>/<sha256>.<ext>`.
pub struct S3Store {
    client: Client,
    bucket: String,
    prefix: Option<String>,
    public_base_url: String,
}

impl std::fmt::Debug for S3Store {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("S3Store")
            .field("bucket", &self.bucket)
            .field("prefix", &self.prefix)
            .field("public_base_url", &self.public_base_url)
            .finish_non_exhaustive()
    }
}

impl S3Store {
    pub async fn new(options: S3Options) -> StorageResult<Self> {
        let S3Options {
            bucket,
            endpoint,
            region,
            prefix,
            access_key_id,
            secret_access_key,
            force_path_style,
            public_base_url,
        } = options;

        let resolved_region = region.unwrap_or_else(|| "us-east-1".to_string());
        let region = aws_config::Region::new(resolved_region.clone());

        // Explicit credentials or the ambient AWS chain.
        let mut builder = match (access_key_id, secret_access_key) {
            (Some(key_id), Some(secret)) => {
                let credentials =
                    aws_sdk_s3::config::Credentials::new(key_id, secret, None, None, "tessera-config");
                aws_sdk_s3::config::Builder::new()
                    .behavior_version(BehaviorVersion::latest())
                    .region(region)
                    .credentials_provider(credentials)
            }
            (None, None) => {
                let shared = aws_config::defaults(BehaviorVersion::latest())
                    .region(region)
                    .load()
                    .await;
                aws_sdk_s3::config::Builder::from(&shared)
            }
            _ => {
                return Err(StorageError::Config(
                    "s3 config requires both access_key_id and secret_access_key when either is set"
                        .to_string(),
                ));
            }
        };

        // Handle bare host:port endpoints (e.g., "minio:9000") by prepending http://
        let normalized_endpoint = endpoint.map(|url| {
            let lower = url.to_lowercase();
            if lower.starts_with("http://") || lower.starts_with("https://") {
                url
            } else {
                format!("http://{url}")
            }
        });
        if let Some(url) = &normalized_endpoint {
            builder = builder.endpoint_url(url);
        }
        if force_path_style {
            builder = builder.force_path_style(true);
        }

        let public_base_url = public_base_url.unwrap_or_else(|| match &normalized_endpoint {
            Some(url) => join_url(url, &bucket),
            None => format!("https://{bucket}.s3.{resolved_region}.amazonaws.com"),
        });

        Ok(Self {
            client: Client::from_conf(builder.build()),
            bucket,
            // Strip trailing slashes to avoid double-slash keys like "prefix//key"
            prefix: prefix.map(|p| p.trim_end_matches('/').to_string()),
            public_base_url,
        })
    }

    /// Get the full object key for a key (applies prefix if configured).
    fn full_key(&self, key: &str) -> String {
        match &self.prefix {
            Some(prefix) => format!("{prefix}/{key}"),
            None => key.to_string(),
        }
    }
}

#[async_trait]
impl AssetStore for S3Store {
    fn name(&self) -> &'static str {
        "s3"
    }

    #[instrument(skip(self, payload), fields(backend = "s3", size = payload.len()))]
    async fn store(&self, payload: Bytes, content_type: ContentType) -> StorageResult<Locator> {
        let hash = ContentHash::compute(&payload);
        let key = self.full_key(&format!("{}.{}", hash.to_hex(), content_type.extension()));

        self.client
            .put_object()
            .bucket(&self.bucket)
            .key(&key)
            .content_type(content_type.mime())
            .body(ByteStream::from(payload))
            .send()
            .await
            .map_err(|e| StorageError::S3(Box::new(e)))?;

        Ok(Locator::new(join_url(&self.public_base_url, &key)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_public_url_defaults() {
        let store = S3Store::new(S3Options {
            bucket: "assets".to_string(),
            region: Some("eu-west-1".to_string()),
            prefix: Some("drop/".to_string()),
            access_key_id: Some("key".to_string()),
            secret_access_key: Some("secret".to_string()),
            ..S3Options::default()
        })
        .await
        .unwrap();
        assert_eq!(
            store.public_base_url,
            "https://assets.s3.eu-west-1.amazonaws.com"
        );
        assert_eq!(store.full_key("a.png"), "drop/a.png");

        let store = S3Store::new(S3Options {
            bucket: "assets".to_string(),
            endpoint: Some("minio:9000".to_string()),
            access_key_id: Some("key".to_string()),
            secret_access_key: Some("secret".to_string()),
            force_path_style: true,
            ..S3Options::default()
        })
        .await
        .unwrap();
        assert_eq!(store.public_base_url, "http://minio:9000/assets");
    }

    #[tokio::test]
    async fn test_rejects_partial_credentials() {
        let result = S3Store::new(S3Options {
            bucket: "assets".to_string(),
            access_key_id: Some("key".to_string()),
            ..S3Options::default()
        })
        .await;
        assert!(matches!(result, Err(StorageError::Config(_))));
    }
}
