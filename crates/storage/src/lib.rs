//! Upload backends for tessera.
//!
//! This crate provides:
//! - The upload capability traits (`AssetStore`, `BundleStore`)
//! - Backends: bundling ledger gateway, IPFS HTTP API, S3, local filesystem
//! - Backend selection from configuration

pub mod backends;
pub mod error;
pub mod http;
pub mod traits;

pub use backends::{
    bundle::BundleClient,
    filesystem::FilesystemStore,
    ipfs::IpfsStore,
    s3::{S3Options, S3Store},
};
pub use error::{StorageError, StorageResult};
pub use http::RetryPolicy;
pub use traits::{AssetStore, BundleStore, PreparedPair, UploadBackend, UploadedPair, upload_pair};

use std::sync::Arc;
use tessera_core::config::StorageConfig;

/// Create the upload backend from configuration.
pub async fn from_config(config: &StorageConfig) -> StorageResult<UploadBackend> {
    config.validate().map_err(StorageError::Config)?;

    match config {
        StorageConfig::Bundle {
            bundler_url,
            gateway_url,
            max_bundle_size,
        } => {
            let client = BundleClient::new(bundler_url, gateway_url, *max_bundle_size)?;
            Ok(UploadBackend::Bundled(Arc::new(client)))
        }
        StorageConfig::Ipfs {
            api_url,
            gateway_url,
            project_id,
            secret_key,
        } => {
            let store = IpfsStore::new(
                api_url,
                gateway_url,
                project_id.clone().unwrap_or_default(),
                secret_key.clone().unwrap_or_default(),
            )?;
            Ok(UploadBackend::Unbundled(Arc::new(store)))
        }
        StorageConfig::S3 {
            bucket,
            endpoint,
            region,
            prefix,
            access_key_id,
            secret_access_key,
            force_path_style,
            public_base_url,
        } => {
            let store = S3Store::new(S3Options {
                bucket: bucket.clone(),
                endpoint: endpoint.clone(),
                region: region.clone(),
                prefix: prefix.clone(),
                access_key_id: access_key_id.clone(),
                secret_access_key: secret_access_key.clone(),
                force_path_style: *force_path_style,
                public_base_url: public_base_url.clone(),
            })
            .await?;
            Ok(UploadBackend::Unbundled(Arc::new(store)))
        }
        StorageConfig::Filesystem {
            path,
            public_base_url,
        } => {
            let store = FilesystemStore::new(path, public_base_url.clone()).await?;
            Ok(UploadBackend::Unbundled(Arc::new(store)))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bytes::Bytes;
    use tempfile::tempdir;
    use tessera_core::ContentType;

    #[tokio::test]
    async fn from_config_filesystem_ok() {
        let temp = tempdir().unwrap();
        let config = StorageConfig::Filesystem {
            path: temp.path().join("store"),
            public_base_url: Some("https://cdn.test".to_string()),
        };

        let backend = from_config(&config).await.unwrap();
        let UploadBackend::Unbundled(store) = backend else {
            panic!("filesystem storage should be unbundled");
        };
        let locator = store
            .store(Bytes::from_static(b"hi"), ContentType::Image)
            .await
            .unwrap();
        assert!(locator.as_str().starts_with("https://cdn.test/"));
        assert!(locator.as_str().ends_with(".png"));
    }

    #[tokio::test]
    async fn from_config_bundle_is_bundled() {
        let config = StorageConfig::Bundle {
            bundler_url: "http://127.0.0.1:1/bundle".to_string(),
            gateway_url: "https://gw.test".to_string(),
            max_bundle_size: 1_000,
        };
        let backend = from_config(&config).await.unwrap();
        assert!(backend.is_bundled());
        assert_eq!(backend.name(), "bundle");
    }

    #[tokio::test]
    async fn from_config_rejects_partial_credentials() {
        let config = StorageConfig::Ipfs {
            api_url: "http://127.0.0.1:1".to_string(),
            gateway_url: "https://ipfs.test".to_string(),
            project_id: Some("project".to_string()),
            secret_key: None,
        };

        match from_config(&config).await {
            Ok(_) => panic!("expected error"),
            Err(StorageError::Config(_)) => {}
            Err(other) => panic!("unexpected error: {other:?}"),
        }
    }
}
