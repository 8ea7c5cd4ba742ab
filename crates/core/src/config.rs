//! Configuration types shared across crates.

use crate::asset::Creator;
use crate::grid::GridLayout;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Progress cache location.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct CacheConfig {
    /// Directory holding cache files.
    #[serde(default = "default_cache_dir")]
    pub dir: PathBuf,
    /// Deployment environment (e.g., "devnet", "mainnet-beta").
    #[serde(default = "default_cache_env")]
    pub env: String,
    /// Cache name; one file per (env, name) pair.
    #[serde(default = "default_cache_name")]
    pub name: String,
}

fn default_cache_dir() -> PathBuf {
    PathBuf::from(".cache")
}

fn default_cache_env() -> String {
    "devnet".to_string()
}

fn default_cache_name() -> String {
    "temp".to_string()
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            dir: default_cache_dir(),
            env: default_cache_env(),
            name: default_cache_name(),
        }
    }
}

impl CacheConfig {
    /// Full path of the cache file, `<dir>/<env>-<name>`.
    pub fn file_path(&self) -> PathBuf {
        self.dir.join(format!("{}-{}", self.env, self.name))
    }

    pub fn validate(&self) -> Result<(), String> {
        for (field, value) in [("cache.env", &self.env), ("cache.name", &self.name)] {
            if value.is_empty() {
                return Err(format!("{field} must not be empty"));
            }
            if value.contains(['/', '\\']) {
                return Err(format!("{field} must not contain path separators"));
            }
        }
        Ok(())
    }
}

/// Grid geometry and the local key permutation.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct GridConfig {
    #[serde(default = "default_grid_side")]
    pub grid_width: u64,
    #[serde(default = "default_grid_side")]
    pub grid_height: u64,
    #[serde(default = "default_partition_side")]
    pub partition_width: u32,
    #[serde(default = "default_partition_side")]
    pub partition_height: u32,
    /// JSON permutation table. Identity when unset.
    #[serde(default)]
    pub permutation: Option<PathBuf>,
}

fn default_grid_side() -> u64 {
    1000
}

fn default_partition_side() -> u32 {
    200
}

impl Default for GridConfig {
    fn default() -> Self {
        Self {
            grid_width: default_grid_side(),
            grid_height: default_grid_side(),
            partition_width: default_partition_side(),
            partition_height: default_partition_side(),
            permutation: None,
        }
    }
}

impl GridConfig {
    pub fn layout(&self) -> GridLayout {
        GridLayout {
            grid_width: self.grid_width,
            grid_height: self.grid_height,
            partition_width: self.partition_width,
            partition_height: self.partition_height,
        }
    }

    pub fn validate(&self) -> Result<(), String> {
        self.layout().validate().map_err(|e| e.to_string())
    }
}

/// Upload settings.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct UploadConfig {
    /// Directory containing `<index>.png` / `<index>.json` pairs.
    #[serde(default = "default_assets_dir")]
    pub assets_dir: PathBuf,
    /// Cumulative byte budget per bundle.
    #[serde(default = "default_batch_size_limit")]
    pub batch_size_limit: u64,
}

fn default_assets_dir() -> PathBuf {
    PathBuf::from("./assets")
}

fn default_batch_size_limit() -> u64 {
    crate::DEFAULT_BATCH_SIZE_LIMIT
}

impl Default for UploadConfig {
    fn default() -> Self {
        Self {
            assets_dir: default_assets_dir(),
            batch_size_limit: default_batch_size_limit(),
        }
    }
}

impl UploadConfig {
    pub fn validate(&self) -> Result<(), String> {
        if self.batch_size_limit == 0 {
            return Err("upload.batch_size_limit must be > 0".to_string());
        }
        Ok(())
    }
}

/// Storage provider configuration.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum StorageConfig {
    /// Bundling ledger gateway.
    Bundle {
        /// Endpoint that accepts bundles (POST).
        bundler_url: String,
        /// Base URL used to build item locators.
        #[serde(default = "default_bundle_gateway")]
        gateway_url: String,
        /// Hard size limit of one bundle, enforced before any request.
        #[serde(default = "default_max_bundle_size")]
        max_bundle_size: u64,
    },
    /// IPFS HTTP API (Infura-compatible).
    Ipfs {
        #[serde(default = "default_ipfs_api_url")]
        api_url: String,
        #[serde(default = "default_ipfs_gateway")]
        gateway_url: String,
        /// Project id used as the basic-auth user.
        project_id: Option<String>,
        /// Project secret used as the basic-auth password.
        secret_key: Option<String>,
    },
    /// S3-compatible object storage.
    S3 {
        /// Bucket name.
        bucket: String,
        /// Optional endpoint URL (for MinIO, etc.).
        endpoint: Option<String>,
        /// AWS region.
        region: Option<String>,
        /// Optional key prefix.
        prefix: Option<String>,
        /// AWS access key ID. Falls back to AWS_ACCESS_KEY_ID env var if not set.
        access_key_id: Option<String>,
        /// AWS secret access key. Falls back to AWS_SECRET_ACCESS_KEY env var if not set.
        secret_access_key: Option<String>,
        /// Force path-style URLs (required for MinIO).
        #[serde(default)]
        force_path_style: bool,
        /// Public URL prefix for locators. Defaults to the virtual-hosted bucket URL.
        public_base_url: Option<String>,
    },
    /// Local content-addressed directory.
    Filesystem {
        /// Root directory for stored objects.
        path: PathBuf,
        /// Public URL prefix for locators. Defaults to `file://` URLs.
        public_base_url: Option<String>,
    },
}

fn default_bundle_gateway() -> String {
    "https://arweave.net".to_string()
}

fn default_max_bundle_size() -> u64 {
    50 * 1000 * 1000
}

fn default_ipfs_api_url() -> String {
    "https://ipfs.infura.io:5001".to_string()
}

fn default_ipfs_gateway() -> String {
    "https://ipfs.io".to_string()
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self::Filesystem {
            path: PathBuf::from("./data/storage"),
            public_base_url: None,
        }
    }
}

impl StorageConfig {
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Bundle { .. } => "bundle",
            Self::Ipfs { .. } => "ipfs",
            Self::S3 { .. } => "s3",
            Self::Filesystem { .. } => "filesystem",
        }
    }

    /// Validate storage configuration invariants.
    pub fn validate(&self) -> Result<(), String> {
        match self {
            StorageConfig::Bundle {
                bundler_url,
                max_bundle_size,
                ..
            } => {
                if bundler_url.is_empty() {
                    return Err("bundle storage requires bundler_url".to_string());
                }
                if *max_bundle_size == 0 {
                    return Err("bundle max_bundle_size must be > 0".to_string());
                }
                Ok(())
            }
            StorageConfig::Ipfs {
                project_id,
                secret_key,
                ..
            } => match (project_id.as_deref(), secret_key.as_deref()) {
                (Some(id), Some(secret)) if !id.is_empty() && !secret.is_empty() => Ok(()),
                _ => Err("ipfs storage requires both project_id and secret_key".to_string()),
            },
            StorageConfig::S3 {
                bucket,
                access_key_id,
                secret_access_key,
                ..
            } => {
                if bucket.is_empty() {
                    return Err("s3 storage requires bucket".to_string());
                }
                match (access_key_id.as_ref(), secret_access_key.as_ref()) {
                    (Some(_), Some(_)) | (None, None) => Ok(()),
                    _ => Err(
                        "s3 config requires both access_key_id and secret_access_key when either is set"
                            .to_string(),
                    ),
                }
            }
            StorageConfig::Filesystem { .. } => Ok(()),
        }
    }
}

/// Registry settings.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct RegistryConfig {
    /// Ledger file of the local registry.
    #[serde(default = "default_registry_path")]
    pub path: PathBuf,
    /// Entries written per append call.
    #[serde(default = "default_window_size")]
    pub window_size: usize,
    /// Maximum append calls in flight.
    #[serde(default = "default_registry_concurrency")]
    pub concurrency: usize,
}

fn default_registry_path() -> PathBuf {
    PathBuf::from("./data/registry.json")
}

fn default_window_size() -> usize {
    crate::DEFAULT_WINDOW_SIZE
}

fn default_registry_concurrency() -> usize {
    100
}

impl Default for RegistryConfig {
    fn default() -> Self {
        Self {
            path: default_registry_path(),
            window_size: default_window_size(),
            concurrency: default_registry_concurrency(),
        }
    }
}

impl RegistryConfig {
    pub fn validate(&self) -> Result<(), String> {
        if self.window_size == 0 {
            return Err("registry.window_size must be > 0".to_string());
        }
        if self.concurrency == 0 {
            return Err("registry.concurrency must be > 0".to_string());
        }
        Ok(())
    }
}

/// Defaults applied when a registry is initialized.
///
/// Unset fields fall back to the first item's manifest.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct CollectionConfig {
    #[serde(default)]
    pub symbol: Option<String>,
    #[serde(default)]
    pub seller_fee_basis_points: Option<u16>,
    #[serde(default)]
    pub creators: Vec<Creator>,
    #[serde(default = "default_true")]
    pub is_mutable: bool,
    #[serde(default = "default_true")]
    pub retain_authority: bool,
}

fn default_true() -> bool {
    true
}

impl Default for CollectionConfig {
    fn default() -> Self {
        Self {
            symbol: None,
            seller_fee_basis_points: None,
            creators: Vec::new(),
            is_mutable: true,
            retain_authority: true,
        }
    }
}

impl CollectionConfig {
    pub fn validate(&self) -> Result<(), String> {
        if let Some(fee) = self.seller_fee_basis_points
            && fee > 10_000
        {
            return Err(format!(
                "collection.seller_fee_basis_points {fee} exceeds 10000"
            ));
        }
        if !self.creators.is_empty() {
            let total: u32 = self.creators.iter().map(|c| u32::from(c.share)).sum();
            if total != 100 {
                return Err(format!(
                    "collection.creators shares sum to {total}, expected 100"
                ));
            }
        }
        Ok(())
    }
}

/// Complete application configuration.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct AppConfig {
    #[serde(default)]
    pub cache: CacheConfig,
    #[serde(default)]
    pub grid: GridConfig,
    #[serde(default)]
    pub upload: UploadConfig,
    #[serde(default)]
    pub storage: StorageConfig,
    #[serde(default)]
    pub registry: RegistryConfig,
    #[serde(default)]
    pub collection: CollectionConfig,
}

impl AppConfig {
    /// Validate every section, reporting the first problem.
    pub fn validate(&self) -> Result<(), String> {
        self.cache.validate()?;
        self.grid.validate()?;
        self.upload.validate()?;
        self.storage.validate()?;
        self.registry.validate()?;
        self.collection.validate()
    }

    /// Create a test configuration rooted in a scratch directory.
    ///
    /// **For testing only.** Uses filesystem storage and a small grid.
    pub fn for_testing(root: &Path) -> Self {
        Self {
            cache: CacheConfig {
                dir: root.join("cache"),
                ..CacheConfig::default()
            },
            grid: GridConfig {
                grid_width: 20,
                grid_height: 20,
                partition_width: 10,
                partition_height: 10,
                permutation: None,
            },
            upload: UploadConfig {
                assets_dir: root.join("assets"),
                ..UploadConfig::default()
            },
            storage: StorageConfig::Filesystem {
                path: root.join("storage"),
                public_base_url: None,
            },
            registry: RegistryConfig {
                path: root.join("registry.json"),
                ..RegistryConfig::default()
            },
            collection: CollectionConfig::default(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_match_deployment_layout() {
        let config = AppConfig::default();
        let layout = config.grid.layout();
        assert_eq!(layout.total_cells(), 1_000_000);
        assert_eq!(layout.cells_per_partition(), 40_000);
        assert_eq!(config.upload.batch_size_limit, 10_000_000);
        assert_eq!(config.registry.window_size, 10);
        assert_eq!(config.registry.concurrency, 100);
        assert_eq!(config.cache.file_path(), PathBuf::from(".cache/devnet-temp"));
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_storage_config_tagged_deserialize() {
        let config: StorageConfig = serde_json::from_value(serde_json::json!({
            "type": "bundle",
            "bundler_url": "https://node.test/bundle"
        }))
        .unwrap();
        assert_eq!(config.kind(), "bundle");
        match config {
            StorageConfig::Bundle {
                gateway_url,
                max_bundle_size,
                ..
            } => {
                assert_eq!(gateway_url, "https://arweave.net");
                assert_eq!(max_bundle_size, 50_000_000);
            }
            other => panic!("expected bundle config, got {other:?}"),
        }
    }

    #[test]
    fn test_storage_config_ipfs_requires_both_credentials() {
        let missing_secret = StorageConfig::Ipfs {
            api_url: default_ipfs_api_url(),
            gateway_url: default_ipfs_gateway(),
            project_id: Some("project".to_string()),
            secret_key: None,
        };
        assert!(missing_secret.validate().is_err());

        let complete = StorageConfig::Ipfs {
            api_url: default_ipfs_api_url(),
            gateway_url: default_ipfs_gateway(),
            project_id: Some("project".to_string()),
            secret_key: Some("secret".to_string()),
        };
        assert!(complete.validate().is_ok());
        assert_eq!(complete.kind(), "ipfs");
    }

    #[test]
    fn test_storage_config_s3_validate_partial_credentials() {
        let invalid = StorageConfig::S3 {
            bucket: "bucket".to_string(),
            endpoint: None,
            region: None,
            prefix: None,
            access_key_id: Some("access-key".to_string()),
            secret_access_key: None,
            force_path_style: false,
            public_base_url: None,
        };
        assert!(invalid.validate().is_err());

        let valid = StorageConfig::S3 {
            bucket: "bucket".to_string(),
            endpoint: None,
            region: None,
            prefix: None,
            access_key_id: None,
            secret_access_key: None,
            force_path_style: false,
            public_base_url: None,
        };
        assert!(valid.validate().is_ok());
    }

    #[test]
    fn test_registry_config_rejects_zero_window() {
        let config = RegistryConfig {
            window_size: 0,
            ..RegistryConfig::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_collection_config_share_sum() {
        let config: CollectionConfig = serde_json::from_value(serde_json::json!({
            "symbol": "LAND",
            "creators": [{"address": "a", "share": 50}, {"address": "b", "share": 40}]
        }))
        .unwrap();
        assert!(config.is_mutable);
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_cache_config_rejects_separators() {
        let config = CacheConfig {
            name: "../escape".to_string(),
            ..CacheConfig::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_for_testing_is_valid() {
        let dir = tempfile::tempdir().unwrap();
        let config = AppConfig::for_testing(dir.path());
        assert!(config.validate().is_ok());
        assert_eq!(config.grid.layout().cells_per_partition(), 100);
    }
}
