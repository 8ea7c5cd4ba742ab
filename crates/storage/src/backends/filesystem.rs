//! Local content-addressed filesystem store.

use crate::error::StorageResult;
use crate::http::join_url;
use crate::traits::AssetStore;
use async_trait::async_trait;
use bytes::Bytes;
use std::path::{Path, PathBuf};
use tessera_core::{ContentHash, ContentType, Locator};
use tokio::fs;
use tokio::io::AsyncWriteExt;
use tracing::{debug, instrument};
use uuid::Uuid;

/// Stores each artifact under `ab/cd/<sha256>.<ext>` below a root directory.
pub struct FilesystemStore {
    root: PathBuf,
    public_base_url: Option<String>,
}

impl FilesystemStore {
    /// Create the store, creating the root directory if needed.
    pub async fn new(
        root: impl AsRef<Path>,
        public_base_url: Option<String>,
    ) -> StorageResult<Self> {
        let root = root.as_ref();
        fs::create_dir_all(root).await?;
        let root = fs::canonicalize(root).await?;
        Ok(Self {
            root,
            public_base_url,
        })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn locator(&self, key: &str) -> Locator {
        match &self.public_base_url {
            Some(base) => Locator::new(join_url(base, key)),
            None => Locator::new(format!("file://{}", self.root.join(key).display())),
        }
    }

    /// Write to a temp file with a unique name, fsync, then rename.
    async fn write_atomic(&self, path: &Path, data: &[u8]) -> StorageResult<()> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).await?;
        }
        let temp_name = format!(".tmp.{}", Uuid::new_v4());
        let temp_path = path.with_file_name(
            path.file_name()
                .map(|n| format!("{}{}", n.to_string_lossy(), temp_name))
                .unwrap_or_else(|| temp_name.clone()),
        );
        {
            let mut file = fs::File::create(&temp_path).await?;
            file.write_all(data).await?;
            file.sync_all().await?;
        }
        fs::rename(&temp_path, path).await?;
        Ok(())
    }
}

#[async_trait]
impl AssetStore for FilesystemStore {
    fn name(&self) -> &'static str {
        "filesystem"
    }

    #[instrument(skip(self, payload), fields(backend = "filesystem", size = payload.len()))]
    async fn store(&self, payload: Bytes, content_type: ContentType) -> StorageResult<Locator> {
        let key = ContentHash::compute(&payload).to_object_key(content_type.extension());
        let path = self.root.join(&key);

        // Same key means same content.
        if fs::try_exists(&path).await? {
            debug!(key = %key, "object already stored");
        } else {
            self.write_atomic(&path, &payload).await?;
        }
        Ok(self.locator(&key))
    }
}
