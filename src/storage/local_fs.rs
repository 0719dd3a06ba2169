//! LocalFS storage adapter — spec §4.1/§6.
//!
//! Layout: `<basePath>/families/<familyId>/<sanitized folderPath>/<fileId>.<ext>`.
//! Writes are atomic (temp file + rename), grounded directly on the
//! filesystem backend idiom used for content-addressable blob storage in the
//! reference pack (temp-then-rename, explicit 0o644 permissions, a
//! round-trip health check).

use async_trait::async_trait;
use std::path::{Path, PathBuf};
use tokio::fs;
use tokio::io::AsyncWriteExt;
use tracing::{debug, warn};
use uuid::Uuid;

use super::{sanitize_folder_path, StorageAdapter, UploadOutcome};
use crate::config::LocalStorageConfig;
use crate::error::{ErrorContext, GatewayError, GatewayResult};
use crate::model::StorageType;

pub struct LocalFsAdapter {
    config: LocalStorageConfig,
}

impl LocalFsAdapter {
    pub fn new(config: LocalStorageConfig) -> Self {
        LocalFsAdapter { config }
    }

    fn family_root(&self, family_id: &str) -> PathBuf {
        self.config.base_path.join("families").join(family_id)
    }

    fn object_dir(&self, family_id: &str, folder_path: &str) -> PathBuf {
        let sanitized = sanitize_folder_path(folder_path);
        if sanitized.is_empty() {
            self.family_root(family_id)
        } else {
            self.family_root(family_id).join(sanitized)
        }
    }

    /// Scans a directory for the leaf name that starts with `<file_id>.`
    /// (spec §4.1 download contract).
    async fn find_object(&self, family_id: &str, file_id: Uuid) -> GatewayResult<Option<PathBuf>> {
        let root = self.family_root(family_id);
        if !root.exists() {
            return Ok(None);
        }
        let prefix = format!("{file_id}.");
        let mut found = None;
        let mut stack = vec![root];
        while let Some(dir) = stack.pop() {
            let mut entries = match fs::read_dir(&dir).await {
                Ok(e) => e,
                Err(_) => continue,
            };
            while let Some(entry) = entries.next_entry().await.adapter_context(Some(dir.clone()))? {
                let path = entry.path();
                if path.is_dir() {
                    stack.push(path);
                    continue;
                }
                if let Some(name) = path.file_name().and_then(|n| n.to_str()) {
                    if name.starts_with(&prefix) {
                        found = Some(path);
                    }
                }
            }
        }
        Ok(found)
    }
}

#[async_trait]
impl StorageAdapter for LocalFsAdapter {
    async fn upload(
        &self,
        family_id: &str,
        file_id: Uuid,
        extension: Option<&str>,
        folder_path: &str,
        payload: &[u8],
        _uploader_user_id: &str,
        _upload_time: chrono::DateTime<chrono::Utc>,
    ) -> GatewayResult<UploadOutcome> {
        let dir = self.object_dir(family_id, folder_path);
        fs::create_dir_all(&dir).await.adapter_context(Some(dir.clone()))?;

        let leaf = match extension {
            Some(ext) => format!("{file_id}.{ext}"),
            None => file_id.to_string(),
        };
        let final_path = dir.join(&leaf);
        let temp_path = dir.join(format!("{file_id}.tmp"));

        debug!(family_id, %file_id, path = %final_path.display(), size = payload.len(), "local_fs: write");

        let mut file = fs::File::create(&temp_path)
            .await
            .adapter_context(Some(temp_path.clone()))?;
        file.write_all(payload)
            .await
            .adapter_context(Some(temp_path.clone()))?;
        file.sync_all().await.adapter_context(Some(temp_path.clone()))?;
        drop(file);

        fs::rename(&temp_path, &final_path)
            .await
            .map_err(|e| {
                warn!(from = %temp_path.display(), to = %final_path.display(), error = %e, "local_fs: rename failed");
                e
            })
            .adapter_context(Some(final_path.clone()))?;

        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            fs::set_permissions(&final_path, std::fs::Permissions::from_mode(0o644))
                .await
                .adapter_context(Some(final_path.clone()))?;
        }

        Ok(UploadOutcome {
            storage_path: final_path.to_string_lossy().into_owned(),
        })
    }

    async fn download(&self, family_id: &str, file_id: Uuid) -> GatewayResult<Vec<u8>> {
        match self.find_object(family_id, file_id).await? {
            Some(path) => fs::read(&path).await.adapter_context(Some(path)),
            None => Err(GatewayError::NotFound {
                file_id: file_id.to_string(),
            }),
        }
    }

    async fn delete(&self, family_id: &str, file_id: Uuid) -> GatewayResult<bool> {
        match self.find_object(family_id, file_id).await? {
            Some(path) => {
                fs::remove_file(&path).await.adapter_context(Some(path))?;
                Ok(true)
            }
            None => Ok(false),
        }
    }

    async fn list(&self, family_id: &str, folder_path: &str) -> GatewayResult<Vec<String>> {
        let dir = self.object_dir(family_id, folder_path);
        if !dir.exists() {
            return Ok(Vec::new());
        }
        let mut names = Vec::new();
        let mut entries = fs::read_dir(&dir).await.adapter_context(Some(dir.clone()))?;
        while let Some(entry) = entries.next_entry().await.adapter_context(Some(dir.clone()))? {
            if let Some(name) = entry.file_name().to_str() {
                if !name.ends_with(".tmp") {
                    names.push(name.to_string());
                }
            }
        }
        Ok(names)
    }

    async fn is_healthy(&self) -> bool {
        health_check(&self.config.base_path, self.config.auto_create)
            .await
            .is_ok()
    }

    async fn access_url(
        &self,
        family_id: &str,
        file_id: Uuid,
        _expire_minutes: u32,
    ) -> GatewayResult<Option<String>> {
        Ok(Some(format!(
            "/api/v1/storage/files/download/{file_id}?familyId={family_id}"
        )))
    }

    fn storage_type(&self) -> StorageType {
        StorageType::Local
    }
}

/// Round-trip health check: base path exists (created on demand), writable,
/// readable, and cleans up after itself.
async fn health_check(base_path: &Path, auto_create: bool) -> Result<(), std::io::Error> {
    if !base_path.exists() {
        if auto_create {
            fs::create_dir_all(base_path).await?;
        } else {
            return Err(std::io::Error::new(
                std::io::ErrorKind::NotFound,
                "base path missing and auto-create disabled",
            ));
        }
    }
    let probe_dir = base_path.join(".health-check");
    fs::create_dir_all(&probe_dir).await?;
    let probe_file = probe_dir.join("probe.bin");
    let data = b"storage-health-check";
    fs::write(&probe_file, data).await?;
    let read_back = fs::read(&probe_file).await?;
    if read_back != data {
        return Err(std::io::Error::new(std::io::ErrorKind::InvalidData, "read-back mismatch"));
    }
    let _ = fs::remove_file(&probe_file).await;
    let _ = fs::remove_dir(&probe_dir).await;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config(dir: &Path) -> LocalStorageConfig {
        LocalStorageConfig {
            base_path: dir.to_path_buf(),
            auto_create: true,
        }
    }

    #[tokio::test]
    async fn upload_then_download_round_trips_bytes() {
        let dir = tempfile::tempdir().unwrap();
        let adapter = LocalFsAdapter::new(config(dir.path()));
        let file_id = Uuid::new_v4();
        let payload = b"hello family".to_vec();

        adapter
            .upload("fam-001", file_id, Some("txt"), "/notes", &payload, "user-1", chrono::Utc::now())
            .await
            .unwrap();

        let downloaded = adapter.download("fam-001", file_id).await.unwrap();
        assert_eq!(downloaded, payload);
    }

    #[tokio::test]
    async fn download_missing_file_is_not_found() {
        let dir = tempfile::tempdir().unwrap();
        let adapter = LocalFsAdapter::new(config(dir.path()));
        let err = adapter.download("fam-001", Uuid::new_v4()).await.unwrap_err();
        assert!(matches!(err, GatewayError::NotFound { .. }));
    }

    #[tokio::test]
    async fn delete_is_idempotent() {
        let dir = tempfile::tempdir().unwrap();
        let adapter = LocalFsAdapter::new(config(dir.path()));
        let file_id = Uuid::new_v4();
        adapter
            .upload("fam-001", file_id, Some("txt"), "/", b"data", "user-1", chrono::Utc::now())
            .await
            .unwrap();

        assert!(adapter.delete("fam-001", file_id).await.unwrap());
        assert!(!adapter.delete("fam-001", file_id).await.unwrap());
    }

    #[tokio::test]
    async fn is_healthy_creates_base_path_when_auto_create() {
        let dir = tempfile::tempdir().unwrap();
        let nested = dir.path().join("nested");
        let adapter = LocalFsAdapter::new(config(&nested));
        assert!(adapter.is_healthy().await);
        assert!(nested.exists());
    }
}
