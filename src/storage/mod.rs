//! Storage Adapter abstraction — spec §4.1.
//!
//! Two variants, selected at startup by `storage.type`: [`local_fs::LocalFsAdapter`]
//! and [`object_store_adapter::ObjectStoreAdapter`]. Per spec §9's design note,
//! the source's annotation-driven conditional bean construction is replaced
//! by an explicit registry producing a single active adapter.

pub mod local_fs;
pub mod object_store_adapter;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::error::GatewayResult;

/// Result of a successful `upload`.
#[derive(Debug, Clone)]
pub struct UploadOutcome {
    pub storage_path: String,
}

/// Common contract implemented by every storage backend (spec §4.1).
#[async_trait]
pub trait StorageAdapter: Send + Sync {
    /// Writes `payload` into the family-scoped namespace for `family_id`,
    /// using `file_id`/`extension` to name the object. `uploader_user_id`
    /// and `upload_time` are carried through so the object store backend
    /// can attach the `{familyId, uploaderUserId, uploadTime}` object tags
    /// spec §4.1/§6 mandate; the LocalFS backend has no tagging concept and
    /// ignores them. Returns the backend-specific storage path.
    async fn upload(
        &self,
        family_id: &str,
        file_id: Uuid,
        extension: Option<&str>,
        folder_path: &str,
        payload: &[u8],
        uploader_user_id: &str,
        upload_time: DateTime<Utc>,
    ) -> GatewayResult<UploadOutcome>;

    /// Resolves the object whose leaf name starts with `<file_id>.` inside
    /// the family namespace.
    async fn download(&self, family_id: &str, file_id: Uuid) -> GatewayResult<Vec<u8>>;

    /// Idempotent; `Ok(true)` iff an object was actually removed.
    async fn delete(&self, family_id: &str, file_id: Uuid) -> GatewayResult<bool>;

    /// Flat list of immediate children under `folder_path`.
    async fn list(&self, family_id: &str, folder_path: &str) -> GatewayResult<Vec<String>>;

    async fn is_healthy(&self) -> bool;

    /// `None` if the backend has no concept of a direct URL (never the case
    /// for the two adapters specified here, but kept `Option` for future
    /// backends).
    async fn access_url(
        &self,
        family_id: &str,
        file_id: Uuid,
        expire_minutes: u32,
    ) -> GatewayResult<Option<String>>;

    fn storage_type(&self) -> crate::model::StorageType;
}

/// Sanitizes a caller-supplied folder path before it is resolved against a
/// family root. This is a hard guard against traversal independent of the
/// validator (spec §4.1 "Edge policies").
pub fn sanitize_folder_path(folder_path: &str) -> String {
    let stripped = folder_path.trim_start_matches('/').trim_end_matches('/');
    stripped
        .split('/')
        .filter(|segment| !segment.is_empty() && *segment != "..")
        .collect::<Vec<_>>()
        .join("/")
}

/// Produces the single active adapter selected by `storage.type` (spec §9).
pub fn build_adapter(config: &crate::config::StorageConfig) -> GatewayResult<Box<dyn StorageAdapter>> {
    match config.storage_type {
        crate::model::StorageType::Local => Ok(Box::new(local_fs::LocalFsAdapter::new(
            config.local.clone(),
        ))),
        crate::model::StorageType::Object => Ok(Box::new(object_store_adapter::ObjectStoreAdapter::new(
            config.object.clone(),
        )?)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sanitize_strips_slashes_and_traversal() {
        assert_eq!(sanitize_folder_path("/a/../b/"), "a/b");
        assert_eq!(sanitize_folder_path("/"), "");
        assert_eq!(sanitize_folder_path("a//b"), "a/b");
    }
}
