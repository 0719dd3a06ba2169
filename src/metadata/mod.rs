//! Metadata Store — spec §4.2.
//!
//! Durable record of every file: identity, owner, family, storage
//! coordinates, size, type, visibility, soft-delete, access counters.
//! PostgreSQL is the only implementation (spec §9 Open Question ii: the
//! source's in-memory caches co-existing with a Postgres repository are
//! resolved here by making Postgres authoritative and the cache strictly
//! advisory — see [`crate::cache`]).

pub mod postgres_store;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::error::GatewayResult;
use crate::model::FileMetadata;

#[derive(Debug, Clone, Default)]
pub struct Paging {
    pub offset: u32,
    pub limit: u32,
}

/// Durable metadata persistence contract (spec §4.2).
#[async_trait]
pub trait MetadataStore: Send + Sync {
    /// Insert; sets `createTime` and `updateTime`; returns the persisted row.
    async fn save(&self, metadata: FileMetadata) -> GatewayResult<FileMetadata>;

    /// Requires an existing `fileId`; touches `updateTime`.
    async fn update(&self, metadata: FileMetadata) -> GatewayResult<FileMetadata>;

    /// Only rows with `deleted=false` and matching `familyId`.
    async fn find_active(&self, file_id: Uuid, family_id: &str) -> GatewayResult<Option<FileMetadata>>;

    /// Unscoped; used for authorization/ownership checks and GC.
    async fn find_by_id(&self, file_id: Uuid) -> GatewayResult<Option<FileMetadata>>;

    async fn soft_delete(&self, file_id: Uuid, ts: DateTime<Utc>) -> GatewayResult<()>;

    /// Atomic +1 and set `lastAccessTime`.
    async fn increment_access_count(&self, file_id: Uuid, ts: DateTime<Utc>) -> GatewayResult<()>;

    /// Case-insensitive substring match over name/description/tags, sorted
    /// by `uploadTime` descending.
    async fn search_active(
        &self,
        family_id: &str,
        keyword: &str,
        paging: Paging,
    ) -> GatewayResult<Vec<FileMetadata>>;

    /// Rows whose `folderPath` equals `folder_path` or is a strict extension
    /// of it (spec §4.7 "sub-folders are any folderPath that is a strict
    /// extension of the given prefix"); the caller separates the two.
    async fn list_active(&self, family_id: &str, folder_path: &str) -> GatewayResult<Vec<FileMetadata>>;

    async fn count_active_by_family(&self, family_id: &str) -> GatewayResult<u64>;
    async fn sum_size_by_family(&self, family_id: &str) -> GatewayResult<u64>;
    async fn count_by_type_by_family(
        &self,
        family_id: &str,
    ) -> GatewayResult<std::collections::BTreeMap<crate::model::FileCategory, u64>>;

    /// The largest active file in the family, with its `uploadTime`; used by
    /// `StatisticsEngine::recompute` to re-derive `largestFileSize`/
    /// `largestFileName`/`mostRecentFileTime` from scratch.
    async fn largest_active_file(&self, family_id: &str) -> GatewayResult<Option<(String, u64, DateTime<Utc>)>>;

    /// The most recent `uploadTime` among active files in the family.
    async fn most_recent_upload_time(&self, family_id: &str) -> GatewayResult<Option<DateTime<Utc>>>;
}
