//! In-memory `MetadataStore`/`MetadataStoreExt` double for integration
//! tests; there is no live Postgres to round-trip against here.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::collections::{BTreeMap, HashMap};
use std::sync::Mutex;
use uuid::Uuid;

use family_storage_gateway::error::{GatewayError, GatewayResult};
use family_storage_gateway::metadata::postgres_store::MetadataStoreExt;
use family_storage_gateway::metadata::{MetadataStore, Paging};
use family_storage_gateway::model::{FileCategory, FileMetadata};
use family_storage_gateway::stats::StatsDelta;

#[derive(Default)]
pub struct InMemoryMetadataStore {
    rows: Mutex<HashMap<Uuid, FileMetadata>>,
}

impl InMemoryMetadataStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl MetadataStore for InMemoryMetadataStore {
    async fn save(&self, metadata: FileMetadata) -> GatewayResult<FileMetadata> {
        self.rows.lock().unwrap().insert(metadata.file_id, metadata.clone());
        Ok(metadata)
    }

    async fn update(&self, metadata: FileMetadata) -> GatewayResult<FileMetadata> {
        let mut rows = self.rows.lock().unwrap();
        if !rows.contains_key(&metadata.file_id) {
            return Err(GatewayError::NotFound {
                file_id: metadata.file_id.to_string(),
            });
        }
        rows.insert(metadata.file_id, metadata.clone());
        Ok(metadata)
    }

    async fn find_active(&self, file_id: Uuid, family_id: &str) -> GatewayResult<Option<FileMetadata>> {
        Ok(self
            .rows
            .lock()
            .unwrap()
            .get(&file_id)
            .filter(|m| m.family_id == family_id && !m.deleted)
            .cloned())
    }

    async fn find_by_id(&self, file_id: Uuid) -> GatewayResult<Option<FileMetadata>> {
        Ok(self.rows.lock().unwrap().get(&file_id).cloned())
    }

    async fn soft_delete(&self, file_id: Uuid, ts: DateTime<Utc>) -> GatewayResult<()> {
        if let Some(row) = self.rows.lock().unwrap().get_mut(&file_id) {
            row.deleted = true;
            row.update_time = ts;
        }
        Ok(())
    }

    async fn increment_access_count(&self, file_id: Uuid, ts: DateTime<Utc>) -> GatewayResult<()> {
        if let Some(row) = self.rows.lock().unwrap().get_mut(&file_id) {
            row.access_count += 1;
            row.last_access_time = Some(ts);
        }
        Ok(())
    }

    async fn search_active(
        &self,
        family_id: &str,
        keyword: &str,
        paging: Paging,
    ) -> GatewayResult<Vec<FileMetadata>> {
        let keyword = keyword.to_ascii_lowercase();
        let mut matches: Vec<FileMetadata> = self
            .rows
            .lock()
            .unwrap()
            .values()
            .filter(|m| {
                m.family_id == family_id
                    && !m.deleted
                    && (m.original_name.to_ascii_lowercase().contains(&keyword)
                        || m.description
                            .as_deref()
                            .map(|d| d.to_ascii_lowercase().contains(&keyword))
                            .unwrap_or(false)
                        || m.tags.iter().any(|t| t.to_ascii_lowercase().contains(&keyword)))
            })
            .cloned()
            .collect();
        matches.sort_by(|a, b| b.upload_time.cmp(&a.upload_time));
        let offset = paging.offset as usize;
        let limit = if paging.limit == 0 { matches.len() } else { paging.limit as usize };
        Ok(matches.into_iter().skip(offset).take(limit).collect())
    }

    async fn list_active(&self, family_id: &str, folder_path: &str) -> GatewayResult<Vec<FileMetadata>> {
        let base = folder_path.trim_end_matches('/');
        let sub_prefix = if base.is_empty() { "/".to_string() } else { format!("{base}/") };
        Ok(self
            .rows
            .lock()
            .unwrap()
            .values()
            .filter(|m| {
                m.family_id == family_id
                    && !m.deleted
                    && (m.folder_path == folder_path || m.folder_path.starts_with(&sub_prefix))
            })
            .cloned()
            .collect())
    }

    async fn count_active_by_family(&self, family_id: &str) -> GatewayResult<u64> {
        Ok(self
            .rows
            .lock()
            .unwrap()
            .values()
            .filter(|m| m.family_id == family_id && !m.deleted)
            .count() as u64)
    }

    async fn sum_size_by_family(&self, family_id: &str) -> GatewayResult<u64> {
        Ok(self
            .rows
            .lock()
            .unwrap()
            .values()
            .filter(|m| m.family_id == family_id && !m.deleted)
            .map(|m| m.file_size)
            .sum())
    }

    async fn count_by_type_by_family(
        &self,
        family_id: &str,
    ) -> GatewayResult<BTreeMap<FileCategory, u64>> {
        let mut counts = BTreeMap::new();
        for category in FileCategory::all() {
            counts.insert(category, 0);
        }
        for m in self
            .rows
            .lock()
            .unwrap()
            .values()
            .filter(|m| m.family_id == family_id && !m.deleted)
        {
            *counts.entry(m.category()).or_insert(0) += 1;
        }
        Ok(counts)
    }

    async fn largest_active_file(
        &self,
        family_id: &str,
    ) -> GatewayResult<Option<(String, u64, DateTime<Utc>)>> {
        Ok(self
            .rows
            .lock()
            .unwrap()
            .values()
            .filter(|m| m.family_id == family_id && !m.deleted)
            .max_by_key(|m| (m.file_size, m.upload_time))
            .map(|m| (m.original_name.clone(), m.file_size, m.upload_time)))
    }

    async fn most_recent_upload_time(&self, family_id: &str) -> GatewayResult<Option<DateTime<Utc>>> {
        Ok(self
            .rows
            .lock()
            .unwrap()
            .values()
            .filter(|m| m.family_id == family_id && !m.deleted)
            .map(|m| m.upload_time)
            .max())
    }
}

/// Statistics are derived fresh from [`MetadataStore`] counts on every read
/// (`StatisticsEngine::recompute`), so the `_with_stats` variants here only
/// need to perform the underlying write; there is no separate ledger to
/// keep in sync.
#[async_trait]
impl MetadataStoreExt for InMemoryMetadataStore {
    async fn save_with_stats(&self, metadata: FileMetadata, _delta: StatsDelta) -> GatewayResult<FileMetadata> {
        self.save(metadata).await
    }

    async fn soft_delete_with_stats(
        &self,
        file_id: Uuid,
        _family_id: &str,
        ts: DateTime<Utc>,
        _delta: StatsDelta,
    ) -> GatewayResult<()> {
        self.soft_delete(file_id, ts).await
    }

    async fn update_with_stats(&self, metadata: FileMetadata, _delta: StatsDelta) -> GatewayResult<FileMetadata> {
        self.update(metadata).await
    }
}
