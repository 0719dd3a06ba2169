//! Statistics Engine — spec §4.6.
//!
//! Pure delta computation shared between UPLOAD/DELETE/MODIFY; the actual
//! writes happen co-transactionally with the metadata write in
//! [`crate::metadata::postgres_store`] (spec §9 Open Question iii).
//! `recompute` is the authoritative re-aggregation, invoked on demand.

use crate::error::GatewayResult;
use crate::metadata::MetadataStore;
use crate::model::{FamilyStorageStats, FileMetadata};

/// A bounded-at-zero adjustment to one family's stats row.
#[derive(Debug, Clone, Default)]
pub struct StatsDelta {
    pub total_files_delta: i64,
    pub total_size_delta: i64,
    pub largest_file_candidate: Option<(String, u64)>,
}

pub struct StatisticsEngine;

impl StatisticsEngine {
    pub fn on_file_uploaded(metadata: &FileMetadata) -> StatsDelta {
        StatsDelta {
            total_files_delta: 1,
            total_size_delta: metadata.file_size as i64,
            largest_file_candidate: Some((metadata.original_name.clone(), metadata.file_size)),
        }
    }

    pub fn on_file_deleted(metadata: &FileMetadata) -> StatsDelta {
        StatsDelta {
            total_files_delta: -1,
            total_size_delta: -(metadata.file_size as i64),
            largest_file_candidate: None,
        }
    }

    pub fn on_file_modified(metadata: &FileMetadata, size_delta: i64) -> StatsDelta {
        StatsDelta {
            total_files_delta: 0,
            total_size_delta: size_delta,
            largest_file_candidate: Some((metadata.original_name.clone(), metadata.file_size)),
        }
    }

    /// Authoritative re-aggregation over active metadata rows. Idempotent;
    /// safe to call from a scheduled reconciliation job or the first read
    /// after process start.
    pub async fn recompute(
        store: &dyn MetadataStore,
        family_id: &str,
    ) -> GatewayResult<FamilyStorageStats> {
        let total_files = store.count_active_by_family(family_id).await?;
        let total_size = store.sum_size_by_family(family_id).await?;
        let category_counts = store.count_by_type_by_family(family_id).await?;
        let largest = store.largest_active_file(family_id).await?;
        let most_recent = store.most_recent_upload_time(family_id).await?;

        let mut stats = FamilyStorageStats::empty(family_id, chrono::Utc::now());
        stats.total_files = total_files;
        stats.total_size = total_size;
        stats.category_counts = category_counts;
        if let Some((name, size, _)) = largest {
            stats.largest_file_name = Some(name);
            stats.largest_file_size = size;
        }
        stats.most_recent_file_time = most_recent;
        Ok(stats)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{StorageType, Visibility};
    use uuid::Uuid;

    fn sample() -> FileMetadata {
        FileMetadata {
            file_id: Uuid::new_v4(),
            family_id: "fam-001".into(),
            owner_id: "user-1".into(),
            original_name: "photo.jpg".into(),
            folder_path: "/pics".into(),
            file_type: "image/jpeg".into(),
            file_size: 1024,
            storage_type: StorageType::Local,
            storage_path: "families/fam-001/pics/x.jpg".into(),
            visibility: Visibility::Family,
            description: None,
            tags: vec![],
            create_time: chrono::Utc::now(),
            update_time: chrono::Utc::now(),
            upload_time: chrono::Utc::now(),
            last_access_time: None,
            access_count: 0,
            deleted: false,
        }
    }

    #[test]
    fn upload_delta_adds_one_file_and_its_size() {
        let delta = StatisticsEngine::on_file_uploaded(&sample());
        assert_eq!(delta.total_files_delta, 1);
        assert_eq!(delta.total_size_delta, 1024);
    }

    #[test]
    fn delete_delta_is_the_negation_of_upload() {
        let m = sample();
        let up = StatisticsEngine::on_file_uploaded(&m);
        let down = StatisticsEngine::on_file_deleted(&m);
        assert_eq!(up.total_files_delta, -down.total_files_delta);
        assert_eq!(up.total_size_delta, -down.total_size_delta);
    }
}
