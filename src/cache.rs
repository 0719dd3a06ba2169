//! Metadata Cache — spec §4.3.
//!
//! Short-TTL lookup cache for hot metadata and search results, keyed by
//! `fileId` and `(familyId, query)`. `DashMap`-keyed concurrent storage is
//! the teacher's own idiom for hot-path shared state
//! (`manager::core::SharedFileManager::active_files: Arc<DashMap<...>>`),
//! adapted here with per-entry TTL expiry. Strictly advisory: every miss
//! falls through to the metadata store, and every write evicts the affected
//! keys (spec §9 "Cache consistency").

use dashmap::DashMap;
use std::time::{Duration, Instant};

use crate::model::{FamilyStorageStats, FileMetadata};

struct Entry<T> {
    value: T,
    expires_at: Instant,
}

pub struct MetadataCache {
    files: DashMap<uuid::Uuid, Entry<FileMetadata>>,
    searches: DashMap<String, Entry<Vec<FileMetadata>>>,
    lists: DashMap<String, Entry<Vec<FileMetadata>>>,
    stats: DashMap<String, Entry<FamilyStorageStats>>,
    ttl_file: Duration,
    ttl_search: Duration,
    ttl_list: Duration,
}

impl MetadataCache {
    pub fn new(ttl_file: Duration, ttl_search: Duration, ttl_list: Duration) -> Self {
        MetadataCache {
            files: DashMap::new(),
            searches: DashMap::new(),
            lists: DashMap::new(),
            stats: DashMap::new(),
            ttl_file,
            ttl_search,
            ttl_list,
        }
    }

    pub fn get_file(&self, file_id: uuid::Uuid) -> Option<FileMetadata> {
        get_if_fresh(&self.files, &file_id)
    }

    pub fn put_file(&self, metadata: FileMetadata) {
        self.files.insert(
            metadata.file_id,
            Entry {
                value: metadata,
                expires_at: Instant::now() + self.ttl_file,
            },
        );
    }

    pub fn get_search(&self, family_id: &str, keyword: &str) -> Option<Vec<FileMetadata>> {
        get_if_fresh(&self.searches, &search_key(family_id, keyword))
    }

    pub fn put_search(&self, family_id: &str, keyword: &str, results: Vec<FileMetadata>) {
        self.searches.insert(
            search_key(family_id, keyword),
            Entry {
                value: results,
                expires_at: Instant::now() + self.ttl_search,
            },
        );
    }

    pub fn get_list(&self, family_id: &str, folder_path: &str) -> Option<Vec<FileMetadata>> {
        get_if_fresh(&self.lists, &list_key(family_id, folder_path))
    }

    pub fn put_list(&self, family_id: &str, folder_path: &str, results: Vec<FileMetadata>) {
        self.lists.insert(
            list_key(family_id, folder_path),
            Entry {
                value: results,
                expires_at: Instant::now() + self.ttl_list,
            },
        );
    }

    pub fn get_stats(&self, family_id: &str) -> Option<FamilyStorageStats> {
        get_if_fresh(&self.stats, &family_id.to_string())
    }

    pub fn put_stats(&self, stats: FamilyStorageStats) {
        self.stats.insert(
            stats.family_id.clone(),
            Entry {
                value: stats,
                expires_at: Instant::now() + self.ttl_search,
            },
        );
    }

    /// Evicts the file's entry plus every `search:*`/`list:*` entry for the
    /// same family. Called after every metadata write (spec §4.3).
    pub fn evict_family(&self, file_id: Option<uuid::Uuid>, family_id: &str) {
        if let Some(id) = file_id {
            self.files.remove(&id);
        }
        let prefix = format!("{family_id}:");
        self.searches.retain(|k, _| !k.starts_with(&prefix));
        self.lists.retain(|k, _| !k.starts_with(&prefix));
        self.stats.remove(family_id);
    }
}

fn get_if_fresh<K, V>(map: &DashMap<K, Entry<V>>, key: &K) -> Option<V>
where
    K: std::hash::Hash + Eq + Clone,
    V: Clone,
{
    let fresh = map
        .get(key)
        .filter(|entry| entry.expires_at > Instant::now())
        .map(|entry| entry.value.clone());
    if fresh.is_none() {
        map.remove(key);
    }
    fresh
}

fn search_key(family_id: &str, keyword: &str) -> String {
    format!("{family_id}:{keyword}")
}

fn list_key(family_id: &str, folder_path: &str) -> String {
    format!("{family_id}:{folder_path}")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{StorageType, Visibility};

    fn sample(family_id: &str) -> FileMetadata {
        FileMetadata {
            file_id: uuid::Uuid::new_v4(),
            family_id: family_id.to_string(),
            owner_id: "user-1".into(),
            original_name: "a.txt".into(),
            folder_path: "/".into(),
            file_type: "text/plain".into(),
            file_size: 10,
            storage_type: StorageType::Local,
            storage_path: "x".into(),
            visibility: Visibility::Private,
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
    fn miss_then_hit() {
        let cache = MetadataCache::new(
            Duration::from_secs(60),
            Duration::from_secs(60),
            Duration::from_secs(60),
        );
        let m = sample("fam-001");
        assert!(cache.get_file(m.file_id).is_none());
        cache.put_file(m.clone());
        assert_eq!(cache.get_file(m.file_id).unwrap().file_id, m.file_id);
    }

    #[test]
    fn evict_family_clears_search_and_list_but_not_other_families() {
        let cache = MetadataCache::new(
            Duration::from_secs(60),
            Duration::from_secs(60),
            Duration::from_secs(60),
        );
        cache.put_search("fam-001", "kw", vec![sample("fam-001")]);
        cache.put_search("fam-002", "kw", vec![sample("fam-002")]);

        cache.evict_family(None, "fam-001");

        assert!(cache.get_search("fam-001", "kw").is_none());
        assert!(cache.get_search("fam-002", "kw").is_some());
    }

    #[test]
    fn expired_entry_is_treated_as_a_miss() {
        let cache = MetadataCache::new(Duration::from_millis(1), Duration::from_secs(60), Duration::from_secs(60));
        let m = sample("fam-001");
        cache.put_file(m.clone());
        std::thread::sleep(Duration::from_millis(20));
        assert!(cache.get_file(m.file_id).is_none());
    }
}
