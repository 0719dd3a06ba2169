//! File Storage Service — spec §4.7.
//!
//! The orchestrator the HTTP layer consumes. A thin façade that constructs a
//! [`crate::interceptor::ProcessingContext`] and runs it through the
//! [`crate::interceptor::InterceptorChain`] (spec §3 "the Interceptor Chain
//! is the canonical sequencer; C7 is a thin façade").

use std::sync::Arc;
use uuid::Uuid;

use crate::cache::MetadataCache;
use crate::error::{GatewayError, GatewayResult};
use crate::interceptor::InterceptorChain;
use crate::metadata::postgres_store::MetadataStoreExt;
use crate::metadata::Paging;
use crate::model::{FamilyStorageStats, FileMetadata, FileUploadRequest};
use crate::stats::StatisticsEngine;
use crate::storage::StorageAdapter;
use crate::validator::AuthContext;

pub struct FileListing {
    pub files: Vec<FileMetadata>,
    pub sub_folders: Vec<String>,
    pub total_files: u64,
    pub total_size: u64,
}

pub struct DownloadResult {
    pub bytes: Vec<u8>,
    pub content_type: String,
    pub original_name: String,
}

pub struct FileStorageService {
    chain: InterceptorChain,
    metadata_store: Arc<dyn MetadataStoreExt>,
    storage: Arc<dyn StorageAdapter>,
    cache: Arc<MetadataCache>,
}

impl FileStorageService {
    pub fn new(
        chain: InterceptorChain,
        metadata_store: Arc<dyn MetadataStoreExt>,
        storage: Arc<dyn StorageAdapter>,
        cache: Arc<MetadataCache>,
    ) -> Self {
        FileStorageService {
            chain,
            metadata_store,
            storage,
            cache,
        }
    }

    pub async fn upload(
        &self,
        req: FileUploadRequest,
        auth: &AuthContext,
    ) -> GatewayResult<FileMetadata> {
        self.chain.run_upload(req, auth).await
    }

    pub async fn download(
        &self,
        file_id: Uuid,
        family_id: &str,
        requester_id: &str,
    ) -> GatewayResult<DownloadResult> {
        if let Some(cached) = self.cache.get_file(file_id) {
            if cached.family_id == family_id && !cached.deleted {
                crate::interceptor::authorize_read(&cached, requester_id)?;
            }
        }
        let (bytes, metadata) = self.chain.run_download(file_id, family_id, requester_id).await?;
        self.cache.put_file(metadata.clone());
        Ok(DownloadResult {
            bytes,
            content_type: metadata.file_type,
            original_name: metadata.original_name,
        })
    }

    /// Requester must be `ownerId`; family members are not permitted to
    /// delete other members' files.
    pub async fn delete(
        &self,
        file_id: Uuid,
        family_id: &str,
        user_id: &str,
    ) -> GatewayResult<FileMetadata> {
        self.chain.run_delete(file_id, family_id, user_id).await
    }

    /// Files restricted to the given folder; sub-folders are any
    /// `folderPath` that is a strict extension of the given prefix.
    pub async fn list(&self, family_id: &str, folder_path: &str) -> GatewayResult<FileListing> {
        if let Some(cached) = self.cache.get_list(family_id, folder_path) {
            return Ok(self.summarize_listing(cached, folder_path));
        }
        let files = self.metadata_store.list_active(family_id, folder_path).await?;
        self.cache.put_list(family_id, folder_path, files.clone());
        Ok(self.summarize_listing(files, folder_path))
    }

    /// `rows` is `folder_path`'s own files plus every row whose `folderPath`
    /// is a strict extension of it (`MetadataStore::list_active`'s prefix
    /// scan). `files` in the response is restricted to the folder itself;
    /// the strict extensions become the distinct `sub_folders` names.
    fn summarize_listing(&self, rows: Vec<FileMetadata>, folder_path: &str) -> FileListing {
        let (files, nested): (Vec<FileMetadata>, Vec<FileMetadata>) =
            rows.into_iter().partition(|f| f.folder_path == folder_path);

        let total_files = files.len() as u64;
        let total_size = files.iter().map(|f| f.file_size).sum();
        let mut sub_folders: Vec<String> = nested.into_iter().map(|f| f.folder_path).collect();
        sub_folders.sort();
        sub_folders.dedup();
        FileListing {
            files,
            sub_folders,
            total_files,
            total_size,
        }
    }

    /// Case-insensitive over name/tags/description; sorted by upload time
    /// descending.
    pub async fn search(&self, family_id: &str, keyword: &str) -> GatewayResult<Vec<FileMetadata>> {
        if let Some(cached) = self.cache.get_search(family_id, keyword) {
            return Ok(cached);
        }
        let matches = self
            .metadata_store
            .search_active(family_id, keyword, Paging::default())
            .await?;
        self.cache.put_search(family_id, keyword, matches.clone());
        Ok(matches)
    }

    /// `storageType` and `storageHealthy` are filled from the active
    /// adapter.
    pub async fn stats(&self, family_id: &str) -> GatewayResult<FamilyStorageStats> {
        let mut stats = if let Some(cached) = self.cache.get_stats(family_id) {
            cached
        } else {
            let recomputed = StatisticsEngine::recompute(self.metadata_store.as_ref(), family_id).await?;
            self.cache.put_stats(recomputed.clone());
            recomputed
        };
        stats.storage_type = Some(self.storage.storage_type());
        stats.storage_healthy = Some(self.storage.is_healthy().await);
        Ok(stats)
    }

    pub async fn access_url(
        &self,
        file_id: Uuid,
        family_id: &str,
        expire_minutes: u32,
    ) -> GatewayResult<String> {
        self.metadata_store
            .find_active(file_id, family_id)
            .await?
            .ok_or(GatewayError::NotFound {
                file_id: file_id.to_string(),
            })?;
        self.storage
            .access_url(family_id, file_id, expire_minutes)
            .await?
            .ok_or_else(|| GatewayError::Internal("adapter produced no access URL".to_string()))
    }
}
