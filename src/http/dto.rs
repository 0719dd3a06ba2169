//! Request/response DTOs for the HTTP surface (spec §6).

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::model::{FamilyStorageStats, FileMetadata, StorageType, Visibility};

#[derive(Debug, Serialize)]
pub struct UploadResponse {
    pub file_id: Uuid,
    pub file_size: u64,
    pub storage_type: StorageType,
    pub upload_time: chrono::DateTime<chrono::Utc>,
    pub trace_id: String,
}

impl UploadResponse {
    pub fn from_metadata(metadata: &FileMetadata, trace_id: &crate::trace::TraceId) -> Self {
        UploadResponse {
            file_id: metadata.file_id,
            file_size: metadata.file_size,
            storage_type: metadata.storage_type,
            upload_time: metadata.upload_time,
            trace_id: trace_id.to_string(),
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct DownloadQuery {
    pub family_id: String,
}

#[derive(Debug, Serialize)]
pub struct DeleteResponse {
    pub ok: bool,
    pub deleted_name: String,
}

#[derive(Debug, Deserialize)]
pub struct DeleteQuery {
    pub family_id: String,
    pub user_id: String,
}

#[derive(Debug, Deserialize)]
pub struct ListQuery {
    pub family_id: String,
    #[serde(default = "default_folder_path")]
    pub folder_path: String,
}

fn default_folder_path() -> String {
    "/".to_string()
}

#[derive(Debug, Serialize)]
pub struct ListResponse {
    pub current_path: String,
    pub files: Vec<FileSummary>,
    pub sub_folders: Vec<String>,
    pub total_files: u64,
    pub total_size: u64,
}

#[derive(Debug, Serialize)]
pub struct FileSummary {
    pub file_id: Uuid,
    pub original_name: String,
    pub file_size: u64,
    pub file_type: String,
    pub visibility: Visibility,
    pub upload_time: chrono::DateTime<chrono::Utc>,
}

impl From<&FileMetadata> for FileSummary {
    fn from(m: &FileMetadata) -> Self {
        FileSummary {
            file_id: m.file_id,
            original_name: m.original_name.clone(),
            file_size: m.file_size,
            file_type: m.file_type.clone(),
            visibility: m.visibility,
            upload_time: m.upload_time,
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct SearchQuery {
    pub family_id: String,
    pub keyword: String,
}

#[derive(Debug, Serialize)]
pub struct SearchResponse {
    pub keyword: String,
    pub matched_files: Vec<FileSummary>,
    pub total_matches: usize,
}

#[derive(Debug, Serialize)]
pub struct StatsResponse {
    #[serde(flatten)]
    pub stats: FamilyStorageStats,
}
