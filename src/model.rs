//! Data model — spec §3.
//!
//! `FileMetadata` is the central entity; `FamilyStorageStats` the per-family
//! aggregate; `FileUploadRequest`/`ProcessingContext` are transient,
//! per-request values. None of these types are shared-mutable: metadata rows
//! are owned by the metadata store, the cache holds disconnected copies, and
//! `ProcessingContext` lives for exactly one request.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::path::Path;
use uuid::Uuid;

/// Per-file access policy (spec §3, §4.7).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Visibility {
    Private,
    Family,
    Public,
}

impl Default for Visibility {
    fn default() -> Self {
        Visibility::Private
    }
}

impl Visibility {
    pub fn parse(s: &str) -> Option<Self> {
        match s.to_ascii_uppercase().as_str() {
            "PRIVATE" => Some(Visibility::Private),
            "FAMILY" => Some(Visibility::Family),
            "PUBLIC" => Some(Visibility::Public),
            _ => None,
        }
    }
}

/// Which backend physically stores the object (spec §4.1/§9 registry design).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StorageType {
    Local,
    Object,
}

/// Statistics bucket derived from MIME/extension, shared between the
/// validator's allow-list and the statistics classifier (spec §4.6).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FileCategory {
    Image,
    Document,
    Video,
    Audio,
    Archive,
    Other,
}

impl FileCategory {
    pub fn classify(extension: &str) -> Self {
        match extension.to_ascii_lowercase().as_str() {
            "jpg" | "jpeg" | "png" | "gif" => FileCategory::Image,
            "pdf" | "doc" | "docx" | "txt" => FileCategory::Document,
            "mp4" | "avi" => FileCategory::Video,
            "mp3" | "wav" => FileCategory::Audio,
            "zip" | "rar" => FileCategory::Archive,
            _ => FileCategory::Other,
        }
    }

    /// MIME fallback for when an upload carries no content-type hint (spec
    /// §3 "fileType ... derived from MIME/extension"), parallel to
    /// `classify`'s category table over the same allow-listed extensions.
    pub fn mime_for_extension(extension: &str) -> &'static str {
        match extension.to_ascii_lowercase().as_str() {
            "jpg" | "jpeg" => "image/jpeg",
            "png" => "image/png",
            "gif" => "image/gif",
            "pdf" => "application/pdf",
            "doc" => "application/msword",
            "docx" => "application/vnd.openxmlformats-officedocument.wordprocessingml.document",
            "txt" => "text/plain",
            "mp4" => "video/mp4",
            "avi" => "video/x-msvideo",
            "mp3" => "audio/mpeg",
            "wav" => "audio/wav",
            "zip" => "application/zip",
            "rar" => "application/vnd.rar",
            _ => "application/octet-stream",
        }
    }

    pub fn all() -> [FileCategory; 6] {
        [
            FileCategory::Image,
            FileCategory::Document,
            FileCategory::Video,
            FileCategory::Audio,
            FileCategory::Archive,
            FileCategory::Other,
        ]
    }
}

/// The central entity: a durable record of one uploaded file.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FileMetadata {
    pub file_id: Uuid,
    pub family_id: String,
    pub owner_id: String,

    pub original_name: String,
    pub folder_path: String,
    pub file_type: String,

    pub file_size: u64,
    pub storage_type: StorageType,
    pub storage_path: String,

    pub visibility: Visibility,
    pub description: Option<String>,
    pub tags: Vec<String>,

    pub create_time: DateTime<Utc>,
    pub update_time: DateTime<Utc>,
    pub upload_time: DateTime<Utc>,
    pub last_access_time: Option<DateTime<Utc>>,

    pub access_count: u64,
    pub deleted: bool,
}

impl FileMetadata {
    pub fn extension(&self) -> Option<&str> {
        Path::new(&self.original_name)
            .extension()
            .and_then(|e| e.to_str())
    }

    pub fn category(&self) -> FileCategory {
        self.extension()
            .map(FileCategory::classify)
            .unwrap_or(FileCategory::Other)
    }
}

/// One row per `familyId` (spec §3).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FamilyStorageStats {
    pub family_id: String,
    pub total_files: u64,
    pub total_size: u64,
    pub category_counts: std::collections::BTreeMap<FileCategory, u64>,
    pub largest_file_size: u64,
    pub largest_file_name: Option<String>,
    pub most_recent_file_time: Option<DateTime<Utc>>,
    pub last_updated: DateTime<Utc>,

    /// Filled in by the orchestrator from the active `StorageAdapter`, not
    /// stored in the stats table itself (spec §4.7 `stats()`).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub storage_type: Option<StorageType>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub storage_healthy: Option<bool>,
}

impl FamilyStorageStats {
    pub fn empty(family_id: impl Into<String>, now: DateTime<Utc>) -> Self {
        FamilyStorageStats {
            family_id: family_id.into(),
            total_files: 0,
            total_size: 0,
            category_counts: std::collections::BTreeMap::new(),
            largest_file_size: 0,
            largest_file_name: None,
            most_recent_file_time: None,
            last_updated: now,
            storage_type: None,
            storage_healthy: None,
        }
    }
}

// FileCategory needs Ord to live inside a BTreeMap key position.
impl PartialOrd for FileCategory {
    fn partial_cmp(&self, other: &Self) -> Option<std::cmp::Ordering> {
        Some(self.cmp(other))
    }
}
impl Ord for FileCategory {
    fn cmp(&self, other: &Self) -> std::cmp::Ordering {
        (*self as u8).cmp(&(*other as u8))
    }
}

/// Transient request to upload (or overwrite, for MODIFY) a file.
#[derive(Debug, Clone)]
pub struct FileUploadRequest {
    pub family_id: String,
    pub uploader_user_id: String,
    pub original_file_name: String,
    pub folder_path: Option<String>,
    pub visibility: Option<Visibility>,
    pub content_type_hint: Option<String>,
    pub payload: Vec<u8>,
    /// Set when this upload is a MODIFY of an existing file (spec §3
    /// lifecycle: "MODIFY is implemented as overwrite with the same
    /// fileId").
    pub overwrite_file_id: Option<Uuid>,
}

/// Which user-facing operation a `ProcessingContext` is executing.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OperationType {
    Upload,
    Download,
    Delete,
    Modify,
    View,
    Share,
}

/// Monotonic-forward stage marker (spec §3/§4.5), except for the one
/// explicit backwards transition into `RolledBack`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    Init,
    Validated,
    FileStored,
    MetadataWritten,
    StatsUpdated,
    Completed,
    RolledBack,
}

/// Per-request context threaded through the interceptor chain. Replaces the
/// source's implicit thread-local user context with an explicit value
/// (spec §9 "Per-request context propagation").
#[derive(Debug, Clone)]
pub struct RequestContext {
    pub authenticated_user_id: Option<String>,
    pub trace_id: crate::trace::TraceId,
}

impl RequestContext {
    pub fn new(authenticated_user_id: Option<String>) -> Self {
        RequestContext {
            authenticated_user_id,
            trace_id: crate::trace::TraceId::new(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn visibility_defaults_to_private() {
        assert_eq!(Visibility::default(), Visibility::Private);
    }

    #[test]
    fn visibility_parse_is_case_insensitive() {
        assert_eq!(Visibility::parse("family"), Some(Visibility::Family));
        assert_eq!(Visibility::parse("PUBLIC"), Some(Visibility::Public));
        assert_eq!(Visibility::parse("nonsense"), None);
    }

    #[test]
    fn category_classification_matches_extension_table() {
        assert_eq!(FileCategory::classify("JPG"), FileCategory::Image);
        assert_eq!(FileCategory::classify("docx"), FileCategory::Document);
        assert_eq!(FileCategory::classify("xyz"), FileCategory::Other);
    }

    #[test]
    fn mime_fallback_matches_extension_table() {
        assert_eq!(FileCategory::mime_for_extension("JPG"), "image/jpeg");
        assert_eq!(FileCategory::mime_for_extension("pdf"), "application/pdf");
        assert_eq!(FileCategory::mime_for_extension("xyz"), "application/octet-stream");
    }
}
