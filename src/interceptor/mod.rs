//! Interceptor Chain — spec §4.5.
//!
//! An ordered pipeline: Validation → Storage → Metadata → Statistics →
//! Completion, data-driven by `operationType`. Per spec §9's design note,
//! stages are a small trait with `intercept(ctx, next)` rather than the
//! source's reflective lookup; failures return a tagged `GatewayResult`
//! rather than relying on exceptions for rollback logic.

use std::sync::Arc;
use tracing::{info, warn};
use uuid::Uuid;

use crate::cache::MetadataCache;
use crate::error::{GatewayError, GatewayResult};
use crate::metadata::postgres_store::MetadataStoreExt;
use crate::model::{FileMetadata, FileUploadRequest, OperationType, RequestContext, Stage, StorageType};
use crate::stats::StatisticsEngine;
use crate::storage::StorageAdapter;
use crate::validator::{AuthContext, FileValidator};

/// Per-request state threaded through the chain (spec §3 ProcessingContext).
pub struct ProcessingContext {
    pub operation: OperationType,
    pub stage: Stage,
    pub request_ctx: RequestContext,
    pub metadata: Option<FileMetadata>,
    pub storage_path: Option<String>,
}

impl ProcessingContext {
    pub fn new(operation: OperationType, request_ctx: RequestContext) -> Self {
        ProcessingContext {
            operation,
            stage: Stage::Init,
            request_ctx,
            metadata: None,
            storage_path: None,
        }
    }
}

/// Composes the Storage/Metadata/Statistics backends the chain drives.
pub struct InterceptorChain {
    pub validator: Arc<FileValidator>,
    pub storage: Arc<dyn StorageAdapter>,
    pub metadata_store: Arc<dyn MetadataStoreExt>,
    pub cache: Arc<MetadataCache>,
}

impl InterceptorChain {
    pub fn new(
        validator: Arc<FileValidator>,
        storage: Arc<dyn StorageAdapter>,
        metadata_store: Arc<dyn MetadataStoreExt>,
        cache: Arc<MetadataCache>,
    ) -> Self {
        InterceptorChain {
            validator,
            storage,
            metadata_store,
            cache,
        }
    }

    /// UPLOAD / MODIFY: Validation → compute storage coordinates →
    /// Storage.put → Metadata.save-or-update → Statistics.onFile{Uploaded,Modified}.
    pub async fn run_upload(
        &self,
        req: FileUploadRequest,
        auth: &AuthContext,
    ) -> GatewayResult<FileMetadata> {
        let mut ctx = ProcessingContext::new(
            if req.overwrite_file_id.is_some() {
                OperationType::Modify
            } else {
                OperationType::Upload
            },
            self.request_ctx_from_auth(auth),
        );

        if let Err(e) = self.validator.check(&req, auth) {
            return Err(e);
        }
        ctx.stage = Stage::Validated;

        // MODIFY overwrites an existing fileId; the requester must own the
        // row being overwritten (spec §9 Open Question i, extending the
        // DELETE ownership rule to MODIFY).
        let existing = match req.overwrite_file_id {
            Some(file_id) => {
                let existing = self
                    .metadata_store
                    .find_active(file_id, &req.family_id)
                    .await?
                    .ok_or(GatewayError::NotFound {
                        file_id: file_id.to_string(),
                    })?;
                if existing.owner_id != req.uploader_user_id {
                    return Err(GatewayError::PermissionDenied {
                        reason: "only the owner may modify this file".to_string(),
                    });
                }
                Some(existing)
            }
            None => None,
        };

        let file_id = req.overwrite_file_id.unwrap_or_else(Uuid::new_v4);
        let extension = std::path::Path::new(&req.original_file_name)
            .extension()
            .and_then(|e| e.to_str());
        let folder_path = req.folder_path.clone().unwrap_or_else(|| "/".to_string());
        let now = chrono::Utc::now();

        let upload_result = self
            .storage
            .upload(
                &req.family_id,
                file_id,
                extension,
                &folder_path,
                &req.payload,
                &req.uploader_user_id,
                now,
            )
            .await;

        let outcome = match upload_result {
            Ok(outcome) => outcome,
            Err(e) => {
                // Failure before FILE_STORED leaves no side effects.
                warn!(error = %e, "interceptor: upload stage failed before FILE_STORED");
                return Err(GatewayError::UploadFailed {
                    message: e.to_string(),
                });
            }
        };
        ctx.stage = Stage::FileStored;
        ctx.storage_path = Some(outcome.storage_path.clone());

        // A MODIFY whose new name carries a different extension leaves the
        // previous object behind under the old leaf name; it becomes an
        // orphan detectable by the (out of scope) GC sweep described in
        // spec §3, not cleaned up synchronously here.
        if let Some(existing) = &existing {
            if existing.storage_path != outcome.storage_path {
                warn!(
                    file_id = %file_id, old_path = %existing.storage_path, new_path = %outcome.storage_path,
                    "interceptor: modify changed storage path, previous object is now orphaned"
                );
            }
        }

        let metadata = FileMetadata {
            file_id,
            family_id: req.family_id.clone(),
            owner_id: req.uploader_user_id.clone(),
            original_name: req.original_file_name.clone(),
            folder_path,
            file_type: req.content_type_hint.clone().unwrap_or_else(|| {
                extension
                    .map(crate::model::FileCategory::mime_for_extension)
                    .unwrap_or("application/octet-stream")
                    .to_string()
            }),
            file_size: req.payload.len() as u64,
            storage_type: self.storage.storage_type(),
            storage_path: outcome.storage_path,
            visibility: req.visibility.unwrap_or_default(),
            description: existing.as_ref().and_then(|e| e.description.clone()),
            tags: existing.as_ref().map(|e| e.tags.clone()).unwrap_or_default(),
            create_time: existing.as_ref().map(|e| e.create_time).unwrap_or(now),
            update_time: now,
            upload_time: now,
            last_access_time: existing.as_ref().and_then(|e| e.last_access_time),
            access_count: existing.as_ref().map(|e| e.access_count).unwrap_or(0),
            deleted: false,
        };

        let persisted = if let Some(existing) = &existing {
            let size_delta = metadata.file_size as i64 - existing.file_size as i64;
            let delta = StatisticsEngine::on_file_modified(&metadata, size_delta);
            self.metadata_store.update_with_stats(metadata, delta).await
        } else {
            let delta = StatisticsEngine::on_file_uploaded(&metadata);
            self.metadata_store.save_with_stats(metadata, delta).await
        };
        let persisted = match persisted {
            Ok(m) => m,
            Err(e) => {
                // Failure at or after FILE_STORED but before METADATA_WRITTEN:
                // compensate by deleting the just-stored object.
                warn!(error = %e, "interceptor: metadata write failed, rolling back storage");
                let _ = self.storage.delete(&req.family_id, file_id).await;
                ctx.stage = Stage::RolledBack;
                return Err(GatewayError::UploadFailed {
                    message: e.to_string(),
                });
            }
        };
        ctx.stage = Stage::MetadataWritten;
        ctx.metadata = Some(persisted.clone());
        ctx.stage = Stage::StatsUpdated;

        self.cache.evict_family(Some(file_id), &req.family_id);
        ctx.stage = Stage::Completed;

        info!(file_id = %file_id, family_id = %req.family_id, "interceptor: upload completed");
        Ok(persisted)
    }

    /// DELETE: Validation → Metadata.findActive → Storage.delete →
    /// Metadata.softDelete → Statistics.onFileDeleted.
    pub async fn run_delete(
        &self,
        file_id: Uuid,
        family_id: &str,
        user_id: &str,
    ) -> GatewayResult<FileMetadata> {
        let existing = self
            .metadata_store
            .find_active(file_id, family_id)
            .await?
            .ok_or(GatewayError::NotFound {
                file_id: file_id.to_string(),
            })?;

        // Family members are not permitted to delete other members' files
        // (spec §4.7).
        if existing.owner_id != user_id {
            return Err(GatewayError::PermissionDenied {
                reason: "only the owner may delete this file".to_string(),
            });
        }

        self.storage.delete(family_id, file_id).await?;

        let delta = StatisticsEngine::on_file_deleted(&existing);
        self.metadata_store
            .soft_delete_with_stats(file_id, family_id, chrono::Utc::now(), delta)
            .await?;

        self.cache.evict_family(Some(file_id), family_id);
        Ok(existing)
    }

    /// DOWNLOAD: Validation → Metadata.findActive (with permission check) →
    /// Storage.download → async Metadata.incrementAccessCount.
    pub async fn run_download(
        &self,
        file_id: Uuid,
        family_id: &str,
        requester_id: &str,
    ) -> GatewayResult<(Vec<u8>, FileMetadata)> {
        // Scoped lookup first; falls back to an unscoped lookup only to
        // permit the one cross-family case the spec carves out — a PUBLIC
        // file found under a different familyId (spec §3 "visibility=PUBLIC
        // is the only value that permits cross-family reads"). Any other
        // visibility found this way is treated the same as not found, so a
        // requester cannot use a wrong familyId to learn a file exists.
        let metadata = match self.metadata_store.find_active(file_id, family_id).await? {
            Some(m) => m,
            None => {
                let candidate = self.metadata_store.find_by_id(file_id).await?;
                match candidate {
                    Some(m) if !m.deleted && m.visibility == crate::model::Visibility::Public => m,
                    _ => {
                        return Err(GatewayError::NotFound {
                            file_id: file_id.to_string(),
                        })
                    }
                }
            }
        };

        authorize_read(&metadata, requester_id)?;

        let bytes = self.storage.download(&metadata.family_id, file_id).await?;

        let store = Arc::clone(&self.metadata_store);
        let id = file_id;
        tokio::spawn(async move {
            let _ = store.increment_access_count(id, chrono::Utc::now()).await;
        });

        Ok((bytes, metadata))
    }

    fn request_ctx_from_auth(&self, auth: &AuthContext) -> RequestContext {
        RequestContext::new(auth.authenticated_user_id.clone())
    }
}

/// `requester is member of familyId AND (visibility=PUBLIC OR ownerId=requester
/// OR visibility=FAMILY)` (spec §4.7).
pub fn authorize_read(metadata: &FileMetadata, requester_id: &str) -> GatewayResult<()> {
    use crate::model::Visibility;
    let allowed = match metadata.visibility {
        Visibility::Public => true,
        Visibility::Family => true,
        Visibility::Private => metadata.owner_id == requester_id,
    };
    if allowed {
        Ok(())
    } else {
        Err(GatewayError::PermissionDenied {
            reason: "visibility does not permit this requester".to_string(),
        })
    }
}
