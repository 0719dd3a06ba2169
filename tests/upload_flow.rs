//! End-to-end coverage of the upload/download/delete/list/search/stats
//! scenarios, wired against the real `LocalFsAdapter` and an in-memory
//! metadata double (there is no live Postgres to round-trip against here).

mod support;

use std::sync::Arc;

use family_storage_gateway::cache::MetadataCache;
use family_storage_gateway::config::LocalStorageConfig;
use family_storage_gateway::error::GatewayError;
use family_storage_gateway::interceptor::InterceptorChain;
use family_storage_gateway::model::{FileUploadRequest, Visibility};
use family_storage_gateway::service::FileStorageService;
use family_storage_gateway::storage::local_fs::LocalFsAdapter;
use family_storage_gateway::storage::StorageAdapter;
use family_storage_gateway::validator::{AuthContext, FileValidator, ValidatorConfig};

use support::InMemoryMetadataStore;

fn upload_request(family: &str, user: &str, name: &str, payload: &[u8], visibility: Visibility) -> FileUploadRequest {
    FileUploadRequest {
        family_id: family.to_string(),
        uploader_user_id: user.to_string(),
        original_file_name: name.to_string(),
        folder_path: None,
        visibility: Some(visibility),
        content_type_hint: None,
        payload: payload.to_vec(),
        overwrite_file_id: None,
    }
}

fn build_service(base_path: &std::path::Path) -> FileStorageService {
    let storage: Arc<dyn StorageAdapter> = Arc::new(LocalFsAdapter::new(LocalStorageConfig {
        base_path: base_path.to_path_buf(),
        auto_create: true,
    }));
    let metadata_store = Arc::new(InMemoryMetadataStore::new());
    let cache = Arc::new(MetadataCache::new(
        std::time::Duration::from_secs(60),
        std::time::Duration::from_secs(60),
        std::time::Duration::from_secs(60),
    ));
    let validator = Arc::new(FileValidator::new(ValidatorConfig::default()));

    let chain = InterceptorChain::new(
        Arc::clone(&validator),
        Arc::clone(&storage),
        Arc::clone(&metadata_store) as Arc<dyn family_storage_gateway::metadata::postgres_store::MetadataStoreExt>,
        Arc::clone(&cache),
    );
    FileStorageService::new(
        chain,
        Arc::clone(&metadata_store) as Arc<dyn family_storage_gateway::metadata::postgres_store::MetadataStoreExt>,
        storage,
        cache,
    )
}

#[tokio::test]
async fn upload_then_download_round_trips_the_bytes() {
    let dir = tempfile::tempdir().unwrap();
    let service = build_service(dir.path());
    let auth = AuthContext {
        authenticated_user_id: Some("alice".to_string()),
    };

    let req = upload_request("fam-1", "alice", "notes.txt", b"hello family", Visibility::Private);
    let uploaded = service.upload(req, &auth).await.unwrap();

    let downloaded = service
        .download(uploaded.file_id, "fam-1", "alice")
        .await
        .unwrap();
    assert_eq!(downloaded.bytes, b"hello family");
    assert_eq!(downloaded.original_name, "notes.txt");
}

#[tokio::test]
async fn private_file_is_not_found_for_a_different_family() {
    let dir = tempfile::tempdir().unwrap();
    let service = build_service(dir.path());
    let auth = AuthContext {
        authenticated_user_id: Some("alice".to_string()),
    };

    let req = upload_request("fam-1", "alice", "secret.txt", b"shh", Visibility::Private);
    let uploaded = service.upload(req, &auth).await.unwrap();

    let result = service.download(uploaded.file_id, "fam-2", "mallory").await;
    assert!(matches!(result, Err(GatewayError::NotFound { .. })));
}

#[tokio::test]
async fn family_visibility_is_readable_by_any_family_member_but_only_owner_may_delete() {
    let dir = tempfile::tempdir().unwrap();
    let service = build_service(dir.path());
    let auth = AuthContext {
        authenticated_user_id: Some("alice".to_string()),
    };

    let req = upload_request("fam-1", "alice", "photo.jpg", b"binary-ish", Visibility::Family);
    let uploaded = service.upload(req, &auth).await.unwrap();

    let downloaded = service.download(uploaded.file_id, "fam-1", "bob").await.unwrap();
    assert_eq!(downloaded.bytes, b"binary-ish");

    let delete_result = service.delete(uploaded.file_id, "fam-1", "bob").await;
    assert!(matches!(delete_result, Err(GatewayError::PermissionDenied { .. })));

    let delete_ok = service.delete(uploaded.file_id, "fam-1", "alice").await;
    assert!(delete_ok.is_ok());

    let after_delete = service.download(uploaded.file_id, "fam-1", "alice").await;
    assert!(matches!(after_delete, Err(GatewayError::NotFound { .. })));
}

#[tokio::test]
async fn file_type_falls_back_to_extension_derived_mime_without_a_content_type_hint() {
    let dir = tempfile::tempdir().unwrap();
    let service = build_service(dir.path());
    let auth = AuthContext {
        authenticated_user_id: Some("alice".to_string()),
    };

    let req = upload_request("fam-001", "alice", "photo.jpg", b"\xff\xd8\xff", Visibility::Family);
    let uploaded = service.upload(req, &auth).await.unwrap();
    assert_eq!(uploaded.file_type, "image/jpeg");
}

#[tokio::test]
async fn list_and_search_reflect_uploaded_files_and_stats_aggregate_sizes() {
    let dir = tempfile::tempdir().unwrap();
    let service = build_service(dir.path());
    let auth = AuthContext {
        authenticated_user_id: Some("alice".to_string()),
    };

    service
        .upload(
            upload_request("fam-1", "alice", "budget.pdf", b"1234567890", Visibility::Private),
            &auth,
        )
        .await
        .unwrap();
    service
        .upload(
            upload_request("fam-1", "alice", "vacation.jpg", b"12345", Visibility::Family),
            &auth,
        )
        .await
        .unwrap();

    let listing = service.list("fam-1", "/").await.unwrap();
    assert_eq!(listing.total_files, 2);
    assert_eq!(listing.total_size, 15);

    let matches = service.search("fam-1", "vacation").await.unwrap();
    assert_eq!(matches.len(), 1);
    assert_eq!(matches[0].original_name, "vacation.jpg");

    let stats = service.stats("fam-1").await.unwrap();
    assert_eq!(stats.total_files, 2);
    assert_eq!(stats.total_size, 15);
    assert_eq!(stats.storage_healthy, Some(true));
}

#[tokio::test]
async fn modify_overwrites_the_same_file_id_and_updates_size() {
    let dir = tempfile::tempdir().unwrap();
    let service = build_service(dir.path());
    let auth = AuthContext {
        authenticated_user_id: Some("alice".to_string()),
    };

    let uploaded = service
        .upload(
            upload_request("fam-1", "alice", "draft.txt", b"v1", Visibility::Private),
            &auth,
        )
        .await
        .unwrap();

    let modify_req = FileUploadRequest {
        overwrite_file_id: Some(uploaded.file_id),
        ..upload_request("fam-1", "alice", "draft.txt", b"v2-longer-body", Visibility::Private)
    };
    let modified = service.upload(modify_req, &auth).await.unwrap();
    assert_eq!(modified.file_id, uploaded.file_id);

    let downloaded = service.download(uploaded.file_id, "fam-1", "alice").await.unwrap();
    assert_eq!(downloaded.bytes, b"v2-longer-body");
}
