//! Boundary scenarios for the validator rule chain (spec §4.4, §8) beyond
//! what the unit tests alongside `FileValidator` already exercise: identity
//! mismatch and the size-limit edge expressed through realistic requests.

use family_storage_gateway::error::GatewayError;
use family_storage_gateway::model::{FileUploadRequest, Visibility};
use family_storage_gateway::validator::{AuthContext, FileValidator, ValidatorConfig};

fn request(payload_len: usize, name: &str) -> FileUploadRequest {
    FileUploadRequest {
        family_id: "fam-1".to_string(),
        uploader_user_id: "alice".to_string(),
        original_file_name: name.to_string(),
        folder_path: None,
        visibility: Some(Visibility::Private),
        content_type_hint: None,
        payload: vec![0u8; payload_len],
        overwrite_file_id: None,
    }
}

#[test]
fn uploader_claiming_someone_elses_identity_is_rejected() {
    let validator = FileValidator::new(ValidatorConfig::default());
    let auth = AuthContext {
        authenticated_user_id: Some("mallory".to_string()),
    };
    let req = request(10, "doc.pdf");

    let result = validator.check(&req, &auth);
    assert!(matches!(
        result,
        Err(GatewayError::Validation { rule: "IDENTITY_MISMATCH", .. })
    ));
}

#[test]
fn file_exactly_at_the_size_limit_is_accepted_one_byte_over_is_rejected() {
    let config = ValidatorConfig {
        max_file_size: 1024,
        ..ValidatorConfig::default()
    };
    let validator = FileValidator::new(config);
    let auth = AuthContext {
        authenticated_user_id: Some("alice".to_string()),
    };

    assert!(validator.check(&request(1024, "doc.pdf"), &auth).is_ok());
    let over_limit = validator.check(&request(1025, "doc.pdf"), &auth);
    assert!(matches!(over_limit, Err(GatewayError::Validation { rule: "FILE_TOO_LARGE", .. })));
}

#[test]
fn extension_outside_the_allow_list_is_rejected_regardless_of_case() {
    let validator = FileValidator::new(ValidatorConfig::default());
    let auth = AuthContext {
        authenticated_user_id: Some("alice".to_string()),
    };

    let result = validator.check(&request(10, "script.EXE"), &auth);
    assert!(matches!(result, Err(GatewayError::Validation { rule: "UNSUPPORTED_TYPE", .. })));
}
