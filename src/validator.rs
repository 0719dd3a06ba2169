//! File Validator — spec §4.4.
//!
//! A single, pure rule set invoked on every user-facing request, in a fixed
//! order, with two entry points that must never diverge: `check` (throwing,
//! for the orchestrator) and `check_result` (result-returning, for
//! adapter-level re-checks). Both call the same private rule chain.

use crate::error::{GatewayError, GatewayResult};
use crate::model::{FileUploadRequest, Visibility};

const FOLDER_PATH_FORBIDDEN: &[&str] = &["..", "\\", ":", "*", "?", "\"", "<", ">", "|"];

#[derive(Debug, Clone)]
pub struct ValidatorConfig {
    pub max_file_size: u64,
    pub allowed_extensions: Vec<String>,
    pub allowed_mime_types: Vec<String>,
}

impl Default for ValidatorConfig {
    fn default() -> Self {
        ValidatorConfig {
            max_file_size: 100 * 1024 * 1024,
            allowed_extensions: [
                "pdf", "doc", "docx", "txt", "jpg", "jpeg", "png", "gif", "mp4", "avi", "mp3",
                "wav", "zip", "rar",
            ]
            .iter()
            .map(|s| s.to_string())
            .collect(),
            allowed_mime_types: Vec::new(),
        }
    }
}

/// Everything rule 1-2 needs about who is making the request.
#[derive(Debug, Clone)]
pub struct AuthContext {
    pub authenticated_user_id: Option<String>,
}

pub struct FileValidator {
    config: ValidatorConfig,
}

impl FileValidator {
    pub fn new(config: ValidatorConfig) -> Self {
        FileValidator { config }
    }

    /// Throwing entry point for the orchestrator.
    pub fn check(&self, req: &FileUploadRequest, auth: &AuthContext) -> GatewayResult<()> {
        self.run(req, auth).map_err(|(rule, message)| GatewayError::Validation { rule, message })
    }

    /// Result-returning entry point for adapter-level re-checks.
    pub fn check_result(&self, req: &FileUploadRequest, auth: &AuthContext) -> (bool, Option<String>) {
        match self.run(req, auth) {
            Ok(()) => (true, None),
            Err((rule, message)) => (false, Some(format!("[{rule}] {message}"))),
        }
    }

    /// Lighter check used for DOWNLOAD/VIEW/SHARE (spec §4.4 "Download
    /// permission check").
    pub fn check_read(
        &self,
        auth: &AuthContext,
        family_id: Option<&str>,
        file_id: &str,
    ) -> GatewayResult<()> {
        let authenticated = auth
            .authenticated_user_id
            .as_deref()
            .ok_or(GatewayError::AuthRequired)?;
        let _ = authenticated;
        if let Some(fam) = family_id {
            rule_family_format(fam)
                .map_err(|(rule, message)| GatewayError::Validation { rule, message })?;
        }
        if file_id.is_empty() {
            return Err(GatewayError::Validation {
                rule: "EMPTY_FILE_ID",
                message: "fileId must not be empty".into(),
            });
        }
        Ok(())
    }

    fn run(&self, req: &FileUploadRequest, auth: &AuthContext) -> Result<(), (&'static str, String)> {
        // 1. Authentication present.
        let authenticated = auth
            .authenticated_user_id
            .as_deref()
            .ok_or(("AUTH_REQUIRED", "no authenticated user identity".to_string()))?;

        // 2. Identity consistency.
        if req.uploader_user_id != authenticated {
            return Err((
                "IDENTITY_MISMATCH",
                format!(
                    "request claims uploaderUserId={} but authenticated as {}",
                    req.uploader_user_id, authenticated
                ),
            ));
        }

        // 3. Family id format.
        rule_family_format(&req.family_id)?;

        // 4. File present and non-empty.
        if req.payload.is_empty() {
            return Err(("EMPTY_FILE", "payload must not be empty".to_string()));
        }

        // 5. Size.
        if req.payload.len() as u64 > self.config.max_file_size {
            return Err((
                "FILE_TOO_LARGE",
                format!(
                    "file size {} exceeds maximum of {} bytes",
                    req.payload.len(),
                    self.config.max_file_size
                ),
            ));
        }

        // 6. Name present.
        if req.original_file_name.trim().is_empty() {
            return Err(("EMPTY_NAME", "originalFileName must not be empty".to_string()));
        }

        // 7. Extension in allow-list.
        let extension = std::path::Path::new(&req.original_file_name)
            .extension()
            .and_then(|e| e.to_str())
            .map(|e| e.to_ascii_lowercase());
        match extension {
            Some(ext) if self.config.allowed_extensions.iter().any(|a| a == &ext) => {}
            _ => {
                return Err((
                    "UNSUPPORTED_TYPE",
                    format!("extension not in allow-list: {}", req.original_file_name),
                ))
            }
        }

        // 8. Declared content-type (if any) in allow-list.
        if !self.config.allowed_mime_types.is_empty() {
            if let Some(ct) = &req.content_type_hint {
                if !self.config.allowed_mime_types.iter().any(|m| m == ct) {
                    return Err(("UNSUPPORTED_MIME", format!("unsupported content type: {ct}")));
                }
            }
        }

        // 9. Visibility.
        if let Some(v) = &req.visibility {
            let _: Visibility = *v;
        }

        // 10. folderPath.
        if let Some(folder) = &req.folder_path {
            rule_folder_path(folder)?;
        }

        Ok(())
    }
}

fn rule_family_format(family_id: &str) -> Result<(), (&'static str, String)> {
    if !family_id.is_empty() && !(3..=50).contains(&family_id.len()) {
        return Err((
            "INVALID_FAMILY",
            format!("familyId length {} not in [3, 50]", family_id.len()),
        ));
    }
    Ok(())
}

fn rule_folder_path(folder: &str) -> Result<(), (&'static str, String)> {
    if !folder.starts_with('/') {
        return Err(("INVALID_PATH", "folderPath must begin with '/'".to_string()));
    }
    if folder.len() > 255 {
        return Err(("INVALID_PATH", "folderPath exceeds 255 characters".to_string()));
    }
    if FOLDER_PATH_FORBIDDEN.iter().any(|bad| folder.contains(bad)) {
        return Err(("INVALID_PATH", format!("folderPath contains a forbidden sequence: {folder}")));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn base_request() -> FileUploadRequest {
        FileUploadRequest {
            family_id: "fam-001".into(),
            uploader_user_id: "user-1".into(),
            original_file_name: "photo.jpg".into(),
            folder_path: Some("/pics".into()),
            visibility: Some(Visibility::Family),
            content_type_hint: None,
            payload: vec![0u8; 1024],
            overwrite_file_id: None,
        }
    }

    fn auth(user: &str) -> AuthContext {
        AuthContext {
            authenticated_user_id: Some(user.to_string()),
        }
    }

    #[test]
    fn accepts_a_well_formed_upload() {
        let v = FileValidator::new(ValidatorConfig::default());
        let req = base_request();
        assert!(v.check(&req, &auth("user-1")).is_ok());
    }

    #[test]
    fn rejects_unauthenticated_requests() {
        let v = FileValidator::new(ValidatorConfig::default());
        let req = base_request();
        let err = v
            .check(&req, &AuthContext { authenticated_user_id: None })
            .unwrap_err();
        assert!(matches!(err, GatewayError::AuthRequired));
    }

    #[test]
    fn rejects_identity_mismatch() {
        let v = FileValidator::new(ValidatorConfig::default());
        let req = base_request();
        let err = v.check(&req, &auth("someone-else")).unwrap_err();
        assert!(matches!(err, GatewayError::Validation { rule: "IDENTITY_MISMATCH", .. }));
    }

    #[test]
    fn rejects_empty_payload() {
        let v = FileValidator::new(ValidatorConfig::default());
        let mut req = base_request();
        req.payload = Vec::new();
        let err = v.check(&req, &auth("user-1")).unwrap_err();
        assert!(matches!(err, GatewayError::Validation { rule: "EMPTY_FILE", .. }));
    }

    #[test]
    fn rejects_oversized_payload() {
        let v = FileValidator::new(ValidatorConfig {
            max_file_size: 10,
            ..ValidatorConfig::default()
        });
        let req = base_request();
        let err = v.check(&req, &auth("user-1")).unwrap_err();
        assert!(matches!(err, GatewayError::Validation { rule: "FILE_TOO_LARGE", .. }));
    }

    #[test]
    fn rejects_disallowed_extension() {
        let v = FileValidator::new(ValidatorConfig::default());
        let mut req = base_request();
        req.original_file_name = "payload.exe".into();
        let err = v.check(&req, &auth("user-1")).unwrap_err();
        assert!(matches!(err, GatewayError::Validation { rule: "UNSUPPORTED_TYPE", .. }));
    }

    #[test]
    fn rejects_traversal_in_folder_path() {
        let v = FileValidator::new(ValidatorConfig::default());
        let mut req = base_request();
        req.folder_path = Some("/a/../../etc".into());
        let err = v.check(&req, &auth("user-1")).unwrap_err();
        assert!(matches!(err, GatewayError::Validation { rule: "INVALID_PATH", .. }));
    }

    #[test]
    fn accepts_root_folder_path() {
        let v = FileValidator::new(ValidatorConfig::default());
        let mut req = base_request();
        req.folder_path = Some("/".into());
        assert!(v.check(&req, &auth("user-1")).is_ok());
    }

    #[test]
    fn result_returning_entry_point_matches_throwing_one() {
        let v = FileValidator::new(ValidatorConfig::default());
        let mut req = base_request();
        req.original_file_name = "payload.exe".into();
        let (ok, message) = v.check_result(&req, &auth("user-1"));
        assert!(!ok);
        assert!(message.unwrap().contains("UNSUPPORTED_TYPE"));
    }
}
