//! HTTP handlers implementing spec §6's representative endpoints.

use axum::body::Bytes;
use axum::extract::{Multipart, Path, Query, State};
use axum::http::{HeaderMap, HeaderValue, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::Json;
use uuid::Uuid;

use crate::error::GatewayError;
use crate::http::dto::*;
use crate::http::AppState;
use crate::model::{FileUploadRequest, Visibility};
use crate::trace::TraceId;
use crate::validator::AuthContext;

const TRACE_HEADER: &str = "x-trace-id";

fn auth_from_headers(headers: &HeaderMap) -> AuthContext {
    AuthContext {
        authenticated_user_id: headers
            .get("x-user-id")
            .and_then(|v| v.to_str().ok())
            .map(|s| s.to_string()),
    }
}

fn trace_from_headers(headers: &HeaderMap) -> TraceId {
    headers
        .get(TRACE_HEADER)
        .and_then(|v| v.to_str().ok())
        .and_then(TraceId::from_header)
        .unwrap_or_default()
}

fn with_trace_header(trace_id: &TraceId, mut response: Response) -> Response {
    if let Ok(value) = HeaderValue::from_str(trace_id.as_str()) {
        response.headers_mut().insert(TRACE_HEADER, value);
    }
    response
}

pub async fn upload(
    State(state): State<AppState>,
    headers: HeaderMap,
    mut multipart: Multipart,
) -> Response {
    let trace_id = trace_from_headers(&headers);
    let auth = auth_from_headers(&headers);

    let mut family_id = None;
    let mut folder_path = None;
    let mut visibility = None;
    let mut file_name = None;
    let mut content_type = None;
    let mut payload: Option<Bytes> = None;
    let mut overwrite_file_id: Option<Uuid> = None;

    loop {
        let field = match multipart.next_field().await {
            Ok(Some(field)) => field,
            Ok(None) => break,
            Err(e) => {
                return with_trace_header(
                    &trace_id,
                    GatewayError::Validation {
                        rule: "MALFORMED_MULTIPART",
                        message: e.to_string(),
                    }
                    .with_trace(trace_id.clone())
                    .into_response(),
                )
            }
        };
        match field.name().unwrap_or("") {
            "familyId" => family_id = field.text().await.ok(),
            "folderPath" => folder_path = field.text().await.ok(),
            "visibility" => visibility = field.text().await.ok(),
            "fileId" => {
                overwrite_file_id = field.text().await.ok().and_then(|s| Uuid::parse_str(&s).ok())
            }
            "file" => {
                file_name = field.file_name().map(|s| s.to_string());
                content_type = field.content_type().map(|s| s.to_string());
                payload = field.bytes().await.ok();
            }
            _ => {}
        }
    }

    let uploader_user_id = match &auth.authenticated_user_id {
        Some(id) => id.clone(),
        None => {
            return with_trace_header(
                &trace_id,
                GatewayError::AuthRequired.with_trace(trace_id.clone()).into_response(),
            )
        }
    };

    let req = FileUploadRequest {
        family_id: family_id.unwrap_or_default(),
        uploader_user_id,
        original_file_name: file_name.unwrap_or_default(),
        folder_path,
        visibility: visibility.and_then(|v| Visibility::parse(&v)),
        content_type_hint: content_type,
        payload: payload.map(|b| b.to_vec()).unwrap_or_default(),
        overwrite_file_id,
    };

    match state.service.upload(req, &auth).await {
        Ok(metadata) => with_trace_header(
            &trace_id,
            (StatusCode::CREATED, Json(UploadResponse::from_metadata(&metadata, &trace_id)))
                .into_response(),
        ),
        Err(e) => with_trace_header(&trace_id, e.with_trace(trace_id.clone()).into_response()),
    }
}

pub async fn download(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(file_id): Path<Uuid>,
    Query(query): Query<DownloadQuery>,
) -> Response {
    let trace_id = trace_from_headers(&headers);
    let auth = auth_from_headers(&headers);
    let requester = auth.authenticated_user_id.unwrap_or_default();

    match state.service.download(file_id, &query.family_id, &requester).await {
        Ok(result) => {
            let mut response = (
                StatusCode::OK,
                [
                    ("content-type", result.content_type),
                    (
                        "content-disposition",
                        format!("attachment; filename=\"{}\"", result.original_name),
                    ),
                ],
                result.bytes,
            )
                .into_response();
            response = with_trace_header(&trace_id, response);
            response
        }
        Err(e) => with_trace_header(&trace_id, e.with_trace(trace_id.clone()).into_response()),
    }
}

pub async fn delete(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(file_id): Path<Uuid>,
    Query(query): Query<DeleteQuery>,
) -> Response {
    let trace_id = trace_from_headers(&headers);
    match state.service.delete(file_id, &query.family_id, &query.user_id).await {
        Ok(metadata) => with_trace_header(
            &trace_id,
            Json(DeleteResponse {
                ok: true,
                deleted_name: metadata.original_name,
            })
            .into_response(),
        ),
        Err(e) => with_trace_header(&trace_id, e.with_trace(trace_id.clone()).into_response()),
    }
}

pub async fn list(
    State(state): State<AppState>,
    headers: HeaderMap,
    Query(query): Query<ListQuery>,
) -> Response {
    let trace_id = trace_from_headers(&headers);
    match state.service.list(&query.family_id, &query.folder_path).await {
        Ok(listing) => with_trace_header(
            &trace_id,
            Json(ListResponse {
                current_path: query.folder_path,
                files: listing.files.iter().map(FileSummary::from).collect(),
                sub_folders: listing.sub_folders,
                total_files: listing.total_files,
                total_size: listing.total_size,
            })
            .into_response(),
        ),
        Err(e) => with_trace_header(&trace_id, e.with_trace(trace_id.clone()).into_response()),
    }
}

pub async fn search(
    State(state): State<AppState>,
    headers: HeaderMap,
    Query(query): Query<SearchQuery>,
) -> Response {
    let trace_id = trace_from_headers(&headers);
    match state.service.search(&query.family_id, &query.keyword).await {
        Ok(matches) => with_trace_header(
            &trace_id,
            Json(SearchResponse {
                total_matches: matches.len(),
                matched_files: matches.iter().map(FileSummary::from).collect(),
                keyword: query.keyword,
            })
            .into_response(),
        ),
        Err(e) => with_trace_header(&trace_id, e.with_trace(trace_id.clone()).into_response()),
    }
}

pub async fn stats(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(family_id): Path<String>,
) -> Response {
    let trace_id = trace_from_headers(&headers);
    match state.service.stats(&family_id).await {
        Ok(stats) => with_trace_header(&trace_id, Json(StatsResponse { stats }).into_response()),
        Err(e) => with_trace_header(&trace_id, e.with_trace(trace_id.clone()).into_response()),
    }
}
