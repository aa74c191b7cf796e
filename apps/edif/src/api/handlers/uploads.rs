use axum::body::Bytes;
use axum::extract::{Path, Query, State};
use axum::http::header::CONTENT_TYPE;
use axum::http::{HeaderMap, StatusCode};
use axum::{Extension, Json};
use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use edif_core::UserRole;
use edif_core::files::{file_types, validate_upload};
use serde::Deserialize;
use serde_json::{Value, json};
use tracing::{debug, instrument};

use super::Envelope;
use crate::api::middleware::CurrentUser;
use crate::api::{ApiError, AppState};
use crate::error::AppError;
use crate::objects::{UploadFile, UploadResult};

#[derive(Debug, Deserialize)]
pub struct UploadParams {
    /// Folder prefix, empty or ending in `/`.
    #[serde(default)]
    pub path: String,
    pub name: String,
    /// Allowed type group: `images`, `documents`, `spreadsheets` or `all`.
    #[serde(default = "default_kind")]
    pub kind: String,
    /// Add a random segment to the stored name.
    #[serde(default)]
    pub unique: bool,
}

#[derive(Debug, Deserialize)]
pub struct BatchParams {
    #[serde(default)]
    pub path: String,
    #[serde(default = "default_kind")]
    pub kind: String,
}

/// One file of `POST /api/admin/uploads/batch`, body base64-encoded.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BatchFile {
    pub name: String,
    pub content_type: String,
    pub data: String,
}

#[derive(Debug, Deserialize)]
pub struct BatchUpload {
    pub files: Vec<BatchFile>,
}

#[derive(Debug, Deserialize)]
pub struct DeletePaths {
    pub paths: Vec<String>,
}

fn default_kind() -> String {
    "all".to_string()
}

/// Store the raw request body as one object.
#[instrument(skip(state, user, headers, body), fields(size = body.len()))]
pub async fn upload(
    State(state): State<AppState>,
    Extension(user): Extension<CurrentUser>,
    Query(params): Query<UploadParams>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<(StatusCode, Json<Envelope<UploadResult>>), ApiError> {
    user.require(UserRole::Editor)?;
    let allowed = allowed_group(&params.kind)?;
    let content_type = headers
        .get(CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .map(|v| v.split(';').next().unwrap_or(v).trim().to_string())
        .unwrap_or_else(|| edif_core::files::content_type_for(&params.name).to_string());

    validate_upload(
        body.len() as u64,
        &content_type,
        &params.name,
        allowed,
        state.config.max_upload_mb,
    )?;
    let result = if params.unique {
        state
            .objects
            .upload_unique(&params.path, &params.name, &body, &content_type)
            .await?
    } else {
        state
            .objects
            .upload(&params.path, &params.name, &body, &content_type)
            .await?
    };
    Ok((
        StatusCode::CREATED,
        Json(Envelope::ok(result, "File uploaded successfully")),
    ))
}

/// Store several files in order. Every file is validated before any is
/// written.
#[instrument(skip(state, user, batch), fields(files = batch.files.len()))]
pub async fn upload_batch(
    State(state): State<AppState>,
    Extension(user): Extension<CurrentUser>,
    Query(params): Query<BatchParams>,
    Json(batch): Json<BatchUpload>,
) -> Result<(StatusCode, Json<Envelope<Vec<UploadResult>>>), ApiError> {
    user.require(UserRole::Editor)?;
    let allowed = allowed_group(&params.kind)?;
    if batch.files.is_empty() {
        return Err(ApiError(AppError::BadRequest("No files to upload".to_string())));
    }

    let mut files = Vec::with_capacity(batch.files.len());
    for file in batch.files {
        let bytes = STANDARD.decode(file.data.as_bytes()).map_err(|e| {
            ApiError(AppError::BadRequest(format!("{}: invalid base64: {e}", file.name)))
        })?;
        validate_upload(
            bytes.len() as u64,
            &file.content_type,
            &file.name,
            allowed,
            state.config.max_upload_mb,
        )?;
        files.push(UploadFile {
            name: file.name,
            bytes,
            content_type: file.content_type,
        });
    }

    let results = state
        .objects
        .upload_many(&params.path, &files, |done, total| {
            debug!(done, total, "batch upload progress");
        })
        .await?;
    let message = format!("{} files uploaded successfully", results.len());
    Ok((StatusCode::CREATED, Json(Envelope::ok(results, message))))
}

/// Public URL of an existing object.
#[instrument(skip(state, user))]
pub async fn download_url(
    State(state): State<AppState>,
    Extension(user): Extension<CurrentUser>,
    Path(path): Path<String>,
) -> Result<Json<Value>, ApiError> {
    user.require(UserRole::Viewer)?;
    let url = state.objects.download_url(&path).await?;
    Ok(Json(json!({ "success": true, "data": { "downloadURL": url } })))
}

/// Remove every listed object. All paths are attempted; the first failure
/// is reported.
#[instrument(skip(state, user, body), fields(paths = body.paths.len()))]
pub async fn delete_batch(
    State(state): State<AppState>,
    Extension(user): Extension<CurrentUser>,
    Json(body): Json<DeletePaths>,
) -> Result<Json<Value>, ApiError> {
    user.require(UserRole::Editor)?;
    if body.paths.is_empty() {
        return Err(ApiError(AppError::BadRequest("No files to delete".to_string())));
    }
    state.objects.delete_many(&body.paths).await?;
    Ok(Json(json!({ "success": true, "message": "Files deleted successfully" })))
}

fn allowed_group(kind: &str) -> Result<&'static [&'static str], ApiError> {
    file_types::group(kind)
        .ok_or_else(|| ApiError(AppError::BadRequest(format!("unknown file kind: {kind}"))))
}

#[instrument(skip(state, user))]
pub async fn delete(
    State(state): State<AppState>,
    Extension(user): Extension<CurrentUser>,
    Path(path): Path<String>,
) -> Result<Json<Value>, ApiError> {
    user.require(UserRole::Editor)?;
    state.objects.delete(&path).await?;
    Ok(Json(json!({ "success": true, "message": "File deleted successfully" })))
}
