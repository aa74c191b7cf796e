use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::{Extension, Json};
use edif_core::content::ActivityItem;
use edif_core::{Collection, Fields, Record, UserRole};
use serde::Deserialize;
use serde_json::{Value, json};
use tracing::instrument;

use super::Envelope;
use crate::api::middleware::CurrentUser;
use crate::api::{ApiError, AppState};
use crate::content::{DashboardMetrics, ListParams, Page};
use crate::error::AppError;

#[derive(Debug, Deserialize)]
pub struct RoleRequest {
    pub role: String,
}

#[derive(Debug, Deserialize)]
pub struct ActivityParams {
    #[serde(default = "default_activity_limit")]
    pub limit: usize,
}

fn default_activity_limit() -> usize {
    10
}

fn object_body(body: Value) -> Result<Fields, ApiError> {
    match body {
        Value::Object(fields) => Ok(fields),
        _ => Err(ApiError(AppError::BadRequest(
            "Request body must be a JSON object".to_string(),
        ))),
    }
}

#[instrument(skip(state, user))]
pub async fn list_documents(
    State(state): State<AppState>,
    Extension(user): Extension<CurrentUser>,
    Path(collection): Path<String>,
    Query(params): Query<ListParams>,
) -> Result<Json<Page>, ApiError> {
    user.require(UserRole::Viewer)?;
    let collection: Collection = collection.parse()?;
    Ok(Json(state.content.list_page(collection, &params)?))
}

#[instrument(skip(state, user, body))]
pub async fn create_document(
    State(state): State<AppState>,
    Extension(user): Extension<CurrentUser>,
    Path(collection): Path<String>,
    Json(body): Json<Value>,
) -> Result<(StatusCode, Json<Envelope<Value>>), ApiError> {
    user.require(UserRole::Editor)?;
    let collection: Collection = collection.parse()?;
    let doc = state
        .content
        .create(collection, object_body(body)?, &user.profile)?;
    Ok((
        StatusCode::CREATED,
        Json(Envelope::ok(
            doc.to_json(),
            format!("{} created successfully", collection.entity_label()),
        )),
    ))
}

#[instrument(skip(state, user))]
pub async fn get_document(
    State(state): State<AppState>,
    Extension(user): Extension<CurrentUser>,
    Path((collection, id)): Path<(String, String)>,
) -> Result<Json<Value>, ApiError> {
    user.require(UserRole::Viewer)?;
    let collection: Collection = collection.parse()?;
    let doc = state.content.get(collection, &id)?;
    Ok(Json(doc.to_json()))
}

#[instrument(skip(state, user, body))]
pub async fn update_document(
    State(state): State<AppState>,
    Extension(user): Extension<CurrentUser>,
    Path((collection, id)): Path<(String, String)>,
    Json(body): Json<Value>,
) -> Result<Json<Envelope<Value>>, ApiError> {
    user.require(UserRole::Editor)?;
    let collection: Collection = collection.parse()?;
    let doc = state
        .content
        .update(collection, &id, object_body(body)?, &user.profile)?;
    Ok(Json(Envelope::ok(
        doc.to_json(),
        format!("{} updated successfully", collection.entity_label()),
    )))
}

#[instrument(skip(state, user))]
pub async fn delete_document(
    State(state): State<AppState>,
    Extension(user): Extension<CurrentUser>,
    Path((collection, id)): Path<(String, String)>,
) -> Result<Json<Value>, ApiError> {
    user.require(UserRole::Admin)?;
    let collection: Collection = collection.parse()?;
    state.content.delete(collection, &id, &user.profile)?;
    Ok(Json(json!({
        "success": true,
        "message": format!("{} deleted successfully", collection.entity_label()),
    })))
}

#[instrument(skip(state, user, body))]
pub async fn set_role(
    State(state): State<AppState>,
    Extension(user): Extension<CurrentUser>,
    Path(id): Path<String>,
    Json(body): Json<RoleRequest>,
) -> Result<Json<Envelope<Value>>, ApiError> {
    user.require(UserRole::Admin)?;
    let role: UserRole = body.role.parse()?;
    let doc = state.content.set_role(&id, role, &user.profile)?;
    Ok(Json(Envelope::ok(doc.to_json(), "Role updated successfully")))
}

pub async fn dashboard_metrics(
    State(state): State<AppState>,
    Extension(user): Extension<CurrentUser>,
) -> Result<Json<DashboardMetrics>, ApiError> {
    user.require(UserRole::Viewer)?;
    Ok(Json(state.content.dashboard_metrics()?))
}

pub async fn recent_activity(
    State(state): State<AppState>,
    Extension(user): Extension<CurrentUser>,
    Query(params): Query<ActivityParams>,
) -> Result<Json<Vec<Record<ActivityItem>>>, ApiError> {
    user.require(UserRole::Viewer)?;
    Ok(Json(state.content.recent_activity(params.limit)?))
}
