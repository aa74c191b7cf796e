use axum::extract::State;
use axum::http::StatusCode;
use axum::{Extension, Json};
use edif_core::{UserProfile, UserRole};
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};
use tracing::{debug, info, instrument};

use crate::api::middleware::CurrentUser;
use crate::api::{ApiError, AppState};
use crate::auth::{AuthSession, AuthState};
use crate::error::AppError;

#[derive(Debug, Deserialize)]
pub struct LoginRequest {
    #[serde(default)]
    pub email: String,
    #[serde(default)]
    pub password: String,
}

#[derive(Debug, Deserialize)]
pub struct RegisterRequest {
    pub email: String,
    pub password: String,
    pub name: String,
}

#[derive(Debug, Deserialize)]
pub struct ResetRequest {
    pub email: String,
}

#[derive(Debug, Deserialize)]
pub struct ConfirmResetRequest {
    pub token: String,
    pub password: String,
}

#[derive(Debug, Deserialize)]
pub struct ProfilePatch {
    pub name: Option<String>,
    pub avatar: Option<String>,
}

/// A new bearer session.
#[derive(Debug, Serialize)]
pub struct SessionResponse {
    pub success: bool,
    pub token: String,
    pub user: UserProfile,
}

/// Register a settled session, or drop it when it never signed in.
async fn issue(
    state: &AppState,
    session: std::sync::Arc<AuthSession>,
    auth: AuthState,
) -> Result<SessionResponse, ApiError> {
    match auth.user {
        Some(user) if auth.is_authenticated => {
            let token = state.sessions.insert(session).await;
            Ok(SessionResponse {
                success: true,
                token,
                user,
            })
        }
        _ => {
            session.logout();
            Err(ApiError(AppError::Unauthorized(
                "Sign-in did not complete".to_string(),
            )))
        }
    }
}

#[instrument(skip_all)]
pub async fn login(
    State(state): State<AppState>,
    Json(body): Json<LoginRequest>,
) -> Result<Json<SessionResponse>, ApiError> {
    let session = state.sessions.open();
    let auth = session.login(&body.email, &body.password).await?;
    let response = issue(&state, session, auth).await?;
    info!(uid = %response.user.id, "signed in");
    Ok(Json(response))
}

/// Self-service registration always creates viewers.
#[instrument(skip_all)]
pub async fn register(
    State(state): State<AppState>,
    Json(body): Json<RegisterRequest>,
) -> Result<(StatusCode, Json<SessionResponse>), ApiError> {
    if body.name.trim().is_empty() {
        return Err(ApiError(AppError::BadRequest("Name is required".to_string())));
    }
    let session = state.sessions.open();
    let auth = session
        .register(&body.email, &body.password, &body.name, UserRole::Viewer)
        .await?;
    let response = issue(&state, session, auth).await?;
    info!(uid = %response.user.id, "account registered");
    Ok((StatusCode::CREATED, Json(response)))
}

pub async fn logout(
    State(state): State<AppState>,
    Extension(user): Extension<CurrentUser>,
) -> Json<Value> {
    if let Some(session) = state.sessions.remove(&user.token).await {
        session.logout();
    }
    info!(uid = %user.profile.id, "signed out");
    Json(json!({ "success": true, "message": "Signed out" }))
}

/// Issue a reset token. Delivery is out of band; the token is only logged.
#[instrument(skip_all)]
pub async fn reset_password(
    State(state): State<AppState>,
    Json(body): Json<ResetRequest>,
) -> Result<Json<Value>, ApiError> {
    let token = state
        .sessions
        .provider()
        .send_password_reset(&body.email)
        .map_err(AppError::Auth)?;
    debug!(token = %token, "password reset issued");
    Ok(Json(json!({
        "success": true,
        "message": "Password reset instructions have been sent",
    })))
}

#[instrument(skip_all)]
pub async fn confirm_reset(
    State(state): State<AppState>,
    Json(body): Json<ConfirmResetRequest>,
) -> Result<Json<Value>, ApiError> {
    state
        .sessions
        .provider()
        .confirm_password_reset(&body.token, &body.password)
        .map_err(AppError::Auth)?;
    Ok(Json(json!({ "success": true, "message": "Password updated" })))
}

pub async fn me(Extension(user): Extension<CurrentUser>) -> Json<UserProfile> {
    Json(user.profile)
}

pub async fn update_me(
    Extension(user): Extension<CurrentUser>,
    Json(body): Json<ProfilePatch>,
) -> Result<Json<UserProfile>, ApiError> {
    if body.name.as_deref().is_some_and(|n| n.trim().is_empty()) {
        return Err(ApiError(AppError::BadRequest("Name is required".to_string())));
    }
    let profile = user
        .session
        .update_profile(body.name.as_deref(), body.avatar.as_deref())
        .await?;
    Ok(Json(profile))
}
