use std::sync::Arc;

use axum::extract::State;
use axum::http::header::AUTHORIZATION;
use axum::http::{HeaderMap, HeaderValue, Request};
use axum::middleware::Next;
use axum::response::{IntoResponse, Response};
use chrono::Utc;
use edif_core::{ProviderUser, UserProfile, UserRole};
use tracing::{Instrument, debug};

use super::{ApiError, AppState};
use crate::auth::{AuthSession, load_profile};
use crate::error::AppError;

/// The signed-in caller of an admin request, inserted by [`require_session`].
#[derive(Clone)]
pub struct CurrentUser {
    pub token: String,
    pub session: Arc<AuthSession>,
    /// Profile as stored at the start of this request.
    pub profile: UserProfile,
}

impl CurrentUser {
    /// `Forbidden` unless the caller's role includes `required`.
    pub fn require(&self, required: UserRole) -> Result<(), ApiError> {
        if self.profile.has_permission(required) {
            Ok(())
        } else {
            Err(ApiError(AppError::Forbidden(format!(
                "{} role required",
                required
            ))))
        }
    }
}

/// `Authorization: Bearer <token>`.
pub fn bearer_token(headers: &HeaderMap) -> Option<&str> {
    headers
        .get(AUTHORIZATION)?
        .to_str()
        .ok()?
        .strip_prefix("Bearer ")
        .map(str::trim)
        .filter(|t| !t.is_empty())
}

/// Middleware that resolves the bearer token to a signed-in session.
///
/// - Missing, unknown or signed-out sessions get 401.
/// - The profile is re-read from `users/{uid}` so role changes apply on the
///   next request. If it is gone or unreadable the caller gets the fallback
///   viewer profile, never the role cached in the session.
pub async fn require_session(
    State(state): State<AppState>,
    mut request: Request<axum::body::Body>,
    next: Next,
) -> Response {
    let Some(token) = bearer_token(request.headers()).map(str::to_string) else {
        return ApiError(AppError::Unauthorized("Authentication required".to_string()))
            .into_response();
    };
    let Some(session) = state.sessions.get(&token).await else {
        return ApiError(AppError::Unauthorized("Session expired or invalid".to_string()))
            .into_response();
    };

    let auth = session.state();
    let user = match auth.user {
        Some(user) if auth.is_authenticated => user,
        _ => {
            return ApiError(AppError::Unauthorized("Not signed in".to_string())).into_response();
        }
    };
    let profile = match load_profile(state.content.store().as_ref(), &user.id) {
        Ok(profile) => profile,
        Err(e) => {
            debug!(uid = %user.id, error = %e, "profile unreadable, acting as viewer");
            let provider_user = session.client().current_user().unwrap_or(ProviderUser {
                uid: user.id,
                email: Some(user.email),
                display_name: Some(user.name),
                photo_url: user.avatar,
            });
            UserProfile::fallback(&provider_user, Utc::now())
        }
    };

    request.extensions_mut().insert(CurrentUser {
        token,
        session,
        profile,
    });
    next.run(request).await
}

/// Middleware that attaches a request ID to every request.
///
/// - Respects an incoming `x-request-id` header if present.
/// - Otherwise generates a UUID v4.
/// - Creates a tracing span so all downstream logs include the request ID.
/// - Returns the request ID in the response `x-request-id` header.
pub async fn request_id(request: Request<axum::body::Body>, next: Next) -> Response {
    let id = request
        .headers()
        .get("x-request-id")
        .and_then(|v| v.to_str().ok())
        .map(String::from)
        .unwrap_or_else(|| uuid::Uuid::new_v4().to_string());
    let header = HeaderValue::from_str(&id).ok();
    async move {
        let mut response = next.run(request).await;
        if let Some(header) = header {
            response.headers_mut().insert("x-request-id", header);
        }
        response
    }
    .instrument(tracing::info_span!("request", request_id = %id))
    .await
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bearer_token_parsing() {
        let mut headers = HeaderMap::new();
        assert_eq!(bearer_token(&headers), None);

        headers.insert(AUTHORIZATION, HeaderValue::from_static("Bearer abc123"));
        assert_eq!(bearer_token(&headers), Some("abc123"));

        headers.insert(AUTHORIZATION, HeaderValue::from_static("Basic abc123"));
        assert_eq!(bearer_token(&headers), None);

        headers.insert(AUTHORIZATION, HeaderValue::from_static("Bearer "));
        assert_eq!(bearer_token(&headers), None);
    }
}
