//! # HTTP Server
//!
//! One axum router serves the public HTML site (`crate::site`), the admin
//! JSON API, live long-polls and uploaded files.

pub mod handlers;
pub mod middleware;
pub mod routes;

use std::sync::Arc;

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use edif_core::files::FileError;
use edif_core::validate::validation_errors;
use edif_core::{AccountStore, DocumentStore, EdifError};
use serde_json::json;

use crate::auth::{SWEEP_EVERY, SessionRegistry};
use crate::config::ServerConfig;
use crate::content::ContentService;
use crate::error::AppError;
use crate::identity::{IdentityProvider, LocalIdentity};
use crate::live::{ChangeBus, SiteViews};
use crate::objects::ObjectStorage;

pub use routes::build_router;

/// Shared application state injected into all handlers via axum's State extractor.
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<ServerConfig>,
    pub content: ContentService,
    pub sessions: Arc<SessionRegistry>,
    pub objects: Arc<ObjectStorage>,
    /// Standing subscriptions behind the public pages.
    pub views: Arc<SiteViews>,
}

impl AppState {
    /// Wire the services over the given stores. Spawns the site's live
    /// subscriptions and the session sweeper, so it must run inside a tokio
    /// runtime.
    pub fn new(
        config: ServerConfig,
        store: Arc<dyn DocumentStore>,
        accounts: Arc<dyn AccountStore>,
    ) -> Self {
        let bus = ChangeBus::default();
        let provider: Arc<dyn IdentityProvider> = Arc::new(LocalIdentity::new(
            accounts,
            config.login_attempts_per_minute,
        ));
        let sessions = Arc::new(
            SessionRegistry::new(provider, store.clone(), config.auth_timeout)
                .with_idle(config.session_idle),
        );
        SessionRegistry::spawn_sweeper(&sessions, SWEEP_EVERY);
        let objects = ObjectStorage::new(config.uploads.clone(), config.public_base_url());
        let views = SiteViews::spawn(store.clone(), &bus);

        Self {
            config: Arc::new(config),
            content: ContentService::new(store, bus),
            sessions,
            objects: Arc::new(objects),
            views: Arc::new(views),
        }
    }
}

/// Wrapper that converts `AppError` into an HTTP response.
pub struct ApiError(pub AppError);

impl From<AppError> for ApiError {
    fn from(e: AppError) -> Self {
        ApiError(e)
    }
}

impl From<EdifError> for ApiError {
    fn from(e: EdifError) -> Self {
        ApiError(AppError::Core(e))
    }
}

impl From<FileError> for ApiError {
    fn from(e: FileError) -> Self {
        ApiError(AppError::File(e))
    }
}

/// Maps `ApiError` to `{ error, status, success: false }` with the error's
/// status code. Validation failures also list the offending fields.
impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.0.status_code();
        let status_code = StatusCode::from_u16(status).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
        if status_code.is_server_error() {
            tracing::error!(error = %self.0, status, "server error");
        } else if status_code.is_client_error() {
            tracing::warn!(error = %self.0, status, "client error");
        }

        let mut body = json!({
            "error": self.0.to_string(),
            "status": status,
            "success": false,
        });
        if let AppError::Core(err) = &self.0
            && let Some(errors) = validation_errors(err)
        {
            body["errors"] = json!(errors.errors);
        }
        (status_code, axum::Json(body)).into_response()
    }
}
