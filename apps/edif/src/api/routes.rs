use axum::Router;
use axum::extract::DefaultBodyLimit;
use axum::http::HeaderValue;
use axum::routing::{delete, get, post, put};
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::{DefaultMakeSpan, DefaultOnResponse, TraceLayer};
use tracing::{Level, warn};

use super::AppState;
use super::handlers::{admin, auth, files, health, live, uploads};
use super::middleware;
use crate::site;

/// Builds the axum router with all routes, middleware, and shared state.
pub fn build_router(state: AppState) -> Router {
    let upload_limit = usize::try_from(state.config.max_upload_mb)
        .unwrap_or(usize::MAX / (1024 * 1024))
        .saturating_add(1)
        .saturating_mul(1024 * 1024);

    // Bearer-session routes; handlers check roles.
    let signed_in = Router::new()
        .route("/api/auth/logout", post(auth::logout))
        .route("/api/auth/me", get(auth::me).patch(auth::update_me))
        .route("/api/admin/dashboard/metrics", get(admin::dashboard_metrics))
        .route("/api/admin/dashboard/activity", get(admin::recent_activity))
        .route("/api/admin/users/{id}/role", put(admin::set_role))
        .route(
            "/api/admin/uploads",
            post(uploads::upload)
                .delete(uploads::delete_batch)
                .layer(DefaultBodyLimit::max(upload_limit)),
        )
        .route(
            "/api/admin/uploads/batch",
            post(uploads::upload_batch).layer(DefaultBodyLimit::max(upload_limit.saturating_mul(2))),
        )
        .route(
            "/api/admin/uploads/{*path}",
            get(uploads::download_url).delete(uploads::delete),
        )
        .route(
            "/api/admin/{collection}",
            get(admin::list_documents).post(admin::create_document),
        )
        .route(
            "/api/admin/{collection}/{id}",
            get(admin::get_document)
                .put(admin::update_document)
                .delete(admin::delete_document),
        )
        .layer(axum::middleware::from_fn_with_state(
            state.clone(),
            middleware::require_session,
        ));

    let public = Router::new()
        .route("/health", get(health::health_check))
        .route("/api/auth/login", post(auth::login))
        .route("/api/auth/register", post(auth::register))
        .route("/api/auth/reset-password", post(auth::reset_password))
        .route("/api/auth/confirm-reset", post(auth::confirm_reset))
        .route("/api/live/{preset}", get(live::poll))
        .route("/files/{*path}", get(files::serve_file))
        .route("/", get(site::home))
        .route(
            "/sample-request",
            get(site::forms::sample_request).post(site::forms::submit_sample_request),
        )
        .route(
            "/report-ae",
            get(site::forms::adverse_event).post(site::forms::submit_adverse_event),
        )
        .route("/{slug}", get(site::page));

    let mut router = public
        .merge(signed_in)
        .fallback(site::fallback)
        .layer(
            TraceLayer::new_for_http()
                .make_span_with(DefaultMakeSpan::new().level(Level::INFO))
                .on_response(DefaultOnResponse::new().level(Level::INFO)),
        )
        .layer(axum::middleware::from_fn(middleware::request_id));

    if let Some(origin) = state.config.cors_origin.as_deref() {
        match HeaderValue::from_str(origin) {
            Ok(origin) => {
                router = router.layer(
                    CorsLayer::new()
                        .allow_origin(origin)
                        .allow_methods(Any)
                        .allow_headers(Any),
                );
            }
            Err(e) => warn!(origin = %origin, error = %e, "ignoring invalid CORS origin"),
        }
    }

    router.with_state(state)
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use axum::body::Body;
    use axum::http::{Request, StatusCode, header};
    use edif_core::MemoryStore;
    use tower::ServiceExt;

    use super::*;
    use crate::config::{Backend, ServerConfig};

    fn app(cors_origin: Option<&str>) -> Router {
        let config = ServerConfig {
            backend: Backend::Memory,
            cors_origin: cors_origin.map(str::to_string),
            ..ServerConfig::default()
        };
        let store = Arc::new(MemoryStore::new());
        build_router(AppState::new(config, store.clone(), store))
    }

    #[tokio::test]
    async fn request_id_is_echoed() {
        let response = app(None)
            .oneshot(
                Request::get("/health")
                    .header("x-request-id", "req-42")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(response.headers()["x-request-id"], "req-42");
    }

    #[tokio::test]
    async fn cors_origin_is_applied() {
        let response = app(Some("https://admin.edif.example"))
            .oneshot(
                Request::get("/health")
                    .header(header::ORIGIN, "https://admin.edif.example")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(
            response.headers()[header::ACCESS_CONTROL_ALLOW_ORIGIN],
            "https://admin.edif.example"
        );
    }

    #[tokio::test]
    async fn admin_routes_need_a_bearer_token() {
        let response = app(None)
            .oneshot(Request::get("/api/admin/products").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    }
}
