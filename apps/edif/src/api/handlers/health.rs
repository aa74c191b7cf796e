use axum::Json;
use serde_json::{Value, json};

/// Liveness check: returns 200 OK if the server process is running.
pub async fn health_check() -> Json<Value> {
    Json(json!({
        "status": "ok",
        "version": env!("CARGO_PKG_VERSION"),
    }))
}
