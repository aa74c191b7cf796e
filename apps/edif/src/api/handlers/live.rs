use axum::Json;
use axum::extract::{Path, Query, State};
use edif_core::{EdifError, Preset};
use serde::Deserialize;
use serde_json::Value;

use crate::api::{ApiError, AppState};

#[derive(Debug, Deserialize)]
pub struct PollParams {
    /// Last version the client has seen; 0 returns the first settled state.
    #[serde(default)]
    pub after: u64,
}

/// Long-poll a preset subscription.
///
/// Returns `{ data, loading, error, version }` as soon as the version moves
/// past `after`, or the current state when the poll window closes.
pub async fn poll(
    State(state): State<AppState>,
    Path(preset): Path<String>,
    Query(params): Query<PollParams>,
) -> Result<Json<Value>, ApiError> {
    let preset: Preset = preset.parse()?;
    let body = state
        .views
        .poll_json(preset, params.after, state.config.long_poll)
        .await
        .map_err(EdifError::from)?;
    Ok(Json(body))
}
