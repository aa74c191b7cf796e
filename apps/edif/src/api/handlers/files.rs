use axum::extract::{Path, State};
use axum::http::header::CONTENT_TYPE;
use axum::response::IntoResponse;
use edif_core::files::content_type_for;

use crate::api::{ApiError, AppState};

/// Serve an uploaded object with a content type guessed from its name.
pub async fn serve_file(
    State(state): State<AppState>,
    Path(path): Path<String>,
) -> Result<impl IntoResponse, ApiError> {
    let bytes = state.objects.read(&path).await?;
    Ok(([(CONTENT_TYPE, content_type_for(&path))], bytes))
}
