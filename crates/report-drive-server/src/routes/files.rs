use axum::{Json, extract::State, http::HeaderMap};
use report_drive::GraphClient;
use report_drive::files::recent_files;
use serde_json::{Value, json};
use tracing::info;

use super::session_token;
use crate::error::ApiError;
use crate::state::AppState;

/// `GET /api/files`: newest items of the signed-in user's drive.
pub async fn list_files(
    State(state): State<AppState>,
    headers: HeaderMap,
) -> Result<Json<Value>, ApiError> {
    let token = session_token(&state, &headers)
        .await
        .ok_or(ApiError::Unauthorized("Unauthorized"))?;
    let worker = state.clone();
    let files = tokio::task::spawn_blocking(move || {
        let client = GraphClient::new(worker.transport.as_ref(), &token, &worker.config.drive);
        recent_files(&client)
    })
    .await?;
    info!(count = files.len(), "files retrieved");
    Ok(Json(json!({
        "message": "Files retrieved successfully",
        "files": files,
    })))
}
