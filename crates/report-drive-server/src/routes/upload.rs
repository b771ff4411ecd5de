use axum::{
    Json,
    extract::{Multipart, State},
    http::{HeaderMap, header::AUTHORIZATION},
};
use report_drive::destination::resolve_and_upload;
use report_drive::naming::today_folder;
use report_drive::upload::upload_to_personal_root;
use report_drive::{GraphClient, ReportMetadata, UploadRequest};
use serde_json::{Value, json};
use tracing::info;

use super::session_token;
use crate::error::ApiError;
use crate::multipart::{FilePart, read_form};
use crate::state::AppState;

const UPLOADED: &str = "File uploaded successfully";

fn bearer_token(headers: &HeaderMap) -> Option<String> {
    headers
        .get(AUTHORIZATION)
        .and_then(|value| value.to_str().ok())
        .and_then(|value| value.strip_prefix("Bearer "))
        .map(str::trim)
        .filter(|token| !token.is_empty())
        .map(str::to_string)
}

fn part_name(file: &FilePart) -> Option<&str> {
    file.file_name.as_deref()
}

/// `POST /api/upload`: session-authenticated upload to the personal drive root.
pub async fn session_upload(
    State(state): State<AppState>,
    headers: HeaderMap,
    multipart: Multipart,
) -> Result<Json<Value>, ApiError> {
    let mut form = read_form(multipart, state.config.max_upload_bytes).await?;
    let file = form.take_file()?;
    let token = session_token(&state, &headers)
        .await
        .ok_or(ApiError::Unauthorized("Unauthorized - User not authenticated"))?;

    let file_name = form
        .field("fileName")
        .or(part_name(&file))
        .unwrap_or_default()
        .to_string();
    info!(
        file_name = %file_name,
        size = file.bytes.len(),
        content_type = ?file.content_type,
        "session upload received"
    );

    let worker = state.clone();
    let name = file_name.clone();
    tokio::task::spawn_blocking(move || {
        let client = GraphClient::new(worker.transport.as_ref(), &token, &worker.config.drive);
        upload_to_personal_root(&client, &name, &file.bytes)
    })
    .await??;

    Ok(Json(json!({
        "message": UPLOADED,
        "fileName": file_name,
    })))
}

/// `POST /api/direct-upload`: bearer-authenticated upload into today's
/// folder of the first writable destination.
pub async fn direct_upload(
    State(state): State<AppState>,
    headers: HeaderMap,
    multipart: Multipart,
) -> Result<Json<Value>, ApiError> {
    let mut form = read_form(multipart, state.config.max_upload_bytes).await?;
    let file = form.take_file()?;
    let token = bearer_token(&headers)
        .ok_or(ApiError::Unauthorized("Unauthorized - Missing or invalid token"))?;

    let file_name = form
        .field("fileName")
        .or(part_name(&file))
        .unwrap_or_default()
        .to_string();
    let original_file_name = form
        .field("originalFileName")
        .or(part_name(&file))
        .unwrap_or_default()
        .to_string();
    let report_name = form
        .field("formattedReportName")
        .unwrap_or(&file_name)
        .to_string();
    info!(
        file_name = %file_name,
        original_file_name = %original_file_name,
        report_name = %report_name,
        size = file.bytes.len(),
        "direct upload received"
    );

    let request = UploadRequest {
        file_name: file_name.clone(),
        bytes: file.bytes,
        metadata: ReportMetadata {
            original_file_name: Some(original_file_name.clone()),
            report_name: Some(report_name.clone()),
        },
    };
    let folder = today_folder();
    let worker = state.clone();
    let receipt = tokio::task::spawn_blocking(move || {
        let drive = &worker.config.drive;
        let client = GraphClient::new(worker.transport.as_ref(), &token, drive);
        resolve_and_upload(&client, drive, &request, &folder)
    })
    .await??;

    Ok(Json(json!({
        "message": UPLOADED,
        "fileName": file_name,
        "originalFileName": original_file_name,
        "formattedReportName": report_name,
        "destination": receipt.destination,
        "folder": receipt.folder,
        "webUrl": receipt.item.web_url,
    })))
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;

    #[test]
    fn bearer_requires_scheme_and_value() {
        let mut headers = HeaderMap::new();
        assert_eq!(bearer_token(&headers), None);
        headers.insert(AUTHORIZATION, HeaderValue::from_static("Basic abc"));
        assert_eq!(bearer_token(&headers), None);
        headers.insert(AUTHORIZATION, HeaderValue::from_static("Bearer "));
        assert_eq!(bearer_token(&headers), None);
        headers.insert(AUTHORIZATION, HeaderValue::from_static("Bearer eyJ0"));
        assert_eq!(bearer_token(&headers).as_deref(), Some("eyJ0"));
    }
}
