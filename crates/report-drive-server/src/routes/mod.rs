use axum::{Json, http::HeaderMap};
use report_drive::OAuthClient;
use serde_json::{Value, json};
use tracing::{info, warn};

use crate::session::{SessionData, session_id};
use crate::state::AppState;

pub mod auth;
pub mod files;
pub mod upload;

pub async fn root() -> Json<Value> {
    Json(json!({ "message": "OneDrive Upload API is running" }))
}

pub async fn health() -> Json<Value> {
    Json(json!({ "status": "OK" }))
}

/// Access token of the caller's session, if signed in. An expired token is
/// exchanged for a new one with the stored refresh token; when that fails the
/// session is signed out.
pub(crate) async fn session_token(state: &AppState, headers: &HeaderMap) -> Option<String> {
    let id = session_id(headers)?;
    let mut data = state.sessions.load(&id)?;
    if !data.is_authenticated() {
        return None;
    }
    if !data.token_expired() {
        return data.access_token;
    }

    let Some(refresh_token) = data.refresh_token.clone().filter(|t| !t.is_empty()) else {
        info!("access token expired and no refresh token stored");
        sign_out(state, &id, data);
        return None;
    };
    let worker = state.clone();
    let refreshed = tokio::task::spawn_blocking(move || {
        OAuthClient::new(worker.transport.as_ref(), &worker.config.oauth).refresh(&refresh_token)
    })
    .await;
    match refreshed {
        Ok(Ok(tokens)) => {
            data.store_tokens(tokens);
            let token = data.access_token.clone();
            state.sessions.save(Some(&id), data);
            info!("access token refreshed");
            token
        }
        Ok(Err(err)) => {
            warn!(error = %err, "token refresh failed");
            sign_out(state, &id, data);
            None
        }
        Err(err) => {
            warn!(error = %err, "token refresh task failed");
            None
        }
    }
}

fn sign_out(state: &AppState, id: &str, mut data: SessionData) {
    data.access_token = None;
    data.refresh_token = None;
    data.token_expires_at = None;
    state.sessions.save(Some(id), data);
}
