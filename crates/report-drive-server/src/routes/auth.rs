use axum::{
    Json,
    extract::{Query, State},
    http::{HeaderMap, StatusCode, header::SET_COOKIE},
    response::{IntoResponse, Redirect, Response},
};
use report_drive::auth::{AuthError, OAuthClient, id_token_email, validate_user_domain};
use serde::Deserialize;
use serde_json::json;
use tracing::{info, warn};
use urlencoding::encode as url_encode;
use uuid::Uuid;

use super::session_token;
use crate::session::{clear_cookie, session_cookie, session_id};
use crate::state::AppState;

#[derive(Debug, Default, Deserialize)]
pub struct CallbackQuery {
    pub code: Option<String>,
    pub state: Option<String>,
    pub error: Option<String>,
    pub error_description: Option<String>,
}

fn frontend_error(state: &AppState, reason: &str) -> Redirect {
    Redirect::to(&format!(
        "{}?error={}",
        state.config.frontend_url,
        url_encode(reason)
    ))
}

fn with_cookie(cookie: String, redirect: Redirect) -> Response {
    ([(SET_COOKIE, cookie)], redirect).into_response()
}

pub async fn login(State(state): State<AppState>, headers: HeaderMap) -> Response {
    let current = session_id(&headers);
    let mut data = current
        .as_deref()
        .and_then(|id| state.sessions.load(id))
        .unwrap_or_default();
    let csrf = Uuid::new_v4().simple().to_string();
    data.oauth_state = Some(csrf.clone());
    let id = state.sessions.save(current.as_deref(), data);

    let url =
        OAuthClient::new(state.transport.as_ref(), &state.config.oauth).authorization_url(&csrf);
    info!("redirecting to Microsoft sign-in");
    with_cookie(
        session_cookie(&id, state.config.cookie_secure),
        Redirect::to(&url),
    )
}

pub async fn callback(
    State(state): State<AppState>,
    headers: HeaderMap,
    Query(query): Query<CallbackQuery>,
) -> Response {
    if let Some(error) = query.error.as_deref() {
        let reason = query.error_description.as_deref().unwrap_or(error);
        warn!(error, "identity provider returned an error");
        return frontend_error(&state, reason).into_response();
    }
    let Some(code) = query.code.filter(|c| !c.is_empty()) else {
        warn!("callback without authorization code");
        return frontend_error(&state, "no_code").into_response();
    };

    let current = session_id(&headers);
    let mut data = current
        .as_deref()
        .and_then(|id| state.sessions.load(id))
        .unwrap_or_default();
    let expected = data.oauth_state.take();
    if expected.is_none() || expected != query.state {
        warn!("callback state does not match the sign-in request");
        return frontend_error(&state, "invalid_state").into_response();
    }

    let worker = state.clone();
    let exchanged = tokio::task::spawn_blocking(move || {
        OAuthClient::new(worker.transport.as_ref(), &worker.config.oauth).exchange_code(&code)
    })
    .await;
    let tokens = match exchanged {
        Ok(Ok(tokens)) => tokens,
        Ok(Err(AuthError::MissingAccessToken)) => {
            warn!("token response carried no access token");
            return frontend_error(&state, "no_token").into_response();
        }
        Ok(Err(err)) => {
            warn!(error = %err, "authorization code exchange failed");
            return frontend_error(&state, "Authentication failed").into_response();
        }
        Err(err) => {
            warn!(error = %err, "token exchange task failed");
            return frontend_error(&state, "Authentication failed").into_response();
        }
    };

    if let Some(domain) = state.config.allowed_email_domain.as_deref() {
        let email = tokens
            .id_token
            .as_deref()
            .and_then(|id_token| id_token_email(id_token).ok().flatten());
        let allowed = email
            .as_deref()
            .is_some_and(|email| validate_user_domain(email, domain));
        if !allowed {
            warn!(domain, "sign-in rejected for account outside the allowed domain");
            if let Some(id) = current.as_deref() {
                state.sessions.destroy(id);
            }
            return with_cookie(
                clear_cookie(state.config.cookie_secure),
                frontend_error(&state, "unauthorized_domain"),
            );
        }
    }

    // Signed-in sessions always get a new id.
    if let Some(id) = current.as_deref() {
        state.sessions.destroy(id);
    }
    data.store_tokens(tokens);
    let id = state.sessions.save(None, data);
    info!("sign-in completed, tokens stored in session");
    with_cookie(
        session_cookie(&id, state.config.cookie_secure),
        Redirect::to(&state.config.frontend_url),
    )
}

pub async fn token(State(state): State<AppState>, headers: HeaderMap) -> Response {
    match session_token(&state, &headers).await {
        Some(access_token) => Json(json!({ "accessToken": access_token })).into_response(),
        None => (
            StatusCode::UNAUTHORIZED,
            Json(json!({ "error": "Not authenticated" })),
        )
            .into_response(),
    }
}

pub async fn check(State(state): State<AppState>, headers: HeaderMap) -> Json<serde_json::Value> {
    let has_access_token = session_token(&state, &headers).await.is_some();
    let session = session_id(&headers).and_then(|id| state.sessions.load(&id));
    Json(json!({
        "isAuthenticated": has_access_token,
        "sessionExists": session.is_some(),
        "hasAccessToken": has_access_token,
    }))
}

pub async fn logout(State(state): State<AppState>, headers: HeaderMap) -> Response {
    if let Some(id) = session_id(&headers) {
        state.sessions.destroy(&id);
    }
    info!("session destroyed");
    with_cookie(
        clear_cookie(state.config.cookie_secure),
        Redirect::to(&state.config.frontend_url),
    )
}
