//! OAuth 2.0 authorization-code flow against the Microsoft identity platform.

use base64::Engine as _;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;
use tracing::{debug, warn};
use urlencoding::encode as url_encode;

use crate::config::OAuthConfig;
use crate::transport::{HttpRequest, HttpTransport, TransportError};

#[derive(Debug, Error)]
pub enum AuthError {
    #[error("token exchange error: {0}")]
    Transport(#[from] TransportError),
    #[error("token endpoint returned status {status} body={body}")]
    Status { status: u16, body: String },
    #[error("invalid token response: {0}")]
    Decode(String),
    #[error("token response missing access_token")]
    MissingAccessToken,
    #[error("malformed id token")]
    MalformedIdToken,
}

#[derive(Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct TokenSet {
    pub access_token: String,
    #[serde(default)]
    pub id_token: Option<String>,
    #[serde(default)]
    pub refresh_token: Option<String>,
    #[serde(default)]
    pub expires_in: Option<u64>,
}

impl std::fmt::Debug for TokenSet {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TokenSet")
            .field("access_token", &"<redacted>")
            .field("id_token", &self.id_token.as_ref().map(|_| "<redacted>"))
            .field(
                "refresh_token",
                &self.refresh_token.as_ref().map(|_| "<redacted>"),
            )
            .field("expires_in", &self.expires_in)
            .finish()
    }
}

pub struct OAuthClient<'a> {
    transport: &'a dyn HttpTransport,
    cfg: &'a OAuthConfig,
}

impl<'a> OAuthClient<'a> {
    pub fn new(transport: &'a dyn HttpTransport, cfg: &'a OAuthConfig) -> Self {
        Self { transport, cfg }
    }

    /// URL the browser is redirected to for sign-in.
    pub fn authorization_url(&self, state: &str) -> String {
        format!(
            "{}/authorize?client_id={}&response_type=code&redirect_uri={}&response_mode=query&scope={}&prompt=select_account&state={}",
            self.cfg.endpoint_base(),
            url_encode(&self.cfg.client_id),
            url_encode(&self.cfg.redirect_uri),
            url_encode(&self.cfg.scope_param()),
            url_encode(state)
        )
    }

    pub fn token_endpoint(&self) -> String {
        format!("{}/token", self.cfg.endpoint_base())
    }

    pub fn exchange_code(&self, code: &str) -> Result<TokenSet, AuthError> {
        let form = format!(
            "client_id={}&client_secret={}&grant_type=authorization_code&code={}&redirect_uri={}&scope={}",
            url_encode(&self.cfg.client_id),
            url_encode(&self.cfg.client_secret),
            url_encode(code),
            url_encode(&self.cfg.redirect_uri),
            url_encode(&self.cfg.scope_param())
        );
        self.request_token(&form)
    }

    pub fn refresh(&self, refresh_token: &str) -> Result<TokenSet, AuthError> {
        let form = format!(
            "client_id={}&client_secret={}&grant_type=refresh_token&refresh_token={}&scope={}",
            url_encode(&self.cfg.client_id),
            url_encode(&self.cfg.client_secret),
            url_encode(refresh_token),
            url_encode(&self.cfg.scope_param())
        );
        self.request_token(&form)
    }

    fn request_token(&self, form: &str) -> Result<TokenSet, AuthError> {
        let request = HttpRequest::new("POST", self.token_endpoint())
            .header("Content-Type", "application/x-www-form-urlencoded")
            .body(form.as_bytes().to_vec());
        debug!(endpoint = %request.url, "requesting token");
        let resp = self.transport.send(&request)?;
        if !resp.is_success() {
            let body = resp.body_text();
            warn!(status = resp.status, "token endpoint rejected request");
            return Err(AuthError::Status {
                status: resp.status,
                body: body.chars().take(500).collect(),
            });
        }
        let parsed: Value =
            serde_json::from_slice(&resp.body).map_err(|e| AuthError::Decode(e.to_string()))?;
        let has_token = parsed
            .get("access_token")
            .and_then(Value::as_str)
            .is_some_and(|token| !token.is_empty());
        if !has_token {
            return Err(AuthError::MissingAccessToken);
        }
        serde_json::from_value(parsed).map_err(|e| AuthError::Decode(e.to_string()))
    }
}

/// True when `email` belongs to `domain` (case-insensitive).
pub fn validate_user_domain(email: &str, domain: &str) -> bool {
    let domain = domain.trim().trim_start_matches('@');
    if domain.is_empty() {
        return false;
    }
    let suffix = format!("@{}", domain.to_ascii_lowercase());
    email.trim().to_ascii_lowercase().ends_with(&suffix)
}

/// Reads the signed-in user's address from an id token payload. The
/// signature is not checked: the token came straight from the token endpoint.
pub fn id_token_email(id_token: &str) -> Result<Option<String>, AuthError> {
    let payload = id_token
        .split('.')
        .nth(1)
        .ok_or(AuthError::MalformedIdToken)?;
    let bytes = URL_SAFE_NO_PAD
        .decode(payload.trim_end_matches('='))
        .map_err(|_| AuthError::MalformedIdToken)?;
    let claims: Value = serde_json::from_slice(&bytes).map_err(|_| AuthError::MalformedIdToken)?;
    Ok(["preferred_username", "email", "upn"]
        .iter()
        .find_map(|key| claims.get(*key).and_then(Value::as_str))
        .map(str::to_string))
}
