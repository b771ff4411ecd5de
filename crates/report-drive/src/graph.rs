use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;
use tracing::debug;

use crate::config::DriveConfig;
use crate::transport::{HttpRequest, HttpResponse, HttpTransport, TransportError};

const ERROR_BODY_LIMIT: usize = 500;

#[derive(Debug, Error)]
pub enum GraphError {
    #[error("graph request error: {0}")]
    Transport(#[from] TransportError),
    #[error("graph request returned {status} body={body}")]
    Status { status: u16, body: String },
    #[error("graph response decode failed: {0}")]
    Decode(String),
}

impl GraphError {
    pub fn status(&self) -> Option<u16> {
        match self {
            GraphError::Status { status, .. } => Some(*status),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct Drive {
    pub id: String,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Site {
    pub id: String,
    #[serde(default)]
    pub display_name: Option<String>,
}

impl Site {
    pub fn label(&self) -> &str {
        self.display_name.as_deref().unwrap_or(&self.id)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DriveItem {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub web_url: Option<String>,
    #[serde(default)]
    pub created_date_time: Option<String>,
    #[serde(default)]
    pub size: Option<u64>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Collection<T> {
    #[serde(default = "Vec::new")]
    pub value: Vec<T>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UploadSession {
    pub upload_url: String,
}

/// Graph client bound to one delegated access token.
pub struct GraphClient<'a> {
    transport: &'a dyn HttpTransport,
    token: &'a str,
    base_url: String,
    beta_url: String,
}

impl<'a> GraphClient<'a> {
    pub fn new(transport: &'a dyn HttpTransport, token: &'a str, cfg: &DriveConfig) -> Self {
        Self {
            transport,
            token,
            base_url: cfg.graph_base_url.trim_end_matches('/').to_string(),
            beta_url: cfg.graph_beta_url.trim_end_matches('/').to_string(),
        }
    }

    pub fn beta_url(&self) -> &str {
        &self.beta_url
    }

    pub fn url(&self, path: &str) -> String {
        if path.starts_with("https://") || path.starts_with("http://") {
            return path.to_string();
        }
        if path.starts_with('/') {
            format!("{}{}", self.base_url, path)
        } else {
            format!("{}/{}", self.base_url, path)
        }
    }

    pub fn get_json(&self, path: &str) -> Result<Value, GraphError> {
        self.request("GET", path, None)
    }

    pub fn get<T: DeserializeOwned>(&self, path: &str) -> Result<T, GraphError> {
        decode(self.get_json(path)?)
    }

    pub fn post_json(&self, path: &str, body: &Value) -> Result<Value, GraphError> {
        let bytes = serde_json::to_vec(body).map_err(|e| GraphError::Decode(e.to_string()))?;
        self.request("POST", path, Some(("application/json", bytes)))
    }

    pub fn post<T: DeserializeOwned>(&self, path: &str, body: &Value) -> Result<T, GraphError> {
        decode(self.post_json(path, body)?)
    }

    pub fn put_bytes(&self, path: &str, bytes: Vec<u8>) -> Result<Value, GraphError> {
        self.request("PUT", path, Some(("application/octet-stream", bytes)))
    }

    /// PUT one byte range of an upload session. Upload URLs are
    /// pre-authenticated, so no bearer token is attached.
    pub fn put_range(
        &self,
        upload_url: &str,
        chunk: Vec<u8>,
        start: u64,
        total: u64,
    ) -> Result<Value, GraphError> {
        let len = chunk.len() as u64;
        let end = start + len.saturating_sub(1);
        let request = HttpRequest::new("PUT", upload_url)
            .header("Content-Length", len.to_string())
            .header("Content-Range", format!("bytes {start}-{end}/{total}"))
            .body(chunk);
        debug!(start, end, total, "uploading chunk");
        let resp = self.transport.send(&request)?;
        parse_response(resp)
    }

    fn request(
        &self,
        method: &str,
        path: &str,
        body: Option<(&str, Vec<u8>)>,
    ) -> Result<Value, GraphError> {
        let url = self.url(path);
        debug!(method, url = %url, "graph request");
        let mut request =
            HttpRequest::new(method, url).header("Authorization", format!("Bearer {}", self.token));
        if let Some((content_type, bytes)) = body {
            request = request.header("Content-Type", content_type).body(bytes);
        }
        let resp = self.transport.send(&request)?;
        parse_response(resp)
    }
}

fn parse_response(resp: HttpResponse) -> Result<Value, GraphError> {
    if !resp.is_success() {
        let text = resp.body_text();
        let body: String = text.chars().take(ERROR_BODY_LIMIT).collect();
        return Err(GraphError::Status {
            status: resp.status,
            body,
        });
    }
    if resp.body.is_empty() {
        return Ok(Value::Null);
    }
    serde_json::from_slice(&resp.body).map_err(|e| GraphError::Decode(e.to_string()))
}

fn decode<T: DeserializeOwned>(value: Value) -> Result<T, GraphError> {
    serde_json::from_value(value).map_err(|e| GraphError::Decode(e.to_string()))
}
