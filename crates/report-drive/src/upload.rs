use std::fmt;

use serde_json::{Value, json};
use thiserror::Error;
use tracing::{debug, info};

use crate::graph::{DriveItem, GraphClient, GraphError, UploadSession};
use crate::naming::{NameError, encode_path, validate_file_name};

/// Content strictly smaller than this goes up in a single PUT.
pub const SIMPLE_UPLOAD_LIMIT: usize = 4 * 1024 * 1024;
/// Upload session chunk size; Graph wants multiples of 320 KiB.
pub const CHUNK_SIZE: usize = 12 * 320 * 1024;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Attempt {
    pub label: String,
    pub error: String,
}

impl fmt::Display for Attempt {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.label, self.error)
    }
}

#[derive(Debug, Error)]
pub enum UploadError {
    #[error("invalid file name: {0}")]
    Name(#[from] NameError),
    #[error(transparent)]
    Graph(#[from] GraphError),
    #[error("upload session ended after {uploaded} of {total} bytes without a drive item")]
    IncompleteSession { uploaded: u64, total: u64 },
    #[error("no drives found in {0}")]
    NoDrives(String),
    #[error("no SharePoint sites found")]
    NoSites,
    #[error("could not upload to any destination: {}", join_attempts(.attempts))]
    Exhausted { attempts: Vec<Attempt> },
}

fn join_attempts(attempts: &[Attempt]) -> String {
    attempts
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join("; ")
}

/// Uploads `bytes` to `{item_root}:/{path}:`. `path` must already be
/// percent-encoded.
pub fn upload_item(
    client: &GraphClient<'_>,
    item_root: &str,
    path: &str,
    bytes: &[u8],
) -> Result<DriveItem, UploadError> {
    if bytes.len() < SIMPLE_UPLOAD_LIMIT {
        let api_path = format!("{item_root}:/{path}:/content");
        debug!(api_path = %api_path, size = bytes.len(), "simple upload");
        let value = client.put_bytes(&api_path, bytes.to_vec())?;
        return decode_item(value);
    }
    upload_in_chunks(client, item_root, path, bytes)
}

fn upload_in_chunks(
    client: &GraphClient<'_>,
    item_root: &str,
    path: &str,
    bytes: &[u8],
) -> Result<DriveItem, UploadError> {
    let api_path = format!("{item_root}:/{path}:/createUploadSession");
    info!(api_path = %api_path, size = bytes.len(), "creating upload session");
    let body = json!({
        "item": {
            "@microsoft.graph.conflictBehavior": "replace"
        }
    });
    let session: UploadSession = client.post(&api_path, &body)?;

    let total = bytes.len() as u64;
    let mut offset = 0usize;
    let mut last = Value::Null;
    for chunk in bytes.chunks(CHUNK_SIZE) {
        last = client.put_range(&session.upload_url, chunk.to_vec(), offset as u64, total)?;
        offset += chunk.len();
    }
    if last.is_null() || last.get("id").is_none() {
        return Err(UploadError::IncompleteSession {
            uploaded: offset as u64,
            total,
        });
    }
    decode_item(last)
}

/// Legacy session route: the file lands at the personal drive root, no date
/// folder.
pub fn upload_to_personal_root(
    client: &GraphClient<'_>,
    file_name: &str,
    bytes: &[u8],
) -> Result<DriveItem, UploadError> {
    let name = validate_file_name(file_name)?;
    info!(file_name = %name, "uploading to personal drive root");
    let item = upload_item(client, "/me/drive/root", &encode_path(&[&name]), bytes)?;
    info!(item_id = %item.id, "upload completed");
    Ok(item)
}

fn decode_item(value: Value) -> Result<DriveItem, UploadError> {
    serde_json::from_value(value)
        .map_err(|e| UploadError::Graph(GraphError::Decode(e.to_string())))
}
