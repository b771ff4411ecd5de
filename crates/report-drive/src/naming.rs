use chrono::{Datelike, Local, NaiveDate};
use thiserror::Error;
use urlencoding::encode;

const MAX_NAME_LEN: usize = 255;
const FORBIDDEN_CHARS: &[char] = &['"', '*', ':', '<', '>', '?', '/', '\\', '|'];

#[derive(Debug, Error, PartialEq, Eq)]
pub enum NameError {
    #[error("file name is empty")]
    Empty,
    #[error("file name is longer than {MAX_NAME_LEN} characters")]
    TooLong,
    #[error("file name contains forbidden character {0:?}")]
    ForbiddenChar(char),
    #[error("file name is reserved: {0}")]
    Reserved(String),
    #[error("file name must not end with a dot or a space")]
    BadEnding,
}

/// Folder name for a given day, `DD-MM-YYYY`.
pub fn date_folder(date: NaiveDate) -> String {
    format!("{:02}-{:02}-{:04}", date.day(), date.month(), date.year())
}

pub fn today_folder() -> String {
    date_folder(Local::now().date_naive())
}

/// Trims the name and checks it against OneDrive's naming rules.
pub fn validate_file_name(raw: &str) -> Result<String, NameError> {
    let name = raw.trim();
    if name.is_empty() {
        return Err(NameError::Empty);
    }
    if name == "." || name == ".." {
        return Err(NameError::Reserved(name.to_string()));
    }
    if name.chars().count() > MAX_NAME_LEN {
        return Err(NameError::TooLong);
    }
    if let Some(ch) = name
        .chars()
        .find(|ch| FORBIDDEN_CHARS.contains(ch) || ch.is_control())
    {
        return Err(NameError::ForbiddenChar(ch));
    }
    if name.ends_with('.') {
        return Err(NameError::BadEnding);
    }
    Ok(name.to_string())
}

/// Percent-encodes each segment and joins them with `/` for a
/// `root:/{path}:` address.
pub fn encode_path(segments: &[&str]) -> String {
    segments
        .iter()
        .filter(|segment| !segment.is_empty())
        .map(|segment| encode(segment).into_owned())
        .collect::<Vec<_>>()
        .join("/")
}
