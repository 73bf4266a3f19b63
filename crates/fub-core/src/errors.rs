use std::path::PathBuf;

/// Core error type for the upload bot.
///
/// Adapter crates should map their specific errors into this type so the
/// pipeline can pick the right user-facing status text.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("Configuration Error: {0}")]
    Config(String),

    #[error("i/o error: {0}")]
    Io(#[from] std::io::Error),

    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("telegram error: {0}")]
    Telegram(String),

    #[error("download failed: {path}: {reason}")]
    Download { path: PathBuf, reason: String },

    #[error(transparent)]
    Upload(#[from] UploadError),

    #[error("external error: {0}")]
    External(String),
}

/// Failure modes of a file host upload.
#[derive(Debug, thiserror::Error)]
pub enum UploadError {
    #[error("{host} upload timed out")]
    Timeout { host: &'static str },

    #[error("{host} request failed: {reason}")]
    Request { host: &'static str, reason: String },

    #[error("{host} returned an unreadable response: {reason}")]
    Decode { host: &'static str, reason: String },

    #[error("{host} rejected the upload: {status}")]
    Rejected { host: &'static str, status: String },

    #[error("{host} accepted the upload but returned no download link")]
    MissingLink { host: &'static str },
}

pub type Result<T> = std::result::Result<T, Error>;
