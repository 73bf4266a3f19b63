use std::path::{Path, PathBuf};

use async_trait::async_trait;

use crate::{media::IncomingFile, Result};

/// What the pipeline hands to a file host.
#[derive(Clone, Debug)]
pub struct UploadRequest {
    /// Staged local copy.
    pub path: PathBuf,
    /// Name the host should record (the user-facing name, not the staging name).
    pub file_name: String,
    /// Telegram's unique id, used when a name has to be synthesized.
    pub unique_id: String,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct UploadOutcome {
    pub download_url: String,
    pub file_name: String,
    pub admin_code: Option<String>,
}

/// Hexagonal port for a public file host (Gofile.io, transfer.sh, ...).
#[async_trait]
pub trait UploadHost: Send + Sync {
    /// Human-readable host name used in status texts.
    fn name(&self) -> &'static str;

    /// Optional note on how long links stay alive.
    fn retention_hint(&self) -> Option<&'static str> {
        None
    }

    async fn upload(&self, req: UploadRequest) -> Result<UploadOutcome>;
}

/// Hexagonal port for fetching an incoming file's bytes to local disk.
#[async_trait]
pub trait MediaSource: Send + Sync {
    /// Write the file to `dest` and return the number of bytes written.
    async fn download(&self, file: &IncomingFile, dest: &Path) -> Result<u64>;
}
