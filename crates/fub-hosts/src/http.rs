use std::path::Path;

use tokio_util::io::ReaderStream;

use fub_core::{errors::Error, Result, UploadError};

pub(crate) fn build_client() -> Result<reqwest::Client> {
    reqwest::Client::builder()
        .user_agent(concat!("fub/", env!("CARGO_PKG_VERSION")))
        .build()
        .map_err(|e| Error::External(format!("http client build failed: {e}")))
}

/// Classify a transport error for `host`.
pub(crate) fn request_error(host: &'static str, e: reqwest::Error) -> Error {
    if e.is_timeout() {
        return UploadError::Timeout { host }.into();
    }
    UploadError::Request {
        host,
        reason: e.to_string(),
    }
    .into()
}

/// Stream a staged file from disk instead of buffering it.
pub(crate) async fn file_body(path: &Path) -> Result<(reqwest::Body, u64)> {
    let file = tokio::fs::File::open(path).await?;
    let len = file.metadata().await?.len();
    Ok((reqwest::Body::wrap_stream(ReaderStream::new(file)), len))
}

/// Non-2xx responses are transport-level failures (`raise_for_status`).
pub(crate) async fn ok_text(host: &'static str, resp: reqwest::Response) -> Result<String> {
    let status = resp.status();
    if !status.is_success() {
        let body = resp.text().await.unwrap_or_default();
        return Err(UploadError::Request {
            host,
            reason: format!(
                "HTTP {status}: {}",
                body.chars().take(200).collect::<String>()
            ),
        }
        .into());
    }
    resp.text().await.map_err(|e| request_error(host, e))
}
