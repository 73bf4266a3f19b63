//! transfer.sh: a single streamed PUT, the response body is the link.

use std::time::Duration;

use async_trait::async_trait;

use fub_core::{
    media::host_object_name,
    ports::{UploadHost, UploadOutcome, UploadRequest},
    Result, UploadError,
};

use crate::http::{build_client, file_body, ok_text, request_error};

const HOST: &str = "transfer.sh";

pub struct TransferShHost {
    base_url: String,
    timeout: Duration,
    http: reqwest::Client,
}

impl TransferShHost {
    pub fn new(base_url: impl Into<String>, timeout: Duration) -> Result<Self> {
        Ok(Self {
            base_url: base_url.into(),
            timeout,
            http: build_client()?,
        })
    }

    fn object_url(&self, object: &str) -> String {
        format!("{}/{}", self.base_url.trim_end_matches('/'), object)
    }
}

#[async_trait]
impl UploadHost for TransferShHost {
    fn name(&self) -> &'static str {
        HOST
    }

    fn retention_hint(&self) -> Option<&'static str> {
        Some("লিঙ্কটি সাধারণত প্রায় ১৪ দিন সক্রিয় থাকে।")
    }

    async fn upload(&self, req: UploadRequest) -> Result<UploadOutcome> {
        let object = host_object_name(&req.file_name, &req.unique_id);
        let (body, len) = file_body(&req.path).await?;

        tracing::debug!(object = %object, bytes = len, "PUT to transfer.sh");
        let resp = self
            .http
            .put(self.object_url(&object))
            .header(reqwest::header::CONTENT_LENGTH, len)
            .body(body)
            .timeout(self.timeout)
            .send()
            .await
            .map_err(|e| request_error(HOST, e))?;

        let link = ok_text(HOST, resp).await?.trim().to_string();
        if link.is_empty() {
            return Err(UploadError::MissingLink { host: HOST }.into());
        }

        Ok(UploadOutcome {
            download_url: link,
            file_name: object,
            admin_code: None,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use fub_core::Error;

    fn staged(dir: &tempfile::TempDir, name: &str) -> UploadRequest {
        let path = dir.path().join("temp_download_1_x");
        std::fs::write(&path, b"transfer body").unwrap();
        UploadRequest {
            path,
            file_name: name.to_string(),
            unique_id: "AgADx1".to_string(),
        }
    }

    #[tokio::test]
    async fn put_returns_trimmed_link() {
        let mut server = mockito::Server::new_async().await;
        let m = server
            .mock("PUT", "/report_final.pdf")
            .match_body("transfer body")
            .with_status(200)
            .with_body("https://transfer.sh/abc/report_final.pdf\n")
            .create_async()
            .await;

        let dir = tempfile::tempdir().unwrap();
        let host = TransferShHost::new(server.url(), Duration::from_secs(5)).unwrap();
        let out = host
            .upload(staged(&dir, "report final.pdf"))
            .await
            .unwrap();

        m.assert_async().await;
        assert_eq!(out.download_url, "https://transfer.sh/abc/report_final.pdf");
        assert_eq!(out.file_name, "report_final.pdf");
        assert_eq!(out.admin_code, None);
    }

    #[tokio::test]
    async fn unusable_name_falls_back_to_unique_id() {
        let mut server = mockito::Server::new_async().await;
        let m = server
            .mock("PUT", "/file_AgADx1")
            .with_status(200)
            .with_body("https://transfer.sh/q/file_AgADx1")
            .create_async()
            .await;

        let dir = tempfile::tempdir().unwrap();
        let host = TransferShHost::new(server.url(), Duration::from_secs(5)).unwrap();
        host.upload(staged(&dir, "")).await.unwrap();
        m.assert_async().await;
    }

    #[tokio::test]
    async fn empty_body_and_http_errors_fail() {
        let mut server = mockito::Server::new_async().await;
        let dir = tempfile::tempdir().unwrap();
        let host = TransferShHost::new(server.url(), Duration::from_secs(5)).unwrap();

        let m = server
            .mock("PUT", "/a.txt")
            .with_status(200)
            .with_body("   \n")
            .create_async()
            .await;
        let err = host.upload(staged(&dir, "a.txt")).await.unwrap_err();
        assert!(matches!(err, Error::Upload(UploadError::MissingLink { .. })));
        m.remove_async().await;

        let _m = server
            .mock("PUT", "/a.txt")
            .with_status(503)
            .with_body("maintenance")
            .create_async()
            .await;
        let err = host.upload(staged(&dir, "a.txt")).await.unwrap_err();
        assert!(
            matches!(err, Error::Upload(UploadError::Request { ref reason, .. }) if reason.contains("503"))
        );
    }

    #[test]
    fn advertises_retention() {
        let host = TransferShHost::new("https://transfer.sh/", Duration::from_secs(1)).unwrap();
        assert!(host.retention_hint().is_some());
        assert_eq!(host.object_url("a.txt"), "https://transfer.sh/a.txt");
    }
}
