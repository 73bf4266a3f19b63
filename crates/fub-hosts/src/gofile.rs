//! Gofile.io: pick a storage server, then multipart-upload to it.

use std::time::Duration;

use async_trait::async_trait;
use serde::Deserialize;

use fub_core::{
    ports::{UploadHost, UploadOutcome, UploadRequest},
    Result, UploadError,
};

use crate::http::{build_client, file_body, ok_text, request_error};

const HOST: &str = "Gofile.io";

#[derive(Clone, Debug)]
pub struct GofileConfig {
    /// Base of the server discovery API, e.g. `https://api.gofile.io`.
    pub api_url: String,
    /// Upload endpoint with a `{server}` placeholder.
    pub upload_url_template: String,
    pub fallback_server: String,
    pub lookup_timeout: Duration,
    pub upload_timeout: Duration,
}

#[derive(Deserialize)]
struct Envelope<T> {
    #[serde(default)]
    status: String,
    data: Option<T>,
}

#[derive(Deserialize)]
struct ServerData {
    server: Option<String>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct UploadData {
    download_page: Option<String>,
    file_name: Option<String>,
    admin_code: Option<String>,
}

pub struct GofileHost {
    cfg: GofileConfig,
    http: reqwest::Client,
}

impl GofileHost {
    pub fn new(cfg: GofileConfig) -> Result<Self> {
        Ok(Self {
            cfg,
            http: build_client()?,
        })
    }

    /// Ask Gofile for the best server; any failure falls back to the configured one.
    pub async fn server(&self) -> String {
        match self.lookup_server().await {
            Ok(Some(server)) => {
                tracing::info!(server = %server, "using Gofile server");
                server
            }
            Ok(None) => {
                tracing::warn!(
                    fallback = %self.cfg.fallback_server,
                    "Gofile server lookup returned no server, falling back"
                );
                self.cfg.fallback_server.clone()
            }
            Err(e) => {
                tracing::warn!(
                    fallback = %self.cfg.fallback_server,
                    error = %e,
                    "Gofile server lookup failed, falling back"
                );
                self.cfg.fallback_server.clone()
            }
        }
    }

    async fn lookup_server(&self) -> std::result::Result<Option<String>, reqwest::Error> {
        let url = format!("{}/getServer", self.cfg.api_url.trim_end_matches('/'));
        let env: Envelope<ServerData> = self
            .http
            .get(url)
            .timeout(self.cfg.lookup_timeout)
            .send()
            .await?
            .error_for_status()?
            .json()
            .await?;

        if env.status != "ok" {
            return Ok(None);
        }
        Ok(env
            .data
            .and_then(|d| d.server)
            .filter(|s| !s.trim().is_empty()))
    }

    fn upload_url(&self, server: &str) -> String {
        self.cfg.upload_url_template.replace("{server}", server)
    }
}

#[async_trait]
impl UploadHost for GofileHost {
    fn name(&self) -> &'static str {
        HOST
    }

    async fn upload(&self, req: UploadRequest) -> Result<UploadOutcome> {
        let server = self.server().await;
        let url = self.upload_url(&server);

        let (body, len) = file_body(&req.path).await?;
        let part = reqwest::multipart::Part::stream_with_length(body, len)
            .file_name(req.file_name.clone());
        let form = reqwest::multipart::Form::new().part("file", part);

        let resp = self
            .http
            .post(url)
            .multipart(form)
            .timeout(self.cfg.upload_timeout)
            .send()
            .await
            .map_err(|e| request_error(HOST, e))?;
        let text = ok_text(HOST, resp).await?;

        let env: Envelope<UploadData> =
            serde_json::from_str(&text).map_err(|e| UploadError::Decode {
                host: HOST,
                reason: format!("{e}; body: {}", text.chars().take(200).collect::<String>()),
            })?;

        if env.status != "ok" {
            let status = if env.status.is_empty() {
                "Unknown Gofile error".to_string()
            } else {
                env.status
            };
            return Err(UploadError::Rejected { host: HOST, status }.into());
        }

        let data = env.data.ok_or(UploadError::MissingLink { host: HOST })?;
        let download_url = data
            .download_page
            .filter(|s| !s.trim().is_empty())
            .ok_or(UploadError::MissingLink { host: HOST })?;

        Ok(UploadOutcome {
            download_url,
            file_name: data.file_name.unwrap_or(req.file_name),
            admin_code: data.admin_code.filter(|s| !s.is_empty()),
        })
    }
}
