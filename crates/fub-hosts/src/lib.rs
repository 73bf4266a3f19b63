//! File host adapters (Gofile.io, transfer.sh).
//!
//! Both implement `fub_core::ports::UploadHost` and stream the staged file
//! from disk with reqwest.

use std::sync::Arc;

use fub_core::{
    config::{Config, HostKind},
    ports::UploadHost,
    Result,
};

mod http;

pub mod gofile;
pub mod transfer_sh;

pub use gofile::{GofileConfig, GofileHost};
pub use transfer_sh::TransferShHost;

/// Build the host selected by `UPLOAD_HOST`.
pub fn build_host(cfg: &Config) -> Result<Arc<dyn UploadHost>> {
    let host: Arc<dyn UploadHost> = match cfg.upload_host {
        HostKind::Gofile => Arc::new(GofileHost::new(GofileConfig {
            api_url: cfg.gofile_api_url.clone(),
            upload_url_template: cfg.gofile_upload_url.clone(),
            fallback_server: cfg.gofile_fallback_server.clone(),
            lookup_timeout: cfg.server_lookup_timeout,
            upload_timeout: cfg.upload_timeout,
        })?),
        HostKind::TransferSh => Arc::new(TransferShHost::new(
            cfg.transfer_sh_url.clone(),
            cfg.upload_timeout,
        )?),
    };
    tracing::info!(host = host.name(), "file host configured");
    Ok(host)
}
