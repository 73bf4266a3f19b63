//! The upload pipeline: stage an incoming file locally, push it to the file
//! host, and keep the user's status message current along the way.

use std::{
    path::{Path, PathBuf},
    sync::{
        atomic::{AtomicUsize, Ordering},
        Arc,
    },
};

use tokio::sync::Semaphore;

use crate::{
    audit::{AuditEvent, AuditLogger},
    domain::{MessageRef, UserId},
    errors::Error,
    media::{size_mb, staging_name, IncomingFile},
    messaging::port::MessagingPort,
    notify::Notifier,
    ports::{MediaSource, UploadHost, UploadOutcome, UploadRequest},
    texts, Result,
};

/// Who asked for the upload (for notices and audit).
#[derive(Clone, Debug)]
pub struct Requester {
    pub user_id: UserId,
    pub name: String,
}

impl Requester {
    fn describe(&self) -> String {
        format!("user {} (ID: {})", self.name, self.user_id.0)
    }
}

#[derive(Clone, Debug)]
pub struct UploadJob {
    pub file: IncomingFile,
    /// Bot message edited with progress; lives in the chat that gets the link.
    pub status: MessageRef,
    pub requester: Option<Requester>,
}

pub struct PipelineDeps {
    pub source: Arc<dyn MediaSource>,
    pub host: Arc<dyn UploadHost>,
    pub messenger: Arc<dyn MessagingPort>,
    pub notifier: Arc<Notifier>,
    pub audit: Arc<AuditLogger>,
    pub temp_dir: PathBuf,
    pub max_concurrent: usize,
}

pub struct UploadPipeline {
    source: Arc<dyn MediaSource>,
    host: Arc<dyn UploadHost>,
    messenger: Arc<dyn MessagingPort>,
    notifier: Arc<Notifier>,
    audit: Arc<AuditLogger>,
    temp_dir: PathBuf,
    permits: Arc<Semaphore>,
    counter: AtomicUsize,
}

impl UploadPipeline {
    pub fn new(deps: PipelineDeps) -> Self {
        Self {
            source: deps.source,
            host: deps.host,
            messenger: deps.messenger,
            notifier: deps.notifier,
            audit: deps.audit,
            temp_dir: deps.temp_dir,
            permits: Arc::new(Semaphore::new(deps.max_concurrent.max(1))),
            counter: AtomicUsize::new(1),
        }
    }

    pub fn host_name(&self) -> &'static str {
        self.host.name()
    }

    /// Run `job` in the background. The outcome is reported through the
    /// status message, so the handle can be dropped.
    pub fn spawn(self: &Arc<Self>, job: UploadJob) -> tokio::task::JoinHandle<()> {
        let this = Arc::clone(self);
        tokio::spawn(async move {
            let _ = this.process(job).await;
        })
    }

    /// Process one job end to end. The status message is always left with a
    /// final success or failure text, and the staged copy is always removed.
    pub async fn process(&self, job: UploadJob) -> Result<UploadOutcome> {
        let _permit = self
            .permits
            .clone()
            .acquire_owned()
            .await
            .map_err(|_| Error::External("upload pipeline is shut down".to_string()))?;

        let name = job.file.display_name();
        let n = self.counter.fetch_add(1, Ordering::SeqCst);
        let staged = self
            .temp_dir
            .join(format!("temp_download_{n}_{}", staging_name(&name)));

        tracing::info!(
            chat_id = job.status.chat_id.0,
            file = %name,
            kind = job.file.kind.label(),
            "processing file"
        );

        let result = self.run(&job, &name, &staged).await;
        remove_staged(&staged).await;

        let (user_id, user_name) = match &job.requester {
            Some(r) => (Some(r.user_id.0), Some(r.name.as_str())),
            None => (None, None),
        };
        let who = job
            .requester
            .as_ref()
            .map(Requester::describe)
            .unwrap_or_else(|| "owner".to_string());

        match &result {
            Ok(outcome) => {
                self.edit(
                    job.status,
                    &texts::upload_succeeded(outcome, self.host.retention_hint()),
                )
                .await;
                tracing::info!(
                    chat_id = job.status.chat_id.0,
                    file = %name,
                    link = %outcome.download_url,
                    "upload succeeded"
                );
                self.notifier
                    .log_event(&format!(
                        "Successfully uploaded '{name}' for {who}. Link: {}",
                        outcome.download_url
                    ))
                    .await;
                self.audit.record(AuditEvent::upload_succeeded(
                    user_id,
                    user_name,
                    &name,
                    self.host.name(),
                    &outcome.download_url,
                ));
            }
            Err(e) => {
                let text = match e {
                    Error::Download { .. } => texts::download_failed(&name),
                    other => texts::upload_failed(other),
                };
                self.edit(job.status, &text).await;
                tracing::error!(
                    chat_id = job.status.chat_id.0,
                    file = %name,
                    error = %e,
                    "upload failed"
                );
                self.notifier
                    .log_event(&format!(
                        "Failed to upload '{name}' for {who}. Error: {e}"
                    ))
                    .await;
                self.audit.record(AuditEvent::upload_failed(
                    user_id,
                    user_name,
                    &name,
                    self.host.name(),
                    &e.to_string(),
                ));
            }
        }

        result
    }

    async fn run(&self, job: &UploadJob, name: &str, staged: &Path) -> Result<UploadOutcome> {
        self.edit(job.status, &texts::downloading(name)).await;

        if let Err(e) = self.source.download(&job.file, staged).await {
            return Err(match e {
                Error::Download { .. } => e,
                other => Error::Download {
                    path: staged.to_path_buf(),
                    reason: other.to_string(),
                },
            });
        }

        let bytes = match tokio::fs::metadata(staged).await {
            Ok(md) => md.len(),
            Err(e) => {
                return Err(Error::Download {
                    path: staged.to_path_buf(),
                    reason: format!("staged file missing after download: {e}"),
                })
            }
        };

        let host = self.host.name();
        tracing::info!(file = %name, size_mb = size_mb(bytes), host, "downloaded, uploading");
        self.edit(job.status, &texts::uploading(name, bytes, host))
            .await;

        let who = job
            .requester
            .as_ref()
            .map(Requester::describe)
            .unwrap_or_else(|| "owner".to_string());
        self.notifier
            .log_event(&format!("{who} sent file: '{name}'. Starting upload."))
            .await;
        self.audit.record(AuditEvent::upload_started(
            job.requester.as_ref().map(|r| r.user_id.0),
            job.requester.as_ref().map(|r| r.name.as_str()),
            name,
            host,
        ));

        self.host
            .upload(UploadRequest {
                path: staged.to_path_buf(),
                file_name: name.to_string(),
                unique_id: job.file.unique_id.clone(),
            })
            .await
    }

    async fn edit(&self, status: MessageRef, html: &str) {
        if let Err(e) = self.messenger.edit_html(status, html).await {
            tracing::warn!(chat_id = status.chat_id.0, error = %e, "failed to update status message");
        }
    }
}

async fn remove_staged(path: &Path) {
    match tokio::fs::remove_file(path).await {
        Ok(()) => tracing::debug!(path = %path.display(), "cleaned up staged file"),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
        Err(e) => tracing::error!(path = %path.display(), error = %e, "error cleaning up staged file"),
    }
}
