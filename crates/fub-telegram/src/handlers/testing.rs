//! Shared fixtures for handler tests: an `AppState` wired to in-memory
//! fakes, and `Message`s built from Bot API JSON.

use std::{collections::HashMap, path::Path, sync::Arc, time::Duration};

use async_trait::async_trait;
use teloxide::types::Message;
use tokio::sync::{mpsc, Mutex};

use fub_core::{
    audit::AuditLogger,
    config::Config,
    domain::ChatId,
    errors::Error,
    media::IncomingFile,
    messaging::port::MessagingPort,
    notify::Notifier,
    pipeline::{PipelineDeps, UploadPipeline},
    ports::{MediaSource, UploadHost, UploadOutcome, UploadRequest},
    relay::JobRegistry,
    security::RateLimiter,
    test_support::RecordingMessenger,
    Result,
};

use crate::router::AppState;

pub(super) const HYBRID_ENV: [(&str, &str); 4] = [
    ("BOT_TOKEN", "123:abc"),
    ("API_ID", "1"),
    ("API_HASH", "hash"),
    ("SESSION_STRING", "session"),
];

/// Reports each requested file, then fails so no bytes are needed.
struct ReportingSource {
    seen: mpsc::UnboundedSender<IncomingFile>,
}

#[async_trait]
impl MediaSource for ReportingSource {
    async fn download(&self, file: &IncomingFile, _dest: &Path) -> Result<u64> {
        let _ = self.seen.send(file.clone());
        Err(Error::Telegram("offline".to_string()))
    }
}

struct OfflineHost;

#[async_trait]
impl UploadHost for OfflineHost {
    fn name(&self) -> &'static str {
        "FakeHost"
    }

    async fn upload(&self, _req: UploadRequest) -> Result<UploadOutcome> {
        Err(Error::External("offline".to_string()))
    }
}

pub(super) struct Harness {
    pub state: Arc<AppState>,
    pub messenger: Arc<RecordingMessenger>,
    downloads: mpsc::UnboundedReceiver<IncomingFile>,
    _dir: tempfile::TempDir,
}

impl Harness {
    pub fn new(env: &[(&str, &str)]) -> Self {
        Self::with_messenger(env, RecordingMessenger::default())
    }

    pub fn with_messenger(env: &[(&str, &str)], messenger: RecordingMessenger) -> Self {
        let dir = tempfile::tempdir().unwrap();
        let mut vars: HashMap<String, String> = env
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        vars.insert(
            "TEMP_DIR".to_string(),
            dir.path().display().to_string(),
        );
        vars.insert(
            "AUDIT_LOG_PATH".to_string(),
            dir.path().join("audit.log").display().to_string(),
        );
        let cfg = Arc::new(Config::from_lookup(|k| vars.get(k).cloned()).unwrap());

        let messenger = Arc::new(messenger);
        let port: Arc<dyn MessagingPort> = messenger.clone();
        let notifier = Arc::new(Notifier::new(
            port.clone(),
            cfg.log_channel_id.map(ChatId),
            cfg.owner_id.map(ChatId),
        ));
        let audit = Arc::new(AuditLogger::new(cfg.audit_log_path.clone(), false));
        let (tx, downloads) = mpsc::unbounded_channel();

        let pipeline = Arc::new(UploadPipeline::new(PipelineDeps {
            source: Arc::new(ReportingSource { seen: tx }),
            host: Arc::new(OfflineHost),
            messenger: port.clone(),
            notifier: notifier.clone(),
            audit: audit.clone(),
            temp_dir: cfg.temp_dir.clone(),
            max_concurrent: 2,
        }));

        let state = Arc::new(AppState {
            rate_limiter: Arc::new(Mutex::new(RateLimiter::new(
                cfg.rate_limit_enabled,
                cfg.rate_limit_requests,
                cfg.rate_limit_window,
            ))),
            cfg,
            messenger: port,
            pipeline,
            notifier,
            registry: Arc::new(JobRegistry::default()),
            audit,
        });

        Self {
            state,
            messenger,
            downloads,
            _dir: dir,
        }
    }

    /// The next file the pipeline tried to fetch, if one shows up in time.
    pub async fn next_download(&mut self, wait: Duration) -> Option<IncomingFile> {
        tokio::time::timeout(wait, self.downloads.recv())
            .await
            .ok()
            .flatten()
    }

    /// Wait for a message to `chat` containing `needle`.
    pub async fn wait_for_send(&self, chat: ChatId, needle: &str) -> bool {
        for _ in 0..100 {
            if self
                .messenger
                .sends_to(chat)
                .await
                .iter()
                .any(|m| m.contains(needle))
            {
                return true;
            }
            tokio::time::sleep(Duration::from_millis(20)).await;
        }
        false
    }
}

/// A message from user `from_id` in `chat_id`. Negative chat ids are groups.
/// Keys in `extra` are merged in.
pub(super) fn message(chat_id: i64, from_id: i64, extra: serde_json::Value) -> Message {
    let chat = if chat_id < 0 {
        serde_json::json!({ "id": chat_id, "type": "group", "title": "Team" })
    } else {
        serde_json::json!({ "id": chat_id, "type": "private", "first_name": "Rafi" })
    };
    let mut base = serde_json::json!({
        "message_id": 10,
        "date": 1700000000,
        "chat": chat,
        "from": { "id": from_id, "is_bot": false, "first_name": "Rafi" }
    });
    if let (Some(obj), Some(more)) = (base.as_object_mut(), extra.as_object()) {
        for (k, v) in more {
            obj.insert(k.clone(), v.clone());
        }
    }
    serde_json::from_value(base).unwrap()
}

pub(super) fn document(name: &str, size: u64) -> serde_json::Value {
    serde_json::json!({
        "document": {
            "file_id": format!("ID-{name}"),
            "file_unique_id": format!("U-{name}"),
            "file_size": size,
            "file_name": name
        }
    })
}
