use std::{future::Future, pin::Pin, sync::Arc};

use anyhow::Context;
use teloxide::{
    dispatching::Dispatcher,
    dptree,
    error_handlers::{ErrorHandler, LoggingErrorHandler},
    prelude::*,
    update_listeners::Polling,
};

use tokio::sync::Mutex;

use fub_core::messaging::throttled::{ThrottleConfig, ThrottledMessenger};
use fub_core::{
    audit::AuditLogger,
    config::{Config, Variant},
    domain::ChatId,
    messaging::port::MessagingPort,
    notify::Notifier,
    pipeline::{PipelineDeps, UploadPipeline},
    ports::UploadHost,
    relay::JobRegistry,
    security::RateLimiter,
    texts,
};

use crate::handlers;
use crate::{BotMediaSource, TelegramMessenger};

#[derive(Clone)]
pub struct AppState {
    pub cfg: Arc<Config>,
    pub messenger: Arc<dyn MessagingPort>,
    pub pipeline: Arc<UploadPipeline>,
    pub notifier: Arc<Notifier>,
    pub rate_limiter: Arc<Mutex<RateLimiter>>,
    pub registry: Arc<JobRegistry>,
    pub audit: Arc<AuditLogger>,
}

/// Logs handler failures and forwards them to the owner.
struct OwnerAlertHandler {
    notifier: Arc<Notifier>,
}

impl ErrorHandler<anyhow::Error> for OwnerAlertHandler {
    fn handle_error(
        self: Arc<Self>,
        error: anyhow::Error,
    ) -> Pin<Box<dyn Future<Output = ()> + Send + 'static>> {
        Box::pin(async move {
            tracing::error!("update handler failed: {error:#}");
            self.notifier
                .alert_owner(&texts::handler_error(&format!("{error:#}")))
                .await;
        })
    }
}

fn build_bot(cfg: &Config) -> anyhow::Result<Bot> {
    let bot = Bot::new(cfg.bot_token.expose());
    let Some(api_url) = &cfg.telegram_api_url else {
        return Ok(bot);
    };
    let url = reqwest::Url::parse(api_url)
        .with_context(|| format!("TELEGRAM_API_URL is not a valid URL: {api_url}"))?;
    tracing::info!(api_url = %url, "using custom Bot API server");
    Ok(bot.set_api_url(url))
}

pub async fn run_polling(cfg: Arc<Config>, host: Arc<dyn UploadHost>) -> anyhow::Result<()> {
    let bot = build_bot(&cfg)?;

    let me = bot.get_me().await.context("getMe failed, check BOT_TOKEN")?;
    let username = me.username().to_string();
    tracing::info!(
        bot = %username,
        variant = ?cfg.variant,
        host = host.name(),
        max_download_mb = cfg.max_download_bytes / (1024 * 1024),
        allowed_users = cfg.allowed_users.len(),
        "bot started"
    );
    if cfg.user_session.is_some() {
        tracing::info!("user-session credentials loaded");
    }

    // Throttle outbound calls to stay under Telegram's flood limits; the raw
    // messenger still retries once on RetryAfter.
    let raw_messenger: Arc<dyn MessagingPort> = Arc::new(TelegramMessenger::new(bot.clone()));
    let messenger: Arc<dyn MessagingPort> = Arc::new(ThrottledMessenger::new(
        raw_messenger,
        ThrottleConfig::default(),
    ));

    let notifier = Arc::new(Notifier::new(
        messenger.clone(),
        cfg.log_channel_id.map(ChatId),
        cfg.owner_id.map(ChatId),
    ));
    let audit = Arc::new(AuditLogger::new(
        cfg.audit_log_path.clone(),
        cfg.audit_log_json,
    ));

    let pipeline = Arc::new(UploadPipeline::new(PipelineDeps {
        source: Arc::new(BotMediaSource::new(bot.clone())),
        host,
        messenger: messenger.clone(),
        notifier: notifier.clone(),
        audit: audit.clone(),
        temp_dir: cfg.temp_dir.clone(),
        max_concurrent: cfg.max_concurrent_uploads,
    }));

    send_startup_notices(&cfg, &notifier, &username).await;

    let state = Arc::new(AppState {
        cfg: cfg.clone(),
        messenger,
        pipeline,
        notifier: notifier.clone(),
        rate_limiter: Arc::new(Mutex::new(RateLimiter::new(
            cfg.rate_limit_enabled,
            cfg.rate_limit_requests,
            cfg.rate_limit_window,
        ))),
        registry: Arc::new(JobRegistry::default()),
        audit,
    });

    let handler = Update::filter_message().endpoint(handlers::handle_message);
    let listener = Polling::builder(bot.clone())
        .timeout(cfg.poll_timeout)
        .build();

    Dispatcher::builder(bot, handler)
        .dependencies(dptree::deps![state])
        .error_handler(Arc::new(OwnerAlertHandler {
            notifier: notifier.clone(),
        }))
        .enable_ctrlc_handler()
        .build()
        .dispatch_with_listener(
            listener,
            LoggingErrorHandler::with_custom_text("error from the update listener"),
        )
        .await;

    tracing::info!("bot stopped");
    notifier.log_event(&texts::log_stopping()).await;
    Ok(())
}

async fn send_startup_notices(cfg: &Config, notifier: &Notifier, username: &str) {
    if cfg.variant == Variant::Hybrid
        && !notifier.alert_owner(&texts::owner_started(username)).await
    {
        tracing::warn!("owner was not notified about startup");
    }
    if notifier.has_log_channel() {
        notifier.log_event(&texts::log_started()).await;
    }
}
