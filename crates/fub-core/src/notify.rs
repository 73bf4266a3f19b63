use std::sync::Arc;

use crate::{domain::ChatId, formatting::escape_html, messaging::port::MessagingPort};

/// Operational notices: the optional log channel and the optional owner.
///
/// Every notice is also written to the log, so an unset channel loses nothing.
pub struct Notifier {
    messenger: Arc<dyn MessagingPort>,
    log_channel: Option<ChatId>,
    owner: Option<ChatId>,
}

impl Notifier {
    pub fn new(
        messenger: Arc<dyn MessagingPort>,
        log_channel: Option<ChatId>,
        owner: Option<ChatId>,
    ) -> Self {
        Self {
            messenger,
            log_channel,
            owner,
        }
    }

    pub fn owner(&self) -> Option<ChatId> {
        self.owner
    }

    pub fn has_log_channel(&self) -> bool {
        self.log_channel.is_some()
    }

    /// Plain-text notice for the log channel.
    pub async fn log_event(&self, text: &str) {
        tracing::info!(target: "fub::notice", "{text}");

        let Some(channel) = self.log_channel else {
            return;
        };
        if let Err(e) = self.messenger.send_html(channel, &escape_html(text)).await {
            tracing::error!(channel = channel.0, error = %e, "failed to send log to channel");
        }
    }

    /// Best-effort HTML alert to the owner. Returns whether it was delivered.
    pub async fn alert_owner(&self, html: &str) -> bool {
        let Some(owner) = self.owner else {
            return false;
        };
        match self.messenger.send_html(owner, html).await {
            Ok(_) => true,
            Err(e) => {
                tracing::warn!(owner = owner.0, error = %e, "could not notify owner");
                false
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::RecordingMessenger;

    #[tokio::test]
    async fn log_events_are_escaped_and_sent_to_channel() {
        let rec = Arc::new(RecordingMessenger::default());
        let n = Notifier::new(rec.clone(), Some(ChatId(-100)), None);

        n.log_event("User <b> started").await;

        assert_eq!(
            rec.sends_to(ChatId(-100)).await,
            vec!["User &lt;b&gt; started".to_string()]
        );
    }

    #[tokio::test]
    async fn missing_targets_are_skipped() {
        let rec = Arc::new(RecordingMessenger::default());
        let n = Notifier::new(rec.clone(), None, None);

        n.log_event("x").await;
        assert!(!n.alert_owner("y").await);
        assert!(rec.outbound().await.is_empty());
    }

    #[tokio::test]
    async fn send_failures_are_swallowed() {
        let rec = Arc::new(RecordingMessenger::failing());
        let n = Notifier::new(rec, Some(ChatId(-100)), Some(ChatId(1)));

        n.log_event("x").await;
        assert!(!n.alert_owner("y").await);
    }
}
