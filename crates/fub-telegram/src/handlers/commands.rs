use fub_core::{
    config::Variant,
    domain::{ChatId, MessageId, MessageRef},
    media::size_mb,
    pipeline::UploadJob,
    relay::RelayTicket,
    texts,
};
use teloxide::types::Message;

use crate::router::AppState;

fn parse_command(text: &str) -> (String, String) {
    // Telegram may send `/cmd@botname arg1 ...`
    let mut parts = text.trim().splitn(2, char::is_whitespace);
    let first = parts.next().unwrap_or("").trim();
    let rest = parts.next().unwrap_or("").trim().to_string();

    let cmd = first
        .trim_start_matches('/')
        .split('@')
        .next()
        .unwrap_or("")
        .to_lowercase();

    (cmd, rest)
}

/// Returns `false` for commands this bot does not know, so the caller can
/// treat the message like any other text.
pub(super) async fn handle_command(
    msg: &Message,
    text: &str,
    state: &AppState,
) -> anyhow::Result<bool> {
    let (cmd, _args) = parse_command(text);
    match cmd.as_str() {
        "start" => handle_start(msg, state).await?,
        "help" => handle_help(msg, state).await?,
        "retry" => handle_retry(msg, state).await?,
        _ => return Ok(false),
    }
    Ok(true)
}

async fn handle_start(msg: &Message, state: &AppState) -> anyhow::Result<()> {
    let chat = ChatId(msg.chat.id.0);
    let (user_id, first_name) = msg
        .from()
        .map(|u| (u.id.0 as i64, u.first_name.clone()))
        .unwrap_or((chat.0, String::new()));

    match state.cfg.variant {
        Variant::Simple => {
            state
                .messenger
                .reply_html(chat, MessageId(msg.id.0), &texts::greeting_simple(&first_name))
                .await?;
            state
                .notifier
                .log_event(&format!("User {first_name} (ID: {user_id}) started the bot."))
                .await;
        }
        Variant::Hybrid => {
            state
                .messenger
                .reply_html(
                    chat,
                    MessageId(msg.id.0),
                    &texts::greeting_hybrid(user_id, &first_name),
                )
                .await?;
        }
    }
    Ok(())
}

async fn handle_help(msg: &Message, state: &AppState) -> anyhow::Result<()> {
    let max_mb = size_mb(state.cfg.max_download_bytes).round() as u64;
    state
        .messenger
        .reply_html(
            ChatId(msg.chat.id.0),
            MessageId(msg.id.0),
            &texts::help(state.pipeline.host_name(), max_mb),
        )
        .await?;
    Ok(())
}

/// `/retry` in reply to a relay ticket re-runs the job behind it.
async fn handle_retry(msg: &Message, state: &AppState) -> anyhow::Result<()> {
    let chat = ChatId(msg.chat.id.0);
    let reply_to = MessageId(msg.id.0);
    let from_owner = msg
        .from()
        .is_some_and(|u| Some(u.id.0 as i64) == state.cfg.owner_id);
    if !from_owner {
        state
            .messenger
            .reply_html(chat, reply_to, &texts::unauthorized())
            .await?;
        return Ok(());
    }

    let ticket = msg
        .reply_to_message()
        .and_then(|m| m.text().map(|t| (m.id, t)))
        .and_then(|(id, t)| match RelayTicket::parse(t) {
            Ok(Some(ticket)) => Some((id, ticket)),
            Ok(None) => None,
            Err(e) => {
                tracing::warn!(error = %e, "malformed relay ticket");
                None
            }
        });
    let Some((ticket_id, ticket)) = ticket else {
        state
            .messenger
            .reply_html(chat, reply_to, &texts::retry_usage())
            .await?;
        return Ok(());
    };

    let Some(job) = state
        .registry
        .get(MessageRef::new(chat, MessageId(ticket_id.0)))
        .await
    else {
        state
            .messenger
            .reply_html(chat, reply_to, &texts::retry_unknown())
            .await?;
        return Ok(());
    };

    tracing::info!(
        original_chat = ticket.original_chat_id.0,
        file = %job.file.display_name(),
        "retrying relay job"
    );
    state
        .messenger
        .reply_html(chat, reply_to, &texts::retry_started())
        .await?;
    state.pipeline.spawn(UploadJob {
        file: job.file,
        status: ticket.status_ref(),
        requester: job.requester,
    });
    Ok(())
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use fub_core::{
        domain::UserId,
        media::{IncomingFile, MediaKind},
        pipeline::Requester,
        relay::RelayJob,
        test_support::Outbound,
    };

    use super::*;
    use crate::handlers::testing::{message, Harness, HYBRID_ENV};

    const LOG_CHANNEL: ChatId = ChatId(-100777);

    async fn run(h: &Harness, msg: Message) {
        let text = msg.text().unwrap().to_string();
        assert!(handle_command(&msg, &text, &h.state).await.unwrap());
    }

    fn hybrid_owner_env() -> Vec<(&'static str, &'static str)> {
        let mut env = HYBRID_ENV.to_vec();
        env.push(("OWNER_ID", "99"));
        env.push(("LOG_CHANNEL_ID", "-100777"));
        env
    }

    /// `/retry` from `user` in their private chat, replying to message
    /// `ticket_id` with `ticket_text`.
    fn retry_from(user: i64, ticket_id: i32, ticket_text: &str) -> Message {
        message(
            user,
            user,
            serde_json::json!({
                "text": "/retry",
                "reply_to_message": {
                    "message_id": ticket_id,
                    "date": 1700000000,
                    "chat": { "id": user, "type": "private", "first_name": "Rafi" },
                    "from": { "id": 42, "is_bot": true, "first_name": "fub" },
                    "text": ticket_text
                }
            }),
        )
    }

    fn relay_job() -> RelayJob {
        RelayJob {
            ticket: RelayTicket::new(ChatId(5), MessageId(1)),
            file: IncomingFile {
                kind: MediaKind::Document,
                file_id: "F".to_string(),
                unique_id: "U".to_string(),
                file_name: Some("report.pdf".to_string()),
                size: Some(2048),
            },
            requester: Some(Requester {
                user_id: UserId(5),
                name: "Rafi".to_string(),
            }),
        }
    }

    #[test]
    fn parses_bare_and_addressed_commands() {
        assert_eq!(parse_command("/start"), ("start".to_string(), String::new()));
        assert_eq!(
            parse_command("/Help@file_upload_bot  now please"),
            ("help".to_string(), "now please".to_string())
        );
        assert_eq!(parse_command("  /retry\n"), ("retry".to_string(), String::new()));
    }

    #[tokio::test]
    async fn unknown_commands_are_left_to_the_caller() {
        let h = Harness::new(&[("BOT_TOKEN", "t")]);
        let msg = message(5, 5, serde_json::json!({ "text": "/dance" }));
        assert!(!handle_command(&msg, "/dance", &h.state).await.unwrap());
        assert!(h.messenger.outbound().await.is_empty());
    }

    #[tokio::test]
    async fn start_in_simple_mode_greets_and_logs() {
        let h = Harness::new(&[("BOT_TOKEN", "t"), ("LOG_CHANNEL_ID", "-100777")]);
        run(&h, message(5, 5, serde_json::json!({ "text": "/start" }))).await;

        assert_eq!(
            h.messenger.sends_to(ChatId(5)).await,
            vec![texts::greeting_simple("Rafi")]
        );
        assert_eq!(
            h.messenger.sends_to(LOG_CHANNEL).await,
            vec!["User Rafi (ID: 5) started the bot.".to_string()]
        );
    }

    #[tokio::test]
    async fn start_in_hybrid_mode_mentions_the_user() {
        let h = Harness::new(&hybrid_owner_env());
        run(&h, message(5, 5, serde_json::json!({ "text": "/start" }))).await;

        let replies = h.messenger.sends_to(ChatId(5)).await;
        assert_eq!(replies.len(), 1);
        assert!(replies[0].contains(r#"<a href="tg://user?id=5">Rafi</a>"#));
        assert!(h.messenger.sends_to(LOG_CHANNEL).await.is_empty());
    }

    #[tokio::test]
    async fn retry_is_owner_only() {
        let mut h = Harness::new(&hybrid_owner_env());
        h.state
            .registry
            .register(MessageRef::new(ChatId(5), MessageId(3)), relay_job())
            .await;
        run(&h, retry_from(5, 3, &relay_job().ticket.encode())).await;

        assert_eq!(h.messenger.sends_to(ChatId(5)).await, vec![texts::unauthorized()]);
        assert!(h.next_download(Duration::from_millis(200)).await.is_none());
    }

    #[tokio::test]
    async fn retry_needs_a_ticket_to_reply_to() {
        let h = Harness::new(&hybrid_owner_env());
        run(&h, message(99, 99, serde_json::json!({ "text": "/retry" }))).await;
        run(&h, retry_from(99, 3, "just a note")).await;

        assert_eq!(
            h.messenger.sends_to(ChatId(99)).await,
            vec![texts::retry_usage(), texts::retry_usage()]
        );
    }

    #[tokio::test]
    async fn retry_of_an_unregistered_ticket_reports_it_missing() {
        let h = Harness::new(&hybrid_owner_env());
        run(&h, retry_from(99, 3, &relay_job().ticket.encode())).await;

        assert_eq!(
            h.messenger.sends_to(ChatId(99)).await,
            vec![texts::retry_unknown()]
        );
    }

    #[tokio::test]
    async fn retry_reruns_the_job_for_the_original_user() {
        let mut h = Harness::new(&hybrid_owner_env());
        let job = relay_job();
        let ticket = job.ticket;
        h.state
            .registry
            .register(MessageRef::new(ChatId(99), MessageId(3)), job)
            .await;

        run(&h, retry_from(99, 3, &ticket.encode())).await;

        assert_eq!(
            h.messenger.sends_to(ChatId(99)).await,
            vec![texts::retry_started()]
        );
        let again = h.next_download(Duration::from_secs(2)).await.unwrap();
        assert_eq!(again.file_name.as_deref(), Some("report.pdf"));
        assert!(h.wait_for_send(LOG_CHANNEL, "for user Rafi (ID: 5)").await);
        assert!(h
            .messenger
            .outbound()
            .await
            .iter()
            .any(|o| matches!(o, Outbound::Edit { msg, .. } if *msg == ticket.status_ref())));
    }
}
