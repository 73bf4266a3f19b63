//! Telegram adapter (teloxide).
//!
//! Implements the `fub-core` messaging and media ports over the Bot API and
//! hosts the update dispatcher.

use std::path::Path;

use async_trait::async_trait;

use teloxide::{net::Download, prelude::*, types::ParseMode};

use tokio::{io::AsyncWriteExt, time::sleep};

pub mod handlers;
pub mod router;

use fub_core::{
    domain::{ChatId, MessageId, MessageRef},
    errors::Error,
    media::IncomingFile,
    messaging::port::MessagingPort,
    ports::MediaSource,
    Result,
};

pub(crate) fn tg_chat(chat_id: ChatId) -> teloxide::types::ChatId {
    teloxide::types::ChatId(chat_id.0)
}

pub(crate) fn tg_msg_id(message_id: MessageId) -> teloxide::types::MessageId {
    teloxide::types::MessageId(message_id.0)
}

fn map_err(e: teloxide::RequestError) -> Error {
    Error::Telegram(e.to_string())
}

async fn with_retry<T, Fut>(mut op: impl FnMut() -> Fut) -> Result<T>
where
    Fut: std::future::IntoFuture<Output = std::result::Result<T, teloxide::RequestError>>,
    Fut::IntoFuture: Send,
{
    const MAX_RETRIES: usize = 1;
    let mut attempts = 0usize;
    loop {
        match op().await {
            Ok(v) => return Ok(v),
            Err(teloxide::RequestError::RetryAfter(d)) if attempts < MAX_RETRIES => {
                attempts += 1;
                tracing::warn!(retry_after = ?d, "telegram flood control, retrying once");
                sleep(d).await;
            }
            Err(other) => return Err(map_err(other)),
        }
    }
}

#[derive(Clone)]
pub struct TelegramMessenger {
    bot: Bot,
}

impl TelegramMessenger {
    pub fn new(bot: Bot) -> Self {
        Self { bot }
    }
}

#[async_trait]
impl MessagingPort for TelegramMessenger {
    async fn send_html(&self, chat_id: ChatId, html: &str) -> Result<MessageRef> {
        let msg = with_retry(|| {
            self.bot
                .send_message(tg_chat(chat_id), html.to_string())
                .parse_mode(ParseMode::Html)
        })
        .await?;

        Ok(MessageRef::new(chat_id, MessageId(msg.id.0)))
    }

    async fn reply_html(
        &self,
        chat_id: ChatId,
        reply_to: MessageId,
        html: &str,
    ) -> Result<MessageRef> {
        let msg = with_retry(|| {
            self.bot
                .send_message(tg_chat(chat_id), html.to_string())
                .parse_mode(ParseMode::Html)
                .reply_to_message_id(tg_msg_id(reply_to))
        })
        .await?;

        Ok(MessageRef::new(chat_id, MessageId(msg.id.0)))
    }

    async fn edit_html(&self, msg: MessageRef, html: &str) -> Result<()> {
        with_retry(|| {
            self.bot
                .edit_message_text(
                    tg_chat(msg.chat_id),
                    tg_msg_id(msg.message_id),
                    html.to_string(),
                )
                .parse_mode(ParseMode::Html)
                .disable_web_page_preview(true)
        })
        .await?;
        Ok(())
    }

    async fn forward_message(&self, to: ChatId, msg: MessageRef) -> Result<MessageRef> {
        let copy = with_retry(|| {
            self.bot
                .forward_message(tg_chat(to), tg_chat(msg.chat_id), tg_msg_id(msg.message_id))
        })
        .await?;

        Ok(MessageRef::new(to, MessageId(copy.id.0)))
    }
}

/// Fetches incoming files through the Bot API (`getFile` + file download).
///
/// A local Bot API server (`--local`) answers `getFile` with an absolute path
/// on its own disk; when that path is visible to us the file is copied
/// instead of downloaded.
#[derive(Clone)]
pub struct BotMediaSource {
    bot: Bot,
}

impl BotMediaSource {
    pub fn new(bot: Bot) -> Self {
        Self { bot }
    }
}

#[async_trait]
impl MediaSource for BotMediaSource {
    async fn download(&self, file: &IncomingFile, dest: &Path) -> Result<u64> {
        let meta = with_retry(|| self.bot.get_file(file.file_id.clone())).await?;

        let local = Path::new(&meta.path);
        if local.is_absolute() && tokio::fs::try_exists(local).await.unwrap_or(false) {
            tracing::debug!(path = %meta.path, "copying file from local Bot API server");
            return Ok(tokio::fs::copy(local, dest).await?);
        }

        let mut out = tokio::fs::File::create(dest).await?;
        self.bot
            .download_file(&meta.path, &mut out)
            .await
            .map_err(|e| Error::Download {
                path: dest.to_path_buf(),
                reason: e.to_string(),
            })?;
        out.flush().await?;

        Ok(tokio::fs::metadata(dest).await?.len())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn bot_for(server: &mockito::ServerGuard) -> Bot {
        let url = reqwest::Url::parse(&server.url()).unwrap();
        Bot::new("123:TEST").set_api_url(url)
    }

    fn sent_message(chat_id: i64, message_id: i32) -> String {
        serde_json::json!({
            "ok": true,
            "result": {
                "message_id": message_id,
                "date": 1700000000,
                "chat": { "id": chat_id, "type": "private", "first_name": "A" },
                "text": "ok"
            }
        })
        .to_string()
    }

    #[tokio::test]
    async fn send_html_returns_the_new_message_ref() {
        let mut server = mockito::Server::new_async().await;
        let m = server
            .mock("POST", mockito::Matcher::Regex("(?i)/bot123:TEST/sendmessage$".to_string()))
            .match_body(mockito::Matcher::Regex("HTML".to_string()))
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(sent_message(7, 42))
            .create_async()
            .await;

        let messenger = TelegramMessenger::new(bot_for(&server));
        let sent = messenger.send_html(ChatId(7), "<b>hi</b>").await.unwrap();

        m.assert_async().await;
        assert_eq!(sent, MessageRef::new(ChatId(7), MessageId(42)));
    }

    #[tokio::test]
    async fn forward_reports_the_copy_in_the_target_chat() {
        let mut server = mockito::Server::new_async().await;
        let _m = server
            .mock("POST", mockito::Matcher::Regex("(?i)/forwardmessage$".to_string()))
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(sent_message(99, 5))
            .create_async()
            .await;

        let messenger = TelegramMessenger::new(bot_for(&server));
        let copy = messenger
            .forward_message(ChatId(99), MessageRef::new(ChatId(7), MessageId(3)))
            .await
            .unwrap();

        assert_eq!(copy, MessageRef::new(ChatId(99), MessageId(5)));
    }

    #[tokio::test]
    async fn api_errors_map_to_telegram_error() {
        let mut server = mockito::Server::new_async().await;
        let _m = server
            .mock("POST", mockito::Matcher::Any)
            .with_status(400)
            .with_header("content-type", "application/json")
            .with_body(r#"{"ok":false,"error_code":400,"description":"Bad Request: chat not found"}"#)
            .create_async()
            .await;

        let messenger = TelegramMessenger::new(bot_for(&server));
        let err = messenger.send_html(ChatId(1), "x").await.unwrap_err();
        assert!(matches!(err, Error::Telegram(_)));
    }
}
