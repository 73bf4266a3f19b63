//! Telegram update handlers.
//!
//! Commands go to `commands`, file-bearing messages to `file`. Anything else
//! in a private chat gets the "unsupported" reply.

use std::sync::Arc;

use teloxide::types::Message;

use fub_core::{
    domain::{ChatId, MessageId},
    texts,
};

use crate::router::AppState;

mod commands;
mod file;
#[cfg(test)]
mod testing;

pub type HandlerResult = anyhow::Result<()>;

pub async fn handle_message(msg: Message, state: Arc<AppState>) -> HandlerResult {
    if let Some(text) = msg.text() {
        if text.starts_with('/') && commands::handle_command(&msg, text, &state).await? {
            return Ok(());
        }
    }

    if let Some(incoming) = file::incoming_file(&msg) {
        return file::handle_file(&msg, incoming, &state).await;
    }

    if msg.chat.is_private() {
        state
            .messenger
            .reply_html(
                ChatId(msg.chat.id.0),
                MessageId(msg.id.0),
                &texts::unsupported_message(),
            )
            .await?;
    }

    Ok(())
}
