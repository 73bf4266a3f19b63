use async_trait::async_trait;

use crate::{
    domain::{ChatId, MessageId, MessageRef},
    Result,
};

/// Outbound messaging port.
///
/// Telegram is the only implementation; handlers and the upload pipeline talk
/// to this trait so they can be exercised with in-memory fakes.
#[async_trait]
pub trait MessagingPort: Send + Sync {
    async fn send_html(&self, chat_id: ChatId, html: &str) -> Result<MessageRef>;

    async fn reply_html(
        &self,
        chat_id: ChatId,
        reply_to: MessageId,
        html: &str,
    ) -> Result<MessageRef>;

    /// Edit a message in place. Link previews are disabled: status messages
    /// end up carrying download links.
    async fn edit_html(&self, msg: MessageRef, html: &str) -> Result<()>;

    /// Forward `msg` into `to`, returning the copy.
    async fn forward_message(&self, to: ChatId, msg: MessageRef) -> Result<MessageRef>;
}
