//! In-memory fakes shared by the unit tests of this crate and, through the
//! `test-support` feature, the adapter crates.

use std::sync::atomic::{AtomicBool, AtomicI32, Ordering};

use async_trait::async_trait;
use tokio::sync::Mutex;

use crate::{
    domain::{ChatId, MessageId, MessageRef},
    errors::Error,
    messaging::port::MessagingPort,
    Result,
};

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Outbound {
    Send { chat: ChatId, html: String },
    Reply { chat: ChatId, reply_to: MessageId, html: String },
    Edit { msg: MessageRef, html: String },
    Forward { to: ChatId, msg: MessageRef },
}

/// Records every outbound call and hands out increasing message ids.
#[derive(Default)]
pub struct RecordingMessenger {
    log: Mutex<Vec<Outbound>>,
    next_id: AtomicI32,
    fail_sends: AtomicBool,
    fail_forwards: AtomicBool,
}

impl RecordingMessenger {
    pub fn failing() -> Self {
        let m = Self::default();
        m.fail_sends.store(true, Ordering::SeqCst);
        m
    }

    /// Sends and edits succeed; forwarding fails like a deleted message.
    pub fn failing_forwards() -> Self {
        let m = Self::default();
        m.fail_forwards.store(true, Ordering::SeqCst);
        m
    }

    pub async fn outbound(&self) -> Vec<Outbound> {
        self.log.lock().await.clone()
    }

    pub async fn edits(&self) -> Vec<String> {
        self.log
            .lock()
            .await
            .iter()
            .filter_map(|o| match o {
                Outbound::Edit { html, .. } => Some(html.clone()),
                _ => None,
            })
            .collect()
    }

    pub async fn sends_to(&self, chat: ChatId) -> Vec<String> {
        self.log
            .lock()
            .await
            .iter()
            .filter_map(|o| match o {
                Outbound::Send { chat: c, html } if *c == chat => Some(html.clone()),
                Outbound::Reply { chat: c, html, .. } if *c == chat => Some(html.clone()),
                _ => None,
            })
            .collect()
    }

    fn next(&self, chat: ChatId) -> MessageRef {
        let id = self.next_id.fetch_add(1, Ordering::SeqCst) + 1;
        MessageRef::new(chat, MessageId(id))
    }

    fn check(&self) -> Result<()> {
        if self.fail_sends.load(Ordering::SeqCst) {
            return Err(Error::Telegram("chat not found".to_string()));
        }
        Ok(())
    }
}

#[async_trait]
impl MessagingPort for RecordingMessenger {
    async fn send_html(&self, chat_id: ChatId, html: &str) -> Result<MessageRef> {
        self.check()?;
        self.log.lock().await.push(Outbound::Send {
            chat: chat_id,
            html: html.to_string(),
        });
        Ok(self.next(chat_id))
    }

    async fn reply_html(
        &self,
        chat_id: ChatId,
        reply_to: MessageId,
        html: &str,
    ) -> Result<MessageRef> {
        self.check()?;
        self.log.lock().await.push(Outbound::Reply {
            chat: chat_id,
            reply_to,
            html: html.to_string(),
        });
        Ok(self.next(chat_id))
    }

    async fn edit_html(&self, msg: MessageRef, html: &str) -> Result<()> {
        self.log.lock().await.push(Outbound::Edit {
            msg,
            html: html.to_string(),
        });
        Ok(())
    }

    async fn forward_message(&self, to: ChatId, msg: MessageRef) -> Result<MessageRef> {
        self.check()?;
        if self.fail_forwards.load(Ordering::SeqCst) {
            return Err(Error::Telegram("message to forward not found".to_string()));
        }
        self.log.lock().await.push(Outbound::Forward { to, msg });
        Ok(self.next(to))
    }
}
