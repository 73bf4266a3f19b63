//! Relay tickets for the hybrid variant.
//!
//! When a user sends a file, the bot forwards it to the owner's chat and
//! replies to the forwarded copy with a three-line ticket naming the user's
//! chat and the bot's status message there. The ticket is what ties the
//! owner-side copy back to the user.

use std::collections::{HashMap, VecDeque};

use tokio::sync::Mutex;

use crate::{
    domain::{ChatId, MessageId, MessageRef},
    media::IncomingFile,
    pipeline::Requester,
};

pub const TICKET_MARKER: &str = "FORWARDED_FOR_PROCESSING";
const CHAT_KEY: &str = "ORIGINAL_USER_CHAT_ID";
const STATUS_KEY: &str = "BOT_STATUS_MESSAGE_ID";

const DEFAULT_REGISTRY_CAPACITY: usize = 256;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct RelayTicket {
    pub original_chat_id: ChatId,
    pub status_message_id: MessageId,
}

#[derive(Debug, PartialEq, Eq, thiserror::Error)]
pub enum TicketError {
    #[error("ticket has {0} line(s), expected 3")]
    TooShort(usize),

    #[error("ticket line {line} is malformed: {text}")]
    Malformed { line: usize, text: String },
}

impl RelayTicket {
    pub fn new(original_chat_id: ChatId, status_message_id: MessageId) -> Self {
        Self {
            original_chat_id,
            status_message_id,
        }
    }

    /// Where the pipeline should report progress.
    pub fn status_ref(&self) -> MessageRef {
        MessageRef::new(self.original_chat_id, self.status_message_id)
    }

    pub fn encode(&self) -> String {
        format!(
            "{TICKET_MARKER}\n{CHAT_KEY}:{}\n{STATUS_KEY}:{}",
            self.original_chat_id.0, self.status_message_id.0
        )
    }

    /// `Ok(None)` for ordinary text, `Err` for text that claims to be a
    /// ticket but cannot be read.
    pub fn parse(text: &str) -> Result<Option<Self>, TicketError> {
        if !text.starts_with(TICKET_MARKER) {
            return Ok(None);
        }

        let lines: Vec<&str> = text.lines().collect();
        if lines.len() < 3 {
            return Err(TicketError::TooShort(lines.len()));
        }

        let chat: i64 = value_after_colon(lines[1], 1)?;
        let status: i32 = value_after_colon(lines[2], 2)?;

        Ok(Some(Self::new(ChatId(chat), MessageId(status))))
    }
}

fn value_after_colon<T: std::str::FromStr>(line: &str, idx: usize) -> Result<T, TicketError> {
    let malformed = || TicketError::Malformed {
        line: idx + 1,
        text: line.to_string(),
    };
    let raw = line.split(':').nth(1).ok_or_else(malformed)?;
    raw.trim().parse::<T>().map_err(|_| malformed())
}

/// A relay job the owner can retry: the ticket, the file it describes and
/// the user who sent it.
#[derive(Clone, Debug)]
pub struct RelayJob {
    pub ticket: RelayTicket,
    pub file: IncomingFile,
    pub requester: Option<Requester>,
}

/// Bounded map from ticket message to relay job. Oldest entries are evicted first.
pub struct JobRegistry {
    capacity: usize,
    inner: Mutex<RegistryInner>,
}

#[derive(Default)]
struct RegistryInner {
    order: VecDeque<MessageRef>,
    jobs: HashMap<MessageRef, RelayJob>,
}

impl Default for JobRegistry {
    fn default() -> Self {
        Self::with_capacity(DEFAULT_REGISTRY_CAPACITY)
    }
}

impl JobRegistry {
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            capacity: capacity.max(1),
            inner: Mutex::new(RegistryInner::default()),
        }
    }

    pub async fn register(&self, ticket_msg: MessageRef, job: RelayJob) {
        let mut inner = self.inner.lock().await;
        if inner.jobs.insert(ticket_msg, job).is_none() {
            inner.order.push_back(ticket_msg);
        }
        while inner.order.len() > self.capacity {
            if let Some(old) = inner.order.pop_front() {
                inner.jobs.remove(&old);
            }
        }
    }

    pub async fn get(&self, ticket_msg: MessageRef) -> Option<RelayJob> {
        self.inner.lock().await.jobs.get(&ticket_msg).cloned()
    }

    pub async fn len(&self) -> usize {
        self.inner.lock().await.jobs.len()
    }
}
