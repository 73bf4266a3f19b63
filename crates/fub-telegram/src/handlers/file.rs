//! Incoming files: gate them, then either upload in place (simple variant)
//! or relay them through the owner (hybrid variant).

use teloxide::types::{Message, User};

use fub_core::{
    audit::AuditEvent,
    config::Variant,
    domain::{ChatId, MessageId, MessageRef, UserId},
    formatting::escape_html,
    media::{IncomingFile, MediaKind},
    pipeline::{Requester, UploadJob},
    relay::{RelayJob, RelayTicket},
    security::is_authorized,
    texts,
};

use crate::router::AppState;

/// Describe the file attached to `msg`, if it is one we upload.
/// Photos use the largest available size.
pub(super) fn incoming_file(msg: &Message) -> Option<IncomingFile> {
    if let Some(doc) = msg.document() {
        return Some(IncomingFile {
            kind: MediaKind::Document,
            file_id: doc.file.id.clone(),
            unique_id: doc.file.unique_id.clone(),
            file_name: doc.file_name.clone(),
            size: Some(u64::from(doc.file.size)),
        });
    }
    if let Some(photo) = msg.photo().and_then(|sizes| sizes.last()) {
        return Some(IncomingFile {
            kind: MediaKind::Photo,
            file_id: photo.file.id.clone(),
            unique_id: photo.file.unique_id.clone(),
            file_name: None,
            size: Some(u64::from(photo.file.size)),
        });
    }
    if let Some(video) = msg.video() {
        return Some(IncomingFile {
            kind: MediaKind::Video,
            file_id: video.file.id.clone(),
            unique_id: video.file.unique_id.clone(),
            file_name: video.file_name.clone(),
            size: Some(u64::from(video.file.size)),
        });
    }
    if let Some(audio) = msg.audio() {
        return Some(IncomingFile {
            kind: MediaKind::Audio,
            file_id: audio.file.id.clone(),
            unique_id: audio.file.unique_id.clone(),
            file_name: audio.file_name.clone(),
            size: Some(u64::from(audio.file.size)),
        });
    }
    None
}

fn requester(user: &User) -> Requester {
    Requester {
        user_id: UserId(user.id.0 as i64),
        name: user.first_name.clone(),
    }
}

pub(super) async fn handle_file(
    msg: &Message,
    file: IncomingFile,
    state: &AppState,
) -> anyhow::Result<()> {
    if state.cfg.variant == Variant::Hybrid && !msg.chat.is_private() {
        return Ok(());
    }

    let chat = ChatId(msg.chat.id.0);
    let msg_id = MessageId(msg.id.0);
    let user = msg.from().map(requester);

    if !passes_gates(chat, msg_id, user.as_ref(), &file, state).await? {
        return Ok(());
    }

    tracing::info!(
        chat_id = chat.0,
        user_id = user.as_ref().map(|u| u.user_id.0),
        kind = file.kind.label(),
        file = %file.display_name(),
        size = file.size,
        "file received"
    );

    match state.cfg.variant {
        Variant::Simple => upload_in_place(chat, msg_id, file, user, state).await,
        Variant::Hybrid => relay(chat, msg_id, file, user, state).await,
    }
}

/// Allow-list, rate limit and size cap. Replies to the user and returns
/// `false` when the file is turned away. The owner skips the first two.
async fn passes_gates(
    chat: ChatId,
    msg_id: MessageId,
    user: Option<&Requester>,
    file: &IncomingFile,
    state: &AppState,
) -> anyhow::Result<bool> {
    let is_owner = user.is_some_and(|u| Some(u.user_id.0) == state.cfg.owner_id);

    if !is_owner {
        if !is_authorized(user.map(|u| u.user_id), &state.cfg.allowed_users) {
            if let Some(u) = user {
                state.audit.record(AuditEvent::auth(u.user_id.0, &u.name, false));
            }
            tracing::warn!(chat_id = chat.0, "unauthorized upload attempt");
            state
                .messenger
                .reply_html(chat, msg_id, &texts::unauthorized())
                .await?;
            return Ok(false);
        }

        if let Some(u) = user {
            let (allowed, retry_after) = state.rate_limiter.lock().await.check(u.user_id);
            if !allowed {
                let secs = retry_after.map(|d| d.as_secs_f64()).unwrap_or(0.0);
                state
                    .audit
                    .record(AuditEvent::rate_limit(u.user_id.0, &u.name, secs));
                state
                    .messenger
                    .reply_html(chat, msg_id, &texts::rate_limited(secs))
                    .await?;
                return Ok(false);
            }
        }
    }

    if let Some(size) = file.size.filter(|_| file.exceeds(state.cfg.max_download_bytes)) {
        state
            .messenger
            .reply_html(
                chat,
                msg_id,
                &texts::too_large(&file.display_name(), size, state.cfg.max_download_bytes),
            )
            .await?;
        return Ok(false);
    }

    Ok(true)
}

async fn upload_in_place(
    chat: ChatId,
    msg_id: MessageId,
    file: IncomingFile,
    user: Option<Requester>,
    state: &AppState,
) -> anyhow::Result<()> {
    let status = state
        .messenger
        .reply_html(
            chat,
            msg_id,
            &texts::received_simple(&file.display_name(), state.pipeline.host_name()),
        )
        .await?;

    state.pipeline.spawn(UploadJob {
        file,
        status,
        requester: user,
    });
    Ok(())
}

async fn relay(
    chat: ChatId,
    msg_id: MessageId,
    file: IncomingFile,
    user: Option<Requester>,
    state: &AppState,
) -> anyhow::Result<()> {
    let Some(owner) = state.notifier.owner() else {
        tracing::error!(chat_id = chat.0, "hybrid mode without OWNER_ID, cannot relay");
        state
            .messenger
            .reply_html(chat, msg_id, &texts::owner_missing())
            .await?;
        return Ok(());
    };

    if user.as_ref().map(|u| u.user_id.0) == Some(owner.0) {
        let status = state
            .messenger
            .reply_html(chat, msg_id, &texts::processing_own_file())
            .await?;
        state.pipeline.spawn(UploadJob {
            file,
            status,
            requester: user,
        });
        return Ok(());
    }

    let status = state
        .messenger
        .reply_html(chat, msg_id, &texts::received_hybrid())
        .await?;

    let ticket = RelayTicket::new(chat, status.message_id);
    let ticket_msg = match forward_with_ticket(owner, MessageRef::new(chat, msg_id), &ticket, state).await {
        Ok(m) => m,
        Err(e) => {
            tracing::error!(chat_id = chat.0, error = %e, "failed to relay file to owner");
            state
                .messenger
                .edit_html(status, &texts::relay_failed(&e.to_string()))
                .await?;
            return Ok(());
        }
    };

    state
        .registry
        .register(
            ticket_msg,
            RelayJob {
                ticket,
                file: file.clone(),
                requester: user.clone(),
            },
        )
        .await;

    if let Err(e) = state.messenger.edit_html(status, &texts::relayed()).await {
        tracing::warn!(chat_id = chat.0, error = %e, "could not update status message");
    }

    state.pipeline.spawn(UploadJob {
        file,
        status,
        requester: user,
    });
    Ok(())
}

/// Forward the user's message to the owner and reply to the copy with the
/// ticket. Returns the ticket message.
async fn forward_with_ticket(
    owner: ChatId,
    original: MessageRef,
    ticket: &RelayTicket,
    state: &AppState,
) -> fub_core::Result<MessageRef> {
    let forwarded = state.messenger.forward_message(owner, original).await?;
    state
        .messenger
        .reply_html(owner, forwarded.message_id, &escape_html(&ticket.encode()))
        .await
}
