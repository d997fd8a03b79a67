//! The "message created" trigger.
//!
//! Delivery is at-most-once on failure: [`handle_message_created`] never
//! returns an error. Surfacing one would let the event source redeliver the
//! event and notify recipients a second time for a run that may already have
//! written records or sent pushes.

use crate::{
    dispatcher::{self, FcmSendSummary, PushBatch},
    error::Result,
    expo_sender::ExpoSendSummary,
    models::{MessageCreatedEvent, NotificationRecord},
    notifications,
    payload::{self, MessageContext, SenderDisplay},
    preferences::{self, Recipient},
    state::AppState,
    tokens::{SenderExclusion, TokenDeduplicator},
};
use chrono::Utc;
use std::sync::Arc;
use tokio::sync::mpsc::Receiver;
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, instrument, trace, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SkipReason {
    /// The event lacks a chat, sender or message id, or contradicts itself.
    InvalidEvent,
    /// An earlier delivery of this message was already handled.
    Duplicate,
    ChatMissing,
    NoRecipients,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TriggerOutcome {
    Skipped(SkipReason),
    Completed {
        recipients: usize,
        notifications_written: bool,
        fcm: FcmSendSummary,
        expo: ExpoSendSummary,
    },
    /// An unexpected error stopped the run. It has been logged.
    Failed,
}

pub async fn run(
    state: Arc<AppState>,
    mut event_rx: Receiver<MessageCreatedEvent>,
    token: CancellationToken,
) -> Result<()> {
    info!("Starting event handler...");
    let mut in_flight = JoinSet::new();

    loop {
        tokio::select! {
            biased;
            _ = token.cancelled() => {
                info!("Event handler cancellation received. Shutting down...");
                break;
            }

            maybe_event = event_rx.recv() => {
                let Some(event) = maybe_event else {
                    info!("Event channel closed. Event handler shutting down.");
                    break;
                };

                debug!(chat_id = %event.chat_id, message_id = %event.message_id, "Event handler received event");

                let state = Arc::clone(&state);
                in_flight.spawn(async move {
                    handle_message_created(&state, event).await;
                });
            }

            Some(joined) = in_flight.join_next(), if !in_flight.is_empty() => {
                if let Err(e) = joined {
                    error!(error = %e, "Trigger task panicked");
                }
            }
        }
    }

    // Let invocations that already started finish their sends.
    while let Some(joined) = in_flight.join_next().await {
        if let Err(e) = joined {
            error!(error = %e, "Trigger task panicked");
        }
    }

    info!("Event handler shut down.");
    Ok(())
}

/// Trigger entry point. Errors are logged here and never propagated.
#[instrument(skip_all, fields(chat_id = %event.chat_id, message_id = %event.message_id))]
pub async fn handle_message_created(state: &AppState, event: MessageCreatedEvent) -> TriggerOutcome {
    let chat_id = event.chat_id.clone();
    let sender_id = event.message.sender_id.clone();

    match process_message(state, event).await {
        Ok(outcome) => outcome,
        Err(e) => {
            error!(chat_id = %chat_id, sender_id = %sender_id, error = %e, "Message notification run failed");
            TriggerOutcome::Failed
        }
    }
}

async fn process_message(state: &AppState, event: MessageCreatedEvent) -> Result<TriggerOutcome> {
    let MessageCreatedEvent {
        chat_id,
        message_id,
        message,
    } = event;

    // The message body carries its own id; use it when the envelope's is blank.
    let message_id = if message_id.is_empty() {
        message.id.clone()
    } else {
        message_id
    };

    // An empty message id would be claimed once and then mark every later
    // id-less event as a redelivery.
    if chat_id.is_empty() || message.sender_id.is_empty() || message_id.is_empty() {
        warn!(chat_id = %chat_id, "Dropping message event without chat, sender or message id");
        return Ok(TriggerOutcome::Skipped(SkipReason::InvalidEvent));
    }
    if !message.chat_id.is_empty() && message.chat_id != chat_id {
        warn!(
            chat_id = %chat_id,
            message_chat_id = %message.chat_id,
            "Dropping message event whose payload belongs to another chat"
        );
        return Ok(TriggerOutcome::Skipped(SkipReason::InvalidEvent));
    }

    let store = state.store.as_ref();
    let sender_id = message.sender_id.as_str();

    match store
        .claim_message(&message_id, state.settings.service.processed_message_ttl_secs)
        .await
    {
        Ok(true) => {}
        Ok(false) => {
            debug!(chat_id = %chat_id, "Message already handled, skipping redelivery");
            return Ok(TriggerOutcome::Skipped(SkipReason::Duplicate));
        }
        Err(e) => {
            warn!(chat_id = %chat_id, error = %e, "Could not record message as handled, continuing");
        }
    }

    let (chat_result, sender_result) =
        tokio::join!(store.get_chat(&chat_id), store.get_user(sender_id));

    let Some(mut chat) = chat_result? else {
        debug!(chat_id = %chat_id, "Chat not found, nothing to notify");
        return Ok(TriggerOutcome::Skipped(SkipReason::ChatMissing));
    };
    if chat.id.is_empty() {
        chat.id = chat_id.clone();
    }

    let sender_profile = sender_result.unwrap_or_else(|e| {
        warn!(chat_id = %chat_id, sender_id = %sender_id, error = %e, "Failed to load sender profile");
        None
    });

    let is_group = preferences::is_group_chat(&chat);
    let recipients =
        preferences::load_eligible_recipients(store, &chat, sender_id, is_group).await;
    if recipients.is_empty() {
        debug!(chat_id = %chat_id, "No recipients to notify");
        return Ok(TriggerOutcome::Skipped(SkipReason::NoRecipients));
    }

    let sender = SenderDisplay::from_profile(sender_id, sender_profile.as_ref());
    let chat_display = payload::resolve_chat_display(store, &chat, is_group, &sender).await;
    let ctx = MessageContext {
        chat_id: chat_id.clone(),
        message_id: message_id.clone(),
        text: message.text.clone(),
        is_group,
        sender,
        chat: chat_display,
    };

    let exclusion = SenderExclusion::from_profile(sender_profile.as_ref());
    let (records, batch) = build_outputs(&recipients, &ctx, exclusion);
    trace!(
        chat_id = %chat_id,
        records = records.len(),
        fcm = batch.fcm.len(),
        expo = batch.expo.len(),
        "Built notification outputs"
    );

    let (notifications_written, (fcm, expo)) = tokio::join!(
        notifications::write_notifications(store, &chat_id, &records),
        dispatcher::dispatch(&state.fcm_client, &state.expo_client, &batch),
    );

    info!(
        chat_id = %chat_id,
        recipients = recipients.len(),
        fcm_sent = fcm.succeeded,
        expo_sent = expo.sent,
        "Message notifications done"
    );

    Ok(TriggerOutcome::Completed {
        recipients: recipients.len(),
        notifications_written,
        fcm,
        expo,
    })
}

/// One in-app record per recipient, plus one push per deduplicated token.
fn build_outputs(
    recipients: &[Recipient],
    ctx: &MessageContext,
    exclusion: SenderExclusion,
) -> (Vec<NotificationRecord>, PushBatch) {
    let created_at = Utc::now();
    let mut dedup = TokenDeduplicator::new(exclusion);
    let mut records = Vec::with_capacity(recipients.len());
    let mut batch = PushBatch::default();

    for recipient in recipients {
        records.push(notifications::build_record(recipient, ctx, created_at));

        let tokens = dedup.claim(&recipient.profile);
        if tokens.is_empty() {
            trace!(uid = %recipient.uid, "Recipient has no deliverable tokens");
            continue;
        }

        if !tokens.fcm.is_empty() {
            let fcm_payload = payload::build_fcm_payload(ctx, &recipient.preferences);
            batch.fcm.extend(
                tokens
                    .fcm
                    .into_iter()
                    .map(|token| (token, fcm_payload.clone())),
            );
        }
        batch.expo.extend(
            tokens
                .expo
                .iter()
                .map(|token| payload::build_expo_message(token, ctx, &recipient.preferences)),
        );
    }

    (records, batch)
}
