//! Push delivery to both providers.

use crate::expo_sender::{ExpoClient, ExpoSendSummary};
use crate::fcm_sender::{token_prefix, FcmClient, FcmError};
use crate::models::{ExpoMessage, FcmPayload};
use tracing::{debug, info, warn};

/// Everything one message should be pushed to, already deduplicated.
#[derive(Debug, Default, Clone)]
pub struct PushBatch {
    pub fcm: Vec<(String, FcmPayload)>,
    pub expo: Vec<ExpoMessage>,
}

impl PushBatch {
    pub fn is_empty(&self) -> bool {
        self.fcm.is_empty() && self.expo.is_empty()
    }
}

#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct FcmSendSummary {
    pub attempted: usize,
    pub succeeded: usize,
    pub unregistered: usize,
}

/// Sends the FCM part of a batch in one call. Per-token failures are counted
/// and logged; unregistered tokens are left in place.
pub async fn dispatch_fcm(client: &FcmClient, messages: &[(String, FcmPayload)]) -> FcmSendSummary {
    if messages.is_empty() {
        debug!("No FCM tokens to send to");
        return FcmSendSummary::default();
    }

    let results = client.send_batch(messages).await;
    let mut summary = FcmSendSummary {
        attempted: messages.len(),
        ..Default::default()
    };
    for (token, result) in &results {
        match result {
            Ok(()) => summary.succeeded += 1,
            Err(FcmError::TokenNotRegistered) => {
                summary.unregistered += 1;
                debug!(token_prefix = token_prefix(token), "FCM token is no longer registered");
            }
            Err(e) => {
                debug!(token_prefix = token_prefix(token), error = %e, "FCM send failed for token");
            }
        }
    }

    if summary.unregistered > 0 {
        warn!(count = summary.unregistered, "FCM reported unregistered tokens");
    }
    info!(
        success = summary.succeeded,
        total = summary.attempted,
        "FCM push dispatch finished"
    );
    summary
}

pub async fn dispatch_expo(client: &ExpoClient, messages: &[ExpoMessage]) -> ExpoSendSummary {
    if messages.is_empty() {
        debug!("No Expo tokens to send to");
        return ExpoSendSummary::default();
    }
    client.send_all(messages).await
}

/// Runs both providers concurrently. Neither waits on the other's outcome.
pub async fn dispatch(
    fcm: &FcmClient,
    expo: &ExpoClient,
    batch: &PushBatch,
) -> (FcmSendSummary, ExpoSendSummary) {
    tokio::join!(dispatch_fcm(fcm, &batch.fcm), dispatch_expo(expo, &batch.expo))
}
