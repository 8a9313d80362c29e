use chrono::{DateTime, Utc};
use thiserror::Error;

use crate::config::AlertConfig;
use crate::monitor::alerting::{check_alerting, AlertDecision};
use crate::monitor::snapshot::{apply_poll, PollOutcome};
use crate::services::queue_source::{QueueSource, QueueSourceError};
use crate::services::webhook::Notifier;
use crate::store::{Store, StoreError};

#[derive(Debug, Error)]
pub enum PollError {
    #[error("queue listing failed: {0}")]
    Source(#[from] QueueSourceError),
    #[error("store error: {0}")]
    Store(#[from] StoreError),
}

#[derive(Debug)]
pub struct PollTick {
    pub outcome: PollOutcome,
    pub alert: AlertDecision,
}

/// One poll: fetch the live queue, reconcile the ledger, then evaluate alerts
/// against the same listing.
pub async fn poll_once<S, N>(
    store: &Store,
    source: &S,
    notifier: &N,
    alerting: &AlertConfig,
    now: DateTime<Utc>,
) -> Result<PollTick, PollError>
where
    S: QueueSource,
    N: Notifier,
{
    let items = source.fetch_queue().await?;
    let outcome = apply_poll(store, &items, now)?;
    let alert = check_alerting(
        store,
        notifier,
        alerting,
        &items,
        &outcome.pending_in_queue,
        now,
    )
    .await?;
    Ok(PollTick { outcome, alert })
}

pub async fn run<S, N>(store: &Store, source: &S, notifier: &N, alerting: &AlertConfig)
where
    S: QueueSource,
    N: Notifier,
{
    tracing::debug!("queue_poll: start");
    match poll_once(store, source, notifier, alerting, Utc::now()).await {
        Ok(tick) => tracing::info!(
            queue_length = tick.outcome.queue_length,
            newly_tracked = tick.outcome.newly_tracked,
            resolved = tick.outcome.resolved.len(),
            alert = ?tick.alert,
            "queue_poll: done"
        ),
        Err(PollError::Source(QueueSourceError::NotConfigured)) => {
            tracing::debug!("queue_poll: no queue source configured, skipping")
        }
        Err(PollError::Source(e)) => {
            tracing::warn!(error = %e, "queue_poll: listing unavailable, tick skipped")
        }
        Err(e) => tracing::error!(error = %e, "queue_poll failed"),
    }
}
