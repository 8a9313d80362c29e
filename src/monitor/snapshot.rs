//! Pending-item ledger maintenance from queue polls and moderation events.
//!
//! Tracking is insert-if-absent and resolution is an atomic take, so a poll and
//! an event racing on one item record at most one action delay and the earliest
//! queue-entry time always wins.

use std::collections::HashSet;

use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::monitor::events::{resolve_target, ModAction, ModActionEvent, ReportEvent};
use crate::monitor::types::{PendingItem, QueueItem, QueueReason, Target};
use crate::store::{Store, StoreError};

/// Moderator names whose removals put an item into the queue instead of
/// resolving it.
#[derive(Debug, Clone)]
pub struct FilterActors {
    pub automated: Vec<String>,
    pub platform: Vec<String>,
}

impl FilterActors {
    pub fn classify(&self, moderator: &str) -> Option<QueueReason> {
        let matches = |names: &[String]| names.iter().any(|n| n.eq_ignore_ascii_case(moderator));
        if matches(self.automated.as_slice()) {
            Some(QueueReason::AutomatedFilter)
        } else if matches(self.platform.as_slice()) {
            Some(QueueReason::UpstreamFilter)
        } else {
            None
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ResolvedItem {
    pub item_id: String,
    pub delay_seconds: i64,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PollOutcome {
    pub queue_length: usize,
    pub newly_tracked: usize,
    /// Listed items that are neither filtered nor reported.
    pub untracked: usize,
    pub resolved: Vec<ResolvedItem>,
    /// Ledger entries of the items currently in the queue.
    #[serde(skip)]
    pub pending_in_queue: Vec<PendingItem>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum EventOutcome {
    Tracked {
        #[serde(rename = "itemId")]
        item_id: String,
    },
    AlreadyTracked {
        #[serde(rename = "itemId")]
        item_id: String,
    },
    Resolved {
        #[serde(rename = "itemId")]
        item_id: String,
        #[serde(rename = "delaySeconds")]
        delay_seconds: i64,
    },
    NotTracked {
        #[serde(rename = "itemId")]
        item_id: String,
    },
    Ignored {
        reason: String,
    },
}

/// Apply one live queue listing: record its length, resolve ledger entries
/// missing from it and start tracking newly queued items.
pub fn apply_poll(
    store: &Store,
    items: &[QueueItem],
    now: DateTime<Utc>,
) -> Result<PollOutcome, StoreError> {
    store.record_queue_length(items.len() as u64, now)?;

    let listed: HashSet<&str> = items.iter().map(QueueItem::id).collect();
    let mut outcome = PollOutcome {
        queue_length: items.len(),
        ..PollOutcome::default()
    };

    // The ledger is read after the listing was fetched: an item tracked by an
    // event in between resolves here with a near-zero dwell time.
    for pending in store.list_pending_items()? {
        if listed.contains(pending.item_id.as_str()) {
            continue;
        }
        if let Some(resolved) = resolve_item(store, &pending.item_id, now)? {
            tracing::debug!(
                item_id = %resolved.item_id,
                delay_seconds = resolved.delay_seconds,
                "Item left the queue between polls"
            );
            outcome.resolved.push(resolved);
        }
    }

    for item in items {
        let Some(reason) = item.queue_reason() else {
            outcome.untracked += 1;
            continue;
        };
        let entered_at = item.queued_at.map_or(now, |at| at.min(now));
        if store.track_pending_item(&PendingItem::new(&item.target, entered_at, reason))? {
            outcome.newly_tracked += 1;
        }
    }

    outcome.pending_in_queue = store
        .list_pending_items()?
        .into_iter()
        .filter(|p| listed.contains(p.item_id.as_str()))
        .collect();

    tracing::info!(
        queue_length = outcome.queue_length,
        newly_tracked = outcome.newly_tracked,
        resolved = outcome.resolved.len(),
        pending = outcome.pending_in_queue.len(),
        "Queue poll applied"
    );
    Ok(outcome)
}

/// Take the entry out of the ledger and record its dwell time at `resolved_at`.
///
/// If the delay cannot be recorded the entry is put back before the error is
/// returned, so the next poll or event can retry.
fn resolve_item(
    store: &Store,
    item_id: &str,
    resolved_at: DateTime<Utc>,
) -> Result<Option<ResolvedItem>, StoreError> {
    let Some(pending) = store.take_pending_item(item_id)? else {
        return Ok(None);
    };
    let delay_seconds = pending.dwell_seconds(resolved_at);
    if let Err(e) = store.record_action_delay(resolved_at, item_id, delay_seconds as f64) {
        if let Err(restore) = store.track_pending_item(&pending) {
            tracing::error!(item_id, error = %restore, "Failed to restore pending item");
        }
        return Err(e);
    }
    Ok(Some(ResolvedItem {
        item_id: item_id.to_string(),
        delay_seconds,
    }))
}

fn track(
    store: &Store,
    target: &Target,
    at: DateTime<Utc>,
    reason: QueueReason,
) -> Result<EventOutcome, StoreError> {
    let item_id = target.id.clone();
    if store.track_pending_item(&PendingItem::new(target, at, reason))? {
        tracing::debug!(item_id = %item_id, reason = reason.as_str(), "Item may be queued, tracking");
        Ok(EventOutcome::Tracked { item_id })
    } else {
        Ok(EventOutcome::AlreadyTracked { item_id })
    }
}

/// Approve and definitive removals resolve the item at the action time;
/// removals by a filter actor start tracking it.
pub fn handle_mod_action(
    store: &Store,
    actors: &FilterActors,
    event: &ModActionEvent,
) -> Result<EventOutcome, StoreError> {
    let action = match ModAction::try_from(event) {
        Ok(action) => action,
        Err(e) => {
            tracing::warn!(error = %e, "Ignoring moderation action event");
            return Ok(EventOutcome::Ignored {
                reason: e.to_string(),
            });
        }
    };

    if action.kind.is_removal() {
        if let Some(reason) = actors.classify(&action.moderator) {
            return track(store, &action.target, action.actioned_at, reason);
        }
    }

    match resolve_item(store, &action.target.id, action.actioned_at)? {
        Some(resolved) => {
            tracing::info!(
                item_id = %resolved.item_id,
                moderator = %action.moderator,
                delay_seconds = resolved.delay_seconds,
                "Queue item actioned"
            );
            Ok(EventOutcome::Resolved {
                item_id: resolved.item_id,
                delay_seconds: resolved.delay_seconds,
            })
        }
        None => {
            tracing::debug!(
                item_id = %action.target.id,
                moderator = %action.moderator,
                "Actioned item was not in the ledger"
            );
            Ok(EventOutcome::NotTracked {
                item_id: action.target.id,
            })
        }
    }
}

pub fn handle_report(
    store: &Store,
    event: &ReportEvent,
    now: DateTime<Utc>,
) -> Result<EventOutcome, StoreError> {
    let target = match resolve_target(event.target_post.as_ref(), event.target_comment.as_ref()) {
        Ok(target) => target,
        Err(e) => {
            tracing::warn!(error = %e, "Ignoring report event");
            return Ok(EventOutcome::Ignored {
                reason: e.to_string(),
            });
        }
    };
    let reported_at = event.reported_at.unwrap_or(now);
    track(store, &target, reported_at, QueueReason::UserReport)
}
