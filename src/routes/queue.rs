use axum::extract::State;
use axum::response::IntoResponse;
use axum::routing::get;
use axum::Router;
use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::monitor::types::PendingItem;
use crate::response::{ok, AppError};
use crate::state::AppState;
use crate::store::operations::alert_state::AlertCooldown;

pub fn router() -> Router<AppState> {
    Router::new().route("/status", get(queue_status))
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct QueueStatus {
    pending_count: usize,
    oldest_pending: Option<OldestPending>,
    alert_cooldown: Option<AlertCooldown>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct OldestPending {
    #[serde(flatten)]
    item: PendingItem,
    age_secs: i64,
}

async fn queue_status(State(state): State<AppState>) -> Result<impl IntoResponse, AppError> {
    let now: DateTime<Utc> = Utc::now();
    let pending = state.store().list_pending_items()?;
    let pending_count = pending.len();
    let oldest_pending = pending
        .into_iter()
        .min_by_key(|p| p.queue_entered_at)
        .map(|item| OldestPending {
            age_secs: item.age_at(now).num_seconds(),
            item,
        });
    let alert_cooldown = state.store().get_alert_cooldown(now)?;

    Ok(ok(QueueStatus {
        pending_count,
        oldest_pending,
        alert_cooldown,
    }))
}
