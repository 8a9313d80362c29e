use axum::extract::State;
use axum::response::IntoResponse;
use axum::routing::post;
use axum::Router;
use chrono::Utc;
use serde::de::DeserializeOwned;

use crate::extractors::JsonBody;
use crate::middleware::ingest_auth::ingest_auth_middleware;
use crate::monitor::events::{ModActionEvent, ReportEvent};
use crate::monitor::snapshot::{handle_mod_action, handle_report, EventOutcome};
use crate::response::{ok, AppError};
use crate::state::AppState;

pub fn router(state: AppState) -> Router<AppState> {
    Router::new()
        .route("/mod-actions", post(mod_action))
        .route("/reports", post(report))
        .layer(axum::middleware::from_fn_with_state(
            state,
            ingest_auth_middleware,
        ))
}

/// Bodies that are valid JSON but not shaped like an event are acknowledged
/// and ignored rather than rejected.
fn decode_event<T: DeserializeOwned>(
    kind: &'static str,
    body: serde_json::Value,
) -> Result<T, EventOutcome> {
    serde_json::from_value(body).map_err(|e| {
        tracing::warn!(event = kind, error = %e, "Ignoring malformed event");
        EventOutcome::Ignored {
            reason: format!("malformed {kind} event: {e}"),
        }
    })
}

async fn mod_action(
    State(state): State<AppState>,
    JsonBody(body): JsonBody<serde_json::Value>,
) -> Result<impl IntoResponse, AppError> {
    let event: ModActionEvent = match decode_event("moderation action", body) {
        Ok(event) => event,
        Err(ignored) => return Ok(ok(ignored)),
    };
    let outcome = handle_mod_action(state.store(), &state.config().actors, &event)?;
    Ok(ok(outcome))
}

async fn report(
    State(state): State<AppState>,
    JsonBody(body): JsonBody<serde_json::Value>,
) -> Result<impl IntoResponse, AppError> {
    let event: ReportEvent = match decode_event("report", body) {
        Ok(event) => event,
        Err(ignored) => return Ok(ok(ignored)),
    };
    let outcome = handle_report(state.store(), &event, Utc::now())?;
    Ok(ok(outcome))
}
