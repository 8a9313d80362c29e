use axum::extract::State;
use axum::http::header;
use axum::response::IntoResponse;
use axum::routing::get;
use axum::Router;

use crate::response::{ok, AppError};
use crate::state::AppState;
use crate::store::operations::reports::StoredReport;

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/latest", get(latest_report))
        .route("/latest/markdown", get(latest_markdown))
}

fn load_latest(state: &AppState) -> Result<StoredReport, AppError> {
    state
        .store()
        .get_latest_report()?
        .ok_or_else(|| AppError::not_found("No report has been built yet"))
}

async fn latest_report(State(state): State<AppState>) -> Result<impl IntoResponse, AppError> {
    let stored = load_latest(&state)?;
    Ok(ok(stored.report))
}

async fn latest_markdown(State(state): State<AppState>) -> Result<impl IntoResponse, AppError> {
    let stored = load_latest(&state)?;
    Ok((
        [(header::CONTENT_TYPE, "text/markdown; charset=utf-8")],
        stored.markdown,
    ))
}
