use chrono::{DateTime, Utc};

use crate::monitor::render::render_markdown;
use crate::monitor::stats::build_report;
use crate::monitor::types::{Sample, Series};
use crate::store::operations::reports::StoredReport;
use crate::store::{Store, StoreError};

/// Compacted hours first, then the raw samples not yet compacted.
fn load_series(store: &Store, series: Series) -> Result<Vec<Sample>, StoreError> {
    let mut samples: Vec<Sample> = store.read_aggregated(series)?.into_values().collect();
    samples.extend(store.read_raw_all(series)?);
    Ok(samples)
}

pub fn build_and_store(store: &Store, now: DateTime<Utc>) -> Result<StoredReport, StoreError> {
    let queue = load_series(store, Series::QueueLength)?;
    let delays = load_series(store, Series::ActionDelay)?;

    let report = build_report(&queue, &delays, now);
    let stored = StoredReport {
        markdown: render_markdown(&report),
        report,
    };
    store.save_latest_report(&stored)?;
    Ok(stored)
}

pub async fn run(store: &Store) {
    tracing::debug!("report_build: start");
    match build_and_store(store, Utc::now()) {
        Ok(stored) => tracing::info!(
            days = stored.report.days.len(),
            has_data = stored.report.has_data(),
            "report_build: done"
        ),
        Err(e) => tracing::error!(error = %e, "report_build failed"),
    }
}
