use chrono::Utc;

use crate::monitor::aggregator::aggregate_older_data;
use crate::store::Store;

pub async fn run(store: &Store) {
    tracing::debug!("aggregation: start");
    match aggregate_older_data(store, Utc::now()) {
        Ok(outcome) if outcome.is_noop() => {
            tracing::info!(cutoff = %outcome.cutoff, "aggregation: nothing older than the cutoff")
        }
        Ok(outcome) => {
            let failed = outcome.queue_length.buckets_failed + outcome.action_delay.buckets_failed;
            if failed > 0 {
                tracing::warn!(buckets_failed = failed, "aggregation: some hourly buckets were not written");
            }
            tracing::info!(
                cutoff = %outcome.cutoff,
                queue_buckets = outcome.queue_length.buckets_written,
                queue_raw_deleted = outcome.queue_length.raw_deleted,
                delay_buckets = outcome.action_delay.buckets_written,
                delay_raw_deleted = outcome.action_delay.raw_deleted,
                "aggregation: done"
            );
        }
        Err(e) => tracing::error!(error = %e, "aggregation failed"),
    }
}
