use std::collections::BTreeMap;

use chrono::{DateTime, Duration, NaiveTime, Utc};
use serde::Serialize;

use crate::constants::{AGGREGATION_GRACE_DAYS, MILLIS_PER_HOUR};
use crate::monitor::types::{Sample, Series};
use crate::store::{Store, StoreError};

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SeriesAggregation {
    pub raw_samples: usize,
    pub buckets_written: usize,
    pub buckets_failed: usize,
    pub raw_deleted: usize,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AggregationOutcome {
    pub cutoff: DateTime<Utc>,
    pub queue_length: SeriesAggregation,
    pub action_delay: SeriesAggregation,
}

impl AggregationOutcome {
    pub fn is_noop(&self) -> bool {
        self.queue_length.raw_samples == 0 && self.action_delay.raw_samples == 0
    }
}

pub fn start_of_day(at: DateTime<Utc>) -> DateTime<Utc> {
    at.date_naive().and_time(NaiveTime::MIN).and_utc()
}

/// Raw samples strictly older than this are compacted.
pub fn aggregation_cutoff(now: DateTime<Utc>) -> DateTime<Utc> {
    start_of_day(now) - Duration::days(AGGREGATION_GRACE_DAYS)
}

fn hour_start_ms(timestamp_ms: i64) -> i64 {
    timestamp_ms.div_euclid(MILLIS_PER_HOUR) * MILLIS_PER_HOUR
}

/// Merge a bucket of raw points: unweighted mean, max of maxima, one count per point.
pub fn merge_bucket(hour_start: DateTime<Utc>, samples: &[Sample]) -> Option<Sample> {
    if samples.is_empty() {
        return None;
    }
    let n = samples.len();
    let mean = samples.iter().map(|s| s.value).sum::<f64>() / n as f64;
    let max = samples
        .iter()
        .map(|s| s.max_value.max(s.value))
        .fold(f64::MIN, f64::max);
    Some(Sample {
        timestamp: hour_start,
        value: mean,
        max_value: max.max(mean),
        sample_count: n as u64,
    })
}

/// Group raw samples into hour buckets over
/// `[start_of_day(earliest), start_of_day(cutoff) + 1 day)`. Empty hours produce nothing.
pub fn bucket_by_hour(
    samples: &[Sample],
    window_start: DateTime<Utc>,
    window_end: DateTime<Utc>,
) -> BTreeMap<i64, Vec<Sample>> {
    let mut buckets: BTreeMap<i64, Vec<Sample>> = BTreeMap::new();
    for sample in samples {
        if sample.timestamp < window_start || sample.timestamp >= window_end {
            continue;
        }
        buckets
            .entry(hour_start_ms(sample.timestamp_ms()))
            .or_default()
            .push(sample.clone());
    }
    buckets
}

/// Compact every raw sample older than the cutoff into hourly records and
/// evict the merged raw data.
///
/// Bucket writes are independent. When one fails, only the raw data of the
/// buckets that were written is removed; the rest stays raw for the next run.
/// A read failure aborts the run without touching anything.
pub fn aggregate_older_data(
    store: &Store,
    now: DateTime<Utc>,
) -> Result<AggregationOutcome, StoreError> {
    let cutoff = aggregation_cutoff(now);
    let last_eligible = cutoff - Duration::milliseconds(1);
    let epoch = DateTime::<Utc>::default();

    let queue = store.read_raw_since(Series::QueueLength, epoch, last_eligible)?;
    let delays = store.read_raw_since(Series::ActionDelay, epoch, last_eligible)?;

    let mut outcome = AggregationOutcome {
        cutoff,
        queue_length: SeriesAggregation::default(),
        action_delay: SeriesAggregation::default(),
    };

    let Some(earliest) = queue.iter().chain(delays.iter()).map(|s| s.timestamp).min() else {
        tracing::info!(cutoff = %cutoff, "Aggregation: nothing to compact");
        return Ok(outcome);
    };

    let window_start = start_of_day(earliest);
    let window_end = start_of_day(cutoff) + Duration::days(1);

    outcome.queue_length = compact_series(
        store,
        Series::QueueLength,
        &queue,
        (window_start, window_end),
        last_eligible,
        |record| store.write_aggregated(Series::QueueLength, record),
    )?;
    outcome.action_delay = compact_series(
        store,
        Series::ActionDelay,
        &delays,
        (window_start, window_end),
        last_eligible,
        |record| store.write_aggregated(Series::ActionDelay, record),
    )?;

    Ok(outcome)
}

/// Half-open raw ranges to evict after a partial run: one per written hour,
/// clipped so nothing at or past the cutoff is touched.
pub fn eviction_ranges(
    written_hours: &[DateTime<Utc>],
    last_eligible: DateTime<Utc>,
) -> Vec<(DateTime<Utc>, DateTime<Utc>)> {
    let limit = last_eligible + Duration::milliseconds(1);
    written_hours
        .iter()
        .filter(|hour| **hour < limit)
        .map(|hour| (*hour, (*hour + Duration::hours(1)).min(limit)))
        .collect()
}

fn compact_series<W>(
    store: &Store,
    series: Series,
    samples: &[Sample],
    (window_start, window_end): (DateTime<Utc>, DateTime<Utc>),
    last_eligible: DateTime<Utc>,
    mut write: W,
) -> Result<SeriesAggregation, StoreError>
where
    W: FnMut(&Sample) -> Result<(), StoreError>,
{
    let mut result = SeriesAggregation {
        raw_samples: samples.len(),
        ..SeriesAggregation::default()
    };
    if samples.is_empty() {
        return Ok(result);
    }

    let mut written_hours = Vec::new();
    for (hour_ms, bucket) in bucket_by_hour(samples, window_start, window_end) {
        let Some(hour_start) = DateTime::<Utc>::from_timestamp_millis(hour_ms) else {
            continue;
        };
        let Some(record) = merge_bucket(hour_start, &bucket) else {
            continue;
        };
        match write(&record) {
            Ok(()) => {
                result.buckets_written += 1;
                written_hours.push(hour_start);
            }
            Err(e) => {
                result.buckets_failed += 1;
                tracing::warn!(
                    series = %series,
                    hour = %hour_start,
                    error = %e,
                    "Aggregation: failed to write hourly record, leaving raw data in place"
                );
            }
        }
    }

    if result.buckets_failed == 0 {
        result.raw_deleted = store.delete_raw_in_range(series, last_eligible)?;
    } else {
        for (from, until) in eviction_ranges(&written_hours, last_eligible) {
            result.raw_deleted += store.delete_raw_between(series, from, until)?;
        }
    }

    tracing::info!(
        series = %series,
        raw_samples = result.raw_samples,
        buckets_written = result.buckets_written,
        buckets_failed = result.buckets_failed,
        raw_deleted = result.raw_deleted,
        "Aggregation: series compacted"
    );
    Ok(result)
}
