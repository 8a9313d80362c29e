//! Statistics over a mix of raw and hourly-compacted samples.
//!
//! Every function here is pure. Raw and compacted records share the
//! `{mean, max, count}` shape, so the same weighted primitives apply to both.

use chrono::{DateTime, Duration, NaiveDate, Timelike, Utc};
use serde::{Deserialize, Serialize};

use crate::constants::{REPORT_HOURS_PER_DAY, REPORT_WINDOW_DAYS};
use crate::monitor::types::Sample;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct WeightedSample {
    pub mean_value: f64,
    pub max_value: f64,
    pub sample_count: f64,
}

impl From<&Sample> for WeightedSample {
    fn from(sample: &Sample) -> Self {
        Self {
            mean_value: sample.value,
            max_value: sample.max_value,
            sample_count: sample.sample_count as f64,
        }
    }
}

/// `Σ(mean × count) / Σcount`, or 0 when there is no weight at all.
pub fn weighted_average(entries: &[WeightedSample]) -> f64 {
    let total: f64 = entries.iter().map(|e| e.sample_count).sum();
    if entries.is_empty() || total <= 0.0 {
        return 0.0;
    }
    entries
        .iter()
        .map(|e| e.mean_value * e.sample_count)
        .sum::<f64>()
        / total
}

/// Largest `max_value` among entries that carry weight, or 0.
pub fn weighted_max(entries: &[WeightedSample]) -> f64 {
    entries
        .iter()
        .filter(|e| e.sample_count > 0.0)
        .map(|e| e.max_value)
        .fold(None, |acc: Option<f64>, v| Some(acc.map_or(v, |a| a.max(v))))
        .unwrap_or(0.0)
}

fn weighted(samples: &[&Sample]) -> Vec<WeightedSample> {
    samples.iter().map(|s| WeightedSample::from(*s)).collect()
}

fn total_count(samples: &[&Sample]) -> u64 {
    samples.iter().map(|s| s.sample_count).sum()
}

fn round_u64(value: f64) -> u64 {
    if value.is_finite() && value > 0.0 {
        value.round() as u64
    } else {
        0
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DayRow {
    pub date: NaiveDate,
    pub avg_queue_length: u64,
    pub peak_queue_length: u64,
    pub avg_action_delay_secs: u64,
    pub max_action_delay_secs: u64,
    pub action_count: u64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QueueSummary {
    pub avg_queue_length: u64,
    pub peak_queue_length: u64,
    pub peak_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ActionSummary {
    pub total_actions: u64,
    /// Absent with less than one hour of history.
    pub actions_per_day: Option<u64>,
    pub avg_delay_secs: f64,
    pub max_delay_secs: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReportSummary {
    /// Earliest queue-length sample ever recorded.
    pub since: Option<DateTime<Utc>>,
    pub queue: Option<QueueSummary>,
    pub actions: Option<ActionSummary>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HourRow {
    pub hour: u32,
    pub avg_queue_length: f64,
    pub avg_action_count: f64,
    pub avg_action_delay_secs: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QueueReport {
    pub generated_at: DateTime<Utc>,
    /// Lower bound of the per-day and per-hour tables.
    pub window_start: DateTime<Utc>,
    /// Most recent day first.
    pub days: Vec<DayRow>,
    pub summary: ReportSummary,
    /// Always 24 rows, hour 0 to 23 (UTC).
    pub hours: Vec<HourRow>,
}

impl QueueReport {
    pub fn has_data(&self) -> bool {
        self.summary.queue.is_some()
    }
}

/// Build all three report tables from the full queue-length and action-delay
/// series (raw and compacted records, any order).
pub fn build_report(queue: &[Sample], delays: &[Sample], now: DateTime<Utc>) -> QueueReport {
    let earliest = queue.iter().map(|s| s.timestamp).min();
    let window_floor = now - Duration::days(REPORT_WINDOW_DAYS);
    let window_start = earliest.map_or(window_floor, |e| e.max(window_floor));

    QueueReport {
        generated_at: now,
        window_start,
        days: day_rows(queue, delays, window_start, now),
        summary: summary(queue, delays, earliest, now),
        hours: hour_rows(queue, delays, window_start),
    }
}

fn day_rows(
    queue: &[Sample],
    delays: &[Sample],
    window_start: DateTime<Utc>,
    now: DateTime<Utc>,
) -> Vec<DayRow> {
    let first = window_start.date_naive();
    let last = (now - Duration::days(1)).date_naive();

    let mut rows = Vec::new();
    let mut day = last;
    while day >= first {
        let queue_day: Vec<&Sample> = queue
            .iter()
            .filter(|s| s.timestamp.date_naive() == day)
            .collect();
        if !queue_day.is_empty() {
            let delays_day: Vec<&Sample> = delays
                .iter()
                .filter(|s| s.timestamp.date_naive() == day)
                .collect();
            let queue_w = weighted(&queue_day);
            let delay_w = weighted(&delays_day);
            rows.push(DayRow {
                date: day,
                avg_queue_length: round_u64(weighted_average(&queue_w)),
                peak_queue_length: round_u64(weighted_max(&queue_w)),
                avg_action_delay_secs: round_u64(weighted_average(&delay_w)),
                max_action_delay_secs: round_u64(weighted_max(&delay_w)),
                action_count: total_count(&delays_day),
            });
        }
        match day.pred_opt() {
            Some(prev) => day = prev,
            None => break,
        }
    }
    rows
}

fn summary(
    queue: &[Sample],
    delays: &[Sample],
    earliest: Option<DateTime<Utc>>,
    now: DateTime<Utc>,
) -> ReportSummary {
    let queue_summary = peak_sample(queue).map(|peak| {
        let all: Vec<&Sample> = queue.iter().collect();
        QueueSummary {
            avg_queue_length: round_u64(weighted_average(&weighted(&all))),
            peak_queue_length: round_u64(peak.max_value),
            peak_at: peak.timestamp,
        }
    });

    let action_summary = (!delays.is_empty()).then(|| {
        let all: Vec<&Sample> = delays.iter().collect();
        let w = weighted(&all);
        let total_actions = total_count(&all);
        let actions_per_day = earliest.and_then(|e| {
            let hours = (now - e).num_hours();
            (hours >= 1).then(|| round_u64(total_actions as f64 / hours as f64 * 24.0))
        });
        ActionSummary {
            total_actions,
            actions_per_day,
            avg_delay_secs: weighted_average(&w),
            max_delay_secs: weighted_max(&w),
        }
    });

    ReportSummary {
        since: earliest,
        queue: queue_summary,
        actions: action_summary,
    }
}

/// Sample with the highest max; the earliest one wins a tie.
fn peak_sample(samples: &[Sample]) -> Option<&Sample> {
    samples
        .iter()
        .filter(|s| s.sample_count > 0)
        .fold(None, |best: Option<&Sample>, s| match best {
            Some(b)
                if b.max_value > s.max_value
                    || (b.max_value == s.max_value && b.timestamp <= s.timestamp) =>
            {
                Some(b)
            }
            _ => Some(s),
        })
}

fn hour_rows(queue: &[Sample], delays: &[Sample], window_start: DateTime<Utc>) -> Vec<HourRow> {
    (0..REPORT_HOURS_PER_DAY)
        .map(|hour| {
            let in_slot = |s: &&Sample| s.timestamp >= window_start && s.timestamp.hour() == hour;
            let queue_slot: Vec<&Sample> = queue.iter().filter(in_slot).collect();
            let delay_slot: Vec<&Sample> = delays.iter().filter(in_slot).collect();

            HourRow {
                hour,
                avg_queue_length: weighted_average(&weighted(&queue_slot)),
                avg_action_count: weighted_average(&action_count_points(
                    &delay_slot,
                    queue_slot.len(),
                )),
                avg_action_delay_secs: weighted_average(&weighted(&delay_slot)),
            }
        })
        .collect()
}

/// One point per action-delay entry (`mean = weight = sample count`), padded
/// with zero-valued points until it matches the number of queue-length points.
/// Padding carries the weighted average of the real points as its weight.
pub fn action_count_points(delays: &[&Sample], queue_points: usize) -> Vec<WeightedSample> {
    let mut points: Vec<WeightedSample> = delays
        .iter()
        .map(|s| WeightedSample {
            mean_value: s.sample_count as f64,
            max_value: s.max_value,
            sample_count: s.sample_count as f64,
        })
        .collect();

    if points.len() < queue_points {
        let padding_weight = weighted_average(&points);
        let missing = queue_points - points.len();
        points.extend((0..missing).map(|_| WeightedSample {
            mean_value: 0.0,
            max_value: 0.0,
            sample_count: padding_weight,
        }));
    }
    points
}
