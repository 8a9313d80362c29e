use std::collections::BTreeMap;

use chrono::{DateTime, Utc};

use crate::monitor::types::{Sample, Series};
use crate::store::codec::{self, RawMember};
use crate::store::keys;
use crate::store::{Store, StoreError};

impl Store {
    /// Append one raw queue-length poll. Every poll appends; nothing is deduplicated.
    pub fn record_queue_length(&self, length: u64, now: DateTime<Utc>) -> Result<(), StoreError> {
        self.append_raw(
            Series::QueueLength,
            &RawMember {
                timestamp_ms: now.timestamp_millis(),
                label: None,
                value: length as f64,
                sample_count: 1,
            },
        )
    }

    /// Append one raw action-delay sample, stamped with the time the item was actioned.
    pub fn record_action_delay(
        &self,
        actioned_at: DateTime<Utc>,
        item_id: &str,
        delay_seconds: f64,
    ) -> Result<(), StoreError> {
        if !delay_seconds.is_finite() || delay_seconds < 0.0 {
            return Err(StoreError::Validation(format!(
                "action delay must be a non-negative number, got {delay_seconds}"
            )));
        }
        self.append_raw(
            Series::ActionDelay,
            &RawMember {
                timestamp_ms: actioned_at.timestamp_millis(),
                label: Some(item_id.to_string()),
                value: delay_seconds,
                sample_count: 1,
            },
        )
    }

    fn append_raw(&self, series: Series, member: &RawMember) -> Result<(), StoreError> {
        let key = keys::raw_sample_key(member.timestamp_ms, self.next_sequence()?);
        let value = codec::encode_member(series, member);
        self.raw_tree(series)
            .insert(key.as_bytes(), value.as_bytes())?;
        Ok(())
    }

    /// Raw samples with `since <= timestamp <= until`, ascending.
    ///
    /// Entries that fail to decode are logged and left out.
    pub fn read_raw_since(
        &self,
        series: Series,
        since: DateTime<Utc>,
        until: DateTime<Utc>,
    ) -> Result<Vec<Sample>, StoreError> {
        if until < since {
            return Ok(Vec::new());
        }
        let start = keys::raw_range_start(since.timestamp_millis());
        let end = keys::raw_range_end_inclusive(until.timestamp_millis());
        let mut samples = Vec::new();
        for item in self.raw_tree(series).range(start.as_bytes()..end.as_bytes()) {
            let (key, value) = item?;
            if let Some(sample) = decode_raw(series, &key, &value) {
                samples.push(sample);
            }
        }
        Ok(samples)
    }

    pub fn read_raw_all(&self, series: Series) -> Result<Vec<Sample>, StoreError> {
        let mut samples = Vec::new();
        for item in self.raw_tree(series).iter() {
            let (key, value) = item?;
            if let Some(sample) = decode_raw(series, &key, &value) {
                samples.push(sample);
            }
        }
        Ok(samples)
    }

    /// Full scan of the hourly partition, keyed by hour-start milliseconds.
    pub fn read_aggregated(&self, series: Series) -> Result<BTreeMap<i64, Sample>, StoreError> {
        let mut out = BTreeMap::new();
        for item in self.hourly_tree(series).iter() {
            let (key, value) = item?;
            let Some(hour_ms) = keys::parse_hourly_key(&key) else {
                tracing::warn!(series = %series, "Skipping hourly record with unreadable key");
                continue;
            };
            match Self::deserialize::<Sample>(&value) {
                Ok(sample) => {
                    out.insert(hour_ms, sample);
                }
                Err(e) => {
                    tracing::warn!(series = %series, hour_ms, error = %e, "Skipping malformed hourly record");
                }
            }
        }
        Ok(out)
    }

    /// Write (or overwrite) the compacted record for the hour starting at `sample.timestamp`.
    pub fn write_aggregated(&self, series: Series, sample: &Sample) -> Result<(), StoreError> {
        if sample.sample_count == 0 {
            return Err(StoreError::Validation(
                "aggregated record must cover at least one sample".to_string(),
            ));
        }
        let key = keys::hourly_key(sample.timestamp_ms());
        self.hourly_tree(series)
            .insert(key.as_bytes(), Self::serialize(sample)?)?;
        Ok(())
    }

    /// Remove every raw entry with `timestamp <= until`. Returns the number removed.
    pub fn delete_raw_in_range(
        &self,
        series: Series,
        until: DateTime<Utc>,
    ) -> Result<usize, StoreError> {
        let end = keys::raw_range_end_inclusive(until.timestamp_millis());
        self.remove_raw_keys(series, ..end.into_bytes())
    }

    /// Remove raw entries with `from <= timestamp < until`.
    pub fn delete_raw_between(
        &self,
        series: Series,
        from: DateTime<Utc>,
        until: DateTime<Utc>,
    ) -> Result<usize, StoreError> {
        if until <= from {
            return Ok(0);
        }
        let start = keys::raw_range_start(from.timestamp_millis());
        let end = keys::raw_range_start(until.timestamp_millis());
        self.remove_raw_keys(series, start.into_bytes()..end.into_bytes())
    }

    fn remove_raw_keys<R>(&self, series: Series, range: R) -> Result<usize, StoreError>
    where
        R: std::ops::RangeBounds<Vec<u8>>,
    {
        let tree = self.raw_tree(series);
        let mut batch = sled::Batch::default();
        let mut removed = 0usize;
        for item in tree.range(range) {
            let (key, _) = item?;
            batch.remove(key);
            removed += 1;
        }
        tree.apply_batch(batch)?;
        Ok(removed)
    }
}

fn decode_raw(series: Series, key: &[u8], value: &[u8]) -> Option<Sample> {
    let decoded = std::str::from_utf8(value)
        .map_err(|e| StoreError::MalformedSample {
            detail: format!("{series} member is not UTF-8: {e}"),
        })
        .and_then(|raw| codec::decode_member(series, raw))
        .and_then(RawMember::into_sample);

    match decoded {
        Ok(sample) => Some(sample),
        Err(e) => {
            tracing::warn!(
                series = %series,
                key_ts_ms = keys::parse_raw_sample_timestamp_ms(key),
                error = %e,
                "Dropping malformed raw sample"
            );
            None
        }
    }
}
