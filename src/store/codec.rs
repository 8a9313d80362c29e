//! Storage encoding for raw series entries.
//!
//! Raw members are kept as `~`-separated tuples so a raw poll and an
//! already-merged entry share one layout:
//!
//! - queue length: `timestamp~value[~sampleCount]`
//! - action delay: `timestamp~itemId~value[~sampleCount]`
//!
//! A missing sample count decodes as 1. Outside this module entries are always
//! handled as [`RawMember`].

use chrono::{DateTime, Utc};

use crate::monitor::types::{Sample, Series};
use crate::store::StoreError;

const SEPARATOR: char = '~';

#[derive(Debug, Clone, PartialEq)]
pub struct RawMember {
    pub timestamp_ms: i64,
    /// Secondary value; the actioned item id for the action-delay series.
    pub label: Option<String>,
    pub value: f64,
    pub sample_count: u64,
}

impl RawMember {
    pub fn into_sample(self) -> Result<Sample, StoreError> {
        let timestamp = DateTime::<Utc>::from_timestamp_millis(self.timestamp_ms).ok_or_else(
            || StoreError::MalformedSample {
                detail: format!("timestamp out of range: {}", self.timestamp_ms),
            },
        )?;
        Ok(Sample {
            timestamp,
            value: self.value,
            max_value: self.value,
            sample_count: self.sample_count,
        })
    }
}

pub fn encode_member(series: Series, member: &RawMember) -> String {
    match series {
        Series::QueueLength => format!(
            "{}~{}~{}",
            member.timestamp_ms, member.value, member.sample_count
        ),
        Series::ActionDelay => {
            let label = member
                .label
                .as_deref()
                .unwrap_or_default()
                .replace(SEPARATOR, "_");
            format!(
                "{}~{}~{}~{}",
                member.timestamp_ms, label, member.value, member.sample_count
            )
        }
    }
}

pub fn decode_member(series: Series, raw: &str) -> Result<RawMember, StoreError> {
    let parts: Vec<&str> = raw.split(SEPARATOR).collect();
    let malformed = |why: &str| StoreError::MalformedSample {
        detail: format!("{series} member {raw:?}: {why}"),
    };

    let (timestamp, label, value, count) = match (series, parts.as_slice()) {
        (Series::QueueLength, [ts, value]) => (*ts, None, *value, None),
        (Series::QueueLength, [ts, value, count]) => (*ts, None, *value, Some(*count)),
        (Series::ActionDelay, [ts, label, value]) => (*ts, Some(*label), *value, None),
        (Series::ActionDelay, [ts, label, value, count]) => {
            (*ts, Some(*label), *value, Some(*count))
        }
        _ => return Err(malformed("unexpected field count")),
    };

    let timestamp_ms = timestamp
        .parse::<i64>()
        .map_err(|_| malformed("bad timestamp"))?;
    let value = value.parse::<f64>().map_err(|_| malformed("bad value"))?;
    if !value.is_finite() || value < 0.0 {
        return Err(malformed("value must be a non-negative number"));
    }
    let sample_count = match count {
        Some(c) => c.parse::<u64>().map_err(|_| malformed("bad sample count"))?,
        None => 1,
    };
    if sample_count == 0 {
        return Err(malformed("sample count must be positive"));
    }

    Ok(RawMember {
        timestamp_ms,
        label: label.filter(|l| !l.is_empty()).map(str::to_string),
        value,
        sample_count,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn queue_member_without_count_defaults_to_one() {
        let member = decode_member(Series::QueueLength, "1700000000000~12").unwrap();
        assert_eq!(member.timestamp_ms, 1_700_000_000_000);
        assert_eq!(member.value, 12.0);
        assert_eq!(member.sample_count, 1);
        assert!(member.label.is_none());
    }

    #[test]
    fn action_delay_member_keeps_item_id() {
        let encoded = encode_member(
            Series::ActionDelay,
            &RawMember {
                timestamp_ms: 5,
                label: Some("t1_abc".to_string()),
                value: 600.0,
                sample_count: 1,
            },
        );
        assert_eq!(encoded, "5~t1_abc~600~1");
        let decoded = decode_member(Series::ActionDelay, &encoded).unwrap();
        assert_eq!(decoded.label.as_deref(), Some("t1_abc"));
        assert_eq!(decoded.value, 600.0);
    }

    #[test]
    fn legacy_action_delay_member_parses() {
        let decoded = decode_member(Series::ActionDelay, "1000~t3_x~42").unwrap();
        assert_eq!(decoded.sample_count, 1);
        assert_eq!(decoded.value, 42.0);
    }

    #[test]
    fn corrupt_members_are_rejected() {
        for raw in ["", "abc~1", "1~x~y", "1~2~3~4~5", "1~-4", "1~3~0", "1~NaN"] {
            assert!(
                matches!(
                    decode_member(Series::QueueLength, raw),
                    Err(StoreError::MalformedSample { .. })
                ),
                "{raw:?} should be malformed"
            );
        }
    }

    #[test]
    fn separator_in_label_is_neutralised() {
        let encoded = encode_member(
            Series::ActionDelay,
            &RawMember {
                timestamp_ms: 1,
                label: Some("a~b".to_string()),
                value: 1.0,
                sample_count: 1,
            },
        );
        assert!(decode_member(Series::ActionDelay, &encoded).is_ok());
    }
}
