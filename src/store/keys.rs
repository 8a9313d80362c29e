/// Raw sample key: `{timestamp_ms:020}:{sequence:020}`.
///
/// Zero padding keeps lexicographic order equal to chronological order, and the
/// sequence suffix keeps two samples taken in the same millisecond apart.
pub fn raw_sample_key(timestamp_ms: i64, sequence: u64) -> String {
    let ts = timestamp_ms.max(0) as u64;
    format!("{:020}:{:020}", ts, sequence)
}

/// Inclusive lower bound for raw keys at or after `timestamp_ms`.
pub fn raw_range_start(timestamp_ms: i64) -> String {
    let ts = timestamp_ms.max(0) as u64;
    format!("{:020}:", ts)
}

/// Exclusive upper bound for raw keys at or before `timestamp_ms`.
pub fn raw_range_end_inclusive(timestamp_ms: i64) -> String {
    let ts = (timestamp_ms.max(0) as u64).saturating_add(1);
    format!("{:020}:", ts)
}

/// Parse the timestamp prefix of a raw sample key.
pub fn parse_raw_sample_timestamp_ms(key: &[u8]) -> Option<i64> {
    let sep = key.iter().position(|b| *b == b':')?;
    let ts_str = std::str::from_utf8(&key[..sep]).ok()?;
    let ts = ts_str.parse::<u64>().ok()?;
    i64::try_from(ts).ok()
}

pub fn hourly_key(hour_start_ms: i64) -> String {
    let ts = hour_start_ms.max(0) as u64;
    format!("{:020}", ts)
}

pub fn parse_hourly_key(key: &[u8]) -> Option<i64> {
    let ts_str = std::str::from_utf8(key).ok()?;
    let ts = ts_str.parse::<u64>().ok()?;
    i64::try_from(ts).ok()
}

pub fn pending_item_key(item_id: &str) -> String {
    item_id.to_string()
}

pub const ALERT_COOLDOWN_KEY: &str = "cooldown";
pub const LATEST_REPORT_KEY: &str = "latest";
