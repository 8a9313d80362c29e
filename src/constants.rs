/// Milliseconds per hour.
pub const MILLIS_PER_HOUR: i64 = 3_600_000;

/// Raw samples younger than this many days (counted from the start of today)
/// stay uncompacted.
pub const AGGREGATION_GRACE_DAYS: i64 = 7;

/// Trailing window of the per-day and per-hour report tables.
pub const REPORT_WINDOW_DAYS: i64 = 28;

pub const REPORT_HOURS_PER_DAY: u32 = 24;

/// Width of the report bar in full blocks.
pub const BAR_MAX_BLOCKS: u32 = 6;

/// Counts at or above this render as "> 1000".
pub const REPORT_COUNT_CAP: u64 = 1000;

/// Minimum scale of the peak-queue bar.
pub const REPORT_MIN_PEAK_BAR: u64 = 10;

/// Upper bound on items taken from one queue listing.
pub const MAX_QUEUE_LISTING: usize = 1000;

pub const DEFAULT_QUEUE_SIZE_THRESHOLD: u64 = 30;
pub const DEFAULT_ALERT_AGE_HOURS: u64 = 24;
pub const DEFAULT_DOMINANT_POST_PCT: u64 = 40;
pub const DEFAULT_ALERT_COOLDOWN_SECS: u64 = 86_400;
pub const DEFAULT_ALERT_CLEAR_WINDOW_SECS: u64 = 900;
pub const DEFAULT_ALERT_CLEAR_SAFETY_MARGIN_SECS: u64 = 30;

/// Moderators whose removals only put items in the queue.
pub const DEFAULT_AUTOMATED_FILTER_ACTORS: &[&str] = &["AutoModerator"];
pub const DEFAULT_PLATFORM_FILTER_ACTORS: &[&str] = &["reddit"];

/// Longest a single background job may run (seconds).
pub const WORKER_JOB_TIMEOUT_SECS: u64 = 300;

/// Delay before the one-off report build after startup.
pub const STARTUP_REPORT_DELAY_SECS: u64 = 5;
