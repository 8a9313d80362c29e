pub const QUEUE_LENGTH_RAW: &str = "queue_length_raw";
pub const QUEUE_LENGTH_HOURLY: &str = "queue_length_hourly";
pub const ACTION_DELAY_RAW: &str = "action_delay_raw";
pub const ACTION_DELAY_HOURLY: &str = "action_delay_hourly";

// Pending-item ledger, keyed by item id
pub const PENDING_ITEMS: &str = "pending_items";

pub const ALERT_STATE: &str = "alert_state";
pub const REPORTS: &str = "reports";
pub const META: &str = "meta";
