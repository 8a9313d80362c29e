pub mod alert_state;
pub mod pending_items;
pub mod reports;
pub mod samples;
