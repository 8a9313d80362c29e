pub mod aggregator;
pub mod alerting;
pub mod events;
pub mod render;
pub mod snapshot;
pub mod stats;
pub mod types;
