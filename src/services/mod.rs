pub mod queue_source;
pub mod webhook;
