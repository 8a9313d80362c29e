pub mod codec;
pub mod keys;
pub mod migrate;
pub mod operations;
pub mod trees;

use serde::de::DeserializeOwned;
use serde::Serialize;
use sled::Db;
use thiserror::Error;

use crate::monitor::types::Series;

#[derive(Debug)]
pub struct Store {
    db: Db,
    pub queue_length_raw: sled::Tree,
    pub queue_length_hourly: sled::Tree,
    pub action_delay_raw: sled::Tree,
    pub action_delay_hourly: sled::Tree,
    pub pending_items: sled::Tree,
    pub alert_state: sled::Tree,
    pub reports: sled::Tree,
    pub meta: sled::Tree,
}

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("sled error: {0}")]
    Sled(#[from] sled::Error),
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
    #[error("malformed sample: {detail}")]
    MalformedSample { detail: String },
    #[error("validation error: {0}")]
    Validation(String),
    #[error("migration error at version {version}: {message}")]
    Migration { version: u32, message: String },
}

impl Store {
    pub fn open(sled_path: &str) -> Result<Self, StoreError> {
        let db = sled::open(sled_path)?;
        let queue_length_raw = db.open_tree(trees::QUEUE_LENGTH_RAW)?;
        let queue_length_hourly = db.open_tree(trees::QUEUE_LENGTH_HOURLY)?;
        let action_delay_raw = db.open_tree(trees::ACTION_DELAY_RAW)?;
        let action_delay_hourly = db.open_tree(trees::ACTION_DELAY_HOURLY)?;
        let pending_items = db.open_tree(trees::PENDING_ITEMS)?;
        let alert_state = db.open_tree(trees::ALERT_STATE)?;
        let reports = db.open_tree(trees::REPORTS)?;
        let meta = db.open_tree(trees::META)?;

        Ok(Self {
            db,
            queue_length_raw,
            queue_length_hourly,
            action_delay_raw,
            action_delay_hourly,
            pending_items,
            alert_state,
            reports,
            meta,
        })
    }

    pub fn run_migrations(&self) -> Result<(), StoreError> {
        migrate::run(self)
    }

    pub fn flush(&self) -> Result<(), StoreError> {
        self.db.flush()?;
        Ok(())
    }

    pub(crate) fn raw_tree(&self, series: Series) -> &sled::Tree {
        match series {
            Series::QueueLength => &self.queue_length_raw,
            Series::ActionDelay => &self.action_delay_raw,
        }
    }

    pub(crate) fn hourly_tree(&self, series: Series) -> &sled::Tree {
        match series {
            Series::QueueLength => &self.queue_length_hourly,
            Series::ActionDelay => &self.action_delay_hourly,
        }
    }

    /// Monotonic id used to keep raw keys unique within a millisecond.
    pub(crate) fn next_sequence(&self) -> Result<u64, StoreError> {
        Ok(self.db.generate_id()?)
    }

    pub(crate) fn serialize<T: Serialize>(value: &T) -> Result<Vec<u8>, StoreError> {
        Ok(serde_json::to_vec(value)?)
    }

    pub(crate) fn deserialize<T: DeserializeOwned>(bytes: &[u8]) -> Result<T, StoreError> {
        Ok(serde_json::from_slice(bytes)?)
    }
}
