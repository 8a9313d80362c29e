use serde::{Deserialize, Serialize};

use crate::monitor::stats::QueueReport;
use crate::store::keys::LATEST_REPORT_KEY;
use crate::store::{Store, StoreError};

/// Last built report together with its rendered document.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StoredReport {
    pub report: QueueReport,
    pub markdown: String,
}

impl Store {
    pub fn save_latest_report(&self, stored: &StoredReport) -> Result<(), StoreError> {
        self.reports
            .insert(LATEST_REPORT_KEY.as_bytes(), Self::serialize(stored)?)?;
        Ok(())
    }

    pub fn get_latest_report(&self) -> Result<Option<StoredReport>, StoreError> {
        match self.reports.get(LATEST_REPORT_KEY.as_bytes())? {
            Some(raw) => Ok(Some(Self::deserialize(&raw)?)),
            None => Ok(None),
        }
    }
}
