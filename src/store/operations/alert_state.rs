use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::store::keys::ALERT_COOLDOWN_KEY;
use crate::store::{Store, StoreError};

/// Debounce flag for alert delivery. Inactive once `expires_at <= now`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AlertCooldown {
    pub activated_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
}

impl AlertCooldown {
    pub fn is_active(&self, now: DateTime<Utc>) -> bool {
        self.expires_at > now
    }
}

impl Store {
    /// The cooldown if one is active at `now`. An unreadable record is
    /// dropped and reads as inactive.
    pub fn get_alert_cooldown(
        &self,
        now: DateTime<Utc>,
    ) -> Result<Option<AlertCooldown>, StoreError> {
        let Some(raw) = self.alert_state.get(ALERT_COOLDOWN_KEY.as_bytes())? else {
            return Ok(None);
        };
        let cooldown = match Self::deserialize::<AlertCooldown>(&raw) {
            Ok(cooldown) => cooldown,
            Err(e) => {
                tracing::warn!(error = %e, "Discarding unreadable alert cooldown");
                self.alert_state.remove(ALERT_COOLDOWN_KEY.as_bytes())?;
                return Ok(None);
            }
        };
        Ok(cooldown.is_active(now).then_some(cooldown))
    }

    pub fn set_alert_cooldown(&self, cooldown: &AlertCooldown) -> Result<(), StoreError> {
        self.alert_state
            .insert(ALERT_COOLDOWN_KEY.as_bytes(), Self::serialize(cooldown)?)?;
        Ok(())
    }

    pub fn clear_alert_cooldown(&self) -> Result<(), StoreError> {
        self.alert_state.remove(ALERT_COOLDOWN_KEY.as_bytes())?;
        Ok(())
    }
}
