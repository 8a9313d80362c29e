//! Alert decision with a store-backed cooldown.
//!
//! While a cooldown is active nothing is sent. Once the triggering condition
//! clears, the remaining cooldown is cut down to the clear window so a fresh
//! burst can alert again soon; it is never lengthened.

use std::collections::HashMap;

use chrono::{DateTime, Duration, Utc};
use serde::Serialize;

use crate::config::AlertConfig;
use crate::monitor::render::format_duration_secs;
use crate::monitor::types::{PendingItem, QueueItem};
use crate::services::webhook::Notifier;
use crate::store::operations::alert_state::AlertCooldown;
use crate::store::{Store, StoreError};

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DominantPost {
    pub post_id: String,
    pub count: usize,
    pub share_pct: u64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "decision", rename_all = "snake_case")]
pub enum AlertDecision {
    Disabled,
    /// Cooldown active; `shortened` when this evaluation cut it down.
    Suppressed {
        expires_at: DateTime<Utc>,
        shortened: bool,
    },
    Quiet,
    Fired {
        delivered: bool,
        size_breach: bool,
        aged_items: usize,
        dominant_posts: Vec<DominantPost>,
    },
}

/// Share of the queue per parent post, `round(100 × count / queue length)`.
/// Posts at or above `threshold_pct` are returned, largest first.
pub fn dominant_posts(items: &[QueueItem], threshold_pct: u64) -> Vec<DominantPost> {
    if threshold_pct == 0 || items.is_empty() {
        return Vec::new();
    }
    let mut counts: HashMap<&str, usize> = HashMap::new();
    for item in items {
        *counts.entry(item.parent_id()).or_default() += 1;
    }

    let total = items.len() as f64;
    let mut posts: Vec<DominantPost> = counts
        .into_iter()
        .map(|(post_id, count)| DominantPost {
            post_id: post_id.to_string(),
            count,
            share_pct: (100.0 * count as f64 / total).round() as u64,
        })
        .filter(|p| p.share_pct >= threshold_pct)
        .collect();
    posts.sort_by(|a, b| b.count.cmp(&a.count).then_with(|| a.post_id.cmp(&b.post_id)));
    posts
}

struct Breach<'a> {
    size: bool,
    aged: Vec<&'a PendingItem>,
    oldest: Option<&'a PendingItem>,
}

impl Breach<'_> {
    fn any(&self) -> bool {
        self.size || !self.aged.is_empty()
    }
}

fn evaluate<'a>(
    config: &AlertConfig,
    queue_length: usize,
    pending: &'a [PendingItem],
    now: DateTime<Utc>,
) -> Breach<'a> {
    let size = config.queue_size_threshold > 0 && queue_length as u64 >= config.queue_size_threshold;

    let (aged, oldest) = if config.age_hours > 0 {
        let limit = now - Duration::hours(config.age_hours as i64);
        let aged = pending.iter().filter(|p| p.queue_entered_at < limit).collect();
        let oldest = pending.iter().min_by_key(|p| p.queue_entered_at);
        (aged, oldest)
    } else {
        (Vec::new(), None)
    };

    Breach { size, aged, oldest }
}

fn plural<'a>(n: usize, one: &'a str, many: &'a str) -> &'a str {
    if n == 1 {
        one
    } else {
        many
    }
}

fn permalink_for<'a>(items: &'a [QueueItem], id: &str) -> Option<&'a str> {
    items
        .iter()
        .find(|i| i.id() == id)
        .and_then(|i| i.permalink.as_deref())
}

/// Alert text for a chat webhook.
pub fn compose_message(
    config: &AlertConfig,
    items: &[QueueItem],
    aged: &[&PendingItem],
    oldest: Option<&PendingItem>,
    dominant: &[DominantPost],
    now: DateTime<Utc>,
) -> String {
    let n = items.len();
    let mut message = match &config.queue_link {
        Some(link) => format!("The [{}](<{link}>) needs attention.", config.queue_name),
        None => format!("The {} needs attention.", config.queue_name),
    };
    if let Some(role) = &config.role_id {
        message.push_str(&format!(" <@&{role}>"));
    }

    message.push_str(&format!(
        "\n* There {} currently {n} {} in the queue\n",
        plural(n, "is", "are"),
        plural(n, "item", "items"),
    ));

    if !aged.is_empty() {
        let hours = config.age_hours as usize;
        message.push_str(&format!(
            "* {} {} {} over {hours} {} old.",
            aged.len(),
            plural(aged.len(), "item", "items"),
            plural(aged.len(), "is", "are"),
            plural(hours, "hour", "hours"),
        ));
        if let Some(link) = oldest.and_then(|o| permalink_for(items, &o.item_id)) {
            message.push_str(&format!(" [Oldest item](<{link}>)."));
        }
        message.push('\n');
    } else if let Some(oldest) = oldest {
        let age = oldest.age_at(now).num_seconds() as f64;
        message.push_str(&format!("* Oldest queue item: {}\n", format_duration_secs(age)));
    }

    for post in dominant {
        let label = match permalink_for(items, &post.post_id) {
            Some(link) => format!("[{}](<{link}>)", post.post_id),
            None => post.post_id.clone(),
        };
        message.push_str(&format!(
            "* Queue items from one post make up {}% of queue entries: {label}\n",
            post.share_pct
        ));
    }
    message
}

/// Evaluate the live queue against the thresholds and the cooldown; send at
/// most one notification.
///
/// A failed delivery is logged and still starts the cooldown.
pub async fn check_alerting<N: Notifier>(
    store: &Store,
    notifier: &N,
    config: &AlertConfig,
    items: &[QueueItem],
    pending: &[PendingItem],
    now: DateTime<Utc>,
) -> Result<AlertDecision, StoreError> {
    if !config.enabled || config.webhook_url.is_none() {
        tracing::debug!("Alerting disabled or no webhook configured");
        return Ok(AlertDecision::Disabled);
    }

    let breach = evaluate(config, items.len(), pending, now);

    if let Some(cooldown) = store.get_alert_cooldown(now)? {
        if breach.any() {
            tracing::info!(expires_at = %cooldown.expires_at, "Alerting paused by cooldown");
            return Ok(AlertDecision::Suppressed {
                expires_at: cooldown.expires_at,
                shortened: false,
            });
        }
        let window = config
            .clear_window_secs
            .saturating_sub(config.clear_safety_margin_secs);
        let short_expiry = now + Duration::seconds(window as i64);
        if cooldown.expires_at > short_expiry {
            store.set_alert_cooldown(&AlertCooldown {
                activated_at: cooldown.activated_at,
                expires_at: short_expiry,
            })?;
            tracing::info!(expires_at = %short_expiry, "Alert condition cleared, cooldown shortened");
            return Ok(AlertDecision::Suppressed {
                expires_at: short_expiry,
                shortened: true,
            });
        }
        return Ok(AlertDecision::Suppressed {
            expires_at: cooldown.expires_at,
            shortened: false,
        });
    }

    if !breach.any() {
        tracing::debug!(queue_length = items.len(), "Alert conditions not met");
        return Ok(AlertDecision::Quiet);
    }

    let dominant = if breach.size {
        dominant_posts(items, config.dominant_post_pct)
    } else {
        Vec::new()
    };
    let message = compose_message(config, items, &breach.aged, breach.oldest, &dominant, now);

    let delivered = match notifier.notify(&message).await {
        Ok(()) => true,
        Err(e) => {
            tracing::warn!(error = %e, "Failed to deliver queue alert");
            false
        }
    };

    store.set_alert_cooldown(&AlertCooldown {
        activated_at: now,
        expires_at: now + Duration::seconds(config.cooldown_secs as i64),
    })?;

    tracing::info!(
        queue_length = items.len(),
        size_breach = breach.size,
        aged_items = breach.aged.len(),
        delivered,
        "Queue alert fired"
    );
    Ok(AlertDecision::Fired {
        delivered,
        size_breach: breach.size,
        aged_items: breach.aged.len(),
        dominant_posts: dominant,
    })
}

#[cfg(test)]
mod tests {
    use std::sync::Mutex;

    use chrono::TimeZone;
    use tempfile::tempdir;

    use super::*;
    use crate::monitor::types::{QueueReason, Target};
    use crate::services::webhook::NotifyError;

    #[derive(Default)]
    struct RecordingNotifier {
        sent: Mutex<Vec<String>>,
        fail: bool,
    }

    impl Notifier for RecordingNotifier {
        async fn notify(&self, message: &str) -> Result<(), NotifyError> {
            self.sent.lock().unwrap().push(message.to_string());
            if self.fail {
                Err(NotifyError::Rejected { status: 500 })
            } else {
                Ok(())
            }
        }
    }

    impl RecordingNotifier {
        fn count(&self) -> usize {
            self.sent.lock().unwrap().len()
        }
    }

    fn open_store(name: &str) -> (tempfile::TempDir, Store) {
        let dir = tempdir().unwrap();
        let store = Store::open(dir.path().join(name).to_str().unwrap()).unwrap();
        (dir, store)
    }

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 7, 1, 12, 0, 0).unwrap()
    }

    fn config() -> AlertConfig {
        AlertConfig {
            webhook_url: Some("https://discord.com/api/webhooks/1/x".into()),
            role_id: Some("1234".into()),
            queue_link: Some("https://example.com/modqueue".into()),
            ..AlertConfig::default()
        }
    }

    fn queue(n: usize, parent: impl Fn(usize) -> String) -> Vec<QueueItem> {
        (0..n)
            .map(|i| QueueItem {
                target: Target::comment(format!("t1_{i}"), parent(i)),
                removed_by_automation: true,
                removed_by_platform: false,
                report_count: 0,
                queued_at: None,
                permalink: None,
            })
            .collect()
    }

    fn pending_at(id: &str, at: DateTime<Utc>) -> PendingItem {
        PendingItem::new(&Target::post(id), at, QueueReason::AutomatedFilter)
    }

    #[tokio::test]
    async fn size_breach_fires_and_starts_cooldown() {
        let (_dir, store) = open_store("alert-fire");
        let notifier = RecordingNotifier::default();
        let items = queue(35, |i| format!("t3_{}", i % 10));

        let decision = check_alerting(&store, &notifier, &config(), &items, &[], now())
            .await
            .unwrap();

        assert!(matches!(
            decision,
            AlertDecision::Fired {
                delivered: true,
                size_breach: true,
                ..
            }
        ));
        assert_eq!(notifier.count(), 1);
        let message = notifier.sent.lock().unwrap()[0].clone();
        assert!(message.contains("currently 35 items"));
        assert!(message.contains("<@&1234>"));

        let cooldown = store.get_alert_cooldown(now()).unwrap().unwrap();
        assert_eq!(cooldown.expires_at, now() + Duration::hours(24));
    }

    #[tokio::test]
    async fn unreadable_cooldown_does_not_block_alerts() {
        let (_dir, store) = open_store("alert-corrupt");
        store
            .alert_state
            .insert(crate::store::keys::ALERT_COOLDOWN_KEY.as_bytes(), b"not json".to_vec())
            .unwrap();
        let notifier = RecordingNotifier::default();
        let items = queue(35, |i| format!("t3_{}", i % 10));

        let decision = check_alerting(&store, &notifier, &config(), &items, &[], now())
            .await
            .unwrap();

        assert!(matches!(decision, AlertDecision::Fired { delivered: true, .. }));
        assert_eq!(notifier.count(), 1);
        assert!(store.get_alert_cooldown(now()).unwrap().is_some());
    }

    #[tokio::test]
    async fn active_cooldown_suppresses_everything() {
        let (_dir, store) = open_store("alert-suppress");
        let notifier = RecordingNotifier::default();
        let items = queue(40, |_| "t3_p".to_string());

        check_alerting(&store, &notifier, &config(), &items, &[], now())
            .await
            .unwrap();
        let later = now() + Duration::hours(5);
        let decision = check_alerting(&store, &notifier, &config(), &items, &[], later)
            .await
            .unwrap();

        assert_eq!(
            decision,
            AlertDecision::Suppressed {
                expires_at: now() + Duration::hours(24),
                shortened: false
            }
        );
        assert_eq!(notifier.count(), 1);
    }

    #[tokio::test]
    async fn cleared_condition_shortens_but_never_extends() {
        let (_dir, store) = open_store("alert-shorten");
        let notifier = RecordingNotifier::default();
        check_alerting(&store, &notifier, &config(), &queue(31, |_| "t3_a".into()), &[], now())
            .await
            .unwrap();

        let cleared_at = now() + Duration::hours(1);
        let decision = check_alerting(&store, &notifier, &config(), &[], &[], cleared_at)
            .await
            .unwrap();
        let short = cleared_at + Duration::seconds(870);
        assert_eq!(
            decision,
            AlertDecision::Suppressed {
                expires_at: short,
                shortened: true
            }
        );

        let a_bit_later = cleared_at + Duration::minutes(5);
        let decision = check_alerting(&store, &notifier, &config(), &[], &[], a_bit_later)
            .await
            .unwrap();
        assert_eq!(
            decision,
            AlertDecision::Suppressed {
                expires_at: short,
                shortened: false
            }
        );

        let after_expiry = short + Duration::seconds(1);
        let decision = check_alerting(&store, &notifier, &config(), &[], &[], after_expiry)
            .await
            .unwrap();
        assert_eq!(decision, AlertDecision::Quiet);
        assert_eq!(notifier.count(), 1);
    }

    #[tokio::test]
    async fn aged_item_alone_triggers() {
        let (_dir, store) = open_store("alert-aged");
        let notifier = RecordingNotifier::default();
        let items = queue(2, |_| "t3_z".into());
        let pending = vec![
            pending_at("t1_0", now() - Duration::hours(30)),
            pending_at("t1_1", now() - Duration::hours(1)),
        ];

        let decision = check_alerting(&store, &notifier, &config(), &items, &pending, now())
            .await
            .unwrap();
        assert!(matches!(
            decision,
            AlertDecision::Fired {
                size_breach: false,
                aged_items: 1,
                ..
            }
        ));
        assert!(notifier.sent.lock().unwrap()[0].contains("1 item is over 24 hours old."));
    }

    #[tokio::test]
    async fn failed_delivery_still_starts_cooldown() {
        let (_dir, store) = open_store("alert-failed");
        let notifier = RecordingNotifier {
            fail: true,
            ..RecordingNotifier::default()
        };

        let decision = check_alerting(&store, &notifier, &config(), &queue(30, |_| "t3_q".into()), &[], now())
            .await
            .unwrap();
        assert!(matches!(decision, AlertDecision::Fired { delivered: false, .. }));
        assert!(store.get_alert_cooldown(now()).unwrap().is_some());
    }

    #[tokio::test]
    async fn disabled_or_unconfigured_does_nothing() {
        let (_dir, store) = open_store("alert-disabled");
        let notifier = RecordingNotifier::default();
        let items = queue(100, |_| "t3_q".into());

        let off = AlertConfig {
            enabled: false,
            ..config()
        };
        let no_hook = AlertConfig {
            webhook_url: None,
            ..config()
        };
        for cfg in [off, no_hook] {
            let decision = check_alerting(&store, &notifier, &cfg, &items, &[], now())
                .await
                .unwrap();
            assert_eq!(decision, AlertDecision::Disabled);
        }
        assert_eq!(notifier.count(), 0);
    }

    #[tokio::test]
    async fn below_threshold_is_quiet() {
        let (_dir, store) = open_store("alert-quiet");
        let notifier = RecordingNotifier::default();
        let decision = check_alerting(&store, &notifier, &config(), &queue(29, |_| "t3_q".into()), &[], now())
            .await
            .unwrap();
        assert_eq!(decision, AlertDecision::Quiet);
    }

    #[test]
    fn dominant_posts_respect_threshold() {
        let items = queue(100, |i| {
            if i < 45 {
                "t3_big".to_string()
            } else if i < 75 {
                "t3_mid".to_string()
            } else {
                format!("t3_small{i}")
            }
        });

        let posts = dominant_posts(&items, 40);
        assert_eq!(
            posts,
            vec![DominantPost {
                post_id: "t3_big".into(),
                count: 45,
                share_pct: 45
            }]
        );
        assert!(dominant_posts(&items, 0).is_empty());
        assert_eq!(dominant_posts(&items, 30).len(), 2);
    }

    #[test]
    fn message_without_aged_items_reports_oldest_age() {
        let items = queue(1, |_| "t3_q".into());
        let oldest = pending_at("t1_0", now() - Duration::minutes(90));
        let message = compose_message(&config(), &items, &[], Some(&oldest), &[], now());
        assert!(message.starts_with("The [modqueue](<https://example.com/modqueue>) needs attention."));
        assert!(message.contains("There is currently 1 item in the queue"));
        assert!(message.contains("* Oldest queue item: 1 hour 30 minutes"));
    }
}
