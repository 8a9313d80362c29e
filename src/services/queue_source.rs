use std::future::Future;

use chrono::{DateTime, Utc};
use serde::Deserialize;

use crate::config::QueueSourceConfig;
use crate::constants::MAX_QUEUE_LISTING;
use crate::monitor::types::{QueueItem, Target};

/// Live listing of the moderation queue.
pub trait QueueSource: Send + Sync {
    fn fetch_queue(&self) -> impl Future<Output = Result<Vec<QueueItem>, QueueSourceError>> + Send;
}

#[derive(Debug, thiserror::Error)]
pub enum QueueSourceError {
    #[error("queue source is not configured")]
    NotConfigured,
    #[error("queue source request timed out")]
    Timeout,
    #[error("queue source network error: {0}")]
    Network(String),
    #[error("queue source returned status {status}")]
    Status { status: u16 },
    #[error("queue source returned an unreadable body: {0}")]
    Decode(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ListingKind {
    Post,
    Comment,
}

/// One entry as served by the listing endpoint.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ListingEntry {
    pub id: String,
    #[serde(default)]
    pub kind: Option<ListingKind>,
    #[serde(default)]
    pub parent_id: Option<String>,
    #[serde(default)]
    pub removed_by_automation: bool,
    #[serde(default)]
    pub removed_by_platform: bool,
    #[serde(default)]
    pub report_count: u32,
    #[serde(default)]
    pub queued_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub permalink: Option<String>,
}

impl ListingEntry {
    /// A comment without its post id is kept under its own id so it still
    /// counts toward the listing and keeps its ledger entry alive.
    pub fn into_queue_item(self) -> QueueItem {
        let parent = self.parent_id.filter(|p| !p.is_empty() && *p != self.id);
        let target = match (self.kind, parent) {
            (Some(ListingKind::Post), _) | (None, None) => Target::post(self.id),
            (Some(ListingKind::Comment), Some(parent)) | (None, Some(parent)) => {
                Target::comment(self.id, parent)
            }
            (Some(ListingKind::Comment), None) => {
                tracing::warn!(item_id = %self.id, "Queue comment listed without a parent post id");
                Target::comment(self.id.clone(), self.id)
            }
        };
        QueueItem {
            target,
            removed_by_automation: self.removed_by_automation,
            removed_by_platform: self.removed_by_platform,
            report_count: self.report_count,
            queued_at: self.queued_at,
            permalink: self.permalink,
        }
    }
}

/// Convert a raw listing, dropping entries without an id and anything past `limit`.
pub fn listing_to_items(entries: Vec<ListingEntry>, limit: usize) -> Vec<QueueItem> {
    let limit = limit.min(MAX_QUEUE_LISTING);
    entries
        .into_iter()
        .filter(|e| !e.id.is_empty())
        .take(limit)
        .map(ListingEntry::into_queue_item)
        .collect()
}

#[derive(Debug, Clone)]
pub struct HttpQueueSource {
    url: Option<String>,
    token: Option<String>,
    limit: usize,
    client: reqwest::Client,
}

impl HttpQueueSource {
    pub fn new(config: &QueueSourceConfig) -> Self {
        let client = reqwest::Client::builder()
            .timeout(std::time::Duration::from_secs(config.timeout_secs))
            .build()
            .unwrap_or_else(|_| reqwest::Client::new());
        Self {
            url: config.url.clone(),
            token: config.token.clone(),
            limit: config.limit,
            client,
        }
    }

    pub fn is_configured(&self) -> bool {
        self.url.is_some()
    }
}

fn map_request_error(e: reqwest::Error) -> QueueSourceError {
    if e.is_timeout() {
        QueueSourceError::Timeout
    } else if e.is_decode() {
        QueueSourceError::Decode(e.without_url().to_string())
    } else {
        QueueSourceError::Network(e.without_url().to_string())
    }
}

impl QueueSource for HttpQueueSource {
    async fn fetch_queue(&self) -> Result<Vec<QueueItem>, QueueSourceError> {
        let url = self.url.as_deref().ok_or(QueueSourceError::NotConfigured)?;
        let mut request = self
            .client
            .get(url)
            .query(&[("limit", self.limit.to_string())]);
        if let Some(token) = &self.token {
            request = request.bearer_auth(token);
        }

        let response = request.send().await.map_err(map_request_error)?;
        let status = response.status();
        if !status.is_success() {
            return Err(QueueSourceError::Status {
                status: status.as_u16(),
            });
        }
        let entries: Vec<ListingEntry> = response.json().await.map_err(map_request_error)?;
        Ok(listing_to_items(entries, self.limit))
    }
}

#[cfg(test)]
mod tests {
    use chrono::{Duration, TimeZone};

    use super::*;
    use crate::monitor::snapshot::apply_poll;
    use crate::monitor::types::{ItemKind, PendingItem, QueueReason, Series};
    use crate::store::Store;

    fn entries(json: &str) -> Vec<ListingEntry> {
        serde_json::from_str(json).unwrap()
    }

    #[test]
    fn kinds_are_resolved_once() {
        let items = listing_to_items(
            entries(
                r#"[
                {"id":"t3_a","removedByAutomation":true},
                {"id":"t1_b","kind":"comment","parentId":"t3_a","reportCount":2},
                {"id":"t1_c","parentId":"t3_a","removedByPlatform":true,
                 "queuedAt":"2024-05-01T10:00:00Z","permalink":"/r/x/c"}
            ]"#,
            ),
            1000,
        );
        assert_eq!(items.len(), 3);
        assert_eq!(items[0].target.kind, ItemKind::Post);
        assert_eq!(items[0].parent_id(), "t3_a");
        assert_eq!(items[1].target.kind, ItemKind::Comment);
        assert_eq!(items[1].report_count, 2);
        assert_eq!(items[2].target.kind, ItemKind::Comment);
        assert!(items[2].queued_at.is_some());
        assert_eq!(items[2].permalink.as_deref(), Some("/r/x/c"));
    }

    #[test]
    fn comment_without_parent_is_kept_under_its_own_id() {
        let items = listing_to_items(entries(r#"[{"id":"t1_x","kind":"comment"}]"#), 1000);
        assert_eq!(items.len(), 1);
        assert_eq!(items[0].target.kind, ItemKind::Comment);
        assert_eq!(items[0].parent_id(), "t1_x");
    }

    #[test]
    fn parentless_comment_still_listed_keeps_its_ledger_entry() {
        let dir = tempfile::tempdir().unwrap();
        let store = Store::open(dir.path().join("listing-db").to_str().unwrap()).unwrap();
        let t0 = Utc.with_ymd_and_hms(2024, 4, 2, 9, 0, 0).unwrap();
        store
            .track_pending_item(&PendingItem::new(
                &Target::comment("t1_x", "t3_p"),
                t0,
                QueueReason::AutomatedFilter,
            ))
            .unwrap();

        let items = listing_to_items(
            entries(r#"[{"id":"t1_x","kind":"comment","removedByAutomation":true}]"#),
            1000,
        );
        let outcome = apply_poll(&store, &items, t0 + Duration::minutes(10)).unwrap();

        assert_eq!(outcome.queue_length, 1);
        assert!(outcome.resolved.is_empty());
        assert!(store.get_pending_item("t1_x").unwrap().is_some());
        assert!(store.read_raw_all(Series::ActionDelay).unwrap().is_empty());
        let lengths = store.read_raw_all(Series::QueueLength).unwrap();
        assert_eq!(lengths[0].value, 1.0);
    }

    #[test]
    fn listing_is_truncated() {
        let raw: Vec<ListingEntry> = (0..1200)
            .map(|i| ListingEntry {
                id: format!("t3_{i}"),
                kind: None,
                parent_id: None,
                removed_by_automation: true,
                removed_by_platform: false,
                report_count: 0,
                queued_at: None,
                permalink: None,
            })
            .collect();
        assert_eq!(listing_to_items(raw.clone(), 5000).len(), 1000);
        assert_eq!(listing_to_items(raw, 10).len(), 10);
    }

    #[tokio::test]
    async fn unconfigured_source_errors() {
        let source = HttpQueueSource::new(&QueueSourceConfig {
            url: None,
            token: None,
            limit: 1000,
            timeout_secs: 1,
        });
        assert!(!source.is_configured());
        assert!(matches!(
            source.fetch_queue().await,
            Err(QueueSourceError::NotConfigured)
        ));
    }
}
