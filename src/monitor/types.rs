use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

/// The two independent metric series.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Series {
    QueueLength,
    ActionDelay,
}

impl Series {
    pub const ALL: [Series; 2] = [Series::QueueLength, Series::ActionDelay];

    pub fn as_str(self) -> &'static str {
        match self {
            Self::QueueLength => "queue_length",
            Self::ActionDelay => "action_delay",
        }
    }
}

impl std::fmt::Display for Series {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One point of either series: a raw poll (`sample_count == 1`) or a compacted
/// hour. For queue length `value` is the queue size, for action delay it is the
/// dwell time in seconds.
///
/// Invariant: `max_value >= value`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Sample {
    pub timestamp: DateTime<Utc>,
    pub value: f64,
    pub max_value: f64,
    pub sample_count: u64,
}

impl Sample {
    pub fn raw(timestamp: DateTime<Utc>, value: f64) -> Self {
        Self {
            timestamp,
            value,
            max_value: value,
            sample_count: 1,
        }
    }

    pub fn timestamp_ms(&self) -> i64 {
        self.timestamp.timestamp_millis()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum ItemKind {
    Post,
    Comment,
}

/// A post or comment, resolved once at ingestion. For posts `parent_id == id`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Target {
    pub kind: ItemKind,
    pub id: String,
    pub parent_id: String,
}

impl Target {
    pub fn post(id: impl Into<String>) -> Self {
        let id = id.into();
        Self {
            kind: ItemKind::Post,
            parent_id: id.clone(),
            id,
        }
    }

    pub fn comment(id: impl Into<String>, post_id: impl Into<String>) -> Self {
        Self {
            kind: ItemKind::Comment,
            id: id.into(),
            parent_id: post_id.into(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum QueueReason {
    AutomatedFilter,
    UpstreamFilter,
    UserReport,
}

impl QueueReason {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::AutomatedFilter => "automated_filter",
            Self::UpstreamFilter => "upstream_filter",
            Self::UserReport => "user_report",
        }
    }
}

/// Ledger entry for an item waiting on a moderator. Immutable once created.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PendingItem {
    pub item_id: String,
    pub parent_id: String,
    pub kind: ItemKind,
    pub queue_entered_at: DateTime<Utc>,
    pub reason: QueueReason,
}

impl PendingItem {
    pub fn new(target: &Target, queue_entered_at: DateTime<Utc>, reason: QueueReason) -> Self {
        Self {
            item_id: target.id.clone(),
            parent_id: target.parent_id.clone(),
            kind: target.kind,
            queue_entered_at,
            reason,
        }
    }

    pub fn age_at(&self, now: DateTime<Utc>) -> Duration {
        (now - self.queue_entered_at).max(Duration::zero())
    }

    /// Dwell time in whole seconds, never negative.
    pub fn dwell_seconds(&self, resolved_at: DateTime<Utc>) -> i64 {
        self.age_at(resolved_at).num_seconds()
    }
}

/// One entry of the live queue listing.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QueueItem {
    pub target: Target,
    pub removed_by_automation: bool,
    pub removed_by_platform: bool,
    pub report_count: u32,
    /// Removal or first-report time, when the source knows it.
    pub queued_at: Option<DateTime<Utc>>,
    pub permalink: Option<String>,
}

impl QueueItem {
    pub fn id(&self) -> &str {
        &self.target.id
    }

    pub fn parent_id(&self) -> &str {
        &self.target.parent_id
    }

    /// Why this item sits in the queue; `None` when it is neither filtered nor reported.
    pub fn queue_reason(&self) -> Option<QueueReason> {
        if self.removed_by_automation {
            Some(QueueReason::AutomatedFilter)
        } else if self.removed_by_platform {
            Some(QueueReason::UpstreamFilter)
        } else if self.report_count > 0 {
            Some(QueueReason::UserReport)
        } else {
            None
        }
    }
}
