use chrono::{DateTime, Utc};
use serde_json::{json, Value};

use modqueue_monitor::monitor::types::{QueueItem, Target};

pub fn filtered_comment(id: &str, post_id: &str, queued_at: Option<DateTime<Utc>>) -> QueueItem {
    QueueItem {
        target: Target::comment(id, post_id),
        removed_by_automation: true,
        removed_by_platform: false,
        report_count: 0,
        queued_at,
        permalink: None,
    }
}

pub fn reported_post(id: &str, reports: u32) -> QueueItem {
    QueueItem {
        target: Target::post(id),
        removed_by_automation: false,
        removed_by_platform: false,
        report_count: reports,
        queued_at: None,
        permalink: None,
    }
}

pub fn mod_action_on_comment(
    action: &str,
    moderator: &str,
    comment_id: &str,
    post_id: &str,
    at: DateTime<Utc>,
) -> Value {
    json!({
        "action": action,
        "moderator": moderator,
        "targetComment": { "id": comment_id, "postId": post_id },
        "actionedAt": at.to_rfc3339(),
    })
}

pub fn mod_action_on_post(action: &str, moderator: &str, post_id: &str, at: DateTime<Utc>) -> Value {
    json!({
        "action": action,
        "moderator": moderator,
        "targetPost": { "id": post_id },
        "actionedAt": at.to_rfc3339(),
    })
}

pub fn report_on_post(post_id: &str, at: DateTime<Utc>) -> Value {
    json!({
        "targetPost": { "id": post_id },
        "reportedAt": at.to_rfc3339(),
    })
}
