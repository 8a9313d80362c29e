//! Inbound moderation-action and report events.
//!
//! Payloads are deserialized leniently and resolved into a [`Target`] once, so
//! nothing downstream has to sniff whether it deals with a post or a comment.

use chrono::{DateTime, Utc};
use serde::Deserialize;
use thiserror::Error;

use crate::monitor::types::Target;

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PostRef {
    #[serde(default)]
    pub id: String,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CommentRef {
    #[serde(default)]
    pub id: String,
    #[serde(default)]
    pub post_id: String,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ModActionEvent {
    #[serde(default)]
    pub action: Option<String>,
    #[serde(default)]
    pub moderator: Option<String>,
    #[serde(default)]
    pub target_post: Option<PostRef>,
    #[serde(default)]
    pub target_comment: Option<CommentRef>,
    #[serde(default)]
    pub actioned_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReportEvent {
    #[serde(default)]
    pub target_post: Option<PostRef>,
    #[serde(default)]
    pub target_comment: Option<CommentRef>,
    #[serde(default)]
    pub reported_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ActionKind {
    Approve,
    Remove,
    Spam,
}

impl ActionKind {
    /// Accepts the generic names and the post/comment specific variants.
    pub fn parse(action: &str) -> Option<Self> {
        match action.trim().to_ascii_lowercase().as_str() {
            "approve" | "approvelink" | "approvecomment" => Some(Self::Approve),
            "remove" | "removelink" | "removecomment" => Some(Self::Remove),
            "spam" | "spamlink" | "spamcomment" => Some(Self::Spam),
            _ => None,
        }
    }

    pub fn is_removal(self) -> bool {
        matches!(self, Self::Remove | Self::Spam)
    }
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum EventShapeError {
    #[error("event has neither a target post nor a target comment")]
    MissingTarget,
    #[error("event is missing `{0}`")]
    MissingField(&'static str),
    #[error("unsupported action `{0}`")]
    UnsupportedAction(String),
}

/// A comment target wins over a post target when both are present.
pub fn resolve_target(
    post: Option<&PostRef>,
    comment: Option<&CommentRef>,
) -> Result<Target, EventShapeError> {
    if let Some(comment) = comment.filter(|c| !c.id.is_empty()) {
        if comment.post_id.is_empty() {
            return Err(EventShapeError::MissingField("targetComment.postId"));
        }
        return Ok(Target::comment(&comment.id, &comment.post_id));
    }
    if let Some(post) = post.filter(|p| !p.id.is_empty()) {
        return Ok(Target::post(&post.id));
    }
    Err(EventShapeError::MissingTarget)
}

/// A mod action with every required field present.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ModAction {
    pub kind: ActionKind,
    pub moderator: String,
    pub target: Target,
    pub actioned_at: DateTime<Utc>,
}

impl TryFrom<&ModActionEvent> for ModAction {
    type Error = EventShapeError;

    fn try_from(event: &ModActionEvent) -> Result<Self, Self::Error> {
        let action = event
            .action
            .as_deref()
            .filter(|a| !a.is_empty())
            .ok_or(EventShapeError::MissingField("action"))?;
        let kind = ActionKind::parse(action)
            .ok_or_else(|| EventShapeError::UnsupportedAction(action.to_string()))?;
        let moderator = event
            .moderator
            .clone()
            .filter(|m| !m.is_empty())
            .ok_or(EventShapeError::MissingField("moderator"))?;
        let actioned_at = event
            .actioned_at
            .ok_or(EventShapeError::MissingField("actionedAt"))?;
        let target = resolve_target(event.target_post.as_ref(), event.target_comment.as_ref())?;

        Ok(Self {
            kind,
            moderator,
            target,
            actioned_at,
        })
    }
}
