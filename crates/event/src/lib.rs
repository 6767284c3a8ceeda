//! Inbound webhook payload model and event normalization.
//!
//! A webhook push arrives as a loosely structured JSON object tagged by a
//! `push_type` field. Normalization maps it onto the fixed four-column
//! [`ActivityRecord`] that the store persists. The mapping is pure and
//! total apart from one case: a payload without a `push_type` tag cannot be
//! classified and is rejected at the ingress boundary. Every other missing
//! field degrades to an empty string.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// The tag distinguishing inbound event kinds. The set is open: tags we do
/// not recognize are carried through verbatim as [`EventKind::Other`].
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum EventKind {
    NewPost,
    ProfileUpdate,
    NewFollower,
    Other(String),
}

impl EventKind {
    pub fn parse(tag: &str) -> Self {
        match tag {
            "new_tweet" => Self::NewPost,
            "profile_update" => Self::ProfileUpdate,
            "new_follower" => Self::NewFollower,
            other => Self::Other(other.to_string()),
        }
    }

    /// Canonical tag stored in the `event_type` column.
    pub fn as_str(&self) -> &str {
        match self {
            Self::NewPost => "new_tweet",
            Self::ProfileUpdate => "profile_update",
            Self::NewFollower => "new_follower",
            Self::Other(tag) => tag,
        }
    }
}

/// One persisted row of the activity store. All four fields are always
/// populated; the empty string stands in for absent data, never a null.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ActivityRecord {
    pub timestamp: DateTime<Utc>,
    pub user_name: String,
    pub event_type: String,
    pub content: String,
}

// ── Wire payload ─────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Default, Deserialize)]
pub struct WebhookPayload {
    pub push_type: Option<String>,
    #[serde(default)]
    pub user: Option<UserInfo>,
    #[serde(default)]
    pub tweet: Option<PostInfo>,
    #[serde(default)]
    pub follow_user: Option<FollowUser>,
    /// Generic fallback body used by unrecognized kinds.
    #[serde(default)]
    pub content: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct UserInfo {
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
    /// Epoch seconds of the user object's last update. Fractional values
    /// are accepted because some senders emit sub-second precision.
    #[serde(default)]
    pub updated_at: Option<f64>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct PostInfo {
    #[serde(default)]
    pub text: Option<String>,
    #[serde(default)]
    pub title: Option<String>,
    /// Epoch seconds the post was published.
    #[serde(default)]
    pub publish_time: Option<f64>,
    #[serde(default)]
    pub is_reply: bool,
    #[serde(default)]
    pub is_quote: bool,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct FollowUser {
    #[serde(default)]
    pub name: Option<String>,
}

#[derive(Debug, thiserror::Error)]
pub enum NormalizeError {
    #[error("payload is missing the push_type field")]
    MissingKind,
}

/// Map an inbound payload onto a store row.
///
/// Timestamp precedence: the post's `publish_time`, else the user object's
/// `updated_at`, else `now` (the ingestion wall clock supplied by the
/// caller). Content is derived per kind; missing nested fields never fail,
/// they collapse to the empty string.
pub fn normalize(
    payload: &WebhookPayload,
    now: DateTime<Utc>,
) -> Result<ActivityRecord, NormalizeError> {
    let tag = payload.push_type.as_deref().ok_or(NormalizeError::MissingKind)?;
    let kind = EventKind::parse(tag);

    let epoch = payload
        .tweet
        .as_ref()
        .and_then(|t| t.publish_time)
        .or_else(|| payload.user.as_ref().and_then(|u| u.updated_at));
    let timestamp = epoch.and_then(datetime_from_epoch).unwrap_or(now);

    let user_name = payload
        .user
        .as_ref()
        .and_then(|u| u.name.clone())
        .unwrap_or_default();

    let content = derive_content(&kind, payload);

    Ok(ActivityRecord {
        timestamp,
        user_name,
        event_type: kind.as_str().to_string(),
        content,
    })
}

fn derive_content(kind: &EventKind, payload: &WebhookPayload) -> String {
    match kind {
        EventKind::NewPost => {
            let Some(post) = payload.tweet.as_ref() else {
                return String::new();
            };
            let text = post.text.as_deref().unwrap_or_default();
            if post.is_reply || post.is_quote {
                let title = post.title.as_deref().unwrap_or_default();
                format!("{title} - {text}")
            } else {
                text.to_string()
            }
        }
        EventKind::ProfileUpdate => payload
            .user
            .as_ref()
            .and_then(|u| u.description.clone())
            .unwrap_or_default(),
        EventKind::NewFollower => {
            let name = payload
                .follow_user
                .as_ref()
                .and_then(|f| f.name.as_deref())
                .unwrap_or_default();
            format!("followed user: {name}")
        }
        EventKind::Other(_) => payload.content.clone().unwrap_or_default(),
    }
}

fn datetime_from_epoch(secs: f64) -> Option<DateTime<Utc>> {
    if !secs.is_finite() {
        return None;
    }
    let whole = secs.trunc() as i64;
    let nanos = (secs.fract().abs() * 1e9) as u32;
    DateTime::from_timestamp(whole, nanos)
}

// ── Tests ────────────────────────────────────────────────────────────────────
