use std::collections::BTreeSet;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Placeholder shown when an author's profile cannot be resolved.
pub const UNKNOWN_USERNAME: &str = "unknown";
pub const UNKNOWN_DISPLAY_NAME: &str = "Unknown user";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MediaType {
    Image,
    Video,
}

impl MediaType {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Image => "image",
            Self::Video => "video",
        }
    }
}

impl std::str::FromStr for MediaType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "image" => Ok(Self::Image),
            "video" => Ok(Self::Video),
            other => Err(format!("unknown media type: {}", other)),
        }
    }
}

/// An ephemeral post. Media bytes live on an external host; only the URL is kept.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Story {
    pub id: Uuid,
    pub author_id: String,
    pub media_url: String,
    pub media_type: MediaType,
    pub caption: Option<String>,
    pub created_at: DateTime<Utc>,
    #[serde(default)]
    pub viewed_by: BTreeSet<String>,
}

impl Story {
    pub fn views_count(&self) -> usize {
        self.viewed_by.len()
    }

    pub fn seen_by(&self, user_id: &str) -> bool {
        self.viewed_by.contains(user_id)
    }
}

/// Profile as returned by the user directory.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Profile {
    pub user_id: String,
    pub username: String,
    pub display_name: String,
    pub avatar_url: Option<String>,
}

/// Display fields attached to a story group or viewer entry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuthorDisplay {
    pub username: String,
    pub display_name: String,
    pub avatar_url: Option<String>,
}

impl AuthorDisplay {
    pub fn placeholder() -> Self {
        Self {
            username: UNKNOWN_USERNAME.to_string(),
            display_name: UNKNOWN_DISPLAY_NAME.to_string(),
            avatar_url: None,
        }
    }
}

impl From<Profile> for AuthorDisplay {
    fn from(p: Profile) -> Self {
        Self {
            username: p.username,
            display_name: p.display_name,
            avatar_url: p.avatar_url,
        }
    }
}

/// Derived per-author bundle of currently visible stories. Never persisted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoryGroup {
    pub author_id: String,
    pub author: AuthorDisplay,
    /// Oldest first; this is playback order.
    pub stories: Vec<Story>,
    pub has_unread: bool,
}
