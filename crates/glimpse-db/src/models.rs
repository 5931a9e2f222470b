//! Database row types: these map directly to SQLite rows.
//! Distinct from the glimpse-types models to keep the DB layer independent.

use anyhow::{Result, anyhow};
use chrono::{DateTime, SecondsFormat, Utc};

pub struct StoryRow {
    pub id: String,
    pub author_id: String,
    pub media_url: String,
    pub media_type: String,
    pub caption: Option<String>,
    pub created_at: String,
}

pub struct ViewRow {
    pub story_id: String,
    pub viewer_id: String,
}

pub struct ProfileRow {
    pub user_id: String,
    pub username: String,
    pub display_name: String,
    pub avatar_url: Option<String>,
}

/// Fixed-width RFC 3339 so that text comparison in SQL matches time order.
pub fn format_timestamp(ts: DateTime<Utc>) -> String {
    ts.to_rfc3339_opts(SecondsFormat::Micros, true)
}

pub fn parse_timestamp(raw: &str) -> Result<DateTime<Utc>> {
    raw.parse::<DateTime<Utc>>()
        .or_else(|_| {
            // SQLite's datetime('now') has no timezone; treat it as UTC.
            chrono::NaiveDateTime::parse_from_str(raw, "%Y-%m-%d %H:%M:%S").map(|ndt| ndt.and_utc())
        })
        .map_err(|e| anyhow!("Corrupt timestamp '{}': {}", raw, e))
}
