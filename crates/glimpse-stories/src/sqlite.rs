use std::collections::{BTreeSet, HashMap};
use std::sync::Arc;

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use tracing::{debug, warn};
use uuid::Uuid;

use glimpse_db::Database;
use glimpse_db::models::{ProfileRow, StoryRow, format_timestamp, parse_timestamp};
use glimpse_types::events::StoryEvent;
use glimpse_types::models::{MediaType, Profile, Story};

use crate::feed::ChangeFeed;
use crate::profiles::{ProfileDirectory, ProfileLookup};
use crate::store::StoryStore;

/// `StoryStore` over the SQLite database.
pub struct SqliteStore {
    db: Arc<Database>,
    feed: ChangeFeed,
}

impl SqliteStore {
    pub fn new(db: Arc<Database>) -> Self {
        Self {
            db,
            feed: ChangeFeed::new(),
        }
    }

    /// Converts rows and attaches their viewer sets with one batch query.
    /// Corrupt rows are logged and skipped.
    fn hydrate(&self, rows: Vec<StoryRow>) -> Result<Vec<Story>> {
        let ids: Vec<String> = rows.iter().map(|r| r.id.clone()).collect();
        let mut viewers: HashMap<String, BTreeSet<String>> = HashMap::new();
        for v in self.db.get_views_for_stories(&ids)? {
            viewers.entry(v.story_id).or_default().insert(v.viewer_id);
        }

        let stories = rows
            .into_iter()
            .filter_map(|row| {
                let viewed_by = viewers.remove(&row.id).unwrap_or_default();
                match story_from_row(row, viewed_by) {
                    Ok(story) => Some(story),
                    Err(e) => {
                        warn!("Skipping corrupt story row: {:#}", e);
                        None
                    }
                }
            })
            .collect();
        Ok(stories)
    }
}

fn story_from_row(row: StoryRow, viewed_by: BTreeSet<String>) -> Result<Story> {
    Ok(Story {
        id: row
            .id
            .parse::<Uuid>()
            .with_context(|| format!("Corrupt story id '{}'", row.id))?,
        media_type: row
            .media_type
            .parse::<MediaType>()
            .map_err(|e| anyhow::anyhow!("{} on story '{}'", e, row.id))?,
        created_at: parse_timestamp(&row.created_at)?,
        author_id: row.author_id,
        media_url: row.media_url,
        caption: row.caption,
        viewed_by,
    })
}

impl StoryStore for SqliteStore {
    fn insert(&self, story: &Story) -> Result<()> {
        self.db.insert_story(&StoryRow {
            id: story.id.to_string(),
            author_id: story.author_id.clone(),
            media_url: story.media_url.clone(),
            media_type: story.media_type.as_str().to_string(),
            caption: story.caption.clone(),
            created_at: format_timestamp(story.created_at),
        })?;

        self.feed.publish(StoryEvent::StoryCreated {
            story_id: story.id,
            author_id: story.author_id.clone(),
        });
        Ok(())
    }

    fn get(&self, story_id: Uuid) -> Result<Option<Story>> {
        let Some(row) = self.db.get_story(&story_id.to_string())? else {
            return Ok(None);
        };
        Ok(self.hydrate(vec![row])?.pop())
    }

    fn add_viewer(&self, story_id: Uuid, viewer_id: &str, viewed_at: DateTime<Utc>) -> Result<bool> {
        let added = self
            .db
            .insert_view(&story_id.to_string(), viewer_id, &format_timestamp(viewed_at))?;

        if !added {
            return Ok(false);
        }

        match self.db.get_story(&story_id.to_string())? {
            Some(row) => self.feed.publish(StoryEvent::StoryViewed {
                story_id,
                author_id: row.author_id,
                viewer_id: viewer_id.to_string(),
            }),
            // Purged between the insert and the lookup; the view went with it.
            None => debug!("Story {} vanished after view by {}", story_id, viewer_id),
        }
        Ok(true)
    }

    fn stories_by_author(&self, author_id: &str) -> Result<Vec<Story>> {
        let rows = self.db.get_stories_by_author(author_id)?;
        self.hydrate(rows)
    }

    fn viewers_of(&self, story_id: Uuid) -> Result<BTreeSet<String>> {
        Ok(self
            .db
            .get_viewers(&story_id.to_string())?
            .into_iter()
            .collect())
    }

    fn stories_since(&self, cutoff: DateTime<Utc>) -> Result<Vec<Story>> {
        let rows = self.db.get_stories_created_after(&format_timestamp(cutoff))?;
        self.hydrate(rows)
    }

    fn purge_before(&self, cutoff: DateTime<Utc>) -> Result<usize> {
        let removed = self
            .db
            .delete_stories_created_at_or_before(&format_timestamp(cutoff))?;

        if removed > 0 {
            debug!("Purged {} stories created at or before {}", removed, cutoff);
            self.feed.publish(StoryEvent::StoriesExpired { count: removed });
        }
        Ok(removed)
    }

    fn feed(&self) -> &ChangeFeed {
        &self.feed
    }
}

/// Profile directory backed by the `profiles` table.
pub struct SqliteProfiles {
    db: Arc<Database>,
}

impl SqliteProfiles {
    pub fn new(db: Arc<Database>) -> Self {
        Self { db }
    }
}

impl ProfileLookup for SqliteProfiles {
    fn get_profile(&self, user_id: &str) -> Result<Option<Profile>> {
        Ok(self.db.get_profile(user_id)?.map(|row| Profile {
            user_id: row.user_id,
            username: row.username,
            display_name: row.display_name,
            avatar_url: row.avatar_url,
        }))
    }
}

impl ProfileDirectory for SqliteProfiles {
    fn upsert_profile(&self, profile: Profile) -> Result<()> {
        self.db.upsert_profile(&ProfileRow {
            user_id: profile.user_id,
            username: profile.username,
            display_name: profile.display_name,
            avatar_url: profile.avatar_url,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeDelta, TimeZone};

    fn store() -> SqliteStore {
        SqliteStore::new(Arc::new(Database::open_in_memory().unwrap()))
    }

    #[test]
    fn stories_round_trip_through_rows() {
        let store = store();
        let created_at = Utc.with_ymd_and_hms(2026, 4, 2, 9, 15, 30).unwrap() + TimeDelta::microseconds(42);
        let story = Story {
            id: Uuid::new_v4(),
            author_id: "alice".into(),
            media_url: "https://cdn.example.com/clip.mp4".into(),
            media_type: MediaType::Video,
            caption: Some("sunrise".into()),
            created_at,
            viewed_by: BTreeSet::new(),
        };
        store.insert(&story).unwrap();
        store.add_viewer(story.id, "bob", created_at).unwrap();

        let loaded = store.get(story.id).unwrap().unwrap();
        assert_eq!(loaded.created_at, created_at);
        assert_eq!(loaded.media_type, MediaType::Video);
        assert_eq!(loaded.viewed_by, BTreeSet::from(["bob".to_string()]));
        assert!(store.get(Uuid::new_v4()).unwrap().is_none());
    }

    #[test]
    fn corrupt_rows_are_skipped() {
        let db = Arc::new(Database::open_in_memory().unwrap());
        db.insert_story(&StoryRow {
            id: "not-a-uuid".into(),
            author_id: "alice".into(),
            media_url: "https://cdn.example.com/a.jpg".into(),
            media_type: "image".into(),
            caption: None,
            created_at: "2026-04-02T09:00:00.000000Z".into(),
        })
        .unwrap();

        let store = SqliteStore::new(db);
        assert!(store.stories_by_author("alice").unwrap().is_empty());
    }

    #[test]
    fn feed_hydrates_more_stories_than_sqlite_binds() {
        let db = Arc::new(Database::open_in_memory().unwrap());
        let created_at = format_timestamp(Utc.with_ymd_and_hms(2026, 4, 2, 9, 0, 0).unwrap());
        db.with_conn_mut(|conn| {
            let tx = conn.transaction()?;
            for _ in 0..33_000 {
                tx.execute(
                    "INSERT INTO stories (id, author_id, media_url, media_type, created_at)
                     VALUES (?1, 'alice', 'https://cdn.example.com/a.jpg', 'image', ?2)",
                    (Uuid::new_v4().to_string(), &created_at),
                )?;
            }
            tx.commit()?;
            Ok(())
        })
        .unwrap();

        let store = SqliteStore::new(db);
        let cutoff = Utc.with_ymd_and_hms(2026, 4, 1, 9, 0, 0).unwrap();
        assert_eq!(store.stories_since(cutoff).unwrap().len(), 33_000);
    }
}
