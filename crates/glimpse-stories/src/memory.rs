use std::collections::{BTreeSet, HashMap};
use std::sync::RwLock;

use anyhow::{Result, bail};
use chrono::{DateTime, Utc};
use tracing::debug;
use uuid::Uuid;

use glimpse_types::events::StoryEvent;
use glimpse_types::models::Story;

use crate::feed::ChangeFeed;
use crate::store::{StoryStore, sort_oldest_first};

/// Process-local story store. Persistence, when wanted, goes through
/// `StorySnapshot`.
#[derive(Default)]
pub struct MemoryStore {
    stories: RwLock<HashMap<Uuid, Story>>,
    feed: ChangeFeed,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_stories(stories: impl IntoIterator<Item = Story>) -> Self {
        let map = stories.into_iter().map(|s| (s.id, s)).collect();
        Self {
            stories: RwLock::new(map),
            feed: ChangeFeed::new(),
        }
    }

    /// Every story, oldest first.
    pub fn all_stories(&self) -> Vec<Story> {
        let mut all: Vec<Story> = self.read().values().cloned().collect();
        sort_oldest_first(&mut all);
        all
    }

    fn read(&self) -> std::sync::RwLockReadGuard<'_, HashMap<Uuid, Story>> {
        self.stories.read().unwrap_or_else(|e| e.into_inner())
    }

    fn write(&self) -> std::sync::RwLockWriteGuard<'_, HashMap<Uuid, Story>> {
        self.stories.write().unwrap_or_else(|e| e.into_inner())
    }

    fn collect_sorted<P>(&self, predicate: P) -> Vec<Story>
    where
        P: Fn(&Story) -> bool,
    {
        let mut out: Vec<Story> = self.read().values().filter(|s| predicate(s)).cloned().collect();
        sort_oldest_first(&mut out);
        out
    }
}

impl StoryStore for MemoryStore {
    fn insert(&self, story: &Story) -> Result<()> {
        {
            let mut stories = self.write();
            if stories.contains_key(&story.id) {
                bail!("Story {} already exists", story.id);
            }
            stories.insert(story.id, story.clone());
        }

        self.feed.publish(StoryEvent::StoryCreated {
            story_id: story.id,
            author_id: story.author_id.clone(),
        });
        Ok(())
    }

    fn get(&self, story_id: Uuid) -> Result<Option<Story>> {
        Ok(self.read().get(&story_id).cloned())
    }

    fn add_viewer(&self, story_id: Uuid, viewer_id: &str, _viewed_at: DateTime<Utc>) -> Result<bool> {
        let author_id = {
            let mut stories = self.write();
            let Some(story) = stories.get_mut(&story_id) else {
                return Ok(false);
            };
            if !story.viewed_by.insert(viewer_id.to_string()) {
                return Ok(false);
            }
            story.author_id.clone()
        };

        self.feed.publish(StoryEvent::StoryViewed {
            story_id,
            author_id,
            viewer_id: viewer_id.to_string(),
        });
        Ok(true)
    }

    fn stories_by_author(&self, author_id: &str) -> Result<Vec<Story>> {
        Ok(self.collect_sorted(|s| s.author_id == author_id))
    }

    fn viewers_of(&self, story_id: Uuid) -> Result<BTreeSet<String>> {
        Ok(self
            .read()
            .get(&story_id)
            .map(|s| s.viewed_by.clone())
            .unwrap_or_default())
    }

    fn stories_since(&self, cutoff: DateTime<Utc>) -> Result<Vec<Story>> {
        Ok(self.collect_sorted(|s| s.created_at > cutoff))
    }

    fn purge_before(&self, cutoff: DateTime<Utc>) -> Result<usize> {
        let removed = {
            let mut stories = self.write();
            let before = stories.len();
            stories.retain(|_, s| s.created_at > cutoff);
            before - stories.len()
        };

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

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeDelta, TimeZone};
    use glimpse_types::models::MediaType;

    fn story(author: &str, created_at: DateTime<Utc>) -> Story {
        Story {
            id: Uuid::new_v4(),
            author_id: author.to_string(),
            media_url: "https://cdn.example.com/s.jpg".to_string(),
            media_type: MediaType::Image,
            caption: None,
            created_at,
            viewed_by: BTreeSet::new(),
        }
    }

    #[test]
    fn duplicate_ids_are_rejected() {
        let store = MemoryStore::new();
        let s = story("alice", Utc::now());
        store.insert(&s).unwrap();
        assert!(store.insert(&s).is_err());
    }

    #[test]
    fn purge_keeps_stories_newer_than_cutoff() {
        let t0 = Utc.with_ymd_and_hms(2026, 2, 1, 0, 0, 0).unwrap();
        let old = story("alice", t0);
        let edge = story("alice", t0 + TimeDelta::hours(1));
        let fresh = story("alice", t0 + TimeDelta::hours(2));
        let store = MemoryStore::from_stories([old.clone(), edge.clone(), fresh.clone()]);

        let removed = store.purge_before(t0 + TimeDelta::hours(1)).unwrap();
        assert_eq!(removed, 2);
        assert_eq!(store.all_stories(), vec![fresh]);
    }

    #[test]
    fn viewer_insert_reports_change_once() {
        let store = MemoryStore::new();
        let s = story("alice", Utc::now());
        store.insert(&s).unwrap();

        assert!(store.add_viewer(s.id, "bob", Utc::now()).unwrap());
        assert!(!store.add_viewer(s.id, "bob", Utc::now()).unwrap());
        assert!(!store.add_viewer(Uuid::new_v4(), "bob", Utc::now()).unwrap());
    }
}
