use std::collections::BTreeSet;

use anyhow::Result;
use chrono::{DateTime, Utc};
use uuid::Uuid;

use glimpse_types::models::Story;

use crate::feed::{ChangeFeed, Listener, Subscription};

/// Canonical story storage. Implementations publish a `StoryEvent` on their
/// feed after every mutation that changed state.
///
/// Any `Err` means the backing store itself failed; unknown ids are reported
/// as `None`, `false` or empty collections.
pub trait StoryStore: Send + Sync {
    fn insert(&self, story: &Story) -> Result<()>;

    fn get(&self, story_id: Uuid) -> Result<Option<Story>>;

    /// Set-insert into `viewed_by`. Returns whether the set changed.
    fn add_viewer(&self, story_id: Uuid, viewer_id: &str, viewed_at: DateTime<Utc>) -> Result<bool>;

    /// Every story by the author, expired included, oldest first.
    fn stories_by_author(&self, author_id: &str) -> Result<Vec<Story>>;

    fn viewers_of(&self, story_id: Uuid) -> Result<BTreeSet<String>>;

    /// Stories with `created_at > cutoff`.
    fn stories_since(&self, cutoff: DateTime<Utc>) -> Result<Vec<Story>>;

    /// Removes stories with `created_at <= cutoff`. Returns how many went.
    fn purge_before(&self, cutoff: DateTime<Utc>) -> Result<usize>;

    fn feed(&self) -> &ChangeFeed;

    fn on_stories_changed(&self, listener: Listener) -> Subscription {
        self.feed().on_change(listener)
    }
}

/// Oldest first, id as tie-breaker so equal timestamps still order stably.
pub(crate) fn sort_oldest_first(stories: &mut [Story]) {
    stories.sort_by(|a, b| a.created_at.cmp(&b.created_at).then_with(|| a.id.cmp(&b.id)));
}
