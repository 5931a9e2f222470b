use std::collections::BTreeSet;
use std::sync::Arc;

use chrono::SubsecRound;
use tokio::sync::broadcast;
use tracing::{debug, info, warn};
use uuid::Uuid;

use glimpse_types::api::ViewerEntry;
use glimpse_types::events::StoryEvent;
use glimpse_types::models::{AuthorDisplay, MediaType, Story, StoryGroup};

use crate::clock::Clock;
use crate::error::StoryError;
use crate::feed::Subscription;
use crate::policy;
use crate::profiles::ProfileLookup;
use crate::store::StoryStore;

/// Longest caption accepted at creation.
pub const MAX_CAPTION_CHARS: usize = 100;

/// Input to `StoryService::create_story`.
#[derive(Debug, Clone)]
pub struct NewStory {
    pub media_url: String,
    pub media_type: MediaType,
    pub caption: Option<String>,
}

impl NewStory {
    pub fn image(media_url: impl Into<String>) -> Self {
        Self {
            media_url: media_url.into(),
            media_type: MediaType::Image,
            caption: None,
        }
    }

    pub fn with_caption(mut self, caption: impl Into<String>) -> Self {
        self.caption = Some(caption.into());
        self
    }
}

/// The stories core: one store, one profile directory, one clock.
#[derive(Clone)]
pub struct StoryService {
    store: Arc<dyn StoryStore>,
    profiles: Arc<dyn ProfileLookup>,
    clock: Arc<dyn Clock>,
}

impl StoryService {
    pub fn new(store: Arc<dyn StoryStore>, profiles: Arc<dyn ProfileLookup>, clock: Arc<dyn Clock>) -> Self {
        Self { store, profiles, clock }
    }

    pub fn create_story(&self, author_id: &str, new: NewStory) -> Result<Story, StoryError> {
        let (media_url, caption) = validate(author_id, new.media_url, new.caption)?;

        // SQLite keeps microseconds; truncate so every backend agrees.
        let created_at = self.clock.now().trunc_subsecs(6);
        let story = Story {
            id: Uuid::new_v4(),
            author_id: author_id.to_string(),
            media_url,
            media_type: new.media_type,
            caption,
            created_at,
            viewed_by: BTreeSet::new(),
        };

        self.store.insert(&story).map_err(StoryError::Unavailable)?;
        info!("Story {} created by {}", story.id, author_id);
        Ok(story)
    }

    /// Adds `viewer_id` to the story's viewers. Unknown stories, repeat views
    /// and the author viewing their own story are all silent no-ops.
    pub fn record_view(&self, story_id: Uuid, viewer_id: &str) -> Result<(), StoryError> {
        if viewer_id.trim().is_empty() {
            return Err(StoryError::invalid("viewer id must not be empty"));
        }

        let Some(story) = self.get_story(story_id)? else {
            debug!("View of unknown story {} by {} ignored", story_id, viewer_id);
            return Ok(());
        };
        if story.author_id == viewer_id {
            return Ok(());
        }

        let added = self
            .store
            .add_viewer(story_id, viewer_id, self.clock.now())
            .map_err(StoryError::Unavailable)?;
        if added {
            debug!("{} viewed story {}", viewer_id, story_id);
        }
        Ok(())
    }

    pub fn get_story(&self, story_id: Uuid) -> Result<Option<Story>, StoryError> {
        self.store.get(story_id).map_err(StoryError::Unavailable)
    }

    /// All of the author's stories, expired included, oldest first.
    pub fn stories_by_author(&self, author_id: &str) -> Result<Vec<Story>, StoryError> {
        self.store
            .stories_by_author(author_id)
            .map_err(StoryError::Unavailable)
    }

    /// Only the author's stories still inside the visibility window.
    pub fn active_stories_by_author(&self, author_id: &str) -> Result<Vec<Story>, StoryError> {
        let now = self.clock.now();
        let mut stories = self.stories_by_author(author_id)?;
        stories.retain(|s| policy::is_visible(s, now));
        Ok(stories)
    }

    pub fn viewers_of(&self, story_id: Uuid) -> Result<BTreeSet<String>, StoryError> {
        self.store.viewers_of(story_id).map_err(StoryError::Unavailable)
    }

    pub fn views_count(&self, story_id: Uuid) -> Result<usize, StoryError> {
        Ok(self.viewers_of(story_id)?.len())
    }

    /// Viewer ids with display fields, for the author's "viewed by" list.
    pub fn viewer_profiles(&self, story_id: Uuid) -> Result<Vec<ViewerEntry>, StoryError> {
        Ok(self
            .viewers_of(story_id)?
            .into_iter()
            .map(|user_id| ViewerEntry {
                display: self.display_for(&user_id),
                user_id,
            })
            .collect())
    }

    pub fn list_story_groups_for_viewer(&self, viewer_id: &str) -> Result<Vec<StoryGroup>, StoryError> {
        let now = self.clock.now();
        let visible = self
            .store
            .stories_since(policy::cutoff(now))
            .map_err(StoryError::Unavailable)?;

        let groups = policy::group_for_viewer(visible, viewer_id, now, |author_id| self.display_for(author_id));
        debug!("{} story groups for {}", groups.len(), viewer_id);
        Ok(groups)
    }

    /// Deletes stories that have left the visibility window.
    pub fn purge_expired(&self) -> Result<usize, StoryError> {
        let cutoff = policy::cutoff(self.clock.now());
        self.store.purge_before(cutoff).map_err(StoryError::Unavailable)
    }

    pub fn on_stories_changed<F>(&self, callback: F) -> Subscription
    where
        F: Fn(&StoryEvent) + Send + Sync + 'static,
    {
        self.store.on_stories_changed(Arc::new(callback))
    }

    pub fn subscribe(&self) -> broadcast::Receiver<StoryEvent> {
        self.store.feed().subscribe()
    }

    /// Profile display fields, or placeholders when the lookup misses or fails.
    fn display_for(&self, user_id: &str) -> AuthorDisplay {
        match self.profiles.get_profile(user_id) {
            Ok(Some(profile)) => profile.into(),
            Ok(None) => AuthorDisplay::placeholder(),
            Err(e) => {
                warn!("Profile lookup for {} failed: {:#}", user_id, e);
                AuthorDisplay::placeholder()
            }
        }
    }
}

fn validate(
    author_id: &str,
    media_url: String,
    caption: Option<String>,
) -> Result<(String, Option<String>), StoryError> {
    if author_id.trim().is_empty() {
        return Err(StoryError::invalid("author id must not be empty"));
    }

    let media_url = media_url.trim().to_string();
    if media_url.is_empty() {
        return Err(StoryError::invalid("media_url must not be empty"));
    }
    if media_url.chars().any(char::is_whitespace) {
        return Err(StoryError::invalid("media_url must not contain whitespace"));
    }
    let has_host = ["https://", "http://"]
        .iter()
        .find_map(|scheme| media_url.strip_prefix(scheme))
        .is_some_and(|rest| !rest.is_empty());
    if !has_host {
        return Err(StoryError::invalid("media_url must be an http(s) URL"));
    }

    let caption = caption
        .map(|c| c.trim().to_string())
        .filter(|c| !c.is_empty());
    if let Some(c) = &caption {
        if c.chars().count() > MAX_CAPTION_CHARS {
            return Err(StoryError::invalid(format!(
                "caption exceeds {} characters",
                MAX_CAPTION_CHARS
            )));
        }
    }

    Ok((media_url, caption))
}
