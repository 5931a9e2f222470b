//! Visibility window and per-author grouping.
//!
//! Everything here is a pure function of the story set, the viewer and
//! "now"; nothing is cached between calls.

use std::cmp::Ordering;
use std::collections::BTreeMap;

use chrono::{DateTime, TimeDelta, Utc};

use glimpse_types::models::{AuthorDisplay, Story, StoryGroup};

use crate::store::sort_oldest_first;

/// How long a story stays visible after creation.
pub const VISIBILITY_WINDOW_HOURS: i64 = 24;

/// Stories created at or before this instant are no longer visible.
pub fn cutoff(now: DateTime<Utc>) -> DateTime<Utc> {
    now - TimeDelta::hours(VISIBILITY_WINDOW_HOURS)
}

/// `now - created_at < 24h`. A story exactly 24h old is hidden.
pub fn is_visible(story: &Story, now: DateTime<Utc>) -> bool {
    story.created_at > cutoff(now)
}

/// Builds the viewer's story tray.
///
/// Expired stories are dropped, the rest grouped by author (oldest first
/// within a group). The viewer's own group leads and never counts as unread;
/// other groups follow by most recent story, then author id.
pub fn group_for_viewer<I, F>(stories: I, viewer_id: &str, now: DateTime<Utc>, mut display: F) -> Vec<StoryGroup>
where
    I: IntoIterator<Item = Story>,
    F: FnMut(&str) -> AuthorDisplay,
{
    let mut by_author: BTreeMap<String, Vec<Story>> = BTreeMap::new();
    for story in stories.into_iter().filter(|s| is_visible(s, now)) {
        by_author.entry(story.author_id.clone()).or_default().push(story);
    }

    let mut groups: Vec<StoryGroup> = by_author
        .into_iter()
        .map(|(author_id, mut stories)| {
            sort_oldest_first(&mut stories);
            let has_unread = author_id != viewer_id && stories.iter().any(|s| !s.seen_by(viewer_id));
            StoryGroup {
                author: display(&author_id),
                author_id,
                stories,
                has_unread,
            }
        })
        .collect();

    groups.sort_by(|a, b| tray_order(a, b, viewer_id));
    groups
}

fn tray_order(a: &StoryGroup, b: &StoryGroup, viewer_id: &str) -> Ordering {
    let own_a = a.author_id == viewer_id;
    let own_b = b.author_id == viewer_id;
    own_b
        .cmp(&own_a)
        .then_with(|| latest(b).cmp(&latest(a)))
        .then_with(|| a.author_id.cmp(&b.author_id))
}

fn latest(group: &StoryGroup) -> Option<DateTime<Utc>> {
    group.stories.last().map(|s| s.created_at)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use glimpse_types::models::MediaType;
    use std::collections::BTreeSet;
    use uuid::Uuid;

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 6, 15, 12, 0, 0).unwrap()
    }

    fn story(author: &str, age: TimeDelta, viewers: &[&str]) -> Story {
        Story {
            id: Uuid::new_v4(),
            author_id: author.to_string(),
            media_url: "https://cdn.example.com/s.jpg".to_string(),
            media_type: MediaType::Image,
            caption: None,
            created_at: now() - age,
            viewed_by: viewers.iter().map(|v| v.to_string()).collect::<BTreeSet<_>>(),
        }
    }

    fn display(author: &str) -> AuthorDisplay {
        AuthorDisplay {
            username: author.to_string(),
            display_name: author.to_uppercase(),
            avatar_url: None,
        }
    }

    #[test]
    fn boundary_is_exclusive() {
        assert!(is_visible(&story("a", TimeDelta::hours(23) + TimeDelta::minutes(59), &[]), now()));
        assert!(!is_visible(&story("a", TimeDelta::hours(24), &[]), now()));
        assert!(!is_visible(&story("a", TimeDelta::hours(24) + TimeDelta::minutes(1), &[]), now()));
    }

    #[test]
    fn own_group_first_then_most_recent() {
        let stories = vec![
            story("carol", TimeDelta::hours(5), &[]),
            story("bob", TimeDelta::hours(1), &[]),
            story("viewer", TimeDelta::hours(10), &[]),
            story("dave", TimeDelta::hours(1), &[]),
        ];

        let order: Vec<String> = group_for_viewer(stories, "viewer", now(), display)
            .into_iter()
            .map(|g| g.author_id)
            .collect();
        // bob and dave tie on recency; author id breaks the tie
        assert_eq!(order, vec!["viewer", "bob", "dave", "carol"]);
    }

    #[test]
    fn unread_needs_one_unseen_story() {
        let stories = vec![
            story("bob", TimeDelta::hours(3), &["viewer"]),
            story("bob", TimeDelta::hours(2), &[]),
            story("carol", TimeDelta::hours(2), &["viewer"]),
        ];

        let groups = group_for_viewer(stories, "viewer", now(), display);
        let bob = groups.iter().find(|g| g.author_id == "bob").unwrap();
        let carol = groups.iter().find(|g| g.author_id == "carol").unwrap();
        assert!(bob.has_unread);
        assert!(!carol.has_unread);
    }

    #[test]
    fn expired_only_authors_produce_no_group() {
        let stories = vec![
            story("bob", TimeDelta::hours(30), &[]),
            story("carol", TimeDelta::hours(2), &[]),
        ];

        let groups = group_for_viewer(stories, "viewer", now(), display);
        assert_eq!(groups.len(), 1);
        assert_eq!(groups[0].author_id, "carol");
        assert_eq!(groups[0].author.display_name, "CAROL");
    }
}
