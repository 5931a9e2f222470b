use crate::Database;
use crate::models::{ProfileRow, StoryRow, ViewRow};
use anyhow::Result;
use rusqlite::{Connection, Row};

const STORY_COLUMNS: &str = "id, author_id, media_url, media_type, caption, created_at";

/// Ids bound per `IN (...)` list; SQLite caps bound variables at 32766.
const VIEW_BATCH_SIZE: usize = 500;

impl Database {
    // -- Stories --

    pub fn insert_story(&self, story: &StoryRow) -> Result<()> {
        self.with_conn(|conn| {
            conn.execute(
                "INSERT INTO stories (id, author_id, media_url, media_type, caption, created_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
                rusqlite::params![
                    story.id,
                    story.author_id,
                    story.media_url,
                    story.media_type,
                    story.caption,
                    story.created_at,
                ],
            )?;
            Ok(())
        })
    }

    pub fn get_story(&self, id: &str) -> Result<Option<StoryRow>> {
        self.with_conn(|conn| {
            let sql = format!("SELECT {} FROM stories WHERE id = ?1", STORY_COLUMNS);
            conn.query_row(&sql, [id], story_from_row).optional()
        })
    }

    /// All stories by one author, expired ones included, oldest first.
    pub fn get_stories_by_author(&self, author_id: &str) -> Result<Vec<StoryRow>> {
        self.with_conn(|conn| {
            query_stories(
                conn,
                "WHERE author_id = ?1 ORDER BY created_at ASC, id ASC",
                author_id,
            )
        })
    }

    /// Stories strictly newer than `cutoff` (same text format as `created_at`).
    pub fn get_stories_created_after(&self, cutoff: &str) -> Result<Vec<StoryRow>> {
        self.with_conn(|conn| {
            query_stories(
                conn,
                "WHERE created_at > ?1 ORDER BY created_at ASC, id ASC",
                cutoff,
            )
        })
    }

    /// Deletes stories created at or before `cutoff` along with their views.
    /// Returns the number of stories removed.
    pub fn delete_stories_created_at_or_before(&self, cutoff: &str) -> Result<usize> {
        self.with_conn_mut(|conn| {
            let tx = conn.transaction()?;
            tx.execute(
                "DELETE FROM story_views
                 WHERE story_id IN (SELECT id FROM stories WHERE created_at <= ?1)",
                [cutoff],
            )?;
            let removed = tx.execute("DELETE FROM stories WHERE created_at <= ?1", [cutoff])?;
            tx.commit()?;
            Ok(removed)
        })
    }

    // -- Views --

    /// Records a view. Returns true if the view was new; false if it was
    /// already recorded or the story does not exist.
    pub fn insert_view(&self, story_id: &str, viewer_id: &str, viewed_at: &str) -> Result<bool> {
        self.with_conn(|conn| {
            let inserted = conn.execute(
                "INSERT OR IGNORE INTO story_views (story_id, viewer_id, viewed_at)
                 SELECT ?1, ?2, ?3 WHERE EXISTS (SELECT 1 FROM stories WHERE id = ?1)",
                (story_id, viewer_id, viewed_at),
            )?;
            Ok(inserted > 0)
        })
    }

    pub fn get_viewers(&self, story_id: &str) -> Result<Vec<String>> {
        self.with_conn(|conn| {
            let mut stmt = conn.prepare(
                "SELECT viewer_id FROM story_views WHERE story_id = ?1 ORDER BY viewer_id",
            )?;
            let rows = stmt
                .query_map([story_id], |row| row.get(0))?
                .collect::<std::result::Result<Vec<String>, _>>()?;
            Ok(rows)
        })
    }

    /// Batch-fetch views for a set of story IDs, `VIEW_BATCH_SIZE` ids per query.
    pub fn get_views_for_stories(&self, story_ids: &[String]) -> Result<Vec<ViewRow>> {
        if story_ids.is_empty() {
            return Ok(vec![]);
        }

        self.with_conn(|conn| {
            let mut rows = Vec::new();
            for chunk in story_ids.chunks(VIEW_BATCH_SIZE) {
                let placeholders: Vec<String> = (1..=chunk.len()).map(|i| format!("?{}", i)).collect();
                let sql = format!(
                    "SELECT story_id, viewer_id FROM story_views WHERE story_id IN ({})",
                    placeholders.join(", ")
                );

                let mut stmt = conn.prepare_cached(&sql)?;
                let params: Vec<&dyn rusqlite::types::ToSql> = chunk
                    .iter()
                    .map(|id| id as &dyn rusqlite::types::ToSql)
                    .collect();

                let batch = stmt
                    .query_map(params.as_slice(), |row| {
                        Ok(ViewRow {
                            story_id: row.get(0)?,
                            viewer_id: row.get(1)?,
                        })
                    })?
                    .collect::<std::result::Result<Vec<_>, _>>()?;
                rows.extend(batch);
            }

            Ok(rows)
        })
    }

    // -- Profiles --

    pub fn upsert_profile(&self, profile: &ProfileRow) -> Result<()> {
        self.with_conn(|conn| {
            conn.execute(
                "INSERT INTO profiles (user_id, username, display_name, avatar_url)
                 VALUES (?1, ?2, ?3, ?4)
                 ON CONFLICT(user_id) DO UPDATE SET
                    username = excluded.username,
                    display_name = excluded.display_name,
                    avatar_url = excluded.avatar_url,
                    updated_at = datetime('now')",
                rusqlite::params![
                    profile.user_id,
                    profile.username,
                    profile.display_name,
                    profile.avatar_url,
                ],
            )?;
            Ok(())
        })
    }

    pub fn get_profile(&self, user_id: &str) -> Result<Option<ProfileRow>> {
        self.with_conn(|conn| {
            conn.query_row(
                "SELECT user_id, username, display_name, avatar_url FROM profiles WHERE user_id = ?1",
                [user_id],
                |row| {
                    Ok(ProfileRow {
                        user_id: row.get(0)?,
                        username: row.get(1)?,
                        display_name: row.get(2)?,
                        avatar_url: row.get(3)?,
                    })
                },
            )
            .optional()
        })
    }
}

fn query_stories(conn: &Connection, clause: &str, param: &str) -> Result<Vec<StoryRow>> {
    let sql = format!("SELECT {} FROM stories {}", STORY_COLUMNS, clause);
    let mut stmt = conn.prepare(&sql)?;
    let rows = stmt
        .query_map([param], story_from_row)?
        .collect::<std::result::Result<Vec<_>, _>>()?;
    Ok(rows)
}

fn story_from_row(row: &Row<'_>) -> rusqlite::Result<StoryRow> {
    Ok(StoryRow {
        id: row.get(0)?,
        author_id: row.get(1)?,
        media_url: row.get(2)?,
        media_type: row.get(3)?,
        caption: row.get(4)?,
        created_at: row.get(5)?,
    })
}

/// Extension trait for optional query results
trait OptionalExt<T> {
    fn optional(self) -> Result<Option<T>>;
}

impl<T> OptionalExt<T> for std::result::Result<T, rusqlite::Error> {
    fn optional(self) -> Result<Option<T>> {
        match self {
            Ok(val) => Ok(Some(val)),
            Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
            Err(e) => Err(e.into()),
        }
    }
}
