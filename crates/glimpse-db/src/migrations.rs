use anyhow::Result;
use rusqlite::Connection;
use tracing::info;

pub const SCHEMA_VERSION: i64 = 1;

pub fn run(conn: &Connection) -> Result<()> {
    conn.execute_batch(
        "CREATE TABLE IF NOT EXISTS schema_version (version INTEGER NOT NULL);"
    )?;

    let version = current_version(conn)?;

    if version < 1 {
        info!("Running migration v1 (stories, views, profiles)");
        conn.execute_batch(
            "
            CREATE TABLE stories (
                id          TEXT PRIMARY KEY,
                author_id   TEXT NOT NULL,
                media_url   TEXT NOT NULL,
                media_type  TEXT NOT NULL CHECK (media_type IN ('image', 'video')),
                caption     TEXT,
                created_at  TEXT NOT NULL
            );

            CREATE INDEX idx_stories_author
                ON stories(author_id, created_at);

            CREATE INDEX idx_stories_created
                ON stories(created_at);

            CREATE TABLE story_views (
                story_id    TEXT NOT NULL REFERENCES stories(id) ON DELETE CASCADE,
                viewer_id   TEXT NOT NULL,
                viewed_at   TEXT NOT NULL,
                PRIMARY KEY (story_id, viewer_id)
            );

            CREATE TABLE profiles (
                user_id       TEXT PRIMARY KEY,
                username      TEXT NOT NULL,
                display_name  TEXT NOT NULL,
                avatar_url    TEXT,
                updated_at    TEXT NOT NULL DEFAULT (datetime('now'))
            );

            INSERT INTO schema_version (version) VALUES (1);
            ",
        )?;
    }

    info!("Database migrations complete (schema v{})", current_version(conn)?);
    Ok(())
}

pub fn current_version(conn: &Connection) -> Result<i64> {
    let version = conn.query_row(
        "SELECT COALESCE(MAX(version), 0) FROM schema_version",
        [],
        |r| r.get(0),
    )?;
    Ok(version)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn migrations_are_idempotent() {
        let conn = Connection::open_in_memory().unwrap();
        run(&conn).unwrap();
        run(&conn).unwrap();

        assert_eq!(current_version(&conn).unwrap(), SCHEMA_VERSION);
        let rows: i64 = conn
            .query_row("SELECT COUNT(*) FROM schema_version", [], |r| r.get(0))
            .unwrap();
        assert_eq!(rows, 1);
    }
}
