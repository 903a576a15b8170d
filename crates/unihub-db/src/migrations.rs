use anyhow::Result;
use rusqlite::Connection;
use tracing::info;

pub fn run(conn: &Connection) -> Result<()> {
    conn.execute_batch("CREATE TABLE IF NOT EXISTS schema_version (version INTEGER NOT NULL);")?;

    let version: i64 = conn.query_row(
        "SELECT COALESCE(MAX(version), 0) FROM schema_version",
        [],
        |r| r.get(0),
    )?;

    if version < 1 {
        info!("Running migration v1 (initial schema)");
        conn.execute_batch(
            "
            CREATE TABLE users (
                id          INTEGER PRIMARY KEY AUTOINCREMENT,
                username    TEXT NOT NULL UNIQUE,
                email       TEXT NOT NULL,
                password    TEXT NOT NULL,
                bio         TEXT,
                created_at  TEXT NOT NULL DEFAULT (datetime('now'))
            );

            CREATE TABLE communities (
                id          INTEGER PRIMARY KEY AUTOINCREMENT,
                name        TEXT NOT NULL UNIQUE,
                description TEXT NOT NULL DEFAULT '',
                privacy     TEXT NOT NULL DEFAULT 'public'
                            CHECK (privacy IN ('public', 'private')),
                owner_id    INTEGER REFERENCES users(id) ON DELETE SET NULL,
                created_at  TEXT NOT NULL DEFAULT (datetime('now'))
            );

            CREATE INDEX idx_communities_owner ON communities(owner_id);

            CREATE TABLE keywords (
                id          INTEGER PRIMARY KEY AUTOINCREMENT,
                name        TEXT NOT NULL UNIQUE
            );

            CREATE TABLE community_keywords (
                community_id INTEGER NOT NULL REFERENCES communities(id) ON DELETE CASCADE,
                keyword_id   INTEGER NOT NULL REFERENCES keywords(id) ON DELETE CASCADE,
                PRIMARY KEY (community_id, keyword_id)
            );

            CREATE INDEX idx_community_keywords_keyword ON community_keywords(keyword_id);

            CREATE TABLE memberships (
                user_id      INTEGER NOT NULL REFERENCES users(id) ON DELETE CASCADE,
                community_id INTEGER NOT NULL REFERENCES communities(id) ON DELETE CASCADE,
                role         TEXT NOT NULL DEFAULT 'member'
                             CHECK (role IN ('leader', 'event_manager', 'moderator', 'member')),
                joined_at    TEXT NOT NULL DEFAULT (datetime('now')),
                PRIMARY KEY (user_id, community_id)
            );

            CREATE INDEX idx_memberships_community ON memberships(community_id);

            CREATE TABLE join_requests (
                id           INTEGER PRIMARY KEY AUTOINCREMENT,
                user_id      INTEGER NOT NULL REFERENCES users(id) ON DELETE CASCADE,
                community_id INTEGER NOT NULL REFERENCES communities(id) ON DELETE CASCADE,
                created_at   TEXT NOT NULL DEFAULT (datetime('now')),
                UNIQUE (user_id, community_id)
            );

            CREATE TABLE follows (
                follower_id INTEGER NOT NULL REFERENCES users(id) ON DELETE CASCADE,
                followed_id INTEGER NOT NULL REFERENCES users(id) ON DELETE CASCADE,
                created_at  TEXT NOT NULL DEFAULT (datetime('now')),
                PRIMARY KEY (follower_id, followed_id),
                CHECK (follower_id <> followed_id)
            );

            CREATE INDEX idx_follows_followed ON follows(followed_id);

            CREATE TABLE posts (
                id           INTEGER PRIMARY KEY AUTOINCREMENT,
                community_id INTEGER NOT NULL REFERENCES communities(id) ON DELETE CASCADE,
                author_id    INTEGER NOT NULL REFERENCES users(id) ON DELETE CASCADE,
                content      TEXT NOT NULL,
                created_at   TEXT NOT NULL DEFAULT (datetime('now'))
            );

            CREATE INDEX idx_posts_community ON posts(community_id, created_at);

            -- pin_order is kept dense per community by the pin operations;
            -- it is not UNIQUE so the shift-down update can run row by row.
            CREATE TABLE pinned_posts (
                id           INTEGER PRIMARY KEY AUTOINCREMENT,
                post_id      INTEGER NOT NULL UNIQUE REFERENCES posts(id) ON DELETE CASCADE,
                community_id INTEGER NOT NULL REFERENCES communities(id) ON DELETE CASCADE,
                pin_order    INTEGER NOT NULL,
                pinned_by    INTEGER NOT NULL REFERENCES users(id),
                pinned_at    TEXT NOT NULL DEFAULT (datetime('now'))
            );

            CREATE INDEX idx_pinned_posts_community ON pinned_posts(community_id, pin_order);

            -- Seed the ownerless global news-feed community
            INSERT INTO communities (id, name, description, privacy)
                VALUES (1, 'Global Community (News Feed)',
                        'This is the default global community used as a news feed for posts.',
                        'public');

            INSERT INTO schema_version (version) VALUES (1);
            ",
        )?;
    }

    info!("Database migrations complete");
    Ok(())
}
