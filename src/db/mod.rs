pub mod models;

use r2d2::Pool;
use r2d2_sqlite::SqliteConnectionManager;
use rusqlite::params;
use std::path::Path;

use crate::state::DbPool;

pub const MIGRATIONS: &[(&str, &str)] = &[
    (
        "001_initial",
        include_str!("../../migrations/001_initial.sql"),
    ),
    (
        "002_communities",
        include_str!("../../migrations/002_communities.sql"),
    ),
    (
        "003_projects_notifications",
        include_str!("../../migrations/003_projects_notifications.sql"),
    ),
];

pub const DEFAULT_POOL_SIZE: u32 = 8;

pub fn create_pool(db_path: &Path) -> anyhow::Result<DbPool> {
    create_pool_with_size(db_path, DEFAULT_POOL_SIZE)
}

pub fn create_pool_with_size(db_path: &Path, max_size: u32) -> anyhow::Result<DbPool> {
    if let Some(parent) = db_path.parent() {
        std::fs::create_dir_all(parent)?;
    }

    // Pragmas are per-connection, so they go in the init hook rather than on one checkout.
    let manager = SqliteConnectionManager::file(db_path).with_init(|conn| {
        conn.execute_batch(
            "
            PRAGMA journal_mode = WAL;
            PRAGMA synchronous = NORMAL;
            PRAGMA foreign_keys = ON;
            PRAGMA busy_timeout = 5000;
            ",
        )
    });
    let pool = Pool::builder().max_size(max_size).build(manager)?;

    Ok(pool)
}

pub fn run_migrations(pool: &DbPool) -> anyhow::Result<()> {
    let conn = pool.get()?;
    apply_migrations(&conn)?;
    tracing::info!("Database migrations complete");
    Ok(())
}

/// Apply any pending migrations on a single connection.
pub fn apply_migrations(conn: &rusqlite::Connection) -> rusqlite::Result<()> {
    conn.execute_batch(
        "CREATE TABLE IF NOT EXISTS schema_version (
            name TEXT PRIMARY KEY,
            applied_at TEXT NOT NULL DEFAULT (datetime('now'))
        );",
    )?;

    for (name, sql) in MIGRATIONS {
        let already_applied: bool = conn.query_row(
            "SELECT COUNT(*) > 0 FROM schema_version WHERE name = ?1",
            params![name],
            |row| row.get(0),
        )?;

        if !already_applied {
            tracing::info!("Applying migration: {}", name);
            conn.execute_batch(sql)?;
            conn.execute(
                "INSERT INTO schema_version (name) VALUES (?1)",
                params![name],
            )?;
        }
    }

    Ok(())
}

/// Fresh in-memory database with every migration applied.
#[cfg(test)]
pub(crate) fn test_conn() -> rusqlite::Connection {
    let conn = rusqlite::Connection::open_in_memory().unwrap();
    conn.execute_batch("PRAGMA foreign_keys = ON;").unwrap();
    apply_migrations(&conn).unwrap();
    conn
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn create_pool_creates_db_file() {
        let tmp = tempfile::tempdir().unwrap();
        let db_path = tmp.path().join("sub/dir/test.db");
        let pool = create_pool(&db_path).unwrap();
        assert!(db_path.exists());
        let conn = pool.get().unwrap();
        let mode: String = conn
            .query_row("PRAGMA journal_mode", [], |row| row.get(0))
            .unwrap();
        assert_eq!(mode, "wal");
    }

    #[test]
    fn migrations_run_successfully() {
        let conn = test_conn();

        let count: i64 = conn
            .query_row("SELECT COUNT(*) FROM schema_version", [], |row| row.get(0))
            .unwrap();
        assert_eq!(count, MIGRATIONS.len() as i64);

        let tables: Vec<String> = {
            let mut stmt = conn
                .prepare("SELECT name FROM sqlite_master WHERE type='table' ORDER BY name")
                .unwrap();
            stmt.query_map([], |row| row.get(0))
                .unwrap()
                .filter_map(|r| r.ok())
                .collect()
        };
        for table in [
            "users",
            "sessions",
            "posts",
            "media",
            "likes",
            "bookmarks",
            "post_comments",
            "follows",
            "communities",
            "community_memberships",
            "community_posts",
            "projects",
            "project_stars",
            "notifications",
        ] {
            assert!(tables.contains(&table.to_string()), "missing table {table}");
        }
    }

    #[test]
    fn pool_honours_requested_size() {
        let tmp = tempfile::tempdir().unwrap();
        let pool = create_pool_with_size(&tmp.path().join("agora.db"), 2).unwrap();
        assert_eq!(pool.max_size(), 2);
    }

    #[test]
    fn migrations_are_idempotent() {
        let tmp = tempfile::tempdir().unwrap();
        let pool = create_pool(&tmp.path().join("agora.db")).unwrap();
        run_migrations(&pool).unwrap();
        run_migrations(&pool).unwrap();

        let conn = pool.get().unwrap();
        let count: i64 = conn
            .query_row("SELECT COUNT(*) FROM schema_version", [], |row| row.get(0))
            .unwrap();
        assert_eq!(count, MIGRATIONS.len() as i64);
    }

    #[test]
    fn categories_are_seeded() {
        let conn = test_conn();
        let count: i64 = conn
            .query_row("SELECT COUNT(*) FROM community_categories", [], |row| {
                row.get(0)
            })
            .unwrap();
        assert!(count > 0);
    }

    #[test]
    fn foreign_keys_enforced() {
        let conn = test_conn();
        let result = conn.execute(
            "INSERT INTO posts (id, user_id, content) VALUES (?1, ?2, ?3)",
            params!["post-1", "nonexistent-user", "hello"],
        );
        assert!(result.is_err());
    }

    #[test]
    fn access_column_rejects_unknown_values() {
        let conn = test_conn();
        conn.execute(
            "INSERT INTO users (id, name, email) VALUES ('u1', 'Ana', 'ana@example.com')",
            [],
        )
        .unwrap();
        let result = conn.execute(
            "INSERT INTO posts (id, user_id, content, access) VALUES ('p1', 'u1', 'x', 'friends')",
            [],
        );
        assert!(result.is_err());
    }
}
