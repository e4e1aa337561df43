use rusqlite::{params, Connection, TransactionBehavior};
use serde::Serialize;

/// A two-column association whose row existence is the state being toggled.
/// The pair must be the table's primary key.
#[derive(Debug, Clone, Copy)]
pub struct PairTable {
    pub table: &'static str,
    pub left: &'static str,
    pub right: &'static str,
}

pub const BOOKMARKS: PairTable = PairTable {
    table: "bookmarks",
    left: "user_id",
    right: "post_id",
};

pub const LIKES: PairTable = PairTable {
    table: "likes",
    left: "user_id",
    right: "post_id",
};

pub const FOLLOWS: PairTable = PairTable {
    table: "follows",
    left: "follower_id",
    right: "following_id",
};

pub const STARS: PairTable = PairTable {
    table: "project_stars",
    left: "user_id",
    right: "project_id",
};

pub const MEMBERSHIPS: PairTable = PairTable {
    table: "community_memberships",
    left: "user_id",
    right: "community_id",
};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Toggled {
    On,
    Off,
}

impl Toggled {
    pub fn is_on(self) -> bool {
        self == Toggled::On
    }
}

/// Flip the association between `left` and `right` and report the resulting state.
///
/// Runs under `BEGIN IMMEDIATE`, so concurrent toggles of the same pair
/// serialize on the write lock and each call flips the state exactly once.
pub fn toggle(
    conn: &mut Connection,
    pair: PairTable,
    left: &str,
    right: &str,
) -> rusqlite::Result<Toggled> {
    let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;

    let removed = tx.execute(
        &format!(
            "DELETE FROM {} WHERE {} = ?1 AND {} = ?2",
            pair.table, pair.left, pair.right
        ),
        params![left, right],
    )?;

    let state = if removed > 0 {
        Toggled::Off
    } else {
        tx.execute(
            &format!(
                "INSERT INTO {} ({}, {}) VALUES (?1, ?2)",
                pair.table, pair.left, pair.right
            ),
            params![left, right],
        )?;
        Toggled::On
    };

    tx.commit()?;
    tracing::debug!(table = pair.table, left, right, ?state, "toggled");
    Ok(state)
}

pub fn exists(conn: &Connection, pair: PairTable, left: &str, right: &str) -> rusqlite::Result<bool> {
    conn.query_row(
        &format!(
            "SELECT COUNT(*) > 0 FROM {} WHERE {} = ?1 AND {} = ?2",
            pair.table, pair.left, pair.right
        ),
        params![left, right],
        |row| row.get(0),
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::test_conn;
    use crate::store::fixtures;

    fn setup() -> Connection {
        let conn = test_conn();
        fixtures::user(&conn, "u1", "Ana");
        fixtures::user(&conn, "u2", "Bo");
        fixtures::post_at(&conn, "p1", "u2", "2025-01-01T00:00:00.000Z");
        conn
    }

    #[test]
    fn toggling_twice_restores_original_state() {
        let mut conn = setup();
        assert!(!exists(&conn, BOOKMARKS, "u1", "p1").unwrap());

        assert_eq!(toggle(&mut conn, BOOKMARKS, "u1", "p1").unwrap(), Toggled::On);
        assert!(exists(&conn, BOOKMARKS, "u1", "p1").unwrap());

        assert_eq!(toggle(&mut conn, BOOKMARKS, "u1", "p1").unwrap(), Toggled::Off);
        assert!(!exists(&conn, BOOKMARKS, "u1", "p1").unwrap());
    }

    #[test]
    fn pairs_are_independent() {
        let mut conn = setup();
        toggle(&mut conn, LIKES, "u1", "p1").unwrap();
        assert!(!exists(&conn, LIKES, "u2", "p1").unwrap());
        assert!(!exists(&conn, BOOKMARKS, "u1", "p1").unwrap());
    }

    #[test]
    fn follows_are_directional() {
        let mut conn = setup();
        toggle(&mut conn, FOLLOWS, "u1", "u2").unwrap();
        assert!(exists(&conn, FOLLOWS, "u1", "u2").unwrap());
        assert!(!exists(&conn, FOLLOWS, "u2", "u1").unwrap());
    }

    #[test]
    fn missing_target_fails_without_leaving_a_row() {
        let mut conn = setup();
        assert!(toggle(&mut conn, BOOKMARKS, "u1", "nope").is_err());
        let count: i64 = conn
            .query_row("SELECT COUNT(*) FROM bookmarks", [], |r| r.get(0))
            .unwrap();
        assert_eq!(count, 0);
    }

    #[test]
    fn concurrent_toggles_flip_exactly_once_each() {
        let tmp = tempfile::tempdir().unwrap();
        let pool = crate::db::create_pool(&tmp.path().join("agora.db")).unwrap();
        crate::db::run_migrations(&pool).unwrap();
        {
            let conn = pool.get().unwrap();
            fixtures::user(&conn, "u1", "Ana");
            fixtures::user(&conn, "u2", "Bo");
            fixtures::post_at(&conn, "p1", "u2", "2025-01-01T00:00:00.000Z");
        }

        let handles: Vec<_> = (0..4)
            .map(|_| {
                let pool = pool.clone();
                std::thread::spawn(move || {
                    let mut conn = pool.get().unwrap();
                    toggle(&mut conn, BOOKMARKS, "u1", "p1").unwrap()
                })
            })
            .collect();
        let results: Vec<Toggled> = handles.into_iter().map(|h| h.join().unwrap()).collect();

        let ons = results.iter().filter(|t| t.is_on()).count();
        assert_eq!(ons, 2);
        let conn = pool.get().unwrap();
        assert!(!exists(&conn, BOOKMARKS, "u1", "p1").unwrap());
    }
}
