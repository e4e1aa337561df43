use rusqlite::{params, params_from_iter, Connection};
use std::collections::{BTreeMap, HashSet};

use crate::db::models::FollowCounts;
use crate::error::AppResult;
use crate::state::DbPool;
use crate::store::toggle::{self, FOLLOWS};

pub fn is_following(conn: &Connection, follower: &str, following: &str) -> rusqlite::Result<bool> {
    toggle::exists(conn, FOLLOWS, follower, following)
}

/// Follow status of `viewer` towards each of `targets`, in one query.
pub fn check_follow(
    conn: &Connection,
    viewer: &str,
    targets: &[String],
) -> rusqlite::Result<BTreeMap<String, bool>> {
    if targets.is_empty() {
        return Ok(BTreeMap::new());
    }

    let placeholders = (0..targets.len())
        .map(|i| format!("?{}", i + 2))
        .collect::<Vec<_>>()
        .join(", ");
    let sql = format!(
        "SELECT following_id FROM follows WHERE follower_id = ?1 AND following_id IN ({placeholders})"
    );

    let mut stmt = conn.prepare(&sql)?;
    let args = std::iter::once(viewer).chain(targets.iter().map(String::as_str));
    let followed: HashSet<String> = stmt
        .query_map(params_from_iter(args), |row| row.get(0))?
        .collect::<Result<_, _>>()?;

    Ok(targets
        .iter()
        .map(|id| (id.clone(), followed.contains(id)))
        .collect())
}

pub fn count_followers(conn: &Connection, user_id: &str) -> rusqlite::Result<i64> {
    conn.query_row(
        "SELECT COUNT(*) FROM follows WHERE following_id = ?1",
        params![user_id],
        |row| row.get(0),
    )
}

pub fn count_following(conn: &Connection, user_id: &str) -> rusqlite::Result<i64> {
    conn.query_row(
        "SELECT COUNT(*) FROM follows WHERE follower_id = ?1",
        params![user_id],
        |row| row.get(0),
    )
}

/// Runs `count` on its own pooled connection off the async executor.
async fn count_on_pool(
    pool: &DbPool,
    user_id: &str,
    count: fn(&Connection, &str) -> rusqlite::Result<i64>,
) -> AppResult<i64> {
    let pool = pool.clone();
    let user_id = user_id.to_string();
    tokio::task::spawn_blocking(move || -> AppResult<i64> {
        let conn = pool.get()?;
        Ok(count(&conn, &user_id)?)
    })
    .await?
}

/// Follower and following counts, queried concurrently and joined.
pub async fn follow_counts(pool: &DbPool, user_id: &str) -> AppResult<FollowCounts> {
    let (followers, following) = futures::try_join!(
        count_on_pool(pool, user_id, count_followers),
        count_on_pool(pool, user_id, count_following),
    )?;
    Ok(FollowCounts {
        followers,
        following,
    })
}
