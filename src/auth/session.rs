use axum::http::{header, HeaderMap};
use rand::Rng;
use rusqlite::{params, Connection, OptionalExtension};

use crate::error::AppResult;
use crate::state::DbPool;

/// The authenticated user behind a request.
#[derive(Debug, Clone, PartialEq)]
pub struct Session {
    pub user_id: String,
    pub name: String,
    pub email: String,
    pub image: Option<String>,
    pub token: String,
}

/// Create a new session for a user. Returns the session token.
pub fn create_session(conn: &Connection, user_id: &str, hours: u64) -> rusqlite::Result<String> {
    let token = generate_token();
    let id = uuid::Uuid::now_v7().to_string();

    conn.execute(
        "INSERT INTO sessions (id, user_id, token, expires_at) VALUES (?1, ?2, ?3, datetime('now', ?4))",
        params![id, user_id, token, format!("+{} hours", hours)],
    )?;

    Ok(token)
}

/// Delete a session by token. Returns whether one existed.
pub fn delete_session(conn: &Connection, token: &str) -> rusqlite::Result<bool> {
    let rows = conn.execute("DELETE FROM sessions WHERE token = ?1", params![token])?;
    Ok(rows > 0)
}

/// Look up a live session. Unknown and expired tokens both resolve to `None`.
pub fn resolve(conn: &Connection, token: &str) -> rusqlite::Result<Option<Session>> {
    conn.query_row(
        "SELECT u.id, u.name, u.email, u.image FROM sessions s \
         JOIN users u ON u.id = s.user_id \
         WHERE s.token = ?1 AND s.expires_at > datetime('now')",
        params![token],
        |row| {
            Ok(Session {
                user_id: row.get(0)?,
                name: row.get(1)?,
                email: row.get(2)?,
                image: row.get(3)?,
                token: token.to_string(),
            })
        },
    )
    .optional()
}

/// Session token from the session cookie, falling back to `Authorization: Bearer`.
pub fn token_from_headers(headers: &HeaderMap, cookie_name: &str) -> Option<String> {
    let from_cookie = headers
        .get_all(header::COOKIE)
        .iter()
        .filter_map(|v| v.to_str().ok())
        .flat_map(|s| s.split(';'))
        .map(|s| s.trim())
        .find_map(|cookie| {
            let (key, val) = cookie.split_once('=')?;
            (key.trim() == cookie_name && !val.trim().is_empty()).then(|| val.trim().to_string())
        });

    from_cookie.or_else(|| {
        headers
            .get(header::AUTHORIZATION)
            .and_then(|v| v.to_str().ok())
            .and_then(|v| v.strip_prefix("Bearer "))
            .map(|t| t.trim().to_string())
            .filter(|t| !t.is_empty())
    })
}

/// Resolve the session for a set of request headers. A logged-out request is `Ok(None)`.
pub fn get_session(
    pool: &DbPool,
    headers: &HeaderMap,
    cookie_name: &str,
) -> AppResult<Option<Session>> {
    let Some(token) = token_from_headers(headers, cookie_name) else {
        return Ok(None);
    };
    let conn = pool.get()?;
    Ok(resolve(&conn, &token)?)
}

/// Generate a cryptographically random 32-byte hex token.
fn generate_token() -> String {
    let mut rng = rand::thread_rng();
    let bytes: [u8; 32] = rng.gen();
    bytes.iter().map(|b| format!("{:02x}", b)).collect()
}
