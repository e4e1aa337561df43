use rusqlite::{params, Connection, OptionalExtension, Row};

use crate::db::models::{User, UserSummary};
use crate::store::{new_id, now};

const USER_COLUMNS: &str = "id, name, email, image, country, created_at, updated_at";

pub struct NewUser<'a> {
    pub name: &'a str,
    pub email: &'a str,
    pub password_hash: Option<&'a str>,
    pub image: Option<&'a str>,
    pub country: Option<&'a str>,
}

fn user_from_row(row: &Row<'_>) -> rusqlite::Result<User> {
    Ok(User {
        id: row.get(0)?,
        name: row.get(1)?,
        email: row.get(2)?,
        image: row.get(3)?,
        country: row.get(4)?,
        created_at: row.get(5)?,
        updated_at: row.get(6)?,
    })
}

/// Maps `id, name, image, country` starting at column `offset`.
pub(crate) fn summary_at(row: &Row<'_>, offset: usize) -> rusqlite::Result<UserSummary> {
    Ok(UserSummary {
        id: row.get(offset)?,
        name: row.get(offset + 1)?,
        image: row.get(offset + 2)?,
        country: row.get(offset + 3)?,
    })
}

pub fn create(conn: &Connection, new: &NewUser<'_>) -> rusqlite::Result<User> {
    let id = new_id();
    let ts = now();
    conn.execute(
        "INSERT INTO users (id, name, email, image, country, password_hash, created_at, updated_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?7)",
        params![
            id,
            new.name,
            new.email,
            new.image,
            new.country,
            new.password_hash,
            ts
        ],
    )?;

    Ok(User {
        id,
        name: new.name.to_string(),
        email: new.email.to_string(),
        image: new.image.map(str::to_string),
        country: new.country.map(str::to_string),
        created_at: ts.clone(),
        updated_at: ts,
    })
}

pub fn find(conn: &Connection, id: &str) -> rusqlite::Result<Option<User>> {
    conn.query_row(
        &format!("SELECT {USER_COLUMNS} FROM users WHERE id = ?1"),
        params![id],
        user_from_row,
    )
    .optional()
}

pub fn exists(conn: &Connection, id: &str) -> rusqlite::Result<bool> {
    conn.query_row(
        "SELECT COUNT(*) > 0 FROM users WHERE id = ?1",
        params![id],
        |row| row.get(0),
    )
}

pub fn email_taken(conn: &Connection, email: &str) -> rusqlite::Result<bool> {
    conn.query_row(
        "SELECT COUNT(*) > 0 FROM users WHERE email = ?1 COLLATE NOCASE",
        params![email],
        |row| row.get(0),
    )
}

/// User plus stored password hash, for login.
pub fn find_credentials(
    conn: &Connection,
    email: &str,
) -> rusqlite::Result<Option<(User, Option<String>)>> {
    conn.query_row(
        &format!("SELECT {USER_COLUMNS}, password_hash FROM users WHERE email = ?1 COLLATE NOCASE"),
        params![email],
        |row| Ok((user_from_row(row)?, row.get(7)?)),
    )
    .optional()
}

/// Newest users first, optionally leaving one id out (usually the viewer).
pub fn list(
    conn: &Connection,
    exclude: Option<&str>,
    limit: u32,
) -> rusqlite::Result<Vec<UserSummary>> {
    let mut stmt = conn.prepare(
        "SELECT id, name, image, country FROM users
         WHERE ?1 IS NULL OR id != ?1
         ORDER BY created_at DESC, id DESC
         LIMIT ?2",
    )?;
    let users = stmt
        .query_map(params![exclude, limit], |row| summary_at(row, 0))?
        .collect::<Result<Vec<_>, _>>()?;
    Ok(users)
}
