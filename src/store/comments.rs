use rusqlite::{params, Connection, OptionalExtension, Row};

use crate::db::models::{CommentView, PostComment};
use crate::store::{new_id, now, users};

const COMMENT_COLUMNS: &str = "id, post_id, user_id, content, parent_id, created_at, updated_at";

fn comment_from_row(row: &Row<'_>) -> rusqlite::Result<PostComment> {
    Ok(PostComment {
        id: row.get(0)?,
        post_id: row.get(1)?,
        user_id: row.get(2)?,
        content: row.get(3)?,
        parent_id: row.get(4)?,
        created_at: row.get(5)?,
        updated_at: row.get(6)?,
    })
}

pub fn create(
    conn: &Connection,
    post_id: &str,
    user_id: &str,
    content: &str,
    parent_id: Option<&str>,
) -> rusqlite::Result<PostComment> {
    let ts = now();
    let comment = PostComment {
        id: new_id(),
        post_id: post_id.to_string(),
        user_id: user_id.to_string(),
        content: content.to_string(),
        parent_id: parent_id.map(str::to_string),
        created_at: ts.clone(),
        updated_at: ts,
    };

    conn.execute(
        &format!("INSERT INTO post_comments ({COMMENT_COLUMNS}) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)"),
        params![
            comment.id,
            comment.post_id,
            comment.user_id,
            comment.content,
            comment.parent_id,
            comment.created_at,
            comment.updated_at
        ],
    )?;
    Ok(comment)
}

pub fn find(conn: &Connection, id: &str) -> rusqlite::Result<Option<PostComment>> {
    conn.query_row(
        &format!("SELECT {COMMENT_COLUMNS} FROM post_comments WHERE id = ?1"),
        params![id],
        comment_from_row,
    )
    .optional()
}

/// Every comment on a post, oldest first. Replies carry `parent_id`; threading is left to the reader.
pub fn list_for_post(conn: &Connection, post_id: &str) -> rusqlite::Result<Vec<CommentView>> {
    let mut stmt = conn.prepare(
        "SELECT c.id, c.post_id, c.user_id, c.content, c.parent_id, c.created_at, c.updated_at,
                u.id, u.name, u.image, u.country
         FROM post_comments c
         JOIN users u ON u.id = c.user_id
         WHERE c.post_id = ?1
         ORDER BY c.created_at ASC, c.id ASC",
    )?;
    let comments = stmt
        .query_map(params![post_id], |row| {
            Ok(CommentView {
                comment: comment_from_row(row)?,
                author: users::summary_at(row, 7)?,
            })
        })?
        .collect::<Result<Vec<_>, _>>()?;
    Ok(comments)
}
