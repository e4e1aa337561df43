use rusqlite::{params, Connection, OptionalExtension, Row};

use crate::db::models::{Notification, NotificationKind};
use crate::pagination::PageRequest;
use crate::store::{new_id, now};

const NOTIFICATION_COLUMNS: &str =
    "id, recipient_id, type, message, read, actor_id, post_id, project_id, community_id, created_at";

/// What a notification points at besides its recipient.
#[derive(Debug, Default, Clone, Copy)]
pub struct Subject<'a> {
    pub actor_id: Option<&'a str>,
    pub post_id: Option<&'a str>,
    pub project_id: Option<&'a str>,
    pub community_id: Option<&'a str>,
}

fn notification_from_row(row: &Row<'_>) -> rusqlite::Result<Notification> {
    Ok(Notification {
        id: row.get(0)?,
        recipient_id: row.get(1)?,
        kind: row.get(2)?,
        message: row.get(3)?,
        read: row.get(4)?,
        actor_id: row.get(5)?,
        post_id: row.get(6)?,
        project_id: row.get(7)?,
        community_id: row.get(8)?,
        created_at: row.get(9)?,
    })
}

/// Record a notification. Nothing is stored when the actor is the recipient.
pub fn notify(
    conn: &Connection,
    recipient_id: &str,
    kind: NotificationKind,
    message: &str,
    subject: Subject<'_>,
) -> rusqlite::Result<Option<String>> {
    if subject.actor_id == Some(recipient_id) {
        return Ok(None);
    }

    let id = new_id();
    conn.execute(
        &format!(
            "INSERT INTO notifications ({NOTIFICATION_COLUMNS}) VALUES (?1, ?2, ?3, ?4, 0, ?5, ?6, ?7, ?8, ?9)"
        ),
        params![
            id,
            recipient_id,
            kind,
            message,
            subject.actor_id,
            subject.post_id,
            subject.project_id,
            subject.community_id,
            now()
        ],
    )?;
    tracing::debug!(recipient_id, kind = kind.as_str(), "notification created");
    Ok(Some(id))
}

pub fn page_for(
    conn: &Connection,
    recipient_id: &str,
    page: &PageRequest,
) -> rusqlite::Result<Vec<Notification>> {
    let mut stmt = conn.prepare(&format!(
        "SELECT {NOTIFICATION_COLUMNS} FROM notifications n
         WHERE n.recipient_id = ?1
           AND (?2 IS NULL OR (n.created_at, n.id) < (SELECT c.created_at, c.id FROM notifications c WHERE c.id = ?2))
         ORDER BY n.created_at DESC, n.id DESC
         LIMIT ?3"
    ))?;
    let notifications = stmt
        .query_map(
            params![recipient_id, page.cursor, page.limit],
            notification_from_row,
        )?
        .collect::<Result<Vec<_>, _>>()?;
    Ok(notifications)
}

pub fn unread_count(conn: &Connection, recipient_id: &str) -> rusqlite::Result<i64> {
    conn.query_row(
        "SELECT COUNT(*) FROM notifications WHERE recipient_id = ?1 AND read = 0",
        params![recipient_id],
        |row| row.get(0),
    )
}

/// Mark one notification read. `None` when it does not belong to `recipient_id`.
pub fn mark_read(
    conn: &Connection,
    recipient_id: &str,
    id: &str,
) -> rusqlite::Result<Option<Notification>> {
    conn.query_row(
        &format!(
            "UPDATE notifications SET read = 1 WHERE id = ?1 AND recipient_id = ?2
             RETURNING {NOTIFICATION_COLUMNS}"
        ),
        params![id, recipient_id],
        notification_from_row,
    )
    .optional()
}

pub fn mark_all_read(conn: &Connection, recipient_id: &str) -> rusqlite::Result<usize> {
    conn.execute(
        "UPDATE notifications SET read = 1 WHERE recipient_id = ?1 AND read = 0",
        params![recipient_id],
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
        conn
    }

    #[test]
    fn self_actions_are_not_notified() {
        let conn = setup();
        let subject = Subject {
            actor_id: Some("u1"),
            ..Subject::default()
        };
        assert!(notify(&conn, "u1", NotificationKind::Follow, "hi", subject)
            .unwrap()
            .is_none());
        assert_eq!(unread_count(&conn, "u1").unwrap(), 0);
    }

    #[test]
    fn mark_read_is_scoped_to_recipient() {
        let conn = setup();
        let subject = Subject {
            actor_id: Some("u2"),
            ..Subject::default()
        };
        let id = notify(&conn, "u1", NotificationKind::Follow, "Bo followed you", subject)
            .unwrap()
            .unwrap();
        assert_eq!(unread_count(&conn, "u1").unwrap(), 1);

        assert!(mark_read(&conn, "u2", &id).unwrap().is_none());
        let read = mark_read(&conn, "u1", &id).unwrap().unwrap();
        assert!(read.read);
        assert_eq!(read.kind, NotificationKind::Follow);
        assert_eq!(unread_count(&conn, "u1").unwrap(), 0);
    }

    #[test]
    fn mark_all_read_counts_changes() {
        let conn = setup();
        let subject = Subject {
            actor_id: Some("u2"),
            ..Subject::default()
        };
        for _ in 0..3 {
            notify(&conn, "u1", NotificationKind::Like, "liked", subject).unwrap();
        }
        assert_eq!(mark_all_read(&conn, "u1").unwrap(), 3);
        assert_eq!(mark_all_read(&conn, "u1").unwrap(), 0);

        let page = page_for(
            &conn,
            "u1",
            &PageRequest {
                cursor: None,
                limit: 10,
            },
        )
        .unwrap();
        assert_eq!(page.len(), 3);
        assert!(page.iter().all(|n| n.read));
    }
}
