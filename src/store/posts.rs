use rusqlite::{params, params_from_iter, Connection, OptionalExtension, Row};
use std::collections::HashMap;

use crate::db::models::{Access, Media, MediaType, Post, PostCounts, PostDetail, PostView};
use crate::pagination::PageRequest;
use crate::store::toggle::{self, BOOKMARKS, LIKES};
use crate::store::{follows, new_id, now, users};

const POST_COLUMNS: &str = "id, content, user_id, access, created_at, updated_at";

const POST_VIEW_SELECT: &str = "
    SELECT p.id, p.content, p.user_id, p.access, p.created_at, p.updated_at,
           u.id, u.name, u.image, u.country,
           (SELECT COUNT(*) FROM likes l WHERE l.post_id = p.id),
           (SELECT COUNT(*) FROM post_comments c WHERE c.post_id = p.id),
           (SELECT COUNT(*) FROM bookmarks b WHERE b.post_id = p.id)
    FROM posts p
    JOIN users u ON u.id = p.user_id";

#[derive(Debug, Clone)]
pub struct NewMedia {
    pub url: String,
    pub media_type: MediaType,
}

fn post_from_row(row: &Row<'_>) -> rusqlite::Result<Post> {
    Ok(Post {
        id: row.get(0)?,
        content: row.get(1)?,
        user_id: row.get(2)?,
        access: row.get(3)?,
        created_at: row.get(4)?,
        updated_at: row.get(5)?,
    })
}

fn view_from_row(row: &Row<'_>) -> rusqlite::Result<PostView> {
    Ok(PostView {
        post: post_from_row(row)?,
        author: users::summary_at(row, 6)?,
        media: Vec::new(),
        counts: PostCounts {
            likes: row.get(10)?,
            comments: row.get(11)?,
            bookmarks: row.get(12)?,
        },
    })
}

/// Private posts are only visible to their owner.
pub fn visible_to(post: &Post, viewer: Option<&str>) -> bool {
    post.access == Access::Public || viewer == Some(post.user_id.as_str())
}

pub fn create(
    conn: &mut Connection,
    user_id: &str,
    content: &str,
    access: Access,
    media: &[NewMedia],
) -> rusqlite::Result<PostView> {
    let post_id = new_id();
    let ts = now();

    let tx = conn.transaction()?;
    tx.execute(
        "INSERT INTO posts (id, user_id, content, access, created_at, updated_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?5)",
        params![post_id, user_id, content, access, ts],
    )?;
    for (position, item) in media.iter().enumerate() {
        tx.execute(
            "INSERT INTO media (id, post_id, url, type, position) VALUES (?1, ?2, ?3, ?4, ?5)",
            params![new_id(), post_id, item.url, item.media_type, position as i64],
        )?;
    }
    tx.commit()?;

    view(conn, &post_id)?.ok_or(rusqlite::Error::QueryReturnedNoRows)
}

pub fn find(conn: &Connection, id: &str) -> rusqlite::Result<Option<Post>> {
    conn.query_row(
        &format!("SELECT {POST_COLUMNS} FROM posts WHERE id = ?1"),
        params![id],
        post_from_row,
    )
    .optional()
}

/// The post if it exists and `viewer` may see it.
pub fn find_visible(
    conn: &Connection,
    id: &str,
    viewer: Option<&str>,
) -> rusqlite::Result<Option<Post>> {
    Ok(find(conn, id)?.filter(|post| visible_to(post, viewer)))
}

pub fn view(conn: &Connection, id: &str) -> rusqlite::Result<Option<PostView>> {
    let found = conn
        .query_row(
            &format!("{POST_VIEW_SELECT} WHERE p.id = ?1"),
            params![id],
            view_from_row,
        )
        .optional()?;
    match found {
        Some(view) => Ok(with_media(conn, vec![view])?.pop()),
        None => Ok(None),
    }
}

/// Single-post fetch with viewer-relative flags. `None` when absent or hidden from `viewer`.
pub fn detail(
    conn: &Connection,
    id: &str,
    viewer: Option<&str>,
) -> rusqlite::Result<Option<PostDetail>> {
    let Some(view) = view(conn, id)? else {
        return Ok(None);
    };
    if !visible_to(&view.post, viewer) {
        return Ok(None);
    }

    let (is_following_author, is_bookmarked, is_liked) = match viewer {
        Some(viewer) => (
            follows::is_following(conn, viewer, &view.post.user_id)?,
            toggle::exists(conn, BOOKMARKS, viewer, id)?,
            toggle::exists(conn, LIKES, viewer, id)?,
        ),
        None => (false, false, false),
    };

    Ok(Some(PostDetail {
        view,
        is_following_author,
        is_bookmarked,
        is_liked,
    }))
}

/// Public posts plus the viewer's own, newest first.
pub fn feed_page(
    conn: &Connection,
    viewer: Option<&str>,
    page: &PageRequest,
) -> rusqlite::Result<Vec<PostView>> {
    let sql = format!(
        "{POST_VIEW_SELECT}
         WHERE (p.access = 'public' OR p.user_id = ?1)
           AND (?2 IS NULL OR (p.created_at, p.id) < (SELECT c.created_at, c.id FROM posts c WHERE c.id = ?2))
         ORDER BY p.created_at DESC, p.id DESC
         LIMIT ?3"
    );
    let mut stmt = conn.prepare(&sql)?;
    let views = stmt
        .query_map(params![viewer, page.cursor, page.limit], view_from_row)?
        .collect::<Result<Vec<_>, _>>()?;
    with_media(conn, views)
}

/// All of one user's posts, newest first. Callers restrict this to the owner.
pub fn user_page(
    conn: &Connection,
    user_id: &str,
    page: &PageRequest,
) -> rusqlite::Result<Vec<PostView>> {
    let sql = format!(
        "{POST_VIEW_SELECT}
         WHERE p.user_id = ?1
           AND (?2 IS NULL OR (p.created_at, p.id) < (SELECT c.created_at, c.id FROM posts c WHERE c.id = ?2))
         ORDER BY p.created_at DESC, p.id DESC
         LIMIT ?3"
    );
    let mut stmt = conn.prepare(&sql)?;
    let views = stmt
        .query_map(params![user_id, page.cursor, page.limit], view_from_row)?
        .collect::<Result<Vec<_>, _>>()?;
    with_media(conn, views)
}

pub fn recent_for_user(conn: &Connection, user_id: &str, limit: u32) -> rusqlite::Result<Vec<Post>> {
    let mut stmt = conn.prepare(&format!(
        "SELECT {POST_COLUMNS} FROM posts WHERE user_id = ?1
         ORDER BY created_at DESC, id DESC LIMIT ?2"
    ))?;
    let posts = stmt
        .query_map(params![user_id, limit], post_from_row)?
        .collect::<Result<Vec<_>, _>>()?;
    Ok(posts)
}

/// Flip public/private in one statement. `None` when the post is missing or not owned by `owner`.
pub fn toggle_access(
    conn: &Connection,
    owner: &str,
    post_id: &str,
) -> rusqlite::Result<Option<Post>> {
    conn.query_row(
        &format!(
            "UPDATE posts
             SET access = CASE access WHEN 'public' THEN 'private' ELSE 'public' END,
                 updated_at = ?3
             WHERE id = ?1 AND user_id = ?2
             RETURNING {POST_COLUMNS}"
        ),
        params![post_id, owner, now()],
        post_from_row,
    )
    .optional()
}

pub fn like_count(conn: &Connection, post_id: &str) -> rusqlite::Result<i64> {
    conn.query_row(
        "SELECT COUNT(*) FROM likes WHERE post_id = ?1",
        params![post_id],
        |row| row.get(0),
    )
}

/// Fill in media for a batch of posts with one query.
fn with_media(conn: &Connection, mut views: Vec<PostView>) -> rusqlite::Result<Vec<PostView>> {
    if views.is_empty() {
        return Ok(views);
    }

    let placeholders = (1..=views.len())
        .map(|i| format!("?{i}"))
        .collect::<Vec<_>>()
        .join(", ");
    let mut stmt = conn.prepare(&format!(
        "SELECT id, post_id, url, type FROM media
         WHERE post_id IN ({placeholders})
         ORDER BY position"
    ))?;

    let ids = views.iter().map(|v| v.post.id.as_str());
    let mut by_post: HashMap<String, Vec<Media>> = HashMap::new();
    let rows = stmt.query_map(params_from_iter(ids), |row| {
        Ok(Media {
            id: row.get(0)?,
            post_id: row.get(1)?,
            url: row.get(2)?,
            media_type: row.get(3)?,
        })
    })?;
    for media in rows {
        let media = media?;
        by_post.entry(media.post_id.clone()).or_default().push(media);
    }

    for view in &mut views {
        view.media = by_post.remove(&view.post.id).unwrap_or_default();
    }
    Ok(views)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::test_conn;
    use crate::store::fixtures;
    use std::collections::HashSet;

    fn first_page(limit: u32) -> PageRequest {
        PageRequest {
            cursor: None,
            limit,
        }
    }

    #[test]
    fn create_stores_media_in_order() {
        let mut conn = test_conn();
        fixtures::user(&conn, "u1", "Ana");
        let media = vec![
            NewMedia {
                url: "https://cdn.example.com/1.png".into(),
                media_type: MediaType::Image,
            },
            NewMedia {
                url: "https://cdn.example.com/2.gif".into(),
                media_type: MediaType::Gif,
            },
        ];
        let view = create(&mut conn, "u1", "hello", Access::Public, &media).unwrap();

        assert_eq!(view.author.name, "Ana");
        assert_eq!(view.media.len(), 2);
        assert_eq!(view.media[0].url, "https://cdn.example.com/1.png");
        assert_eq!(view.media[1].media_type, MediaType::Gif);
        assert_eq!(view.counts, PostCounts::default());
    }

    #[test]
    fn pages_chain_without_gaps_or_repeats_even_with_tied_timestamps() {
        let conn = test_conn();
        fixtures::user(&conn, "u1", "Ana");
        // Seven posts, five of them sharing one timestamp.
        for i in 0..5 {
            fixtures::post_at(&conn, &format!("tie-{i}"), "u1", "2025-01-01T00:00:00.000Z");
        }
        fixtures::post_at(&conn, "newest", "u1", "2025-02-01T00:00:00.000Z");
        fixtures::post_at(&conn, "oldest", "u1", "2024-12-01T00:00:00.000Z");

        let mut seen = Vec::new();
        let mut page = first_page(3);
        loop {
            let rows = user_page(&conn, "u1", &page).unwrap();
            if let Some(cursor) = &page.cursor {
                assert!(rows.iter().all(|r| &r.post.id != cursor));
            }
            let full = rows.len() == page.limit as usize;
            seen.extend(rows.iter().map(|r| r.post.id.clone()));
            if !full {
                break;
            }
            page.cursor = rows.last().map(|r| r.post.id.clone());
        }

        assert_eq!(seen.len(), 7);
        assert_eq!(seen.iter().collect::<HashSet<_>>().len(), 7);
        assert_eq!(seen.first().map(String::as_str), Some("newest"));
        assert_eq!(seen.last().map(String::as_str), Some("oldest"));
    }

    #[test]
    fn unknown_cursor_yields_empty_page() {
        let conn = test_conn();
        fixtures::user(&conn, "u1", "Ana");
        fixtures::post_at(&conn, "p1", "u1", "2025-01-01T00:00:00.000Z");
        let page = PageRequest {
            cursor: Some("missing".into()),
            limit: 5,
        };
        assert!(user_page(&conn, "u1", &page).unwrap().is_empty());
    }

    #[test]
    fn feed_hides_other_users_private_posts() {
        let conn = test_conn();
        fixtures::user(&conn, "u1", "Ana");
        fixtures::user(&conn, "u2", "Bo");
        fixtures::post_at(&conn, "p1", "u1", "2025-01-01T00:00:00.000Z");
        fixtures::post_at(&conn, "p2", "u2", "2025-01-02T00:00:00.000Z");
        toggle_access(&conn, "u2", "p2").unwrap().unwrap();

        let anon: Vec<String> = feed_page(&conn, None, &first_page(10))
            .unwrap()
            .into_iter()
            .map(|v| v.post.id)
            .collect();
        assert_eq!(anon, vec!["p1"]);

        let owner = feed_page(&conn, Some("u2"), &first_page(10)).unwrap();
        assert_eq!(owner.len(), 2);
    }

    #[test]
    fn toggle_access_is_owner_only_and_flips_back() {
        let conn = test_conn();
        fixtures::user(&conn, "u1", "Ana");
        fixtures::user(&conn, "u2", "Bo");
        fixtures::post_at(&conn, "p1", "u1", "2025-01-01T00:00:00.000Z");

        assert!(toggle_access(&conn, "u2", "p1").unwrap().is_none());
        assert_eq!(find(&conn, "p1").unwrap().unwrap().access, Access::Public);

        let flipped = toggle_access(&conn, "u1", "p1").unwrap().unwrap();
        assert_eq!(flipped.access, Access::Private);
        let restored = toggle_access(&conn, "u1", "p1").unwrap().unwrap();
        assert_eq!(restored.access, Access::Public);
    }

    #[test]
    fn detail_reports_follow_state_of_viewer() {
        let conn = test_conn();
        fixtures::user(&conn, "author", "Ana");
        fixtures::user(&conn, "fan", "Bo");
        fixtures::user(&conn, "stranger", "Cy");
        fixtures::post_at(&conn, "p1", "author", "2025-01-01T00:00:00.000Z");
        fixtures::follow(&conn, "fan", "author");

        let fan = detail(&conn, "p1", Some("fan")).unwrap().unwrap();
        assert!(fan.is_following_author);
        let stranger = detail(&conn, "p1", Some("stranger")).unwrap().unwrap();
        assert!(!stranger.is_following_author);
        let anon = detail(&conn, "p1", None).unwrap().unwrap();
        assert!(!anon.is_following_author);
    }

    #[test]
    fn detail_hides_private_posts_from_others() {
        let conn = test_conn();
        fixtures::user(&conn, "u1", "Ana");
        fixtures::user(&conn, "u2", "Bo");
        fixtures::post_at(&conn, "p1", "u1", "2025-01-01T00:00:00.000Z");
        toggle_access(&conn, "u1", "p1").unwrap();

        assert!(detail(&conn, "p1", Some("u2")).unwrap().is_none());
        assert!(detail(&conn, "p1", Some("u1")).unwrap().is_some());
    }
}
