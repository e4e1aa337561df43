use rusqlite::{params, Connection, OptionalExtension, Row};

use crate::db::models::{
    Community, CommunityCategory, CommunityCounts, CommunityDetail, CommunityMember,
    CommunityPost, MemberRole,
};
use crate::pagination::PageRequest;
use crate::store::{new_id, now, users};

const COMMUNITY_COLUMNS: &str =
    "id, name, description, creator_id, category_id, created_at, updated_at";

fn community_from_row(row: &Row<'_>) -> rusqlite::Result<Community> {
    Ok(Community {
        id: row.get(0)?,
        name: row.get(1)?,
        description: row.get(2)?,
        creator_id: row.get(3)?,
        category_id: row.get(4)?,
        created_at: row.get(5)?,
        updated_at: row.get(6)?,
    })
}

fn community_post_from_row(row: &Row<'_>) -> rusqlite::Result<CommunityPost> {
    Ok(CommunityPost {
        id: row.get(0)?,
        community_id: row.get(1)?,
        user_id: row.get(2)?,
        content: row.get(3)?,
        created_at: row.get(4)?,
        updated_at: row.get(5)?,
        author: users::summary_at(row, 6)?,
    })
}

/// Create a community; its creator joins as ADMIN in the same transaction.
pub fn create(
    conn: &mut Connection,
    creator_id: &str,
    name: &str,
    description: Option<&str>,
    category_id: Option<&str>,
) -> rusqlite::Result<Community> {
    let ts = now();
    let community = Community {
        id: new_id(),
        name: name.to_string(),
        description: description.map(str::to_string),
        creator_id: creator_id.to_string(),
        category_id: category_id.map(str::to_string),
        created_at: ts.clone(),
        updated_at: ts,
    };

    let tx = conn.transaction()?;
    tx.execute(
        &format!("INSERT INTO communities ({COMMUNITY_COLUMNS}) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)"),
        params![
            community.id,
            community.name,
            community.description,
            community.creator_id,
            community.category_id,
            community.created_at,
            community.updated_at
        ],
    )?;
    tx.execute(
        "INSERT INTO community_memberships (user_id, community_id, role) VALUES (?1, ?2, ?3)",
        params![creator_id, community.id, MemberRole::Admin],
    )?;
    tx.commit()?;

    Ok(community)
}

pub fn find(conn: &Connection, id: &str) -> rusqlite::Result<Option<Community>> {
    conn.query_row(
        &format!("SELECT {COMMUNITY_COLUMNS} FROM communities WHERE id = ?1"),
        params![id],
        community_from_row,
    )
    .optional()
}

pub fn categories(conn: &Connection) -> rusqlite::Result<Vec<CommunityCategory>> {
    let mut stmt = conn.prepare("SELECT id, name FROM community_categories ORDER BY name")?;
    let categories = stmt
        .query_map([], |row| {
            Ok(CommunityCategory {
                id: row.get(0)?,
                name: row.get(1)?,
            })
        })?
        .collect::<Result<Vec<_>, _>>()?;
    Ok(categories)
}

pub fn find_category(conn: &Connection, id: &str) -> rusqlite::Result<Option<CommunityCategory>> {
    conn.query_row(
        "SELECT id, name FROM community_categories WHERE id = ?1",
        params![id],
        |row| {
            Ok(CommunityCategory {
                id: row.get(0)?,
                name: row.get(1)?,
            })
        },
    )
    .optional()
}

pub fn role_of(
    conn: &Connection,
    community_id: &str,
    user_id: &str,
) -> rusqlite::Result<Option<MemberRole>> {
    conn.query_row(
        "SELECT role FROM community_memberships WHERE community_id = ?1 AND user_id = ?2",
        params![community_id, user_id],
        |row| row.get(0),
    )
    .optional()
}

pub fn members(conn: &Connection, community_id: &str) -> rusqlite::Result<Vec<CommunityMember>> {
    let mut stmt = conn.prepare(
        "SELECT u.id, u.name, u.image, u.country, m.role, m.joined_at
         FROM community_memberships m
         JOIN users u ON u.id = m.user_id
         WHERE m.community_id = ?1
         ORDER BY m.joined_at ASC, u.id ASC",
    )?;
    let members = stmt
        .query_map(params![community_id], |row| {
            Ok(CommunityMember {
                user: users::summary_at(row, 0)?,
                role: row.get(4)?,
                joined_at: row.get(5)?,
            })
        })?
        .collect::<Result<Vec<_>, _>>()?;
    Ok(members)
}

/// Community with its category, creator, members and counts.
pub fn detail(conn: &Connection, id: &str) -> rusqlite::Result<Option<CommunityDetail>> {
    let Some(community) = find(conn, id)? else {
        return Ok(None);
    };

    let category = match &community.category_id {
        Some(category_id) => find_category(conn, category_id)?,
        None => None,
    };
    let creator = conn.query_row(
        "SELECT id, name, image, country FROM users WHERE id = ?1",
        params![community.creator_id],
        |row| users::summary_at(row, 0),
    )?;
    let members = members(conn, id)?;
    let posts: i64 = conn.query_row(
        "SELECT COUNT(*) FROM community_posts WHERE community_id = ?1",
        params![id],
        |row| row.get(0),
    )?;

    Ok(Some(CommunityDetail {
        counts: CommunityCounts {
            members: members.len() as i64,
            posts,
        },
        community,
        category,
        creator,
        members,
    }))
}

pub fn create_post(
    conn: &Connection,
    community_id: &str,
    user_id: &str,
    content: &str,
) -> rusqlite::Result<CommunityPost> {
    let id = new_id();
    let ts = now();
    conn.execute(
        "INSERT INTO community_posts (id, community_id, user_id, content, created_at, updated_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?5)",
        params![id, community_id, user_id, content, ts],
    )?;
    conn.query_row(
        "SELECT p.id, p.community_id, p.user_id, p.content, p.created_at, p.updated_at,
                u.id, u.name, u.image, u.country
         FROM community_posts p JOIN users u ON u.id = p.user_id
         WHERE p.id = ?1",
        params![id],
        community_post_from_row,
    )
}

/// Newest community posts first, continuing after `page.cursor`.
pub fn posts_page(
    conn: &Connection,
    community_id: &str,
    page: &PageRequest,
) -> rusqlite::Result<Vec<CommunityPost>> {
    let mut stmt = conn.prepare(
        "SELECT p.id, p.community_id, p.user_id, p.content, p.created_at, p.updated_at,
                u.id, u.name, u.image, u.country
         FROM community_posts p
         JOIN users u ON u.id = p.user_id
         WHERE p.community_id = ?1
           AND (?2 IS NULL OR (p.created_at, p.id) <
                (SELECT c.created_at, c.id FROM community_posts c WHERE c.id = ?2))
         ORDER BY p.created_at DESC, p.id DESC
         LIMIT ?3",
    )?;
    let posts = stmt
        .query_map(
            params![community_id, page.cursor, page.limit],
            community_post_from_row,
        )?
        .collect::<Result<Vec<_>, _>>()?;
    Ok(posts)
}
