use rusqlite::{params, Connection, OptionalExtension, Row};

use crate::db::models::{Project, ProjectView};
use crate::pagination::{OffsetRequest, PageRequest};
use crate::store::{new_id, now, users};

const PROJECT_COLUMNS: &str =
    "id, name, description, category, user_id, status, created_at, updated_at";

// Projects with their star count, aliased `r` for the ranking queries.
const RANKED: &str = "
    WITH ranked AS (
        SELECT p.*, (SELECT COUNT(*) FROM project_stars s WHERE s.project_id = p.id) AS star_count
        FROM projects p
    )";

const VIEW_COLUMNS: &str = "r.id, r.name, r.description, r.category, r.user_id, r.status, r.created_at, r.updated_at,
    u.id, u.name, u.image, u.country, r.star_count";

pub struct NewProject<'a> {
    pub name: &'a str,
    pub description: Option<&'a str>,
    pub category: Option<&'a str>,
    pub status: Option<&'a str>,
}

fn project_from_row(row: &Row<'_>) -> rusqlite::Result<Project> {
    Ok(Project {
        id: row.get(0)?,
        name: row.get(1)?,
        description: row.get(2)?,
        category: row.get(3)?,
        user_id: row.get(4)?,
        status: row.get(5)?,
        created_at: row.get(6)?,
        updated_at: row.get(7)?,
    })
}

fn view_from_row(row: &Row<'_>) -> rusqlite::Result<ProjectView> {
    Ok(ProjectView {
        project: project_from_row(row)?,
        owner: users::summary_at(row, 8)?,
        stars: row.get(12)?,
    })
}

pub fn create(conn: &Connection, user_id: &str, new: &NewProject<'_>) -> rusqlite::Result<ProjectView> {
    let id = new_id();
    let ts = now();
    conn.execute(
        "INSERT INTO projects (id, name, description, category, user_id, status, created_at, updated_at)
         VALUES (?1, ?2, ?3, ?4, ?5, COALESCE(?6, 'ACTIVE'), ?7, ?7)",
        params![id, new.name, new.description, new.category, user_id, new.status, ts],
    )?;
    view(conn, &id)?.ok_or(rusqlite::Error::QueryReturnedNoRows)
}

pub fn find(conn: &Connection, id: &str) -> rusqlite::Result<Option<Project>> {
    conn.query_row(
        &format!("SELECT {PROJECT_COLUMNS} FROM projects WHERE id = ?1"),
        params![id],
        project_from_row,
    )
    .optional()
}

pub fn view(conn: &Connection, id: &str) -> rusqlite::Result<Option<ProjectView>> {
    conn.query_row(
        &format!(
            "{RANKED}
             SELECT {VIEW_COLUMNS} FROM ranked r JOIN users u ON u.id = r.user_id
             WHERE r.id = ?1"
        ),
        params![id],
        view_from_row,
    )
    .optional()
}

pub fn star_count(conn: &Connection, project_id: &str) -> rusqlite::Result<i64> {
    conn.query_row(
        "SELECT COUNT(*) FROM project_stars WHERE project_id = ?1",
        params![project_id],
        |row| row.get(0),
    )
}

/// Most-starred first. The cursor row's current `(star_count, id)` is the resume point.
pub fn rank_page(conn: &Connection, page: &PageRequest) -> rusqlite::Result<Vec<ProjectView>> {
    let mut stmt = conn.prepare(&format!(
        "{RANKED}
         SELECT {VIEW_COLUMNS} FROM ranked r JOIN users u ON u.id = r.user_id
         WHERE ?1 IS NULL OR (r.star_count, r.id) < (SELECT c.star_count, c.id FROM ranked c WHERE c.id = ?1)
         ORDER BY r.star_count DESC, r.id DESC
         LIMIT ?2"
    ))?;
    let projects = stmt
        .query_map(params![page.cursor, page.limit], view_from_row)?
        .collect::<Result<Vec<_>, _>>()?;
    Ok(projects)
}

/// Newest projects by page number, with the total for page math.
pub fn recommendation_page(
    conn: &Connection,
    request: OffsetRequest,
) -> rusqlite::Result<(Vec<ProjectView>, i64)> {
    let total: i64 = conn.query_row("SELECT COUNT(*) FROM projects", [], |row| row.get(0))?;
    let mut stmt = conn.prepare(&format!(
        "{RANKED}
         SELECT {VIEW_COLUMNS} FROM ranked r JOIN users u ON u.id = r.user_id
         ORDER BY r.created_at DESC, r.id DESC
         LIMIT ?1 OFFSET ?2"
    ))?;
    let projects = stmt
        .query_map(params![request.limit, request.offset()], view_from_row)?
        .collect::<Result<Vec<_>, _>>()?;
    Ok((projects, total))
}
