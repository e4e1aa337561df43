use axum::extract::rejection::{JsonRejection, QueryRejection};
use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use serde::Deserialize;
use serde_json::json;

use crate::db::models::NotificationKind;
use crate::error::{AppError, AppResult};
use crate::extractors::CurrentUser;
use crate::pagination::{OffsetPage, OffsetQuery, Page, PageQuery};
use crate::state::AppState;
use crate::store::notifications::{self, Subject};
use crate::store::projects::{self, NewProject};
use crate::store::toggle::{self, STARS};
use crate::validation::ValidationErrors;

const RANK_PAGE_SIZE: u32 = 10;
const RECOMMENDATION_PAGE_SIZE: u32 = 10;

#[derive(Deserialize, Default)]
#[serde(default)]
pub struct CreateProjectInput {
    pub name: Option<String>,
    pub description: Option<String>,
    pub category: Option<String>,
    pub status: Option<String>,
}

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/api/project", post(create_project))
        .route("/api/project/rank", get(rank_projects))
        .route("/api/project/recommendation", get(recommend_projects))
        .route("/api/project/{id}/star", post(toggle_star))
}

fn non_blank(value: Option<&str>) -> Option<&str> {
    value.map(str::trim).filter(|v| !v.is_empty())
}

async fn create_project(
    State(state): State<AppState>,
    user: CurrentUser,
    payload: Result<Json<CreateProjectInput>, JsonRejection>,
) -> AppResult<Response> {
    let Json(input) = payload?;

    let mut errors = ValidationErrors::new();
    let name = errors.require("name", input.name.as_deref());
    errors.max_len("name", name, 100);
    let description = non_blank(input.description.as_deref());
    if let Some(description) = description {
        errors.max_len("description", description, 2000);
    }
    errors.into_result()?;

    let conn = state.db.get()?;
    let project = projects::create(
        &conn,
        &user.id,
        &NewProject {
            name,
            description,
            category: non_blank(input.category.as_deref()),
            status: non_blank(input.status.as_deref()),
        },
    )?;

    Ok((StatusCode::CREATED, Json(json!({ "data": project }))).into_response())
}

async fn rank_projects(
    State(state): State<AppState>,
    query: Result<Query<PageQuery>, QueryRejection>,
) -> AppResult<Response> {
    let Query(query) = query?;
    let page = query.resolve(RANK_PAGE_SIZE);

    let conn = state.db.get()?;
    let rows = projects::rank_page(&conn, &page)?;
    let page = Page::from_rows(rows, page.limit, |p| p.project.id.as_str());

    Ok(Json(json!({ "projects": page.data, "nextCursor": page.next_cursor })).into_response())
}

async fn recommend_projects(
    State(state): State<AppState>,
    query: Result<Query<OffsetQuery>, QueryRejection>,
) -> AppResult<Response> {
    let Query(query) = query?;
    let request = query.resolve(RECOMMENDATION_PAGE_SIZE);

    let conn = state.db.get()?;
    let (rows, total) = projects::recommendation_page(&conn, request)?;

    Ok(Json(json!({
        "projects": rows,
        "pagination": OffsetPage::new(request, total),
    }))
    .into_response())
}

async fn toggle_star(
    State(state): State<AppState>,
    user: CurrentUser,
    Path(id): Path<String>,
) -> AppResult<Response> {
    let mut conn = state.db.get()?;
    let project = projects::find(&conn, &id)?.ok_or(AppError::NotFound("Project"))?;

    let starred = toggle::toggle(&mut conn, STARS, &user.id, &id)?.is_on();
    if starred {
        notifications::notify(
            &conn,
            &project.user_id,
            NotificationKind::Star,
            &format!("{} starred {}", user.name, project.name),
            Subject {
                actor_id: Some(&user.id),
                project_id: Some(&project.id),
                ..Subject::default()
            },
        )?;
    }
    let stars = projects::star_count(&conn, &id)?;

    let status = if starred {
        StatusCode::CREATED
    } else {
        StatusCode::OK
    };
    Ok((status, Json(json!({ "starred": starred, "stars": stars }))).into_response())
}
