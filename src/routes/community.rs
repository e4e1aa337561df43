use axum::extract::rejection::{JsonRejection, QueryRejection};
use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use serde::Deserialize;
use serde_json::json;

use crate::db::models::MemberRole;
use crate::error::{AppError, AppResult};
use crate::extractors::CurrentUser;
use crate::pagination::{Page, PageQuery};
use crate::state::AppState;
use crate::store::communities;
use crate::store::toggle::{self, MEMBERSHIPS};
use crate::validation::ValidationErrors;

const POSTS_PAGE_SIZE: u32 = 10;

#[derive(Deserialize, Default)]
#[serde(default, rename_all = "camelCase")]
pub struct CreateCommunityInput {
    pub name: Option<String>,
    pub description: Option<String>,
    pub category_id: Option<String>,
}

#[derive(Deserialize, Default)]
#[serde(default)]
pub struct CommunityPostInput {
    pub content: Option<String>,
}

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/api/community", post(create_community))
        .route("/api/community/categories", get(list_categories))
        .route("/api/community/{id}", get(get_community))
        .route(
            "/api/community/{id}/posts",
            get(list_community_posts).post(create_community_post),
        )
        .route("/api/community/{id}/membership", post(toggle_membership))
}

async fn list_categories(State(state): State<AppState>) -> AppResult<Response> {
    let conn = state.db.get()?;
    let categories = communities::categories(&conn)?;
    Ok(Json(json!({ "data": categories })).into_response())
}

async fn create_community(
    State(state): State<AppState>,
    user: CurrentUser,
    payload: Result<Json<CreateCommunityInput>, JsonRejection>,
) -> AppResult<Response> {
    let Json(input) = payload?;

    let mut errors = ValidationErrors::new();
    let name = errors.require("name", input.name.as_deref());
    errors.max_len("name", name, 100);
    let description = input
        .description
        .as_deref()
        .map(str::trim)
        .filter(|d| !d.is_empty());
    if let Some(description) = description {
        errors.max_len("description", description, 1000);
    }
    let category_id = input
        .category_id
        .as_deref()
        .map(str::trim)
        .filter(|c| !c.is_empty());

    let mut conn = state.db.get()?;
    if let Some(category_id) = category_id {
        if communities::find_category(&conn, category_id)?.is_none() {
            errors.add("categoryId", "categoryId does not match a known category");
        }
    }
    errors.into_result()?;

    let community = communities::create(&mut conn, &user.id, name, description, category_id)?;
    tracing::info!(community_id = %community.id, creator = %user.id, "community created");

    Ok((StatusCode::CREATED, Json(json!({ "data": community }))).into_response())
}

async fn get_community(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> AppResult<Response> {
    let conn = state.db.get()?;
    let detail = communities::detail(&conn, &id)?.ok_or(AppError::NotFound("Community"))?;
    Ok(Json(json!({ "data": detail })).into_response())
}

async fn list_community_posts(
    State(state): State<AppState>,
    Path(id): Path<String>,
    query: Result<Query<PageQuery>, QueryRejection>,
) -> AppResult<Response> {
    let Query(query) = query?;
    let page = query.resolve(POSTS_PAGE_SIZE);

    let conn = state.db.get()?;
    communities::find(&conn, &id)?.ok_or(AppError::NotFound("Community"))?;
    let rows = communities::posts_page(&conn, &id, &page)?;
    let page = Page::from_rows(rows, page.limit, |p| p.id.as_str());

    Ok(Json(json!({
        "data": page.data,
        "hasMore": page.has_more(),
        "nextCursor": page.next_cursor,
    }))
    .into_response())
}

async fn create_community_post(
    State(state): State<AppState>,
    user: CurrentUser,
    Path(id): Path<String>,
    payload: Result<Json<CommunityPostInput>, JsonRejection>,
) -> AppResult<Response> {
    let Json(input) = payload?;

    let mut errors = ValidationErrors::new();
    let content = errors.require("content", input.content.as_deref());
    errors.max_len("content", content, 2000);
    errors.into_result()?;

    let conn = state.db.get()?;
    communities::find(&conn, &id)?.ok_or(AppError::NotFound("Community"))?;
    if communities::role_of(&conn, &id, &user.id)?.is_none() {
        return Err(AppError::Forbidden(
            "Only members can post in this community".into(),
        ));
    }

    let post = communities::create_post(&conn, &id, &user.id, content)?;
    Ok((StatusCode::CREATED, Json(json!({ "data": post }))).into_response())
}

/// Join or leave. The creator cannot leave their own community.
async fn toggle_membership(
    State(state): State<AppState>,
    user: CurrentUser,
    Path(id): Path<String>,
) -> AppResult<Response> {
    let mut conn = state.db.get()?;
    let community = communities::find(&conn, &id)?.ok_or(AppError::NotFound("Community"))?;

    if community.creator_id == user.id
        && communities::role_of(&conn, &id, &user.id)? == Some(MemberRole::Admin)
    {
        return Err(AppError::BadRequest(
            "The creator cannot leave their community".into(),
        ));
    }

    let response = if toggle::toggle(&mut conn, MEMBERSHIPS, &user.id, &id)?.is_on() {
        (
            StatusCode::CREATED,
            Json(json!({ "message": "Joined community", "joined": true })),
        )
    } else {
        (
            StatusCode::OK,
            Json(json!({ "message": "Left community", "joined": false })),
        )
    };
    Ok(response.into_response())
}
