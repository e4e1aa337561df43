use axum::extract::rejection::QueryRejection;
use axum::extract::{Path, Query, State};
use axum::response::{IntoResponse, Response};
use axum::routing::{get, patch};
use axum::{Json, Router};
use serde_json::json;

use crate::error::{AppError, AppResult};
use crate::extractors::CurrentUser;
use crate::pagination::{Page, PageQuery};
use crate::state::AppState;
use crate::store::notifications;

const NOTIFICATIONS_PAGE_SIZE: u32 = 10;

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/api/notifications", get(list_notifications))
        .route("/api/notifications/read-all", patch(mark_all_read))
        .route("/api/notifications/{id}/read", patch(mark_read))
}

async fn list_notifications(
    State(state): State<AppState>,
    user: CurrentUser,
    query: Result<Query<PageQuery>, QueryRejection>,
) -> AppResult<Response> {
    let Query(query) = query?;
    let page = query.resolve(NOTIFICATIONS_PAGE_SIZE);

    let conn = state.db.get()?;
    let rows = notifications::page_for(&conn, &user.id, &page)?;
    let unread = notifications::unread_count(&conn, &user.id)?;
    let page = Page::from_rows(rows, page.limit, |n| n.id.as_str());

    Ok(Json(json!({
        "data": page.data,
        "nextCursor": page.next_cursor,
        "unread": unread,
    }))
    .into_response())
}

async fn mark_read(
    State(state): State<AppState>,
    user: CurrentUser,
    Path(id): Path<String>,
) -> AppResult<Response> {
    let conn = state.db.get()?;
    let notification = notifications::mark_read(&conn, &user.id, &id)?
        .ok_or(AppError::NotFound("Notification"))?;
    Ok(Json(json!({ "data": notification })).into_response())
}

async fn mark_all_read(State(state): State<AppState>, user: CurrentUser) -> AppResult<Response> {
    let conn = state.db.get()?;
    let updated = notifications::mark_all_read(&conn, &user.id)?;
    Ok(Json(json!({ "updated": updated })).into_response())
}
