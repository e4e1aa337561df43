use axum::extract::rejection::QueryRejection;
use axum::extract::{Query, State};
use axum::response::{IntoResponse, Response};
use axum::routing::get;
use axum::{Json, Router};
use serde_json::json;

use crate::error::{AppError, AppResult};
use crate::extractors::CurrentUser;
use crate::pagination::{Page, PageQuery};
use crate::state::AppState;
use crate::store::{posts, users};

const MY_POSTS_PAGE_SIZE: u32 = 5;
const PROFILE_RECENT_POSTS: u32 = 10;

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/api/whoami", get(whoami))
        .route("/api/whoami/post", get(my_posts))
}

async fn whoami(State(state): State<AppState>, user: CurrentUser) -> AppResult<Response> {
    let conn = state.db.get()?;
    let profile = users::find(&conn, &user.id)?.ok_or(AppError::Unauthorized)?;
    let recent = posts::recent_for_user(&conn, &user.id, PROFILE_RECENT_POSTS)?;

    Ok(Json(json!({
        "data": {
            "id": profile.id,
            "name": profile.name,
            "email": profile.email,
            "image": profile.image,
            "country": profile.country,
            "createdAt": profile.created_at,
            "posts": recent,
        }
    }))
    .into_response())
}

async fn my_posts(
    State(state): State<AppState>,
    user: CurrentUser,
    query: Result<Query<PageQuery>, QueryRejection>,
) -> AppResult<Response> {
    let Query(query) = query?;
    let page = query.resolve(MY_POSTS_PAGE_SIZE);

    let conn = state.db.get()?;
    let rows = posts::user_page(&conn, &user.id, &page)?;
    let page = Page::from_rows(rows, page.limit, |v| v.post.id.as_str());

    Ok(Json(json!({ "data": page.data, "nextCursor": page.next_cursor })).into_response())
}
