use axum::extract::rejection::QueryRejection;
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
use crate::pagination::MAX_LIMIT;
use crate::state::AppState;
use crate::store::notifications::{self, Subject};
use crate::store::toggle::{self, FOLLOWS};
use crate::store::{follows, users};

const USERS_PAGE_SIZE: u32 = 10;
const MAX_FOLLOW_CHECK_IDS: usize = 100;

#[derive(Deserialize, Default)]
pub struct ListUsersQuery {
    pub exclude: Option<String>,
    pub limit: Option<u32>,
}

#[derive(Deserialize, Default)]
pub struct CheckFollowQuery {
    /// Comma-separated user ids.
    pub ids: Option<String>,
}

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/api/users", get(list_users))
        .route("/api/users/check-follow", get(check_follow))
        .route("/api/users/{user_id}/counts", get(follow_counts))
        .route("/api/users/{user_id}/follow", post(toggle_follow))
}

async fn list_users(
    State(state): State<AppState>,
    query: Result<Query<ListUsersQuery>, QueryRejection>,
) -> AppResult<Response> {
    let Query(query) = query?;
    let limit = query.limit.unwrap_or(USERS_PAGE_SIZE).clamp(1, MAX_LIMIT);
    let exclude = query.exclude.as_deref().filter(|e| !e.is_empty());

    let conn = state.db.get()?;
    let users = users::list(&conn, exclude, limit)?;
    Ok(Json(users).into_response())
}

fn parse_ids(raw: Option<&str>) -> Vec<String> {
    let mut ids: Vec<String> = raw
        .unwrap_or_default()
        .split(',')
        .map(str::trim)
        .filter(|id| !id.is_empty())
        .map(str::to_string)
        .collect();
    ids.sort();
    ids.dedup();
    ids
}

async fn check_follow(
    State(state): State<AppState>,
    user: CurrentUser,
    query: Result<Query<CheckFollowQuery>, QueryRejection>,
) -> AppResult<Response> {
    let Query(query) = query?;
    let ids = parse_ids(query.ids.as_deref());
    if ids.is_empty() {
        return Err(AppError::BadRequest("ids query parameter is required".into()));
    }
    if ids.len() > MAX_FOLLOW_CHECK_IDS {
        return Err(AppError::BadRequest(format!(
            "at most {MAX_FOLLOW_CHECK_IDS} ids can be checked at once"
        )));
    }

    let conn = state.db.get()?;
    let status = follows::check_follow(&conn, &user.id, &ids)?;
    Ok(Json(status).into_response())
}

async fn follow_counts(
    State(state): State<AppState>,
    Path(user_id): Path<String>,
) -> AppResult<Response> {
    let counts = follows::follow_counts(&state.db, &user_id).await?;
    Ok(Json(counts).into_response())
}

async fn toggle_follow(
    State(state): State<AppState>,
    user: CurrentUser,
    Path(user_id): Path<String>,
) -> AppResult<Response> {
    let mut conn = state.db.get()?;
    if !users::exists(&conn, &user_id)? {
        return Err(AppError::NotFound("User"));
    }

    let following = toggle::toggle(&mut conn, FOLLOWS, &user.id, &user_id)?.is_on();
    if following {
        notifications::notify(
            &conn,
            &user_id,
            NotificationKind::Follow,
            &format!("{} started following you", user.name),
            Subject {
                actor_id: Some(&user.id),
                ..Subject::default()
            },
        )?;
    }

    let (status, message) = if following {
        (StatusCode::CREATED, "Followed")
    } else {
        (StatusCode::OK, "Unfollowed")
    };
    Ok((
        status,
        Json(json!({ "message": message, "following": following })),
    )
        .into_response())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_ids_trims_and_dedups() {
        assert_eq!(parse_ids(Some(" b,a,,b ,c")), vec!["a", "b", "c"]);
        assert!(parse_ids(Some(" , ")).is_empty());
        assert!(parse_ids(None).is_empty());
    }
}
