use axum::extract::rejection::JsonRejection;
use axum::extract::State;
use axum::routing::patch;
use axum::{Json, Router};
use serde::Deserialize;
use serde_json::{json, Value};

use crate::db::models::Access;
use crate::error::{AppError, AppResult};
use crate::extractors::CurrentUser;
use crate::state::AppState;
use crate::store::posts;
use crate::validation::ValidationErrors;

#[derive(Deserialize, Default)]
#[serde(default, rename_all = "camelCase")]
pub struct AccessInput {
    pub post_id: Option<String>,
}

pub fn router() -> Router<AppState> {
    Router::new().route("/api/security", patch(toggle_access))
}

/// Flip a post between public and private. Posts owned by someone else read as missing.
async fn toggle_access(
    State(state): State<AppState>,
    user: CurrentUser,
    payload: Result<Json<AccessInput>, JsonRejection>,
) -> AppResult<Json<Value>> {
    let Json(input) = payload?;
    let mut errors = ValidationErrors::new();
    let post_id = errors.require("postId", input.post_id.as_deref());
    errors.into_result()?;

    let conn = state.db.get()?;
    let post = posts::toggle_access(&conn, &user.id, post_id)?.ok_or(AppError::NotFound("Post"))?;

    let message = match post.access {
        Access::Public => "Post is now public",
        Access::Private => "Post is now private",
    };
    Ok(Json(json!({ "data": post, "message": message })))
}
