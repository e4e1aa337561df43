use axum::extract::rejection::{JsonRejection, QueryRejection};
use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use serde::Deserialize;
use serde_json::json;

use crate::db::models::{Access, MediaType, NotificationKind};
use crate::error::{AppError, AppResult};
use crate::extractors::{CurrentUser, MaybeUser};
use crate::pagination::{Page, PageQuery};
use crate::state::AppState;
use crate::store::notifications::{self, Subject};
use crate::store::posts::{self, NewMedia};
use crate::store::toggle::{self, BOOKMARKS, LIKES};
use crate::store::comments;
use crate::validation::ValidationErrors;

const FEED_PAGE_SIZE: u32 = 10;
const MAX_POST_LEN: usize = 2000;
const MAX_COMMENT_LEN: usize = 500;
const MAX_MEDIA: usize = 10;

#[derive(Deserialize)]
pub struct MediaInput {
    pub url: String,
    #[serde(rename = "type")]
    pub media_type: MediaType,
}

#[derive(Deserialize, Default)]
#[serde(default)]
pub struct CreatePostInput {
    pub content: Option<String>,
    pub access: Option<Access>,
    pub media: Vec<MediaInput>,
}

#[derive(Deserialize, Default)]
#[serde(default, rename_all = "camelCase")]
pub struct PostRef {
    pub post_id: Option<String>,
}

#[derive(Deserialize, Default)]
#[serde(default, rename_all = "camelCase")]
pub struct CreateCommentInput {
    pub post_id: Option<String>,
    pub content: Option<String>,
    pub parent_id: Option<String>,
}

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/api/post", get(list_posts).post(create_post))
        .route("/api/post/bookmark", post(toggle_bookmark))
        .route("/api/post/like", post(toggle_like))
        .route("/api/post/comment", post(create_comment))
        .route("/api/post/{id}", get(get_post))
        .route("/api/post/{id}/comments", get(list_comments))
}

async fn list_posts(
    State(state): State<AppState>,
    viewer: MaybeUser,
    query: Result<Query<PageQuery>, QueryRejection>,
) -> AppResult<Response> {
    let Query(query) = query?;
    let page = query.resolve(FEED_PAGE_SIZE);

    let conn = state.db.get()?;
    let rows = posts::feed_page(&conn, viewer.id(), &page)?;
    let page = Page::from_rows(rows, page.limit, |v| v.post.id.as_str());

    Ok(Json(json!({
        "data": page.data,
        "nextCursor": page.next_cursor,
        "message": "Posts fetched successfully",
    }))
    .into_response())
}

async fn create_post(
    State(state): State<AppState>,
    user: CurrentUser,
    payload: Result<Json<CreatePostInput>, JsonRejection>,
) -> AppResult<Response> {
    let Json(input) = payload?;

    let mut errors = ValidationErrors::new();
    let content = errors.require("content", input.content.as_deref());
    errors.max_len("content", content, MAX_POST_LEN);
    if input.media.len() > MAX_MEDIA {
        errors.add("media", format!("media may hold at most {MAX_MEDIA} items"));
    }
    if input.media.iter().any(|m| m.url.trim().is_empty()) {
        errors.add("media", "media url is required");
    }
    errors.into_result()?;

    let media: Vec<NewMedia> = input
        .media
        .into_iter()
        .map(|m| NewMedia {
            url: m.url.trim().to_string(),
            media_type: m.media_type,
        })
        .collect();

    let mut conn = state.db.get()?;
    let view = posts::create(
        &mut conn,
        &user.id,
        content,
        input.access.unwrap_or(Access::Public),
        &media,
    )?;

    Ok((
        StatusCode::CREATED,
        Json(json!({ "data": view, "message": "Post created successfully" })),
    )
        .into_response())
}

async fn get_post(
    State(state): State<AppState>,
    viewer: MaybeUser,
    Path(id): Path<String>,
) -> AppResult<Response> {
    let conn = state.db.get()?;
    let detail = posts::detail(&conn, &id, viewer.id())?.ok_or(AppError::NotFound("Post"))?;
    Ok(Json(json!({ "data": detail })).into_response())
}

async fn list_comments(
    State(state): State<AppState>,
    viewer: MaybeUser,
    Path(id): Path<String>,
) -> AppResult<Response> {
    let conn = state.db.get()?;
    posts::find_visible(&conn, &id, viewer.id())?.ok_or(AppError::NotFound("Post"))?;
    let comments = comments::list_for_post(&conn, &id)?;
    Ok(Json(json!({ "data": comments })).into_response())
}

fn required_post_id(input: PostRef) -> AppResult<String> {
    let mut errors = ValidationErrors::new();
    let post_id = errors.require("postId", input.post_id.as_deref()).to_string();
    errors.into_result()?;
    Ok(post_id)
}

async fn toggle_bookmark(
    State(state): State<AppState>,
    user: CurrentUser,
    payload: Result<Json<PostRef>, JsonRejection>,
) -> AppResult<Response> {
    let Json(input) = payload?;
    let post_id = required_post_id(input)?;

    let mut conn = state.db.get()?;
    posts::find_visible(&conn, &post_id, Some(&user.id))?.ok_or(AppError::NotFound("Post"))?;

    let response = if toggle::toggle(&mut conn, BOOKMARKS, &user.id, &post_id)?.is_on() {
        (
            StatusCode::CREATED,
            Json(json!({ "message": "Post bookmarked", "bookmarked": true })),
        )
    } else {
        (
            StatusCode::OK,
            Json(json!({ "message": "Bookmark removed", "bookmarked": false })),
        )
    };
    Ok(response.into_response())
}

async fn toggle_like(
    State(state): State<AppState>,
    user: CurrentUser,
    payload: Result<Json<PostRef>, JsonRejection>,
) -> AppResult<Response> {
    let Json(input) = payload?;
    let post_id = required_post_id(input)?;

    let mut conn = state.db.get()?;
    let post =
        posts::find_visible(&conn, &post_id, Some(&user.id))?.ok_or(AppError::NotFound("Post"))?;

    let liked = toggle::toggle(&mut conn, LIKES, &user.id, &post_id)?.is_on();
    if liked {
        notifications::notify(
            &conn,
            &post.user_id,
            NotificationKind::Like,
            &format!("{} liked your post", user.name),
            Subject {
                actor_id: Some(&user.id),
                post_id: Some(&post_id),
                ..Subject::default()
            },
        )?;
    }
    let likes = posts::like_count(&conn, &post_id)?;

    let (status, message) = if liked {
        (StatusCode::CREATED, "Post liked")
    } else {
        (StatusCode::OK, "Like removed")
    };
    Ok((
        status,
        Json(json!({ "message": message, "liked": liked, "likes": likes })),
    )
        .into_response())
}

async fn create_comment(
    State(state): State<AppState>,
    user: CurrentUser,
    payload: Result<Json<CreateCommentInput>, JsonRejection>,
) -> AppResult<Response> {
    let Json(input) = payload?;

    let mut errors = ValidationErrors::new();
    let post_id = errors.require("postId", input.post_id.as_deref());
    let content = errors.require("content", input.content.as_deref());
    errors.max_len("content", content, MAX_COMMENT_LEN);
    let parent_id = input
        .parent_id
        .as_deref()
        .map(str::trim)
        .filter(|p| !p.is_empty());
    errors.into_result()?;

    let conn = state.db.get()?;
    let post =
        posts::find_visible(&conn, post_id, Some(&user.id))?.ok_or(AppError::NotFound("Post"))?;

    let parent = match parent_id {
        Some(parent_id) => {
            let parent = comments::find(&conn, parent_id)?.filter(|c| c.post_id == post.id);
            if parent.is_none() {
                let mut errors = ValidationErrors::new();
                errors.add("parentId", "parentId must reference a comment on this post");
                return Err(errors.into());
            }
            parent
        }
        None => None,
    };

    let comment = comments::create(&conn, &post.id, &user.id, content, parent_id)?;

    let subject = Subject {
        actor_id: Some(&user.id),
        post_id: Some(&post.id),
        ..Subject::default()
    };
    if let Some(parent) = &parent {
        notifications::notify(
            &conn,
            &parent.user_id,
            NotificationKind::Reply,
            &format!("{} replied to your comment", user.name),
            subject,
        )?;
    }
    if parent.as_ref().map(|p| p.user_id.as_str()) != Some(post.user_id.as_str()) {
        notifications::notify(
            &conn,
            &post.user_id,
            NotificationKind::Comment,
            &format!("{} commented on your post", user.name),
            subject,
        )?;
    }

    Ok(Json(json!({ "data": comment })).into_response())
}
