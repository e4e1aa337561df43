use axum::extract::rejection::JsonRejection;
use axum::extract::State;
use axum::http::{header, HeaderMap, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::post;
use axum::{Json, Router};
use serde::Deserialize;
use serde_json::json;

use crate::auth::{password, session};
use crate::config::AuthConfig;
use crate::error::{AppError, AppResult};
use crate::state::AppState;
use crate::store::users::{self, NewUser};
use crate::validation::ValidationErrors;

#[derive(Deserialize, Default)]
#[serde(default)]
pub struct RegisterInput {
    pub name: Option<String>,
    pub email: Option<String>,
    pub password: Option<String>,
    pub country: Option<String>,
    pub image: Option<String>,
}

#[derive(Deserialize, Default)]
#[serde(default)]
pub struct LoginInput {
    pub email: Option<String>,
    pub password: Option<String>,
}

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/api/auth/register", post(register))
        .route("/api/auth/login", post(login))
        .route("/api/auth/logout", post(logout))
}

const EMAIL_TAKEN: &str = "Email is already registered";

/// A concurrent registration can win the race past `email_taken`; the unique
/// index then rejects this insert.
fn duplicate_email_conflict(err: rusqlite::Error) -> AppError {
    match err {
        rusqlite::Error::SqliteFailure(ref e, _)
            if e.code == rusqlite::ErrorCode::ConstraintViolation =>
        {
            AppError::Conflict(EMAIL_TAKEN.into())
        }
        err => err.into(),
    }
}

fn session_cookie(auth: &AuthConfig, token: &str) -> String {
    format!(
        "{}={}; HttpOnly; SameSite=Lax; Path=/; Max-Age={}",
        auth.cookie_name,
        token,
        auth.session_hours * 3600
    )
}

async fn register(
    State(state): State<AppState>,
    payload: Result<Json<RegisterInput>, JsonRejection>,
) -> AppResult<Response> {
    let Json(input) = payload?;

    let mut errors = ValidationErrors::new();
    let name = errors.require("name", input.name.as_deref());
    errors.max_len("name", name, 100);
    let email = errors.require("email", input.email.as_deref()).to_lowercase();
    if !email.is_empty() && !email.contains('@') {
        errors.add("email", "email must be a valid address");
    }
    let plaintext = input.password.as_deref().unwrap_or_default();
    if plaintext.chars().count() < 8 {
        errors.add("password", "password must be at least 8 characters");
    }
    errors.into_result()?;

    let password_hash = password::hash(plaintext, state.config.auth.bcrypt_cost)?;

    let (user, token) = {
        let conn = state.db.get()?;
        if users::email_taken(&conn, &email)? {
            return Err(AppError::Conflict(EMAIL_TAKEN.into()));
        }
        let user = users::create(
            &conn,
            &NewUser {
                name,
                email: &email,
                password_hash: Some(&password_hash),
                image: input.image.as_deref(),
                country: input.country.as_deref(),
            },
        )
        .map_err(duplicate_email_conflict)?;
        let token = session::create_session(&conn, &user.id, state.config.auth.session_hours)?;
        (user, token)
    };

    tracing::info!(user_id = %user.id, "user registered");

    Ok((
        StatusCode::CREATED,
        [(header::SET_COOKIE, session_cookie(&state.config.auth, &token))],
        Json(json!({ "data": user, "token": token, "message": "Account created" })),
    )
        .into_response())
}

async fn login(
    State(state): State<AppState>,
    payload: Result<Json<LoginInput>, JsonRejection>,
) -> AppResult<Response> {
    let Json(input) = payload?;

    let mut errors = ValidationErrors::new();
    let email = errors.require("email", input.email.as_deref()).to_string();
    let plaintext = errors.require("password", input.password.as_deref()).to_string();
    errors.into_result()?;

    let conn = state.db.get()?;
    let (user, stored_hash) = users::find_credentials(&conn, &email)?.ok_or(AppError::Unauthorized)?;
    let valid = stored_hash
        .as_deref()
        .map(|hash| password::verify(&plaintext, hash))
        .unwrap_or(false);
    if !valid {
        return Err(AppError::Unauthorized);
    }

    let token = session::create_session(&conn, &user.id, state.config.auth.session_hours)?;

    Ok((
        StatusCode::OK,
        [(header::SET_COOKIE, session_cookie(&state.config.auth, &token))],
        Json(json!({ "data": user, "token": token, "message": "Logged in" })),
    )
        .into_response())
}

async fn logout(State(state): State<AppState>, headers: HeaderMap) -> AppResult<Response> {
    let cookie_name = &state.config.auth.cookie_name;
    if let Some(token) = session::token_from_headers(&headers, cookie_name) {
        let conn = state.db.get()?;
        session::delete_session(&conn, &token)?;
    }

    let cleared = format!("{}=; HttpOnly; SameSite=Lax; Path=/; Max-Age=0", cookie_name);
    Ok((
        StatusCode::OK,
        [(header::SET_COOKIE, cleared)],
        Json(json!({ "message": "Logged out" })),
    )
        .into_response())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::test_conn;

    fn new_user<'a>(email: &'a str) -> NewUser<'a> {
        NewUser {
            name: "Ada",
            email,
            password_hash: None,
            image: None,
            country: None,
        }
    }

    #[test]
    fn duplicate_insert_maps_to_conflict() {
        let conn = test_conn();
        users::create(&conn, &new_user("ada@example.com")).unwrap();

        let err = users::create(&conn, &new_user("ada@example.com")).unwrap_err();
        match duplicate_email_conflict(err) {
            AppError::Conflict(msg) => assert_eq!(msg, EMAIL_TAKEN),
            other => panic!("expected conflict, got {other:?}"),
        }
    }

    #[test]
    fn other_database_errors_stay_internal() {
        let err = rusqlite::Error::QueryReturnedNoRows;
        assert!(matches!(duplicate_email_conflict(err), AppError::Database(_)));
    }
}
