use axum::extract::FromRequestParts;
use axum::http::request::Parts;

use crate::auth::{get_session, Session};
use crate::error::AppError;
use crate::state::AppState;

/// Represents the currently authenticated user.
#[derive(Debug, Clone)]
pub struct CurrentUser {
    pub id: String,
    pub name: String,
    pub email: String,
    pub image: Option<String>,
    pub token: String,
}

impl From<Session> for CurrentUser {
    fn from(session: Session) -> Self {
        CurrentUser {
            id: session.user_id,
            name: session.name,
            email: session.email,
            image: session.image,
            token: session.token,
        }
    }
}

/// Extractor that requires authentication.
/// Returns 401 if no valid session found.
impl FromRequestParts<AppState> for CurrentUser {
    type Rejection = AppError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        get_session(&state.db, &parts.headers, &state.config.auth.cookie_name)?
            .map(CurrentUser::from)
            .ok_or(AppError::Unauthorized)
    }
}

/// Optional user extractor: `None` instead of 401 when not authenticated.
pub struct MaybeUser(pub Option<CurrentUser>);

impl MaybeUser {
    pub fn id(&self) -> Option<&str> {
        self.0.as_ref().map(|u| u.id.as_str())
    }
}

impl FromRequestParts<AppState> for MaybeUser {
    type Rejection = AppError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        let session = get_session(&state.db, &parts.headers, &state.config.auth.cookie_name)?;
        Ok(MaybeUser(session.map(CurrentUser::from)))
    }
}
