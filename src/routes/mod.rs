pub mod auth;
pub mod community;
pub mod notifications;
pub mod posts;
pub mod projects;
pub mod security;
pub mod users;
pub mod whoami;

use axum::Router;
use tower_http::trace::TraceLayer;

use crate::state::AppState;

/// Every API route, still waiting for its state.
pub fn router() -> Router<AppState> {
    Router::new()
        .merge(auth::router())
        .merge(posts::router())
        .merge(security::router())
        .merge(community::router())
        .merge(projects::router())
        .merge(users::router())
        .merge(whoami::router())
        .merge(notifications::router())
}

/// The full application, ready to serve.
pub fn app(state: AppState) -> Router {
    router().layer(TraceLayer::new_for_http()).with_state(state)
}
