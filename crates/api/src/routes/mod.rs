pub mod articles;
pub mod health;
pub mod jobs;
pub mod user;

use axum::Router;

use crate::state::AppState;

/// Assemble the full router with all route groups.
pub fn build_router(state: AppState) -> Router {
    Router::new()
        .merge(health::routes())
        .merge(articles::routes())
        .merge(user::routes())
        .merge(jobs::routes())
        .with_state(state)
}
