use axum::extract::rejection::JsonRejection;
use axum::extract::State;
use axum::routing::get;
use axum::{Json, Router};
use newsroom_core::preferences::{PreferencesUpdate, UserPreferences};
use serde::Serialize;

use crate::auth::AuthUser;
use crate::error::{ApiError, ApiResult};
use crate::state::AppState;

pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/user", get(current_user))
        .route("/user/preferences", get(get_preferences).put(put_preferences))
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct UserInfo {
    email: String,
    name: String,
    picture: String,
    is_admin: bool,
}

async fn current_user(user: AuthUser) -> Json<UserInfo> {
    Json(UserInfo {
        email: user.identity.email,
        name: user.identity.name,
        picture: user.identity.picture,
        is_admin: user.is_admin,
    })
}

async fn get_preferences(State(state): State<AppState>, user: AuthUser) -> ApiResult<Json<UserPreferences>> {
    Ok(Json(state.preferences().get(user.email()).await?))
}

async fn put_preferences(
    State(state): State<AppState>,
    user: AuthUser,
    body: Result<Json<PreferencesUpdate>, JsonRejection>,
) -> ApiResult<Json<UserPreferences>> {
    let Json(update) = body.map_err(|e| ApiError::BadRequest(e.body_text()))?;
    Ok(Json(state.preferences().put(user.email(), update).await?))
}
