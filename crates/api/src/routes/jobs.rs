use axum::extract::rejection::JsonRejection;
use axum::extract::State;
use axum::routing::{get, post};
use axum::{Json, Router};
use newsroom_core::trigger::{
    NewsApiConfig, NewsApiTriggerRequest, NewsApiTriggered, ScraperTriggerRequest, ScraperTriggered,
    TriggerResponse,
};

use crate::auth::AuthUser;
use crate::error::{ApiError, ApiResult};
use crate::state::AppState;

/// News-API defaults and the two job triggers.
pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/config/news-api", get(news_api_config))
        .route("/trigger/scraper", post(trigger_scraper))
        .route("/trigger/news-api", post(trigger_news_api))
}

/// Defaults keyed off the caller's saved scraper keywords.
async fn news_api_config(State(state): State<AppState>, user: AuthUser) -> Json<NewsApiConfig> {
    let scraper = state.preferences().scraper_config(user.email()).await;
    Json(NewsApiConfig::for_scraper_config(&scraper))
}

async fn trigger_scraper(
    State(state): State<AppState>,
    user: AuthUser,
    body: Result<Json<ScraperTriggerRequest>, JsonRejection>,
) -> ApiResult<Json<TriggerResponse<ScraperTriggered>>> {
    let Json(request) = body.map_err(|e| ApiError::BadRequest(e.body_text()))?;
    Ok(Json(state.trigger().trigger_scraper(request, user.email()).await?))
}

async fn trigger_news_api(
    State(state): State<AppState>,
    user: AuthUser,
    body: Result<Json<NewsApiTriggerRequest>, JsonRejection>,
) -> ApiResult<Json<TriggerResponse<NewsApiTriggered>>> {
    let Json(request) = body.map_err(|e| ApiError::BadRequest(e.body_text()))?;
    Ok(Json(state.trigger().trigger_news_api(request, user.email()).await?))
}
