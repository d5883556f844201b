use axum::extract::rejection::QueryRejection;
use axum::extract::{Query, State};
use axum::routing::get;
use axum::{Json, Router};
use newsroom_core::ownership::OwnershipFilter;
use newsroom_core::source::DateSelector;
use newsroom_core::{Article, ArticleQuery};
use serde::Deserialize;

use crate::auth::FeedAccess;
use crate::error::{ApiError, ApiResult};
use crate::state::AppState;

pub fn routes() -> Router<AppState> {
    Router::new().route("/articles", get(list_articles))
}

#[derive(Debug, Default, Deserialize)]
struct ArticleParams {
    region: Option<String>,
    #[serde(rename = "startDate")]
    start_date: Option<String>,
    #[serde(rename = "endDate")]
    end_date: Option<String>,
    last_n_days: Option<u32>,
    triggered_by: Option<String>,
    search: Option<String>,
    #[serde(default)]
    no_cache: bool,
}

async fn list_articles(
    State(state): State<AppState>,
    access: FeedAccess,
    params: Result<Query<ArticleParams>, QueryRejection>,
) -> ApiResult<Json<Vec<Article>>> {
    let Query(params) = params.map_err(|e| ApiError::BadRequest(e.body_text()))?;
    let user = access.user();

    let dates = DateSelector::from_params(
        params.start_date.as_deref(),
        params.end_date.as_deref(),
        params.last_n_days,
    )
    .map_err(|e| ApiError::BadRequest(e.to_string()))?;

    let ownership = params
        .triggered_by
        .as_deref()
        .map(|raw| raw.parse::<OwnershipFilter>().unwrap_or_default())
        .unwrap_or_default();
    if ownership != OwnershipFilter::All && user.is_none() {
        return Err(ApiError::Unauthorized(
            "filtering by triggered_by requires a bearer token".to_string(),
        ));
    }

    let region = match params.region.filter(|r| !r.trim().is_empty()) {
        Some(region) => region,
        None => match user {
            Some(user) => state
                .preferences()
                .default_region(user.email())
                .await
                .unwrap_or_default(),
            None => String::new(),
        },
    };

    let query = ArticleQuery {
        region,
        dates,
        ownership,
        search: params.search.filter(|s| !s.trim().is_empty()),
        bypass_cache: params.no_cache,
    };
    let caller = user.map(|u| u.caller());

    let articles = state.articles().get_articles(&query, caller.as_ref()).await?;
    Ok(Json(articles))
}
