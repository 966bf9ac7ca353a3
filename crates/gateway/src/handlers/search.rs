//! Search handlers

use axum::{
    extract::{Query, State},
    Json,
};
use serde::Deserialize;
use validator::Validate;

use super::{expand_posts, PostView};
use crate::AppState;
use moltwatch_common::{
    db::Repository,
    errors::{AppError, Result},
};

/// Search query parameters
#[derive(Debug, Deserialize, Validate)]
pub struct SearchQuery {
    #[validate(length(max = 256))]
    pub q: String,

    #[serde(default = "default_limit")]
    #[validate(range(max = 1000))]
    pub limit: u64,
}

fn default_limit() -> u64 {
    20
}

/// Case-insensitive substring search over posts and author names
pub async fn search(
    State(state): State<AppState>,
    Query(query): Query<SearchQuery>,
) -> Result<Json<Vec<PostView>>> {
    query.validate().map_err(|e| AppError::Validation {
        message: e.to_string(),
        field: None,
    })?;

    let repo = Repository::new(state.db.clone());
    let posts = repo.search_posts(&query.q, query.limit).await?;

    tracing::debug!(query = %query.q, results = posts.len(), "Search completed");

    Ok(Json(expand_posts(&repo, posts).await?))
}
