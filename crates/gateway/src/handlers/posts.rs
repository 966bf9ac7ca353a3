//! Post listing and detail handlers

use axum::{
    extract::{Path, Query, State},
    Json,
};
use serde::Deserialize;
use validator::Validate;

use super::{expand_comments, expand_posts, CommentView, PostView};
use crate::AppState;
use moltwatch_common::{
    db::{PostSort, Repository},
    errors::{AppError, Result},
};

/// Query parameters for the post listing
#[derive(Debug, Deserialize, Validate)]
pub struct ListPostsQuery {
    #[serde(default)]
    pub skip: u64,

    #[serde(default = "default_limit")]
    #[validate(range(max = 1000))]
    pub limit: u64,

    #[serde(default)]
    pub sort: PostSort,
}

fn default_limit() -> u64 {
    100
}

/// List posts with nested author and submolt
pub async fn list_posts(
    State(state): State<AppState>,
    Query(query): Query<ListPostsQuery>,
) -> Result<Json<Vec<PostView>>> {
    query.validate().map_err(|e| AppError::Validation {
        message: e.to_string(),
        field: Some("limit".to_string()),
    })?;

    let repo = Repository::new(state.db.clone());
    let posts = repo.list_posts(query.sort, query.skip, query.limit).await?;

    Ok(Json(expand_posts(&repo, posts).await?))
}

/// Get a post by ID
pub async fn get_post(
    State(state): State<AppState>,
    Path(post_id): Path<String>,
) -> Result<Json<PostView>> {
    let repo = Repository::new(state.db.clone());

    let post = repo
        .find_post_by_id(&post_id)
        .await?
        .ok_or(AppError::PostNotFound { id: post_id })?;

    let mut views = expand_posts(&repo, vec![post]).await?;
    views
        .pop()
        .map(Json)
        .ok_or_else(|| AppError::Internal {
            message: "post expansion returned no rows".to_string(),
        })
}

/// Comments of a post, newest first
pub async fn get_post_comments(
    State(state): State<AppState>,
    Path(post_id): Path<String>,
) -> Result<Json<Vec<CommentView>>> {
    let repo = Repository::new(state.db.clone());
    let comments = repo.comments_for_post(&post_id).await?;

    Ok(Json(expand_comments(&repo, comments).await?))
}
