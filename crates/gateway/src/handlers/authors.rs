//! Author profile handler

use axum::{
    extract::{Path, State},
    Json,
};
use serde::Serialize;

use super::{expand_posts, PostView};
use crate::AppState;
use moltwatch_common::{
    db::{models::Author, Repository},
    errors::{AppError, Result},
};

/// Recent posts shown on a profile
const PROFILE_POST_LIMIT: u64 = 50;

#[derive(Serialize)]
pub struct AuthorProfile {
    pub author: Author,
    pub posts: Vec<PostView>,
    pub stats: AuthorStats,
}

#[derive(Serialize)]
pub struct AuthorStats {
    pub post_count: u64,
    pub karma: i64,
}

/// Author with recent posts and totals
pub async fn get_author(
    State(state): State<AppState>,
    Path(author_id): Path<String>,
) -> Result<Json<AuthorProfile>> {
    let repo = Repository::new(state.db.clone());

    let author = repo
        .find_author_by_id(&author_id)
        .await?
        .ok_or(AppError::AuthorNotFound { id: author_id })?;

    let posts = repo.posts_by_author(&author.id, PROFILE_POST_LIMIT).await?;
    let post_count = repo.count_posts_by_author(&author.id).await?;

    Ok(Json(AuthorProfile {
        stats: AuthorStats {
            post_count,
            karma: author.karma,
        },
        posts: expand_posts(&repo, posts).await?,
        author,
    }))
}

#[cfg(test)]
mod tests {
    use crate::test_support::{app, get_json};
    use axum::http::StatusCode;
    use chrono::{Duration, Utc};
    use moltwatch_common::db::models::{Author, Post};
    use sea_orm::{ActiveModelTrait, IntoActiveModel};

    #[tokio::test]
    async fn test_profile_caps_posts_but_counts_all() {
        let (app, db) = app().await;
        let conn = db.write();

        let mut author = Author::blank("a1");
        author.karma = 42;
        author.into_active_model().reset_all().insert(conn).await.unwrap();

        let now = Utc::now();
        for i in 0..55 {
            Post::blank(&format!("p{:02}", i), "a1", now - Duration::minutes(i))
                .into_active_model()
                .reset_all()
                .insert(conn)
                .await
                .unwrap();
        }

        let (status, body) = get_json(&app, "/api/authors/a1").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["author"]["id"], "a1");
        assert_eq!(body["posts"].as_array().unwrap().len(), 50);
        assert_eq!(body["posts"][0]["id"], "p00");
        assert_eq!(body["stats"]["post_count"], 55);
        assert_eq!(body["stats"]["karma"], 42);
    }

    #[tokio::test]
    async fn test_unknown_author_is_not_found() {
        let (app, _db) = app().await;
        let (status, body) = get_json(&app, "/api/authors/ghost").await;

        assert_eq!(status, StatusCode::NOT_FOUND);
        assert_eq!(body["error"]["code"], "AUTHOR_NOT_FOUND");
    }
}
