//! API handlers module

pub mod authors;
pub mod health;
pub mod insights;
pub mod posts;
pub mod search;

use moltwatch_common::{
    db::models::{Author, Comment, Post, Submolt},
    errors::Result,
    Repository,
};
use serde::Serialize;

/// Post with its author and submolt nested
#[derive(Debug, Serialize)]
pub struct PostView {
    #[serde(flatten)]
    pub post: Post,
    pub author: Option<Author>,
    pub submolt: Option<Submolt>,
}

/// Comment with its author nested
#[derive(Debug, Serialize)]
pub struct CommentView {
    #[serde(flatten)]
    pub comment: Comment,
    pub author: Option<Author>,
}

/// Attach authors and submolts to posts, preserving order
pub async fn expand_posts(repo: &Repository, posts: Vec<Post>) -> Result<Vec<PostView>> {
    let author_ids = posts.iter().map(|p| p.author_id.clone()).collect();
    let submolt_ids = posts.iter().filter_map(|p| p.submolt_id.clone()).collect();

    let authors = repo.authors_by_ids(author_ids).await?;
    let submolts = repo.submolts_by_ids(submolt_ids).await?;

    Ok(posts
        .into_iter()
        .map(|post| PostView {
            author: authors.get(&post.author_id).cloned(),
            submolt: post
                .submolt_id
                .as_ref()
                .and_then(|id| submolts.get(id))
                .cloned(),
            post,
        })
        .collect())
}

/// Attach authors to comments, preserving order
pub async fn expand_comments(
    repo: &Repository,
    comments: Vec<Comment>,
) -> Result<Vec<CommentView>> {
    let author_ids = comments.iter().map(|c| c.author_id.clone()).collect();
    let authors = repo.authors_by_ids(author_ids).await?;

    Ok(comments
        .into_iter()
        .map(|comment| CommentView {
            author: authors.get(&comment.author_id).cloned(),
            comment,
        })
        .collect())
}
