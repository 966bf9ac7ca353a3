//! Normalization and upsert engine
//!
//! Reconciles one fetched batch against storage inside a single transaction:
//! 1. Stages authors, submolts, posts and comments in a [`StagingMap`]
//! 2. Fills empty translated slots (translator, or verbatim for cached batches)
//! 3. Validates comment parents
//! 4. Flushes in foreign-key order and commits once

use crate::errors::Result;
use crate::payload::{RawAuthor, RawComment, RawPost, RawSubmolt};
use crate::staging::{Origin, StagingMap, Table};
use crate::translate::{fill_comment, fill_post, SlotFiller};
use chrono::Utc;
use moltwatch_common::db::models::*;
use moltwatch_common::db::DbPool;
use moltwatch_common::{metrics, Translator};
use sea_orm::{
    ActiveModelBehavior, ActiveModelTrait, ConnectionTrait, DbErr, EntityTrait, IntoActiveModel,
    TransactionTrait,
};
use std::sync::Arc;
use tracing::{debug, info, instrument, warn};

/// Post counts of one reconciled batch
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ReconcileSummary {
    /// Posts stored for the first time
    pub created: u64,
    /// Posts that already existed or appeared earlier in the batch
    pub updated: u64,
}

/// Upsert engine over the primary connection
pub struct Reconciler {
    db: DbPool,
    translator: Arc<dyn Translator>,
}

impl Reconciler {
    pub fn new(db: DbPool, translator: Arc<dyn Translator>) -> Self {
        Self { db, translator }
    }

    /// Reconcile a batch. All-or-nothing: any error rolls the batch back.
    #[instrument(skip(self, posts), fields(posts = posts.len()))]
    pub async fn reconcile(
        &self,
        posts: &[RawPost],
        from_cache: bool,
    ) -> Result<ReconcileSummary> {
        let txn = self.db.write().begin().await?;

        let summary = match self.apply(&txn, posts, from_cache).await {
            Ok(summary) => summary,
            Err(e) => {
                if let Err(rollback) = txn.rollback().await {
                    warn!(error = %rollback, "Rollback failed");
                }
                return Err(e);
            }
        };

        txn.commit().await?;

        metrics::record_reconcile(summary.created, summary.updated, from_cache);
        info!(
            created = summary.created,
            updated = summary.updated,
            "Batch reconciled"
        );

        Ok(summary)
    }

    async fn apply<C>(
        &self,
        db: &C,
        posts: &[RawPost],
        from_cache: bool,
    ) -> Result<ReconcileSummary>
    where
        C: ConnectionTrait,
    {
        let mut staging = StagingMap::new();
        let filler = SlotFiller::new(self.translator.as_ref(), from_cache);
        let mut summary = ReconcileSummary::default();

        for raw in posts {
            let (Some(post_id), Some(author_id)) = (raw.id.as_deref(), raw.author_id()) else {
                warn!(post_id = ?raw.id, "Skipping post without id or author");
                continue;
            };

            if let Some(author) = raw.author.as_ref() {
                stage_author(&mut staging.authors, db, author_id, author).await?;
            }

            let submolt_id = match raw.submolt.as_ref() {
                Some(submolt) => stage_submolt(&mut staging.submolts, db, submolt).await?,
                None => None,
            };

            let (post, origin) = staging
                .posts
                .resolve(post_id, db, || {
                    Post::blank(post_id, author_id, raw.created_at.unwrap_or_else(Utc::now))
                })
                .await?;

            match origin {
                Origin::Created => summary.created += 1,
                Origin::Stored | Origin::Staged => summary.updated += 1,
            }

            apply_post_fields(post, raw, author_id, submolt_id);
            let filled = fill_post(post, filler).await;
            if filled > 0 {
                debug!(post_id, filled, "Filled post translations");
            }

            for comment in &raw.comments {
                stage_comment(&mut staging, db, post_id, comment, filler).await?;
            }
        }

        validate_parents(&mut staging.comments, db).await?;
        flush(staging, db).await?;

        Ok(summary)
    }
}

/// Overwrite every post field except the translated slots
fn apply_post_fields(post: &mut Post, raw: &RawPost, author_id: &str, submolt_id: Option<String>) {
    post.title = raw.title.clone();
    post.content = raw.content.clone();
    post.post_type = raw.post_type.clone();
    post.author_id = author_id.to_owned();
    post.submolt_id = submolt_id;
    post.upvotes = raw.upvotes.unwrap_or(0);
    post.downvotes = raw.downvotes.unwrap_or(0);
    post.score = raw.score.unwrap_or(0);
    post.comment_count = raw.comment_count.unwrap_or(0);
    post.hot_score = raw.hot_score.unwrap_or(0.0);
    post.is_pinned = raw.is_pinned.unwrap_or(false);
    post.is_locked = raw.is_locked.unwrap_or(false);
    post.is_deleted = raw.is_deleted.unwrap_or(false);
    if let Some(created_at) = raw.created_at {
        post.created_at = created_at;
    }
    post.updated_at = raw.updated_at;
}

/// Upsert a post author; every mutable field is overwritten
async fn stage_author<C>(
    authors: &mut Table<AuthorEntity>,
    db: &C,
    id: &str,
    raw: &RawAuthor,
) -> std::result::Result<(), DbErr>
where
    C: ConnectionTrait,
{
    let (author, _) = authors.resolve(id, db, || Author::blank(id)).await?;

    author.name = raw.name.clone();
    author.description = raw.description.clone();
    author.avatar_url = raw.avatar_url.clone();
    author.karma = raw.karma.unwrap_or(0);
    author.follower_count = raw.follower_count.unwrap_or(0);
    author.following_count = raw.following_count.unwrap_or(0);
    author.is_claimed = raw.is_claimed.unwrap_or(false);
    author.is_active = raw.is_active.unwrap_or(true);
    author.created_at = raw.created_at;
    author.last_active = raw.last_active;

    Ok(())
}

/// Upsert a comment author; comments carry only name, avatar and karma
async fn stage_comment_author<C>(
    authors: &mut Table<AuthorEntity>,
    db: &C,
    id: &str,
    raw: &RawAuthor,
) -> std::result::Result<(), DbErr>
where
    C: ConnectionTrait,
{
    let (author, _) = authors.resolve(id, db, || Author::blank(id)).await?;

    author.name = raw.name.clone();
    author.avatar_url = raw.avatar_url.clone();
    author.karma = raw.karma.unwrap_or(0);

    Ok(())
}

async fn stage_submolt<C>(
    submolts: &mut Table<SubmoltEntity>,
    db: &C,
    raw: &RawSubmolt,
) -> std::result::Result<Option<String>, DbErr>
where
    C: ConnectionTrait,
{
    let Some(id) = raw.id.as_deref() else {
        return Ok(None);
    };

    let (submolt, _) = submolts.resolve(id, db, || Submolt::blank(id)).await?;
    submolt.name = raw.name.clone();
    submolt.display_name = raw.display_name.clone();

    Ok(Some(id.to_owned()))
}

async fn stage_comment<C>(
    staging: &mut StagingMap,
    db: &C,
    post_id: &str,
    raw: &RawComment,
    filler: SlotFiller<'_>,
) -> std::result::Result<(), DbErr>
where
    C: ConnectionTrait,
{
    let author = raw.author.as_ref();
    let (Some(comment_id), Some(author_id)) =
        (raw.id.as_deref(), author.and_then(|a| a.id.as_deref()))
    else {
        debug!(post_id, comment_id = ?raw.id, "Skipping comment without id or author");
        return Ok(());
    };

    if let Some(author) = author {
        stage_comment_author(&mut staging.authors, db, author_id, author).await?;
    }

    let (comment, _) = staging
        .comments
        .resolve(comment_id, db, || {
            Comment::blank(comment_id, author_id, post_id, raw.created_at.unwrap_or_else(Utc::now))
        })
        .await?;

    comment.content = raw.content.clone();
    comment.author_id = author_id.to_owned();
    comment.post_id = post_id.to_owned();
    comment.parent_id = raw.parent_id.clone().filter(|p| !p.is_empty());
    comment.upvotes = raw.upvotes.unwrap_or(0);
    if let Some(created_at) = raw.created_at {
        comment.created_at = created_at;
    }

    fill_comment(comment, filler).await;
    Ok(())
}

/// Drop parent links that do not point at another comment of the same post.
/// Returns the number of links dropped.
async fn validate_parents<C>(
    comments: &mut Table<CommentEntity>,
    db: &C,
) -> std::result::Result<usize, DbErr>
where
    C: ConnectionTrait,
{
    let links: Vec<(String, String, String)> = comments
        .iter()
        .filter_map(|staged| {
            let c = &staged.record;
            c.parent_id
                .clone()
                .map(|parent| (c.id.clone(), c.post_id.clone(), parent))
        })
        .collect();

    let mut dropped = 0;
    for (id, post_id, parent_id) in links {
        let parent_post = if parent_id == id {
            None
        } else if let Some(parent) = comments.get(&parent_id) {
            Some(parent.post_id.clone())
        } else {
            CommentEntity::find_by_id(parent_id.clone())
                .one(db)
                .await?
                .map(|parent| parent.post_id)
        };

        if parent_post.as_deref() == Some(post_id.as_str()) {
            continue;
        }

        warn!(
            comment_id = %id,
            parent_id = %parent_id,
            post_id = %post_id,
            "Dropping parent link outside the comment's post"
        );
        if let Some(comment) = comments.get_mut(&id) {
            comment.parent_id = None;
        }
        dropped += 1;
    }

    Ok(dropped)
}

/// Write staged rows in foreign-key order
async fn flush<C>(staging: StagingMap, db: &C) -> std::result::Result<(), DbErr>
where
    C: ConnectionTrait,
{
    let StagingMap {
        authors,
        submolts,
        posts,
        comments,
    } = staging;

    debug!(
        authors = authors.len(),
        submolts = submolts.len(),
        posts = posts.len(),
        comments = comments.len(),
        "Flushing staged rows"
    );

    for row in authors.into_rows() {
        write_row::<AuthorActiveModel, _>(row.record, row.persisted, db).await?;
    }
    for row in submolts.into_rows() {
        write_row::<SubmoltActiveModel, _>(row.record, row.persisted, db).await?;
    }
    for row in posts.into_rows() {
        write_row::<PostActiveModel, _>(row.record, row.persisted, db).await?;
    }

    // New comments go in unlinked first; a parent may be another new comment
    let comments = comments.into_rows();
    for row in comments.iter().filter(|row| !row.persisted) {
        let mut record = row.record.clone();
        record.parent_id = None;
        write_row::<CommentActiveModel, _>(record, false, db).await?;
    }
    for row in comments
        .into_iter()
        .filter(|row| row.persisted || row.record.parent_id.is_some())
    {
        write_row::<CommentActiveModel, _>(row.record, true, db).await?;
    }

    Ok(())
}

/// Insert or fully overwrite one row
async fn write_row<A, C>(
    record: <A::Entity as EntityTrait>::Model,
    persisted: bool,
    db: &C,
) -> std::result::Result<(), DbErr>
where
    A: ActiveModelTrait + ActiveModelBehavior + Send,
    <A::Entity as EntityTrait>::Model: IntoActiveModel<A>,
    C: ConnectionTrait,
{
    let active = record.into_active_model().reset_all();
    if persisted {
        active.update(db).await?;
    } else {
        active.insert(db).await?;
    }
    Ok(())
}
