//! Translation backfill
//!
//! Fills translated slots that ingestion left empty (backend outages,
//! translation disabled) for the most recent posts and their comments.
//! Writes are conditional on the slot still being empty, so a slot filled
//! concurrently by an ingestion cycle is never overwritten.

use crate::errors::Result;
use crate::translate::{fill_comment, fill_post, SlotFiller};
use moltwatch_common::db::models::{
    Comment, CommentColumn, CommentEntity, Post, PostColumn, PostEntity, PostField,
};
use moltwatch_common::db::DbPool;
use moltwatch_common::{Language, Translator};
use sea_orm::sea_query::{Condition, Expr};
use sea_orm::{
    ColumnTrait, ConnectionTrait, DbErr, EntityTrait, QueryFilter, QueryOrder, QuerySelect,
    TransactionTrait,
};
use std::sync::Arc;
use tracing::{info, instrument};

/// Default number of recent posts visited by a backfill run
pub const DEFAULT_BACKFILL_LIMIT: u64 = 20;

/// Results from a single backfill run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct BackfillSummary {
    pub posts_scanned: usize,
    pub comments_scanned: usize,
    /// Translated slots written
    pub filled: u64,
}

/// One pending slot write
struct SlotWrite<C> {
    id: String,
    column: C,
    text: String,
}

pub struct TranslationBackfill {
    db: DbPool,
    translator: Arc<dyn Translator>,
}

impl TranslationBackfill {
    pub fn new(db: DbPool, translator: Arc<dyn Translator>) -> Self {
        Self { db, translator }
    }

    /// Fill empty slots of the `limit` most recent posts and their comments
    #[instrument(skip(self))]
    pub async fn run(&self, limit: u64) -> Result<BackfillSummary> {
        let posts = PostEntity::find()
            .order_by_desc(PostColumn::CreatedAt)
            .limit(limit)
            .all(self.db.read())
            .await?;

        let post_ids: Vec<String> = posts.iter().map(|p| p.id.clone()).collect();
        let comments = if post_ids.is_empty() {
            Vec::new()
        } else {
            CommentEntity::find()
                .filter(CommentColumn::PostId.is_in(post_ids))
                .all(self.db.read())
                .await?
        };

        // Translate before opening the transaction so the write lock is short
        let filler = SlotFiller::Translate(self.translator.as_ref());
        let mut post_writes = Vec::new();
        for post in &posts {
            post_writes.extend(pending_post_slots(post, filler).await);
        }
        let mut comment_writes = Vec::new();
        for comment in &comments {
            comment_writes.extend(pending_comment_slots(comment, filler).await);
        }

        let txn = self.db.write().begin().await?;
        let filled = write_slots(&txn, post_writes, comment_writes).await?;
        txn.commit().await?;

        let summary = BackfillSummary {
            posts_scanned: posts.len(),
            comments_scanned: comments.len(),
            filled,
        };

        info!(
            posts = summary.posts_scanned,
            comments = summary.comments_scanned,
            filled = summary.filled,
            "Translation backfill complete"
        );

        Ok(summary)
    }
}

async fn pending_post_slots(post: &Post, filler: SlotFiller<'_>) -> Vec<SlotWrite<PostColumn>> {
    let mut filled = post.clone();
    if fill_post(&mut filled, filler).await == 0 {
        return Vec::new();
    }

    let mut writes = Vec::new();
    for field in [PostField::Title, PostField::Content] {
        for language in Language::ALL {
            let before = post.translated(field, language).unwrap_or_default();
            match filled.translated(field, language) {
                Some(text) if before.is_empty() && !text.is_empty() => writes.push(SlotWrite {
                    id: post.id.clone(),
                    column: PostColumn::translated(field, language),
                    text: text.to_string(),
                }),
                _ => {}
            }
        }
    }
    writes
}

async fn pending_comment_slots(
    comment: &Comment,
    filler: SlotFiller<'_>,
) -> Option<SlotWrite<CommentColumn>> {
    let mut filled = comment.clone();
    if fill_comment(&mut filled, filler).await == 0 {
        return None;
    }

    filled.content_zh.map(|text| SlotWrite {
        id: comment.id.clone(),
        column: CommentColumn::ContentZh,
        text,
    })
}

/// Apply slot writes only where the slot is still empty
async fn write_slots<C>(
    db: &C,
    post_writes: Vec<SlotWrite<PostColumn>>,
    comment_writes: Vec<SlotWrite<CommentColumn>>,
) -> std::result::Result<u64, DbErr>
where
    C: ConnectionTrait,
{
    let mut filled = 0;

    for write in post_writes {
        let result = PostEntity::update_many()
            .col_expr(write.column, Expr::value(write.text))
            .filter(PostColumn::Id.eq(write.id))
            .filter(
                Condition::any()
                    .add(write.column.is_null())
                    .add(write.column.eq("")),
            )
            .exec(db)
            .await?;
        filled += result.rows_affected;
    }

    for write in comment_writes {
        let result = CommentEntity::update_many()
            .col_expr(write.column, Expr::value(write.text))
            .filter(CommentColumn::Id.eq(write.id))
            .filter(
                Condition::any()
                    .add(write.column.is_null())
                    .add(write.column.eq("")),
            )
            .exec(db)
            .await?;
        filled += result.rows_affected;
    }

    Ok(filled)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::{memory_db, FailingTranslator, RecordingTranslator};
    use chrono::{Duration, Utc};
    use moltwatch_common::db::models::Author;
    use sea_orm::{ActiveModelTrait, IntoActiveModel};

    async fn seed(db: &DbPool) {
        let conn = db.write();
        Author::blank("a1").into_active_model().reset_all().insert(conn).await.unwrap();

        let now = Utc::now();
        let mut fresh = Post::blank("p-new", "a1", now);
        fresh.title = Some("Fresh".into());
        fresh.title_zh = Some("already done".into());
        fresh.into_active_model().reset_all().insert(conn).await.unwrap();

        let mut old = Post::blank("p-old", "a1", now - Duration::days(3));
        old.title = Some("Old".into());
        old.into_active_model().reset_all().insert(conn).await.unwrap();

        let mut comment = Comment::blank("c1", "a1", "p-new", now);
        comment.content = Some("hello".into());
        comment.into_active_model().reset_all().insert(conn).await.unwrap();
    }

    async fn post(db: &DbPool, id: &str) -> Post {
        PostEntity::find_by_id(id.to_owned()).one(db.read()).await.unwrap().unwrap()
    }

    #[tokio::test]
    async fn test_backfill_fills_only_empty_slots() {
        let db = memory_db().await;
        seed(&db).await;

        let translator = Arc::new(RecordingTranslator::default());
        let summary = TranslationBackfill::new(db.clone(), translator.clone())
            .run(DEFAULT_BACKFILL_LIMIT)
            .await
            .unwrap();

        // 6 title slots on p-new, 7 on p-old, 1 comment slot
        assert_eq!(summary.filled, 14);
        assert_eq!(summary.posts_scanned, 2);
        assert_eq!(summary.comments_scanned, 1);

        let fresh = post(&db, "p-new").await;
        assert_eq!(fresh.title_zh.as_deref(), Some("already done"));
        assert_eq!(fresh.title_fr.as_deref(), Some("[fr] Fresh"));
        assert_eq!(post(&db, "p-old").await.title_ru.as_deref(), Some("[ru] Old"));

        let comment = CommentEntity::find_by_id("c1".to_owned())
            .one(db.read())
            .await
            .unwrap()
            .unwrap();
        assert_eq!(comment.content_zh.as_deref(), Some("[zh] hello"));

        let again = TranslationBackfill::new(db.clone(), translator.clone())
            .run(DEFAULT_BACKFILL_LIMIT)
            .await
            .unwrap();
        assert_eq!(again.filled, 0);
        assert_eq!(translator.calls(), 14);
    }

    #[tokio::test]
    async fn test_limit_selects_most_recent() {
        let db = memory_db().await;
        seed(&db).await;

        let summary = TranslationBackfill::new(db.clone(), Arc::new(RecordingTranslator::default()))
            .run(1)
            .await
            .unwrap();

        assert_eq!(summary.posts_scanned, 1);
        assert!(post(&db, "p-old").await.title_zh.is_none());
    }

    #[tokio::test]
    async fn test_backend_outage_writes_nothing() {
        let db = memory_db().await;
        seed(&db).await;

        let summary = TranslationBackfill::new(db.clone(), Arc::new(FailingTranslator))
            .run(DEFAULT_BACKFILL_LIMIT)
            .await
            .unwrap();

        assert_eq!(summary.filled, 0);
        assert!(post(&db, "p-old").await.title_zh.is_none());
    }
}
