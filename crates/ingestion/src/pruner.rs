//! Retention pruner
//!
//! Keeps the union of the highest-score posts and the most recent posts and
//! deletes everything else, comments first, in one transaction. Authors and
//! submolts are never pruned.

use crate::errors::Result;
use moltwatch_common::config::RetentionConfig;
use moltwatch_common::db::models::{CommentColumn, CommentEntity, PostColumn, PostEntity};
use moltwatch_common::db::DbPool;
use moltwatch_common::metrics;
use sea_orm::{
    ColumnTrait, ConnectionTrait, DbErr, EntityTrait, QueryFilter, QueryOrder, QuerySelect,
    TransactionTrait,
};
use std::collections::HashSet;
use tracing::{debug, info, instrument};

/// Results from a single prune run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PruneSummary {
    /// Posts outside the whitelist that were deleted.
    pub removed_posts: u64,
    /// Comments of deleted posts.
    pub removed_comments: u64,
    /// Size of the whitelist.
    pub kept: usize,
}

impl PruneSummary {
    /// Check if any records were deleted.
    pub fn has_deletions(&self) -> bool {
        self.removed_posts + self.removed_comments > 0
    }
}

/// Deletes posts outside the retention whitelist
pub struct RetentionPruner {
    db: DbPool,
    keep_top_scored: u64,
    keep_most_recent: u64,
}

impl RetentionPruner {
    pub fn new(db: DbPool, keep_top_scored: u64, keep_most_recent: u64) -> Self {
        Self {
            db,
            keep_top_scored,
            keep_most_recent,
        }
    }

    pub fn from_config(db: DbPool, config: &RetentionConfig) -> Self {
        Self::new(db, config.keep_top_scored, config.keep_most_recent)
    }

    /// Run a single prune pass. An empty whitelist deletes nothing.
    #[instrument(skip(self), fields(top = self.keep_top_scored, recent = self.keep_most_recent))]
    pub async fn prune(&self) -> Result<PruneSummary> {
        let txn = self.db.write().begin().await?;

        let whitelist = self.whitelist(&txn).await?;
        if whitelist.is_empty() {
            txn.commit().await?;
            debug!("No posts stored, nothing to prune");
            return Ok(PruneSummary::default());
        }

        let kept = whitelist.len();
        let keep: Vec<String> = whitelist.into_iter().collect();

        // Comments reference posts, so they go first
        let comments = CommentEntity::delete_many()
            .filter(CommentColumn::PostId.is_not_in(keep.clone()))
            .exec(&txn)
            .await?;

        let posts = PostEntity::delete_many()
            .filter(PostColumn::Id.is_not_in(keep))
            .exec(&txn)
            .await?;

        txn.commit().await?;

        let summary = PruneSummary {
            removed_posts: posts.rows_affected,
            removed_comments: comments.rows_affected,
            kept,
        };

        metrics::record_prune(summary.removed_posts, summary.removed_comments);
        if summary.has_deletions() {
            info!(
                removed_posts = summary.removed_posts,
                removed_comments = summary.removed_comments,
                kept = summary.kept,
                "Retention prune complete"
            );
        } else {
            debug!(kept, "Retention prune complete, nothing to delete");
        }

        Ok(summary)
    }

    /// Ids of the top-scored posts together with the most recent posts
    async fn whitelist<C>(&self, db: &C) -> std::result::Result<HashSet<String>, DbErr>
    where
        C: ConnectionTrait,
    {
        let top_scored: Vec<String> = PostEntity::find()
            .select_only()
            .column(PostColumn::Id)
            .order_by_desc(PostColumn::Score)
            .limit(self.keep_top_scored)
            .into_tuple()
            .all(db)
            .await?;

        let most_recent: Vec<String> = PostEntity::find()
            .select_only()
            .column(PostColumn::Id)
            .order_by_desc(PostColumn::CreatedAt)
            .limit(self.keep_most_recent)
            .into_tuple()
            .all(db)
            .await?;

        Ok(top_scored.into_iter().chain(most_recent).collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::memory_db;
    use chrono::{Duration, TimeZone, Utc};
    use moltwatch_common::db::models::{Author, Comment, Post};
    use sea_orm::{ActiveModelTrait, IntoActiveModel, PaginatorTrait};

    /// Seed `count` posts where post `i` has score `i` and is `i` minutes old
    async fn seed_posts(db: &DbPool, count: i64) {
        let conn = db.write();
        Author::blank("a1")
            .into_active_model()
            .reset_all()
            .insert(conn)
            .await
            .unwrap();

        let base = Utc.with_ymd_and_hms(2026, 2, 1, 12, 0, 0).unwrap();
        for i in 0..count {
            let mut post = Post::blank(&format!("p{}", i), "a1", base - Duration::minutes(i));
            post.score = i;
            post.into_active_model().reset_all().insert(conn).await.unwrap();
        }
    }

    async fn add_comment(db: &DbPool, id: &str, post_id: &str) {
        Comment::blank(id, "a1", post_id, Utc::now())
            .into_active_model()
            .reset_all()
            .insert(db.write())
            .await
            .unwrap();
    }

    async fn surviving_ids(db: &DbPool) -> HashSet<String> {
        PostEntity::find()
            .select_only()
            .column(PostColumn::Id)
            .into_tuple::<String>()
            .all(db.read())
            .await
            .unwrap()
            .into_iter()
            .collect()
    }

    #[tokio::test]
    async fn test_keeps_union_of_top_and_recent() {
        let db = memory_db().await;
        seed_posts(&db, 350).await;
        add_comment(&db, "c-kept", "p0").await;
        add_comment(&db, "c-top", "p349").await;
        add_comment(&db, "c-gone", "p220").await;

        let summary = RetentionPruner::new(db.clone(), 100, 200).prune().await.unwrap();

        // Most recent 200 are p0..p199, top 100 by score are p250..p349
        assert_eq!(summary.removed_posts, 50);
        assert_eq!(summary.removed_comments, 1);
        assert_eq!(summary.kept, 300);

        let survivors = surviving_ids(&db).await;
        assert_eq!(survivors.len(), 300);
        for i in 0..350 {
            let expected = i < 200 || i >= 250;
            assert_eq!(survivors.contains(&format!("p{}", i)), expected, "post p{}", i);
        }

        let comments: Vec<String> = CommentEntity::find()
            .select_only()
            .column(CommentColumn::Id)
            .into_tuple()
            .all(db.read())
            .await
            .unwrap();
        assert_eq!(comments.len(), 2);
        assert!(!comments.contains(&"c-gone".to_string()));
    }

    #[tokio::test]
    async fn test_overlapping_sets_keep_fewer() {
        let db = memory_db().await;
        let conn = db.write();
        Author::blank("a1").into_active_model().reset_all().insert(conn).await.unwrap();

        // Newest posts also score highest, so both sets overlap
        let base = Utc.with_ymd_and_hms(2026, 2, 1, 12, 0, 0).unwrap();
        for i in 0..30i64 {
            let mut post = Post::blank(&format!("p{}", i), "a1", base - Duration::minutes(i));
            post.score = 100 - i;
            post.into_active_model().reset_all().insert(conn).await.unwrap();
        }

        let summary = RetentionPruner::new(db.clone(), 5, 10).prune().await.unwrap();
        assert_eq!(summary.kept, 10);
        assert_eq!(PostEntity::find().count(db.read()).await.unwrap(), 10);
    }

    #[tokio::test]
    async fn test_empty_store_is_a_no_op() {
        let db = memory_db().await;
        let summary = RetentionPruner::new(db.clone(), 100, 200).prune().await.unwrap();
        assert_eq!(summary, PruneSummary::default());
        assert!(!summary.has_deletions());
    }

    #[tokio::test]
    async fn test_zero_limits_never_delete() {
        let db = memory_db().await;
        seed_posts(&db, 5).await;

        let summary = RetentionPruner::new(db.clone(), 0, 0).prune().await.unwrap();
        assert_eq!(summary.removed_posts, 0);
        assert_eq!(PostEntity::find().count(db.read()).await.unwrap(), 5);
    }

    #[tokio::test]
    async fn test_small_store_is_untouched() {
        let db = memory_db().await;
        seed_posts(&db, 20).await;

        let summary = RetentionPruner::new(db.clone(), 100, 200).prune().await.unwrap();
        assert_eq!(summary.removed_posts, 0);
        assert_eq!(summary.kept, 20);
    }
}
