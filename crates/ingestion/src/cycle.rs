//! Ingestion cycle: fetch, reconcile, prune
//!
//! A cycle never propagates errors; failures are logged and reported as an
//! outcome so a scheduler can simply run the next one.

use crate::pruner::RetentionPruner;
use crate::reconciler::Reconciler;
use crate::upstream::FeedSource;
use moltwatch_common::metrics;
use serde::Serialize;
use std::sync::Arc;
use std::time::Instant;
use tokio::sync::Mutex;
use tracing::{error, info, instrument, warn};

/// How a cycle ended
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum CycleOutcome {
    /// Batch committed (and pruned, when enabled)
    Completed,
    /// No posts from any source
    Empty,
    /// Reconcile or prune failed and was rolled back
    Failed,
}

impl CycleOutcome {
    pub fn as_str(&self) -> &'static str {
        match self {
            CycleOutcome::Completed => "completed",
            CycleOutcome::Empty => "empty",
            CycleOutcome::Failed => "failed",
        }
    }
}

/// Summary of one ingestion cycle
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct CycleReport {
    pub outcome: CycleOutcome,
    pub fetched: usize,
    pub from_cache: bool,
    pub created: u64,
    pub updated: u64,
    pub removed_posts: u64,
    pub removed_comments: u64,
}

impl CycleReport {
    fn new(outcome: CycleOutcome, fetched: usize, from_cache: bool) -> Self {
        Self {
            outcome,
            fetched,
            from_cache,
            created: 0,
            updated: 0,
            removed_posts: 0,
            removed_comments: 0,
        }
    }
}

/// One fetch → reconcile → prune pass, serialized by an async mutex
pub struct IngestionCycle {
    source: Arc<dyn FeedSource>,
    reconciler: Reconciler,
    pruner: Option<RetentionPruner>,
    gate: Mutex<()>,
}

impl IngestionCycle {
    /// `pruner` is `None` when retention is disabled
    pub fn new(
        source: Arc<dyn FeedSource>,
        reconciler: Reconciler,
        pruner: Option<RetentionPruner>,
    ) -> Self {
        Self {
            source,
            reconciler,
            pruner,
            gate: Mutex::new(()),
        }
    }

    /// Run a cycle, waiting for any cycle already in progress
    pub async fn run(&self) -> CycleReport {
        let _guard = self.gate.lock().await;
        self.run_locked().await
    }

    /// Run a cycle unless one is already in progress
    pub async fn try_run(&self) -> Option<CycleReport> {
        let _guard = self.gate.try_lock().ok()?;
        Some(self.run_locked().await)
    }

    #[instrument(name = "ingestion_cycle", skip(self))]
    async fn run_locked(&self) -> CycleReport {
        let start = Instant::now();
        let report = self.execute().await;
        let elapsed = start.elapsed();

        metrics::record_cycle(report.outcome.as_str(), elapsed.as_secs_f64());
        info!(
            outcome = report.outcome.as_str(),
            fetched = report.fetched,
            from_cache = report.from_cache,
            created = report.created,
            updated = report.updated,
            removed_posts = report.removed_posts,
            removed_comments = report.removed_comments,
            duration_ms = elapsed.as_millis() as u64,
            "Ingestion cycle finished"
        );

        report
    }

    async fn execute(&self) -> CycleReport {
        let batch = self.source.fetch().await;
        if batch.is_empty() {
            warn!("No posts fetched, skipping cycle");
            return CycleReport::new(CycleOutcome::Empty, 0, false);
        }

        let mut report =
            CycleReport::new(CycleOutcome::Completed, batch.posts.len(), batch.from_cache);

        match self.reconciler.reconcile(&batch.posts, batch.from_cache).await {
            Ok(summary) => {
                report.created = summary.created;
                report.updated = summary.updated;
            }
            Err(e) => {
                error!(error = %e, "Reconcile failed, batch rolled back");
                report.outcome = CycleOutcome::Failed;
                return report;
            }
        }

        if let Some(pruner) = &self.pruner {
            match pruner.prune().await {
                Ok(summary) => {
                    report.removed_posts = summary.removed_posts;
                    report.removed_comments = summary.removed_comments;
                }
                Err(e) => {
                    error!(error = %e, "Retention prune failed, rolled back");
                    report.outcome = CycleOutcome::Failed;
                }
            }
        }

        report
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::{memory_db, raw_post, RecordingTranslator, StaticFeed};
    use crate::upstream::FetchedBatch;
    use moltwatch_common::db::models::{CommentEntity, PostEntity};
    use sea_orm::{ConnectionTrait, EntityTrait, PaginatorTrait};
    use serde_json::json;

    fn batch(ids: &[&str], from_cache: bool) -> FetchedBatch {
        FetchedBatch {
            posts: ids
                .iter()
                .enumerate()
                .map(|(i, id)| {
                    raw_post(json!({
                        "id": id,
                        "title": format!("post {}", id),
                        "score": i,
                        "author": {"id": "a1"}
                    }))
                })
                .collect(),
            from_cache,
        }
    }

    #[tokio::test]
    async fn test_cycle_fetches_reconciles_and_prunes() {
        let db = memory_db().await;
        let cycle = IngestionCycle::new(
            Arc::new(StaticFeed(batch(&["p1", "p2", "p3", "p4"], false))),
            Reconciler::new(db.clone(), Arc::new(RecordingTranslator::default())),
            Some(RetentionPruner::new(db.clone(), 1, 1)),
        );

        let report = cycle.run().await;

        assert_eq!(report.outcome, CycleOutcome::Completed);
        assert_eq!(report.fetched, 4);
        assert_eq!(report.created, 4);
        assert!(report.removed_posts >= 2);
        assert!(PostEntity::find().count(db.read()).await.unwrap() <= 2);

        let again = cycle.run().await;
        assert!(again.created + again.updated == 4);
    }

    #[tokio::test]
    async fn test_empty_feed_is_a_no_op() {
        let db = memory_db().await;
        let cycle = IngestionCycle::new(
            Arc::new(StaticFeed(FetchedBatch::default())),
            Reconciler::new(db.clone(), Arc::new(RecordingTranslator::default())),
            Some(RetentionPruner::new(db.clone(), 100, 200)),
        );

        let report = cycle.run().await;
        assert_eq!(report.outcome, CycleOutcome::Empty);
        assert_eq!(report.created + report.updated, 0);
    }

    #[tokio::test]
    async fn test_failed_reconcile_reports_zero_counts() {
        let db = memory_db().await;
        db.write().execute_unprepared("DROP TABLE posts").await.unwrap();

        let cycle = IngestionCycle::new(
            Arc::new(StaticFeed(batch(&["p1"], false))),
            Reconciler::new(db.clone(), Arc::new(RecordingTranslator::default())),
            None,
        );

        let report = cycle.run().await;
        assert_eq!(report.outcome, CycleOutcome::Failed);
        assert_eq!((report.created, report.updated), (0, 0));
        assert_eq!(report.fetched, 1);
    }

    #[tokio::test]
    async fn test_failed_prune_marks_cycle_failed_and_keeps_rows() {
        let db = memory_db().await;
        db.write()
            .execute_unprepared(
                "CREATE TRIGGER hold_posts BEFORE DELETE ON posts \
                 BEGIN SELECT RAISE(ABORT, 'posts are held'); END",
            )
            .await
            .unwrap();

        let mut feed = batch(&["p1", "p2", "p3", "p4"], false);
        for (i, post) in feed.posts.iter_mut().enumerate() {
            post.comments = vec![serde_json::from_value(json!({
                "id": format!("c{}", i),
                "content": "reply",
                "author": {"id": "a2"}
            }))
            .unwrap()];
        }

        let cycle = IngestionCycle::new(
            Arc::new(StaticFeed(feed)),
            Reconciler::new(db.clone(), Arc::new(RecordingTranslator::default())),
            Some(RetentionPruner::new(db.clone(), 1, 1)),
        );

        let report = cycle.run().await;

        assert_eq!(report.outcome, CycleOutcome::Failed);
        assert_eq!(report.created, 4);
        assert_eq!((report.removed_posts, report.removed_comments), (0, 0));
        assert_eq!(PostEntity::find().count(db.read()).await.unwrap(), 4);
        assert_eq!(CommentEntity::find().count(db.read()).await.unwrap(), 4);
    }

    #[tokio::test]
    async fn test_try_run_skips_when_busy() {
        let db = memory_db().await;
        let cycle = IngestionCycle::new(
            Arc::new(StaticFeed(FetchedBatch::default())),
            Reconciler::new(db.clone(), Arc::new(RecordingTranslator::default())),
            None,
        );

        let guard = cycle.gate.lock().await;
        assert!(cycle.try_run().await.is_none());
        drop(guard);
        assert!(cycle.try_run().await.is_some());
    }
}
