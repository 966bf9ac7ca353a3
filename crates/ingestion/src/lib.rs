//! MoltWatch Ingestion
//!
//! Keeps the local mirror of the upstream feed current:
//! 1. Fetches the feed (endpoint variants, then the cached snapshot)
//! 2. Reconciles posts, comments, authors and submolts in one transaction
//! 3. Fills translated slots write-once
//! 4. Prunes posts outside the retention whitelist
//!
//! [`scheduler::Scheduler`] repeats the cycle on an interval with jitter.

pub mod backfill;
pub mod cycle;
pub mod errors;
pub mod payload;
pub mod pruner;
pub mod reconciler;
pub mod scheduler;
pub mod staging;
pub mod translate;
pub mod upstream;

#[cfg(test)]
mod test_support;

pub use backfill::TranslationBackfill;
pub use cycle::{CycleOutcome, CycleReport, IngestionCycle};
pub use errors::IngestionError;
pub use pruner::RetentionPruner;
pub use reconciler::Reconciler;
pub use scheduler::{Scheduler, SchedulerHandle};
pub use upstream::{FeedSource, UpstreamClient};

use moltwatch_common::config::AppConfig;
use moltwatch_common::db::DbPool;
use moltwatch_common::translation::create_translator;
use std::sync::Arc;

/// Wire an ingestion cycle from configuration
pub fn build_cycle(config: &AppConfig, db: DbPool) -> errors::Result<IngestionCycle> {
    let source = Arc::new(UpstreamClient::new(&config.upstream)?);
    let translator = create_translator(&config.translation)?;
    let pruner = config
        .retention
        .enabled
        .then(|| RetentionPruner::from_config(db.clone(), &config.retention));

    Ok(IngestionCycle::new(source, Reconciler::new(db, translator), pruner))
}
