//! Shared fixtures for unit tests

use crate::payload::RawPost;
use crate::upstream::{FeedSource, FetchedBatch};
use async_trait::async_trait;
use moltwatch_common::db::DbPool;
use moltwatch_common::{Language, Translation, Translator};
use std::sync::atomic::{AtomicUsize, Ordering};

/// Fresh in-memory database with the schema applied
pub async fn memory_db() -> DbPool {
    let db = DbPool::connect_url("sqlite::memory:", 1).await.unwrap();
    db.init_schema().await.unwrap();
    db
}

/// Build a raw post from feed-shaped JSON
pub fn raw_post(value: serde_json::Value) -> RawPost {
    serde_json::from_value(value).unwrap()
}

/// Translator returning `[suffix] text` and counting calls
#[derive(Default)]
pub struct RecordingTranslator {
    calls: AtomicUsize,
}

impl RecordingTranslator {
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Translator for RecordingTranslator {
    async fn translate(&self, text: &str, target: Language) -> Translation {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Translation::Translated(format!("[{}] {}", target.suffix(), text))
    }

    fn provider_name(&self) -> &str {
        "recording"
    }
}

/// Translator whose backend is always down
pub struct FailingTranslator;

#[async_trait]
impl Translator for FailingTranslator {
    async fn translate(&self, text: &str, _target: Language) -> Translation {
        Translation::Fallback(text.to_string())
    }

    fn provider_name(&self) -> &str {
        "failing"
    }
}

/// Feed that returns the same batch on every fetch
pub struct StaticFeed(pub FetchedBatch);

#[async_trait]
impl FeedSource for StaticFeed {
    async fn fetch(&self) -> FetchedBatch {
        self.0.clone()
    }
}
