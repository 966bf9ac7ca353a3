//! Aggregate views: trending words, leaderboards, hourly activity, totals
//!
//! All aggregation beyond simple ordering happens here in memory so the
//! queries stay portable between SQLite and Postgres.

use axum::{extract::State, Json};
use chrono::{DateTime, Duration, Utc};
use regex_lite::Regex;
use serde::Serialize;
use std::collections::HashMap;

use super::{expand_posts, PostView};
use crate::AppState;
use moltwatch_common::{
    db::{models::Author, Repository},
    errors::{AppError, Result},
};

/// Posts scanned for trending words
const TREND_WINDOW_POSTS: u64 = 200;
const TREND_WORDS: usize = 10;
const LEADERBOARD_SIZE: u64 = 100;
const STATS_TOP_AUTHORS: u64 = 5;
const STATS_POPULAR_SUBMOLTS: usize = 5;
const STATS_RECENT_AGENTS: u64 = 10;
const ACTIVITY_HOURS: i64 = 24;

const WORD_PATTERN: &str = r"\w+";

const STOP_WORDS: &[&str] = &[
    "the", "a", "an", "in", "to", "of", "and", "is", "it", "that", "for", "on", "with", "as",
    "this", "be", "are", "from", "at", "or", "by", "not", "but", "what", "all", "were", "we",
    "when", "your", "can", "said", "there", "use", "do", "how", "post", "deleted", "removed",
    "just", "have", "like", "so", "if", "my", "me", "about", "out", "up", "has", "was", "will",
    "they", "one", "some", "would", "get", "more", "who", "which", "time", "people", "don",
    "know", "think",
];

#[derive(Debug, Serialize)]
pub struct Leaderboard {
    pub top_karma: Vec<Author>,
    pub most_vocal: Vec<VocalAuthor>,
    pub viral_posts: Vec<PostView>,
}

#[derive(Debug, Serialize)]
pub struct VocalAuthor {
    pub name: Option<String>,
    pub id: String,
    pub count: u64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct HourlyActivity {
    /// Hour of day, UTC, as `HH:00`
    pub time: String,
    pub count: u64,
}

#[derive(Debug, Serialize)]
pub struct StatsResponse {
    pub total_posts: u64,
    pub total_authors: u64,
    pub total_submolts: u64,
    pub total_comments: u64,
    pub top_authors: Vec<Author>,
    pub popular_submolts: Vec<SubmoltCount>,
    pub recent_agents: Vec<Author>,
}

#[derive(Debug, Serialize)]
pub struct SubmoltCount {
    pub name: String,
    pub count: u64,
}

/// Most frequent words across recent titles and contents, as `[word, count]`
pub async fn trends(State(state): State<AppState>) -> Result<Json<Vec<(String, u64)>>> {
    let repo = Repository::new(state.db.clone());
    let posts = repo.recent_posts(TREND_WINDOW_POSTS).await?;

    let texts = posts
        .iter()
        .flat_map(|p| [p.title.as_deref(), p.content.as_deref()])
        .flatten();

    Ok(Json(top_words(texts, TREND_WORDS)?))
}

/// Top authors by karma, most active authors and highest-scoring recent posts
pub async fn leaderboard(State(state): State<AppState>) -> Result<Json<Leaderboard>> {
    let repo = Repository::new(state.db.clone());
    let now = Utc::now();

    let top_karma = repo.top_authors_by_karma(LEADERBOARD_SIZE).await?;

    let most_vocal = repo
        .post_counts_by_author_since(now - Duration::hours(24), LEADERBOARD_SIZE as usize)
        .await?
        .into_iter()
        .map(|(author, count)| VocalAuthor {
            name: author.name,
            id: author.id,
            count,
        })
        .collect();

    let viral = repo
        .top_posts_since(now - Duration::hours(48), LEADERBOARD_SIZE)
        .await?;

    Ok(Json(Leaderboard {
        top_karma,
        most_vocal,
        viral_posts: expand_posts(&repo, viral).await?,
    }))
}

/// Posts per hour over the last day, oldest first
pub async fn activity(State(state): State<AppState>) -> Result<Json<Vec<HourlyActivity>>> {
    let repo = Repository::new(state.db.clone());
    let now = Utc::now();

    let timestamps = repo
        .post_timestamps_since(now - Duration::hours(ACTIVITY_HOURS))
        .await?;

    Ok(Json(hourly_buckets(&timestamps, now)))
}

/// Totals plus sidebar lists
pub async fn stats(State(state): State<AppState>) -> Result<Json<StatsResponse>> {
    let repo = Repository::new(state.db.clone());

    let counts = repo.table_counts().await?;
    let top_authors = repo.top_authors_by_karma(STATS_TOP_AUTHORS).await?;
    let popular_submolts = repo
        .popular_submolts(STATS_POPULAR_SUBMOLTS)
        .await?
        .into_iter()
        .map(|(name, count)| SubmoltCount { name, count })
        .collect();
    let recent_agents = repo.newest_authors(STATS_RECENT_AGENTS).await?;

    Ok(Json(StatsResponse {
        total_posts: counts.posts,
        total_authors: counts.authors,
        total_submolts: counts.submolts,
        total_comments: counts.comments,
        top_authors,
        popular_submolts,
        recent_agents,
    }))
}

/// Count words longer than three characters that are neither stop words nor
/// numbers. Ties keep first-seen order.
pub fn top_words<'a, I>(texts: I, limit: usize) -> Result<Vec<(String, u64)>>
where
    I: IntoIterator<Item = &'a str>,
{
    let pattern = Regex::new(WORD_PATTERN).map_err(|e| AppError::Internal {
        message: e.to_string(),
    })?;

    // word -> (count, first position)
    let mut counts: HashMap<String, (u64, usize)> = HashMap::new();
    let mut seen = 0;

    for text in texts {
        let lowered = text.to_lowercase();
        for token in pattern.find_iter(&lowered).map(|m| m.as_str()) {
            if token.chars().count() <= 3
                || STOP_WORDS.contains(&token)
                || token.chars().all(|c| c.is_ascii_digit())
            {
                continue;
            }

            let entry = counts.entry(token.to_string()).or_insert((0, seen));
            entry.0 += 1;
            seen += 1;
        }
    }

    let mut ranked: Vec<(String, (u64, usize))> = counts.into_iter().collect();
    ranked.sort_by(|a, b| b.1 .0.cmp(&a.1 .0).then(a.1 .1.cmp(&b.1 .1)));

    Ok(ranked
        .into_iter()
        .take(limit)
        .map(|(word, (count, _))| (word, count))
        .collect())
}

/// Bucket instants into the 24 UTC hours ending with the hour containing `now`
pub fn hourly_buckets(timestamps: &[DateTime<Utc>], now: DateTime<Utc>) -> Vec<HourlyActivity> {
    let current_hour = now.timestamp().div_euclid(3600);
    let mut counts = vec![0u64; ACTIVITY_HOURS as usize];

    for ts in timestamps {
        let offset = current_hour - ts.timestamp().div_euclid(3600);
        if (0..ACTIVITY_HOURS).contains(&offset) {
            counts[(ACTIVITY_HOURS - 1 - offset) as usize] += 1;
        }
    }

    counts
        .into_iter()
        .enumerate()
        .map(|(i, count)| {
            let hour = current_hour - (ACTIVITY_HOURS - 1) + i as i64;
            HourlyActivity {
                time: format!("{:02}:00", hour.rem_euclid(24)),
                count,
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::{app, get_json};
    use axum::http::StatusCode;
    use chrono::TimeZone;
    use moltwatch_common::db::models::{Post, Submolt};
    use sea_orm::{ActiveModelTrait, IntoActiveModel};

    #[test]
    fn test_top_words_filters_and_ranks() {
        let texts = [
            "Rust agents are thinking about rust",
            "The 2026 agents think; AGENTS like molting",
            "this post was deleted",
        ];
        let words = top_words(texts, 3).unwrap();

        assert_eq!(
            words,
            vec![
                ("agents".to_string(), 3),
                ("rust".to_string(), 2),
                ("thinking".to_string(), 1),
            ]
        );
    }

    #[test]
    fn test_top_words_empty() {
        assert!(top_words(std::iter::empty(), 10).unwrap().is_empty());
    }

    #[test]
    fn test_hourly_buckets_cover_a_day() {
        let now = Utc.with_ymd_and_hms(2026, 1, 30, 5, 20, 0).unwrap();
        let timestamps = [
            now,
            now - Duration::minutes(10),
            now - Duration::hours(2),
            now - Duration::hours(23),
            // Older than the first bucket
            now - Duration::hours(24),
        ];

        let buckets = hourly_buckets(&timestamps, now);
        assert_eq!(buckets.len(), 24);
        assert_eq!(buckets[0].time, "06:00");
        assert_eq!(buckets[0].count, 1);
        assert_eq!(buckets[21].time, "03:00");
        assert_eq!(buckets[21].count, 1);
        assert_eq!(buckets[23].time, "05:00");
        assert_eq!(buckets[23].count, 2);
        assert_eq!(buckets.iter().map(|b| b.count).sum::<u64>(), 4);
    }

    async fn seed(db: &moltwatch_common::DbPool) {
        let conn = db.write();
        let now = Utc::now();

        for (id, karma, age_days) in [("a1", 10, 1), ("a2", 99, 5), ("a3", 50, 0)] {
            let mut author = Author::blank(id);
            author.name = Some(id.to_uppercase());
            author.karma = karma;
            author.created_at = Some(now - Duration::days(age_days));
            author.into_active_model().reset_all().insert(conn).await.unwrap();
        }

        let mut submolt = Submolt::blank("s1");
        submolt.name = Some("general".into());
        submolt.into_active_model().reset_all().insert(conn).await.unwrap();

        let posts = [
            ("p1", "a1", 3, 1, "Molting season begins"),
            ("p2", "a1", 40, 2, "molting again"),
            ("p3", "a2", 90, 30, "Ancient molting lore"),
            ("p4", "a3", 10, 100, "Old news"),
        ];
        for (id, author, score, hours_ago, title) in posts {
            let mut post = Post::blank(id, author, now - Duration::hours(hours_ago));
            post.score = score;
            post.title = Some(title.into());
            post.submolt_id = Some("s1".into());
            post.into_active_model().reset_all().insert(conn).await.unwrap();
        }
    }

    #[tokio::test]
    async fn test_trends_endpoint() {
        let (app, db) = app().await;
        seed(&db).await;

        let (status, body) = get_json(&app, "/api/trends").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body[0][0], "molting");
        assert_eq!(body[0][1], 3);
    }

    #[tokio::test]
    async fn test_leaderboard_windows() {
        let (app, db) = app().await;
        seed(&db).await;

        let (status, body) = get_json(&app, "/api/leaderboard").await;
        assert_eq!(status, StatusCode::OK);

        assert_eq!(body["top_karma"][0]["id"], "a2");
        assert_eq!(body["top_karma"].as_array().unwrap().len(), 3);

        // Only a1 posted in the last 24 hours
        let vocal = body["most_vocal"].as_array().unwrap();
        assert_eq!(vocal.len(), 1);
        assert_eq!(vocal[0]["id"], "a1");
        assert_eq!(vocal[0]["name"], "A1");
        assert_eq!(vocal[0]["count"], 2);

        let viral: Vec<_> = body["viral_posts"]
            .as_array()
            .unwrap()
            .iter()
            .map(|p| p["id"].clone())
            .collect();
        assert_eq!(viral, vec!["p3", "p2", "p1"]);
    }

    #[tokio::test]
    async fn test_activity_endpoint_has_24_buckets() {
        let (app, db) = app().await;
        seed(&db).await;

        let (status, body) = get_json(&app, "/api/activity").await;
        assert_eq!(status, StatusCode::OK);

        let buckets = body.as_array().unwrap();
        assert_eq!(buckets.len(), 24);
        let total: u64 = buckets.iter().map(|b| b["count"].as_u64().unwrap()).sum();
        assert_eq!(total, 2);
    }

    #[tokio::test]
    async fn test_stats_endpoint() {
        let (app, db) = app().await;
        seed(&db).await;

        let (status, body) = get_json(&app, "/api/stats").await;
        assert_eq!(status, StatusCode::OK);

        assert_eq!(body["total_posts"], 4);
        assert_eq!(body["total_authors"], 3);
        assert_eq!(body["total_submolts"], 1);
        assert_eq!(body["total_comments"], 0);
        assert_eq!(body["top_authors"][0]["id"], "a2");
        assert_eq!(body["popular_submolts"][0]["name"], "general");
        assert_eq!(body["popular_submolts"][0]["count"], 4);
        assert_eq!(body["recent_agents"][0]["id"], "a3");
    }

    #[tokio::test]
    async fn test_aggregates_on_empty_store() {
        let (app, _db) = app().await;

        let (_, trends) = get_json(&app, "/api/trends").await;
        assert!(trends.as_array().unwrap().is_empty());

        let (_, stats) = get_json(&app, "/api/stats").await;
        assert_eq!(stats["total_posts"], 0);
        assert!(stats["popular_submolts"].as_array().unwrap().is_empty());
    }
}
