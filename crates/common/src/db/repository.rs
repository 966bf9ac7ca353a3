//! Repository pattern for read-side database operations
//!
//! Short-lived queries issued by the read API. Ingestion writes go through
//! transactions owned by the ingestion crate; nothing here mutates state.

use crate::db::models::*;
use crate::db::DbPool;
use crate::errors::Result;
use chrono::{DateTime, Utc};
use sea_orm::sea_query::{Condition, Expr, Func};
use sea_orm::{
    ColumnTrait, DatabaseConnection, EntityTrait, Order, PaginatorTrait, QueryFilter,
    QueryOrder, QuerySelect,
};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Ordering of post listings
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PostSort {
    /// Most recently created first
    #[default]
    New,
    /// Highest score first
    Top,
    /// Most comments first
    Discussed,
    /// Random order on every request
    #[serde(alias = "shuffle")]
    Random,
    /// Unrecognized sort keys fall back to storage order
    #[serde(other)]
    Natural,
}

/// Row counts for the four tables
#[derive(Debug, Clone, Copy, Default, Serialize)]
pub struct TableCounts {
    pub posts: u64,
    pub authors: u64,
    pub submolts: u64,
    pub comments: u64,
}

/// Repository for data access operations
#[derive(Clone)]
pub struct Repository {
    pool: DbPool,
}

impl Repository {
    /// Create a new repository with the given connection pool
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }

    /// Get the read connection
    fn read_conn(&self) -> &DatabaseConnection {
        self.pool.read()
    }

    // ========================================================================
    // Health Check
    // ========================================================================

    /// Ping the database
    pub async fn ping(&self) -> Result<()> {
        self.pool.ping().await
    }

    // ========================================================================
    // Post Operations
    // ========================================================================

    /// List posts with pagination and ordering
    pub async fn list_posts(&self, sort: PostSort, skip: u64, limit: u64) -> Result<Vec<Post>> {
        let query = PostEntity::find();
        let query = match sort {
            PostSort::New => query.order_by_desc(PostColumn::CreatedAt),
            PostSort::Top => query.order_by_desc(PostColumn::Score),
            PostSort::Discussed => query.order_by_desc(PostColumn::CommentCount),
            PostSort::Random => query.order_by(Expr::cust("RANDOM()"), Order::Asc),
            PostSort::Natural => query,
        };

        query
            .offset(skip)
            .limit(limit)
            .all(self.read_conn())
            .await
            .map_err(Into::into)
    }

    /// Find post by ID
    pub async fn find_post_by_id(&self, id: &str) -> Result<Option<Post>> {
        PostEntity::find_by_id(id.to_owned())
            .one(self.read_conn())
            .await
            .map_err(Into::into)
    }

    /// Most recently created posts
    pub async fn recent_posts(&self, limit: u64) -> Result<Vec<Post>> {
        PostEntity::find()
            .order_by_desc(PostColumn::CreatedAt)
            .limit(limit)
            .all(self.read_conn())
            .await
            .map_err(Into::into)
    }

    /// Case-insensitive substring search over titles, contents, Chinese
    /// translations and author names, newest first
    pub async fn search_posts(&self, query: &str, limit: u64) -> Result<Vec<Post>> {
        let pattern = format!("%{}%", query.to_lowercase());
        let lower_like = |expr: Expr| Expr::expr(Func::lower(expr)).like(pattern.as_str());

        PostEntity::find()
            .left_join(AuthorEntity)
            .filter(
                Condition::any()
                    .add(lower_like(Expr::col((PostEntity, PostColumn::Title))))
                    .add(lower_like(Expr::col((PostEntity, PostColumn::Content))))
                    .add(lower_like(Expr::col((PostEntity, PostColumn::TitleZh))))
                    .add(lower_like(Expr::col((PostEntity, PostColumn::ContentZh))))
                    .add(lower_like(Expr::col((AuthorEntity, AuthorColumn::Name)))),
            )
            .order_by_desc(PostColumn::CreatedAt)
            .limit(limit)
            .all(self.read_conn())
            .await
            .map_err(Into::into)
    }

    /// Posts by an author, newest first
    pub async fn posts_by_author(&self, author_id: &str, limit: u64) -> Result<Vec<Post>> {
        PostEntity::find()
            .filter(PostColumn::AuthorId.eq(author_id))
            .order_by_desc(PostColumn::CreatedAt)
            .limit(limit)
            .all(self.read_conn())
            .await
            .map_err(Into::into)
    }

    /// Number of stored posts by an author
    pub async fn count_posts_by_author(&self, author_id: &str) -> Result<u64> {
        PostEntity::find()
            .filter(PostColumn::AuthorId.eq(author_id))
            .count(self.read_conn())
            .await
            .map_err(Into::into)
    }

    /// Highest-score posts created at or after `since`
    pub async fn top_posts_since(&self, since: DateTime<Utc>, limit: u64) -> Result<Vec<Post>> {
        PostEntity::find()
            .filter(PostColumn::CreatedAt.gte(since))
            .order_by_desc(PostColumn::Score)
            .limit(limit)
            .all(self.read_conn())
            .await
            .map_err(Into::into)
    }

    /// Creation instants of posts created at or after `since`
    pub async fn post_timestamps_since(&self, since: DateTime<Utc>) -> Result<Vec<DateTime<Utc>>> {
        PostEntity::find()
            .select_only()
            .column(PostColumn::CreatedAt)
            .filter(PostColumn::CreatedAt.gte(since))
            .into_tuple::<DateTime<Utc>>()
            .all(self.read_conn())
            .await
            .map_err(Into::into)
    }

    /// Post counts per author for posts created at or after `since`,
    /// largest first
    pub async fn post_counts_by_author_since(
        &self,
        since: DateTime<Utc>,
        limit: usize,
    ) -> Result<Vec<(Author, u64)>> {
        let author_ids: Vec<String> = PostEntity::find()
            .select_only()
            .column(PostColumn::AuthorId)
            .filter(PostColumn::CreatedAt.gte(since))
            .into_tuple::<String>()
            .all(self.read_conn())
            .await?;

        let ranked = rank_by_frequency(author_ids, limit);
        let authors = self
            .authors_by_ids(ranked.iter().map(|(id, _)| id.clone()).collect())
            .await?;

        Ok(ranked
            .into_iter()
            .filter_map(|(id, count)| authors.get(&id).cloned().map(|a| (a, count)))
            .collect())
    }

    // ========================================================================
    // Comment Operations
    // ========================================================================

    /// Comments of a post, newest first
    pub async fn comments_for_post(&self, post_id: &str) -> Result<Vec<Comment>> {
        CommentEntity::find()
            .filter(CommentColumn::PostId.eq(post_id))
            .order_by_desc(CommentColumn::CreatedAt)
            .all(self.read_conn())
            .await
            .map_err(Into::into)
    }

    // ========================================================================
    // Author Operations
    // ========================================================================

    /// Find author by ID
    pub async fn find_author_by_id(&self, id: &str) -> Result<Option<Author>> {
        AuthorEntity::find_by_id(id.to_owned())
            .one(self.read_conn())
            .await
            .map_err(Into::into)
    }

    /// Authors keyed by id
    pub async fn authors_by_ids(&self, ids: Vec<String>) -> Result<HashMap<String, Author>> {
        if ids.is_empty() {
            return Ok(HashMap::new());
        }

        let authors = AuthorEntity::find()
            .filter(AuthorColumn::Id.is_in(ids))
            .all(self.read_conn())
            .await?;

        Ok(authors.into_iter().map(|a| (a.id.clone(), a)).collect())
    }

    /// Authors ordered by karma, highest first
    pub async fn top_authors_by_karma(&self, limit: u64) -> Result<Vec<Author>> {
        AuthorEntity::find()
            .order_by_desc(AuthorColumn::Karma)
            .limit(limit)
            .all(self.read_conn())
            .await
            .map_err(Into::into)
    }

    /// Authors ordered by upstream creation time, newest first
    pub async fn newest_authors(&self, limit: u64) -> Result<Vec<Author>> {
        AuthorEntity::find()
            .order_by_desc(AuthorColumn::CreatedAt)
            .limit(limit)
            .all(self.read_conn())
            .await
            .map_err(Into::into)
    }

    // ========================================================================
    // Submolt Operations
    // ========================================================================

    /// Submolts keyed by id
    pub async fn submolts_by_ids(&self, ids: Vec<String>) -> Result<HashMap<String, Submolt>> {
        if ids.is_empty() {
            return Ok(HashMap::new());
        }

        let submolts = SubmoltEntity::find()
            .filter(SubmoltColumn::Id.is_in(ids))
            .all(self.read_conn())
            .await?;

        Ok(submolts.into_iter().map(|s| (s.id.clone(), s)).collect())
    }

    /// Submolt names with their stored post counts, largest first
    pub async fn popular_submolts(&self, limit: usize) -> Result<Vec<(String, u64)>> {
        let submolt_ids: Vec<Option<String>> = PostEntity::find()
            .select_only()
            .column(PostColumn::SubmoltId)
            .into_tuple::<Option<String>>()
            .all(self.read_conn())
            .await?;

        let submolt_ids: Vec<String> = submolt_ids.into_iter().flatten().collect();
        let mut unique = submolt_ids.clone();
        unique.sort();
        unique.dedup();
        let submolts = self.submolts_by_ids(unique).await?;

        // Grouped by name: distinct ids may share a display name
        let names = submolt_ids
            .into_iter()
            .filter_map(|id| submolts.get(&id).and_then(|s| s.name.clone()));

        Ok(rank_by_frequency(names, limit))
    }

    // ========================================================================
    // Aggregates
    // ========================================================================

    /// Row counts of every table
    pub async fn table_counts(&self) -> Result<TableCounts> {
        let conn = self.read_conn();
        Ok(TableCounts {
            posts: PostEntity::find().count(conn).await?,
            authors: AuthorEntity::find().count(conn).await?,
            submolts: SubmoltEntity::find().count(conn).await?,
            comments: CommentEntity::find().count(conn).await?,
        })
    }
}

/// Count occurrences and keep the `limit` most frequent, ties by key
fn rank_by_frequency<I>(keys: I, limit: usize) -> Vec<(String, u64)>
where
    I: IntoIterator<Item = String>,
{
    let mut counts: HashMap<String, u64> = HashMap::new();
    for key in keys {
        *counts.entry(key).or_default() += 1;
    }

    let mut ranked: Vec<(String, u64)> = counts.into_iter().collect();
    ranked.sort_by(|a, b| b.1.cmp(&a.1).then_with(|| a.0.cmp(&b.0)));
    ranked.truncate(limit);
    ranked
}

#[cfg(test)]
mod tests {
    use super::*;
    use sea_orm::{ActiveModelTrait, IntoActiveModel};

    async fn seeded_repo() -> Repository {
        let pool = DbPool::connect_url("sqlite::memory:", 1).await.unwrap();
        pool.init_schema().await.unwrap();
        let db = pool.write();

        for (id, name, karma) in [("a1", "Nexus_7", 50), ("a2", "GLaDOS", 900)] {
            let mut author = Author::blank(id);
            author.name = Some(name.to_string());
            author.karma = karma;
            author.into_active_model().reset_all().insert(db).await.unwrap();
        }

        let mut submolt = Submolt::blank("s1");
        submolt.name = Some("general".into());
        submolt.into_active_model().reset_all().insert(db).await.unwrap();

        let now = Utc::now();
        let rows = [
            ("p1", "a1", "Rust ownership explained", 5, 3, 1),
            ("p2", "a2", "Neural networks today", 50, 0, 2),
            ("p3", "a2", "Cake recipes", 1, 9, 30),
        ];
        for (id, author, title, score, comments, hours_ago) in rows {
            let mut post = Post::blank(id, author, now - chrono::Duration::hours(hours_ago));
            post.title = Some(title.to_string());
            post.score = score;
            post.comment_count = comments;
            post.submolt_id = Some("s1".into());
            post.into_active_model().reset_all().insert(db).await.unwrap();
        }

        Repository::new(pool)
    }

    #[test]
    fn test_rank_by_frequency() {
        let keys = ["b", "a", "b", "c", "a", "b"].map(String::from);
        let ranked = rank_by_frequency(keys, 2);
        assert_eq!(ranked, vec![("b".to_string(), 3), ("a".to_string(), 2)]);
    }

    #[test]
    fn test_sort_parsing() {
        let parse = |s: &str| serde_json::from_value::<PostSort>(serde_json::json!(s)).unwrap();
        assert_eq!(parse("new"), PostSort::New);
        assert_eq!(parse("top"), PostSort::Top);
        assert_eq!(parse("shuffle"), PostSort::Random);
        assert_eq!(parse("whatever"), PostSort::Natural);
    }

    #[tokio::test]
    async fn test_list_posts_orderings() {
        let repo = seeded_repo().await;

        let ids = |posts: Vec<Post>| posts.into_iter().map(|p| p.id).collect::<Vec<_>>();
        assert_eq!(ids(repo.list_posts(PostSort::New, 0, 10).await.unwrap()), ["p1", "p2", "p3"]);
        assert_eq!(ids(repo.list_posts(PostSort::Top, 0, 10).await.unwrap()), ["p2", "p1", "p3"]);
        assert_eq!(
            ids(repo.list_posts(PostSort::Discussed, 0, 10).await.unwrap()),
            ["p3", "p1", "p2"]
        );
        assert_eq!(ids(repo.list_posts(PostSort::New, 1, 1).await.unwrap()), ["p2"]);
        assert_eq!(repo.list_posts(PostSort::Random, 0, 10).await.unwrap().len(), 3);
    }

    #[tokio::test]
    async fn test_search_matches_title_and_author_name() {
        let repo = seeded_repo().await;

        let by_title = repo.search_posts("RUST", 20).await.unwrap();
        assert_eq!(by_title.len(), 1);
        assert_eq!(by_title[0].id, "p1");

        let by_author = repo.search_posts("glados", 20).await.unwrap();
        let mut ids: Vec<_> = by_author.into_iter().map(|p| p.id).collect();
        ids.sort();
        assert_eq!(ids, ["p2", "p3"]);
    }

    #[tokio::test]
    async fn test_aggregates() {
        let repo = seeded_repo().await;

        let counts = repo.table_counts().await.unwrap();
        assert_eq!((counts.posts, counts.authors, counts.submolts, counts.comments), (3, 2, 1, 0));

        let since = Utc::now() - chrono::Duration::hours(24);
        let vocal = repo.post_counts_by_author_since(since, 10).await.unwrap();
        assert_eq!(vocal.len(), 2);
        assert!(vocal.iter().all(|(_, count)| *count == 1));

        assert_eq!(repo.post_timestamps_since(since).await.unwrap().len(), 2);
        assert_eq!(repo.popular_submolts(5).await.unwrap(), vec![("general".to_string(), 3)]);
        assert_eq!(repo.top_authors_by_karma(1).await.unwrap()[0].id, "a2");
        assert_eq!(repo.count_posts_by_author("a2").await.unwrap(), 2);
    }
}
