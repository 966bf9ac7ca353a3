//! Database layer for MoltWatch
//!
//! Provides:
//! - SeaORM entity models
//! - Schema bootstrap (tables and indexes derived from the entities)
//! - Repository with the read API's queries
//! - Connection pool management

pub mod models;
mod repository;

pub use repository::{PostSort, Repository, TableCounts};

use crate::config::DatabaseConfig;
use crate::errors::{AppError, Result};
use models::{AuthorEntity, CommentColumn, CommentEntity, PostColumn, PostEntity, SubmoltEntity};
use sea_orm::sea_query::Index;
use sea_orm::{ConnectOptions, ConnectionTrait, Database, DatabaseConnection, Schema};
use std::time::Duration;
use tracing::info;

/// Database connection pool wrapper
#[derive(Clone)]
pub struct DbPool {
    /// Primary connection (for writes)
    pub primary: DatabaseConnection,

    /// Read replica connection (optional)
    pub replica: Option<DatabaseConnection>,
}

impl DbPool {
    /// Create a new database pool from configuration
    pub async fn new(config: &DatabaseConfig) -> Result<Self> {
        info!("Connecting to primary database...");

        let primary = Database::connect(Self::options(&config.url, config))
            .await
            .map_err(|e| AppError::DatabaseConnection {
                message: format!("Failed to connect to primary: {}", e)
            })?;

        // Connect to replica if configured
        let replica = if let Some(ref read_url) = config.read_url {
            info!("Connecting to read replica...");

            let replica_conn = Database::connect(Self::options(read_url, config))
                .await
                .map_err(|e| AppError::DatabaseConnection {
                    message: format!("Failed to connect to replica: {}", e)
                })?;

            Some(replica_conn)
        } else {
            None
        };

        info!("Database connections established");

        Ok(Self { primary, replica })
    }

    /// Connect a single-purpose pool to `url` with at most `max_connections`.
    ///
    /// `sqlite::memory:` databases live per connection, so they need
    /// `max_connections = 1` to be shared.
    pub async fn connect_url(url: &str, max_connections: u32) -> Result<Self> {
        let mut options = ConnectOptions::new(url);
        options
            .max_connections(max_connections)
            .min_connections(1)
            .sqlx_logging(false);

        let primary = Database::connect(options)
            .await
            .map_err(|e| AppError::DatabaseConnection {
                message: format!("Failed to connect to {}: {}", url, e),
            })?;

        Ok(Self::from_connection(primary))
    }

    /// Wrap an existing connection
    pub fn from_connection(primary: DatabaseConnection) -> Self {
        Self { primary, replica: None }
    }

    fn options(url: &str, config: &DatabaseConfig) -> ConnectOptions {
        let mut opts = ConnectOptions::new(url);
        opts
            .max_connections(config.max_connections)
            .min_connections(config.min_connections)
            .connect_timeout(Duration::from_secs(config.connect_timeout_secs))
            .idle_timeout(Duration::from_secs(config.idle_timeout_secs))
            .sqlx_logging(false);
        opts
    }

    /// Get the connection for reads (replica if available, otherwise primary)
    pub fn read(&self) -> &DatabaseConnection {
        self.replica.as_ref().unwrap_or(&self.primary)
    }

    /// Get the connection for writes (always primary)
    pub fn write(&self) -> &DatabaseConnection {
        &self.primary
    }

    /// Ping the database to check connectivity
    pub async fn ping(&self) -> Result<()> {
        self.primary
            .execute_unprepared("SELECT 1")
            .await
            .map_err(|e| AppError::DatabaseConnection {
                message: format!("Primary ping failed: {}", e),
            })?;

        if let Some(ref replica) = self.replica {
            replica
                .execute_unprepared("SELECT 1")
                .await
                .map_err(|e| AppError::DatabaseConnection {
                    message: format!("Replica ping failed: {}", e),
                })?;
        }

        Ok(())
    }

    /// Create tables and indexes that do not exist yet
    pub async fn init_schema(&self) -> Result<()> {
        let db = self.write();
        let backend = db.get_database_backend();
        let schema = Schema::new(backend);

        // Parents before children so foreign keys resolve
        let mut tables = vec![
            schema.create_table_from_entity(AuthorEntity),
            schema.create_table_from_entity(SubmoltEntity),
            schema.create_table_from_entity(PostEntity),
            schema.create_table_from_entity(CommentEntity),
        ];

        for table in tables.iter_mut() {
            table.if_not_exists();
            db.execute(backend.build(&*table)).await?;
        }

        let indexes = vec![
            Index::create()
                .if_not_exists()
                .name("idx_posts_created_at")
                .table(PostEntity)
                .col(PostColumn::CreatedAt)
                .to_owned(),
            Index::create()
                .if_not_exists()
                .name("idx_posts_score")
                .table(PostEntity)
                .col(PostColumn::Score)
                .to_owned(),
            Index::create()
                .if_not_exists()
                .name("idx_posts_author_id")
                .table(PostEntity)
                .col(PostColumn::AuthorId)
                .to_owned(),
            Index::create()
                .if_not_exists()
                .name("idx_comments_post_id")
                .table(CommentEntity)
                .col(CommentColumn::PostId)
                .to_owned(),
        ];

        for index in indexes.iter() {
            db.execute(backend.build(index)).await?;
        }

        info!("Database schema ready");
        Ok(())
    }
}
