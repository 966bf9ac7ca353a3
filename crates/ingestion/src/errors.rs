//! Ingestion service error types

use thiserror::Error;

#[derive(Error, Debug)]
pub enum IngestionError {
    #[error("Upstream error: {0}")]
    UpstreamError(String),

    #[error("Snapshot error for {path}: {message}")]
    SnapshotError { path: String, message: String },

    #[error("Database error: {0}")]
    DatabaseError(#[from] sea_orm::DbErr),

    #[error("Configuration error: {0}")]
    ConfigError(String),

    #[error("Payload error: {0}")]
    PayloadError(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error(transparent)]
    Common(#[from] moltwatch_common::errors::AppError),
}

pub type Result<T> = std::result::Result<T, IngestionError>;
