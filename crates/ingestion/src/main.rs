//! MoltWatch Ingestion Service
//!
//! Modes:
//! - `ingestion`                  run one cycle and exit
//! - `ingestion serve`            run cycles on the configured schedule until Ctrl-C
//! - `ingestion backfill [limit]` fill missing translations of recent posts

use moltwatch_common::{config::AppConfig, db::DbPool, translation::create_translator, VERSION};
use moltwatch_ingestion::backfill::{TranslationBackfill, DEFAULT_BACKFILL_LIMIT};
use moltwatch_ingestion::{build_cycle, Scheduler};
use std::sync::Arc;
use tracing::{error, info};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Load environment variables
    dotenvy::dotenv().ok();

    // Load configuration
    let config = AppConfig::load().map_err(|e| {
        eprintln!("Failed to load configuration: {}", e);
        e
    })?;

    // Initialize tracing
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(&config.observability.log_level));
    if config.observability.json_logging {
        tracing_subscriber::registry()
            .with(filter)
            .with(fmt::layer().json().with_target(true))
            .init();
    } else {
        tracing_subscriber::registry()
            .with(filter)
            .with(fmt::layer().pretty())
            .init();
    }

    info!("Starting MoltWatch Ingestion v{}", VERSION);

    // Initialize database connection
    info!("Connecting to database...");
    let db = DbPool::new(&config.database).await?;
    db.init_schema().await?;

    let args: Vec<String> = std::env::args().collect();
    match args.get(1).map(String::as_str) {
        None | Some("once") => {
            let cycle = build_cycle(&config, db)?;
            let report = cycle.run().await;
            println!("{}", serde_json::to_string_pretty(&report)?);
        }
        Some("serve") => {
            let cycle = Arc::new(build_cycle(&config, db)?);
            let handle = Scheduler::from_config(cycle, &config.scheduler).start();

            tokio::signal::ctrl_c().await?;
            info!("Shutdown signal received");
            handle.shutdown().await;
        }
        Some("backfill") => {
            let limit = match args.get(2) {
                Some(raw) => raw.parse()?,
                None => DEFAULT_BACKFILL_LIMIT,
            };
            let translator = create_translator(&config.translation)?;
            let summary = TranslationBackfill::new(db, translator).run(limit).await?;
            println!(
                "Filled {} translations across {} posts",
                summary.filled, summary.posts_scanned
            );
        }
        Some(other) => {
            error!(mode = other, "Unknown mode");
            eprintln!("Usage: ingestion [once|serve|backfill [limit]]");
            std::process::exit(2);
        }
    }

    info!("Ingestion service shutting down");
    Ok(())
}
