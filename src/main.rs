use address_match_lib::embedding::init_global_embedder;
use address_match_lib::matching::manager::run_waterfall_batch;
use address_match_lib::matching::WaterfallMatcher;
use address_match_lib::models::matching::{MatchResult, MatchType};
use address_match_lib::store::open_candidate_store;
use address_match_lib::store::transactions::{
    ensure_matches_table, fetch_parsed_transactions, insert_match_results,
};
use address_match_lib::utils::db_connect::{connect_with_size, get_pool_status};
use address_match_lib::utils::env::load_env;
use address_match_lib::utils::get_memory_usage;
use address_match_lib::utils::matcher_config::MatcherConfig;
use address_match_lib::utils::progress_config::ProgressConfig;
use address_match_lib::validator::{AddressValidator, GeocodioValidator};
use anyhow::{Context, Result};
use chrono::Utc;
use log::info;
use std::fs::File;
use std::io::BufWriter;
use std::path::Path;
use std::sync::Arc;
use std::time::Instant;
use uuid::Uuid;

const MATCHED_OUTPUT_PATH: &str = "matched_output.json";
const UNMATCHED_REPORT_PATH: &str = "unmatched_report.json";

fn write_json(path: &Path, results: &[&MatchResult]) -> Result<()> {
    let file = File::create(path).with_context(|| format!("Failed to create {}", path.display()))?;
    serde_json::to_writer_pretty(BufWriter::new(file), results)
        .with_context(|| format!("Failed to write {}", path.display()))?;
    info!("📝 Wrote {} records to {}", results.len(), path.display());
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    env_logger::init();
    info!("Starting waterfall address matching");
    load_env();

    let config = MatcherConfig::from_env();
    config.log_config();
    let progress_config = ProgressConfig::from_env();
    progress_config.log_config();

    let pool = connect_with_size(config.max_concurrent_matches as u32 + 4)
        .await
        .context("Failed to connect to database")?;
    info!("Successfully connected to the database");

    let run_id = Uuid::new_v4().to_string();
    let run_timestamp = Utc::now();
    info!("Run {} started at {}", run_id, run_timestamp.to_rfc3339());
    let start = Instant::now();
    let memory_before = get_memory_usage().await;

    let store = open_candidate_store(&pool, &config)
        .await
        .context("Failed to open candidate store")?;
    let embedder =
        init_global_embedder(&config.embedding).context("Failed to initialize embedder")?;
    let validator: Arc<dyn AddressValidator> = Arc::new(GeocodioValidator::from_env());
    let matcher = Arc::new(WaterfallMatcher::new(store, embedder, validator, &config));

    let limit: Option<i64> = std::env::var("TRANSACTION_LIMIT")
        .ok()
        .and_then(|v| v.trim().parse().ok())
        .filter(|n| *n > 0);
    let transactions = fetch_parsed_transactions(&pool, limit)
        .await
        .context("Failed to load parsed transactions")?;

    let progress = progress_config.create_progress_bar(transactions.len());
    let outcome = run_waterfall_batch(
        matcher,
        transactions,
        &run_id,
        config.max_concurrent_matches,
        progress_config.log_every,
        progress,
    )
    .await?;

    ensure_matches_table(&pool).await?;
    insert_match_results(&pool, &run_id, &outcome.results)
        .await
        .context("Failed to store match results")?;

    let output_dir = std::env::var("OUTPUT_DIR").unwrap_or_else(|_| ".".to_string());
    let output_dir = Path::new(&output_dir);
    let all: Vec<&MatchResult> = outcome.results.iter().collect();
    write_json(&output_dir.join(MATCHED_OUTPUT_PATH), &all)?;
    let unmatched: Vec<&MatchResult> = outcome
        .results
        .iter()
        .filter(|r| r.match_type == MatchType::Unmatched)
        .collect();
    write_json(&output_dir.join(UNMATCHED_REPORT_PATH), &unmatched)?;

    if progress_config.should_show_memory() {
        let memory_after = get_memory_usage().await;
        info!(
            "Memory: {} MB before, {} MB after",
            memory_before, memory_after
        );
    }
    if progress_config.should_show_db_connection_stats() {
        let (size, idle, in_use) = get_pool_status(&pool);
        info!("DB pool: {} connections, {} idle, {} in use", size, idle, in_use);
    }

    info!(
        "Waterfall address matching complete in {:.2?} ({:.1}% matched)",
        start.elapsed(),
        outcome.stats.match_rate() * 100.0
    );
    Ok(())
}
