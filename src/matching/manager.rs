// src/matching/manager.rs - Concurrent waterfall matching over a batch of transactions
use anyhow::Result;
use futures::stream::{self, StreamExt};
use indicatif::ProgressBar;
use log::{info, warn};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Instant;

use crate::matching::WaterfallMatcher;
use crate::models::matching::{MatchResult, ParsedTransaction};
use crate::models::stats_models::BatchMatchStats;
use crate::utils::logging::{log_batch_completion, log_batch_progress, log_batch_start};

/// A transaction whose match attempt hit an infrastructure error.
#[derive(Debug, Clone)]
pub struct FailedTransaction {
    pub transaction_id: String,
    pub error: String,
}

#[derive(Debug)]
pub struct BatchOutcome {
    /// One result per successfully processed transaction, in input order.
    pub results: Vec<MatchResult>,
    pub failures: Vec<FailedTransaction>,
    pub stats: BatchMatchStats,
}

/// Matches every transaction with at most `max_concurrent` in flight.
///
/// Transactions are pulled from the input lazily and results come back in
/// input order. A failure of one is recorded and does not stop the others.
pub async fn run_waterfall_batch(
    matcher: Arc<WaterfallMatcher>,
    transactions: Vec<ParsedTransaction>,
    run_id: &str,
    max_concurrent: usize,
    log_every: usize,
    progress: Option<ProgressBar>,
) -> Result<BatchOutcome> {
    let start_time = Instant::now();
    let total = transactions.len();
    let max_concurrent = max_concurrent.max(1);
    log_batch_start(run_id, total, max_concurrent);

    let completed = AtomicUsize::new(0);
    let matched = AtomicUsize::new(0);

    let attempts: Vec<(String, Result<MatchResult>)> = stream::iter(transactions)
        .map(|transaction| {
            let matcher = Arc::clone(&matcher);
            let (completed, matched, progress) = (&completed, &matched, &progress);
            async move {
                let result = matcher
                    .match_address(&transaction.transaction_id, &transaction.address)
                    .await;

                if matches!(&result, Ok(r) if r.is_matched()) {
                    matched.fetch_add(1, Ordering::Relaxed);
                }
                let done = completed.fetch_add(1, Ordering::Relaxed) + 1;
                if let Some(pb) = progress {
                    pb.inc(1);
                }
                if log_every > 0 && done % log_every == 0 {
                    log_batch_progress(done, total, matched.load(Ordering::Relaxed));
                }
                (transaction.transaction_id, result)
            }
        })
        .buffered(max_concurrent)
        .collect()
        .await;

    let mut results = Vec::with_capacity(total);
    let mut failures = Vec::new();
    for (transaction_id, attempt) in attempts {
        match attempt {
            Ok(result) => results.push(result),
            Err(e) => {
                warn!("Transaction {} failed: {:#}", transaction_id, e);
                failures.push(FailedTransaction {
                    transaction_id,
                    error: format!("{:#}", e),
                });
            }
        }
    }

    if let Some(pb) = &progress {
        pb.finish_with_message(format!("{} matched", matched.load(Ordering::Relaxed)));
    }

    let stats = BatchMatchStats::from_results(run_id, &results, failures.len(), start_time.elapsed());
    log_batch_completion(&stats);
    if !failures.is_empty() {
        info!("⚠️  {} transactions failed and were not matched", failures.len());
    }

    Ok(BatchOutcome {
        results,
        failures,
        stats,
    })
}
