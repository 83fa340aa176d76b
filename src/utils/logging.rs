// src/utils/logging.rs - Logging helpers for matcher stages and batch runs
use log::{debug, info, warn};
use std::time::Instant;

use crate::models::matching::{MatchType, StageOutcome};
use crate::models::stats_models::BatchMatchStats;

#[derive(Clone)]
pub struct StageLogger {
    stage_name: &'static str,
    stage_emoji: &'static str,
    start_time: Instant,
}

impl StageLogger {
    pub fn new(match_type: MatchType) -> Self {
        let (stage_name, stage_emoji) = match match_type {
            MatchType::Exact => ("EXACT", "🎯"),
            MatchType::Fuzzy => ("FUZZY", "🔤"),
            MatchType::Phonetic => ("PHONETIC", "🔊"),
            MatchType::Embedding => ("EMBEDDING", "🧠"),
            MatchType::Api => ("API", "🌐"),
            MatchType::Unmatched => ("UNMATCHED", "❓"),
        };

        Self {
            stage_name,
            stage_emoji,
            start_time: Instant::now(),
        }
    }

    pub fn log_blocking(&self, house_number: &str, candidates: usize) {
        debug!(
            "[{}] {} 📊 {} candidates share house number '{}'",
            self.stage_name, self.stage_emoji, candidates, house_number
        );
    }

    pub fn log_best(&self, candidate_id: Option<&str>, score: f64, threshold: f64) {
        debug!(
            "[{}] {} 🏆 Best candidate {:?} scored {:.2} (threshold {:.2})",
            self.stage_name, self.stage_emoji, candidate_id, score, threshold
        );
    }

    pub fn log_outcome(&self, outcome: &StageOutcome) {
        let elapsed = self.start_time.elapsed();
        match outcome {
            StageOutcome::Matched(m) => debug!(
                "[{}] {} ✅ Matched candidate {} (score {:.2}) [+{:.1}ms]",
                self.stage_name,
                self.stage_emoji,
                m.candidate_id,
                m.score,
                elapsed.as_secs_f64() * 1000.0
            ),
            StageOutcome::Rejected { reason } => debug!(
                "[{}] {} ⏭️  Rejected: {} [+{:.1}ms]",
                self.stage_name,
                self.stage_emoji,
                reason,
                elapsed.as_secs_f64() * 1000.0
            ),
            StageOutcome::Skipped { reason } => debug!(
                "[{}] {} 💤 Skipped: {}",
                self.stage_name, self.stage_emoji, reason
            ),
        }
    }

    pub fn log_warning(&self, message: &str) {
        warn!("[{}] {} ⚠️  {}", self.stage_name, self.stage_emoji, message);
    }
}

pub fn log_batch_start(run_id: &str, transactions: usize, concurrency_limit: usize) {
    info!("🚀 Starting waterfall matching (run ID: {})", run_id);
    info!(
        "   • {} transactions, {} max simultaneous matches",
        transactions, concurrency_limit
    );
}

pub fn log_batch_progress(completed: usize, total: usize, matched_so_far: usize) {
    let percent = if total > 0 {
        completed as f64 / total as f64 * 100.0
    } else {
        100.0
    };
    info!(
        "📈 Progress: {}/{} transactions ({:.1}%), {} matched so far",
        completed, total, percent, matched_so_far
    );
}

pub fn log_batch_completion(stats: &BatchMatchStats) {
    info!("=== Waterfall Matching Summary ===");
    info!("Run ID: {}", stats.run_id);
    info!(
        "Transactions: {} total, {} matched ({:.1}%), {} unmatched, {} failed",
        stats.transactions_total,
        stats.transactions_matched,
        stats.match_rate() * 100.0,
        stats.transactions_unmatched,
        stats.transactions_failed
    );
    for type_stats in &stats.per_type {
        info!(
            "   {:<10} {:>8} results, avg confidence: {:.3}",
            type_stats.match_type.as_str(),
            type_stats.results,
            type_stats.avg_confidence
        );
    }
    if !stats.unmatched_reasons.is_empty() {
        info!("=== Unmatched Reasons ===");
        let mut reasons: Vec<_> = stats.unmatched_reasons.iter().collect();
        reasons.sort_by(|a, b| b.1.cmp(a.1));
        for (reason, count) in reasons {
            info!("   {}: {}", reason, count);
        }
    }
    info!("Processing time: {:.2?}", stats.processing_time);
}
