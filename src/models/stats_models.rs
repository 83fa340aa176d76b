// src/models/stats_models.rs
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::time::Duration;

use crate::models::matching::{MatchResult, MatchType};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MatchTypeStats {
    pub match_type: MatchType,
    pub results: usize,
    pub avg_confidence: f64,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct BatchMatchStats {
    pub run_id: String,
    pub transactions_total: usize,
    pub transactions_matched: usize,
    pub transactions_unmatched: usize,
    /// Transactions that hit an infrastructure error and produced no result.
    pub transactions_failed: usize,
    pub per_type: Vec<MatchTypeStats>,
    /// Occurrences of each unmatched reason.
    pub unmatched_reasons: HashMap<String, usize>,
    pub processing_time: Duration,
}

impl BatchMatchStats {
    pub fn from_results(run_id: &str, results: &[MatchResult], failed: usize, processing_time: Duration) -> Self {
        let mut per_type = Vec::new();
        for match_type in MatchType::all() {
            let of_type: Vec<&MatchResult> = results.iter().filter(|r| r.match_type == match_type).collect();
            let avg_confidence = if of_type.is_empty() {
                0.0
            } else {
                of_type.iter().map(|r| r.confidence).sum::<f64>() / of_type.len() as f64
            };
            per_type.push(MatchTypeStats {
                match_type,
                results: of_type.len(),
                avg_confidence,
            });
        }

        let mut unmatched_reasons: HashMap<String, usize> = HashMap::new();
        for result in results.iter().filter(|r| !r.is_matched()) {
            *unmatched_reasons.entry(result.reason.clone()).or_default() += 1;
        }

        let matched = results.iter().filter(|r| r.is_matched()).count();
        Self {
            run_id: run_id.to_string(),
            transactions_total: results.len() + failed,
            transactions_matched: matched,
            transactions_unmatched: results.len() - matched,
            transactions_failed: failed,
            per_type,
            unmatched_reasons,
            processing_time,
        }
    }

    pub fn match_rate(&self) -> f64 {
        if self.transactions_total == 0 {
            0.0
        } else {
            self.transactions_matched as f64 / self.transactions_total as f64
        }
    }

    pub fn count_for(&self, match_type: MatchType) -> usize {
        self.per_type
            .iter()
            .find(|s| s.match_type == match_type)
            .map(|s| s.results)
            .unwrap_or(0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn result(match_type: MatchType, confidence: f64, reason: &str) -> MatchResult {
        MatchResult {
            transaction_id: "t".into(),
            candidate_id: if match_type == MatchType::Unmatched { None } else { Some("A".into()) },
            matched_display_address: None,
            confidence,
            match_type,
            reason: reason.into(),
            stage_trail: Vec::new(),
        }
    }

    #[test]
    fn test_stats_from_results() {
        let results = vec![
            result(MatchType::Exact, 1.0, "exact match"),
            result(MatchType::Fuzzy, 0.8, "fuzzy match"),
            result(MatchType::Fuzzy, 0.9, "fuzzy match"),
            result(MatchType::Unmatched, 0.0, "no api key"),
        ];
        let stats = BatchMatchStats::from_results("run", &results, 1, Duration::from_secs(1));
        assert_eq!(stats.transactions_total, 5);
        assert_eq!(stats.transactions_matched, 3);
        assert_eq!(stats.transactions_unmatched, 1);
        assert_eq!(stats.transactions_failed, 1);
        assert_eq!(stats.count_for(MatchType::Fuzzy), 2);
        assert_eq!(stats.unmatched_reasons.get("no api key"), Some(&1));
        let fuzzy = stats.per_type.iter().find(|s| s.match_type == MatchType::Fuzzy).unwrap();
        assert!((fuzzy.avg_confidence - 0.85).abs() < 1e-9);
        assert!((stats.match_rate() - 0.6).abs() < 1e-9);
    }

    #[test]
    fn test_empty_stats() {
        let stats = BatchMatchStats::from_results("run", &[], 0, Duration::ZERO);
        assert_eq!(stats.match_rate(), 0.0);
        assert_eq!(stats.count_for(MatchType::Exact), 0);
    }
}
