// src/models/matching.rs
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::models::address::ParsedAddress;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MatchType {
    Exact,
    Fuzzy,
    Phonetic,
    Embedding,
    Api,
    Unmatched,
}

impl MatchType {
    pub fn as_str(&self) -> &'static str {
        match self {
            MatchType::Exact => "exact",
            MatchType::Fuzzy => "fuzzy",
            MatchType::Phonetic => "phonetic",
            MatchType::Embedding => "embedding",
            MatchType::Api => "api",
            MatchType::Unmatched => "unmatched",
        }
    }

    /// Every match type in waterfall priority order, `Unmatched` last.
    pub fn all() -> [MatchType; 6] {
        [
            MatchType::Exact,
            MatchType::Fuzzy,
            MatchType::Phonetic,
            MatchType::Embedding,
            MatchType::Api,
            MatchType::Unmatched,
        ]
    }
}

impl fmt::Display for MatchType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Scale a stage reports its score on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ScoreScale {
    /// 0.0 - 1.0
    Unit,
    /// 0 - 100
    Percent,
}

/// A stage's accepted candidate together with its native score.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StageMatch {
    pub candidate_id: String,
    pub score: f64,
    pub scale: ScoreScale,
    pub reason: String,
}

impl StageMatch {
    pub fn new(candidate_id: impl Into<String>, score: f64, scale: ScoreScale, reason: impl Into<String>) -> Self {
        Self {
            candidate_id: candidate_id.into(),
            score,
            scale,
            reason: reason.into(),
        }
    }

    /// Score converted onto the 0-1 scale of `MatchResult::confidence`.
    pub fn confidence(&self) -> f64 {
        let unit = match self.scale {
            ScoreScale::Unit => self.score,
            ScoreScale::Percent => self.score / 100.0,
        };
        unit.clamp(0.0, 1.0)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum StageOutcome {
    Matched(StageMatch),
    /// The stage ran and found nothing acceptable.
    Rejected { reason: String },
    /// The stage could not run (missing blocking key).
    Skipped { reason: String },
}

impl StageOutcome {
    pub fn rejected(reason: impl Into<String>) -> Self {
        StageOutcome::Rejected { reason: reason.into() }
    }

    pub fn skipped(reason: impl Into<String>) -> Self {
        StageOutcome::Skipped { reason: reason.into() }
    }

    pub fn reason(&self) -> &str {
        match self {
            StageOutcome::Matched(m) => &m.reason,
            StageOutcome::Rejected { reason } | StageOutcome::Skipped { reason } => reason,
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            StageOutcome::Matched(_) => "matched",
            StageOutcome::Rejected { .. } => "rejected",
            StageOutcome::Skipped { .. } => "skipped",
        }
    }
}

/// One entry of the per-transaction explanation trail.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StageTrace {
    pub stage: MatchType,
    pub outcome: String,
    pub reason: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MatchResult {
    pub transaction_id: String,
    pub candidate_id: Option<String>,
    pub matched_display_address: Option<String>,
    pub confidence: f64,
    pub match_type: MatchType,
    pub reason: String,
    pub stage_trail: Vec<StageTrace>,
}

impl MatchResult {
    pub fn is_matched(&self) -> bool {
        self.match_type != MatchType::Unmatched
    }

    /// Confidence rounded to two decimals for external reporting.
    pub fn reported_confidence(&self) -> f64 {
        (self.confidence * 100.0).round() / 100.0
    }
}

/// Batch input row: a transaction id with its parsed address.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ParsedTransaction {
    pub transaction_id: String,
    pub address: ParsedAddress,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_stage_match_confidence_normalizes_percent() {
        let m = StageMatch::new("A1", 77.78, ScoreScale::Percent, "fuzzy match");
        assert!((m.confidence() - 0.7778).abs() < 1e-9);
        let m = StageMatch::new("A1", 0.91, ScoreScale::Unit, "api match");
        assert!((m.confidence() - 0.91).abs() < 1e-9);
    }

    #[test]
    fn test_stage_match_confidence_is_clamped() {
        let m = StageMatch::new("A1", 140.0, ScoreScale::Percent, "x");
        assert_eq!(m.confidence(), 1.0);
        let m = StageMatch::new("A1", -0.2, ScoreScale::Unit, "x");
        assert_eq!(m.confidence(), 0.0);
    }

    #[test]
    fn test_reported_confidence_rounds_to_two_decimals() {
        let result = MatchResult {
            transaction_id: "t1".into(),
            candidate_id: Some("A1".into()),
            matched_display_address: None,
            confidence: 0.77777,
            match_type: MatchType::Fuzzy,
            reason: "fuzzy match".into(),
            stage_trail: Vec::new(),
        };
        assert_eq!(result.reported_confidence(), 0.78);
        assert!(result.is_matched());
    }

    #[test]
    fn test_match_type_serializes_lowercase() {
        let json = serde_json::to_string(&MatchType::Embedding).unwrap();
        assert_eq!(json, "\"embedding\"");
        assert_eq!(MatchType::Api.to_string(), "api");
    }
}
