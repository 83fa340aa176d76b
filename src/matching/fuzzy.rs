// src/matching/fuzzy.rs
use anyhow::Result;
use async_trait::async_trait;
use std::sync::Arc;

use crate::matching::similarity::token_sort_ratio;
use crate::matching::Matcher;
use crate::models::address::ParsedAddress;
use crate::models::matching::{MatchType, ScoreScale, StageMatch, StageOutcome};
use crate::store::CandidateStore;
use crate::utils::logging::StageLogger;

/// Order-insensitive street similarity within the same house number.
///
/// Only the single best-scoring candidate is considered; its unit number must
/// equal the query's exactly (unit type is not compared).
pub struct FuzzyMatcher {
    store: Arc<dyn CandidateStore>,
    threshold: f64,
}

impl FuzzyMatcher {
    pub fn new(store: Arc<dyn CandidateStore>, threshold: f64) -> Self {
        Self { store, threshold }
    }
}

#[async_trait]
impl Matcher for FuzzyMatcher {
    fn match_type(&self) -> MatchType {
        MatchType::Fuzzy
    }

    async fn attempt(&self, parsed: &ParsedAddress) -> Result<StageOutcome> {
        let logger = StageLogger::new(MatchType::Fuzzy);
        let house_number = match parsed.blocking_key() {
            Some(key) => key,
            None => {
                let outcome = StageOutcome::skipped("no house number");
                logger.log_outcome(&outcome);
                return Ok(outcome);
            }
        };

        let candidates = self.store.find_by_house_number(house_number).await?;
        logger.log_blocking(house_number, candidates.len());
        if candidates.is_empty() {
            let outcome = StageOutcome::rejected("no fuzzy candidates for house number");
            logger.log_outcome(&outcome);
            return Ok(outcome);
        }

        let query_street = parsed.full_street();
        let mut best: Option<(usize, f64)> = None;
        for (idx, candidate) in candidates.iter().enumerate() {
            let score = token_sort_ratio(&query_street, &candidate.full_street());
            // Strictly greater: the first candidate wins ties.
            if best.map_or(true, |(_, best_score)| score > best_score) {
                best = Some((idx, score));
            }
        }

        let outcome = match best {
            Some((idx, score)) => {
                let candidate = &candidates[idx];
                logger.log_best(Some(candidate.id.as_str()), score, self.threshold);
                if score < self.threshold {
                    StageOutcome::rejected("low fuzzy score")
                } else if candidate.unit_number != parsed.unit_number {
                    StageOutcome::rejected("fuzzy unit mismatch")
                } else {
                    StageOutcome::Matched(StageMatch::new(
                        candidate.id.clone(),
                        score,
                        ScoreScale::Percent,
                        "fuzzy match",
                    ))
                }
            }
            None => StageOutcome::rejected("no fuzzy candidates for house number"),
        };
        logger.log_outcome(&outcome);
        Ok(outcome)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::address::CandidateAddress;
    use crate::store::InMemoryCandidateStore;

    fn candidate(id: &str, street: &str, street_type: &str, unit: &str) -> CandidateAddress {
        CandidateAddress {
            id: id.into(),
            house_number: "123".into(),
            street_name: street.into(),
            street_type: street_type.into(),
            unit_type: if unit.is_empty() { String::new() } else { "APT".into() },
            unit_number: unit.into(),
            display_address: format!("123 {} {}", street, street_type),
            ..Default::default()
        }
    }

    fn matcher(candidates: Vec<CandidateAddress>) -> FuzzyMatcher {
        FuzzyMatcher::new(Arc::new(InMemoryCandidateStore::new(candidates)), 70.0)
    }

    fn parsed(street: &str, street_type: &str, unit: &str) -> ParsedAddress {
        ParsedAddress {
            street_number: "123".into(),
            street_name: street.into(),
            street_type: street_type.into(),
            unit_number: unit.into(),
            ..Default::default()
        }
    }

    #[tokio::test]
    async fn test_street_suffix_variant_matches() {
        let m = matcher(vec![candidate("A1", "MAIN", "ST", "")]);
        match m.attempt(&parsed("MAIN", "STREET", "")).await.unwrap() {
            StageOutcome::Matched(found) => {
                assert_eq!(found.candidate_id, "A1");
                assert!((found.score - 77.78).abs() < 0.01);
            }
            other => panic!("expected fuzzy match, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_best_candidate_with_wrong_unit_is_rejected() {
        let m = matcher(vec![
            candidate("A", "SMITH", "ST", "4A"),
            candidate("B", "SMITH", "ST", "4B"),
        ]);
        // Both score 100; the first wins and fails the unit gate.
        assert_eq!(
            m.attempt(&parsed("SMITH", "ST", "4B")).await.unwrap(),
            StageOutcome::rejected("fuzzy unit mismatch")
        );
    }

    #[tokio::test]
    async fn test_unit_type_is_not_compared() {
        let mut c = candidate("A", "MAIN", "ST", "2");
        c.unit_type = "STE".into();
        let m = matcher(vec![c]);
        let mut p = parsed("MAIN", "ST", "2");
        p.unit_type = "APT".into();
        assert!(matches!(
            m.attempt(&p).await.unwrap(),
            StageOutcome::Matched(_)
        ));
    }

    #[tokio::test]
    async fn test_low_score_and_empty_block() {
        let m = matcher(vec![candidate("A", "ELM", "AVE", "")]);
        assert_eq!(
            m.attempt(&parsed("MAIN", "ST", "")).await.unwrap(),
            StageOutcome::rejected("low fuzzy score")
        );

        let mut p = parsed("MAIN", "ST", "");
        p.street_number = "999".into();
        assert_eq!(
            m.attempt(&p).await.unwrap(),
            StageOutcome::rejected("no fuzzy candidates for house number")
        );
    }

    #[tokio::test]
    async fn test_tie_keeps_first_candidate() {
        let m = matcher(vec![
            candidate("FIRST", "MAIN", "ST", ""),
            candidate("SECOND", "MAIN", "ST", ""),
        ]);
        match m.attempt(&parsed("MAIN", "ST", "")).await.unwrap() {
            StageOutcome::Matched(found) => assert_eq!(found.candidate_id, "FIRST"),
            other => panic!("expected match, got {:?}", other),
        }
    }
}
