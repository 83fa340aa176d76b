// src/matching/embedding.rs
use anyhow::Result;
use async_trait::async_trait;
use std::sync::Arc;

use crate::embedding::SharedEmbedder;
use crate::matching::Matcher;
use crate::models::address::{CandidateAddress, ParsedAddress};
use crate::models::matching::{MatchType, ScoreScale, StageMatch, StageOutcome};
use crate::store::CandidateStore;
use crate::utils::candle::cosine_similarity_candle;
use crate::utils::logging::StageLogger;

/// Cosine similarity between the query street and each candidate's display
/// address. When the query has a unit number, candidates with a different
/// one are dropped before any encoding happens.
pub struct EmbeddingMatcher {
    store: Arc<dyn CandidateStore>,
    embedder: Arc<SharedEmbedder>,
    threshold: f64,
}

impl EmbeddingMatcher {
    pub fn new(store: Arc<dyn CandidateStore>, embedder: Arc<SharedEmbedder>, threshold: f64) -> Self {
        Self {
            store,
            embedder,
            threshold,
        }
    }

    async fn best_candidate<'a>(
        &self,
        query_street: &str,
        candidates: &[&'a CandidateAddress],
    ) -> Result<Option<(&'a CandidateAddress, f64)>> {
        let mut texts = Vec::with_capacity(candidates.len() + 1);
        texts.push(query_street.to_string());
        texts.extend(candidates.iter().map(|c| c.display_address.trim().to_uppercase()));

        let vectors = self.embedder.encode_all(texts).await?;
        let (query_vec, candidate_vecs) = vectors
            .split_first()
            .ok_or_else(|| anyhow::anyhow!("Embedding provider returned no vectors"))?;

        let mut best: Option<(&'a CandidateAddress, f64)> = None;
        for (&candidate, vector) in candidates.iter().zip(candidate_vecs) {
            let similarity = cosine_similarity_candle(query_vec, vector)?;
            if best.map_or(true, |(_, best_sim)| similarity > best_sim) {
                best = Some((candidate, similarity));
            }
        }
        Ok(best)
    }
}

#[async_trait]
impl Matcher for EmbeddingMatcher {
    fn match_type(&self) -> MatchType {
        MatchType::Embedding
    }

    async fn attempt(&self, parsed: &ParsedAddress) -> Result<StageOutcome> {
        let logger = StageLogger::new(MatchType::Embedding);
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
            let outcome = StageOutcome::rejected("no embedding candidates for house number");
            logger.log_outcome(&outcome);
            return Ok(outcome);
        }

        let same_unit: Vec<&CandidateAddress> = candidates
            .iter()
            .filter(|c| parsed.unit_number.is_empty() || c.unit_number == parsed.unit_number)
            .collect();
        if same_unit.is_empty() {
            let outcome = StageOutcome::rejected("embedding unit mismatch");
            logger.log_outcome(&outcome);
            return Ok(outcome);
        }

        let best = match self.best_candidate(&parsed.full_street(), &same_unit).await {
            Ok(best) => best,
            Err(e) => {
                logger.log_warning(&format!("Embedding failed: {:#}", e));
                let outcome = StageOutcome::rejected("embedding error");
                logger.log_outcome(&outcome);
                return Ok(outcome);
            }
        };

        let outcome = match best {
            Some((candidate, similarity)) => {
                logger.log_best(Some(candidate.id.as_str()), similarity, self.threshold);
                if similarity >= self.threshold {
                    StageOutcome::Matched(StageMatch::new(
                        candidate.id.clone(),
                        similarity * 100.0,
                        ScoreScale::Percent,
                        "embedding match",
                    ))
                } else {
                    StageOutcome::rejected("low embedding similarity")
                }
            }
            None => StageOutcome::rejected("embedding unit mismatch"),
        };
        logger.log_outcome(&outcome);
        Ok(outcome)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::embedding::EmbeddingProvider;
    use crate::store::InMemoryCandidateStore;

    /// Maps known strings onto fixed 2-d vectors.
    struct TableProvider;

    impl EmbeddingProvider for TableProvider {
        fn encode(&self, text: &str) -> Result<Vec<f32>> {
            match text {
                "BROADWAY" => Ok(vec![1.0, 0.0]),
                "123 BROADWAY AVE" => Ok(vec![0.9, 0.1]),
                "123 ELM ST" => Ok(vec![0.0, 1.0]),
                other => Err(anyhow::anyhow!("unexpected text {}", other)),
            }
        }

        fn dimension(&self) -> usize {
            2
        }

        fn model_version(&self) -> String {
            "table".into()
        }
    }

    fn candidate(id: &str, display: &str, unit: &str) -> CandidateAddress {
        CandidateAddress {
            id: id.into(),
            house_number: "123".into(),
            unit_number: unit.into(),
            display_address: display.into(),
            ..Default::default()
        }
    }

    fn matcher(candidates: Vec<CandidateAddress>, threshold: f64) -> EmbeddingMatcher {
        EmbeddingMatcher::new(
            Arc::new(InMemoryCandidateStore::new(candidates)),
            Arc::new(SharedEmbedder::new(Arc::new(TableProvider), 2)),
            threshold,
        )
    }

    fn parsed(unit: &str) -> ParsedAddress {
        ParsedAddress {
            street_number: "123".into(),
            street_name: "BROADWAY".into(),
            unit_number: unit.into(),
            ..Default::default()
        }
    }

    #[tokio::test]
    async fn test_closest_candidate_above_threshold_matches() {
        let m = matcher(
            vec![candidate("ELM", "123 ELM ST", ""), candidate("BWAY", "123 Broadway Ave", "")],
            0.75,
        );
        match m.attempt(&parsed("")).await.unwrap() {
            StageOutcome::Matched(found) => {
                assert_eq!(found.candidate_id, "BWAY");
                assert!(found.confidence() > 0.99);
                assert_eq!(found.scale, ScoreScale::Percent);
            }
            other => panic!("expected embedding match, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_below_threshold_rejects() {
        let m = matcher(vec![candidate("ELM", "123 ELM ST", "")], 0.75);
        assert_eq!(
            m.attempt(&parsed("")).await.unwrap(),
            StageOutcome::rejected("low embedding similarity")
        );
    }

    #[tokio::test]
    async fn test_unit_filter_runs_before_encoding() {
        // Encoding the "9Z" candidate would fail with an unexpected text.
        let m = matcher(vec![candidate("X", "999 NOWHERE", "9Z")], 0.75);
        assert_eq!(
            m.attempt(&parsed("4A")).await.unwrap(),
            StageOutcome::rejected("embedding unit mismatch")
        );
    }

    #[tokio::test]
    async fn test_unitless_query_accepts_candidate_with_unit() {
        let m = matcher(vec![candidate("BWAY", "123 Broadway Ave", "4A")], 0.75);
        match m.attempt(&parsed("")).await.unwrap() {
            StageOutcome::Matched(found) => assert_eq!(found.candidate_id, "BWAY"),
            other => panic!("expected embedding match, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_encoder_failure_is_soft() {
        let m = matcher(vec![candidate("X", "999 NOWHERE", "")], 0.75);
        assert_eq!(
            m.attempt(&parsed("")).await.unwrap(),
            StageOutcome::rejected("embedding error")
        );
    }
}
