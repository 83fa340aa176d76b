// src/matching/exact.rs
use anyhow::Result;
use async_trait::async_trait;
use std::sync::Arc;

use crate::matching::Matcher;
use crate::models::address::ParsedAddress;
use crate::models::matching::{MatchType, ScoreScale, StageMatch, StageOutcome};
use crate::store::CandidateStore;
use crate::utils::logging::StageLogger;

pub struct ExactMatcher {
    store: Arc<dyn CandidateStore>,
}

impl ExactMatcher {
    pub fn new(store: Arc<dyn CandidateStore>) -> Self {
        Self { store }
    }
}

#[async_trait]
impl Matcher for ExactMatcher {
    fn match_type(&self) -> MatchType {
        MatchType::Exact
    }

    async fn attempt(&self, parsed: &ParsedAddress) -> Result<StageOutcome> {
        let logger = StageLogger::new(MatchType::Exact);
        if parsed.blocking_key().is_none() {
            let outcome = StageOutcome::skipped("no house number");
            logger.log_outcome(&outcome);
            return Ok(outcome);
        }

        let outcome = match self.store.find_exact(&parsed.structural_query()).await? {
            Some(candidate) => StageOutcome::Matched(StageMatch::new(
                candidate.id,
                1.0,
                ScoreScale::Unit,
                "exact match",
            )),
            None => StageOutcome::rejected("no exact match"),
        };
        logger.log_outcome(&outcome);
        Ok(outcome)
    }
}
