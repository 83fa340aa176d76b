// src/matching/phonetic.rs
use anyhow::Result;
use async_trait::async_trait;
use rphonetic::{DoubleMetaphone, Encoder};
use std::sync::Arc;

use crate::matching::similarity::token_set_ratio;
use crate::matching::Matcher;
use crate::models::address::{CandidateAddress, ParsedAddress};
use crate::models::matching::{MatchType, ScoreScale, StageMatch, StageOutcome};
use crate::store::CandidateStore;
use crate::utils::logging::StageLogger;

/// Primary double-metaphone code of a street name. Empty input yields "".
pub fn phonetic_code(encoder: &DoubleMetaphone, street_name: &str) -> String {
    let name = street_name.trim().to_uppercase();
    if name.is_empty() {
        return String::new();
    }
    encoder.encode(&name)
}

pub struct PhoneticMatcher {
    store: Arc<dyn CandidateStore>,
    threshold: f64,
    encoder: DoubleMetaphone,
}

impl PhoneticMatcher {
    pub fn new(store: Arc<dyn CandidateStore>, threshold: f64) -> Self {
        Self {
            store,
            threshold,
            encoder: DoubleMetaphone::default(),
        }
    }

    fn sounds_alike(&self, code: &str, candidate: &CandidateAddress) -> bool {
        phonetic_code(&self.encoder, &candidate.street_name) == code
    }
}

#[async_trait]
impl Matcher for PhoneticMatcher {
    fn match_type(&self) -> MatchType {
        MatchType::Phonetic
    }

    async fn attempt(&self, parsed: &ParsedAddress) -> Result<StageOutcome> {
        let logger = StageLogger::new(MatchType::Phonetic);
        let house_number = match parsed.blocking_key() {
            Some(key) => key,
            None => {
                let outcome = StageOutcome::skipped("no house number");
                logger.log_outcome(&outcome);
                return Ok(outcome);
            }
        };

        let code = phonetic_code(&self.encoder, &parsed.street_name);
        if code.is_empty() {
            let outcome = StageOutcome::rejected("no phonetic code match");
            logger.log_outcome(&outcome);
            return Ok(outcome);
        }

        let candidates = self.store.find_by_house_number(house_number).await?;
        logger.log_blocking(house_number, candidates.len());

        let same_sound: Vec<&CandidateAddress> = candidates
            .iter()
            .filter(|c| self.sounds_alike(&code, c))
            .collect();
        if same_sound.is_empty() {
            let outcome = StageOutcome::rejected("no phonetic code match");
            logger.log_outcome(&outcome);
            return Ok(outcome);
        }

        // Unit number only constrains when the query carries one.
        let same_unit: Vec<&CandidateAddress> = same_sound
            .into_iter()
            .filter(|c| parsed.unit_number.is_empty() || c.unit_number == parsed.unit_number)
            .collect();
        if same_unit.is_empty() {
            let outcome = StageOutcome::rejected("phonetic unit mismatch");
            logger.log_outcome(&outcome);
            return Ok(outcome);
        }

        let query_street = parsed.full_street();
        let mut best: Option<(&CandidateAddress, f64)> = None;
        for candidate in same_unit {
            let score = token_set_ratio(&query_street, &candidate.display_address.to_uppercase());
            if best.map_or(true, |(_, best_score)| score > best_score) {
                best = Some((candidate, score));
            }
        }

        let outcome = match best {
            Some((candidate, score)) if score >= self.threshold => {
                logger.log_best(Some(candidate.id.as_str()), score, self.threshold);
                StageOutcome::Matched(StageMatch::new(
                    candidate.id.clone(),
                    score,
                    ScoreScale::Percent,
                    "phonetic match",
                ))
            }
            Some((candidate, score)) => {
                logger.log_best(Some(candidate.id.as_str()), score, self.threshold);
                StageOutcome::rejected("low phonetic score")
            }
            None => StageOutcome::rejected("phonetic unit mismatch"),
        };
        logger.log_outcome(&outcome);
        Ok(outcome)
    }
}
