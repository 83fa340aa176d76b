// src/matching/api.rs
use anyhow::Result;
use async_trait::async_trait;
use std::sync::Arc;
use std::time::Duration;

use crate::matching::Matcher;
use crate::models::address::ParsedAddress;
use crate::models::matching::{MatchType, ScoreScale, StageMatch, StageOutcome};
use crate::store::CandidateStore;
use crate::utils::logging::StageLogger;
use crate::validator::{AddressValidator, ValidatorError};

/// "original, CITY, STATE ZIP" with blank parts left out.
/// Empty when the original free text is empty.
pub fn build_validator_query(parsed: &ParsedAddress) -> String {
    let original = parsed.original_free_text.trim();
    if original.is_empty() {
        return String::new();
    }
    let state_zip = [parsed.state.trim(), parsed.zip.trim()]
        .iter()
        .filter(|s| !s.is_empty())
        .copied()
        .collect::<Vec<_>>()
        .join(" ");
    [original, parsed.city.trim(), state_zip.as_str()]
        .iter()
        .filter(|s| !s.is_empty())
        .copied()
        .collect::<Vec<_>>()
        .join(", ")
}

/// Last-resort stage: normalize the free text through an external validator,
/// then look the normalized components up structurally.
pub struct ApiMatcher {
    store: Arc<dyn CandidateStore>,
    validator: Arc<dyn AddressValidator>,
    timeout: Duration,
}

impl ApiMatcher {
    pub fn new(
        store: Arc<dyn CandidateStore>,
        validator: Arc<dyn AddressValidator>,
        timeout: Duration,
    ) -> Self {
        Self {
            store,
            validator,
            timeout,
        }
    }
}

#[async_trait]
impl Matcher for ApiMatcher {
    fn match_type(&self) -> MatchType {
        MatchType::Api
    }

    async fn attempt(&self, parsed: &ParsedAddress) -> Result<StageOutcome> {
        let logger = StageLogger::new(MatchType::Api);
        if !self.validator.is_configured() {
            let outcome = StageOutcome::rejected("no api key");
            logger.log_outcome(&outcome);
            return Ok(outcome);
        }

        let query = build_validator_query(parsed);
        if query.is_empty() {
            let outcome = StageOutcome::rejected("no original address");
            logger.log_outcome(&outcome);
            return Ok(outcome);
        }

        let normalized = match self.validator.normalize(&query, self.timeout).await {
            Ok(Some(result)) => result,
            Ok(None) => {
                let outcome = StageOutcome::rejected("no api result");
                logger.log_outcome(&outcome);
                return Ok(outcome);
            }
            Err(ValidatorError::NotConfigured) => {
                let outcome = StageOutcome::rejected("no api key");
                logger.log_outcome(&outcome);
                return Ok(outcome);
            }
            Err(e) => {
                logger.log_warning(&format!("Validator request error for '{}': {}", query, e));
                let outcome = StageOutcome::rejected("api request error");
                logger.log_outcome(&outcome);
                return Ok(outcome);
            }
        };

        let outcome = match self.store.find_exact(&normalized.structural_query()).await? {
            Some(candidate) => StageOutcome::Matched(StageMatch::new(
                candidate.id,
                normalized.accuracy,
                ScoreScale::Unit,
                "api match",
            )),
            None => StageOutcome::rejected("api returned but no match"),
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
    use crate::validator::{DisabledValidator, NormalizedResult};

    enum Canned {
        Found(NormalizedResult),
        Nothing,
        Fails,
    }

    struct CannedValidator(Canned);

    #[async_trait]
    impl AddressValidator for CannedValidator {
        fn is_configured(&self) -> bool {
            true
        }

        async fn normalize(
            &self,
            _free_text: &str,
            timeout: Duration,
        ) -> Result<Option<NormalizedResult>, ValidatorError> {
            match &self.0 {
                Canned::Found(result) => Ok(Some(result.clone())),
                Canned::Nothing => Ok(None),
                Canned::Fails => Err(ValidatorError::Timeout(timeout)),
            }
        }
    }

    fn store() -> Arc<dyn CandidateStore> {
        Arc::new(InMemoryCandidateStore::new(vec![CandidateAddress {
            id: "A1".into(),
            house_number: "123".into(),
            street_name: "MAIN".into(),
            street_type: "ST".into(),
            unit_type: "APT".into(),
            unit_number: "4B".into(),
            zip: "11211".into(),
            display_address: "123 MAIN ST APT 4B".into(),
            ..Default::default()
        }]))
    }

    fn normalized(unit_number: &str) -> NormalizedResult {
        NormalizedResult {
            house_number: "123".into(),
            street_name: "MAIN".into(),
            street_type: "ST".into(),
            unit_type: "APT".into(),
            unit_number: unit_number.into(),
            zip: "11211".into(),
            accuracy: 0.92,
            ..Default::default()
        }
    }

    fn parsed() -> ParsedAddress {
        ParsedAddress {
            original_free_text: "123 Mian Stret #4B".into(),
            city: "BROOKLYN".into(),
            state: "NY".into(),
            zip: "11211".into(),
            ..Default::default()
        }
    }

    fn matcher(validator: impl AddressValidator + 'static) -> ApiMatcher {
        ApiMatcher::new(store(), Arc::new(validator), Duration::from_secs(5))
    }

    #[test]
    fn test_validator_query() {
        assert_eq!(
            build_validator_query(&parsed()),
            "123 Mian Stret #4B, BROOKLYN, NY 11211"
        );
        let mut p = parsed();
        p.city = String::new();
        p.zip = String::new();
        assert_eq!(build_validator_query(&p), "123 Mian Stret #4B, NY");
        p.original_free_text = "  ".into();
        assert_eq!(build_validator_query(&p), "");
    }

    #[tokio::test]
    async fn test_api_match_uses_validator_accuracy() {
        let m = matcher(CannedValidator(Canned::Found(normalized("4B"))));
        match m.attempt(&parsed()).await.unwrap() {
            StageOutcome::Matched(found) => {
                assert_eq!(found.candidate_id, "A1");
                assert!((found.confidence() - 0.92).abs() < 1e-9);
                assert_eq!(found.reason, "api match");
            }
            other => panic!("expected api match, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_soft_failure_reasons() {
        assert_eq!(
            matcher(DisabledValidator).attempt(&parsed()).await.unwrap(),
            StageOutcome::rejected("no api key")
        );

        let mut empty = parsed();
        empty.original_free_text = String::new();
        assert_eq!(
            matcher(CannedValidator(Canned::Nothing)).attempt(&empty).await.unwrap(),
            StageOutcome::rejected("no original address")
        );

        assert_eq!(
            matcher(CannedValidator(Canned::Fails)).attempt(&parsed()).await.unwrap(),
            StageOutcome::rejected("api request error")
        );

        assert_eq!(
            matcher(CannedValidator(Canned::Nothing)).attempt(&parsed()).await.unwrap(),
            StageOutcome::rejected("no api result")
        );

        assert_eq!(
            matcher(CannedValidator(Canned::Found(normalized(""))))
                .attempt(&parsed())
                .await
                .unwrap(),
            StageOutcome::rejected("api returned but no match")
        );
    }
}
