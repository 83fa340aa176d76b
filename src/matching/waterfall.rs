// src/matching/waterfall.rs - Ordered fallthrough over the matching stages
use anyhow::Result;
use log::debug;
use std::sync::Arc;

use crate::embedding::SharedEmbedder;
use crate::matching::{
    ApiMatcher, EmbeddingMatcher, ExactMatcher, FuzzyMatcher, Matcher, PhoneticMatcher,
};
use crate::models::address::ParsedAddress;
use crate::models::matching::{MatchResult, MatchType, StageMatch, StageOutcome, StageTrace};
use crate::store::CandidateStore;
use crate::utils::matcher_config::MatcherConfig;
use crate::validator::AddressValidator;

/// Position of a single transaction in the waterfall.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WaterfallState {
    Start,
    Exact,
    Fuzzy,
    Phonetic,
    Embedding,
    Api,
    Matched,
    Unmatched,
}

impl WaterfallState {
    /// The stage run in this state, if any.
    pub fn stage(self) -> Option<MatchType> {
        match self {
            WaterfallState::Exact => Some(MatchType::Exact),
            WaterfallState::Fuzzy => Some(MatchType::Fuzzy),
            WaterfallState::Phonetic => Some(MatchType::Phonetic),
            WaterfallState::Embedding => Some(MatchType::Embedding),
            WaterfallState::Api => Some(MatchType::Api),
            WaterfallState::Start | WaterfallState::Matched | WaterfallState::Unmatched => None,
        }
    }

    /// Next state when the current stage produces no match.
    pub fn on_failure(self) -> WaterfallState {
        match self {
            WaterfallState::Start => WaterfallState::Exact,
            WaterfallState::Exact => WaterfallState::Fuzzy,
            WaterfallState::Fuzzy => WaterfallState::Phonetic,
            WaterfallState::Phonetic => WaterfallState::Embedding,
            WaterfallState::Embedding => WaterfallState::Api,
            WaterfallState::Api | WaterfallState::Unmatched => WaterfallState::Unmatched,
            WaterfallState::Matched => WaterfallState::Matched,
        }
    }

    pub fn is_terminal(self) -> bool {
        matches!(self, WaterfallState::Matched | WaterfallState::Unmatched)
    }
}

/// Runs Exact → Fuzzy → Phonetic → Embedding → API for one address and stops
/// at the first stage that accepts a candidate.
pub struct WaterfallMatcher {
    store: Arc<dyn CandidateStore>,
    stages: Vec<Arc<dyn Matcher>>,
}

impl WaterfallMatcher {
    pub fn new(
        store: Arc<dyn CandidateStore>,
        embedder: Arc<SharedEmbedder>,
        validator: Arc<dyn AddressValidator>,
        config: &MatcherConfig,
    ) -> Self {
        let stages: Vec<Arc<dyn Matcher>> = vec![
            Arc::new(ExactMatcher::new(store.clone())),
            Arc::new(FuzzyMatcher::new(store.clone(), config.fuzzy_threshold)),
            Arc::new(PhoneticMatcher::new(store.clone(), config.phonetic_threshold)),
            Arc::new(EmbeddingMatcher::new(
                store.clone(),
                embedder,
                config.embedding_threshold,
            )),
            Arc::new(ApiMatcher::new(store.clone(), validator, config.api_timeout)),
        ];
        Self::with_stages(store, stages)
    }

    /// Uses the given stage implementations; a stage type without an
    /// implementation is recorded as skipped.
    pub fn with_stages(store: Arc<dyn CandidateStore>, stages: Vec<Arc<dyn Matcher>>) -> Self {
        Self { store, stages }
    }

    fn matcher_for(&self, match_type: MatchType) -> Option<&Arc<dyn Matcher>> {
        self.stages.iter().find(|m| m.match_type() == match_type)
    }

    /// Matches one parsed address. Stage soft failures never surface as
    /// errors; only store failures do.
    pub async fn match_address(
        &self,
        transaction_id: &str,
        parsed: &ParsedAddress,
    ) -> Result<MatchResult> {
        let parsed = parsed.clone().normalized();
        let mut trail: Vec<StageTrace> = Vec::new();
        let mut last_reason = String::from("no stage ran");
        let mut accepted: Option<(MatchType, StageMatch)> = None;
        let mut state = WaterfallState::Start.on_failure();

        while !state.is_terminal() {
            let stage = match state.stage() {
                Some(stage) => stage,
                None => {
                    state = state.on_failure();
                    continue;
                }
            };
            let outcome = match self.matcher_for(stage) {
                Some(matcher) => matcher.attempt(&parsed).await?,
                None => StageOutcome::skipped("stage disabled"),
            };
            trail.push(StageTrace {
                stage,
                outcome: outcome.label().to_string(),
                reason: outcome.reason().to_string(),
            });

            match outcome {
                StageOutcome::Matched(found) => {
                    accepted = Some((stage, found));
                    state = WaterfallState::Matched;
                }
                other => {
                    last_reason = other.reason().to_string();
                    state = state.on_failure();
                }
            }
        }

        let result = match accepted {
            Some((match_type, found)) => {
                let display = self
                    .store
                    .find_by_id(&found.candidate_id)
                    .await?
                    .map(|c| c.display_address);
                MatchResult {
                    transaction_id: transaction_id.to_string(),
                    confidence: found.confidence(),
                    candidate_id: Some(found.candidate_id),
                    matched_display_address: display,
                    match_type,
                    reason: found.reason,
                    stage_trail: trail,
                }
            }
            None => MatchResult {
                transaction_id: transaction_id.to_string(),
                candidate_id: None,
                matched_display_address: None,
                confidence: 0.0,
                match_type: MatchType::Unmatched,
                reason: last_reason,
                stage_trail: trail,
            },
        };
        debug!(
            "Transaction {} -> {} ({}, confidence {:.2})",
            result.transaction_id, result.match_type, result.reason, result.confidence
        );
        Ok(result)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::embedding::{EmbeddingProvider, HashingEmbedder};
    use crate::models::address::CandidateAddress;
    use crate::store::InMemoryCandidateStore;
    use crate::validator::DisabledValidator;
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn candidate(
        id: &str,
        street: &str,
        street_type: &str,
        unit: &str,
        display: &str,
    ) -> CandidateAddress {
        CandidateAddress {
            id: id.into(),
            house_number: "123".into(),
            street_name: street.into(),
            street_type: street_type.into(),
            unit_type: if unit.is_empty() { String::new() } else { "APT".into() },
            unit_number: unit.into(),
            display_address: display.into(),
            ..Default::default()
        }
    }

    fn parsed(street: &str, street_type: &str, unit: &str) -> ParsedAddress {
        ParsedAddress {
            street_number: "123".into(),
            street_name: street.into(),
            street_type: street_type.into(),
            unit_type: if unit.is_empty() { String::new() } else { "APT".into() },
            unit_number: unit.into(),
            ..Default::default()
        }
    }

    fn waterfall_with(
        candidates: Vec<CandidateAddress>,
        provider: Arc<dyn EmbeddingProvider>,
        config: &MatcherConfig,
    ) -> WaterfallMatcher {
        let store: Arc<dyn CandidateStore> = Arc::new(InMemoryCandidateStore::new(candidates));
        WaterfallMatcher::new(
            store,
            Arc::new(SharedEmbedder::new(provider, 2)),
            Arc::new(DisabledValidator),
            config,
        )
    }

    fn waterfall(candidates: Vec<CandidateAddress>) -> WaterfallMatcher {
        waterfall_with(
            candidates,
            Arc::new(HashingEmbedder::default()),
            &MatcherConfig::default(),
        )
    }

    fn stages(result: &MatchResult) -> Vec<MatchType> {
        result.stage_trail.iter().map(|t| t.stage).collect()
    }

    #[test]
    fn test_state_transitions() {
        let mut state = WaterfallState::Start;
        let mut visited = Vec::new();
        while !state.is_terminal() {
            state = state.on_failure();
            if let Some(stage) = state.stage() {
                visited.push(stage);
            }
        }
        assert_eq!(state, WaterfallState::Unmatched);
        assert_eq!(
            visited,
            vec![
                MatchType::Exact,
                MatchType::Fuzzy,
                MatchType::Phonetic,
                MatchType::Embedding,
                MatchType::Api
            ]
        );
        assert_eq!(WaterfallState::Matched.on_failure(), WaterfallState::Matched);
    }

    #[tokio::test]
    async fn test_identical_address_is_exact() {
        let mut c = candidate("A1", "MAIN", "ST", "", "123 N MAIN ST");
        c.pre_directional = "N".into();
        let w = waterfall(vec![c]);
        let mut p = parsed("main", "st", "");
        p.pre_directional = "n".into();

        let result = w.match_address("t1", &p).await.unwrap();
        assert_eq!(result.match_type, MatchType::Exact);
        assert_eq!(result.confidence, 1.0);
        assert_eq!(result.candidate_id.as_deref(), Some("A1"));
        assert_eq!(result.matched_display_address.as_deref(), Some("123 N MAIN ST"));
        assert_eq!(stages(&result), vec![MatchType::Exact]);
    }

    #[tokio::test]
    async fn test_street_suffix_spelled_out_is_fuzzy() {
        let w = waterfall(vec![candidate("A1", "MAIN", "ST", "", "123 MAIN ST")]);
        let result = w
            .match_address("t2", &parsed("MAIN", "STREET", ""))
            .await
            .unwrap();
        assert_eq!(result.match_type, MatchType::Fuzzy);
        assert!(result.confidence >= 0.70);
        assert_eq!(result.reason, "fuzzy match");
        assert_eq!(stages(&result), vec![MatchType::Exact, MatchType::Fuzzy]);
    }

    #[tokio::test]
    async fn test_sound_alike_street_is_phonetic() {
        // Raise the fuzzy bar so SMITH/SMYTH (80) falls through to the phonetic stage.
        let config = MatcherConfig {
            fuzzy_threshold: 90.0,
            ..MatcherConfig::default()
        };
        let w = waterfall_with(
            vec![candidate("A1", "SMYTH", "ST", "", "SMYTH ST")],
            Arc::new(HashingEmbedder::default()),
            &config,
        );
        let result = w.match_address("t3", &parsed("SMITH", "ST", "")).await.unwrap();
        assert_eq!(result.match_type, MatchType::Phonetic);
        assert_eq!(result.candidate_id.as_deref(), Some("A1"));
        assert!((result.confidence - 0.875).abs() < 1e-9);
    }

    #[tokio::test]
    async fn test_fuzzy_unit_gate_falls_through_to_phonetic() {
        let w = waterfall(vec![
            candidate("A", "SMITH", "ST", "4A", "123 SMITH ST APT 4A"),
            candidate("B", "SMITH", "ST", "4B", "123 SMITH ST APT 4B"),
        ]);
        let mut p = parsed("SMITH", "ST", "4B");
        // Unit type differs from both candidates, so Exact cannot hit.
        p.unit_type = "UNIT".into();

        let result = w.match_address("t6", &p).await.unwrap();
        assert_eq!(result.match_type, MatchType::Phonetic);
        assert_eq!(result.candidate_id.as_deref(), Some("B"));
        assert_eq!(result.stage_trail[1].reason, "fuzzy unit mismatch");
        assert_eq!(result.stage_trail[1].outcome, "rejected");
    }

    /// Paraphrase-aware provider: "BROADWAY" and "123 BWAY" mean the same place.
    struct ParaphraseProvider;

    impl EmbeddingProvider for ParaphraseProvider {
        fn encode(&self, text: &str) -> Result<Vec<f32>> {
            Ok(match text {
                "BROADWAY" | "123 BWAY" => vec![1.0, 0.0, 0.0],
                _ => vec![0.0, 1.0, 0.0],
            })
        }

        fn dimension(&self) -> usize {
            3
        }

        fn model_version(&self) -> String {
            "paraphrase".into()
        }
    }

    #[tokio::test]
    async fn test_semantic_equivalent_is_embedding() {
        let w = waterfall_with(
            vec![candidate("A1", "BWAY", "", "", "123 BWAY")],
            Arc::new(ParaphraseProvider),
            &MatcherConfig::default(),
        );
        let result = w.match_address("t4", &parsed("BROADWAY", "", "")).await.unwrap();
        assert_eq!(result.match_type, MatchType::Embedding);
        assert!(result.confidence > 0.99);
        assert_eq!(stages(&result).len(), 4);
    }

    #[tokio::test]
    async fn test_unresolvable_without_api_key_is_unmatched() {
        let w = waterfall(vec![candidate("A1", "ELM", "AVE", "", "123 ELM AVE")]);
        let result = w
            .match_address("t5", &parsed("PACIFIC", "HWY", ""))
            .await
            .unwrap();
        assert_eq!(result.match_type, MatchType::Unmatched);
        assert_eq!(result.reason, "no api key");
        assert_eq!(result.confidence, 0.0);
        assert!(result.candidate_id.is_none());
        assert_eq!(stages(&result).len(), 5);
    }

    #[tokio::test]
    async fn test_missing_house_number_only_reaches_api() {
        let w = waterfall(vec![candidate("A1", "MAIN", "ST", "", "123 MAIN ST")]);
        let mut p = parsed("MAIN", "ST", "");
        p.street_number = String::new();
        let result = w.match_address("t7", &p).await.unwrap();
        assert_eq!(result.match_type, MatchType::Unmatched);
        let skipped = result
            .stage_trail
            .iter()
            .filter(|t| t.outcome == "skipped")
            .count();
        assert_eq!(skipped, 4);
    }

    struct CountingStage {
        match_type: MatchType,
        calls: Arc<AtomicUsize>,
        outcome: StageOutcome,
    }

    #[async_trait]
    impl Matcher for CountingStage {
        fn match_type(&self) -> MatchType {
            self.match_type
        }

        async fn attempt(&self, _parsed: &ParsedAddress) -> Result<StageOutcome> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Ok(self.outcome.clone())
        }
    }

    #[tokio::test]
    async fn test_later_stages_never_run_after_a_match() {
        let calls = Arc::new(AtomicUsize::new(0));
        let store: Arc<dyn CandidateStore> = Arc::new(InMemoryCandidateStore::new(vec![
            candidate("A1", "MAIN", "ST", "", "123 MAIN ST"),
        ]));
        let stages: Vec<Arc<dyn Matcher>> = vec![
            Arc::new(CountingStage {
                match_type: MatchType::Exact,
                calls: calls.clone(),
                outcome: StageOutcome::rejected("no exact match"),
            }),
            Arc::new(CountingStage {
                match_type: MatchType::Fuzzy,
                calls: calls.clone(),
                outcome: StageOutcome::Matched(StageMatch::new(
                    "A1",
                    88.0,
                    crate::models::matching::ScoreScale::Percent,
                    "fuzzy match",
                )),
            }),
            Arc::new(CountingStage {
                match_type: MatchType::Phonetic,
                calls: calls.clone(),
                outcome: StageOutcome::rejected("unreachable"),
            }),
        ];
        let w = WaterfallMatcher::with_stages(store, stages);
        let result = w.match_address("t8", &parsed("MAIN", "ST", "")).await.unwrap();
        assert_eq!(result.match_type, MatchType::Fuzzy);
        assert!((result.confidence - 0.88).abs() < 1e-9);
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }
}
