// src/matching/mod.rs
pub mod api;
pub mod embedding;
pub mod exact;
pub mod fuzzy;
pub mod manager;
pub mod phonetic;
pub mod similarity;
pub mod structural;
pub mod waterfall;

use anyhow::Result;
use async_trait::async_trait;

use crate::models::address::ParsedAddress;
use crate::models::matching::{MatchType, StageOutcome};

/// One stage of the waterfall.
///
/// Soft failures (no candidates, low score, unit mismatch, validator trouble)
/// come back as `StageOutcome::Rejected`/`Skipped`. `Err` is reserved for
/// infrastructure failures such as a broken candidate store.
#[async_trait]
pub trait Matcher: Send + Sync {
    fn match_type(&self) -> MatchType;

    async fn attempt(&self, parsed: &ParsedAddress) -> Result<StageOutcome>;
}

pub use api::ApiMatcher;
pub use embedding::EmbeddingMatcher;
pub use exact::ExactMatcher;
pub use fuzzy::FuzzyMatcher;
pub use phonetic::PhoneticMatcher;
pub use waterfall::WaterfallMatcher;
