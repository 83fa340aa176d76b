// src/utils/matcher_config.rs
//! Runtime configuration of the waterfall matcher, read from the environment.

use log::info;
use std::env;
use std::time::Duration;

use crate::embedding::EmbeddingConfig;
use crate::utils::env::env_or;

pub const DEFAULT_FUZZY_THRESHOLD: f64 = 70.0;
pub const DEFAULT_PHONETIC_THRESHOLD: f64 = 70.0;
pub const DEFAULT_EMBEDDING_THRESHOLD: f64 = 0.75;
pub const DEFAULT_API_TIMEOUT_SECONDS: u64 = 5;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CandidateStoreMode {
    /// Load the canonical table into memory once at startup.
    Snapshot,
    /// Query the database on every lookup.
    Live,
}

#[derive(Debug, Clone)]
pub struct MatcherConfig {
    /// 0-100 token sort similarity
    pub fuzzy_threshold: f64,
    /// 0-100 token set similarity
    pub phonetic_threshold: f64,
    /// cosine similarity
    pub embedding_threshold: f64,
    pub api_timeout: Duration,
    pub max_concurrent_matches: usize,
    pub candidate_table: String,
    pub store_mode: CandidateStoreMode,
    pub embedding: EmbeddingConfig,
}

impl Default for MatcherConfig {
    fn default() -> Self {
        Self {
            fuzzy_threshold: DEFAULT_FUZZY_THRESHOLD,
            phonetic_threshold: DEFAULT_PHONETIC_THRESHOLD,
            embedding_threshold: DEFAULT_EMBEDDING_THRESHOLD,
            api_timeout: Duration::from_secs(DEFAULT_API_TIMEOUT_SECONDS),
            max_concurrent_matches: num_cpus::get() * 2,
            candidate_table: "raw_addresses".to_string(),
            store_mode: CandidateStoreMode::Snapshot,
            embedding: EmbeddingConfig::default(),
        }
    }
}

impl MatcherConfig {
    pub fn from_env() -> Self {
        let defaults = Self::default();
        let store_mode = match env::var("CANDIDATE_STORE_MODE")
            .unwrap_or_default()
            .trim()
            .to_lowercase()
            .as_str()
        {
            "live" => CandidateStoreMode::Live,
            _ => CandidateStoreMode::Snapshot,
        };

        Self {
            fuzzy_threshold: env_or("FUZZY_THRESHOLD", defaults.fuzzy_threshold),
            phonetic_threshold: env_or("PHONETIC_THRESHOLD", defaults.phonetic_threshold),
            embedding_threshold: env_or("EMBEDDING_THRESHOLD", defaults.embedding_threshold),
            api_timeout: Duration::from_secs(env_or(
                "API_TIMEOUT_SECONDS",
                DEFAULT_API_TIMEOUT_SECONDS,
            )),
            max_concurrent_matches: env_or("MATCH_CONCURRENCY", defaults.max_concurrent_matches)
                .max(1),
            candidate_table: env::var("CANDIDATE_TABLE")
                .ok()
                .filter(|t| is_valid_table_name(t))
                .unwrap_or(defaults.candidate_table),
            store_mode,
            embedding: EmbeddingConfig::from_env(),
        }
    }

    pub fn log_config(&self) {
        info!("⚙️  Matcher configuration:");
        info!("   • fuzzy threshold: {}", self.fuzzy_threshold);
        info!("   • phonetic threshold: {}", self.phonetic_threshold);
        info!("   • embedding threshold: {}", self.embedding_threshold);
        info!("   • api timeout: {:?}", self.api_timeout);
        info!("   • max simultaneous matches: {}", self.max_concurrent_matches);
        info!(
            "   • candidate table: {} ({:?})",
            self.candidate_table, self.store_mode
        );
        self.embedding.log_config();
    }
}

/// Table names are interpolated into SQL, so only `schema.table` identifiers pass.
pub fn is_valid_table_name(name: &str) -> bool {
    let parts: Vec<&str> = name.split('.').collect();
    !name.is_empty()
        && parts.len() <= 2
        && parts.iter().all(|p| {
            !p.is_empty()
                && p.chars().all(|c| c.is_ascii_alphanumeric() || c == '_')
                && !p.starts_with(|c: char| c.is_ascii_digit())
        })
}
