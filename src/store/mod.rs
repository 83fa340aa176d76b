// src/store/mod.rs
//! Read-only access to the canonical address set.

pub mod memory;
pub mod postgres;
pub mod transactions;

use anyhow::Result;
use async_trait::async_trait;
use log::info;
use std::sync::Arc;

use crate::matching::structural::matches_structure;
use crate::models::address::{CandidateAddress, StructuralQuery};
use crate::utils::db_connect::PgPool;
use crate::utils::matcher_config::{CandidateStoreMode, MatcherConfig};

pub use memory::InMemoryCandidateStore;
pub use postgres::PgCandidateStore;

/// Opens the canonical table in the configured mode.
pub async fn open_candidate_store(
    pool: &PgPool,
    config: &MatcherConfig,
) -> Result<Arc<dyn CandidateStore>> {
    let live = PgCandidateStore::new(pool.clone(), &config.candidate_table)?;
    match config.store_mode {
        CandidateStoreMode::Snapshot => Ok(Arc::new(live.load_snapshot().await?)),
        CandidateStoreMode::Live => {
            info!("🔌 Querying {} live for every lookup", config.candidate_table);
            Ok(Arc::new(live))
        }
    }
}

/// Candidate Store Adapter.
///
/// Implementations must be safe to share across concurrent matches; every
/// method only reads. Results of `find_by_house_number` come back in a stable
/// order so that "first best" tie-breaking is deterministic.
#[async_trait]
pub trait CandidateStore: Send + Sync {
    async fn find_by_house_number(&self, house_number: &str) -> Result<Vec<CandidateAddress>>;

    async fn find_by_id(&self, id: &str) -> Result<Option<CandidateAddress>>;

    /// First candidate structurally equal to `query` under null-equivalence.
    /// The default blocks on house number and compares client-side.
    async fn find_exact(&self, query: &StructuralQuery) -> Result<Option<CandidateAddress>> {
        if query.house_number.trim().is_empty() {
            return Ok(None);
        }
        let candidates = self.find_by_house_number(&query.house_number).await?;
        Ok(candidates
            .into_iter()
            .find(|candidate| matches_structure(query, candidate)))
    }
}
