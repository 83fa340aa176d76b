// src/store/memory.rs
use anyhow::Result;
use async_trait::async_trait;
use std::collections::HashMap;

use crate::models::address::CandidateAddress;
use crate::store::CandidateStore;

/// Immutable in-memory snapshot of the canonical address set.
///
/// Candidates sharing a house number keep their load order.
#[derive(Debug, Default, Clone)]
pub struct InMemoryCandidateStore {
    candidates: Vec<CandidateAddress>,
    by_house: HashMap<String, Vec<usize>>,
    by_id: HashMap<String, usize>,
}

impl InMemoryCandidateStore {
    pub fn new(candidates: Vec<CandidateAddress>) -> Self {
        let mut by_house: HashMap<String, Vec<usize>> = HashMap::new();
        let mut by_id = HashMap::new();
        for (idx, candidate) in candidates.iter().enumerate() {
            by_house
                .entry(candidate.house_number.clone())
                .or_default()
                .push(idx);
            // First row wins for duplicated ids.
            by_id.entry(candidate.id.clone()).or_insert(idx);
        }
        Self {
            candidates,
            by_house,
            by_id,
        }
    }

    pub fn len(&self) -> usize {
        self.candidates.len()
    }

    pub fn is_empty(&self) -> bool {
        self.candidates.is_empty()
    }

    pub fn house_numbers(&self) -> usize {
        self.by_house.len()
    }
}

#[async_trait]
impl CandidateStore for InMemoryCandidateStore {
    async fn find_by_house_number(&self, house_number: &str) -> Result<Vec<CandidateAddress>> {
        Ok(self
            .by_house
            .get(house_number)
            .map(|indices| {
                indices
                    .iter()
                    .map(|&idx| self.candidates[idx].clone())
                    .collect()
            })
            .unwrap_or_default())
    }

    async fn find_by_id(&self, id: &str) -> Result<Option<CandidateAddress>> {
        Ok(self.by_id.get(id).map(|&idx| self.candidates[idx].clone()))
    }
}
