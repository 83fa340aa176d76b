// src/embedding/hashing.rs
use anyhow::Result;

use crate::embedding::EmbeddingProvider;
use crate::utils::candle::l2_normalize_vec;

pub const DEFAULT_HASHING_DIMENSION: usize = 512;

const TOKEN_WEIGHT: f32 = 1.0;
const TRIGRAM_WEIGHT: f32 = 0.5;

/// Deterministic feature-hashing embedder over address tokens and character
/// trigrams. Street-type and directional abbreviations are expanded first so
/// "MAIN ST" and "MAIN STREET" land on the same features.
#[derive(Debug, Clone)]
pub struct HashingEmbedder {
    dimension: usize,
}

impl Default for HashingEmbedder {
    fn default() -> Self {
        Self::new(DEFAULT_HASHING_DIMENSION)
    }
}

impl HashingEmbedder {
    pub fn new(dimension: usize) -> Self {
        Self {
            dimension: dimension.max(1),
        }
    }

    fn add_feature(&self, vector: &mut [f32], feature: &str, weight: f32) {
        let hash = fnv1a(feature.as_bytes());
        let idx = (hash % self.dimension as u64) as usize;
        let sign = if hash >> 63 == 0 { 1.0 } else { -1.0 };
        vector[idx] += sign * weight;
    }
}

impl EmbeddingProvider for HashingEmbedder {
    fn encode(&self, text: &str) -> Result<Vec<f32>> {
        let mut vector = vec![0.0f32; self.dimension];
        for token in canonical_tokens(text) {
            self.add_feature(&mut vector, &format!("t:{}", token), TOKEN_WEIGHT);
            let padded: Vec<char> = format!(" {} ", token).chars().collect();
            for window in padded.windows(3) {
                let trigram: String = window.iter().collect();
                self.add_feature(&mut vector, &format!("g:{}", trigram), TRIGRAM_WEIGHT);
            }
        }
        l2_normalize_vec(vector)
    }

    fn dimension(&self) -> usize {
        self.dimension
    }

    fn model_version(&self) -> String {
        format!("hashing-trigram-{}", self.dimension)
    }
}

/// Upper-cased alphanumeric tokens with common USPS abbreviations expanded.
pub fn canonical_tokens(text: &str) -> Vec<String> {
    text.to_uppercase()
        .chars()
        .map(|c| if c.is_alphanumeric() { c } else { ' ' })
        .collect::<String>()
        .split_whitespace()
        .map(|token| expand_abbreviation(token).to_string())
        .collect()
}

fn expand_abbreviation(token: &str) -> &str {
    match token {
        "ST" | "STR" => "STREET",
        "RD" => "ROAD",
        "AVE" | "AV" => "AVENUE",
        "BLVD" | "BLV" => "BOULEVARD",
        "DR" => "DRIVE",
        "LN" => "LANE",
        "CT" => "COURT",
        "PL" => "PLACE",
        "SQ" => "SQUARE",
        "PKWY" => "PARKWAY",
        "CIR" => "CIRCLE",
        "HWY" => "HIGHWAY",
        "TER" => "TERRACE",
        "N" => "NORTH",
        "S" => "SOUTH",
        "E" => "EAST",
        "W" => "WEST",
        "NE" => "NORTHEAST",
        "NW" => "NORTHWEST",
        "SE" => "SOUTHEAST",
        "SW" => "SOUTHWEST",
        "APT" | "APARTMENT" => "UNIT",
        "STE" | "SUITE" => "UNIT",
        other => other,
    }
}

fn fnv1a(bytes: &[u8]) -> u64 {
    let mut hash: u64 = 0xcbf29ce484222325;
    for byte in bytes {
        hash ^= *byte as u64;
        hash = hash.wrapping_mul(0x100000001b3);
    }
    hash
}
