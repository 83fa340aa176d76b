// src/matching/similarity.rs
//! Token-based string similarity on a 0-100 scale.
//!
//! All scores derive from the Indel distance (insertions and deletions only),
//! normalized by the combined length.

use rapidfuzz::distance::indel;
use rapidfuzz::fuzz;
use std::collections::BTreeSet;

pub fn indel_distance(a: &str, b: &str) -> usize {
    indel::distance(a.chars(), b.chars())
}

fn normalized_score(distance: usize, length_sum: usize) -> f64 {
    if length_sum == 0 {
        return 100.0;
    }
    100.0 - 100.0 * distance as f64 / length_sum as f64
}

/// Normalized Indel similarity of two strings.
pub fn ratio(a: &str, b: &str) -> f64 {
    if a.is_empty() && b.is_empty() {
        return 100.0;
    }
    fuzz::ratio(a.chars(), b.chars()) * 100.0
}

/// Ratio of the whitespace tokens of each side, sorted. Word order does not matter.
pub fn token_sort_ratio(a: &str, b: &str) -> f64 {
    ratio(&sorted_tokens(a), &sorted_tokens(b))
}

fn sorted_tokens(s: &str) -> String {
    let mut tokens: Vec<&str> = s.split_whitespace().collect();
    tokens.sort_unstable();
    tokens.join(" ")
}

/// Similarity of the token sets: shared tokens count fully, so a string whose
/// tokens are a subset of the other's scores 100.
pub fn token_set_ratio(a: &str, b: &str) -> f64 {
    let tokens_a: BTreeSet<&str> = a.split_whitespace().collect();
    let tokens_b: BTreeSet<&str> = b.split_whitespace().collect();
    if tokens_a.is_empty() || tokens_b.is_empty() {
        return 0.0;
    }

    let intersection: Vec<&str> = tokens_a.intersection(&tokens_b).copied().collect();
    let diff_ab: Vec<&str> = tokens_a.difference(&tokens_b).copied().collect();
    let diff_ba: Vec<&str> = tokens_b.difference(&tokens_a).copied().collect();

    if !intersection.is_empty() && (diff_ab.is_empty() || diff_ba.is_empty()) {
        return 100.0;
    }

    let diff_ab_joined = diff_ab.join(" ");
    let diff_ba_joined = diff_ba.join(" ");
    let ab_len = diff_ab_joined.chars().count();
    let ba_len = diff_ba_joined.chars().count();
    let sect_len = intersection.join(" ").chars().count();

    // Lengths of "sect + ' ' + diff", the separator only present with a non-empty sect.
    let separator = usize::from(sect_len != 0);
    let sect_ab_len = sect_len + separator + ab_len;
    let sect_ba_len = sect_len + separator + ba_len;

    let diff_score = normalized_score(
        indel_distance(&diff_ab_joined, &diff_ba_joined),
        sect_ab_len + sect_ba_len,
    );
    if sect_len == 0 {
        return diff_score;
    }

    let sect_ab_score = normalized_score(separator + ab_len, sect_len + sect_ab_len);
    let sect_ba_score = normalized_score(separator + ba_len, sect_len + sect_ba_len);
    diff_score.max(sect_ab_score).max(sect_ba_score)
}
