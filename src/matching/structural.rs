// src/matching/structural.rs
use crate::models::address::{CandidateAddress, StructuralQuery};

/// Equal bytes, or both sides blank.
pub fn null_equivalent(a: &str, b: &str) -> bool {
    let (a, b) = (a.trim(), b.trim());
    a == b || (a.is_empty() && b.is_empty())
}

/// Unit type and number compared as one pair.
pub fn unit_pair_matches(
    query_type: &str,
    query_number: &str,
    candidate_type: &str,
    candidate_number: &str,
) -> bool {
    null_equivalent(query_type, candidate_type) && null_equivalent(query_number, candidate_number)
}

/// Structural equality used by the exact and API stages.
pub fn matches_structure(query: &StructuralQuery, candidate: &CandidateAddress) -> bool {
    null_equivalent(&query.house_number, &candidate.house_number)
        && null_equivalent(&query.street_name, &candidate.street_name)
        && null_equivalent(&query.street_type, &candidate.street_type)
        && null_equivalent(&query.pre_directional, &candidate.pre_directional)
        && null_equivalent(&query.post_directional, &candidate.post_directional)
        && unit_pair_matches(
            &query.unit_type,
            &query.unit_number,
            &candidate.unit_type,
            &candidate.unit_number,
        )
        && query
            .zip
            .as_deref()
            .map_or(true, |zip| null_equivalent(zip, &candidate.zip))
}
