// src/models/address.rs
use serde::{Deserialize, Serialize};

/// Structured query address produced by the upstream parser.
///
/// Every textual field is trimmed and upper-cased. Absent components are the
/// empty string; an absent value and a blank value are the same thing here,
/// which is what the null-equivalence comparisons rely on.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ParsedAddress {
    pub street_number: String,
    pub pre_directional: String,
    pub street_name: String,
    pub street_type: String,
    pub post_directional: String,
    pub unit_type: String,
    pub unit_number: String,
    pub original_free_text: String,
    pub city: String,
    pub state: String,
    pub zip: String,
}

impl ParsedAddress {
    /// Re-applies the trim/upper-case normalization to every field.
    /// `original_free_text` is only trimmed so the validator sees it as typed.
    pub fn normalized(self) -> Self {
        Self {
            street_number: normalize_field(&self.street_number),
            pre_directional: normalize_field(&self.pre_directional),
            street_name: normalize_field(&self.street_name),
            street_type: normalize_field(&self.street_type),
            post_directional: normalize_field(&self.post_directional),
            unit_type: normalize_field(&self.unit_type),
            unit_number: normalize_field(&self.unit_number),
            original_free_text: self.original_free_text.trim().to_string(),
            city: normalize_field(&self.city),
            state: normalize_field(&self.state),
            zip: self.zip.trim().to_string(),
        }
    }

    /// The blocking key shared by every stage except the API stage.
    pub fn blocking_key(&self) -> Option<&str> {
        let key = self.street_number.trim();
        if key.is_empty() {
            None
        } else {
            Some(key)
        }
    }

    /// "N MAIN ST" style street string: directionals, name and type in order.
    pub fn full_street(&self) -> String {
        join_street_tokens(&[
            &self.pre_directional,
            &self.street_name,
            &self.street_type,
            &self.post_directional,
        ])
    }

    /// Structural fields used by the exact stage. Zip is not part of the
    /// exact comparison.
    pub fn structural_query(&self) -> StructuralQuery {
        StructuralQuery {
            house_number: self.street_number.clone(),
            pre_directional: self.pre_directional.clone(),
            street_name: self.street_name.clone(),
            street_type: self.street_type.clone(),
            post_directional: self.post_directional.clone(),
            unit_type: self.unit_type.clone(),
            unit_number: self.unit_number.clone(),
            zip: None,
        }
    }
}

/// One row of the canonical reference set.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CandidateAddress {
    pub id: String,
    pub house_number: String,
    pub pre_directional: String,
    pub street_name: String,
    pub street_type: String,
    pub post_directional: String,
    pub unit_type: String,
    pub unit_number: String,
    pub display_address: String,
    pub city: String,
    pub state: String,
    pub zip: String,
}

impl CandidateAddress {
    pub fn full_street(&self) -> String {
        join_street_tokens(&[
            &self.pre_directional,
            &self.street_name,
            &self.street_type,
            &self.post_directional,
        ])
    }
}

/// Field set for a structural (exact-style) lookup.
///
/// `zip` is `None` when the lookup does not constrain on zip at all.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StructuralQuery {
    pub house_number: String,
    pub pre_directional: String,
    pub street_name: String,
    pub street_type: String,
    pub post_directional: String,
    pub unit_type: String,
    pub unit_number: String,
    pub zip: Option<String>,
}

/// Joins the non-empty tokens with a single space, upper-cased.
pub fn join_street_tokens(tokens: &[&str]) -> String {
    tokens
        .iter()
        .map(|t| t.trim())
        .filter(|t| !t.is_empty())
        .collect::<Vec<_>>()
        .join(" ")
        .to_uppercase()
}

pub fn normalize_field(value: &str) -> String {
    value.trim().to_uppercase()
}
