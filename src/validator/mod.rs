// src/validator/mod.rs
//! External address validation used by the last waterfall stage.

pub mod geocodio;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use thiserror::Error;

use crate::models::address::{normalize_field, StructuralQuery};

pub use geocodio::GeocodioValidator;

/// Top normalized result returned by a validator.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct NormalizedResult {
    pub house_number: String,
    pub pre_directional: String,
    pub street_name: String,
    pub street_type: String,
    pub post_directional: String,
    pub unit_type: String,
    pub unit_number: String,
    pub zip: String,
    /// Validator's own accuracy, 0-1.
    pub accuracy: f64,
}

impl NormalizedResult {
    /// Structural lookup built from the validator's components, constrained on zip.
    pub fn structural_query(&self) -> StructuralQuery {
        StructuralQuery {
            house_number: normalize_field(&self.house_number),
            pre_directional: normalize_field(&self.pre_directional),
            street_name: normalize_field(&self.street_name),
            street_type: normalize_field(&self.street_type),
            post_directional: normalize_field(&self.post_directional),
            unit_type: normalize_field(&self.unit_type),
            unit_number: normalize_field(&self.unit_number),
            zip: Some(self.zip.trim().to_string()),
        }
    }
}

#[derive(Debug, Error)]
pub enum ValidatorError {
    #[error("validator is not configured")]
    NotConfigured,
    #[error("validator request timed out after {0:?}")]
    Timeout(Duration),
    #[error("validator request failed: {0}")]
    Request(String),
    #[error("validator returned HTTP status {0}")]
    Status(u16),
    #[error("could not decode validator response: {0}")]
    Decode(String),
}

/// External Validator Client.
///
/// `Ok(None)` means the validator answered but found nothing.
#[async_trait]
pub trait AddressValidator: Send + Sync {
    fn is_configured(&self) -> bool;

    async fn normalize(
        &self,
        free_text: &str,
        timeout: Duration,
    ) -> Result<Option<NormalizedResult>, ValidatorError>;
}

/// Validator used when no credential is available.
#[derive(Debug, Default, Clone, Copy)]
pub struct DisabledValidator;

#[async_trait]
impl AddressValidator for DisabledValidator {
    fn is_configured(&self) -> bool {
        false
    }

    async fn normalize(
        &self,
        _free_text: &str,
        _timeout: Duration,
    ) -> Result<Option<NormalizedResult>, ValidatorError> {
        Err(ValidatorError::NotConfigured)
    }
}
