// src/validator/geocodio.rs
use async_trait::async_trait;
use log::{debug, warn};
use reqwest::Client;
use serde::Deserialize;
use std::env;
use std::time::Duration;

use crate::validator::{AddressValidator, NormalizedResult, ValidatorError};

pub const DEFAULT_GEOCODIO_URL: &str = "https://api.geocod.io/v1.7/geocode";

#[derive(Debug, Deserialize)]
struct GeocodeResponse {
    #[serde(default)]
    results: Vec<GeocodeResult>,
}

#[derive(Debug, Deserialize)]
struct GeocodeResult {
    #[serde(default)]
    address_components: AddressComponents,
    #[serde(default)]
    accuracy: f64,
}

#[derive(Debug, Default, Deserialize)]
struct AddressComponents {
    number: Option<String>,
    predirectional: Option<String>,
    street: Option<String>,
    suffix: Option<String>,
    postdirectional: Option<String>,
    secondaryunit: Option<String>,
    secondarynumber: Option<String>,
    zip: Option<String>,
}

impl From<GeocodeResult> for NormalizedResult {
    fn from(result: GeocodeResult) -> Self {
        let c = result.address_components;
        let field = |v: Option<String>| v.unwrap_or_default().trim().to_uppercase();
        Self {
            house_number: field(c.number),
            pre_directional: field(c.predirectional),
            street_name: field(c.street),
            street_type: field(c.suffix),
            post_directional: field(c.postdirectional),
            unit_type: field(c.secondaryunit),
            unit_number: field(c.secondarynumber),
            zip: c.zip.unwrap_or_default().trim().to_string(),
            accuracy: result.accuracy.clamp(0.0, 1.0),
        }
    }
}

/// Geocodio geocoding API client.
#[derive(Clone)]
pub struct GeocodioValidator {
    client: Client,
    api_key: Option<String>,
    url: String,
}

impl GeocodioValidator {
    pub fn new(api_key: Option<String>, url: impl Into<String>) -> Self {
        Self {
            client: Client::new(),
            api_key: api_key.filter(|k| !k.trim().is_empty()),
            url: url.into(),
        }
    }

    /// Reads `GEOCODIO_API_KEY` and `GEOCODIO_URL`. A missing key yields an
    /// unconfigured client rather than an error.
    pub fn from_env() -> Self {
        let api_key = env::var("GEOCODIO_API_KEY").ok();
        let url = env::var("GEOCODIO_URL").unwrap_or_else(|_| DEFAULT_GEOCODIO_URL.to_string());
        if api_key.as_deref().map_or(true, |k| k.trim().is_empty()) {
            warn!("GEOCODIO_API_KEY not set; API fallback stage will report 'no api key'");
        }
        Self::new(api_key, url)
    }

    async fn request(
        &self,
        api_key: &str,
        free_text: &str,
        timeout: Duration,
    ) -> Result<Option<NormalizedResult>, ValidatorError> {
        let response = self
            .client
            .get(&self.url)
            .query(&[("q", free_text), ("api_key", api_key)])
            .timeout(timeout)
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    ValidatorError::Timeout(timeout)
                } else {
                    ValidatorError::Request(e.to_string())
                }
            })?;

        if !response.status().is_success() {
            return Err(ValidatorError::Status(response.status().as_u16()));
        }

        let body: GeocodeResponse = response
            .json()
            .await
            .map_err(|e| ValidatorError::Decode(e.to_string()))?;
        debug!("Geocodio returned {} results", body.results.len());
        Ok(body.results.into_iter().next().map(NormalizedResult::from))
    }
}

#[async_trait]
impl AddressValidator for GeocodioValidator {
    fn is_configured(&self) -> bool {
        self.api_key.is_some()
    }

    async fn normalize(
        &self,
        free_text: &str,
        timeout: Duration,
    ) -> Result<Option<NormalizedResult>, ValidatorError> {
        let api_key = self.api_key.as_deref().ok_or(ValidatorError::NotConfigured)?;
        // The reqwest timeout covers the transfer; this one covers everything else.
        match tokio::time::timeout(timeout, self.request(api_key, free_text, timeout)).await {
            Ok(result) => result,
            Err(_) => Err(ValidatorError::Timeout(timeout)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_geocodio_response_conversion() {
        let json = r#"{
            "input": {"formatted_address": "123 n main st, Brooklyn, NY"},
            "results": [{
                "address_components": {
                    "number": "123",
                    "predirectional": "n",
                    "street": "Main",
                    "suffix": "St",
                    "secondaryunit": "Apt",
                    "secondarynumber": "4b",
                    "zip": "11211"
                },
                "accuracy": 0.93
            }, {
                "address_components": {"number": "125"},
                "accuracy": 0.4
            }]
        }"#;
        let response: GeocodeResponse = serde_json::from_str(json).unwrap();
        let top: NormalizedResult = response.results.into_iter().next().unwrap().into();
        assert_eq!(top.house_number, "123");
        assert_eq!(top.pre_directional, "N");
        assert_eq!(top.street_name, "MAIN");
        assert_eq!(top.street_type, "ST");
        assert_eq!(top.post_directional, "");
        assert_eq!(top.unit_type, "APT");
        assert_eq!(top.unit_number, "4B");
        assert_eq!(top.zip, "11211");
        assert!((top.accuracy - 0.93).abs() < 1e-9);
    }

    #[test]
    fn test_empty_results_deserialize() {
        let response: GeocodeResponse = serde_json::from_str(r#"{"results": []}"#).unwrap();
        assert!(response.results.is_empty());
        let response: GeocodeResponse = serde_json::from_str("{}").unwrap();
        assert!(response.results.is_empty());
    }

    #[tokio::test]
    async fn test_unconfigured_client() {
        let validator = GeocodioValidator::new(Some("  ".into()), DEFAULT_GEOCODIO_URL);
        assert!(!validator.is_configured());
        let result = validator.normalize("1 MAIN ST", Duration::from_secs(1)).await;
        assert!(matches!(result, Err(ValidatorError::NotConfigured)));
    }

    #[tokio::test]
    async fn test_transport_failure_is_an_error_not_a_panic() {
        let validator = GeocodioValidator::new(Some("key".into()), "http://127.0.0.1:1/geocode");
        let result = validator.normalize("1 MAIN ST", Duration::from_secs(2)).await;
        assert!(matches!(
            result,
            Err(ValidatorError::Request(_)) | Err(ValidatorError::Timeout(_))
        ));
    }
}
