/// Upstream feature feed client.
///
/// The feed is an ArcGIS `MapServer/.../query` endpoint returning an
/// Esri JSON feature set:
///
///   { "features": [ { "attributes": { "objectid": 1, "adresse": "..." },
///                     "geometry":   { "x": 6.95, "y": 50.94 } } ] }
///
/// Only the envelope is validated here. Individual features are decoded
/// leniently into `RawFeature`s so that one malformed record can never
/// take the whole batch down; judging them is the transformer's job.

use serde::Deserialize;
use serde_json::{Map, Value};
use std::time::Duration;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum SourceError {
    /// Network failure, timeout, or non-success HTTP status.
    #[error("upstream feed unavailable: {0}")]
    UpstreamUnavailable(String),
    /// Response body is not an envelope with a `features` sequence.
    #[error("malformed upstream payload: {0}")]
    MalformedPayload(String),
}

/// One upstream record as received: attributes plus optional x/y geometry.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RawFeature {
    pub attributes: Map<String, Value>,
    pub geometry: Option<RawGeometry>,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct RawGeometry {
    pub x: Option<Value>,
    pub y: Option<Value>,
}

impl RawFeature {
    /// Case-insensitive attribute lookup (`objectid` vs `OBJECTID`).
    pub fn attribute(&self, name: &str) -> Option<&Value> {
        self.attributes.get(name).or_else(|| {
            self.attributes
                .iter()
                .find(|(key, _)| key.eq_ignore_ascii_case(name))
                .map(|(_, value)| value)
        })
    }

    fn from_value(value: Value) -> Self {
        let Value::Object(mut obj) = value else {
            return RawFeature::default();
        };

        let attributes = match obj.remove("attributes") {
            Some(Value::Object(map)) => map,
            _ => Map::new(),
        };

        let geometry = match obj.remove("geometry") {
            Some(Value::Object(mut geom)) => Some(RawGeometry {
                x: geom.remove("x"),
                y: geom.remove("y"),
            }),
            _ => None,
        };

        RawFeature { attributes, geometry }
    }
}

// ---------------------------------------------------------------------------
// Envelope decoding
// ---------------------------------------------------------------------------

#[derive(Deserialize)]
struct FeatureEnvelope {
    features: Option<Vec<Value>>,
    error: Option<ArcGisError>,
}

/// ArcGIS reports query failures in the body, usually with HTTP 200.
#[derive(Deserialize)]
struct ArcGisError {
    code: Option<i64>,
    message: Option<String>,
}

/// Decodes a response body into raw features.
///
/// # Errors
/// `SourceError::MalformedPayload` when the body is not JSON, carries an
/// ArcGIS error object, or lacks a `features` array.
pub fn parse_feature_collection(body: &str) -> Result<Vec<RawFeature>, SourceError> {
    let envelope: FeatureEnvelope = serde_json::from_str(body)
        .map_err(|e| SourceError::MalformedPayload(format!("JSON deserialization failed: {}", e)))?;

    if let Some(err) = envelope.error {
        return Err(SourceError::MalformedPayload(format!(
            "upstream reported error {}: {}",
            err.code.map(|c| c.to_string()).unwrap_or_else(|| "?".to_string()),
            err.message.unwrap_or_else(|| "no message".to_string()),
        )));
    }

    let features = envelope
        .features
        .ok_or_else(|| SourceError::MalformedPayload("missing `features` array".to_string()))?;

    Ok(features.into_iter().map(RawFeature::from_value).collect())
}

// ---------------------------------------------------------------------------
// Sources
// ---------------------------------------------------------------------------

/// Anything that can produce one batch of raw features per call.
/// Implementations make a single attempt; retry policy lives with the caller.
pub trait FeatureSource: Send + Sync {
    fn fetch(&self) -> Result<Vec<RawFeature>, SourceError>;
}

/// Fetches the feed over HTTP with a bounded timeout.
pub struct HttpFeatureSource {
    client: reqwest::blocking::Client,
    url: String,
}

impl HttpFeatureSource {
    pub fn new(
        url: impl Into<String>,
        timeout: Duration,
        accept_invalid_certs: bool,
    ) -> Result<Self, SourceError> {
        let client = reqwest::blocking::Client::builder()
            .timeout(timeout)
            .danger_accept_invalid_certs(accept_invalid_certs)
            .build()
            .map_err(|e| SourceError::UpstreamUnavailable(format!("failed to build HTTP client: {}", e)))?;

        Ok(Self {
            client,
            url: url.into(),
        })
    }

    pub fn url(&self) -> &str {
        &self.url
    }
}

impl FeatureSource for HttpFeatureSource {
    fn fetch(&self) -> Result<Vec<RawFeature>, SourceError> {
        tracing::debug!("Fetching: {}", self.url);

        let response = self
            .client
            .get(&self.url)
            .header("Accept", "application/json")
            .send()
            .map_err(|e| SourceError::UpstreamUnavailable(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            return Err(SourceError::UpstreamUnavailable(format!("HTTP error! status: {}", status)));
        }

        let body = response
            .text()
            .map_err(|e| SourceError::UpstreamUnavailable(format!("failed to read body: {}", e)))?;

        let features = parse_feature_collection(&body)?;
        tracing::debug!("Decoded {} raw features", features.len());
        Ok(features)
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ingest::fixtures::*;

    #[test]
    fn test_parse_well_formed_collection() {
        let features = parse_feature_collection(fixture_cologne_stations_json()).unwrap();
        assert_eq!(features.len(), 3);
        assert_eq!(features[0].attribute("objectid"), Some(&Value::from(101)));
        let geom = features[0].geometry.as_ref().unwrap();
        assert_eq!(geom.x, Some(Value::from(6.9583)));
    }

    #[test]
    fn test_missing_features_is_malformed() {
        let result = parse_feature_collection(r#"{"displayFieldName": "adresse"}"#);
        assert!(matches!(result, Err(SourceError::MalformedPayload(_))));
    }

    #[test]
    fn test_non_json_is_malformed() {
        let result = parse_feature_collection("<html>Service Unavailable</html>");
        assert!(matches!(result, Err(SourceError::MalformedPayload(_))));
    }

    #[test]
    fn test_arcgis_error_envelope_is_malformed() {
        let result = parse_feature_collection(fixture_arcgis_error_json());
        match result {
            Err(SourceError::MalformedPayload(msg)) => {
                assert!(msg.contains("400"));
                assert!(msg.contains("Invalid or missing input parameters"));
            }
            other => panic!("expected MalformedPayload, got {:?}", other),
        }
    }

    #[test]
    fn test_malformed_features_are_decoded_leniently() {
        let body = r#"{"features": [
            42,
            {"attributes": "oops", "geometry": [1, 2]},
            {"attributes": {"objectid": 5}}
        ]}"#;
        let features = parse_feature_collection(body).unwrap();
        assert_eq!(features.len(), 3);
        assert_eq!(features[0], RawFeature::default());
        assert!(features[1].attributes.is_empty());
        assert!(features[1].geometry.is_none());
        assert!(features[2].geometry.is_none());
    }

    #[test]
    fn test_attribute_lookup_is_case_insensitive() {
        let features =
            parse_feature_collection(r#"{"features": [{"attributes": {"OBJECTID": 9, "ADRESSE": "A"}}]}"#)
                .unwrap();
        assert_eq!(features[0].attribute("objectid"), Some(&Value::from(9)));
        assert_eq!(features[0].attribute("adresse"), Some(&Value::from("A")));
        assert_eq!(features[0].attribute("missing"), None);
    }

    #[test]
    fn test_empty_feature_list_is_valid() {
        let features = parse_feature_collection(r#"{"features": []}"#).unwrap();
        assert!(features.is_empty());
    }
}
