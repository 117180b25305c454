//! Client for the street-view panorama metadata provider.

use serde::Deserialize;

use crate::error::{ensure_success, ComputeError};

/// Panorama metadata as returned by the provider.
///
/// The provider answers a literal JSON `null` when no panorama exists
/// near the queried coordinates; that case surfaces as `Ok(None)` from
/// [`StreetViewClient::find_panorama`] and is not an error.
#[derive(Debug, Clone, Deserialize)]
pub struct PanoramaMetadata {
    /// Provider-assigned panorama id.
    pub id: String,
    pub lat: f64,
    pub lon: f64,
    pub heading: f64,
    pub pitch: f64,
    pub roll: f64,
    /// Capture date, e.g. `"2019-06"`, when the provider reports one.
    pub date: Option<String>,
    pub elevation: Option<f64>,
}

/// HTTP client for the panorama provider.
pub struct StreetViewClient {
    client: reqwest::Client,
    base_url: String,
}

impl StreetViewClient {
    /// Create a new client for the provider at `base_url`.
    pub fn new(base_url: String) -> Self {
        Self {
            client: reqwest::Client::new(),
            base_url,
        }
    }

    /// Create a client reusing an existing [`reqwest::Client`]
    /// (connection pooling across services).
    pub fn with_client(client: reqwest::Client, base_url: String) -> Self {
        Self { client, base_url }
    }

    /// Look up the panorama nearest to the given coordinates.
    ///
    /// Returns `Ok(None)` when the provider reports no coverage there.
    pub async fn find_panorama(
        &self,
        lat: f64,
        lng: f64,
    ) -> Result<Option<PanoramaMetadata>, ComputeError> {
        let response = self
            .client
            .get(format!("{}/panorama", self.base_url))
            .query(&[("lat", lat), ("lng", lng)])
            .send()
            .await?;
        let response = ensure_success(response).await?;

        let value: serde_json::Value = response.json().await?;
        if value.is_null() {
            return Ok(None);
        }
        serde_json::from_value(value)
            .map(Some)
            .map_err(|err| ComputeError::Decode(err.to_string()))
    }
}
