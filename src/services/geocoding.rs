//! Address to coordinates lookup against a Google-geocode-compatible API.

use crate::config::AppConfig;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::{instrument, warn};

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Coordinates {
    pub lat: f64,
    pub lng: f64,
}

/// Resolves a postal address. Lookups never fail the caller: any problem
/// is logged and reported as `None`.
#[async_trait]
pub trait GeocodingClient: Send + Sync {
    async fn coordinates_for(&self, address: &str) -> Option<Coordinates>;
}

#[derive(Debug, Deserialize)]
struct GeocodeResponse {
    status: String,
    #[serde(default)]
    results: Vec<GeocodeResult>,
}

#[derive(Debug, Deserialize)]
struct GeocodeResult {
    geometry: Geometry,
}

#[derive(Debug, Deserialize)]
struct Geometry {
    location: Coordinates,
}

#[derive(Clone)]
pub struct HttpGeocodingClient {
    client: reqwest::Client,
    base_url: String,
    api_key: Option<String>,
}

impl HttpGeocodingClient {
    pub fn new(client: reqwest::Client, base_url: impl Into<String>, api_key: Option<String>) -> Self {
        Self {
            client,
            base_url: base_url.into(),
            api_key,
        }
    }

    pub fn from_config(client: reqwest::Client, cfg: &AppConfig) -> Self {
        Self::new(client, cfg.geocoding_url.clone(), cfg.geocoding_api_key.clone())
    }
}

#[async_trait]
impl GeocodingClient for HttpGeocodingClient {
    #[instrument(skip(self))]
    async fn coordinates_for(&self, address: &str) -> Option<Coordinates> {
        let mut query = vec![("address", address.to_string())];
        if let Some(key) = &self.api_key {
            query.push(("key", key.clone()));
        }

        let response = match self.client.get(&self.base_url).query(&query).send().await {
            Ok(response) => response,
            Err(e) => {
                warn!(error = %e, "geocoding request failed");
                return None;
            }
        };

        let body: GeocodeResponse = match response.json().await {
            Ok(body) => body,
            Err(e) => {
                warn!(error = %e, "geocoding response could not be decoded");
                return None;
            }
        };

        if body.status != "OK" {
            warn!(status = %body.status, "geocoding returned no match");
            return None;
        }
        body.results.into_iter().next().map(|r| r.geometry.location)
    }
}

/// Shared HTTP client for outbound calls
pub fn build_http_client(timeout: Duration) -> Result<reqwest::Client, reqwest::Error> {
    reqwest::Client::builder().timeout(timeout).build()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use wiremock::matchers::{method, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn client_for(server: &MockServer) -> HttpGeocodingClient {
        HttpGeocodingClient::new(
            build_http_client(Duration::from_secs(2)).unwrap(),
            format!("{}/geocode/json", server.uri()),
            Some("test-key".into()),
        )
    }

    #[tokio::test]
    async fn first_result_location_is_returned() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(query_param("address", "Rua A, 10"))
            .and(query_param("key", "test-key"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "status": "OK",
                "results": [{"geometry": {"location": {"lat": -8.05, "lng": -34.9}}}]
            })))
            .mount(&server)
            .await;

        let coords = client_for(&server).coordinates_for("Rua A, 10").await;
        assert_eq!(coords, Some(Coordinates { lat: -8.05, lng: -34.9 }));
    }

    #[tokio::test]
    async fn zero_results_and_errors_become_none() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "status": "ZERO_RESULTS",
                "results": []
            })))
            .mount(&server)
            .await;
        assert_eq!(client_for(&server).coordinates_for("nowhere").await, None);

        let broken = HttpGeocodingClient::new(
            build_http_client(Duration::from_millis(200)).unwrap(),
            "http://127.0.0.1:9/geocode/json",
            None,
        );
        assert_eq!(broken.coordinates_for("nowhere").await, None);
    }
}
