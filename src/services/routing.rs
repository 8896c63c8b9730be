//! Driving directions between two points, proxied to an
//! OpenRouteService-compatible directions endpoint.

use crate::{config::AppConfig, errors::ServiceError};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use tracing::{error, instrument, warn};

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct LatLng {
    pub lat: f64,
    pub lng: f64,
}

#[async_trait]
pub trait RoutingClient: Send + Sync {
    /// GeoJSON directions from `origin` to `destination`
    async fn route(&self, origin: LatLng, destination: LatLng) -> Result<Value, ServiceError>;
}

#[derive(Clone)]
pub struct HttpRoutingClient {
    client: reqwest::Client,
    url: String,
    api_key: Option<String>,
}

impl HttpRoutingClient {
    pub fn new(client: reqwest::Client, url: impl Into<String>, api_key: Option<String>) -> Self {
        Self {
            client,
            url: url.into(),
            api_key,
        }
    }

    pub fn from_config(client: reqwest::Client, cfg: &AppConfig) -> Self {
        Self::new(client, cfg.routing_url.clone(), cfg.routing_api_key.clone())
    }
}

#[async_trait]
impl RoutingClient for HttpRoutingClient {
    #[instrument(skip(self))]
    async fn route(&self, origin: LatLng, destination: LatLng) -> Result<Value, ServiceError> {
        // coordinates are [lng, lat]
        let body = json!({
            "coordinates": [[origin.lng, origin.lat], [destination.lng, destination.lat]]
        });

        let mut request = self.client.post(&self.url).json(&body);
        if let Some(key) = &self.api_key {
            request = request.header(reqwest::header::AUTHORIZATION, key);
        }

        let response = request.send().await.map_err(|e| {
            error!(error = %e, "routing request failed");
            ServiceError::ExternalServiceError("Routing service unavailable".to_string())
        })?;

        let status = response.status();
        if !status.is_success() {
            let text = response.text().await.unwrap_or_default();
            warn!(status = status.as_u16(), "routing service rejected request");
            return Err(ServiceError::UpstreamStatus(status.as_u16(), text));
        }

        response.json::<Value>().await.map_err(|e| {
            error!(error = %e, "routing response could not be decoded");
            ServiceError::ExternalServiceError("Routing service returned invalid JSON".to_string())
        })
    }
}
