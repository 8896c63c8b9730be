use crate::{
    auth::AuthUser,
    errors::ServiceError,
    handlers::{common::JsonBody, AppState},
    services::{
        branches::{BranchListing, BranchMarker},
        movements::MovementView,
        routing::LatLng,
    },
};
use axum::{extract::State, Json};
use serde::Deserialize;
use serde_json::Value;

/// `GET /branches`: every movement with its product, branches and driver
pub async fn list_movements(
    State(state): State<AppState>,
) -> Result<Json<Vec<MovementView>>, ServiceError> {
    let movements = state.services.movements.all_with_summaries().await?;
    Ok(Json(movements))
}

/// `GET /branches/destination`
pub async fn list_destinations(
    State(state): State<AppState>,
    caller: AuthUser,
) -> Result<Json<Vec<BranchListing>>, ServiceError> {
    let branches = state.services.branches.destinations(&caller).await?;
    Ok(Json(branches))
}

/// `GET /branches/map`
pub async fn map_markers(
    State(state): State<AppState>,
) -> Result<Json<Vec<BranchMarker>>, ServiceError> {
    let markers = state.services.branches.map_markers().await?;
    Ok(Json(markers))
}

#[derive(Debug, Deserialize)]
pub struct RouteRequest {
    pub origin: Option<LatLng>,
    pub destination: Option<LatLng>,
}

/// `POST /branches/route`
pub async fn route(
    State(state): State<AppState>,
    JsonBody(payload): JsonBody<RouteRequest>,
) -> Result<Json<Value>, ServiceError> {
    let (origin, destination) = match (payload.origin, payload.destination) {
        (Some(origin), Some(destination)) => (origin, destination),
        _ => {
            return Err(ServiceError::BadRequest(
                "Origin and destination are required".to_string(),
            ))
        }
    };

    let directions = state.services.branches.route(origin, destination).await?;
    Ok(Json(directions))
}
