use crate::{
    auth::AuthUser,
    commands::movements::CreateMovementCommand,
    entities::MovementStatus,
    errors::ServiceError,
    handlers::{
        common::{created_response, JsonBody},
        AppState,
    },
    services::movements::MovementView,
};
use axum::{
    extract::{Path, State},
    response::Response,
    Json,
};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Deserialize)]
pub struct CreateMovementRequest {
    pub destination_branch_id: Uuid,
    pub product_id: Uuid,
    pub quantity: i32,
}

#[derive(Debug, Serialize)]
pub struct CreatedMovement {
    pub id: Uuid,
    pub quantity: i32,
    pub product_id: Uuid,
    pub destination_branch_id: Uuid,
    pub status: MovementStatus,
}

/// `POST /movements`
pub async fn create_movement(
    State(state): State<AppState>,
    caller: AuthUser,
    JsonBody(payload): JsonBody<CreateMovementRequest>,
) -> Result<Response, ServiceError> {
    let movement = state
        .services
        .movements
        .create_movement(CreateMovementCommand {
            caller,
            destination_branch_id: payload.destination_branch_id,
            product_id: payload.product_id,
            quantity: payload.quantity,
        })
        .await?;

    Ok(created_response(CreatedMovement {
        id: movement.id,
        quantity: movement.quantity,
        product_id: movement.product_id,
        destination_branch_id: movement.destination_branch_id,
        status: movement.status,
    }))
}

/// `GET /movements`: the calling driver's queue
pub async fn driver_queue(
    State(state): State<AppState>,
    caller: AuthUser,
) -> Result<Json<Vec<MovementView>>, ServiceError> {
    Ok(Json(state.services.movements.driver_queue(&caller).await?))
}

/// `PATCH /movements/{id}/start`
pub async fn start_movement(
    State(state): State<AppState>,
    caller: AuthUser,
    Path(id): Path<Uuid>,
) -> Result<Json<MovementView>, ServiceError> {
    let movements = &state.services.movements;
    let started = movements.start_movement(caller, id).await?;
    Ok(Json(movements.view(started).await?))
}

/// `PATCH /movements/{id}/end`
pub async fn end_movement(
    State(state): State<AppState>,
    caller: AuthUser,
    Path(id): Path<Uuid>,
) -> Result<Json<MovementView>, ServiceError> {
    let movements = &state.services.movements;
    let delivered = movements.end_movement(caller, id).await?;
    Ok(Json(movements.view(delivered).await?))
}

/// `GET /movements/inbound`
pub async fn inbound(
    State(state): State<AppState>,
    caller: AuthUser,
) -> Result<Json<Vec<MovementView>>, ServiceError> {
    Ok(Json(state.services.movements.inbound(&caller).await?))
}

/// `GET /movements/outbound`
pub async fn outbound(
    State(state): State<AppState>,
    caller: AuthUser,
) -> Result<Json<Vec<MovementView>>, ServiceError> {
    Ok(Json(state.services.movements.outbound(&caller).await?))
}

/// `GET /movements/finished`
pub async fn finished(
    State(state): State<AppState>,
    caller: AuthUser,
) -> Result<Json<Vec<MovementView>>, ServiceError> {
    Ok(Json(state.services.movements.finished(&caller).await?))
}

#[derive(Debug, Serialize)]
pub struct FinishedMovement {
    pub id: Uuid,
    pub status: MovementStatus,
    /// Product row created at the destination
    pub product_id: Uuid,
}

/// `POST /movements/{id}/finish`
pub async fn finish_movement(
    State(state): State<AppState>,
    caller: AuthUser,
    Path(id): Path<Uuid>,
) -> Result<Json<FinishedMovement>, ServiceError> {
    let result = state.services.movements.finish_movement(caller, id).await?;
    Ok(Json(FinishedMovement {
        id: result.movement.id,
        status: result.movement.status,
        product_id: result.received_product.id,
    }))
}
