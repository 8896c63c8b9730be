use async_trait::async_trait;
use sea_orm::{ActiveModelTrait, EntityTrait, Set};
use serde::Serialize;
use std::sync::Arc;
use tracing::{info, instrument};
use uuid::Uuid;

use super::{advance_status, ensure_status, load_movement};
use crate::{
    auth::AuthUser,
    commands::Command,
    db::DatabaseAccess,
    entities::{movement, product, MovementStatus},
    errors::ServiceError,
    events::{Event, EventSender},
    services::require_caller_branch,
};

/// DELIVERED -> FINISHED, confirmed by staff of the destination branch.
/// The received stock lands as a new product row at the destination.
#[derive(Debug, Clone)]
pub struct FinishMovementCommand {
    pub caller: AuthUser,
    pub movement_id: Uuid,
}

#[derive(Debug, Clone, Serialize)]
pub struct FinishMovementResult {
    pub movement: movement::Model,
    pub received_product: product::Model,
}

#[async_trait]
impl Command for FinishMovementCommand {
    type Result = FinishMovementResult;

    #[instrument(skip(self, db, event_sender), fields(movement_id = %self.movement_id))]
    async fn execute(
        &self,
        db: Arc<DatabaseAccess>,
        event_sender: Arc<EventSender>,
    ) -> Result<Self::Result, ServiceError> {
        let command = self.clone();
        let result = db
            .transaction("finish_movement", move |txn| {
                Box::pin(async move {
                    let movement = load_movement(txn, command.movement_id).await?;
                    ensure_status(&movement, MovementStatus::Delivered)?;

                    let branch = require_caller_branch(txn, &command.caller).await?;
                    if branch.id != movement.destination_branch_id {
                        return Err(ServiceError::Forbidden(
                            "Only the destination branch can finish this movement".to_string(),
                        ));
                    }

                    advance_status(txn, movement.id, MovementStatus::Finished, None, None).await?;

                    let origin = product::Entity::find_by_id(movement.product_id)
                        .one(txn)
                        .await
                        .map_err(ServiceError::db_error)?
                        .ok_or_else(|| {
                            ServiceError::InternalError(format!(
                                "Product {} of movement {} is missing",
                                movement.product_id, movement.id
                            ))
                        })?;

                    let received_product = product::ActiveModel {
                        id: Set(Uuid::new_v4()),
                        branch_id: Set(movement.destination_branch_id),
                        name: Set(origin.name),
                        description: Set(origin.description),
                        quantity: Set(movement.quantity),
                        avatar: Set(origin.avatar),
                        url_cover: Set(origin.url_cover),
                        ..Default::default()
                    }
                    .insert(txn)
                    .await
                    .map_err(ServiceError::db_error)?;

                    let movement = load_movement(txn, movement.id).await?;
                    Ok(FinishMovementResult {
                        movement,
                        received_product,
                    })
                })
            })
            .await?;

        info!(
            received_product_id = %result.received_product.id,
            quantity = result.received_product.quantity,
            "movement finished"
        );
        event_sender
            .send_or_log(Event::MovementStatusChanged {
                movement_id: result.movement.id,
                old_status: MovementStatus::Delivered,
                new_status: MovementStatus::Finished,
                actor_id: self.caller.user_id,
            })
            .await;
        event_sender
            .send_or_log(Event::ProductCreated {
                product_id: result.received_product.id,
                branch_id: result.received_product.branch_id,
                quantity: result.received_product.quantity,
            })
            .await;

        Ok(result)
    }
}
