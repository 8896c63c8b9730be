use async_trait::async_trait;
use metrics::counter;
use sea_orm::{ActiveModelTrait, EntityTrait, Set};
use std::sync::Arc;
use tracing::{info, instrument};
use uuid::Uuid;

use super::take_stock;
use crate::{
    auth::AuthUser,
    commands::Command,
    db::DatabaseAccess,
    entities::{branch, movement, product, MovementStatus},
    errors::ServiceError,
    events::{Event, EventSender},
    services::find_branch_for_user,
};

/// Sends `quantity` units of a product to another branch.
#[derive(Debug, Clone)]
pub struct CreateMovementCommand {
    pub caller: AuthUser,
    pub destination_branch_id: Uuid,
    pub product_id: Uuid,
    pub quantity: i32,
}

#[async_trait]
impl Command for CreateMovementCommand {
    type Result = movement::Model;

    #[instrument(skip(self, db, event_sender), fields(caller = %self.caller.user_id, product_id = %self.product_id))]
    async fn execute(
        &self,
        db: Arc<DatabaseAccess>,
        event_sender: Arc<EventSender>,
    ) -> Result<Self::Result, ServiceError> {
        if self.quantity <= 0 {
            return Err(ServiceError::ValidationError(
                "Quantity must be greater than zero.".to_string(),
            ));
        }

        let command = self.clone();
        let created = db
            .transaction("create_movement", move |txn| {
                Box::pin(async move {
                    branch::Entity::find_by_id(command.destination_branch_id)
                        .one(txn)
                        .await
                        .map_err(ServiceError::db_error)?
                        .ok_or_else(|| {
                            ServiceError::ValidationError(
                                "Destination branch not found.".to_string(),
                            )
                        })?;

                    let product = product::Entity::find_by_id(command.product_id)
                        .one(txn)
                        .await
                        .map_err(ServiceError::db_error)?
                        .ok_or_else(|| {
                            ServiceError::ValidationError("Product not found.".to_string())
                        })?;

                    if !command.caller.is_admin() {
                        let caller_branch = find_branch_for_user(txn, command.caller.user_id).await?;
                        if caller_branch.map(|b| b.id) != Some(product.branch_id) {
                            return Err(ServiceError::Forbidden(
                                "Product does not belong to the caller's branch".to_string(),
                            ));
                        }
                    }

                    if command.quantity > product.quantity {
                        return Err(ServiceError::InsufficientStock(format!(
                            "Requested {} but only {} available",
                            command.quantity, product.quantity
                        )));
                    }

                    if command.destination_branch_id == product.branch_id {
                        return Err(ServiceError::ValidationError(
                            "Destination branch must differ from the product's branch."
                                .to_string(),
                        ));
                    }

                    take_stock(txn, product.id, command.quantity).await?;

                    movement::ActiveModel {
                        id: Set(Uuid::new_v4()),
                        product_id: Set(product.id),
                        destination_branch_id: Set(command.destination_branch_id),
                        driver_id: Set(None),
                        quantity: Set(command.quantity),
                        status: Set(MovementStatus::Pending),
                        ..Default::default()
                    }
                    .insert(txn)
                    .await
                    .map_err(ServiceError::db_error)
                })
            })
            .await
            .map_err(|e| {
                counter!("branchflow_movements.create_failures", 1);
                e
            })?;

        counter!("branchflow_movements.created", 1);
        info!(movement_id = %created.id, quantity = created.quantity, "movement created");

        event_sender
            .send_or_log(Event::MovementCreated {
                movement_id: created.id,
                product_id: created.product_id,
                destination_branch_id: created.destination_branch_id,
                quantity: created.quantity,
            })
            .await;

        Ok(created)
    }
}
