use async_trait::async_trait;
use std::sync::Arc;
use tracing::{info, instrument};
use uuid::Uuid;

use super::{advance_status, ensure_status, load_movement};
use crate::{
    auth::AuthUser,
    commands::Command,
    db::DatabaseAccess,
    entities::{movement, MovementStatus},
    errors::ServiceError,
    events::{Event, EventSender},
    services::require_caller_driver,
};

/// IN_PROGRESS -> DELIVERED. Only the driver who started it may end it.
#[derive(Debug, Clone)]
pub struct EndMovementCommand {
    pub caller: AuthUser,
    pub movement_id: Uuid,
}

#[async_trait]
impl Command for EndMovementCommand {
    type Result = movement::Model;

    #[instrument(skip(self, db, event_sender), fields(movement_id = %self.movement_id))]
    async fn execute(
        &self,
        db: Arc<DatabaseAccess>,
        event_sender: Arc<EventSender>,
    ) -> Result<Self::Result, ServiceError> {
        let command = self.clone();
        let delivered = db
            .transaction("end_movement", move |txn| {
                Box::pin(async move {
                    let movement = load_movement(txn, command.movement_id).await?;
                    ensure_status(&movement, MovementStatus::InProgress)?;
                    let driver = require_caller_driver(txn, &command.caller).await?;

                    if movement.driver_id != Some(driver.id) {
                        return Err(ServiceError::Forbidden(
                            "Only the driver who started this movement can end it".to_string(),
                        ));
                    }

                    advance_status(
                        txn,
                        movement.id,
                        MovementStatus::Delivered,
                        Some(driver.id),
                        None,
                    )
                    .await?;

                    load_movement(txn, movement.id).await
                })
            })
            .await?;

        info!("movement delivered");
        event_sender
            .send_or_log(Event::MovementStatusChanged {
                movement_id: delivered.id,
                old_status: MovementStatus::InProgress,
                new_status: MovementStatus::Delivered,
                actor_id: self.caller.user_id,
            })
            .await;

        Ok(delivered)
    }
}
