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

/// PENDING -> IN_PROGRESS. The calling driver becomes the assigned driver.
#[derive(Debug, Clone)]
pub struct StartMovementCommand {
    pub caller: AuthUser,
    pub movement_id: Uuid,
}

#[async_trait]
impl Command for StartMovementCommand {
    type Result = movement::Model;

    #[instrument(skip(self, db, event_sender), fields(movement_id = %self.movement_id))]
    async fn execute(
        &self,
        db: Arc<DatabaseAccess>,
        event_sender: Arc<EventSender>,
    ) -> Result<Self::Result, ServiceError> {
        let command = self.clone();
        let started = db
            .transaction("start_movement", move |txn| {
                Box::pin(async move {
                    let movement = load_movement(txn, command.movement_id).await?;
                    ensure_status(&movement, MovementStatus::Pending)?;
                    let driver = require_caller_driver(txn, &command.caller).await?;

                    advance_status(
                        txn,
                        movement.id,
                        MovementStatus::InProgress,
                        None,
                        Some(driver.id),
                    )
                    .await?;

                    load_movement(txn, movement.id).await
                })
            })
            .await?;

        info!(driver_id = ?started.driver_id, "movement started");
        event_sender
            .send_or_log(Event::MovementStatusChanged {
                movement_id: started.id,
                old_status: MovementStatus::Pending,
                new_status: MovementStatus::InProgress,
                actor_id: self.caller.user_id,
            })
            .await;

        Ok(started)
    }
}
