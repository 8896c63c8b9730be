use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;
use tracing::{info, warn};
use uuid::Uuid;

use crate::entities::{MovementStatus, UserProfile};

/// Publishes domain events onto the in-process channel
#[derive(Debug, Clone)]
pub struct EventSender {
    sender: mpsc::Sender<Event>,
}

impl EventSender {
    pub fn new(sender: mpsc::Sender<Event>) -> Self {
        Self { sender }
    }

    /// Sends an event asynchronously
    pub async fn send(&self, event: Event) -> Result<(), String> {
        self.sender
            .send(event)
            .await
            .map_err(|e| format!("Failed to send event: {}", e))
    }

    /// Sends an event, logging instead of failing when the channel is closed.
    /// The write that produced the event is already committed.
    pub async fn send_or_log(&self, event: Event) {
        if let Err(e) = self.send(event).await {
            warn!("{}", e);
        }
    }
}

/// Things that happened, emitted after the corresponding commit.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub enum Event {
    UserCreated {
        user_id: Uuid,
        profile: UserProfile,
    },
    UserStatusChanged {
        user_id: Uuid,
        active: bool,
    },
    ProductCreated {
        product_id: Uuid,
        branch_id: Uuid,
        quantity: i32,
    },
    MovementCreated {
        movement_id: Uuid,
        product_id: Uuid,
        destination_branch_id: Uuid,
        quantity: i32,
    },
    MovementStatusChanged {
        movement_id: Uuid,
        old_status: MovementStatus,
        new_status: MovementStatus,
        actor_id: Uuid,
    },
}

/// Drains the channel and records every event in the log.
pub async fn process_events(mut rx: mpsc::Receiver<Event>) {
    info!("Starting event processing loop");

    while let Some(event) = rx.recv().await {
        match &event {
            Event::MovementStatusChanged {
                movement_id,
                old_status,
                new_status,
                actor_id,
            } => info!(
                %movement_id,
                %old_status,
                %new_status,
                %actor_id,
                "movement status changed"
            ),
            Event::MovementCreated {
                movement_id,
                product_id,
                destination_branch_id,
                quantity,
            } => info!(
                %movement_id,
                %product_id,
                %destination_branch_id,
                quantity,
                "movement created"
            ),
            other => info!(event = ?other, "domain event"),
        }
    }

    info!("Event processing loop stopped");
}
