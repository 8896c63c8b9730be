use crate::{db::DatabaseAccess, errors::ServiceError, events::EventSender};
use async_trait::async_trait;
use std::sync::Arc;

/// Command trait for implementing the Command Pattern
///
/// A command carries everything one write operation needs, including the
/// caller identity, and runs against injected data access and event sender.
#[async_trait]
pub trait Command: Send + Sync {
    /// The return type of the command when executed successfully
    type Result;

    /// Execute the command with the given dependencies
    ///
    /// # Arguments
    /// * `db` - Data access handle; multi-write commands use one transaction
    /// * `event_sender` - Channel to publish domain events after commit
    async fn execute(
        &self,
        db: Arc<DatabaseAccess>,
        event_sender: Arc<EventSender>,
    ) -> Result<Self::Result, ServiceError>;
}

pub mod movements;
