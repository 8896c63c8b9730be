use crate::{
    auth::AuthUser,
    commands::movements::{
        CreateMovementCommand, EndMovementCommand, FinishMovementCommand, FinishMovementResult,
        StartMovementCommand,
    },
    commands::Command,
    db::DatabaseAccess,
    entities::{branch, driver, movement, product, user, MovementStatus},
    errors::ServiceError,
    events::EventSender,
    services::{require_caller_branch, require_caller_driver},
    validation::encode_avatar,
};
use chrono::{DateTime, Utc};
use sea_orm::{ColumnTrait, Condition, ConnectionTrait, EntityTrait, QueryFilter, QueryOrder};
use serde::Serialize;
use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use tracing::instrument;
use uuid::Uuid;

#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct BranchSummary {
    pub id: Uuid,
    pub name: Option<String>,
    pub city: String,
    pub state: String,
    pub full_address: String,
}

#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct ProductSummary {
    pub id: Uuid,
    pub name: String,
    pub description: Option<String>,
    pub url_cover: Option<String>,
    pub avatar: Option<String>,
    pub branch: Option<BranchSummary>,
}

#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct DriverSummary {
    pub id: Uuid,
    pub name: Option<String>,
}

/// A movement with the records it points at, as shown in listings
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct MovementView {
    pub id: Uuid,
    pub quantity: i32,
    pub status: MovementStatus,
    pub product: Option<ProductSummary>,
    pub destination_branch: Option<BranchSummary>,
    pub driver: Option<DriverSummary>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Service for the movement workflow and its read views
#[derive(Clone)]
pub struct MovementService {
    db: Arc<DatabaseAccess>,
    event_sender: Arc<EventSender>,
}

impl MovementService {
    pub fn new(db: Arc<DatabaseAccess>, event_sender: Arc<EventSender>) -> Self {
        Self { db, event_sender }
    }

    #[instrument(skip(self), fields(caller = %command.caller.user_id))]
    pub async fn create_movement(
        &self,
        command: CreateMovementCommand,
    ) -> Result<movement::Model, ServiceError> {
        command
            .execute(self.db.clone(), self.event_sender.clone())
            .await
    }

    #[instrument(skip(self, caller))]
    pub async fn start_movement(
        &self,
        caller: AuthUser,
        movement_id: Uuid,
    ) -> Result<movement::Model, ServiceError> {
        StartMovementCommand {
            caller,
            movement_id,
        }
        .execute(self.db.clone(), self.event_sender.clone())
        .await
    }

    #[instrument(skip(self, caller))]
    pub async fn end_movement(
        &self,
        caller: AuthUser,
        movement_id: Uuid,
    ) -> Result<movement::Model, ServiceError> {
        EndMovementCommand {
            caller,
            movement_id,
        }
        .execute(self.db.clone(), self.event_sender.clone())
        .await
    }

    #[instrument(skip(self, caller))]
    pub async fn finish_movement(
        &self,
        caller: AuthUser,
        movement_id: Uuid,
    ) -> Result<FinishMovementResult, ServiceError> {
        FinishMovementCommand {
            caller,
            movement_id,
        }
        .execute(self.db.clone(), self.event_sender.clone())
        .await
    }

    /// Every PENDING movement plus the IN_PROGRESS ones assigned to the
    /// calling driver, newest first.
    #[instrument(skip(self, caller), fields(caller = %caller.user_id))]
    pub async fn driver_queue(&self, caller: &AuthUser) -> Result<Vec<MovementView>, ServiceError> {
        let conn = self.db.pool();
        let driver = require_caller_driver(conn, caller).await?;

        let movements = movement::Entity::find()
            .filter(
                Condition::any()
                    .add(movement::Column::Status.eq(MovementStatus::Pending))
                    .add(
                        Condition::all()
                            .add(movement::Column::Status.eq(MovementStatus::InProgress))
                            .add(movement::Column::DriverId.eq(driver.id)),
                    ),
            )
            .order_by_desc(movement::Column::CreatedAt)
            .all(conn)
            .await
            .map_err(ServiceError::db_error)?;

        with_summaries(conn, movements).await
    }

    /// Movements destined for the caller's branch
    #[instrument(skip(self, caller), fields(caller = %caller.user_id))]
    pub async fn inbound(&self, caller: &AuthUser) -> Result<Vec<MovementView>, ServiceError> {
        let conn = self.db.pool();
        let branch = require_caller_branch(conn, caller).await?;

        let movements = movement::Entity::find()
            .filter(movement::Column::DestinationBranchId.eq(branch.id))
            .order_by_desc(movement::Column::CreatedAt)
            .all(conn)
            .await
            .map_err(ServiceError::db_error)?;

        with_summaries(conn, movements).await
    }

    /// Movements leaving the caller's branch for another one
    #[instrument(skip(self, caller), fields(caller = %caller.user_id))]
    pub async fn outbound(&self, caller: &AuthUser) -> Result<Vec<MovementView>, ServiceError> {
        let conn = self.db.pool();
        let branch = require_caller_branch(conn, caller).await?;

        let movements = movement::Entity::find()
            .inner_join(product::Entity)
            .filter(product::Column::BranchId.eq(branch.id))
            .filter(movement::Column::DestinationBranchId.ne(branch.id))
            .order_by_desc(movement::Column::CreatedAt)
            .all(conn)
            .await
            .map_err(ServiceError::db_error)?;

        with_summaries(conn, movements).await
    }

    /// Delivered movements waiting for the caller's branch to confirm receipt
    #[instrument(skip(self, caller), fields(caller = %caller.user_id))]
    pub async fn finished(&self, caller: &AuthUser) -> Result<Vec<MovementView>, ServiceError> {
        let conn = self.db.pool();
        let branch = require_caller_branch(conn, caller).await?;

        let movements = movement::Entity::find()
            .filter(movement::Column::DestinationBranchId.eq(branch.id))
            .filter(movement::Column::Status.eq(MovementStatus::Delivered))
            .order_by_desc(movement::Column::CreatedAt)
            .all(conn)
            .await
            .map_err(ServiceError::db_error)?;

        with_summaries(conn, movements).await
    }

    /// Summary view of a single movement
    pub async fn view(&self, movement: movement::Model) -> Result<MovementView, ServiceError> {
        let id = movement.id;
        with_summaries(self.db.pool(), vec![movement])
            .await?
            .into_iter()
            .next()
            .ok_or_else(|| ServiceError::InternalError(format!("Movement {} vanished", id)))
    }

    /// Every movement in the system
    #[instrument(skip(self))]
    pub async fn all_with_summaries(&self) -> Result<Vec<MovementView>, ServiceError> {
        let conn = self.db.pool();
        let movements = movement::Entity::find()
            .order_by_desc(movement::Column::CreatedAt)
            .all(conn)
            .await
            .map_err(ServiceError::db_error)?;

        with_summaries(conn, movements).await
    }
}

/// Loads products, branches, drivers and their users for `movements` in a
/// fixed number of queries.
async fn with_summaries<C: ConnectionTrait>(
    conn: &C,
    movements: Vec<movement::Model>,
) -> Result<Vec<MovementView>, ServiceError> {
    if movements.is_empty() {
        return Ok(Vec::new());
    }

    let product_ids: HashSet<Uuid> = movements.iter().map(|m| m.product_id).collect();
    let products: HashMap<Uuid, product::Model> = product::Entity::find()
        .filter(product::Column::Id.is_in(product_ids))
        .all(conn)
        .await
        .map_err(ServiceError::db_error)?
        .into_iter()
        .map(|p| (p.id, p))
        .collect();

    let branch_ids: HashSet<Uuid> = movements
        .iter()
        .map(|m| m.destination_branch_id)
        .chain(products.values().map(|p| p.branch_id))
        .collect();
    let branches: HashMap<Uuid, branch::Model> = branch::Entity::find()
        .filter(branch::Column::Id.is_in(branch_ids))
        .all(conn)
        .await
        .map_err(ServiceError::db_error)?
        .into_iter()
        .map(|b| (b.id, b))
        .collect();

    let driver_ids: HashSet<Uuid> = movements.iter().filter_map(|m| m.driver_id).collect();
    let drivers: HashMap<Uuid, driver::Model> = if driver_ids.is_empty() {
        HashMap::new()
    } else {
        driver::Entity::find()
            .filter(driver::Column::Id.is_in(driver_ids))
            .all(conn)
            .await
            .map_err(ServiceError::db_error)?
            .into_iter()
            .map(|d| (d.id, d))
            .collect()
    };

    let user_ids: HashSet<Uuid> = branches
        .values()
        .map(|b| b.user_id)
        .chain(drivers.values().map(|d| d.user_id))
        .collect();
    let user_names: HashMap<Uuid, String> = user::Entity::find()
        .filter(user::Column::Id.is_in(user_ids))
        .all(conn)
        .await
        .map_err(ServiceError::db_error)?
        .into_iter()
        .map(|u| (u.id, u.name))
        .collect();

    let branch_summary = |id: Uuid| {
        branches.get(&id).map(|b| BranchSummary {
            id: b.id,
            name: user_names.get(&b.user_id).cloned(),
            city: b.city.clone(),
            state: b.state.clone(),
            full_address: b.full_address(),
        })
    };

    Ok(movements
        .into_iter()
        .map(|m| MovementView {
            id: m.id,
            quantity: m.quantity,
            status: m.status,
            product: products.get(&m.product_id).map(|p| ProductSummary {
                id: p.id,
                name: p.name.clone(),
                description: p.description.clone(),
                url_cover: p.url_cover.clone(),
                avatar: encode_avatar(p.avatar.as_deref()),
                branch: branch_summary(p.branch_id),
            }),
            destination_branch: branch_summary(m.destination_branch_id),
            driver: m
                .driver_id
                .and_then(|id| drivers.get(&id))
                .map(|d| DriverSummary {
                    id: d.id,
                    name: user_names.get(&d.user_id).cloned(),
                }),
            created_at: m.created_at,
            updated_at: m.updated_at,
        })
        .collect())
}
