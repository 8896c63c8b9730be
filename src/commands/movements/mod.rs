//! Movement workflow: creation and the three status transitions.
//!
//! Every write here is a guarded update. A row only changes when it is still
//! in the state the command checked, so two concurrent callers can never both
//! win the same transition or drive stock below zero.

mod create_movement_command;
mod end_movement_command;
mod finish_movement_command;
mod start_movement_command;

pub use create_movement_command::CreateMovementCommand;
pub use end_movement_command::EndMovementCommand;
pub use finish_movement_command::{FinishMovementCommand, FinishMovementResult};
pub use start_movement_command::StartMovementCommand;

use crate::{
    entities::{movement, product, MovementStatus},
    errors::ServiceError,
};
use chrono::Utc;
use metrics::counter;
use sea_orm::{sea_query::Expr, ActiveEnum, ColumnTrait, ConnectionTrait, EntityTrait, QueryFilter};
use tracing::warn;
use uuid::Uuid;

pub(crate) async fn load_movement<C: ConnectionTrait>(
    conn: &C,
    movement_id: Uuid,
) -> Result<movement::Model, ServiceError> {
    movement::Entity::find_by_id(movement_id)
        .one(conn)
        .await
        .map_err(ServiceError::db_error)?
        .ok_or_else(|| ServiceError::NotFound(format!("Movement {} not found", movement_id)))
}

pub(crate) fn ensure_status(
    movement: &movement::Model,
    expected: MovementStatus,
) -> Result<(), ServiceError> {
    if movement.status != expected {
        counter!("branchflow_movements.transition_rejected", 1);
        return Err(ServiceError::InvalidStatus(format!(
            "Movement {} is {} but must be {}",
            movement.id, movement.status, expected
        )));
    }
    Ok(())
}

/// Removes `quantity` units from a product, only if that many are still on
/// hand when the statement runs.
pub(crate) async fn take_stock<C: ConnectionTrait>(
    conn: &C,
    product_id: Uuid,
    quantity: i32,
) -> Result<(), ServiceError> {
    let result = product::Entity::update_many()
        .col_expr(
            product::Column::Quantity,
            Expr::col(product::Column::Quantity).sub(quantity),
        )
        .col_expr(product::Column::UpdatedAt, Expr::value(Utc::now()))
        .filter(product::Column::Id.eq(product_id))
        .filter(product::Column::Quantity.gte(quantity))
        .exec(conn)
        .await
        .map_err(ServiceError::db_error)?;

    if result.rows_affected != 1 {
        warn!(%product_id, quantity, "stock changed concurrently");
        return Err(ServiceError::InsufficientStock(format!(
            "Not enough stock left for {} units",
            quantity
        )));
    }
    Ok(())
}

/// Moves `movement_id` one step to `target`, only if it is still in the prior
/// status (and, when given, still assigned to `assigned_driver`).
/// `assign_driver` is written in the same statement.
pub(crate) async fn advance_status<C: ConnectionTrait>(
    conn: &C,
    movement_id: Uuid,
    target: MovementStatus,
    assigned_driver: Option<Uuid>,
    assign_driver: Option<Uuid>,
) -> Result<(), ServiceError> {
    let prior = target.required_prior().ok_or_else(|| {
        ServiceError::InvalidStatus(format!("{} cannot be reached by a transition", target))
    })?;

    let mut update = movement::Entity::update_many()
        .col_expr(movement::Column::Status, Expr::value(target.to_value()))
        .col_expr(movement::Column::UpdatedAt, Expr::value(Utc::now()))
        .filter(movement::Column::Id.eq(movement_id))
        .filter(movement::Column::Status.eq(prior.to_value()));

    if let Some(driver_id) = assigned_driver {
        update = update.filter(movement::Column::DriverId.eq(driver_id));
    }
    if let Some(driver_id) = assign_driver {
        update = update.col_expr(movement::Column::DriverId, Expr::value(driver_id));
    }

    let result = update.exec(conn).await.map_err(ServiceError::db_error)?;
    if result.rows_affected != 1 {
        warn!(%movement_id, %target, "movement changed concurrently");
        counter!("branchflow_movements.transition_rejected", 1);
        return Err(ServiceError::InvalidStatus(format!(
            "Movement {} is no longer {}",
            movement_id, prior
        )));
    }
    counter!("branchflow_movements.transitions", 1);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        entities::{branch, driver, user, UserProfile},
        migrator::Migrator,
    };
    use assert_matches::assert_matches;
    use sea_orm::{ActiveModelTrait, ConnectOptions, Database, DatabaseConnection, Set};
    use sea_orm_migration::MigratorTrait;

    async fn database() -> DatabaseConnection {
        let mut options = ConnectOptions::new("sqlite::memory:");
        options.max_connections(1).min_connections(1);
        let db = Database::connect(options).await.unwrap();
        Migrator::up(&db, None).await.unwrap();
        db
    }

    async fn account(db: &DatabaseConnection, email: &str, profile: UserProfile) -> Uuid {
        user::ActiveModel {
            id: Set(Uuid::new_v4()),
            name: Set(email.to_string()),
            email: Set(email.to_string()),
            password_hash: Set("hash".to_string()),
            profile: Set(profile),
            status: Set(true),
            avatar: Set(None),
            ..Default::default()
        }
        .insert(db)
        .await
        .unwrap()
        .id
    }

    async fn branch_row(db: &DatabaseConnection, email: &str) -> Uuid {
        let user_id = account(db, email, UserProfile::Branch).await;
        branch::ActiveModel {
            id: Set(Uuid::new_v4()),
            user_id: Set(user_id),
            document: Set("11.222.333/0001-81".to_string()),
            street: Set("Rua da Aurora".to_string()),
            number: Set("100".to_string()),
            neighborhood: Set("Boa Vista".to_string()),
            city: Set("Recife".to_string()),
            state: Set("PE".to_string()),
            complement: Set(None),
            zip_code: Set("50050-000".to_string()),
            latitude: Set(None),
            longitude: Set(None),
            ..Default::default()
        }
        .insert(db)
        .await
        .unwrap()
        .id
    }

    async fn driver_row(db: &DatabaseConnection, email: &str) -> Uuid {
        let user_id = account(db, email, UserProfile::Driver).await;
        driver::ActiveModel {
            id: Set(Uuid::new_v4()),
            user_id: Set(user_id),
            document: Set("529.982.247-25".to_string()),
            street: Set("Rua da Aurora".to_string()),
            number: Set("100".to_string()),
            neighborhood: Set("Boa Vista".to_string()),
            city: Set("Recife".to_string()),
            state: Set("PE".to_string()),
            complement: Set(None),
            zip_code: Set("50050-000".to_string()),
            ..Default::default()
        }
        .insert(db)
        .await
        .unwrap()
        .id
    }

    async fn product_row(
        db: &DatabaseConnection,
        branch_id: Uuid,
        quantity: i32,
    ) -> product::Model {
        product::ActiveModel {
            id: Set(Uuid::new_v4()),
            branch_id: Set(branch_id),
            name: Set("Cable".to_string()),
            description: Set(None),
            quantity: Set(quantity),
            avatar: Set(None),
            url_cover: Set(None),
            ..Default::default()
        }
        .insert(db)
        .await
        .unwrap()
    }

    async fn movement_row(
        db: &DatabaseConnection,
        product_id: Uuid,
        destination_branch_id: Uuid,
    ) -> movement::Model {
        movement::ActiveModel {
            id: Set(Uuid::new_v4()),
            product_id: Set(product_id),
            destination_branch_id: Set(destination_branch_id),
            driver_id: Set(None),
            quantity: Set(1),
            status: Set(MovementStatus::Pending),
            ..Default::default()
        }
        .insert(db)
        .await
        .unwrap()
    }

    async fn stock(db: &DatabaseConnection, product_id: Uuid) -> i32 {
        product::Entity::find_by_id(product_id)
            .one(db)
            .await
            .unwrap()
            .unwrap()
            .quantity
    }

    #[tokio::test]
    async fn take_stock_refuses_when_stock_shrank_after_the_check() {
        let db = database().await;
        let origin = branch_row(&db, "recife@example.com").await;
        let checked = product_row(&db, origin, 10).await;

        // another request took most of the stock after `checked` was read
        product::Entity::update_many()
            .col_expr(product::Column::Quantity, Expr::value(2))
            .filter(product::Column::Id.eq(checked.id))
            .exec(&db)
            .await
            .unwrap();

        assert_matches!(
            take_stock(&db, checked.id, 5).await,
            Err(ServiceError::InsufficientStock(_))
        );
        assert_eq!(stock(&db, checked.id).await, 2);

        take_stock(&db, checked.id, 2).await.unwrap();
        assert_eq!(stock(&db, checked.id).await, 0);
    }

    #[tokio::test]
    async fn advance_status_refuses_a_movement_that_moved_on() {
        let db = database().await;
        let origin = branch_row(&db, "recife@example.com").await;
        let destination = branch_row(&db, "olinda@example.com").await;
        let winner = driver_row(&db, "carla@example.com").await;
        let loser = driver_row(&db, "bruno@example.com").await;
        let product = product_row(&db, origin, 5).await;
        let loaded = movement_row(&db, product.id, destination).await;

        // both drivers saw PENDING; the first pickup lands
        ensure_status(&loaded, MovementStatus::Pending).unwrap();
        advance_status(&db, loaded.id, MovementStatus::InProgress, None, Some(winner))
            .await
            .unwrap();

        assert_matches!(
            advance_status(&db, loaded.id, MovementStatus::InProgress, None, Some(loser)).await,
            Err(ServiceError::InvalidStatus(_))
        );
        let stored = load_movement(&db, loaded.id).await.unwrap();
        assert_eq!(stored.status, MovementStatus::InProgress);
        assert_eq!(stored.driver_id, Some(winner));
    }

    #[tokio::test]
    async fn advance_status_requires_the_assigned_driver() {
        let db = database().await;
        let origin = branch_row(&db, "recife@example.com").await;
        let destination = branch_row(&db, "olinda@example.com").await;
        let assigned = driver_row(&db, "carla@example.com").await;
        let other = driver_row(&db, "bruno@example.com").await;
        let product = product_row(&db, origin, 5).await;
        let movement = movement_row(&db, product.id, destination).await;

        advance_status(&db, movement.id, MovementStatus::InProgress, None, Some(assigned))
            .await
            .unwrap();

        assert_matches!(
            advance_status(&db, movement.id, MovementStatus::Delivered, Some(other), None).await,
            Err(ServiceError::InvalidStatus(_))
        );
        assert_eq!(
            load_movement(&db, movement.id).await.unwrap().status,
            MovementStatus::InProgress
        );

        advance_status(&db, movement.id, MovementStatus::Delivered, Some(assigned), None)
            .await
            .unwrap();
        assert_eq!(
            load_movement(&db, movement.id).await.unwrap().status,
            MovementStatus::Delivered
        );
    }

    #[tokio::test]
    async fn pending_is_not_a_transition_target() {
        let db = database().await;
        assert_matches!(
            advance_status(&db, Uuid::new_v4(), MovementStatus::Pending, None, None).await,
            Err(ServiceError::InvalidStatus(_))
        );
    }
}
