// Domain services
pub mod branches;
pub mod movements;
pub mod products;
pub mod users;

// External collaborators
pub mod geocoding;
pub mod routing;

use crate::{
    auth::AuthUser,
    entities::{branch, driver},
    errors::ServiceError,
};
use sea_orm::{ColumnTrait, ConnectionTrait, EntityTrait, QueryFilter};
use uuid::Uuid;

/// `"{street}, {number} - {neighborhood}, {city} - {state}, CEP: {zip}"`,
/// followed by `", {complement}"` when present.
pub fn format_full_address(
    street: &str,
    number: &str,
    neighborhood: &str,
    city: &str,
    state: &str,
    zip_code: &str,
    complement: Option<&str>,
) -> String {
    let mut address = format!(
        "{}, {} - {}, {} - {}, CEP: {}",
        street, number, neighborhood, city, state, zip_code
    );
    if let Some(complement) = complement.filter(|c| !c.trim().is_empty()) {
        address.push_str(", ");
        address.push_str(complement);
    }
    address
}

pub async fn find_branch_for_user<C: ConnectionTrait>(
    db: &C,
    user_id: Uuid,
) -> Result<Option<branch::Model>, ServiceError> {
    branch::Entity::find()
        .filter(branch::Column::UserId.eq(user_id))
        .one(db)
        .await
        .map_err(ServiceError::db_error)
}

pub async fn find_driver_for_user<C: ConnectionTrait>(
    db: &C,
    user_id: Uuid,
) -> Result<Option<driver::Model>, ServiceError> {
    driver::Entity::find()
        .filter(driver::Column::UserId.eq(user_id))
        .one(db)
        .await
        .map_err(ServiceError::db_error)
}

/// The branch the caller works for. Callers without one are not authorized.
pub async fn require_caller_branch<C: ConnectionTrait>(
    db: &C,
    caller: &AuthUser,
) -> Result<branch::Model, ServiceError> {
    find_branch_for_user(db, caller.user_id)
        .await?
        .ok_or_else(|| ServiceError::Unauthorized("User has no branch registered".to_string()))
}

/// The driver record of the caller. Callers without one are not authorized.
pub async fn require_caller_driver<C: ConnectionTrait>(
    db: &C,
    caller: &AuthUser,
) -> Result<driver::Model, ServiceError> {
    find_driver_for_user(db, caller.user_id)
        .await?
        .ok_or_else(|| ServiceError::Unauthorized("User is not a registered driver".to_string()))
}
