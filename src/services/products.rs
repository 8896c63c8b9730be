use crate::{
    auth::AuthUser,
    db::DatabaseAccess,
    entities::{branch, product},
    errors::ServiceError,
    events::{Event, EventSender},
    services::{find_branch_for_user, require_caller_branch},
    validation::{decode_avatar, encode_avatar},
};
use chrono::{DateTime, Utc};
use sea_orm::{ActiveModelTrait, ColumnTrait, EntityTrait, QueryFilter, QueryOrder, Set};
use serde::Serialize;
use std::sync::Arc;
use tracing::{info, instrument};
use uuid::Uuid;

/// Product as returned over HTTP. Stock is exposed as `amount`.
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct ProductView {
    pub id: Uuid,
    pub name: String,
    pub amount: i32,
    pub description: Option<String>,
    pub avatar: Option<String>,
    pub url_cover: Option<String>,
    pub branch_id: Uuid,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl From<product::Model> for ProductView {
    fn from(model: product::Model) -> Self {
        Self {
            id: model.id,
            avatar: encode_avatar(model.avatar.as_deref()),
            name: model.name,
            amount: model.quantity,
            description: model.description,
            url_cover: model.url_cover,
            branch_id: model.branch_id,
            created_at: model.created_at,
            updated_at: model.updated_at,
        }
    }
}

#[derive(Debug, Clone)]
pub struct NewProduct {
    pub name: String,
    pub amount: i32,
    pub description: Option<String>,
    /// Base64, optionally with a data URI prefix
    pub avatar: Option<String>,
    pub url_cover: Option<String>,
    pub branch_id: Option<Uuid>,
}

#[derive(Debug, Clone, Default)]
pub struct ProductChanges {
    pub name: Option<String>,
    pub avatar: Option<String>,
}

#[derive(Clone)]
pub struct ProductService {
    db: Arc<DatabaseAccess>,
    event_sender: Arc<EventSender>,
}

impl ProductService {
    pub fn new(db: Arc<DatabaseAccess>, event_sender: Arc<EventSender>) -> Self {
        Self { db, event_sender }
    }

    /// Registers stock at a branch. Branch staff may only stock their own
    /// branch.
    #[instrument(skip(self, caller, input), fields(caller = %caller.user_id, branch_id = ?input.branch_id))]
    pub async fn create_product(
        &self,
        caller: &AuthUser,
        input: NewProduct,
    ) -> Result<product::Model, ServiceError> {
        let branch_id = input
            .branch_id
            .ok_or_else(|| ServiceError::BadRequest("Branch is required".to_string()))?;
        if input.amount < 0 {
            return Err(ServiceError::ValidationError(
                "Amount cannot be negative".to_string(),
            ));
        }
        if input.name.trim().is_empty() {
            return Err(ServiceError::ValidationError("Name is required".to_string()));
        }
        let avatar = input.avatar.as_deref().map(decode_avatar).transpose()?;

        let conn = self.db.pool();
        branch::Entity::find_by_id(branch_id)
            .one(conn)
            .await
            .map_err(ServiceError::db_error)?
            .ok_or_else(|| ServiceError::NotFound(format!("Branch {} not found", branch_id)))?;

        if !caller.is_admin() {
            let own = find_branch_for_user(conn, caller.user_id).await?;
            if own.map(|b| b.id) != Some(branch_id) {
                return Err(ServiceError::Forbidden(
                    "Products can only be registered at your own branch".to_string(),
                ));
            }
        }

        let created = product::ActiveModel {
            id: Set(Uuid::new_v4()),
            branch_id: Set(branch_id),
            name: Set(input.name.trim().to_string()),
            description: Set(input.description),
            quantity: Set(input.amount),
            avatar: Set(avatar),
            url_cover: Set(input.url_cover),
            ..Default::default()
        }
        .insert(conn)
        .await
        .map_err(ServiceError::db_error)?;

        info!(product_id = %created.id, quantity = created.quantity, "product created");
        self.event_sender
            .send_or_log(Event::ProductCreated {
                product_id: created.id,
                branch_id: created.branch_id,
                quantity: created.quantity,
            })
            .await;

        Ok(created)
    }

    /// Admins see every product; branch staff see their own branch's stock.
    /// Newest first.
    #[instrument(skip(self, caller), fields(caller = %caller.user_id))]
    pub async fn list_products(&self, caller: &AuthUser) -> Result<Vec<product::Model>, ServiceError> {
        let conn = self.db.pool();
        let mut query = product::Entity::find().order_by_desc(product::Column::CreatedAt);

        if !caller.is_admin() {
            let branch = require_caller_branch(conn, caller).await?;
            query = query.filter(product::Column::BranchId.eq(branch.id));
        }

        query.all(conn).await.map_err(ServiceError::db_error)
    }

    /// Renames a product or replaces its picture. Stock only changes through
    /// movements.
    #[instrument(skip(self, caller, changes), fields(caller = %caller.user_id))]
    pub async fn update_product(
        &self,
        caller: &AuthUser,
        product_id: Uuid,
        changes: ProductChanges,
    ) -> Result<product::Model, ServiceError> {
        let conn = self.db.pool();
        let existing = product::Entity::find_by_id(product_id)
            .one(conn)
            .await
            .map_err(ServiceError::db_error)?
            .ok_or_else(|| ServiceError::NotFound(format!("Product {} not found", product_id)))?;

        if !caller.is_admin() {
            let owner = find_branch_for_user(conn, caller.user_id).await?;
            if owner.map(|b| b.id) != Some(existing.branch_id) {
                return Err(ServiceError::Forbidden(
                    "Product belongs to another branch".to_string(),
                ));
            }
        }

        let mut active: product::ActiveModel = existing.into();
        if let Some(name) = changes.name.filter(|n| !n.trim().is_empty()) {
            active.name = Set(name.trim().to_string());
        }
        if let Some(raw) = changes.avatar.filter(|a| !a.is_empty()) {
            active.avatar = Set(Some(decode_avatar(&raw)?));
        }

        active.update(conn).await.map_err(ServiceError::db_error)
    }
}
