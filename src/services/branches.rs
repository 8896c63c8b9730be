use crate::{
    auth::AuthUser,
    db::DatabaseAccess,
    entities::{branch, user},
    errors::ServiceError,
    services::{
        require_caller_branch,
        routing::{LatLng, RoutingClient},
    },
    validation::encode_avatar,
};
use sea_orm::EntityTrait;
use serde::Serialize;
use serde_json::Value;
use std::sync::Arc;
use tracing::instrument;
use uuid::Uuid;

/// Branch as offered when picking a movement destination
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct BranchListing {
    pub id: Uuid,
    #[serde(rename = "userName")]
    pub user_name: Option<String>,
    pub street: String,
    pub number: String,
    pub neighborhood: String,
    pub city: String,
    pub state: String,
    pub complement: Option<String>,
    pub zip_code: String,
    pub document: String,
    pub avatar: Option<String>,
}

#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct BranchMarker {
    pub id: Uuid,
    pub name: Option<String>,
    pub latitude: Option<f64>,
    pub longitude: Option<f64>,
    pub address: String,
    pub avatar: Option<String>,
}

#[derive(Clone)]
pub struct BranchService {
    db: Arc<DatabaseAccess>,
    routing: Arc<dyn RoutingClient>,
}

impl BranchService {
    pub fn new(db: Arc<DatabaseAccess>, routing: Arc<dyn RoutingClient>) -> Self {
        Self { db, routing }
    }

    async fn branches_with_users(
        &self,
    ) -> Result<Vec<(branch::Model, Option<user::Model>)>, ServiceError> {
        branch::Entity::find()
            .find_also_related(user::Entity)
            .all(self.db.pool())
            .await
            .map_err(ServiceError::db_error)
    }

    /// Every branch except the caller's own
    #[instrument(skip(self, caller), fields(caller = %caller.user_id))]
    pub async fn destinations(&self, caller: &AuthUser) -> Result<Vec<BranchListing>, ServiceError> {
        let own = require_caller_branch(self.db.pool(), caller).await?;

        Ok(self
            .branches_with_users()
            .await?
            .into_iter()
            .filter(|(b, _)| b.id != own.id)
            .map(|(b, u)| BranchListing {
                id: b.id,
                user_name: u.as_ref().map(|u| u.name.clone()),
                avatar: u.as_ref().and_then(|u| encode_avatar(u.avatar.as_deref())),
                street: b.street,
                number: b.number,
                neighborhood: b.neighborhood,
                city: b.city,
                state: b.state,
                complement: b.complement,
                zip_code: b.zip_code,
                document: b.document,
            })
            .collect())
    }

    /// Map markers for every branch
    #[instrument(skip(self))]
    pub async fn map_markers(&self) -> Result<Vec<BranchMarker>, ServiceError> {
        Ok(self
            .branches_with_users()
            .await?
            .into_iter()
            .map(|(b, u)| BranchMarker {
                id: b.id,
                name: u.as_ref().map(|u| u.name.clone()),
                avatar: u.as_ref().and_then(|u| encode_avatar(u.avatar.as_deref())),
                latitude: b.latitude,
                longitude: b.longitude,
                address: b.full_address(),
            })
            .collect())
    }

    #[instrument(skip(self))]
    pub async fn route(&self, origin: LatLng, destination: LatLng) -> Result<Value, ServiceError> {
        self.routing.route(origin, destination).await
    }
}
