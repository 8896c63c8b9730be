use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sea_orm::{entity::prelude::*, ActiveValue::Set};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Lifecycle of a movement. Transitions only ever move one step forward.
#[derive(
    Clone,
    Copy,
    Debug,
    PartialEq,
    Eq,
    EnumIter,
    DeriveActiveEnum,
    Serialize,
    Deserialize,
    strum::Display,
)]
#[sea_orm(rs_type = "String", db_type = "String(StringLen::N(32))")]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
#[strum(serialize_all = "SCREAMING_SNAKE_CASE")]
pub enum MovementStatus {
    #[sea_orm(string_value = "PENDING")]
    Pending,
    #[sea_orm(string_value = "IN_PROGRESS")]
    InProgress,
    #[sea_orm(string_value = "DELIVERED")]
    Delivered,
    #[sea_orm(string_value = "FINISHED")]
    Finished,
}

impl MovementStatus {
    /// The only status reachable from `self`, if any.
    pub fn next(&self) -> Option<MovementStatus> {
        match self {
            MovementStatus::Pending => Some(MovementStatus::InProgress),
            MovementStatus::InProgress => Some(MovementStatus::Delivered),
            MovementStatus::Delivered => Some(MovementStatus::Finished),
            MovementStatus::Finished => None,
        }
    }

    pub fn can_transition_to(&self, target: MovementStatus) -> bool {
        self.next() == Some(target)
    }

    /// Status a movement must be in before it can move to `self`.
    pub fn required_prior(&self) -> Option<MovementStatus> {
        match self {
            MovementStatus::Pending => None,
            MovementStatus::InProgress => Some(MovementStatus::Pending),
            MovementStatus::Delivered => Some(MovementStatus::InProgress),
            MovementStatus::Finished => Some(MovementStatus::Delivered),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "movements")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: Uuid,
    pub product_id: Uuid,
    pub destination_branch_id: Uuid,
    /// Assigned when a driver starts the movement
    pub driver_id: Option<Uuid>,
    /// Fixed at creation
    pub quantity: i32,
    pub status: MovementStatus,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(
        belongs_to = "super::product::Entity",
        from = "Column::ProductId",
        to = "super::product::Column::Id"
    )]
    Product,
    #[sea_orm(
        belongs_to = "super::branch::Entity",
        from = "Column::DestinationBranchId",
        to = "super::branch::Column::Id"
    )]
    DestinationBranch,
    #[sea_orm(
        belongs_to = "super::driver::Entity",
        from = "Column::DriverId",
        to = "super::driver::Column::Id"
    )]
    Driver,
}

impl Related<super::product::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Product.def()
    }
}

impl Related<super::driver::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Driver.def()
    }
}

#[async_trait]
impl ActiveModelBehavior for ActiveModel {
    async fn before_save<C>(self, _db: &C, insert: bool) -> Result<Self, DbErr>
    where
        C: ConnectionTrait,
    {
        let mut active_model = self;
        let now = Utc::now();
        if insert {
            active_model.created_at = Set(now);
        }
        active_model.updated_at = Set(now);
        Ok(active_model)
    }
}
