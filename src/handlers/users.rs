use crate::{
    auth::AuthUser,
    entities::UserProfile,
    errors::ServiceError,
    handlers::{
        common::{created_response, JsonBody},
        AppState,
    },
    services::users::{NewUser, UserChanges, UserDetails, UserSummary},
    validation::encode_avatar,
};
use axum::{
    extract::{Path, Query, State},
    response::Response,
    Json,
};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use uuid::Uuid;

#[derive(Debug, Serialize)]
pub struct CreatedUser {
    pub id: Uuid,
    pub name: String,
    pub profile: UserProfile,
    pub avatar: Option<String>,
}

/// `POST /users`
pub async fn create_user(
    State(state): State<AppState>,
    JsonBody(payload): JsonBody<NewUser>,
) -> Result<Response, ServiceError> {
    let user = state.services.users.create_user(payload).await?;
    Ok(created_response(CreatedUser {
        id: user.id,
        avatar: encode_avatar(user.avatar.as_deref()),
        name: user.name,
        profile: user.profile,
    }))
}

#[derive(Debug, Default, Deserialize)]
pub struct UserListQuery {
    pub profile: Option<String>,
}

/// `GET /users?profile=`
pub async fn list_users(
    State(state): State<AppState>,
    Query(query): Query<UserListQuery>,
) -> Result<Json<Vec<UserSummary>>, ServiceError> {
    let users = state
        .services
        .users
        .list_users(query.profile.as_deref())
        .await?;
    Ok(Json(users))
}

/// `GET /users/{id}`
pub async fn get_user(
    State(state): State<AppState>,
    caller: AuthUser,
    Path(id): Path<Uuid>,
) -> Result<Json<UserDetails>, ServiceError> {
    let user = state.services.users.get_user(&caller, id).await?;
    Ok(Json(user))
}

/// Body of `PUT /users/{id}`. Bookkeeping fields are captured only so their
/// presence can be rejected.
#[derive(Debug, Default, Deserialize)]
pub struct UpdateUserRequest {
    pub id: Option<Value>,
    pub created_at: Option<Value>,
    pub updated_at: Option<Value>,
    pub status: Option<Value>,
    pub profile: Option<Value>,
    #[serde(flatten)]
    pub changes: UserChanges,
}

impl UpdateUserRequest {
    fn forbidden_fields(&self) -> Vec<&'static str> {
        [
            ("id", &self.id),
            ("created_at", &self.created_at),
            ("updated_at", &self.updated_at),
            ("status", &self.status),
            ("profile", &self.profile),
        ]
        .into_iter()
        .filter(|(_, value)| value.as_ref().map_or(false, |v| !v.is_null()))
        .map(|(name, _)| name)
        .collect()
    }
}

#[derive(Debug, Serialize)]
pub struct UpdatedUser {
    pub id: Uuid,
    pub name: String,
    pub email: String,
    pub full_address: Option<String>,
    pub avatar: Option<String>,
}

impl From<UserDetails> for UpdatedUser {
    fn from(details: UserDetails) -> Self {
        Self {
            id: details.id,
            name: details.name,
            email: details.email,
            full_address: details.full_address,
            avatar: details.avatar,
        }
    }
}

/// `PUT /users/{id}`
pub async fn update_user(
    State(state): State<AppState>,
    caller: AuthUser,
    Path(id): Path<Uuid>,
    JsonBody(payload): JsonBody<UpdateUserRequest>,
) -> Result<Json<UpdatedUser>, ServiceError> {
    let forbidden = payload.forbidden_fields();
    if !forbidden.is_empty() {
        return Err(ServiceError::Unauthorized(format!(
            "Changing {} is not allowed",
            forbidden.join(", ")
        )));
    }

    let updated = state
        .services
        .users
        .update_user(&caller, id, payload.changes)
        .await?;
    Ok(Json(updated.into()))
}

#[derive(Debug, Deserialize)]
pub struct StatusRequest {
    pub status: bool,
}

#[derive(Debug, Serialize)]
pub struct StatusResponse {
    pub status: bool,
    pub message: String,
}

/// `PATCH /users/{id}/status`
pub async fn update_status(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    JsonBody(payload): JsonBody<StatusRequest>,
) -> Result<Json<StatusResponse>, ServiceError> {
    let user = state.services.users.set_status(id, payload.status).await?;
    Ok(Json(StatusResponse {
        status: user.status,
        message: "Status updated".to_string(),
    }))
}
