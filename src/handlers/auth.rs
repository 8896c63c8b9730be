use crate::{
    auth::AuthUser,
    entities::UserProfile,
    errors::ServiceError,
    handlers::{
        common::{validate_input, JsonBody},
        AppState,
    },
    validation::{encode_avatar, EMAIL_RE},
};
use axum::{extract::State, http::StatusCode, Json};
use serde::{Deserialize, Serialize};
use tracing::info;
use uuid::Uuid;
use validator::Validate;

#[derive(Debug, Deserialize, Validate)]
pub struct LoginRequest {
    #[validate(regex(path = "EMAIL_RE", message = "Email is invalid."))]
    pub email: String,
    #[validate(length(
        min = 6,
        max = 20,
        message = "Password must have between 6 and 20 characters."
    ))]
    pub password: String,
}

#[derive(Debug, Serialize)]
pub struct LoggedUser {
    pub id: Uuid,
    pub name: String,
    pub email: String,
    pub profile: UserProfile,
    pub avatar: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct LoginResponse {
    pub token: String,
    pub token_type: String,
    pub expires_in: i64,
    pub user: LoggedUser,
}

/// `POST /login`
pub async fn login(
    State(state): State<AppState>,
    JsonBody(payload): JsonBody<LoginRequest>,
) -> Result<Json<LoginResponse>, ServiceError> {
    validate_input(&payload)?;

    let user = state
        .services
        .users
        .authenticate(&payload.email, &payload.password)
        .await?;
    let issued = state.auth.generate_token(&user)?;
    info!(user_id = %user.id, profile = %user.profile, "user logged in");

    Ok(Json(LoginResponse {
        token: issued.access_token,
        token_type: issued.token_type,
        expires_in: issued.expires_in,
        user: LoggedUser {
            id: user.id,
            avatar: encode_avatar(user.avatar.as_deref()),
            name: user.name,
            email: user.email,
            profile: user.profile,
        },
    }))
}

/// `GET /login/validate`: reaching the handler means the token is valid
pub async fn validate_token(_caller: AuthUser) -> StatusCode {
    StatusCode::OK
}

#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct MenuEntry {
    pub label: &'static str,
    pub icon: &'static str,
    pub url: &'static str,
}

#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct MenuSection {
    pub label: &'static str,
    pub icon: &'static str,
    pub items: Vec<MenuEntry>,
}

fn entry(label: &'static str, icon: &'static str, url: &'static str) -> MenuEntry {
    MenuEntry { label, icon, url }
}

/// Navigation offered to each profile
pub fn menu_for(profile: UserProfile) -> Vec<MenuSection> {
    match profile {
        UserProfile::Admin => vec![
            MenuSection {
                label: "Users",
                icon: "pi pi-user",
                items: vec![
                    entry("Create", "pi pi-user-plus", "/user"),
                    entry("Manage", "pi pi-users", "/users"),
                ],
            },
            MenuSection {
                label: "Products",
                icon: "pi pi-box",
                items: vec![
                    entry("Stock", "pi pi-warehouse", "/products"),
                    entry("Create", "pi pi-cart-plus", "/product"),
                ],
            },
        ],
        UserProfile::Branch => vec![
            MenuSection {
                label: "Movements",
                icon: "pi pi-arrow-right-arrow-left",
                items: vec![
                    entry("Create", "pi pi-plus", "/movement"),
                    entry("List", "pi pi-truck", "/movements"),
                ],
            },
            MenuSection {
                label: "Products",
                icon: "pi pi-box",
                items: vec![
                    entry("Stock", "pi pi-warehouse", "/products"),
                    entry("Received", "pi pi-cart-arrow-down", "/products/received"),
                ],
            },
        ],
        UserProfile::Driver => vec![MenuSection {
            label: "Movements",
            icon: "pi pi-arrow-right-arrow-left",
            items: vec![entry("Deliveries", "pi pi-truck", "/movements")],
        }],
    }
}

/// `GET /login/menu`
pub async fn menu(caller: AuthUser) -> Json<Vec<MenuSection>> {
    Json(menu_for(caller.profile))
}
