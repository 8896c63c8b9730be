//! BranchFlow API Library
//!
//! Inventory transfers between branches: stock, movements and the driver
//! workflow that carries them, behind a JWT-protected REST API.
#![forbid(unsafe_code)]
#![deny(rust_2018_idioms)]
#![allow(elided_lifetimes_in_paths)]
#![warn(clippy::all, clippy::perf, clippy::dbg_macro)]

pub mod auth;
pub mod commands;
pub mod config;
pub mod db;
pub mod entities;
pub mod errors;
pub mod events;
pub mod handlers;
pub mod logging;
pub mod middleware_helpers;
pub mod migrator;
pub mod services;
pub mod tracing;
pub mod validation;

use axum::{
    extract::DefaultBodyLimit,
    http::HeaderValue,
    routing::{get, patch, post},
    Router,
};
use std::sync::Arc;
use tower_http::{
    compression::CompressionLayer,
    cors::{AllowHeaders, AllowMethods, Any, CorsLayer},
};

use crate::auth::consts as perm;
use crate::auth::{AuthRouterExt, AuthService};
use crate::db::DatabaseAccess;
use crate::logging::AccessLog;

// App state definition
#[derive(Clone)]
pub struct AppState {
    pub db: Arc<DatabaseAccess>,
    pub config: config::AppConfig,
    pub auth: Arc<AuthService>,
    pub services: handlers::AppServices,
}

fn login_routes() -> Router<AppState> {
    let public = Router::new().route("/login", post(handlers::auth::login));

    let authenticated = Router::new()
        .route("/login/validate", get(handlers::auth::validate_token))
        .route("/login/menu", get(handlers::auth::menu))
        .with_auth();

    public.merge(authenticated)
}

fn user_routes() -> Router<AppState> {
    let create = Router::new()
        .route("/users", post(handlers::users::create_user))
        .with_permission(perm::USERS_CREATE);

    let read = Router::new()
        .route("/users", get(handlers::users::list_users))
        .with_permission(perm::USERS_READ);

    // Admin or the account owner; checked by the service
    let own_account = Router::new()
        .route(
            "/users/:id",
            get(handlers::users::get_user).put(handlers::users::update_user),
        )
        .with_auth();

    let status = Router::new()
        .route("/users/:id/status", patch(handlers::users::update_status))
        .with_permission(perm::USERS_UPDATE);

    create.merge(read).merge(own_account).merge(status)
}

fn product_routes() -> Router<AppState> {
    let create = Router::new()
        .route("/products", post(handlers::products::create_product))
        .with_permission(perm::PRODUCTS_CREATE);

    let read = Router::new()
        .route("/products", get(handlers::products::list_products))
        .with_permission(perm::PRODUCTS_READ);

    let update = Router::new()
        .route("/products/:id", patch(handlers::products::update_product))
        .with_permission(perm::PRODUCTS_UPDATE);

    create.merge(read).merge(update)
}

fn branch_routes() -> Router<AppState> {
    let read = Router::new()
        .route("/branches", get(handlers::branches::list_movements))
        .route(
            "/branches/destination",
            get(handlers::branches::list_destinations),
        )
        .with_permission(perm::BRANCHES_READ);

    let routing = Router::new()
        .route("/branches/map", get(handlers::branches::map_markers))
        .route("/branches/route", post(handlers::branches::route))
        .with_permission(perm::ROUTES_READ);

    read.merge(routing)
}

fn movement_routes() -> Router<AppState> {
    let create = Router::new()
        .route("/movements", post(handlers::movements::create_movement))
        .with_permission(perm::MOVEMENTS_CREATE);

    let deliver = Router::new()
        .route("/movements", get(handlers::movements::driver_queue))
        .route(
            "/movements/:id/start",
            patch(handlers::movements::start_movement),
        )
        .route("/movements/:id/end", patch(handlers::movements::end_movement))
        .with_permission(perm::MOVEMENTS_DELIVER);

    let read = Router::new()
        .route("/movements/inbound", get(handlers::movements::inbound))
        .route("/movements/outbound", get(handlers::movements::outbound))
        .route("/movements/finished", get(handlers::movements::finished))
        .with_permission(perm::MOVEMENTS_READ);

    let receive = Router::new()
        .route(
            "/movements/:id/finish",
            post(handlers::movements::finish_movement),
        )
        .with_permission(perm::MOVEMENTS_RECEIVE);

    create.merge(deliver).merge(read).merge(receive)
}

/// Every resource route, relative to `/api/v1`
pub fn api_v1_routes() -> Router<AppState> {
    Router::new()
        .route("/status", get(handlers::health::status))
        .merge(login_routes())
        .merge(user_routes())
        .merge(product_routes())
        .merge(branch_routes())
        .merge(movement_routes())
}

/// CORS from configuration. Without configured origins only development
/// runs are permissive.
pub fn cors_layer(cfg: &config::AppConfig) -> CorsLayer {
    let origins: Vec<HeaderValue> = cfg
        .cors_origins()
        .iter()
        .filter(|origin| origin.as_str() != "*")
        .filter_map(|origin| HeaderValue::from_str(origin).ok())
        .collect();

    if !origins.is_empty() {
        let layer = CorsLayer::new().allow_origin(origins);
        // wildcards cannot be combined with credentials
        if cfg.cors_allow_credentials {
            layer
                .allow_methods(AllowMethods::mirror_request())
                .allow_headers(AllowHeaders::mirror_request())
                .allow_credentials(true)
        } else {
            layer.allow_methods(Any).allow_headers(Any)
        }
    } else if cfg.is_development() {
        CorsLayer::permissive()
    } else {
        CorsLayer::new()
    }
}

/// The complete HTTP application
pub fn app(state: AppState, access_log: Arc<AccessLog>) -> Router {
    let cors = cors_layer(&state.config);
    let body_limit = state.config.max_body_size;
    let auth = state.auth.clone();

    Router::new()
        .route("/health", get(handlers::health::health))
        .nest("/api/v1", api_v1_routes())
        .layer(DefaultBodyLimit::max(body_limit))
        .layer(axum::middleware::from_fn_with_state(
            auth,
            auth::provide_auth_service,
        ))
        .layer(CompressionLayer::new())
        .layer(cors)
        .layer(axum::middleware::from_fn_with_state(
            access_log,
            logging::access_log_middleware,
        ))
        .layer(crate::tracing::configure_http_tracing())
        // Outermost, so every layer above sees the request id
        .layer(axum::middleware::from_fn(
            middleware_helpers::request_id::request_id_middleware,
        ))
        .with_state(state)
}
