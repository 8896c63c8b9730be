#![allow(dead_code)]

use std::sync::Arc;

use async_trait::async_trait;
use axum::{
    body::{to_bytes, Body},
    http::{Method, Request, StatusCode},
    response::Response,
    Router,
};
use branchflow_api::{
    auth::{AuthConfig, AuthService},
    config::AppConfig,
    db::{self, DatabaseAccess, DbConfig},
    entities::{branch, driver, product, user},
    events::{self, EventSender},
    handlers::AppServices,
    logging::{plain_logger, AccessLog, LoggerConfig},
    services::{
        geocoding::{Coordinates, GeocodingClient},
        routing::{HttpRoutingClient, RoutingClient},
        users::{Address, NewUser},
    },
    AppState,
};
use sea_orm::{ActiveModelTrait, ColumnTrait, EntityTrait, QueryFilter, Set};
use serde_json::Value;
use tokio::sync::mpsc;
use tower::ServiceExt;
use uuid::Uuid;

pub const JWT_SECRET: &str =
    "Qz7mV2pL9xR4tK8wN3bJ6hF1dS5gY0cA-branchflow-integration-secret";
pub const PASSWORD: &str = "secret123";
/// Valid CPF check digits
pub const CPF: &str = "529.982.247-25";
/// Valid CNPJ check digits
pub const CNPJ: &str = "11.222.333/0001-81";

/// Always answers with the same coordinates
pub struct FixedGeocoder(pub Coordinates);

#[async_trait]
impl GeocodingClient for FixedGeocoder {
    async fn coordinates_for(&self, _address: &str) -> Option<Coordinates> {
        Some(self.0)
    }
}

/// Application wired to an in-memory SQLite database
pub struct TestApp {
    router: Router,
    pub state: AppState,
    _event_task: tokio::task::JoinHandle<()>,
}

impl TestApp {
    pub async fn new() -> Self {
        // Nothing listens on port 9; routing calls fail fast.
        Self::with_routing_url("http://127.0.0.1:9/v2/directions/driving-car").await
    }

    pub async fn with_routing_url(routing_url: &str) -> Self {
        let mut cfg = AppConfig::new(
            "sqlite::memory:".to_string(),
            JWT_SECRET.to_string(),
            3600,
            "127.0.0.1".to_string(),
            0,
            "test".to_string(),
        );
        cfg.db_max_connections = 1;
        cfg.db_min_connections = 1;
        cfg.routing_api_key = Some("routing-key".to_string());

        // A single connection keeps every query on the same in-memory database.
        let pool = db::establish_connection_with_config(&DbConfig::from(&cfg))
            .await
            .expect("in-memory database");
        db::run_migrations(&pool).await.expect("migrations");
        let db = Arc::new(DatabaseAccess::new(Arc::new(pool)));

        let (event_tx, event_rx) = mpsc::channel(256);
        let event_sender = Arc::new(EventSender::new(event_tx));
        let event_task = tokio::spawn(events::process_events(event_rx));

        let geocoder: Arc<dyn GeocodingClient> = Arc::new(FixedGeocoder(Coordinates {
            lat: -8.0476,
            lng: -34.877,
        }));
        let routing: Arc<dyn RoutingClient> = Arc::new(HttpRoutingClient::new(
            reqwest::Client::new(),
            routing_url,
            cfg.routing_api_key.clone(),
        ));

        let auth = Arc::new(AuthService::new(AuthConfig::from_app_config(&cfg)));
        let services = AppServices::new(db.clone(), event_sender, geocoder, routing);
        let state = AppState {
            db,
            config: cfg,
            auth,
            services,
        };

        let logger_config = LoggerConfig::default();
        let access_log = Arc::new(AccessLog::new(
            plain_logger(std::io::sink()),
            &logger_config,
        ));
        let router = branchflow_api::app(state.clone(), access_log);

        Self {
            router,
            state,
            _event_task: event_task,
        }
    }

    pub async fn request(
        &self,
        method: Method,
        uri: &str,
        body: Option<Value>,
        token: Option<&str>,
    ) -> Response {
        let mut builder = Request::builder().method(method).uri(uri);
        if let Some(token) = token {
            builder = builder.header("authorization", format!("Bearer {}", token));
        }

        let body = match body {
            Some(json) => {
                builder = builder.header("content-type", "application/json");
                Body::from(serde_json::to_vec(&json).expect("serialize request body"))
            }
            None => Body::empty(),
        };

        self.router
            .clone()
            .oneshot(builder.body(body).expect("build request"))
            .await
            .expect("router error")
    }

    pub async fn get(&self, uri: &str, token: &str) -> Response {
        self.request(Method::GET, uri, None, Some(token)).await
    }

    pub async fn post(&self, uri: &str, body: Value, token: &str) -> Response {
        self.request(Method::POST, uri, Some(body), Some(token)).await
    }

    pub async fn patch(&self, uri: &str, body: Option<Value>, token: &str) -> Response {
        self.request(Method::PATCH, uri, body, Some(token)).await
    }

    pub fn token_for(&self, user: &user::Model) -> String {
        self.state
            .auth
            .generate_token(user)
            .expect("issue token")
            .access_token
    }

    pub async fn create_user(&self, input: NewUser) -> user::Model {
        self.state
            .services
            .users
            .create_user(input)
            .await
            .expect("seed user")
    }

    pub async fn seed_admin(&self, email: &str) -> (user::Model, String) {
        let admin = self
            .create_user(new_user("Admin User", "ADMIN", email, None))
            .await;
        let token = self.token_for(&admin);
        (admin, token)
    }

    pub async fn seed_branch(&self, name: &str, email: &str) -> (branch::Model, String) {
        let user = self
            .create_user(new_user(name, "BRANCH", email, Some(CNPJ)))
            .await;
        let branch = branch::Entity::find()
            .filter(branch::Column::UserId.eq(user.id))
            .one(self.state.db.pool())
            .await
            .expect("query branch")
            .expect("branch row");
        let token = self.token_for(&user);
        (branch, token)
    }

    pub async fn seed_driver(&self, name: &str, email: &str) -> (driver::Model, String) {
        let user = self
            .create_user(new_user(name, "DRIVER", email, Some(CPF)))
            .await;
        let driver = driver::Entity::find()
            .filter(driver::Column::UserId.eq(user.id))
            .one(self.state.db.pool())
            .await
            .expect("query driver")
            .expect("driver row");
        let token = self.token_for(&user);
        (driver, token)
    }

    pub async fn seed_product(&self, branch_id: Uuid, name: &str, quantity: i32) -> product::Model {
        product::ActiveModel {
            id: Set(Uuid::new_v4()),
            branch_id: Set(branch_id),
            name: Set(name.to_string()),
            description: Set(Some(format!("{} for tests", name))),
            quantity: Set(quantity),
            avatar: Set(None),
            url_cover: Set(None),
            ..Default::default()
        }
        .insert(self.state.db.pool())
        .await
        .expect("seed product")
    }

    pub async fn product(&self, id: Uuid) -> product::Model {
        product::Entity::find_by_id(id)
            .one(self.state.db.pool())
            .await
            .expect("query product")
            .expect("product row")
    }

    pub async fn products_at(&self, branch_id: Uuid) -> Vec<product::Model> {
        product::Entity::find()
            .filter(product::Column::BranchId.eq(branch_id))
            .all(self.state.db.pool())
            .await
            .expect("query products")
    }
}

impl Drop for TestApp {
    fn drop(&mut self) {
        self._event_task.abort();
    }
}

pub fn address() -> Address {
    Address {
        street: Some("Rua da Aurora".into()),
        number: Some("100".into()),
        neighborhood: Some("Boa Vista".into()),
        city: Some("Recife".into()),
        state: Some("PE".into()),
        complement: None,
        zip_code: Some("50050-000".into()),
    }
}

/// Input for a valid account of `profile`. Admins get no address.
pub fn new_user(name: &str, profile: &str, email: &str, document: Option<&str>) -> NewUser {
    let needs_address = profile != "ADMIN";
    NewUser {
        name: name.to_string(),
        profile: profile.to_string(),
        email: email.to_string(),
        password: PASSWORD.to_string(),
        document: Some(document.unwrap_or("12345678909").to_string()),
        address: if needs_address {
            address()
        } else {
            Address::default()
        },
        avatar: None,
    }
}

pub async fn body_json(response: Response) -> Value {
    let bytes = to_bytes(response.into_body(), usize::MAX)
        .await
        .expect("read body");
    if bytes.is_empty() {
        return Value::Null;
    }
    serde_json::from_slice(&bytes).expect("json body")
}

pub async fn expect_status(response: Response, status: StatusCode) -> Value {
    let actual = response.status();
    let body = body_json(response).await;
    assert_eq!(actual, status, "unexpected status, body: {}", body);
    body
}
