pub mod auth;
pub mod branches;
pub mod common;
pub mod health;
pub mod movements;
pub mod products;
pub mod users;

use crate::{
    db::DatabaseAccess,
    events::EventSender,
    services::{
        branches::BranchService, geocoding::GeocodingClient, movements::MovementService,
        products::ProductService, routing::RoutingClient, users::UserService,
    },
};
use std::sync::Arc;

// Re-export AppState so handler modules can import it as crate::handlers::AppState
pub use crate::AppState;

/// Services layer that encapsulates business logic used by HTTP handlers
#[derive(Clone)]
pub struct AppServices {
    pub users: Arc<UserService>,
    pub products: Arc<ProductService>,
    pub branches: Arc<BranchService>,
    pub movements: Arc<MovementService>,
}

impl AppServices {
    pub fn new(
        db: Arc<DatabaseAccess>,
        event_sender: Arc<EventSender>,
        geocoder: Arc<dyn GeocodingClient>,
        routing: Arc<dyn RoutingClient>,
    ) -> Self {
        Self {
            users: Arc::new(UserService::new(db.clone(), event_sender.clone(), geocoder)),
            products: Arc::new(ProductService::new(db.clone(), event_sender.clone())),
            branches: Arc::new(BranchService::new(db.clone(), routing)),
            movements: Arc::new(MovementService::new(db, event_sender)),
        }
    }
}
