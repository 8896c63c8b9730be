//! Creates the first ADMIN account so the API can be used at all.
//!
//! Run with: cargo run --bin seed-admin -- --email admin@example.com --document 12345678909

use std::sync::Arc;

use anyhow::{Context, Result};
use async_trait::async_trait;
use clap::Parser;
use tokio::sync::mpsc;
use tracing::info;

use branchflow_api::{
    db::{self, DatabaseAccess, DbConfig},
    events::EventSender,
    services::{
        geocoding::{Coordinates, GeocodingClient},
        users::{NewUser, UserService},
    },
};

#[derive(Parser)]
#[command(name = "seed-admin", about = "Create an ADMIN account", version)]
struct Cli {
    #[arg(long, env = "DATABASE_URL", default_value = "sqlite://branchflow.db?mode=rwc")]
    database_url: String,
    #[arg(long, default_value = "Administrator")]
    name: String,
    #[arg(long)]
    email: String,
    #[arg(long, env = "SEED_ADMIN_PASSWORD")]
    password: String,
    /// Any identifying document; only DRIVER and BRANCH documents are checked
    #[arg(long)]
    document: String,
    /// Apply migrations before inserting
    #[arg(long)]
    migrate: bool,
}

/// Admin accounts carry no address, so nothing is ever looked up.
struct NoGeocoding;

#[async_trait]
impl GeocodingClient for NoGeocoding {
    async fn coordinates_for(&self, _address: &str) -> Option<Coordinates> {
        None
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_max_level(tracing::Level::INFO)
        .init();

    let cli = Cli::parse();
    let pool = db::establish_connection_with_config(&DbConfig {
        url: cli.database_url.clone(),
        max_connections: 2,
        ..Default::default()
    })
    .await
    .context("failed to connect to database")?;

    if cli.migrate {
        db::run_migrations(&pool).await.context("migration failed")?;
    }

    let (event_tx, _event_rx) = mpsc::channel(8);
    let users = UserService::new(
        Arc::new(DatabaseAccess::new(Arc::new(pool))),
        Arc::new(EventSender::new(event_tx)),
        Arc::new(NoGeocoding),
    );

    let admin = users
        .create_user(NewUser {
            name: cli.name,
            profile: "ADMIN".to_string(),
            email: cli.email,
            password: cli.password,
            document: Some(cli.document),
            address: Default::default(),
            avatar: None,
        })
        .await
        .context("failed to create admin")?;

    info!(user_id = %admin.id, email = %admin.email, "Admin account created");
    Ok(())
}
