use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use sea_orm_migration::MigratorTrait;
use tracing::info;

use branchflow_api::{
    db::{establish_connection_with_config, DbConfig},
    migrator::Migrator,
};

#[derive(Parser)]
#[command(name = "migration", about = "Manage the BranchFlow database schema", version)]
struct Cli {
    #[arg(long, env = "DATABASE_URL", default_value = "sqlite://branchflow.db?mode=rwc")]
    database_url: String,
    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Apply pending migrations (default)
    Up,
    /// Roll back the last `steps` migrations
    Down {
        #[arg(long, default_value_t = 1)]
        steps: u32,
    },
    /// Print applied and pending migrations
    Status,
    /// Drop every table and reapply all migrations
    Fresh,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_max_level(tracing::Level::INFO)
        .init();

    let cli = Cli::parse();
    let db = establish_connection_with_config(&DbConfig {
        url: cli.database_url.clone(),
        max_connections: 2,
        ..Default::default()
    })
    .await
    .context("failed to connect to database")?;

    match cli.command.unwrap_or(Commands::Up) {
        Commands::Up => {
            Migrator::up(&db, None).await.context("migration failed")?;
            info!("Migration completed successfully");
        }
        Commands::Down { steps } => {
            Migrator::down(&db, Some(steps))
                .await
                .context("rollback failed")?;
            info!(steps, "Rollback completed");
        }
        Commands::Status => {
            Migrator::status(&db).await.context("status failed")?;
        }
        Commands::Fresh => {
            Migrator::fresh(&db).await.context("fresh migration failed")?;
            info!("Schema recreated");
        }
    }

    Ok(())
}
