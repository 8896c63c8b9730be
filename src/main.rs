use std::sync::Arc;

use tokio::{signal, sync::mpsc};
use tracing::{error, info, warn};

use branchflow_api as api;
use api::services::{
    geocoding::{build_http_client, GeocodingClient, HttpGeocodingClient},
    routing::{HttpRoutingClient, RoutingClient},
};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cfg = api::config::load_config()?;
    api::config::init_tracing(cfg.log_level(), cfg.log_json);

    let db_pool = api::db::establish_connection_from_app_config(&cfg).await?;
    if cfg.auto_migrate {
        api::db::run_migrations(&db_pool).await.map_err(|e| {
            error!("Failed running migrations: {}", e);
            e
        })?;
    }
    let db = Arc::new(api::db::DatabaseAccess::new(Arc::new(db_pool)));

    let (event_tx, event_rx) = mpsc::channel(cfg.event_channel_capacity);
    let event_sender = Arc::new(api::events::EventSender::new(event_tx));
    tokio::spawn(api::events::process_events(event_rx));

    let http_client = build_http_client(cfg.external_timeout())?;
    if cfg.geocoding_api_key.is_none() {
        warn!("No geocoding API key configured; new branches will have no coordinates");
    }
    let geocoder: Arc<dyn GeocodingClient> =
        Arc::new(HttpGeocodingClient::from_config(http_client.clone(), &cfg));
    let routing: Arc<dyn RoutingClient> =
        Arc::new(HttpRoutingClient::from_config(http_client, &cfg));

    let auth = Arc::new(api::auth::AuthService::new(
        api::auth::AuthConfig::from_app_config(&cfg),
    ));
    let services = api::handlers::AppServices::new(db.clone(), event_sender, geocoder, routing);

    let logger_config = api::logging::LoggerConfig {
        use_color: !cfg.log_json,
        ..Default::default()
    };
    let access_log = Arc::new(api::logging::AccessLog::new(
        api::logging::setup_logger(&logger_config),
        &logger_config,
    ));

    api::handlers::health::init_start_time();

    let addr = format!("{}:{}", cfg.host, cfg.port);
    let state = api::AppState {
        db,
        config: cfg,
        auth,
        services,
    };
    let app = api::app(state, access_log);

    let listener = tokio::net::TcpListener::bind(&addr).await?;
    info!("branchflow-api listening on http://{}", addr);

    axum::serve(listener, app.into_make_service())
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    info!("Server stopped");
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            error!("Failed to install Ctrl+C handler: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        use tokio::signal::unix::{signal, SignalKind};

        match signal(SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                error!("Failed to install SIGTERM handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
    info!("Shutdown signal received");
}
