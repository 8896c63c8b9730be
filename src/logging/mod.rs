//! slog access log: one line per HTTP request.

use axum::{extract::Request, extract::State, middleware::Next, response::Response};
use slog::{o, Drain, Logger};
use slog_async::Async;
use slog_term::{FullFormat, PlainDecorator, TermDecorator};
use std::sync::Arc;
use std::time::{Duration, Instant};

use crate::tracing::{current_request_id, log_slow_request};

#[derive(Debug, Clone)]
pub struct LoggerConfig {
    pub async_buffer_size: usize,
    pub use_color: bool,
    /// Requests slower than this are also reported through `tracing`
    pub slow_request_threshold: Duration,
}

impl Default for LoggerConfig {
    fn default() -> Self {
        Self {
            async_buffer_size: 1024,
            use_color: true,
            slow_request_threshold: Duration::from_millis(1500),
        }
    }
}

pub fn setup_logger(config: &LoggerConfig) -> Logger {
    let decorator = {
        let builder = TermDecorator::new();
        if config.use_color {
            builder.force_color().build()
        } else {
            builder.build()
        }
    };
    let drain = FullFormat::new(decorator).build().fuse();

    let drain = Async::new(drain)
        .chan_size(config.async_buffer_size)
        .build()
        .fuse();

    Logger::root(drain, o!("service" => "branchflow-api", "version" => env!("CARGO_PKG_VERSION")))
}

/// Logger that writes plain lines into any writer, used by tests
pub fn plain_logger<W: std::io::Write + Send + 'static>(writer: W) -> Logger {
    let decorator = PlainDecorator::new(writer);
    let drain = FullFormat::new(decorator).build().fuse();
    let drain = std::sync::Mutex::new(drain).fuse();
    Logger::root(drain, o!())
}

#[derive(Clone)]
pub struct AccessLog {
    logger: Logger,
    slow_request_threshold: Duration,
}

impl AccessLog {
    pub fn new(logger: Logger, config: &LoggerConfig) -> Self {
        Self {
            logger,
            slow_request_threshold: config.slow_request_threshold,
        }
    }
}

pub async fn access_log_middleware(
    State(access_log): State<Arc<AccessLog>>,
    request: Request,
    next: Next,
) -> Response {
    let start = Instant::now();
    let method = request.method().to_string();
    let path = request.uri().path().to_string();

    let response = next.run(request).await;
    let elapsed = start.elapsed();
    let request_id = current_request_id()
        .map(|rid| rid.to_string())
        .unwrap_or_default();

    slog::info!(
        access_log.logger,
        "request";
        "method" => &method,
        "path" => &path,
        "status" => response.status().as_u16(),
        "elapsed_ms" => elapsed.as_millis() as u64,
        "request_id" => request_id,
    );
    log_slow_request(&method, &path, elapsed, access_log.slow_request_threshold);

    response
}
