//! scorestream server binary.
//!
//! Starts the ingestion loop against the upstream score feed on a background
//! task, then serves the query API over HTTP.
//!
//! # Configuration
//!
//! Configuration can be provided through multiple sources, in order of precedence:
//!
//! 1. Command-line arguments (highest precedence)
//! 2. Environment variables (prefixed with `SCORESTREAM_`, nested keys joined by `__`)
//! 3. User-specified configuration file (via `--config`)
//! 4. System-wide configuration (`/etc/scorestream/config.toml`)
//! 5. Default configuration (embedded in binary)
//!
//! ## Command-line Options
//!
//! ```text
//! Options:
//!   -c, --config <FILE>              Path to configuration file [env: SCORESTREAM_CONFIG]
//!       --host <HOST>                HTTP listen address
//!       --port <PORT>                HTTP listen port
//!       --upstream-url <URL>         Server-sent event stream to ingest
//!       --max-retries <N>            Consecutive failed reconnects before ingestion gives up
//!       --engine <TYPE>              Storage engine type ("duckdb" or "memory")
//!       --engine-connection <STR>    Storage engine connection string
//!       --engine-options <KEY=VAL>   Storage engine options (repeatable)
//! ```
//!
//! ## Configuration File Format (TOML)
//!
//! ```toml
//! [server]
//! host = "127.0.0.1"
//! port = 8080
//!
//! [upstream]
//! url = "http://live-test-scores.herokuapp.com/scores"
//! initial_backoff_ms = 500
//! max_backoff_ms = 30000
//! backoff_multiplier = 2.0
//!
//! [engine]
//! engine = "duckdb"
//! connection = "scores.db"
//!
//! [indexes]
//! students = "students"
//! exams = "exams"
//! ```
//!
//! # Examples
//!
//! ```bash
//! # Run with default configuration (in-memory DuckDB)
//! scorestream
//!
//! # Persist the indexes and listen publicly
//! scorestream --engine-connection scores.db --host 0.0.0.0 --port 8080
//!
//! # More logging
//! RUST_LOG=scorestream=debug scorestream
//! ```

use axum::http::Request;
use clap::Parser;
use scorestore::StoreEngine;
use scorestream::api::{router, AppState};
use scorestream::{CliArgs, Ingestor, QueryService, ServiceContext, Settings, SseSource};
use std::sync::Arc;
use tower_http::trace::TraceLayer;
use tracing::Level;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    dotenv::dotenv().ok();

    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()))
        .with(tracing_subscriber::fmt::layer())
        .init();

    let cli_args = CliArgs::parse();
    let settings = Settings::new(cli_args)?;

    let engine = StoreEngine::from_config(&settings.engine)?;
    let ctx = ServiceContext::open(&engine, &settings.indexes).await?;
    tracing::info!(
        engine = engine.name(),
        connection = %settings.engine.connection,
        students = %settings.indexes.students,
        exams = %settings.indexes.exams,
        "indexes ready"
    );

    let ingestor = Ingestor::new(
        Arc::new(SseSource::new(settings.upstream.url.clone())),
        ctx.clone(),
        settings.upstream.backoff(),
    );
    let monitor = ingestor.monitor();
    tokio::spawn(async move {
        if let Err(e) = ingestor.run().await {
            tracing::error!(error = %e, "ingestion stopped");
        }
    });

    let state = AppState::new(QueryService::new(ctx)).with_ingest(monitor);
    let app = router(state).layer(TraceLayer::new_for_http().make_span_with(
        |request: &Request<_>| {
            tracing::span!(
                Level::INFO,
                "http_request",
                method = %request.method(),
                path = %request.uri().path(),
            )
        },
    ));

    let bind_addr = settings.server.bind_addr();
    let listener = tokio::net::TcpListener::bind(&bind_addr).await?;
    tracing::info!(addr = %bind_addr, upstream = %settings.upstream.url, "starting server");

    axum::serve(listener, app).await?;

    Ok(())
}
