//! HTTP surface over the query service.
//!
//! # Route Structure
//!
//! - `GET /` - Service banner
//! - `GET /health` - Liveness and ingestion status
//! - `GET /students` - Students with at least one score
//! - `GET /students/{id}` - One student's scores and average
//! - `GET /exams` - Exams with at least one score
//! - `GET /exams/{id}` - One exam's scores and average

mod error;
mod routes;

use axum::routing::get;
use axum::Router;

use crate::ingest::IngestMonitor;
use crate::query::QueryService;

pub use self::error::ApiError;

/// Shared state available to all request handlers.
#[derive(Clone)]
pub struct AppState {
    pub queries: QueryService,
    /// Present when an ingestion loop is running in this process.
    pub ingest: Option<IngestMonitor>,
}

impl AppState {
    pub fn new(queries: QueryService) -> Self {
        Self {
            queries,
            ingest: None,
        }
    }

    pub fn with_ingest(mut self, monitor: IngestMonitor) -> Self {
        self.ingest = Some(monitor);
        self
    }
}

/// Build the complete router.
pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/", get(routes::index))
        .route("/health", get(routes::health))
        .route("/students", get(routes::list_students))
        .route("/students/{id}", get(routes::get_student))
        .route("/exams", get(routes::list_exams))
        .route("/exams/{id}", get(routes::get_exam))
        .with_state(state)
}
