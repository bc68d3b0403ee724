//! Score query endpoints.

use std::collections::{BTreeMap, BTreeSet};

use axum::extract::{Path, State};
use axum::Json;
use serde::Serialize;

use crate::api::error::ApiError;
use crate::api::AppState;
use crate::context::IndexKind;
use crate::ingest::{ConnectionState, IngestStats};

#[derive(Debug, Clone, Serialize)]
pub struct IndexResponse {
    service: &'static str,
    version: &'static str,
}

#[derive(Debug, Clone, Serialize)]
pub struct StudentsResponse {
    pub students: BTreeSet<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct StudentResultsResponse {
    pub student: String,
    pub results: BTreeMap<String, String>,
    pub average: f64,
}

#[derive(Debug, Clone, Serialize)]
pub struct ExamsResponse {
    pub exams: BTreeSet<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct ExamResultsResponse {
    pub exam: String,
    pub results: BTreeMap<String, String>,
    pub average: f64,
}

#[derive(Debug, Clone, Serialize)]
pub struct IngestStatus {
    pub state: ConnectionState,
    pub stats: IngestStats,
}

#[derive(Debug, Clone, Serialize)]
pub struct HealthResponse {
    status: &'static str,
    version: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    ingest: Option<IngestStatus>,
}

/// `GET /`
pub async fn index() -> Json<IndexResponse> {
    Json(IndexResponse {
        service: "Live Test Results",
        version: env!("CARGO_PKG_VERSION"),
    })
}

/// `GET /students`
///
/// Every student that has received at least one score.
pub async fn list_students(
    State(state): State<AppState>,
) -> Result<Json<StudentsResponse>, ApiError> {
    let students = state.queries.list_keys(IndexKind::Students).await?;
    Ok(Json(StudentsResponse { students }))
}

/// `GET /students/{id}`
///
/// The student's score on each exam and their average across exams. A
/// student with no scores yet gets empty results and an average of 0.
pub async fn get_student(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<StudentResultsResponse>, ApiError> {
    let summary = state.queries.summary(IndexKind::Students, &id).await?;
    Ok(Json(StudentResultsResponse {
        student: summary.key,
        results: summary.results,
        average: summary.average,
    }))
}

/// `GET /exams`
pub async fn list_exams(State(state): State<AppState>) -> Result<Json<ExamsResponse>, ApiError> {
    let exams = state.queries.list_keys(IndexKind::Exams).await?;
    Ok(Json(ExamsResponse { exams }))
}

/// `GET /exams/{id}`
///
/// Every student's score on the exam and the average across students.
pub async fn get_exam(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<ExamResultsResponse>, ApiError> {
    let summary = state.queries.summary(IndexKind::Exams, &id).await?;
    Ok(Json(ExamResultsResponse {
        exam: summary.key,
        results: summary.results,
        average: summary.average,
    }))
}

/// `GET /health`
///
/// Liveness plus the ingestion loop's connection state and counters.
pub async fn health(State(state): State<AppState>) -> Json<HealthResponse> {
    let ingest = match &state.ingest {
        Some(monitor) => Some(IngestStatus {
            state: monitor.state().await,
            stats: monitor.stats().await,
        }),
        None => None,
    };

    Json(HealthResponse {
        status: "ok",
        version: env!("CARGO_PKG_VERSION"),
        ingest,
    })
}
