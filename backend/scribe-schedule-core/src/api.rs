// src/api.rs
use std::sync::Arc;

use axum::http::StatusCode as AxumStatusCode;
use axum::{
    extract::{Path, Query, State},
    response::{IntoResponse, Response},
    routing::{get, post, put},
    Json, Router,
};
use chrono::{Local, NaiveDate};
use serde::Deserialize;
use thiserror::Error;
use tokio::sync::Mutex;
use tower_http::trace::TraceLayer;
use tracing::{error, info, warn};

use crate::analytics::MonthlyAnalytics;
use crate::monthly_report::MonthlyReport;
use crate::readiness::Readiness;
use crate::scheduling_service::{DaySummary, SchedulingService, SubmitOutcome, UpdateOutcome};
use crate::session::{DraftBatch, SessionUpdate, SubmissionRecord};
use crate::submission_store::{StoreError, SubmissionStore};
use crate::time_utils::{ReportMonth, TimeError};

// --- Error Handling ---

#[derive(Error, Debug)]
pub enum ApiError {
    #[error("Submission store error: {0}")]
    Store(#[from] StoreError),
    #[error("Invalid month: {0}")]
    Month(#[from] TimeError),
    #[error("Not found: {0}")]
    NotFound(String),
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status_code, message) = match &self {
            ApiError::Store(e) => {
                error!("Submission store failure: {}", e);
                (
                    AxumStatusCode::INTERNAL_SERVER_ERROR,
                    "Internal server error (submission store). Check logs.".to_string(),
                )
            }
            ApiError::Month(e) => {
                warn!("Rejected request: {}", e);
                (AxumStatusCode::BAD_REQUEST, e.to_string())
            }
            ApiError::NotFound(what) => (AxumStatusCode::NOT_FOUND, format!("{} not found", what)),
        };
        (status_code, Json(serde_json::json!({ "error": message }))).into_response()
    }
}

// --- State ---

pub struct ApiState<S: SubmissionStore> {
    pub service: Arc<Mutex<SchedulingService<S>>>,
    pub submitted_by: Arc<str>,
}

impl<S: SubmissionStore> ApiState<S> {
    pub fn new(service: SchedulingService<S>, submitted_by: &str) -> Self {
        Self {
            service: Arc::new(Mutex::new(service)),
            submitted_by: Arc::from(submitted_by),
        }
    }
}

impl<S: SubmissionStore> Clone for ApiState<S> {
    fn clone(&self) -> Self {
        Self {
            service: Arc::clone(&self.service),
            submitted_by: Arc::clone(&self.submitted_by),
        }
    }
}

// --- Router ---

pub fn router<S>(state: ApiState<S>) -> Router
where
    S: SubmissionStore + Send + Sync + 'static,
{
    let api_routes = Router::new()
        .route(
            "/submissions",
            get(list_submissions::<S>).post(submit_batch::<S>),
        )
        .route(
            "/submissions/{id}",
            put(update_submission::<S>).delete(delete_submission::<S>),
        )
        .route("/readiness", post(check_readiness::<S>))
        .route("/day-summary", get(day_summary::<S>))
        .route("/analytics", get(month_analytics::<S>))
        .route("/reports/{doctor_id}", get(doctor_report::<S>));

    Router::new()
        .route("/health", get(health_check))
        .nest("/api", api_routes)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

// --- Handlers ---

#[derive(Debug, Deserialize)]
pub struct SubmissionQuery {
    pub doctor_id: Option<String>,
    pub date: Option<NaiveDate>,
}

#[derive(Debug, Deserialize)]
pub struct DayQuery {
    pub doctor_id: String,
    pub date: NaiveDate,
}

#[derive(Debug, Deserialize)]
pub struct MonthQuery {
    pub month: String,
    pub doctor_id: Option<String>,
}

async fn health_check() -> Json<serde_json::Value> {
    Json(serde_json::json!({ "status": "ok" }))
}

async fn list_submissions<S: SubmissionStore + Send + Sync + 'static>(
    State(state): State<ApiState<S>>,
    Query(query): Query<SubmissionQuery>,
) -> Result<Json<Vec<SubmissionRecord>>, ApiError> {
    let service = state.service.lock().await;
    let records = service.load_submissions(query.doctor_id.as_deref(), query.date)?;
    Ok(Json(records))
}

async fn check_readiness<S: SubmissionStore + Send + Sync + 'static>(
    State(state): State<ApiState<S>>,
    Json(batch): Json<DraftBatch>,
) -> Result<Json<Readiness>, ApiError> {
    let service = state.service.lock().await;
    let readiness = service.assess(&batch, Local::now().date_naive())?;
    Ok(Json(readiness))
}

async fn submit_batch<S: SubmissionStore + Send + Sync + 'static>(
    State(state): State<ApiState<S>>,
    Json(mut batch): Json<DraftBatch>,
) -> Result<(AxumStatusCode, Json<SubmitOutcome>), ApiError> {
    let mut service = state.service.lock().await;
    let doctor = service
        .roster()
        .find(&batch.doctor_id)
        .cloned()
        .ok_or_else(|| ApiError::NotFound(format!("Doctor {}", batch.doctor_id)))?;

    let outcome = service.submit(&mut batch, &doctor, &state.submitted_by, Local::now().naive_local());
    let status = match &outcome {
        SubmitOutcome::Submitted { records, .. } => {
            info!("API stored {} sessions for {}", records.len(), doctor.doctor_id);
            AxumStatusCode::CREATED
        }
        SubmitOutcome::Rejected { .. } => AxumStatusCode::UNPROCESSABLE_ENTITY,
        SubmitOutcome::StoreFailed { .. } => AxumStatusCode::INTERNAL_SERVER_ERROR,
    };
    Ok((status, Json(outcome)))
}

async fn update_submission<S: SubmissionStore + Send + Sync + 'static>(
    State(state): State<ApiState<S>>,
    Path(id): Path<String>,
    Json(update): Json<SessionUpdate>,
) -> Result<(AxumStatusCode, Json<UpdateOutcome>), ApiError> {
    let mut service = state.service.lock().await;
    let outcome = service.update_session(&id, &update, Local::now().naive_local())?;
    let status = match &outcome {
        UpdateOutcome::Updated { .. } => AxumStatusCode::OK,
        UpdateOutcome::NotFound => AxumStatusCode::NOT_FOUND,
        UpdateOutcome::Rejected { .. } => AxumStatusCode::UNPROCESSABLE_ENTITY,
    };
    Ok((status, Json(outcome)))
}

async fn delete_submission<S: SubmissionStore + Send + Sync + 'static>(
    State(state): State<ApiState<S>>,
    Path(id): Path<String>,
) -> Result<AxumStatusCode, ApiError> {
    let mut service = state.service.lock().await;
    if service.delete_session(&id)? {
        Ok(AxumStatusCode::NO_CONTENT)
    } else {
        Err(ApiError::NotFound(format!("Submission {}", id)))
    }
}

async fn day_summary<S: SubmissionStore + Send + Sync + 'static>(
    State(state): State<ApiState<S>>,
    Query(query): Query<DayQuery>,
) -> Result<Json<DaySummary>, ApiError> {
    let service = state.service.lock().await;
    Ok(Json(service.day_summary(&query.doctor_id, query.date)?))
}

async fn month_analytics<S: SubmissionStore + Send + Sync + 'static>(
    State(state): State<ApiState<S>>,
    Query(query): Query<MonthQuery>,
) -> Result<Json<MonthlyAnalytics>, ApiError> {
    let month = ReportMonth::parse(&query.month)?;
    let service = state.service.lock().await;
    Ok(Json(service.month_analytics(month, query.doctor_id.as_deref())?))
}

async fn doctor_report<S: SubmissionStore + Send + Sync + 'static>(
    State(state): State<ApiState<S>>,
    Path(doctor_id): Path<String>,
    Query(query): Query<MonthQuery>,
) -> Result<Json<MonthlyReport>, ApiError> {
    let month = ReportMonth::parse(&query.month)?;
    let service = state.service.lock().await;
    service
        .monthly_report(month, &doctor_id)?
        .map(Json)
        .ok_or_else(|| ApiError::NotFound(format!("Doctor {}", doctor_id)))
}
