use std::sync::Arc;

use axum::Router;
use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::routing::{get, post};
use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;
use uuid::Uuid;

use trawler_core::traits::{DataStore, Fetcher, JobStore, RecordQuery};

use crate::dto::{
    CancelJobResponse, CreateJobRequest, ExecuteJobResponse, HealthResponse, JobListResponse,
    JobResponse, ListJobsQuery, ListRecordsQuery, RecordListResponse, RecordResponse,
    StatsResponse, UpdateJobRequest,
};
use crate::error::ApiError;
use crate::openapi::ApiDoc;
use crate::state::AppState;

const DEFAULT_PAGE_SIZE: usize = 20;
const MAX_PAGE_SIZE: usize = 100;

fn page_size(limit: Option<usize>) -> usize {
    limit.unwrap_or(DEFAULT_PAGE_SIZE).min(MAX_PAGE_SIZE)
}

/// Build the full router with all routes.
pub fn router<F, J, D>(state: Arc<AppState<F, J, D>>) -> Router
where
    F: Fetcher + 'static,
    J: JobStore + 'static,
    D: DataStore + 'static,
{
    Router::new()
        .route("/v1/jobs", post(create_job).get(list_jobs))
        .route(
            "/v1/jobs/{id}",
            get(get_job).put(update_job).delete(delete_job),
        )
        .route("/v1/jobs/{id}/execute", post(execute_job))
        .route("/v1/jobs/{id}/cancel", post(cancel_job))
        .route("/v1/records", get(list_records))
        .route("/v1/records/{id}", get(get_record))
        .route("/v1/stats", get(stats))
        .route("/health", get(health))
        .merge(SwaggerUi::new("/swagger-ui").url("/api-docs/openapi.json", ApiDoc::openapi()))
        .with_state(state)
}

// ---------------------------------------------------------------------------
// Jobs
// ---------------------------------------------------------------------------

#[utoipa::path(
    post,
    path = "/v1/jobs",
    request_body = CreateJobRequest,
    responses(
        (status = 201, description = "Job created", body = JobResponse),
        (status = 400, description = "Validation failed", body = crate::dto::ErrorResponse),
    ),
    tag = "jobs"
)]
pub async fn create_job<F, J, D>(
    State(state): State<Arc<AppState<F, J, D>>>,
    axum::Json(body): axum::Json<CreateJobRequest>,
) -> Result<impl IntoResponse, ApiError>
where
    F: Fetcher + 'static,
    J: JobStore + 'static,
    D: DataStore + 'static,
{
    let job = state.manager.create_job(body.into()).await?;
    Ok((StatusCode::CREATED, axum::Json(JobResponse::from(job))))
}

#[utoipa::path(
    get,
    path = "/v1/jobs",
    params(ListJobsQuery),
    responses(
        (status = 200, description = "List of jobs", body = JobListResponse),
        (status = 400, description = "Bad status filter", body = crate::dto::ErrorResponse),
    ),
    tag = "jobs"
)]
pub async fn list_jobs<F, J, D>(
    State(state): State<Arc<AppState<F, J, D>>>,
    Query(query): Query<ListJobsQuery>,
) -> Result<impl IntoResponse, ApiError>
where
    F: Fetcher + 'static,
    J: JobStore + 'static,
    D: DataStore + 'static,
{
    let status = query
        .status
        .map(|s| {
            s.parse()
                .map_err(|e: String| trawler_core::ScrapeError::Validation(e))
        })
        .transpose()?;

    let limit = page_size(query.limit);
    let offset = query.offset.unwrap_or(0);
    let (jobs, total) = state.manager.list_jobs(status, limit, offset).await?;

    let has_more = ((offset + jobs.len()) as u64) < total;
    let response = JobListResponse {
        jobs: jobs.into_iter().map(JobResponse::from).collect(),
        total,
        limit,
        offset,
        has_more,
    };

    Ok(axum::Json(response))
}

#[utoipa::path(
    get,
    path = "/v1/jobs/{id}",
    params(("id" = Uuid, Path, description = "Job ID")),
    responses(
        (status = 200, description = "Job details", body = JobResponse),
        (status = 404, description = "Not found", body = crate::dto::ErrorResponse),
    ),
    tag = "jobs"
)]
pub async fn get_job<F, J, D>(
    State(state): State<Arc<AppState<F, J, D>>>,
    Path(id): Path<Uuid>,
) -> Result<impl IntoResponse, ApiError>
where
    F: Fetcher + 'static,
    J: JobStore + 'static,
    D: DataStore + 'static,
{
    let job = state.manager.get_job(id).await?;
    Ok(axum::Json(JobResponse::from(job)))
}

#[utoipa::path(
    put,
    path = "/v1/jobs/{id}",
    params(("id" = Uuid, Path, description = "Job ID")),
    request_body = UpdateJobRequest,
    responses(
        (status = 200, description = "Updated job", body = JobResponse),
        (status = 404, description = "Not found", body = crate::dto::ErrorResponse),
        (status = 409, description = "Job is running or completed", body = crate::dto::ErrorResponse),
    ),
    tag = "jobs"
)]
pub async fn update_job<F, J, D>(
    State(state): State<Arc<AppState<F, J, D>>>,
    Path(id): Path<Uuid>,
    axum::Json(body): axum::Json<UpdateJobRequest>,
) -> Result<impl IntoResponse, ApiError>
where
    F: Fetcher + 'static,
    J: JobStore + 'static,
    D: DataStore + 'static,
{
    let job = state.manager.update_job(id, body.into()).await?;
    Ok(axum::Json(JobResponse::from(job)))
}

#[utoipa::path(
    delete,
    path = "/v1/jobs/{id}",
    params(("id" = Uuid, Path, description = "Job ID")),
    responses(
        (status = 204, description = "Job deleted"),
        (status = 404, description = "Not found", body = crate::dto::ErrorResponse),
        (status = 409, description = "Job is running", body = crate::dto::ErrorResponse),
    ),
    tag = "jobs"
)]
pub async fn delete_job<F, J, D>(
    State(state): State<Arc<AppState<F, J, D>>>,
    Path(id): Path<Uuid>,
) -> Result<impl IntoResponse, ApiError>
where
    F: Fetcher + 'static,
    J: JobStore + 'static,
    D: DataStore + 'static,
{
    state.manager.delete_job(id).await?;
    Ok(StatusCode::NO_CONTENT)
}

#[utoipa::path(
    post,
    path = "/v1/jobs/{id}/execute",
    params(("id" = Uuid, Path, description = "Job ID")),
    responses(
        (status = 202, description = "Execution started", body = ExecuteJobResponse),
        (status = 404, description = "Not found", body = crate::dto::ErrorResponse),
        (status = 409, description = "Job is not pending", body = crate::dto::ErrorResponse),
    ),
    tag = "jobs"
)]
pub async fn execute_job<F, J, D>(
    State(state): State<Arc<AppState<F, J, D>>>,
    Path(id): Path<Uuid>,
) -> Result<impl IntoResponse, ApiError>
where
    F: Fetcher + 'static,
    J: JobStore + 'static,
    D: DataStore + 'static,
{
    // Fire-and-forget: the handle is dropped, execution continues detached.
    let handle = state.manager.execute_job(id).await?;
    let response = ExecuteJobResponse {
        job_id: handle.job_id,
        status: trawler_core::JobStatus::Running.to_string(),
    };
    Ok((StatusCode::ACCEPTED, axum::Json(response)))
}

#[utoipa::path(
    post,
    path = "/v1/jobs/{id}/cancel",
    params(("id" = Uuid, Path, description = "Job ID")),
    responses(
        (status = 200, description = "Cancellation outcome", body = CancelJobResponse),
        (status = 404, description = "Not found", body = crate::dto::ErrorResponse),
    ),
    tag = "jobs"
)]
pub async fn cancel_job<F, J, D>(
    State(state): State<Arc<AppState<F, J, D>>>,
    Path(id): Path<Uuid>,
) -> Result<impl IntoResponse, ApiError>
where
    F: Fetcher + 'static,
    J: JobStore + 'static,
    D: DataStore + 'static,
{
    let cancelled = state.manager.cancel_job(id).await?;
    Ok(axum::Json(CancelJobResponse {
        job_id: id,
        cancelled,
    }))
}

// ---------------------------------------------------------------------------
// Records
// ---------------------------------------------------------------------------

#[utoipa::path(
    get,
    path = "/v1/records",
    params(ListRecordsQuery),
    responses(
        (status = 200, description = "Scraped records, newest first", body = RecordListResponse),
    ),
    tag = "records"
)]
pub async fn list_records<F, J, D>(
    State(state): State<Arc<AppState<F, J, D>>>,
    Query(query): Query<ListRecordsQuery>,
) -> Result<impl IntoResponse, ApiError>
where
    F: Fetcher + 'static,
    J: JobStore + 'static,
    D: DataStore + 'static,
{
    let limit = page_size(query.limit);
    let offset = query.offset.unwrap_or(0);
    let record_query = RecordQuery {
        job_id: query.job_id,
        url: query.url,
        limit,
        offset,
    };

    let (records, total) = state.manager.records(&record_query).await?;
    let has_more = ((offset + records.len()) as u64) < total;

    Ok(axum::Json(RecordListResponse {
        records: records.into_iter().map(RecordResponse::from).collect(),
        total,
        limit,
        offset,
        has_more,
    }))
}

#[utoipa::path(
    get,
    path = "/v1/records/{id}",
    params(("id" = Uuid, Path, description = "Record ID")),
    responses(
        (status = 200, description = "Record details", body = RecordResponse),
        (status = 404, description = "Not found", body = crate::dto::ErrorResponse),
    ),
    tag = "records"
)]
pub async fn get_record<F, J, D>(
    State(state): State<Arc<AppState<F, J, D>>>,
    Path(id): Path<Uuid>,
) -> Result<impl IntoResponse, ApiError>
where
    F: Fetcher + 'static,
    J: JobStore + 'static,
    D: DataStore + 'static,
{
    let record = state.manager.get_record(id).await?;
    Ok(axum::Json(RecordResponse::from(record)))
}

// ---------------------------------------------------------------------------
// Stats & Health
// ---------------------------------------------------------------------------

#[utoipa::path(
    get,
    path = "/v1/stats",
    responses(
        (status = 200, description = "Job counts by status and total records", body = StatsResponse),
    ),
    tag = "system"
)]
pub async fn stats<F, J, D>(
    State(state): State<Arc<AppState<F, J, D>>>,
) -> Result<impl IntoResponse, ApiError>
where
    F: Fetcher + 'static,
    J: JobStore + 'static,
    D: DataStore + 'static,
{
    let stats = state.manager.stats().await?;
    Ok(axum::Json(StatsResponse::from(stats)))
}

#[utoipa::path(
    get,
    path = "/health",
    responses(
        (status = 200, description = "Service is healthy", body = HealthResponse),
        (status = 503, description = "Service is unhealthy", body = HealthResponse),
    ),
    tag = "system"
)]
pub async fn health<F, J, D>(State(state): State<Arc<AppState<F, J, D>>>) -> impl IntoResponse
where
    F: Fetcher + 'static,
    J: JobStore + 'static,
    D: DataStore + 'static,
{
    let db_status = match &state.db {
        Some(db) => match db.health_check().await {
            Ok(()) => "ok",
            Err(_) => "error",
        },
        None => "ok",
    };

    let status = if db_status == "ok" {
        StatusCode::OK
    } else {
        StatusCode::SERVICE_UNAVAILABLE
    };

    let response = HealthResponse {
        status: if db_status == "ok" {
            "healthy"
        } else {
            "unhealthy"
        },
        database: db_status,
    };

    (status, axum::Json(response))
}
