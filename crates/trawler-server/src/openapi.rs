use utoipa::OpenApi;

#[derive(OpenApi)]
#[openapi(
    info(
        title = "Trawler API",
        version = "0.2.0",
        description = "Declarative web scraping jobs with selector-based extraction."
    ),
    paths(
        crate::routes::create_job,
        crate::routes::list_jobs,
        crate::routes::get_job,
        crate::routes::update_job,
        crate::routes::delete_job,
        crate::routes::execute_job,
        crate::routes::cancel_job,
        crate::routes::list_records,
        crate::routes::get_record,
        crate::routes::stats,
        crate::routes::health,
    ),
    components(schemas(
        crate::dto::CreateJobRequest,
        crate::dto::UpdateJobRequest,
        crate::dto::JobResponse,
        crate::dto::JobListResponse,
        crate::dto::ExecuteJobResponse,
        crate::dto::CancelJobResponse,
        crate::dto::RecordResponse,
        crate::dto::RecordMetadataResponse,
        crate::dto::RecordListResponse,
        crate::dto::StatsResponse,
        crate::dto::HealthResponse,
        crate::dto::ErrorResponse,
    )),
    tags(
        (name = "jobs", description = "Scraper job management"),
        (name = "records", description = "Extracted record queries"),
        (name = "system", description = "Health and system status"),
    )
)]
pub struct ApiDoc;
