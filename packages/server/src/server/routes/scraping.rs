//! `/api/scraping` routes: source registry, queueing, and triggered runs.

use axum::{
    body::Bytes,
    extract::{rejection::JsonRejection, Extension, Path},
    http::StatusCode,
    Json,
};
use tracing::info;

use crate::common::ScrapingRunId;
use crate::domains::scraping::{
    CreateJobSourceInput, EnqueueRequest, JobSource, JobSourceWithCounts, ScrapeQueueItem,
    ScrapingRun, TriggerRequest, TriggerResponse,
};
use crate::server::app::AxumAppState;
use crate::server::error::ApiError;

/// POST /api/scraping/trigger
///
/// Records a run and returns at once; the scrape itself happens on the run
/// dispatcher. An absent or empty body means every source.
pub async fn trigger_scraping(
    Extension(state): Extension<AxumAppState>,
    body: Bytes,
) -> Result<Json<TriggerResponse>, ApiError> {
    let request = if body.iter().all(u8::is_ascii_whitespace) {
        TriggerRequest::default()
    } else {
        serde_json::from_slice::<TriggerRequest>(&body)
            .map_err(|e| ApiError::BadRequest(format!("Invalid request body: {}", e)))?
    };
    let sources = request.source_names();

    let run = state.dispatcher.submit(sources.clone()).await?;
    info!(run_id = %run.id, sources = ?sources, "Scraping triggered");

    Ok(Json(TriggerResponse::running(run.id, sources.as_deref())))
}

/// GET /api/scraping/runs/{id}
pub async fn get_run(
    Extension(state): Extension<AxumAppState>,
    Path(id): Path<String>,
) -> Result<Json<ScrapingRun>, ApiError> {
    let id = ScrapingRunId::parse(&id)
        .map_err(|_| ApiError::BadRequest(format!("Invalid run id: {}", id)))?;

    ScrapingRun::find_by_id(id, &state.db_pool)
        .await?
        .map(Json)
        .ok_or_else(|| ApiError::NotFound(format!("Scraping run {} not found", id)))
}

/// GET /api/scraping/sources
pub async fn list_sources(
    Extension(state): Extension<AxumAppState>,
) -> Result<Json<Vec<JobSourceWithCounts>>, ApiError> {
    Ok(Json(JobSource::find_all_with_counts(&state.db_pool).await?))
}

/// POST /api/scraping/sources
pub async fn create_source(
    Extension(state): Extension<AxumAppState>,
    payload: Result<Json<CreateJobSourceInput>, JsonRejection>,
) -> Result<(StatusCode, Json<JobSource>), ApiError> {
    let Json(input) = payload?;
    let new_source = input.validate().map_err(ApiError::Validation)?;

    if JobSource::find_by_name(&new_source.name, &state.db_pool)
        .await?
        .is_some()
    {
        return Err(duplicate(&new_source.name));
    }

    // A concurrent insert can still win between the check and here
    let source = JobSource::create(&new_source, &state.db_pool)
        .await?
        .ok_or_else(|| duplicate(&new_source.name))?;

    info!(source = %source.name, id = %source.id, "Job source registered");
    Ok((StatusCode::CREATED, Json(source)))
}

/// POST /api/scraping/queue
pub async fn enqueue_scrape(
    Extension(state): Extension<AxumAppState>,
    payload: Result<Json<EnqueueRequest>, JsonRejection>,
) -> Result<(StatusCode, Json<ScrapeQueueItem>), ApiError> {
    let Json(request) = payload?;
    let name = request.source.trim();

    let source = JobSource::find_by_name(name, &state.db_pool)
        .await?
        .ok_or_else(|| ApiError::NotFound(format!("Job source '{}' not found", name)))?;

    let item = ScrapeQueueItem::enqueue(source.id, state.queue.max_attempts, &state.db_pool).await?;
    info!(source = %source.name, item_id = %item.id, "Scrape enqueued");

    Ok((StatusCode::CREATED, Json(item)))
}

fn duplicate(name: &str) -> ApiError {
    ApiError::Duplicate(format!("Job source with name '{}' already exists", name))
}
