use axum::extract::rejection::JsonRejection;
use axum::extract::{Path, State};
use axum::Json;
use garde::Validate;
use uuid::Uuid;

use crate::app_state::AppState;
use crate::models::job::JobStatus;
use crate::models::requests::{AnalyzeRequest, JobResponse, JobStatusResponse};
use crate::routes::ApiError;
use crate::services::job_store::JobStoreError;
use crate::services::transcript::extract_video_id;

/// POST /analyze/jobs: start a background analysis of a video.
pub async fn create_job(
    State(state): State<AppState>,
    body: Result<Json<AnalyzeRequest>, JsonRejection>,
) -> Result<Json<JobResponse>, ApiError> {
    let Json(request) = body.map_err(|rejection| ApiError::InvalidInput(rejection.body_text()))?;
    request
        .validate()
        .map_err(|report| ApiError::InvalidInput(report.to_string()))?;

    let video_id = extract_video_id(&request.url).ok_or_else(|| {
        ApiError::InvalidInput("Invalid video URL: could not extract video ID".to_string())
    })?;

    let job_id = state.jobs.create().await;
    metrics::counter!("analysis_jobs_total").increment(1);
    tracing::info!(job_id = %job_id, video_id = %video_id, "Analysis job submitted");

    state.orchestrator.spawn(job_id, video_id);

    Ok(Json(JobResponse {
        job_id,
        status: JobStatus::Pending,
    }))
}

/// GET /analyze/jobs/{job_id}: current status and latest committed snapshot.
pub async fn get_job_status(
    State(state): State<AppState>,
    Path(job_id): Path<String>,
) -> Result<Json<JobStatusResponse>, ApiError> {
    // Ids that are not UUIDs cannot name a job.
    let Ok(job_id) = Uuid::parse_str(&job_id) else {
        return Err(ApiError::NotFound("Job not found".to_string()));
    };

    match state.jobs.get(job_id).await {
        Ok(job) => Ok(Json(job.into())),
        Err(JobStoreError::NotFound(_)) => Err(ApiError::NotFound("Job not found".to_string())),
        Err(e) => Err(ApiError::Internal(e.to_string())),
    }
}
