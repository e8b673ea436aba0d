use garde::Validate;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

use crate::models::analysis::ResultSnapshot;
use crate::models::job::{AnalysisJob, JobStatus};

/// Request to analyze a video.
#[derive(Debug, Deserialize, Validate)]
pub struct AnalyzeRequest {
    #[garde(length(min = 1, max = 2048))]
    pub url: String,
}

/// Response after creating an analysis job.
#[derive(Debug, Serialize, Deserialize)]
pub struct JobResponse {
    pub job_id: uuid::Uuid,
    pub status: JobStatus,
}

/// Response for querying job status. Built from one consistent store read.
#[derive(Debug, Serialize)]
pub struct JobStatusResponse {
    pub job_id: uuid::Uuid,
    pub status: JobStatus,
    pub result: Option<Arc<ResultSnapshot>>,
    pub error: Option<String>,
}

impl From<AnalysisJob> for JobStatusResponse {
    fn from(job: AnalysisJob) -> Self {
        Self {
            job_id: job.id,
            status: job.status,
            result: job.result,
            error: job.error,
        }
    }
}
