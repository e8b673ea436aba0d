use chrono::Utc;
use std::sync::Arc;
use std::time::Instant;
use tokio::task::JoinHandle;
use tracing::{error, info, warn};
use uuid::Uuid;

use crate::models::analysis::{AnalysisMetadata, ClaimAnalysis, ResultSnapshot};
use crate::models::job::JobStatus;
use crate::services::claims::ClaimExtractor;
use crate::services::job_store::JobStore;
use crate::services::pipeline::{ClaimPipeline, PipelineError};
use crate::services::transcript::TranscriptSource;

/// Drives one job from Pending to a terminal status.
///
/// Claims run one after another; only the perspectives inside a claim fan
/// out, which caps concurrent provider load per job at one claim's worth.
pub struct JobOrchestrator {
    store: Arc<JobStore>,
    transcripts: Arc<dyn TranscriptSource>,
    extractor: Arc<dyn ClaimExtractor>,
    pipeline: ClaimPipeline,
    max_claims: usize,
}

impl JobOrchestrator {
    pub fn new(
        store: Arc<JobStore>,
        transcripts: Arc<dyn TranscriptSource>,
        extractor: Arc<dyn ClaimExtractor>,
        pipeline: ClaimPipeline,
        max_claims: usize,
    ) -> Self {
        Self {
            store,
            transcripts,
            extractor,
            pipeline,
            max_claims: max_claims.max(1),
        }
    }

    pub fn store(&self) -> &Arc<JobStore> {
        &self.store
    }

    /// Run the job in the background.
    pub fn spawn(self: &Arc<Self>, job_id: Uuid, video_id: String) -> JoinHandle<()> {
        let this = Arc::clone(self);
        tokio::spawn(async move { this.run(job_id, video_id).await })
    }

    /// Run the job to completion, recording any failure on the job itself.
    pub async fn run(&self, job_id: Uuid, video_id: String) {
        let start = Instant::now();
        info!(job_id = %job_id, video_id = %video_id, "Starting analysis job");

        match self.process(job_id, &video_id).await {
            Ok(claims) => {
                metrics::counter!("analysis_jobs_completed").increment(1);
                metrics::histogram!("analysis_processing_seconds").record(start.elapsed().as_secs_f64());
                info!(
                    job_id = %job_id,
                    claims,
                    duration_ms = start.elapsed().as_millis() as u64,
                    "Job completed successfully"
                );
            }
            Err(e) if e.is_evicted() => {
                warn!(job_id = %job_id, "Job was evicted while running, abandoning it");
            }
            Err(e) => {
                metrics::counter!("analysis_jobs_failed").increment(1);
                error!(job_id = %job_id, error = %e, "Job processing failed");
                if let Err(store_err) = self.store.fail(job_id, e.to_string()).await {
                    warn!(job_id = %job_id, error = %store_err, "Could not record job failure");
                }
            }
        }
    }

    async fn process(&self, job_id: Uuid, video_id: &str) -> Result<usize, PipelineError> {
        self.store.update_status(job_id, JobStatus::Processing).await?;

        let transcript = self.transcripts.fetch(video_id).await?;
        let mut claims = self.extractor.extract_claims(&transcript).await?;

        let extracted = claims.len();
        if extracted > self.max_claims {
            warn!(
                job_id = %job_id,
                extracted,
                limit = self.max_claims,
                "Too many claims, analyzing only the first ones"
            );
            claims.truncate(self.max_claims);
        }

        let mut snapshot = ResultSnapshot {
            video_id: video_id.to_string(),
            metadata: AnalysisMetadata {
                analyzed_at: Utc::now(),
                claims_extracted: extracted,
            },
            claims: claims.iter().cloned().map(ClaimAnalysis::pending).collect(),
        };
        self.store.commit_snapshot(job_id, snapshot.clone()).await?;

        for (index, claim) in claims.iter().enumerate() {
            let analysis = self.pipeline.analyze(&self.store, job_id, index, claim).await?;

            let finalized = analysis.clone();
            self.store
                .update_claim(job_id, index, move |slot| *slot = finalized)
                .await?;
            snapshot.claims[index] = analysis;
        }

        snapshot.metadata.analyzed_at = Utc::now();
        let analyzed = snapshot.claims.len();
        self.store.complete(job_id, snapshot).await?;
        Ok(analyzed)
    }
}
