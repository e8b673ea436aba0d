//! In-memory job store.
//!
//! One mutex guards the whole map. It is only ever held for map reads and
//! writes, never across provider calls, so slow upstreams do not block
//! unrelated jobs or the reaper.

use chrono::{DateTime, Utc};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;
use uuid::Uuid;

use crate::models::analysis::{ClaimAnalysis, PerspectiveAnalysis, ResultSnapshot};
use crate::models::job::{AnalysisJob, JobStatus};

#[derive(Default)]
pub struct JobStore {
    jobs: Mutex<HashMap<Uuid, AnalysisJob>>,
}

impl JobStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert a new pending job.
    pub async fn create(&self) -> Uuid {
        self.create_at(Utc::now()).await
    }

    pub async fn create_at(&self, created_at: DateTime<Utc>) -> Uuid {
        let id = Uuid::new_v4();
        self.jobs
            .lock()
            .await
            .insert(id, AnalysisJob::new(id, created_at));
        id
    }

    /// A consistent copy of the job. The snapshot inside is shared, not deep-copied.
    pub async fn get(&self, id: Uuid) -> Result<AnalysisJob, JobStoreError> {
        self.jobs
            .lock()
            .await
            .get(&id)
            .cloned()
            .ok_or(JobStoreError::NotFound(id))
    }

    pub async fn len(&self) -> usize {
        self.jobs.lock().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.jobs.lock().await.is_empty()
    }

    pub async fn update_status(&self, id: Uuid, status: JobStatus) -> Result<(), JobStoreError> {
        let mut jobs = self.jobs.lock().await;
        let job = jobs.get_mut(&id).ok_or(JobStoreError::NotFound(id))?;
        transition(job, status)
    }

    /// Replace the job's snapshot wholesale. Rejects a snapshot with fewer claims.
    pub async fn commit_snapshot(
        &self,
        id: Uuid,
        snapshot: ResultSnapshot,
    ) -> Result<(), JobStoreError> {
        let mut jobs = self.jobs.lock().await;
        let job = jobs.get_mut(&id).ok_or(JobStoreError::NotFound(id))?;
        install(job, snapshot)
    }

    /// Record a job-level failure. The last committed snapshot stays visible.
    pub async fn set_error(&self, id: Uuid, message: impl Into<String>) -> Result<(), JobStoreError> {
        let mut jobs = self.jobs.lock().await;
        let job = jobs.get_mut(&id).ok_or(JobStoreError::NotFound(id))?;
        job.error = Some(message.into());
        job.updated_at = Utc::now();
        Ok(())
    }

    /// Move to Failed and store the error in one step, so pollers never see
    /// a failed status without its message.
    pub async fn fail(&self, id: Uuid, message: impl Into<String>) -> Result<(), JobStoreError> {
        let mut jobs = self.jobs.lock().await;
        let job = jobs.get_mut(&id).ok_or(JobStoreError::NotFound(id))?;
        transition(job, JobStatus::Failed)?;
        job.error = Some(message.into());
        Ok(())
    }

    /// Commit the final snapshot and move to Completed in one step.
    pub async fn complete(&self, id: Uuid, snapshot: ResultSnapshot) -> Result<(), JobStoreError> {
        let mut jobs = self.jobs.lock().await;
        let job = jobs.get_mut(&id).ok_or(JobStoreError::NotFound(id))?;
        if !job.status.can_transition_to(JobStatus::Completed) {
            return Err(JobStoreError::InvalidTransition {
                from: job.status,
                to: JobStatus::Completed,
            });
        }
        install(job, snapshot)?;
        transition(job, JobStatus::Completed)
    }

    /// Copy-on-write edit of one claim: clone the current snapshot, apply
    /// `edit`, then swap the new snapshot in.
    pub async fn update_claim<F>(&self, id: Uuid, index: usize, edit: F) -> Result<(), JobStoreError>
    where
        F: FnOnce(&mut ClaimAnalysis),
    {
        let mut jobs = self.jobs.lock().await;
        let job = jobs.get_mut(&id).ok_or(JobStoreError::NotFound(id))?;
        let current = job.result.as_ref().ok_or(JobStoreError::NoSnapshot(id))?;

        let mut next = ResultSnapshot::clone(current);
        let claim = next
            .claims
            .get_mut(index)
            .ok_or(JobStoreError::ClaimOutOfRange { id, index })?;
        edit(claim);

        job.result = Some(Arc::new(next));
        job.updated_at = Utc::now();
        Ok(())
    }

    /// Write one perspective result into a claim. Keys are only ever added or overwritten.
    pub async fn commit_perspective(
        &self,
        id: Uuid,
        index: usize,
        analysis: PerspectiveAnalysis,
    ) -> Result<(), JobStoreError> {
        self.update_claim(id, index, |claim| {
            claim
                .truth_profile
                .perspectives
                .insert(analysis.perspective, analysis);
        })
        .await
    }

    /// Number of perspectives populated for each claim, in claim order.
    pub async fn coverage(&self, id: Uuid) -> Result<Vec<usize>, JobStoreError> {
        let job = self.get(id).await?;
        Ok(job
            .result
            .map(|snapshot| {
                snapshot
                    .claims
                    .iter()
                    .map(|c| c.truth_profile.perspectives.len())
                    .collect()
            })
            .unwrap_or_default())
    }

    /// Evict every job created before `now - ttl`, regardless of status.
    /// Returns the evicted ids.
    pub async fn reap_expired(&self, now: DateTime<Utc>, ttl: Duration) -> Vec<Uuid> {
        let ttl = chrono::Duration::from_std(ttl).unwrap_or(chrono::Duration::MAX);
        let cutoff = now.checked_sub_signed(ttl).unwrap_or(DateTime::<Utc>::MIN_UTC);

        let mut jobs = self.jobs.lock().await;
        let expired: Vec<(Uuid, JobStatus)> = jobs
            .values()
            .filter(|job| job.created_at < cutoff)
            .map(|job| (job.id, job.status))
            .collect();

        for (id, status) in &expired {
            jobs.remove(id);
            if !status.is_terminal() {
                tracing::warn!(job_id = %id, status = status.as_str(), "Evicting job that is still running");
            }
        }
        expired.into_iter().map(|(id, _)| id).collect()
    }
}

fn transition(job: &mut AnalysisJob, next: JobStatus) -> Result<(), JobStoreError> {
    if !job.status.can_transition_to(next) {
        return Err(JobStoreError::InvalidTransition {
            from: job.status,
            to: next,
        });
    }
    job.status = next;
    job.updated_at = Utc::now();
    Ok(())
}

fn install(job: &mut AnalysisJob, snapshot: ResultSnapshot) -> Result<(), JobStoreError> {
    let current = job.result.as_ref().map_or(0, |s| s.claims.len());
    if snapshot.claims.len() < current {
        return Err(JobStoreError::SnapshotRegression {
            id: job.id,
            current,
            proposed: snapshot.claims.len(),
        });
    }
    job.result = Some(Arc::new(snapshot));
    job.updated_at = Utc::now();
    Ok(())
}

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum JobStoreError {
    #[error("Job not found: {0}")]
    NotFound(Uuid),

    #[error("Invalid status transition from {} to {}", .from.as_str(), .to.as_str())]
    InvalidTransition { from: JobStatus, to: JobStatus },

    #[error("Job {id} snapshot would shrink from {current} to {proposed} claims")]
    SnapshotRegression {
        id: Uuid,
        current: usize,
        proposed: usize,
    },

    #[error("Job {0} has no snapshot yet")]
    NoSnapshot(Uuid),

    #[error("Job {id} has no claim at index {index}")]
    ClaimOutOfRange { id: Uuid, index: usize },
}
