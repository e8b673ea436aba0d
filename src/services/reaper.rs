use chrono::Utc;
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;

use crate::services::job_store::JobStore;

/// Periodically evicts jobs older than `ttl`, whatever their status.
///
/// An orchestration still running against an evicted job notices on its next
/// store write and stops.
pub fn spawn_reaper(store: Arc<JobStore>, ttl: Duration, every: Duration) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(every);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        // The first tick completes immediately.
        ticker.tick().await;

        tracing::info!(
            ttl_secs = ttl.as_secs(),
            interval_secs = every.as_secs(),
            "Job reaper started"
        );

        loop {
            ticker.tick().await;
            sweep(&store, ttl).await;
        }
    })
}

/// One reaper pass. Returns how many jobs were evicted.
pub async fn sweep(store: &JobStore, ttl: Duration) -> usize {
    let evicted = store.reap_expired(Utc::now(), ttl).await;
    if !evicted.is_empty() {
        metrics::counter!("analysis_jobs_reaped_total").increment(evicted.len() as u64);
        tracing::info!(evicted = evicted.len(), "Reaped expired jobs");
    } else {
        tracing::trace!("No expired jobs");
    }
    evicted.len()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_sweep_removes_only_expired() {
        let store = JobStore::new();
        let old = store.create_at(Utc::now() - chrono::Duration::minutes(90)).await;
        let fresh = store.create().await;

        assert_eq!(sweep(&store, Duration::from_secs(3600)).await, 1);
        assert!(store.get(old).await.is_err());
        assert!(store.get(fresh).await.is_ok());
    }

    #[tokio::test]
    async fn test_background_reaper_evicts() {
        let store = Arc::new(JobStore::new());
        let old = store.create_at(Utc::now() - chrono::Duration::hours(2)).await;

        let handle = spawn_reaper(store.clone(), Duration::from_secs(3600), Duration::from_millis(10));
        tokio::time::sleep(Duration::from_millis(100)).await;
        handle.abort();

        assert!(store.get(old).await.is_err());
    }
}
