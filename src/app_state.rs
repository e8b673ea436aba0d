use std::sync::Arc;

use crate::services::{
    invoker::ResilientInvoker, job_store::JobStore, orchestrator::JobOrchestrator,
};

/// Shared application state passed to all route handlers.
#[derive(Clone)]
pub struct AppState {
    pub jobs: Arc<JobStore>,
    pub invoker: Arc<ResilientInvoker>,
    pub orchestrator: Arc<JobOrchestrator>,
}

impl AppState {
    pub fn new(invoker: Arc<ResilientInvoker>, orchestrator: JobOrchestrator) -> Self {
        Self {
            jobs: orchestrator.store().clone(),
            invoker,
            orchestrator: Arc::new(orchestrator),
        }
    }
}
