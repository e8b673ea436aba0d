//! Test helper utilities for API testing

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::time::sleep;
use uuid::Uuid;

use perspective_prism::app_state::AppState;
use perspective_prism::models::analysis::{Claim, Transcript, TranscriptSegment};
use perspective_prism::routes;
use perspective_prism::services::{
    assessment::DeceptionThresholds,
    claims::{ClaimError, ClaimExtractor},
    evidence::NoEvidence,
    invoker::ResilientInvoker,
    job_store::JobStore,
    llm::{LlmProvider, Prompt, ProviderError},
    orchestrator::JobOrchestrator,
    pipeline::ClaimPipeline,
    transcript::{TranscriptError, TranscriptSource},
};

/// Response from POST /analyze/jobs
#[derive(Debug, Serialize, Deserialize)]
pub struct JobResponse {
    pub job_id: Uuid,
    pub status: String,
}

/// Response from GET /analyze/jobs/{job_id}
#[derive(Debug, Serialize, Deserialize)]
pub struct JobStatusResponse {
    pub job_id: Uuid,
    pub status: String,
    pub result: Option<serde_json::Value>,
    pub error: Option<String>,
}

/// Provider that answers perspective prompts with "Support" and bias prompts
/// with a low deception score, or fails everything once switched off.
pub struct SwitchableAnalyst {
    pub name: &'static str,
    pub healthy: AtomicBool,
}

impl SwitchableAnalyst {
    pub fn new(name: &'static str, healthy: bool) -> Arc<Self> {
        Arc::new(Self {
            name,
            healthy: AtomicBool::new(healthy),
        })
    }

    pub fn set_healthy(&self, healthy: bool) {
        self.healthy.store(healthy, Ordering::SeqCst);
    }
}

#[async_trait]
impl LlmProvider for SwitchableAnalyst {
    fn name(&self) -> &str {
        self.name
    }

    async fn complete(&self, prompt: &Prompt) -> Result<String, ProviderError> {
        if !self.healthy.load(Ordering::SeqCst) {
            return Err(ProviderError::Other(format!("{} is down", self.name)));
        }
        // Give pollers a chance to observe partial progress.
        sleep(Duration::from_millis(5)).await;
        if prompt.user.contains("Rate deception") {
            Ok(r#"{"deception_score": 1.5, "rationale": "plain statement"}"#.to_string())
        } else {
            Ok(r#"{"stance": "Support", "confidence": 0.9, "explanation": "consistent with sources"}"#.to_string())
        }
    }
}

pub struct FixedTranscript;

#[async_trait]
impl TranscriptSource for FixedTranscript {
    async fn fetch(&self, video_id: &str) -> Result<Transcript, TranscriptError> {
        Ok(Transcript::from_segments(
            video_id,
            vec![TranscriptSegment {
                text: "The moon landing happened in 1969".into(),
                start: 0.0,
                duration: 4.0,
            }],
        ))
    }
}

pub struct FixedClaims(pub usize);

#[async_trait]
impl ClaimExtractor for FixedClaims {
    async fn extract_claims(&self, _transcript: &Transcript) -> Result<Vec<Claim>, ClaimError> {
        Ok((0..self.0)
            .map(|i| Claim {
                id: format!("claim_{i}"),
                text: format!("Test claim {i}"),
                timestamp_start: i as f64 * 10.0,
                timestamp_end: i as f64 * 10.0 + 5.0,
                context: String::new(),
            })
            .collect())
    }
}

pub struct TestServer {
    pub base_url: String,
    pub store: Arc<JobStore>,
}

/// Boot the real router on an ephemeral port with fake collaborators.
pub async fn spawn_server(
    primary: Arc<dyn LlmProvider>,
    backup: Option<Arc<dyn LlmProvider>>,
    claims: usize,
) -> TestServer {
    let invoker = Arc::new(ResilientInvoker::new(primary, backup, 3, Duration::from_secs(60)));
    let store = Arc::new(JobStore::new());
    let orchestrator = JobOrchestrator::new(
        store.clone(),
        Arc::new(FixedTranscript),
        Arc::new(FixedClaims(claims)),
        ClaimPipeline::new(invoker.clone(), Arc::new(NoEvidence), DeceptionThresholds::default()),
        3,
    );
    let app = routes::router(
        AppState::new(invoker, orchestrator),
        &["http://localhost:5173".to_string()],
        None,
    );

    let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
        .await
        .expect("Failed to bind test listener");
    let addr = listener.local_addr().expect("Listener has no address");
    tokio::spawn(async move {
        axum::serve(listener, app).await.expect("Test server error");
    });

    TestServer {
        base_url: format!("http://{addr}"),
        store,
    }
}

/// Submit a video URL for analysis
pub async fn submit_job(
    client: &reqwest::Client,
    base_url: &str,
    url: &str,
) -> Result<reqwest::Response, reqwest::Error> {
    client
        .post(format!("{}/analyze/jobs", base_url))
        .json(&serde_json::json!({ "url": url }))
        .send()
        .await
}

/// Poll job status until completed or failed (with timeout)
pub async fn poll_job_status(
    client: &reqwest::Client,
    base_url: &str,
    job_id: Uuid,
    timeout_secs: u64,
) -> Result<JobStatusResponse, Box<dyn std::error::Error>> {
    let max_attempts = timeout_secs * 20; // Poll every 50ms

    for _ in 0..max_attempts {
        let response = client
            .get(format!("{}/analyze/jobs/{}", base_url, job_id))
            .send()
            .await?;

        if !response.status().is_success() {
            let error_text = response.text().await?;
            return Err(format!("Status check failed: {}", error_text).into());
        }

        let status_response = response.json::<JobStatusResponse>().await?;

        match status_response.status.as_str() {
            "completed" | "failed" => return Ok(status_response),
            "pending" | "processing" => sleep(Duration::from_millis(50)).await,
            _ => {
                return Err(format!("Unknown job status: {}", status_response.status).into());
            }
        }
    }

    Err(format!("Job did not complete within {} seconds", timeout_secs).into())
}
