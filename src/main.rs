use metrics_exporter_prometheus::PrometheusBuilder;
use std::sync::Arc;
use tracing_subscriber::EnvFilter;

use perspective_prism::app_state::AppState;
use perspective_prism::config::AppConfig;
use perspective_prism::routes;
use perspective_prism::services::{
    assessment::DeceptionThresholds,
    claims::LlmClaimExtractor,
    evidence::{EvidenceRetriever, GoogleSearchRetriever, NoEvidence},
    invoker::ResilientInvoker,
    job_store::JobStore,
    llm::{ChatCompletionsClient, LlmProvider},
    orchestrator::JobOrchestrator,
    pipeline::ClaimPipeline,
    reaper::spawn_reaper,
    transcript::YouTubeTranscripts,
};

#[tokio::main]
async fn main() {
    // Initialize structured logging
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .json()
        .init();

    // Load configuration from environment
    let config = AppConfig::from_env().expect("Failed to load configuration from environment");

    tracing::info!("Initializing perspective-prism server");

    // Initialize Prometheus metrics recorder
    let prometheus_handle = PrometheusBuilder::new()
        .install_recorder()
        .expect("Failed to install Prometheus metrics recorder");

    metrics::describe_counter!("analysis_jobs_total", "Total analysis jobs submitted");
    metrics::describe_counter!("analysis_jobs_completed", "Total analysis jobs completed");
    metrics::describe_counter!("analysis_jobs_failed", "Total analysis jobs that failed");
    metrics::describe_histogram!(
        "analysis_processing_seconds",
        "Time to process an analysis job"
    );
    metrics::describe_counter!("llm_primary_failures_total", "Primary provider call failures");
    metrics::describe_counter!("llm_fallback_total", "Calls routed to the backup provider");
    metrics::describe_counter!("llm_exhausted_total", "Calls where every provider failed");
    metrics::describe_counter!("analysis_jobs_reaped_total", "Jobs evicted by the reaper");

    // LLM providers
    tracing::info!(model = %config.llm_model, "Initializing primary LLM provider");
    let primary: Arc<dyn LlmProvider> = Arc::new(
        ChatCompletionsClient::new(
            "primary",
            &config.llm_base_url,
            &config.llm_api_key,
            &config.llm_model,
            config.llm_timeout(),
        )
        .expect("Failed to initialize primary LLM client"),
    );

    let backup: Option<Arc<dyn LlmProvider>> = if config.backup_configured() {
        tracing::info!(model = %config.backup_llm_model, "Initializing backup LLM provider");
        Some(Arc::new(
            ChatCompletionsClient::new(
                "backup",
                &config.backup_llm_base_url,
                &config.backup_llm_api_key,
                &config.backup_llm_model,
                config.llm_timeout(),
            )
            .expect("Failed to initialize backup LLM client"),
        ))
    } else {
        tracing::warn!("No backup LLM provider configured, running without fallback");
        None
    };

    let invoker = Arc::new(ResilientInvoker::new(
        primary,
        backup,
        config.circuit_breaker_fail_threshold,
        config.reset_timeout(),
    ));

    // Evidence retrieval
    let evidence: Arc<dyn EvidenceRetriever> = if config.evidence_configured() {
        tracing::info!("Initializing Google Custom Search evidence retriever");
        Arc::new(
            GoogleSearchRetriever::new(
                &config.google_api_key,
                &config.google_cse_id,
                config.search_timeout(),
                config.google_search_max_concurrent,
            )
            .expect("Failed to initialize evidence retriever"),
        )
    } else {
        tracing::warn!("Search credentials missing, perspectives will be analyzed without evidence");
        Arc::new(NoEvidence)
    };

    let transcripts = YouTubeTranscripts::new(config.llm_timeout())
        .expect("Failed to initialize transcript client");

    let store = Arc::new(JobStore::new());
    let pipeline = ClaimPipeline::new(
        invoker.clone(),
        evidence,
        DeceptionThresholds {
            high: config.deception_threshold_high,
            moderate: config.deception_threshold_moderate,
        },
    );
    let orchestrator = JobOrchestrator::new(
        store.clone(),
        Arc::new(transcripts),
        Arc::new(LlmClaimExtractor::new(invoker.clone())),
        pipeline,
        config.max_claims_per_job,
    );

    // Background eviction of stale jobs
    spawn_reaper(store, config.job_ttl(), config.reaper_interval());

    let state = AppState::new(invoker, orchestrator);
    let cors_origins = config
        .cors_origins()
        .expect("BACKEND_CORS_ORIGINS was validated at startup");
    let app = routes::router(state, &cors_origins, Some(prometheus_handle));

    tracing::info!("Starting perspective-prism on {}", config.bind_addr);

    let listener = tokio::net::TcpListener::bind(&config.bind_addr)
        .await
        .expect("Failed to bind to address");

    tracing::info!("Server listening on {}", config.bind_addr);

    axum::serve(listener, app).await.expect("Server error");
}
