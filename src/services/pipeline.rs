//! Per-claim analysis: evidence, four concurrent perspective calls, one
//! bias call, then the overall verdict.

use futures::future::join_all;
use serde::Deserialize;
use std::collections::BTreeMap;
use std::fmt::Write as _;
use std::sync::Arc;
use tracing::{debug, info};
use uuid::Uuid;

use crate::models::analysis::{
    BiasIndicators, Claim, ClaimAnalysis, Evidence, Perspective, PerspectiveAnalysis, Stance,
    TruthProfile,
};
use crate::services::assessment::{self, DeceptionThresholds};
use crate::services::claims::ClaimError;
use crate::services::evidence::{EvidenceError, EvidenceRetriever};
use crate::services::invoker::{ProviderExhaustedError, ResilientInvoker};
use crate::services::job_store::{JobStore, JobStoreError};
use crate::services::llm::{parse_json_reply, Prompt, ReplyError};
use crate::services::transcript::TranscriptError;

const ANALYST_SYSTEM_PROMPT: &str =
    "You are a careful, impartial fact-checking analyst. Respond only with JSON.";

/// Runs the analysis workflow for single claims of a job.
pub struct ClaimPipeline {
    invoker: Arc<ResilientInvoker>,
    evidence: Arc<dyn EvidenceRetriever>,
    thresholds: DeceptionThresholds,
}

#[derive(Deserialize)]
struct PerspectiveReply {
    #[serde(default)]
    stance: String,
    #[serde(default)]
    confidence: f64,
    #[serde(default)]
    explanation: String,
}

#[derive(Deserialize)]
struct BiasReply {
    #[serde(default, alias = "deception_rating")]
    deception_score: f64,
    #[serde(default)]
    framing_techniques: Vec<String>,
    #[serde(default, alias = "explanation")]
    rationale: String,
}

impl ClaimPipeline {
    pub fn new(
        invoker: Arc<ResilientInvoker>,
        evidence: Arc<dyn EvidenceRetriever>,
        thresholds: DeceptionThresholds,
    ) -> Self {
        Self {
            invoker,
            evidence,
            thresholds,
        }
    }

    /// Analyze claim `index` of `job_id`, committing each perspective result to
    /// the store as soon as it lands. Returns the finalized analysis; the caller
    /// commits it.
    pub async fn analyze(
        &self,
        store: &JobStore,
        job_id: Uuid,
        index: usize,
        claim: &Claim,
    ) -> Result<ClaimAnalysis, PipelineError> {
        let mut evidence = self.evidence.retrieve(claim, &Perspective::ALL).await?;

        let calls = Perspective::ALL.into_iter().map(|perspective| {
            let evidence = evidence.remove(&perspective).unwrap_or_default();
            async move {
                let analysis = self.analyze_perspective(claim, perspective, &evidence).await?;
                store
                    .commit_perspective(job_id, index, analysis.clone())
                    .await?;
                debug!(
                    job_id = %job_id,
                    claim_index = index,
                    perspective = %perspective,
                    stance = %analysis.stance,
                    "Perspective committed"
                );
                Ok::<_, PipelineError>(analysis)
            }
        });

        // Wait for all four before surfacing the first failure.
        let mut perspectives = BTreeMap::new();
        for outcome in join_all(calls).await {
            let analysis = outcome?;
            perspectives.insert(analysis.perspective, analysis);
        }

        let bias = self.analyze_bias(claim).await?;
        let overall_assessment =
            assessment::assess(perspectives.values(), bias.deception_score, self.thresholds);

        info!(
            job_id = %job_id,
            claim_index = index,
            assessment = %overall_assessment,
            deception_score = bias.deception_score,
            "Claim analyzed"
        );

        Ok(ClaimAnalysis {
            claim: claim.clone(),
            truth_profile: TruthProfile {
                overall_assessment,
                perspectives,
                bias,
            },
        })
    }

    pub async fn analyze_perspective(
        &self,
        claim: &Claim,
        perspective: Perspective,
        evidence: &[Evidence],
    ) -> Result<PerspectiveAnalysis, PipelineError> {
        let prompt = Prompt::new(ANALYST_SYSTEM_PROMPT, perspective_prompt(claim, perspective, evidence));
        let reply = self.invoker.invoke(&prompt).await?;
        let parsed: PerspectiveReply = parse_json_reply(&reply)?;

        Ok(PerspectiveAnalysis {
            perspective,
            stance: Stance::from_label(&parsed.stance),
            confidence: clamp_or(parsed.confidence, 0.0, 1.0),
            explanation: parsed.explanation,
        })
    }

    pub async fn analyze_bias(&self, claim: &Claim) -> Result<BiasIndicators, PipelineError> {
        let prompt = Prompt::new(ANALYST_SYSTEM_PROMPT, bias_prompt(claim));
        let reply = self.invoker.invoke(&prompt).await?;
        let parsed: BiasReply = parse_json_reply(&reply)?;

        Ok(BiasIndicators {
            deception_score: clamp_or(parsed.deception_score, 0.0, 10.0),
            framing_techniques: parsed.framing_techniques,
            rationale: parsed.rationale,
        })
    }
}

fn clamp_or(value: f64, min: f64, max: f64) -> f64 {
    if value.is_nan() {
        min
    } else {
        value.clamp(min, max)
    }
}

fn perspective_prompt(claim: &Claim, perspective: Perspective, evidence: &[Evidence]) -> String {
    let mut sources = String::new();
    if evidence.is_empty() {
        sources.push_str("(no external evidence retrieved; rely on general knowledge)\n");
    }
    for (i, item) in evidence.iter().enumerate() {
        let _ = writeln!(
            sources,
            "{}. {} ({}): {}",
            i + 1,
            item.title,
            item.source,
            item.snippet
        );
    }

    format!(
        r#"Evaluate the claim below from a {perspective} perspective.

CLAIM: "{text}"
CONTEXT: {context}

EVIDENCE:
{sources}
Decide whether this perspective would Support, Refute, or remain Neutral on the claim.

Respond with JSON only:
{{"stance": "Support" | "Refute" | "Neutral", "confidence": 0.0-1.0, "explanation": "string"}}"#,
        text = claim.text,
        context = claim.context,
    )
}

fn bias_prompt(claim: &Claim) -> String {
    format!(
        r#"Assess the claim below for manipulative or deceptive framing (loaded language, cherry-picking, false dichotomies, appeals to fear).

CLAIM: "{text}"
CONTEXT: {context}

Rate deception from 0 (straightforward) to 10 (highly deceptive).

Respond with JSON only:
{{"deception_score": 0.0-10.0, "framing_techniques": ["string"], "rationale": "string"}}"#,
        text = claim.text,
        context = claim.context,
    )
}

/// Everything that can abort a job once it has started.
#[derive(Debug, thiserror::Error)]
pub enum PipelineError {
    #[error(transparent)]
    Exhausted(#[from] ProviderExhaustedError),

    #[error(transparent)]
    Transcript(#[from] TranscriptError),

    #[error(transparent)]
    Claims(#[from] ClaimError),

    #[error(transparent)]
    Evidence(#[from] EvidenceError),

    #[error("Model reply could not be used: {0}")]
    Reply(#[from] ReplyError),

    #[error(transparent)]
    Store(#[from] JobStoreError),
}

impl PipelineError {
    /// True when the job disappeared from the store underneath the pipeline.
    pub fn is_evicted(&self) -> bool {
        matches!(self, PipelineError::Store(JobStoreError::NotFound(_)))
    }
}
