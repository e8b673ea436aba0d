use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use strum::Display;

/// The four analytical lenses every claim is evaluated through.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, Display,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "title_case")]
pub enum Perspective {
    Scientific,
    Journalistic,
    PartisanLeft,
    PartisanRight,
}

impl Perspective {
    pub const ALL: [Perspective; 4] = [
        Perspective::Scientific,
        Perspective::Journalistic,
        Perspective::PartisanLeft,
        Perspective::PartisanRight,
    ];
}

/// A perspective's verdict on a claim.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Display)]
pub enum Stance {
    Support,
    Refute,
    Neutral,
}

impl Stance {
    /// Lenient mapping from model output; anything unrecognised is neutral.
    pub fn from_label(label: &str) -> Self {
        match label.trim().to_ascii_lowercase().as_str() {
            "support" | "supports" | "supported" => Stance::Support,
            "refute" | "refutes" | "refuted" => Stance::Refute,
            _ => Stance::Neutral,
        }
    }
}

/// Overall verdict for a claim. The serialized strings are part of the API.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Display)]
pub enum Assessment {
    #[serde(rename = "Analyzing…")]
    #[strum(serialize = "Analyzing…")]
    Analyzing,
    #[serde(rename = "Likely True")]
    #[strum(serialize = "Likely True")]
    LikelyTrue,
    #[serde(rename = "Likely False")]
    #[strum(serialize = "Likely False")]
    LikelyFalse,
    Mixed,
    #[serde(rename = "Suspicious/Deceptive")]
    #[strum(serialize = "Suspicious/Deceptive")]
    SuspiciousDeceptive,
}

/// A discrete factual assertion extracted from a transcript.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Claim {
    pub id: String,
    pub text: String,
    pub timestamp_start: f64,
    pub timestamp_end: f64,
    #[serde(default)]
    pub context: String,
}

/// One transcript segment, times in seconds.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TranscriptSegment {
    pub text: String,
    pub start: f64,
    pub duration: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Transcript {
    pub video_id: String,
    pub segments: Vec<TranscriptSegment>,
    pub full_text: String,
}

impl Transcript {
    pub fn from_segments(video_id: impl Into<String>, segments: Vec<TranscriptSegment>) -> Self {
        let full_text = segments
            .iter()
            .map(|s| s.text.as_str())
            .collect::<Vec<_>>()
            .join(" ");
        Self {
            video_id: video_id.into(),
            segments,
            full_text,
        }
    }
}

/// A search hit retrieved for one perspective.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Evidence {
    pub url: String,
    pub title: String,
    pub snippet: String,
    pub source: String,
    pub perspective: Perspective,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PerspectiveAnalysis {
    pub perspective: Perspective,
    pub stance: Stance,
    /// 0.0 - 1.0
    pub confidence: f64,
    pub explanation: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BiasIndicators {
    /// 0.0 - 10.0
    pub deception_score: f64,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub framing_techniques: Vec<String>,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub rationale: String,
}

impl BiasIndicators {
    pub fn unscored() -> Self {
        Self {
            deception_score: 0.0,
            framing_techniques: Vec::new(),
            rationale: String::new(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TruthProfile {
    pub overall_assessment: Assessment,
    /// Filled in as perspective analyses complete; keys are never removed.
    pub perspectives: BTreeMap<Perspective, PerspectiveAnalysis>,
    pub bias: BiasIndicators,
}

impl TruthProfile {
    /// Placeholder shown to pollers before any analysis has landed.
    pub fn analyzing() -> Self {
        Self {
            overall_assessment: Assessment::Analyzing,
            perspectives: BTreeMap::new(),
            bias: BiasIndicators::unscored(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClaimAnalysis {
    pub claim: Claim,
    pub truth_profile: TruthProfile,
}

impl ClaimAnalysis {
    pub fn pending(claim: Claim) -> Self {
        Self {
            claim,
            truth_profile: TruthProfile::analyzing(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnalysisMetadata {
    pub analyzed_at: DateTime<Utc>,
    /// Claims found before the per-job cap was applied.
    pub claims_extracted: usize,
}

/// The polled view of a job's accumulated result. Replaced wholesale on every commit.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResultSnapshot {
    pub video_id: String,
    pub metadata: AnalysisMetadata,
    pub claims: Vec<ClaimAnalysis>,
}
