//! Scripted collaborators for unit tests.

use async_trait::async_trait;
use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use crate::models::analysis::{Claim, Perspective, Transcript, TranscriptSegment};
use crate::services::claims::{ClaimError, ClaimExtractor};
use crate::services::llm::{LlmProvider, Prompt, ProviderError};
use crate::services::transcript::{TranscriptError, TranscriptSource};

/// Replies from a queue, then repeats its fallback reply forever.
pub struct ScriptedProvider {
    name: String,
    script: Mutex<VecDeque<Result<String, String>>>,
    fallback: Result<String, String>,
    calls: AtomicUsize,
}

impl ScriptedProvider {
    pub fn ok(name: &str, reply: &str) -> Arc<Self> {
        Self::build(name, VecDeque::new(), Ok(reply.to_string()))
    }

    pub fn failing(name: &str) -> Arc<Self> {
        Self::build(name, VecDeque::new(), Err(format!("{name} failure")))
    }

    /// The last step is repeated once the script runs out.
    pub fn sequence(name: &str, steps: Vec<Result<&str, &str>>) -> Arc<Self> {
        let mut script: VecDeque<_> = steps
            .into_iter()
            .map(|step| step.map(String::from).map_err(String::from))
            .collect();
        let fallback = script
            .pop_back()
            .unwrap_or_else(|| Err(format!("{name} has no script")));
        Self::build(name, script, fallback)
    }

    fn build(
        name: &str,
        script: VecDeque<Result<String, String>>,
        fallback: Result<String, String>,
    ) -> Arc<Self> {
        Arc::new(Self {
            name: name.to_string(),
            script: Mutex::new(script),
            fallback,
            calls: AtomicUsize::new(0),
        })
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl LlmProvider for ScriptedProvider {
    fn name(&self) -> &str {
        &self.name
    }

    async fn complete(&self, _prompt: &Prompt) -> Result<String, ProviderError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let step = self
            .script
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| self.fallback.clone());
        step.map_err(ProviderError::Other)
    }
}

/// Never answers; used to cancel calls mid-flight.
pub struct HangingProvider {
    name: String,
    calls: AtomicUsize,
}

impl HangingProvider {
    pub fn new(name: &str) -> Arc<Self> {
        Arc::new(Self {
            name: name.to_string(),
            calls: AtomicUsize::new(0),
        })
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl LlmProvider for HangingProvider {
    fn name(&self) -> &str {
        &self.name
    }

    async fn complete(&self, _prompt: &Prompt) -> Result<String, ProviderError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        std::future::pending().await
    }
}

type Responder = Box<dyn Fn(&Prompt) -> Result<String, String> + Send + Sync>;

/// Answers each prompt through a closure.
pub struct FnProvider {
    respond: Responder,
}

impl FnProvider {
    pub fn new(
        respond: impl Fn(&Prompt) -> Result<String, String> + Send + Sync + 'static,
    ) -> Arc<Self> {
        Arc::new(Self {
            respond: Box::new(respond),
        })
    }

    pub fn answer(&self, prompt: &Prompt) -> Result<String, String> {
        (self.respond)(prompt)
    }
}

#[async_trait]
impl LlmProvider for FnProvider {
    fn name(&self) -> &str {
        "fn"
    }

    async fn complete(&self, prompt: &Prompt) -> Result<String, ProviderError> {
        self.answer(prompt).map_err(ProviderError::Other)
    }
}

/// A provider that plays analyst: fixed stance per perspective and a fixed
/// deception score for bias prompts.
pub fn analyst(
    stances: impl IntoIterator<Item = (Perspective, &'static str)>,
    deception: f64,
) -> Arc<FnProvider> {
    let stances: Vec<(Perspective, &'static str)> = stances.into_iter().collect();
    FnProvider::new(move |prompt| {
        if prompt.user.contains("Rate deception") {
            return Ok(format!(r#"{{"deception_score": {deception:.1}}}"#));
        }
        stances
            .iter()
            .find(|(p, _)| prompt.user.contains(&format!("from a {p} perspective")))
            .map(|(p, stance)| {
                format!(r#"{{"stance": "{stance}", "confidence": 0.8, "explanation": "{p} view"}}"#)
            })
            .ok_or_else(|| "unexpected prompt".to_string())
    })
}

pub struct StaticTranscript;

#[async_trait]
impl TranscriptSource for StaticTranscript {
    async fn fetch(&self, video_id: &str) -> Result<Transcript, TranscriptError> {
        Ok(Transcript::from_segments(
            video_id,
            vec![TranscriptSegment {
                text: "Some claims were made".into(),
                start: 0.0,
                duration: 5.0,
            }],
        ))
    }
}

pub struct StaticClaims(pub Vec<Claim>);

#[async_trait]
impl ClaimExtractor for StaticClaims {
    async fn extract_claims(&self, _transcript: &Transcript) -> Result<Vec<Claim>, ClaimError> {
        Ok(self.0.clone())
    }
}
