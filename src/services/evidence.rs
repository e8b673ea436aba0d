use async_trait::async_trait;
use futures::future::join_all;
use reqwest::Client;
use serde::Deserialize;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Semaphore;

use crate::models::analysis::{Claim, Evidence, Perspective};

/// Results requested per perspective search.
const RESULTS_PER_PERSPECTIVE: u8 = 3;

/// Gathers supporting material for a claim, grouped by perspective.
#[async_trait]
pub trait EvidenceRetriever: Send + Sync {
    async fn retrieve(
        &self,
        claim: &Claim,
        perspectives: &[Perspective],
    ) -> Result<HashMap<Perspective, Vec<Evidence>>, EvidenceError>;
}

/// Used when no search credentials are configured: every perspective gets no evidence.
pub struct NoEvidence;

#[async_trait]
impl EvidenceRetriever for NoEvidence {
    async fn retrieve(
        &self,
        _claim: &Claim,
        perspectives: &[Perspective],
    ) -> Result<HashMap<Perspective, Vec<Evidence>>, EvidenceError> {
        Ok(perspectives.iter().map(|p| (*p, Vec::new())).collect())
    }
}

/// Google Custom Search JSON API, one query per perspective.
pub struct GoogleSearchRetriever {
    http: Client,
    api_key: String,
    cse_id: String,
    base_url: String,
    permits: Arc<Semaphore>,
}

#[derive(Deserialize)]
struct SearchResponse {
    #[serde(default)]
    items: Vec<SearchItem>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct SearchItem {
    #[serde(default)]
    title: String,
    #[serde(default)]
    link: String,
    #[serde(default)]
    snippet: String,
    #[serde(default)]
    display_link: String,
}

impl GoogleSearchRetriever {
    pub fn new(
        api_key: &str,
        cse_id: &str,
        timeout: Duration,
        max_concurrent: usize,
    ) -> Result<Self, EvidenceError> {
        let http = Client::builder().timeout(timeout).build()?;
        Ok(Self {
            http,
            api_key: api_key.to_string(),
            cse_id: cse_id.to_string(),
            base_url: "https://www.googleapis.com/customsearch/v1".to_string(),
            permits: Arc::new(Semaphore::new(max_concurrent.max(1))),
        })
    }

    async fn search(
        &self,
        claim: &Claim,
        perspective: Perspective,
    ) -> Result<Vec<Evidence>, EvidenceError> {
        let query = search_query(claim, perspective);
        let num = RESULTS_PER_PERSPECTIVE.to_string();

        let _permit = self
            .permits
            .acquire()
            .await
            .map_err(|_| EvidenceError::Unavailable("search limiter closed".to_string()))?;

        let response = self
            .http
            .get(&self.base_url)
            .query(&[
                ("key", self.api_key.as_str()),
                ("cx", self.cse_id.as_str()),
                ("q", query.as_str()),
                ("num", num.as_str()),
            ])
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(EvidenceError::Unavailable(format!(
                "search API returned HTTP {}",
                response.status()
            )));
        }

        let body: SearchResponse = response.json().await?;
        Ok(body
            .items
            .into_iter()
            .map(|item| Evidence {
                url: item.link,
                title: item.title,
                snippet: item.snippet,
                source: item.display_link,
                perspective,
            })
            .collect())
    }
}

#[async_trait]
impl EvidenceRetriever for GoogleSearchRetriever {
    async fn retrieve(
        &self,
        claim: &Claim,
        perspectives: &[Perspective],
    ) -> Result<HashMap<Perspective, Vec<Evidence>>, EvidenceError> {
        let searches = perspectives.iter().map(|p| async move {
            let hits = self.search(claim, *p).await?;
            tracing::debug!(claim_id = %claim.id, perspective = %p, hits = hits.len(), "Evidence retrieved");
            Ok::<_, EvidenceError>((*p, hits))
        });

        join_all(searches).await.into_iter().collect()
    }
}

/// Bias the query toward sources typical of each perspective.
fn search_query(claim: &Claim, perspective: Perspective) -> String {
    let modifier = match perspective {
        Perspective::Scientific => "scientific study OR peer-reviewed research",
        Perspective::Journalistic => "fact check OR news report",
        Perspective::PartisanLeft => "progressive OR liberal viewpoint",
        Perspective::PartisanRight => "conservative viewpoint",
    };
    format!("{} {}", claim.text.trim(), modifier)
}

#[derive(Debug, thiserror::Error)]
pub enum EvidenceError {
    #[error("Evidence search failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Evidence search unavailable: {0}")]
    Unavailable(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    fn claim() -> Claim {
        Claim {
            id: "claim_0".into(),
            text: " Coffee prevents heart disease ".into(),
            timestamp_start: 0.0,
            timestamp_end: 4.0,
            context: String::new(),
        }
    }

    #[tokio::test]
    async fn test_no_evidence_covers_every_perspective() {
        let evidence = NoEvidence.retrieve(&claim(), &Perspective::ALL).await.unwrap();
        assert_eq!(evidence.len(), 4);
        assert!(evidence.values().all(Vec::is_empty));
    }

    #[test]
    fn test_queries_differ_by_perspective() {
        let scientific = search_query(&claim(), Perspective::Scientific);
        let right = search_query(&claim(), Perspective::PartisanRight);
        assert!(scientific.starts_with("Coffee prevents heart disease "));
        assert!(scientific.contains("peer-reviewed"));
        assert_ne!(scientific, right);
    }

    #[test]
    fn test_search_response_mapping() {
        let body: SearchResponse = serde_json::from_str(
            r#"{"items": [{"title": "Study", "link": "https://example.org/a", "snippet": "...", "displayLink": "example.org"}]}"#,
        )
        .unwrap();
        assert_eq!(body.items[0].display_link, "example.org");

        let empty: SearchResponse = serde_json::from_str("{}").unwrap();
        assert!(empty.items.is_empty());
    }
}
