//! External capability contracts consumed by the engine
//!
//! Each capability is an async trait object so stores, models and test
//! doubles plug in interchangeably. Every call made by the engine goes
//! through [`with_timeout`], which turns an overrun into
//! `CapabilityError::Timeout` instead of waiting forever.

pub mod aggregate;
pub mod filters;
pub mod ollama;

use async_trait::async_trait;
use std::future::Future;
use std::time::Duration;

use crate::errors::CapabilityError;
use crate::types::Document;

pub use aggregate::{AggregateRequest, AggregateResult, GroupKey, Metric, SeriesOrder, SeriesPoint};
pub use filters::{GraphPattern, SearchFilters};
pub use ollama::{OllamaCompletion, OllamaEmbedder};

/// Similarity search over an embedded store
#[async_trait]
pub trait VectorSearch: Send + Sync {
    /// Similarity-ranked results; `soft_filters` may boost but never exclude
    async fn search(
        &self,
        query_text: &str,
        top_k: usize,
        soft_filters: &SearchFilters,
    ) -> Result<Vec<Document>, CapabilityError>;
}

/// Exact/fuzzy key lookup with strict metadata filters
#[async_trait]
pub trait StructuredSearch: Send + Sync {
    async fn search(
        &self,
        normalized_key: Option<&str>,
        strict_filters: &SearchFilters,
        limit: usize,
    ) -> Result<Vec<Document>, CapabilityError>;
}

/// Pattern traversal over an entity-relationship store
#[async_trait]
pub trait GraphSearch: Send + Sync {
    async fn search(&self, pattern: &GraphPattern) -> Result<Vec<Document>, CapabilityError>;
}

/// Text embedding
#[async_trait]
pub trait Embedder: Send + Sync {
    async fn embed(&self, text: &str) -> Result<Vec<f32>, CapabilityError>;
}

/// Query/document relevance scoring (cross-encoder style)
#[async_trait]
pub trait RelevanceScorer: Send + Sync {
    async fn score(&self, query_text: &str, doc_text: &str) -> Result<f32, CapabilityError>;
}

/// Chat/completion model
#[async_trait]
pub trait CompletionModel: Send + Sync {
    async fn complete(&self, prompt: &str) -> Result<String, CapabilityError>;
}

/// Numeric aggregation over the corpus metadata store
#[async_trait]
pub trait AggregateQuery: Send + Sync {
    async fn aggregate(&self, request: &AggregateRequest) -> Result<AggregateResult, CapabilityError>;
}

/// Bound a capability call by `timeout`
pub async fn with_timeout<T, F>(capability: &str, timeout: Duration, call: F) -> Result<T, CapabilityError>
where
    F: Future<Output = Result<T, CapabilityError>>,
{
    match tokio::time::timeout(timeout, call).await {
        Ok(result) => result,
        Err(_) => Err(CapabilityError::Timeout {
            capability: capability.to_string(),
            duration_ms: timeout.as_millis() as u64,
        }),
    }
}

/// Pull the first JSON object out of a model reply
///
/// Models wrap JSON in prose or code fences often enough that the
/// engine never trusts the raw reply to be a bare object.
pub fn extract_json_object(reply: &str) -> Option<serde_json::Value> {
    let start = reply.find('{')?;
    let end = reply.rfind('}')?;
    if end <= start {
        return None;
    }
    serde_json::from_str(&reply[start..=end]).ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_with_timeout_passes_through() {
        let result = with_timeout("generate", Duration::from_millis(100), async {
            Ok::<_, CapabilityError>(7)
        })
        .await;
        assert_eq!(result, Ok(7));
    }

    #[tokio::test]
    async fn test_with_timeout_overrun() {
        let result: Result<(), _> = with_timeout("graph_search", Duration::from_millis(10), async {
            tokio::time::sleep(Duration::from_millis(200)).await;
            Ok(())
        })
        .await;

        match result {
            Err(CapabilityError::Timeout { capability, duration_ms }) => {
                assert_eq!(capability, "graph_search");
                assert_eq!(duration_ms, 10);
            }
            other => panic!("expected timeout, got {:?}", other),
        }
    }

    #[test]
    fn test_extract_json_object() {
        let reply = "```json\n{\"is_valid\": \"yes\", \"validator_cot\": [\"a\"]}\n```";
        let value = extract_json_object(reply).unwrap();
        assert_eq!(value["is_valid"], "yes");
        assert!(extract_json_object("no json here").is_none());
    }
}
