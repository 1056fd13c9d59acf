//! Re-ranking of retrieval candidates
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, warn};

use crate::capabilities::{with_timeout, RelevanceScorer};
use crate::errors::CapabilityError;
use crate::types::Document;

/// Lexical scorer configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScorerConfig {
    /// Boost for exact query-word matches, added on top of bigram coverage
    pub keyword_boost: f32,
}

impl Default for ScorerConfig {
    fn default() -> Self {
        Self { keyword_boost: 0.2 }
    }
}

/// Local relevance scorer: character-bigram coverage plus keyword boost
#[derive(Debug, Clone, Default)]
pub struct LexicalScorer {
    config: ScorerConfig,
}

impl LexicalScorer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_config(config: ScorerConfig) -> Self {
        Self { config }
    }

    /// Score in [0, 1]
    pub fn score_text(&self, query: &str, doc_text: &str) -> f32 {
        let query_grams = bigrams(query);
        if query_grams.is_empty() {
            return 0.0;
        }
        let doc_grams = bigrams(doc_text);
        let covered = query_grams.iter().filter(|g| doc_grams.contains(*g)).count();
        let coverage = covered as f32 / query_grams.len() as f32;

        let base = coverage * (1.0 - self.config.keyword_boost);
        (base + self.keyword_boost(query, doc_text)).min(1.0)
    }

    /// Boost for exact keyword matches
    fn keyword_boost(&self, query: &str, doc_text: &str) -> f32 {
        let query_lower = query.to_lowercase();
        let content_lower = doc_text.to_lowercase();

        let query_words: Vec<&str> = query_lower.split_whitespace().collect();
        let matches = query_words
            .iter()
            .filter(|word| word.chars().count() > 1 && content_lower.contains(*word))
            .count();

        if matches > 0 {
            let boost_per_match = self.config.keyword_boost / query_words.len() as f32;
            (matches as f32 * boost_per_match).min(self.config.keyword_boost)
        } else {
            0.0
        }
    }
}

fn bigrams(text: &str) -> HashSet<String> {
    let mut grams = HashSet::new();
    for word in text.split_whitespace() {
        let chars: Vec<char> = word
            .chars()
            .filter(|c| c.is_alphanumeric())
            .flat_map(char::to_lowercase)
            .collect();
        for pair in chars.windows(2) {
            grams.insert(pair.iter().collect());
        }
    }
    grams
}

#[async_trait]
impl RelevanceScorer for LexicalScorer {
    async fn score(&self, query_text: &str, doc_text: &str) -> Result<f32, CapabilityError> {
        Ok(self.score_text(query_text, doc_text))
    }
}

/// Document with re-ranked score
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RankedDocument {
    pub document: Document,
    pub original_score: f32,
    pub reranked_score: f32,
}

/// Re-ranker bounded by the number of documents still needed
pub struct Reranker {
    scorer: Arc<dyn RelevanceScorer>,
    timeout: Duration,
}

impl Reranker {
    pub fn new(scorer: Arc<dyn RelevanceScorer>, timeout: Duration) -> Self {
        Self { scorer, timeout }
    }

    /// Top `still_needed` candidates by relevance score
    ///
    /// Returns nothing, without calling the scorer, when nothing is needed.
    /// Ties keep retrieval order. A transient scoring failure falls back to
    /// the retrieval score for that document.
    pub async fn rerank(
        &self,
        query: &str,
        candidates: &[Document],
        still_needed: usize,
    ) -> Result<Vec<RankedDocument>, CapabilityError> {
        if still_needed == 0 || candidates.is_empty() {
            return Ok(Vec::new());
        }

        let mut ranked = Vec::with_capacity(candidates.len());
        for doc in candidates {
            let reranked_score = match with_timeout("rerank", self.timeout, self.scorer.score(query, &doc.content)).await {
                Ok(score) => score,
                Err(err) if err.is_fatal() => return Err(err),
                Err(err) => {
                    warn!(document = %doc.id, error = %err, "scoring failed, keeping retrieval score");
                    doc.score
                }
            };
            ranked.push(RankedDocument {
                document: doc.clone(),
                original_score: doc.score,
                reranked_score,
            });
        }

        // sort_by is stable: equal scores keep retrieval order
        ranked.sort_by(|a, b| {
            b.reranked_score
                .partial_cmp(&a.reranked_score)
                .unwrap_or(std::cmp::Ordering::Equal)
        });
        ranked.truncate(still_needed);

        debug!(kept = ranked.len(), candidates = candidates.len(), "reranked");
        Ok(ranked)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::SourceKind;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn create_test_doc(id: &str, content: &str, score: f32) -> Document {
        Document::new(id, content, SourceKind::Vector).with_score(score)
    }

    /// Scores by the number in the document content
    struct NumericScorer {
        calls: AtomicUsize,
    }

    #[async_trait]
    impl RelevanceScorer for NumericScorer {
        async fn score(&self, _query: &str, doc_text: &str) -> Result<f32, CapabilityError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            doc_text
                .parse()
                .map_err(|_| CapabilityError::transient("rerank", "not a number"))
        }
    }

    fn numeric() -> Arc<NumericScorer> {
        Arc::new(NumericScorer {
            calls: AtomicUsize::new(0),
        })
    }

    #[test]
    fn test_lexical_scorer_prefers_overlap() {
        let scorer = LexicalScorer::new();
        let close = scorer.score_text("출장비 부당 집행", "출장비를 부당하게 집행한 사례");
        let far = scorer.score_text("출장비 부당 집행", "채용 절차 위반");
        assert!(close > far);
        assert!(close <= 1.0);
        assert_eq!(scorer.score_text("", "anything"), 0.0);
    }

    #[test]
    fn test_keyword_boost() {
        let scorer = LexicalScorer::new();
        let boost = scorer.keyword_boost("rust programming", "rust programming language");
        assert!(boost > 0.0);
    }

    #[tokio::test]
    async fn test_rerank_sorts_and_truncates() {
        let reranker = Reranker::new(numeric(), Duration::from_secs(1));
        let docs = vec![
            create_test_doc("1", "0.6", 0.0),
            create_test_doc("2", "0.9", 0.0),
            create_test_doc("3", "0.7", 0.0),
        ];

        let ranked = reranker.rerank("q", &docs, 2).await.unwrap();
        let ids: Vec<&str> = ranked.iter().map(|r| r.document.id.as_str()).collect();
        assert_eq!(ids, vec!["2", "3"]);
    }

    #[tokio::test]
    async fn test_rerank_stable_on_ties() {
        let reranker = Reranker::new(numeric(), Duration::from_secs(1));
        let docs = vec![
            create_test_doc("a", "0.5", 0.0),
            create_test_doc("b", "0.5", 0.0),
            create_test_doc("c", "0.5", 0.0),
        ];
        let ranked = reranker.rerank("q", &docs, 5).await.unwrap();
        let ids: Vec<&str> = ranked.iter().map(|r| r.document.id.as_str()).collect();
        assert_eq!(ids, vec!["a", "b", "c"]);
    }

    #[tokio::test]
    async fn test_nothing_needed_skips_scorer() {
        let scorer = numeric();
        let reranker = Reranker::new(scorer.clone(), Duration::from_secs(1));
        let docs = vec![create_test_doc("1", "0.6", 0.0)];

        let ranked = reranker.rerank("q", &docs, 0).await.unwrap();
        assert!(ranked.is_empty());
        assert_eq!(scorer.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_transient_failure_keeps_retrieval_score() {
        let reranker = Reranker::new(numeric(), Duration::from_secs(1));
        let docs = vec![
            create_test_doc("1", "not a number", 0.95),
            create_test_doc("2", "0.5", 0.0),
        ];
        let ranked = reranker.rerank("q", &docs, 2).await.unwrap();
        assert_eq!(ranked[0].document.id, "1");
        assert_eq!(ranked[0].reranked_score, 0.95);
    }
}
