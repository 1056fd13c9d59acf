//! Document validator
//! Judges ranked candidates and promotes accepted ones, bounded by capacity

use std::sync::Arc;
use tracing::{debug, warn};

use crate::errors::CapabilityError;
use crate::types::{Document, QueryContext};
use crate::validation::judge::RelevanceJudge;
use crate::validation::types::{Judgment, ValidationRecord, Verdict};

/// Result of one validator pass
#[derive(Debug, Clone, Default)]
pub struct ValidationOutcome {
    /// Accepted documents in score order, never more than the capacity
    pub accepted: Vec<Document>,
    /// One record per judged document
    pub records: Vec<ValidationRecord>,
}

pub struct DocumentValidator {
    judge: Arc<dyn RelevanceJudge>,
}

impl DocumentValidator {
    pub fn new(judge: Arc<dyn RelevanceJudge>) -> Self {
        Self { judge }
    }

    pub fn judge_name(&self) -> &'static str {
        self.judge.name()
    }

    /// Judge `ranked` in order until `capacity` documents are accepted
    ///
    /// Documents after the capacity is filled are left unjudged so they
    /// can still be considered by a later round.
    pub async fn validate(
        &self,
        ctx: &QueryContext,
        ranked: &[Document],
        capacity: usize,
        round: u32,
    ) -> Result<ValidationOutcome, CapabilityError> {
        let mut outcome = ValidationOutcome::default();

        for doc in ranked {
            if outcome.accepted.len() >= capacity {
                break;
            }

            let judgment = match self.judge.judge(ctx, doc).await {
                Ok(judgment) => judgment,
                Err(err) if err.is_fatal() => return Err(err),
                Err(err) => {
                    warn!(document = %doc.id, error = %err, "judge failed, rejecting document");
                    Judgment::rejected(vec![format!("judge failed: {}", err)])
                }
            };
            debug!(
                document = %doc.id,
                provenance = %doc.provenance,
                verdict = ?judgment.verdict,
                "document judged"
            );

            outcome.records.push(ValidationRecord {
                key: doc.key(),
                document_id: doc.id.clone(),
                provenance: doc.provenance,
                round,
                verdict: judgment.verdict,
                score: judgment.score,
                judge: self.judge.name().to_string(),
                rationale: judgment.rationale,
            });

            if judgment.verdict == Verdict::Accepted {
                outcome.accepted.push(doc.clone());
            }
        }

        Ok(outcome)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{Category, Constraints, Persona, SourceKind};
    use async_trait::async_trait;

    /// Accepts documents whose id starts with "ok"
    struct PrefixJudge;

    #[async_trait]
    impl RelevanceJudge for PrefixJudge {
        fn name(&self) -> &'static str {
            "prefix"
        }

        async fn judge(&self, _ctx: &QueryContext, doc: &Document) -> Result<Judgment, CapabilityError> {
            if doc.id.starts_with("ok") {
                Ok(Judgment::accepted(vec!["prefix ok".to_string()]))
            } else {
                Ok(Judgment::rejected(vec!["prefix mismatch".to_string()]))
            }
        }
    }

    struct DownJudge;

    #[async_trait]
    impl RelevanceJudge for DownJudge {
        fn name(&self) -> &'static str {
            "down"
        }

        async fn judge(&self, _ctx: &QueryContext, _doc: &Document) -> Result<Judgment, CapabilityError> {
            Err(CapabilityError::unavailable("judge", "connection refused"))
        }
    }

    /// Times out on documents whose id starts with "slow"
    struct FlakyJudge;

    #[async_trait]
    impl RelevanceJudge for FlakyJudge {
        fn name(&self) -> &'static str {
            "flaky"
        }

        async fn judge(&self, _ctx: &QueryContext, doc: &Document) -> Result<Judgment, CapabilityError> {
            if doc.id.starts_with("slow") {
                Err(CapabilityError::Timeout {
                    capability: "judge".to_string(),
                    duration_ms: 5,
                })
            } else {
                Ok(Judgment::accepted(vec!["answered".to_string()]))
            }
        }
    }

    fn ctx() -> QueryContext {
        QueryContext {
            query: "q".to_string(),
            normalized_query: "q".to_string(),
            category: Category::GeneralSearch,
            persona: Persona::Common,
            constraints: Constraints::default(),
            corrections: Vec::new(),
        }
    }

    fn docs(ids: &[&str]) -> Vec<Document> {
        ids.iter()
            .map(|id| Document::new(*id, format!("content {}", id), SourceKind::Vector))
            .collect()
    }

    #[tokio::test]
    async fn test_accepts_and_records() {
        let validator = DocumentValidator::new(Arc::new(PrefixJudge));
        let outcome = validator
            .validate(&ctx(), &docs(&["ok-1", "bad-1", "ok-2"]), 5, 0)
            .await
            .unwrap();

        assert_eq!(outcome.accepted.len(), 2);
        assert_eq!(outcome.records.len(), 3);
        assert_eq!(outcome.records[1].verdict, Verdict::Rejected);
        assert_eq!(outcome.records[0].judge, "prefix");
    }

    #[tokio::test]
    async fn test_capacity_stops_judging() {
        let validator = DocumentValidator::new(Arc::new(PrefixJudge));
        let outcome = validator
            .validate(&ctx(), &docs(&["ok-1", "ok-2", "ok-3"]), 2, 1)
            .await
            .unwrap();

        let ids: Vec<&str> = outcome.accepted.iter().map(|d| d.id.as_str()).collect();
        assert_eq!(ids, vec!["ok-1", "ok-2"]);
        assert_eq!(outcome.records.len(), 2);
        assert!(outcome.records.iter().all(|r| r.round == 1));
    }

    #[tokio::test]
    async fn test_judge_timeout_becomes_rejection() {
        let validator = DocumentValidator::new(Arc::new(FlakyJudge));
        let outcome = validator
            .validate(&ctx(), &docs(&["slow-1", "ok-1"]), 5, 0)
            .await
            .unwrap();

        let ids: Vec<&str> = outcome.accepted.iter().map(|d| d.id.as_str()).collect();
        assert_eq!(ids, vec!["ok-1"]);
        assert_eq!(outcome.records.len(), 2);
        assert_eq!(outcome.records[0].verdict, Verdict::Rejected);
        assert!(outcome.records[0].rationale[0].contains("timed out"));
    }

    #[tokio::test]
    async fn test_unavailable_judge_propagates() {
        let validator = DocumentValidator::new(Arc::new(DownJudge));
        let err = validator.validate(&ctx(), &docs(&["ok-1"]), 5, 0).await.unwrap_err();
        assert!(err.is_fatal());
    }
}
