//! Run state threaded through one query execution
//!
//! Owned by a single run and mutated by one stage at a time. Evidence
//! accumulators start empty; answer fields stay `None` until generation.

use serde::{Deserialize, Serialize};
use std::collections::HashSet;

use crate::rag::retrieval::SourceReport;
use crate::types::{Constraints, DateFilter, Document, DocumentKey};
use crate::validation::{ValidationOutcome, ValidationRecord};

/// Diagnostic counters for one retrieval round
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RoundStats {
    pub round: u32,
    pub query: String,
    pub date_filter: Option<DateFilter>,
    pub sources: Vec<SourceReport>,
    /// Merged candidates after de-duplication
    pub candidates: usize,
    /// Candidates not judged in an earlier round
    pub fresh: usize,
    pub reranked: usize,
    pub judged: usize,
    pub accepted: usize,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RunState {
    pub n_target: usize,
    /// Replaced every round
    pub candidate_documents: Vec<Document>,
    /// Grows across rounds, never beyond `n_target`
    pub validated_documents: Vec<Document>,
    /// Append-only
    pub validation_results: Vec<ValidationRecord>,
    pub retry_count: u32,
    pub search_stats: Vec<RoundStats>,
    pub answer: Option<String>,
    pub answer_reasoning: Option<Vec<String>>,
    #[serde(skip)]
    judged: HashSet<DocumentKey>,
    /// Query and constraints the current `judged` verdicts were made under
    #[serde(skip)]
    judging_basis: Option<(String, Constraints)>,
}

impl RunState {
    pub fn new(n_target: usize) -> Self {
        Self {
            n_target,
            ..Default::default()
        }
    }

    pub fn still_needed(&self) -> usize {
        self.n_target.saturating_sub(self.validated_documents.len())
    }

    pub fn is_satisfied(&self) -> bool {
        self.still_needed() == 0
    }

    pub fn replace_candidates(&mut self, documents: Vec<Document>) {
        self.candidate_documents = documents;
    }

    /// Set the query and constraints for the coming round
    ///
    /// Rejections made under a different basis are forgotten so widened
    /// constraints can accept documents an earlier round turned down.
    /// Validated documents stay excluded.
    pub fn begin_round(&mut self, query: &str, constraints: &Constraints) {
        let unchanged = matches!(
            &self.judging_basis,
            Some((q, c)) if q == query && c == constraints
        );
        if unchanged {
            return;
        }
        if self.judging_basis.is_some() {
            let validated: HashSet<DocumentKey> = self.validated_documents.iter().map(|d| d.key()).collect();
            self.judged.retain(|key| validated.contains(key));
        }
        self.judging_basis = Some((query.to_string(), constraints.clone()));
    }

    /// Current candidates not yet judged under the current basis
    pub fn fresh_candidates(&self) -> Vec<Document> {
        self.candidate_documents
            .iter()
            .filter(|doc| !self.judged.contains(&doc.key()))
            .cloned()
            .collect()
    }

    /// Fold one validator pass into the state; returns how many were promoted
    pub fn record_validation(&mut self, outcome: ValidationOutcome) -> usize {
        for record in &outcome.records {
            self.judged.insert(record.key.clone());
        }
        self.validation_results.extend(outcome.records);

        let mut promoted = 0;
        for doc in outcome.accepted {
            if self.is_satisfied() {
                break;
            }
            let key = doc.key();
            if self.validated_documents.iter().any(|v| v.key() == key) {
                continue;
            }
            self.validated_documents.push(doc);
            promoted += 1;
        }
        promoted
    }

    /// Rationales of rejected documents, most recent first
    pub fn rejection_rationales(&self, limit: usize) -> Vec<String> {
        self.validation_results
            .iter()
            .rev()
            .filter(|r| !r.verdict.is_accepted())
            .take(limit)
            .map(|r| format!("{}: {}", r.document_id, r.rationale.join("; ")))
            .collect()
    }

    pub fn validated_ids(&self) -> Vec<String> {
        self.validated_documents.iter().map(|d| d.id.clone()).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::SourceKind;
    use crate::validation::Verdict;

    fn doc(id: &str) -> Document {
        Document::new(id, "content", SourceKind::Vector)
    }

    fn record(id: &str, verdict: Verdict) -> ValidationRecord {
        let d = doc(id);
        ValidationRecord {
            key: d.key(),
            document_id: d.id.clone(),
            provenance: d.provenance,
            round: 0,
            verdict,
            score: None,
            judge: "test".to_string(),
            rationale: vec![format!("{} judged", id)],
        }
    }

    fn outcome(accepted: &[&str], rejected: &[&str]) -> ValidationOutcome {
        let mut records: Vec<ValidationRecord> =
            accepted.iter().map(|id| record(id, Verdict::Accepted)).collect();
        records.extend(rejected.iter().map(|id| record(id, Verdict::Rejected)));
        ValidationOutcome {
            accepted: accepted.iter().map(|id| doc(id)).collect(),
            records,
        }
    }

    #[test]
    fn test_new_state_is_empty() {
        let state = RunState::new(5);
        assert_eq!(state.still_needed(), 5);
        assert_eq!(state.retry_count, 0);
        assert!(state.answer.is_none());
        assert!(state.answer_reasoning.is_none());
    }

    #[test]
    fn test_validated_capped_at_target() {
        let mut state = RunState::new(2);
        let promoted = state.record_validation(outcome(&["a", "b", "c"], &[]));
        assert_eq!(promoted, 2);
        assert_eq!(state.validated_ids(), vec!["a", "b"]);
        assert_eq!(state.still_needed(), 0);
        assert!(state.is_satisfied());
    }

    #[test]
    fn test_judged_documents_are_not_fresh() {
        let mut state = RunState::new(5);
        state.replace_candidates(vec![doc("a"), doc("b")]);
        state.record_validation(outcome(&[], &["a"]));

        state.replace_candidates(vec![doc("a"), doc("b"), doc("c")]);
        let fresh: Vec<String> = state.fresh_candidates().into_iter().map(|d| d.id).collect();
        assert_eq!(fresh, vec!["b", "c"]);
    }

    #[test]
    fn test_changed_constraints_reopen_rejections() {
        let strict = Constraints {
            date: Some(DateFilter::Year { year: 2021 }),
            ..Default::default()
        };
        let mut state = RunState::new(5);
        state.begin_round("q", &strict);
        state.replace_candidates(vec![doc("a"), doc("b")]);
        state.record_validation(outcome(&["a"], &["b"]));

        state.begin_round("q", &strict);
        assert!(state.fresh_candidates().is_empty());

        state.begin_round("q", &Constraints::default());
        let fresh: Vec<String> = state.fresh_candidates().into_iter().map(|d| d.id).collect();
        assert_eq!(fresh, vec!["b"]);
    }

    #[test]
    fn test_duplicate_acceptance_ignored() {
        let mut state = RunState::new(5);
        state.record_validation(outcome(&["a"], &[]));
        let promoted = state.record_validation(outcome(&["a"], &[]));
        assert_eq!(promoted, 0);
        assert_eq!(state.validated_documents.len(), 1);
        assert_eq!(state.validation_results.len(), 2);
    }

    #[test]
    fn test_rejection_rationales_most_recent_first() {
        let mut state = RunState::new(5);
        state.record_validation(outcome(&["ok"], &["x", "y"]));
        let rationales = state.rejection_rationales(1);
        assert_eq!(rationales, vec!["y: y judged".to_string()]);
    }
}
