// Retriever Coordinator: fans one query out to the evidence sources
use futures_util::future::join_all;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::{BTreeMap, HashSet};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, warn};

use crate::capabilities::with_timeout;
use crate::errors::{CapabilityError, PipelineError, Result};
use crate::sources::EvidenceSource;
use crate::types::{Category, Constraints, Document, SourceKind};

/// Caller-supplied top-k overrides
///
/// A global `k` applies to every source; a per-source value wins over it.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SourceOverrides {
    pub k: Option<usize>,
    pub per_source: BTreeMap<SourceKind, usize>,
}

impl SourceOverrides {
    pub fn with_k(k: usize) -> Self {
        Self {
            k: Some(k),
            per_source: BTreeMap::new(),
        }
    }

    pub fn with_source(mut self, kind: SourceKind, k: usize) -> Self {
        self.per_source.insert(kind, k);
        self
    }

    /// Parse a JSON filter: `{"k": 2}`, `{"vector": {"k": 2}}` or `{"graph": 1}`
    pub fn from_json(value: &Value) -> Result<Self> {
        let Some(map) = value.as_object() else {
            return Err(PipelineError::ConfigError(format!(
                "source filter must be an object, got {}",
                value
            )));
        };

        let mut overrides = Self::default();
        for (key, entry) in map {
            if key == "k" {
                overrides.k = Some(parse_k(key, entry)?);
                continue;
            }
            let kind = SourceKind::parse(key)
                .ok_or_else(|| PipelineError::ConfigError(format!("unknown source '{}'", key)))?;
            let k = match entry.get("k") {
                Some(inner) => parse_k(key, inner)?,
                None => parse_k(key, entry)?,
            };
            overrides.per_source.insert(kind, k);
        }
        Ok(overrides)
    }

    /// Parse the CLI form `vector=2,graph=1`
    pub fn from_pairs(spec: &str) -> Result<Self> {
        let mut overrides = Self::default();
        for pair in spec.split(',').map(str::trim).filter(|p| !p.is_empty()) {
            let (name, k) = pair
                .split_once('=')
                .ok_or_else(|| PipelineError::ConfigError(format!("expected source=k, got '{}'", pair)))?;
            let k: usize = k
                .trim()
                .parse()
                .map_err(|_| PipelineError::ConfigError(format!("invalid k in '{}'", pair)))?;
            match name.trim() {
                "k" | "all" => overrides.k = Some(k),
                other => {
                    let kind = SourceKind::parse(other)
                        .ok_or_else(|| PipelineError::ConfigError(format!("unknown source '{}'", other)))?;
                    overrides.per_source.insert(kind, k);
                }
            }
        }
        Ok(overrides)
    }

    pub fn is_empty(&self) -> bool {
        self.k.is_none() && self.per_source.is_empty()
    }

    /// Effective result count for `kind`
    pub fn top_k_for(&self, kind: SourceKind, default: usize) -> usize {
        self.per_source
            .get(&kind)
            .copied()
            .or(self.k)
            .unwrap_or(default)
    }
}

fn parse_k(key: &str, value: &Value) -> Result<usize> {
    value
        .as_u64()
        .map(|k| k as usize)
        .ok_or_else(|| PipelineError::ConfigError(format!("'{}' must be a non-negative integer", key)))
}

/// What one source contributed to a round
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SourceReport {
    pub source: SourceKind,
    pub requested: usize,
    pub retrieved: usize,
    /// Set when the source failed or timed out and contributed nothing
    pub error: Option<String>,
}

/// Merged output of one retrieval round
#[derive(Debug, Clone, Default)]
pub struct Retrieval {
    pub documents: Vec<Document>,
    pub reports: Vec<SourceReport>,
    /// Documents dropped as duplicates of an earlier source's result
    pub duplicates: usize,
}

/// Dispatches queries to the registered evidence sources
pub struct RetrieverCoordinator {
    sources: BTreeMap<SourceKind, Arc<dyn EvidenceSource>>,
    timeout: Duration,
}

impl RetrieverCoordinator {
    pub fn new(timeout: Duration) -> Self {
        Self {
            sources: BTreeMap::new(),
            timeout,
        }
    }

    /// Register a source under its own kind, replacing any previous one
    pub fn with_source(mut self, source: Arc<dyn EvidenceSource>) -> Self {
        self.sources.insert(source.kind(), source);
        self
    }

    pub fn has_source(&self, kind: SourceKind) -> bool {
        self.sources.contains_key(&kind)
    }

    /// Sources participating for a category, in merge order
    ///
    /// Vector search always participates in retrieval categories; the
    /// structured lookup joins when the constraints can be filtered on;
    /// graph search joins for regulation queries.
    pub fn plan(category: Category, constraints: &Constraints) -> Vec<SourceKind> {
        let mut kinds = Vec::new();
        if !category.uses_retrieval() {
            return kinds;
        }
        if constraints.is_structured() {
            kinds.push(SourceKind::Structured);
        }
        if category == Category::RegulationGraphSearch {
            kinds.push(SourceKind::Graph);
        }
        kinds.push(SourceKind::Vector);
        kinds
    }

    /// Fan out, then merge de-duplicated results in source order
    ///
    /// A failed or timed-out source counts as an empty result for the
    /// round. Only an unavailable source aborts.
    pub async fn retrieve(
        &self,
        category: Category,
        query: &str,
        constraints: &Constraints,
        top_k: usize,
        overrides: &SourceOverrides,
    ) -> std::result::Result<Retrieval, CapabilityError> {
        let planned: Vec<(SourceKind, Arc<dyn EvidenceSource>, usize)> = Self::plan(category, constraints)
            .into_iter()
            .filter_map(|kind| match self.sources.get(&kind) {
                Some(source) => Some((kind, Arc::clone(source), overrides.top_k_for(kind, top_k))),
                None => {
                    debug!(source = %kind, "source not configured, skipping");
                    None
                }
            })
            .collect();

        let calls = planned.iter().map(|(kind, source, k)| {
            let capability = format!("{}_search", kind);
            async move {
                with_timeout(&capability, self.timeout, source.search(query, constraints, *k)).await
            }
        });
        let results = join_all(calls).await;

        let mut retrieval = Retrieval::default();
        let mut seen = HashSet::new();

        for ((kind, _, k), result) in planned.iter().zip(results) {
            let (docs, error) = match result {
                Ok(docs) => (docs, None),
                Err(err) if err.is_fatal() => return Err(err),
                Err(err) => {
                    warn!(source = %kind, error = %err, "source failed, treating as empty");
                    (Vec::new(), Some(err.to_string()))
                }
            };

            let mut retrieved = 0;
            for doc in docs.into_iter().take(*k) {
                retrieved += 1;
                if seen.insert(doc.key()) {
                    retrieval.documents.push(doc);
                } else {
                    retrieval.duplicates += 1;
                }
            }

            debug!(source = %kind, requested = *k, retrieved, "source completed");
            retrieval.reports.push(SourceReport {
                source: *kind,
                requested: *k,
                retrieved,
                error,
            });
        }

        Ok(retrieval)
    }
}
