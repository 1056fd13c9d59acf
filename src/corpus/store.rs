//! In-memory audit corpus
//!
//! Serves every store-side capability (vector, structured, graph and
//! aggregate) from one loaded record set, so the engine runs end to end
//! without external services.

use async_trait::async_trait;
use chrono::Datelike;
use std::collections::BTreeMap;
use std::path::Path;
use std::sync::Arc;

use crate::capabilities::{
    AggregateQuery, AggregateRequest, AggregateResult, Embedder, GraphPattern, GraphSearch, GroupKey, Metric,
    SearchFilters, SeriesOrder, SeriesPoint, StructuredSearch, VectorSearch,
};
use crate::corpus::embedding::{cosine_similarity, HashingEmbedder};
use crate::corpus::record::AuditRecord;
use crate::errors::{CapabilityError, PipelineError, Result};
use crate::types::{Document, SourceKind};

/// Ranking bonus per matching soft filter
const SOFT_FILTER_BOOST: f32 = 0.1;

struct Entry {
    record: AuditRecord,
    document: Document,
    embedding: Vec<f32>,
}

pub struct InMemoryCorpus {
    entries: Vec<Entry>,
    embedder: Arc<dyn Embedder>,
}

impl std::fmt::Debug for InMemoryCorpus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("InMemoryCorpus")
            .field("records", &self.entries.len())
            .finish()
    }
}

impl InMemoryCorpus {
    /// Build with the local hashing embedder
    pub fn from_records(records: Vec<AuditRecord>) -> Self {
        let embedder = HashingEmbedder::default();
        let entries = records
            .into_iter()
            .map(|record| Entry {
                embedding: embedder.embed_text(&record.search_text()),
                document: record.to_document(SourceKind::Structured),
                record,
            })
            .collect();

        Self {
            entries,
            embedder: Arc::new(embedder),
        }
    }

    /// Build with an external embedder; every record is embedded up front
    pub async fn with_embedder(records: Vec<AuditRecord>, embedder: Arc<dyn Embedder>) -> Result<Self> {
        let mut entries = Vec::with_capacity(records.len());
        for record in records {
            let embedding = embedder
                .embed(&record.search_text())
                .await
                .map_err(|e| PipelineError::CorpusError(format!("failed to embed {}: {}", record.id, e)))?;
            entries.push(Entry {
                embedding,
                document: record.to_document(SourceKind::Structured),
                record,
            });
        }
        Ok(Self { entries, embedder })
    }

    /// Load records from a JSON array or JSON Lines file
    pub fn load(path: &Path) -> Result<Self> {
        Ok(Self::from_records(read_records(path)?))
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn records(&self) -> impl Iterator<Item = &AuditRecord> {
        self.entries.iter().map(|e| &e.record)
    }

    /// Distinct organization names, used as the correction vocabulary
    pub fn organizations(&self) -> Vec<String> {
        let mut names: Vec<String> = self
            .entries
            .iter()
            .map(|e| e.record.company.trim().to_string())
            .filter(|c| !c.is_empty())
            .collect();
        names.sort();
        names.dedup();
        names
    }

    fn matching<'a>(&'a self, filters: &'a SearchFilters) -> impl Iterator<Item = &'a Entry> + 'a {
        self.entries.iter().filter(move |e| filters.matches(&e.document))
    }
}

/// Read corpus records from disk
pub fn read_records(path: &Path) -> Result<Vec<AuditRecord>> {
    let raw = std::fs::read_to_string(path)
        .map_err(|e| PipelineError::CorpusError(format!("cannot read {}: {}", path.display(), e)))?;

    let trimmed = raw.trim_start();
    if trimmed.starts_with('[') {
        return serde_json::from_str(trimmed)
            .map_err(|e| PipelineError::CorpusError(format!("invalid corpus {}: {}", path.display(), e)));
    }

    trimmed
        .lines()
        .enumerate()
        .filter(|(_, line)| !line.trim().is_empty())
        .map(|(i, line)| {
            serde_json::from_str(line)
                .map_err(|e| PipelineError::CorpusError(format!("{} line {}: {}", path.display(), i + 1, e)))
        })
        .collect()
}

/// Newest first, undated last, ties by id
fn newest_first(a: &Entry, b: &Entry) -> std::cmp::Ordering {
    b.document
        .date()
        .cmp(&a.document.date())
        .then_with(|| a.record.id.cmp(&b.record.id))
}

fn with_provenance(entry: &Entry, provenance: SourceKind, score: f32) -> Document {
    let mut doc = entry.document.clone();
    doc.provenance = provenance;
    doc.score = score;
    doc
}

fn compact(text: &str) -> String {
    text.chars().filter(|c| !c.is_whitespace()).collect::<String>().to_lowercase()
}

#[async_trait]
impl VectorSearch for InMemoryCorpus {
    async fn search(
        &self,
        query_text: &str,
        top_k: usize,
        soft_filters: &SearchFilters,
    ) -> std::result::Result<Vec<Document>, CapabilityError> {
        let query = self.embedder.embed(query_text).await?;

        let mut scored: Vec<(f32, &Entry)> = self
            .entries
            .iter()
            .map(|entry| {
                let mut score = cosine_similarity(&query, &entry.embedding);
                if soft_filters.date.is_some() && soft_filters.date_matches(&entry.document) {
                    score += SOFT_FILTER_BOOST;
                }
                if soft_filters.organization.is_some() && soft_filters.organization_matches(&entry.document) {
                    score += SOFT_FILTER_BOOST;
                }
                (score, entry)
            })
            .collect();

        scored.sort_by(|a, b| {
            b.0.partial_cmp(&a.0)
                .unwrap_or(std::cmp::Ordering::Equal)
                .then_with(|| a.1.record.id.cmp(&b.1.record.id))
        });

        Ok(scored
            .into_iter()
            .take(top_k)
            .map(|(score, entry)| with_provenance(entry, SourceKind::Vector, score))
            .collect())
    }
}

#[async_trait]
impl StructuredSearch for InMemoryCorpus {
    async fn search(
        &self,
        normalized_key: Option<&str>,
        strict_filters: &SearchFilters,
        limit: usize,
    ) -> std::result::Result<Vec<Document>, CapabilityError> {
        let key = normalized_key.map(compact).filter(|k| !k.is_empty());

        let mut hits: Vec<&Entry> = self
            .matching(strict_filters)
            .filter(|entry| match &key {
                None => true,
                Some(key) => [&entry.record.company, &entry.record.title, &entry.record.problems]
                    .iter()
                    .any(|field| compact(field).contains(key.as_str())),
            })
            .collect();

        hits.sort_by(|a, b| newest_first(a, b));

        Ok(hits
            .into_iter()
            .take(limit)
            .map(|entry| with_provenance(entry, SourceKind::Structured, 1.0))
            .collect())
    }
}

#[async_trait]
impl GraphSearch for InMemoryCorpus {
    async fn search(&self, pattern: &GraphPattern) -> std::result::Result<Vec<Document>, CapabilityError> {
        let filters = SearchFilters {
            date: pattern.date,
            organization: pattern.organization.clone(),
            action_types: Vec::new(),
        };
        let terms: Vec<String> = pattern.regulation_terms.iter().map(|t| compact(t)).collect();

        let mut hits: Vec<(f32, &Entry)> = self
            .matching(&filters)
            .filter(|entry| !entry.record.regulations.is_empty())
            .filter_map(|entry| {
                if terms.is_empty() {
                    return Some((1.0, entry));
                }
                let regulations: Vec<String> = entry.record.regulations.iter().map(|r| compact(r)).collect();
                let matched = terms
                    .iter()
                    .filter(|t| regulations.iter().any(|r| r.contains(t.as_str()) || t.contains(r.as_str())))
                    .count();
                (matched > 0).then(|| (matched as f32 / terms.len() as f32, entry))
            })
            .collect();

        hits.sort_by(|a, b| {
            b.0.partial_cmp(&a.0)
                .unwrap_or(std::cmp::Ordering::Equal)
                .then_with(|| newest_first(a.1, b.1))
        });

        Ok(hits
            .into_iter()
            .take(pattern.limit)
            .map(|(score, entry)| {
                let mut doc = with_provenance(entry, SourceKind::Graph, score);
                let path = entry
                    .record
                    .regulations
                    .iter()
                    .map(|r| format!("{} -PUBLISHED-> {} -VIOLATED-> {}", entry.record.company, entry.record.id, r))
                    .collect::<Vec<_>>()
                    .join("\n");
                doc.content = format!("{}\nRegulation path:\n{}", doc.content, path);
                doc
            })
            .collect())
    }
}

fn group_label(entry: &Entry, key: GroupKey) -> Option<String> {
    let non_empty = |s: &str| {
        let s = s.trim();
        (!s.is_empty()).then(|| s.to_string())
    };
    match key {
        GroupKey::Year => entry.document.date().map(|d| d.year().to_string()),
        GroupKey::Month => entry.document.date().map(|d| format!("{}-{:02}", d.year(), d.month())),
        GroupKey::Organization => non_empty(&entry.record.company),
        GroupKey::ActionType => non_empty(&entry.record.action_type),
        GroupKey::Category => non_empty(&entry.record.category),
    }
}

fn metric_value(metric: &Metric, entries: &[&Entry]) -> std::result::Result<f64, CapabilityError> {
    let amounts = || entries.iter().filter_map(|e| e.record.amount);
    match metric {
        Metric::Count => Ok(entries.len() as f64),
        Metric::Sum { field } if field == "amount" => Ok(amounts().sum()),
        Metric::Average { field } if field == "amount" => {
            let values: Vec<f64> = amounts().collect();
            if values.is_empty() {
                Ok(0.0)
            } else {
                Ok(values.iter().sum::<f64>() / values.len() as f64)
            }
        }
        other => Err(CapabilityError::invalid(
            "aggregate",
            format!("unsupported metric {}", other),
        )),
    }
}

#[async_trait]
impl AggregateQuery for InMemoryCorpus {
    async fn aggregate(&self, request: &AggregateRequest) -> std::result::Result<AggregateResult, CapabilityError> {
        let matched: Vec<&Entry> = self.matching(&request.filters).collect();

        let Some(key) = request.group_by else {
            return Ok(AggregateResult::Single {
                value: metric_value(&request.metric, &matched)?,
                matched: matched.len(),
            });
        };

        let mut groups: BTreeMap<String, Vec<&Entry>> = BTreeMap::new();
        for &entry in &matched {
            if let Some(label) = group_label(entry, key) {
                groups.entry(label).or_default().push(entry);
            }
        }

        let mut points = Vec::with_capacity(groups.len());
        for (label, members) in groups {
            points.push(SeriesPoint {
                label,
                value: metric_value(&request.metric, &members)?,
            });
        }

        if request.order == SeriesOrder::Descending {
            points.sort_by(|a, b| {
                b.value
                    .partial_cmp(&a.value)
                    .unwrap_or(std::cmp::Ordering::Equal)
                    .then_with(|| a.label.cmp(&b.label))
            });
        }
        if let Some(limit) = request.limit {
            points.truncate(limit);
        }

        Ok(AggregateResult::Series {
            points,
            matched: matched.len(),
        })
    }
}
