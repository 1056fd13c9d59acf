//! Retrieved documents and their provenance

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::hash_map::DefaultHasher;
use std::fmt;
use std::hash::{Hash, Hasher};

use crate::types::query::ReportField;

/// Evidence source that produced a document
///
/// Declaration order is the deterministic merge order used by the
/// coordinator: structured hits first, then graph, then vector.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SourceKind {
    Structured,
    Graph,
    Vector,
}

impl SourceKind {
    pub const ALL: [SourceKind; 3] = [SourceKind::Structured, SourceKind::Graph, SourceKind::Vector];

    pub fn as_str(&self) -> &'static str {
        match self {
            SourceKind::Structured => "structured",
            SourceKind::Graph => "graph",
            SourceKind::Vector => "vector",
        }
    }

    pub fn parse(name: &str) -> Option<Self> {
        match name.trim().to_lowercase().as_str() {
            "structured" | "sql" | "fuzzy" => Some(SourceKind::Structured),
            "graph" => Some(SourceKind::Graph),
            "vector" => Some(SourceKind::Vector),
            _ => None,
        }
    }
}

impl fmt::Display for SourceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Identity of an underlying document, independent of provenance
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct DocumentKey(String);

impl DocumentKey {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for DocumentKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// A single retrieval result
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Document {
    pub id: String,
    pub content: String,
    pub metadata: Map<String, Value>,
    pub provenance: SourceKind,
    /// Score assigned by the producing source
    pub score: f32,
}

impl Document {
    pub fn new(id: impl Into<String>, content: impl Into<String>, provenance: SourceKind) -> Self {
        Self {
            id: id.into(),
            content: content.into(),
            metadata: Map::new(),
            provenance,
            score: 0.0,
        }
    }

    pub fn with_metadata(mut self, key: &str, value: impl Into<Value>) -> Self {
        self.metadata.insert(key.to_string(), value.into());
        self
    }

    pub fn with_score(mut self, score: f32) -> Self {
        self.score = score;
        self
    }

    /// Identity key: the record id when present, otherwise a content fingerprint
    pub fn key(&self) -> DocumentKey {
        if !self.id.trim().is_empty() {
            return DocumentKey(self.id.trim().to_string());
        }

        let normalized: String = self
            .content
            .split_whitespace()
            .collect::<Vec<_>>()
            .join(" ")
            .to_lowercase();
        let mut hasher = DefaultHasher::new();
        normalized.hash(&mut hasher);
        DocumentKey(format!("content:{:016x}", hasher.finish()))
    }

    pub fn meta_str(&self, key: &str) -> Option<&str> {
        self.metadata
            .get(key)
            .and_then(|v| v.as_str())
            .map(str::trim)
            .filter(|s| !s.is_empty())
    }

    pub fn date(&self) -> Option<NaiveDate> {
        self.meta_str("date").and_then(parse_loose_date)
    }

    pub fn company(&self) -> Option<&str> {
        self.meta_str("company")
    }

    pub fn action_type(&self) -> Option<&str> {
        self.meta_str("action_type")
    }

    /// Text of a structured report field, if the document carries it
    pub fn field(&self, field: ReportField) -> Option<&str> {
        self.meta_str(field.as_str())
    }
}

/// Parse the date formats found in audit metadata
///
/// Accepts `YYYY.MM.DD`, `YYYY-MM-DD`, `YYYY/MM/DD`, `YYYY.MM` and `YYYY`.
/// Partial dates resolve to the first day of the period.
pub fn parse_loose_date(raw: &str) -> Option<NaiveDate> {
    let parts: Vec<&str> = raw
        .trim()
        .split(|c| c == '.' || c == '-' || c == '/')
        .map(str::trim)
        .filter(|p| !p.is_empty())
        .collect();

    let year: i32 = parts.first()?.parse().ok()?;
    let month: u32 = match parts.get(1) {
        Some(m) => m.parse().ok()?,
        None => 1,
    };
    let day: u32 = match parts.get(2) {
        // Tolerate trailing time components like "15 10:00"
        Some(d) => d.split_whitespace().next()?.parse().ok()?,
        None => 1,
    };

    NaiveDate::from_ymd_opt(year, month, day)
}
