//! Structured aggregation requests and results

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::capabilities::filters::SearchFilters;

/// Quantity being aggregated
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Metric {
    Count,
    Sum { field: String },
    Average { field: String },
}

impl fmt::Display for Metric {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Metric::Count => f.write_str("count"),
            Metric::Sum { field } => write!(f, "sum({})", field),
            Metric::Average { field } => write!(f, "avg({})", field),
        }
    }
}

/// Grouping key for series-shaped requests
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GroupKey {
    Year,
    Month,
    Organization,
    ActionType,
    Category,
}

impl GroupKey {
    pub fn is_temporal(&self) -> bool {
        matches!(self, GroupKey::Year | GroupKey::Month)
    }

    pub fn label(&self) -> &'static str {
        match self {
            GroupKey::Year => "연도",
            GroupKey::Month => "월",
            GroupKey::Organization => "기관",
            GroupKey::ActionType => "조치 유형",
            GroupKey::Category => "지적 유형",
        }
    }
}

/// Ordering of series points
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SeriesOrder {
    Chronological,
    Descending,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AggregateRequest {
    pub filters: SearchFilters,
    pub metric: Metric,
    /// `None` requests a single aggregate
    pub group_by: Option<GroupKey>,
    pub order: SeriesOrder,
    pub limit: Option<usize>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SeriesPoint {
    pub label: String,
    pub value: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "shape", rename_all = "snake_case")]
pub enum AggregateResult {
    Single { value: f64, matched: usize },
    Series { points: Vec<SeriesPoint>, matched: usize },
}

impl AggregateResult {
    pub fn matched(&self) -> usize {
        match self {
            AggregateResult::Single { matched, .. } | AggregateResult::Series { matched, .. } => *matched,
        }
    }
}
