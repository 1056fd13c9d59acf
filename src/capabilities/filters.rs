//! Filter shapes passed to evidence stores

use serde::{Deserialize, Serialize};

use crate::types::{Constraints, DateFilter, Document};

/// Metadata filters derived from query constraints
///
/// Structured and graph stores apply these strictly; the vector store
/// treats them as ranking hints.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SearchFilters {
    pub date: Option<DateFilter>,
    pub organization: Option<String>,
    pub action_types: Vec<String>,
}

impl SearchFilters {
    pub fn from_constraints(constraints: &Constraints) -> Self {
        Self {
            date: constraints.date,
            organization: constraints.organization.clone(),
            action_types: constraints.action_types.clone(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.date.is_none() && self.organization.is_none() && self.action_types.is_empty()
    }

    pub fn date_matches(&self, doc: &Document) -> bool {
        match (&self.date, doc.date()) {
            (None, _) => true,
            (Some(filter), Some(date)) => filter.contains(date),
            (Some(_), None) => false,
        }
    }

    pub fn organization_matches(&self, doc: &Document) -> bool {
        match (&self.organization, doc.company()) {
            (None, _) => true,
            (Some(org), Some(company)) => company.contains(org.as_str()) || org.contains(company),
            (Some(_), None) => false,
        }
    }

    pub fn action_matches(&self, doc: &Document) -> bool {
        if self.action_types.is_empty() {
            return true;
        }
        let action_type = doc.action_type().unwrap_or_default();
        let action_text = doc.meta_str("action").unwrap_or_default();
        self.action_types
            .iter()
            .any(|a| action_type.contains(a.as_str()) || action_text.contains(a.as_str()))
    }

    /// Strict match on every populated filter
    pub fn matches(&self, doc: &Document) -> bool {
        self.date_matches(doc) && self.organization_matches(doc) && self.action_matches(doc)
    }
}

/// Pattern constraints for graph traversal
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct GraphPattern {
    pub organization: Option<String>,
    pub regulation_terms: Vec<String>,
    pub date: Option<DateFilter>,
    pub limit: usize,
}

impl GraphPattern {
    pub fn from_constraints(constraints: &Constraints, limit: usize) -> Self {
        Self {
            organization: constraints.organization.clone(),
            regulation_terms: constraints.regulation_terms.clone(),
            date: constraints.date,
            limit,
        }
    }
}
