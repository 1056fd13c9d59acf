use async_trait::async_trait;
use std::sync::Arc;

use crate::analyzer::EntityResolver;
use crate::capabilities::{SearchFilters, StructuredSearch};
use crate::errors::CapabilityError;
use crate::sources::{finish, EvidenceSource};
use crate::types::{Constraints, Document, SourceKind};

/// Strict metadata lookup keyed by the (re-resolved) organization name
pub struct StructuredSource {
    store: Arc<dyn StructuredSearch>,
    resolver: Option<EntityResolver>,
}

impl StructuredSource {
    pub fn new(store: Arc<dyn StructuredSearch>) -> Self {
        Self { store, resolver: None }
    }

    pub fn with_resolver(mut self, resolver: EntityResolver) -> Self {
        self.resolver = Some(resolver);
        self
    }

    /// Canonical key for the organization constraint, if any
    fn key(&self, constraints: &Constraints) -> Option<String> {
        let organization = constraints.organization.as_deref()?;
        Some(match &self.resolver {
            Some(resolver) => resolver.resolve(organization).value().to_string(),
            None => organization.to_string(),
        })
    }
}

#[async_trait]
impl EvidenceSource for StructuredSource {
    fn kind(&self) -> SourceKind {
        SourceKind::Structured
    }

    async fn search(
        &self,
        _query: &str,
        constraints: &Constraints,
        top_k: usize,
    ) -> Result<Vec<Document>, CapabilityError> {
        if top_k == 0 {
            return Ok(Vec::new());
        }
        let key = self.key(constraints);
        let mut filters = SearchFilters::from_constraints(constraints);
        filters.organization = key.clone();

        let docs = self.store.search(key.as_deref(), &filters, top_k).await?;
        Ok(finish(docs, SourceKind::Structured, top_k))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::corpus::{AuditRecord, InMemoryCorpus};

    fn store() -> Arc<InMemoryCorpus> {
        Arc::new(InMemoryCorpus::from_records(vec![
            AuditRecord {
                id: "K-1".to_string(),
                date: "2021.05.01".to_string(),
                company: "한국수력원자력".to_string(),
                ..Default::default()
            },
            AuditRecord {
                id: "K-2".to_string(),
                date: "2021.06.01".to_string(),
                company: "한국전력공사".to_string(),
                ..Default::default()
            },
        ]))
    }

    #[tokio::test]
    async fn test_key_is_re_resolved() {
        let source = StructuredSource::new(store())
            .with_resolver(EntityResolver::new(vec!["한국수력원자력".to_string()]));
        let constraints = Constraints {
            organization: Some("한국수력원자럭".to_string()),
            ..Default::default()
        };
        let docs = source.search("", &constraints, 5).await.unwrap();
        assert_eq!(docs.len(), 1);
        assert_eq!(docs[0].id, "K-1");
        assert_eq!(docs[0].provenance, SourceKind::Structured);
    }

    #[tokio::test]
    async fn test_zero_k_skips_store() {
        let source = StructuredSource::new(store());
        let docs = source.search("", &Constraints::default(), 0).await.unwrap();
        assert!(docs.is_empty());
    }
}
