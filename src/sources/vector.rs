use async_trait::async_trait;
use std::sync::Arc;

use crate::capabilities::{SearchFilters, VectorSearch};
use crate::errors::CapabilityError;
use crate::sources::{finish, EvidenceSource};
use crate::types::{Constraints, Document, SourceKind};

/// Similarity search; never excludes on constraints
pub struct VectorSource {
    store: Arc<dyn VectorSearch>,
}

impl VectorSource {
    pub fn new(store: Arc<dyn VectorSearch>) -> Self {
        Self { store }
    }
}

#[async_trait]
impl EvidenceSource for VectorSource {
    fn kind(&self) -> SourceKind {
        SourceKind::Vector
    }

    async fn search(
        &self,
        query: &str,
        constraints: &Constraints,
        top_k: usize,
    ) -> Result<Vec<Document>, CapabilityError> {
        if top_k == 0 {
            return Ok(Vec::new());
        }
        let hints = SearchFilters::from_constraints(constraints);
        let docs = self.store.search(query, top_k, &hints).await?;
        Ok(finish(docs, SourceKind::Vector, top_k))
    }
}
