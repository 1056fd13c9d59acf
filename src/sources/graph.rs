use async_trait::async_trait;
use std::sync::Arc;

use crate::capabilities::{GraphPattern, GraphSearch};
use crate::errors::CapabilityError;
use crate::sources::{finish, EvidenceSource};
use crate::types::{Constraints, Document, SourceKind};

/// Organization -> case -> regulation traversal
pub struct GraphSource {
    store: Arc<dyn GraphSearch>,
}

impl GraphSource {
    pub fn new(store: Arc<dyn GraphSearch>) -> Self {
        Self { store }
    }
}

#[async_trait]
impl EvidenceSource for GraphSource {
    fn kind(&self) -> SourceKind {
        SourceKind::Graph
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
        let pattern = GraphPattern::from_constraints(constraints, top_k);
        let docs = self.store.search(&pattern).await?;
        Ok(finish(docs, SourceKind::Graph, top_k))
    }
}
