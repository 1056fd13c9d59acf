//! Evidence source adapters
//!
//! Each adapter turns query constraints into the request shape of one
//! store capability:
//! - vector: similarity search, constraints as soft ranking hints
//! - structured: strict metadata filters plus an entity key
//! - graph: organization / regulation pattern traversal
//!
//! Adapters stamp their own provenance on every returned document.

pub mod graph;
pub mod structured;
pub mod vector;

use async_trait::async_trait;

use crate::errors::CapabilityError;
use crate::types::{Constraints, Document, SourceKind};

pub use graph::GraphSource;
pub use structured::StructuredSource;
pub use vector::VectorSource;

#[async_trait]
pub trait EvidenceSource: Send + Sync {
    fn kind(&self) -> SourceKind;

    /// At most `top_k` documents for the query under `constraints`
    async fn search(
        &self,
        query: &str,
        constraints: &Constraints,
        top_k: usize,
    ) -> Result<Vec<Document>, CapabilityError>;
}

/// Force provenance and cap the result count
pub(crate) fn finish(mut docs: Vec<Document>, kind: SourceKind, top_k: usize) -> Vec<Document> {
    docs.truncate(top_k);
    for doc in docs.iter_mut() {
        doc.provenance = kind;
    }
    docs
}
