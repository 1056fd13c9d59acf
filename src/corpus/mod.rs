//! Audit corpus loading and the local reference stores

pub mod embedding;
pub mod record;
pub mod store;

pub use embedding::{cosine_similarity, HashingEmbedder};
pub use record::AuditRecord;
pub use store::{read_records, InMemoryCorpus};
