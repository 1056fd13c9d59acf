//! auditrag - retrieval-augmented answers over audit reports
//!
//! Answers natural-language questions about audit records with evidence that
//! was retrieved from several sources and validated one document at a time.
//!
//! # Architecture
//!
//! - **Analysis**: intent category, constraints and entity correction
//! - **Retrieval**: vector, structured and graph sources, reranked and
//!   validated over bounded retry rounds
//! - **Generation**: persona-shaped answers, or statistics for aggregation
//!   queries

pub mod analyzer;
pub mod capabilities;
pub mod cli;
pub mod corpus;
pub mod errors;
pub mod generator;
pub mod persona;
pub mod rag;
pub mod sources;
pub mod stats;
pub mod telemetry;
pub mod types;
pub mod validation;

// Re-export commonly used types
pub use errors::{CapabilityError, PipelineError, Result};
pub use rag::{PipelineOutcome, PipelineSettings, RagPipeline, RagPipelineBuilder};
pub use types::{Category, Document, Persona, QueryContext};
