//! Type definitions module
//!
//! Core types shared by every pipeline stage.

pub mod document;
pub mod query;

// Re-export commonly used types
pub use document::{parse_loose_date, Document, DocumentKey, SourceKind};
pub use query::{Category, Constraints, DateFilter, Persona, QueryContext, ReportField};
