pub mod scorer;

pub use scorer::{LexicalScorer, RankedDocument, Reranker, ScorerConfig};
