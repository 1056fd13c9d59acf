// Retrieval-augmented answer pipeline
//
// Collects validated evidence over bounded retry rounds, then hands it to
// the answer generator.
//
// Components:
// - Retrieval: multi-source fan-out and retry policies
// - Re-ranking: relevance ordering of fresh candidates
// - State / Controller: run state and the COLLECTING / DONE loop
// - Context: evidence assembly for generation prompts
// - Pipeline: end-to-end orchestration

pub mod context;
pub mod controller;
pub mod pipeline;
pub mod reranking;
pub mod retrieval;
pub mod state;

// Re-export key types
pub use context::{AssembledContext, ContextConfig, EvidenceContextBuilder};
pub use controller::{LoopState, RetryController, StopReason};
pub use pipeline::{PipelineOutcome, PipelineSettings, RagPipeline, RagPipelineBuilder};
pub use reranking::{LexicalScorer, Reranker};
pub use retrieval::{RetrieverCoordinator, SourceOverrides};
pub use state::{RoundStats, RunState};
