// End-to-end answer pipeline
//
// analyze -> persona -> (retrieve -> rerank -> validate -> retry?)* -> generate
// Aggregation queries take the statistics branch instead of the loop.
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{info, info_span, Instrument};
use uuid::Uuid;

use crate::analyzer::{Correction, EntityResolver, IntentClassifier, QueryAnalyzer};
use crate::capabilities::{AggregateQuery, CompletionModel, GraphSearch, RelevanceScorer, StructuredSearch, VectorSearch};
use crate::corpus::InMemoryCorpus;
use crate::errors::{PipelineError, Result};
use crate::generator::{AnswerGenerator, AnswerMode, GenerationInput};
use crate::persona::PersonaSelector;
use crate::rag::context::ContextConfig;
use crate::rag::controller::{LoopState, RetryController};
use crate::rag::reranking::{LexicalScorer, Reranker};
use crate::rag::retrieval::{policy_from_name, RetrieverCoordinator, RetryPolicy, RetryRequest, SourceOverrides};
use crate::rag::state::{RoundStats, RunState};
use crate::sources::{GraphSource, StructuredSource, VectorSource};
use crate::stats::{StatsEngine, StatsReport};
use crate::telemetry::{TelemetryCollector, TelemetryEvent};
use crate::types::{Category, Constraints, Document, Persona, QueryContext};
use crate::validation::{DocumentValidator, HeuristicJudge, ModelJudge, RelevanceJudge, ValidationRecord};

pub const JUDGE_NAMES: &[&str] = &["heuristic", "model"];

/// Rejection rationales handed to the retry policy
const RETRY_FEEDBACK: usize = 3;

/// Pipeline tuning knobs
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PipelineSettings {
    /// Validated documents needed to stop retrying
    pub n_target: usize,
    /// Hard cap on retry rounds
    pub max_retries: u32,
    /// Default result count per source
    pub top_k: usize,
    /// Bound on every capability call
    pub capability_timeout: Duration,
    pub retry_policy: String,
    pub judge: String,
    pub judge_threshold: f64,
    pub fuzzy_threshold: f64,
    pub min_confidence: f64,
    pub context: ContextConfig,
}

impl Default for PipelineSettings {
    fn default() -> Self {
        Self {
            n_target: 5,
            max_retries: 3,
            top_k: 5,
            capability_timeout: Duration::from_secs(10),
            retry_policy: "relax_date".to_string(),
            judge: "heuristic".to_string(),
            judge_threshold: crate::validation::judge::DEFAULT_THRESHOLD,
            fuzzy_threshold: crate::analyzer::fuzzy::DEFAULT_THRESHOLD,
            min_confidence: 0.4,
            context: ContextConfig::default(),
        }
    }
}

impl PipelineSettings {
    pub fn validate(&self) -> Result<()> {
        if self.n_target == 0 {
            return Err(PipelineError::ConfigError("n_target must be at least 1".to_string()));
        }
        if self.top_k == 0 {
            return Err(PipelineError::ConfigError("top_k must be at least 1".to_string()));
        }
        if self.capability_timeout.is_zero() {
            return Err(PipelineError::ConfigError("capability timeout must be positive".to_string()));
        }
        for (name, value) in [
            ("judge threshold", self.judge_threshold),
            ("fuzzy threshold", self.fuzzy_threshold),
            ("min confidence", self.min_confidence),
        ] {
            if !(0.0..=1.0).contains(&value) {
                return Err(PipelineError::ConfigError(format!(
                    "{} must be within [0, 1], got {}",
                    name, value
                )));
            }
        }
        if !JUDGE_NAMES.contains(&self.judge.as_str()) {
            return Err(PipelineError::ConfigError(format!(
                "unknown judge '{}' (expected one of {})",
                self.judge,
                JUDGE_NAMES.join(", ")
            )));
        }
        Ok(())
    }
}

/// Everything a run produced, serialisable for diagnostics
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PipelineOutcome {
    pub run_id: String,
    pub query: String,
    pub category: Category,
    pub persona: Persona,
    pub normalized_query: String,
    pub constraints: Constraints,
    pub corrections: Vec<Correction>,
    pub answer: String,
    pub answer_reasoning: Vec<String>,
    pub answer_mode: AnswerMode,
    pub validated_documents: Vec<Document>,
    pub validation_results: Vec<ValidationRecord>,
    pub retry_count: u32,
    pub search_stats: Vec<RoundStats>,
    pub stats_report: Option<StatsReport>,
    pub loop_state: LoopState,
    /// Evidence passages as shown to the generator
    pub contexts: Vec<String>,
}

impl PipelineOutcome {
    pub fn validated_ids(&self) -> Vec<&str> {
        self.validated_documents.iter().map(|d| d.id.as_str()).collect()
    }
}

pub struct RagPipeline {
    analyzer: QueryAnalyzer,
    persona_selector: PersonaSelector,
    coordinator: RetrieverCoordinator,
    reranker: Reranker,
    validator: DocumentValidator,
    controller: RetryController,
    policy: Arc<dyn RetryPolicy>,
    stats: Option<StatsEngine>,
    generator: AnswerGenerator,
    settings: PipelineSettings,
    overrides: SourceOverrides,
    telemetry: Option<TelemetryCollector>,
}

impl RagPipeline {
    pub fn builder() -> RagPipelineBuilder {
        RagPipelineBuilder::new()
    }

    pub fn settings(&self) -> &PipelineSettings {
        &self.settings
    }

    pub fn analyzer(&self) -> &QueryAnalyzer {
        &self.analyzer
    }

    /// Run one query with the configured top-k overrides
    pub async fn run(&self, query: &str) -> Result<PipelineOutcome> {
        self.run_with_overrides(query, &self.overrides).await
    }

    /// Run one query end to end
    ///
    /// Only fatal capability failures and nothing else return `Err`; every
    /// other path produces an answer.
    pub async fn run_with_overrides(&self, query: &str, overrides: &SourceOverrides) -> Result<PipelineOutcome> {
        let run_id = Uuid::new_v4().to_string();
        let span = info_span!("run", run_id = %run_id);
        self.execute(run_id.clone(), query, overrides).instrument(span).await
    }

    async fn execute(&self, run_id: String, query: &str, overrides: &SourceOverrides) -> Result<PipelineOutcome> {
        let started = Instant::now();
        self.emit(TelemetryEvent::RunStarted {
            query: query.to_string(),
            timestamp: Instant::now(),
        });

        let analysis = self.analyzer.analyze(query);
        let persona = self.persona_selector.select(analysis.category, query);
        info!(
            category = %analysis.category,
            confidence = analysis.confidence,
            persona = %persona,
            normalized = %analysis.normalized_query,
            "query analyzed"
        );

        let ctx = QueryContext {
            query: query.to_string(),
            normalized_query: analysis.normalized_query,
            category: analysis.category,
            persona,
            constraints: analysis.constraints,
            corrections: analysis.corrections,
        };

        let mut state = RunState::new(self.settings.n_target);
        let mut stats_report = None;

        let loop_state = match ctx.category {
            Category::GeneralSearch | Category::RegulationGraphSearch => {
                self.collect(&ctx, &mut state, overrides).await?
            }
            Category::Aggregation => {
                if let Some(engine) = &self.stats {
                    stats_report = Some(engine.analyze(&ctx.normalized_query, &ctx.constraints).await?);
                }
                LoopState::Done
            }
            Category::Chitchat => LoopState::Done,
        };

        let generated = self
            .generator
            .generate(GenerationInput {
                ctx: &ctx,
                evidence: &state.validated_documents,
                stats: stats_report.as_ref(),
                retry_count: state.retry_count,
                n_target: self.settings.n_target,
            })
            .await?;

        self.emit(TelemetryEvent::AnswerGenerated {
            chars: generated.answer.chars().count(),
            duration_ms: started.elapsed().as_millis() as u64,
            timestamp: Instant::now(),
        });

        let contexts = self
            .generator
            .context_builder()
            .build(&state.validated_documents, &ctx.constraints.selected_fields)
            .passages;

        state.answer = Some(generated.answer);
        state.answer_reasoning = Some(generated.reasoning);

        Ok(PipelineOutcome {
            run_id,
            query: ctx.query,
            category: ctx.category,
            persona: ctx.persona,
            normalized_query: ctx.normalized_query,
            constraints: ctx.constraints,
            corrections: ctx.corrections,
            answer: state.answer.unwrap_or_default(),
            answer_reasoning: state.answer_reasoning.unwrap_or_default(),
            answer_mode: generated.mode,
            validated_documents: state.validated_documents,
            validation_results: state.validation_results,
            retry_count: state.retry_count,
            search_stats: state.search_stats,
            stats_report,
            loop_state,
            contexts,
        })
    }

    /// The bounded retrieval loop; returns the terminal loop state
    async fn collect(&self, ctx: &QueryContext, state: &mut RunState, overrides: &SourceOverrides) -> Result<LoopState> {
        let mut query = ctx.normalized_query.clone();
        let mut constraints = ctx.constraints.clone();

        loop {
            let round = state.retry_count;
            self.emit(TelemetryEvent::RoundStarted {
                round,
                timestamp: Instant::now(),
            });

            let retrieval = self
                .coordinator
                .retrieve(ctx.category, &query, &constraints, self.settings.top_k, overrides)
                .await?;
            for report in &retrieval.reports {
                self.emit(match &report.error {
                    Some(error) => TelemetryEvent::SourceFailed {
                        source: report.source,
                        error: error.clone(),
                        timestamp: Instant::now(),
                    },
                    None => TelemetryEvent::SourceCompleted {
                        source: report.source,
                        documents: report.retrieved,
                        timestamp: Instant::now(),
                    },
                });
            }

            let candidates = retrieval.documents.len();
            state.begin_round(&query, &constraints);
            state.replace_candidates(retrieval.documents);
            let fresh = state.fresh_candidates();

            let ranked: Vec<Document> = self
                .reranker
                .rerank(&query, &fresh, state.still_needed())
                .await?
                .into_iter()
                .map(|r| r.document)
                .collect();

            // Judge against this round's constraints so widened filters count
            let round_ctx = QueryContext {
                normalized_query: query.clone(),
                constraints: constraints.clone(),
                ..ctx.clone()
            };
            let outcome = self
                .validator
                .validate(&round_ctx, &ranked, state.still_needed(), round)
                .await?;
            let judged = outcome.records.len();
            let accepted = state.record_validation(outcome);

            info!(
                round,
                candidates,
                fresh = fresh.len(),
                judged,
                accepted,
                validated = state.validated_documents.len(),
                "round complete"
            );
            self.emit(TelemetryEvent::DocumentsValidated {
                round,
                judged,
                accepted,
                timestamp: Instant::now(),
            });
            state.search_stats.push(RoundStats {
                round,
                query: query.clone(),
                date_filter: constraints.date,
                sources: retrieval.reports,
                candidates,
                fresh: fresh.len(),
                reranked: ranked.len(),
                judged,
                accepted,
            });

            let next = self.controller.evaluate(state);
            self.emit(TelemetryEvent::LoopTransition {
                to: next,
                retry_count: state.retry_count,
                timestamp: Instant::now(),
            });
            if next.is_terminal() {
                return Ok(next);
            }

            let plan = self
                .policy
                .next_round(&RetryRequest {
                    original_query: &ctx.normalized_query,
                    original_constraints: &ctx.constraints,
                    current_query: &query,
                    current_constraints: &constraints,
                    retry: state.retry_count,
                    rejections: state.rejection_rationales(RETRY_FEEDBACK),
                })
                .await;
            query = plan.query;
            constraints = plan.constraints;
        }
    }

    fn emit(&self, event: TelemetryEvent) {
        if let Some(telemetry) = &self.telemetry {
            telemetry.record(event);
        }
    }
}

/// Assembles a pipeline from capabilities and settings
#[derive(Default)]
pub struct RagPipelineBuilder {
    vector: Option<Arc<dyn VectorSearch>>,
    structured: Option<Arc<dyn StructuredSearch>>,
    graph: Option<Arc<dyn GraphSearch>>,
    aggregator: Option<Arc<dyn AggregateQuery>>,
    scorer: Option<Arc<dyn RelevanceScorer>>,
    judge: Option<Arc<dyn RelevanceJudge>>,
    model: Option<Arc<dyn CompletionModel>>,
    vocabulary: Vec<String>,
    settings: PipelineSettings,
    overrides: SourceOverrides,
    telemetry: Option<TelemetryCollector>,
}

impl RagPipelineBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Use an in-memory corpus for every store capability and its
    /// organizations as the entity vocabulary
    pub fn corpus(self, corpus: Arc<InMemoryCorpus>) -> Self {
        let vocabulary = corpus.organizations();
        self.vector_search(corpus.clone())
            .structured_search(corpus.clone())
            .graph_search(corpus.clone())
            .aggregator(corpus)
            .vocabulary(vocabulary)
    }

    pub fn vector_search(mut self, store: Arc<dyn VectorSearch>) -> Self {
        self.vector = Some(store);
        self
    }

    pub fn structured_search(mut self, store: Arc<dyn StructuredSearch>) -> Self {
        self.structured = Some(store);
        self
    }

    pub fn graph_search(mut self, store: Arc<dyn GraphSearch>) -> Self {
        self.graph = Some(store);
        self
    }

    pub fn aggregator(mut self, aggregator: Arc<dyn AggregateQuery>) -> Self {
        self.aggregator = Some(aggregator);
        self
    }

    pub fn scorer(mut self, scorer: Arc<dyn RelevanceScorer>) -> Self {
        self.scorer = Some(scorer);
        self
    }

    /// Explicit judge, overriding `settings.judge`
    pub fn judge(mut self, judge: Arc<dyn RelevanceJudge>) -> Self {
        self.judge = Some(judge);
        self
    }

    pub fn completion_model(mut self, model: Arc<dyn CompletionModel>) -> Self {
        self.model = Some(model);
        self
    }

    pub fn vocabulary(mut self, vocabulary: Vec<String>) -> Self {
        self.vocabulary = vocabulary;
        self
    }

    pub fn settings(mut self, settings: PipelineSettings) -> Self {
        self.settings = settings;
        self
    }

    pub fn overrides(mut self, overrides: SourceOverrides) -> Self {
        self.overrides = overrides;
        self
    }

    pub fn telemetry(mut self, telemetry: TelemetryCollector) -> Self {
        self.telemetry = Some(telemetry);
        self
    }

    pub fn build(self) -> Result<RagPipeline> {
        let settings = self.settings;
        settings.validate()?;
        let timeout = settings.capability_timeout;

        let vector = self
            .vector
            .ok_or_else(|| PipelineError::ConfigError("a vector search capability is required".to_string()))?;

        let resolver = EntityResolver::with_threshold(self.vocabulary, settings.fuzzy_threshold);
        let analyzer = QueryAnalyzer::new(resolver.clone(), IntentClassifier::new(settings.min_confidence));

        let mut coordinator = RetrieverCoordinator::new(timeout).with_source(Arc::new(VectorSource::new(vector)));
        if let Some(structured) = self.structured {
            coordinator = coordinator.with_source(Arc::new(StructuredSource::new(structured).with_resolver(resolver)));
        }
        if let Some(graph) = self.graph {
            coordinator = coordinator.with_source(Arc::new(GraphSource::new(graph)));
        }

        let judge: Arc<dyn RelevanceJudge> = match (self.judge, settings.judge.as_str()) {
            (Some(judge), _) => judge,
            (None, "model") => {
                let model = self.model.clone().ok_or_else(|| {
                    PipelineError::ConfigError("judge 'model' needs a completion model".to_string())
                })?;
                Arc::new(ModelJudge::new(model, timeout))
            }
            (None, _) => Arc::new(HeuristicJudge::new(settings.judge_threshold)),
        };

        let policy = policy_from_name(&settings.retry_policy, self.model.clone(), timeout)?;
        let scorer = self.scorer.unwrap_or_else(|| Arc::new(LexicalScorer::new()));

        let mut generator = AnswerGenerator::new().with_context_config(settings.context.clone());
        if let Some(model) = self.model {
            generator = generator.with_model(model, timeout);
        }

        info!(
            judge = judge.name(),
            policy = policy.name(),
            n_target = settings.n_target,
            max_retries = settings.max_retries,
            "pipeline ready"
        );

        Ok(RagPipeline {
            analyzer,
            persona_selector: PersonaSelector::new(),
            coordinator,
            reranker: Reranker::new(scorer, timeout),
            validator: DocumentValidator::new(judge),
            controller: RetryController::new(settings.n_target, settings.max_retries),
            policy,
            stats: self.aggregator.map(|aggregator| StatsEngine::new(aggregator, timeout)),
            generator,
            settings,
            overrides: self.overrides,
            telemetry: self.telemetry,
        })
    }
}
