//! Answer generation
//!
//! Builds the final answer and its reasoning trace from validated
//! evidence, the persona profile and the field-selection rationale. A
//! completion model is optional; without one, or when it fails
//! transiently, the answer is assembled extractively from the evidence.
//! Empty evidence yields an explicit insufficient-evidence answer.

use regex::Regex;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::sync::{Arc, LazyLock};
use std::time::Duration;
use tracing::{debug, info, warn};

use crate::analyzer::Correction;
use crate::capabilities::{with_timeout, CompletionModel};
use crate::errors::CapabilityError;
use crate::persona::PersonaProfile;
use crate::rag::context::{field_label, ContextConfig, EvidenceContextBuilder};
use crate::stats::StatsReport;
use crate::types::{Category, Document, Persona, QueryContext, ReportField};
use crate::validation::judge::query_terms;

/// Phrase used when the evidence does not cover the question
pub const NO_INFO: &str = "제공된 문서에서 관련 정보를 찾을 수 없습니다.";

const CHITCHAT_REPLY: &str = "안녕하세요! 감사 보고서 검색 도우미입니다. 기관명, 연도, 조치 유형 등을 \
    포함해 질문해 주시면 관련 감사 사례를 찾아 드립니다.";

const SNIPPET_CHARS: usize = 160;

static CITATION_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\[([^\[\]]+)\]").expect("valid citation regex"));
const MAX_SUGGESTIONS: usize = 5;

/// Whether a model reply stays within the evidence it was given
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Grounding {
    Grounded { cited: Vec<String> },
    Ungrounded { reason: String },
}

/// Check the `[ID]` citations of a model reply against the evidence
///
/// A reply is grounded when it cites at least one evidence document and
/// every id-like citation names one. Bracket parts without an ASCII
/// letter (dates, amounts) and parts with spaces are not treated as ids.
pub fn check_grounding(reply: &str, evidence: &[Document]) -> Grounding {
    let known: HashSet<&str> = evidence.iter().map(|d| d.id.as_str()).collect();
    let mut cited: Vec<String> = Vec::new();
    let mut unknown: Vec<String> = Vec::new();

    for caps in CITATION_RE.captures_iter(reply) {
        for part in caps[1].split([',', '|', ';']).map(str::trim) {
            let id_like = !part.is_empty()
                && part.chars().any(|c| c.is_ascii_alphabetic())
                && part.chars().all(|c| c.is_ascii_alphanumeric() || "-_.:".contains(c));
            if !id_like {
                continue;
            }
            let target = if known.contains(part) { &mut cited } else { &mut unknown };
            if !target.iter().any(|id| id == part) {
                target.push(part.to_string());
            }
        }
    }

    if !unknown.is_empty() {
        Grounding::Ungrounded {
            reason: format!("cites documents outside the evidence: {}", unknown.join(", ")),
        }
    } else if cited.is_empty() {
        Grounding::Ungrounded {
            reason: "cites no evidence document".to_string(),
        }
    } else {
        Grounding::Grounded { cited }
    }
}

/// Everything the generator needs for one answer
#[derive(Debug, Clone, Copy)]
pub struct GenerationInput<'a> {
    pub ctx: &'a QueryContext,
    pub evidence: &'a [Document],
    pub stats: Option<&'a StatsReport>,
    pub retry_count: u32,
    pub n_target: usize,
}

/// How the answer text was produced
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AnswerMode {
    Model,
    Extractive,
    Conversational,
    Statistics,
    InsufficientEvidence,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GeneratedAnswer {
    pub answer: String,
    pub reasoning: Vec<String>,
    pub mode: AnswerMode,
}

pub struct AnswerGenerator {
    model: Option<Arc<dyn CompletionModel>>,
    timeout: Duration,
    context_builder: EvidenceContextBuilder,
}

impl AnswerGenerator {
    /// Extractive-only generator
    pub fn new() -> Self {
        Self {
            model: None,
            timeout: Duration::from_secs(30),
            context_builder: EvidenceContextBuilder::new(),
        }
    }

    pub fn with_model(mut self, model: Arc<dyn CompletionModel>, timeout: Duration) -> Self {
        self.model = Some(model);
        self.timeout = timeout;
        self
    }

    pub fn with_context_config(mut self, config: ContextConfig) -> Self {
        self.context_builder = EvidenceContextBuilder::with_config(config);
        self
    }

    pub fn context_builder(&self) -> &EvidenceContextBuilder {
        &self.context_builder
    }

    /// Produce an answer; only an unavailable model is an error
    pub async fn generate(&self, input: GenerationInput<'_>) -> Result<GeneratedAnswer, CapabilityError> {
        let ctx = input.ctx;
        let profile = PersonaProfile::for_persona(ctx.persona);

        let mut reasoning = vec![format!(
            "Step 1: category={}, persona={} ({})",
            ctx.category,
            ctx.persona,
            profile.sections.join(" / ")
        )];

        let answer = match ctx.category {
            Category::Chitchat => {
                reasoning.push("Step 2: conversational query, no retrieval performed".to_string());
                GeneratedAnswer {
                    answer: CHITCHAT_REPLY.to_string(),
                    reasoning,
                    mode: AnswerMode::Conversational,
                }
            }
            Category::Aggregation => self.from_stats(input, &profile, reasoning).await?,
            Category::GeneralSearch | Category::RegulationGraphSearch if input.evidence.is_empty() => {
                Self::insufficient(input, reasoning)
            }
            Category::GeneralSearch | Category::RegulationGraphSearch => {
                self.from_evidence(input, &profile, reasoning).await?
            }
        };

        info!(mode = ?answer.mode, chars = answer.answer.chars().count(), "answer generated");
        Ok(answer)
    }

    async fn from_stats(
        &self,
        input: GenerationInput<'_>,
        profile: &PersonaProfile,
        mut reasoning: Vec<String>,
    ) -> Result<GeneratedAnswer, CapabilityError> {
        let Some(report) = input.stats else {
            reasoning.push("Step 2: no statistics report was produced".to_string());
            return Ok(GeneratedAnswer {
                answer: format!("요청하신 통계를 산출할 수 없습니다. {}", NO_INFO),
                reasoning,
                mode: AnswerMode::Statistics,
            });
        };

        reasoning.push(format!(
            "Step 2: aggregation shape={:?}, metric={}, group_by={:?}, matched={}",
            report.shape, report.request.metric, report.request.group_by, report.matched
        ));

        if let Some(failure) = &report.failure {
            reasoning.push(format!("Step 3: aggregation failed: {}", failure));
            return Ok(GeneratedAnswer {
                answer: format!(
                    "요청하신 통계를 산출할 수 없습니다. {}. 기간이나 기관 조건을 바꾸어 다시 질문해 주세요.",
                    failure
                ),
                reasoning,
                mode: AnswerMode::Statistics,
            });
        }

        let figures = report
            .figures
            .iter()
            .map(|p| format!("- {}: {}", p.label, p.value))
            .collect::<Vec<_>>()
            .join("\n");

        if let Some(model) = &self.model {
            let prompt = format!(
                "{}\n\n[통계 결과]\n{}\n{}\n\n[질문]\n{}\n\n통계 결과의 수치만 사용하여 질문에 답하세요.",
                profile.instructions, report.summary, figures, input.ctx.query
            );
            match with_timeout("generate", self.timeout, model.complete(&prompt)).await {
                Ok(reply) if !reply.trim().is_empty() => {
                    reasoning.push("Step 3: statistics phrased by the completion model".to_string());
                    return Ok(GeneratedAnswer {
                        answer: reply.trim().to_string(),
                        reasoning,
                        mode: AnswerMode::Statistics,
                    });
                }
                Ok(_) => warn!("empty model reply, using statistics summary"),
                Err(err) if err.is_fatal() => return Err(err),
                Err(err) => warn!(error = %err, "statistics phrasing failed, using summary"),
            }
        }

        reasoning.push("Step 3: answer taken from the statistics summary".to_string());
        Ok(GeneratedAnswer {
            answer: format!("{}\n\n{}", report.summary, figures),
            reasoning,
            mode: AnswerMode::Statistics,
        })
    }

    fn insufficient(input: GenerationInput<'_>, mut reasoning: Vec<String>) -> GeneratedAnswer {
        reasoning.push(format!(
            "Step 2: no document passed validation after {} retries",
            input.retry_count
        ));

        let suggestions = suggest_keywords(input.ctx);
        let mut answer = format!(
            "{} 검증을 통과한 근거 문서가 없어 질문에 답변할 수 없습니다.",
            NO_INFO
        );
        if !suggestions.is_empty() {
            reasoning.push(format!("Step 3: suggested keywords {:?}", suggestions));
            answer.push_str(&format!(
                "\n다음 키워드를 조합하거나 조건을 완화하여 다시 질문해 보세요: {}",
                suggestions.join(", ")
            ));
        }

        GeneratedAnswer {
            answer,
            reasoning,
            mode: AnswerMode::InsufficientEvidence,
        }
    }

    async fn from_evidence(
        &self,
        input: GenerationInput<'_>,
        profile: &PersonaProfile,
        mut reasoning: Vec<String>,
    ) -> Result<GeneratedAnswer, CapabilityError> {
        let ctx = input.ctx;
        let fields = &ctx.constraints.selected_fields;

        reasoning.push(format!(
            "Step 2: selected fields [{}]",
            fields.iter().map(|f| f.as_str()).collect::<Vec<_>>().join(", ")
        ));
        reasoning.extend(ctx.constraints.selected_fields_cot.iter().map(|s| format!("  {}", s)));
        reasoning.push(format!(
            "Step 3: {} of {} target documents validated: {}",
            input.evidence.len(),
            input.n_target,
            input
                .evidence
                .iter()
                .map(|d| d.id.as_str())
                .collect::<Vec<_>>()
                .join(", ")
        ));

        if let Some(model) = &self.model {
            let context = self.context_builder.build(input.evidence, fields);
            let prompt = format!(
                "{}\n\n[근거 문서]\n{}\n\n[질문]\n{}\n\n근거 문서에 있는 내용만 사용하고, 인용한 문서의 ID를 [ID] 형태로 표시하세요. \
                 근거가 없으면 \"{}\"라고 답하세요.",
                profile.instructions, context.text, ctx.normalized_query, NO_INFO
            );
            debug!(tokens = context.estimated_tokens, documents = context.document_count(), "prompting model");

            match with_timeout("generate", self.timeout, model.complete(&prompt)).await {
                Ok(reply) if !reply.trim().is_empty() => match check_grounding(&reply, input.evidence) {
                    Grounding::Grounded { cited } => {
                        reasoning.push(format!(
                            "Step 4: answer written by the completion model, citing {}",
                            cited.join(", ")
                        ));
                        return Ok(GeneratedAnswer {
                            answer: with_partial_note(reply.trim().to_string(), input),
                            reasoning,
                            mode: AnswerMode::Model,
                        });
                    }
                    Grounding::Ungrounded { reason } => {
                        warn!(%reason, "model answer not grounded, falling back to extractive answer");
                        reasoning.push(format!("Step 4: model answer discarded, {}", reason));
                    }
                },
                Ok(_) => warn!("empty model reply, falling back to extractive answer"),
                Err(err) if err.is_fatal() => return Err(err),
                Err(err) => warn!(error = %err, "generation failed, falling back to extractive answer"),
            }
        }

        reasoning.push("Step 4: extractive answer laid out per persona".to_string());
        Ok(GeneratedAnswer {
            answer: with_partial_note(extractive_answer(ctx, input.evidence, profile), input),
            reasoning,
            mode: AnswerMode::Extractive,
        })
    }
}

impl Default for AnswerGenerator {
    fn default() -> Self {
        Self::new()
    }
}

fn with_partial_note(mut answer: String, input: GenerationInput<'_>) -> String {
    if input.evidence.len() < input.n_target {
        answer.push_str(&format!(
            "\n\n※ 목표 근거 {}건 중 {}건만 검증되었습니다 (부분 근거).",
            input.n_target,
            input.evidence.len()
        ));
    }
    answer
}

fn snippet(text: &str) -> String {
    let flat = text.split_whitespace().collect::<Vec<_>>().join(" ");
    if flat.chars().count() <= SNIPPET_CHARS {
        return flat;
    }
    let cut: String = flat.chars().take(SNIPPET_CHARS).collect();
    format!("{}…", cut)
}

fn citation(doc: &Document) -> String {
    let mut parts = vec![doc.id.clone()];
    if let Some(date) = doc.meta_str("date") {
        parts.push(date.to_string());
    }
    if let Some(company) = doc.company() {
        parts.push(company.to_string());
    }
    format!("[{}]", parts.join(" | "))
}

/// First selected field of `preferred` the document carries
fn pick_field<'d>(doc: &'d Document, preferred: &[ReportField], selected: &[ReportField]) -> Option<(ReportField, &'d str)> {
    preferred
        .iter()
        .filter(|f| selected.is_empty() || selected.contains(*f))
        .find_map(|f| doc.field(*f).map(|text| (*f, text)))
}

fn section_lines(evidence: &[Document], preferred: &[ReportField], selected: &[ReportField]) -> Vec<String> {
    evidence
        .iter()
        .filter_map(|doc| {
            pick_field(doc, preferred, selected)
                .map(|(field, text)| format!("- {} {}: {}", citation(doc), field_label(field), snippet(text)))
        })
        .collect()
}

fn push_section(out: &mut Vec<String>, heading: &str, lines: Vec<String>) {
    out.push(format!("## {}", heading));
    if lines.is_empty() {
        out.push(format!("- {}", NO_INFO));
    } else {
        out.extend(lines);
    }
}

/// Evidence laid out under the persona's section headings
pub fn extractive_answer(ctx: &QueryContext, evidence: &[Document], profile: &PersonaProfile) -> String {
    let selected = &ctx.constraints.selected_fields;
    let mut out = Vec::new();

    if ctx.constraints.action_only() {
        out.push(format!("질문과 관련된 감사 사례 {}건의 조치사항입니다.", evidence.len()));
        push_section(
            &mut out,
            field_label(ReportField::Action),
            section_lines(evidence, &[ReportField::Action], selected),
        );
        return out.join("\n");
    }

    match profile.persona {
        Persona::Common => {
            out.push(format!("## {}", profile.sections[0]));
            out.push(format!("질문과 관련된 감사 사례 {}건을 찾았습니다.", evidence.len()));
            for doc in evidence {
                let body = EvidenceContextBuilder::field_lines(doc, selected)
                    .iter()
                    .map(|line| snippet(line))
                    .collect::<Vec<_>>()
                    .join(" / ");
                out.push(format!("- {} {}", citation(doc), body));
            }
            out.push(format!("## {}", profile.sections[1]));
            out.extend(evidence.iter().map(|doc| {
                let title = doc.field(ReportField::Title).unwrap_or_default();
                format!("- {} {}", citation(doc), title).trim_end().to_string()
            }));
        }
        Persona::Auditor => {
            push_section(
                &mut out,
                profile.sections[0],
                section_lines(evidence, &[ReportField::Problems, ReportField::Outline], selected),
            );
            push_section(
                &mut out,
                profile.sections[1],
                section_lines(evidence, &[ReportField::Standards, ReportField::Criteria], selected),
            );
            push_section(
                &mut out,
                profile.sections[2],
                section_lines(evidence, &[ReportField::Action, ReportField::Opinion], selected),
            );
        }
        Persona::Manager => {
            let mut companies: Vec<&str> = evidence.iter().filter_map(|d| d.company()).collect();
            companies.sort_unstable();
            companies.dedup();
            let mut dates: Vec<_> = evidence.iter().filter_map(|d| d.date()).collect();
            dates.sort_unstable();

            let mut status = format!("- 관련 감사 사례 {}건", evidence.len());
            if !companies.is_empty() {
                status.push_str(&format!(", 대상 기관: {}", companies.join(", ")));
            }
            if let (Some(first), Some(last)) = (dates.first(), dates.last()) {
                status.push_str(&format!(", 기간: {} ~ {}", first, last));
            }
            push_section(&mut out, profile.sections[0], vec![status]);
            push_section(
                &mut out,
                profile.sections[1],
                section_lines(evidence, &[ReportField::Problems, ReportField::Outline], selected),
            );
            push_section(
                &mut out,
                profile.sections[2],
                section_lines(
                    evidence,
                    &[ReportField::Criteria, ReportField::Action, ReportField::Opinion],
                    selected,
                ),
            );
        }
    }

    out.join("\n")
}

/// Follow-up keywords for a query that found no evidence
pub fn suggest_keywords(ctx: &QueryContext) -> Vec<String> {
    let mut keywords: Vec<String> = Vec::new();
    let mut push = |k: String| {
        if !k.is_empty() && !keywords.contains(&k) && keywords.len() < MAX_SUGGESTIONS {
            keywords.push(k);
        }
    };

    for correction in &ctx.corrections {
        if let Correction::Unmatched { original } = correction {
            push(format!("{}(정확한 기관명 확인)", original));
        }
    }
    if let Some(org) = &ctx.constraints.organization {
        push(org.clone());
    }
    for term in &ctx.constraints.regulation_terms {
        push(term.clone());
    }
    for action in &ctx.constraints.action_types {
        push(action.clone());
    }
    for term in query_terms(&ctx.normalized_query) {
        push(term);
    }
    if let Some(date) = &ctx.constraints.date {
        push(format!("{} 전후 연도", date));
    }
    keywords
}
