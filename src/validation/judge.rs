//! Relevance judges
//!
//! A judge looks at one (query, document) pair and decides whether the
//! document can directly answer the query under its constraints.

use async_trait::async_trait;
use std::sync::Arc;
use std::time::Duration;

use crate::analyzer::fuzzy::strip_particle;
use crate::capabilities::{extract_json_object, with_timeout, CompletionModel, SearchFilters};
use crate::errors::CapabilityError;
use crate::types::{Document, QueryContext, ReportField};
use crate::validation::types::{Judgment, ValidationCheck, ValidationScore, Verdict};

/// Default acceptance threshold for the heuristic judge
pub const DEFAULT_THRESHOLD: f64 = 0.6;

/// Minimum content length for a document to count as substantive
const MIN_CONTENT_CHARS: usize = 20;

/// Query words that carry no content
const STOP_WORDS: &[&str] = &[
    "사례", "알려줘", "찾아줘", "보여줘", "관련", "관련된", "관련해서", "최근", "내용", "뭐야", "어떤", "있어",
    "무엇", "대해", "대한", "관한", "감사", "결과", "정리해줘", "설명해줘", "the", "and", "for", "what", "which",
    "show", "find", "cases", "case", "about",
];

#[async_trait]
pub trait RelevanceJudge: Send + Sync {
    fn name(&self) -> &'static str;

    /// Other errors reject the document; `Unavailable` aborts the run
    async fn judge(&self, ctx: &QueryContext, doc: &Document) -> Result<Judgment, CapabilityError>;
}

/// Content terms of a query: particles stripped, stop words and dates removed
pub fn query_terms(query: &str) -> Vec<String> {
    let mut terms: Vec<String> = Vec::new();
    for raw in query.split_whitespace() {
        let cleaned = raw.trim_matches(|c: char| !c.is_alphanumeric()).to_lowercase();
        let term = strip_particle(&cleaned).to_string();
        if term.chars().count() < 2
            || STOP_WORDS.contains(&term.as_str())
            || term.chars().any(|c| c.is_ascii_digit())
            || terms.contains(&term)
        {
            continue;
        }
        terms.push(term);
    }
    terms
}

/// Weighted rule-based judge
#[derive(Debug, Clone)]
pub struct HeuristicJudge {
    threshold: f64,
}

impl Default for HeuristicJudge {
    fn default() -> Self {
        Self::new(DEFAULT_THRESHOLD)
    }
}

impl HeuristicJudge {
    pub fn new(threshold: f64) -> Self {
        Self { threshold }
    }

    pub fn threshold(&self) -> f64 {
        self.threshold
    }

    /// Run every check; pure and deterministic
    pub fn evaluate(&self, ctx: &QueryContext, doc: &Document) -> (Vec<ValidationCheck>, ValidationScore) {
        let filters = SearchFilters::from_constraints(&ctx.constraints);
        let checks = vec![
            self.check_date(&filters, doc),
            self.check_organization(&filters, doc),
            self.check_term_coverage(ctx, doc),
            self.check_field_present(ctx, doc),
            self.check_content_length(doc),
        ];
        let score = ValidationScore::from_checks(&checks, self.threshold);
        (checks, score)
    }

    /// Required: date constraint holds (weight 0.25)
    fn check_date(&self, filters: &SearchFilters, doc: &Document) -> ValidationCheck {
        let mut check = ValidationCheck::new("date_match", 0.25).required();
        match (&filters.date, doc.date()) {
            (None, _) => check.pass("no date constraint"),
            (Some(filter), Some(date)) if filter.contains(date) => {
                check.pass(format!("{} satisfies {}", date, filter))
            }
            (Some(filter), Some(date)) => check.fail(format!("{} outside {}", date, filter)),
            (Some(filter), None) => check.fail(format!("document has no date, {} required", filter)),
        }
        check
    }

    /// Required: organization constraint holds (weight 0.2)
    fn check_organization(&self, filters: &SearchFilters, doc: &Document) -> ValidationCheck {
        let mut check = ValidationCheck::new("organization_match", 0.2).required();
        match &filters.organization {
            None => check.pass("no organization constraint"),
            Some(org) if filters.organization_matches(doc) => check.pass(format!("issued for {}", org)),
            Some(org) => check.fail(format!(
                "issued for {}, not {}",
                doc.company().unwrap_or("unknown organization"),
                org
            )),
        }
        check
    }

    /// Query term coverage of at least one half (weight 0.35)
    fn check_term_coverage(&self, ctx: &QueryContext, doc: &Document) -> ValidationCheck {
        let mut check = ValidationCheck::new("term_coverage", 0.35);
        let terms = query_terms(&ctx.normalized_query);
        if terms.is_empty() {
            check.pass("no content terms in query");
            return check;
        }

        let haystack = document_text(doc);
        let covered: Vec<&String> = terms.iter().filter(|t| haystack.contains(t.as_str())).collect();
        let ratio = covered.len() as f64 / terms.len() as f64;
        let detail = format!("{}/{} query terms present", covered.len(), terms.len());
        if ratio >= 0.5 {
            check.pass(detail);
        } else {
            check.fail(detail);
        }
        check
    }

    /// At least one selected field is present (weight 0.1)
    fn check_field_present(&self, ctx: &QueryContext, doc: &Document) -> ValidationCheck {
        let mut check = ValidationCheck::new("field_present", 0.1);
        let selected = &ctx.constraints.selected_fields;
        let present: Vec<&str> = selected
            .iter()
            .filter(|f| doc.field(**f).is_some())
            .map(|f| f.as_str())
            .collect();

        if selected.is_empty() {
            check.pass("no field selection");
        } else if present.is_empty() {
            check.fail("none of the selected fields present");
        } else {
            check.pass(format!("has {}", present.join(", ")));
        }
        check
    }

    /// Substantive content (weight 0.1)
    fn check_content_length(&self, doc: &Document) -> ValidationCheck {
        let mut check = ValidationCheck::new("content_length", 0.1);
        let chars = doc.content.trim().chars().count();
        if chars >= MIN_CONTENT_CHARS {
            check.pass(format!("{} chars", chars));
        } else {
            check.fail(format!("only {} chars", chars));
        }
        check
    }
}

/// Lowercased content plus every report field and company
fn document_text(doc: &Document) -> String {
    let mut text = doc.content.to_lowercase();
    for field in ReportField::ALL {
        if let Some(value) = doc.field(field) {
            text.push(' ');
            text.push_str(&value.to_lowercase());
        }
    }
    for key in ["company", "action_type", "category"] {
        if let Some(value) = doc.meta_str(key) {
            text.push(' ');
            text.push_str(&value.to_lowercase());
        }
    }
    text
}

#[async_trait]
impl RelevanceJudge for HeuristicJudge {
    fn name(&self) -> &'static str {
        "heuristic"
    }

    async fn judge(&self, ctx: &QueryContext, doc: &Document) -> Result<Judgment, CapabilityError> {
        let (checks, score) = self.evaluate(ctx, doc);
        let mut rationale: Vec<String> = checks.iter().map(ValidationCheck::describe).collect();
        rationale.push(format!(
            "score {:.2} against threshold {:.2}: {}",
            score.overall,
            score.threshold,
            if score.passed { "accepted" } else { "rejected" }
        ));

        Ok(Judgment {
            verdict: if score.passed {
                Verdict::Accepted
            } else {
                Verdict::Rejected
            },
            score: Some(score.overall),
            rationale,
        })
    }
}

const JUDGE_INSTRUCTIONS: &str = "당신은 감사보고서 기반 검색 시스템의 문서 유효성 검증기입니다.
사용자 질문과 단일 감사보고서 문서를 비교하여, 문서만으로 질문에 단정적인 답변을 할 수 있는지 엄격하게 판단하십시오.
질문에 기간, 연도, 대상 기관, 조치 조건이 있으면 문서가 그 조건을 정확히 만족해야 합니다.
애매하면 \"no\"로 판단하십시오.
JSON만 출력하십시오: {\"is_valid\": \"yes\" 또는 \"no\", \"validator_cot\": [\"Step 1: ...\", \"Step 2: ...\", \"Step 3: ...\"]}";

/// Judge backed by a completion model
pub struct ModelJudge {
    model: Arc<dyn CompletionModel>,
    timeout: Duration,
}

impl ModelJudge {
    pub fn new(model: Arc<dyn CompletionModel>, timeout: Duration) -> Self {
        Self { model, timeout }
    }

    fn prompt(ctx: &QueryContext, doc: &Document) -> String {
        format!(
            "{}\n\n[Question]\n{}\n\n[Document]\n{}\n",
            JUDGE_INSTRUCTIONS, ctx.normalized_query, doc.content
        )
    }

    /// Parse `{"is_valid": "yes"|"no", "validator_cot": [...]}`
    fn parse_reply(reply: &str) -> Judgment {
        let Some(value) = extract_json_object(reply) else {
            return Judgment::rejected(vec!["judge reply was not valid JSON".to_string()]);
        };

        let rationale: Vec<String> = value["validator_cot"]
            .as_array()
            .map(|steps| {
                steps
                    .iter()
                    .filter_map(|s| s.as_str().map(str::to_string))
                    .collect()
            })
            .unwrap_or_default();

        match value["is_valid"].as_str().map(|s| s.trim().to_lowercase()) {
            Some(v) if v == "yes" => Judgment::accepted(rationale),
            Some(v) if v == "no" => Judgment::rejected(rationale),
            _ => {
                let mut rationale = rationale;
                rationale.push("judge reply had no yes/no verdict".to_string());
                Judgment::rejected(rationale)
            }
        }
    }
}

#[async_trait]
impl RelevanceJudge for ModelJudge {
    fn name(&self) -> &'static str {
        "model"
    }

    async fn judge(&self, ctx: &QueryContext, doc: &Document) -> Result<Judgment, CapabilityError> {
        let prompt = Self::prompt(ctx, doc);
        match with_timeout("judge", self.timeout, self.model.complete(&prompt)).await {
            Ok(reply) => Ok(Self::parse_reply(&reply)),
            Err(err) if err.is_fatal() => Err(err),
            Err(err) => Ok(Judgment::rejected(vec![format!("judge call failed: {}", err)])),
        }
    }
}
