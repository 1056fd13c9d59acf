// Retry widening policies: how the next retrieval round differs from the last
use async_trait::async_trait;
use serde::Deserialize;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, warn};

use crate::capabilities::{extract_json_object, with_timeout, CompletionModel};
use crate::errors::{PipelineError, Result};
use crate::types::Constraints;

pub const POLICY_NAMES: &[&str] = &["keep", "relax_date", "rewrite"];

/// Rejection rationales passed to the rewrite prompt
const MAX_FEEDBACK: usize = 3;

/// Inputs for planning one retry round
#[derive(Debug, Clone)]
pub struct RetryRequest<'a> {
    pub original_query: &'a str,
    pub original_constraints: &'a Constraints,
    pub current_query: &'a str,
    pub current_constraints: &'a Constraints,
    /// 1 for the first retry
    pub retry: u32,
    /// Rationales of documents rejected so far, most recent first
    pub rejections: Vec<String>,
}

/// Query and constraints for the next round
#[derive(Debug, Clone, PartialEq)]
pub struct RetryPlan {
    pub query: String,
    pub constraints: Constraints,
}

#[async_trait]
pub trait RetryPolicy: Send + Sync {
    fn name(&self) -> &'static str;

    /// Never fails: a policy that cannot improve the round repeats it
    async fn next_round(&self, request: &RetryRequest<'_>) -> RetryPlan;
}

/// Re-run with identical query and constraints
#[derive(Debug, Clone, Default)]
pub struct KeepConstraints;

#[async_trait]
impl RetryPolicy for KeepConstraints {
    fn name(&self) -> &'static str {
        "keep"
    }

    async fn next_round(&self, request: &RetryRequest<'_>) -> RetryPlan {
        RetryPlan {
            query: request.current_query.to_string(),
            constraints: request.current_constraints.clone(),
        }
    }
}

/// Widen the date filter by a year per side, then drop it
#[derive(Debug, Clone, Default)]
pub struct RelaxDateFilter;

#[async_trait]
impl RetryPolicy for RelaxDateFilter {
    fn name(&self) -> &'static str {
        "relax_date"
    }

    async fn next_round(&self, request: &RetryRequest<'_>) -> RetryPlan {
        let mut constraints = request.current_constraints.clone();
        constraints.date = match (request.original_constraints.date, request.retry) {
            (Some(date), 1) => Some(date.widened(1)),
            _ => None,
        };
        if constraints.date != request.current_constraints.date {
            debug!(
                retry = request.retry,
                date = ?constraints.date,
                "date filter relaxed"
            );
        }
        RetryPlan {
            query: request.current_query.to_string(),
            constraints,
        }
    }
}

#[derive(Debug, Deserialize)]
struct RewriteReply {
    #[serde(default)]
    rewrite_cot: Vec<String>,
    rewritten_question: String,
}

/// Ask the completion model to rephrase the query using rejection feedback
pub struct RewriteWithFeedback {
    model: Arc<dyn CompletionModel>,
    timeout: Duration,
}

impl RewriteWithFeedback {
    pub fn new(model: Arc<dyn CompletionModel>, timeout: Duration) -> Self {
        Self { model, timeout }
    }

    fn prompt(request: &RetryRequest<'_>) -> String {
        let feedback = request
            .rejections
            .iter()
            .take(MAX_FEEDBACK)
            .map(|r| format!("- {}", r))
            .collect::<Vec<_>>()
            .join("\n");

        format!(
            "감사 보고서 검색에서 충분한 근거 문서를 찾지 못했습니다.\n\
             원래 질문: {}\n\
             현재 검색 질문: {}\n\
             거절된 문서에 대한 검증 의견:\n{}\n\n\
             원래 질문의 의도를 유지하면서 더 많은 관련 문서를 찾을 수 있도록 검색 질문을 다시 작성하세요.\n\
             다음 JSON 형식으로만 답하세요: \
             {{\"rewrite_cot\": [\"...\"], \"rewritten_question\": \"...\"}}",
            request.original_query,
            request.current_query,
            if feedback.is_empty() { "- (없음)".to_string() } else { feedback },
        )
    }

    fn parse_reply(reply: &str) -> Option<RewriteReply> {
        let value = extract_json_object(reply)?;
        let parsed: RewriteReply = serde_json::from_value(value).ok()?;
        if parsed.rewritten_question.trim().is_empty() {
            return None;
        }
        Some(parsed)
    }
}

#[async_trait]
impl RetryPolicy for RewriteWithFeedback {
    fn name(&self) -> &'static str {
        "rewrite"
    }

    async fn next_round(&self, request: &RetryRequest<'_>) -> RetryPlan {
        let keep = || RetryPlan {
            query: request.current_query.to_string(),
            constraints: request.current_constraints.clone(),
        };

        let prompt = Self::prompt(request);
        let reply = match with_timeout("generate", self.timeout, self.model.complete(&prompt)).await {
            Ok(reply) => reply,
            Err(err) => {
                warn!(error = %err, "query rewrite failed, keeping previous query");
                return keep();
            }
        };

        match Self::parse_reply(&reply) {
            Some(parsed) => {
                debug!(
                    rewritten = %parsed.rewritten_question,
                    steps = parsed.rewrite_cot.len(),
                    "query rewritten"
                );
                RetryPlan {
                    query: parsed.rewritten_question.trim().to_string(),
                    constraints: request.current_constraints.clone(),
                }
            }
            None => {
                warn!("unparsable rewrite reply, keeping previous query");
                keep()
            }
        }
    }
}

/// Build the policy named in configuration
pub fn policy_from_name(
    name: &str,
    model: Option<Arc<dyn CompletionModel>>,
    timeout: Duration,
) -> Result<Arc<dyn RetryPolicy>> {
    match name {
        "keep" => Ok(Arc::new(KeepConstraints)),
        "relax_date" => Ok(Arc::new(RelaxDateFilter)),
        "rewrite" => {
            let model = model.ok_or_else(|| {
                PipelineError::ConfigError("retry policy 'rewrite' needs a completion model".to_string())
            })?;
            Ok(Arc::new(RewriteWithFeedback::new(model, timeout)))
        }
        other => Err(PipelineError::ConfigError(format!(
            "unknown retry policy '{}' (expected one of {})",
            other,
            POLICY_NAMES.join(", ")
        ))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::errors::CapabilityError;
    use crate::types::DateFilter;
    use chrono::NaiveDate;

    struct ScriptedModel(std::result::Result<String, CapabilityError>);

    #[async_trait]
    impl CompletionModel for ScriptedModel {
        async fn complete(&self, _prompt: &str) -> std::result::Result<String, CapabilityError> {
            self.0.clone()
        }
    }

    fn year_constraints() -> Constraints {
        Constraints {
            date: Some(DateFilter::Year { year: 2021 }),
            organization: Some("한국전력공사".to_string()),
            ..Default::default()
        }
    }

    fn request<'a>(constraints: &'a Constraints, retry: u32) -> RetryRequest<'a> {
        RetryRequest {
            original_query: "2021년 한국전력공사 징계",
            original_constraints: constraints,
            current_query: "2021년 한국전력공사 징계",
            current_constraints: constraints,
            retry,
            rejections: vec!["date_match: fail".to_string()],
        }
    }

    #[tokio::test]
    async fn test_keep_repeats_round() {
        let constraints = year_constraints();
        let plan = KeepConstraints.next_round(&request(&constraints, 1)).await;
        assert_eq!(plan.constraints, constraints);
        assert_eq!(plan.query, "2021년 한국전력공사 징계");
    }

    #[tokio::test]
    async fn test_relax_date_widens_then_drops() {
        let constraints = year_constraints();

        let first = RelaxDateFilter.next_round(&request(&constraints, 1)).await;
        assert_eq!(
            first.constraints.date,
            Some(DateFilter::Range {
                start: NaiveDate::from_ymd_opt(2020, 1, 1).unwrap(),
                end: NaiveDate::from_ymd_opt(2022, 12, 31).unwrap(),
            })
        );
        assert_eq!(first.constraints.organization, constraints.organization);

        let second = RelaxDateFilter.next_round(&request(&constraints, 2)).await;
        assert_eq!(second.constraints.date, None);
    }

    #[tokio::test]
    async fn test_relax_date_without_date_is_noop() {
        let constraints = Constraints::default();
        let plan = RelaxDateFilter.next_round(&request(&constraints, 1)).await;
        assert_eq!(plan.constraints, constraints);
    }

    #[tokio::test]
    async fn test_rewrite_uses_model_reply() {
        let model = Arc::new(ScriptedModel(Ok(
            "{\"rewrite_cot\": [\"broaden\"], \"rewritten_question\": \"한국전력공사 징계 처분 사례\"}".to_string(),
        )));
        let policy = RewriteWithFeedback::new(model, Duration::from_secs(1));
        let constraints = year_constraints();

        let plan = policy.next_round(&request(&constraints, 1)).await;
        assert_eq!(plan.query, "한국전력공사 징계 처분 사례");
        assert_eq!(plan.constraints, constraints);
    }

    #[tokio::test]
    async fn test_rewrite_failure_keeps_query() {
        let constraints = year_constraints();
        for model in [
            ScriptedModel(Ok("not json".to_string())),
            ScriptedModel(Ok("{\"rewritten_question\": \"  \"}".to_string())),
            ScriptedModel(Err(CapabilityError::transient("generate", "overloaded"))),
        ] {
            let policy = RewriteWithFeedback::new(Arc::new(model), Duration::from_secs(1));
            let plan = policy.next_round(&request(&constraints, 1)).await;
            assert_eq!(plan.query, "2021년 한국전력공사 징계");
        }
    }

    #[test]
    fn test_rewrite_prompt_includes_feedback() {
        let constraints = year_constraints();
        let prompt = RewriteWithFeedback::prompt(&request(&constraints, 1));
        assert!(prompt.contains("date_match: fail"));
        assert!(prompt.contains("rewritten_question"));
    }

    #[test]
    fn test_policy_from_name() {
        let timeout = Duration::from_secs(1);
        assert_eq!(policy_from_name("keep", None, timeout).unwrap().name(), "keep");
        assert_eq!(policy_from_name("relax_date", None, timeout).unwrap().name(), "relax_date");
        assert!(policy_from_name("rewrite", None, timeout).is_err());
        assert!(policy_from_name("shrug", None, timeout).is_err());

        let model: Arc<dyn CompletionModel> = Arc::new(ScriptedModel(Ok(String::new())));
        assert_eq!(policy_from_name("rewrite", Some(model), timeout).unwrap().name(), "rewrite");
    }
}
