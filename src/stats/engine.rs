//! Aggregation engine
//!
//! Turns an aggregation question into an [`AggregateRequest`], runs it and
//! formats the figures. Two query shapes are supported: a single
//! aggregate (count/sum/average) and a grouped series.

use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, warn};

use crate::capabilities::{
    with_timeout, AggregateQuery, AggregateRequest, AggregateResult, GroupKey, Metric, SearchFilters, SeriesOrder,
    SeriesPoint,
};
use crate::errors::CapabilityError;
use crate::types::Constraints;

/// Series length for "most frequent" questions
pub const TOP_N: usize = 3;

const AMOUNT_FIELD: &str = "amount";

const YEAR_CUES: &[&str] = &["연도별", "년도별", "연별", "해마다", "매년", "추이", "추세", "by year", "yearly", "trend"];
const MONTH_CUES: &[&str] = &["월별", "매월", "by month", "monthly"];
const ORGANIZATION_CUES: &[&str] = &["기관별", "기관 별", "회사별", "by organization", "per organization"];
const ACTION_CUES: &[&str] = &["조치별", "조치 유형별", "처분별", "by action"];
const CATEGORY_CUES: &[&str] = &["유형별", "분야별", "항목별", "by category", "by type"];
const MOST_CUES: &[&str] = &["가장 많이", "제일 많이", "가장 많은", "제일 많은", "최다", "most"];
const COUNT_CUES: &[&str] = &["건수", "몇 건", "몇건", "횟수", "number of", "count", "how many"];
const AVERAGE_CUES: &[&str] = &["평균", "average", "mean"];
const SUM_CUES: &[&str] = &["금액", "합계", "총액", "total", "sum"];

/// Structural shape of an aggregation question
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum QueryShape {
    SingleAggregate,
    GroupedSeries,
}

/// Outcome of one aggregation question
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StatsReport {
    pub shape: QueryShape,
    pub request: AggregateRequest,
    /// Natural-language explanation of the figures
    pub summary: String,
    pub figures: Vec<SeriesPoint>,
    pub matched: usize,
    /// Set when no figures could be produced
    pub failure: Option<String>,
}

impl StatsReport {
    pub fn is_failure(&self) -> bool {
        self.failure.is_some()
    }

    fn failed(shape: QueryShape, request: AggregateRequest, reason: String) -> Self {
        Self {
            shape,
            summary: format!("통계를 산출하지 못했습니다: {}", reason),
            request,
            figures: Vec::new(),
            matched: 0,
            failure: Some(reason),
        }
    }
}

/// ASCII cues match whole words only; Korean cues match anywhere since
/// particles attach directly to the word
fn has_cue(text: &str, cue: &str) -> bool {
    if !cue.is_ascii() {
        return text.contains(cue);
    }
    text.match_indices(cue).any(|(start, _)| {
        let before = text[..start].chars().next_back();
        let after = text[start + cue.len()..].chars().next();
        !before.is_some_and(|c| c.is_ascii_alphanumeric()) && !after.is_some_and(|c| c.is_ascii_alphanumeric())
    })
}

fn contains_any(text: &str, cues: &[&str]) -> bool {
    cues.iter().any(|c| has_cue(text, c))
}

/// Pick the query shape and build the aggregation request
pub fn plan(query: &str, constraints: &Constraints) -> (QueryShape, AggregateRequest) {
    let lower = query.to_lowercase();

    let metric = if contains_any(&lower, COUNT_CUES) {
        Metric::Count
    } else if contains_any(&lower, AVERAGE_CUES) {
        Metric::Average {
            field: AMOUNT_FIELD.to_string(),
        }
    } else if contains_any(&lower, SUM_CUES) {
        Metric::Sum {
            field: AMOUNT_FIELD.to_string(),
        }
    } else {
        Metric::Count
    };

    let explicit = if contains_any(&lower, MONTH_CUES) {
        Some(GroupKey::Month)
    } else if contains_any(&lower, YEAR_CUES) {
        Some(GroupKey::Year)
    } else if contains_any(&lower, ORGANIZATION_CUES) {
        Some(GroupKey::Organization)
    } else if contains_any(&lower, ACTION_CUES) {
        Some(GroupKey::ActionType)
    } else if contains_any(&lower, CATEGORY_CUES) {
        Some(GroupKey::Category)
    } else {
        None
    };

    let most = contains_any(&lower, MOST_CUES);
    let group_by = match (explicit, most) {
        (Some(key), _) => Some(key),
        (None, true) if lower.contains("기관") || lower.contains("organization") => Some(GroupKey::Organization),
        (None, true) if lower.contains("조치") || lower.contains("action") => Some(GroupKey::ActionType),
        (None, true) => Some(GroupKey::Category),
        (None, false) => None,
    };

    let (order, limit) = match group_by {
        Some(_) if most => (SeriesOrder::Descending, Some(TOP_N)),
        _ => (SeriesOrder::Chronological, None),
    };

    let shape = if group_by.is_some() {
        QueryShape::GroupedSeries
    } else {
        QueryShape::SingleAggregate
    };

    let request = AggregateRequest {
        filters: SearchFilters::from_constraints(constraints),
        metric,
        group_by,
        order,
        limit,
    };
    (shape, request)
}

fn format_value(metric: &Metric, value: f64) -> String {
    match metric {
        Metric::Count => format!("{}건", value.round() as i64),
        Metric::Sum { .. } | Metric::Average { .. } => format!("{:.0}원", value),
    }
}

fn metric_label(metric: &Metric) -> &'static str {
    match metric {
        Metric::Count => "지적 건수",
        Metric::Sum { .. } => "금액 합계",
        Metric::Average { .. } => "평균 금액",
    }
}

/// Condition prefix such as "2021 · 한국전력공사 기준"
fn describe_filters(filters: &SearchFilters) -> String {
    let mut parts = Vec::new();
    if let Some(date) = &filters.date {
        parts.push(date.to_string());
    }
    if let Some(org) = &filters.organization {
        parts.push(org.clone());
    }
    if !filters.action_types.is_empty() {
        parts.push(filters.action_types.join("/"));
    }
    if parts.is_empty() {
        "전체 기간 기준".to_string()
    } else {
        format!("{} 기준", parts.join(" · "))
    }
}

/// Aggregation engine over an [`AggregateQuery`] capability
pub struct StatsEngine {
    aggregator: Arc<dyn AggregateQuery>,
    timeout: Duration,
}

impl StatsEngine {
    pub fn new(aggregator: Arc<dyn AggregateQuery>, timeout: Duration) -> Self {
        Self { aggregator, timeout }
    }

    /// Answer an aggregation question with figures and a summary
    ///
    /// Unsupported requests, aggregator failures and empty matches are
    /// reported through `failure`; only an unavailable aggregator errors.
    pub async fn analyze(&self, query: &str, constraints: &Constraints) -> Result<StatsReport, CapabilityError> {
        let (shape, request) = plan(query, constraints);
        info!(
            shape = ?shape,
            metric = %request.metric,
            group_by = ?request.group_by,
            "running aggregation"
        );

        let result = match with_timeout("aggregate", self.timeout, self.aggregator.aggregate(&request)).await {
            Ok(result) => result,
            Err(err) if err.is_fatal() => return Err(err),
            Err(err) => {
                warn!(error = %err, "aggregation failed");
                return Ok(StatsReport::failed(shape, request, err.to_string()));
            }
        };

        if result.matched() == 0 {
            let reason = format!("{} 조건에 해당하는 감사 기록이 없습니다", describe_filters(&request.filters));
            return Ok(StatsReport::failed(shape, request, reason));
        }

        Ok(Self::report(shape, request, result))
    }

    fn report(shape: QueryShape, request: AggregateRequest, result: AggregateResult) -> StatsReport {
        let scope = describe_filters(&request.filters);
        let label = metric_label(&request.metric);

        let (summary, figures, matched) = match result {
            AggregateResult::Single { value, matched } => {
                let summary = format!(
                    "{} {}은(는) {}입니다 (대상 기록 {}건).",
                    scope,
                    label,
                    format_value(&request.metric, value),
                    matched
                );
                let figures = vec![SeriesPoint {
                    label: label.to_string(),
                    value,
                }];
                (summary, figures, matched)
            }
            AggregateResult::Series { points, matched } => {
                let key = request.group_by.map(|k| k.label()).unwrap_or("항목");
                let listing = points
                    .iter()
                    .map(|p| format!("{} {}", p.label, format_value(&request.metric, p.value)))
                    .collect::<Vec<_>>()
                    .join(", ");

                let summary = match (request.order, points.first()) {
                    (SeriesOrder::Descending, Some(top)) => format!(
                        "{} {}이(가) 가장 많은 {}은(는) '{}'({})입니다. 상위 {}개: {}.",
                        scope,
                        label,
                        key,
                        top.label,
                        format_value(&request.metric, top.value),
                        points.len(),
                        listing
                    ),
                    _ => format!("{} {}별 {}: {}.", scope, key, label, listing),
                };
                (summary, points, matched)
            }
        };

        StatsReport {
            shape,
            request,
            summary,
            figures,
            matched,
            failure: None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::DateFilter;
    use async_trait::async_trait;

    /// Returns a canned result and remembers nothing
    struct CannedAggregator(Result<AggregateResult, CapabilityError>);

    #[async_trait]
    impl AggregateQuery for CannedAggregator {
        async fn aggregate(&self, _request: &AggregateRequest) -> Result<AggregateResult, CapabilityError> {
            self.0.clone()
        }
    }

    fn engine(result: Result<AggregateResult, CapabilityError>) -> StatsEngine {
        StatsEngine::new(Arc::new(CannedAggregator(result)), Duration::from_secs(1))
    }

    fn year_2021() -> Constraints {
        Constraints {
            date: Some(DateFilter::Year { year: 2021 }),
            ..Default::default()
        }
    }

    #[test]
    fn test_plan_most_frequent() {
        let (shape, request) = plan("2021년도에 관련해서 가장 많이 지적된 사항이 뭐야?", &year_2021());
        assert_eq!(shape, QueryShape::GroupedSeries);
        assert_eq!(request.group_by, Some(GroupKey::Category));
        assert_eq!(request.order, SeriesOrder::Descending);
        assert_eq!(request.limit, Some(TOP_N));
        assert_eq!(request.metric, Metric::Count);
        assert_eq!(request.filters.date, Some(DateFilter::Year { year: 2021 }));
    }

    #[test]
    fn test_plan_yearly_trend() {
        let (shape, request) = plan("연도별 징계 건수 추이를 알려줘", &Constraints::default());
        assert_eq!(shape, QueryShape::GroupedSeries);
        assert_eq!(request.group_by, Some(GroupKey::Year));
        assert_eq!(request.order, SeriesOrder::Chronological);
        assert_eq!(request.limit, None);
    }

    #[test]
    fn test_plan_single_count_and_sum() {
        let (shape, request) = plan("2021년 징계 건수는 몇 건이야?", &year_2021());
        assert_eq!(shape, QueryShape::SingleAggregate);
        assert_eq!(request.metric, Metric::Count);

        let (_, request) = plan("환수 금액 합계는?", &Constraints::default());
        assert_eq!(
            request.metric,
            Metric::Sum {
                field: "amount".to_string()
            }
        );

        let (_, request) = plan("average amount per case", &Constraints::default());
        assert!(matches!(request.metric, Metric::Average { .. }));
    }

    #[test]
    fn test_count_cues_take_precedence() {
        let (_, request) = plan("what is the total number of disciplinary cases in 2021", &year_2021());
        assert_eq!(request.metric, Metric::Count);

        let (_, request) = plan("summarize the count of findings", &Constraints::default());
        assert_eq!(request.metric, Metric::Count);

        let (_, request) = plan("환수 금액 합계와 건수", &Constraints::default());
        assert_eq!(request.metric, Metric::Count);
    }

    #[test]
    fn test_english_cues_match_whole_words() {
        let (shape, request) = plan("summarize findings almost resolved", &Constraints::default());
        assert_eq!(shape, QueryShape::SingleAggregate);
        assert_eq!(request.metric, Metric::Count);
        assert_eq!(request.group_by, None);

        let (_, request) = plan("sum of recovered amounts", &Constraints::default());
        assert!(matches!(request.metric, Metric::Sum { .. }));

        let (_, request) = plan("which organization was cited the most?", &Constraints::default());
        assert_eq!(request.group_by, Some(GroupKey::Organization));
    }

    #[test]
    fn test_plan_most_by_organization() {
        let (_, request) = plan("가장 많이 지적받은 기관은?", &Constraints::default());
        assert_eq!(request.group_by, Some(GroupKey::Organization));
    }

    #[tokio::test]
    async fn test_single_report() {
        let report = engine(Ok(AggregateResult::Single {
            value: 12.0,
            matched: 12,
        }))
        .analyze("2021년 징계 건수는?", &year_2021())
        .await
        .unwrap();

        assert!(!report.is_failure());
        assert_eq!(report.shape, QueryShape::SingleAggregate);
        assert!(report.summary.contains("12건"));
        assert!(report.summary.contains("2021 기준"));
    }

    #[tokio::test]
    async fn test_series_report_names_top_group() {
        let points = vec![
            SeriesPoint {
                label: "계약".to_string(),
                value: 5.0,
            },
            SeriesPoint {
                label: "인사".to_string(),
                value: 3.0,
            },
        ];
        let report = engine(Ok(AggregateResult::Series { points, matched: 8 }))
            .analyze("2021년도에 관련해서 가장 많이 지적된 사항이 뭐야?", &year_2021())
            .await
            .unwrap();

        assert_eq!(report.figures.len(), 2);
        assert!(report.summary.contains("'계약'(5건)"));
    }

    #[tokio::test]
    async fn test_empty_match_is_failure() {
        let report = engine(Ok(AggregateResult::Single { value: 0.0, matched: 0 }))
            .analyze("징계 건수는?", &Constraints::default())
            .await
            .unwrap();
        assert!(report.is_failure());
        assert!(report.figures.is_empty());
    }

    #[tokio::test]
    async fn test_invalid_request_is_failure() {
        let report = engine(Err(CapabilityError::invalid("aggregate", "unsupported metric")))
            .analyze("평균 금액은?", &Constraints::default())
            .await
            .unwrap();
        assert!(report.failure.as_deref().unwrap_or_default().contains("unsupported metric"));
    }

    #[tokio::test]
    async fn test_unavailable_aggregator_errors() {
        let err = engine(Err(CapabilityError::unavailable("aggregate", "db down")))
            .analyze("징계 건수는?", &Constraints::default())
            .await
            .unwrap_err();
        assert!(err.is_fatal());
    }
}
