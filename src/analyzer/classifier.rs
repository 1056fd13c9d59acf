//! Cue-based intent classification

use crate::types::Category;

/// Greeting prefixes for the short-chitchat rule
const GREETINGS: &[&str] = &["안녕", "하이", "반가", "hello", "hi", "hey", "고마"];

/// Queries shorter than this that start with a greeting are chitchat
const SHORT_QUERY_CHARS: usize = 10;

struct CueSet {
    category: Category,
    weight: f64,
    cues: &'static [&'static str],
}

const CUE_SETS: &[CueSet] = &[
    CueSet {
        category: Category::Aggregation,
        weight: 2.0,
        cues: &[
            "몇 건", "몇건", "건수", "통계", "가장 많이", "가장 많은", "가장 적", "추이", "연도별", "년도별",
            "월별", "기관별", "유형별", "비율", "평균", "합계", "총액", "how many", "number of", "count of",
            "trend", "statistics", "most common", "most frequent", "average", "total amount",
        ],
    },
    CueSet {
        category: Category::RegulationGraphSearch,
        weight: 1.5,
        cues: &[
            "법률", "법령", "시행령", "조항", "어떤 규정", "관련 규정", "규정 위반", "위반한 규정", "근거 규정",
            "regulation", "statute", "which law", "violated",
        ],
    },
    CueSet {
        category: Category::Chitchat,
        weight: 2.0,
        cues: &["안녕", "반가워", "고마워", "감사합니다", "누구니", "누구야", "who are you", "thank you", "thanks"],
    },
    CueSet {
        category: Category::GeneralSearch,
        weight: 1.0,
        cues: &["사례", "알려줘", "찾아줘", "보여줘", "내용", "case", "find", "show", "list"],
    },
];

/// Classification result with its confidence in [0, 1]
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Classification {
    pub category: Category,
    pub confidence: f64,
}

#[derive(Debug, Clone)]
pub struct IntentClassifier {
    min_confidence: f64,
}

impl Default for IntentClassifier {
    fn default() -> Self {
        Self { min_confidence: 0.4 }
    }
}

impl IntentClassifier {
    pub fn new(min_confidence: f64) -> Self {
        Self { min_confidence }
    }

    pub fn classify(&self, query: &str) -> Classification {
        let lower = query.trim().to_lowercase();

        if lower.chars().count() < SHORT_QUERY_CHARS && starts_with_greeting(&lower) {
            return Classification {
                category: Category::Chitchat,
                confidence: 1.0,
            };
        }

        let scores: Vec<(Category, f64)> = CUE_SETS
            .iter()
            .map(|set| {
                let hits = set.cues.iter().filter(|cue| lower.contains(*cue)).count();
                (set.category, hits as f64 * set.weight)
            })
            .collect();

        let total: f64 = scores.iter().map(|(_, s)| s).sum();
        if total == 0.0 {
            return Self::fallback();
        }

        let best = scores.iter().map(|(_, s)| *s).fold(0.0, f64::max);
        let leaders: Vec<Category> = scores
            .iter()
            .filter(|(_, s)| *s == best)
            .map(|(c, _)| *c)
            .collect();

        let confidence = best / total;
        if leaders.len() > 1 || confidence < self.min_confidence {
            return Classification {
                category: Category::GeneralSearch,
                confidence,
            };
        }

        Classification {
            category: leaders[0],
            confidence,
        }
    }

    fn fallback() -> Classification {
        Classification {
            category: Category::GeneralSearch,
            confidence: 0.0,
        }
    }
}

fn starts_with_greeting(lower: &str) -> bool {
    GREETINGS.iter().any(|g| {
        lower
            .strip_prefix(g)
            .map_or(false, |rest| !rest.starts_with(|c: char| c.is_ascii_alphabetic()))
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn classify(query: &str) -> Category {
        IntentClassifier::default().classify(query).category
    }

    #[test]
    fn test_aggregation_most_frequent() {
        assert_eq!(
            classify("2021년도에 관련해서 가장 많이 지적된 사항이 뭐야?"),
            Category::Aggregation
        );
        assert_eq!(classify("연도별 징계 건수 추이"), Category::Aggregation);
    }

    #[test]
    fn test_regulation_graph() {
        assert_eq!(
            classify("국가를 당사자로 하는 계약에 관한 법률 위반 사례"),
            Category::RegulationGraphSearch
        );
    }

    #[test]
    fn test_chitchat() {
        assert_eq!(classify("안녕!"), Category::Chitchat);
        assert_eq!(classify("hi there"), Category::Chitchat);
        assert_ne!(classify("history"), Category::Chitchat);
        assert_eq!(classify("너는 누구야? 무엇을 할 수 있어?"), Category::Chitchat);
    }

    #[test]
    fn test_general_search() {
        assert_eq!(classify("인천국제공항공사 최근 징계 사례 알려줘"), Category::GeneralSearch);
    }

    #[test]
    fn test_no_cues_defaults_to_general() {
        let result = IntentClassifier::default().classify("출장비 부당 집행");
        assert_eq!(result.category, Category::GeneralSearch);
        assert_eq!(result.confidence, 0.0);
    }

    #[test]
    fn test_low_confidence_defaults_to_general() {
        let result = IntentClassifier::new(0.9).classify("관련 규정 위반 사례 알려줘");
        assert_eq!(result.category, Category::GeneralSearch);
    }
}
