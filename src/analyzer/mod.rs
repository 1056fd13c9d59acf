//! Query analysis: intent, constraints and entity correction
//!
//! Analysis is pure and synchronous. It never fails: anything it cannot
//! recognise is simply left out of the constraints.

pub mod classifier;
pub mod dates;
pub mod fields;
pub mod fuzzy;

pub use classifier::{Classification, IntentClassifier};
pub use dates::extract_date_filter;
pub use fields::{select_fields, FieldSelection};
pub use fuzzy::{Correction, EntityResolver};

use crate::types::{Category, Constraints};

/// Disposition words recognised as action-type filters
pub const ACTION_TYPES: &[&str] = &[
    "징계", "경고", "주의", "환수", "통보", "고발", "문책", "파면", "해임", "정직", "감봉", "견책",
];

/// Suffixes marking a token as a regulation name
const REGULATION_SUFFIXES: &[&str] = &["법률", "법령", "시행령", "규정", "지침", "규칙", "법"];

/// Head words too generic to be a regulation term on their own
const GENERIC_REGULATION_WORDS: &[&str] = &[
    "법", "법률", "법령", "규정", "지침", "규칙", "시행령", "act", "law", "regulation", "regulations",
];

/// Tokens that end a backwards regulation-name extension
const REGULATION_STOP_WORDS: &[&str] = &[
    "관련", "관련된", "위반", "위반한", "사례", "어떤", "및", "등", "the", "of", "under", "violated",
];

const MAX_REGULATION_TOKENS: usize = 6;

/// Result of analysing one query
#[derive(Debug, Clone, PartialEq)]
pub struct Analysis {
    pub category: Category,
    pub confidence: f64,
    pub normalized_query: String,
    pub constraints: Constraints,
    pub corrections: Vec<Correction>,
}

/// Turns a raw query into category, constraints and corrections
#[derive(Debug, Clone)]
pub struct QueryAnalyzer {
    resolver: EntityResolver,
    classifier: IntentClassifier,
}

impl QueryAnalyzer {
    pub fn new(resolver: EntityResolver, classifier: IntentClassifier) -> Self {
        Self { resolver, classifier }
    }

    /// Analyzer over a known entity vocabulary with default thresholds
    pub fn with_vocabulary(vocabulary: Vec<String>) -> Self {
        Self::new(EntityResolver::new(vocabulary), IntentClassifier::default())
    }

    pub fn resolver(&self) -> &EntityResolver {
        &self.resolver
    }

    pub fn analyze(&self, query: &str) -> Analysis {
        let collapsed = query.split_whitespace().collect::<Vec<_>>().join(" ");
        let classification = self.classifier.classify(&collapsed);

        if classification.category == Category::Chitchat {
            return Analysis {
                category: Category::Chitchat,
                confidence: classification.confidence,
                normalized_query: collapsed,
                constraints: Constraints::default(),
                corrections: Vec::new(),
            };
        }

        let mut corrections = Vec::new();
        let mut normalized_query = collapsed.clone();
        let mut organization = None;

        if let Some(correction) = self.resolver.resolve_query(&collapsed) {
            if let Correction::Matched {
                original, canonical, ..
            } = &correction
            {
                normalized_query = collapsed.replacen(original.as_str(), canonical, 1);
                organization = Some(canonical.clone());
            }
            corrections.push(correction);
        } else {
            corrections.extend(self.resolver.unmatched_mentions(&collapsed));
        }

        let selection = select_fields(&collapsed);
        let constraints = Constraints {
            date: extract_date_filter(&collapsed),
            organization,
            action_types: extract_action_types(&collapsed),
            regulation_terms: extract_regulation_terms(&collapsed),
            selected_fields: selection.fields,
            selected_fields_cot: selection.rationale,
        };

        Analysis {
            category: classification.category,
            confidence: classification.confidence,
            normalized_query,
            constraints,
            corrections,
        }
    }
}

pub fn extract_action_types(query: &str) -> Vec<String> {
    ACTION_TYPES
        .iter()
        .filter(|a| query.contains(*a))
        .map(|a| a.to_string())
        .collect()
}

/// Regulation names mentioned in the query
pub fn extract_regulation_terms(query: &str) -> Vec<String> {
    let tokens: Vec<String> = query
        .split_whitespace()
        .map(|t| {
            let cleaned = t.trim_matches(|c: char| !c.is_alphanumeric());
            fuzzy::strip_particle(cleaned).to_string()
        })
        .collect();

    let surface: Vec<&str> = query.split_whitespace().collect();
    let mut terms: Vec<String> = Vec::new();
    for (i, token) in tokens.iter().enumerate() {
        let lower = token.to_lowercase();
        if !is_regulation_token(&lower) {
            continue;
        }

        let term = if GENERIC_REGULATION_WORDS.contains(&lower.as_str()) {
            let mut start = i;
            while start > 0 && i + 1 - start < MAX_REGULATION_TOKENS && extends_regulation(&tokens[start - 1]) {
                start -= 1;
            }
            if start == i {
                continue;
            }
            // Leading tokens keep their particles
            let mut parts: Vec<&str> = surface[start..i].to_vec();
            parts.push(token);
            parts.join(" ")
        } else {
            token.clone()
        };

        if !terms.contains(&term) {
            terms.push(term);
        }
    }
    terms
}

fn is_regulation_token(lower: &str) -> bool {
    if ["act", "law", "regulation", "regulations"].contains(&lower) {
        return true;
    }
    REGULATION_SUFFIXES.iter().any(|s| lower.ends_with(s))
        && !lower.ends_with("방법")
}

fn extends_regulation(token: &str) -> bool {
    let lower = token.to_lowercase();
    !lower.is_empty()
        && !REGULATION_STOP_WORDS.contains(&lower.as_str())
        && !lower.chars().any(|c| c.is_ascii_digit())
}
