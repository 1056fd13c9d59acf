//! Best-effort entity name correction
//!
//! Organization names in queries are compared against a known vocabulary
//! with a normalised Levenshtein ratio. Failing to find a match is an
//! ordinary outcome, reported as [`Correction::Unmatched`].

use serde::{Deserialize, Serialize};

/// Default similarity a candidate must reach to be corrected
pub const DEFAULT_THRESHOLD: f64 = 0.8;

/// Trailing particles stripped before comparison, longest first
const PARTICLES: &[&str] = &[
    "에서는", "에서", "으로", "에게", "까지", "부터", "의", "은", "는", "이", "가", "을", "를", "에",
    "와", "과", "도", "로",
];

/// Suffixes that mark a token as an organization name
const ORGANIZATION_SUFFIXES: &[&str] = &[
    "공사", "공단", "재단", "은행", "센터", "진흥원", "연구원", "위원회", "기관", "협회", "corporation", "agency",
];

/// Outcome of a correction attempt
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum Correction {
    Matched {
        original: String,
        canonical: String,
        similarity: f64,
    },
    Unmatched {
        original: String,
    },
}

impl Correction {
    /// Value to use downstream: the canonical name, or the original text
    pub fn value(&self) -> &str {
        match self {
            Correction::Matched { canonical, .. } => canonical,
            Correction::Unmatched { original } => original,
        }
    }

    pub fn is_match(&self) -> bool {
        matches!(self, Correction::Matched { .. })
    }
}

/// Resolves free-text entity mentions against a vocabulary
#[derive(Debug, Clone)]
pub struct EntityResolver {
    vocabulary: Vec<String>,
    threshold: f64,
}

impl EntityResolver {
    pub fn new(vocabulary: Vec<String>) -> Self {
        Self::with_threshold(vocabulary, DEFAULT_THRESHOLD)
    }

    pub fn with_threshold(mut vocabulary: Vec<String>, threshold: f64) -> Self {
        vocabulary.retain(|v| !v.trim().is_empty());
        vocabulary.sort();
        vocabulary.dedup();
        Self {
            vocabulary,
            threshold,
        }
    }

    pub fn vocabulary(&self) -> &[String] {
        &self.vocabulary
    }

    pub fn threshold(&self) -> f64 {
        self.threshold
    }

    /// Correct a single mention
    pub fn resolve(&self, mention: &str) -> Correction {
        let original = mention.trim().to_string();
        match self.best_match(&original) {
            Some((canonical, similarity)) if similarity >= self.threshold => Correction::Matched {
                original,
                canonical,
                similarity,
            },
            _ => Correction::Unmatched { original },
        }
    }

    /// Find the best entity mention in a whole query
    ///
    /// Windows of one to three tokens are tried both spaced and joined,
    /// with and without a trailing particle. Returns the matched span as
    /// it appears in the whitespace-normalised query.
    pub fn resolve_query(&self, query: &str) -> Option<Correction> {
        let tokens: Vec<&str> = query.split_whitespace().collect();
        let mut best: Option<Correction> = None;
        let mut best_score = 0.0;

        for width in 1..=3usize {
            for window in tokens.windows(width) {
                let spaced = trim_punctuation(&window.join(" "));
                let joined = trim_punctuation(&window.concat());

                for candidate in [spaced.clone(), joined, strip_particle(&spaced).to_string()] {
                    if candidate.chars().count() < 2 {
                        continue;
                    }
                    if let Some((canonical, similarity)) = self.best_match(&candidate) {
                        // Strictly greater keeps the earliest, narrowest window on ties
                        if similarity >= self.threshold && similarity > best_score {
                            best_score = similarity;
                            best = Some(Correction::Matched {
                                original: surface_form(&spaced, &candidate),
                                canonical,
                                similarity,
                            });
                        }
                    }
                }
            }
        }

        best
    }

    /// Organization-looking tokens that did not resolve
    pub fn unmatched_mentions(&self, query: &str) -> Vec<Correction> {
        query
            .split_whitespace()
            .map(|t| strip_particle(&trim_punctuation(t)).to_string())
            .filter(|t| looks_like_organization(t))
            .map(|t| self.resolve(&t))
            .filter(|c| !c.is_match())
            .collect()
    }

    fn best_match(&self, mention: &str) -> Option<(String, f64)> {
        let normalized_mention = normalize(mention);
        if normalized_mention.is_empty() {
            return None;
        }

        let mut best: Option<(String, f64)> = None;
        for entity in &self.vocabulary {
            let score = similarity(&normalized_mention, &normalize(entity));
            if best.as_ref().map_or(true, |(_, s)| score > *s) {
                best = Some((entity.clone(), score));
            }
        }
        best
    }
}

/// Text of the candidate as it should be replaced in the query
fn surface_form(spaced: &str, candidate: &str) -> String {
    if spaced.starts_with(candidate) {
        candidate.to_string()
    } else {
        spaced.to_string()
    }
}

fn trim_punctuation(text: &str) -> String {
    text.trim_matches(|c: char| !c.is_alphanumeric() && c != ')' && c != '(')
        .trim_matches(|c: char| c == '(' || c == ')')
        .to_string()
}

/// Remove one trailing particle, keeping at least two characters
pub fn strip_particle(token: &str) -> &str {
    for particle in PARTICLES {
        if let Some(stem) = token.strip_suffix(particle) {
            if stem.chars().count() >= 2 {
                return stem;
            }
        }
    }
    token
}

fn looks_like_organization(token: &str) -> bool {
    let lower = token.to_lowercase();
    token.chars().count() >= 3 && ORGANIZATION_SUFFIXES.iter().any(|s| lower.ends_with(s))
}

fn normalize(text: &str) -> String {
    text.chars()
        .filter(|c| !c.is_whitespace())
        .flat_map(char::to_lowercase)
        .collect()
}

/// Normalised Levenshtein similarity in [0, 1]
pub fn similarity(a: &str, b: &str) -> f64 {
    if a == b {
        return 1.0;
    }
    let max_len = a.chars().count().max(b.chars().count());
    if max_len == 0 {
        return 0.0;
    }
    1.0 - (levenshtein(a, b) as f64 / max_len as f64)
}

/// Simple Levenshtein distance over chars
pub fn levenshtein(a: &str, b: &str) -> usize {
    let a: Vec<char> = a.chars().collect();
    let b: Vec<char> = b.chars().collect();
    let (m, n) = (a.len(), b.len());
    let mut dp = vec![vec![0usize; n + 1]; m + 1];
    for (i, row) in dp.iter_mut().enumerate() {
        row[0] = i;
    }
    for (j, val) in dp[0].iter_mut().enumerate() {
        *val = j;
    }
    for i in 1..=m {
        for j in 1..=n {
            let cost = if a[i - 1] == b[j - 1] { 0 } else { 1 };
            dp[i][j] = (dp[i - 1][j] + 1)
                .min(dp[i][j - 1] + 1)
                .min(dp[i - 1][j - 1] + cost);
        }
    }
    dp[m][n]
}

#[cfg(test)]
mod tests {
    use super::*;

    fn resolver() -> EntityResolver {
        EntityResolver::new(vec![
            "한국수력원자력".to_string(),
            "인천국제공항공사".to_string(),
            "한국전력공사".to_string(),
        ])
    }

    #[test]
    fn test_levenshtein() {
        assert_eq!(levenshtein("kitten", "sitting"), 3);
        assert_eq!(levenshtein("", "abc"), 3);
        assert_eq!(levenshtein("한국전력", "한국전력"), 0);
    }

    #[test]
    fn test_resolve_one_char_typo() {
        let correction = resolver().resolve("한국수력원자럭");
        match correction {
            Correction::Matched { canonical, similarity, .. } => {
                assert_eq!(canonical, "한국수력원자력");
                assert!(similarity >= 0.8);
            }
            other => panic!("expected match, got {:?}", other),
        }
    }

    #[test]
    fn test_resolve_keeps_original_below_threshold() {
        let correction = resolver().resolve("서울교통");
        assert_eq!(
            correction,
            Correction::Unmatched {
                original: "서울교통".to_string()
            }
        );
        assert_eq!(correction.value(), "서울교통");
    }

    #[test]
    fn test_resolve_query_strips_particle() {
        let correction = resolver()
            .resolve_query("인천국제공항공사의 최근 징계 사례")
            .unwrap();
        assert_eq!(correction.value(), "인천국제공항공사");
        if let Correction::Matched { original, .. } = correction {
            assert_eq!(original, "인천국제공항공사");
        }
    }

    #[test]
    fn test_resolve_query_spaced_name() {
        let correction = resolver().resolve_query("한국 전력공사 감사 결과").unwrap();
        assert_eq!(correction.value(), "한국전력공사");
    }

    #[test]
    fn test_resolve_query_no_entity() {
        assert!(resolver().resolve_query("출장비 부당 집행 사례").is_none());
    }

    #[test]
    fn test_unmatched_mentions() {
        let unmatched = resolver().unmatched_mentions("서울교통공사의 감사 결과");
        assert_eq!(unmatched.len(), 1);
        assert_eq!(unmatched[0].value(), "서울교통공사");
    }
}
