//! Validation type definitions

use serde::{Deserialize, Serialize};

use crate::types::{DocumentKey, SourceKind};

/// Accept/reject decision for one document
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Verdict {
    Accepted,
    Rejected,
}

impl Verdict {
    pub fn is_accepted(&self) -> bool {
        matches!(self, Verdict::Accepted)
    }
}

/// Individual weighted validation check
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ValidationCheck {
    /// Check name
    pub name: String,

    /// Check weight in scoring (0.0 to 1.0)
    pub weight: f64,

    /// Check passed
    pub passed: bool,

    /// A failed required check rejects regardless of score
    pub required: bool,

    /// Why the check passed or failed
    pub detail: String,
}

impl ValidationCheck {
    pub fn new(name: &str, weight: f64) -> Self {
        Self {
            name: name.to_string(),
            weight,
            passed: false,
            required: false,
            detail: String::new(),
        }
    }

    pub fn required(mut self) -> Self {
        self.required = true;
        self
    }

    pub fn pass(&mut self, detail: impl Into<String>) {
        self.passed = true;
        self.detail = detail.into();
    }

    pub fn fail(&mut self, detail: impl Into<String>) {
        self.passed = false;
        self.detail = detail.into();
    }

    /// One rationale line
    pub fn describe(&self) -> String {
        format!(
            "{}: {} ({})",
            self.name,
            if self.passed { "pass" } else { "fail" },
            self.detail
        )
    }
}

/// Validation score calculation result
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ValidationScore {
    /// Overall score (0.0 to 1.0)
    pub overall: f64,

    /// Number of checks passed
    pub checks_passed: usize,

    /// Total number of checks
    pub total_checks: usize,

    /// Pass threshold
    pub threshold: f64,

    /// Whether validation passed
    pub passed: bool,
}

impl ValidationScore {
    /// Create validation score from checks
    pub fn from_checks(checks: &[ValidationCheck], threshold: f64) -> Self {
        let total_checks = checks.len();
        let checks_passed = checks.iter().filter(|c| c.passed).count();

        let total_weight: f64 = checks.iter().map(|c| c.weight).sum();
        let passed_weight: f64 = checks.iter().filter(|c| c.passed).map(|c| c.weight).sum();
        let overall = if total_weight > 0.0 {
            passed_weight / total_weight
        } else {
            0.0
        };

        let required_failed = checks.iter().any(|c| c.required && !c.passed);

        Self {
            overall,
            checks_passed,
            total_checks,
            threshold,
            passed: !required_failed && overall >= threshold,
        }
    }
}

/// What a judge concluded about one document
#[derive(Debug, Clone, PartialEq)]
pub struct Judgment {
    pub verdict: Verdict,
    /// Weighted score, when the judge produces one
    pub score: Option<f64>,
    pub rationale: Vec<String>,
}

impl Judgment {
    pub fn accepted(rationale: Vec<String>) -> Self {
        Self {
            verdict: Verdict::Accepted,
            score: None,
            rationale,
        }
    }

    pub fn rejected(rationale: Vec<String>) -> Self {
        Self {
            verdict: Verdict::Rejected,
            score: None,
            rationale,
        }
    }
}

/// Append-only per-document judgment record kept in the run state
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ValidationRecord {
    pub key: DocumentKey,
    pub document_id: String,
    pub provenance: SourceKind,
    /// Retrieval round (0-based) in which the document was judged
    pub round: u32,
    pub verdict: Verdict,
    pub score: Option<f64>,
    pub judge: String,
    pub rationale: Vec<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn check(name: &str, weight: f64, passed: bool) -> ValidationCheck {
        let mut check = ValidationCheck::new(name, weight);
        if passed {
            check.pass("ok");
        } else {
            check.fail("no");
        }
        check
    }

    #[test]
    fn test_weighted_score() {
        let checks = vec![check("a", 0.75, true), check("b", 0.25, false)];
        let score = ValidationScore::from_checks(&checks, 0.6);
        assert_eq!(score.overall, 0.75);
        assert_eq!(score.checks_passed, 1);
        assert!(score.passed);
    }

    #[test]
    fn test_required_check_rejects() {
        let checks = vec![check("a", 0.9, true), check("date", 0.1, false).required()];
        let score = ValidationScore::from_checks(&checks, 0.5);
        assert!(score.overall >= 0.5);
        assert!(!score.passed);
    }

    #[test]
    fn test_no_checks_scores_zero() {
        let score = ValidationScore::from_checks(&[], 0.5);
        assert_eq!(score.overall, 0.0);
        assert!(!score.passed);
    }

    #[test]
    fn test_describe() {
        assert_eq!(check("length", 0.1, true).describe(), "length: pass (ok)");
    }
}
