//! Query intent, constraints and the immutable per-run query context

use chrono::{Datelike, Duration, NaiveDate};
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::analyzer::fuzzy::Correction;

/// Query intent label driving which branch a run takes
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Category {
    #[default]
    GeneralSearch,
    Aggregation,
    RegulationGraphSearch,
    Chitchat,
}

impl Category {
    pub const ALL: [Category; 4] = [
        Category::GeneralSearch,
        Category::Aggregation,
        Category::RegulationGraphSearch,
        Category::Chitchat,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Category::GeneralSearch => "general_search",
            Category::Aggregation => "aggregation",
            Category::RegulationGraphSearch => "regulation_graph_search",
            Category::Chitchat => "chitchat",
        }
    }

    /// Whether this category goes through the retrieval loop
    pub fn uses_retrieval(&self) -> bool {
        matches!(self, Category::GeneralSearch | Category::RegulationGraphSearch)
    }
}

impl fmt::Display for Category {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Response style used by the answer generator
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Persona {
    #[default]
    Common,
    Auditor,
    Manager,
}

impl Persona {
    pub fn as_str(&self) -> &'static str {
        match self {
            Persona::Common => "common",
            Persona::Auditor => "auditor",
            Persona::Manager => "manager",
        }
    }
}

impl fmt::Display for Persona {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Structured fields of an audit report
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReportField {
    Title,
    Standards,
    Outline,
    Problems,
    Opinion,
    Criteria,
    Action,
}

impl ReportField {
    pub const ALL: [ReportField; 7] = [
        ReportField::Title,
        ReportField::Standards,
        ReportField::Outline,
        ReportField::Problems,
        ReportField::Opinion,
        ReportField::Criteria,
        ReportField::Action,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            ReportField::Title => "title",
            ReportField::Standards => "standards",
            ReportField::Outline => "outline",
            ReportField::Problems => "problems",
            ReportField::Opinion => "opinion",
            ReportField::Criteria => "criteria",
            ReportField::Action => "action",
        }
    }

    /// Tolerant name lookup ("Problem", "outlines", "actions" ...)
    pub fn parse(name: &str) -> Option<Self> {
        match name.trim().to_lowercase().trim_end_matches('s') {
            "title" => Some(ReportField::Title),
            "standard" => Some(ReportField::Standards),
            "outline" => Some(ReportField::Outline),
            "problem" => Some(ReportField::Problems),
            "opinion" => Some(ReportField::Opinion),
            "criteria" => Some(ReportField::Criteria),
            "action" => Some(ReportField::Action),
            _ => None,
        }
    }
}

/// Date constraint extracted from free text
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum DateFilter {
    /// A whole calendar year
    Year { year: i32 },
    /// Inclusive range
    Range { start: NaiveDate, end: NaiveDate },
    /// Strictly before the date
    Before { date: NaiveDate },
    /// On or after the date
    OnOrAfter { date: NaiveDate },
}

impl DateFilter {
    /// Inclusive lower and upper bounds
    pub fn bounds(&self) -> (Option<NaiveDate>, Option<NaiveDate>) {
        match *self {
            DateFilter::Year { year } => (
                NaiveDate::from_ymd_opt(year, 1, 1),
                NaiveDate::from_ymd_opt(year, 12, 31),
            ),
            DateFilter::Range { start, end } => (Some(start), Some(end)),
            DateFilter::Before { date } => (None, date.pred_opt()),
            DateFilter::OnOrAfter { date } => (Some(date), None),
        }
    }

    pub fn contains(&self, date: NaiveDate) -> bool {
        let (lower, upper) = self.bounds();
        lower.map_or(true, |l| date >= l) && upper.map_or(true, |u| date <= u)
    }

    /// Same filter widened by `years` on every bounded side
    pub fn widened(&self, years: i32) -> DateFilter {
        let shift = |date: NaiveDate, delta: i32| {
            date.with_year(date.year() + delta)
                .unwrap_or_else(|| date + Duration::days(365 * delta as i64))
        };

        match *self {
            DateFilter::Year { year } => match (
                NaiveDate::from_ymd_opt(year - years, 1, 1),
                NaiveDate::from_ymd_opt(year + years, 12, 31),
            ) {
                (Some(start), Some(end)) => DateFilter::Range { start, end },
                _ => *self,
            },
            DateFilter::Range { start, end } => DateFilter::Range {
                start: shift(start, -years),
                end: shift(end, years),
            },
            DateFilter::Before { date } => DateFilter::Before {
                date: shift(date, years),
            },
            DateFilter::OnOrAfter { date } => DateFilter::OnOrAfter {
                date: shift(date, -years),
            },
        }
    }
}

impl fmt::Display for DateFilter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DateFilter::Year { year } => write!(f, "{}", year),
            DateFilter::Range { start, end } => write!(f, "{} ~ {}", start, end),
            DateFilter::Before { date } => write!(f, "< {}", date),
            DateFilter::OnOrAfter { date } => write!(f, ">= {}", date),
        }
    }
}

/// Constraints extracted by the analyzer
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Constraints {
    pub date: Option<DateFilter>,
    /// Canonical organization name after fuzzy correction
    pub organization: Option<String>,
    pub action_types: Vec<String>,
    pub regulation_terms: Vec<String>,
    pub selected_fields: Vec<ReportField>,
    /// Rationale for the field selection, carried to the generator
    pub selected_fields_cot: Vec<String>,
}

impl Constraints {
    /// True when the query carries anything a structured lookup can filter on
    pub fn is_structured(&self) -> bool {
        self.date.is_some() || self.organization.is_some() || !self.action_types.is_empty()
    }

    /// True when only the action field was asked for
    pub fn action_only(&self) -> bool {
        self.selected_fields == [ReportField::Action]
    }
}

/// Immutable per-run description of the query
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QueryContext {
    pub query: String,
    pub normalized_query: String,
    pub category: Category,
    pub persona: Persona,
    pub constraints: Constraints,
    pub corrections: Vec<Correction>,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    #[test]
    fn test_year_filter_contains() {
        let filter = DateFilter::Year { year: 2021 };
        assert!(filter.contains(date(2021, 1, 1)));
        assert!(filter.contains(date(2021, 12, 31)));
        assert!(!filter.contains(date(2022, 1, 1)));
    }

    #[test]
    fn test_before_is_strict() {
        let filter = DateFilter::Before { date: date(2021, 1, 1) };
        assert!(filter.contains(date(2020, 12, 31)));
        assert!(!filter.contains(date(2021, 1, 1)));
    }

    #[test]
    fn test_widened_year_becomes_range() {
        let widened = DateFilter::Year { year: 2021 }.widened(1);
        assert_eq!(
            widened,
            DateFilter::Range {
                start: date(2020, 1, 1),
                end: date(2022, 12, 31)
            }
        );
        assert!(widened.contains(date(2022, 6, 1)));
    }

    #[test]
    fn test_report_field_parse() {
        assert_eq!(ReportField::parse("Problem"), Some(ReportField::Problems));
        assert_eq!(ReportField::parse("outlines"), Some(ReportField::Outline));
        assert_eq!(ReportField::parse("ACTION"), Some(ReportField::Action));
        assert_eq!(ReportField::parse("criteria"), Some(ReportField::Criteria));
        assert_eq!(ReportField::parse("unknown"), None);
    }

    #[test]
    fn test_constraints_structured() {
        let mut constraints = Constraints::default();
        assert!(!constraints.is_structured());
        constraints.action_types.push("징계".to_string());
        assert!(constraints.is_structured());
    }

    #[test]
    fn test_category_serde_names() {
        let json = serde_json::to_string(&Category::RegulationGraphSearch).unwrap();
        assert_eq!(json, "\"regulation_graph_search\"");
        assert!(Category::GeneralSearch.uses_retrieval());
        assert!(!Category::Aggregation.uses_retrieval());
    }
}
