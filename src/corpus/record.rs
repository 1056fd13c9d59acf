//! Audit case records as stored in a corpus file

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::types::{parse_loose_date, Document, ReportField, SourceKind};

/// One audit finding
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct AuditRecord {
    pub id: String,
    /// `YYYY.MM.DD` or `YYYY-MM-DD`
    pub date: String,
    pub company: String,
    pub title: String,
    /// Finding category (e.g. 예산 집행, 인사, 계약)
    pub category: String,
    /// Disposition type (징계, 경고, 주의, 환수 ...)
    pub action_type: String,
    pub outline: String,
    pub problems: String,
    pub standards: String,
    pub opinion: String,
    pub criteria: String,
    pub action: String,
    pub regulations: Vec<String>,
    /// Monetary amount involved, in KRW
    pub amount: Option<f64>,
}

impl AuditRecord {
    pub fn parsed_date(&self) -> Option<NaiveDate> {
        parse_loose_date(&self.date)
    }

    pub fn field(&self, field: ReportField) -> &str {
        match field {
            ReportField::Title => &self.title,
            ReportField::Standards => &self.standards,
            ReportField::Outline => &self.outline,
            ReportField::Problems => &self.problems,
            ReportField::Opinion => &self.opinion,
            ReportField::Criteria => &self.criteria,
            ReportField::Action => &self.action,
        }
    }

    /// Searchable body text
    pub fn content(&self) -> String {
        format!(
            "Title: {}\nDate: {}\nCompany: {}\nProblem: {}\nAction: {}",
            self.title, self.date, self.company, self.problems, self.action
        )
    }

    /// Text used for embedding and lexical matching
    pub fn search_text(&self) -> String {
        [
            self.title.as_str(),
            self.company.as_str(),
            self.category.as_str(),
            self.outline.as_str(),
            self.problems.as_str(),
            self.action.as_str(),
        ]
        .iter()
        .filter(|s| !s.is_empty())
        .copied()
        .collect::<Vec<_>>()
        .join(" ")
    }

    pub fn to_document(&self, provenance: SourceKind) -> Document {
        let mut doc = Document::new(self.id.clone(), self.content(), provenance)
            .with_metadata("date", self.date.clone())
            .with_metadata("company", self.company.clone())
            .with_metadata("category", self.category.clone())
            .with_metadata("action_type", self.action_type.clone());

        for field in ReportField::ALL {
            doc = doc.with_metadata(field.as_str(), self.field(field).to_string());
        }

        doc = doc.with_metadata(
            "regulations",
            Value::Array(self.regulations.iter().cloned().map(Value::String).collect()),
        );
        if let Some(amount) = self.amount {
            doc = doc.with_metadata("amount", amount);
        }
        doc
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record() -> AuditRecord {
        AuditRecord {
            id: "2021-001".to_string(),
            date: "2021.04.02".to_string(),
            company: "한국수력원자력".to_string(),
            title: "출장비 부당 집행".to_string(),
            action_type: "징계".to_string(),
            problems: "출장 기간을 부풀려 여비를 과다 지급함".to_string(),
            action: "관련자 경징계 요구".to_string(),
            regulations: vec!["공무원 여비 규정".to_string()],
            amount: Some(3_200_000.0),
            ..Default::default()
        }
    }

    #[test]
    fn test_content_lines() {
        let content = record().content();
        assert!(content.starts_with("Title: 출장비 부당 집행\nDate: 2021.04.02"));
        assert!(content.contains("Company: 한국수력원자력"));
        assert!(content.ends_with("Action: 관련자 경징계 요구"));
    }

    #[test]
    fn test_to_document_metadata() {
        let doc = record().to_document(SourceKind::Structured);
        assert_eq!(doc.id, "2021-001");
        assert_eq!(doc.company(), Some("한국수력원자력"));
        assert_eq!(doc.action_type(), Some("징계"));
        assert_eq!(doc.field(ReportField::Action), Some("관련자 경징계 요구"));
        assert_eq!(doc.field(ReportField::Opinion), None);
        assert_eq!(doc.metadata["amount"], 3_200_000.0);
        assert_eq!(doc.metadata["regulations"][0], "공무원 여비 규정");
    }

    #[test]
    fn test_deserialize_partial_record() {
        let record: AuditRecord =
            serde_json::from_str(r#"{"id": "X-1", "date": "2020-01-05", "company": "A"}"#).unwrap();
        assert_eq!(record.parsed_date(), NaiveDate::from_ymd_opt(2020, 1, 5));
        assert!(record.regulations.is_empty());
        assert_eq!(record.amount, None);
    }
}
