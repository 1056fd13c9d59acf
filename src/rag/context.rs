// Evidence context builder for generation prompts
use serde::{Deserialize, Serialize};

use crate::types::{Document, ReportField};

/// Context assembly configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ContextConfig {
    /// Maximum tokens for evidence context
    pub max_context_tokens: usize,
    /// Include id/date/company header per document
    pub include_metadata: bool,
}

impl Default for ContextConfig {
    fn default() -> Self {
        Self {
            max_context_tokens: 2000,
            include_metadata: true,
        }
    }
}

/// Assembled context for prompt augmentation
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AssembledContext {
    /// The formatted context text
    pub text: String,
    /// One rendered passage per included document
    pub passages: Vec<String>,
    /// Estimated token count
    pub estimated_tokens: usize,
    /// Document IDs included
    pub document_ids: Vec<String>,
}

impl AssembledContext {
    pub fn document_count(&self) -> usize {
        self.document_ids.len()
    }
}

/// Rough token estimate: ~4 chars per token
pub fn estimate_tokens(text: &str) -> usize {
    text.chars().count().div_ceil(4)
}

/// Human-readable label of a report field
pub fn field_label(field: ReportField) -> &'static str {
    match field {
        ReportField::Title => "제목(Title)",
        ReportField::Standards => "감사기준(Standards)",
        ReportField::Outline => "개요(Outline)",
        ReportField::Problems => "문제점(Problems)",
        ReportField::Opinion => "감사의견(Opinion)",
        ReportField::Criteria => "개선기준(Criteria)",
        ReportField::Action => "조치사항(Action)",
    }
}

/// Renders validated documents restricted to the selected report fields
pub struct EvidenceContextBuilder {
    config: ContextConfig,
}

impl EvidenceContextBuilder {
    pub fn new() -> Self {
        Self {
            config: ContextConfig::default(),
        }
    }

    pub fn with_config(config: ContextConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &ContextConfig {
        &self.config
    }

    /// Build context from documents in order, stopping at the token budget
    ///
    /// The first document is always included, cut to the budget if needed.
    pub fn build(&self, documents: &[Document], fields: &[ReportField]) -> AssembledContext {
        let mut context = AssembledContext::default();
        let budget = self.config.max_context_tokens;

        for (idx, doc) in documents.iter().enumerate() {
            let mut passage = self.render(idx + 1, doc, fields);
            let mut tokens = estimate_tokens(&passage);

            if context.estimated_tokens + tokens > budget {
                if idx > 0 {
                    break;
                }
                passage = passage.chars().take(budget * 4).collect();
                tokens = estimate_tokens(&passage);
            }

            context.estimated_tokens += tokens;
            context.document_ids.push(doc.id.clone());
            context.passages.push(passage);
        }

        context.text = context.passages.join("\n\n");
        context
    }

    /// Field lines for one document; full content when it carries none of them
    pub fn field_lines(doc: &Document, fields: &[ReportField]) -> Vec<String> {
        let lines: Vec<String> = fields
            .iter()
            .filter_map(|field| doc.field(*field).map(|text| format!("{}: {}", field_label(*field), text)))
            .collect();

        if lines.is_empty() {
            vec![doc.content.trim().to_string()]
        } else {
            lines
        }
    }

    fn render(&self, index: usize, doc: &Document, fields: &[ReportField]) -> String {
        let body = Self::field_lines(doc, fields).join("\n");
        if !self.config.include_metadata {
            return format!("[Document {}]\n{}", index, body);
        }

        let mut header = format!("[Document {}] id={}", index, doc.id);
        if let Some(date) = doc.meta_str("date") {
            header.push_str(&format!(" | {}", date));
        }
        if let Some(company) = doc.company() {
            header.push_str(&format!(" | {}", company));
        }
        format!("{}\n{}", header, body)
    }
}

impl Default for EvidenceContextBuilder {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::SourceKind;

    fn create_doc(id: &str) -> Document {
        Document::new(id, "Title: 출장비 부당 집행\nAction: 경고", SourceKind::Vector)
            .with_metadata("date", "2021.03.15")
            .with_metadata("company", "한국전력공사")
            .with_metadata("problems", "출장비를 부당하게 집행함")
            .with_metadata("action", "관련자 경고")
    }

    #[test]
    fn test_build_empty_documents() {
        let builder = EvidenceContextBuilder::new();
        let context = builder.build(&[], &[ReportField::Action]);
        assert_eq!(context.document_count(), 0);
        assert_eq!(context.estimated_tokens, 0);
        assert!(context.text.is_empty());
    }

    #[test]
    fn test_selected_fields_only() {
        let builder = EvidenceContextBuilder::new();
        let context = builder.build(&[create_doc("A-1")], &[ReportField::Action]);

        assert!(context.text.contains("조치사항(Action): 관련자 경고"));
        assert!(!context.text.contains("출장비를 부당하게"));
        assert!(context.text.contains("id=A-1 | 2021.03.15 | 한국전력공사"));
    }

    #[test]
    fn test_falls_back_to_content() {
        let builder = EvidenceContextBuilder::new();
        let context = builder.build(&[create_doc("A-1")], &[ReportField::Opinion]);
        assert!(context.text.contains("Title: 출장비 부당 집행"));
    }

    #[test]
    fn test_build_respects_token_limit() {
        let builder = EvidenceContextBuilder::with_config(ContextConfig {
            max_context_tokens: 30,
            include_metadata: false,
        });
        let docs = vec![create_doc("A-1"), create_doc("A-2"), create_doc("A-3")];

        let context = builder.build(&docs, &[ReportField::Problems, ReportField::Action]);
        assert!(context.document_count() >= 1);
        assert!(context.document_count() < 3);
        assert!(context.estimated_tokens <= 30);
    }

    #[test]
    fn test_first_document_truncated_to_budget() {
        let builder = EvidenceContextBuilder::with_config(ContextConfig {
            max_context_tokens: 2,
            include_metadata: true,
        });
        let context = builder.build(&[create_doc("A-1")], &[ReportField::Problems]);
        assert_eq!(context.document_count(), 1);
        assert!(context.estimated_tokens <= 2);
    }

    #[test]
    fn test_estimate_tokens() {
        assert_eq!(estimate_tokens(""), 0);
        assert_eq!(estimate_tokens("abcd"), 1);
        assert_eq!(estimate_tokens("abcde"), 2);
    }
}
