//! Report field selection
//!
//! Picks which structured report fields the answer should draw on.
//! `outline` and `problems` are always included unless the query asks
//! for specific fields exclusively ("조치사항만", "only the action").

use crate::types::ReportField;

const FIELD_CUES: &[(ReportField, &[&str])] = &[
    (ReportField::Title, &["제목", "사건명", "title"]),
    (
        ReportField::Standards,
        &["법령", "규정", "근거", "위반 여부", "standard", "regulation"],
    ),
    (
        ReportField::Outline,
        &["개요", "배경", "경위", "outline", "overview", "background"],
    ),
    (
        ReportField::Problems,
        &["문제점", "문제", "지적", "위반 사항", "problem", "issue"],
    ),
    (ReportField::Opinion, &["의견", "해명", "입장", "소명", "opinion"]),
    (
        ReportField::Criteria,
        &["개선", "재발 방지", "대책", "권고", "criteria", "improvement"],
    ),
    (
        ReportField::Action,
        &["조치", "처분", "징계", "제재", "action", "sanction", "disciplin"],
    ),
];

const ALWAYS_INCLUDED: [ReportField; 2] = [ReportField::Outline, ReportField::Problems];

const EXCLUSIVE_WORDS: &[&str] = &["only", "just"];

/// Selected fields plus the reasoning that produced them
#[derive(Debug, Clone, PartialEq)]
pub struct FieldSelection {
    pub fields: Vec<ReportField>,
    pub rationale: Vec<String>,
}

pub fn select_fields(query: &str) -> FieldSelection {
    let lower = query.to_lowercase();
    let words: Vec<&str> = lower.split_whitespace().collect();

    let mut detected: Vec<ReportField> = Vec::new();
    let mut exclusive: Vec<ReportField> = Vec::new();

    for (field, cues) in FIELD_CUES {
        for cue in cues.iter() {
            for (pos, _) in lower.match_indices(cue) {
                if !detected.contains(field) {
                    detected.push(*field);
                }
                if is_exclusive(&lower, &words, pos, cue.len()) && !exclusive.contains(field) {
                    exclusive.push(*field);
                }
            }
        }
    }
    detected.sort();
    exclusive.sort();

    let mut rationale = Vec::with_capacity(3);
    rationale.push(if detected.is_empty() {
        "Intent: no field-specific cue in the question".to_string()
    } else {
        format!("Intent: field cues found for {}", join(&detected))
    });

    let fields = if exclusive.is_empty() {
        rationale.push("Scope: outline and problems are always included".to_string());
        let mut fields = detected;
        fields.extend(ALWAYS_INCLUDED);
        fields.sort();
        fields.dedup();
        fields
    } else {
        rationale.push(format!(
            "Scope: exclusive request for {}, outline and problems not added",
            join(&exclusive)
        ));
        exclusive
    };

    rationale.push(format!("Selected: {}", join(&fields)));

    FieldSelection { fields, rationale }
}

/// Whether the cue at `pos` carries an exclusive marker
fn is_exclusive(lower: &str, words: &[&str], pos: usize, cue_len: usize) -> bool {
    let after = &lower[pos + cue_len..];
    let token_end = after.find(char::is_whitespace).unwrap_or(after.len());
    let tail = after[..token_end].trim_end_matches(|c: char| c.is_ascii_punctuation() && c != ')');

    if tail.ends_with('만') || tail.ends_with("만을") || tail.ends_with("만요") || tail.contains(")만") {
        return true;
    }

    let before = &lower[..pos];
    let preceding = before.split_whitespace().count();
    let index = if before.is_empty() || before.ends_with(char::is_whitespace) {
        preceding
    } else {
        preceding.saturating_sub(1)
    };

    let lo = index.saturating_sub(2);
    let hi = (index + 2).min(words.len().saturating_sub(1));
    (lo..=hi).any(|i| {
        words
            .get(i)
            .map(|w| EXCLUSIVE_WORDS.contains(&w.trim_matches(|c: char| !c.is_alphanumeric())))
            .unwrap_or(false)
    })
}

fn join(fields: &[ReportField]) -> String {
    fields.iter().map(|f| f.as_str()).collect::<Vec<_>>().join(", ")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_always_included() {
        let selection = select_fields("출장비 부당 집행 사례");
        assert_eq!(selection.fields, vec![ReportField::Outline, ReportField::Problems]);
        assert!(selection.rationale.len() >= 3);
    }

    #[test]
    fn test_detected_field_added() {
        let selection = select_fields("2021년 징계 사례 알려줘");
        assert_eq!(
            selection.fields,
            vec![ReportField::Outline, ReportField::Problems, ReportField::Action]
        );
    }

    #[test]
    fn test_exclusive_korean_marker() {
        let selection = select_fields("최근 감사에서 조치사항(Action)만 보여줘");
        assert_eq!(selection.fields, vec![ReportField::Action]);
        assert!(selection.rationale[1].contains("exclusive"));
    }

    #[test]
    fn test_exclusive_english_marker() {
        let selection = select_fields("show only the action taken");
        assert_eq!(selection.fields, vec![ReportField::Action]);
    }

    #[test]
    fn test_unrelated_only_is_not_exclusive() {
        let selection = select_fields("the opinion of the agency, mentioned only once in passing reports");
        assert!(selection.fields.contains(&ReportField::Outline));
    }
}
