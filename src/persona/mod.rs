//! Persona selection and response style profiles

use crate::types::{Category, Persona};

const MANAGER_CUES: &[&str] = &["경영진", "임원", "보고용", "보고서용", "ceo", "executive", "board"];
const AUDITOR_CUES: &[&str] = &["감사관", "감사 전문가", "위반 여부", "auditor", "compliance"];

/// Response style for one persona
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PersonaProfile {
    pub persona: Persona,
    /// Prompt instructions for a completion model
    pub instructions: &'static str,
    /// Section headings of the answer layout, in order
    pub sections: &'static [&'static str],
}

impl PersonaProfile {
    pub fn for_persona(persona: Persona) -> Self {
        match persona {
            Persona::Common => PersonaProfile {
                persona,
                instructions: "당신은 공공기관 감사 결과를 설명하는 도우미입니다. \
                    질문에 대한 직접적인 답을 먼저 제시하고, 제공된 문서에 근거한 내용만 간결하게 설명하세요. \
                    문서에 없는 내용은 추측하지 마세요.",
                sections: &["답변", "근거 문서"],
            },
            Persona::Auditor => PersonaProfile {
                persona,
                instructions: "당신은 감사 전문가입니다. 각 사례에 대해 위반 사항, 판단 근거(관련 법령·규정), \
                    조치 내용을 구분하여 정확하게 기술하세요. 문서 ID를 근거로 인용하고, \
                    문서에 없는 내용은 추측하지 마세요.",
                sections: &["위반 사항", "판단 근거", "조치 내용"],
            },
            Persona::Manager => PersonaProfile {
                persona,
                instructions: "당신은 경영진 보고를 준비하는 분석가입니다. 현황(Status), 리스크(Risk), \
                    시사점(Insight) 순서로 핵심만 요약하세요. 제공된 문서에 근거한 내용만 사용하세요.",
                sections: &["현황", "리스크", "시사점"],
            },
        }
    }
}

/// Picks the persona for a query; unrecognised queries get `Common`
#[derive(Debug, Clone, Default)]
pub struct PersonaSelector;

impl PersonaSelector {
    pub fn new() -> Self {
        Self
    }

    /// Chitchat always answers in the common voice
    pub fn select(&self, category: Category, query: &str) -> Persona {
        if category == Category::Chitchat {
            return Persona::Common;
        }
        let lower = query.to_lowercase();
        if MANAGER_CUES.iter().any(|c| lower.contains(c)) {
            Persona::Manager
        } else if AUDITOR_CUES.iter().any(|c| lower.contains(c)) {
            Persona::Auditor
        } else {
            Persona::Common
        }
    }
}
