//! Evidence validation
//! Per-document accept/reject judgments with step-by-step rationale

pub mod judge;
pub mod types;
pub mod validator;

pub use judge::{HeuristicJudge, ModelJudge, RelevanceJudge};
pub use types::{Judgment, ValidationCheck, ValidationRecord, ValidationScore, Verdict};
pub use validator::{DocumentValidator, ValidationOutcome};
