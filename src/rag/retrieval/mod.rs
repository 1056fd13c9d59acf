// Multi-source retrieval and retry widening
pub mod coordinator;
pub mod policy;

pub use coordinator::{Retrieval, RetrieverCoordinator, SourceOverrides, SourceReport};
pub use policy::{
    policy_from_name, KeepConstraints, RelaxDateFilter, RetryPlan, RetryPolicy, RetryRequest, RewriteWithFeedback,
};
