//! Change-driven update policy.
//!
//! The matcher only recomputes when it has a reason: a freshly initialized
//! annotation, or an edit to one of the fields the query reads. Anything else
//! is skipped so a manual vendor pick is never silently overwritten.

pub const ACTION_INITIALIZE: &str = "initialize";

/// Node ids of the three criteria fields the matcher reads.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TrackedFields {
    pub tax_id: String,
    pub name: String,
    pub address: String,
}

/// Pure predicate: true when a recompute is warranted.
pub fn should_recompute(action: &str, tracked: &TrackedFields, changed_ids: &[String]) -> bool {
    action == ACTION_INITIALIZE
        || changed_ids.iter().any(|id| {
            *id == tracked.tax_id || *id == tracked.name || *id == tracked.address
        })
}
