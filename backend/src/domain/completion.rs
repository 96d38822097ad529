//! Reconciles a child's configured task lists with a stored completion map.
//!
//! Task labels are identity keys, so after tasks are added, removed or renamed
//! the stored map can hold stale labels and lack new ones. Normalizing keeps
//! exactly the labels currently configured, defaulting new ones to not done.

use shared::{Completion, TaskCategory, TaskLists};

/// Completion covering exactly the labels in `tasks`.
///
/// Stale labels are dropped, missing labels default to `false`. Idempotent.
pub fn normalize(tasks: &TaskLists, raw: &Completion) -> Completion {
    let mut completion = Completion::default();
    for category in TaskCategory::ALL {
        let stored = raw.get(category);
        *completion.get_mut(category) = tasks
            .get(category)
            .iter()
            .map(|label| (label.clone(), stored.get(label).copied().unwrap_or(false)))
            .collect();
    }
    completion
}
