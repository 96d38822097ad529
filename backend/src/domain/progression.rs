//! The unlock ladder: personal tasks unlock TV, family tasks then unlock video
//! games, growth tasks then unlock the reward.
//!
//! A category with no tasks is never "fully done", so an empty category keeps
//! its level (and every level above it) locked until a task is added.

use shared::{Completion, Progression, TaskCategory, TaskLists};

/// Every task in the category is done. False for an empty category.
fn category_complete(tasks: &TaskLists, completion: &Completion, category: TaskCategory) -> bool {
    let labels = tasks.get(category);
    !labels.is_empty() && labels.iter().all(|label| completion.is_done(category, label))
}

/// Evaluate levels and progress for one child.
///
/// Only labels present in `tasks` are counted, so a completion map carrying
/// stale labels cannot push progress past 100%.
pub fn evaluate(tasks: &TaskLists, completion: &Completion) -> Progression {
    let total_count = tasks.total_len();
    let done_count = TaskCategory::ALL
        .iter()
        .map(|category| {
            tasks
                .get(*category)
                .iter()
                .filter(|label| completion.is_done(*category, label))
                .count()
        })
        .sum();

    let level1 = category_complete(tasks, completion, TaskCategory::Personal);
    let level2 = level1 && category_complete(tasks, completion, TaskCategory::Family);
    let level3 = level2 && category_complete(tasks, completion, TaskCategory::Growth);

    let progress_percent = if total_count == 0 {
        0.0
    } else {
        done_count as f64 / total_count as f64 * 100.0
    };

    Progression {
        level1,
        level2,
        level3,
        done_count,
        total_count,
        progress_percent,
    }
}
