//! Access to the per-day, per-child records inside [`AppState`].
//!
//! Reads never fail: a missing day or child entry reads as an empty
//! [`DayEntry`] without being written back. Writes materialise the entry.

use shared::{AppState, ChildProfile, Completion, DayEntry, DayRecords, Progression};

use super::completion::normalize;
use super::progression::evaluate;

/// The bucket for `date_key`, inserted empty if absent
pub fn get_or_create_day<'a>(state: &'a mut AppState, date_key: &str) -> &'a mut DayRecords {
    state.daily_records.entry(date_key.to_string()).or_default()
}

/// A child's entry for a day, or an empty one. Does not modify the state.
pub fn child_entry(state: &AppState, date_key: &str, child_id: &str) -> DayEntry {
    state
        .daily_records
        .get(date_key)
        .and_then(|day| day.get(child_id))
        .cloned()
        .unwrap_or_default()
}

/// A child's entry for a day, creating the day and the entry if needed
pub fn child_entry_mut<'a>(state: &'a mut AppState, date_key: &str, child_id: &str) -> &'a mut DayEntry {
    get_or_create_day(state, date_key)
        .entry(child_id.to_string())
        .or_default()
}

/// Replace a whole day with an empty bucket
pub fn reset_day(state: &mut AppState, date_key: &str) {
    state.daily_records.insert(date_key.to_string(), DayRecords::new());
}

/// Normalized completion and progression of a child for a day
pub fn evaluate_child(state: &AppState, child: &ChildProfile, date_key: &str) -> (Completion, Progression) {
    let entry = child_entry(state, date_key, &child.id);
    let completion = normalize(&child.task_lists, &entry.completion);
    let progression = evaluate(&child.task_lists, &completion);
    (completion, progression)
}
