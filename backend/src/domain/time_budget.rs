//! Screen-time accounting against the minute budgets of the active phase.
//!
//! Nothing here knows about unlock levels; gating happens where timers are
//! started.

/// Share of the budget used, in whole percent, capped at 100.
///
/// Returns 0 when there is no budget (`None`) or the budget is 0 minutes.
/// Callers decide separately whether an unlimited budget shows a bar at all.
pub fn percent_of_budget(seconds: u64, budget_minutes: Option<u32>) -> u8 {
    let minutes = match budget_minutes {
        Some(minutes) if minutes > 0 => minutes,
        _ => return 0,
    };
    let ratio = seconds as f64 / (minutes as f64 * 60.0) * 100.0;
    ratio.round().min(100.0) as u8
}

/// Elapsed time as `MM:SS`. Minutes are not wrapped into hours.
pub fn format_clock(seconds: u64) -> String {
    format!("{:02}:{:02}", seconds / 60, seconds % 60)
}

/// Budget as shown next to a timer: `∞` when unlimited, otherwise `<n>m`
pub fn budget_label(budget_minutes: Option<u32>) -> String {
    match budget_minutes {
        None => "∞".to_string(),
        Some(minutes) => format!("{}m", minutes),
    }
}
