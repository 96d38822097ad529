//! Built-in state used on first run and whenever the stored document cannot be
//! read.

use chrono::{DateTime, Utc};
use shared::{AppState, ChildProfile, ChildTheme, Phase, PhaseBudget, PhaseConfig, TaskLists};
use std::collections::BTreeMap;

pub const DEFAULT_PIN: &str = "1234";
pub const DEFAULT_PHASE: Phase = Phase::Phase2;

pub fn default_phase_config() -> PhaseConfig {
    PhaseConfig {
        phase1: PhaseBudget {
            video_game_minutes: Some(90),
            tv_minutes: None,
        },
        phase2: PhaseBudget {
            video_game_minutes: Some(60),
            tv_minutes: Some(120),
        },
        phase3: PhaseBudget {
            video_game_minutes: Some(60),
            tv_minutes: Some(60),
        },
    }
}

pub fn default_task_lists() -> TaskLists {
    let labels = |items: &[&str]| items.iter().map(|s| s.to_string()).collect::<Vec<_>>();
    TaskLists {
        personal: labels(&[
            "Make bed",
            "Wash hands when back home",
            "Change clothes after school",
            "Pack backpack for tomorrow",
            "Brush teeth",
        ]),
        family: labels(&[
            "Fold and put away clothes",
            "Set or clear the table",
            "Tidy toys and shared spaces",
        ]),
        growth: labels(&["Read a verse or a story", "Say thanks for the day"]),
    }
}

pub fn default_rewards() -> Vec<String> {
    [
        "Pick Friday's movie",
        "Special dessert",
        "Stay up 15 minutes later",
        "Pick a board game",
    ]
    .iter()
    .map(|s| s.to_string())
    .collect()
}

pub fn default_children() -> Vec<ChildProfile> {
    vec![
        ChildProfile {
            id: "bauti".to_string(),
            name: "Bauti".to_string(),
            age: 10,
            theme: ChildTheme::with_accent("#2563eb"),
            task_lists: default_task_lists(),
        },
        ChildProfile {
            id: "oli".to_string(),
            name: "Oli".to_string(),
            age: 7,
            theme: ChildTheme::with_accent("#a78bfa"),
            task_lists: default_task_lists(),
        },
    ]
}

/// A fresh board created at `now`
pub fn default_state(now: DateTime<Utc>) -> AppState {
    AppState {
        creation_timestamp: now,
        pin: DEFAULT_PIN.to_string(),
        current_phase: DEFAULT_PHASE,
        phase_config: default_phase_config(),
        shared_background: String::new(),
        reward_list: default_rewards(),
        children: default_children(),
        daily_records: BTreeMap::new(),
    }
}
