//! # State Codec
//!
//! Converts between the persisted JSON document and [`AppState`].
//!
//! Decoding is lenient. The document may have been written by an older build
//! or edited by hand, so every field is validated on its own and coerced to a
//! safe value instead of rejecting the whole document:
//!
//! - sequences that are absent or not arrays become empty; non-string items
//!   are skipped and repeated task labels keep their first occurrence
//! - maps that are absent or not objects become empty
//! - completion flags that are not booleans are dropped
//! - timer seconds that are negative or not numbers become 0
//! - unknown phases, missing phase budgets and missing scalars take the values
//!   of the supplied defaults
//! - opacities are clamped into their allowed ranges
//!
//! Only a document that is not JSON, or whose root is not an object, fails to
//! decode. Internal code can rely on a well-typed state afterwards.

use anyhow::Result;
use chrono::{DateTime, Utc};
use serde_json::{Map, Value};
use shared::{
    AppState, ChildProfile, ChildTheme, Completion, DayEntry, DayRecords, PanelKey, Phase,
    PhaseBudget, PhaseConfig, TaskCategory, TaskLists, TimerSeconds,
};
use std::collections::{BTreeMap, HashSet};
use tracing::debug;

/// Serialize the whole state document
pub fn encode_state(state: &AppState) -> Result<String> {
    Ok(serde_json::to_string(state)?)
}

/// Decode a stored document, filling gaps from `defaults`.
///
/// Returns `None` when the content is not a JSON object at all.
pub fn decode_state(raw: &str, defaults: &AppState) -> Option<AppState> {
    let value: Value = match serde_json::from_str(raw) {
        Ok(value) => value,
        Err(e) => {
            debug!("Stored state is not valid JSON: {}", e);
            return None;
        }
    };
    let root = value.as_object()?;

    Some(AppState {
        creation_timestamp: root
            .get("creationTimestamp")
            .and_then(Value::as_str)
            .and_then(|s| DateTime::parse_from_rfc3339(s).ok())
            .map(|dt| dt.with_timezone(&Utc))
            .unwrap_or(defaults.creation_timestamp),
        pin: root
            .get("pin")
            .and_then(scalar_string)
            .unwrap_or_else(|| defaults.pin.clone()),
        current_phase: root
            .get("currentPhase")
            .and_then(Value::as_str)
            .and_then(Phase::from_name)
            .unwrap_or(defaults.current_phase),
        phase_config: decode_phase_config(root.get("phaseConfig"), &defaults.phase_config),
        shared_background: root
            .get("sharedBackground")
            .and_then(Value::as_str)
            .unwrap_or_default()
            .to_string(),
        reward_list: string_list(root.get("rewardList")),
        children: decode_children(root.get("children")),
        daily_records: decode_daily_records(root.get("dailyRecords")),
    })
}

fn object(value: Option<&Value>) -> Option<&Map<String, Value>> {
    value.and_then(Value::as_object)
}

/// Strings pass through; numbers are accepted for fields like the PIN
fn scalar_string(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

fn string_list(value: Option<&Value>) -> Vec<String> {
    value
        .and_then(Value::as_array)
        .map(|items| {
            items
                .iter()
                .filter_map(|item| item.as_str().map(str::to_string))
                .collect()
        })
        .unwrap_or_default()
}

/// Like [`string_list`] but keeps only the first occurrence of each label
fn unique_string_list(value: Option<&Value>) -> Vec<String> {
    let mut seen = HashSet::new();
    string_list(value)
        .into_iter()
        .filter(|label| seen.insert(label.clone()))
        .collect()
}

fn non_negative_integer(value: &Value) -> Option<u64> {
    value.as_u64().or_else(|| {
        value
            .as_f64()
            .filter(|f| f.is_finite() && *f >= 0.0)
            .map(|f| f.floor() as u64)
    })
}

fn percent(value: Option<&Value>) -> Option<u8> {
    value
        .and_then(Value::as_f64)
        .filter(|f| f.is_finite())
        .map(|f| f.round().clamp(0.0, 255.0) as u8)
}

/// `null` means unlimited; a missing or malformed value keeps the default
fn decode_minutes(value: Option<&Value>, default: Option<u32>) -> Option<u32> {
    match value {
        Some(Value::Null) => None,
        Some(v) => non_negative_integer(v)
            .map(|minutes| minutes.min(u32::MAX as u64) as u32)
            .or(default),
        None => default,
    }
}

fn decode_phase_config(value: Option<&Value>, defaults: &PhaseConfig) -> PhaseConfig {
    let mut config = *defaults;
    let Some(phases) = object(value) else {
        return config;
    };

    for phase in Phase::ALL {
        let Some(budget) = object(phases.get(phase.name())) else {
            continue;
        };
        let default_budget = defaults.get(phase);
        *config.get_mut(phase) = PhaseBudget {
            video_game_minutes: decode_minutes(
                budget.get("videoGameMinutes"),
                default_budget.video_game_minutes,
            ),
            tv_minutes: decode_minutes(budget.get("tvMinutes"), default_budget.tv_minutes),
        };
    }
    config
}

fn decode_theme(value: Option<&Value>) -> ChildTheme {
    let mut theme = ChildTheme::default();
    let Some(fields) = object(value) else {
        return theme;
    };

    if let Some(color) = fields.get("accentColor").and_then(Value::as_str) {
        theme.accent_color = color.to_string();
    }
    if let Some(background) = fields.get("background").and_then(Value::as_str) {
        theme.background = background.to_string();
    }
    if let Some(opacity) = percent(fields.get("backgroundOverlayOpacity")) {
        theme.background_overlay_opacity = ChildTheme::clamp_overlay_opacity(opacity);
    }
    if let Some(panels) = object(fields.get("panelOpacity")) {
        for panel in PanelKey::ALL {
            if let Some(opacity) = percent(panels.get(panel_name(panel))) {
                theme
                    .panel_opacity
                    .insert(panel, ChildTheme::clamp_panel_opacity(opacity));
            }
        }
    }
    theme
}

fn panel_name(panel: PanelKey) -> &'static str {
    match panel {
        PanelKey::Personal => "personal",
        PanelKey::Family => "family",
        PanelKey::Growth => "growth",
        PanelKey::Tv => "tv",
        PanelKey::VideoGames => "videoGames",
    }
}

fn decode_task_lists(value: Option<&Value>) -> TaskLists {
    let mut task_lists = TaskLists::default();
    if let Some(lists) = object(value) {
        for category in TaskCategory::ALL {
            *task_lists.get_mut(category) = unique_string_list(lists.get(category.name()));
        }
    }
    task_lists
}

fn decode_children(value: Option<&Value>) -> Vec<ChildProfile> {
    let Some(items) = value.and_then(Value::as_array) else {
        return Vec::new();
    };

    let mut seen_ids = HashSet::new();
    let mut children = Vec::with_capacity(items.len());
    for item in items {
        let Some(fields) = item.as_object() else {
            continue;
        };
        // Without an id there is nothing to key day records by
        let Some(id) = fields.get("id").and_then(scalar_string).filter(|id| !id.is_empty()) else {
            continue;
        };
        if !seen_ids.insert(id.clone()) {
            continue;
        }

        children.push(ChildProfile {
            id,
            name: fields
                .get("name")
                .and_then(Value::as_str)
                .unwrap_or_default()
                .to_string(),
            age: fields
                .get("age")
                .and_then(non_negative_integer)
                .map(|age| age.min(u32::MAX as u64) as u32)
                .unwrap_or(0),
            theme: decode_theme(fields.get("theme")),
            task_lists: decode_task_lists(fields.get("taskLists")),
        });
    }
    children
}

fn decode_completion(value: Option<&Value>) -> Completion {
    let mut completion = Completion::default();
    let Some(categories) = object(value) else {
        return completion;
    };

    for category in TaskCategory::ALL {
        if let Some(flags) = object(categories.get(category.name())) {
            *completion.get_mut(category) = flags
                .iter()
                .filter_map(|(label, flag)| flag.as_bool().map(|done| (label.clone(), done)))
                .collect();
        }
    }
    completion
}

fn decode_timers(value: Option<&Value>) -> TimerSeconds {
    let Some(timers) = object(value) else {
        return TimerSeconds::default();
    };
    TimerSeconds {
        tv: timers.get("tv").and_then(non_negative_integer).unwrap_or(0),
        video_games: timers
            .get("videoGames")
            .and_then(non_negative_integer)
            .unwrap_or(0),
    }
}

fn decode_day_entry(value: &Value) -> DayEntry {
    let fields = value.as_object();
    DayEntry {
        completion: decode_completion(fields.and_then(|f| f.get("completion"))),
        timers: decode_timers(fields.and_then(|f| f.get("timers"))),
    }
}

fn decode_daily_records(value: Option<&Value>) -> BTreeMap<String, DayRecords> {
    let Some(days) = object(value) else {
        return BTreeMap::new();
    };

    days.iter()
        .map(|(date_key, children)| {
            let records: DayRecords = children
                .as_object()
                .map(|entries| {
                    entries
                        .iter()
                        .map(|(child_id, entry)| (child_id.clone(), decode_day_entry(entry)))
                        .collect()
                })
                .unwrap_or_default();
            (date_key.clone(), records)
        })
        .collect()
}
