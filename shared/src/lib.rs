use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

/// Named bundle of screen-time allowances. Exactly three exist.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum Phase {
    Phase1,
    Phase2,
    Phase3,
}

impl Phase {
    pub const ALL: [Phase; 3] = [Phase::Phase1, Phase::Phase2, Phase::Phase3];

    /// Parse the persisted name of a phase ("Phase1", "Phase2", "Phase3")
    pub fn from_name(name: &str) -> Option<Phase> {
        Phase::ALL.into_iter().find(|phase| phase.name() == name)
    }

    pub fn name(&self) -> &'static str {
        match self {
            Phase::Phase1 => "Phase1",
            Phase::Phase2 => "Phase2",
            Phase::Phase3 => "Phase3",
        }
    }
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Phase::Phase1 => write!(f, "Phase 1"),
            Phase::Phase2 => write!(f, "Phase 2"),
            Phase::Phase3 => write!(f, "Phase 3"),
        }
    }
}

/// Minute allowances for one phase. `None` means no limit is configured.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PhaseBudget {
    pub video_game_minutes: Option<u32>,
    pub tv_minutes: Option<u32>,
}

impl PhaseBudget {
    /// Budget in minutes for a timer channel
    pub fn minutes_for(&self, channel: TimerChannel) -> Option<u32> {
        match channel {
            TimerChannel::Tv => self.tv_minutes,
            TimerChannel::VideoGames => self.video_game_minutes,
        }
    }
}

/// Budgets for every phase. A struct rather than a map so that all three
/// phases are always present.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct PhaseConfig {
    #[serde(rename = "Phase1")]
    pub phase1: PhaseBudget,
    #[serde(rename = "Phase2")]
    pub phase2: PhaseBudget,
    #[serde(rename = "Phase3")]
    pub phase3: PhaseBudget,
}

impl PhaseConfig {
    pub fn get(&self, phase: Phase) -> &PhaseBudget {
        match phase {
            Phase::Phase1 => &self.phase1,
            Phase::Phase2 => &self.phase2,
            Phase::Phase3 => &self.phase3,
        }
    }

    pub fn get_mut(&mut self, phase: Phase) -> &mut PhaseBudget {
        match phase {
            Phase::Phase1 => &mut self.phase1,
            Phase::Phase2 => &mut self.phase2,
            Phase::Phase3 => &mut self.phase3,
        }
    }
}

/// Task grouping. The declaration order is the unlock ladder order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TaskCategory {
    Personal,
    Family,
    Growth,
}

impl TaskCategory {
    pub const ALL: [TaskCategory; 3] = [
        TaskCategory::Personal,
        TaskCategory::Family,
        TaskCategory::Growth,
    ];

    pub fn name(&self) -> &'static str {
        match self {
            TaskCategory::Personal => "personal",
            TaskCategory::Family => "family",
            TaskCategory::Growth => "growth",
        }
    }
}

impl fmt::Display for TaskCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.name())
    }
}

/// Ordered task labels per category. Labels are the identity key for
/// completion tracking.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct TaskLists {
    pub personal: Vec<String>,
    pub family: Vec<String>,
    pub growth: Vec<String>,
}

impl TaskLists {
    pub fn get(&self, category: TaskCategory) -> &[String] {
        match category {
            TaskCategory::Personal => &self.personal,
            TaskCategory::Family => &self.family,
            TaskCategory::Growth => &self.growth,
        }
    }

    pub fn get_mut(&mut self, category: TaskCategory) -> &mut Vec<String> {
        match category {
            TaskCategory::Personal => &mut self.personal,
            TaskCategory::Family => &mut self.family,
            TaskCategory::Growth => &mut self.growth,
        }
    }

    pub fn contains(&self, category: TaskCategory, label: &str) -> bool {
        self.get(category).iter().any(|task| task == label)
    }

    pub fn total_len(&self) -> usize {
        TaskCategory::ALL.iter().map(|c| self.get(*c).len()).sum()
    }
}

/// Done flags per category, keyed by task label
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Completion {
    pub personal: BTreeMap<String, bool>,
    pub family: BTreeMap<String, bool>,
    pub growth: BTreeMap<String, bool>,
}

impl Completion {
    pub fn get(&self, category: TaskCategory) -> &BTreeMap<String, bool> {
        match category {
            TaskCategory::Personal => &self.personal,
            TaskCategory::Family => &self.family,
            TaskCategory::Growth => &self.growth,
        }
    }

    pub fn get_mut(&mut self, category: TaskCategory) -> &mut BTreeMap<String, bool> {
        match category {
            TaskCategory::Personal => &mut self.personal,
            TaskCategory::Family => &mut self.family,
            TaskCategory::Growth => &mut self.growth,
        }
    }

    /// Whether a task is marked done. Unknown labels read as not done.
    pub fn is_done(&self, category: TaskCategory, label: &str) -> bool {
        self.get(category).get(label).copied().unwrap_or(false)
    }
}

/// Screen-time channel with its own accumulating timer
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum TimerChannel {
    Tv,
    VideoGames,
}

impl TimerChannel {
    pub const ALL: [TimerChannel; 2] = [TimerChannel::Tv, TimerChannel::VideoGames];
}

impl fmt::Display for TimerChannel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TimerChannel::Tv => write!(f, "tv"),
            TimerChannel::VideoGames => write!(f, "videoGames"),
        }
    }
}

/// Accumulated whole seconds per channel
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct TimerSeconds {
    pub tv: u64,
    pub video_games: u64,
}

impl TimerSeconds {
    pub fn get(&self, channel: TimerChannel) -> u64 {
        match channel {
            TimerChannel::Tv => self.tv,
            TimerChannel::VideoGames => self.video_games,
        }
    }

    pub fn get_mut(&mut self, channel: TimerChannel) -> &mut u64 {
        match channel {
            TimerChannel::Tv => &mut self.tv,
            TimerChannel::VideoGames => &mut self.video_games,
        }
    }
}

/// One child's record for one calendar day
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct DayEntry {
    pub completion: Completion,
    pub timers: TimerSeconds,
}

/// Panels whose translucency can be customised per child
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum PanelKey {
    Personal,
    Family,
    Growth,
    Tv,
    VideoGames,
}

impl PanelKey {
    pub const ALL: [PanelKey; 5] = [
        PanelKey::Personal,
        PanelKey::Family,
        PanelKey::Growth,
        PanelKey::Tv,
        PanelKey::VideoGames,
    ];
}

/// Per-child visual preferences. Stored only; rendering happens elsewhere.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChildTheme {
    pub accent_color: String,
    /// Image reference or URL, empty when unset
    pub background: String,
    /// Percent in [0, 100]
    pub background_overlay_opacity: u8,
    /// Percent in [20, 95] per panel
    pub panel_opacity: BTreeMap<PanelKey, u8>,
}

impl ChildTheme {
    pub const DEFAULT_ACCENT_COLOR: &'static str = "#2563eb";
    pub const DEFAULT_OVERLAY_OPACITY: u8 = 40;
    pub const DEFAULT_PANEL_OPACITY: u8 = 70;
    pub const MIN_PANEL_OPACITY: u8 = 20;
    pub const MAX_PANEL_OPACITY: u8 = 95;
    pub const MAX_OVERLAY_OPACITY: u8 = 100;

    pub fn with_accent(accent_color: &str) -> Self {
        Self {
            accent_color: accent_color.to_string(),
            ..Self::default()
        }
    }

    /// Opacity of a panel, falling back to the default when unset
    pub fn panel_opacity_for(&self, panel: PanelKey) -> u8 {
        self.panel_opacity
            .get(&panel)
            .copied()
            .unwrap_or(Self::DEFAULT_PANEL_OPACITY)
    }

    pub fn clamp_panel_opacity(percent: u8) -> u8 {
        percent.clamp(Self::MIN_PANEL_OPACITY, Self::MAX_PANEL_OPACITY)
    }

    pub fn clamp_overlay_opacity(percent: u8) -> u8 {
        percent.min(Self::MAX_OVERLAY_OPACITY)
    }
}

impl Default for ChildTheme {
    fn default() -> Self {
        Self {
            accent_color: Self::DEFAULT_ACCENT_COLOR.to_string(),
            background: String::new(),
            background_overlay_opacity: Self::DEFAULT_OVERLAY_OPACITY,
            panel_opacity: PanelKey::ALL
                .into_iter()
                .map(|panel| (panel, Self::DEFAULT_PANEL_OPACITY))
                .collect(),
        }
    }
}

/// Represents a child on the board
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChildProfile {
    /// Stable identifier, used as the key in daily records
    pub id: String,
    pub name: String,
    pub age: u32,
    pub theme: ChildTheme,
    pub task_lists: TaskLists,
}

impl ChildProfile {
    /// Generate a child ID based on timestamp
    pub fn generate_id(epoch_millis: u64) -> String {
        format!("child::{}", epoch_millis)
    }
}

/// Day entries for one calendar day, keyed by child ID
pub type DayRecords = BTreeMap<String, DayEntry>;

/// The whole persisted document
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AppState {
    pub creation_timestamp: DateTime<Utc>,
    pub pin: String,
    pub current_phase: Phase,
    pub phase_config: PhaseConfig,
    pub shared_background: String,
    pub reward_list: Vec<String>,
    pub children: Vec<ChildProfile>,
    /// Keyed by local calendar date (YYYY-MM-DD)
    pub daily_records: BTreeMap<String, DayRecords>,
}

impl AppState {
    pub fn child(&self, child_id: &str) -> Option<&ChildProfile> {
        self.children.iter().find(|child| child.id == child_id)
    }

    pub fn child_mut(&mut self, child_id: &str) -> Option<&mut ChildProfile> {
        self.children.iter_mut().find(|child| child.id == child_id)
    }

    /// Budgets of the phase currently in effect
    pub fn active_budget(&self) -> &PhaseBudget {
        self.phase_config.get(self.current_phase)
    }
}

/// Result of evaluating a child's tasks against today's completion
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Progression {
    pub level1: bool,
    pub level2: bool,
    pub level3: bool,
    pub done_count: usize,
    pub total_count: usize,
    /// In [0, 100]; 0 when no tasks are configured
    pub progress_percent: f64,
}

impl Progression {
    pub fn unlock_level(&self) -> UnlockLevel {
        if self.level3 {
            UnlockLevel::Level3
        } else if self.level2 {
            UnlockLevel::Level2
        } else if self.level1 {
            UnlockLevel::Level1
        } else {
            UnlockLevel::Locked
        }
    }
}

/// Highest rung of the unlock ladder currently reached
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub enum UnlockLevel {
    Locked,
    Level1,
    Level2,
    Level3,
}

impl UnlockLevel {
    /// Level a timer channel needs before it may be started
    pub fn required_for(channel: TimerChannel) -> UnlockLevel {
        match channel {
            TimerChannel::Tv => UnlockLevel::Level1,
            TimerChannel::VideoGames => UnlockLevel::Level2,
        }
    }

    pub fn unlocks(&self, channel: TimerChannel) -> bool {
        *self >= UnlockLevel::required_for(channel)
    }
}

/// State of one timer channel as shown on a child's board
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChannelStatus {
    pub channel: TimerChannel,
    pub unlocked: bool,
    pub running: bool,
    pub seconds: u64,
    /// Elapsed time as MM:SS
    pub clock: String,
    /// Minutes configured for the active phase, e.g. "60m" or "∞"
    pub budget_label: String,
    /// Budget used for the progress bar; `None` when locked or unlimited
    pub budget_minutes: Option<u32>,
    pub percent_of_budget: u8,
}

/// Everything needed to render one child's board for today
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChildBoardResponse {
    pub child: ChildProfile,
    pub phase: Phase,
    pub date_key: String,
    pub completion: Completion,
    pub progression: Progression,
    pub unlock_level: UnlockLevel,
    pub channels: Vec<ChannelStatus>,
    /// The level-3 reward is active
    pub reward_active: bool,
}

/// Summed progress of every child for today
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct FamilyProgressResponse {
    pub done_count: usize,
    pub total_count: usize,
    pub progress_percent: f64,
}

/// Request for toggling one task for today
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ToggleTaskRequest {
    pub child_id: String,
    pub category: TaskCategory,
    pub label: String,
}

/// Response after toggling a task
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToggleTaskResponse {
    pub done: bool,
    pub progression: Progression,
    /// Channels that were running and lost their unlock
    pub stopped_channels: Vec<TimerChannel>,
}

/// Request for parental control validation
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ParentalControlRequest {
    pub answer: String,
}

/// Response from parental control validation
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ParentalControlResponse {
    pub success: bool,
    pub message: String,
}

/// Global settings changes. Fields left as `None` are kept.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct SaveSettingsRequest {
    pub pin: Option<String>,
    pub current_phase: Option<Phase>,
    pub phase_config: Option<PhaseConfig>,
    pub reward_list: Option<Vec<String>>,
    pub shared_background: Option<String>,
}

/// Request for creating a new child
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct CreateChildRequest {
    pub name: String,
    pub age: u32,
}

/// Request for updating an existing child
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct UpdateChildRequest {
    pub name: Option<String>,
    pub age: Option<u32>,
}

/// Response after creating or updating a child
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ChildResponse {
    pub child: ChildProfile,
    pub success_message: String,
}

/// Customisation of a child's theme. Percentages are clamped, not rejected.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct ThemeUpdateRequest {
    pub accent_color: Option<String>,
    pub background: Option<String>,
    pub background_overlay_opacity: Option<u8>,
    pub panel_opacity: BTreeMap<PanelKey, u8>,
}
