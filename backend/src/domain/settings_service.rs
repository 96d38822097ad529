//! # Settings Service
//!
//! PIN-gated administration: global settings, children and their task lists.
//! Every operation takes an [`AdminSession`], which only
//! [`ParentalControlService`](super::ParentalControlService) can hand out.
//!
//! Any change here can move a child's unlock level, so each successful
//! mutation re-checks running timers afterwards.

use anyhow::Result;
use shared::{
    AppState, ChildProfile, ChildResponse, ChildTheme, CreateChildRequest, SaveSettingsRequest,
    UpdateChildRequest,
};
use std::sync::Arc;
use tracing::{info, warn};

use super::clock::Clock;
use super::commands::parental_control::AdminSession;
use super::commands::tasks::{RenameTaskCommand, TaskCommand};
use super::day_records::{child_entry_mut, reset_day};
use super::defaults::default_task_lists;
use super::state_store::StateStore;
use super::timer_service::TimerService;
use crate::error::BoardError;

pub const MAX_CHILD_NAME_LENGTH: usize = 100;

#[derive(Clone)]
pub struct SettingsService {
    store: StateStore,
    clock: Arc<dyn Clock>,
    timers: TimerService,
}

impl SettingsService {
    pub fn new(store: StateStore, clock: Arc<dyn Clock>, timers: TimerService) -> Self {
        Self { store, clock, timers }
    }

    /// Save global settings. Fields left as `None` keep their current value.
    pub async fn save_settings(&self, _session: &AdminSession, request: SaveSettingsRequest) -> Result<AppState> {
        info!("Saving settings");

        let state = self
            .store
            .try_update(|state| {
                if let Some(pin) = request.pin {
                    if pin.is_empty() {
                        return Err(BoardError::EmptyPin.into());
                    }
                    state.pin = pin;
                }
                if let Some(phase) = request.current_phase {
                    state.current_phase = phase;
                }
                if let Some(phase_config) = request.phase_config {
                    state.phase_config = phase_config;
                }
                if let Some(rewards) = request.reward_list {
                    state.reward_list = rewards
                        .into_iter()
                        .map(|reward| reward.trim().to_string())
                        .filter(|reward| !reward.is_empty())
                        .collect();
                }
                if let Some(background) = request.shared_background {
                    state.shared_background = background;
                }
                Ok(state.clone())
            })
            .await?;

        info!("Settings saved, active phase is {}", state.current_phase);
        self.timers.enforce_all().await;
        Ok(state)
    }

    /// Create a new child with the default task set
    pub async fn add_child(&self, _session: &AdminSession, request: CreateChildRequest) -> Result<ChildResponse> {
        info!("Creating child: name={}, age={}", request.name, request.age);

        let name = validate_child_name(&request.name)?;
        let millis = self.clock.now().timestamp_millis().max(0) as u64;

        let child = self
            .store
            .try_update(|state| {
                let mut id = ChildProfile::generate_id(millis);
                let mut offset = 1;
                while state.child(&id).is_some() {
                    id = ChildProfile::generate_id(millis + offset);
                    offset += 1;
                }

                let child = ChildProfile {
                    id,
                    name,
                    age: request.age,
                    theme: ChildTheme::default(),
                    task_lists: default_task_lists(),
                };
                state.children.push(child.clone());
                Ok(child)
            })
            .await?;

        info!("Created child: {} with ID: {}", child.name, child.id);

        Ok(ChildResponse {
            success_message: format!("{} was added to the board", child.name),
            child,
        })
    }

    /// Update a child's name and/or age
    pub async fn update_child(
        &self,
        _session: &AdminSession,
        child_id: &str,
        request: UpdateChildRequest,
    ) -> Result<ChildResponse> {
        info!("Updating child: {}", child_id);

        let name = request.name.as_deref().map(validate_child_name).transpose()?;

        let child = self
            .store
            .try_update(|state| {
                let child = state
                    .child_mut(child_id)
                    .ok_or_else(|| BoardError::ChildNotFound(child_id.to_string()))?;
                if let Some(name) = name {
                    child.name = name;
                }
                if let Some(age) = request.age {
                    child.age = age;
                }
                Ok(child.clone())
            })
            .await?;

        info!("Updated child: {} with ID: {}", child.name, child.id);

        Ok(ChildResponse {
            success_message: format!("{} was updated", child.name),
            child,
        })
    }

    /// Remove a child from the board. Its daily history stays in the records.
    pub async fn remove_child(&self, _session: &AdminSession, child_id: &str) -> Result<ChildProfile> {
        info!("Removing child: {}", child_id);

        self.timers.stop_child(child_id).await;

        let removed = self
            .store
            .try_update(|state| {
                let index = state
                    .children
                    .iter()
                    .position(|child| child.id == child_id)
                    .ok_or_else(|| BoardError::ChildNotFound(child_id.to_string()))?;
                Ok(state.children.remove(index))
            })
            .await?;

        info!("Removed child: {} with ID: {}", removed.name, removed.id);
        Ok(removed)
    }

    /// Append a task to the end of a category
    pub async fn add_task(&self, _session: &AdminSession, command: TaskCommand) -> Result<ChildProfile> {
        info!("Adding {} task '{}' for {}", command.category, command.label, command.child_id);

        let label = validate_task_label(&command.label)?;
        let category = command.category;

        let child = self
            .store
            .try_update(|state| {
                let child = find_child_mut(state, &command.child_id)?;
                if child.task_lists.contains(category, &label) {
                    return Err(BoardError::DuplicateTask { category, label }.into());
                }
                child.task_lists.get_mut(category).push(label);
                Ok(child.clone())
            })
            .await?;

        self.timers.enforce_unlocks(&command.child_id).await;
        Ok(child)
    }

    /// Rename a task in place. Today's done flag moves with it.
    pub async fn rename_task(&self, _session: &AdminSession, command: RenameTaskCommand) -> Result<ChildProfile> {
        info!(
            "Renaming {} task '{}' to '{}' for {}",
            command.category, command.from, command.to, command.child_id
        );

        let to = validate_task_label(&command.to)?;
        let category = command.category;
        let today = self.clock.today_key();

        let child = self
            .store
            .try_update(|state| {
                let child = find_child_mut(state, &command.child_id)?;
                let tasks = child.task_lists.get_mut(category);

                let index = tasks
                    .iter()
                    .position(|label| *label == command.from)
                    .ok_or_else(|| BoardError::TaskNotFound {
                        category,
                        label: command.from.clone(),
                    })?;
                if to != command.from && tasks.contains(&to) {
                    return Err(BoardError::DuplicateTask { category, label: to }.into());
                }
                tasks[index] = to.clone();
                let child = child.clone();

                let completion = child_entry_mut(state, &today, &command.child_id)
                    .completion
                    .get_mut(category);
                if let Some(done) = completion.remove(&command.from) {
                    completion.insert(to, done);
                }
                Ok(child)
            })
            .await?;

        self.timers.enforce_unlocks(&command.child_id).await;
        Ok(child)
    }

    pub async fn remove_task(&self, _session: &AdminSession, command: TaskCommand) -> Result<ChildProfile> {
        info!("Removing {} task '{}' for {}", command.category, command.label, command.child_id);

        let category = command.category;
        let child = self
            .store
            .try_update(|state| {
                let child = find_child_mut(state, &command.child_id)?;
                let tasks = child.task_lists.get_mut(category);
                let index = tasks
                    .iter()
                    .position(|label| *label == command.label)
                    .ok_or_else(|| BoardError::TaskNotFound {
                        category,
                        label: command.label.clone(),
                    })?;
                tasks.remove(index);
                Ok(child.clone())
            })
            .await?;

        self.timers.enforce_unlocks(&command.child_id).await;
        Ok(child)
    }

    /// Give every other child a copy of one child's task lists.
    /// Returns how many children were updated.
    pub async fn copy_tasks_to_all(&self, _session: &AdminSession, from_child_id: &str) -> Result<usize> {
        info!("Copying task lists from {} to every child", from_child_id);

        let updated = self
            .store
            .try_update(|state| {
                let tasks = state
                    .child(from_child_id)
                    .ok_or_else(|| BoardError::ChildNotFound(from_child_id.to_string()))?
                    .task_lists
                    .clone();

                let mut updated = 0;
                for child in state.children.iter_mut().filter(|child| child.id != from_child_id) {
                    child.task_lists = tasks.clone();
                    updated += 1;
                }
                Ok(updated)
            })
            .await?;

        info!("Copied task lists to {} children", updated);
        self.timers.enforce_all().await;
        Ok(updated)
    }

    /// Clear today's completion and timers for every child
    pub async fn reset_today(&self, _session: &AdminSession) -> Result<()> {
        let today = self.clock.today_key();
        warn!("Resetting all records for {}", today);

        self.store.update(|state| reset_day(state, &today)).await;
        self.timers.enforce_all().await;
        Ok(())
    }
}

fn find_child_mut<'a>(state: &'a mut AppState, child_id: &str) -> Result<&'a mut ChildProfile> {
    state
        .child_mut(child_id)
        .ok_or_else(|| anyhow::Error::from(BoardError::ChildNotFound(child_id.to_string())))
}

fn validate_child_name(name: &str) -> Result<String> {
    let name = name.trim();
    if name.is_empty() {
        return Err(BoardError::EmptyChildName.into());
    }
    if name.chars().count() > MAX_CHILD_NAME_LENGTH {
        return Err(BoardError::ChildNameTooLong(MAX_CHILD_NAME_LENGTH).into());
    }
    Ok(name.to_string())
}

fn validate_task_label(label: &str) -> Result<String> {
    let label = label.trim();
    if label.is_empty() {
        return Err(BoardError::EmptyTaskLabel.into());
    }
    Ok(label.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::clock::ManualClock;
    use crate::domain::commands::parental_control::ValidatePinCommand;
    use crate::domain::day_records::child_entry;
    use crate::domain::parental_control_service::ParentalControlService;
    use crate::storage::memory::MemoryBlobStore;
    use chrono::NaiveDate;
    use shared::{Phase, PhaseBudget, PhaseConfig, TaskCategory, TimerChannel};
    use std::time::Duration;

    struct Fixture {
        service: SettingsService,
        timers: TimerService,
        store: StateStore,
        clock: ManualClock,
        session: AdminSession,
    }

    async fn setup_test() -> Fixture {
        let clock = ManualClock::on(NaiveDate::from_ymd_opt(2025, 3, 1).unwrap());
        let store = StateStore::load(Arc::new(MemoryBlobStore::new()), "chore_board_state_v1", &clock).await;
        let clock_arc: Arc<dyn Clock> = Arc::new(clock.clone());
        let timers = TimerService::new(store.clone(), clock_arc.clone(), Duration::from_secs(1));
        let service = SettingsService::new(store.clone(), clock_arc, timers.clone());

        let session = ParentalControlService::new(store.clone())
            .validate_pin(ValidatePinCommand {
                answer: "1234".to_string(),
            })
            .await
            .session
            .expect("default PIN should grant a session");

        Fixture {
            service,
            timers,
            store,
            clock,
            session,
        }
    }

    fn task(child_id: &str, category: TaskCategory, label: &str) -> TaskCommand {
        TaskCommand {
            child_id: child_id.to_string(),
            category,
            label: label.to_string(),
        }
    }

    async fn complete_personal(f: &Fixture, child_id: &str) {
        let today = f.clock.today_key();
        f.store
            .update(|state| {
                let labels = state.child(child_id).unwrap().task_lists.personal.clone();
                let entry = child_entry_mut(state, &today, child_id);
                for label in labels {
                    entry.completion.personal.insert(label, true);
                }
            })
            .await;
    }

    #[tokio::test]
    async fn test_save_settings_updates_only_given_fields() {
        let f = setup_test().await;

        let state = f
            .service
            .save_settings(
                &f.session,
                SaveSettingsRequest {
                    current_phase: Some(Phase::Phase3),
                    reward_list: Some(vec![" Pizza night ".to_string(), "".to_string()]),
                    ..Default::default()
                },
            )
            .await
            .unwrap();

        assert_eq!(state.current_phase, Phase::Phase3);
        assert_eq!(state.reward_list, vec!["Pizza night"]);
        assert_eq!(state.pin, "1234");
        assert_eq!(f.store.snapshot().await, state);
    }

    #[tokio::test]
    async fn test_save_settings_phase_budgets_and_pin() {
        let f = setup_test().await;
        let budgets = PhaseConfig {
            phase1: PhaseBudget {
                video_game_minutes: Some(30),
                tv_minutes: Some(30),
            },
            phase2: PhaseBudget::default(),
            phase3: PhaseBudget {
                video_game_minutes: Some(0),
                tv_minutes: None,
            },
        };

        f.service
            .save_settings(
                &f.session,
                SaveSettingsRequest {
                    pin: Some("4321".to_string()),
                    phase_config: Some(budgets),
                    shared_background: Some("forest.jpg".to_string()),
                    ..Default::default()
                },
            )
            .await
            .unwrap();

        let state = f.store.snapshot().await;
        assert_eq!(state.pin, "4321");
        assert_eq!(state.phase_config, budgets);
        assert_eq!(state.shared_background, "forest.jpg");
    }

    #[tokio::test]
    async fn test_empty_pin_is_rejected() {
        let f = setup_test().await;

        let err = f
            .service
            .save_settings(
                &f.session,
                SaveSettingsRequest {
                    pin: Some(String::new()),
                    current_phase: Some(Phase::Phase1),
                    ..Default::default()
                },
            )
            .await
            .unwrap_err();

        assert_eq!(err.downcast_ref::<BoardError>(), Some(&BoardError::EmptyPin));
        let state = f.store.snapshot().await;
        assert_eq!(state.pin, "1234");
        assert_eq!(state.current_phase, Phase::Phase2);
    }

    #[tokio::test]
    async fn test_add_update_and_remove_child() {
        let f = setup_test().await;

        let created = f
            .service
            .add_child(
                &f.session,
                CreateChildRequest {
                    name: "  Mia ".to_string(),
                    age: 5,
                },
            )
            .await
            .unwrap();
        assert_eq!(created.child.name, "Mia");
        assert!(created.child.id.starts_with("child::"));
        assert_eq!(created.child.task_lists, default_task_lists());
        assert!(created.success_message.contains("Mia"));
        assert_eq!(f.store.snapshot().await.child(&created.child.id), Some(&created.child));

        let second = f
            .service
            .add_child(
                &f.session,
                CreateChildRequest {
                    name: "Tomi".to_string(),
                    age: 3,
                },
            )
            .await
            .unwrap();
        assert_ne!(second.child.id, created.child.id);

        let updated = f
            .service
            .update_child(
                &f.session,
                &created.child.id,
                UpdateChildRequest {
                    name: None,
                    age: Some(6),
                },
            )
            .await
            .unwrap();
        assert_eq!(updated.child.name, "Mia");
        assert_eq!(updated.child.age, 6);

        let removed = f.service.remove_child(&f.session, &created.child.id).await.unwrap();
        assert_eq!(removed.id, created.child.id);
        assert_eq!(f.store.snapshot().await.children.len(), 3);
    }

    #[tokio::test]
    async fn test_child_name_validation() {
        let f = setup_test().await;

        let err = f
            .service
            .add_child(
                &f.session,
                CreateChildRequest {
                    name: "   ".to_string(),
                    age: 4,
                },
            )
            .await
            .unwrap_err();
        assert_eq!(err.downcast_ref::<BoardError>(), Some(&BoardError::EmptyChildName));

        let err = f
            .service
            .update_child(
                &f.session,
                "oli",
                UpdateChildRequest {
                    name: Some("x".repeat(101)),
                    age: None,
                },
            )
            .await
            .unwrap_err();
        assert_eq!(
            err.downcast_ref::<BoardError>(),
            Some(&BoardError::ChildNameTooLong(100))
        );
        assert_eq!(f.store.snapshot().await.child("oli").unwrap().name, "Oli");
    }

    #[tokio::test]
    async fn test_removed_child_keeps_history() {
        let f = setup_test().await;
        complete_personal(&f, "oli").await;
        let today = f.clock.today_key();

        f.service.remove_child(&f.session, "oli").await.unwrap();

        let state = f.store.snapshot().await;
        assert!(state.child("oli").is_none());
        assert!(child_entry(&state, &today, "oli").completion.is_done(TaskCategory::Personal, "Make bed"));
    }

    #[tokio::test(start_paused = true)]
    async fn test_removing_child_stops_its_timers() {
        let f = setup_test().await;
        complete_personal(&f, "bauti").await;
        assert!(f.timers.start("bauti", TimerChannel::Tv).await.unwrap());

        f.service.remove_child(&f.session, "bauti").await.unwrap();
        assert!(!f.timers.is_running("bauti", TimerChannel::Tv).await);
    }

    #[tokio::test]
    async fn test_task_editing() {
        let f = setup_test().await;

        let child = f
            .service
            .add_task(&f.session, task("bauti", TaskCategory::Growth, " Practice piano "))
            .await
            .unwrap();
        assert_eq!(child.task_lists.growth.last().unwrap(), "Practice piano");

        let err = f
            .service
            .add_task(&f.session, task("bauti", TaskCategory::Growth, "Practice piano"))
            .await
            .unwrap_err();
        assert!(matches!(
            err.downcast_ref::<BoardError>(),
            Some(BoardError::DuplicateTask { .. })
        ));

        let err = f
            .service
            .add_task(&f.session, task("bauti", TaskCategory::Growth, ""))
            .await
            .unwrap_err();
        assert_eq!(err.downcast_ref::<BoardError>(), Some(&BoardError::EmptyTaskLabel));

        let child = f
            .service
            .remove_task(&f.session, task("bauti", TaskCategory::Growth, "Practice piano"))
            .await
            .unwrap();
        assert!(!child.task_lists.contains(TaskCategory::Growth, "Practice piano"));

        let err = f
            .service
            .remove_task(&f.session, task("bauti", TaskCategory::Growth, "Practice piano"))
            .await
            .unwrap_err();
        assert!(matches!(
            err.downcast_ref::<BoardError>(),
            Some(BoardError::TaskNotFound { .. })
        ));
    }

    #[tokio::test]
    async fn test_rename_keeps_position_and_done_flag() {
        let f = setup_test().await;
        complete_personal(&f, "oli").await;

        let child = f
            .service
            .rename_task(
                &f.session,
                RenameTaskCommand {
                    child_id: "oli".to_string(),
                    category: TaskCategory::Personal,
                    from: "Make bed".to_string(),
                    to: "Make the bed".to_string(),
                },
            )
            .await
            .unwrap();

        assert_eq!(child.task_lists.personal[0], "Make the bed");
        let state = f.store.snapshot().await;
        let entry = child_entry(&state, &f.clock.today_key(), "oli");
        assert!(entry.completion.is_done(TaskCategory::Personal, "Make the bed"));
        assert!(!entry.completion.personal.contains_key("Make bed"));

        let err = f
            .service
            .rename_task(
                &f.session,
                RenameTaskCommand {
                    child_id: "oli".to_string(),
                    category: TaskCategory::Personal,
                    from: "Make the bed".to_string(),
                    to: "Brush teeth".to_string(),
                },
            )
            .await
            .unwrap_err();
        assert!(matches!(
            err.downcast_ref::<BoardError>(),
            Some(BoardError::DuplicateTask { .. })
        ));
    }

    #[tokio::test(start_paused = true)]
    async fn test_adding_task_revokes_running_timer() {
        let f = setup_test().await;
        complete_personal(&f, "bauti").await;
        assert!(f.timers.start("bauti", TimerChannel::Tv).await.unwrap());

        f.service
            .add_task(&f.session, task("bauti", TaskCategory::Personal, "Water the plants"))
            .await
            .unwrap();

        assert!(!f.timers.is_running("bauti", TimerChannel::Tv).await);
    }

    #[tokio::test]
    async fn test_copy_tasks_to_all() {
        let f = setup_test().await;
        f.service
            .add_task(&f.session, task("bauti", TaskCategory::Family, "Walk the dog"))
            .await
            .unwrap();

        let updated = f.service.copy_tasks_to_all(&f.session, "bauti").await.unwrap();
        assert_eq!(updated, 1);

        let state = f.store.snapshot().await;
        assert_eq!(
            state.child("oli").unwrap().task_lists,
            state.child("bauti").unwrap().task_lists
        );

        assert!(f.service.copy_tasks_to_all(&f.session, "nobody").await.is_err());
    }

    #[tokio::test(start_paused = true)]
    async fn test_reset_today_clears_records_and_timers() {
        let f = setup_test().await;
        let yesterday = f.clock.today_key();
        complete_personal(&f, "oli").await;

        f.clock.advance_day();
        complete_personal(&f, "oli").await;
        complete_personal(&f, "bauti").await;
        assert!(f.timers.start("oli", TimerChannel::Tv).await.unwrap());

        f.service.reset_today(&f.session).await.unwrap();

        let state = f.store.snapshot().await;
        assert!(state.daily_records[&f.clock.today_key()].is_empty());
        assert!(child_entry(&state, &yesterday, "oli").completion.is_done(TaskCategory::Personal, "Make bed"));
        assert!(!f.timers.is_running("oli", TimerChannel::Tv).await);
    }
}
