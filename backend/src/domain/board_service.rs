use anyhow::Result;
use shared::{
    ChannelStatus, ChildBoardResponse, ChildProfile, FamilyProgressResponse, TaskCategory,
    TimerChannel, ToggleTaskRequest, ToggleTaskResponse,
};
use std::sync::Arc;
use tracing::{debug, info};

use super::clock::Clock;
use super::completion::normalize;
use super::day_records::{child_entry, child_entry_mut, evaluate_child, get_or_create_day};
use super::progression::evaluate;
use super::state_store::StateStore;
use super::time_budget::{budget_label, format_clock, percent_of_budget};
use super::timer_service::TimerService;
use crate::error::BoardError;

/// Service behind each child's daily board: tasks, unlocks and timer display
#[derive(Clone)]
pub struct BoardService {
    store: StateStore,
    clock: Arc<dyn Clock>,
    timers: TimerService,
}

impl BoardService {
    pub fn new(store: StateStore, clock: Arc<dyn Clock>, timers: TimerService) -> Self {
        Self { store, clock, timers }
    }

    pub async fn list_children(&self) -> Vec<ChildProfile> {
        self.store.read(|state| state.children.clone()).await
    }

    pub async fn rewards(&self) -> Vec<String> {
        self.store.read(|state| state.reward_list.clone()).await
    }

    /// Make sure today's bucket exists and return its key.
    ///
    /// Called when the board is opened; on a new calendar day this starts an
    /// empty day while earlier days stay as they were, and stops any timer
    /// still running from the day before that the new day does not unlock.
    pub async fn ensure_today(&self) -> String {
        let today = self.clock.today_key();
        let exists = self
            .store
            .read(|state| state.daily_records.contains_key(&today))
            .await;

        if !exists {
            info!("Starting a new day: {}", today);
            self.store
                .update(|state| {
                    get_or_create_day(state, &today);
                })
                .await;

            let stopped = self.timers.enforce_all().await;
            if !stopped.is_empty() {
                info!("Stopped {} timers carried over into {}", stopped.len(), today);
            }
        }
        today
    }

    /// Everything shown on a child's board for today
    pub async fn child_board(&self, child_id: &str) -> Result<ChildBoardResponse> {
        debug!("Building board for {}", child_id);

        let running = self.timers.running_channels(child_id).await;
        let today = self.clock.today_key();

        let board = self
            .store
            .read(|state| {
                let child = state.child(child_id)?;
                let (completion, progression) = evaluate_child(state, child, &today);
                let unlock_level = progression.unlock_level();
                let entry = child_entry(state, &today, child_id);
                let budget = state.active_budget();

                let channels = TimerChannel::ALL
                    .into_iter()
                    .map(|channel| {
                        let unlocked = unlock_level.unlocks(channel);
                        let seconds = entry.timers.get(channel);
                        let configured = budget.minutes_for(channel);
                        let budget_minutes = if unlocked { configured } else { None };

                        ChannelStatus {
                            channel,
                            unlocked,
                            running: running.contains(&channel),
                            seconds,
                            clock: format_clock(seconds),
                            budget_label: budget_label(configured),
                            budget_minutes,
                            percent_of_budget: percent_of_budget(seconds, budget_minutes),
                        }
                    })
                    .collect();

                Some(ChildBoardResponse {
                    child: child.clone(),
                    phase: state.current_phase,
                    date_key: today.clone(),
                    completion,
                    progression,
                    unlock_level,
                    channels,
                    reward_active: progression.level3,
                })
            })
            .await;

        board.ok_or_else(|| anyhow::Error::from(BoardError::ChildNotFound(child_id.to_string())))
    }

    /// Flip one task for today and stop any timer the new completion no
    /// longer unlocks, in the same step
    pub async fn toggle_task(&self, request: ToggleTaskRequest) -> Result<ToggleTaskResponse> {
        let ToggleTaskRequest {
            child_id,
            category,
            label,
        } = request;
        info!("Toggling {} task '{}' for {}", category, label, child_id);

        let today = self.clock.today_key();
        let ((done, progression), stopped_channels) = self
            .timers
            .apply_and_enforce(&child_id, |state| {
                let tasks = state
                    .child(&child_id)
                    .ok_or_else(|| BoardError::ChildNotFound(child_id.clone()))?
                    .task_lists
                    .clone();

                if !tasks.contains(category, &label) {
                    return Err(BoardError::TaskNotFound {
                        category,
                        label: label.clone(),
                    }
                    .into());
                }

                let entry = child_entry_mut(state, &today, &child_id);
                entry.completion = normalize(&tasks, &entry.completion);

                let flag = entry.completion.get_mut(category).entry(label.clone()).or_insert(false);
                *flag = !*flag;
                let done = *flag;

                Ok((done, evaluate(&tasks, &entry.completion)))
            })
            .await?;

        info!(
            "Task '{}' for {} is now {}; {}/{} done",
            label,
            child_id,
            if done { "done" } else { "open" },
            progression.done_count,
            progression.total_count
        );

        Ok(ToggleTaskResponse {
            done,
            progression,
            stopped_channels,
        })
    }

    /// Summed progress of every child for today
    pub async fn family_progress(&self) -> FamilyProgressResponse {
        let today = self.clock.today_key();
        let (done_count, total_count) = self
            .store
            .read(|state| {
                state.children.iter().fold((0, 0), |(done, total), child| {
                    let (_, progression) = evaluate_child(state, child, &today);
                    (done + progression.done_count, total + progression.total_count)
                })
            })
            .await;

        let progress_percent = if total_count == 0 {
            0.0
        } else {
            done_count as f64 / total_count as f64 * 100.0
        };

        FamilyProgressResponse {
            done_count,
            total_count,
            progress_percent,
        }
    }

    /// Whether a task is done today for a child
    pub async fn is_task_done(&self, child_id: &str, category: TaskCategory, label: &str) -> bool {
        let today = self.clock.today_key();
        self.store
            .read(|state| child_entry(state, &today, child_id).completion.is_done(category, label))
            .await
    }
}
