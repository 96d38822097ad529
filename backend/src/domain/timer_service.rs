//! # Timer Service
//!
//! Runs the per-child screen-time timers. Each running `(child, channel)` pair
//! owns one [`Ticker`]; every tick adds one second to that child's entry for
//! the current local day. A tick re-checks the unlock level of that day first
//! and ends its ticker instead of counting when the channel is no longer
//! unlocked, which also covers a timer left running past midnight.
//!
//! Locking: the running-timer map is always taken before the state store.
//! Ticks only touch the store, so stopping a ticker while holding the map can
//! wait for an in-flight tick without deadlocking.

use anyhow::Result;
use shared::{AppState, TimerChannel, UnlockLevel};
use std::collections::{BTreeSet, HashMap};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;
use tracing::{debug, info};

use super::clock::Clock;
use super::day_records::{child_entry_mut, evaluate_child};
use super::state_store::StateStore;
use super::ticker::Ticker;
use crate::error::BoardError;

type TimerKey = (String, TimerChannel);

#[derive(Clone)]
pub struct TimerService {
    store: StateStore,
    clock: Arc<dyn Clock>,
    tick_interval: Duration,
    running: Arc<Mutex<HashMap<TimerKey, Ticker>>>,
}

impl TimerService {
    pub fn new(store: StateStore, clock: Arc<dyn Clock>, tick_interval: Duration) -> Self {
        Self {
            store,
            clock,
            tick_interval,
            running: Arc::new(Mutex::new(HashMap::new())),
        }
    }

    /// Start a channel for a child.
    ///
    /// Returns `Ok(false)` without touching anything when the channel is not
    /// unlocked today. Starting a channel that is already running is a no-op
    /// that reports success.
    pub async fn start(&self, child_id: &str, channel: TimerChannel) -> Result<bool> {
        let mut running = self.running.lock().await;
        let key = (child_id.to_string(), channel);

        if running.get(&key).is_some_and(Ticker::is_active) {
            debug!("Timer {} already running for {}", channel, child_id);
            return Ok(true);
        }

        let level = self
            .unlock_level(child_id)
            .await
            .ok_or_else(|| BoardError::ChildNotFound(child_id.to_string()))?;

        if !level.unlocks(channel) {
            info!(
                "Refusing to start {} for {}: level {:?} is below {:?}",
                channel,
                child_id,
                level,
                UnlockLevel::required_for(channel)
            );
            return Ok(false);
        }

        let ticker = self.spawn_ticker(child_id.to_string(), channel);
        running.insert(key, ticker);
        info!("Started {} timer for {}", channel, child_id);
        Ok(true)
    }

    /// Stop a channel. Always permitted; returns whether it was still ticking.
    pub async fn stop(&self, child_id: &str, channel: TimerChannel) -> bool {
        let mut running = self.running.lock().await;
        match running.remove(&(child_id.to_string(), channel)) {
            Some(ticker) => {
                let was_active = ticker.is_active();
                ticker.stop().await;
                info!("Stopped {} timer for {}", channel, child_id);
                was_active
            }
            None => false,
        }
    }

    /// Stop every channel of a child, e.g. when leaving its board
    pub async fn stop_child(&self, child_id: &str) -> Vec<TimerChannel> {
        let mut running = self.running.lock().await;
        let mut stopped = Vec::new();

        for channel in TimerChannel::ALL {
            if let Some(ticker) = running.remove(&(child_id.to_string(), channel)) {
                ticker.stop().await;
                stopped.push(channel);
            }
        }

        if !stopped.is_empty() {
            info!("Stopped {:?} timers for {}", stopped, child_id);
        }
        stopped
    }

    pub async fn stop_all(&self) {
        let mut running = self.running.lock().await;
        let count = running.len();
        for (_, ticker) in running.drain() {
            ticker.stop().await;
        }
        if count > 0 {
            info!("Stopped {} running timers", count);
        }
    }

    pub async fn is_running(&self, child_id: &str, channel: TimerChannel) -> bool {
        let running = self.running.lock().await;
        running
            .get(&(child_id.to_string(), channel))
            .is_some_and(Ticker::is_active)
    }

    /// Channels currently running for a child, in ladder order
    pub async fn running_channels(&self, child_id: &str) -> Vec<TimerChannel> {
        let running = self.running.lock().await;
        TimerChannel::ALL
            .into_iter()
            .filter(|channel| {
                running
                    .get(&(child_id.to_string(), *channel))
                    .is_some_and(Ticker::is_active)
            })
            .collect()
    }

    /// Stop the child's running channels that today's completion no longer
    /// unlocks. A child that no longer exists loses all of its timers.
    pub async fn enforce_unlocks(&self, child_id: &str) -> Vec<TimerChannel> {
        let mut running = self.running.lock().await;
        let level = self.unlock_level(child_id).await.unwrap_or(UnlockLevel::Locked);
        Self::stop_ineligible(&mut running, child_id, level).await
    }

    /// Apply a fallible state patch for one child and stop the timers it
    /// revokes, as one step.
    ///
    /// The running-timer map stays locked from before the patch until the
    /// revoked tickers have stopped, so no tick can land in between.
    pub async fn apply_and_enforce<R>(
        &self,
        child_id: &str,
        patch: impl FnOnce(&mut AppState) -> Result<R>,
    ) -> Result<(R, Vec<TimerChannel>)> {
        let mut running = self.running.lock().await;
        let result = self.store.try_update(patch).await?;
        let level = self.unlock_level(child_id).await.unwrap_or(UnlockLevel::Locked);
        let stopped = Self::stop_ineligible(&mut running, child_id, level).await;
        Ok((result, stopped))
    }

    /// [`enforce_unlocks`](Self::enforce_unlocks) for every child with a running timer
    pub async fn enforce_all(&self) -> Vec<(String, TimerChannel)> {
        let child_ids: BTreeSet<String> = {
            let running = self.running.lock().await;
            running.keys().map(|(child_id, _)| child_id.clone()).collect()
        };

        let mut stopped = Vec::new();
        for child_id in child_ids {
            for channel in self.enforce_unlocks(&child_id).await {
                stopped.push((child_id.clone(), channel));
            }
        }
        stopped
    }

    async fn stop_ineligible(
        running: &mut HashMap<TimerKey, Ticker>,
        child_id: &str,
        level: UnlockLevel,
    ) -> Vec<TimerChannel> {
        let mut stopped = Vec::new();
        for channel in TimerChannel::ALL {
            if level.unlocks(channel) {
                continue;
            }
            if let Some(ticker) = running.remove(&(child_id.to_string(), channel)) {
                ticker.stop().await;
                stopped.push(channel);
            }
        }

        if !stopped.is_empty() {
            info!("Level revoked for {}, stopped {:?}", child_id, stopped);
        }
        stopped
    }

    async fn unlock_level(&self, child_id: &str) -> Option<UnlockLevel> {
        let today = self.clock.today_key();
        self.store
            .read(|state| {
                state
                    .child(child_id)
                    .map(|child| evaluate_child(state, child, &today).1.unlock_level())
            })
            .await
    }

    fn spawn_ticker(&self, child_id: String, channel: TimerChannel) -> Ticker {
        let store = self.store.clone();
        let clock = self.clock.clone();

        Ticker::start(self.tick_interval, move || {
            let store = store.clone();
            let clock = clock.clone();
            let child_id = child_id.clone();
            async move {
                let counted = store
                    .update_if(|state| {
                        let today = clock.today_key();
                        let child = state.child(&child_id)?;
                        let (_, progression) = evaluate_child(state, child, &today);
                        if !progression.unlock_level().unlocks(channel) {
                            return None;
                        }
                        *child_entry_mut(state, &today, &child_id).timers.get_mut(channel) += 1;
                        Some(())
                    })
                    .await
                    .is_some();

                if !counted {
                    info!("{} timer for {} is no longer unlocked, stopping", channel, child_id);
                }
                counted
            }
        })
    }
}
