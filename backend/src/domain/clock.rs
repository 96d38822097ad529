//! Wall-clock access, injectable so day rollover can be tested.

use chrono::{DateTime, Local, NaiveDate, Utc};
use std::sync::{Arc, Mutex};

/// Format of day record keys: sortable local calendar date
pub const DATE_KEY_FORMAT: &str = "%Y-%m-%d";

pub fn date_key(date: NaiveDate) -> String {
    date.format(DATE_KEY_FORMAT).to_string()
}

pub trait Clock: Send + Sync {
    fn now(&self) -> DateTime<Utc>;

    /// Calendar date in the device's local timezone
    fn today(&self) -> NaiveDate;

    fn today_key(&self) -> String {
        date_key(self.today())
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }

    fn today(&self) -> NaiveDate {
        Local::now().date_naive()
    }
}

/// Clock whose date only moves when told to
#[derive(Debug, Clone)]
pub struct ManualClock {
    now: Arc<Mutex<DateTime<Utc>>>,
    today: Arc<Mutex<NaiveDate>>,
}

impl ManualClock {
    pub fn new(now: DateTime<Utc>, today: NaiveDate) -> Self {
        Self {
            now: Arc::new(Mutex::new(now)),
            today: Arc::new(Mutex::new(today)),
        }
    }

    /// A clock fixed at midday UTC of `today`
    pub fn on(today: NaiveDate) -> Self {
        let now = today
            .and_hms_opt(12, 0, 0)
            .map(|dt| dt.and_utc())
            .unwrap_or_else(Utc::now);
        Self::new(now, today)
    }

    pub fn set_today(&self, today: NaiveDate) {
        *self.today.lock().unwrap_or_else(|p| p.into_inner()) = today;
    }

    /// Move to the next calendar day
    pub fn advance_day(&self) {
        let mut today = self.today.lock().unwrap_or_else(|p| p.into_inner());
        if let Some(next) = today.succ_opt() {
            *today = next;
        }
    }
}

impl Clock for ManualClock {
    fn now(&self) -> DateTime<Utc> {
        *self.now.lock().unwrap_or_else(|p| p.into_inner())
    }

    fn today(&self) -> NaiveDate {
        *self.today.lock().unwrap_or_else(|p| p.into_inner())
    }
}
