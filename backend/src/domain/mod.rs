//! # Domain Module
//!
//! Pure board logic (completion normalizing, the unlock ladder, time budgets,
//! day records) plus the services that apply it to the shared [`StateStore`].
//!
//! Services:
//! - [`BoardService`]: a child's board for today and task toggling
//! - [`TimerService`]: screen-time timers and unlock enforcement
//! - [`ThemeService`]: per-child customisation
//! - [`ParentalControlService`]: PIN check handing out an admin session
//! - [`SettingsService`]: PIN-gated administration

pub mod board_service;
pub mod clock;
pub mod commands;
pub mod completion;
pub mod day_records;
pub mod defaults;
pub mod parental_control_service;
pub mod progression;
pub mod settings_service;
pub mod state_store;
pub mod theme_service;
pub mod ticker;
pub mod time_budget;
pub mod timer_service;

pub use board_service::BoardService;
pub use clock::{Clock, ManualClock, SystemClock};
pub use parental_control_service::ParentalControlService;
pub use settings_service::SettingsService;
pub use state_store::StateStore;
pub use theme_service::ThemeService;
pub use timer_service::TimerService;
