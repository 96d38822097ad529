//! # Chore Board Backend
//!
//! Domain services and storage for a family chore board: children tick off
//! daily tasks, finished task categories unlock TV and video game time, and
//! the screen time used is tracked per child per day.
//!
//! The backend has no UI and no network surface. A front end builds a
//! [`Backend`] once and calls its services directly:
//!
//! ```no_run
//! # async fn run() -> anyhow::Result<()> {
//! use chore_board_backend::{config::BackendConfig, Backend};
//! use shared::{TaskCategory, TimerChannel, ToggleTaskRequest};
//!
//! chore_board_backend::logging::init_logging();
//! let backend = Backend::initialize(BackendConfig::load_default()).await;
//!
//! backend
//!     .board_service
//!     .toggle_task(ToggleTaskRequest {
//!         child_id: "bauti".to_string(),
//!         category: TaskCategory::Personal,
//!         label: "Make bed".to_string(),
//!     })
//!     .await?;
//! backend.timer_service.start("bauti", TimerChannel::Tv).await?;
//!
//! backend.shutdown().await;
//! # Ok(())
//! # }
//! ```

use std::sync::Arc;
use std::time::Duration;
use tracing::{info, warn};

pub mod config;
pub mod domain;
pub mod error;
pub mod logging;
pub mod storage;

use config::{BackendConfig, StorageKind};
use domain::{
    BoardService, Clock, ParentalControlService, SettingsService, StateStore, SystemClock,
    ThemeService, TimerService,
};
use storage::{BlobStore, JsonFileStore, MemoryBlobStore, SqliteBlobStore};

/// Main backend struct that wires all services to one state store
pub struct Backend {
    pub config: BackendConfig,
    pub store: StateStore,
    pub board_service: BoardService,
    pub timer_service: TimerService,
    pub theme_service: ThemeService,
    pub parental_control_service: ParentalControlService,
    pub settings_service: SettingsService,
}

impl Backend {
    /// Open the configured storage and load the board.
    ///
    /// Never fails: storage that cannot be opened is replaced by an in-memory
    /// store, and unreadable data by the default board.
    pub async fn initialize(config: BackendConfig) -> Self {
        info!(
            "Initializing backend in {:?} with {:?} storage",
            config.data_directory, config.storage
        );

        let blob_store = open_blob_store(&config).await;
        let clock: Arc<dyn Clock> = Arc::new(SystemClock);
        let mut backend =
            Self::with_store(blob_store, &config.state_key, config.tick_interval(), clock).await;
        backend.config = config;
        backend
    }

    /// Build the backend on an already opened store and clock
    pub async fn with_store(
        blob_store: Arc<dyn BlobStore>,
        state_key: &str,
        tick_interval: Duration,
        clock: Arc<dyn Clock>,
    ) -> Self {
        let store = StateStore::load(blob_store, state_key, clock.as_ref()).await;

        let timer_service = TimerService::new(store.clone(), clock.clone(), tick_interval);
        let board_service = BoardService::new(store.clone(), clock.clone(), timer_service.clone());
        let settings_service = SettingsService::new(store.clone(), clock, timer_service.clone());
        let theme_service = ThemeService::new(store.clone());
        let parental_control_service = ParentalControlService::new(store.clone());

        board_service.ensure_today().await;

        Self {
            config: BackendConfig {
                state_key: state_key.to_string(),
                tick_interval_ms: tick_interval.as_millis() as u64,
                ..BackendConfig::default()
            },
            store,
            board_service,
            timer_service,
            theme_service,
            parental_control_service,
            settings_service,
        }
    }

    /// Stop every running timer. Accumulated seconds are already persisted.
    pub async fn shutdown(&self) {
        info!("Shutting down backend");
        self.timer_service.stop_all().await;
    }
}

async fn open_blob_store(config: &BackendConfig) -> Arc<dyn BlobStore> {
    let opened: anyhow::Result<Arc<dyn BlobStore>> = match config.storage {
        StorageKind::Sqlite => SqliteBlobStore::open(&config.data_directory)
            .await
            .map(|store| Arc::new(store) as Arc<dyn BlobStore>),
        StorageKind::JsonFile => JsonFileStore::new(&config.data_directory)
            .map(|store| Arc::new(store) as Arc<dyn BlobStore>),
    };

    match opened {
        Ok(store) => store,
        Err(e) => {
            warn!(
                "Failed to open {:?} storage in {:?}: {}. Changes will not survive a restart",
                config.storage, config.data_directory, e
            );
            Arc::new(MemoryBlobStore::new())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::commands::parental_control::ValidatePinCommand;
    use crate::domain::ManualClock;
    use chrono::NaiveDate;
    use shared::{Phase, SaveSettingsRequest, TaskCategory, TimerChannel, ToggleTaskRequest};
    use tempfile::TempDir;

    fn make_bed(child_id: &str) -> ToggleTaskRequest {
        ToggleTaskRequest {
            child_id: child_id.to_string(),
            category: TaskCategory::Personal,
            label: "Make bed".to_string(),
        }
    }

    #[tokio::test]
    async fn test_json_file_backend_survives_restart() {
        let temp_dir = TempDir::new().unwrap();
        let mut config = BackendConfig::with_data_directory(temp_dir.path());
        config.storage = StorageKind::JsonFile;

        let backend = Backend::initialize(config.clone()).await;
        backend.board_service.toggle_task(make_bed("oli")).await.unwrap();
        backend.shutdown().await;

        assert!(temp_dir.path().join("chore_board_state_v1.json").exists());

        let reopened = Backend::initialize(config).await;
        assert!(reopened
            .board_service
            .is_task_done("oli", TaskCategory::Personal, "Make bed")
            .await);
    }

    #[tokio::test]
    async fn test_sqlite_backend_survives_restart() {
        let temp_dir = TempDir::new().unwrap();
        let config = BackendConfig::with_data_directory(temp_dir.path());

        {
            let backend = Backend::initialize(config.clone()).await;
            let session = backend
                .parental_control_service
                .validate_pin(ValidatePinCommand {
                    answer: "1234".to_string(),
                })
                .await
                .session
                .unwrap();
            backend
                .settings_service
                .save_settings(
                    &session,
                    SaveSettingsRequest {
                        current_phase: Some(Phase::Phase1),
                        ..Default::default()
                    },
                )
                .await
                .unwrap();
        }

        let reopened = Backend::initialize(config).await;
        assert_eq!(reopened.store.snapshot().await.current_phase, Phase::Phase1);
    }

    #[tokio::test]
    async fn test_unopenable_storage_falls_back_to_memory() {
        let temp_dir = TempDir::new().unwrap();
        let not_a_directory = temp_dir.path().join("plain-file");
        std::fs::write(&not_a_directory, "occupied").unwrap();

        let backend = Backend::initialize(BackendConfig::with_data_directory(&not_a_directory)).await;

        let board = backend.board_service.child_board("bauti").await.unwrap();
        assert_eq!(board.child.name, "Bauti");
        assert!(backend.board_service.toggle_task(make_bed("bauti")).await.is_ok());
    }

    #[tokio::test(start_paused = true)]
    async fn test_services_share_one_state() {
        let clock = ManualClock::on(NaiveDate::from_ymd_opt(2025, 3, 1).unwrap());
        let blobs = MemoryBlobStore::new();
        let backend = Backend::with_store(
            Arc::new(blobs),
            "chore_board_state_v1",
            Duration::from_secs(1),
            Arc::new(clock),
        )
        .await;

        assert!(backend.store.snapshot().await.daily_records.contains_key("2025-03-01"));

        for label in backend.board_service.list_children().await[0].task_lists.personal.clone() {
            backend
                .board_service
                .toggle_task(ToggleTaskRequest {
                    child_id: "bauti".to_string(),
                    category: TaskCategory::Personal,
                    label,
                })
                .await
                .unwrap();
        }
        assert!(backend.timer_service.start("bauti", TimerChannel::Tv).await.unwrap());
        tokio::time::sleep(Duration::from_millis(3500)).await;
        backend.shutdown().await;

        let board = backend.board_service.child_board("bauti").await.unwrap();
        assert_eq!(board.channels[0].seconds, 3);
        assert!(!board.channels[0].running);
    }
}
