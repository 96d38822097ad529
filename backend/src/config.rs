//! # Backend Configuration
//!
//! Settings for where and how the board state is persisted, read from an
//! optional `chore_board.yaml` inside the data directory.
//!
//! ```yaml
//! storage: sqlite          # or json_file
//! state_key: chore_board_state_v1
//! tick_interval_ms: 1000
//! ```
//!
//! The default data directory is `~/Documents/Chore Board`. A
//! `.chore_board_redirect` file in that directory containing another path moves
//! the data elsewhere, as long as the target exists.

use anyhow::Result;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::{debug, info, warn};

/// Storage key of the persisted document. The suffix is the schema version;
/// a new schema means a new key.
pub const STATE_KEY: &str = "chore_board_state_v1";
pub const CONFIG_FILE_NAME: &str = "chore_board.yaml";
pub const REDIRECT_FILE_NAME: &str = ".chore_board_redirect";
pub const DEFAULT_DIRECTORY_NAME: &str = "Chore Board";
pub const DEFAULT_TICK_INTERVAL_MS: u64 = 1000;

/// Which blob store backs the state document
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StorageKind {
    #[default]
    Sqlite,
    JsonFile,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct BackendConfig {
    /// Not read from the YAML file; always the directory the file lives in
    #[serde(skip)]
    pub data_directory: PathBuf,
    pub storage: StorageKind,
    pub state_key: String,
    pub tick_interval_ms: u64,
}

impl Default for BackendConfig {
    fn default() -> Self {
        Self {
            data_directory: PathBuf::from("."),
            storage: StorageKind::default(),
            state_key: STATE_KEY.to_string(),
            tick_interval_ms: DEFAULT_TICK_INTERVAL_MS,
        }
    }
}

impl BackendConfig {
    /// Defaults rooted at a specific directory, ignoring any config file
    pub fn with_data_directory<P: AsRef<Path>>(data_directory: P) -> Self {
        Self {
            data_directory: data_directory.as_ref().to_path_buf(),
            ..Self::default()
        }
    }

    /// Load the config file from a data directory.
    ///
    /// A missing or unreadable file yields the defaults.
    pub fn load<P: AsRef<Path>>(data_directory: P) -> Self {
        let data_directory = data_directory.as_ref().to_path_buf();
        let config_path = data_directory.join(CONFIG_FILE_NAME);

        let mut config = if config_path.exists() {
            match fs::read_to_string(&config_path)
                .map_err(anyhow::Error::from)
                .and_then(|yaml| serde_yaml::from_str::<BackendConfig>(&yaml).map_err(anyhow::Error::from))
            {
                Ok(config) => {
                    debug!("Loaded backend config from {:?}", config_path);
                    config
                }
                Err(e) => {
                    warn!("Ignoring unreadable config {:?}: {}", config_path, e);
                    BackendConfig::default()
                }
            }
        } else {
            debug!("No config file at {:?}, using defaults", config_path);
            BackendConfig::default()
        };

        config.data_directory = data_directory;
        if config.state_key.trim().is_empty() {
            config.state_key = STATE_KEY.to_string();
        }
        config
    }

    /// Load from the default data directory, following a redirect file
    pub fn load_default() -> Self {
        Self::load(default_data_directory())
    }

    /// Write the config file using the temp-file-then-rename pattern
    pub fn save(&self) -> Result<()> {
        if !self.data_directory.exists() {
            fs::create_dir_all(&self.data_directory)?;
            info!("Created data directory: {:?}", self.data_directory);
        }

        let config_path = self.data_directory.join(CONFIG_FILE_NAME);
        let yaml_content = serde_yaml::to_string(self)?;

        let temp_path = config_path.with_extension("tmp");
        fs::write(&temp_path, yaml_content)?;
        fs::rename(&temp_path, &config_path)?;

        debug!("Saved backend config to {:?}", config_path);
        Ok(())
    }

    pub fn tick_interval(&self) -> Duration {
        Duration::from_millis(self.tick_interval_ms.max(1))
    }
}

/// `~/Documents/Chore Board`, or wherever its redirect file points
pub fn default_data_directory() -> PathBuf {
    let base = dirs::document_dir()
        .or_else(dirs::home_dir)
        .unwrap_or_else(|| PathBuf::from("."));
    resolve_redirect(base.join(DEFAULT_DIRECTORY_NAME))
}

/// Follow a `.chore_board_redirect` file if one exists and points at an
/// existing directory
pub fn resolve_redirect(directory: PathBuf) -> PathBuf {
    let redirect_file = directory.join(REDIRECT_FILE_NAME);
    if !redirect_file.exists() {
        return directory;
    }

    match fs::read_to_string(&redirect_file) {
        Ok(redirected) => {
            let path = PathBuf::from(redirected.trim());
            if path.is_dir() {
                info!("Found redirect file, using data directory: {}", path.display());
                path
            } else {
                warn!(
                    "Redirect file points to non-existent directory: {}. Using default.",
                    path.display()
                );
                directory
            }
        }
        Err(e) => {
            warn!("Failed to read redirect file: {}. Using default directory.", e);
            directory
        }
    }
}
