use std::fs;
use std::path::{Path, PathBuf};

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::core::alerts::AlertColors;
use crate::core::classify::DEFAULT_STATIONARY_KNOTS;
use crate::core::dispatcher::DispatcherConfig;
use crate::core::event_loop::DEFAULT_STREAM_BUFFER;
use crate::core::filter::FilterGroup;
use crate::core::history::DEFAULT_HISTORY_BASE_Z;
use crate::core::icons::CustomIconTable;
use crate::core::styles::DEFAULT_MAX_RESOLUTION;

/// Icon fetches slower than this fall back to the builtin icon.
pub const DEFAULT_ICON_FETCH_TIMEOUT_MS: u64 = 5_000;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to parse {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: json5::Error,
    },
}

/// # Engine Configuration
///
/// Every field is optional so a file only has to name what it changes.
/// Layers are combined with [`EngineConfig::merge`]: defaults first, then the
/// file, then whatever the binary takes from its command line.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EngineConfig {
    pub max_resolution: Option<f64>,
    pub base_scale: Option<f64>,
    pub history_base_z: Option<i32>,
    pub omnicom_stationary_knots: Option<f64>,
    pub alert_colors: Option<AlertColors>,
    pub icon_fetch_timeout_ms: Option<u64>,
    pub stream_buffer: Option<usize>,
    pub initial_resolution: Option<f64>,
}

impl EngineConfig {
    pub fn defaults() -> Self {
        let dispatcher = DispatcherConfig::default();
        Self {
            max_resolution: Some(DEFAULT_MAX_RESOLUTION),
            base_scale: Some(1.0),
            history_base_z: Some(DEFAULT_HISTORY_BASE_Z),
            omnicom_stationary_knots: Some(DEFAULT_STATIONARY_KNOTS),
            alert_colors: Some(AlertColors::default()),
            icon_fetch_timeout_ms: Some(DEFAULT_ICON_FETCH_TIMEOUT_MS),
            stream_buffer: Some(DEFAULT_STREAM_BUFFER),
            initial_resolution: Some(dispatcher.initial_resolution),
        }
    }

    /// `other` overrides `self` wherever it has a value.
    pub fn merge(self, other: EngineConfig) -> EngineConfig {
        EngineConfig {
            max_resolution: other.max_resolution.or(self.max_resolution),
            base_scale: other.base_scale.or(self.base_scale),
            history_base_z: other.history_base_z.or(self.history_base_z),
            omnicom_stationary_knots: other
                .omnicom_stationary_knots
                .or(self.omnicom_stationary_knots),
            alert_colors: other.alert_colors.or(self.alert_colors),
            icon_fetch_timeout_ms: other.icon_fetch_timeout_ms.or(self.icon_fetch_timeout_ms),
            stream_buffer: other.stream_buffer.or(self.stream_buffer),
            initial_resolution: other.initial_resolution.or(self.initial_resolution),
        }
    }

    pub fn dispatcher_config(&self) -> DispatcherConfig {
        let defaults = DispatcherConfig::default();
        DispatcherConfig {
            max_resolution: self.max_resolution.unwrap_or(defaults.max_resolution),
            base_scale: self.base_scale.unwrap_or(defaults.base_scale),
            initial_resolution: self.initial_resolution.unwrap_or(defaults.initial_resolution),
            history_base_z: self.history_base_z.unwrap_or(defaults.history_base_z),
            stationary_knots: self
                .omnicom_stationary_knots
                .unwrap_or(defaults.stationary_knots),
            alert_colors: self.alert_colors.clone().unwrap_or(defaults.alert_colors),
        }
    }

    pub fn icon_fetch_timeout(&self) -> std::time::Duration {
        std::time::Duration::from_millis(
            self.icon_fetch_timeout_ms
                .unwrap_or(DEFAULT_ICON_FETCH_TIMEOUT_MS),
        )
    }

    pub fn stream_buffer(&self) -> usize {
        self.stream_buffer.unwrap_or(DEFAULT_STREAM_BUFFER)
    }
}

fn read_json5<T: DeserializeOwned>(path: &Path) -> Result<T, ConfigError> {
    let text = fs::read_to_string(path).map_err(|source| ConfigError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    json5::from_str(&text).map_err(|source| ConfigError::Parse {
        path: path.to_path_buf(),
        source,
    })
}

/// Defaults merged with the file at `path`, when one is given.
pub fn load_engine_config(path: Option<&Path>) -> Result<EngineConfig, ConfigError> {
    let config = EngineConfig::defaults();
    match path {
        Some(path) => {
            let file: EngineConfig = read_json5(path)?;
            log::info!("Engine configuration loaded from {}", path.display());
            Ok(config.merge(file))
        }
        None => {
            log::info!("No engine configuration file given, using defaults");
            Ok(config)
        }
    }
}

/// Reads a custom icon table snapshot: an array of entries.
pub fn load_icon_table(path: &Path) -> Result<CustomIconTable, ConfigError> {
    let table: CustomIconTable = read_json5(path)?;
    log::info!(
        "Loaded {} custom icon entries from {}",
        table.entries().len(),
        path.display()
    );
    Ok(table)
}

/// Reads a filter configuration snapshot: an array of groups.
pub fn load_filter_groups(path: &Path) -> Result<Vec<FilterGroup>, ConfigError> {
    let groups: Vec<FilterGroup> = read_json5(path)?;
    log::info!("Loaded {} filter groups from {}", groups.len(), path.display());
    Ok(groups)
}
