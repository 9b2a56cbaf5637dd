//! # Configuration Modules
//!
//! Engine tuning and the two administrative snapshots the engine consumes:
//! the custom icon table and the filter group configuration. All three are
//! JSON5 files, so plain JSON works as well.

/// Engine tuning with layered defaults.
pub mod engine_config;

pub use engine_config::{
    load_engine_config, load_filter_groups, load_icon_table, ConfigError, EngineConfig,
};
