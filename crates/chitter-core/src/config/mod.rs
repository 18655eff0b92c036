//! Configuration loading and management
//!
//! # Hierarchy
//!
//! Configuration is loaded in this order (later overrides earlier):
//! 1. Built-in defaults
//! 2. Global config: ~/.config/chitter/config.toml
//! 3. State directory config: <state_dir>/config.toml
//! 4. Environment variables: CHITTER_*
//! 5. CLI flags (command-specific)
//!
//! # Example Config
//!
//! ```toml
//! mode = "turns"
//! max_concurrent = 2
//! retention_hours = 24
//! max_decisions = 15
//! acknowledgement_marker = "CHITTER_COORDINATION"
//! ```

mod load;
mod types;

pub use load::{
    default_state_dir, global_config_path, load_config, load_toml_file, STATE_DIR_ENV,
};
pub use types::{Config, ConfigFile, CoordinationMode, DEFAULT_MARKER};
