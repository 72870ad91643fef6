//! Configuration file parsing for qrscan
//!
//! Supports `.qrscan/config.toml` in the working directory, an explicit
//! file passed on the command line, and a per-user file.

pub mod settings;
pub mod types;

pub use settings::{
    init_config_dir, load_settings, load_settings_file, resolve_settings, user_config_path,
};
pub use types::*;
