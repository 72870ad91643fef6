//! Settings loading and config directory setup

use std::path::{Path, PathBuf};

use qrscan_core::prelude::*;

use super::types::ScanSettings;

const QRSCAN_DIR: &str = ".qrscan";
const CONFIG_FILENAME: &str = "config.toml";

/// Load settings from `.qrscan/config.toml` under `project_path`.
///
/// Returns defaults if the file doesn't exist or can't be parsed.
pub fn load_settings(project_path: &Path) -> ScanSettings {
    load_settings_file(&project_path.join(QRSCAN_DIR).join(CONFIG_FILENAME))
}

/// Load settings from an explicit file, defaults on any failure
pub fn load_settings_file(config_path: &Path) -> ScanSettings {
    if !config_path.exists() {
        debug!("No config file at {:?}, using defaults", config_path);
        return ScanSettings::default();
    }

    match std::fs::read_to_string(config_path) {
        Ok(content) => match toml::from_str(&content) {
            Ok(settings) => {
                debug!("Loaded settings from {:?}", config_path);
                settings
            }
            Err(e) => {
                warn!("Failed to parse {:?}: {}", config_path, e);
                ScanSettings::default()
            }
        },
        Err(e) => {
            warn!("Failed to read {:?}: {}", config_path, e);
            ScanSettings::default()
        }
    }
}

/// Per-user config file, `~/.config/qrscan/config.toml` on Linux
pub fn user_config_path() -> Option<PathBuf> {
    dirs::config_dir().map(|dir| dir.join("qrscan").join(CONFIG_FILENAME))
}

/// Settings for a run: the explicit file if given, else the project file,
/// else the per-user file, else defaults.
pub fn resolve_settings(explicit: Option<&Path>, project_path: &Path) -> ScanSettings {
    if let Some(path) = explicit {
        return load_settings_file(path);
    }

    let project_file = project_path.join(QRSCAN_DIR).join(CONFIG_FILENAME);
    if project_file.exists() {
        return load_settings_file(&project_file);
    }

    match user_config_path() {
        Some(user_file) => load_settings_file(&user_file),
        None => ScanSettings::default(),
    }
}

/// Create a default config file in `.qrscan/`
pub fn init_config_dir(project_path: &Path) -> Result<PathBuf> {
    let qrscan_dir = project_path.join(QRSCAN_DIR);

    if !qrscan_dir.exists() {
        std::fs::create_dir_all(&qrscan_dir)
            .map_err(|e| Error::config(format!("Failed to create .qrscan dir: {}", e)))?;
    }

    let config_path = qrscan_dir.join(CONFIG_FILENAME);
    if !config_path.exists() {
        let default_content = r#"# qrscan configuration

[camera]
default_facing = "back"      # "back" or "front"

[permission]
request_code_base = 513469796  # view id is added per view

[scan_area]
margin_fraction = 0.1        # margin used when no scan area is set

[gallery]
max_height = 500             # taller images are downsampled

[decoder]
backend = "qr"
invert_scan = false          # also try light-on-dark codes
"#;
        std::fs::write(&config_path, default_content)
            .map_err(|e| Error::config(format!("Failed to write config.toml: {}", e)))?;
        info!("Created default config at {:?}", config_path);
    }

    Ok(config_path)
}
