//! Configuration loading and root folder resolution

use crate::{Error, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Root data folder resolution priority order:
/// 1. Command-line argument (highest priority)
/// 2. Environment variable (VITALWATCH_ROOT_FOLDER)
/// 3. TOML config file (~/.config/vitalwatch/config.toml)
/// 4. OS-dependent compiled default (fallback)
pub fn resolve_root_folder(cli_arg: Option<&str>) -> PathBuf {
    // Priority 1: Command-line argument
    if let Some(path) = cli_arg {
        return PathBuf::from(path);
    }

    // Priority 2: Environment variable
    if let Ok(path) = std::env::var("VITALWATCH_ROOT_FOLDER") {
        if !path.trim().is_empty() {
            return PathBuf::from(path);
        }
    }

    // Priority 3: TOML config file
    if let Ok(config_path) = locate_config_file() {
        if let Ok(toml_content) = std::fs::read_to_string(&config_path) {
            if let Ok(config) = toml::from_str::<toml::Value>(&toml_content) {
                if let Some(root_folder) = config.get("root_folder").and_then(|v| v.as_str()) {
                    return PathBuf::from(root_folder);
                }
            }
        }
    }

    // Priority 4: OS-dependent compiled default
    default_root_folder()
}

/// Get default configuration file path for the platform
fn locate_config_file() -> Result<PathBuf> {
    let user_config = dirs::config_dir().map(|d| d.join("vitalwatch").join("config.toml"));

    if let Some(path) = user_config {
        if path.exists() {
            return Ok(path);
        }
    }

    if cfg!(target_os = "linux") {
        let system_config = PathBuf::from("/etc/vitalwatch/config.toml");
        if system_config.exists() {
            return Ok(system_config);
        }
    }

    Err(Error::Config("No config file found".to_string()))
}

/// Get OS-dependent default root folder path
fn default_root_folder() -> PathBuf {
    dirs::data_local_dir()
        .map(|d| d.join("vitalwatch"))
        .unwrap_or_else(|| PathBuf::from("./vitalwatch_data"))
}

/// Create the root folder directory if it does not exist yet
pub fn ensure_root_folder(root: &Path) -> Result<()> {
    if !root.exists() {
        std::fs::create_dir_all(root)?;
        tracing::info!("Created root folder: {}", root.display());
    }
    Ok(())
}

/// Path of the shared SQLite database inside the root folder
pub fn database_path(root: &Path) -> PathBuf {
    root.join("vitalwatch.db")
}

/// Path of the service TOML config inside the root folder
pub fn service_config_path(root: &Path) -> PathBuf {
    root.join("vitalwatch.toml")
}

/// Service settings carried by the root-folder TOML file
///
/// All fields are optional; missing values fall back to compiled defaults or
/// environment variables (resolution order is decided by the consumer).
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TomlConfig {
    pub root_folder: Option<String>,
    /// Base URL of the external analysis service
    pub analysis_base_url: Option<String>,
    /// API key for the external analysis service
    pub analysis_api_key: Option<String>,
    /// HTTP bind port
    pub port: Option<u16>,
}

/// Load the service TOML config, returning defaults when the file is absent
pub fn load_toml_config(path: &Path) -> Result<TomlConfig> {
    if !path.exists() {
        return Ok(TomlConfig::default());
    }

    let content = std::fs::read_to_string(path)
        .map_err(|e| Error::Config(format!("Read TOML failed: {}", e)))?;
    toml::from_str(&content).map_err(|e| Error::Config(format!("Parse TOML failed: {}", e)))
}

/// Write the service TOML config (best-effort, used for settings write-back)
pub fn write_toml_config(config: &TomlConfig, path: &Path) -> Result<()> {
    let content = toml::to_string_pretty(config)
        .map_err(|e| Error::Config(format!("Serialize TOML failed: {}", e)))?;
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    std::fs::write(path, content)?;
    Ok(())
}
