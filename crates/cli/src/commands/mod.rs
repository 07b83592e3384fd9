pub mod chat;
pub mod classify;
pub mod doctor;
pub mod init;
pub mod serve;
pub mod tools;

use std::path::{Path, PathBuf};
use tutorflow_config::AppConfig;

/// The config file a command reads: `--config` if given, else the default.
pub fn config_file(path: Option<&Path>) -> PathBuf {
    path.map(Path::to_path_buf)
        .unwrap_or_else(|| AppConfig::config_dir().join("config.toml"))
}

/// Load and validate configuration with environment overrides.
pub fn load_config(path: Option<&Path>) -> Result<AppConfig, Box<dyn std::error::Error>> {
    let path = config_file(path);
    let config = AppConfig::load_at(&path).map_err(|e| format!("Failed to load config: {e}"))?;
    tracing::debug!(path = %path.display(), provider = %config.model.provider, "Configuration loaded");
    Ok(config)
}
