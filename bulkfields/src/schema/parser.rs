use crate::error::Result;
use super::types::Settings;
use std::path::Path;

/// Load settings from a settings.yaml file. A missing file yields the defaults.
pub fn load_settings(path: &Path) -> Result<Settings> {
    if !path.exists() {
        log::debug!("No settings at {}, using defaults", path.display());
        return Ok(Settings::default());
    }
    let content = std::fs::read_to_string(path)?;
    parse_settings_str(&content)
}

/// Parse a settings YAML string into normalized Settings
pub fn parse_settings_str(content: &str) -> Result<Settings> {
    if content.trim().is_empty() {
        return Ok(Settings::default());
    }
    let settings: Settings = serde_yaml::from_str(content)?;
    Ok(settings)
}

/// Write settings back to disk in their raw persisted shape.
pub fn save_settings(path: &Path, settings: &Settings) -> Result<()> {
    let yaml = serde_yaml::to_string(settings)?;
    std::fs::write(path, yaml)?;
    Ok(())
}
