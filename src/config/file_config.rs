use anyhow::{Context, Result};
use serde::Deserialize;
use std::path::Path;

#[derive(Debug, Deserialize, Default)]
#[serde(default)]
pub struct FileConfig {
    // Core settings (can override CLI)
    pub port: Option<u16>,
    pub logging_level: Option<String>,

    pub tasks: Option<TasksFileConfig>,
}

/// `[tasks]` section: process-wide defaults for every scheduled task.
#[derive(Debug, Deserialize, Default, Clone)]
#[serde(default)]
pub struct TasksFileConfig {
    pub name: Option<String>,
    pub shield: Option<bool>,
    /// "release" or "discard_on_server_error"
    pub on_handler_error: Option<String>,
}

impl FileConfig {
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {:?}", path))?;
        toml::from_str(&content).with_context(|| format!("Failed to parse config file: {:?}", path))
    }
}
