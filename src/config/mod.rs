mod file_config;

pub use file_config::{FileConfig, TasksFileConfig};

use crate::server::RequestsLoggingLevel;
use crate::tasks::{DeferredTasksPolicy, TaskConfig};
use anyhow::{anyhow, Result};
use clap::ValueEnum;

/// CLI arguments that can be used for config resolution.
/// This struct mirrors the CLI arguments that can be overridden by TOML config.
#[derive(Debug, Clone)]
pub struct CliConfig {
    pub port: u16,
    pub logging_level: RequestsLoggingLevel,
    pub default_task_name: Option<String>,
    pub shield_tasks: Option<bool>,
    pub on_handler_error: DeferredTasksPolicy,
}

impl Default for CliConfig {
    fn default() -> Self {
        Self {
            port: 3001,
            logging_level: RequestsLoggingLevel::Path,
            default_task_name: None,
            shield_tasks: None,
            on_handler_error: DeferredTasksPolicy::Release,
        }
    }
}

#[derive(Debug, Clone)]
pub struct AppConfig {
    pub port: u16,
    pub logging_level: RequestsLoggingLevel,
    pub tasks: TasksSettings,
}

/// Process-wide task defaults after resolution.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TasksSettings {
    pub name: Option<String>,
    pub shield: Option<bool>,
    pub on_handler_error: DeferredTasksPolicy,
}

impl AppConfig {
    /// Resolve configuration from CLI arguments and optional TOML file config.
    /// TOML values override CLI values where present.
    pub fn resolve(cli: &CliConfig, file_config: Option<FileConfig>) -> Result<Self> {
        let file = file_config.unwrap_or_default();

        let port = file.port.unwrap_or(cli.port);

        let logging_level = match file.logging_level {
            Some(s) => parse_logging_level(&s)
                .ok_or_else(|| anyhow!("Invalid logging_level in config file: {}", s))?,
            None => cli.logging_level,
        };

        let tasks_file = file.tasks.unwrap_or_default();
        let on_handler_error = match tasks_file.on_handler_error {
            Some(s) => parse_deferred_policy(&s)
                .ok_or_else(|| anyhow!("Invalid tasks.on_handler_error in config file: {}", s))?,
            None => cli.on_handler_error,
        };
        let tasks = TasksSettings {
            name: tasks_file.name.or_else(|| cli.default_task_name.clone()),
            shield: tasks_file.shield.or(cli.shield_tasks),
            on_handler_error,
        };

        Ok(Self {
            port,
            logging_level,
            tasks,
        })
    }

    /// The process-wide default config every request scheduler starts from.
    ///
    /// `on_error` is not configurable from files; callers install it in code.
    pub fn task_config(&self) -> TaskConfig {
        TaskConfig {
            name: self.tasks.name.clone(),
            shield: self.tasks.shield,
            on_error: None,
        }
    }
}

/// Parses a logging level string into RequestsLoggingLevel.
/// Uses clap's ValueEnum trait for parsing.
fn parse_logging_level(s: &str) -> Option<RequestsLoggingLevel> {
    RequestsLoggingLevel::from_str(s, true).ok()
}

fn parse_deferred_policy(s: &str) -> Option<DeferredTasksPolicy> {
    DeferredTasksPolicy::from_str(&s.replace('_', "-"), true).ok()
}
