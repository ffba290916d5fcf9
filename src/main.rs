use anyhow::{Context, Result};
use clap::Parser;
use std::{fmt::Debug, path::PathBuf};
use tracing::{error, info, level_filters::LevelFilter};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use request_tasks::config::{AppConfig, CliConfig, FileConfig};
use request_tasks::server::{self, report_task_failure, run_server, RequestsLoggingLevel};
use request_tasks::tasks::{DeferredTasksPolicy, TasksLifespan};

fn parse_path(s: &str) -> Result<PathBuf> {
    let path_buf = PathBuf::from(s);
    let original_path = match path_buf.canonicalize() {
        Ok(path) => path,
        Err(msg) => {
            if msg.kind() == std::io::ErrorKind::NotFound {
                path_buf
            } else {
                return Err(msg).with_context(|| format!("Error resolving path: {}", s));
            }
        }
    };
    if original_path.is_absolute() {
        return Ok(original_path);
    }
    let cwd = std::env::current_dir()?;
    Ok(cwd.join(original_path))
}

#[derive(Parser, Debug)]
struct CliArgs {
    /// Path to a TOML config file. Its values override the command line.
    #[clap(long, value_parser = parse_path)]
    pub config: Option<PathBuf>,

    /// The port to listen on.
    #[clap(short, long, default_value_t = 3001)]
    pub port: u16,

    /// The level of logging to perform on each request.
    #[clap(long, default_value = "path")]
    pub logging_level: RequestsLoggingLevel,

    /// Name given to tasks that are not named where they are scheduled.
    #[clap(long)]
    pub default_task_name: Option<String>,

    /// Shield tasks from cancellation at shutdown unless they opt out.
    #[clap(long)]
    pub shield_tasks: Option<bool>,

    /// What happens to deferred tasks of requests answered with a 5xx.
    #[clap(long, default_value = "release")]
    pub on_handler_error: DeferredTasksPolicy,
}

impl CliArgs {
    fn to_cli_config(&self) -> CliConfig {
        CliConfig {
            port: self.port,
            logging_level: self.logging_level,
            default_task_name: self.default_task_name.clone(),
            shield_tasks: self.shield_tasks,
            on_handler_error: self.on_handler_error,
        }
    }
}

async fn shutdown_signal() {
    match tokio::signal::ctrl_c().await {
        Ok(()) => info!("Received Ctrl+C, shutting down..."),
        Err(e) => error!("Failed to listen for Ctrl+C: {}", e),
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli_args = CliArgs::parse();

    tracing_subscriber::registry()
        .with(tracing_subscriber::fmt::layer())
        .with(
            EnvFilter::builder()
                .with_default_directive(LevelFilter::INFO.into())
                .with_env_var("LOG_LEVEL")
                .from_env_lossy(),
        )
        .try_init()?;

    let file_config = match &cli_args.config {
        Some(path) => {
            info!("Loading config file {:?}...", path);
            Some(FileConfig::load(path)?)
        }
        None => None,
    };
    let app_config = AppConfig::resolve(&cli_args.to_cli_config(), file_config)?;

    info!("Initializing metrics...");
    server::metrics::init_metrics();

    let task_config = app_config
        .task_config()
        .with_on_error(report_task_failure());
    let lifespan = TasksLifespan::new(task_config)
        .with_deferred_policy(app_config.tasks.on_handler_error);
    lifespan.start()?;

    let server_config = server::ServerConfig {
        requests_logging_level: app_config.logging_level,
        port: app_config.port,
    };

    info!("Ready to serve at port {}!", app_config.port);
    let served = run_server(server_config, lifespan.clone(), shutdown_signal()).await;

    info!("Waiting for background tasks...");
    lifespan.shutdown().await;

    served
}
