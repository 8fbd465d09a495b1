pub mod agent_engine;
pub mod apps;
pub mod cli;
pub mod commands;
pub mod config;
pub mod device;
pub mod errors;
pub mod executor;
pub mod llm;
pub mod perception;

#[cfg(test)]
mod testing;

use std::process::ExitCode;

use crate::agent_engine::RunStatus;
use crate::cli::Cli;
use crate::commands::{Console, Session};
use crate::config::AppConfig;
use crate::errors::DroidClawResult;

/// Entry point behind the binary. Returns the process exit code: failure
/// when a one-shot task does not complete.
pub async fn run(cli: Cli) -> DroidClawResult<ExitCode> {
    // Logs go to stderr; stdout belongs to the console.
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("droidclaw=info")),
        )
        .init();

    // Load .env file if present (ignore error if not found)
    let _ = dotenvy::dotenv();

    let mut cfg = match &cli.config {
        Some(path) => config::load_config_from(path)?,
        None => config::load_config().unwrap_or_else(|e| {
            tracing::warn!(error = %e, "no usable config.toml, using built-in defaults");
            AppConfig::default()
        }),
    };
    cli.apply(&mut cfg);
    cli.validate(&cfg)?;

    if cli.setup_tcpip {
        commands::setup_tcpip(&cfg).await?;
        return Ok(ExitCode::SUCCESS);
    }

    let mut session = Session::connect(&cfg).await?;
    let mut console = Console::stdin();

    let outcome = match &cli.task {
        Some(task) => session.run_task(task, &mut console).await.map(|report| {
            match report {
                Some(r) if r.status == RunStatus::Completed => ExitCode::SUCCESS,
                _ => ExitCode::FAILURE,
            }
        }),
        None => session.interactive(&mut console).await.map(|_| ExitCode::SUCCESS),
    };

    session.disconnect().await;
    outcome
}
