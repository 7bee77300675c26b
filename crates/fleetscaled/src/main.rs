//! fleetscaled — the fleetscale daemon.
//!
//! Assembles settings, task definitions, the scheduler backend and the
//! allocation engine into one control loop.
//!
//! # Usage
//!
//! ```text
//! FLEETSCALE_SCHEDULER=TOY FLEETSCALE_DEMAND_MODEL=RNG fleetscaled run --tasks tasks.toml
//! fleetscaled check --tasks tasks.toml
//! ```

mod control;
mod setup;

use std::path::PathBuf;

use anyhow::Context;
use clap::{Parser, Subcommand};
use serde::Serialize;
use tokio::sync::watch;
use tracing::info;

use fleetscale_core::Settings;
use fleetscale_demand::TaskConfig;

use crate::control::ControlLoop;

#[derive(Parser)]
#[command(name = "fleetscaled", about = "fleetscale autoscaling daemon")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Run the control loop until Ctrl-C.
    Run {
        /// TOML task file. Tasks are fetched from the API when omitted.
        #[arg(long, env = "FLEETSCALE_TASKS")]
        tasks: Option<PathBuf>,

        /// Stop after this many cycles.
        #[arg(long)]
        cycles: Option<u64>,
    },
    /// Validate settings and task definitions, then print them.
    Check {
        /// TOML task file. Tasks are fetched from the API when omitted.
        #[arg(long, env = "FLEETSCALE_TASKS")]
        tasks: Option<PathBuf>,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
                tracing_subscriber::EnvFilter::new("info,fleetscaled=debug,fleetscale_engine=debug")
            }),
        )
        .init();

    let cli = Cli::parse();
    let settings = Settings::from_env().context("reading settings")?;

    match cli.command {
        Command::Run { tasks, cycles } => run(settings, tasks, cycles).await,
        Command::Check { tasks } => check(settings, tasks).await,
    }
}

async fn run(settings: Settings, tasks_file: Option<PathBuf>, cycles: Option<u64>) -> anyhow::Result<()> {
    info!(
        scheduler = %settings.scheduler,
        demand_model = %settings.demand_model,
        user = %settings.user_id,
        max_containers = settings.max_containers,
        "fleetscale starting"
    );

    let api = setup::api_client(&settings)?;
    let configs = setup::task_configs(tasks_file.as_deref(), &api).await?;
    let tasks = setup::build_tasks(&settings, &configs, &api)?;
    let scheduler = fleetscale_scheduler::from_settings(&settings).context("building scheduler")?;

    let mut control = ControlLoop::new(tasks, scheduler, settings.demand_interval);
    if settings.send_metrics {
        control = control.with_reporter(api, settings.report_every);
    }
    control.start().await?;

    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            info!("shutdown signal received");
            let _ = shutdown_tx.send(true);
        }
    });

    control.run(cycles, shutdown_rx).await;
    control.cleanup().await;

    info!(cycles = control.cycles(), "fleetscale stopped");
    Ok(())
}

#[derive(Serialize)]
struct CheckReport<'a> {
    settings: &'a Settings,
    tasks: &'a [TaskConfig],
}

async fn check(settings: Settings, tasks_file: Option<PathBuf>) -> anyhow::Result<()> {
    let api = setup::api_client(&settings)?;
    let configs = setup::task_configs(tasks_file.as_deref(), &api).await?;
    setup::build_tasks(&settings, &configs, &api)?;
    fleetscale_scheduler::from_settings(&settings).context("building scheduler")?;

    let report = CheckReport {
        settings: &settings,
        tasks: &configs,
    };
    println!("{}", serde_json::to_string_pretty(&report)?);
    Ok(())
}
