//! TDK Data Pipeline - Main entry point

use anyhow::Result;
use clap::{Parser, Subcommand};
use std::process::ExitCode;
use std::sync::Arc;
use tdk_common::logging::{init_logging, LogConfig};
use tdk_common::types::OutcomeStatus;
use tracing::info;

use tdk_server::{
    api::{self, AppState, ServiceRole},
    config::Config,
    db::ConnectionFactory,
    pipeline::PipelineService,
    scheduler::{CronScheduler, PipelineOrchestrator},
};

#[derive(Parser, Debug)]
#[command(name = "tdk-server")]
#[command(author, version, about = "DSV ingestion and TSV export pipeline")]
struct Cli {
    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Run the HTTP service (default)
    Serve {
        /// Which stage endpoints to expose
        #[arg(long, value_enum, env = "TDK_ROLE", default_value = "unified")]
        role: ServiceRole,
    },

    /// Run the standalone orchestrator until Ctrl+C
    Scheduler,

    /// Run one ingestion and print the outcome
    Ingest,

    /// Run one export and print the outcome
    Export,
}

#[tokio::main]
async fn main() -> Result<ExitCode> {
    let cli = Cli::parse();

    let log_config = LogConfig::default()
        .with_prefix("tdk-server")
        .with_filter("tdk_server=debug,tower_http=debug,sqlx=warn");
    init_logging(&LogConfig::from_env_with(log_config)?)?;

    let config = Config::load()?;

    match cli.command.unwrap_or(Command::Serve {
        role: ServiceRole::Unified,
    }) {
        Command::Serve { role } => {
            run_server(config, role).await?;
            Ok(ExitCode::SUCCESS)
        },
        Command::Scheduler => {
            run_scheduler(config).await?;
            Ok(ExitCode::SUCCESS)
        },
        Command::Ingest => {
            let outcome = pipeline_service(&config)?.ingest().await;
            println!("{}", serde_json::to_string_pretty(&outcome)?);
            Ok(exit_code(outcome.status))
        },
        Command::Export => {
            let outcome = pipeline_service(&config)?.export().await;
            println!("{}", serde_json::to_string_pretty(&outcome)?);
            Ok(exit_code(outcome.status))
        },
    }
}

fn exit_code(status: OutcomeStatus) -> ExitCode {
    if status.is_ok() {
        ExitCode::SUCCESS
    } else {
        ExitCode::FAILURE
    }
}

fn pipeline_service(config: &Config) -> Result<PipelineService> {
    let connector = Arc::new(ConnectionFactory::new(&config.database)?);
    info!(database = %connector.target(), table = %config.pipeline.table_name, "Pipeline configured");
    Ok(PipelineService::new(connector, config.pipeline.clone()))
}

async fn run_server(config: Config, role: ServiceRole) -> Result<()> {
    info!("Starting {} service", role.service_name());

    let state = AppState {
        service: Arc::new(pipeline_service(&config)?),
        role,
    };

    // The unified process orchestrates itself through its own endpoints
    let scheduler = Arc::new(CronScheduler::new());
    if role == ServiceRole::Unified {
        let orchestrator = Arc::new(PipelineOrchestrator::new(config.scheduler.clone())?);
        let scheduler = Arc::clone(&scheduler);
        tokio::spawn(async move {
            orchestrator.start(&scheduler).await;
        });
    }

    api::serve(&config.server, state).await?;

    scheduler.shutdown();
    Ok(())
}

async fn run_scheduler(config: Config) -> Result<()> {
    info!("Scheduler service starting...");

    let orchestrator = Arc::new(PipelineOrchestrator::new(config.scheduler.clone())?);
    let scheduler = CronScheduler::new();

    tokio::select! {
        _ = Arc::clone(&orchestrator).start(&scheduler) => {
            info!("Scheduler is running. Press Ctrl+C to exit.");
            api::shutdown_signal(0).await;
        },
        _ = api::shutdown_signal(0) => {},
    }

    info!("Scheduler shutting down...");
    scheduler.shutdown();
    Ok(())
}
