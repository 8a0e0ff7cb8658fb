//! Nightly orchestration
//!
//! The orchestrator talks to the ingestion and export services over HTTP
//! only, so it runs the same way next to split services or inside the
//! unified process.
//!
//! # Startup
//! 1. Wait for both services' `/health` (bounded retries, never fatal)
//! 2. Run the pipeline once if `RUN_ON_STARTUP` is set
//! 3. Register the `nightly_pipeline` job at `SCHEDULER_HOUR:SCHEDULER_MINUTE`

pub mod client;
pub mod health;
pub mod jobs;
pub mod orchestrator;
pub mod schedule;

pub use client::StageClient;
pub use jobs::{CronScheduler, Trigger};
pub use orchestrator::{PipelineOrchestrator, RunReport};
pub use schedule::DailySchedule;
