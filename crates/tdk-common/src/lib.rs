//! TDK Common Library
#![deny(clippy::unwrap_used, clippy::expect_used)]
//!
//! Shared pieces used by every TDK pipeline process:
//!
//! - **Logging**: environment-driven `tracing` subscriber setup
//! - **Types**: the JSON outcome documents exchanged between the stage
//!   services and the orchestrator
//!
//! # Example
//!
//! ```no_run
//! use tdk_common::logging::{init_logging, LogConfig};
//! use tdk_common::types::IngestOutcome;
//!
//! fn main() -> anyhow::Result<()> {
//!     init_logging(&LogConfig::from_env()?)?;
//!     let outcome = IngestOutcome::warning("No data rows found");
//!     tracing::info!(status = %outcome.status, "Ingestion finished");
//!     Ok(())
//! }
//! ```

pub mod logging;
pub mod types;

pub use types::{ExportOutcome, HealthReport, IngestOutcome, OutcomeStatus};
