//! TDK Data Pipeline Library
//!
//! Moves a pipe-delimited file into a database table and exports that table
//! to a dated tab-separated file, on a nightly schedule or on demand.
//!
//! # Overview
//!
//! - **Pipeline**: DSV parsing, column sanitization, table provisioning,
//!   full-table reload and TSV export ([`pipeline`])
//! - **API**: `/health`, `/ingest` and `/export` endpoints per service role ([`api`])
//! - **Scheduler**: health-gated orchestrator that runs ingestion before
//!   export every night ([`scheduler`])
//! - **Configuration**: environment-driven settings ([`config`])
//!
//! # Framework Stack
//!
//! - **Axum** for the HTTP endpoints
//! - **SQLx** for PostgreSQL access
//! - **Reqwest** for the orchestrator's calls to the stage services
//!
//! # Example
//!
//! ```no_run
//! use std::sync::Arc;
//! use tdk_server::{config::Config, db::ConnectionFactory, pipeline::PipelineService};
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let config = Config::load()?;
//!     let connector = Arc::new(ConnectionFactory::new(&config.database)?);
//!     let service = PipelineService::new(connector, config.pipeline.clone());
//!
//!     let outcome = service.ingest().await;
//!     println!("{}", serde_json::to_string(&outcome)?);
//!     Ok(())
//! }
//! ```

pub mod api;
pub mod config;
pub mod db;
pub mod error;
pub mod pipeline;
pub mod scheduler;

pub use config::Config;
pub use error::{PipelineError, PipelineResult};
