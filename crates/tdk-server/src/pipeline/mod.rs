//! Ingestion and export pipeline
//!
//! ```text
//! DSV file -> parser -> sanitize -> provisioner -> loader -> Target Table
//! Target Table -> exporter -> {YYYYMMDD}_testOutput.txt
//! ```
//!
//! [`service::PipelineService`] drives the stages and reports outcomes; the
//! other modules are usable on their own.

pub mod exporter;
pub mod loader;
pub mod parser;
pub mod provisioner;
pub mod sanitize;
pub mod service;

pub use parser::{DsvParser, ParsedDsv};
pub use service::PipelineService;
