//! Stage facade
//!
//! Sequences the pipeline stages for one ingestion or export run and turns
//! every failure into an outcome document. Each run opens its own database
//! connection and closes it before returning, whatever the result.

use chrono::Local;
use std::sync::Arc;
use tdk_common::types::{ExportOutcome, IngestOutcome};
use tracing::{error, info, warn};

use super::exporter::{fetch_table, write_output};
use super::loader::replace_contents;
use super::parser::DsvParser;
use super::sanitize::sanitize_columns;
use crate::config::PipelineSettings;
use crate::db::{close, ConnectionFactory};
use crate::error::PipelineResult;

/// Runs ingestion and export against one Target Table
#[derive(Debug)]
pub struct PipelineService {
    connector: Arc<ConnectionFactory>,
    settings: PipelineSettings,
    parser: DsvParser,
}

impl PipelineService {
    pub fn new(connector: Arc<ConnectionFactory>, settings: PipelineSettings) -> Self {
        Self {
            connector,
            settings,
            parser: DsvParser::new(),
        }
    }

    pub fn connector(&self) -> &Arc<ConnectionFactory> {
        &self.connector
    }

    pub fn settings(&self) -> &PipelineSettings {
        &self.settings
    }

    /// Replace the Target Table with the contents of the DSV file
    pub async fn ingest(&self) -> IngestOutcome {
        match self.run_ingest().await {
            Ok(outcome) => outcome,
            Err(e) => {
                error!(table = %self.settings.table_name, error = %e, "Ingestion failed");
                IngestOutcome::error(e.to_string())
            },
        }
    }

    /// Write the Target Table to today's output file
    pub async fn export(&self) -> ExportOutcome {
        match self.run_export().await {
            Ok(outcome) => outcome,
            Err(e) => {
                error!(table = %self.settings.table_name, error = %e, "Export failed");
                ExportOutcome::error(e.to_string())
            },
        }
    }

    async fn run_ingest(&self) -> PipelineResult<IngestOutcome> {
        let path = self.settings.input_path();
        let table = self.settings.table_name.as_str();
        info!(path = %path.display(), table, "Starting ingestion");

        let parser = self.parser;
        let parsed = tokio::task::spawn_blocking(move || parser.parse_file(&path)).await??;

        // The table is left untouched when there is nothing to load
        if parsed.records.is_empty() {
            warn!(table, "No data rows found in DSV file");
            return Ok(IngestOutcome::warning("No data rows found"));
        }

        let columns = sanitize_columns(&parsed.header);
        info!(columns = ?columns, "Sanitized column names");

        let mut conn = self.connector.connect().await?;
        let loaded = replace_contents(&mut conn, table, &columns, &parsed.records).await;
        close(conn).await;
        let rows = loaded?;

        let message = format!("Successfully ingested {} rows into {}", rows, table);
        info!("{}", message);
        Ok(IngestOutcome::success(message, rows))
    }

    async fn run_export(&self) -> PipelineResult<ExportOutcome> {
        let table = self.settings.table_name.as_str();
        info!(table, output_dir = %self.settings.output_dir.display(), "Starting export");

        let mut conn = self.connector.connect().await?;
        let fetched = fetch_table(&mut conn, table).await;
        close(conn).await;
        let result = fetched?;

        if result.is_empty() {
            warn!(table, "Query returned 0 rows");
            return Ok(ExportOutcome::warning(format!("No data found in {}", table)));
        }

        let today = Local::now().date_naive();
        let path = write_output(&result, &self.settings.output_dir, today).await?;
        let file_name = path
            .file_name()
            .map(|name| name.to_string_lossy().into_owned())
            .unwrap_or_default();

        let rows = result.row_count();
        let message = format!("Exported {} rows to {}", rows, path.display());
        info!("{}", message);
        Ok(ExportOutcome::success(message, rows, file_name))
    }
}
