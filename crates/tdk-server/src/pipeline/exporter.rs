//! Tabular export
//!
//! Reads the whole Target Table and writes it as tab-separated text to
//! `{output_dir}/{YYYYMMDD}_testOutput.txt`. Exports on the same calendar
//! day overwrite the same file.

use chrono::NaiveDate;
use sqlx::postgres::PgConnection;
use sqlx::{Column, Row};
use std::path::{Path, PathBuf};
use tracing::info;

use crate::db::quote_ident;
use crate::error::{PipelineError, PipelineResult};

/// Suffix of every export file name
pub const OUTPUT_FILE_SUFFIX: &str = "_testOutput.txt";

/// Materialised query result, columns in the order the database returned them
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ResultSet {
    pub columns: Vec<String>,
    /// `None` for SQL NULL
    pub rows: Vec<Vec<Option<String>>>,
}

impl ResultSet {
    pub fn row_count(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }
}

/// `20240118_testOutput.txt` for 2024-01-18
pub fn output_file_name(date: NaiveDate) -> String {
    format!("{}{}", date.format("%Y%m%d"), OUTPUT_FILE_SUFFIX)
}

/// Run an unfiltered `SELECT *` against `table`
pub async fn fetch_table(conn: &mut PgConnection, table: &str) -> PipelineResult<ResultSet> {
    let rows = sqlx::query(&format!("SELECT * FROM {}", quote_ident(table)))
        .fetch_all(&mut *conn)
        .await
        .map_err(PipelineError::query)?;

    let Some(first) = rows.first() else {
        return Ok(ResultSet::default());
    };

    let columns: Vec<String> = first
        .columns()
        .iter()
        .map(|column| column.name().to_string())
        .collect();

    let mut data = Vec::with_capacity(rows.len());
    for row in &rows {
        let mut cells = Vec::with_capacity(columns.len());
        for index in 0..columns.len() {
            let cell: Option<String> = row.try_get(index).map_err(PipelineError::query)?;
            cells.push(cell);
        }
        data.push(cells);
    }

    Ok(ResultSet {
        columns,
        rows: data,
    })
}

/// Serialise a result set as TSV with a header row
///
/// NULL becomes an empty cell. Cells containing tabs, quotes or line breaks
/// are quoted with `"`.
pub fn render_tsv(result: &ResultSet) -> PipelineResult<Vec<u8>> {
    let mut writer = csv::WriterBuilder::new()
        .delimiter(b'\t')
        .quote_style(csv::QuoteStyle::Necessary)
        .from_writer(Vec::new());

    writer
        .write_record(&result.columns)
        .map_err(|e| PipelineError::Internal(format!("failed to render TSV header: {}", e)))?;

    for row in &result.rows {
        writer
            .write_record(row.iter().map(|cell| cell.as_deref().unwrap_or("")))
            .map_err(|e| PipelineError::Internal(format!("failed to render TSV row: {}", e)))?;
    }

    writer
        .into_inner()
        .map_err(|e| PipelineError::Internal(format!("failed to flush TSV output: {}", e)))
}

/// Write `result` under `output_dir` for `date`, creating the directory if needed
///
/// Returns the full path of the written file.
pub async fn write_output(
    result: &ResultSet,
    output_dir: &Path,
    date: NaiveDate,
) -> PipelineResult<PathBuf> {
    let bytes = render_tsv(result)?;

    tokio::fs::create_dir_all(output_dir).await?;
    let path = output_dir.join(output_file_name(date));
    tokio::fs::write(&path, bytes).await?;

    info!(path = %path.display(), rows = result.row_count(), "Wrote export file");

    Ok(path)
}
