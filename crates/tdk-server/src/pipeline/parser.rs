//! DSV parser
//!
//! Reads the pipe-delimited source file.
//!
//! # File Format
//! ```text
//! NAME|CITY
//! Acme Corp|Springfield
//! "Pipe | Inc"|Metropolis
//! ```
//!
//! - First line is the header; it is neither validated nor deduplicated
//! - Cells may be quoted with `"` (doubled `""` inside a quoted cell)
//! - Every cell is trimmed
//! - Lines whose cells are all empty after trimming are dropped
//! - Rows may be wider or narrower than the header; the loader normalises them

use std::fs::File;
use std::io::Read;
use std::path::Path;
use tracing::{debug, info};

use crate::error::{PipelineError, PipelineResult};

/// Header plus surviving data records, in file order
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ParsedDsv {
    pub header: Vec<String>,
    pub records: Vec<Vec<String>>,
}

impl ParsedDsv {
    pub fn column_count(&self) -> usize {
        self.header.len()
    }
}

/// Parser for delimiter-separated files
#[derive(Debug, Clone, Copy)]
pub struct DsvParser {
    delimiter: u8,
    quote: u8,
}

impl Default for DsvParser {
    fn default() -> Self {
        Self {
            delimiter: b'|',
            quote: b'"',
        }
    }
}

impl DsvParser {
    /// Create a pipe-delimited parser
    pub fn new() -> Self {
        Self::default()
    }

    /// Parse the file at `path`
    ///
    /// Blocking; call from `spawn_blocking` in async contexts.
    pub fn parse_file(&self, path: &Path) -> PipelineResult<ParsedDsv> {
        let file = File::open(path).map_err(|e| {
            if e.kind() == std::io::ErrorKind::NotFound {
                PipelineError::NotFound(path.to_path_buf())
            } else {
                PipelineError::Io(e)
            }
        })?;

        let parsed = self.parse_reader(file, path)?;

        info!(
            path = %path.display(),
            rows = parsed.records.len(),
            columns = parsed.column_count(),
            "Parsed DSV file"
        );

        Ok(parsed)
    }

    /// Parse from any reader; `source` is only used in error messages
    ///
    /// Undecodable input aborts the whole parse, no partial result is returned.
    pub fn parse_reader<R: Read>(&self, reader: R, source: &Path) -> PipelineResult<ParsedDsv> {
        let mut rdr = csv::ReaderBuilder::new()
            .delimiter(self.delimiter)
            .quote(self.quote)
            .has_headers(false)
            .flexible(true)
            .from_reader(reader);

        let mut parsed = ParsedDsv::default();
        let mut dropped = 0usize;

        for (index, record) in rdr.records().enumerate() {
            let record = record.map_err(|e| PipelineError::Parse {
                path: source.to_path_buf(),
                message: e.to_string(),
            })?;

            let cells: Vec<String> = record.iter().map(|cell| cell.trim().to_string()).collect();

            if index == 0 {
                parsed.header = cells;
            } else if cells.iter().any(|cell| !cell.is_empty()) {
                parsed.records.push(cells);
            } else {
                dropped += 1;
            }
        }

        if dropped > 0 {
            debug!(dropped, "Skipped blank DSV lines");
        }

        Ok(parsed)
    }
}
