//! Outcome documents returned by the pipeline stages
//!
//! Each stage reports a small JSON object instead of failing the request:
//!
//! ```json
//! {"status": "success", "message": "Successfully ingested 2 rows into C_DUNS_V", "rows": 2}
//! {"status": "warning", "message": "No data found in C_DUNS_V", "rows": 0, "file": null}
//! ```
//!
//! Failed outcomes always carry `rows: 0`.

use serde::{Deserialize, Serialize};

/// Status field of an outcome
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OutcomeStatus {
    Success,
    Warning,
    Error,
}

impl OutcomeStatus {
    /// Success and warning are both delivered with HTTP 200
    pub fn is_ok(self) -> bool {
        !matches!(self, OutcomeStatus::Error)
    }
}

impl std::fmt::Display for OutcomeStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            OutcomeStatus::Success => write!(f, "success"),
            OutcomeStatus::Warning => write!(f, "warning"),
            OutcomeStatus::Error => write!(f, "error"),
        }
    }
}

/// Result of one ingestion run
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IngestOutcome {
    pub status: OutcomeStatus,
    pub message: String,
    pub rows: usize,
}

impl IngestOutcome {
    pub fn success(message: impl Into<String>, rows: usize) -> Self {
        Self {
            status: OutcomeStatus::Success,
            message: message.into(),
            rows,
        }
    }

    /// Nothing was loaded; the table was left untouched
    pub fn warning(message: impl Into<String>) -> Self {
        Self {
            status: OutcomeStatus::Warning,
            message: message.into(),
            rows: 0,
        }
    }

    pub fn error(message: impl Into<String>) -> Self {
        Self {
            status: OutcomeStatus::Error,
            message: message.into(),
            rows: 0,
        }
    }
}

/// Result of one export run
///
/// `file` is the bare output file name, `null` when nothing was written.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExportOutcome {
    pub status: OutcomeStatus,
    pub message: String,
    pub rows: usize,
    pub file: Option<String>,
}

impl ExportOutcome {
    pub fn success(message: impl Into<String>, rows: usize, file: impl Into<String>) -> Self {
        Self {
            status: OutcomeStatus::Success,
            message: message.into(),
            rows,
            file: Some(file.into()),
        }
    }

    pub fn warning(message: impl Into<String>) -> Self {
        Self {
            status: OutcomeStatus::Warning,
            message: message.into(),
            rows: 0,
            file: None,
        }
    }

    pub fn error(message: impl Into<String>) -> Self {
        Self {
            status: OutcomeStatus::Error,
            message: message.into(),
            rows: 0,
            file: None,
        }
    }
}

/// Body of `GET /health`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HealthReport {
    /// `healthy` or `unhealthy`
    pub status: String,
    pub service: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub database: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl HealthReport {
    pub fn healthy(service: impl Into<String>) -> Self {
        Self {
            status: "healthy".to_string(),
            service: service.into(),
            database: Some("connected".to_string()),
            error: None,
        }
    }

    pub fn unhealthy(service: impl Into<String>, error: impl Into<String>) -> Self {
        Self {
            status: "unhealthy".to_string(),
            service: service.into(),
            database: None,
            error: Some(error.into()),
        }
    }
}
