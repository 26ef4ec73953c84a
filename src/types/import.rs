//! Import report types for the CSV import endpoints
//!
//! Every import responds with a structured report so callers can see
//! partial failures instead of a bare 200.

use serde::{Deserialize, Serialize};

/// Import issue level
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ImportIssueLevel {
    Info,
    Warning,
    Error,
}

/// Single import issue, tied to a source row where one is known
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ImportIssue {
    /// 1-based source row number including the header row, 0 when unknown
    pub row_number: i64,
    pub level: ImportIssueLevel,
    pub field: String,
    pub message: String,
    pub original_value: Option<String>,
}

/// Outcome of one import run
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ImportReport {
    /// Rows received from the reader (after blank-row skipping)
    pub rows_read: u64,
    /// Rows written to the store
    pub persisted: u64,
    /// Rows lost to failed batches or failed per-row transactions
    pub failed: u64,
    /// Rows deliberately not persisted (vendor summary rows)
    pub skipped: u64,
    /// Bulk writes dispatched (one per 200 rows plus remainder)
    pub batches: u64,
    pub issues: Vec<ImportIssue>,
}

impl ImportReport {
    pub fn push_issue(
        &mut self,
        row_number: i64,
        level: ImportIssueLevel,
        field: &str,
        message: String,
        original_value: Option<String>,
    ) {
        self.issues.push(ImportIssue {
            row_number,
            level,
            field: field.to_string(),
            message,
            original_value,
        });
    }
}
