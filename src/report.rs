use std::fmt;
use std::path::Path;

use itertools::Itertools;
use log::info;
use serde::Serialize;

use crate::batch::{IndexedError, IndexedResult};
use crate::error::ReportError;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ErrorReportRow {
    /// 1-based position of the record in the submitted sequence.
    #[serde(rename = "Row")]
    pub row: usize,
    #[serde(rename = "Errors")]
    pub errors: String,
    /// JSON rendering of the record as it was submitted.
    #[serde(rename = "Record")]
    pub record: String,
}

/// Failed records of a run, ready to be written out.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ErrorReport {
    rows: Vec<ErrorReportRow>,
}

impl ErrorReport {
    /// Returns `None` when there is nothing to report.
    pub fn from_errors(errors: &[IndexedError]) -> Result<Option<Self>, ReportError> {
        if errors.is_empty() {
            return Ok(None);
        }

        let rows = errors
            .iter()
            .map(|e| {
                let record =
                    serde_json::to_string(&e.record).map_err(|source| ReportError::Serialize {
                        row: e.index + 1,
                        source,
                    })?;
                Ok(ErrorReportRow {
                    row: e.index + 1,
                    errors: e.messages.iter().join("; "),
                    record,
                })
            })
            .collect::<Result<Vec<_>, ReportError>>()?;

        Ok(Some(Self { rows }))
    }

    pub fn rows(&self) -> &[ErrorReportRow] {
        &self.rows
    }

    /// Writes the report as CSV, replacing whatever is at `path`.
    pub fn write(&self, path: &Path) -> Result<(), ReportError> {
        let write_error = |source: csv::Error| ReportError::Write {
            path: path.to_path_buf(),
            source,
        };

        let mut writer = csv::Writer::from_path(path).map_err(write_error)?;
        for row in &self.rows {
            writer.serialize(row).map_err(write_error)?;
        }
        writer.flush().map_err(|e| write_error(e.into()))?;

        info!("Wrote {} failed records to {:?}", self.rows.len(), path);
        Ok(())
    }
}

/// Counts of one run, derived from its results and errors.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct RunSummary {
    pub total: usize,
    pub created: usize,
    pub updated: usize,
    pub failed: usize,
}

impl RunSummary {
    pub fn from_outcome(results: &[IndexedResult], errors: &[IndexedError]) -> Self {
        let created = results.iter().filter(|r| r.created).count();
        Self {
            total: results.len() + errors.len(),
            created,
            updated: results.len() - created,
            failed: errors.len(),
        }
    }

    pub fn succeeded(&self) -> usize {
        self.created + self.updated
    }
}

impl fmt::Display for RunSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Total processed: {}", self.total)?;
        writeln!(
            f,
            "Succeeded: {} ({} created, {} updated)",
            self.succeeded(),
            self.created,
            self.updated
        )?;
        write!(f, "Failed: {}", self.failed)
    }
}
