use std::path::{Path, PathBuf};

use async_trait::async_trait;
use log::{debug, info};

use crate::error::SourceError;
use crate::record::Record;

/// Produces the records of one run, in input order.
#[async_trait]
pub trait RecordSource: Send + Sync {
    async fn read(&self) -> Result<Vec<Record>, SourceError>;
}

/// Headered delimited text file.
#[derive(Debug, Clone)]
pub struct CsvSource {
    path: PathBuf,
    delimiter: u8,
}

impl CsvSource {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            delimiter: b',',
        }
    }

    pub fn with_delimiter(mut self, delimiter: u8) -> Self {
        self.delimiter = delimiter;
        self
    }
}

#[async_trait]
impl RecordSource for CsvSource {
    async fn read(&self) -> Result<Vec<Record>, SourceError> {
        parse_records(&self.path, self.delimiter)
    }
}

/// Reads every non-blank row of `path` as a header-keyed record.
pub fn parse_records(path: &Path, delimiter: u8) -> Result<Vec<Record>, SourceError> {
    debug!("Opening {:?}", path);
    if !path.exists() {
        return Err(SourceError::FileNotFound {
            path: path.to_path_buf(),
        });
    }

    let read_error = |source: csv::Error| match source.kind() {
        csv::ErrorKind::UnequalLengths { pos, .. } => SourceError::Malformed {
            path: path.to_path_buf(),
            line: pos.as_ref().map_or(0, csv::Position::line),
            message: source.to_string(),
        },
        _ => SourceError::Read {
            path: path.to_path_buf(),
            source,
        },
    };

    let mut rdr = csv::ReaderBuilder::new()
        .has_headers(true)
        .delimiter(delimiter)
        .trim(csv::Trim::Headers)
        .from_path(path)
        .map_err(read_error)?;

    let headers = rdr.headers().map_err(read_error)?.clone();

    let mut records = Vec::new();
    for row in rdr.records() {
        let row = row.map_err(read_error)?;
        if row.iter().all(|cell| cell.trim().is_empty()) {
            continue;
        }
        records.push(headers.iter().zip(row.iter()).collect::<Record>());
    }

    info!("Read {} records from {:?}", records.len(), path);
    Ok(records)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn csv_file(content: &str) -> tempfile::NamedTempFile {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(content.as_bytes()).unwrap();
        file
    }

    #[tokio::test]
    async fn reads_rows_in_order_and_skips_blank_ones() {
        let file = csv_file("Document Number,D2\nINV-001,6/20/24 3:24\n,\nINV-002,\n");

        let records = CsvSource::new(file.path()).read().await.unwrap();

        assert_eq!(records.len(), 2);
        assert_eq!(records[0].get("Document Number"), Some("INV-001"));
        assert_eq!(records[0].get("D2"), Some("6/20/24 3:24"));
        assert_eq!(records[1].get("D2"), Some(""));
    }

    #[test]
    fn honours_delimiter_and_trims_headers() {
        let file = csv_file(" Name ;Amount\nAcme;1500.00\n");

        let records = parse_records(file.path(), b';').unwrap();

        assert_eq!(records[0].get("Name"), Some("Acme"));
        assert_eq!(records[0].get("Amount"), Some("1500.00"));
    }

    #[test]
    fn missing_file_is_reported() {
        let err = parse_records(Path::new("/nonexistent/input.csv"), b',').unwrap_err();
        assert!(matches!(err, SourceError::FileNotFound { .. }));
    }

    #[test]
    fn ragged_row_is_malformed() {
        let file = csv_file("Name,Amount\nAcme,1,extra\n");

        let err = parse_records(file.path(), b',').unwrap_err();

        assert!(matches!(err, SourceError::Malformed { line: 2, .. }));
    }
}
