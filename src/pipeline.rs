use std::path::PathBuf;

use log::{debug, error, info};

use crate::batch::{BatchUpserter, IndexedError, IndexedResult};
use crate::config::{Credentials, MigrationConfig};
use crate::error::{MigrationError, Result};
use crate::filter::{apply_limit, record_limit, require_external_id};
use crate::normalize::Normalizer;
use crate::record::Record;
use crate::remote::RemoteConnection;
use crate::report::{ErrorReport, RunSummary};
use crate::source::RecordSource;

#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct MigrationOutcome {
    pub results: Vec<IndexedResult>,
    pub errors: Vec<IndexedError>,
    pub summary: RunSummary,
    /// Set when at least one record failed and the report was written.
    pub report_path: Option<PathBuf>,
}

impl MigrationOutcome {
    /// True when no records were left to upsert after filtering.
    pub fn is_empty(&self) -> bool {
        self.results.is_empty() && self.errors.is_empty()
    }
}

fn logged<T, E>(result: std::result::Result<T, E>, stage: &str) -> Result<T>
where
    E: Into<MigrationError>,
{
    result.map_err(|e| {
        let e: MigrationError = e.into();
        error!("{} failed: {}", stage, e);
        e
    })
}

/// Maps, limits and filters raw source records per `config`.
pub fn prepare_records(records: Vec<Record>, config: &MigrationConfig) -> Vec<Record> {
    let records = match &config.mapping {
        Some(mapping) if !mapping.is_empty() => {
            let normalizer = Normalizer::with_offset_hours(config.offset_hours);
            let mapped: Vec<Record> = records
                .iter()
                .map(|r| mapping.apply(r, &normalizer))
                .collect();
            debug!("Mapped {} records with {} fields", mapped.len(), mapping.len());
            mapped
        }
        _ => records,
    };

    let limit = record_limit(config.record_limit);
    let records = apply_limit(records, limit);
    if let Some(limit) = limit {
        info!("Limited to the first {} records", limit);
    }

    match &config.external_id_field {
        Some(field) => {
            let before = records.len();
            let records = require_external_id(records, field);
            info!(
                "{} records have a value for {} ({} skipped)",
                records.len(),
                field,
                before - records.len()
            );
            records
        }
        None => records,
    }
}

/// Reads and prepares records without touching the remote store.
pub async fn preview<S: RecordSource + ?Sized>(
    source: &S,
    config: &MigrationConfig,
) -> Result<Vec<Record>> {
    logged(config.validate(), "Configuration")?;
    let records = logged(source.read().await, "Reading records")?;
    let records = prepare_records(records, config);

    info!(
        "Dry run: {} records would be upserted into {} on {}",
        records.len(),
        config.object_type,
        config.upsert_key()
    );
    if let Some(first) = records.first() {
        info!("First record: {:?}", first);
    }
    Ok(records)
}

/// Runs one migration: authenticate, read, prepare, upsert in batches, report failures.
pub async fn migrate<C, S>(
    connection: &mut C,
    credentials: &Credentials,
    source: &S,
    config: &MigrationConfig,
) -> Result<MigrationOutcome>
where
    C: RemoteConnection + ?Sized,
    S: RecordSource + ?Sized,
{
    logged(config.validate(), "Configuration")?;

    let identity = logged(connection.authenticate(credentials).await, "Authentication")?;
    info!("Authenticated as {} on {}", identity.user, identity.instance_url);

    let records = logged(source.read().await, "Reading records")?;
    info!("Read {} records", records.len());

    let records = prepare_records(records, config);
    if records.is_empty() {
        info!("No records to upsert");
        return Ok(MigrationOutcome::default());
    }

    info!(
        "Upserting {} records into {} on {}",
        records.len(),
        config.object_type,
        config.upsert_key()
    );
    let outcome = BatchUpserter::new(&*connection)
        .batch_size(config.batch_size)
        .pause(config.batch_pause)
        .run(&config.object_type, config.upsert_key(), &records)
        .await;

    let summary = RunSummary::from_outcome(&outcome.results, &outcome.errors);

    let report_path = match logged(ErrorReport::from_errors(&outcome.errors), "Error report")? {
        Some(report) => {
            logged(report.write(&config.error_report_path), "Writing error report")?;
            Some(config.error_report_path.clone())
        }
        None => None,
    };

    Ok(MigrationOutcome {
        results: outcome.results,
        errors: outcome.errors,
        summary,
        report_path,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mapping::FieldMapping;

    fn record(fields: &[(&str, &str)]) -> Record {
        fields.iter().copied().collect()
    }

    #[test]
    fn without_mapping_records_pass_through() {
        let input = vec![record(&[("Name", "Acme"), ("When", "6/20/24 3:24")])];
        let config = MigrationConfig::new("Account");
        assert_eq!(prepare_records(input.clone(), &config), input);
    }

    #[test]
    fn mapping_runs_before_limit_and_filter() {
        let mapping: FieldMapping = [("Document Number", "Invoice_NS_Id__c")]
            .into_iter()
            .collect();
        let config = MigrationConfig {
            mapping: Some(mapping),
            external_id_field: Some("Invoice_NS_Id__c".to_string()),
            record_limit: 2,
            ..MigrationConfig::new("Invoice__c")
        };
        let input = vec![
            record(&[("Document Number", "INV-001")]),
            record(&[("Document Number", "")]),
            record(&[("Document Number", "INV-003")]),
        ];

        assert_eq!(
            prepare_records(input, &config),
            vec![record(&[("Invoice_NS_Id__c", "INV-001")])]
        );
    }

    #[test]
    fn configured_offset_reaches_the_normalizer() {
        let mapping: FieldMapping = [("D2", "Created__c")].into_iter().collect();
        let config = MigrationConfig {
            mapping: Some(mapping),
            offset_hours: 0,
            ..MigrationConfig::new("Invoice__c")
        };
        let output = prepare_records(vec![record(&[("D2", "6/20/24 3:24")])], &config);
        assert_eq!(output[0].get("Created__c"), Some("2024-06-20T03:24:00"));
    }
}
