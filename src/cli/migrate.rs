use anyhow::{anyhow, Result};
use clap::Args;
use clap_stdin::MaybeStdin;
use log::info;
use sfmigrate::config::{DEFAULT_BATCH_SIZE, DEFAULT_ERROR_REPORT};
use sfmigrate::normalize::DEFAULT_OFFSET_HOURS;
use sfmigrate::remote::DEFAULT_API_VERSION;
use sfmigrate::{
    migrate, preview, Credentials, CsvSource, FieldMapping, MigrationConfig, SalesforceClient,
};
use std::path::PathBuf;
use std::time::Duration;

#[derive(Debug, Args, Clone)]
pub struct MigrateArgs {
    /// CSV file to read records from
    file: PathBuf,

    /// Destination object type, e.g. Invoice__c
    #[arg(long = "object", env = "SF_OBJECT")]
    object_type: String,

    /// Field the remote matches existing records on; records without it are skipped
    #[arg(long, env = "SF_EXTERNAL_ID")]
    external_id: Option<String>,

    /// JSON file mapping CSV column names to destination field names
    #[arg(long, env = "SF_FIELD_MAPPING")]
    mapping: Option<PathBuf>,

    #[arg(long, default_value_t = DEFAULT_BATCH_SIZE)]
    batch_size: usize,

    /// Only migrate the first N records (-1 for all)
    #[arg(long, default_value_t = -1, allow_negative_numbers = true)]
    limit: i64,

    /// Where to write failed records
    #[arg(long, default_value = DEFAULT_ERROR_REPORT)]
    error_report: PathBuf,

    #[arg(long, default_value_t = ',')]
    delimiter: char,

    /// Pause between batches in milliseconds
    #[arg(long, default_value_t = 100)]
    pause_ms: u64,

    /// Hours added to every normalized date/time value
    #[arg(long, default_value_t = DEFAULT_OFFSET_HOURS, allow_negative_numbers = true)]
    offset_hours: i64,

    #[arg(long, env = "SF_API_VERSION", default_value = DEFAULT_API_VERSION)]
    api_version: String,

    /// Password, or "-" to read it from stdin (defaults to SF_PASSWORD)
    #[arg(long)]
    password: Option<MaybeStdin<String>>,

    /// Read, map and filter records without contacting Salesforce
    #[arg(long)]
    dry_run: bool,
}

impl MigrateArgs {
    fn config(&self) -> Result<MigrationConfig> {
        let mapping = self
            .mapping
            .as_deref()
            .map(FieldMapping::from_json_file)
            .transpose()?;

        Ok(MigrationConfig {
            object_type: self.object_type.clone(),
            external_id_field: self.external_id.clone(),
            mapping,
            batch_size: self.batch_size,
            record_limit: self.limit,
            error_report_path: self.error_report.clone(),
            batch_pause: Duration::from_millis(self.pause_ms),
            offset_hours: self.offset_hours,
        })
    }

    fn source(&self) -> Result<CsvSource> {
        let delimiter = u8::try_from(self.delimiter)
            .map_err(|_| anyhow!("Delimiter must be a single ASCII character"))?;
        Ok(CsvSource::new(&self.file).with_delimiter(delimiter))
    }
}

pub(crate) async fn handle(args: MigrateArgs) -> Result<()> {
    info!("Migrating {:?} into {}", args.file, args.object_type);

    if args.dry_run {
        let records = preview(&args.source()?, &args.config()?).await?;
        println!("{} records would be upserted", records.len());
        return Ok(());
    }

    let credentials = Credentials::from_env(args.password.as_ref().map(|p| p.to_string()))?;
    let config = args.config()?;
    let source = args.source()?;

    let mut client = SalesforceClient::new(&args.api_version)?;
    let outcome = migrate(&mut client, &credentials, &source, &config).await?;

    if outcome.is_empty() {
        println!("No records to migrate");
        return Ok(());
    }

    println!("{}", outcome.summary);
    if let Some(path) = outcome.report_path {
        println!("Failed records written to {}", path.display());
    }

    Ok(())
}
