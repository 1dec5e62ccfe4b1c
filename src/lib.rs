pub mod batch;
pub mod config;
pub mod error;
pub mod filter;
pub mod mapping;
pub mod normalize;
pub mod pipeline;
pub mod record;
pub mod remote;
pub mod report;
pub mod source;

pub use batch::{BatchOutcome, BatchUpserter, IndexedError, IndexedResult};
pub use config::{Credentials, MigrationConfig};
pub use error::{MigrationError, Result};
pub use mapping::FieldMapping;
pub use normalize::{normalize_datetime, Normalizer};
pub use pipeline::{migrate, preview, MigrationOutcome};
pub use record::Record;
pub use remote::{RemoteConnection, SalesforceClient, UpsertOutcome};
pub use report::{ErrorReport, RunSummary};
pub use source::{CsvSource, RecordSource};
