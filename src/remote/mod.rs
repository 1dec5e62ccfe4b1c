//! The remote object store, as seen by the migration core.

mod models;
mod salesforce;

use async_trait::async_trait;

use crate::config::Credentials;
use crate::error::RemoteError;
use crate::record::Record;

pub use salesforce::{SalesforceClient, DEFAULT_API_VERSION};

/// Result of upserting one record.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UpsertOutcome {
    Success { id: String, created: bool },
    Failure { messages: Vec<String> },
}

/// Who the run is authenticated as.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Identity {
    pub user: String,
    pub instance_url: String,
}

#[async_trait]
pub trait RemoteConnection: Send + Sync {
    async fn authenticate(&mut self, credentials: &Credentials) -> Result<Identity, RemoteError>;

    /// Upserts `records` into `object_type`, matching on `external_id_field`.
    ///
    /// Returns one outcome per record, in submission order. An `Err` means the request as a
    /// whole failed and no per-record outcome is known.
    async fn upsert(
        &self,
        object_type: &str,
        external_id_field: &str,
        records: &[Record],
    ) -> Result<Vec<UpsertOutcome>, RemoteError>;
}
