use std::path::PathBuf;
use std::time::Duration;

use crate::error::ConfigError;
use crate::mapping::FieldMapping;
use crate::normalize::DEFAULT_OFFSET_HOURS;

pub const DEFAULT_BATCH_SIZE: usize = 200;
pub const DEFAULT_BATCH_PAUSE: Duration = Duration::from_millis(100);
pub const DEFAULT_ERROR_REPORT: &str = "migration_errors.csv";
pub const DEFAULT_LOGIN_URL: &str = "https://login.salesforce.com";

/// Field the remote matches on when no external id field is configured.
pub const RECORD_ID_FIELD: &str = "Id";

#[derive(Clone)]
pub struct Credentials {
    pub username: String,
    pub password: String,
    pub security_token: Option<String>,
    pub client_id: String,
    pub client_secret: String,
    pub login_url: String,
}

impl std::fmt::Debug for Credentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Credentials")
            .field("username", &self.username)
            .field("client_id", &self.client_id)
            .field("login_url", &self.login_url)
            .finish_non_exhaustive()
    }
}

impl Credentials {
    /// Reads `SF_*` variables from the process environment.
    ///
    /// `password` overrides `SF_PASSWORD` when given.
    pub fn from_env(password: Option<String>) -> Result<Self, ConfigError> {
        Self::from_lookup(|name| std::env::var(name).ok(), password)
    }

    fn from_lookup(
        lookup: impl Fn(&str) -> Option<String>,
        password: Option<String>,
    ) -> Result<Self, ConfigError> {
        let get = |name: &str| lookup(name).filter(|v| !v.trim().is_empty());
        let require = |name: &'static str| get(name).ok_or(ConfigError::MissingCredential { name });

        Ok(Self {
            username: require("SF_USERNAME")?,
            password: match password.filter(|p| !p.is_empty()) {
                Some(password) => password,
                None => require("SF_PASSWORD")?,
            },
            security_token: get("SF_SECURITY_TOKEN"),
            client_id: require("SF_CLIENT_ID")?,
            client_secret: require("SF_CLIENT_SECRET")?,
            login_url: get("SF_LOGIN_URL").unwrap_or_else(|| DEFAULT_LOGIN_URL.to_string()),
        })
    }

    /// Salesforce expects the security token appended to the password.
    pub fn password_with_token(&self) -> String {
        format!(
            "{}{}",
            self.password,
            self.security_token.as_deref().unwrap_or_default()
        )
    }
}

/// Parameters of one migration run.
#[derive(Debug, Clone)]
pub struct MigrationConfig {
    pub object_type: String,
    pub external_id_field: Option<String>,
    pub mapping: Option<FieldMapping>,
    pub batch_size: usize,
    /// `-1` (or any non-positive value) means unbounded.
    pub record_limit: i64,
    pub error_report_path: PathBuf,
    pub batch_pause: Duration,
    pub offset_hours: i64,
}

impl Default for MigrationConfig {
    fn default() -> Self {
        Self {
            object_type: String::new(),
            external_id_field: None,
            mapping: None,
            batch_size: DEFAULT_BATCH_SIZE,
            record_limit: -1,
            error_report_path: PathBuf::from(DEFAULT_ERROR_REPORT),
            batch_pause: DEFAULT_BATCH_PAUSE,
            offset_hours: DEFAULT_OFFSET_HOURS,
        }
    }
}

impl MigrationConfig {
    pub fn new(object_type: impl Into<String>) -> Self {
        Self {
            object_type: object_type.into(),
            ..Self::default()
        }
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.object_type.trim().is_empty() {
            return Err(ConfigError::InvalidParameter {
                name: "object type",
                reason: "must not be empty".to_string(),
            });
        }
        if self.batch_size == 0 {
            return Err(ConfigError::InvalidParameter {
                name: "batch size",
                reason: "must be at least 1".to_string(),
            });
        }
        Ok(())
    }

    /// Field the remote upsert is keyed on.
    pub fn upsert_key(&self) -> &str {
        self.external_id_field.as_deref().unwrap_or(RECORD_ID_FIELD)
    }
}
