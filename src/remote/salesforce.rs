use std::time::Duration;

use async_trait::async_trait;
use log::debug;

use crate::config::Credentials;
use crate::error::RemoteError;
use crate::record::Record;

use super::models::{upsert_body, OAuthError, OneOrMany, SaveResult, TokenResponse};
use super::{Identity, RemoteConnection, UpsertOutcome};

pub const DEFAULT_API_VERSION: &str = "59.0";

const REQUEST_TIMEOUT: Duration = Duration::from_secs(120);

#[derive(Debug, Clone)]
struct Session {
    instance_url: String,
    access_token: String,
}

/// Salesforce REST API connection.
pub struct SalesforceClient {
    client: reqwest::Client,
    api_version: String,
    session: Option<Session>,
}

impl SalesforceClient {
    pub fn new(api_version: &str) -> Result<Self, RemoteError> {
        let client = reqwest::Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()
            .map_err(|e| RemoteError::Transport(format!("failed to create HTTP client: {e}")))?;

        Ok(Self {
            client,
            api_version: api_version.to_string(),
            session: None,
        })
    }

    fn upsert_url(&self, session: &Session, object_type: &str, external_id_field: &str) -> String {
        format!(
            "{}/services/data/v{}/composite/sobjects/{}/{}",
            session.instance_url.trim_end_matches('/'),
            self.api_version,
            object_type,
            external_id_field
        )
    }
}

fn describe_reqwest_error(e: &reqwest::Error, url: &str) -> String {
    if e.is_timeout() {
        format!("request to {url} timed out")
    } else if e.is_connect() {
        format!("could not connect to {url}: {e}")
    } else if e.is_decode() {
        format!("unexpected response from {url}: {e}")
    } else {
        format!("request to {url} failed: {e}")
    }
}

fn truncate(body: &str) -> &str {
    match body.char_indices().nth(500) {
        Some((at, _)) => &body[..at],
        None => body,
    }
}

#[async_trait]
impl RemoteConnection for SalesforceClient {
    async fn authenticate(&mut self, credentials: &Credentials) -> Result<Identity, RemoteError> {
        let url = format!(
            "{}/services/oauth2/token",
            credentials.login_url.trim_end_matches('/')
        );
        let password = credentials.password_with_token();
        let form = [
            ("grant_type", "password"),
            ("client_id", credentials.client_id.as_str()),
            ("client_secret", credentials.client_secret.as_str()),
            ("username", credentials.username.as_str()),
            ("password", password.as_str()),
        ];

        debug!("Requesting access token from {}", url);
        let res = self
            .client
            .post(&url)
            .form(&form)
            .send()
            .await
            .map_err(|e| RemoteError::Authentication(describe_reqwest_error(&e, &url)))?;

        let status = res.status();
        let body = res
            .text()
            .await
            .map_err(|e| RemoteError::Authentication(describe_reqwest_error(&e, &url)))?;

        if !status.is_success() {
            let reason = match serde_json::from_str::<OAuthError>(&body) {
                Ok(err) if err.error_description.is_empty() => err.error,
                Ok(err) => format!("{}: {}", err.error, err.error_description),
                Err(_) => format!("HTTP {}: {}", status.as_u16(), truncate(&body)),
            };
            return Err(RemoteError::Authentication(reason));
        }

        let token: TokenResponse = serde_json::from_str(&body).map_err(|e| {
            RemoteError::Authentication(format!("unexpected token response: {e}"))
        })?;
        debug!("Authenticated against {}", token.instance_url);

        let identity = Identity {
            user: token.id,
            instance_url: token.instance_url.clone(),
        };
        self.session = Some(Session {
            instance_url: token.instance_url,
            access_token: token.access_token,
        });

        Ok(identity)
    }

    async fn upsert(
        &self,
        object_type: &str,
        external_id_field: &str,
        records: &[Record],
    ) -> Result<Vec<UpsertOutcome>, RemoteError> {
        let session = self
            .session
            .as_ref()
            .ok_or_else(|| RemoteError::Transport("not authenticated".to_string()))?;
        let url = self.upsert_url(session, object_type, external_id_field);

        debug!("PATCH {} with {} records", url, records.len());
        let res = self
            .client
            .patch(&url)
            .bearer_auth(&session.access_token)
            .json(&upsert_body(object_type, records))
            .send()
            .await
            .map_err(|e| RemoteError::Transport(describe_reqwest_error(&e, &url)))?;

        let status = res.status();
        let body = res
            .text()
            .await
            .map_err(|e| RemoteError::Transport(describe_reqwest_error(&e, &url)))?;

        if !status.is_success() {
            return Err(RemoteError::Transport(format!(
                "HTTP {} from {}: {}",
                status.as_u16(),
                url,
                truncate(&body)
            )));
        }

        let results = serde_json::from_str::<OneOrMany<SaveResult>>(&body)
            .map_err(|e| RemoteError::Transport(format!("unexpected upsert response: {e}")))?
            .into_vec();

        Ok(results.into_iter().map(SaveResult::into_outcome).collect())
    }
}
