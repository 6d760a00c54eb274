//! Remote record list: the capability the browser loads from, and its HTTP
//! implementation.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use shared::{domain::Record, error::LoadError, protocol::RecordPayload};
use thiserror::Error;
use tracing::debug;
use url::Url;

pub const DEFAULT_BASE_URL: &str = "https://api.github.com/";
const USER_AGENT: &str = concat!("repo-browser/", env!("CARGO_PKG_VERSION"));
const CONNECT_TIMEOUT: Duration = Duration::from_secs(10);

#[async_trait(?Send)]
pub trait RecordSource {
    /// Fetches the full list once. Implementations must not retry.
    async fn fetch_records(&self) -> Result<Vec<Record>, LoadError>;
}

#[derive(Debug, Error)]
pub enum SourceError {
    #[error("invalid record endpoint: {0}")]
    Endpoint(#[from] url::ParseError),
    #[error("failed to build http client: {0}")]
    Client(#[from] reqwest::Error),
}

/// `GET`s a JSON array of `{id, name, ..}` objects from a fixed endpoint.
pub struct HttpRecordSource {
    http: Client,
    endpoint: Url,
}

impl HttpRecordSource {
    pub fn new(endpoint: Url) -> Result<Self, SourceError> {
        let http = Client::builder()
            .user_agent(USER_AGENT)
            .connect_timeout(CONNECT_TIMEOUT)
            .build()?;
        Ok(Self { http, endpoint })
    }

    /// `{base_url}/users/{user}/repos`
    pub fn for_user(base_url: &str, user: &str) -> Result<Self, SourceError> {
        Self::new(repos_endpoint(base_url, user)?)
    }

    pub fn endpoint(&self) -> &Url {
        &self.endpoint
    }
}

pub fn repos_endpoint(base_url: &str, user: &str) -> Result<Url, url::ParseError> {
    let mut base = Url::parse(base_url)?;
    if !base.path().ends_with('/') {
        let path = format!("{}/", base.path());
        base.set_path(&path);
    }
    base.join(&format!("users/{user}/repos"))
}

#[async_trait(?Send)]
impl RecordSource for HttpRecordSource {
    async fn fetch_records(&self) -> Result<Vec<Record>, LoadError> {
        debug!(endpoint = %self.endpoint, "fetching records");
        let response = self
            .http
            .get(self.endpoint.clone())
            .send()
            .await
            .map_err(|err| LoadError::Transport(err.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            return Err(LoadError::Status {
                status: status.as_u16(),
            });
        }

        let body = response
            .bytes()
            .await
            .map_err(|err| LoadError::Transport(err.to_string()))?;
        let payloads: Vec<RecordPayload> =
            serde_json::from_slice(&body).map_err(|err| LoadError::Decode(err.to_string()))?;

        Ok(payloads.into_iter().map(Record::from).collect())
    }
}

#[cfg(test)]
#[path = "tests/source_tests.rs"]
mod tests;
