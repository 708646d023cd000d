//! Remote log store client.
//!
//! # Responsibilities
//! - Resolve the configured project and store before anything is sent
//! - Put log groups over HTTP with basic auth
//!
//! # Endpoints
//! - `GET  {endpoint}/projects/{project}`
//! - `GET  {endpoint}/projects/{project}/logstores/{store}`
//! - `POST {endpoint}/projects/{project}/logstores/{store}/logs` (JSON `LogGroup`)

use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use url::Url;

use super::types::{LogGroup, LogStoreConfig, LogStoreError, LogStoreResult};

/// Destination of flushed log groups.
#[async_trait]
pub trait LogStore: Send + Sync + 'static {
    /// Store name used in local log lines.
    fn name(&self) -> &str;

    /// Send one group. Either all entries are accepted or the call fails.
    async fn put_logs(&self, group: &LogGroup) -> LogStoreResult<()>;
}

/// [`LogStore`] backed by the store's HTTP API.
#[derive(Clone)]
pub struct HttpLogStore {
    client: Client,
    base: Url,
    access_key: String,
    access_secret: String,
    project: String,
    store: String,
}

impl HttpLogStore {
    /// Connect to the store named in `config`.
    ///
    /// Fails with `UnknownProject` / `UnknownStore` when either lookup does not
    /// answer with a success status.
    pub async fn connect(config: &LogStoreConfig) -> LogStoreResult<Self> {
        let base = parse_endpoint(&config.endpoint)?;
        let client = Client::builder()
            .timeout(config.put_timeout())
            .build()?;

        let store = Self {
            client,
            base,
            access_key: config.access_key.clone(),
            access_secret: config.access_secret.clone(),
            project: config.project.clone(),
            store: config.store.clone(),
        };

        store
            .probe(&["projects", store.project.as_str()])
            .await
            .map_err(|reason| LogStoreError::UnknownProject {
                project: store.project.clone(),
                reason,
            })?;
        store
            .probe(&["projects", store.project.as_str(), "logstores", store.store.as_str()])
            .await
            .map_err(|reason| LogStoreError::UnknownStore {
                store: store.store.clone(),
                reason,
            })?;

        tracing::info!(
            endpoint = %store.base,
            project = %store.project,
            store = %store.store,
            "Log store client initialized"
        );
        Ok(store)
    }

    async fn probe(&self, segments: &[&str]) -> Result<(), String> {
        let response = self
            .client
            .get(self.url(segments))
            .basic_auth(&self.access_key, Some(&self.access_secret))
            .send()
            .await
            .map_err(|e| e.to_string())?;

        match response.status() {
            status if status.is_success() => Ok(()),
            StatusCode::NOT_FOUND => Err("not found".to_string()),
            status => Err(format!("status {}", status)),
        }
    }

    fn url(&self, segments: &[&str]) -> Url {
        let mut url = self.base.clone();
        if let Ok(mut path) = url.path_segments_mut() {
            path.pop_if_empty().extend(segments);
        }
        url
    }
}

#[async_trait]
impl LogStore for HttpLogStore {
    fn name(&self) -> &str {
        &self.store
    }

    async fn put_logs(&self, group: &LogGroup) -> LogStoreResult<()> {
        let response = self
            .client
            .post(self.url(&["projects", self.project.as_str(), "logstores", self.store.as_str(), "logs"]))
            .basic_auth(&self.access_key, Some(&self.access_secret))
            .json(group)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            return Err(LogStoreError::Rejected(status.as_u16()));
        }
        Ok(())
    }
}

impl std::fmt::Debug for HttpLogStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        // Credentials stay out of debug output.
        f.debug_struct("HttpLogStore")
            .field("endpoint", &self.base.as_str())
            .field("project", &self.project)
            .field("store", &self.store)
            .finish()
    }
}

fn parse_endpoint(endpoint: &str) -> LogStoreResult<Url> {
    let invalid = |reason: String| LogStoreError::InvalidEndpoint {
        endpoint: endpoint.to_string(),
        reason,
    };

    let url = Url::parse(endpoint).map_err(|e| invalid(e.to_string()))?;
    if !matches!(url.scheme(), "http" | "https") {
        return Err(invalid(format!("unsupported scheme '{}'", url.scheme())));
    }
    if url.cannot_be_a_base() {
        return Err(invalid("not a base URL".to_string()));
    }
    Ok(url)
}
