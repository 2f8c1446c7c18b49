//! REST client for the Secret Manager v1 API
//!
//! Talks to Secret Manager over HTTPS using a bearer token. Listing walks
//! `nextPageToken` pages transparently; payloads come back base64-encoded
//! from `versions/latest:access`.

use crate::client::{SecretEntry, SecretStore};
use crate::manager::short_name;
use async_trait::async_trait;
use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use serde::Deserialize;
use std::env;
use std::time::Duration;
use strata_config::{ConfigError, ConfigResult};

const DEFAULT_ENDPOINT: &str = "https://secretmanager.googleapis.com/v1";
const DEFAULT_TIMEOUT: Duration = Duration::from_secs(15);
const PAGE_SIZE: usize = 100;
const TOKEN_ENV: &str = "GOOGLE_OAUTH_ACCESS_TOKEN";

/// Pass-through options for constructing the underlying REST client.
#[derive(Debug, Clone)]
pub struct ClientOptions {
    /// API endpoint; override for emulators or private service connect.
    pub endpoint: String,
    /// Bearer token; falls back to `GOOGLE_OAUTH_ACCESS_TOKEN` when unset.
    pub access_token: Option<String>,
    /// Per-request timeout.
    pub timeout: Duration,
}

impl Default for ClientOptions {
    fn default() -> Self {
        Self {
            endpoint: DEFAULT_ENDPOINT.to_string(),
            access_token: None,
            timeout: DEFAULT_TIMEOUT,
        }
    }
}

/// [`SecretStore`] implementation over the Secret Manager REST API.
#[derive(Debug, Clone)]
pub struct RestSecretStore {
    client: reqwest::Client,
    endpoint: String,
    token: String,
}

impl RestSecretStore {
    /// Build a store from the given options.
    ///
    /// Fails with [`ConfigError::ClientUnavailable`] when no bearer token is
    /// available or the HTTP client cannot be constructed.
    pub fn new(options: ClientOptions) -> ConfigResult<Self> {
        let token = match options.access_token {
            Some(token) => token,
            None => env::var(TOKEN_ENV).map_err(|_| {
                ConfigError::client_unavailable(format!(
                    "no access token: set {TOKEN_ENV} or pass one via client options"
                ))
            })?,
        };

        let client = reqwest::Client::builder()
            .timeout(options.timeout)
            .build()
            .map_err(|err| ConfigError::client_unavailable(err.to_string()))?;

        Ok(Self {
            client,
            endpoint: options.endpoint.trim_end_matches('/').to_string(),
            token,
        })
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ListSecretsResponse {
    #[serde(default)]
    secrets: Vec<ListedSecret>,
    next_page_token: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ListedSecret {
    name: String,
    #[serde(default)]
    etag: String,
}

#[derive(Debug, Deserialize)]
struct AccessResponse {
    payload: Option<AccessPayload>,
}

#[derive(Debug, Deserialize)]
struct AccessPayload {
    data: Option<String>,
}

#[async_trait]
impl SecretStore for RestSecretStore {
    async fn list(&self, project: &str, filter: Option<&str>) -> ConfigResult<Vec<SecretEntry>> {
        let url = format!("{}/projects/{project}/secrets", self.endpoint);
        let mut entries = Vec::new();
        let mut page_token: Option<String> = None;

        loop {
            let mut request = self
                .client
                .get(&url)
                .bearer_auth(&self.token)
                .query(&[("pageSize", PAGE_SIZE.to_string())]);
            if let Some(filter) = filter {
                request = request.query(&[("filter", filter)]);
            }
            if let Some(token) = &page_token {
                request = request.query(&[("pageToken", token)]);
            }

            let response = request
                .send()
                .await
                .map_err(|err| ConfigError::list_failed(project, err.to_string()))?;
            let status = response.status();
            if !status.is_success() {
                let body = response.text().await.unwrap_or_default();
                return Err(ConfigError::list_failed(
                    project,
                    format!("{status} {body}"),
                ));
            }

            let page: ListSecretsResponse = response
                .json()
                .await
                .map_err(|err| ConfigError::list_failed(project, err.to_string()))?;
            entries.extend(page.secrets.into_iter().map(|secret| SecretEntry {
                name: secret.name,
                etag: secret.etag,
            }));

            match page.next_page_token.filter(|token| !token.is_empty()) {
                Some(next) => page_token = Some(next),
                None => break,
            }
        }

        Ok(entries)
    }

    async fn access_latest(&self, name: &str) -> ConfigResult<Vec<u8>> {
        let id = short_name(name);
        let url = format!("{}/{name}/versions/latest:access", self.endpoint);

        let response = self
            .client
            .get(&url)
            .bearer_auth(&self.token)
            .send()
            .await
            .map_err(|err| ConfigError::fetch_failed(id, err.to_string()))?;
        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(ConfigError::fetch_failed(id, format!("{status} {body}")));
        }

        let access: AccessResponse = response
            .json()
            .await
            .map_err(|err| ConfigError::fetch_failed(id, err.to_string()))?;
        let data = access
            .payload
            .and_then(|payload| payload.data)
            .ok_or_else(|| ConfigError::fetch_failed(id, "secret payload missing data"))?;

        STANDARD
            .decode(data)
            .map_err(|err| ConfigError::fetch_failed(id, format!("base64 decode failed: {err}")))
    }
}
