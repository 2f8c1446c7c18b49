//! Project-id resolution against the GCE metadata server

use crate::client::IdentityResolver;
use async_trait::async_trait;
use std::time::Duration;
use strata_config::{ConfigError, ConfigResult};

const METADATA_ENDPOINT: &str =
    "http://metadata.google.internal/computeMetadata/v1/project/project-id";
const METADATA_FLAVOR: (&str, &str) = ("Metadata-Flavor", "Google");
const METADATA_TIMEOUT: Duration = Duration::from_secs(5);

/// Resolves the project id from the instance metadata service.
///
/// Only reachable from inside GCP; callers deploying elsewhere should pin
/// the project explicitly instead.
#[derive(Debug, Clone)]
pub struct MetadataIdentity {
    endpoint: String,
}

impl Default for MetadataIdentity {
    fn default() -> Self {
        Self {
            endpoint: METADATA_ENDPOINT.to_string(),
        }
    }
}

impl MetadataIdentity {
    pub fn new() -> Self {
        Self::default()
    }

    /// Override the metadata endpoint (emulators, tests).
    #[must_use = "builder methods must be chained or built"]
    pub fn with_endpoint(mut self, endpoint: impl Into<String>) -> Self {
        self.endpoint = endpoint.into();
        self
    }
}

#[async_trait]
impl IdentityResolver for MetadataIdentity {
    async fn project_id(&self) -> ConfigResult<String> {
        let client = reqwest::Client::builder()
            .timeout(METADATA_TIMEOUT)
            .build()
            .map_err(|err| ConfigError::identity_unresolved(err.to_string()))?;

        let response = client
            .get(&self.endpoint)
            .header(METADATA_FLAVOR.0, METADATA_FLAVOR.1)
            .send()
            .await
            .map_err(|err| ConfigError::identity_unresolved(err.to_string()))?;

        if !response.status().is_success() {
            return Err(ConfigError::identity_unresolved(format!(
                "metadata server returned {}",
                response.status()
            )));
        }

        let project = response
            .text()
            .await
            .map_err(|err| ConfigError::identity_unresolved(err.to_string()))?;
        let project = project.trim();
        if project.is_empty() {
            return Err(ConfigError::identity_unresolved(
                "metadata server returned an empty project id",
            ));
        }

        Ok(project.to_string())
    }
}
