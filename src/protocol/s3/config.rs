//! Configuration types for S3 client

use super::error::{S3Error, S3Result};
use serde::{Deserialize, Serialize};
use std::time::Duration;
use url::Url;

/// S3 client configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ClientConfig {
    /// Service endpoint, e.g. `http://localhost:9000` (path-style addressing)
    pub endpoint: String,

    /// Ceiling for the data call plus local copy when materializing a file
    pub transfer_deadline_secs: u64,

    /// Entries per multi-object delete call (at most 1000)
    pub max_delete_objects: usize,

    /// Suffix of temporary download files (`<file>.<etag>.part.<suffix>`)
    pub part_suffix: String,

    /// Value of the `User-Agent` header, if any
    pub user_agent: Option<String>,
}

impl ClientConfig {
    /// Create a config for `endpoint` with default limits
    pub fn new(endpoint: impl Into<String>) -> Self {
        Self {
            endpoint: endpoint.into(),
            transfer_deadline_secs: super::DEFAULT_TRANSFER_DEADLINE_SECS,
            max_delete_objects: super::MAX_DELETE_OBJECTS,
            part_suffix: super::DEFAULT_PART_SUFFIX.to_string(),
            user_agent: Some(format!("s3-transit/{}", env!("CARGO_PKG_VERSION"))),
        }
    }

    /// Validate the configuration
    pub fn validate(&self) -> S3Result<()> {
        self.endpoint_url()?;

        if self.max_delete_objects == 0 {
            return Err(S3Error::InvalidConfig(
                "max_delete_objects must be at least 1".to_string(),
            ));
        }

        if self.max_delete_objects > super::MAX_DELETE_OBJECTS {
            return Err(S3Error::InvalidConfig(format!(
                "max_delete_objects {} exceeds the service limit of {}",
                self.max_delete_objects,
                super::MAX_DELETE_OBJECTS
            )));
        }

        if self.transfer_deadline_secs == 0 {
            return Err(S3Error::InvalidConfig(
                "transfer_deadline_secs must be greater than zero".to_string(),
            ));
        }

        if self.part_suffix.is_empty() || self.part_suffix.contains(['/', '\\']) {
            return Err(S3Error::InvalidConfig(format!(
                "Invalid temporary file suffix: {:?}",
                self.part_suffix
            )));
        }

        Ok(())
    }

    /// Parsed endpoint URL
    pub fn endpoint_url(&self) -> S3Result<Url> {
        let url = Url::parse(&self.endpoint).map_err(|e| {
            S3Error::InvalidConfig(format!("Invalid endpoint {:?}: {}", self.endpoint, e))
        })?;

        match url.scheme() {
            "http" | "https" if url.has_host() => Ok(url),
            _ => Err(S3Error::InvalidConfig(format!(
                "Endpoint must be an http(s) URL with a host: {}",
                self.endpoint
            ))),
        }
    }

    pub fn transfer_deadline(&self) -> Duration {
        Duration::from_secs(self.transfer_deadline_secs)
    }
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self::new(super::DEFAULT_ENDPOINT)
    }
}

/// Builder for ClientConfig
pub struct ClientConfigBuilder {
    config: ClientConfig,
}

impl ClientConfigBuilder {
    /// Create a new builder for `endpoint`
    pub fn new(endpoint: impl Into<String>) -> Self {
        Self {
            config: ClientConfig::new(endpoint),
        }
    }

    /// Set the service endpoint
    pub fn endpoint(mut self, endpoint: impl Into<String>) -> Self {
        self.config.endpoint = endpoint.into();
        self
    }

    /// Set the file materialization deadline
    pub fn transfer_deadline(mut self, deadline: Duration) -> Self {
        self.config.transfer_deadline_secs = deadline.as_secs();
        self
    }

    /// Set the delete page size
    pub fn max_delete_objects(mut self, count: usize) -> Self {
        self.config.max_delete_objects = count;
        self
    }

    /// Set the temporary file suffix
    pub fn part_suffix(mut self, suffix: impl Into<String>) -> Self {
        self.config.part_suffix = suffix.into();
        self
    }

    /// Set or clear the `User-Agent` header
    pub fn user_agent(mut self, user_agent: Option<String>) -> Self {
        self.config.user_agent = user_agent;
        self
    }

    /// Build the configuration
    pub fn build(self) -> S3Result<ClientConfig> {
        self.config.validate()?;
        Ok(self.config)
    }
}
