//! Chroma connection configuration.

use std::time::Duration;

#[cfg(feature = "config")]
use clap::Args;
use serde::{Deserialize, Serialize};
use url::Url;

use crate::error::{VectorError, VectorResult};
use crate::metric::DistanceMetric;

/// Default Chroma server URL.
pub const DEFAULT_CHROMA_URL: &str = "http://localhost:8000";

/// Default collection name.
pub const DEFAULT_COLLECTION: &str = "knowledge_base";

/// Default request timeout in seconds.
pub const DEFAULT_TIMEOUT_SECS: u64 = 30;

/// Chroma server configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[cfg_attr(feature = "config", derive(Args))]
pub struct ChromaConfig {
    /// Base URL of the Chroma server.
    #[cfg_attr(
        feature = "config",
        arg(long = "chroma-url", env = "CHROMA_URL", default_value = DEFAULT_CHROMA_URL)
    )]
    #[serde(default = "default_base_url")]
    pub base_url: Url,

    /// Tenant owning the database.
    #[cfg_attr(
        feature = "config",
        arg(long = "chroma-tenant", env = "CHROMA_TENANT", default_value = "default_tenant")
    )]
    #[serde(default = "default_tenant")]
    pub tenant: String,

    /// Database holding the collection.
    #[cfg_attr(
        feature = "config",
        arg(
            long = "chroma-database",
            env = "CHROMA_DATABASE",
            default_value = "default_database"
        )
    )]
    #[serde(default = "default_database")]
    pub database: String,

    /// Collection name.
    #[cfg_attr(
        feature = "config",
        arg(long = "chroma-collection", env = "CHROMA_COLLECTION", default_value = DEFAULT_COLLECTION)
    )]
    #[serde(default = "default_collection")]
    pub collection: String,

    /// Distance metric the collection is created with.
    /// Set from the retrieval configuration rather than its own flag.
    #[cfg_attr(feature = "config", arg(skip))]
    #[serde(default)]
    pub metric: DistanceMetric,

    /// Request timeout in seconds.
    #[cfg_attr(
        feature = "config",
        arg(long = "chroma-timeout-secs", env = "CHROMA_TIMEOUT_SECS", default_value_t = DEFAULT_TIMEOUT_SECS)
    )]
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

fn default_base_url() -> Url {
    Url::parse(DEFAULT_CHROMA_URL).expect("default Chroma URL is valid")
}

fn default_tenant() -> String {
    "default_tenant".to_string()
}

fn default_database() -> String {
    "default_database".to_string()
}

fn default_collection() -> String {
    DEFAULT_COLLECTION.to_string()
}

fn default_timeout_secs() -> u64 {
    DEFAULT_TIMEOUT_SECS
}

impl Default for ChromaConfig {
    fn default() -> Self {
        Self {
            base_url: default_base_url(),
            tenant: default_tenant(),
            database: default_database(),
            collection: default_collection(),
            metric: DistanceMetric::default(),
            timeout_secs: default_timeout_secs(),
        }
    }
}

impl ChromaConfig {
    /// Creates a configuration for the given server URL.
    pub fn new(base_url: Url) -> Self {
        Self {
            base_url,
            ..Self::default()
        }
    }

    /// Sets the collection name.
    pub fn with_collection(mut self, collection: impl Into<String>) -> Self {
        self.collection = collection.into();
        self
    }

    /// Sets the tenant and database.
    pub fn with_database(mut self, tenant: impl Into<String>, database: impl Into<String>) -> Self {
        self.tenant = tenant.into();
        self.database = database.into();
        self
    }

    /// Sets the distance metric.
    pub fn with_metric(mut self, metric: DistanceMetric) -> Self {
        self.metric = metric;
        self
    }

    /// Sets the request timeout.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout_secs = timeout.as_secs();
        self
    }

    /// Returns the request timeout.
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }

    /// Validates the configuration.
    pub fn validate(&self) -> VectorResult<()> {
        if !matches!(self.base_url.scheme(), "http" | "https") {
            return Err(VectorError::invalid_config(format!(
                "unsupported Chroma URL scheme '{}'",
                self.base_url.scheme()
            )));
        }
        if self.collection.trim().is_empty() {
            return Err(VectorError::invalid_config("collection name cannot be empty"));
        }
        if self.tenant.trim().is_empty() || self.database.trim().is_empty() {
            return Err(VectorError::invalid_config(
                "tenant and database cannot be empty",
            ));
        }
        if self.timeout_secs == 0 {
            return Err(VectorError::invalid_config("timeout must be positive"));
        }
        Ok(())
    }

    /// Joins a path onto the API root, e.g. `api/v2/heartbeat`.
    pub(crate) fn endpoint(&self, path: &str) -> VectorResult<Url> {
        let mut base = self.base_url.clone();
        if !base.path().ends_with('/') {
            let path = format!("{}/", base.path());
            base.set_path(&path);
        }
        base.join(path)
            .map_err(|e| VectorError::invalid_config(format!("invalid Chroma endpoint: {e}")))
    }

    /// Returns the collections endpoint of the configured database.
    pub(crate) fn collections_endpoint(&self) -> VectorResult<Url> {
        self.endpoint(&format!(
            "api/v2/tenants/{}/databases/{}/collections",
            self.tenant, self.database
        ))
    }

    /// Returns an endpoint scoped to a collection ID.
    pub(crate) fn collection_endpoint(&self, collection_id: &str, action: &str) -> VectorResult<Url> {
        self.endpoint(&format!(
            "api/v2/tenants/{}/databases/{}/collections/{}/{}",
            self.tenant, self.database, collection_id, action
        ))
    }
}
