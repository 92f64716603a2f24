//! Declarative service description (`methods.json`).
//!
//! The file is a JSON object keyed by method name:
//!
//! ```json
//! {
//!   "verify_email": {
//!     "endpoint": "email-verifier",
//!     "params": ["email"],
//!     "headers": {"accept": "application/json"}
//!   }
//! }
//! ```
//!
//! `endpoint` is required for every entry; one entry without it rejects the
//! whole file. `params` order is the positional-argument order.

use std::collections::BTreeMap;
use std::path::Path;

use serde::Deserialize;

use crate::error::ConfigError;
use crate::transport::Headers;

/// One configured service method. Immutable once loaded.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServiceDefinition {
    pub method_name: String,
    pub endpoint: String,
    pub params: Vec<String>,
    pub headers: Headers,
}

#[derive(Deserialize)]
struct RawEntry {
    endpoint: Option<String>,
    #[serde(default)]
    params: Option<Vec<String>>,
    #[serde(default)]
    headers: Option<Headers>,
}

/// All service definitions of one client, keyed by method name.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ServiceConfig {
    services: BTreeMap<String, ServiceDefinition>,
}

impl ServiceConfig {
    /// Read and parse a config file.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let raw = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        let config = Self::parse(&raw)?;
        tracing::debug!(path = %path.display(), services = config.len(), "loaded service config");
        Ok(config)
    }

    pub fn parse(raw: &str) -> Result<Self, ConfigError> {
        let entries: BTreeMap<String, RawEntry> =
            serde_json::from_str(raw).map_err(|e| ConfigError::Malformed(e.to_string()))?;

        let mut services = BTreeMap::new();
        for (method_name, entry) in entries {
            let endpoint = entry.endpoint.ok_or_else(|| ConfigError::MissingEndpoint {
                method: method_name.clone(),
            })?;
            services.insert(
                method_name.clone(),
                ServiceDefinition {
                    method_name,
                    endpoint,
                    params: entry.params.unwrap_or_default(),
                    headers: entry.headers.unwrap_or_default(),
                },
            );
        }
        Ok(Self { services })
    }

    pub fn get(&self, method_name: &str) -> Option<&ServiceDefinition> {
        self.services.get(method_name)
    }

    /// Definitions in method-name order.
    pub fn iter(&self) -> impl Iterator<Item = &ServiceDefinition> {
        self.services.values()
    }

    pub fn len(&self) -> usize {
        self.services.len()
    }

    pub fn is_empty(&self) -> bool {
        self.services.is_empty()
    }
}

impl FromIterator<ServiceDefinition> for ServiceConfig {
    fn from_iter<I: IntoIterator<Item = ServiceDefinition>>(iter: I) -> Self {
        Self {
            services: iter
                .into_iter()
                .map(|def| (def.method_name.clone(), def))
                .collect(),
        }
    }
}
