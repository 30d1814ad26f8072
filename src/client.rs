// 🌐 Registry Client - CNPJá lookups
// One blocking GET per CNPJ, bounded by the configured timeout

use crate::cnpj::Cnpj;
use crate::config::RegistryConfig;
use crate::error::DataSourceError;
use reqwest::blocking::Client;
use reqwest::header::{ACCEPT, USER_AGENT};
use serde_json::Value;
use tracing::{debug, warn};

// ============================================================================
// CLIENT TRAIT
// ============================================================================

/// Source of raw registry payloads.
///
/// The orchestrator only depends on this trait, so lookups can be served by
/// the HTTP provider or by an in-memory fixture.
pub trait RegistryClient: Send + Sync {
    /// Fetch the untyped registry payload for a normalized CNPJ
    fn fetch(&self, cnpj: &Cnpj) -> Result<Value, DataSourceError>;
}

impl<T: RegistryClient + ?Sized> RegistryClient for Box<T> {
    fn fetch(&self, cnpj: &Cnpj) -> Result<Value, DataSourceError> {
        (**self).fetch(cnpj)
    }
}

// ============================================================================
// HTTP CLIENT
// ============================================================================

pub struct CnpjaClient {
    client: Client,
    config: RegistryConfig,
}

impl CnpjaClient {
    pub fn new(config: RegistryConfig) -> Result<Self, DataSourceError> {
        let client = Client::builder()
            .timeout(config.timeout)
            .build()
            .map_err(DataSourceError::Connection)?;

        Ok(CnpjaClient { client, config })
    }
}

impl RegistryClient for CnpjaClient {
    fn fetch(&self, cnpj: &Cnpj) -> Result<Value, DataSourceError> {
        let url = self.config.office_url(cnpj.as_str());
        debug!("GET {}", url);

        let response = self
            .client
            .get(&url)
            .header(USER_AGENT, format!("cnpj-xray/{}", env!("CARGO_PKG_VERSION")))
            .header(ACCEPT, "application/json")
            .send()
            .map_err(|e| {
                warn!("Registry request failed for {}: {}", cnpj, e);
                DataSourceError::Connection(e)
            })?;

        let status = response.status();
        if !status.is_success() {
            warn!("Registry answered HTTP {} for {}", status.as_u16(), cnpj);
            return Err(DataSourceError::NotFound {
                status: status.as_u16(),
            });
        }

        let body = response.text().map_err(DataSourceError::Connection)?;

        serde_json::from_str(&body).map_err(|e| DataSourceError::Malformed(e.to_string()))
    }
}

// ============================================================================
// TESTS
// ============================================================================
