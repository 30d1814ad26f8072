// ⚙️ Configuration - registry endpoint and output options

use std::time::Duration;

/// Public CNPJá office endpoint; the CNPJ is appended as a path segment
pub const DEFAULT_API_URL: &str = "https://open.cnpja.com/office";

/// Per-request timeout of a registry lookup
pub const DEFAULT_TIMEOUT_SECS: u64 = 10;

#[derive(Debug, Clone, PartialEq)]
pub struct RegistryConfig {
    pub base_url: String,
    pub timeout: Duration,

    /// Attach the validated registry record to each AnalysisResult (`dados_brutos`)
    pub include_raw: bool,
}

impl RegistryConfig {
    pub fn new(base_url: impl Into<String>, timeout: Duration) -> Self {
        RegistryConfig {
            base_url: base_url.into(),
            timeout,
            include_raw: false,
        }
    }

    pub fn with_raw(mut self, include_raw: bool) -> Self {
        self.include_raw = include_raw;
        self
    }

    /// Lookup URL for an already-normalized CNPJ
    pub fn office_url(&self, cnpj: &str) -> String {
        format!("{}/{}", self.base_url.trim_end_matches('/'), cnpj)
    }
}

impl Default for RegistryConfig {
    fn default() -> Self {
        RegistryConfig::new(DEFAULT_API_URL, Duration::from_secs(DEFAULT_TIMEOUT_SECS))
    }
}
