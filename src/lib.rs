// CNPJ X-Ray - Core Library
// Shared by the CLI batch runner and the local UI server

pub mod cnpj;         // Identifier normalization
pub mod schema;       // Registry payload → RegistryRecord
pub mod rules;        // Points-based risk scoring
pub mod client;       // Registry data provider
pub mod orchestrator; // Per-CNPJ pipeline + batch driver
pub mod config;
pub mod error;

// Re-export commonly used types
pub use cnpj::{clean_cnpj, Cnpj, CNPJ_LENGTH};
pub use schema::{validate_record, Activity, Company, RegistryRecord, Status};
pub use rules::{
    score, Classification, Criterion, CriterionOutcome, RiskAssessment, RiskEngine, RiskRules,
};
pub use client::{CnpjaClient, RegistryClient};
pub use orchestrator::{AnalysisResult, BatchSummary, Envelope, Orchestrator};
pub use config::{RegistryConfig, DEFAULT_API_URL, DEFAULT_TIMEOUT_SECS};
pub use error::{AnalysisError, DataSourceError, ErrorKind, FieldError};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
