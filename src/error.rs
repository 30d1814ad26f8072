// 🚨 Error Kinds - one enum per failure category
// Every stage returns these; only the orchestrator flattens them into envelopes

use serde::Serialize;
use thiserror::Error;

// ============================================================================
// FIELD ERRORS (schema validation detail)
// ============================================================================

/// One offending location in a registry payload
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldError {
    /// Path inside the payload (e.g. "status.id", "sideActivities[2].text")
    pub field: String,
    pub message: String,
}

impl FieldError {
    pub fn new(field: impl Into<String>, message: impl Into<String>) -> Self {
        FieldError {
            field: field.into(),
            message: message.into(),
        }
    }
}

impl std::fmt::Display for FieldError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}: {}", self.field, self.message)
    }
}

impl std::error::Error for FieldError {}

// ============================================================================
// DATA SOURCE ERRORS
// ============================================================================

#[derive(Error, Debug)]
pub enum DataSourceError {
    /// Provider answered with a non-2xx status
    #[error("Não foi possível encontrar os dados. (HTTP {status})")]
    NotFound { status: u16 },

    /// Timeout, DNS, TLS, refused connection...
    #[error("Erro de conexão com a API.")]
    Connection(#[source] reqwest::Error),

    /// 2xx response whose body is not a JSON document
    #[error("Resposta inválida da API: {0}")]
    Malformed(String),
}

// ============================================================================
// ANALYSIS ERRORS
// ============================================================================

/// Result type for a single pipeline stage
pub type Result<T> = std::result::Result<T, AnalysisError>;

#[derive(Error, Debug)]
pub enum AnalysisError {
    /// Normalized identifier does not have exactly 14 digits
    #[error("CNPJ inválido.")]
    InvalidIdentifier { input: String },

    #[error(transparent)]
    DataSource(#[from] DataSourceError),

    #[error("Dados cadastrais fora do formato esperado: {}", join_fields(.0))]
    SchemaValidation(Vec<FieldError>),

    #[error("Erro inesperado. Detalhes: {0}")]
    Unexpected(String),
}

impl AnalysisError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            AnalysisError::InvalidIdentifier { .. } => ErrorKind::InvalidIdentifier,
            AnalysisError::DataSource(_) => ErrorKind::DataSource,
            AnalysisError::SchemaValidation(_) => ErrorKind::SchemaValidation,
            AnalysisError::Unexpected(_) => ErrorKind::Unexpected,
        }
    }
}

/// Category of a failed analysis, without the detail
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum ErrorKind {
    InvalidIdentifier,
    DataSource,
    SchemaValidation,
    Unexpected,
}

impl ErrorKind {
    pub fn name(&self) -> &str {
        match self {
            ErrorKind::InvalidIdentifier => "InvalidIdentifier",
            ErrorKind::DataSource => "DataSourceError",
            ErrorKind::SchemaValidation => "SchemaValidation",
            ErrorKind::Unexpected => "UnexpectedFailure",
        }
    }
}

fn join_fields(errors: &[FieldError]) -> String {
    errors
        .iter()
        .map(|e| e.to_string())
        .collect::<Vec<_>>()
        .join("; ")
}

// ============================================================================
// TESTS
// ============================================================================
