// 🧭 Orchestrator - per-CNPJ pipeline
// normalize → fetch → validate → score → envelope, one identifier at a time

use crate::client::RegistryClient;
use crate::cnpj::Cnpj;
use crate::error::{AnalysisError, ErrorKind, Result};
use crate::rules::{Classification, RiskAssessment, RiskEngine};
use crate::schema::{validate_record, RegistryRecord};
use chrono::{Local, NaiveDate};
use serde::Serialize;
use std::any::Any;
use std::ops::ControlFlow;
use std::panic::{self, AssertUnwindSafe};
use tracing::{error, info, warn};

// ============================================================================
// ANALYSIS RESULT
// ============================================================================

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AnalysisResult {
    /// Normalized 14-digit CNPJ
    #[serde(rename = "cnpj")]
    pub identifier: String,

    #[serde(rename = "razao_social")]
    pub legal_name: Option<String>,

    #[serde(rename = "classificacao")]
    pub classification: Classification,

    pub score: i32,

    /// One entry per criterion that missed its best case, in criterion order
    #[serde(rename = "justificativas")]
    pub justifications: Vec<String>,

    /// Validated registry record, only when raw output is enabled
    #[serde(rename = "dados_brutos", skip_serializing_if = "Option::is_none")]
    pub raw_record: Option<RegistryRecord>,
}

impl AnalysisResult {
    fn new(cnpj: Cnpj, record: RegistryRecord, assessment: RiskAssessment, include_raw: bool) -> Self {
        AnalysisResult {
            identifier: cnpj.as_str().to_string(),
            legal_name: record.company.name.clone(),
            classification: assessment.classification,
            score: assessment.score,
            justifications: assessment.justifications,
            raw_record: if include_raw { Some(record) } else { None },
        }
    }
}

// ============================================================================
// ENVELOPE
// ============================================================================

/// Uniform per-identifier outcome handed to the CLI and the UI
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "status", rename_all = "lowercase")]
pub enum Envelope {
    Success {
        /// As supplied by the caller, not normalized
        #[serde(rename = "cnpj")]
        identifier: String,
        #[serde(rename = "razao_social")]
        legal_name: Option<String>,
        data: AnalysisResult,
    },
    Error {
        #[serde(rename = "cnpj")]
        identifier: String,
        #[serde(rename = "razao_social")]
        legal_name: Option<String>,
        message: String,
        #[serde(skip)]
        kind: ErrorKind,
    },
}

impl Envelope {
    fn success(raw: &str, data: AnalysisResult) -> Self {
        Envelope::Success {
            identifier: raw.to_string(),
            legal_name: data.legal_name.clone(),
            data,
        }
    }

    fn failure(raw: &str, err: &AnalysisError) -> Self {
        Envelope::Error {
            identifier: raw.to_string(),
            legal_name: None,
            message: err.to_string(),
            kind: err.kind(),
        }
    }

    pub fn is_success(&self) -> bool {
        matches!(self, Envelope::Success { .. })
    }

    pub fn identifier(&self) -> &str {
        match self {
            Envelope::Success { identifier, .. } | Envelope::Error { identifier, .. } => identifier,
        }
    }

    pub fn data(&self) -> Option<&AnalysisResult> {
        match self {
            Envelope::Success { data, .. } => Some(data),
            Envelope::Error { .. } => None,
        }
    }

    pub fn message(&self) -> Option<&str> {
        match self {
            Envelope::Success { .. } => None,
            Envelope::Error { message, .. } => Some(message.as_str()),
        }
    }

    pub fn error_kind(&self) -> Option<ErrorKind> {
        match self {
            Envelope::Success { .. } => None,
            Envelope::Error { kind, .. } => Some(*kind),
        }
    }
}

// ============================================================================
// BATCH SUMMARY
// ============================================================================

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct BatchSummary {
    pub total: usize,
    pub succeeded: usize,
    pub failed: usize,
}

impl BatchSummary {
    fn record(&mut self, envelope: &Envelope) {
        self.total += 1;
        if envelope.is_success() {
            self.succeeded += 1;
        } else {
            self.failed += 1;
        }
    }
}

// ============================================================================
// ORCHESTRATOR
// ============================================================================

/// Holds the registry client and the scoring engine; no per-call state
pub struct Orchestrator<C> {
    client: C,
    engine: RiskEngine,
    include_raw: bool,
}

impl<C: RegistryClient> Orchestrator<C> {
    pub fn new(client: C) -> Self {
        Orchestrator {
            client,
            engine: RiskEngine::new(),
            include_raw: false,
        }
    }

    /// Attach the validated record to every successful result
    pub fn with_raw(mut self, include_raw: bool) -> Self {
        self.include_raw = include_raw;
        self
    }

    /// Analyze one identifier as of today. Never fails: every error becomes an error envelope.
    pub fn analyze(&self, raw: &str) -> Envelope {
        self.analyze_on(raw, Local::now().date_naive())
    }

    /// Analyze one identifier with an explicit evaluation date
    pub fn analyze_on(&self, raw: &str, today: NaiveDate) -> Envelope {
        info!("Iniciando análise para o CNPJ: {}", raw);

        let outcome = panic::catch_unwind(AssertUnwindSafe(|| self.run_pipeline(raw, today)))
            .unwrap_or_else(|payload| Err(AnalysisError::Unexpected(panic_message(payload))));

        match outcome {
            Ok(result) => {
                info!(
                    "CNPJ {}: {} (score {})",
                    raw, result.classification, result.score
                );
                Envelope::success(raw, result)
            }
            Err(e) => {
                match e.kind() {
                    ErrorKind::InvalidIdentifier => warn!("CNPJ inválido: {}", raw),
                    ErrorKind::Unexpected => error!("Erro inesperado na análise do CNPJ {}: {}", raw, e),
                    kind => warn!("Falha na análise do CNPJ {} [{}]: {}", raw, kind.name(), e),
                }
                Envelope::failure(raw, &e)
            }
        }
    }

    fn run_pipeline(&self, raw: &str, today: NaiveDate) -> Result<AnalysisResult> {
        let cnpj = Cnpj::parse(raw)?;
        let payload = self.client.fetch(&cnpj)?;
        let record = validate_record(&payload)?;
        let assessment = self.engine.assess(&record, today);

        Ok(AnalysisResult::new(cnpj, record, assessment, self.include_raw))
    }

    /// Analyze every non-blank identifier in order.
    ///
    /// `on_result` sees each envelope as soon as it is produced. A failure never
    /// stops the identifiers after it.
    pub fn analyze_batch<I, S, F>(&self, inputs: I, mut on_result: F) -> BatchSummary
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
        F: FnMut(&Envelope),
    {
        self.analyze_batch_until(inputs, |envelope| {
            on_result(envelope);
            ControlFlow::Continue(())
        })
    }

    /// Like `analyze_batch`, but `on_result` can stop the run by returning
    /// `ControlFlow::Break`. The remaining identifiers are not fetched and do
    /// not count in the summary.
    pub fn analyze_batch_until<I, S, F>(&self, inputs: I, mut on_result: F) -> BatchSummary
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
        F: FnMut(&Envelope) -> ControlFlow<()>,
    {
        let mut summary = BatchSummary::default();

        for input in inputs {
            let raw = input.as_ref();
            if raw.trim().is_empty() {
                continue;
            }

            let envelope = self.analyze(raw);
            summary.record(&envelope);

            if on_result(&envelope).is_break() {
                warn!("Lote interrompido após {} análises", summary.total);
                break;
            }
        }

        info!(
            "{} análises concluídas ({} sucessos, {} falhas)",
            summary.total, summary.succeeded, summary.failed
        );

        summary
    }
}

fn panic_message(payload: Box<dyn Any + Send>) -> String {
    if let Some(message) = payload.downcast_ref::<&str>() {
        message.to_string()
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message.clone()
    } else {
        "falha interna sem detalhes".to_string()
    }
}

// ============================================================================
// TESTS
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::DataSourceError;
    use serde_json::{json, Value};
    use std::collections::HashMap;
    use std::sync::Mutex;

    const SCHOOL: &str = "45954282000102";
    const MARKET: &str = "19131243000197";
    const BROKEN: &str = "11222333000181";
    const PANICS: &str = "99999999000191";

    /// In-memory registry: unknown CNPJs answer 404
    struct FixtureClient {
        payloads: HashMap<String, Value>,
        calls: Mutex<Vec<String>>,
    }

    impl FixtureClient {
        fn new() -> Self {
            let mut payloads = HashMap::new();
            payloads.insert(
                SCHOOL.to_string(),
                json!({
                    "status": { "id": 2, "text": "Ativa" },
                    "company": { "name": "ESCOLA EXEMPLO LTDA", "equity": 150000 },
                    "founded": "2015-03-10",
                    "mainActivity": { "id": 8513900, "text": "Ensino fundamental" },
                    "sideActivities": []
                }),
            );
            payloads.insert(
                MARKET.to_string(),
                json!({
                    "status": { "id": 8, "text": "Baixada" },
                    "company": { "name": "MERCADO EXEMPLO LTDA", "equity": null },
                    "mainActivity": { "id": 4711302, "text": "Supermercados" }
                }),
            );
            payloads.insert(BROKEN.to_string(), json!({ "status": "Ativa" }));

            FixtureClient {
                payloads,
                calls: Mutex::new(Vec::new()),
            }
        }

        fn calls(&self) -> Vec<String> {
            self.calls.lock().unwrap().clone()
        }
    }

    impl RegistryClient for FixtureClient {
        fn fetch(&self, cnpj: &Cnpj) -> std::result::Result<Value, DataSourceError> {
            self.calls.lock().unwrap().push(cnpj.to_string());

            if cnpj.as_str() == PANICS {
                panic!("fixture exploded");
            }

            self.payloads
                .get(cnpj.as_str())
                .cloned()
                .ok_or(DataSourceError::NotFound { status: 404 })
        }
    }

    fn today() -> NaiveDate {
        NaiveDate::from_ymd_opt(2025, 6, 15).unwrap()
    }

    fn create_orchestrator() -> Orchestrator<FixtureClient> {
        Orchestrator::new(FixtureClient::new())
    }

    #[test]
    fn test_analyze_success_keeps_raw_identifier() {
        let orchestrator = create_orchestrator();

        let envelope = orchestrator.analyze_on("45.954.282/0001-02", today());

        assert!(envelope.is_success());
        assert_eq!(envelope.identifier(), "45.954.282/0001-02");

        let data = envelope.data().unwrap();
        assert_eq!(data.identifier, SCHOOL);
        assert_eq!(data.legal_name.as_deref(), Some("ESCOLA EXEMPLO LTDA"));
        assert_eq!(data.score, 4);
        assert_eq!(data.classification, Classification::Aprovado);
        assert!(data.justifications.is_empty());
        assert!(data.raw_record.is_none());
    }

    #[test]
    fn test_analyze_rejected_company() {
        let orchestrator = create_orchestrator();

        let envelope = orchestrator.analyze_on(MARKET, today());
        let data = envelope.data().unwrap();

        assert_eq!(data.score, -24);
        assert_eq!(data.classification, Classification::Reprovado);
        assert_eq!(data.justifications.len(), 4);
    }

    #[test]
    fn test_invalid_identifier_skips_fetch() {
        let orchestrator = create_orchestrator();

        let envelope = orchestrator.analyze_on("123.456", today());

        assert!(!envelope.is_success());
        assert_eq!(envelope.identifier(), "123.456");
        assert_eq!(envelope.message(), Some("CNPJ inválido."));
        assert_eq!(envelope.error_kind(), Some(ErrorKind::InvalidIdentifier));
        assert!(orchestrator.client.calls().is_empty());
    }

    #[test]
    fn test_not_found_becomes_error_envelope() {
        let orchestrator = create_orchestrator();

        let envelope = orchestrator.analyze_on("00000000000000", today());

        assert_eq!(envelope.error_kind(), Some(ErrorKind::DataSource));
        assert!(envelope
            .message()
            .unwrap()
            .starts_with("Não foi possível encontrar os dados."));
    }

    #[test]
    fn test_schema_failure_becomes_error_envelope() {
        let orchestrator = create_orchestrator();

        let envelope = orchestrator.analyze_on(BROKEN, today());

        assert_eq!(envelope.error_kind(), Some(ErrorKind::SchemaValidation));
        let message = envelope.message().unwrap();
        assert!(message.contains("status"));
        assert!(message.contains("mainActivity"));
    }

    #[test]
    fn test_panic_in_collaborator_is_contained() {
        let orchestrator = create_orchestrator();

        let envelope = orchestrator.analyze_on(PANICS, today());

        assert_eq!(envelope.error_kind(), Some(ErrorKind::Unexpected));
        assert_eq!(
            envelope.message(),
            Some("Erro inesperado. Detalhes: fixture exploded")
        );
    }

    #[test]
    fn test_raw_record_attached_when_enabled() {
        let orchestrator = create_orchestrator().with_raw(true);

        let envelope = orchestrator.analyze_on(SCHOOL, today());
        let raw = envelope.data().unwrap().raw_record.as_ref().unwrap();

        assert_eq!(raw.main_cnae.id, 8513900);
    }

    #[test]
    fn test_batch_isolation_and_order() {
        let orchestrator = create_orchestrator();
        let mut seen = Vec::new();

        let summary = orchestrator.analyze_batch(
            vec!["123", "", "   ", PANICS, "45.954.282/0001-02", "00000000000000"],
            |envelope| seen.push((envelope.identifier().to_string(), envelope.is_success())),
        );

        assert_eq!(
            seen,
            vec![
                ("123".to_string(), false),
                (PANICS.to_string(), false),
                ("45.954.282/0001-02".to_string(), true),
                ("00000000000000".to_string(), false),
            ]
        );
        assert_eq!(
            summary,
            BatchSummary {
                total: 4,
                succeeded: 1,
                failed: 3
            }
        );
    }

    #[test]
    fn test_repeated_identifier_is_fetched_each_time() {
        let orchestrator = create_orchestrator();

        orchestrator.analyze_batch([SCHOOL, SCHOOL], |_| {});

        assert_eq!(orchestrator.client.calls(), vec![SCHOOL, SCHOOL]);
    }

    #[test]
    fn test_batch_stops_when_callback_breaks() {
        let orchestrator = create_orchestrator();
        let mut seen = Vec::new();

        let summary = orchestrator.analyze_batch_until(["", SCHOOL, MARKET, BROKEN], |envelope| {
            seen.push(envelope.identifier().to_string());
            if seen.len() == 2 {
                ControlFlow::Break(())
            } else {
                ControlFlow::Continue(())
            }
        });

        assert_eq!(seen, vec![SCHOOL, MARKET]);
        assert_eq!(orchestrator.client.calls(), vec![SCHOOL, MARKET]);
        assert_eq!(
            summary,
            BatchSummary {
                total: 2,
                succeeded: 2,
                failed: 0
            }
        );
    }

    #[test]
    fn test_raw_record_defaults_side_activities_on_the_wire() {
        let orchestrator = create_orchestrator().with_raw(true);

        let envelope = orchestrator.analyze_on(MARKET, today());
        let value = serde_json::to_value(&envelope).unwrap();
        let raw = &value["data"]["dados_brutos"];

        assert_eq!(raw["sideActivities"], json!([]));
        assert_eq!(raw["company"]["equity"], Value::Null);
        assert_eq!(raw["founded"], Value::Null);
    }

    #[test]
    fn test_success_envelope_wire_format() {
        let orchestrator = create_orchestrator();

        let envelope = orchestrator.analyze_on("45.954.282/0001-02", today());
        let value = serde_json::to_value(&envelope).unwrap();

        assert_eq!(value["status"], "success");
        assert_eq!(value["cnpj"], "45.954.282/0001-02");
        assert_eq!(value["razao_social"], "ESCOLA EXEMPLO LTDA");
        assert_eq!(value["data"]["cnpj"], SCHOOL);
        assert_eq!(value["data"]["classificacao"], "Aprovado");
        assert_eq!(value["data"]["score"], 4);
        assert_eq!(value["data"]["justificativas"], json!([]));
        assert!(value["data"].get("dados_brutos").is_none());
    }

    #[test]
    fn test_error_envelope_wire_format() {
        let orchestrator = create_orchestrator();

        let envelope = orchestrator.analyze_on("abc", today());
        let value = serde_json::to_value(&envelope).unwrap();

        assert_eq!(
            value,
            json!({
                "status": "error",
                "cnpj": "abc",
                "razao_social": null,
                "message": "CNPJ inválido."
            })
        );
    }
}
