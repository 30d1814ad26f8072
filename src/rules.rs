// 🏷️ Risk Rules - Rules as Data
// Points-based scoring of a RegistryRecord: status, equity, age, education CNAE

use crate::schema::RegistryRecord;
use chrono::NaiveDate;
use serde::Serialize;

// ============================================================================
// RULE SET
// ============================================================================

/// Fixed thresholds and point values of the scoring rules
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct RiskRules {
    /// Equity at or above this earns the positive points
    pub min_equity_approved: f64,

    /// Equity below this earns the negative points
    pub min_equity_alert: f64,

    /// Years of operation for the positive points
    pub min_age_approved_years: f64,

    /// Years of operation below which the negative points apply
    pub min_age_alert_years: f64,

    /// Year length used to turn a day count into years
    pub days_per_year: f64,

    /// CNAE division for education ("85 - Educação")
    pub education_cnae_prefix: &'static str,

    pub positive_points: i32,
    pub alert_points: i32,
    pub negative_points: i32,

    /// Highest score still classified as `Atencao` (lowest is 0)
    pub attention_max_score: i32,
}

impl RiskRules {
    pub const STANDARD: RiskRules = RiskRules {
        min_equity_approved: 100_000.0,
        min_equity_alert: 50_000.0,
        min_age_approved_years: 2.0,
        min_age_alert_years: 1.0,
        days_per_year: 365.25,
        education_cnae_prefix: "85",
        positive_points: 1,
        alert_points: -2,
        negative_points: -10,
        attention_max_score: 2,
    };

    /// Band for a total score: < 0 reprovado, 0..=2 atenção, > 2 aprovado
    pub fn classify(&self, score: i32) -> Classification {
        if score < 0 {
            Classification::Reprovado
        } else if score <= self.attention_max_score {
            Classification::Atencao
        } else {
            Classification::Aprovado
        }
    }
}

impl Default for RiskRules {
    fn default() -> Self {
        RiskRules::STANDARD
    }
}

// ============================================================================
// CLASSIFICATION
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum Classification {
    Reprovado,
    #[serde(rename = "Atenção")]
    Atencao,
    Aprovado,
}

impl Classification {
    pub fn from_score(score: i32) -> Self {
        RiskRules::STANDARD.classify(score)
    }

    pub fn label(&self) -> &'static str {
        match self {
            Classification::Reprovado => "Reprovado",
            Classification::Atencao => "Atenção",
            Classification::Aprovado => "Aprovado",
        }
    }
}

impl std::fmt::Display for Classification {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.label())
    }
}

// ============================================================================
// CRITERIA
// ============================================================================

/// The four criteria, in evaluation order
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum Criterion {
    ActivityStatus,
    Equity,
    OperatingAge,
    EducationActivity,
}

impl Criterion {
    pub const ALL: [Criterion; 4] = [
        Criterion::ActivityStatus,
        Criterion::Equity,
        Criterion::OperatingAge,
        Criterion::EducationActivity,
    ];
}

/// Points awarded by one criterion, with a justification unless it hit the best case
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CriterionOutcome {
    pub criterion: Criterion,
    pub points: i32,
    pub justification: Option<String>,
}

impl CriterionOutcome {
    fn positive(criterion: Criterion, points: i32) -> Self {
        CriterionOutcome {
            criterion,
            points,
            justification: None,
        }
    }

    fn penalty(criterion: Criterion, points: i32, justification: String) -> Self {
        CriterionOutcome {
            criterion,
            points,
            justification: Some(justification),
        }
    }
}

/// Summed outcome of all criteria
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RiskAssessment {
    pub score: i32,
    pub classification: Classification,
    pub justifications: Vec<String>,
}

// ============================================================================
// RISK ENGINE
// ============================================================================

/// Stateless evaluator over a fixed `RiskRules`
#[derive(Debug, Clone, Copy, Default)]
pub struct RiskEngine {
    rules: RiskRules,
}

impl RiskEngine {
    pub fn new() -> Self {
        RiskEngine {
            rules: RiskRules::STANDARD,
        }
    }

    pub fn rules(&self) -> &RiskRules {
        &self.rules
    }

    /// One outcome per criterion, in `Criterion::ALL` order
    pub fn evaluate(&self, record: &RegistryRecord, today: NaiveDate) -> Vec<CriterionOutcome> {
        vec![
            self.activity_status(record),
            self.equity(record),
            self.operating_age(record, today),
            self.education_activity(record),
        ]
    }

    /// Score `record` as of `today`
    pub fn assess(&self, record: &RegistryRecord, today: NaiveDate) -> RiskAssessment {
        let outcomes = self.evaluate(record, today);

        let score: i32 = outcomes.iter().map(|o| o.points).sum();
        let justifications: Vec<String> = outcomes
            .into_iter()
            .filter_map(|o| o.justification)
            .collect();

        RiskAssessment {
            score,
            classification: self.rules.classify(score),
            justifications,
        }
    }

    // ========================================================================
    // CRITERIA RULES
    // ========================================================================

    fn activity_status(&self, record: &RegistryRecord) -> CriterionOutcome {
        let r = &self.rules;

        if record.status.is_active() {
            return CriterionOutcome::positive(Criterion::ActivityStatus, r.positive_points);
        }

        CriterionOutcome::penalty(
            Criterion::ActivityStatus,
            r.negative_points,
            format!("CNPJ não ATIVO Status: {}.", record.status.text),
        )
    }

    fn equity(&self, record: &RegistryRecord) -> CriterionOutcome {
        let r = &self.rules;

        let equity = match record.company.equity {
            Some(equity) => equity,
            None => {
                return CriterionOutcome::penalty(
                    Criterion::Equity,
                    r.alert_points,
                    "Capital Social não informado ou nulo.".to_string(),
                )
            }
        };

        if equity >= r.min_equity_approved {
            CriterionOutcome::positive(Criterion::Equity, r.positive_points)
        } else if equity >= r.min_equity_alert {
            CriterionOutcome::penalty(
                Criterion::Equity,
                r.alert_points,
                format!(
                    "Capital Social abaixo do ideal: R$ {:.2}. Critério ideal é R$ {:.2}.",
                    equity, r.min_equity_approved
                ),
            )
        } else {
            CriterionOutcome::penalty(
                Criterion::Equity,
                r.negative_points,
                format!(
                    "Capital Social muito baixo: R$ {:.2}. Critério mínimo é R$ {:.2}.",
                    equity, r.min_equity_alert
                ),
            )
        }
    }

    fn operating_age(&self, record: &RegistryRecord, today: NaiveDate) -> CriterionOutcome {
        let r = &self.rules;

        let founded = match record.founded.as_deref() {
            Some(founded) => founded,
            None => {
                return CriterionOutcome::penalty(
                    Criterion::OperatingAge,
                    r.alert_points,
                    "Data de abertura não informada.".to_string(),
                )
            }
        };

        let opening_date = match NaiveDate::parse_from_str(founded, "%Y-%m-%d") {
            Ok(date) => date,
            Err(e) => {
                return CriterionOutcome::penalty(
                    Criterion::OperatingAge,
                    r.alert_points,
                    format!("Data de abertura inválida: '{}' ({}).", founded, e),
                )
            }
        };

        let years = (today - opening_date).num_days() as f64 / r.days_per_year;

        if years >= r.min_age_approved_years {
            CriterionOutcome::positive(Criterion::OperatingAge, r.positive_points)
        } else if years >= r.min_age_alert_years {
            CriterionOutcome::penalty(
                Criterion::OperatingAge,
                r.alert_points,
                format!(
                    "Tempo de abertura abaixo do ideal: {:.2} anos. Critério ideal é {:.2} anos.",
                    years, r.min_age_approved_years
                ),
            )
        } else {
            // Also covers founding dates in the future (negative age)
            CriterionOutcome::penalty(
                Criterion::OperatingAge,
                r.negative_points,
                format!(
                    "Tempo de abertura muito baixo: {:.2} anos. Critério mínimo é {:.2} anos.",
                    years, r.min_age_alert_years
                ),
            )
        }
    }

    fn education_activity(&self, record: &RegistryRecord) -> CriterionOutcome {
        let r = &self.rules;
        let prefix = r.education_cnae_prefix;

        if record.main_cnae.code_starts_with(prefix) {
            return CriterionOutcome::positive(Criterion::EducationActivity, r.positive_points);
        }

        if record.secondary_cnaes.iter().any(|c| c.code_starts_with(prefix)) {
            CriterionOutcome::penalty(
                Criterion::EducationActivity,
                r.alert_points,
                "CNAE principal não relacionado à educação, mas há CNAE secundário relacionado."
                    .to_string(),
            )
        } else {
            CriterionOutcome::penalty(
                Criterion::EducationActivity,
                r.negative_points,
                "Nenhum CNAE relacionado à educação encontrado.".to_string(),
            )
        }
    }
}

/// Score with the standard rules as of `today`
pub fn score(record: &RegistryRecord, today: NaiveDate) -> RiskAssessment {
    RiskEngine::new().assess(record, today)
}

// ============================================================================
// TESTS
// ============================================================================
