// 📐 Shape Layer - Registry Record Validation
// Maps the provider's untyped JSON into a typed RegistryRecord

use crate::error::{AnalysisError, FieldError, Result};
use serde::Serialize;
use serde_json::{Map, Value};

// ============================================================================
// PROVIDER FIELD NAMES (aliases)
// ============================================================================

pub const STATUS_FIELD: &str = "status";
pub const COMPANY_FIELD: &str = "company";
pub const FOUNDED_FIELD: &str = "founded";
pub const MAIN_ACTIVITY_FIELD: &str = "mainActivity";
pub const SIDE_ACTIVITIES_FIELD: &str = "sideActivities";

const MISSING: &str = "campo obrigatório ausente";

// ============================================================================
// RECORD TYPES
// ============================================================================

/// Registration status as reported by the registry
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Status {
    pub id: i64,
    /// e.g. "Ativa", "Baixada", "Inapta"
    pub text: String,
}

impl Status {
    /// Case-insensitive match against "ATIVA"
    pub fn is_active(&self) -> bool {
        self.text.to_uppercase() == "ATIVA"
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Company {
    /// Legal name (razão social)
    pub name: Option<String>,

    /// Declared share capital. `None` = not disclosed, which is not the same as 0.0
    pub equity: Option<f64>,
}

/// A declared business activity (CNAE code + label)
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Activity {
    pub id: i64,
    pub text: String,
}

impl Activity {
    pub fn code_starts_with(&self, prefix: &str) -> bool {
        self.id.to_string().starts_with(prefix)
    }
}

/// Validated registry data for one CNPJ
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RegistryRecord {
    pub status: Status,
    pub company: Company,

    /// Kept as text: an unparsable date is a scoring outcome, not a schema error
    pub founded: Option<String>,

    #[serde(rename = "mainActivity")]
    pub main_cnae: Activity,

    #[serde(rename = "sideActivities")]
    pub secondary_cnaes: Vec<Activity>,
}

impl RegistryRecord {
    pub fn legal_name(&self) -> Option<&str> {
        self.company.name.as_deref()
    }
}

// ============================================================================
// VALIDATION
// ============================================================================

/// Validate a provider payload.
///
/// Required: `status{id,text}`, `company{name?,equity?}`, `mainActivity{id,text}`.
/// Defaults: `founded` → None, `sideActivities` → empty. Unknown keys are dropped.
/// Every offending field path is reported, not just the first one.
pub fn validate_record(payload: &Value) -> Result<RegistryRecord> {
    let root = match payload.as_object() {
        Some(root) => root,
        None => {
            return Err(AnalysisError::SchemaValidation(vec![FieldError::new(
                "$",
                format!("esperado um objeto, recebido {}", type_name(payload)),
            )]))
        }
    };

    let mut errors = Vec::new();

    let status = required(root, STATUS_FIELD, STATUS_FIELD, &mut errors)
        .and_then(|v| code_pair(v, STATUS_FIELD, &mut errors))
        .map(|(id, text)| Status { id, text });

    let company = required(root, COMPANY_FIELD, COMPANY_FIELD, &mut errors)
        .and_then(|v| company(v, &mut errors));

    let founded = founded(root.get(FOUNDED_FIELD), &mut errors);

    let main_cnae = required(root, MAIN_ACTIVITY_FIELD, MAIN_ACTIVITY_FIELD, &mut errors)
        .and_then(|v| code_pair(v, MAIN_ACTIVITY_FIELD, &mut errors))
        .map(|(id, text)| Activity { id, text });

    let secondary_cnaes = side_activities(root.get(SIDE_ACTIVITIES_FIELD), &mut errors);

    match (status, company, main_cnae) {
        (Some(status), Some(company), Some(main_cnae)) if errors.is_empty() => Ok(RegistryRecord {
            status,
            company,
            founded,
            main_cnae,
            secondary_cnaes,
        }),
        _ => Err(AnalysisError::SchemaValidation(errors)),
    }
}

fn required<'a>(
    obj: &'a Map<String, Value>,
    key: &str,
    path: &str,
    errors: &mut Vec<FieldError>,
) -> Option<&'a Value> {
    match obj.get(key) {
        Some(Value::Null) | None => {
            errors.push(FieldError::new(path, MISSING));
            None
        }
        Some(value) => Some(value),
    }
}

/// `{ "id": <integer>, "text": <string> }`
fn code_pair(value: &Value, path: &str, errors: &mut Vec<FieldError>) -> Option<(i64, String)> {
    let obj = match value.as_object() {
        Some(obj) => obj,
        None => {
            errors.push(FieldError::new(
                path,
                format!("esperado um objeto com id/text, recebido {}", type_name(value)),
            ));
            return None;
        }
    };

    let id_path = format!("{}.id", path);
    let id = required(obj, "id", &id_path, errors).and_then(|v| match integer(v) {
        Some(id) => Some(id),
        None => {
            errors.push(FieldError::new(
                &id_path,
                format!("esperado um inteiro, recebido {}", type_name(v)),
            ));
            None
        }
    });

    let text_path = format!("{}.text", path);
    let text = required(obj, "text", &text_path, errors).and_then(|v| match v.as_str() {
        Some(text) => Some(text.to_string()),
        None => {
            errors.push(FieldError::new(
                &text_path,
                format!("esperado um texto, recebido {}", type_name(v)),
            ));
            None
        }
    });

    Some((id?, text?))
}

/// Integers, and floats with no fractional part (`8513900.0`)
fn integer(value: &Value) -> Option<i64> {
    value.as_i64().or_else(|| {
        value
            .as_f64()
            .filter(|f| f.fract() == 0.0 && *f >= i64::MIN as f64 && *f < i64::MAX as f64)
            .map(|f| f as i64)
    })
}

fn company(value: &Value, errors: &mut Vec<FieldError>) -> Option<Company> {
    let obj = match value.as_object() {
        Some(obj) => obj,
        None => {
            errors.push(FieldError::new(
                COMPANY_FIELD,
                format!("esperado um objeto, recebido {}", type_name(value)),
            ));
            return None;
        }
    };

    let before = errors.len();

    let name = match obj.get("name") {
        None | Some(Value::Null) => None,
        Some(Value::String(name)) => Some(name.clone()),
        Some(other) => {
            errors.push(FieldError::new(
                "company.name",
                format!("esperado um texto, recebido {}", type_name(other)),
            ));
            None
        }
    };

    let equity = match obj.get("equity") {
        None | Some(Value::Null) => None,
        Some(Value::Number(n)) => match n.as_f64() {
            Some(equity) if equity >= 0.0 => Some(equity),
            _ => {
                errors.push(FieldError::new(
                    "company.equity",
                    format!("esperado um valor não negativo, recebido {}", n),
                ));
                None
            }
        },
        Some(other) => {
            errors.push(FieldError::new(
                "company.equity",
                format!("esperado um número, recebido {}", type_name(other)),
            ));
            None
        }
    };

    if errors.len() > before {
        return None;
    }

    Some(Company { name, equity })
}

fn founded(value: Option<&Value>, errors: &mut Vec<FieldError>) -> Option<String> {
    match value {
        None | Some(Value::Null) => None,
        Some(Value::String(date)) => Some(date.clone()),
        Some(other) => {
            errors.push(FieldError::new(
                FOUNDED_FIELD,
                format!("esperado um texto AAAA-MM-DD, recebido {}", type_name(other)),
            ));
            None
        }
    }
}

fn side_activities(value: Option<&Value>, errors: &mut Vec<FieldError>) -> Vec<Activity> {
    let items = match value {
        None | Some(Value::Null) => return Vec::new(),
        Some(Value::Array(items)) => items,
        Some(other) => {
            errors.push(FieldError::new(
                SIDE_ACTIVITIES_FIELD,
                format!("esperada uma lista, recebido {}", type_name(other)),
            ));
            return Vec::new();
        }
    };

    items
        .iter()
        .enumerate()
        .filter_map(|(i, item)| {
            let path = format!("{}[{}]", SIDE_ACTIVITIES_FIELD, i);
            code_pair(item, &path, errors).map(|(id, text)| Activity { id, text })
        })
        .collect()
}

fn type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "booleano",
        Value::Number(_) => "número",
        Value::String(_) => "texto",
        Value::Array(_) => "lista",
        Value::Object(_) => "objeto",
    }
}

// ============================================================================
// TESTS
// ============================================================================
