// 🔢 Identifier Normalizer
// Raw CNPJ text ("45.954.282/0001-02") → 14 digits ("45954282000102")

use crate::error::{AnalysisError, Result};

/// Required digit count of a normalized CNPJ
pub const CNPJ_LENGTH: usize = 14;

/// A CNPJ reduced to exactly 14 ASCII digits.
///
/// Only the length is checked. The two check digits of the national numbering
/// scheme are not verified.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Cnpj(String);

impl Cnpj {
    /// Normalize `raw` and require exactly 14 digits.
    ///
    /// The error carries `raw` as supplied, not the cleaned digits.
    pub fn parse(raw: &str) -> Result<Self> {
        let digits = clean_cnpj(raw);

        if digits.len() != CNPJ_LENGTH {
            return Err(AnalysisError::InvalidIdentifier {
                input: raw.to_string(),
            });
        }

        Ok(Cnpj(digits))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for Cnpj {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// Keep only the ASCII digits of `raw`, in their original order
pub fn clean_cnpj(raw: &str) -> String {
    raw.chars().filter(|c| c.is_ascii_digit()).collect()
}

// ============================================================================
// TESTS
// ============================================================================
