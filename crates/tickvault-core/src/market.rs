//! Exchange identifiers and provider symbol derivation.
//!
//! The provider spells symbols as a lowercase exchange prefix glued to the
//! bare code (`sh600000`). The securities table stores the exchange as an
//! uppercase tag. When no market hint is available the prefix of the code
//! itself is consulted; that inference is a heuristic with known gaps (newer
//! allocation ranges), so the default branch logs instead of silently
//! mis-routing a fetch.

use std::fmt::{Display, Formatter};

use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::error::ValidationError;

/// Mainland exchange a security trades on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Market {
    Sh,
    Sz,
    Bj,
}

impl Market {
    /// All exchanges, in the order the securities table is seeded.
    pub const ALL: [Market; 3] = [Market::Sh, Market::Sz, Market::Bj];

    /// Uppercase exchange tag as stored in the securities table.
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Sh => "SH",
            Self::Sz => "SZ",
            Self::Bj => "BJ",
        }
    }

    /// Lowercase prefix the provider expects in front of the bare code.
    pub const fn symbol_prefix(self) -> &'static str {
        match self {
            Self::Sh => "sh",
            Self::Sz => "sz",
            Self::Bj => "bj",
        }
    }

    pub fn parse(value: &str) -> Result<Self, ValidationError> {
        match value.trim().to_ascii_uppercase().as_str() {
            "SH" => Ok(Self::Sh),
            "SZ" => Ok(Self::Sz),
            "BJ" => Ok(Self::Bj),
            _ => Err(ValidationError::InvalidMarket {
                value: value.to_string(),
            }),
        }
    }
}

impl Display for Market {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl TryFrom<&str> for Market {
    type Error = ValidationError;

    fn try_from(value: &str) -> Result<Self, Self::Error> {
        Self::parse(value)
    }
}

// Allocation prefixes per exchange. Newer ranges appear over time, so absence
// from these lists means "unknown", not "invalid".
const SH_PREFIXES: [&str; 5] = ["600", "601", "603", "605", "688"];
const SZ_PREFIXES: [&str; 5] = ["000", "001", "002", "300", "301"];
const BJ_PREFIXES: [&str; 3] = ["430", "83", "87"];

/// Best-effort market inference from the code's allocation prefix.
pub fn infer_market(code: &str) -> Option<Market> {
    let code = code.trim();
    if SH_PREFIXES.iter().any(|p| code.starts_with(p)) {
        return Some(Market::Sh);
    }
    if SZ_PREFIXES.iter().any(|p| code.starts_with(p)) {
        return Some(Market::Sz);
    }
    if BJ_PREFIXES.iter().any(|p| code.starts_with(p)) {
        return Some(Market::Bj);
    }
    None
}

/// Derives the provider's symbol spelling for a bare code.
///
/// An explicit market hint always wins. Without one the allocation prefix is
/// consulted; when that recognizes nothing the SZ spelling is used and the
/// fallthrough is logged.
pub fn provider_symbol(code: &str, market: Option<Market>) -> String {
    let resolved = market.or_else(|| infer_market(code)).unwrap_or_else(|| {
        warn!(code, "market not recognized from code prefix, defaulting to SZ");
        Market::Sz
    });
    format!("{}{}", resolved.symbol_prefix(), code.trim())
}

/// Validates a bare security code (no exchange prefix).
pub fn validate_code(code: &str) -> Result<&str, ValidationError> {
    const MAX_CODE_LEN: usize = 12;

    let code = code.trim();
    if code.is_empty() {
        return Err(ValidationError::EmptyCode);
    }
    if code.len() > MAX_CODE_LEN {
        return Err(ValidationError::CodeTooLong {
            len: code.len(),
            max: MAX_CODE_LEN,
        });
    }
    for (index, ch) in code.chars().enumerate() {
        if !ch.is_ascii_alphanumeric() {
            return Err(ValidationError::CodeInvalidChar { ch, index });
        }
    }
    Ok(code)
}
