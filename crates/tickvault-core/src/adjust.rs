//! Price adjustment modes for daily bars.
//!
//! The provider encodes the mode as `""` (as-traded), `"qfq"`
//! (forward-adjusted) or `"hfq"` (backward-adjusted); task parameters may also
//! say `"all"`, which expands to one fetch-and-write pass per concrete mode.

use serde::{Deserialize, Serialize};

use crate::error::ValidationError;

/// A concrete price adjustment mode, one fetch pass each.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum Adjust {
    Raw,
    Forward,
    Backward,
}

impl Adjust {
    /// The three concrete modes in the order an `"all"` request runs them.
    pub const PASSES: [Adjust; 3] = [Adjust::Raw, Adjust::Forward, Adjust::Backward];

    /// Wire form the provider and the daily_bars table use.
    pub const fn wire(self) -> &'static str {
        match self {
            Self::Raw => "",
            Self::Forward => "qfq",
            Self::Backward => "hfq",
        }
    }

    /// Parses a concrete mode; `"all"` is not concrete and is rejected here.
    pub fn parse(value: &str) -> Result<Self, ValidationError> {
        match value.trim().to_ascii_lowercase().as_str() {
            "" => Ok(Self::Raw),
            "qfq" => Ok(Self::Forward),
            "hfq" => Ok(Self::Backward),
            _ => Err(ValidationError::InvalidAdjust {
                value: value.to_string(),
            }),
        }
    }

    /// Expands a parameter value into the passes to run: `"all"` becomes the
    /// three concrete modes, anything else a single pass.
    pub fn expand(value: &str) -> Result<Vec<Adjust>, ValidationError> {
        if value.trim().eq_ignore_ascii_case("all") {
            return Ok(Self::PASSES.to_vec());
        }
        Ok(vec![Self::parse(value)?])
    }
}

impl TryFrom<String> for Adjust {
    type Error = ValidationError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::parse(&value)
    }
}

impl From<Adjust> for String {
    fn from(value: Adjust) -> Self {
        value.wire().to_string()
    }
}
