use thiserror::Error;

/// Validation failures raised while constructing requests and domain values.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ValidationError {
    #[error("security code cannot be empty")]
    EmptyCode,
    #[error("security code length {len} exceeds max {max}")]
    CodeTooLong { len: usize, max: usize },
    #[error("security code contains invalid character '{ch}' at index {index}")]
    CodeInvalidChar { ch: char, index: usize },

    #[error("invalid market '{value}', expected one of SH, SZ, BJ")]
    InvalidMarket { value: String },
    #[error("invalid adjust mode '{value}', expected one of \"\", qfq, hfq, all")]
    InvalidAdjust { value: String },

    #[error("date must be YYYYMMDD or YYYY-MM-DD: '{value}'")]
    InvalidDate { value: String },
    #[error("start date {start} is after end date {end}")]
    DateOrder { start: String, end: String },
}
