//! Provider contract.
//!
//! [`MarketFeed`] is the seam between ingestion and the remote market-data
//! provider. Implementations return [`RawTable`]s rather than typed records;
//! the ingestion side owns column identification and coercion so that one
//! provider quirk never leaks past the sniffers.

use std::fmt::{Display, Formatter};
use std::future::Future;
use std::pin::Pin;

use time::Date;

use crate::adjust::Adjust;
use crate::dates::{compact, parse_flex};
use crate::error::ValidationError;
use crate::market::{provider_symbol, validate_code, Market};
use crate::table::RawTable;

/// Provider-level error classification.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FeedErrorKind {
    InvalidRequest,
    Unavailable,
    Decode,
    Internal,
}

/// Structured provider error.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FeedError {
    kind: FeedErrorKind,
    message: String,
    retryable: bool,
}

impl FeedError {
    pub fn invalid_request(message: impl Into<String>) -> Self {
        Self {
            kind: FeedErrorKind::InvalidRequest,
            message: message.into(),
            retryable: false,
        }
    }

    pub fn unavailable(message: impl Into<String>) -> Self {
        Self {
            kind: FeedErrorKind::Unavailable,
            message: message.into(),
            retryable: true,
        }
    }

    pub fn decode(message: impl Into<String>) -> Self {
        Self {
            kind: FeedErrorKind::Decode,
            message: message.into(),
            retryable: false,
        }
    }

    pub fn internal(message: impl Into<String>) -> Self {
        Self {
            kind: FeedErrorKind::Internal,
            message: message.into(),
            retryable: false,
        }
    }

    pub const fn kind(&self) -> FeedErrorKind {
        self.kind
    }

    pub fn message(&self) -> &str {
        &self.message
    }

    pub const fn retryable(&self) -> bool {
        self.retryable
    }

    pub const fn code(&self) -> &'static str {
        match self.kind {
            FeedErrorKind::InvalidRequest => "feed.invalid_request",
            FeedErrorKind::Unavailable => "feed.unavailable",
            FeedErrorKind::Decode => "feed.decode",
            FeedErrorKind::Internal => "feed.internal",
        }
    }
}

impl Display for FeedError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} ({})", self.message, self.code())
    }
}

impl std::error::Error for FeedError {}

impl From<ValidationError> for FeedError {
    fn from(err: ValidationError) -> Self {
        Self::invalid_request(err.to_string())
    }
}

/// One daily-bar history fetch: a single code, date range, and one concrete
/// adjustment pass.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DailyBarsRequest {
    pub code: String,
    pub market: Option<Market>,
    pub start: Date,
    pub end: Date,
    pub adjust: Adjust,
}

impl DailyBarsRequest {
    /// Dates accept both the compact and the dashed spelling.
    pub fn new(
        code: &str,
        market: Option<Market>,
        start_date: &str,
        end_date: &str,
        adjust: Adjust,
    ) -> Result<Self, FeedError> {
        let code = validate_code(code)?.to_string();
        let start = parse_flex(start_date)?;
        let end = parse_flex(end_date)?;
        if start > end {
            return Err(ValidationError::DateOrder {
                start: compact(start),
                end: compact(end),
            }
            .into());
        }
        Ok(Self {
            code,
            market,
            start,
            end,
            adjust,
        })
    }

    /// Provider symbol spelling for this request's code.
    pub fn symbol(&self) -> String {
        provider_symbol(&self.code, self.market)
    }
}

/// Market-data provider contract.
///
/// Implementations must be `Send + Sync`; a single feed instance is shared
/// across worker controllers.
pub trait MarketFeed: Send + Sync {
    /// Stable identifier used in logs.
    fn id(&self) -> &'static str;

    /// Daily bar history for one symbol and adjustment pass.
    fn daily_bars<'a>(
        &'a self,
        request: DailyBarsRequest,
    ) -> Pin<Box<dyn Future<Output = Result<RawTable, FeedError>> + Send + 'a>>;

    /// Full security listing for one exchange.
    fn security_list<'a>(
        &'a self,
        market: Market,
    ) -> Pin<Box<dyn Future<Output = Result<RawTable, FeedError>> + Send + 'a>>;

    /// Institutional trading detail snapshot for one day. An empty table
    /// means the provider published nothing for that day (non-trading days
    /// included); only transport and decode problems are errors.
    fn institutional_detail<'a>(
        &'a self,
        date: Date,
    ) -> Pin<Box<dyn Future<Output = Result<RawTable, FeedError>> + Send + 'a>>;
}
