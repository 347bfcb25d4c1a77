//! # Tickvault Core
//!
//! Domain types and the market-data provider contract for tickvault.
//!
//! ## Overview
//!
//! This crate provides the foundational components for tickvault:
//!
//! - **Validated domain values** for security codes, markets, and adjustment modes
//! - **Provider contract** ([`MarketFeed`]) with request types and structured errors
//! - **Raw tabular exchange type** ([`RawTable`]) that keeps upstream schema drift visible
//! - **Schema sniffing** for the provider's drifting column names
//! - **Tolerant numeric coercion** for dirty provider cells
//! - **Request throttling** for the rate-limited upstream
//!
//! ## Modules
//!
//! | Module | Description |
//! |--------|-------------|
//! | [`adapters`] | Provider adapters (Eastmoney, scripted test feed) |
//! | [`adjust`] | Price adjustment modes (raw, qfq, hfq) |
//! | [`coerce`] | Tolerant cell-to-number coercion |
//! | [`dates`] | Compact / dashed trade-date codecs |
//! | [`error`] | Validation errors |
//! | [`feed`] | Provider trait, request types, feed errors |
//! | [`http`] | HTTP client abstraction |
//! | [`market`] | Exchange identifiers and symbol derivation |
//! | [`sniff`] | Column sniffers for drifting provider schemas |
//! | [`table`] | Raw provider table |
//! | [`throttle`] | Request budget over the provider |
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use tickvault_core::{Adjust, DailyBarsRequest, EastmoneyFeed, MarketFeed};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let feed = EastmoneyFeed::default();
//!     let request = DailyBarsRequest::new("600000", None, "19900101", "20240101", Adjust::Forward)?;
//!     let table = feed.daily_bars(request).await?;
//!     println!("{} rows", table.rows.len());
//!     Ok(())
//! }
//! ```
//!
//! ## Error Handling
//!
//! Provider operations return [`FeedError`] carrying a [`FeedErrorKind`]:
//!
//! ```rust
//! use tickvault_core::{FeedError, FeedErrorKind};
//!
//! fn handle_error(error: FeedError) {
//!     match error.kind() {
//!         FeedErrorKind::Unavailable => {
//!             // transient, safe to retry later
//!         }
//!         FeedErrorKind::InvalidRequest => {
//!             // caller bug, report
//!         }
//!         _ => {}
//!     }
//! }
//! ```

pub mod adapters;
pub mod adjust;
pub mod coerce;
pub mod dates;
pub mod error;
pub mod feed;
pub mod http;
pub mod market;
pub mod sniff;
pub mod table;
pub mod throttle;

// Re-export commonly used types at crate root for convenience

// Adapter implementations
pub use adapters::{EastmoneyFeed, ScriptedFeed};

// Adjustment modes
pub use adjust::Adjust;

// Date helpers
pub use dates::{compact, dashed, parse_flex, today, window_start};

// Error types
pub use error::ValidationError;

// Provider contract
pub use feed::{DailyBarsRequest, FeedError, FeedErrorKind, MarketFeed};

// HTTP client types
pub use http::{HttpClient, HttpError, HttpRequest, HttpResponse, NoopHttpClient, ReqwestHttpClient};

// Market identifiers
pub use market::{infer_market, provider_symbol, Market};

// Raw provider table
pub use table::RawTable;

// Throttling
pub use throttle::RequestBudget;
