//! Provider adapters.
//!
//! | Adapter | Description |
//! |---------|-------------|
//! | [`EastmoneyFeed`] | Production adapter over the Eastmoney HTTP endpoints |
//! | [`ScriptedFeed`] | Deterministic in-memory feed for engine and behavior tests |

mod eastmoney;
mod scripted;

pub use eastmoney::EastmoneyFeed;
pub use scripted::ScriptedFeed;
