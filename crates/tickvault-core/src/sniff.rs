//! Column sniffers for the provider's drifting schemas.
//!
//! The provider renames and reorders columns between endpoint generations and
//! mixes Chinese and English header dialects. Each ingestion path therefore
//! identifies its columns through an explicit sniffer here instead of fixed
//! names, so a drifted header shows up as a failing unit test rather than a
//! silent empty batch.
//!
//! | Sniffer | Feeds |
//! |---------|-------|
//! | [`BarColumns`] | daily bar history |
//! | [`FlowColumns`] | institutional trading detail |
//! | [`ListingColumns`] | per-exchange security listings |

/// First column whose name equals any candidate; candidate order wins.
pub fn find_exact(columns: &[String], candidates: &[&str]) -> Option<usize> {
    for candidate in candidates {
        if let Some(index) = columns.iter().position(|c| c == candidate) {
            return Some(index);
        }
    }
    None
}

/// First column whose name contains every required substring.
pub fn find_with_substrings(columns: &[String], required: &[&str]) -> Option<usize> {
    columns
        .iter()
        .position(|c| required.iter().all(|frag| c.contains(frag)))
}

/// First column whose name contains any of the fragments.
pub fn find_any_substring(columns: &[String], fragments: &[&str]) -> Option<usize> {
    columns
        .iter()
        .position(|c| fragments.iter().any(|frag| c.contains(frag)))
}

/// First column whose lowercased name contains the lowercased needle.
pub fn find_ci_substring(columns: &[String], needle: &str) -> Option<usize> {
    let needle = needle.to_lowercase();
    columns
        .iter()
        .position(|c| c.to_lowercase().contains(&needle))
}

/// Column indices of a daily-bar history table.
///
/// The trade date is required; every price/volume field is optional and reads
/// as null when its column is missing.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BarColumns {
    pub date: usize,
    pub open: Option<usize>,
    pub close: Option<usize>,
    pub high: Option<usize>,
    pub low: Option<usize>,
    pub volume: Option<usize>,
    pub amount: Option<usize>,
    pub turnover: Option<usize>,
    pub outstanding_share: Option<usize>,
}

impl BarColumns {
    /// Matches both the Chinese and the English header dialect. `None` when
    /// no trade-date column is present, in which case the table is unusable.
    pub fn sniff(columns: &[String]) -> Option<Self> {
        let date = find_exact(columns, &["日期", "date", "trade_date"])?;
        Some(Self {
            date,
            open: find_exact(columns, &["开盘", "open"]),
            close: find_exact(columns, &["收盘", "close"]),
            high: find_exact(columns, &["最高", "high"]),
            low: find_exact(columns, &["最低", "low"]),
            volume: find_exact(columns, &["成交量", "volume"]),
            amount: find_exact(columns, &["成交额", "amount"]),
            turnover: find_exact(columns, &["换手率", "turnover"]),
            outstanding_share: find_exact(columns, &["流通股本", "outstanding_share"]),
        })
    }
}

/// Column indices of an institutional trading detail table.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FlowColumns {
    pub code: usize,
    pub name: Option<usize>,
    pub buy: Option<usize>,
    pub sell: Option<usize>,
    pub net: Option<usize>,
}

impl FlowColumns {
    /// Chinese headers match by substring (amount columns additionally carry
    /// a `万` unit marker); the English fallbacks cover the newer ALL-CAPS
    /// endpoint generation (`BILLBOARD_BUY_AMT` and friends).
    pub fn sniff(columns: &[String]) -> Option<Self> {
        let code = find_any_substring(columns, &["代码"])
            .or_else(|| find_ci_substring(columns, "code"))?;
        let name = find_any_substring(columns, &["名称", "简称"])
            .or_else(|| find_ci_substring(columns, "name"));
        let buy = find_with_substrings(columns, &["买入", "万"])
            .or_else(|| find_ci_substring(columns, "buy"));
        let sell = find_with_substrings(columns, &["卖出", "万"])
            .or_else(|| find_ci_substring(columns, "sell"));
        let net = find_with_substrings(columns, &["净额", "万"])
            .or_else(|| find_ci_substring(columns, "net"));
        Some(Self {
            code,
            name,
            buy,
            sell,
            net,
        })
    }
}

/// Column indices of a per-exchange security listing table.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ListingColumns {
    pub code: usize,
    pub name: Option<usize>,
    pub company_name: Option<usize>,
    pub listing_date: Option<usize>,
}

impl ListingColumns {
    /// The exchanges label the same fields differently (`证券代码` on one,
    /// `A股代码` on another); candidates are in preference order.
    pub fn sniff(columns: &[String]) -> Option<Self> {
        let code = find_exact(columns, &["代码", "证券代码", "A股代码", "股票代码", "code"])?;
        let name = find_exact(columns, &["证券简称", "A股简称", "股票简称", "名称", "name"]);
        let company_name = find_exact(
            columns,
            &["公司名称", "公司全称", "企业名称", "证券简称", "A股简称"],
        );
        let listing_date = find_exact(columns, &["上市日期", "上市时间", "A股上市日期", "listing_date"]);
        Some(Self {
            code,
            name,
            company_name,
            listing_date,
        })
    }
}
