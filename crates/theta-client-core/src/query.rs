use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// Asset class of a logical query.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum AssetClass {
    Stock,
    Option,
}

impl AssetClass {
    pub fn as_segment(self) -> &'static str {
        match self {
            AssetClass::Stock => "stock",
            AssetClass::Option => "option",
        }
    }
}

/// Upstream data type. Only `History` exists today; the enum leaves room for
/// a future `Snapshot` without reshaping the object-key format.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum DataType {
    History,
}

impl DataType {
    pub fn as_segment(self) -> &'static str {
        match self {
            DataType::History => "history",
        }
    }
}

/// Upstream data product.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Endpoint {
    Eod,
    Quote,
    Trade,
    TradeQuote,
    GreeksFirstOrder,
    GreeksEod,
}

impl Endpoint {
    pub fn as_segment(self) -> &'static str {
        match self {
            Endpoint::Eod => "eod",
            Endpoint::Quote => "quote",
            Endpoint::Trade => "trade",
            Endpoint::TradeQuote => "trade_quote",
            Endpoint::GreeksFirstOrder => "greeks/first_order",
            Endpoint::GreeksEod => "greeks/eod",
        }
    }

    /// EOD endpoints use `start_date`/`end_date` params and a fixed `1d`
    /// interval tag; all others are per-day interval endpoints.
    pub fn is_eod(self) -> bool {
        matches!(self, Endpoint::Eod | Endpoint::GreeksEod)
    }
}

/// Aggregation interval, consulted only for non-EOD endpoints.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Interval {
    Tick,
    Ms10,
    Ms100,
    Ms500,
    S1,
    S5,
    S15,
    S30,
    M1,
    M5,
    M15,
    M30,
    H1,
}

impl Interval {
    pub fn as_tag(self) -> &'static str {
        match self {
            Interval::Tick => "tick",
            Interval::Ms10 => "10ms",
            Interval::Ms100 => "100ms",
            Interval::Ms500 => "500ms",
            Interval::S1 => "1s",
            Interval::S5 => "5s",
            Interval::S15 => "15s",
            Interval::S30 => "30s",
            Interval::M1 => "1m",
            Interval::M5 => "5m",
            Interval::M15 => "15m",
            Interval::M30 => "30m",
            Interval::H1 => "1h",
        }
    }
}

/// Period covered by a single output file.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum FileGranularity {
    Daily,
    Monthly,
}

impl FileGranularity {
    pub fn as_segment(self) -> &'static str {
        match self {
            FileGranularity::Daily => "daily",
            FileGranularity::Monthly => "monthly",
        }
    }
}

/// Closed enumeration selecting the output column layout for a decoded CSV
/// response. See `theta_client_core::schema` for the field-list mapping.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum SchemaTag {
    StockEod,
    StockQuote,
    OptionEod,
    OptionQuote,
    OptionTrade,
    OptionTradeQuote,
    GreekFirstOrder,
    GreekEod,
}

/// Resolve the schema tag produced by a given `(asset_class, endpoint)` pair.
///
/// This is total over every combination `validate_combination` accepts; any
/// combination it rejects is never passed here.
pub fn schema_tag_for(asset_class: AssetClass, endpoint: Endpoint) -> SchemaTag {
    match (asset_class, endpoint) {
        (AssetClass::Stock, Endpoint::Eod) => SchemaTag::StockEod,
        (AssetClass::Stock, Endpoint::Quote) => SchemaTag::StockQuote,
        (AssetClass::Option, Endpoint::Eod) => SchemaTag::OptionEod,
        (AssetClass::Option, Endpoint::Quote) => SchemaTag::OptionQuote,
        (AssetClass::Option, Endpoint::Trade) => SchemaTag::OptionTrade,
        (AssetClass::Option, Endpoint::TradeQuote) => SchemaTag::OptionTradeQuote,
        (AssetClass::Option, Endpoint::GreeksFirstOrder) => SchemaTag::GreekFirstOrder,
        (AssetClass::Option, Endpoint::GreeksEod) => SchemaTag::GreekEod,
        (asset_class, endpoint) => unreachable!(
            "unvalidated combination reached schema_tag_for: {asset_class:?}/{endpoint:?}",
        ),
    }
}

fn validate_combination(asset_class: AssetClass, endpoint: Endpoint) -> Result<()> {
    let ok = match asset_class {
        AssetClass::Stock => matches!(endpoint, Endpoint::Eod | Endpoint::Quote),
        AssetClass::Option => matches!(
            endpoint,
            Endpoint::Eod
                | Endpoint::Quote
                | Endpoint::Trade
                | Endpoint::TradeQuote
                | Endpoint::GreeksEod
                | Endpoint::GreeksFirstOrder
        ),
    };
    if ok {
        Ok(())
    } else {
        Err(Error::Validation(format!(
            "endpoint {endpoint:?} is not valid for asset class {asset_class:?}"
        )))
    }
}

/// Immutable, validated description of a bulk-ingestion request.
///
/// Constructed once via [`LogicalQuery::new`]; every field is public and
/// read-only thereafter (no setters — a new query is built instead of an
/// existing one mutated, matching the "no in-flight mutation" non-goal).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LogicalQuery {
    pub symbol: String,
    pub start_date: u32,
    pub end_date: u32,
    pub asset_class: AssetClass,
    pub data_type: DataType,
    pub endpoint: Endpoint,
    pub interval: Interval,
    pub file_granularity: FileGranularity,
    pub force_refresh: bool,
}

impl LogicalQuery {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        symbol: impl Into<String>,
        start_date: u32,
        end_date: u32,
        asset_class: AssetClass,
        endpoint: Endpoint,
        interval: Interval,
        file_granularity: FileGranularity,
        force_refresh: bool,
    ) -> Result<Self> {
        validate_combination(asset_class, endpoint)?;
        if start_date > end_date {
            return Err(Error::Validation(format!(
                "start_date {start_date} is after end_date {end_date}"
            )));
        }
        Ok(Self {
            symbol: symbol.into().to_uppercase(),
            start_date,
            end_date,
            asset_class,
            data_type: DataType::History,
            endpoint,
            interval,
            file_granularity,
            force_refresh,
        })
    }

    pub fn schema_tag(&self) -> SchemaTag {
        schema_tag_for(self.asset_class, self.endpoint)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn stock_rejects_trade_endpoint() {
        let err = LogicalQuery::new(
            "aapl",
            20250101,
            20250102,
            AssetClass::Stock,
            Endpoint::Trade,
            Interval::M1,
            FileGranularity::Monthly,
            false,
        )
        .unwrap_err();
        assert!(matches!(err, Error::Validation(_)));
    }

    #[test]
    fn option_accepts_greeks_eod() {
        let q = LogicalQuery::new(
            "AAPL",
            20250101,
            20250102,
            AssetClass::Option,
            Endpoint::GreeksEod,
            Interval::M1,
            FileGranularity::Monthly,
            false,
        )
        .unwrap();
        assert_eq!(q.schema_tag(), SchemaTag::GreekEod);
    }

    #[test]
    fn symbol_is_uppercased() {
        let q = LogicalQuery::new(
            "aapl",
            20250101,
            20250101,
            AssetClass::Stock,
            Endpoint::Eod,
            Interval::M1,
            FileGranularity::Daily,
            false,
        )
        .unwrap();
        assert_eq!(q.symbol, "AAPL");
    }

    #[test]
    fn rejects_inverted_date_range() {
        let err = LogicalQuery::new(
            "AAPL",
            20250102,
            20250101,
            AssetClass::Stock,
            Endpoint::Eod,
            Interval::M1,
            FileGranularity::Daily,
            false,
        )
        .unwrap_err();
        assert!(matches!(err, Error::Validation(_)));
    }
}
