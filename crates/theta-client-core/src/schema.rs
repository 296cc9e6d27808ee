//! Reference schema table.
//!
//! §6 of the governing design treats the column-schema table as an external,
//! pluggable concern: the decode stage only needs a `SchemaTag -> SchemaRef`
//! lookup, not a particular instance of one. This module's field lists are a
//! verbatim transcription (name, order, type) of the upstream service's
//! documented CSV layout, one table per schema tag. Callers who need a
//! different column layout substitute their own lookup at the decode stage
//! constructor instead of patching this file.

use std::sync::{Arc, OnceLock};

use arrow_schema::{DataType, Field, Schema};

use crate::query::SchemaTag;

pub type SchemaRef = Arc<Schema>;

fn field(name: &str, ty: DataType) -> Field {
    Field::new(name, ty, true)
}

fn millis_ts() -> DataType {
    DataType::Timestamp(arrow_schema::TimeUnit::Millisecond, None)
}

fn stock_quote() -> Schema {
    Schema::new(vec![
        field("timestamp", millis_ts()),
        field("bid_size", DataType::Int32),
        field("bid_exchange", DataType::Int16),
        field("bid", DataType::Float64),
        field("bid_condition", DataType::Int16),
        field("ask_size", DataType::Int32),
        field("ask_exchange", DataType::Int16),
        field("ask", DataType::Float64),
        field("ask_condition", DataType::Int16),
    ])
}

fn stock_eod() -> Schema {
    Schema::new(vec![
        field("created", millis_ts()),
        field("last_trade", millis_ts()),
        field("open", DataType::Float64),
        field("high", DataType::Float64),
        field("low", DataType::Float64),
        field("close", DataType::Float64),
        field("volume", DataType::Int64),
        field("count", DataType::Int64),
        field("bid_size", DataType::Int32),
        field("bid_exchange", DataType::Int16),
        field("bid", DataType::Float64),
        field("bid_condition", DataType::Int16),
        field("ask_size", DataType::Int32),
        field("ask_exchange", DataType::Int16),
        field("ask", DataType::Float64),
        field("ask_condition", DataType::Int16),
    ])
}

fn option_quote() -> Schema {
    Schema::new(vec![
        field("symbol", DataType::Utf8),
        field("expiration", DataType::Date32),
        field("strike", DataType::Float64),
        field("right", DataType::Utf8),
        field("timestamp", millis_ts()),
        field("bid_size", DataType::Int32),
        field("bid_exchange", DataType::Int16),
        field("bid", DataType::Float64),
        field("bid_condition", DataType::Int16),
        field("ask_size", DataType::Int32),
        field("ask_exchange", DataType::Int16),
        field("ask", DataType::Float64),
        field("ask_condition", DataType::Int16),
    ])
}

fn option_eod() -> Schema {
    Schema::new(vec![
        field("symbol", DataType::Utf8),
        field("expiration", DataType::Date32),
        field("strike", DataType::Float64),
        field("right", DataType::Utf8),
        field("created", millis_ts()),
        field("last_trade", millis_ts()),
        field("open", DataType::Float64),
        field("high", DataType::Float64),
        field("low", DataType::Float64),
        field("close", DataType::Float64),
        field("volume", DataType::Int64),
        field("count", DataType::Int64),
        field("bid_size", DataType::Int32),
        field("bid_exchange", DataType::Int16),
        field("bid", DataType::Float64),
        field("bid_condition", DataType::Int16),
        field("ask_size", DataType::Int32),
        field("ask_exchange", DataType::Int16),
        field("ask", DataType::Float64),
        field("ask_condition", DataType::Int16),
    ])
}

fn option_trade() -> Schema {
    Schema::new(vec![
        field("symbol", DataType::Utf8),
        field("expiration", DataType::Date32),
        field("strike", DataType::Float64),
        field("right", DataType::Utf8),
        field("timestamp", millis_ts()),
        field("sequence", DataType::Int64),
        field("ext_condition1", DataType::Int16),
        field("ext_condition2", DataType::Int16),
        field("ext_condition3", DataType::Int16),
        field("ext_condition4", DataType::Int16),
        field("condition", DataType::Int16),
        field("size", DataType::Int32),
        field("exchange", DataType::Int16),
        field("price", DataType::Float64),
    ])
}

fn option_trade_quote() -> Schema {
    Schema::new(vec![
        field("symbol", DataType::Utf8),
        field("expiration", DataType::Date32),
        field("strike", DataType::Float64),
        field("right", DataType::Utf8),
        field("trade_timestamp", millis_ts()),
        field("quote_timestamp", millis_ts()),
        field("sequence", DataType::Int64),
        field("ext_condition1", DataType::Int16),
        field("ext_condition2", DataType::Int16),
        field("ext_condition3", DataType::Int16),
        field("ext_condition4", DataType::Int16),
        field("condition", DataType::Int16),
        field("size", DataType::Int32),
        field("exchange", DataType::Int16),
        field("price", DataType::Float64),
        field("bid_size", DataType::Int32),
        field("bid_exchange", DataType::Int16),
        field("bid", DataType::Float64),
        field("bid_condition", DataType::Int16),
        field("ask_size", DataType::Int32),
        field("ask_exchange", DataType::Int16),
        field("ask", DataType::Float64),
        field("ask_condition", DataType::Int16),
    ])
}

fn greek_first_order() -> Schema {
    Schema::new(vec![
        field("symbol", DataType::Utf8),
        field("expiration", DataType::Date32),
        field("strike", DataType::Float64),
        field("right", DataType::Utf8),
        field("timestamp", millis_ts()),
        field("bid", DataType::Float64),
        field("ask", DataType::Float64),
        field("delta", DataType::Float64),
        field("theta", DataType::Float64),
        field("vega", DataType::Float64),
        field("rho", DataType::Float64),
        field("epsilon", DataType::Float64),
        field("lambda", DataType::Float64),
        field("implied_vol", DataType::Float64),
        field("iv_error", DataType::Float64),
        field("underlying_timestamp", millis_ts()),
        field("underlying_price", DataType::Float64),
    ])
}

fn greek_eod() -> Schema {
    Schema::new(vec![
        // Contract identification
        field("symbol", DataType::Utf8),
        field("expiration", DataType::Date32),
        field("strike", DataType::Float64),
        field("right", DataType::Utf8),
        // Timestamp
        field("timestamp", millis_ts()),
        // OHLCV data
        field("open", DataType::Float64),
        field("high", DataType::Float64),
        field("low", DataType::Float64),
        field("close", DataType::Float64),
        field("volume", DataType::Int64),
        field("count", DataType::Int64),
        // Quote data
        field("bid_size", DataType::Int32),
        field("bid_exchange", DataType::Int16),
        field("bid", DataType::Float64),
        field("bid_condition", DataType::Int16),
        field("ask_size", DataType::Int32),
        field("ask_exchange", DataType::Int16),
        field("ask", DataType::Float64),
        field("ask_condition", DataType::Int16),
        // First-order Greeks
        field("delta", DataType::Float64),
        field("gamma", DataType::Float64),
        field("vega", DataType::Float64),
        field("theta", DataType::Float64),
        field("rho", DataType::Float64),
        field("epsilon", DataType::Float64),
        field("lambda", DataType::Float64),
        // Second-order Greeks
        field("vanna", DataType::Float64),
        field("charm", DataType::Float64),
        field("vomma", DataType::Float64),
        field("veta", DataType::Float64),
        field("vera", DataType::Float64),
        // Third-order Greeks
        field("speed", DataType::Float64),
        field("zomma", DataType::Float64),
        field("color", DataType::Float64),
        field("ultima", DataType::Float64),
        // Black-Scholes intermediate values
        field("d1", DataType::Float64),
        field("d2", DataType::Float64),
        field("dual_delta", DataType::Utf8),
        field("dual_gamma", DataType::Float64),
        // Implied volatility
        field("implied_vol", DataType::Float64),
        field("iv_error", DataType::Float64),
        // Underlying asset data
        field("underlying_timestamp", millis_ts()),
        field("underlying_price", DataType::Float64),
    ])
}

macro_rules! cached {
    ($cell:ident, $f:expr) => {{
        static $cell: OnceLock<SchemaRef> = OnceLock::new();
        $cell.get_or_init(|| Arc::new($f)).clone()
    }};
}

/// Look up the Arrow schema for a schema tag.
pub fn schema_for(tag: SchemaTag) -> SchemaRef {
    match tag {
        SchemaTag::StockEod => cached!(STOCK_EOD, stock_eod()),
        SchemaTag::StockQuote => cached!(STOCK_QUOTE, stock_quote()),
        SchemaTag::OptionEod => cached!(OPTION_EOD, option_eod()),
        SchemaTag::OptionQuote => cached!(OPTION_QUOTE, option_quote()),
        SchemaTag::OptionTrade => cached!(OPTION_TRADE, option_trade()),
        SchemaTag::OptionTradeQuote => cached!(OPTION_TRADE_QUOTE, option_trade_quote()),
        SchemaTag::GreekFirstOrder => cached!(GREEK_FIRST_ORDER, greek_first_order()),
        SchemaTag::GreekEod => cached!(GREEK_EOD, greek_eod()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn every_tag_resolves_to_a_non_empty_schema() {
        for tag in [
            SchemaTag::StockEod,
            SchemaTag::StockQuote,
            SchemaTag::OptionEod,
            SchemaTag::OptionQuote,
            SchemaTag::OptionTrade,
            SchemaTag::OptionTradeQuote,
            SchemaTag::GreekFirstOrder,
            SchemaTag::GreekEod,
        ] {
            assert!(!schema_for(tag).fields().is_empty());
        }
    }

    #[test]
    fn greek_eod_is_the_widest_schema() {
        let widest = schema_for(SchemaTag::GreekEod).fields().len();
        for tag in [
            SchemaTag::StockEod,
            SchemaTag::StockQuote,
            SchemaTag::OptionEod,
            SchemaTag::OptionQuote,
            SchemaTag::OptionTrade,
            SchemaTag::OptionTradeQuote,
            SchemaTag::GreekFirstOrder,
        ] {
            assert!(schema_for(tag).fields().len() <= widest);
        }
    }

    #[test]
    fn greek_eod_field_count_matches_the_upstream_layout() {
        assert_eq!(schema_for(SchemaTag::GreekEod).fields().len(), 43);
    }

    #[test]
    fn option_schemas_carry_the_contract_identity_fields() {
        for tag in [
            SchemaTag::OptionEod,
            SchemaTag::OptionQuote,
            SchemaTag::OptionTrade,
            SchemaTag::OptionTradeQuote,
            SchemaTag::GreekFirstOrder,
            SchemaTag::GreekEod,
        ] {
            let schema = schema_for(tag);
            assert_eq!(schema.field(0).name(), "symbol");
            assert_eq!(schema.field(1).name(), "expiration");
            assert_eq!(schema.field(2).name(), "strike");
            assert_eq!(schema.field(3).name(), "right");
        }
    }
}
