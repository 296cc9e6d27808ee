use std::collections::{BTreeMap, HashSet};

use chrono::{Datelike, NaiveDate};
use percent_encoding::{AsciiSet, NON_ALPHANUMERIC, utf8_percent_encode};
use reqwest::Client;
use theta_client_core::{AssetClass, Error, FileGranularity, LogicalQuery};

use crate::calendar::fetch_trading_days;

/// One planned output file: its object key and the ordered URL list whose
/// fetched-and-decoded results constitute it.
#[derive(Debug, Clone)]
pub struct PlannedFile {
    pub object_key: String,
    pub urls: Vec<String>,
}

fn parse_yyyymmdd(value: u32) -> Result<NaiveDate, Error> {
    let year = (value / 10_000) as i32;
    let month = (value / 100) % 100;
    let day = value % 100;
    NaiveDate::from_ymd_opt(year, month, day)
        .ok_or_else(|| Error::Validation(format!("{value} is not a valid YYYYMMDD date")))
}

fn calendar_days(start: NaiveDate, end: NaiveDate) -> Vec<NaiveDate> {
    let mut days = Vec::new();
    let mut cursor = start;
    while cursor <= end {
        if cursor.weekday().number_from_monday() <= 5 {
            days.push(cursor);
        }
        cursor = cursor
            .succ_opt()
            .expect("calendar date range does not overflow NaiveDate");
    }
    days
}

/// Python's `urllib.parse.quote()` always leaves the RFC 3986 unreserved
/// characters `_ . - ~` unescaped regardless of its `safe` argument; the
/// original client relies on this for tickers like `BRK.B`.
const SYMBOL_ENCODE_SET: &AsciiSet = &NON_ALPHANUMERIC
    .remove(b'_')
    .remove(b'.')
    .remove(b'-')
    .remove(b'~');

fn build_url(theta_base_url: &str, query: &LogicalQuery, day: NaiveDate) -> String {
    let base = format!(
        "{theta_base_url}/{}/{}/{}",
        query.asset_class.as_segment(),
        query.data_type.as_segment(),
        query.endpoint.as_segment()
    );

    let symbol = utf8_percent_encode(&query.symbol, SYMBOL_ENCODE_SET).to_string();
    let mut params = vec![format!("symbol={symbol}")];

    if !query.endpoint.is_eod() {
        params.push(format!("interval={}", query.interval.as_tag()));
    }

    let date_str = day.format("%Y%m%d").to_string();
    if query.endpoint.is_eod() {
        params.push(format!("start_date={date_str}"));
        params.push(format!("end_date={date_str}"));
    } else {
        params.push(format!("date={date_str}"));
    }

    // The `*` wildcard is interpreted by the upstream service and must not
    // be percent-encoded; it is appended literally, after everything else
    // has gone through the normal encoder above.
    if matches!(query.asset_class, AssetClass::Option) {
        params.push("expiration=*".to_string());
        params.push("strike=*".to_string());
    }

    format!("{base}?{}", params.join("&"))
}

/// Expand a logical query into `{object_key -> [url, ...]}`.
///
/// Trading days come from the calendar endpoint; the calendar-range weekday
/// filter and the trading-day intersection are each computed independently
/// and then intersected as sets, which loses the ascending order the range
/// enumeration started with — `matched` is explicitly re-sorted before
/// grouping, because URL order within a key determines concatenation order.
pub async fn plan(
    client: &Client,
    theta_base_url: &str,
    query: &LogicalQuery,
) -> Result<Vec<PlannedFile>, Error> {
    let start = parse_yyyymmdd(query.start_date)?;
    let end = parse_yyyymmdd(query.end_date)?;

    let requested_days: HashSet<NaiveDate> = calendar_days(start, end).into_iter().collect();
    if requested_days.is_empty() {
        return Ok(Vec::new());
    }

    let trading_days: HashSet<NaiveDate> =
        fetch_trading_days(client, theta_base_url, &query.symbol)
            .await?
            .into_iter()
            .collect();

    let mut matched: Vec<NaiveDate> = trading_days.intersection(&requested_days).copied().collect();
    if matched.is_empty() {
        return Ok(Vec::new());
    }
    matched.sort_unstable();

    let mut groups: BTreeMap<(i32, u32, Option<u32>), Vec<NaiveDate>> = BTreeMap::new();
    for day in matched {
        let key = match query.file_granularity {
            FileGranularity::Monthly => (day.year(), day.month(), None),
            FileGranularity::Daily => (day.year(), day.month(), Some(day.day())),
        };
        groups.entry(key).or_default().push(day);
    }

    let mut out = Vec::with_capacity(groups.len());
    for ((year, month, day), days) in groups {
        let object_key = theta_client_core::object_key(query, year, month, day);
        let urls = days
            .iter()
            .map(|day| build_url(theta_base_url, query, *day))
            .collect();
        out.push(PlannedFile { object_key, urls });
    }
    Ok(out)
}
