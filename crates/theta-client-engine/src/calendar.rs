use chrono::{Datelike, NaiveDate};
use reqwest::Client;
use theta_client_core::Error;
use tracing::instrument;

const DATE_FORMAT: &str = "%Y-%m-%d";

/// Fetch the authoritative trading-day list for `symbol`, filtered to
/// weekdays. The planner intersects this against the requested calendar
/// range.
#[instrument(skip(client))]
pub async fn fetch_trading_days(
    client: &Client,
    theta_base_url: &str,
    symbol: &str,
) -> Result<Vec<NaiveDate>, Error> {
    let url = format!("{theta_base_url}/stock/list/dates/quote?symbol={symbol}");
    let response = client
        .get(&url)
        .send()
        .await
        .map_err(|err| Error::Planner(format!("calendar request failed: {err}")))?;

    if !response.status().is_success() {
        return Err(Error::Planner(format!(
            "calendar request returned status {}",
            response.status()
        )));
    }

    let body = response
        .text()
        .await
        .map_err(|err| Error::Planner(format!("calendar response read failed: {err}")))?;

    let mut reader = csv::Reader::from_reader(body.as_bytes());
    let headers = reader
        .headers()
        .map_err(|err| Error::Planner(format!("calendar CSV has no header row: {err}")))?
        .clone();
    let date_idx = headers
        .iter()
        .position(|h| h == "date")
        .ok_or_else(|| Error::Planner("calendar CSV is missing a 'date' column".to_string()))?;

    let mut days = Vec::new();
    for record in reader.records() {
        let record =
            record.map_err(|err| Error::Planner(format!("calendar CSV row error: {err}")))?;
        let raw = record
            .get(date_idx)
            .ok_or_else(|| Error::Planner("calendar CSV row missing the date field".to_string()))?;
        let date = NaiveDate::parse_from_str(raw, DATE_FORMAT)
            .map_err(|err| Error::Planner(format!("unparseable calendar date {raw}: {err}")))?;
        if date.weekday().number_from_monday() <= 5 {
            days.push(date);
        }
    }
    Ok(days)
}
