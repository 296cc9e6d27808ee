use crate::query::LogicalQuery;

/// Build the deterministic object key for one output file.
///
/// `day` is `Some` for daily granularity and `None` for monthly; the caller
/// (the planner) is responsible for passing the grouping that matches
/// `query.file_granularity`.
pub fn object_key(query: &LogicalQuery, year: i32, month: u32, day: Option<u32>) -> String {
    let interval_tag = if query.endpoint.is_eod() {
        "1d"
    } else {
        query.interval.as_tag()
    };

    let mut parts = vec![
        "thetadata".to_string(),
        query.asset_class.as_segment().to_string(),
        query.data_type.as_segment().to_string(),
        query.endpoint.as_segment().to_string(),
        query.file_granularity.as_segment().to_string(),
        interval_tag.to_string(),
        query.symbol.clone(),
        format!("{year:04}"),
        format!("{month:02}"),
    ];
    if let Some(d) = day {
        parts.push(format!("{d:02}"));
    }
    parts.push("data.parquet".to_string());
    parts.join("/")
}
