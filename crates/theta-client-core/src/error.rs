/// Errors raised synchronously from query construction and request planning.
///
/// Both variants are raised before any network call is made; neither ever
/// latches inside a pipeline stage (see `theta_client_engine::StageError` for
/// the stage-level taxonomy).
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// The endpoint is not valid for the given asset class, or the date
    /// range is malformed (`start_date > end_date`).
    #[error("invalid query: {0}")]
    Validation(String),

    /// The trading-day calendar could not be fetched or parsed.
    #[error("planner error: {0}")]
    Planner(String),
}

pub type Result<T> = std::result::Result<T, Error>;
