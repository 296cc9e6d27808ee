/// Errors captured by the first-error latch inside a pipeline stage.
///
/// Each variant corresponds to one of the fatal cases in the error taxonomy:
/// upstream failures latch in fetch, decode failures latch in decode, and
/// finalize failures latch in finalize. The "upstream empty" sentinel is
/// deliberately not a variant here — it is not an error (see `fetch::fetch`).
#[derive(Debug, Clone, thiserror::Error)]
pub enum StageError {
    #[error("upstream request failed for {url}: {message}")]
    UpstreamFailure { url: String, message: String },

    #[error("decode failed: {0}")]
    Decode(String),

    #[error("finalize failed: {0}")]
    Finalize(String),
}
