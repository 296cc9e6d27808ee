use std::sync::Arc;
use std::time::{Duration, Instant};

use reqwest::Client;
use tracing::{debug, instrument, warn};

use crate::error::StageError;
use crate::job::Job;
use crate::stage::ProcessFn;

const NO_DATA_STATUS: u16 = 472;
const NO_DATA_BODY_SUBSTRING: &str = "No data found for your request";
const FETCH_TIMEOUT: Duration = Duration::from_secs(120);

/// Build the process-wide HTTP client used by the fetch stage.
///
/// The connection pool is sized to `num_threads` since that bounds the
/// number of concurrent in-flight requests; there are zero transport-level
/// retries (the upstream service is expected to be local or a controlled
/// peer). HTTP/2 is negotiated opportunistically when the server offers it —
/// it is not forced, since the default upstream host is plain HTTP and has
/// no ALPN to negotiate over.
pub fn build_client(num_threads: usize) -> reqwest::Result<Client> {
    Client::builder()
        .timeout(FETCH_TIMEOUT)
        .pool_max_idle_per_host(num_threads)
        .build()
}

/// Fetch one URL and attach the response body to the Job, or mark it as the
/// upstream "no data" sentinel. Never drops a Job — every non-fatal outcome
/// returns `Ok(Some(job))`.
#[instrument(skip(client, job), fields(url = %job.url))]
pub async fn fetch(client: &Client, job: Job) -> Result<Option<Job>, StageError> {
    let start = Instant::now();
    let response = client
        .get(&job.url)
        .send()
        .await
        .map_err(|err| StageError::UpstreamFailure {
            url: job.url.clone(),
            message: err.to_string(),
        })?;

    let status = response.status();

    if status.as_u16() == NO_DATA_STATUS {
        let body = response.text().await.unwrap_or_default();
        if body.contains(NO_DATA_BODY_SUBSTRING) {
            warn!(url = %job.url, "no data for request");
            return Ok(Some(Job { body: None, ..job }));
        }
        return Err(StageError::UpstreamFailure {
            url: job.url.clone(),
            message: format!("status 472 without the known empty-result body: {body}"),
        });
    }

    if !status.is_success() {
        return Err(StageError::UpstreamFailure {
            url: job.url.clone(),
            message: format!("unexpected status {status}"),
        });
    }

    let bytes = response
        .bytes()
        .await
        .map_err(|err| StageError::UpstreamFailure {
            url: job.url.clone(),
            message: err.to_string(),
        })?;

    debug!(
        url = %job.url,
        elapsed_ms = start.elapsed().as_millis() as u64,
        status = %status,
        "fetch complete"
    );
    Ok(Some(Job {
        body: Some(bytes),
        ..job
    }))
}

pub fn fetch_process_fn(client: Client) -> ProcessFn<Job, Job> {
    Arc::new(move |job: Job| {
        let client = client.clone();
        Box::pin(async move { fetch(&client, job).await })
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::job::FileWriteJob;
    use theta_client_core::SchemaTag;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn job(url: String, parent: std::sync::Arc<FileWriteJob>) -> Job {
        Job {
            url,
            schema: SchemaTag::StockEod,
            body: None,
            parent,
        }
    }

    #[tokio::test]
    async fn success_attaches_body_bytes() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/ok"))
            .respond_with(ResponseTemplate::new(200).set_body_string("date\n2025-01-02\n"))
            .mount(&server)
            .await;

        let client = build_client(1).unwrap();
        let parent = FileWriteJob::new("key", 1);
        let result = fetch(&client, job(format!("{}/ok", server.uri()), parent))
            .await
            .unwrap()
            .unwrap();
        assert!(result.body.is_some());
    }

    #[tokio::test]
    async fn sentinel_status_clears_body_without_error() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/empty"))
            .respond_with(
                ResponseTemplate::new(472).set_body_string("No data found for your request"),
            )
            .mount(&server)
            .await;

        let client = build_client(1).unwrap();
        let parent = FileWriteJob::new("key", 1);
        let result = fetch(&client, job(format!("{}/empty", server.uri()), parent))
            .await
            .unwrap()
            .unwrap();
        assert!(result.body.is_none());
    }

    #[tokio::test]
    async fn server_error_is_fatal() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/boom"))
            .respond_with(ResponseTemplate::new(500))
            .mount(&server)
            .await;

        let client = build_client(1).unwrap();
        let parent = FileWriteJob::new("key", 1);
        let err = fetch(&client, job(format!("{}/boom", server.uri()), parent))
            .await
            .unwrap_err();
        assert!(matches!(err, StageError::UpstreamFailure { .. }));
    }
}
