use std::sync::{Arc, OnceLock};

use reqwest::Client as HttpClient;
use theta_client_core::LogicalQuery;
use tokio::sync::mpsc;
use tracing::{info, instrument};

use crate::fetch::{build_client, fetch_process_fn};
use crate::decode::decode_process_fn;
use crate::finalize::{FinalizeBackend, FinalizeOutput, finalize_process_fn};
use crate::job::{FileWriteJob, Job};
use crate::planner::{self, PlannedFile};
use crate::stage::QueueStage;
use crate::storage::{StorageBackends, StorageConfig};

const FINALIZE_THREADS: usize = 1;
const DECODE_THREADS: usize = 1;

/// Configuration for an ingestion run.
///
/// `show_progress` and `log_level` are accepted for parity with the original
/// CLI-era configuration surface but are not consulted here: progress display
/// and log verbosity are the caller's concern (structured spans are emitted
/// unconditionally via `tracing`; the caller wires up its own subscriber).
#[derive(Debug, Clone)]
pub struct ClientConfig {
    pub theta_base_url: String,
    pub fetch_threads: usize,
    pub storage: StorageConfig,
    pub show_progress: bool,
    pub log_level: String,
}

impl ClientConfig {
    pub fn new(theta_base_url: impl Into<String>, storage: StorageConfig) -> Self {
        Self {
            theta_base_url: theta_base_url.into(),
            fetch_threads: 8,
            storage,
            show_progress: false,
            log_level: "info".to_string(),
        }
    }
}

struct Inner {
    config: ClientConfig,
    http: HttpClient,
    storage: StorageBackends,
}

static INSTANCE: OnceLock<Arc<Inner>> = OnceLock::new();

/// The bulk historical-data ingestion client.
///
/// Exactly one instance is ever constructed per process: the upstream service
/// imposes a global concurrency limit, so multiple independently-configured
/// clients would defeat admission control. `new` returns the first
/// successfully constructed instance for every call in the process; the
/// `ClientConfig` passed to later calls is ignored.
#[derive(Clone)]
pub struct ThetaClient {
    inner: Arc<Inner>,
}

impl ThetaClient {
    pub fn new(config: ClientConfig) -> anyhow::Result<Self> {
        if let Some(inner) = INSTANCE.get() {
            return Ok(Self {
                inner: inner.clone(),
            });
        }

        let http = build_client(config.fetch_threads)?;
        let storage = StorageBackends::new(&config.storage)?;
        let inner = Arc::new(Inner {
            config,
            http,
            storage,
        });
        let inner = INSTANCE.get_or_init(|| inner).clone();
        Ok(Self { inner })
    }

    /// Run a query to completion, uploading each completed file to object
    /// storage as it finishes.
    #[instrument(skip(self, query), fields(symbol = %query.symbol))]
    pub async fn request(&self, query: LogicalQuery) -> anyhow::Result<()> {
        let store = self.inner.storage.primary.clone();
        self.run(query, FinalizeBackend::Upload { store }).await
    }

    /// Run a query to completion, streaming each completed (or skipped) file
    /// back to the caller instead of uploading it.
    #[instrument(skip(self, query), fields(symbol = %query.symbol))]
    pub async fn stream(&self, query: LogicalQuery) -> anyhow::Result<Vec<FinalizeOutput>> {
        let (tx, mut rx) = mpsc::channel(64);
        let collected = tokio::spawn(async move {
            let mut out = Vec::new();
            while let Some(item) = rx.recv().await {
                out.push(item);
            }
            out
        });

        self.run(query, FinalizeBackend::Stream { tx }).await?;
        Ok(collected.await.unwrap_or_default())
    }

    async fn run(&self, query: LogicalQuery, backend: FinalizeBackend) -> anyhow::Result<()> {
        let planned = planner::plan(&self.inner.http, &self.inner.config.theta_base_url, &query)
            .await?;

        let mut remaining = Vec::with_capacity(planned.len());
        for file in planned {
            if query.force_refresh || !self.inner.storage.exists(&file.object_key).await? {
                remaining.push(file);
            }
        }

        if remaining.is_empty() {
            info!("nothing to do: every planned file already exists and force_refresh is off");
            return Ok(());
        }

        // Stages are constructed in reverse dependency order so each
        // upstream stage's downstream channel can be wired to the next
        // stage's own input sender clone.
        let finalize_stage: Arc<QueueStage<Job, ()>> = Arc::new(QueueStage::start(
            FINALIZE_THREADS,
            finalize_process_fn(backend),
            None,
        ));
        let decode_stage: Arc<QueueStage<Job, Job>> = Arc::new(QueueStage::start(
            DECODE_THREADS,
            decode_process_fn(),
            Some(finalize_stage.input_sender()),
        ));
        let fetch_stage: Arc<QueueStage<Job, Job>> = Arc::new(QueueStage::start(
            self.inner.config.fetch_threads,
            fetch_process_fn(self.inner.http.clone()),
            Some(decode_stage.input_sender()),
        ));

        for PlannedFile { object_key, urls } in remaining {
            let parent = FileWriteJob::new(object_key, urls.len());
            for url in urls {
                let job = Job {
                    url,
                    schema: query.schema_tag(),
                    body: None,
                    parent: parent.clone(),
                };
                fetch_stage.submit(job).await?;
            }
        }

        fetch_stage.wait_for_drain().await;
        fetch_stage.raise_if_failed()?;

        decode_stage.wait_for_drain().await;
        decode_stage.raise_if_failed()?;

        finalize_stage.wait_for_drain().await;
        finalize_stage.raise_if_failed()?;

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use theta_client_core::{AssetClass, Endpoint, FileGranularity, Interval};
    use tracing_subscriber::EnvFilter;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn init_test_logging() {
        let _ = tracing_subscriber::fmt()
            .with_env_filter(EnvFilter::from_default_env())
            .with_test_writer()
            .try_init();
    }

    async fn calendar_and_day(server: &MockServer, day: &str, data_path: &str, body: &str) {
        Mock::given(method("GET"))
            .and(path("/stock/list/dates/quote"))
            .respond_with(ResponseTemplate::new(200).set_body_string(format!("date\n{day}\n")))
            .mount(server)
            .await;
        Mock::given(method("GET"))
            .and(path(data_path))
            .respond_with(ResponseTemplate::new(200).set_body_string(body))
            .mount(server)
            .await;
    }

    #[tokio::test]
    async fn streams_a_single_completed_file() {
        init_test_logging();
        let server = MockServer::start().await;
        let csv = "created,last_trade,open,high,low,close,volume,count,bid_size,bid_exchange,bid,bid_condition,ask_size,ask_exchange,ask,ask_condition\n\
                    1735776000000,1735776000000,1.0,2.0,0.5,1.5,100,3,1,1,1.0,1,1,1,1.1,1\n";
        calendar_and_day(&server, "2025-01-02", "/stock/history/eod", csv).await;

        let mut storage = StorageConfig::local_dev();
        storage.endpoint = "http://127.0.0.1:1".to_string();
        let config = ClientConfig::new(server.uri(), storage);
        let client = ThetaClient::new(config).unwrap();

        let query = LogicalQuery::new(
            "AAPL",
            20250102,
            20250102,
            AssetClass::Stock,
            Endpoint::Eod,
            Interval::M1,
            FileGranularity::Daily,
            true,
        )
        .unwrap();

        let outputs = client.stream(query).await.unwrap();
        assert_eq!(outputs.len(), 1);
        assert!(outputs[0].table.is_some());
    }
}
