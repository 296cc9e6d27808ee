use std::sync::Arc;

use arrow::record_batch::RecordBatch;
use bytes::Bytes;
use object_store::path::Path;
use object_store::{Attribute, Attributes, ObjectStore, PutOptions, PutPayload};
use parquet::arrow::ArrowWriter;
use tokio::sync::mpsc;
use tracing::{info, instrument};

use crate::error::StageError;
use crate::job::Job;
use crate::stage::ProcessFn;

/// One emitted (or skipped) output file, delivered to the caller in
/// streaming mode. `table` is `None` for a skipped file.
#[derive(Debug)]
pub struct FinalizeOutput {
    pub object_key: String,
    pub table: Option<RecordBatch>,
}

/// Where a completed file goes: an object-store upload, or a caller-owned
/// streaming channel. Both are driven by the same `finalize` contract.
#[derive(Clone)]
pub enum FinalizeBackend {
    Upload { store: Arc<dyn ObjectStore> },
    Stream { tx: mpsc::Sender<FinalizeOutput> },
}

/// Emit a FileWriteJob exactly once, at the moment it becomes complete.
///
/// Every Job that reaches this stage is acknowledged (so `wait_for_drain`
/// can progress) even when it isn't the one that triggers emission.
#[instrument(skip(job, backend), fields(object_key = %job.parent.object_key))]
pub async fn finalize(job: Job, backend: &FinalizeBackend) -> Result<Option<()>, StageError> {
    if !job.parent.is_complete() {
        return Ok(None);
    }

    let object_key = job.parent.object_key.clone();

    if job.parent.has_skips() {
        info!(object_key, "file skipped: at least one component day had no data");
        if let FinalizeBackend::Stream { tx } = backend {
            let _ = tx
                .send(FinalizeOutput {
                    object_key,
                    table: None,
                })
                .await;
        }
        return Ok(Some(()));
    }

    let tables = job.parent.take_tables();
    let schema = tables
        .first()
        .map(|batch| batch.schema())
        .ok_or_else(|| StageError::Finalize(format!("{object_key}: completed with zero tables")))?;

    let combined = match tables.len() {
        1 => tables.into_iter().next().expect("len checked above"),
        _ => arrow::compute::concat_batches(&schema, &tables)
            .map_err(|err| StageError::Finalize(err.to_string()))?,
    };

    match backend {
        FinalizeBackend::Upload { store } => {
            let mut buffer = Vec::new();
            {
                let mut writer = ArrowWriter::try_new(&mut buffer, schema.clone(), None)
                    .map_err(|err| StageError::Finalize(err.to_string()))?;
                writer
                    .write(&combined)
                    .map_err(|err| StageError::Finalize(err.to_string()))?;
                writer
                    .close()
                    .map_err(|err| StageError::Finalize(err.to_string()))?;
            }

            let mut attributes = Attributes::new();
            attributes.insert(Attribute::ContentType, "application/octet-stream".into());

            store
                .put_opts(
                    &Path::from(object_key.clone()),
                    PutPayload::from(Bytes::from(buffer)),
                    PutOptions {
                        attributes,
                        ..Default::default()
                    },
                )
                .await
                .map_err(|err| StageError::Finalize(format!("{object_key}: {err}")))?;

            info!(object_key, rows = combined.num_rows(), "uploaded");
        }
        FinalizeBackend::Stream { tx } => {
            tx.send(FinalizeOutput {
                object_key: object_key.clone(),
                table: Some(combined),
            })
            .await
            .map_err(|_| StageError::Finalize(format!("{object_key}: streaming consumer gone")))?;
        }
    }

    Ok(Some(()))
}

pub fn finalize_process_fn(backend: FinalizeBackend) -> ProcessFn<Job, ()> {
    Arc::new(move |job: Job| {
        let backend = backend.clone();
        Box::pin(async move { finalize(job, &backend).await })
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::job::FileWriteJob;
    use object_store::memory::InMemory;
    use theta_client_core::SchemaTag;

    fn batch() -> RecordBatch {
        use arrow::array::Int32Array;
        use arrow::datatypes::{DataType, Field, Schema};
        let schema = Arc::new(Schema::new(vec![Field::new("v", DataType::Int32, false)]));
        RecordBatch::try_new(schema, vec![Arc::new(Int32Array::from(vec![1, 2, 3]))]).unwrap()
    }

    fn job_for(parent: Arc<FileWriteJob>) -> Job {
        Job {
            url: "http://x/1".to_string(),
            schema: SchemaTag::StockEod,
            body: None,
            parent,
        }
    }

    #[tokio::test]
    async fn uploads_once_all_items_complete() {
        let store: Arc<dyn ObjectStore> = Arc::new(InMemory::new());
        let parent = FileWriteJob::new("a/b/data.parquet", 1);
        parent.add_table(batch());

        let backend = FinalizeBackend::Upload {
            store: store.clone(),
        };
        finalize(job_for(parent), &backend).await.unwrap();

        let head = store.head(&Path::from("a/b/data.parquet")).await;
        assert!(head.is_ok());
    }

    #[tokio::test]
    async fn skipped_file_is_not_uploaded() {
        let store: Arc<dyn ObjectStore> = Arc::new(InMemory::new());
        let parent = FileWriteJob::new("a/b/data.parquet", 1);
        parent.mark_item_skipped();

        let backend = FinalizeBackend::Upload {
            store: store.clone(),
        };
        finalize(job_for(parent), &backend).await.unwrap();

        let head = store.head(&Path::from("a/b/data.parquet")).await;
        assert!(head.is_err());
    }

    #[tokio::test]
    async fn incomplete_job_does_nothing() {
        let store: Arc<dyn ObjectStore> = Arc::new(InMemory::new());
        let parent = FileWriteJob::new("a/b/data.parquet", 2);
        parent.add_table(batch());

        let backend = FinalizeBackend::Upload {
            store: store.clone(),
        };
        let outcome = finalize(job_for(parent), &backend).await.unwrap();
        assert!(outcome.is_none());
    }
}
