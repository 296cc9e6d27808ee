use std::io::Cursor;
use std::sync::Arc;

use arrow::csv::ReaderBuilder;

use crate::error::StageError;
use crate::job::Job;
use crate::stage::ProcessFn;

/// Parse a Job's CSV body into a typed table and attach it to its
/// FileWriteJob, or record a skip if fetch reported no data.
///
/// Runs synchronously (the CSV parser is CPU-bound and internally
/// vectorized); the caller wraps this in `spawn_blocking` so it does not
/// stall the stage's async worker task.
fn decode(job: Job) -> Result<Option<Job>, StageError> {
    let Some(bytes) = &job.body else {
        job.parent.mark_item_skipped();
        return Ok(Some(job));
    };

    let schema = theta_client_core::schema::schema_for(job.schema);
    let reader = ReaderBuilder::new(schema.clone())
        .with_header(true)
        .build(Cursor::new(bytes.as_ref()))
        .map_err(|err| StageError::Decode(err.to_string()))?;

    let mut batches = Vec::new();
    for batch in reader {
        batches.push(batch.map_err(|err| StageError::Decode(err.to_string()))?);
    }

    let table = match batches.len() {
        0 => arrow::record_batch::RecordBatch::new_empty(schema),
        1 => batches.into_iter().next().expect("len checked above"),
        _ => arrow::compute::concat_batches(&schema, &batches)
            .map_err(|err| StageError::Decode(err.to_string()))?,
    };

    job.parent.add_table(table);
    Ok(Some(job))
}

pub fn decode_process_fn() -> ProcessFn<Job, Job> {
    Arc::new(move |job: Job| {
        Box::pin(async move {
            tokio::task::spawn_blocking(move || decode(job))
                .await
                .unwrap_or_else(|err| {
                    Err(StageError::Decode(format!("decode task panicked: {err}")))
                })
        })
    })
}
