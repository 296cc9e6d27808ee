use std::sync::{Arc, Mutex};

use arrow::record_batch::RecordBatch;
use bytes::Bytes;
use theta_client_core::SchemaTag;

#[derive(Default)]
struct Inner {
    completed_items: usize,
    tables: Vec<RecordBatch>,
    skipped_items: bool,
    completed: bool,
}

/// Per-output-file completion barrier.
///
/// `total_items` is fixed at construction; `add_table`/`mark_item_skipped`
/// each cross the same completion edge exactly once per item. See the
/// invariants in the data model: `completed_items <= total_items` always,
/// and `completed` is true iff they're equal.
pub struct FileWriteJob {
    pub object_key: String,
    pub total_items: usize,
    inner: Mutex<Inner>,
}

impl FileWriteJob {
    pub fn new(object_key: impl Into<String>, total_items: usize) -> Arc<Self> {
        assert!(total_items > 0, "a FileWriteJob needs at least one item");
        Arc::new(Self {
            object_key: object_key.into(),
            total_items,
            inner: Mutex::new(Inner::default()),
        })
    }

    /// Append a decoded table for one item and advance the completion counter.
    pub fn add_table(&self, table: RecordBatch) {
        let mut inner = self.inner.lock().expect("FileWriteJob mutex poisoned");
        inner.tables.push(table);
        inner.completed_items += 1;
        if inner.completed_items == self.total_items {
            inner.completed = true;
        }
    }

    /// Record that one item had no data, and advance the completion counter.
    pub fn mark_item_skipped(&self) {
        let mut inner = self.inner.lock().expect("FileWriteJob mutex poisoned");
        inner.skipped_items = true;
        inner.completed_items += 1;
        if inner.completed_items == self.total_items {
            inner.completed = true;
        }
    }

    pub fn is_complete(&self) -> bool {
        self.inner.lock().expect("FileWriteJob mutex poisoned").completed
    }

    pub fn has_skips(&self) -> bool {
        self.inner
            .lock()
            .expect("FileWriteJob mutex poisoned")
            .skipped_items
    }

    /// Take the accumulated tables, leaving an empty set behind. Finalize
    /// calls this exactly once, after observing `is_complete() == true`.
    pub fn take_tables(&self) -> Vec<RecordBatch> {
        std::mem::take(
            &mut self
                .inner
                .lock()
                .expect("FileWriteJob mutex poisoned")
                .tables,
        )
    }
}

/// One per-day unit of work. Created once per planned URL; flows
/// fetch -> decode -> finalize. `parent` is a reference-counted handle to
/// the FileWriteJob it contributes to — Jobs point to their FileWriteJob,
/// never the reverse, so there are no cycles to break.
pub struct Job {
    pub url: String,
    pub schema: SchemaTag,
    pub body: Option<Bytes>,
    pub parent: Arc<FileWriteJob>,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn batch() -> RecordBatch {
        use arrow::array::Int32Array;
        use arrow::datatypes::{DataType, Field, Schema};
        let schema = Arc::new(Schema::new(vec![Field::new("v", DataType::Int32, false)]));
        RecordBatch::try_new(schema, vec![Arc::new(Int32Array::from(vec![1]))]).unwrap()
    }

    #[test]
    fn completes_when_all_items_added() {
        let job = FileWriteJob::new("key", 2);
        assert!(!job.is_complete());
        job.add_table(batch());
        assert!(!job.is_complete());
        job.add_table(batch());
        assert!(job.is_complete());
        assert!(!job.has_skips());
    }

    #[test]
    fn a_skip_crosses_the_same_completion_edge() {
        let job = FileWriteJob::new("key", 2);
        job.add_table(batch());
        job.mark_item_skipped();
        assert!(job.is_complete());
        assert!(job.has_skips());
    }

    #[test]
    fn completed_items_never_exceeds_total() {
        let job = FileWriteJob::new("key", 1);
        job.add_table(batch());
        assert!(job.is_complete());
        // total_items fixed at 1; a second call would be a caller bug, but the
        // counter still only reflects calls actually made.
    }
}
