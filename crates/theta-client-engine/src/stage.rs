use std::future::Future;
use std::marker::PhantomData;
use std::pin::Pin;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex as StdMutex};

use tokio::sync::{Mutex as AsyncMutex, mpsc};
use tokio::task::JoinHandle;

use crate::error::StageError;

const QUEUE_CAPACITY: usize = 1024;

type BoxFuture<T> = Pin<Box<dyn Future<Output = T> + Send>>;

/// A stage's processing function: takes one item, optionally returns the
/// item to forward downstream, or a latched error.
pub type ProcessFn<In, Out> =
    Arc<dyn Fn(In) -> BoxFuture<Result<Option<Out>, StageError>> + Send + Sync>;

/// Generic bounded-queue pipeline stage.
///
/// `num_threads` tokio tasks share one input channel (wrapped in an async
/// mutex so any idle worker can claim the next item), call `process`, and
/// forward a non-`None` result to the optional downstream channel. The first
/// error from any worker is latched under a lock and stops every worker in
/// this stage; later errors are dropped. This is the direct generalization of
/// a bounded-queue, N-thread, pull-process-forward worker with a first-error
/// latch and join-on-drain.
pub struct QueueStage<In, Out> {
    tx: StdMutex<Option<mpsc::Sender<In>>>,
    handles: StdMutex<Vec<JoinHandle<()>>>,
    error: Arc<StdMutex<Option<StageError>>>,
    running: Arc<AtomicBool>,
    _out: PhantomData<fn() -> Out>,
}

impl<In, Out> QueueStage<In, Out>
where
    In: Send + 'static,
    Out: Send + 'static,
{
    pub fn start(
        num_threads: usize,
        process: ProcessFn<In, Out>,
        downstream: Option<mpsc::Sender<Out>>,
    ) -> Self {
        assert!(num_threads > 0, "a stage needs at least one worker");

        let (tx, rx) = mpsc::channel::<In>(QUEUE_CAPACITY);
        let rx = Arc::new(AsyncMutex::new(rx));
        let error: Arc<StdMutex<Option<StageError>>> = Arc::new(StdMutex::new(None));
        let running = Arc::new(AtomicBool::new(true));

        let mut handles = Vec::with_capacity(num_threads);
        for _ in 0..num_threads {
            let rx = rx.clone();
            let process = process.clone();
            let downstream = downstream.clone();
            let error = error.clone();
            let running = running.clone();
            handles.push(tokio::spawn(async move {
                loop {
                    if !running.load(Ordering::SeqCst) {
                        break;
                    }
                    let item = { rx.lock().await.recv().await };
                    let Some(item) = item else { break };

                    match process(item).await {
                        Ok(Some(out)) => {
                            if let Some(downstream) = &downstream {
                                // A closed downstream means the pipeline is
                                // already shutting down from a later stage's
                                // failure; nothing left to do with this item.
                                let _ = downstream.send(out).await;
                            }
                        }
                        Ok(None) => {}
                        Err(err) => {
                            let mut guard = error.lock().expect("stage error mutex poisoned");
                            if guard.is_none() {
                                *guard = Some(err);
                            }
                            running.store(false, Ordering::SeqCst);
                            break;
                        }
                    }
                }
            }));
        }

        Self {
            tx: StdMutex::new(Some(tx)),
            handles: StdMutex::new(handles),
            error,
            running,
            _out: PhantomData,
        }
    }

    /// A clone of this stage's input sender, for wiring an upstream stage's
    /// downstream to this stage. Must be called before `wait_for_drain`.
    pub fn input_sender(&self) -> mpsc::Sender<In> {
        self.tx
            .lock()
            .expect("stage sender mutex poisoned")
            .clone()
            .expect("stage input already closed")
    }

    /// Enqueue one item.
    ///
    /// Races the send against the stage's running flag: if every worker has
    /// already stopped (e.g. after latching a first error) nothing will ever
    /// drain the channel again, so waiting on a full `tx.send` unconditionally
    /// would hang forever instead of surfacing the latched error.
    pub async fn submit(&self, item: In) -> Result<(), StageError> {
        let tx = self.tx.lock().expect("stage sender mutex poisoned").clone();
        let Some(tx) = tx else {
            return Err(StageError::Finalize(
                "stage is no longer accepting work".to_string(),
            ));
        };

        tokio::select! {
            result = tx.send(item) => result.map_err(|_| {
                StageError::Finalize("stage is no longer accepting work".to_string())
            }),
            _ = self.wait_for_stop() => Err(StageError::Finalize(
                "stage stopped accepting work after a worker failed".to_string(),
            )),
        }
    }

    async fn wait_for_stop(&self) {
        while self.running.load(Ordering::SeqCst) {
            tokio::time::sleep(std::time::Duration::from_millis(10)).await;
        }
    }

    /// Close this stage's input and wait for every worker to finish draining
    /// whatever was already queued.
    pub async fn wait_for_drain(&self) {
        {
            let mut tx = self.tx.lock().expect("stage sender mutex poisoned");
            *tx = None;
        }
        let handles = {
            let mut guard = self.handles.lock().expect("stage handles mutex poisoned");
            std::mem::take(&mut *guard)
        };
        for handle in handles {
            let _ = handle.await;
        }
    }

    /// Re-raise the first error captured by any worker in this stage.
    pub fn raise_if_failed(&self) -> Result<(), StageError> {
        match self
            .error
            .lock()
            .expect("stage error mutex poisoned")
            .clone()
        {
            Some(err) => Err(err),
            None => Ok(()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicUsize;

    fn doubling() -> ProcessFn<i32, i32> {
        Arc::new(|n: i32| Box::pin(async move { Ok(Some(n * 2)) }))
    }

    #[tokio::test]
    async fn forwards_results_downstream() {
        let (tx, mut rx) = mpsc::channel(16);
        let stage = QueueStage::start(2, doubling(), Some(tx));
        for n in 0..5 {
            stage.submit(n).await.unwrap();
        }
        stage.wait_for_drain().await;
        stage.raise_if_failed().unwrap();

        let mut seen = Vec::new();
        while let Ok(v) = rx.try_recv() {
            seen.push(v);
        }
        seen.sort_unstable();
        assert_eq!(seen, vec![0, 2, 4, 6, 8]);
    }

    #[tokio::test]
    async fn first_error_is_latched_and_stops_the_stage() {
        let seen = Arc::new(AtomicUsize::new(0));
        let seen_in_closure = seen.clone();
        let process: ProcessFn<i32, i32> = Arc::new(move |n: i32| {
            let seen = seen_in_closure.clone();
            Box::pin(async move {
                seen.fetch_add(1, Ordering::SeqCst);
                if n == 2 {
                    Err(StageError::Decode("boom".to_string()))
                } else {
                    Ok(Some(n))
                }
            })
        });

        let stage: QueueStage<i32, i32> = QueueStage::start(1, process, None);
        for n in 0..5 {
            stage.submit(n).await.unwrap();
        }
        stage.wait_for_drain().await;
        let err = stage.raise_if_failed().unwrap_err();
        assert!(matches!(err, StageError::Decode(_)));
    }

    #[tokio::test]
    async fn submit_does_not_hang_once_the_stage_has_stopped() {
        // A single worker that fails on its very first item stops consuming
        // immediately; filling the channel past QUEUE_CAPACITY afterwards
        // must not block forever waiting for a worker that will never drain it.
        let process: ProcessFn<i32, i32> =
            Arc::new(|_: i32| Box::pin(async move { Err(StageError::Decode("boom".to_string())) }));
        let stage: QueueStage<i32, i32> = QueueStage::start(1, process, None);

        let outcome = tokio::time::timeout(std::time::Duration::from_secs(10), async {
            for n in 0..(QUEUE_CAPACITY as i32 * 2) {
                if stage.submit(n).await.is_err() {
                    break;
                }
            }
        })
        .await;

        assert!(outcome.is_ok(), "submit loop hung after the stage stopped");
    }
}
