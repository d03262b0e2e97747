//! Background dispatcher: bounded admission queue plus bounded parallelism.
//!
//! Submissions are fire-and-forget: `submit` enqueues and returns, a pump
//! task moves requests into worker tasks gated by a semaphore, and any
//! conversion or transport error is reported through `tracing` rather than
//! the submitting caller, which has long since regained control.
//!
//! Backpressure policy on a full queue is run-inline: the submitting task
//! executes the work itself instead of being rejected or parked
//! indefinitely. This trades caller latency for a guaranteed delivery
//! attempt without unbounded queue growth.

use crate::error::ExportError;
use crate::lifecycle::Lifecycle;
use crate::span::Span;
use crate::stats::ViewData;
use std::future::Future;
use std::sync::Arc;
use tokio::sync::mpsc;
use tokio::sync::mpsc::error::TrySendError;
use tokio::task::JoinSet;

/// An ordered batch of domain records submitted in one export call.
#[derive(Debug, Clone)]
pub enum ExportRequest {
    /// Trace spans.
    Spans(Vec<Span>),
    /// Stats view snapshots.
    Stats(Vec<ViewData>),
}

impl ExportRequest {
    /// Returns `true` if the batch carries no records; empty batches never
    /// reach the network.
    pub fn is_empty(&self) -> bool {
        match self {
            Self::Spans(spans) => spans.is_empty(),
            Self::Stats(view_data) => view_data.is_empty(),
        }
    }

    /// Number of records in the batch.
    pub fn len(&self) -> usize {
        match self {
            Self::Spans(spans) => spans.len(),
            Self::Stats(view_data) => view_data.len(),
        }
    }
}

/// Converts and transmits one export request. Implemented by the exporter
/// facade; the dispatcher only schedules.
pub trait Processor: Send + Sync + 'static {
    /// Processes one request end to end (convert, resolve client, transmit).
    fn process(
        &self,
        request: ExportRequest,
    ) -> impl Future<Output = Result<(), ExportError>> + Send;
}

/// Dispatcher configuration.
#[derive(Debug, Clone)]
pub struct DispatcherConfig {
    /// Maximum concurrently executing requests. `0` disables backgrounding:
    /// every submission runs inline on the caller.
    pub worker_count: usize,
    /// Admission queue capacity. `0` means unbounded (the run-inline
    /// fallback then never triggers).
    pub queue_capacity: usize,
}

impl Default for DispatcherConfig {
    fn default() -> Self {
        Self {
            worker_count: 2,
            queue_capacity: 1000,
        }
    }
}

enum QueueTx {
    Bounded(mpsc::Sender<ExportRequest>),
    Unbounded(mpsc::UnboundedSender<ExportRequest>),
}

enum QueueRx {
    Bounded(mpsc::Receiver<ExportRequest>),
    Unbounded(mpsc::UnboundedReceiver<ExportRequest>),
}

impl QueueTx {
    fn try_submit(&self, request: ExportRequest) -> Result<(), TrySendError<ExportRequest>> {
        match self {
            Self::Bounded(tx) => tx.try_send(request),
            Self::Unbounded(tx) => tx
                .send(request)
                .map_err(|e| TrySendError::Closed(e.0)),
        }
    }
}

impl QueueRx {
    async fn recv(&mut self) -> Option<ExportRequest> {
        match self {
            Self::Bounded(rx) => rx.recv().await,
            Self::Unbounded(rx) => rx.recv().await,
        }
    }

    fn try_recv(&mut self) -> Option<ExportRequest> {
        match self {
            Self::Bounded(rx) => rx.try_recv().ok(),
            Self::Unbounded(rx) => rx.try_recv().ok(),
        }
    }
}

/// Accepts export requests and processes them off the calling task with
/// bounded concurrency.
pub struct Dispatcher<P: Processor> {
    processor: Arc<P>,
    queue: Option<QueueTx>,
    lifecycle: Lifecycle,
}

impl<P: Processor> Dispatcher<P> {
    /// Creates the dispatcher and, unless `worker_count` is zero, spawns
    /// its pump task on the current runtime.
    pub fn new(config: DispatcherConfig, processor: Arc<P>) -> Self {
        let lifecycle = Lifecycle::new();

        if config.worker_count == 0 {
            // Inline mode: no queue, no pump; the lifecycle still tracks
            // shutdown so admission stops and waiters unblock.
            return Self {
                processor,
                queue: None,
                lifecycle,
            };
        }

        let (tx, rx) = if config.queue_capacity == 0 {
            let (tx, rx) = mpsc::unbounded_channel();
            (QueueTx::Unbounded(tx), QueueRx::Unbounded(rx))
        } else {
            let (tx, rx) = mpsc::channel(config.queue_capacity);
            (QueueTx::Bounded(tx), QueueRx::Bounded(rx))
        };

        tokio::spawn(pump(
            rx,
            Arc::clone(&processor),
            lifecycle.clone(),
            config.worker_count,
        ));

        Self {
            processor,
            queue: Some(tx),
            lifecycle,
        }
    }

    /// Submits a batch for asynchronous export.
    ///
    /// Returns immediately in the common case. When the queue is full the
    /// work runs inline before returning; when backgrounding is disabled it
    /// always runs inline. Processing failures on the inline path are
    /// logged, not returned, to keep the fire-and-forget contract uniform.
    pub async fn submit(&self, request: ExportRequest) -> Result<(), ExportError> {
        if !self.lifecycle.is_running() {
            return Err(ExportError::NotRunning);
        }
        if request.is_empty() {
            return Ok(());
        }

        let Some(queue) = &self.queue else {
            run_one(&*self.processor, request).await;
            return Ok(());
        };

        match queue.try_submit(request) {
            Ok(()) => Ok(()),
            Err(TrySendError::Full(request)) => {
                // Queue full: run-inline backpressure, never reject.
                run_one(&*self.processor, request).await;
                Ok(())
            }
            Err(TrySendError::Closed(_)) => Err(ExportError::NotRunning),
        }
    }

    /// Stops accepting submissions and begins draining. Non-blocking.
    pub fn shutdown(&self) {
        if self.lifecycle.initiate_shutdown() && self.queue.is_none() {
            // Inline mode has nothing to drain.
            self.lifecycle.mark_shutdown();
        }
    }

    /// As [`shutdown`](Self::shutdown), but queued-not-started work is
    /// discarded. In-flight work still completes.
    pub fn kill(&self) {
        let was_running = self.lifecycle.is_running();
        self.lifecycle.kill();
        if was_running && self.queue.is_none() {
            self.lifecycle.mark_shutdown();
        }
    }

    /// Blocks the calling thread until fully drained or `timeout` elapses;
    /// returns `true` on termination.
    pub fn wait_for_termination(&self, timeout: std::time::Duration) -> bool {
        self.lifecycle.wait_for_termination(timeout)
    }

    /// Returns `true` while submissions are accepted.
    pub fn is_running(&self) -> bool {
        self.lifecycle.is_running()
    }

    /// Returns `true` while draining after shutdown began.
    pub fn is_shutting_down(&self) -> bool {
        self.lifecycle.is_shutting_down()
    }

    /// Returns `true` once fully drained and stopped.
    pub fn is_shutdown(&self) -> bool {
        self.lifecycle.is_shutdown()
    }

    /// Returns `true` if queued work was discarded by a kill.
    pub fn is_killed(&self) -> bool {
        self.lifecycle.is_killed()
    }
}

/// Processes one request, reporting failure through the side channel.
async fn run_one<P: Processor>(processor: &P, request: ExportRequest) {
    let records = request.len();
    if let Err(e) = processor.process(request).await {
        tracing::warn!(error = %e, records, "export batch dropped");
    }
}

/// Pump task: moves queued requests into worker tasks, at most
/// `worker_count` in flight, then drains on shutdown.
async fn pump<P: Processor>(
    mut rx: QueueRx,
    processor: Arc<P>,
    lifecycle: Lifecycle,
    worker_count: usize,
) {
    let gate = Arc::new(tokio::sync::Semaphore::new(worker_count));
    let mut tasks: JoinSet<()> = JoinSet::new();

    loop {
        tokio::select! {
            biased;

            () = lifecycle.shutdown_initiated() => break,

            // Reap completed worker tasks so the set does not grow without
            // bound; permits are released by the tasks themselves.
            Some(result) = tasks.join_next(), if !tasks.is_empty() => {
                if let Err(e) = result {
                    tracing::error!(error = %e, "export worker panicked");
                }
            }

            maybe = rx.recv() => match maybe {
                Some(request) => {
                    spawn_worker(&mut tasks, &gate, &processor, request).await;
                }
                None => break,
            },
        }
    }

    // Drain until the queue stays empty with no tasks outstanding. A submit
    // that passed the admission check can land its enqueue while in-flight
    // work is still finishing, so a single sweep is not enough. The killed
    // flag is re-checked per request so a kill arriving mid-drain takes
    // effect immediately; in-flight work always runs to completion.
    loop {
        let mut drained = false;
        while let Some(request) = rx.try_recv() {
            drained = true;
            if lifecycle.is_killed() {
                tracing::debug!(records = request.len(), "discarding queued batch after kill");
                continue;
            }
            spawn_worker(&mut tasks, &gate, &processor, request).await;
        }
        if !drained && tasks.is_empty() {
            break;
        }
        while let Some(result) = tasks.join_next().await {
            if let Err(e) = result {
                tracing::error!(error = %e, "export worker panicked");
            }
        }
    }

    lifecycle.mark_shutdown();
}

async fn spawn_worker<P: Processor>(
    tasks: &mut JoinSet<()>,
    gate: &Arc<tokio::sync::Semaphore>,
    processor: &Arc<P>,
    request: ExportRequest,
) {
    let permit = Arc::clone(gate)
        .acquire_owned()
        .await
        .expect("worker gate is never closed");
    let processor = Arc::clone(processor);
    tasks.spawn(async move {
        run_one(&*processor, request).await;
        drop(permit);
    });
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::span::Span;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex;
    use std::time::{Duration, SystemTime};

    struct RecordingProcessor {
        processed: Mutex<Vec<usize>>,
        inflight: AtomicUsize,
        max_inflight: AtomicUsize,
        delay: Option<Duration>,
    }

    impl RecordingProcessor {
        fn new() -> Self {
            Self {
                processed: Mutex::new(Vec::new()),
                inflight: AtomicUsize::new(0),
                max_inflight: AtomicUsize::new(0),
                delay: None,
            }
        }

        fn slow(delay: Duration) -> Self {
            Self {
                delay: Some(delay),
                ..Self::new()
            }
        }

        fn processed_count(&self) -> usize {
            self.processed.lock().unwrap().len()
        }
    }

    impl Processor for RecordingProcessor {
        async fn process(&self, request: ExportRequest) -> Result<(), ExportError> {
            let now = self.inflight.fetch_add(1, Ordering::SeqCst) + 1;
            self.max_inflight.fetch_max(now, Ordering::SeqCst);
            if let Some(delay) = self.delay {
                tokio::time::sleep(delay).await;
            }
            self.processed.lock().unwrap().push(request.len());
            self.inflight.fetch_sub(1, Ordering::SeqCst);
            Ok(())
        }
    }

    fn spans(n: usize) -> ExportRequest {
        let now = SystemTime::now();
        ExportRequest::Spans((0..n as u64).map(|i| Span::new(1, i, "op", now, now)).collect())
    }

    #[tokio::test]
    async fn processes_submitted_batches() {
        let processor = Arc::new(RecordingProcessor::new());
        let dispatcher = Dispatcher::new(DispatcherConfig::default(), Arc::clone(&processor));

        for _ in 0..5 {
            dispatcher.submit(spans(3)).await.unwrap();
        }

        dispatcher.shutdown();
        assert!(run_blocking_wait(&dispatcher).await);
        assert_eq!(processor.processed_count(), 5);
    }

    #[tokio::test]
    async fn empty_batch_is_a_no_op() {
        let processor = Arc::new(RecordingProcessor::new());
        let dispatcher = Dispatcher::new(DispatcherConfig::default(), Arc::clone(&processor));

        dispatcher.submit(ExportRequest::Spans(vec![])).await.unwrap();
        dispatcher.submit(ExportRequest::Stats(vec![])).await.unwrap();

        dispatcher.shutdown();
        assert!(run_blocking_wait(&dispatcher).await);
        assert_eq!(processor.processed_count(), 0);
    }

    #[tokio::test]
    async fn rejects_after_shutdown() {
        let processor = Arc::new(RecordingProcessor::new());
        let dispatcher = Dispatcher::new(DispatcherConfig::default(), Arc::clone(&processor));

        dispatcher.shutdown();
        match dispatcher.submit(spans(1)).await {
            Err(ExportError::NotRunning) => {}
            other => panic!("expected NotRunning, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn inline_mode_runs_on_caller() {
        let processor = Arc::new(RecordingProcessor::new());
        let dispatcher = Dispatcher::new(
            DispatcherConfig {
                worker_count: 0,
                queue_capacity: 8,
            },
            Arc::clone(&processor),
        );

        dispatcher.submit(spans(2)).await.unwrap();
        // No pump exists; the work already ran.
        assert_eq!(processor.processed_count(), 1);

        dispatcher.shutdown();
        assert!(dispatcher.is_shutdown());
    }

    #[tokio::test]
    async fn queue_full_runs_inline_instead_of_rejecting() {
        // One slow worker and a single queue slot force the fallback.
        let processor = Arc::new(RecordingProcessor::slow(Duration::from_millis(100)));
        let dispatcher = Dispatcher::new(
            DispatcherConfig {
                worker_count: 1,
                queue_capacity: 1,
            },
            Arc::clone(&processor),
        );

        let mut submitted = 0;
        for _ in 0..6 {
            dispatcher.submit(spans(1)).await.unwrap();
            submitted += 1;
        }

        dispatcher.shutdown();
        assert!(run_blocking_wait(&dispatcher).await);
        assert_eq!(processor.processed_count(), submitted, "no batch dropped");
    }

    #[tokio::test]
    async fn parallelism_is_bounded_by_worker_count() {
        let processor = Arc::new(RecordingProcessor::slow(Duration::from_millis(50)));
        let dispatcher = Dispatcher::new(
            DispatcherConfig {
                worker_count: 2,
                queue_capacity: 100,
            },
            Arc::clone(&processor),
        );

        for _ in 0..10 {
            dispatcher.submit(spans(1)).await.unwrap();
        }

        dispatcher.shutdown();
        assert!(run_blocking_wait(&dispatcher).await);
        assert_eq!(processor.processed_count(), 10);
        assert!(
            processor.max_inflight.load(Ordering::SeqCst) <= 2,
            "at most worker_count requests in flight"
        );
    }

    #[tokio::test]
    async fn shutdown_drains_queue() {
        let processor = Arc::new(RecordingProcessor::slow(Duration::from_millis(20)));
        let dispatcher = Dispatcher::new(
            DispatcherConfig {
                worker_count: 1,
                queue_capacity: 100,
            },
            Arc::clone(&processor),
        );

        for _ in 0..20 {
            dispatcher.submit(spans(1)).await.unwrap();
        }
        dispatcher.shutdown();
        assert!(!dispatcher.is_running());

        assert!(run_blocking_wait(&dispatcher).await);
        assert!(dispatcher.is_shutdown());
        assert_eq!(processor.processed_count(), 20, "queued work drained");
    }

    #[tokio::test]
    async fn kill_discards_queued_work() {
        let processor = Arc::new(RecordingProcessor::slow(Duration::from_millis(100)));
        let dispatcher = Dispatcher::new(
            DispatcherConfig {
                worker_count: 1,
                queue_capacity: 100,
            },
            Arc::clone(&processor),
        );

        for _ in 0..20 {
            dispatcher.submit(spans(1)).await.unwrap();
        }
        // Give the pump a moment to start the first batch.
        tokio::time::sleep(Duration::from_millis(30)).await;
        dispatcher.kill();

        assert!(run_blocking_wait(&dispatcher).await);
        let processed = processor.processed_count();
        assert!(processed >= 1, "in-flight work completed");
        assert!(processed < 20, "queued work discarded, got {processed}");
    }

    #[tokio::test]
    async fn unbounded_queue_never_runs_inline() {
        let processor = Arc::new(RecordingProcessor::slow(Duration::from_millis(10)));
        let dispatcher = Dispatcher::new(
            DispatcherConfig {
                worker_count: 1,
                queue_capacity: 0,
            },
            Arc::clone(&processor),
        );

        for _ in 0..50 {
            dispatcher.submit(spans(1)).await.unwrap();
        }
        // Nothing processed synchronously: all fifty are queued or running.
        assert!(processor.processed_count() < 50);

        dispatcher.shutdown();
        assert!(run_blocking_wait(&dispatcher).await);
        assert_eq!(processor.processed_count(), 50);
    }

    #[tokio::test]
    async fn enqueue_racing_shutdown_is_still_processed() {
        // A submit can pass the running check, then land its enqueue only
        // after the pump has swept the queue once and is waiting on
        // in-flight work. The accepted batch must still be processed before
        // termination is signalled.
        let processor = Arc::new(RecordingProcessor::slow(Duration::from_millis(80)));
        let dispatcher = Dispatcher::new(
            DispatcherConfig {
                worker_count: 1,
                queue_capacity: 8,
            },
            Arc::clone(&processor),
        );

        dispatcher.submit(spans(1)).await.unwrap();
        // Let the pump move the first batch into a worker.
        tokio::time::sleep(Duration::from_millis(20)).await;
        dispatcher.shutdown();
        // Pump is now past its first sweep, waiting on the in-flight batch.
        tokio::time::sleep(Duration::from_millis(20)).await;

        // The racing submit's enqueue, landing late against the live queue.
        match dispatcher.queue.as_ref().unwrap() {
            QueueTx::Bounded(tx) => tx.try_send(spans(1)).unwrap(),
            QueueTx::Unbounded(tx) => tx.send(spans(1)).unwrap(),
        }

        assert!(run_blocking_wait(&dispatcher).await);
        assert_eq!(
            processor.processed_count(),
            2,
            "late-enqueued batch drained before termination"
        );
    }

    /// `wait_for_termination` blocks the thread, so run it off the runtime.
    async fn run_blocking_wait<P: Processor>(dispatcher: &Dispatcher<P>) -> bool {
        let lifecycle = dispatcher.lifecycle.clone();
        tokio::task::spawn_blocking(move || {
            lifecycle.wait_for_termination(Duration::from_secs(10))
        })
        .await
        .unwrap()
    }
}
