//! Bounded work queue with a single background consumer.
//!
//! Producers hand events to the queue and return immediately; one worker
//! thread pulls them off and runs the fan-out handler. Backpressure is
//! bounded: a full queue blocks producers for at most the configured put
//! timeout, then reports `Full` so callers can react instead of hanging.
//! The worker survives handler failures (diagnose, cool down, resume) and
//! shutdown is transactional: either the queue drains within the deadline
//! or the caller gets the remaining count and the adapter stays draining.

use std::fmt;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Condvar, Mutex, RwLock};
use std::thread::JoinHandle;
use std::time::{Duration, Instant};

use crossbeam_channel::{bounded, Receiver, RecvTimeoutError, Sender};
use serde_json::json;

use crate::application::diagnostics::{names, payload, DiagnosticEmitter};
use crate::application::process::describe_panic;
use crate::application::ports::{EnqueueOutcome, QueuePort, QueueStopError};
use crate::domain::LogEvent;

/// Queue tuning knobs.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct QueueConfig {
    /// Channel capacity before producers block
    pub maxsize: usize,
    /// Bounded producer wait when the queue is full
    pub put_timeout: Duration,
    /// Default drain deadline for [`QueueAdapter::stop`]
    pub stop_timeout: Duration,
    /// Pause after a worker failure before resuming
    pub cooldown: Duration,
    /// Healthy-run duration after which the failure latch clears
    pub failure_reset_after: Duration,
}

impl Default for QueueConfig {
    fn default() -> Self {
        Self {
            maxsize: 2048,
            put_timeout: Duration::from_secs(1),
            stop_timeout: Duration::from_secs(5),
            cooldown: Duration::from_secs(1),
            failure_reset_after: Duration::from_secs(30),
        }
    }
}

/// Lifecycle of the queue adapter.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum QueueState {
    /// Constructed, worker not started
    Idle,
    /// Worker consuming events
    Running,
    /// Stop requested, waiting for the worker to drain
    Draining,
    /// Worker joined; no further events accepted
    Stopped,
}

enum QueueItem {
    Event(LogEvent),
    Stop,
}

type WorkerFn = dyn Fn(&LogEvent) + Send + Sync;

struct QueueShared {
    config: QueueConfig,
    sender: Sender<QueueItem>,
    receiver: Receiver<QueueItem>,
    state: Mutex<QueueState>,
    depth: AtomicUsize,
    handler: RwLock<Option<Arc<WorkerFn>>>,
    exited: Mutex<bool>,
    exited_signal: Condvar,
    worker_failed: AtomicBool,
    failed_at: Mutex<Option<Instant>>,
    degraded_reported: AtomicBool,
    diagnostics: DiagnosticEmitter,
}

/// Single-consumer queue decoupling producers from slow sink I/O.
pub struct QueueAdapter {
    shared: Arc<QueueShared>,
    worker: Mutex<Option<JoinHandle<()>>>,
}

impl QueueAdapter {
    /// Create the adapter; the worker starts with [`start`](Self::start).
    pub fn new(config: QueueConfig, diagnostics: DiagnosticEmitter) -> Self {
        let (sender, receiver) = bounded(config.maxsize);
        Self {
            shared: Arc::new(QueueShared {
                config,
                sender,
                receiver,
                state: Mutex::new(QueueState::Idle),
                depth: AtomicUsize::new(0),
                handler: RwLock::new(None),
                exited: Mutex::new(false),
                exited_signal: Condvar::new(),
                worker_failed: AtomicBool::new(false),
                failed_at: Mutex::new(None),
                degraded_reported: AtomicBool::new(false),
                diagnostics,
            }),
            worker: Mutex::new(None),
        }
    }

    /// Late-bind the fan-out handler the worker runs per event.
    pub fn set_worker<F>(&self, handler: F)
    where
        F: Fn(&LogEvent) + Send + Sync + 'static,
    {
        *self.shared.handler.write().expect("queue handler lock poisoned") = Some(Arc::new(handler));
    }

    /// Spawn the worker thread, transitioning `Idle → Running`.
    ///
    /// Starting an already running queue is a no-op.
    pub fn start(&self) -> std::io::Result<()> {
        let mut state = self.shared.state.lock().expect("queue state lock poisoned");
        if *state == QueueState::Running {
            return Ok(());
        }
        *state = QueueState::Running;
        drop(state);

        self.shared.worker_failed.store(false, Ordering::SeqCst);
        self.shared.degraded_reported.store(false, Ordering::SeqCst);
        *self.shared.exited.lock().expect("queue exit lock poisoned") = false;

        let shared = Arc::clone(&self.shared);
        let handle = std::thread::Builder::new()
            .name("logfan-queue-worker".into())
            .spawn(move || run_worker(shared))?;
        *self.worker.lock().expect("queue worker lock poisoned") = Some(handle);
        Ok(())
    }

    /// Current lifecycle state.
    pub fn state(&self) -> QueueState {
        *self.shared.state.lock().expect("queue state lock poisoned")
    }

    /// Events currently queued (excluding the stop sentinel).
    pub fn depth(&self) -> usize {
        self.shared.depth.load(Ordering::SeqCst)
    }

    /// Whether the worker observed a handler failure that has not yet
    /// cleared.
    pub fn worker_failed(&self) -> bool {
        self.shared.worker_failed.load(Ordering::SeqCst)
    }

    fn enqueue_inner(&self, event: LogEvent) -> EnqueueOutcome {
        if self.state() != QueueState::Running {
            return EnqueueOutcome::Closed;
        }

        // A failing worker drains slowly (cooldown per event); blocking
        // producers on it would stall the host application, so the queue
        // degrades to non-blocking drops until the latch clears.
        if self.shared.worker_failed.load(Ordering::SeqCst) {
            if !self.shared.degraded_reported.swap(true, Ordering::SeqCst) {
                self.shared.diagnostics.emit(
                    names::QUEUE_DEGRADED,
                    payload([("reason", json!("worker_failed"))]),
                );
            }
            return match self.shared.sender.try_send(QueueItem::Event(event)) {
                Ok(()) => {
                    self.shared.depth.fetch_add(1, Ordering::SeqCst);
                    EnqueueOutcome::Enqueued
                }
                Err(crossbeam_channel::TrySendError::Full(_)) => EnqueueOutcome::Full,
                Err(crossbeam_channel::TrySendError::Disconnected(_)) => EnqueueOutcome::Closed,
            };
        }

        match self
            .shared
            .sender
            .send_timeout(QueueItem::Event(event), self.shared.config.put_timeout)
        {
            Ok(()) => {
                self.shared.depth.fetch_add(1, Ordering::SeqCst);
                EnqueueOutcome::Enqueued
            }
            Err(crossbeam_channel::SendTimeoutError::Timeout(_)) => EnqueueOutcome::Full,
            Err(crossbeam_channel::SendTimeoutError::Disconnected(_)) => EnqueueOutcome::Closed,
        }
    }

    fn stop_inner(&self, drain: bool, timeout: Duration) -> Result<(), QueueStopError> {
        let deadline = Instant::now() + timeout;

        let send_sentinel = {
            let mut state = self.shared.state.lock().expect("queue state lock poisoned");
            match *state {
                QueueState::Stopped => return Ok(()),
                QueueState::Idle => {
                    *state = QueueState::Stopped;
                    return Ok(());
                }
                QueueState::Running => {
                    *state = QueueState::Draining;
                    true
                }
                // A previous stop already sent the sentinel; just wait.
                QueueState::Draining => false,
            }
        };

        if !drain {
            self.discard_pending();
        }

        if send_sentinel {
            let budget = deadline.saturating_duration_since(Instant::now());
            if self
                .shared
                .sender
                .send_timeout(QueueItem::Stop, budget)
                .is_err()
            {
                return Err(self.report_timeout(timeout));
            }
        }

        let exited = self.shared.exited.lock().expect("queue exit lock poisoned");
        let budget = deadline.saturating_duration_since(Instant::now());
        let (exited, wait) = self
            .shared
            .exited_signal
            .wait_timeout_while(exited, budget, |done| !*done)
            .expect("queue exit lock poisoned");
        if wait.timed_out() && !*exited {
            drop(exited);
            return Err(self.report_timeout(timeout));
        }
        drop(exited);

        if let Some(handle) = self.worker.lock().expect("queue worker lock poisoned").take() {
            // The worker already signalled exit; the join is immediate.
            let _ = handle.join();
        }
        *self.shared.state.lock().expect("queue state lock poisoned") = QueueState::Stopped;
        self.shared.worker_failed.store(false, Ordering::SeqCst);
        Ok(())
    }

    fn discard_pending(&self) {
        while let Ok(item) = self.shared.receiver.try_recv() {
            if matches!(item, QueueItem::Event(_)) {
                self.shared.depth.fetch_sub(1, Ordering::SeqCst);
            }
        }
    }

    fn report_timeout(&self, timeout: Duration) -> QueueStopError {
        let remaining = self.depth();
        self.shared.diagnostics.emit(
            names::QUEUE_SHUTDOWN_TIMEOUT,
            payload([
                ("timeout_ms", json!(timeout.as_millis() as u64)),
                ("remaining", json!(remaining)),
            ]),
        );
        QueueStopError::Timeout { remaining }
    }
}

impl QueuePort for QueueAdapter {
    fn enqueue(&self, event: LogEvent) -> EnqueueOutcome {
        self.enqueue_inner(event)
    }

    fn stop(&self, drain: bool, timeout: Duration) -> Result<(), QueueStopError> {
        self.stop_inner(drain, timeout)
    }
}

impl fmt::Debug for QueueAdapter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("QueueAdapter")
            .field("state", &self.state())
            .field("depth", &self.depth())
            .field("worker_failed", &self.worker_failed())
            .finish()
    }
}

fn run_worker(shared: Arc<QueueShared>) {
    loop {
        // The timeout keeps the worker responsive to disconnects; items
        // normally arrive long before it fires.
        let item = match shared.receiver.recv_timeout(Duration::from_millis(200)) {
            Ok(item) => item,
            Err(RecvTimeoutError::Timeout) => continue,
            Err(RecvTimeoutError::Disconnected) => break,
        };
        match item {
            QueueItem::Stop => break,
            QueueItem::Event(event) => {
                let handler = shared
                    .handler
                    .read()
                    .expect("queue handler lock poisoned")
                    .clone();
                if let Some(handler) = handler {
                    let outcome = catch_unwind(AssertUnwindSafe(|| handler(&event)));
                    match outcome {
                        Ok(()) => record_success(&shared),
                        Err(panic) => {
                            let error = describe_panic(panic.as_ref());
                            record_failure(&shared, &event, &error);
                            std::thread::sleep(shared.config.cooldown);
                        }
                    }
                }
                shared.depth.fetch_sub(1, Ordering::SeqCst);
            }
        }
    }

    let mut exited = shared.exited.lock().expect("queue exit lock poisoned");
    *exited = true;
    shared.exited_signal.notify_all();
}

fn record_failure(shared: &QueueShared, event: &LogEvent, error: &str) {
    shared.worker_failed.store(true, Ordering::SeqCst);
    *shared.failed_at.lock().expect("queue failure lock poisoned") = Some(Instant::now());
    tracing::error!(
        target: "logfan::queue",
        event_id = %event.event_id,
        %error,
        "queue worker handler failed; cooling down and resuming"
    );
    shared.diagnostics.emit(
        names::WORKER_FAILED,
        payload([
            ("event_id", json!(event.event_id)),
            ("error", json!(error)),
            ("cooldown_ms", json!(shared.config.cooldown.as_millis() as u64)),
        ]),
    );
}

fn record_success(shared: &QueueShared) {
    if !shared.worker_failed.load(Ordering::SeqCst) {
        return;
    }
    let failed_at = *shared.failed_at.lock().expect("queue failure lock poisoned");
    let recovered = match failed_at {
        Some(at) => at.elapsed() >= shared.config.failure_reset_after,
        None => true,
    };
    if recovered {
        shared.worker_failed.store(false, Ordering::SeqCst);
        shared.degraded_reported.store(false, Ordering::SeqCst);
        *shared.failed_at.lock().expect("queue failure lock poisoned") = None;
    }
}
