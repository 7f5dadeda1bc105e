//! Background export worker.
//!
//! [`WorkerPool`] runs export tasks on a dedicated thread. Requests and
//! responses are plain messages over channels, matched by a
//! monotonically increasing correlation id. A router thread owns the
//! response stream and forwards each message to the [`Ticket`] waiting
//! on its id; final messages remove the pending entry, progress
//! messages leave it in place.
//!
//! The pool never stops a running task. Dropping a [`Ticket`] (for
//! example after a timeout) only discards the eventual result.

use std::collections::HashMap;
use std::panic::{self, AssertUnwindSafe};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::mpsc::{self, Receiver, RecvTimeoutError, Sender};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::thread;
use std::time::Duration;

use web_time::Instant;

use crate::error::{ExportError, WorkerError};
use crate::protocol::{
    Progress, ResponseBody, TaskFailure, TaskOutput, WorkerRequest, WorkerResponse, WorkerTask,
};
use crate::scratch::ScratchPool;
use crate::tasks::run_task;

/// Function the worker thread runs for each task.
pub type Executor =
    fn(&WorkerTask, &ScratchPool, &mut dyn FnMut(Progress)) -> Result<TaskOutput, ExportError>;

type PendingTable = HashMap<u64, Sender<WorkerResponse>>;

fn lock(table: &Mutex<PendingTable>) -> MutexGuard<'_, PendingTable> {
    table.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Handle to the background worker thread.
#[derive(Debug)]
pub struct WorkerPool {
    requests: Option<Sender<WorkerRequest>>,
    pending: Arc<Mutex<PendingTable>>,
    healthy: Arc<AtomicBool>,
    ready: Arc<AtomicBool>,
    next_id: AtomicU64,
}

impl WorkerPool {
    /// Start a worker that runs the standard export tasks.
    ///
    /// # Errors
    ///
    /// Returns [`WorkerError::Spawn`] if a thread cannot be created.
    pub fn spawn(scratch_pool_size: usize) -> Result<Self, WorkerError> {
        Self::spawn_with(scratch_pool_size, run_task)
    }

    /// Start a worker that runs `execute` for each task.
    ///
    /// # Errors
    ///
    /// Returns [`WorkerError::Spawn`] if a thread cannot be created.
    pub fn spawn_with(scratch_pool_size: usize, execute: Executor) -> Result<Self, WorkerError> {
        let (request_tx, request_rx) = mpsc::channel::<WorkerRequest>();
        let (response_tx, response_rx) = mpsc::channel::<WorkerResponse>();
        let pending = Arc::new(Mutex::new(PendingTable::new()));
        let healthy = Arc::new(AtomicBool::new(true));
        let ready = Arc::new(AtomicBool::new(false));

        thread::Builder::new()
            .name("iconforge-export-worker".into())
            .spawn(move || {
                worker_loop(&request_rx, &response_tx, &ScratchPool::new(scratch_pool_size), execute);
            })
            .map_err(|e| WorkerError::Spawn(e.to_string()))?;

        let router = RouterState {
            pending: Arc::clone(&pending),
            healthy: Arc::clone(&healthy),
            ready: Arc::clone(&ready),
        };
        thread::Builder::new()
            .name("iconforge-export-router".into())
            .spawn(move || router.run(&response_rx))
            .map_err(|e| WorkerError::Spawn(e.to_string()))?;

        tracing::debug!(scratch_pool_size, "spawned export worker");
        Ok(Self {
            requests: Some(request_tx),
            pending,
            healthy,
            ready,
            next_id: AtomicU64::new(0),
        })
    }

    /// Whether tasks can be dispatched.
    #[must_use]
    pub fn is_available(&self) -> bool {
        self.requests.is_some() && self.healthy.load(Ordering::Acquire)
    }

    /// Whether the worker has announced readiness.
    #[must_use]
    pub fn is_ready(&self) -> bool {
        self.ready.load(Ordering::Acquire)
    }

    /// Block until the worker is ready or `timeout` passes.
    #[must_use]
    pub fn wait_ready(&self, timeout: Duration) -> bool {
        let deadline = Instant::now() + timeout;
        while !self.is_ready() {
            if !self.is_available() || Instant::now() >= deadline {
                return false;
            }
            thread::sleep(Duration::from_millis(1));
        }
        true
    }

    /// Number of tasks awaiting a final response.
    #[must_use]
    pub fn pending(&self) -> usize {
        lock(&self.pending).len()
    }

    /// Post `task` to the worker.
    ///
    /// # Errors
    ///
    /// Returns [`WorkerError::Unavailable`] after [`terminate`](Self::terminate)
    /// or once the worker has stopped, and [`WorkerError::Disconnected`]
    /// if the request could not be delivered.
    pub fn dispatch(&self, task: WorkerTask) -> Result<Ticket, WorkerError> {
        let requests = match &self.requests {
            Some(tx) if self.healthy.load(Ordering::Acquire) => tx,
            _ => return Err(WorkerError::Unavailable),
        };
        let id = self.next_id.fetch_add(1, Ordering::Relaxed) + 1;
        let kind = task.kind();
        let (reply_tx, reply_rx) = mpsc::channel();
        lock(&self.pending).insert(id, reply_tx);

        if requests.send(WorkerRequest { task, id }).is_err() {
            lock(&self.pending).remove(&id);
            self.healthy.store(false, Ordering::Release);
            return Err(WorkerError::Disconnected { id });
        }
        tracing::debug!(id, kind, "dispatched task to worker");
        Ok(Ticket {
            id,
            replies: reply_rx,
            pending: Arc::clone(&self.pending),
        })
    }

    /// Stop accepting tasks and drop every pending entry.
    ///
    /// A task already running finishes on the worker thread; its result
    /// is discarded.
    pub fn terminate(&mut self) {
        if self.requests.take().is_some() {
            self.healthy.store(false, Ordering::Release);
            let dropped = {
                let mut table = lock(&self.pending);
                let n = table.len();
                table.clear();
                n
            };
            tracing::info!(dropped, "terminated export worker");
        }
    }
}

impl Drop for WorkerPool {
    fn drop(&mut self) {
        self.terminate();
    }
}

/// What became of a dispatched task.
#[derive(Debug)]
pub enum WaitOutcome {
    /// The worker finished the task.
    Done(TaskOutput),
    /// The worker failed or went away.
    Failed(WorkerError),
    /// The deadline passed first.
    TimedOut,
}

/// A dispatched task awaiting its result.
///
/// Dropping the ticket abandons the task.
#[derive(Debug)]
pub struct Ticket {
    id: u64,
    replies: Receiver<WorkerResponse>,
    pending: Arc<Mutex<PendingTable>>,
}

impl Ticket {
    /// Correlation id of the task.
    #[must_use]
    pub const fn id(&self) -> u64 {
        self.id
    }

    /// Wait for the final response, forwarding progress as it arrives.
    pub fn wait(self, deadline: Instant, progress: &mut dyn FnMut(Progress)) -> WaitOutcome {
        let id = self.id;
        loop {
            let remaining = deadline.saturating_duration_since(Instant::now());
            match self.replies.recv_timeout(remaining) {
                Ok(response) => match response.body {
                    ResponseBody::Progress(p) => progress(p),
                    ResponseBody::Success(output) => return WaitOutcome::Done(output),
                    ResponseBody::Error(TaskFailure { message, .. }) => {
                        return WaitOutcome::Failed(WorkerError::Task { id, message });
                    }
                    ResponseBody::Ready => {}
                },
                Err(RecvTimeoutError::Timeout) => return WaitOutcome::TimedOut,
                Err(RecvTimeoutError::Disconnected) => {
                    return WaitOutcome::Failed(WorkerError::Disconnected { id });
                }
            }
        }
    }
}

impl Drop for Ticket {
    fn drop(&mut self) {
        lock(&self.pending).remove(&self.id);
    }
}

fn worker_loop(
    requests: &Receiver<WorkerRequest>,
    responses: &Sender<WorkerResponse>,
    scratch: &ScratchPool,
    execute: Executor,
) {
    if responses.send(WorkerResponse::ready()).is_err() {
        return;
    }
    for WorkerRequest { task, id } in requests {
        let mut progress = |p: Progress| {
            // The router may already be gone; progress is best effort.
            let _ = responses.send(WorkerResponse {
                body: ResponseBody::Progress(p),
                id: Some(id),
            });
        };
        let outcome =
            panic::catch_unwind(AssertUnwindSafe(|| execute(&task, scratch, &mut progress)));
        let body = match outcome {
            Ok(Ok(output)) => ResponseBody::Success(output),
            Ok(Err(e)) => ResponseBody::Error(TaskFailure::from(&e)),
            Err(_) => ResponseBody::Error(TaskFailure {
                kind: "worker".into(),
                message: format!("{} task panicked", task.kind()),
            }),
        };
        if responses
            .send(WorkerResponse { body, id: Some(id) })
            .is_err()
        {
            break;
        }
    }
}

struct RouterState {
    pending: Arc<Mutex<PendingTable>>,
    healthy: Arc<AtomicBool>,
    ready: Arc<AtomicBool>,
}

impl RouterState {
    fn run(&self, responses: &Receiver<WorkerResponse>) {
        for response in responses {
            self.route(response);
        }
        self.healthy.store(false, Ordering::Release);
        lock(&self.pending).clear();
        tracing::debug!("export worker stopped");
    }

    fn route(&self, response: WorkerResponse) {
        let Some(id) = response.id else {
            if matches!(response.body, ResponseBody::Ready) {
                self.ready.store(true, Ordering::Release);
                tracing::debug!("export worker ready");
            } else {
                tracing::warn!("ignoring worker message without id");
            }
            return;
        };

        let reply = {
            let mut table = lock(&self.pending);
            if response.is_final() {
                table.remove(&id)
            } else {
                table.get(&id).cloned()
            }
        };
        match reply {
            // A closed receiver means the ticket was just dropped.
            Some(tx) => {
                let _ = tx.send(response);
            }
            None => tracing::warn!(id, "ignoring worker message for unknown task"),
        }
    }
}
