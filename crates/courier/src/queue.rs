//! Per-builder dispatch queues.
//!
//! Every [`Agent`](crate::Agent) owns one [`WorkQueue`]. The queue is backed by
//! a worker task that is started on the first dispatch and processes jobs in
//! submission order. Dropping the owning builder closes the queue; jobs that
//! were already submitted still run to completion.

use std::future::Future;
use std::panic::AssertUnwindSafe;
use std::pin::Pin;
use std::sync::OnceLock;
use std::sync::atomic::{AtomicU64, Ordering};
use std::task::{Context, Poll};

use futures_util::FutureExt;
use futures_util::future::BoxFuture;
use tokio::sync::{mpsc, oneshot};

use crate::error::Error;
use crate::response::Outcome;
use crate::targets;

type Job = BoxFuture<'static, ()>;

/// Unique identifier for one dispatch.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct DispatchId(u64);

impl DispatchId {
    pub(crate) fn next() -> Self {
        static COUNTER: AtomicU64 = AtomicU64::new(1);
        Self(COUNTER.fetch_add(1, Ordering::Relaxed))
    }

    /// The raw numeric id.
    pub fn as_u64(self) -> u64 {
        self.0
    }
}

impl std::fmt::Display for DispatchId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// A serial job queue owned by a single builder.
#[derive(Default)]
pub(crate) struct WorkQueue {
    sender: OnceLock<mpsc::UnboundedSender<Job>>,
}

impl WorkQueue {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    /// Queue `job`, starting the worker on first use.
    ///
    /// If the worker is gone (its runtime shut down) the job is spawned on its
    /// own so it still runs exactly once.
    pub(crate) fn submit<F>(&self, job: F)
    where
        F: Future<Output = ()> + Send + 'static,
    {
        let sender = self.sender.get_or_init(Self::start_worker);
        if let Err(mpsc::error::SendError(job)) = sender.send(Box::pin(job)) {
            tracing::warn!(
                target: targets::QUEUE,
                "Dispatch queue worker is gone, running job detached"
            );
            runtime::spawn(job);
        }
    }

    /// Whether the worker task has been started.
    pub(crate) fn is_started(&self) -> bool {
        self.sender.get().is_some()
    }

    fn start_worker() -> mpsc::UnboundedSender<Job> {
        let (tx, mut rx) = mpsc::unbounded_channel::<Job>();
        runtime::spawn(async move {
            tracing::trace!(target: targets::QUEUE, "Dispatch queue started");
            while let Some(job) = rx.recv().await {
                // A panicking callback must not take the queued jobs with it.
                if let Err(panic) = AssertUnwindSafe(job).catch_unwind().await {
                    tracing::error!(
                        target: targets::QUEUE,
                        "Dispatch job panicked: {}",
                        panic_message(panic.as_ref())
                    );
                }
            }
            tracing::trace!(target: targets::QUEUE, "Dispatch queue drained");
        });
        tx
    }
}

fn panic_message(panic: &(dyn std::any::Any + Send)) -> &str {
    panic
        .downcast_ref::<&str>()
        .copied()
        .or_else(|| panic.downcast_ref::<String>().map(String::as_str))
        .unwrap_or("non-string panic payload")
}

impl std::fmt::Debug for WorkQueue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WorkQueue")
            .field("started", &self.is_started())
            .finish()
    }
}

/// A handle to a queued dispatch that resolves to its [`Outcome`].
///
/// The dispatch runs whether or not the handle is polled; dropping the handle
/// only discards the outcome.
#[derive(Debug)]
#[must_use = "dropping a Dispatch discards its outcome; use `end` for fire-and-forget"]
pub struct Dispatch {
    id: DispatchId,
    receiver: oneshot::Receiver<Outcome>,
}

impl Dispatch {
    pub(crate) fn new(id: DispatchId, receiver: oneshot::Receiver<Outcome>) -> Self {
        Self { id, receiver }
    }

    /// Get the unique dispatch ID.
    pub fn id(&self) -> DispatchId {
        self.id
    }

    /// Wait for the outcome, blocking the current thread.
    ///
    /// # Warning
    ///
    /// Do not call this from within an async context, as it will block the
    /// runtime thread the dispatch may need. If the runtime running the
    /// builder's worker shuts down first, this returns
    /// [`Error::QueueClosed`] (see [`runtime`]).
    pub fn blocking_wait(self) -> Outcome {
        self.receiver
            .blocking_recv()
            .unwrap_or_else(|_| Outcome::failed(Error::QueueClosed, None))
    }
}

impl Future for Dispatch {
    type Output = Outcome;

    fn poll(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        Pin::new(&mut self.receiver)
            .poll(cx)
            .map(|result| result.unwrap_or_else(|_| Outcome::failed(Error::QueueClosed, None)))
    }
}

/// Runtime selection for dispatch workers.
///
/// Workers run on the ambient Tokio runtime when there is one. Outside of a
/// runtime a shared multi-threaded runtime is created on first use.
///
/// A builder's worker stays on the runtime it was started on. If that runtime
/// shuts down (for example a `current_thread` `#[tokio::main]` returning right
/// after `end`), jobs still queued on it are dropped and their callbacks never
/// run. Keep the runtime alive until outstanding dispatches complete, or
/// dispatch from outside any runtime to use the shared one.
pub mod runtime {
    use std::future::Future;
    use std::sync::OnceLock;

    use tokio::runtime::{Handle, Runtime};

    static RUNTIME: OnceLock<Runtime> = OnceLock::new();

    /// Initialize the shared fallback runtime.
    ///
    /// Calling this is optional; the runtime is created lazily otherwise.
    pub fn init() -> &'static Runtime {
        RUNTIME.get_or_init(|| {
            tokio::runtime::Builder::new_multi_thread()
                .worker_threads(2)
                .thread_name("courier-dispatch")
                .enable_all()
                .build()
                .expect("Failed to create tokio runtime")
        })
    }

    /// The runtime handle new workers are spawned on.
    pub fn handle() -> Handle {
        Handle::try_current().unwrap_or_else(|_| init().handle().clone())
    }

    /// Spawn a future on the ambient runtime, or the shared one.
    pub fn spawn<F>(future: F) -> tokio::task::JoinHandle<F::Output>
    where
        F: Future + Send + 'static,
        F::Output: Send + 'static,
    {
        handle().spawn(future)
    }
}
