//! The in-process work queue and its dispatch loop.

use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{oneshot, Notify};
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use conveyor_core::service::Filter;
use conveyor_core::store::StageStore;
use conveyor_core::{Error, Result, Stage, Status};

use crate::eligibility::{labels_equal, within_branch_limits, within_limits};

/// Reconciliation interval: the dispatch loop re-evaluates at least this
/// often even without hints, so missed signals and externally freed
/// concurrency slots are eventually picked up.
const DISPATCH_INTERVAL: Duration = Duration::from_secs(60);

/// Matchmaker between waiting worker requests and incomplete stages.
///
/// The queue owns the set of waiting workers and never owns stages; the
/// store is the queue. A stage handed to a worker is not mutated here —
/// acceptance is confirmed separately under the store's optimistic lock,
/// so delivery is at-least-once and deduplicated there.
pub struct Queue {
    store: Arc<dyn StageStore>,
    inner: Mutex<Inner>,
    ready: Notify,
    seq: AtomicU64,
    interval: Duration,
}

#[derive(Default)]
struct Inner {
    paused: bool,
    workers: Vec<Worker>,
}

struct Worker {
    id: u64,
    os: String,
    arch: String,
    variant: String,
    kernel: String,
    labels: HashMap<String, String>,
    channel: oneshot::Sender<Stage>,
}

impl Worker {
    fn matches(&self, stage: &Stage) -> bool {
        if self.os != stage.os || self.arch != stage.arch {
            return false;
        }
        // A pinned variant or kernel must match the worker exactly.
        if !stage.variant.is_empty() && stage.variant != self.variant {
            return false;
        }
        if !stage.kernel.is_empty() && stage.kernel != self.kernel {
            return false;
        }
        if !stage.labels.is_empty() || !self.labels.is_empty() {
            return labels_equal(&stage.labels, &self.labels);
        }
        true
    }
}

impl Queue {
    pub fn new(store: Arc<dyn StageStore>) -> Self {
        Self::with_interval(store, DISPATCH_INTERVAL)
    }

    pub fn with_interval(store: Arc<dyn StageStore>, interval: Duration) -> Self {
        Self {
            store,
            inner: Mutex::new(Inner::default()),
            ready: Notify::new(),
            seq: AtomicU64::new(1),
            interval,
        }
    }

    /// Run the dispatch loop until `shutdown` fires. The loop is the sole
    /// writer of worker delivery channels.
    pub fn spawn(self: Arc<Self>, shutdown: CancellationToken) -> tokio::task::JoinHandle<()> {
        tokio::spawn(async move {
            loop {
                tokio::select! {
                    _ = shutdown.cancelled() => return,
                    _ = self.ready.notified() => {}
                    _ = tokio::time::sleep(self.interval) => {}
                }
                if let Err(err) = self.dispatch().await {
                    warn!(error = %err, "queue: cannot dispatch");
                }
            }
        })
    }

    /// Hint that new work may be available. Redundant hints merge into at
    /// most one pending wake-up.
    pub fn schedule(&self, stage: &Stage) {
        debug!(stage_id = stage.id, build_id = stage.build_id, "queue: schedule hint");
        self.ready.notify_one();
    }

    pub fn pause(&self) {
        self.inner.lock().paused = true;
    }

    pub fn resume(&self) {
        self.inner.lock().paused = false;
        self.ready.notify_one();
    }

    pub fn paused(&self) -> bool {
        self.inner.lock().paused
    }

    /// Register a worker request and park until a matching stage is handed
    /// off or `cancel` fires. Cancellation removes the worker from the
    /// waiting set before returning; the delivery channel is never written
    /// after removal.
    pub async fn request(&self, filter: Filter, cancel: CancellationToken) -> Result<Stage> {
        debug!(
            os = %filter.os,
            arch = %filter.arch,
            variant = %filter.variant,
            kernel = %filter.kernel,
            "queue: request work"
        );

        let id = self.seq.fetch_add(1, Ordering::Relaxed);
        let (tx, mut rx) = oneshot::channel();
        self.inner.lock().workers.push(Worker {
            id,
            os: filter.os,
            arch: filter.arch,
            variant: filter.variant,
            kernel: filter.kernel,
            labels: filter.labels,
            channel: tx,
        });
        // Removes the worker even if this future is dropped mid-poll.
        let _guard = RemoveOnDrop { queue: self, id };
        self.ready.notify_one();

        tokio::select! {
            _ = cancel.cancelled() => {}
            stage = &mut rx => return stage.map_err(|_| Error::Cancelled),
        }

        if self.remove(id) {
            debug!("queue: request cancelled");
            Err(Error::Cancelled)
        } else {
            // The dispatcher won the race: the worker was removed under
            // the lock and the hand-off already completed.
            rx.try_recv().map_err(|_| Error::Cancelled)
        }
    }

    fn remove(&self, id: u64) -> bool {
        let mut inner = self.inner.lock();
        let before = inner.workers.len();
        inner.workers.retain(|w| w.id != id);
        inner.workers.len() != before
    }

    /// One dispatch pass: evaluate every waiting worker against every
    /// incomplete stage, handing at most one stage to at most one worker.
    pub(crate) async fn dispatch(&self) -> Result<()> {
        {
            let inner = self.inner.lock();
            if inner.paused || inner.workers.is_empty() {
                return Ok(());
            }
        }

        let items = self.store.list_incomplete().await?;

        let mut inner = self.inner.lock();
        for item in &items {
            if !within_branch_limits(item, &items) {
                continue;
            }
            if item.status == Status::Running {
                continue;
            }
            if !item.machine.is_empty() {
                continue;
            }
            if !within_limits(item, &items) {
                continue;
            }

            // Hand the stage to the first matching worker. A worker whose
            // caller vanished fails the send and is simply discarded.
            while let Some(pos) = inner.workers.iter().position(|w| w.matches(item)) {
                let worker = inner.workers.remove(pos);
                if worker.channel.send(item.clone()).is_ok() {
                    debug!(
                        stage_id = item.id,
                        build_id = item.build_id,
                        os = %item.os,
                        arch = %item.arch,
                        "queue: stage dispatched"
                    );
                    break;
                }
            }
            if inner.workers.is_empty() {
                break;
            }
        }
        Ok(())
    }
}

struct RemoveOnDrop<'a> {
    queue: &'a Queue,
    id: u64,
}

impl Drop for RemoveOnDrop<'_> {
    fn drop(&mut self) {
        self.queue.remove(self.id);
    }
}
