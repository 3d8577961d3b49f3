//! Cancellable polling subscriptions over ledger reads.
//!
//! A [`Watched`] value owns at most one polling task. Restarting or stopping
//! the watch aborts that task and bumps a generation counter; a result is only
//! published if its generation is still current, so a superseded read can
//! never overwrite newer state.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use tokio::runtime::Handle;
use tokio::sync::{watch, Notify};
use tokio::task::JoinHandle;
use tracing::{debug, warn};

use crate::error::DistributorClientError;
use crate::error_queue::ErrorQueue;
use crate::ledger::BoxFuture;
use crate::state::{ErrorReport, ErrorSource};

/// Produces one fresh read of the watched value.
pub type FetchFn<T> =
    Arc<dyn Fn() -> BoxFuture<'static, Result<T, DistributorClientError>> + Send + Sync>;

/// Latest known state of a watched value.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Snapshot<T> {
    /// Last successfully read value; `None` until the first read lands.
    pub value: Option<T>,
    /// True from `start` until the first read of this generation lands.
    pub loading: bool,
    /// Error of the most recent read, cleared by the next success.
    pub error: Option<DistributorClientError>,
    pub generation: u64,
    /// Sequence number of the read that produced this snapshot.
    pub seq: u64,
}

impl<T> Snapshot<T> {
    fn idle(generation: u64) -> Self {
        Self {
            value: None,
            loading: false,
            error: None,
            generation,
            seq: 0,
        }
    }
}

struct Shared<T> {
    state: watch::Sender<Snapshot<T>>,
    generation: AtomicU64,
    issued: AtomicU64,
    refresh: Notify,
    sink: Option<(ErrorQueue, ErrorSource)>,
}

pub struct Watched<T> {
    shared: Arc<Shared<T>>,
    task: Mutex<Option<JoinHandle<()>>>,
    runtime: Handle,
    interval: Duration,
}

impl<T> Watched<T>
where
    T: Clone + Send + Sync + 'static,
{
    /// Creates an idle watch whose polling tasks run on `runtime`. Read errors
    /// are forwarded to `sink` when given.
    pub fn new(runtime: Handle, interval: Duration, sink: Option<(ErrorQueue, ErrorSource)>) -> Self {
        let (state, _) = watch::channel(Snapshot::idle(0));
        Self {
            shared: Arc::new(Shared {
                state,
                generation: AtomicU64::new(0),
                issued: AtomicU64::new(0),
                refresh: Notify::new(),
                sink,
            }),
            task: Mutex::new(None),
            runtime,
            interval,
        }
    }

    /// Starts (or restarts) polling with `fetch`. The previous generation's
    /// in-flight read is dropped.
    pub fn start(&self, fetch: FetchFn<T>) {
        let mut task = self.task.lock();
        if let Some(handle) = task.take() {
            handle.abort();
        }
        let generation = self.shared.generation.fetch_add(1, Ordering::SeqCst) + 1;
        self.shared.state.send_replace(Snapshot {
            loading: true,
            ..Snapshot::idle(generation)
        });
        debug!(generation, "watch started");
        *task = Some(self.runtime.spawn(poll(
            Arc::clone(&self.shared),
            fetch,
            generation,
            self.interval,
        )));
    }

    /// Stops polling and resets to the idle state.
    pub fn stop(&self) {
        let mut task = self.task.lock();
        if let Some(handle) = task.take() {
            handle.abort();
        }
        let generation = self.shared.generation.fetch_add(1, Ordering::SeqCst) + 1;
        self.shared.state.send_replace(Snapshot::idle(generation));
        debug!(generation, "watch stopped");
    }

    pub fn is_watching(&self) -> bool {
        self.task.lock().is_some()
    }

    pub fn snapshot(&self) -> Snapshot<T> {
        self.shared.state.borrow().clone()
    }

    pub fn subscribe(&self) -> watch::Receiver<Snapshot<T>> {
        self.shared.state.subscribe()
    }

    /// Forces a read issued after this call and waits for it to land.
    ///
    /// Reads already in flight when `refresh` is called do not satisfy it, so
    /// the returned snapshot reflects ledger state no older than the call.
    pub async fn refresh(&self) -> Snapshot<T> {
        if !self.is_watching() {
            return self.snapshot();
        }
        let generation = self.shared.generation.load(Ordering::SeqCst);
        let target = self.shared.issued.load(Ordering::SeqCst) + 1;
        let mut updates = self.shared.state.subscribe();
        self.shared.refresh.notify_one();

        let landed = updates
            .wait_for(|snapshot| snapshot.generation != generation || snapshot.seq >= target)
            .await
            .map(|snapshot| snapshot.clone());
        match landed {
            Ok(snapshot) => snapshot,
            Err(_) => self.snapshot(),
        }
    }
}

impl<T> Drop for Watched<T> {
    fn drop(&mut self) {
        if let Some(handle) = self.task.get_mut().take() {
            handle.abort();
        }
    }
}

async fn poll<T>(shared: Arc<Shared<T>>, fetch: FetchFn<T>, generation: u64, interval: Duration)
where
    T: Clone + Send + Sync + 'static,
{
    loop {
        let seq = shared.issued.fetch_add(1, Ordering::SeqCst) + 1;
        let outcome = fetch().await;
        if !publish(&shared, generation, seq, outcome) {
            return;
        }
        tokio::select! {
            _ = tokio::time::sleep(interval) => {}
            _ = shared.refresh.notified() => {}
        }
    }
}

/// Applies a read result. Returns false when the generation was superseded.
fn publish<T>(
    shared: &Shared<T>,
    generation: u64,
    seq: u64,
    outcome: Result<T, DistributorClientError>,
) -> bool {
    let mut superseded = false;
    let mut forward = None;
    shared.state.send_if_modified(|snapshot| {
        if snapshot.generation != generation {
            superseded = true;
            return false;
        }
        snapshot.loading = false;
        snapshot.seq = seq;
        match outcome {
            Ok(value) => {
                snapshot.value = Some(value);
                snapshot.error = None;
            }
            Err(err) => {
                if snapshot.error.as_ref() != Some(&err) {
                    forward = Some(err.clone());
                }
                snapshot.error = Some(err);
            }
        }
        true
    });

    if superseded {
        debug!(generation, seq, "discarding superseded read");
        return false;
    }
    if let Some(err) = forward {
        warn!(generation, seq, error = %err, "watched read failed");
        if let Some((queue, source)) = &shared.sink {
            queue.add_error(ErrorReport::new(*source, &err));
        }
    }
    true
}
