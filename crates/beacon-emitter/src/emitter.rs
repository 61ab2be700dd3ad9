use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use tokio::sync::Notify;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use beacon_core::Payload;
use beacon_store::{EventStore, StoreError};
use beacon_telemetry::PipelineMetrics;

use crate::batcher::partition;
use crate::callback::RequestCallback;
use crate::config::{EmitterConfig, Method};
use crate::transport::Transport;

#[derive(Debug, thiserror::Error)]
pub enum EmitError {
    #[error("delivery worker did not stop within {0:?}")]
    ShutdownTimeout(Duration),

    #[error(transparent)]
    Storage(#[from] StoreError),
}

/// Owns one event store and one transport, and drains the former into the
/// latter from a single logical delivery worker. No two passes for the same
/// emitter run concurrently; the transport may parallelize internally.
pub struct Emitter {
    store: Arc<dyn EventStore>,
    config: EmitterConfig,
    metrics: Arc<PipelineMetrics>,
    paused: Arc<AtomicBool>,
    active: Arc<AtomicBool>,
    wake: Arc<Notify>,
    cancel: CancellationToken,
    worker: Mutex<Option<JoinHandle<()>>>,
}

impl Emitter {
    /// Spawn the delivery worker on `handle`. The worker parks until the
    /// first wake and exits only on `shutdown`.
    pub fn new(
        store: Arc<dyn EventStore>,
        transport: Arc<dyn Transport>,
        config: EmitterConfig,
        metrics: Arc<PipelineMetrics>,
        callback: Option<Arc<dyn RequestCallback>>,
        handle: &tokio::runtime::Handle,
    ) -> Self {
        let paused = Arc::new(AtomicBool::new(false));
        let active = Arc::new(AtomicBool::new(false));
        let wake = Arc::new(Notify::new());
        let cancel = CancellationToken::new();

        let worker = DeliveryWorker {
            store: Arc::clone(&store),
            transport,
            config: config.clone(),
            metrics: Arc::clone(&metrics),
            callback,
            paused: Arc::clone(&paused),
            active: Arc::clone(&active),
            wake: Arc::clone(&wake),
            cancel: cancel.clone(),
        };
        let join = handle.spawn(worker.run());

        Self {
            store,
            config,
            metrics,
            paused,
            active,
            wake,
            cancel,
            worker: Mutex::new(Some(join)),
        }
    }

    /// Append a payload to the store and start the delivery loop once enough
    /// events are pending for the configured batch policy (GET always sends
    /// immediately). Storage failures are logged, never propagated.
    pub fn add(&self, payload: &Payload) {
        match self.store.add(payload) {
            Ok(_) => self.metrics.record_stored(),
            Err(e) => {
                warn!(error = %e, "failed to store payload; event dropped");
                return;
            }
        }
        if self.paused.load(Ordering::Acquire) {
            return;
        }
        let threshold = match self.config.method {
            Method::Get => 1,
            Method::Post => self.config.batch_policy.events_per_request() as u64,
        };
        let pending = self.store.size().unwrap_or(0);
        if pending >= threshold {
            self.wake.notify_one();
        }
    }

    /// Force a loop start regardless of the batch threshold or idle state.
    pub fn flush(&self) {
        self.wake.notify_one();
    }

    /// Stop delivering after the current pass. Cooperative: checked between
    /// loop iterations, never preempting an in-flight request.
    pub fn pause(&self) {
        self.paused.store(true, Ordering::Release);
    }

    pub fn resume(&self) {
        self.paused.store(false, Ordering::Release);
        self.wake.notify_one();
    }

    pub fn is_paused(&self) -> bool {
        self.paused.load(Ordering::Acquire)
    }

    /// Whether the delivery loop is currently draining (as opposed to idle).
    pub fn is_active(&self) -> bool {
        self.active.load(Ordering::Acquire)
    }

    /// Pending events in the store.
    pub fn pending(&self) -> Result<u64, EmitError> {
        Ok(self.store.size()?)
    }

    /// Pause, then wait for the worker to exit, aborting it if the timeout
    /// elapses first.
    pub async fn shutdown(&self, timeout: Duration) -> Result<(), EmitError> {
        self.paused.store(true, Ordering::Release);
        self.cancel.cancel();
        let Some(join) = self.worker.lock().take() else {
            return Ok(());
        };
        let abort = join.abort_handle();
        match tokio::time::timeout(timeout, join).await {
            Ok(_) => {
                info!("delivery worker stopped");
                Ok(())
            }
            Err(_) => {
                abort.abort();
                Err(EmitError::ShutdownTimeout(timeout))
            }
        }
    }
}

enum PassOutcome {
    /// Nothing to read.
    Empty,
    /// A batch was delivered; `retry_pending` when retryable failures stayed
    /// in the store.
    Delivered { retry_pending: bool },
    /// Every request failed at the transport level.
    Unreachable,
}

struct DeliveryWorker {
    store: Arc<dyn EventStore>,
    transport: Arc<dyn Transport>,
    config: EmitterConfig,
    metrics: Arc<PipelineMetrics>,
    callback: Option<Arc<dyn RequestCallback>>,
    paused: Arc<AtomicBool>,
    active: Arc<AtomicBool>,
    wake: Arc<Notify>,
    cancel: CancellationToken,
}

impl DeliveryWorker {
    async fn run(self) {
        loop {
            tokio::select! {
                _ = self.cancel.cancelled() => break,
                _ = self.wake.notified() => {}
            }
            if self.paused.load(Ordering::Acquire) {
                continue;
            }
            self.active.store(true, Ordering::Release);
            self.drain().await;
            self.active.store(false, Ordering::Release);
        }
        debug!("delivery worker exiting");
    }

    /// One active period: poll, deliver and back off until the store stays
    /// empty for `empty_limit` consecutive polls, the endpoint turns out to
    /// be unreachable, or pause/shutdown is observed.
    async fn drain(&self) {
        let mut empty_polls = 0u32;
        while !self.cancel.is_cancelled() && !self.paused.load(Ordering::Acquire) {
            match self.deliver_pass().await {
                PassOutcome::Empty => {
                    empty_polls += 1;
                    if empty_polls >= self.config.empty_limit {
                        debug!(empty_polls, "store drained; going idle");
                        return;
                    }
                    self.wait_interval().await;
                }
                PassOutcome::Delivered { retry_pending } => {
                    empty_polls = 0;
                    if retry_pending {
                        self.wait_interval().await;
                    }
                }
                PassOutcome::Unreachable => {
                    warn!("collector unreachable; stopping delivery until the next wake");
                    return;
                }
            }
        }
    }

    /// Read one batch, send it, and settle every covered event.
    async fn deliver_pass(&self) -> PassOutcome {
        let events = match self.store.emittable_events(self.config.send_limit) {
            Ok(events) => events,
            Err(e) => {
                warn!(error = %e, "failed to read pending events");
                return PassOutcome::Empty;
            }
        };
        if events.is_empty() {
            return PassOutcome::Empty;
        }

        let requests = partition(events, &self.config);
        let results = self.transport.send(requests).await;

        let mut sent = 0usize;
        let mut retained = 0usize;
        let mut evicted = 0usize;
        for result in &results {
            if result.is_successful() {
                if let Err(e) = self.store.remove_events(&result.event_ids) {
                    warn!(error = %e, "failed to remove delivered events");
                }
                sent += result.event_ids.len();
            } else if result
                .should_retry(&self.config.custom_retry_rules, self.config.retry_failed_requests)
            {
                retained += result.event_ids.len();
            } else {
                warn!(
                    status = result.status_code.map(i64::from).unwrap_or(-1),
                    oversize = result.oversize,
                    events = result.event_ids.len(),
                    "evicting undeliverable events"
                );
                if let Err(e) = self.store.remove_events(&result.event_ids) {
                    warn!(error = %e, "failed to evict events");
                }
                evicted += result.event_ids.len();
            }
        }

        self.metrics.record_sent(sent as u64);
        self.metrics.record_retried(retained as u64);
        self.metrics.record_evicted(evicted as u64);
        if let Ok(depth) = self.store.size() {
            self.metrics.set_queue_depth(depth as i64);
        }

        if let Some(callback) = &self.callback {
            let failed = retained + evicted;
            if failed == 0 {
                callback.on_success(sent);
            } else {
                callback.on_failure(sent, failed);
            }
        }

        if results.iter().all(|r| r.status_code.is_none()) {
            return PassOutcome::Unreachable;
        }
        PassOutcome::Delivered {
            retry_pending: retained > 0,
        }
    }

    /// Sleep one poll interval, returning early on wake or shutdown.
    async fn wait_interval(&self) {
        tokio::select! {
            _ = self.cancel.cancelled() => {}
            _ = self.wake.notified() => {}
            _ = tokio::time::sleep(self.config.poll_interval) => {}
        }
    }
}
