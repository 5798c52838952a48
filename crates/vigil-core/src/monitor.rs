// ── Monitor ──
//
// Async driver around an `Engine`. The engine lives inside a single
// actor task; every request (check results, commands, ticks, snapshot
// reads) goes through one mpsc channel and is applied one at a time.
// Contact notifications are handed to a dispatch task after each request
// commits, so a slow transport never holds up the engine.

use std::sync::Arc;
use std::sync::atomic::{AtomicI64, Ordering};
use std::time::Duration;

use chrono::{DateTime, Utc};
use tokio::sync::{Mutex, broadcast, mpsc, oneshot};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::engine::{Engine, EngineEvent, EngineSnapshot, Outcome};
use crate::error::CoreError;
use crate::log::{EventLog, LogRecord};
use crate::model::{DowntimeId, ItemRef, Notification, NotificationKind, State};
use crate::state::TransitionEvent;

const REQUEST_CHANNEL_SIZE: usize = 64;
const LOG_CHANNEL_SIZE: usize = 256;
/// Records kept in the engine's own log; subscribers get the full stream.
const LOG_RETENTION: usize = 1024;

// ── Clock ────────────────────────────────────────────────────────

/// Source of `now` for every request the monitor applies.
pub trait Clock: Send + Sync + 'static {
    fn now(&self) -> DateTime<Utc>;
}

#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

/// Clock moved by hand, with one-second resolution.
#[derive(Debug, Default)]
pub struct ManualClock {
    secs: AtomicI64,
}

impl ManualClock {
    pub fn new(start: DateTime<Utc>) -> Self {
        Self {
            secs: AtomicI64::new(start.timestamp()),
        }
    }

    pub fn set(&self, at: DateTime<Utc>) {
        self.secs.store(at.timestamp(), Ordering::SeqCst);
    }

    pub fn advance(&self, secs: i64) {
        self.secs.fetch_add(secs, Ordering::SeqCst);
    }
}

impl Clock for ManualClock {
    fn now(&self) -> DateTime<Utc> {
        DateTime::from_timestamp(self.secs.load(Ordering::SeqCst), 0).unwrap_or_default()
    }
}

// ── Transport ────────────────────────────────────────────────────

/// Delivery of contact notifications. Fire-and-forget: failures are the
/// transport's to report.
pub trait Transport: Send + Sync + 'static {
    fn deliver(&self, notification: &Notification);
}

/// Logs each notification instead of executing its command line.
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingTransport;

impl Transport for TracingTransport {
    fn deliver(&self, notification: &Notification) {
        if let NotificationKind::Contact {
            contact,
            command_line,
            ..
        } = &notification.kind
        {
            info!(
                contact = %contact,
                item = %notification.item,
                notification_type = %notification.notification_type,
                command = %command_line,
                "notification dispatched"
            );
        }
    }
}

/// Forwards notifications to a channel.
#[derive(Debug, Clone)]
pub struct ChannelTransport {
    tx: mpsc::UnboundedSender<Notification>,
}

impl ChannelTransport {
    pub fn new() -> (Self, mpsc::UnboundedReceiver<Notification>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self { tx }, rx)
    }
}

impl Transport for ChannelTransport {
    fn deliver(&self, notification: &Notification) {
        if self.tx.send(notification.clone()).is_err() {
            debug!(id = %notification.id, "notification receiver dropped");
        }
    }
}

// ── Configuration ────────────────────────────────────────────────

#[derive(Debug, Clone)]
pub struct MonitorConfig {
    /// Interval of the periodic time sweep. Zero disables the tick task.
    pub tick_interval: Duration,
}

impl Default for MonitorConfig {
    fn default() -> Self {
        Self {
            tick_interval: Duration::from_secs(10),
        }
    }
}

// ── Requests ─────────────────────────────────────────────────────

enum Request {
    Event(EngineEvent),
    Snapshot,
}

enum Reply {
    Outcome(Outcome),
    Snapshot(Box<EngineSnapshot>),
}

struct RequestEnvelope {
    request: Request,
    response_tx: oneshot::Sender<Result<Reply, CoreError>>,
}

// ── Monitor ──────────────────────────────────────────────────────

/// Handle to a running engine. Cheaply cloneable.
#[derive(Clone)]
pub struct Monitor {
    inner: Arc<MonitorInner>,
}

struct MonitorInner {
    request_tx: mpsc::Sender<RequestEnvelope>,
    log_tx: broadcast::Sender<Arc<LogRecord>>,
    cancel: CancellationToken,
    task_handles: Mutex<Vec<JoinHandle<()>>>,
}

impl Monitor {
    /// Spawn the engine, dispatch and tick tasks on the current runtime.
    ///
    /// The engine's event log is replaced by one that broadcasts to
    /// [`events()`](Self::events) subscribers and keeps only the newest
    /// records.
    pub fn start(
        engine: Engine,
        config: &MonitorConfig,
        clock: Arc<dyn Clock>,
        transport: Arc<dyn Transport>,
    ) -> Self {
        let (log_tx, _) = broadcast::channel(LOG_CHANNEL_SIZE);
        let (request_tx, request_rx) = mpsc::channel(REQUEST_CHANNEL_SIZE);
        let (dispatch_tx, dispatch_rx) = mpsc::unbounded_channel();
        let cancel = CancellationToken::new();

        let engine = engine.with_log(
            EventLog::with_broadcast(log_tx.clone()).with_retention(LOG_RETENTION),
        );

        let mut handles = vec![
            tokio::spawn(engine_task(
                engine,
                request_rx,
                clock,
                dispatch_tx,
                cancel.clone(),
            )),
            tokio::spawn(dispatch_task(dispatch_rx, transport, cancel.clone())),
        ];
        if !config.tick_interval.is_zero() {
            handles.push(tokio::spawn(tick_task(
                request_tx.clone(),
                config.tick_interval,
                cancel.clone(),
            )));
        }
        debug!(tick_interval = ?config.tick_interval, "monitor started");

        Self {
            inner: Arc::new(MonitorInner {
                request_tx,
                log_tx,
                cancel,
                task_handles: Mutex::new(handles),
            }),
        }
    }

    /// Apply one event and wait for its outcome.
    pub async fn submit(&self, event: EngineEvent) -> Result<Outcome, CoreError> {
        match self.request(Request::Event(event)).await? {
            Reply::Outcome(outcome) => Ok(outcome),
            Reply::Snapshot(_) => Err(CoreError::EngineStopped),
        }
    }

    pub async fn check_result(
        &self,
        item: ItemRef,
        state: State,
        output: impl Into<String>,
    ) -> Result<TransitionEvent, CoreError> {
        let outcome = self
            .submit(EngineEvent::CheckResult {
                item,
                state,
                output: output.into(),
            })
            .await?;
        match outcome {
            Outcome::Transition(event) => Ok(event),
            _ => Err(CoreError::EngineStopped),
        }
    }

    pub async fn command(&self, line: impl Into<String>) -> Result<Outcome, CoreError> {
        self.submit(EngineEvent::Command(line.into())).await
    }

    pub async fn cancel_downtime(&self, id: DowntimeId) -> Result<bool, CoreError> {
        match self.submit(EngineEvent::CancelDowntime(id)).await? {
            Outcome::DowntimeCancelled { found, .. } => Ok(found),
            _ => Err(CoreError::EngineStopped),
        }
    }

    /// Run the time sweep now instead of waiting for the tick task.
    pub async fn tick(&self) -> Result<(), CoreError> {
        self.submit(EngineEvent::Tick).await.map(|_| ())
    }

    pub async fn snapshot(&self) -> Result<EngineSnapshot, CoreError> {
        match self.request(Request::Snapshot).await? {
            Reply::Snapshot(snapshot) => Ok(*snapshot),
            Reply::Outcome(_) => Err(CoreError::EngineStopped),
        }
    }

    /// Subscribe to event log records as they are appended.
    pub fn events(&self) -> broadcast::Receiver<Arc<LogRecord>> {
        self.inner.log_tx.subscribe()
    }

    /// Stop all tasks. Notifications already handed off are still delivered.
    pub async fn shutdown(&self) {
        self.inner.cancel.cancel();
        let mut handles = self.inner.task_handles.lock().await;
        for handle in handles.drain(..) {
            let _ = handle.await;
        }
        debug!("monitor stopped");
    }

    async fn request(&self, request: Request) -> Result<Reply, CoreError> {
        if self.inner.cancel.is_cancelled() {
            return Err(CoreError::EngineStopped);
        }
        let (tx, rx) = oneshot::channel();
        self.inner
            .request_tx
            .send(RequestEnvelope {
                request,
                response_tx: tx,
            })
            .await
            .map_err(|_| CoreError::EngineStopped)?;
        rx.await.map_err(|_| CoreError::EngineStopped)?
    }
}

// ── Background tasks ─────────────────────────────────────────────

async fn engine_task(
    mut engine: Engine,
    mut rx: mpsc::Receiver<RequestEnvelope>,
    clock: Arc<dyn Clock>,
    dispatch_tx: mpsc::UnboundedSender<Notification>,
    cancel: CancellationToken,
) {
    loop {
        tokio::select! {
            biased;
            () = cancel.cancelled() => break,
            envelope = rx.recv() => {
                let Some(envelope) = envelope else { break };
                let now = clock.now();
                let result = match envelope.request {
                    Request::Event(event) => engine.handle(now, event).map(Reply::Outcome),
                    Request::Snapshot => Ok(Reply::Snapshot(Box::new(engine.snapshot(now)))),
                };
                for notification in engine.take_dispatches() {
                    if dispatch_tx.send(notification).is_err() {
                        warn!("dispatch task gone, notification dropped");
                    }
                }
                let _ = envelope.response_tx.send(result);
            }
        }
    }
}

async fn dispatch_task(
    mut rx: mpsc::UnboundedReceiver<Notification>,
    transport: Arc<dyn Transport>,
    cancel: CancellationToken,
) {
    loop {
        tokio::select! {
            biased;
            () = cancel.cancelled() => break,
            notification = rx.recv() => {
                let Some(notification) = notification else { return };
                transport.deliver(&notification);
            }
        }
    }
    while let Ok(notification) = rx.try_recv() {
        transport.deliver(&notification);
    }
}

async fn tick_task(
    tx: mpsc::Sender<RequestEnvelope>,
    period: Duration,
    cancel: CancellationToken,
) {
    let mut interval = tokio::time::interval(period);
    interval.tick().await; // consume the immediate first tick

    loop {
        tokio::select! {
            biased;
            () = cancel.cancelled() => break,
            _ = interval.tick() => {
                let (response_tx, response_rx) = oneshot::channel();
                let envelope = RequestEnvelope {
                    request: Request::Event(EngineEvent::Tick),
                    response_tx,
                };
                if tx.send(envelope).await.is_err() {
                    break;
                }
                if let Ok(Err(e)) = response_rx.await {
                    warn!(error = %e, "periodic tick failed");
                }
            }
        }
    }
}
