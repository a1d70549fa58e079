//! Listener: the transport-facing ingress point
//!
//! `on_message` runs on the transport's delivery thread. It only checks the
//! legacy sentinel, takes an admission slot when a bound is configured, and
//! spawns the processing task; parsing, decoding and the handler call all
//! happen inside the task.

use super::config::{BackpressurePolicy, ListenerConfig};
use super::error::IngestError;
use super::handler::EventHandler;
use crate::event::{ChangeEventMessage, ChangeKind, EventAssembler};
use crate::graph::Iri;
use chrono::{DateTime, Utc};
use futures::FutureExt;
use serde::Serialize;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::time::Duration;
use tokio::runtime::Handle;
use tokio::sync::{OwnedSemaphorePermit, Semaphore};
use tokio::task::JoinHandle;
use tracing::{debug, error, info, info_span, trace, warn, Instrument};
use uuid::Uuid;

/// Payload of the retired ping-style protocol
const LEGACY_SENTINEL: &[u8] = b"NEW";

/// Callbacks a pub/sub transport drives.
pub trait TransportCallback: Send + Sync {
    /// A message arrived on `topic`. Must return quickly.
    fn on_message(&self, topic: &str, payload: &[u8]) -> Result<Delivery, IngestError>;

    /// An outbound publish was acknowledged.
    fn on_delivery_complete(&self, token: &str);

    /// The broker connection dropped. Reconnecting is the transport's job.
    fn on_connection_lost(&self, cause: &(dyn std::error::Error + Send + Sync));
}

/// Summary of a message that reached the handler
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Delivered {
    pub id: Uuid,
    pub kind: ChangeKind,
    pub changed: Iri,
    pub context_triples: usize,
}

impl Delivered {
    fn new(id: Uuid, message: &ChangeEventMessage) -> Self {
        Self {
            id,
            kind: message.event().kind(),
            changed: message.event().changed().clone(),
            context_triples: message.context().len(),
        }
    }
}

/// Handle to one submitted message.
///
/// Dropping it does not cancel processing.
#[derive(Debug)]
pub struct Delivery {
    id: Uuid,
    topic: String,
    received_at: DateTime<Utc>,
    handle: JoinHandle<Result<Delivered, IngestError>>,
}

impl Delivery {
    /// Identifier attached to every log line of this message
    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn topic(&self) -> &str {
        &self.topic
    }

    pub fn received_at(&self) -> DateTime<Utc> {
        self.received_at
    }

    pub fn is_finished(&self) -> bool {
        self.handle.is_finished()
    }

    /// Wait for the task and return what happened to the message.
    pub async fn outcome(self) -> Result<Delivered, IngestError> {
        match self.handle.await {
            Ok(result) => result,
            Err(join) if join.is_panic() => {
                Err(IngestError::TaskPanicked(panic_message(join.into_panic())))
            }
            Err(_) => Err(IngestError::Cancelled),
        }
    }
}

/// How a task was admitted under `max_in_flight`
enum Admission {
    Unbounded,
    Held(OwnedSemaphorePermit),
    Wait(Arc<Semaphore>),
}

/// Receives pub/sub messages and hands decoded change events to an
/// [`EventHandler`] from worker tasks.
///
/// Tasks share only immutable state (assembler, handler), so messages are
/// processed independently and may complete in any order.
pub struct Listener {
    assembler: Arc<EventAssembler>,
    handler: Arc<dyn EventHandler>,
    runtime: Handle,
    permits: Option<Arc<Semaphore>>,
    config: ListenerConfig,
}

impl Listener {
    /// Listener with default configuration, spawning onto `runtime`.
    pub fn new(handler: Arc<dyn EventHandler>, runtime: Handle) -> Self {
        Self::with_config(handler, runtime, ListenerConfig::default())
    }

    pub fn with_config(
        handler: Arc<dyn EventHandler>,
        runtime: Handle,
        config: ListenerConfig,
    ) -> Self {
        let assembler =
            EventAssembler::new().with_malformed_markers(config.malformed_markers.clone());
        Self {
            assembler: Arc::new(assembler),
            handler,
            runtime,
            permits: config.max_in_flight.map(|limit| Arc::new(Semaphore::new(limit))),
            config,
        }
    }

    /// Replace the assembler (custom parser or decoders).
    pub fn with_assembler(mut self, assembler: EventAssembler) -> Self {
        self.assembler = Arc::new(assembler);
        self
    }

    pub fn config(&self) -> &ListenerConfig {
        &self.config
    }

    /// Tasks currently holding an admission slot. Always 0 when unbounded.
    pub fn in_flight(&self) -> usize {
        match (&self.permits, self.config.max_in_flight) {
            (Some(sem), Some(limit)) => limit.saturating_sub(sem.available_permits()),
            _ => 0,
        }
    }

    /// Accept one message from the transport.
    ///
    /// Returns without waiting for decode work. The legacy `NEW` sentinel
    /// and, under [`BackpressurePolicy::Reject`], a full listener fail here;
    /// every other failure is reported through the returned [`Delivery`].
    pub fn on_message(&self, topic: &str, payload: &[u8]) -> Result<Delivery, IngestError> {
        let id = Uuid::new_v4();
        let received_at = Utc::now();
        info!(%id, topic, bytes = payload.len(), "message received");
        debug!(%id, payload = %String::from_utf8_lossy(payload), "message payload");

        if payload.eq_ignore_ascii_case(LEGACY_SENTINEL) {
            warn!(%id, topic, "plain 'NEW' ping message received");
            return Err(IngestError::LegacyFormatUnsupported);
        }

        let admission = self.admit(id)?;
        let span = info_span!("change_event", %id, topic);
        let task = run_task(
            id,
            admission,
            self.assembler.clone(),
            self.handler.clone(),
            payload.to_vec(),
            self.config.task_timeout(),
        );
        let handle = self.runtime.spawn(task.instrument(span));

        Ok(Delivery {
            id,
            topic: topic.to_string(),
            received_at,
            handle,
        })
    }

    pub fn on_delivery_complete(&self, token: &str) {
        trace!(token, "delivery complete");
    }

    pub fn on_connection_lost(&self, cause: &(dyn std::error::Error + Send + Sync)) {
        error!(error = %cause, "connection with broker lost");
    }

    fn admit(&self, id: Uuid) -> Result<Admission, IngestError> {
        let Some(permits) = &self.permits else {
            return Ok(Admission::Unbounded);
        };
        match self.config.backpressure {
            BackpressurePolicy::Queue => Ok(Admission::Wait(permits.clone())),
            BackpressurePolicy::Reject => match permits.clone().try_acquire_owned() {
                Ok(permit) => Ok(Admission::Held(permit)),
                Err(_) => {
                    let limit = self.config.max_in_flight.unwrap_or_default();
                    warn!(%id, limit, "listener at capacity, rejecting message");
                    Err(IngestError::Overloaded { limit })
                }
            },
        }
    }
}

impl TransportCallback for Listener {
    fn on_message(&self, topic: &str, payload: &[u8]) -> Result<Delivery, IngestError> {
        Listener::on_message(self, topic, payload)
    }

    fn on_delivery_complete(&self, token: &str) {
        Listener::on_delivery_complete(self, token)
    }

    fn on_connection_lost(&self, cause: &(dyn std::error::Error + Send + Sync)) {
        Listener::on_connection_lost(self, cause)
    }
}

impl std::fmt::Debug for Listener {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Listener")
            .field("assembler", &self.assembler)
            .field("config", &self.config)
            .finish()
    }
}

/// Task body: wait for admission, decode, hand off, log any failure.
async fn run_task(
    id: Uuid,
    admission: Admission,
    assembler: Arc<EventAssembler>,
    handler: Arc<dyn EventHandler>,
    payload: Vec<u8>,
    timeout: Option<Duration>,
) -> Result<Delivered, IngestError> {
    let _permit = match admission {
        Admission::Unbounded => None,
        Admission::Held(permit) => Some(permit),
        Admission::Wait(permits) => match permits.acquire_owned().await {
            Ok(permit) => Some(permit),
            Err(_) => return Err(IngestError::Cancelled),
        },
    };

    let work = process(id, assembler, handler, payload);
    let outcome = match timeout {
        Some(limit) => tokio::time::timeout(limit, work)
            .await
            .unwrap_or_else(|_| Err(IngestError::TimedOut(limit))),
        None => work.await,
    };

    if let Err(err) = &outcome {
        log_failure(err);
    }
    outcome
}

async fn process(
    id: Uuid,
    assembler: Arc<EventAssembler>,
    handler: Arc<dyn EventHandler>,
    payload: Vec<u8>,
) -> Result<Delivered, IngestError> {
    info!("full change event received");
    let message = decode_blocking(assembler, payload).await?;
    let delivered = Delivered::new(id, &message);

    match AssertUnwindSafe(handler.process_change_event(message))
        .catch_unwind()
        .await
    {
        Ok(result) => result?,
        Err(panic) => return Err(IngestError::TaskPanicked(panic_message(panic))),
    }

    debug!(kind = %delivered.kind, changed = %delivered.changed, "change event handed off");
    Ok(delivered)
}

/// Parse and decode on the blocking pool.
///
/// Expansion is CPU-bound and keeps async workers free. A timeout that
/// fires while this runs abandons the result; the blocking thread finishes
/// the decode on its own.
async fn decode_blocking(
    assembler: Arc<EventAssembler>,
    payload: Vec<u8>,
) -> Result<ChangeEventMessage, IngestError> {
    match tokio::task::spawn_blocking(move || assembler.decode(&payload)).await {
        Ok(decoded) => Ok(decoded?),
        Err(join) if join.is_panic() => {
            Err(IngestError::TaskPanicked(panic_message(join.into_panic())))
        }
        Err(_) => Err(IngestError::Cancelled),
    }
}

fn log_failure(err: &IngestError) {
    use crate::event::DecodeError;

    match err {
        IngestError::Decode(DecodeError::UnrecognizedChangeEvent(unrecognized)) => {
            error!(error = %unrecognized, "can't unmarshal the payload, dropping message")
        }
        IngestError::Decode(decode) => {
            warn!(error = %decode, "error processing event, dropping message")
        }
        IngestError::Handler(handler) => {
            error!(error = %handler, "event handler failed, dropping message")
        }
        IngestError::TimedOut(limit) => warn!(?limit, "processing timed out, dropping message"),
        IngestError::TaskPanicked(msg) => {
            error!(panic = %msg, "event handler panicked, dropping message")
        }
        other => warn!(error = %other, "message dropped"),
    }
}

fn panic_message(panic: Box<dyn std::any::Any + Send>) -> String {
    if let Some(s) = panic.downcast_ref::<&str>() {
        s.to_string()
    } else if let Some(s) = panic.downcast_ref::<String>() {
        s.clone()
    } else {
        "non-string panic payload".to_string()
    }
}
