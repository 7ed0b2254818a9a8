//! # Exchange Coordinator
//!
//! Correlates fetch/write requests to one peer with their asynchronous replies.
//!
//! Every request gets a fresh correlation id and a pending slot holding a
//! oneshot sender. The caller then waits on the receiver with a timeout. A slot
//! is released exactly once, by whichever of these acts first:
//!
//! - [`ExchangeCoordinator::deliver`] removes the slot and sends the reply;
//! - the timeout path removes the slot and reports [`ExchangeError::Timeout`];
//! - the caller's future is dropped and its guard removes the slot.
//!
//! Removal from the pending map is the claim. The loser of a reply/timeout
//! race finds no slot and does nothing: a late reply is counted and dropped,
//! and a timeout that lost waits briefly for the reply already on its way.
//!
//! Pending state is per coordinator and a coordinator serves one peer, so a
//! reply can never be matched to another peer's request.
pub mod messages;
pub mod transport;

use std::collections::HashMap;
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::{Duration, Instant};

use log::{debug, info, warn};
use rand::Rng;
use serde::{Deserialize, Serialize};
use tokio::sync::oneshot;

use crate::config::ExchangeConfig;
use crate::error::{ExchangeError, TransportError};
use crate::metrics::{ExchangeMetrics, Snapshot};
use crate::model::{RawStat, StatWrite};

pub use messages::{
    FetchRequest, FetchResponse, InboundMessage, OutboundRequest, WriteAck, WriteRequest,
};
pub use transport::{ChannelTransport, Transport};

/// Identity of a remote peer (one managed account/session).
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct PeerId(String);

impl PeerId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for PeerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for PeerId {
    fn from(s: &str) -> Self {
        Self::new(s)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ExchangeKind {
    Fetch,
    Write,
}

impl fmt::Display for ExchangeKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            ExchangeKind::Fetch => "fetch",
            ExchangeKind::Write => "write",
        })
    }
}

/// Correlation record for one in-flight request.
#[derive(Debug, Clone)]
pub struct ExchangeRequest {
    pub correlation_id: u64,
    pub sent_at: Instant,
    pub kind: ExchangeKind,
    pub peer: PeerId,
    pub resource_id: u64,
}

/// Schema and values returned by a successful fetch.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FetchPayload {
    pub schema: Vec<u8>,
    pub stats: Vec<RawStat>,
    pub version_token: u32,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ExchangePayload {
    Schema(FetchPayload),
    Ack,
}

/// Outcome of a correlated reply.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExchangeResult {
    pub success: bool,
    pub payload: Option<ExchangePayload>,
}

impl From<InboundMessage> for ExchangeResult {
    fn from(msg: InboundMessage) -> Self {
        match msg {
            InboundMessage::FetchResponse(r) => ExchangeResult {
                success: r.success,
                payload: Some(ExchangePayload::Schema(FetchPayload {
                    schema: r.schema,
                    stats: r.stats,
                    version_token: r.version_token,
                })),
            },
            InboundMessage::WriteAck(a) => ExchangeResult {
                success: a.success,
                payload: Some(ExchangePayload::Ack),
            },
        }
    }
}

/// What [`ExchangeCoordinator::deliver`] did with an inbound message.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Delivery {
    Resolved,
    Discarded,
}

struct PendingSlot {
    request: ExchangeRequest,
    reply_tx: oneshot::Sender<ExchangeResult>,
}

/// Removes the caller's slot when its future ends for any reason.
struct PendingGuard<'a> {
    coordinator: &'a ExchangeCoordinator,
    correlation_id: u64,
}

impl Drop for PendingGuard<'_> {
    fn drop(&mut self) {
        if self.coordinator.claim(self.correlation_id).is_some() {
            debug!(
                "peer {} request {} abandoned by caller",
                self.coordinator.peer, self.correlation_id
            );
        }
    }
}

pub struct ExchangeCoordinator {
    peer: PeerId,
    transport: Arc<dyn Transport>,
    pending: Mutex<HashMap<u64, PendingSlot>>,
    next_id: AtomicU64,
    timeout: Duration,
    metrics: ExchangeMetrics,
}

impl ExchangeCoordinator {
    /// Coordinator with a random starting correlation id.
    pub fn new(peer: PeerId, transport: Arc<dyn Transport>, timeout: Duration) -> Self {
        let seed = rand::thread_rng().gen_range(1..u64::MAX / 2);
        Self::with_seed(peer, transport, timeout, seed)
    }

    /// Coordinator whose first correlation id is `seed` (0 is skipped).
    pub fn with_seed(
        peer: PeerId,
        transport: Arc<dyn Transport>,
        timeout: Duration,
        seed: u64,
    ) -> Self {
        Self {
            peer,
            transport,
            pending: Mutex::new(HashMap::new()),
            next_id: AtomicU64::new(seed),
            timeout,
            metrics: ExchangeMetrics::default(),
        }
    }

    pub fn from_config(peer: PeerId, transport: Arc<dyn Transport>, cfg: &ExchangeConfig) -> Self {
        let timeout = Duration::from_millis(cfg.timeout_ms);
        match cfg.correlation_seed {
            Some(seed) => Self::with_seed(peer, transport, timeout, seed),
            None => Self::new(peer, transport, timeout),
        }
    }

    pub fn peer(&self) -> &PeerId {
        &self.peer
    }

    pub fn is_connected(&self) -> bool {
        self.transport.is_connected()
    }

    pub fn pending_count(&self) -> usize {
        self.lock_pending().len()
    }

    pub fn metrics(&self) -> Snapshot {
        self.metrics.snapshot()
    }

    /// Fetch the schema blob and current values of `resource_id`.
    pub async fn fetch(&self, resource_id: u64) -> Result<FetchPayload, ExchangeError> {
        let result = self
            .exchange(ExchangeKind::Fetch, resource_id, |correlation_id| {
                OutboundRequest::Fetch(FetchRequest {
                    correlation_id,
                    resource_id,
                })
            })
            .await?;
        match result {
            ExchangeResult {
                success: true,
                payload: Some(ExchangePayload::Schema(payload)),
            } => Ok(payload),
            _ => Err(self.rejected(ExchangeKind::Fetch, resource_id)),
        }
    }

    /// Submit `writes` planned against the fetch that returned `version_token`.
    pub async fn write(
        &self,
        resource_id: u64,
        writes: Vec<StatWrite>,
        version_token: u32,
    ) -> Result<(), ExchangeError> {
        info!(
            "peer {} writing {} stat(s) to resource {}",
            self.peer,
            writes.len(),
            resource_id
        );
        let result = self
            .exchange(ExchangeKind::Write, resource_id, move |correlation_id| {
                OutboundRequest::Write(WriteRequest {
                    correlation_id,
                    resource_id,
                    writes,
                    version_token,
                    explicit_reset: false,
                })
            })
            .await?;
        if result.success {
            Ok(())
        } else {
            Err(self.rejected(ExchangeKind::Write, resource_id))
        }
    }

    /// Route an inbound reply to its waiting caller.
    pub fn deliver(&self, msg: InboundMessage) -> Delivery {
        let correlation_id = msg.correlation_id();
        let slot = {
            let mut pending = self.lock_pending();
            match pending.get(&correlation_id).map(|slot| slot.request.kind) {
                Some(expected) if expected != msg.kind() => {
                    warn!(
                        "peer {} sent {} reply for {} request {}; ignoring",
                        self.peer,
                        msg.kind(),
                        expected,
                        correlation_id
                    );
                    return Delivery::Discarded;
                }
                Some(_) => pending.remove(&correlation_id),
                None => None,
            }
        };

        let Some(slot) = slot else {
            self.metrics.inc_late_discarded();
            warn!(
                "peer {} {} reply {} has no pending request (late or unknown); discarded",
                self.peer,
                msg.kind(),
                correlation_id
            );
            return Delivery::Discarded;
        };

        self.metrics.observe_reply(slot.request.sent_at);
        debug!(
            "peer {} {} reply {} success={} latency_ms={}",
            self.peer,
            slot.request.kind,
            correlation_id,
            msg.success(),
            slot.request.sent_at.elapsed().as_millis()
        );
        if slot.reply_tx.send(msg.into()).is_err() {
            debug!(
                "peer {} caller for {} went away before reply",
                self.peer, correlation_id
            );
        }
        Delivery::Resolved
    }

    async fn exchange<F>(
        &self,
        kind: ExchangeKind,
        resource_id: u64,
        build: F,
    ) -> Result<ExchangeResult, ExchangeError>
    where
        F: FnOnce(u64) -> OutboundRequest,
    {
        if !self.transport.is_connected() {
            return Err(self.unavailable(TransportError::NotConnected));
        }

        let (correlation_id, mut reply_rx) = self.register(kind, resource_id);
        let _guard = PendingGuard {
            coordinator: self,
            correlation_id,
        };

        if let Err(e) = self.transport.send(build(correlation_id)) {
            return Err(self.unavailable(e));
        }
        self.metrics.inc_sent(kind);
        debug!(
            "peer {} {} request {} sent for resource {}",
            self.peer, kind, correlation_id, resource_id
        );

        match tokio::time::timeout(self.timeout, &mut reply_rx).await {
            Ok(Ok(result)) => Ok(result),
            Ok(Err(_)) => Err(self.unavailable(TransportError::ChannelClosed)),
            Err(_) => {
                if self.claim(correlation_id).is_some() {
                    self.metrics.inc_timeouts();
                    warn!(
                        "peer {} {} request {} timed out after {}ms",
                        self.peer,
                        kind,
                        correlation_id,
                        self.timeout.as_millis()
                    );
                    return Err(ExchangeError::Timeout {
                        peer: self.peer.clone(),
                        kind,
                        correlation_id,
                        timeout_ms: self.timeout.as_millis() as u64,
                    });
                }
                // Reply claimed the slot first; its value is already in flight.
                reply_rx
                    .await
                    .map_err(|_| self.unavailable(TransportError::ChannelClosed))
            }
        }
    }

    fn register(
        &self,
        kind: ExchangeKind,
        resource_id: u64,
    ) -> (u64, oneshot::Receiver<ExchangeResult>) {
        let (reply_tx, reply_rx) = oneshot::channel();
        let mut pending = self.lock_pending();
        let correlation_id = loop {
            let id = self.next_id.fetch_add(1, Ordering::Relaxed);
            if id != 0 && !pending.contains_key(&id) {
                break id;
            }
        };
        pending.insert(
            correlation_id,
            PendingSlot {
                request: ExchangeRequest {
                    correlation_id,
                    sent_at: Instant::now(),
                    kind,
                    peer: self.peer.clone(),
                    resource_id,
                },
                reply_tx,
            },
        );
        (correlation_id, reply_rx)
    }

    fn claim(&self, correlation_id: u64) -> Option<PendingSlot> {
        self.lock_pending().remove(&correlation_id)
    }

    fn lock_pending(&self) -> MutexGuard<'_, HashMap<u64, PendingSlot>> {
        self.pending.lock().unwrap_or_else(|e| e.into_inner())
    }

    fn unavailable(&self, source: TransportError) -> ExchangeError {
        warn!("peer {} transport unavailable: {}", self.peer, source);
        ExchangeError::TransportUnavailable {
            peer: self.peer.clone(),
            source,
        }
    }

    fn rejected(&self, kind: ExchangeKind, resource_id: u64) -> ExchangeError {
        self.metrics.inc_rejected();
        warn!(
            "peer {} rejected {} for resource {}",
            self.peer, kind, resource_id
        );
        ExchangeError::RemoteRejected {
            peer: self.peer.clone(),
            kind,
            resource_id,
        }
    }
}
