//! In-process simulated peer.
//!
//! Serves fetches from stored schema blobs and value tables and applies writes,
//! so the whole fetch → plan → write loop can run without a real remote
//! service. The version token is a CRC-32 over the sorted value table; a write
//! carrying any other token is rejected, as a peer does after a concurrent
//! change. Replies can be delayed or dropped to exercise timeout handling.
use std::collections::{BTreeMap, HashMap};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use crc::{Crc, CRC_32_ISO_HDLC};
use log::{debug, info};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

use crate::config::Config;
use crate::exchange::{
    ChannelTransport, ExchangeCoordinator, FetchResponse, InboundMessage, OutboundRequest,
    PeerId, WriteAck, WriteRequest,
};
use crate::model::RawStat;
use crate::service::PeerSession;

const CRC32: Crc<u32> = Crc::<u32>::new(&CRC_32_ISO_HDLC);

/// Token for a value table: CRC-32 of `(stat_id, value)` pairs in id order,
/// each as two little-endian u32.
pub fn version_token(stats: &BTreeMap<u32, u32>) -> u32 {
    let mut digest = CRC32.digest();
    for (id, value) in stats {
        digest.update(&id.to_le_bytes());
        digest.update(&value.to_le_bytes());
    }
    digest.finalize()
}

#[derive(Debug, Clone)]
struct Resource {
    schema: Vec<u8>,
    stats: BTreeMap<u32, u32>,
}

#[derive(Debug, Default)]
struct SimState {
    resources: HashMap<u64, Resource>,
    reply_delay: Duration,
    drop_replies: usize,
    writes_applied: usize,
}

/// Shared control and inspection handle for a running simulated peer.
#[derive(Clone, Default)]
pub struct SimHandle {
    state: Arc<Mutex<SimState>>,
}

impl SimHandle {
    /// Delay every subsequent reply by `delay`.
    pub fn set_reply_delay(&self, delay: Duration) {
        self.lock().reply_delay = delay;
    }

    /// Silently drop the next `count` replies.
    pub fn drop_next_replies(&self, count: usize) {
        self.lock().drop_replies = count;
    }

    pub fn stats(&self, resource_id: u64) -> Option<Vec<RawStat>> {
        self.lock().resources.get(&resource_id).map(|r| {
            r.stats
                .iter()
                .map(|(&id, &value)| RawStat::new(id, value))
                .collect()
        })
    }

    /// Overwrite a stat behind the client's back, invalidating its token.
    pub fn poke(&self, resource_id: u64, stat_id: u32, value: u32) {
        if let Some(r) = self.lock().resources.get_mut(&resource_id) {
            r.stats.insert(stat_id, value);
        }
    }

    pub fn writes_applied(&self) -> usize {
        self.lock().writes_applied
    }

    fn lock(&self) -> MutexGuard<'_, SimState> {
        self.state.lock().unwrap_or_else(|e| e.into_inner())
    }
}

#[derive(Default)]
pub struct SimulatedPeer {
    handle: SimHandle,
}

impl SimulatedPeer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_resource(self, resource_id: u64, schema: Vec<u8>, stats: &[RawStat]) -> Self {
        let stats = stats.iter().map(|s| (s.stat_id, s.value)).collect();
        self.handle
            .lock()
            .resources
            .insert(resource_id, Resource { schema, stats });
        self
    }

    pub fn handle(&self) -> SimHandle {
        self.handle.clone()
    }

    /// Serve requests from `outbound` until it closes, answering on `inbound`.
    pub fn spawn(
        self,
        mut outbound: mpsc::UnboundedReceiver<OutboundRequest>,
        inbound: mpsc::UnboundedSender<InboundMessage>,
    ) -> JoinHandle<()> {
        let handle = self.handle;
        tokio::spawn(async move {
            while let Some(request) = outbound.recv().await {
                let (reply, delay, dropped) = {
                    let mut state = handle.lock();
                    let reply = answer(&mut state, request);
                    let dropped = state.drop_replies > 0;
                    if dropped {
                        state.drop_replies -= 1;
                    }
                    (reply, state.reply_delay, dropped)
                };
                if dropped {
                    debug!("sim: dropping reply {}", reply.correlation_id());
                    continue;
                }
                if delay.is_zero() {
                    let _ = inbound.send(reply);
                } else {
                    let inbound = inbound.clone();
                    tokio::spawn(async move {
                        tokio::time::sleep(delay).await;
                        let _ = inbound.send(reply);
                    });
                }
            }
            debug!("sim: outbound channel closed");
        })
    }

    /// Wire this peer to a fresh session built from `config`.
    pub fn attach(self, peer: PeerId, config: &Config) -> (Arc<PeerSession>, SimHandle) {
        let handle = self.handle();
        let (transport, outbound_rx) = ChannelTransport::channel();
        let (inbound_tx, inbound_rx) = mpsc::unbounded_channel();
        self.spawn(outbound_rx, inbound_tx);

        let coordinator =
            ExchangeCoordinator::from_config(peer, Arc::new(transport), &config.exchange);
        let session = Arc::new(PeerSession::new(coordinator, config.locale.language.clone()));
        session.spawn_inbound_pump(inbound_rx);
        (session, handle)
    }
}

fn answer(state: &mut SimState, request: OutboundRequest) -> InboundMessage {
    match request {
        OutboundRequest::Fetch(req) => match state.resources.get(&req.resource_id) {
            Some(r) => InboundMessage::FetchResponse(FetchResponse {
                correlation_id: req.correlation_id,
                success: true,
                schema: r.schema.clone(),
                stats: r
                    .stats
                    .iter()
                    .map(|(&id, &value)| RawStat::new(id, value))
                    .collect(),
                version_token: version_token(&r.stats),
            }),
            None => InboundMessage::FetchResponse(FetchResponse {
                correlation_id: req.correlation_id,
                success: false,
                schema: Vec::new(),
                stats: Vec::new(),
                version_token: 0,
            }),
        },
        OutboundRequest::Write(req) => {
            let success = apply_write(state, &req);
            InboundMessage::WriteAck(WriteAck {
                correlation_id: req.correlation_id,
                success,
            })
        }
    }
}

fn apply_write(state: &mut SimState, req: &WriteRequest) -> bool {
    let Some(resource) = state.resources.get_mut(&req.resource_id) else {
        return false;
    };
    let current = version_token(&resource.stats);
    if req.version_token != current {
        info!(
            "sim: stale write to resource {} (token {:08x}, current {:08x})",
            req.resource_id, req.version_token, current
        );
        return false;
    }
    for write in &req.writes {
        resource.stats.insert(write.stat_id, write.value);
    }
    state.writes_applied += 1;
    true
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::exchange::FetchRequest;
    use crate::model::StatWrite;

    #[test]
    fn token_tracks_table_contents() {
        let mut stats = BTreeMap::new();
        stats.insert(10, 1);
        let a = version_token(&stats);
        stats.insert(10, 3);
        let b = version_token(&stats);
        assert_ne!(a, b);
        stats.insert(10, 1);
        assert_eq!(version_token(&stats), a);
    }

    #[test]
    fn stale_token_is_rejected() {
        let peer = SimulatedPeer::new().with_resource(1, vec![], &[RawStat::new(10, 0)]);
        let handle = peer.handle();
        let mut state = handle.lock();

        let fetch = answer(
            &mut state,
            OutboundRequest::Fetch(FetchRequest { correlation_id: 1, resource_id: 1 }),
        );
        let InboundMessage::FetchResponse(fetched) = fetch else {
            panic!("expected fetch response");
        };

        let write = |token| WriteRequest {
            correlation_id: 2,
            resource_id: 1,
            writes: vec![StatWrite { stat_id: 10, value: 4 }],
            version_token: token,
            explicit_reset: false,
        };
        assert!(!apply_write(&mut state, &write(fetched.version_token ^ 1)));
        assert!(apply_write(&mut state, &write(fetched.version_token)));
        // Token moved on with the write
        assert!(!apply_write(&mut state, &write(fetched.version_token)));
        assert_eq!(state.writes_applied, 1);
    }

    #[test]
    fn unknown_resource_fails_fetch() {
        let mut state = SimState::default();
        let reply = answer(
            &mut state,
            OutboundRequest::Fetch(FetchRequest { correlation_id: 3, resource_id: 99 }),
        );
        assert!(!reply.success());
    }
}
