//! Caller-owned map from peer identity to its session.
use std::collections::HashMap;
use std::sync::Arc;

use log::{debug, warn};

use crate::exchange::{Delivery, InboundMessage, PeerId};
use crate::service::PeerSession;

#[derive(Default)]
pub struct PeerRegistry {
    sessions: HashMap<PeerId, Arc<PeerSession>>,
}

impl PeerRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a session, returning the one it replaced for the same peer.
    pub fn register(&mut self, session: Arc<PeerSession>) -> Option<Arc<PeerSession>> {
        let peer = session.peer().clone();
        let previous = self.sessions.insert(peer.clone(), session);
        if previous.is_some() {
            debug!("replaced session for peer {}", peer);
        }
        previous
    }

    pub fn get(&self, peer: &PeerId) -> Option<Arc<PeerSession>> {
        self.sessions.get(peer).cloned()
    }

    pub fn remove(&mut self, peer: &PeerId) -> Option<Arc<PeerSession>> {
        self.sessions.remove(peer)
    }

    pub fn len(&self) -> usize {
        self.sessions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sessions.is_empty()
    }

    /// Sorted peer ids.
    pub fn peers(&self) -> Vec<PeerId> {
        let mut peers: Vec<PeerId> = self.sessions.keys().cloned().collect();
        peers.sort();
        peers
    }

    /// Route a reply received for `peer`. `None` when the peer is unknown.
    pub fn deliver(&self, peer: &PeerId, msg: InboundMessage) -> Option<Delivery> {
        match self.sessions.get(peer) {
            Some(session) => Some(session.deliver(msg)),
            None => {
                warn!(
                    "reply {} for unregistered peer {} dropped",
                    msg.correlation_id(),
                    peer
                );
                None
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    use crate::exchange::{ChannelTransport, ExchangeCoordinator, WriteAck};

    fn session(peer: &str) -> Arc<PeerSession> {
        let (transport, _rx) = ChannelTransport::channel();
        let coordinator = ExchangeCoordinator::new(
            PeerId::from(peer),
            Arc::new(transport),
            Duration::from_secs(1),
        );
        Arc::new(PeerSession::new(coordinator, "english"))
    }

    #[test]
    fn sessions_are_keyed_by_peer() {
        let mut registry = PeerRegistry::new();
        assert!(registry.register(session("b")).is_none());
        assert!(registry.register(session("a")).is_none());
        assert!(registry.register(session("a")).is_some());
        assert_eq!(registry.len(), 2);
        assert_eq!(registry.peers(), vec![PeerId::from("a"), PeerId::from("b")]);
        assert!(registry.get(&PeerId::from("a")).is_some());
        assert!(registry.remove(&PeerId::from("a")).is_some());
        assert!(registry.get(&PeerId::from("a")).is_none());
    }

    #[test]
    fn replies_route_only_to_their_peer() {
        let mut registry = PeerRegistry::new();
        registry.register(session("a"));
        let ack = InboundMessage::WriteAck(WriteAck {
            correlation_id: 42,
            success: true,
        });
        assert_eq!(
            registry.deliver(&PeerId::from("a"), ack.clone()),
            Some(Delivery::Discarded)
        );
        assert_eq!(registry.deliver(&PeerId::from("zz"), ack), None);
    }
}
