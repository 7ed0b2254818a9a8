//! Outbound seam to the peer transport.
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use tokio::sync::mpsc;

use super::messages::OutboundRequest;
use crate::error::TransportError;

/// Send side of a peer link. Implementations must not block: the coordinator
/// calls `send` while a caller is waiting to suspend on the reply.
pub trait Transport: Send + Sync {
    fn is_connected(&self) -> bool;
    fn send(&self, request: OutboundRequest) -> Result<(), TransportError>;
}

/// Transport backed by an unbounded channel; the receiving half is driven by
/// whatever task actually talks to the peer.
#[derive(Clone)]
pub struct ChannelTransport {
    tx: mpsc::UnboundedSender<OutboundRequest>,
    connected: Arc<AtomicBool>,
}

impl ChannelTransport {
    /// New connected transport and the receiver for its outbound requests.
    pub fn channel() -> (Self, mpsc::UnboundedReceiver<OutboundRequest>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (
            Self {
                tx,
                connected: Arc::new(AtomicBool::new(true)),
            },
            rx,
        )
    }

    pub fn set_connected(&self, connected: bool) {
        self.connected.store(connected, Ordering::SeqCst);
    }
}

impl Transport for ChannelTransport {
    fn is_connected(&self) -> bool {
        self.connected.load(Ordering::SeqCst) && !self.tx.is_closed()
    }

    fn send(&self, request: OutboundRequest) -> Result<(), TransportError> {
        if !self.connected.load(Ordering::SeqCst) {
            return Err(TransportError::NotConnected);
        }
        self.tx
            .send(request)
            .map_err(|_| TransportError::ChannelClosed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::exchange::messages::FetchRequest;

    fn fetch(id: u64) -> OutboundRequest {
        OutboundRequest::Fetch(FetchRequest {
            correlation_id: id,
            resource_id: 440,
        })
    }

    #[test]
    fn disconnected_transport_refuses() {
        let (t, _rx) = ChannelTransport::channel();
        t.set_connected(false);
        assert!(!t.is_connected());
        assert_eq!(t.send(fetch(1)), Err(TransportError::NotConnected));
    }

    #[test]
    fn closed_receiver_is_reported() {
        let (t, rx) = ChannelTransport::channel();
        drop(rx);
        assert!(!t.is_connected());
        assert_eq!(t.send(fetch(1)), Err(TransportError::ChannelClosed));
    }

    #[test]
    fn requests_reach_receiver() {
        let (t, mut rx) = ChannelTransport::channel();
        t.send(fetch(9)).unwrap();
        assert_eq!(rx.try_recv().unwrap().correlation_id(), 9);
    }
}
