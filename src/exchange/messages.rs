//! Wire-level message shapes exchanged with a peer.
//!
//! The transport layer owns framing and encryption; these enums are what the
//! coordinator hands it and what it hands back. Inbound routing is an
//! exhaustive match on [`InboundMessage`], never a type code.
use serde::{Deserialize, Serialize};

use super::ExchangeKind;
use crate::model::{RawStat, StatWrite};

/// Request for a resource's schema blob and current stat values.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FetchRequest {
    pub correlation_id: u64,
    pub resource_id: u64,
}

/// Request to store new stat words.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WriteRequest {
    pub correlation_id: u64,
    pub resource_id: u64,
    pub writes: Vec<StatWrite>,
    /// Token from the fetch the writes were planned against.
    pub version_token: u32,
    /// Always false; the core never asks the peer to wipe stats.
    pub explicit_reset: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum OutboundRequest {
    Fetch(FetchRequest),
    Write(WriteRequest),
}

impl OutboundRequest {
    pub fn correlation_id(&self) -> u64 {
        match self {
            OutboundRequest::Fetch(r) => r.correlation_id,
            OutboundRequest::Write(r) => r.correlation_id,
        }
    }

    pub fn resource_id(&self) -> u64 {
        match self {
            OutboundRequest::Fetch(r) => r.resource_id,
            OutboundRequest::Write(r) => r.resource_id,
        }
    }

    pub fn kind(&self) -> ExchangeKind {
        match self {
            OutboundRequest::Fetch(_) => ExchangeKind::Fetch,
            OutboundRequest::Write(_) => ExchangeKind::Write,
        }
    }
}

/// Reply to a [`FetchRequest`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FetchResponse {
    pub correlation_id: u64,
    pub success: bool,
    pub schema: Vec<u8>,
    pub stats: Vec<RawStat>,
    pub version_token: u32,
}

/// Reply to a [`WriteRequest`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct WriteAck {
    pub correlation_id: u64,
    pub success: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum InboundMessage {
    FetchResponse(FetchResponse),
    WriteAck(WriteAck),
}

impl InboundMessage {
    pub fn correlation_id(&self) -> u64 {
        match self {
            InboundMessage::FetchResponse(r) => r.correlation_id,
            InboundMessage::WriteAck(a) => a.correlation_id,
        }
    }

    pub fn kind(&self) -> ExchangeKind {
        match self {
            InboundMessage::FetchResponse(_) => ExchangeKind::Fetch,
            InboundMessage::WriteAck(_) => ExchangeKind::Write,
        }
    }

    pub fn success(&self) -> bool {
        match self {
            InboundMessage::FetchResponse(r) => r.success,
            InboundMessage::WriteAck(a) => a.success,
        }
    }
}
