use thiserror::Error;

use crate::exchange::{ExchangeKind, PeerId};

/// Errors raised while decoding the binary schema tree or its numeric fields.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum SchemaDecodeError {
    /// Blob ended before the structure it was describing was complete.
    #[error("schema truncated at offset {offset} while reading {context}")]
    Truncated { offset: usize, context: &'static str },

    /// Type tag that the tree format does not define.
    #[error("unknown node type 0x{tag:02x} at offset {offset}")]
    UnknownType { tag: u8, offset: usize },

    /// Wide strings are part of the format but never appear in stat schemas.
    #[error("unsupported wide string node at offset {offset}")]
    WideString { offset: usize },

    /// Non-empty blob whose top-level list closes before any entry.
    #[error("schema has no root entry (end marker at offset {offset})")]
    MissingRoot { offset: usize },

    /// Bytes left over after the top-level end marker.
    #[error("{remaining} trailing bytes after schema end at offset {offset}")]
    TrailingData { offset: usize, remaining: usize },

    /// Nesting exceeded the decoder's depth limit.
    #[error("schema nesting deeper than {max} levels")]
    TooDeep { max: usize },

    /// A numeric schema field could not be read as an unsigned integer.
    #[error("invalid {field} for stat {stat_id} bit {bit_index}: '{value}'")]
    InvalidNumber {
        field: &'static str,
        stat_id: u32,
        bit_index: u8,
        value: String,
    },
}

/// Failure while handing a request to the transport layer.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum TransportError {
    #[error("not connected")]
    NotConnected,

    #[error("outbound channel closed")]
    ChannelClosed,
}

/// Terminal failures of a fetch or write exchange.
#[derive(Debug, Error)]
pub enum ExchangeError {
    /// Peer link is down; fails fast and is never retried by the core.
    #[error("transport unavailable for peer {peer}: {source}")]
    TransportUnavailable {
        peer: PeerId,
        #[source]
        source: TransportError,
    },

    /// Fetched schema could not be decoded; no report is produced.
    #[error("schema decode failed: {0}")]
    SchemaDecode(#[from] SchemaDecodeError),

    /// No correlated reply inside the configured window.
    #[error("{kind} request {correlation_id} to peer {peer} timed out after {timeout_ms}ms")]
    Timeout {
        peer: PeerId,
        kind: ExchangeKind,
        correlation_id: u64,
        timeout_ms: u64,
    },

    /// Peer answered with a non-success status.
    #[error("peer {peer} rejected {kind} request for resource {resource_id}")]
    RemoteRejected {
        peer: PeerId,
        kind: ExchangeKind,
        resource_id: u64,
    },
}

/// Errors from parsing a user-supplied achievement index list.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum IndexListError {
    #[error("achievement list is empty")]
    Empty,

    #[error("'{0}' is not a valid achievement number")]
    Invalid(String),
}
