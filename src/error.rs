//! Error types for framebus.

use thiserror::Error;

use crate::message::{CardId, FrameId};

/// Main error type for all bus operations.
#[derive(Debug, Error)]
pub enum BusError {
    /// The frame is already registered to a card and must be unregistered first.
    #[error("frame {frame_id} already registered to card {card_id}")]
    AlreadyRegistered { frame_id: FrameId, card_id: CardId },

    /// The frame has no registration to remove or look up.
    #[error("frame {0} not registered")]
    NotRegistered(FrameId),

    /// An inbound message named a frame with no registration.
    #[error("invalid frame registration: frame {0} not registered")]
    UnregisteredFrame(FrameId),

    /// No handler is registered for the inbound message type.
    #[error("unhandled message of type '{message_type}' from frame {frame_id}")]
    UnhandledType {
        message_type: String,
        frame_id: FrameId,
    },

    /// A responder was used after its frame registration ended.
    #[error("frame {0} is no longer registered")]
    FrameGone(FrameId),

    /// A requested file could not be resolved.
    #[error("file not found: {0}")]
    NotFound(String),

    /// An action did not fit the current state of a card session.
    #[error("invalid input: {0}")]
    InvalidInput(String),

    /// Two handlers were registered for the same message type.
    #[error("handler for type '{0}' already registered")]
    DuplicateHandler(String),

    /// A handler panicked; the panic was confined to its invocation.
    #[error("handler panicked: {0}")]
    HandlerPanicked(String),

    /// The executor refused to start another handler.
    #[error("handler capacity reached ({0} in flight)")]
    Overloaded(usize),

    /// The document store failed.
    #[error("storage error: {0}")]
    Storage(String),

    /// The scheduler failed.
    #[error("schedule error: {0}")]
    Schedule(String),

    /// JSON serialization/deserialization error.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// MsgPack serialization error.
    #[error("MsgPack encode error: {0}")]
    MsgPackEncode(#[from] rmp_serde::encode::Error),

    /// MsgPack deserialization error.
    #[error("MsgPack decode error: {0}")]
    MsgPackDecode(#[from] rmp_serde::decode::Error),

    /// Outbound queue stayed full for the whole send timeout.
    #[error("send timeout")]
    SendTimeout,

    /// The transport's receiving side has gone away.
    #[error("connection closed")]
    ConnectionClosed,
}

/// Result type alias using BusError.
pub type Result<T> = std::result::Result<T, BusError>;
