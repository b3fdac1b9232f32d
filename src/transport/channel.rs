//! Channel-backed transport.
//!
//! ```text
//! Responder 1 ─┐
//! Responder 2 ─┼─► mpsc::Sender<Outbound> ─► frame forwarder (postMessage, pipe, ...)
//! Responder N ─┘
//! ```
//!
//! Sends wait for queue capacity up to the configured timeout, then fail
//! with [`BusError::SendTimeout`]. Capacity is reserved first and the frame
//! registration is checked again before the message is queued.

use std::time::Duration;

use bytes::Bytes;
use tokio::sync::mpsc;

use super::Transport;
use crate::codec::WireFormat;
use crate::config::BusConfig;
use crate::error::{BusError, Result};
use crate::frames::LiveFrame;
use crate::handler::BoxFuture;
use crate::message::{FrameId, Message};

/// An encoded message ready to be delivered to a frame.
#[derive(Debug, Clone)]
pub struct Outbound {
    /// Destination frame.
    pub frame_id: FrameId,
    /// Encoded [`Message`].
    pub data: Bytes,
}

impl Outbound {
    /// Decode the message using the given wire format.
    pub fn decode(&self, format: WireFormat) -> Result<Message> {
        format.decode(&self.data)
    }
}

/// Transport that queues encoded messages on a tokio mpsc channel.
///
/// Cheaply cloneable; all clones feed the same queue.
#[derive(Debug, Clone)]
pub struct ChannelTransport {
    tx: mpsc::Sender<Outbound>,
    format: WireFormat,
    timeout: Duration,
}

impl ChannelTransport {
    /// Wire format used to encode messages.
    #[inline]
    pub fn wire_format(&self) -> WireFormat {
        self.format
    }

    /// Free slots in the outbound queue.
    #[inline]
    pub fn capacity(&self) -> usize {
        self.tx.capacity()
    }
}

/// Create a channel transport and the receiver that drains it.
pub fn channel_transport(config: &BusConfig) -> (ChannelTransport, mpsc::Receiver<Outbound>) {
    let (tx, rx) = mpsc::channel(config.outbound_capacity);
    let transport = ChannelTransport {
        tx,
        format: config.wire_format,
        timeout: config.send_timeout,
    };
    (transport, rx)
}

impl Transport for ChannelTransport {
    fn send(&self, frame: &LiveFrame, message: Message) -> BoxFuture<'static, Result<()>> {
        tracing::debug!("Sending {} message to frame {}", message.kind, frame.frame_id());

        let data = match self.format.encode(&message) {
            Ok(data) => Bytes::from(data),
            Err(e) => return Box::pin(async move { Err(e) }),
        };
        let outbound = Outbound {
            frame_id: frame.frame_id().clone(),
            data,
        };

        let tx = self.tx.clone();
        let timeout = self.timeout;
        let frame = frame.clone();
        Box::pin(async move {
            let permit = match tokio::time::timeout(timeout, tx.reserve()).await {
                Ok(Ok(permit)) => permit,
                Ok(Err(_)) => return Err(BusError::ConnectionClosed),
                Err(_) => return Err(BusError::SendTimeout),
            };
            // The frame may have been unregistered while we waited for room
            frame.commit(move || permit.send(outbound)).map_err(|e| {
                tracing::debug!("Dropping message for frame {}: {}", frame.frame_id(), e);
                e
            })
        })
    }
}
