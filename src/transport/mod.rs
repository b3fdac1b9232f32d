//! Transport module - how messages reach frames.
//!
//! The bus only needs the outbound half, [`Transport::send`]. Inbound
//! messages arrive as [`Inbound`](crate::message::Inbound) values on a tokio
//! mpsc receiver handed to [`Bus::run`](crate::Bus::run).
//!
//! [`ChannelTransport`] is the in-process implementation. It encodes each
//! message and queues it for whatever forwards bytes into the frames.

mod channel;

pub use channel::{channel_transport, ChannelTransport, Outbound};

use crate::error::Result;
use crate::handler::BoxFuture;
use crate::frames::LiveFrame;
use crate::message::Message;

/// Outbound side of the frame transport.
pub trait Transport: Send + Sync + 'static {
    /// Deliver a message to a frame. Best effort; no retries.
    ///
    /// The final hand-off must go through [`LiveFrame::commit`]. If the
    /// registration ended while the send was waiting, the message is dropped
    /// and the send fails with [`BusError::FrameGone`](crate::BusError::FrameGone).
    fn send(&self, frame: &LiveFrame, message: Message) -> BoxFuture<'static, Result<()>>;
}
