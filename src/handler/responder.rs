//! Responder - lets a handler send messages back to its frame.
//!
//! A responder is bound to one frame registration. Each send re-checks the
//! frame registry, both before encoding and when the transport hands the
//! message over, so once the frame is unregistered every call fails with
//! [`BusError::FrameGone`], including after the frame ID has been registered
//! again for a different card.
//!
//! # Example
//!
//! ```ignore
//! async fn progress(card: CardId, steps: u32, responder: Responder) -> Result<()> {
//!     for i in 1..=steps {
//!         responder.respond("progress", &i).await?;
//!     }
//!     Ok(())
//! }
//! ```

use std::fmt;
use std::sync::Arc;

use crate::error::{BusError, Result};
use crate::frames::{FrameRegistry, LiveFrame, Registration};
use crate::message::{CardId, FrameId, Message, Payload};
use crate::transport::Transport;

/// Handle for sending messages to one registered frame.
///
/// `Responder` is `Clone` and can be moved into spawned tasks; it stays
/// usable after the handler that received it has returned.
#[derive(Clone)]
pub struct Responder {
    frame: LiveFrame,
    transport: Arc<dyn Transport>,
}

impl Responder {
    pub(crate) fn new(
        registration: Registration,
        frames: Arc<FrameRegistry>,
        transport: Arc<dyn Transport>,
    ) -> Self {
        Self {
            frame: LiveFrame::new(registration, frames),
            transport,
        }
    }

    /// Frame this responder sends to.
    #[inline]
    pub fn frame_id(&self) -> &FrameId {
        self.frame.frame_id()
    }

    /// Card hosted by the frame at registration time.
    #[inline]
    pub fn card_id(&self) -> &CardId {
        self.frame.card_id()
    }

    /// True while the frame registration this responder belongs to is live.
    pub fn is_valid(&self) -> bool {
        self.frame.is_current()
    }

    /// Send a message of the given type with a serializable payload.
    pub async fn respond<T: serde::Serialize + ?Sized>(&self, kind: &str, payload: &T) -> Result<()> {
        self.ensure_valid()?;
        let payload = serde_json::to_value(payload)?;
        self.respond_value(kind, payload).await
    }

    /// Send a message of the given type with an already-built payload.
    pub async fn respond_value(&self, kind: &str, payload: Payload) -> Result<()> {
        self.ensure_valid()?;

        let message = Message::new(
            kind,
            self.frame_id().clone(),
            self.card_id().clone(),
            payload,
        );
        // The transport checks the registration again at hand-off
        self.transport.send(&self.frame, message).await
    }

    fn ensure_valid(&self) -> Result<()> {
        if self.is_valid() {
            Ok(())
        } else {
            Err(BusError::FrameGone(self.frame_id().clone()))
        }
    }
}

impl fmt::Debug for Responder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Responder")
            .field("frame_id", self.frame_id())
            .field("card_id", self.card_id())
            .field("generation", &self.frame.registration().generation())
            .finish()
    }
}
