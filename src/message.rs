//! Identifiers and the message envelope exchanged with frames.
//!
//! On the wire a message is a map with the fields `type`, `frameID`,
//! `cardID` and `payload`. The payload is opaque to the bus and kept as a
//! [`serde_json::Value`] until a handler deserializes it into its own type.

use std::borrow::Borrow;
use std::fmt;

use bytes::Bytes;
use serde::{Deserialize, Serialize};

/// Opaque payload carried by a [`Message`].
pub type Payload = serde_json::Value;

macro_rules! string_id {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(String);

        impl $name {
            /// Create a new identifier.
            pub fn new(id: impl Into<String>) -> Self {
                Self(id.into())
            }

            /// Borrow the identifier as a string slice.
            #[inline]
            pub fn as_str(&self) -> &str {
                &self.0
            }

            /// True if the identifier is the empty string.
            #[inline]
            pub fn is_empty(&self) -> bool {
                self.0.is_empty()
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(&self.0)
            }
        }

        impl From<&str> for $name {
            fn from(id: &str) -> Self {
                Self(id.to_string())
            }
        }

        impl From<String> for $name {
            fn from(id: String) -> Self {
                Self(id)
            }
        }

        impl AsRef<str> for $name {
            fn as_ref(&self) -> &str {
                &self.0
            }
        }

        impl Borrow<str> for $name {
            fn borrow(&self) -> &str {
                &self.0
            }
        }
    };
}

string_id!(
    /// Identity of one frame instance, unique while the frame is registered.
    FrameId
);

string_id!(
    /// Identity of the card content hosted in a frame.
    CardId
);

/// A message sent to or received from a frame.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Message {
    /// Selects the handler for inbound messages.
    #[serde(rename = "type")]
    pub kind: String,
    /// Frame the message came from or is addressed to.
    #[serde(rename = "frameID", default)]
    pub frame_id: FrameId,
    /// Card hosted by the frame. Ignored on inbound messages.
    #[serde(rename = "cardID", default)]
    pub card_id: CardId,
    /// Handler-defined payload.
    #[serde(default)]
    pub payload: Payload,
}

impl Message {
    /// Create a new message.
    pub fn new(
        kind: impl Into<String>,
        frame_id: FrameId,
        card_id: CardId,
        payload: Payload,
    ) -> Self {
        Self {
            kind: kind.into(),
            frame_id,
            card_id,
            payload,
        }
    }
}

/// A raw message as delivered by the transport, before decoding.
#[derive(Debug, Clone)]
pub struct Inbound {
    /// Frame the transport received the bytes from.
    pub frame_id: FrameId,
    /// Encoded [`Message`].
    pub data: Bytes,
}

impl Inbound {
    /// Create a new inbound message.
    pub fn new(frame_id: impl Into<FrameId>, data: impl Into<Bytes>) -> Self {
        Self {
            frame_id: frame_id.into(),
            data: data.into(),
        }
    }
}
