//! Codec module - encoding of messages on the transport.
//!
//! - [`JsonCodec`] - JSON via `serde_json` (default)
//! - [`MsgPackCodec`] - MessagePack via `rmp-serde` (`to_vec_named`)
//!
//! Codecs are marker structs with static methods. [`WireFormat`] picks one
//! at runtime from configuration.
//!
//! # Example
//!
//! ```
//! use framebus::codec::WireFormat;
//! use framebus::message::Message;
//!
//! let raw = br#"{"type":"fetch","frameID":"f1","payload":{"path":"style.css"}}"#;
//! let msg: Message = WireFormat::Json.decode(raw).unwrap();
//! assert_eq!(msg.kind, "fetch");
//! ```

mod json;
mod msgpack;

pub use json::JsonCodec;
pub use msgpack::MsgPackCodec;

use crate::error::Result;

/// Encoding used for messages crossing the transport.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum WireFormat {
    /// JSON text.
    #[default]
    Json,
    /// MessagePack with named fields.
    MsgPack,
}

impl WireFormat {
    /// Encode a value in this format.
    pub fn encode<T: serde::Serialize>(self, value: &T) -> Result<Vec<u8>> {
        match self {
            WireFormat::Json => JsonCodec::encode(value),
            WireFormat::MsgPack => MsgPackCodec::encode(value),
        }
    }

    /// Decode a value in this format.
    pub fn decode<T: serde::de::DeserializeOwned>(self, bytes: &[u8]) -> Result<T> {
        match self {
            WireFormat::Json => JsonCodec::decode(bytes),
            WireFormat::MsgPack => MsgPackCodec::decode(bytes),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::message::{CardId, FrameId, Message};
    use serde_json::json;

    #[test]
    fn test_formats_are_not_interchangeable() {
        let msg = Message::new("t", FrameId::from("f"), CardId::from("c"), json!(1));

        let packed = WireFormat::MsgPack.encode(&msg).unwrap();
        assert!(WireFormat::Json.decode::<Message>(&packed).is_err());

        let text = WireFormat::Json.encode(&msg).unwrap();
        assert_eq!(WireFormat::Json.decode::<Message>(&text).unwrap(), msg);
    }

    #[test]
    fn test_default_is_json() {
        assert_eq!(WireFormat::default(), WireFormat::Json);
    }
}
