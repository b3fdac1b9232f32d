//! JSON codec using `serde_json`.

use crate::error::Result;

/// JSON codec, the default wire format for frame messages.
pub struct JsonCodec;

impl JsonCodec {
    /// Encode a value to JSON bytes.
    #[inline]
    pub fn encode<T: serde::Serialize>(value: &T) -> Result<Vec<u8>> {
        Ok(serde_json::to_vec(value)?)
    }

    /// Decode JSON bytes to a value.
    #[inline]
    pub fn decode<T: serde::de::DeserializeOwned>(bytes: &[u8]) -> Result<T> {
        Ok(serde_json::from_slice(bytes)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::BusError;
    use crate::message::Message;

    #[test]
    fn test_decode_inbound_message() {
        let raw = br#"{"type":"fetch","frameID":"f1","payload":{"path":"a.png"}}"#;
        let msg: Message = JsonCodec::decode(raw).unwrap();

        assert_eq!(msg.kind, "fetch");
        assert_eq!(msg.frame_id.as_str(), "f1");
        assert_eq!(msg.payload["path"], "a.png");
    }

    #[test]
    fn test_decode_error_on_invalid_data() {
        let result: Result<Message> = JsonCodec::decode(b"{not json");
        assert!(matches!(result, Err(BusError::Json(_))));
    }
}
