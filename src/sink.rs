//! Error sink - where dispatch failures go.
//!
//! Nothing that goes wrong while routing or handling a message is allowed to
//! stop the receive loop. Failures are packaged as [`DispatchFailure`] and
//! handed to an [`ErrorSink`] instead.

use std::fmt;

use crate::error::BusError;
use crate::message::FrameId;

/// A message that could not be routed or whose handler failed.
#[derive(Debug)]
pub struct DispatchFailure {
    /// Frame the message came from.
    pub frame_id: FrameId,
    /// Message type, if the message decoded far enough to have one.
    pub message_type: Option<String>,
    /// What went wrong.
    pub error: BusError,
}

impl fmt::Display for DispatchFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.message_type {
            Some(kind) => write!(
                f,
                "error processing {} message from frame {}: {}",
                kind, self.frame_id, self.error
            ),
            None => write!(
                f,
                "error processing message from frame {}: {}",
                self.frame_id, self.error
            ),
        }
    }
}

/// Receiver of dispatch failures.
///
/// Implemented for any `Fn(DispatchFailure)` closure.
pub trait ErrorSink: Send + Sync + 'static {
    /// Record a failure.
    fn report(&self, failure: DispatchFailure);
}

impl<F> ErrorSink for F
where
    F: Fn(DispatchFailure) + Send + Sync + 'static,
{
    fn report(&self, failure: DispatchFailure) {
        self(failure)
    }
}

/// Default sink: logs every failure at error level.
#[derive(Debug, Default, Clone, Copy)]
pub struct LogSink;

impl ErrorSink for LogSink {
    fn report(&self, failure: DispatchFailure) {
        tracing::error!("{}", failure);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use parking_lot::Mutex;
    use std::sync::Arc;

    #[test]
    fn test_display_with_type() {
        let failure = DispatchFailure {
            frame_id: FrameId::from("f1"),
            message_type: Some("fetch".to_string()),
            error: BusError::NotFound("a.png".to_string()),
        };
        assert_eq!(
            failure.to_string(),
            "error processing fetch message from frame f1: file not found: a.png"
        );
    }

    #[test]
    fn test_closure_sink() {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let seen_clone = seen.clone();
        let sink = move |failure: DispatchFailure| seen_clone.lock().push(failure);

        sink.report(DispatchFailure {
            frame_id: FrameId::from("f9"),
            message_type: None,
            error: BusError::UnregisteredFrame(FrameId::from("f9")),
        });
        LogSink.report(DispatchFailure {
            frame_id: FrameId::from("f9"),
            message_type: None,
            error: BusError::ConnectionClosed,
        });

        assert_eq!(seen.lock().len(), 1);
    }
}
