//! Bus configuration.

use std::time::Duration;

use crate::codec::WireFormat;

/// Default maximum concurrent handler invocations.
pub const DEFAULT_MAX_CONCURRENT_HANDLERS: usize = 256;

/// Default capacity of the outbound message queue.
pub const DEFAULT_OUTBOUND_CAPACITY: usize = 1024;

/// Default capacity of the inbound message queue.
pub const DEFAULT_INBOUND_CAPACITY: usize = 1024;

/// Default time a send may wait for room in the outbound queue.
pub const DEFAULT_SEND_TIMEOUT: Duration = Duration::from_secs(5);

/// Configuration for a [`Bus`](crate::Bus) and its channel transport.
#[derive(Debug, Clone)]
pub struct BusConfig {
    /// Handler invocations allowed in flight before new messages are dropped.
    pub max_concurrent_handlers: usize,
    /// Capacity of the outbound queue.
    pub outbound_capacity: usize,
    /// Capacity of the inbound queue.
    pub inbound_capacity: usize,
    /// Timeout when waiting for room in the outbound queue.
    pub send_timeout: Duration,
    /// Encoding of messages on the transport.
    pub wire_format: WireFormat,
}

impl Default for BusConfig {
    fn default() -> Self {
        Self {
            max_concurrent_handlers: DEFAULT_MAX_CONCURRENT_HANDLERS,
            outbound_capacity: DEFAULT_OUTBOUND_CAPACITY,
            inbound_capacity: DEFAULT_INBOUND_CAPACITY,
            send_timeout: DEFAULT_SEND_TIMEOUT,
            wire_format: WireFormat::default(),
        }
    }
}
