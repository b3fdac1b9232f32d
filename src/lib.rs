//! # framebus
//!
//! Message bus between a host application and the isolated frames that
//! render its cards.
//!
//! Frames cannot call into the host. Everything they need crosses an
//! asynchronous transport as opaque messages. This crate routes those
//! messages:
//!
//! - **Frame registry**: which card each live frame is hosting
//! - **Handler registry**: one handler per message type, fixed at startup
//! - **Dispatcher**: decodes inbound messages and hands them to handlers
//!   without waiting for them
//! - **Responder**: lets a handler push any number of messages back to the
//!   frame, for as long as the frame stays registered
//!
//! On top of the bus, [`fetch`] serves scripts, styles and attachments to
//! frames, and [`study`] drives a card's question/answer faces.
//!
//! ## Example
//!
//! ```ignore
//! use std::sync::Arc;
//! use framebus::fetch::{FetchHandler, MemoryStore, FETCH_MESSAGE_TYPE};
//! use framebus::Bus;
//!
//! #[tokio::main]
//! async fn main() -> framebus::Result<()> {
//!     let store = Arc::new(MemoryStore::new());
//!     let running = Bus::builder()
//!         .handler(FETCH_MESSAGE_TYPE, FetchHandler::new(store))
//!         .start()?;
//!
//!     running.bus.register_frame("frame-1", "card-1")?;
//!     // feed running.inbound, drain running.outbound
//!     Ok(())
//! }
//! ```

pub mod codec;
pub mod config;
pub mod error;
pub mod executor;
pub mod fetch;
pub mod frames;
pub mod handler;
pub mod message;
pub mod sink;
pub mod study;
pub mod transport;

mod bus;

pub use bus::{Bus, BusBuilder, RunningBus};
pub use config::BusConfig;
pub use error::{BusError, Result};
pub use handler::Responder;
pub use message::{CardId, FrameId, Inbound, Message};
pub use sink::{DispatchFailure, ErrorSink};
