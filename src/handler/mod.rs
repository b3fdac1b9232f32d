//! Handler module - message handlers and the responders they reply through.
//!
//! Provides:
//! - [`HandlerRegistry`] - maps message types to handlers
//! - [`Responder`] - sends messages back to the originating frame
//!
//! # Example
//!
//! ```ignore
//! use framebus::handler::HandlerRegistry;
//!
//! let mut registry = HandlerRegistry::new();
//!
//! // Reply once
//! registry.register("echo", |_card, text: String, responder| async move {
//!     responder.respond("echo", &text).await
//! })?;
//!
//! // Reply several times, after the handler has returned
//! registry.register("count", |_card, n: u32, responder| async move {
//!     tokio::spawn(async move {
//!         for i in 0..n {
//!             let _ = responder.respond("count", &i).await;
//!         }
//!     });
//!     Ok(())
//! })?;
//! ```

mod registry;
mod responder;

pub use registry::{BoxFuture, Handler, HandlerRegistry, HandlerResult, TypedHandler};
pub use responder::Responder;
