//! Handler registry for dispatching messages by type.
//!
//! Populated once while the bus is being built and read-only afterwards, so
//! the bus shares it behind an `Arc` without a lock.
//!
//! # Example
//!
//! ```ignore
//! use framebus::handler::HandlerRegistry;
//!
//! let mut registry = HandlerRegistry::new();
//!
//! registry.register("echo", |_card, text: String, responder| async move {
//!     responder.respond("echo", &text).await
//! })?;
//!
//! // A second handler for "echo" is a configuration error
//! assert!(registry.register("echo", |_, _: (), _| async { Ok(()) }).is_err());
//! ```

use std::collections::{BTreeSet, HashMap};
use std::future::Future;
use std::marker::PhantomData;
use std::pin::Pin;
use std::sync::Arc;

use serde::de::DeserializeOwned;

use super::Responder;
use crate::error::{BusError, Result};
use crate::message::{CardId, Payload};

/// Result type for handler functions.
pub type HandlerResult = Result<()>;

/// Boxed future for handler results.
pub type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

/// Trait for message handlers.
pub trait Handler: Send + Sync + 'static {
    /// Handle a message with its opaque payload.
    fn call(
        &self,
        card_id: CardId,
        payload: Payload,
        responder: Responder,
    ) -> BoxFuture<'static, HandlerResult>;
}

/// Wrapper that deserializes the payload before calling the handler.
pub struct TypedHandler<F, T, Fut>
where
    F: Fn(CardId, T, Responder) -> Fut + Send + Sync + 'static,
    T: DeserializeOwned + Send + 'static,
    Fut: Future<Output = HandlerResult> + Send + 'static,
{
    handler: F,
    _phantom: PhantomData<fn(T) -> Fut>,
}

impl<F, T, Fut> TypedHandler<F, T, Fut>
where
    F: Fn(CardId, T, Responder) -> Fut + Send + Sync + 'static,
    T: DeserializeOwned + Send + 'static,
    Fut: Future<Output = HandlerResult> + Send + 'static,
{
    /// Create a new typed handler.
    pub fn new(handler: F) -> Self {
        Self {
            handler,
            _phantom: PhantomData,
        }
    }
}

impl<F, T, Fut> Handler for TypedHandler<F, T, Fut>
where
    F: Fn(CardId, T, Responder) -> Fut + Send + Sync + 'static,
    T: DeserializeOwned + Send + 'static,
    Fut: Future<Output = HandlerResult> + Send + 'static,
{
    fn call(
        &self,
        card_id: CardId,
        payload: Payload,
        responder: Responder,
    ) -> BoxFuture<'static, HandlerResult> {
        let parsed: T = match serde_json::from_value(payload) {
            Ok(v) => v,
            Err(e) => return Box::pin(async move { Err(BusError::Json(e)) }),
        };

        Box::pin((self.handler)(card_id, parsed, responder))
    }
}

/// Registry mapping message types to handlers.
#[derive(Default)]
pub struct HandlerRegistry {
    handlers: HashMap<String, Arc<dyn Handler>>,
}

impl HandlerRegistry {
    /// Create a new empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a handler function for a message type.
    ///
    /// The payload is deserialized into `T` before the function runs.
    /// Fails with [`BusError::DuplicateHandler`] if the type is taken.
    pub fn register<F, T, Fut>(&mut self, kind: &str, handler: F) -> Result<()>
    where
        F: Fn(CardId, T, Responder) -> Fut + Send + Sync + 'static,
        T: DeserializeOwned + Send + 'static,
        Fut: Future<Output = HandlerResult> + Send + 'static,
    {
        self.insert(kind, TypedHandler::new(handler))
    }

    /// Register a [`Handler`] implementation for a message type.
    pub fn insert<H: Handler>(&mut self, kind: &str, handler: H) -> Result<()> {
        if self.handlers.contains_key(kind) {
            return Err(BusError::DuplicateHandler(kind.to_string()));
        }
        self.handlers.insert(kind.to_string(), Arc::new(handler));
        Ok(())
    }

    /// Get the handler for a message type.
    ///
    /// The handler is shared, so it can be moved into the task that runs it.
    pub fn resolve(&self, kind: &str) -> Option<Arc<dyn Handler>> {
        self.handlers.get(kind).cloned()
    }

    /// All message types with a handler, sorted.
    pub fn handled_types(&self) -> BTreeSet<String> {
        self.handlers.keys().cloned().collect()
    }

    /// Number of registered handlers.
    pub fn len(&self) -> usize {
        self.handlers.len()
    }

    /// True if no handlers are registered.
    pub fn is_empty(&self) -> bool {
        self.handlers.is_empty()
    }
}
