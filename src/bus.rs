//! Bus builder and dispatcher.
//!
//! The [`BusBuilder`] collects handlers and configuration at startup. The
//! built [`Bus`] owns:
//! 1. The frame registry (frame -> card)
//! 2. The handler registry (type -> handler), read-only from here on
//! 3. The outbound transport, executor and error sink
//!
//! [`Bus::run`] consumes the inbound stream. For each message it resolves
//! the frame and the handler, then hands the invocation to the executor and
//! moves on without waiting for it.
//!
//! # Example
//!
//! ```ignore
//! use framebus::Bus;
//!
//! #[tokio::main]
//! async fn main() -> framebus::Result<()> {
//!     let running = Bus::builder()
//!         .handle("echo", |_card, text: String, responder| async move {
//!             responder.respond("echo", &text).await
//!         })
//!         .start()?;
//!
//!     let responder = running.bus.register_frame("frame-1", "card-1")?;
//!     // ... forward running.outbound into the frames, feed running.inbound
//!     Ok(())
//! }
//! ```

use std::any::Any;
use std::collections::BTreeSet;
use std::future::Future;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::time::Duration;

use futures::FutureExt;
use serde::de::DeserializeOwned;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

use crate::codec::WireFormat;
use crate::config::BusConfig;
use crate::error::{BusError, Result};
use crate::executor::{Executor, TokioExecutor};
use crate::frames::FrameRegistry;
use crate::handler::{Handler, HandlerRegistry, HandlerResult, Responder};
use crate::message::{CardId, FrameId, Inbound, Message};
use crate::sink::{DispatchFailure, ErrorSink, LogSink};
use crate::transport::{channel_transport, Outbound, Transport};

/// Builder for configuring and creating a [`Bus`].
///
/// Handler registration is startup-only. A duplicate message type is a
/// configuration error: [`BusBuilder::register_handler`] returns it right
/// away, and the fluent [`BusBuilder::handle`] defers it to `build()`.
pub struct BusBuilder {
    registry: HandlerRegistry,
    config: BusConfig,
    executor: Option<Arc<dyn Executor>>,
    sink: Option<Arc<dyn ErrorSink>>,
    error: Option<BusError>,
}

impl BusBuilder {
    /// Create a new bus builder.
    pub fn new() -> Self {
        Self {
            registry: HandlerRegistry::new(),
            config: BusConfig::default(),
            executor: None,
            sink: None,
            error: None,
        }
    }

    /// Register a handler function for a message type.
    pub fn register_handler<F, T, Fut>(&mut self, kind: &str, handler: F) -> Result<()>
    where
        F: Fn(CardId, T, Responder) -> Fut + Send + Sync + 'static,
        T: DeserializeOwned + Send + 'static,
        Fut: Future<Output = HandlerResult> + Send + 'static,
    {
        self.registry.register(kind, handler)
    }

    /// Register a handler function for a message type (fluent form).
    ///
    /// The handler receives the card ID, the deserialized payload and a
    /// responder for the originating frame.
    pub fn handle<F, T, Fut>(mut self, kind: &str, handler: F) -> Self
    where
        F: Fn(CardId, T, Responder) -> Fut + Send + Sync + 'static,
        T: DeserializeOwned + Send + 'static,
        Fut: Future<Output = HandlerResult> + Send + 'static,
    {
        let result = self.registry.register(kind, handler);
        self.remember(result);
        self
    }

    /// Register a [`Handler`] implementation for a message type (fluent form).
    pub fn handler<H: Handler>(mut self, kind: &str, handler: H) -> Self {
        let result = self.registry.insert(kind, handler);
        self.remember(result);
        self
    }

    fn remember(&mut self, result: Result<()>) {
        if let Err(e) = result {
            tracing::error!("Bus configuration error: {}", e);
            self.error.get_or_insert(e);
        }
    }

    /// Use a custom executor for handler invocations.
    ///
    /// Default: [`TokioExecutor`] limited to `max_concurrent_handlers`.
    pub fn executor<E: Executor>(mut self, executor: Arc<E>) -> Self {
        self.executor = Some(executor as Arc<dyn Executor>);
        self
    }

    /// Send dispatch failures to a custom sink.
    ///
    /// Default: [`LogSink`].
    pub fn error_sink<S: ErrorSink>(mut self, sink: S) -> Self {
        self.sink = Some(Arc::new(sink));
        self
    }

    /// Replace the whole configuration.
    pub fn config(mut self, config: BusConfig) -> Self {
        self.config = config;
        self
    }

    /// Set the maximum number of concurrent handler invocations.
    ///
    /// When this limit is reached, new messages are dropped and reported.
    /// Default: 256
    pub fn max_concurrent_handlers(mut self, limit: usize) -> Self {
        self.config.max_concurrent_handlers = limit;
        self
    }

    /// Set the outbound queue capacity.
    ///
    /// Default: 1024
    pub fn outbound_capacity(mut self, capacity: usize) -> Self {
        self.config.outbound_capacity = capacity;
        self
    }

    /// Set the inbound queue capacity.
    ///
    /// Default: 1024
    pub fn inbound_capacity(mut self, capacity: usize) -> Self {
        self.config.inbound_capacity = capacity;
        self
    }

    /// Set how long a send may wait for room in the outbound queue.
    ///
    /// Default: 5 seconds
    pub fn send_timeout(mut self, timeout: Duration) -> Self {
        self.config.send_timeout = timeout;
        self
    }

    /// Set the message encoding on the transport.
    ///
    /// Default: JSON
    pub fn wire_format(mut self, format: WireFormat) -> Self {
        self.config.wire_format = format;
        self
    }

    /// Build a bus that sends through the given transport.
    ///
    /// Fails with the first configuration error, e.g.
    /// [`BusError::DuplicateHandler`].
    pub fn build<T: Transport>(self, transport: T) -> Result<Bus> {
        if let Some(e) = self.error {
            return Err(e);
        }

        let executor: Arc<dyn Executor> = match self.executor {
            Some(executor) => executor,
            None => Arc::new(TokioExecutor::new(self.config.max_concurrent_handlers)),
        };
        let sink: Arc<dyn ErrorSink> = match self.sink {
            Some(sink) => sink,
            None => Arc::new(LogSink),
        };

        tracing::debug!(
            "Bus built with handlers for {:?}",
            self.registry.handled_types()
        );

        Ok(Bus {
            frames: Arc::new(FrameRegistry::new()),
            handlers: Arc::new(self.registry),
            transport: Arc::new(transport),
            executor,
            sink,
            format: self.config.wire_format,
        })
    }

    /// Build the bus on an in-process channel transport and start its
    /// receive loop.
    ///
    /// Must be called from within a tokio runtime.
    pub fn start(self) -> Result<RunningBus> {
        let (transport, outbound) = channel_transport(&self.config);
        let (inbound, inbound_rx) = mpsc::channel(self.config.inbound_capacity);
        let bus = self.build(transport)?;

        let runner = bus.clone();
        let task = tokio::spawn(async move { runner.run(inbound_rx).await });

        Ok(RunningBus {
            bus,
            inbound,
            outbound,
            task,
        })
    }
}

impl Default for BusBuilder {
    fn default() -> Self {
        Self::new()
    }
}

/// A bus started by [`BusBuilder::start`].
pub struct RunningBus {
    /// Handle for frame registration.
    pub bus: Bus,
    /// Feed raw messages received from frames here.
    pub inbound: mpsc::Sender<Inbound>,
    /// Encoded messages to deliver to frames.
    pub outbound: mpsc::Receiver<Outbound>,
    /// The receive loop; ends once every inbound sender is dropped.
    pub task: JoinHandle<()>,
}

/// The inter-frame message bus.
///
/// Cheaply cloneable; clones share registries, transport and executor.
#[derive(Clone)]
pub struct Bus {
    frames: Arc<FrameRegistry>,
    handlers: Arc<HandlerRegistry>,
    transport: Arc<dyn Transport>,
    executor: Arc<dyn Executor>,
    sink: Arc<dyn ErrorSink>,
    format: WireFormat,
}

impl Bus {
    /// Create a new bus builder.
    pub fn builder() -> BusBuilder {
        BusBuilder::new()
    }

    /// Associate a frame with the card it hosts.
    ///
    /// Returns a responder for pushing messages to the frame. Fails with
    /// [`BusError::AlreadyRegistered`] if the frame is already registered.
    pub fn register_frame(
        &self,
        frame_id: impl Into<FrameId>,
        card_id: impl Into<CardId>,
    ) -> Result<Responder> {
        let registration = self.frames.register(frame_id.into(), card_id.into())?;
        Ok(Responder::new(
            registration,
            self.frames.clone(),
            self.transport.clone(),
        ))
    }

    /// Remove a frame's registration. Responders for it stop working.
    ///
    /// In-flight handlers for the frame keep running; their responses fail
    /// with [`BusError::FrameGone`].
    pub fn unregister_frame(&self, frame_id: &str) -> Result<()> {
        self.frames.unregister(frame_id)
    }

    /// Card currently hosted by a frame.
    pub fn card_for(&self, frame_id: &str) -> Result<CardId> {
        Ok(self.frames.lookup(frame_id)?.card_id().clone())
    }

    /// Number of registered frames.
    pub fn frame_count(&self) -> usize {
        self.frames.len()
    }

    /// Message types this bus has handlers for.
    pub fn handled_types(&self) -> BTreeSet<String> {
        self.handlers.handled_types()
    }

    /// Wire format used to decode inbound messages.
    pub fn wire_format(&self) -> WireFormat {
        self.format
    }

    /// Main receive loop - dispatches inbound messages until the stream ends.
    pub async fn run(&self, mut inbound: mpsc::Receiver<Inbound>) {
        while let Some(message) = inbound.recv().await {
            self.dispatch(message);
        }
        tracing::debug!("Inbound stream closed, dispatcher stopping");
    }

    /// Route a single raw message to its handler.
    ///
    /// Never blocks on the handler and never fails; every problem goes to
    /// the error sink.
    pub fn dispatch(&self, inbound: Inbound) {
        let message: Message = match self.format.decode(&inbound.data) {
            Ok(m) => m,
            Err(e) => {
                self.report(inbound.frame_id, None, e);
                return;
            }
        };

        let Message {
            kind,
            frame_id,
            payload,
            ..
        } = message;
        let frame_id = if frame_id.is_empty() {
            inbound.frame_id
        } else {
            frame_id
        };

        let registration = match self.frames.lookup(frame_id.as_str()) {
            Ok(r) => r,
            Err(_) => {
                let error = BusError::UnregisteredFrame(frame_id.clone());
                self.report(frame_id, Some(kind), error);
                return;
            }
        };

        let handler = match self.handlers.resolve(&kind) {
            Some(h) => h,
            None => {
                let error = BusError::UnhandledType {
                    message_type: kind.clone(),
                    frame_id: frame_id.clone(),
                };
                self.report(frame_id, Some(kind), error);
                return;
            }
        };

        tracing::debug!(
            "Dispatching {} message from frame {} (card {})",
            kind,
            frame_id,
            registration.card_id()
        );

        let card_id = registration.card_id().clone();
        let responder = Responder::new(registration, self.frames.clone(), self.transport.clone());

        let sink = self.sink.clone();
        let task_frame = frame_id.clone();
        let task_kind = kind.clone();
        let task = Box::pin(async move {
            // Handler runs entirely inside the task, panics included
            let invocation = AssertUnwindSafe(async move {
                handler.call(card_id, payload, responder).await
            });
            let error = match invocation.catch_unwind().await {
                Ok(Ok(())) => return,
                Ok(Err(error)) => error,
                Err(panic) => BusError::HandlerPanicked(panic_message(panic.as_ref())),
            };
            sink.report(DispatchFailure {
                frame_id: task_frame,
                message_type: Some(task_kind),
                error,
            });
        });

        if let Err(e) = self.executor.spawn(task) {
            tracing::warn!("Dropping {} message from frame {}: {}", kind, frame_id, e);
            self.report(frame_id, Some(kind), e);
        }
    }

    fn report(&self, frame_id: FrameId, message_type: Option<String>, error: BusError) {
        self.sink.report(DispatchFailure {
            frame_id,
            message_type,
            error,
        });
    }
}

fn panic_message(panic: &(dyn Any + Send)) -> String {
    if let Some(s) = panic.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = panic.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic".to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::executor::ManualExecutor;
    use parking_lot::Mutex;
    use serde_json::json;

    type Failures = Arc<Mutex<Vec<DispatchFailure>>>;

    struct Harness {
        bus: Bus,
        executor: Arc<ManualExecutor>,
        failures: Failures,
        outbound: mpsc::Receiver<Outbound>,
    }

    fn harness(builder: BusBuilder) -> Harness {
        let executor = Arc::new(ManualExecutor::new());
        let failures: Failures = Arc::new(Mutex::new(Vec::new()));
        let sink_failures = failures.clone();
        let (transport, outbound) = channel_transport(&BusConfig::default());

        let bus = builder
            .executor(executor.clone())
            .error_sink(move |f: DispatchFailure| sink_failures.lock().push(f))
            .build(transport)
            .unwrap();

        Harness {
            bus,
            executor,
            failures,
            outbound,
        }
    }

    fn raw(value: serde_json::Value) -> Inbound {
        let frame = value["frameID"].as_str().unwrap_or("").to_string();
        Inbound::new(frame, serde_json::to_vec(&value).unwrap())
    }

    #[test]
    fn test_builder_duplicate_handler_fails_build() {
        let (transport, _rx) = channel_transport(&BusConfig::default());
        let result = Bus::builder()
            .handle("fetch", |_, _: (), _| async { Ok(()) })
            .handle("fetch", |_, _: (), _| async { Ok(()) })
            .build(transport);

        assert!(matches!(result, Err(BusError::DuplicateHandler(ref t)) if t == "fetch"));
    }

    #[test]
    fn test_register_handler_reports_duplicate_immediately() {
        let mut builder = Bus::builder();
        builder
            .register_handler("a", |_, _: (), _| async { Ok(()) })
            .unwrap();
        let err = builder
            .register_handler("a", |_, _: (), _| async { Ok(()) })
            .unwrap_err();
        assert!(matches!(err, BusError::DuplicateHandler(_)));
    }

    #[test]
    fn test_builder_configuration() {
        let builder = Bus::builder()
            .max_concurrent_handlers(512)
            .outbound_capacity(16)
            .inbound_capacity(32)
            .send_timeout(Duration::from_secs(10))
            .wire_format(WireFormat::MsgPack);

        assert_eq!(builder.config.max_concurrent_handlers, 512);
        assert_eq!(builder.config.outbound_capacity, 16);
        assert_eq!(builder.config.inbound_capacity, 32);
        assert_eq!(builder.config.send_timeout, Duration::from_secs(10));
        assert_eq!(builder.config.wire_format, WireFormat::MsgPack);
    }

    #[test]
    fn test_handled_types() {
        let h = harness(
            Bus::builder()
                .handle("fetch", |_, _: (), _| async { Ok(()) })
                .handle("answer", |_, _: (), _| async { Ok(()) }),
        );

        let types: Vec<_> = h.bus.handled_types().into_iter().collect();
        assert_eq!(types, vec!["answer", "fetch"]);
    }

    #[test]
    fn test_register_frame_lifecycle() {
        let h = harness(Bus::builder());

        h.bus.register_frame("f1", "c1").unwrap();
        h.bus.register_frame("f2", "c2").unwrap();
        assert_eq!(h.bus.frame_count(), 2);
        assert_eq!(h.bus.card_for("f2").unwrap().as_str(), "c2");

        assert!(matches!(
            h.bus.register_frame("f1", "c3"),
            Err(BusError::AlreadyRegistered { .. })
        ));

        h.bus.unregister_frame("f1").unwrap();
        assert!(matches!(
            h.bus.unregister_frame("f1"),
            Err(BusError::NotRegistered(_))
        ));
        h.bus.register_frame("f1", "c3").unwrap();
    }

    #[tokio::test]
    async fn test_dispatch_routes_by_type() {
        let calls = Arc::new(Mutex::new(Vec::new()));
        let calls_a = calls.clone();
        let calls_b = calls.clone();

        let h = harness(
            Bus::builder()
                .handle("A", move |card: CardId, _: serde_json::Value, _| {
                    calls_a.lock().push(format!("A:{card}"));
                    async { Ok(()) }
                })
                .handle("B", move |card: CardId, _: serde_json::Value, _| {
                    calls_b.lock().push(format!("B:{card}"));
                    async { Ok(()) }
                }),
        );
        h.bus.register_frame("f1", "c1").unwrap();

        h.bus.dispatch(raw(json!({"type": "B", "frameID": "f1"})));
        assert_eq!(h.executor.run_until_idle().await, 1);

        assert_eq!(*calls.lock(), vec!["B:c1".to_string()]);
        assert!(h.failures.lock().is_empty());
    }

    #[tokio::test]
    async fn test_dispatch_does_not_wait_for_handler() {
        let h = harness(Bus::builder().handle("slow", |_, _: (), _| async { Ok(()) }));
        h.bus.register_frame("f1", "c1").unwrap();

        for _ in 0..3 {
            h.bus.dispatch(raw(json!({"type": "slow", "frameID": "f1"})));
        }

        // Nothing has run yet; all three invocations are queued in order
        assert_eq!(h.executor.pending(), 3);
        assert_eq!(h.executor.run_until_idle().await, 3);
    }

    #[tokio::test]
    async fn test_unregistered_frame_reported() {
        let called = Arc::new(Mutex::new(false));
        let called_clone = called.clone();
        let h = harness(Bus::builder().handle("fetch", move |_, _: serde_json::Value, _| {
            *called_clone.lock() = true;
            async { Ok(()) }
        }));

        h.bus.dispatch(raw(json!({"type": "fetch", "frameID": "ghost"})));
        h.executor.run_until_idle().await;

        assert!(!*called.lock());
        let failures = h.failures.lock();
        assert_eq!(failures.len(), 1);
        assert_eq!(failures[0].frame_id.as_str(), "ghost");
        assert!(matches!(failures[0].error, BusError::UnregisteredFrame(_)));
    }

    #[tokio::test]
    async fn test_unhandled_type_reported() {
        let h = harness(Bus::builder());
        h.bus.register_frame("f1", "c1").unwrap();

        h.bus.dispatch(raw(json!({"type": "mystery", "frameID": "f1"})));

        let failures = h.failures.lock();
        assert_eq!(failures.len(), 1);
        assert_eq!(failures[0].message_type.as_deref(), Some("mystery"));
        assert!(matches!(
            failures[0].error,
            BusError::UnhandledType { ref message_type, .. } if message_type == "mystery"
        ));
    }

    #[tokio::test]
    async fn test_undecodable_message_reported() {
        let h = harness(Bus::builder());

        h.bus.dispatch(Inbound::new("f1", &b"{garbage"[..]));

        let failures = h.failures.lock();
        assert_eq!(failures.len(), 1);
        assert!(failures[0].message_type.is_none());
        assert!(matches!(failures[0].error, BusError::Json(_)));
    }

    #[tokio::test]
    async fn test_transport_frame_id_used_when_missing() {
        let h = harness(Bus::builder().handle("ping", |_, _: (), responder: Responder| async move {
            responder.respond("pong", &()).await
        }));
        let mut outbound = h.outbound;
        h.bus.register_frame("f1", "c1").unwrap();

        h.bus.dispatch(Inbound::new("f1", &br#"{"type":"ping"}"#[..]));
        h.executor.run_until_idle().await;

        let out = outbound.recv().await.unwrap();
        assert_eq!(out.frame_id.as_str(), "f1");
        assert_eq!(out.decode(WireFormat::Json).unwrap().kind, "pong");
    }

    #[tokio::test]
    async fn test_handler_error_reported_and_loop_continues() {
        let h = harness(
            Bus::builder()
                .handle("fail", |_, _: (), _| async {
                    Err(BusError::NotFound("x".to_string()))
                })
                .handle("typed", |_, _: u32, _| async { Ok(()) }),
        );
        h.bus.register_frame("f1", "c1").unwrap();

        h.bus.dispatch(raw(json!({"type": "fail", "frameID": "f1"})));
        // Payload of the wrong shape fails deserialization inside the invocation
        h.bus
            .dispatch(raw(json!({"type": "typed", "frameID": "f1", "payload": "nope"})));
        h.bus
            .dispatch(raw(json!({"type": "typed", "frameID": "f1", "payload": 7})));
        assert_eq!(h.executor.run_until_idle().await, 3);

        let failures = h.failures.lock();
        assert_eq!(failures.len(), 2);
        assert!(matches!(failures[0].error, BusError::NotFound(_)));
        assert!(matches!(failures[1].error, BusError::Json(_)));
    }

    #[tokio::test]
    async fn test_handler_runs_only_inside_task() {
        let calls = Arc::new(Mutex::new(0));
        let calls_clone = calls.clone();
        let h = harness(Bus::builder().handle("count", move |_, _: (), _| {
            *calls_clone.lock() += 1;
            async { Ok(()) }
        }));
        h.bus.register_frame("f1", "c1").unwrap();

        h.bus.dispatch(raw(json!({"type": "count", "frameID": "f1"})));
        assert_eq!(*calls.lock(), 0);

        h.executor.run_until_idle().await;
        assert_eq!(*calls.lock(), 1);
    }

    #[tokio::test]
    async fn test_handler_panic_reported_and_dispatch_continues() {
        let h = harness(
            Bus::builder()
                .handle("crash", |_, n: u32, _| {
                    if n == 1 {
                        panic!("boom");
                    }
                    async { Ok(()) }
                })
                .handle("ping", |_, _: (), responder: Responder| async move {
                    responder.respond("pong", &()).await
                }),
        );
        let mut outbound = h.outbound;
        h.bus.register_frame("f1", "c1").unwrap();

        h.bus
            .dispatch(raw(json!({"type": "crash", "frameID": "f1", "payload": 1})));
        h.bus.dispatch(raw(json!({"type": "ping", "frameID": "f1"})));
        assert_eq!(h.executor.run_until_idle().await, 2);

        {
            let failures = h.failures.lock();
            assert_eq!(failures.len(), 1);
            assert_eq!(failures[0].message_type.as_deref(), Some("crash"));
            assert!(matches!(
                failures[0].error,
                BusError::HandlerPanicked(ref msg) if msg == "boom"
            ));
        }
        let out = outbound.recv().await.unwrap();
        assert_eq!(out.decode(WireFormat::Json).unwrap().kind, "pong");
    }

    #[tokio::test]
    async fn test_response_after_unregister_fails_in_flight() {
        let h = harness(Bus::builder().handle("ping", |_, _: (), responder: Responder| async move {
            responder.respond("pong", &()).await
        }));
        h.bus.register_frame("f1", "c1").unwrap();

        h.bus.dispatch(raw(json!({"type": "ping", "frameID": "f1"})));
        // Frame goes away while the invocation is still queued
        h.bus.unregister_frame("f1").unwrap();
        h.executor.run_until_idle().await;

        let failures = h.failures.lock();
        assert_eq!(failures.len(), 1);
        assert!(matches!(failures[0].error, BusError::FrameGone(_)));
    }

    #[tokio::test]
    async fn test_overloaded_executor_reported() {
        let (transport, _rx) = channel_transport(&BusConfig::default());
        let failures: Failures = Arc::new(Mutex::new(Vec::new()));
        let sink_failures = failures.clone();
        let (release_tx, release_rx) = tokio::sync::oneshot::channel::<()>();
        let release_rx = Arc::new(Mutex::new(Some(release_rx)));

        let bus = Bus::builder()
            .max_concurrent_handlers(1)
            .handle("block", move |_, _: (), _| {
                let rx = release_rx.lock().take();
                async move {
                    if let Some(rx) = rx {
                        let _ = rx.await;
                    }
                    Ok(())
                }
            })
            .error_sink(move |f: DispatchFailure| sink_failures.lock().push(f))
            .build(transport)
            .unwrap();
        bus.register_frame("f1", "c1").unwrap();

        bus.dispatch(raw(json!({"type": "block", "frameID": "f1"})));
        bus.dispatch(raw(json!({"type": "block", "frameID": "f1"})));

        {
            let failures = failures.lock();
            assert_eq!(failures.len(), 1);
            assert!(matches!(failures[0].error, BusError::Overloaded(1)));
        }
        release_tx.send(()).unwrap();
    }
}
