//! Span and event capture for verifying index lifecycle instrumentation.
//!
//! Records span creation and event messages into a thread-safe store so
//! tests can count index builds and invalidations without a real backend.
//!
//! ```ignore
//! let (capture, _guard) = init_test_tracing();
//! layer.query_region(region, QueryOptions::default())?;
//! assert_eq!(capture.count_spans("build_spatial_index"), 1);
//! ```
//!
//! Uses `tracing::subscriber::set_default()` so each test gets its own
//! subscriber for as long as the returned guard lives.

#![allow(dead_code)]

use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use tracing::span::{Attributes, Id};
use tracing::{Event, Subscriber};
use tracing_subscriber::layer::{Context, Layer};
use tracing_subscriber::prelude::*;
use tracing_subscriber::registry::LookupSpan;

/// A captured span or event with its fields.
#[derive(Debug, Clone)]
pub struct Captured {
    pub name: &'static str,
    pub level: tracing::Level,
    pub fields: HashMap<String, String>,
}

impl Captured {
    /// The event's `message` field, if any.
    pub fn message(&self) -> Option<&str> {
        self.fields.get("message").map(String::as_str)
    }
}

#[derive(Debug, Default)]
struct Records {
    spans: Vec<Captured>,
    events: Vec<Captured>,
}

/// Shared store of captured spans and events.
#[derive(Debug, Clone, Default)]
pub struct CaptureStore(Arc<Mutex<Records>>);

impl CaptureStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of spans created with the given name.
    pub fn count_spans(&self, name: &str) -> usize {
        self.0
            .lock()
            .unwrap()
            .spans
            .iter()
            .filter(|s| s.name == name)
            .count()
    }

    /// Spans with the given name, in creation order.
    pub fn find_spans(&self, name: &str) -> Vec<Captured> {
        self.0
            .lock()
            .unwrap()
            .spans
            .iter()
            .filter(|s| s.name == name)
            .cloned()
            .collect()
    }

    /// Events whose message starts with `prefix`.
    pub fn find_events(&self, prefix: &str) -> Vec<Captured> {
        self.0
            .lock()
            .unwrap()
            .events
            .iter()
            .filter(|e| e.message().is_some_and(|m| m.starts_with(prefix)))
            .cloned()
            .collect()
    }

    /// Forget everything captured so far.
    pub fn clear(&self) {
        let mut records = self.0.lock().unwrap();
        records.spans.clear();
        records.events.clear();
    }
}

/// A tracing `Layer` that records into a [`CaptureStore`].
pub struct CaptureLayer {
    store: CaptureStore,
}

impl CaptureLayer {
    pub fn new(store: CaptureStore) -> Self {
        Self { store }
    }
}

struct FieldVisitor(HashMap<String, String>);

impl tracing::field::Visit for FieldVisitor {
    fn record_debug(&mut self, field: &tracing::field::Field, value: &dyn std::fmt::Debug) {
        self.0
            .insert(field.name().to_string(), format!("{:?}", value));
    }

    fn record_u64(&mut self, field: &tracing::field::Field, value: u64) {
        self.0.insert(field.name().to_string(), value.to_string());
    }

    fn record_bool(&mut self, field: &tracing::field::Field, value: bool) {
        self.0.insert(field.name().to_string(), value.to_string());
    }

    fn record_str(&mut self, field: &tracing::field::Field, value: &str) {
        self.0.insert(field.name().to_string(), value.to_string());
    }
}

impl<S> Layer<S> for CaptureLayer
where
    S: Subscriber + for<'lookup> LookupSpan<'lookup>,
{
    fn on_new_span(&self, attrs: &Attributes<'_>, _id: &Id, _ctx: Context<'_, S>) {
        let mut fields = FieldVisitor(HashMap::new());
        attrs.record(&mut fields);
        let meta = attrs.metadata();
        self.store.0.lock().unwrap().spans.push(Captured {
            name: meta.name(),
            level: *meta.level(),
            fields: fields.0,
        });
    }

    fn on_event(&self, event: &Event<'_>, _ctx: Context<'_, S>) {
        let mut fields = FieldVisitor(HashMap::new());
        event.record(&mut fields);
        let meta = event.metadata();
        self.store.0.lock().unwrap().events.push(Captured {
            name: meta.name(),
            level: *meta.level(),
            fields: fields.0,
        });
    }
}

/// Install a capturing subscriber for the current thread.
///
/// Hold the returned guard for the duration of the test.
pub fn init_test_tracing() -> (CaptureStore, tracing::subscriber::DefaultGuard) {
    let store = CaptureStore::new();
    let subscriber = tracing_subscriber::registry().with(CaptureLayer::new(store.clone()));
    let guard = tracing::subscriber::set_default(subscriber);
    (store, guard)
}
