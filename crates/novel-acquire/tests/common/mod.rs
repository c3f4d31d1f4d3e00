//! Shared helpers for integration tests: a log-capturing tracing layer and
//! content-API response builders.

#![allow(dead_code)]

use serde_json::{json, Value};
use std::fmt;
use std::sync::{Arc, Mutex};
use tracing::field::{Field, Visit};
use tracing::{Event, Level, Subscriber};
use tracing_subscriber::layer::{Context, SubscriberExt};
use tracing_subscriber::Layer;
use wiremock::MockServer;

use novel_acquire::FetchConfig;

pub const API_PATH: &str = "/api/novel/book/reader/full/v1/";

/// Fetch config pointed at a mock server, with a short timeout.
pub fn config_for(server: &MockServer) -> FetchConfig {
    let mut config = FetchConfig::with_user_agent("novel-test/1.0");
    config.api_base = format!("{}{API_PATH}", server.uri());
    config.timeout = std::time::Duration::from_millis(500);
    config
}

/// A successful content-API envelope.
pub fn article_body(markup: &str) -> Value {
    json!({
        "code": 0,
        "message": "success",
        "data": { "content": markup }
    })
}

#[derive(Debug, Clone)]
pub struct CapturedEvent {
    pub level: Level,
    pub message: String,
    pub fields: Vec<(String, String)>,
}

impl CapturedEvent {
    pub fn field(&self, name: &str) -> Option<&str> {
        self.fields
            .iter()
            .find(|(k, _)| k == name)
            .map(|(_, v)| v.as_str())
    }
}

/// Records events emitted by `novel_acquire` on the current thread.
#[derive(Debug, Clone, Default)]
pub struct LogCapture {
    events: Arc<Mutex<Vec<CapturedEvent>>>,
}

impl LogCapture {
    /// Install as the thread-local subscriber until the guard is dropped.
    pub fn install(&self) -> tracing::subscriber::DefaultGuard {
        let subscriber = tracing_subscriber::registry().with(self.clone());
        tracing::subscriber::set_default(subscriber)
    }

    pub fn events(&self) -> Vec<CapturedEvent> {
        self.events.lock().unwrap().clone()
    }

    pub fn at(&self, level: Level) -> Vec<CapturedEvent> {
        self.events()
            .into_iter()
            .filter(|e| e.level == level)
            .collect()
    }

    /// Events at `level` whose message starts with `prefix`.
    pub fn count(&self, level: Level, prefix: &str) -> usize {
        self.at(level)
            .iter()
            .filter(|e| e.message.starts_with(prefix))
            .count()
    }
}

struct FieldVisitor<'a>(&'a mut CapturedEvent);

impl Visit for FieldVisitor<'_> {
    fn record_str(&mut self, field: &Field, value: &str) {
        self.0.fields.push((field.name().to_string(), value.to_string()));
    }

    fn record_debug(&mut self, field: &Field, value: &dyn fmt::Debug) {
        let value = format!("{value:?}");
        if field.name() == "message" {
            self.0.message = value;
        } else {
            self.0.fields.push((field.name().to_string(), value));
        }
    }
}

impl<S: Subscriber> Layer<S> for LogCapture {
    fn on_event(&self, event: &Event<'_>, _ctx: Context<'_, S>) {
        let metadata = event.metadata();
        if !metadata.target().starts_with("novel_acquire") {
            return;
        }
        let mut captured = CapturedEvent {
            level: *metadata.level(),
            message: String::new(),
            fields: Vec::new(),
        };
        event.record(&mut FieldVisitor(&mut captured));
        self.events.lock().unwrap().push(captured);
    }
}
