//! Shared fixtures for proxy integration tests.

#![allow(dead_code)]

use std::sync::{Arc, Mutex};

use zkfault::{BernoulliSource, FaultEvent, FaultInjectingClient, FaultKind, FaultLogger};
use zkfault_client::{ErrorCode, MemoryClient, MemoryServer};

/// A server, one session on it, and a proxy over that session.
pub struct Fixture {
    pub server: MemoryServer,
    pub session: Arc<MemoryClient>,
    pub zk: FaultInjectingClient,
    pub events: Arc<RecordingLogger>,
}

/// Probability > 0 so tracking is active, with a source that never fires:
/// faults happen only when forced.
pub fn forced_only() -> Fixture {
    fixture(0.5, Box::new(Never))
}

/// Probability 0: a pure forwarding proxy.
pub fn passthrough() -> Fixture {
    let server = MemoryServer::new();
    let session = Arc::new(server.connect());
    let events = Arc::new(RecordingLogger::default());
    let zk = FaultInjectingClient::new(0.0, 1, session.clone(), "passthrough")
        .with_logger(events.clone());
    Fixture {
        server,
        session,
        zk,
        events,
    }
}

pub fn fixture(probability: f64, source: Box<dyn BernoulliSource>) -> Fixture {
    let server = MemoryServer::new();
    let session = Arc::new(server.connect());
    let events = Arc::new(RecordingLogger::default());
    let zk = FaultInjectingClient::new(probability, 7, session.clone(), "test")
        .with_source(source)
        .with_logger(events.clone());
    Fixture {
        server,
        session,
        zk,
        events,
    }
}

/// Never fires.
pub struct Never;

impl BernoulliSource for Never {
    fn draw(&mut self) -> bool {
        false
    }
}

/// Owned copy of a [`FaultEvent`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Recorded {
    pub kind: FaultKind,
    pub method: String,
    pub path: String,
    pub code: Option<ErrorCode>,
    pub detail: String,
}

#[derive(Default)]
pub struct RecordingLogger {
    events: Mutex<Vec<Recorded>>,
}

impl RecordingLogger {
    pub fn events(&self) -> Vec<Recorded> {
        self.events.lock().unwrap().clone()
    }

    pub fn kinds(&self) -> Vec<FaultKind> {
        self.events().into_iter().map(|event| event.kind).collect()
    }
}

impl FaultLogger for RecordingLogger {
    fn record(&self, event: &FaultEvent<'_>) {
        self.events.lock().unwrap().push(Recorded {
            kind: event.kind,
            method: event.method.to_string(),
            path: event.path.to_string(),
            code: event.code,
            detail: event.detail.to_string(),
        });
    }
}
