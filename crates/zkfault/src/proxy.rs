//! The fault-injecting client: construction, lifecycle and cleanup.

use std::sync::Arc;

use zkfault_client::{CoordinationClient, ErrorCode, FeatureFlag};
use zkfault_config::InjectionConfig;

use crate::adapter::{OperationAdapter, Stage};
use crate::logger::{FaultEvent, FaultKind, FaultLogger, NoopLogger, TracingLogger};
use crate::policy::{BernoulliSource, FaultPolicy, clamp_probability, resolve_seed};
use crate::tracker::EphemeralTracker;

/// Wraps a [`CoordinationClient`], mirroring its operations while injecting
/// failures before and after each call.
///
/// With probability 0 every operation is a plain forwarding call: nothing
/// is tracked and nothing is logged. Synchronous operations take
/// `&mut self`; share one proxy between threads behind a `Mutex`.
pub struct FaultInjectingClient {
    pub(crate) adapter: OperationAdapter,
    pub(crate) ephemeral_nodes: EphemeralTracker,
    name: String,
    seed: u64,
}

impl FaultInjectingClient {
    /// Creates a proxy around `client`.
    ///
    /// `probability` is clamped into `[0, 1]` and a zero `seed` is replaced
    /// by a random one.
    pub fn new(
        probability: f64,
        seed: u64,
        client: Arc<dyn CoordinationClient>,
        name: impl Into<String>,
    ) -> Self {
        Self::build(probability, seed, Some(client), name.into(), true)
    }

    /// Creates a proxy holding no client; every operation reports an
    /// expired session until [`set_client`](Self::set_client) is called.
    pub fn detached(probability: f64, seed: u64, name: impl Into<String>) -> Self {
        Self::build(probability, seed, None, name.into(), true)
    }

    /// Creates a pure forwarding proxy.
    pub fn passthrough(client: Arc<dyn CoordinationClient>) -> Self {
        Self::build(0.0, 0, Some(client), String::new(), false)
    }

    /// Creates a proxy from loaded configuration.
    pub fn from_config(config: &InjectionConfig, client: Arc<dyn CoordinationClient>) -> Self {
        Self::build(
            config.probability,
            config.seed,
            Some(client),
            config.name.clone(),
            config.log_faults,
        )
    }

    fn build(
        probability: f64,
        seed: u64,
        client: Option<Arc<dyn CoordinationClient>>,
        name: String,
        log_faults: bool,
    ) -> Self {
        let probability = clamp_probability(probability);
        let seed = resolve_seed(seed);
        let logger: Arc<dyn FaultLogger> = if probability > 0.0 && log_faults {
            Arc::new(TracingLogger::new(name.clone(), seed))
        } else {
            Arc::new(NoopLogger)
        };

        if probability > 0.0 {
            tracing::debug!(name = %name, seed, probability, "fault injection enabled");
        }

        Self {
            adapter: OperationAdapter::new(client, FaultPolicy::new(probability, seed), logger),
            ephemeral_nodes: EphemeralTracker::default(),
            name,
            seed,
        }
    }

    /// Replaces the diagnostics sink.
    pub fn with_logger(mut self, logger: Arc<dyn FaultLogger>) -> Self {
        self.adapter.set_logger(logger);
        self
    }

    /// Replaces the random draw source, keeping probability and seed.
    pub fn with_source(self, source: Box<dyn BernoulliSource>) -> Self {
        let policy = FaultPolicy::with_source(self.probability(), self.seed, source);
        *self.adapter.policy() = policy;
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn seed(&self) -> u64 {
        self.seed
    }

    pub fn probability(&self) -> f64 {
        self.adapter.policy().probability()
    }

    /// Swaps in a new client, e.g. after the previous session expired.
    pub fn set_client(&mut self, client: Arc<dyn CoordinationClient>) {
        self.adapter.set_current(Some(client));
    }

    /// Drops the current client.
    pub fn clear_client(&mut self) {
        self.adapter.set_current(None);
    }

    pub fn client(&self) -> Option<Arc<dyn CoordinationClient>> {
        self.adapter.current().cloned()
    }

    pub fn is_null(&self) -> bool {
        self.adapter.current().is_none()
    }

    /// Whether the session is unusable. A proxy without a client is expired.
    pub fn expired(&self) -> bool {
        self.adapter.current().is_none_or(|client| client.expired())
    }

    pub fn is_feature_enabled(&self, flag: FeatureFlag) -> bool {
        self.adapter
            .current()
            .is_some_and(|client| client.is_feature_enabled(flag))
    }

    /// Makes the next operation fail before reaching the client.
    pub fn force_fail_before(&mut self) {
        self.adapter.policy().force_next_before();
    }

    /// Makes the next operation fail after the client call completes.
    pub fn force_fail_after(&mut self) {
        self.adapter.policy().force_next_after();
    }

    /// Stage the most recent synchronous call ended in.
    pub fn last_stage(&self) -> Stage {
        self.adapter.last_stage()
    }

    pub fn tracked_ephemeral_nodes(&self) -> &[String] {
        self.ephemeral_nodes.paths()
    }

    /// Deletes every tracked ephemeral node.
    ///
    /// Deletes go to the current client while its session is live, otherwise
    /// to the last client that served a failed call. A node already gone is
    /// skipped; other failures are logged. The tracker is emptied either way.
    pub fn cleanup_ephemeral_nodes(&mut self) {
        let paths = self.ephemeral_nodes.take();
        let Some(client) = self.adapter.cleanup_target() else {
            return;
        };

        for path in &paths {
            let code = match client.try_remove(path, -1) {
                Ok(Ok(()) | Err(ErrorCode::NoNode)) => continue,
                Ok(Err(code)) => code,
                Err(err) => err.code(),
            };
            self.adapter.logger().record(&FaultEvent {
                kind: FaultKind::CleanupFailed,
                method: "cleanup_ephemeral_nodes",
                path,
                stage: Stage::Done,
                code: Some(code),
                detail: "exception during ephemeral nodes clean up",
            });
        }
    }

    /// Records created ephemeral paths while injection is active.
    pub(crate) fn track(&mut self, path: &str) {
        if self.adapter.policy().is_active() {
            self.ephemeral_nodes.record(path);
        }
    }
}

impl std::fmt::Debug for FaultInjectingClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FaultInjectingClient")
            .field("name", &self.name)
            .field("seed", &self.seed)
            .field("probability", &self.probability())
            .field("null", &self.is_null())
            .field("tracked", &self.ephemeral_nodes.len())
            .finish_non_exhaustive()
    }
}
