//! # zkfault: Fault Injection for Coordination Clients
//!
//! [`FaultInjectingClient`] wraps any [`CoordinationClient`] and mirrors its
//! operation surface while failing calls on purpose, so code that depends
//! on a coordination service can be exercised under session loss and lost
//! acknowledgments without an unreliable cluster.
//!
//! Every instrumented call passes two checkpoints:
//!
//! - **before**: the call fails with `SessionExpired` and never reaches the
//!   client
//! - **after**: the call reached the client, but the caller is told it
//!   failed with `OperationTimeout`
//!
//! Each checkpoint fails with the configured probability, or
//! deterministically after [`FaultInjectingClient::force_fail_before`] /
//! [`FaultInjectingClient::force_fail_after`].
//!
//! Faults never leave session-scoped state behind for the synchronous
//! surface: an ephemeral node created by a call that is reported as failed
//! is deleted before the failure is returned. Ephemeral nodes created by
//! calls reported as successful are tracked and can be flushed with
//! [`FaultInjectingClient::cleanup_ephemeral_nodes`].
//!
//! # Example
//!
//! ```
//! use std::sync::Arc;
//! use zkfault::FaultInjectingClient;
//! use zkfault_client::{CreateMode, ErrorCode, MemoryServer};
//!
//! let server = MemoryServer::new();
//! let mut zk = FaultInjectingClient::new(0.0, 42, Arc::new(server.connect()), "example");
//!
//! zk.force_fail_before();
//! let err = zk.create("/a", b"", CreateMode::Persistent).unwrap_err();
//! assert_eq!(err.code(), Some(ErrorCode::SessionExpired));
//! assert!(!server.exists("/a"));
//! ```

mod adapter;
mod async_ops;
mod error;
mod future;
mod logger;
mod ops;
mod policy;
mod proxy;
mod tracker;

pub use adapter::Stage;
pub use error::{
    AFTER_OPERATION_MESSAGE, BEFORE_OPERATION_MESSAGE, Error, NULL_CLIENT_MESSAGE, Result,
};
pub use future::ResponseFuture;
pub use logger::{FaultEvent, FaultKind, FaultLogger, NoopLogger, TracingLogger};
pub use policy::{BernoulliSource, FaultPolicy, SeededBernoulli};
pub use proxy::FaultInjectingClient;
pub use tracker::EphemeralTracker;

pub use zkfault_client::CoordinationClient;
pub use zkfault_config::InjectionConfig;
