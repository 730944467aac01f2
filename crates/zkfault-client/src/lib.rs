//! # zkfault-client: Coordination Client Surface
//!
//! This crate defines the operation surface of a hierarchical coordination
//! service (znodes, versions, ephemeral nodes, transactions, watches) as the
//! [`CoordinationClient`] trait, together with an in-process implementation:
//!
//! - **`MemoryServer`**: one shared node tree, any number of sessions
//! - **`MemoryClient`**: a session that records every call and can be told
//!   to fail the next one, for tests
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────────────────┐
//! │         zkfault          │
//! │ (wraps a CoordinationClient)
//! └────────────┬─────────────┘
//!              │
//! ┌────────────┴─────────────┐
//! │      zkfault-client      │
//! │  ┌──────────┐ ┌────────┐ │
//! │  │  trait   │ │ Memory │ │
//! │  │ + types  │ │ Client │ │
//! │  └──────────┘ └────────┘ │
//! └──────────────────────────┘
//! ```

mod client;
mod error;
mod memory;
mod types;

pub use client::{
    CoordinationClient, TRY_CREATE_RECOVERABLE, TRY_MULTI_RECOVERABLE, TRY_REMOVE_RECOVERABLE,
    TRY_SET_RECOVERABLE, join,
};
pub use error::{ErrorCode, KeeperError, KeeperResult};
pub use memory::{MemoryClient, MemoryServer};
pub use types::{
    CreateMode, CreateResponse, ExistsResponse, FeatureFlag, GetResponse, ListRequestType,
    ListResponse, MultiResponse, Node, RemoveResponse, Request, Response, ResponseCallback, Stat,
    WatchCallback, WatchEvent, WatchEventKind,
};

#[cfg(test)]
mod tests;
