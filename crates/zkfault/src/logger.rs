//! Fault diagnostics side channel.

use std::fmt;

use zkfault_client::ErrorCode;

use crate::adapter::Stage;

/// What a [`FaultEvent`] reports.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FaultKind {
    InjectedBefore,
    InjectedAfter,
    /// An instrumented call ended in an error, injected or native.
    CallFailed,
    /// A node created by a faulted operation was deleted.
    Compensated,
    CompensationFailed,
    /// A tracked ephemeral node could not be deleted during cleanup.
    CleanupFailed,
}

impl fmt::Display for FaultKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let text = match self {
            Self::InjectedBefore => "injected fault before operation",
            Self::InjectedAfter => "injected fault after operation",
            Self::CallFailed => "call failed",
            Self::Compensated => "cleanup",
            Self::CompensationFailed => "cleanup failed",
            Self::CleanupFailed => "ephemeral node cleanup failed",
        };
        f.write_str(text)
    }
}

/// One diagnostic record.
#[derive(Debug, Clone, Copy)]
pub struct FaultEvent<'a> {
    pub kind: FaultKind,
    pub method: &'a str,
    pub path: &'a str,
    pub stage: Stage,
    pub code: Option<ErrorCode>,
    /// Error message, or the created path for compensation events.
    pub detail: &'a str,
}

/// Receives fault diagnostics. Implementations must not fail or block.
pub trait FaultLogger: Send + Sync {
    fn record(&self, event: &FaultEvent<'_>);
}

/// Discards everything. Installed when injection is disabled.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopLogger;

impl FaultLogger for NoopLogger {
    fn record(&self, _event: &FaultEvent<'_>) {}
}

/// Emits events through `tracing`.
#[derive(Debug, Clone)]
pub struct TracingLogger {
    name: String,
    seed: u64,
}

impl TracingLogger {
    pub fn new(name: impl Into<String>, seed: u64) -> Self {
        Self {
            name: name.into(),
            seed,
        }
    }
}

impl FaultLogger for TracingLogger {
    fn record(&self, event: &FaultEvent<'_>) {
        let code = event.code.map(ErrorCode::as_i32);
        match event.kind {
            FaultKind::InjectedBefore | FaultKind::InjectedAfter | FaultKind::CallFailed => {
                tracing::trace!(
                    name = %self.name,
                    seed = self.seed,
                    method = event.method,
                    path = %event.path,
                    stage = ?event.stage,
                    code,
                    detail = event.detail,
                    "{}",
                    event.kind
                );
            }
            FaultKind::Compensated => {
                tracing::debug!(
                    name = %self.name,
                    seed = self.seed,
                    method = event.method,
                    path = %event.path,
                    path_created = event.detail,
                    "{}",
                    event.kind
                );
            }
            FaultKind::CompensationFailed | FaultKind::CleanupFailed => {
                tracing::warn!(
                    name = %self.name,
                    seed = self.seed,
                    method = event.method,
                    path = %event.path,
                    code,
                    detail = event.detail,
                    "{}",
                    event.kind
                );
            }
        }
    }
}
