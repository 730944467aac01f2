//! Error types for the fault-injecting client.

use thiserror::Error;
use zkfault_client::{ErrorCode, KeeperError};

/// Message carried by faults injected before an operation runs.
pub const BEFORE_OPERATION_MESSAGE: &str = "Fault injection before operation";

/// Message carried by faults injected after an operation ran.
pub const AFTER_OPERATION_MESSAGE: &str = "Fault injection after operation";

/// Message reported when the proxy holds no client.
pub const NULL_CLIENT_MESSAGE: &str = "Session is considered to be expired due to fault injection";

/// Fault-injecting client errors.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum Error {
    /// Native or injected coordination error.
    #[error(transparent)]
    Keeper(#[from] KeeperError),

    /// A committed transaction reported a different number of responses
    /// than it had requests.
    #[error(
        "Number of responses doesn't match number of requests: method={method} requests={requests} responses={responses}"
    )]
    ResponseCountMismatch {
        method: &'static str,
        requests: usize,
        responses: usize,
    },

    /// An ephemeral create request was answered by something other than a
    /// create response.
    #[error("Response should be a create response: method={method} index={index} path={path}")]
    UnexpectedResponse {
        method: &'static str,
        index: usize,
        path: String,
    },
}

impl Error {
    /// Coordination code of a keeper error; `None` for internal defects.
    pub fn code(&self) -> Option<ErrorCode> {
        match self {
            Self::Keeper(err) => Some(err.code()),
            Self::ResponseCountMismatch { .. } | Self::UnexpectedResponse { .. } => None,
        }
    }

    /// Whether this is an internal-consistency defect rather than a
    /// coordination failure. Fatal errors are never recovered into values.
    pub fn is_fatal(&self) -> bool {
        self.code().is_none()
    }

    /// Whether the error was synthesized by fault injection.
    pub fn is_injected(&self) -> bool {
        matches!(
            self,
            Self::Keeper(err) if err.message() == BEFORE_OPERATION_MESSAGE
                || err.message() == AFTER_OPERATION_MESSAGE
                || err.message() == NULL_CLIENT_MESSAGE
        )
    }
}

/// Result type for fault-injecting client operations.
pub type Result<T> = std::result::Result<T, Error>;

pub(crate) fn injected_before() -> KeeperError {
    KeeperError::new(ErrorCode::SessionExpired, BEFORE_OPERATION_MESSAGE)
}

pub(crate) fn injected_after() -> KeeperError {
    KeeperError::new(ErrorCode::OperationTimeout, AFTER_OPERATION_MESSAGE)
}

pub(crate) fn null_client() -> KeeperError {
    KeeperError::new(ErrorCode::SessionExpired, NULL_CLIENT_MESSAGE)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn injected_errors_carry_hardware_codes() {
        assert_eq!(injected_before().code(), ErrorCode::SessionExpired);
        assert_eq!(injected_after().code(), ErrorCode::OperationTimeout);
        assert!(injected_before().is_hardware());
        assert!(injected_after().is_hardware());
        assert!(Error::from(null_client()).is_injected());
    }

    #[test]
    fn consistency_defects_are_fatal() {
        let err = Error::ResponseCountMismatch {
            method: "multi",
            requests: 2,
            responses: 1,
        };
        assert!(err.is_fatal());
        assert_eq!(err.code(), None);
        assert!(err.to_string().contains("requests=2 responses=1"));

        let native = Error::from(KeeperError::from_path(ErrorCode::NoNode, "/a"));
        assert!(!native.is_fatal());
        assert!(!native.is_injected());
        assert_eq!(native.code(), Some(ErrorCode::NoNode));
    }
}
