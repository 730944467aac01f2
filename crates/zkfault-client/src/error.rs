//! Coordination error codes and the native client error.

use std::fmt;

/// Result codes reported by the coordination service.
///
/// Numeric values match the wire protocol. [`ErrorCode::Ok`] only ever
/// appears inside response values; a [`KeeperError`] never carries it.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
#[repr(i32)]
pub enum ErrorCode {
    #[default]
    Ok = 0,

    // System and server-side errors.
    SystemError = -1,
    RuntimeInconsistency = -2,
    DataInconsistency = -3,
    ConnectionLoss = -4,
    MarshallingError = -5,
    Unimplemented = -6,
    OperationTimeout = -7,
    BadArguments = -8,
    InvalidState = -9,

    // API errors.
    ApiError = -100,
    NoNode = -101,
    NoAuth = -102,
    BadVersion = -103,
    NoChildrenForEphemerals = -108,
    NodeExists = -110,
    NotEmpty = -111,
    SessionExpired = -112,
    InvalidCallback = -113,
    InvalidAcl = -114,
    AuthFailed = -115,
    Closing = -116,
    Nothing = -117,
    SessionMoved = -118,
    NotReadOnly = -119,
}

impl ErrorCode {
    /// All known codes, in wire order.
    pub const ALL: [ErrorCode; 25] = [
        Self::Ok,
        Self::SystemError,
        Self::RuntimeInconsistency,
        Self::DataInconsistency,
        Self::ConnectionLoss,
        Self::MarshallingError,
        Self::Unimplemented,
        Self::OperationTimeout,
        Self::BadArguments,
        Self::InvalidState,
        Self::ApiError,
        Self::NoNode,
        Self::NoAuth,
        Self::BadVersion,
        Self::NoChildrenForEphemerals,
        Self::NodeExists,
        Self::NotEmpty,
        Self::SessionExpired,
        Self::InvalidCallback,
        Self::InvalidAcl,
        Self::AuthFailed,
        Self::Closing,
        Self::Nothing,
        Self::SessionMoved,
        Self::NotReadOnly,
    ];

    /// Returns the wire value of this code.
    pub fn as_i32(self) -> i32 {
        self as i32
    }

    /// Looks up a code by its wire value.
    pub fn from_i32(value: i32) -> Option<Self> {
        Self::ALL.iter().copied().find(|code| code.as_i32() == value)
    }

    pub fn is_ok(self) -> bool {
        self == Self::Ok
    }

    /// Whether the code means the transport or session itself is unusable.
    ///
    /// Hardware-class errors are surfaced regardless of an operation's
    /// try/throw contract.
    pub fn is_hardware(self) -> bool {
        matches!(
            self,
            Self::InvalidState
                | Self::SessionExpired
                | Self::SessionMoved
                | Self::ConnectionLoss
                | Self::MarshallingError
                | Self::OperationTimeout
                | Self::NotReadOnly
        )
    }

    /// Whether the code is an expected, request-level failure.
    pub fn is_user(self) -> bool {
        matches!(
            self,
            Self::NoNode
                | Self::BadVersion
                | Self::NoChildrenForEphemerals
                | Self::NodeExists
                | Self::NotEmpty
        )
    }

    /// Human-readable description.
    pub fn description(self) -> &'static str {
        match self {
            Self::Ok => "Ok",
            Self::SystemError => "System error",
            Self::RuntimeInconsistency => "Run time inconsistency",
            Self::DataInconsistency => "Data inconsistency",
            Self::ConnectionLoss => "Connection loss",
            Self::MarshallingError => "Marshalling error",
            Self::Unimplemented => "Unimplemented",
            Self::OperationTimeout => "Operation timeout",
            Self::BadArguments => "Bad arguments",
            Self::InvalidState => "Invalid zhandle state",
            Self::ApiError => "API error",
            Self::NoNode => "No node",
            Self::NoAuth => "Not authenticated",
            Self::BadVersion => "Bad version",
            Self::NoChildrenForEphemerals => "No children for ephemerals",
            Self::NodeExists => "Node exists",
            Self::NotEmpty => "Not empty",
            Self::SessionExpired => "Session expired",
            Self::InvalidCallback => "Invalid callback",
            Self::InvalidAcl => "Invalid ACL",
            Self::AuthFailed => "Authentication failed",
            Self::Closing => "ZooKeeper is closing",
            Self::Nothing => "(not error) no server responses to process",
            Self::SessionMoved => "Session moved to another server, so operation is ignored",
            Self::NotReadOnly => "State-changing request is passed to read-only server",
        }
    }
}

impl fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({})", self.description(), self.as_i32())
    }
}

/// Error raised by a coordination client call.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("Coordination error: {code}, {message}")]
pub struct KeeperError {
    code: ErrorCode,
    message: String,
}

impl KeeperError {
    /// Creates an error with a free-form message.
    pub fn new(code: ErrorCode, message: impl Into<String>) -> Self {
        debug_assert!(!code.is_ok(), "KeeperError must not carry ErrorCode::Ok");
        Self {
            code,
            message: message.into(),
        }
    }

    /// Creates an error that names the path it concerns.
    pub fn from_path(code: ErrorCode, path: &str) -> Self {
        Self::new(code, format!("path: {path}"))
    }

    pub fn code(&self) -> ErrorCode {
        self.code
    }

    pub fn message(&self) -> &str {
        &self.message
    }

    pub fn is_hardware(&self) -> bool {
        self.code.is_hardware()
    }
}

/// Result alias for coordination client calls.
pub type KeeperResult<T> = Result<T, KeeperError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn wire_values_round_trip() {
        for code in ErrorCode::ALL {
            assert_eq!(ErrorCode::from_i32(code.as_i32()), Some(code));
        }
        assert_eq!(ErrorCode::from_i32(-1000), None);
    }

    #[test]
    fn hardware_and_user_classes_are_disjoint() {
        for code in ErrorCode::ALL {
            assert!(!(code.is_hardware() && code.is_user()), "{code}");
        }
        assert!(ErrorCode::SessionExpired.is_hardware());
        assert!(ErrorCode::OperationTimeout.is_hardware());
        assert!(ErrorCode::NoNode.is_user());
        assert!(!ErrorCode::SystemError.is_hardware());
        assert!(!ErrorCode::SystemError.is_user());
    }

    #[test]
    fn error_display_contains_code_and_path() {
        let err = KeeperError::from_path(ErrorCode::NoNode, "/a/b");
        let text = err.to_string();
        assert!(text.contains("No node"));
        assert!(text.contains("/a/b"));
        assert_eq!(err.code(), ErrorCode::NoNode);
        assert!(!err.is_hardware());
    }
}
