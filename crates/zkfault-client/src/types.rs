//! Value types exchanged with the coordination service.

use bytes::Bytes;

use crate::ErrorCode;

/// Node metadata.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Stat {
    /// Transaction id that created the node.
    pub czxid: i64,
    /// Transaction id that last modified the node's data.
    pub mzxid: i64,
    /// Transaction id that last modified the node's children.
    pub pzxid: i64,
    /// Data version, bumped on every `set`.
    pub version: i32,
    /// Children version, bumped on every child create/remove.
    pub cversion: i32,
    /// Session that owns the node, or 0 for persistent nodes.
    pub ephemeral_owner: i64,
    pub data_length: i32,
    pub num_children: i32,
}

/// Node payload plus metadata.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Node {
    pub data: Bytes,
    pub stat: Stat,
}

/// How a node is created.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CreateMode {
    Persistent,
    Ephemeral,
    PersistentSequential,
    EphemeralSequential,
}

impl CreateMode {
    /// Whether the node's lifetime is tied to the creating session.
    pub fn is_ephemeral(self) -> bool {
        matches!(self, Self::Ephemeral | Self::EphemeralSequential)
    }

    /// Whether the server appends a monotonically increasing suffix.
    pub fn is_sequential(self) -> bool {
        matches!(self, Self::PersistentSequential | Self::EphemeralSequential)
    }
}

/// Filter applied when listing children.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub enum ListRequestType {
    #[default]
    All,
    PersistentOnly,
    EphemeralOnly,
}

/// Optional server capabilities a session may query.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FeatureFlag {
    FilteredList,
    MultiRead,
    CheckNotExists,
    CreateIfNotExists,
}

impl FeatureFlag {
    pub const ALL: [FeatureFlag; 4] = [
        Self::FilteredList,
        Self::MultiRead,
        Self::CheckNotExists,
        Self::CreateIfNotExists,
    ];
}

/// One sub-operation of a transaction.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Request {
    Create {
        path: String,
        data: Bytes,
        mode: CreateMode,
    },
    Remove {
        path: String,
        version: i32,
    },
    Set {
        path: String,
        data: Bytes,
        version: i32,
    },
    Check {
        path: String,
        version: i32,
    },
}

impl Request {
    pub fn create(path: impl Into<String>, data: impl Into<Bytes>, mode: CreateMode) -> Self {
        Self::Create {
            path: path.into(),
            data: data.into(),
            mode,
        }
    }

    pub fn remove(path: impl Into<String>, version: i32) -> Self {
        Self::Remove {
            path: path.into(),
            version,
        }
    }

    pub fn set(path: impl Into<String>, data: impl Into<Bytes>, version: i32) -> Self {
        Self::Set {
            path: path.into(),
            data: data.into(),
            version,
        }
    }

    pub fn check(path: impl Into<String>, version: i32) -> Self {
        Self::Check {
            path: path.into(),
            version,
        }
    }

    /// Path the sub-operation targets.
    pub fn path(&self) -> &str {
        match self {
            Self::Create { path, .. }
            | Self::Remove { path, .. }
            | Self::Set { path, .. }
            | Self::Check { path, .. } => path,
        }
    }

    /// Whether this sub-operation creates a session-scoped node.
    pub fn is_ephemeral_create(&self) -> bool {
        matches!(self, Self::Create { mode, .. } if mode.is_ephemeral())
    }
}

/// Result of one sub-operation of a transaction.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Response {
    Create { path_created: String },
    Remove,
    Set { stat: Stat },
    Check,
    Error { error: ErrorCode },
}

impl Response {
    /// The path a successful create produced.
    pub fn created_path(&self) -> Option<&str> {
        match self {
            Self::Create { path_created } => Some(path_created),
            _ => None,
        }
    }

    pub fn error(&self) -> ErrorCode {
        match self {
            Self::Error { error } => *error,
            _ => ErrorCode::Ok,
        }
    }

    /// One error response per request, all carrying `error`.
    pub fn errors_for(requests: &[Request], error: ErrorCode) -> Vec<Response> {
        requests.iter().map(|_| Self::Error { error }).collect()
    }
}

/// Outcome of a transaction.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MultiResponse {
    /// `Ok` when every sub-operation committed; otherwise the first failure.
    pub error: ErrorCode,
    pub responses: Vec<Response>,
}

impl MultiResponse {
    /// A failed transaction where every sub-operation reports `error`.
    pub fn failed(requests: &[Request], error: ErrorCode) -> Self {
        Self {
            error,
            responses: Response::errors_for(requests, error),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ExistsResponse {
    pub error: ErrorCode,
    pub stat: Option<Stat>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct GetResponse {
    pub error: ErrorCode,
    pub node: Option<Node>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ListResponse {
    pub error: ErrorCode,
    pub names: Vec<String>,
    pub stat: Option<Stat>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CreateResponse {
    pub error: ErrorCode,
    pub path_created: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RemoveResponse {
    pub error: ErrorCode,
}

/// What a fired watch observed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WatchEventKind {
    Created,
    Deleted,
    DataChanged,
    ChildrenChanged,
    SessionExpired,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WatchEvent {
    pub kind: WatchEventKind,
    pub path: String,
}

/// One-shot watch notification.
pub type WatchCallback = Box<dyn FnOnce(WatchEvent) + Send + 'static>;

/// Completion continuation for an asynchronous request.
pub type ResponseCallback<R> = Box<dyn FnOnce(R) + Send + 'static>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ephemeral_create_is_detected_by_capability_query() {
        assert!(Request::create("/a", "x", CreateMode::Ephemeral).is_ephemeral_create());
        assert!(Request::create("/a", "x", CreateMode::EphemeralSequential).is_ephemeral_create());
        assert!(!Request::create("/a", "x", CreateMode::Persistent).is_ephemeral_create());
        assert!(!Request::remove("/a", -1).is_ephemeral_create());
    }

    #[test]
    fn created_path_only_for_create_responses() {
        let created = Response::Create {
            path_created: "/a0000000001".to_string(),
        };
        assert_eq!(created.created_path(), Some("/a0000000001"));
        assert_eq!(Response::Remove.created_path(), None);
        assert_eq!(
            Response::Error {
                error: ErrorCode::NoNode
            }
            .error(),
            ErrorCode::NoNode
        );
    }

    #[test]
    fn failed_multi_has_one_response_per_request() {
        let requests = vec![Request::check("/a", -1), Request::remove("/b", -1)];
        let response = MultiResponse::failed(&requests, ErrorCode::SessionExpired);
        assert_eq!(response.responses.len(), 2);
        assert!(
            response
                .responses
                .iter()
                .all(|r| r.error() == ErrorCode::SessionExpired)
        );
    }
}
