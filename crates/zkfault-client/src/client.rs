//! The coordination client trait.
//!
//! [`CoordinationClient`] is the full operation surface a caller consumes:
//! synchronous operations in throwing and "try" forms, callback-based
//! asynchronous operations, and session introspection.
//!
//! # Error contracts
//!
//! - Throwing forms return `Err` for every failure.
//! - Try forms return an operation-specific set of user-class codes as
//!   values (`Ok(Err(code))`, `Ok(None)`, or a coded `MultiResponse`) and
//!   `Err` for everything else. Hardware-class codes are always `Err`.
//! - `try_multi_no_throw` reports every failure through the response.
//!
//! Composite operations (`create_ancestors`, `remove_recursive`, ...) are
//! provided methods layered over the primitives, so an implementation only
//! supplies the primitives.

use bytes::Bytes;

use crate::{
    CreateMode, CreateResponse, ErrorCode, ExistsResponse, FeatureFlag, GetResponse, KeeperError,
    KeeperResult, ListRequestType, ListResponse, MultiResponse, Node, RemoveResponse, Request,
    Response, ResponseCallback, Stat, WatchCallback,
};

/// Codes `try_create` returns as values.
pub const TRY_CREATE_RECOVERABLE: &[ErrorCode] = &[
    ErrorCode::NoNode,
    ErrorCode::NodeExists,
    ErrorCode::NoChildrenForEphemerals,
];

/// Codes `try_remove` returns as values.
pub const TRY_REMOVE_RECOVERABLE: &[ErrorCode] = &[
    ErrorCode::NoNode,
    ErrorCode::BadVersion,
    ErrorCode::NotEmpty,
];

/// Codes `try_set` returns as values.
pub const TRY_SET_RECOVERABLE: &[ErrorCode] = &[ErrorCode::NoNode, ErrorCode::BadVersion];

/// Codes `try_multi` reports through the response instead of failing.
pub const TRY_MULTI_RECOVERABLE: &[ErrorCode] = &[
    ErrorCode::NoNode,
    ErrorCode::BadVersion,
    ErrorCode::NoChildrenForEphemerals,
    ErrorCode::NodeExists,
    ErrorCode::NotEmpty,
];

/// A session against a coordination tree.
pub trait CoordinationClient: Send + Sync {
    // ------------------------------------------------------------------
    // Session introspection
    // ------------------------------------------------------------------

    fn session_id(&self) -> i64;

    /// Whether the session is gone and every call will fail.
    fn expired(&self) -> bool;

    fn is_feature_enabled(&self, flag: FeatureFlag) -> bool;

    // ------------------------------------------------------------------
    // Reads
    // ------------------------------------------------------------------

    /// Reads a node, returning `None` when it does not exist.
    fn try_get(&self, path: &str) -> KeeperResult<Option<Node>>;

    /// Like [`try_get`](Self::try_get), leaving a one-shot watch on the path.
    fn try_get_watch(&self, path: &str, watch: WatchCallback) -> KeeperResult<Option<Node>>;

    /// Reads several nodes; fails if any of them cannot be read.
    fn get_many(&self, paths: &[String]) -> KeeperResult<Vec<GetResponse>>;

    /// Reads several nodes, reporting missing nodes per entry.
    fn try_get_many(&self, paths: &[String]) -> KeeperResult<Vec<GetResponse>>;

    fn exists(&self, path: &str) -> KeeperResult<Option<Stat>>;

    fn exists_many(&self, paths: &[String]) -> KeeperResult<Vec<ExistsResponse>>;

    /// Lists children, returning `None` when the parent does not exist.
    fn try_get_children(
        &self,
        path: &str,
        list: ListRequestType,
    ) -> KeeperResult<Option<Vec<String>>>;

    fn try_get_children_watch(
        &self,
        path: &str,
        list: ListRequestType,
        watch: WatchCallback,
    ) -> KeeperResult<Option<Vec<String>>>;

    /// Lists children of several nodes; fails if any listing fails.
    fn get_children_many(
        &self,
        paths: &[String],
        list: ListRequestType,
    ) -> KeeperResult<Vec<ListResponse>>;

    /// Lists children of several nodes, reporting missing nodes per entry.
    fn try_get_children_many(
        &self,
        paths: &[String],
        list: ListRequestType,
    ) -> KeeperResult<Vec<ListResponse>>;

    /// Flushes the leader channel for `path`.
    fn sync(&self, path: &str) -> KeeperResult<String>;

    /// Blocks until the node is gone. Returns `false` if the client stops
    /// waiting while the node still exists.
    fn wait_for_disappear(&self, path: &str) -> KeeperResult<bool>;

    // ------------------------------------------------------------------
    // Writes
    // ------------------------------------------------------------------

    /// Creates a node. Codes in [`TRY_CREATE_RECOVERABLE`] come back as
    /// `Ok(Err(code))`; on success the created path is returned.
    fn try_create(
        &self,
        path: &str,
        data: &[u8],
        mode: CreateMode,
    ) -> KeeperResult<Result<String, ErrorCode>>;

    /// Codes in [`TRY_SET_RECOVERABLE`] come back as `Ok(Err(code))`.
    fn try_set(
        &self,
        path: &str,
        data: &[u8],
        version: i32,
    ) -> KeeperResult<Result<Stat, ErrorCode>>;

    /// Codes in [`TRY_REMOVE_RECOVERABLE`] come back as `Ok(Err(code))`.
    fn try_remove(&self, path: &str, version: i32) -> KeeperResult<Result<(), ErrorCode>>;

    /// Submits a transaction. Codes in [`TRY_MULTI_RECOVERABLE`] are reported
    /// through the response's `error` field.
    fn try_multi(&self, requests: &[Request]) -> KeeperResult<MultiResponse>;

    /// Submits a transaction, reporting every failure through the response.
    fn try_multi_no_throw(&self, requests: &[Request]) -> MultiResponse;

    // ------------------------------------------------------------------
    // Asynchronous operations
    // ------------------------------------------------------------------

    fn exists_async(
        &self,
        path: &str,
        watch: Option<WatchCallback>,
        callback: ResponseCallback<ExistsResponse>,
    );

    fn get_async(&self, path: &str, callback: ResponseCallback<GetResponse>);

    fn create_async(
        &self,
        path: &str,
        data: &[u8],
        mode: CreateMode,
        callback: ResponseCallback<CreateResponse>,
    );

    fn remove_async(&self, path: &str, version: i32, callback: ResponseCallback<RemoveResponse>);

    fn multi_async(&self, requests: &[Request], callback: ResponseCallback<MultiResponse>);

    // ------------------------------------------------------------------
    // Provided operations
    // ------------------------------------------------------------------

    fn get(&self, path: &str) -> KeeperResult<Node> {
        self.try_get(path)?
            .ok_or_else(|| KeeperError::from_path(ErrorCode::NoNode, path))
    }

    fn get_children(&self, path: &str, list: ListRequestType) -> KeeperResult<Vec<String>> {
        self.try_get_children(path, list)?
            .ok_or_else(|| KeeperError::from_path(ErrorCode::NoNode, path))
    }

    fn get_children_watch(
        &self,
        path: &str,
        list: ListRequestType,
        watch: WatchCallback,
    ) -> KeeperResult<Vec<String>> {
        self.try_get_children_watch(path, list, watch)?
            .ok_or_else(|| KeeperError::from_path(ErrorCode::NoNode, path))
    }

    fn create(&self, path: &str, data: &[u8], mode: CreateMode) -> KeeperResult<String> {
        self.try_create(path, data, mode)?
            .map_err(|code| KeeperError::from_path(code, path))
    }

    /// Creates a persistent node unless it already exists.
    fn create_if_not_exists(&self, path: &str, data: &[u8]) -> KeeperResult<()> {
        match self.try_create(path, data, CreateMode::Persistent)? {
            Ok(_) | Err(ErrorCode::NodeExists) => Ok(()),
            Err(code) => Err(KeeperError::from_path(code, path)),
        }
    }

    /// Creates the node, or overwrites its data if it already exists.
    fn create_or_update(&self, path: &str, data: &[u8], mode: CreateMode) -> KeeperResult<()> {
        match self.try_create(path, data, mode)? {
            Ok(_) => Ok(()),
            Err(ErrorCode::NodeExists) => self.set(path, data, -1).map(|_| ()),
            Err(code) => Err(KeeperError::from_path(code, path)),
        }
    }

    /// Creates every missing ancestor of `path` (not `path` itself).
    fn create_ancestors(&self, path: &str) -> KeeperResult<()> {
        for ancestor in ancestors(path) {
            match self.try_create(ancestor, b"", CreateMode::Persistent)? {
                Ok(_) | Err(ErrorCode::NodeExists) => {}
                Err(code) => return Err(KeeperError::from_path(code, ancestor)),
            }
        }
        Ok(())
    }

    /// Appends a persistent create request for every missing ancestor.
    fn check_exists_and_get_create_ancestors_ops(
        &self,
        path: &str,
        requests: &mut Vec<Request>,
    ) -> KeeperResult<()> {
        let paths: Vec<String> = ancestors(path).map(str::to_string).collect();
        let responses = self.exists_many(&paths)?;
        for (ancestor, response) in paths.into_iter().zip(responses) {
            match response.error {
                ErrorCode::Ok => {}
                ErrorCode::NoNode => {
                    requests.push(Request::create(ancestor, Bytes::new(), CreateMode::Persistent));
                }
                code => return Err(KeeperError::from_path(code, &ancestor)),
            }
        }
        Ok(())
    }

    fn set(&self, path: &str, data: &[u8], version: i32) -> KeeperResult<Stat> {
        self.try_set(path, data, version)?
            .map_err(|code| KeeperError::from_path(code, path))
    }

    fn remove(&self, path: &str, version: i32) -> KeeperResult<()> {
        self.try_remove(path, version)?
            .map_err(|code| KeeperError::from_path(code, path))
    }

    /// Removes a node and its whole subtree.
    fn remove_recursive(&self, path: &str) -> KeeperResult<()> {
        for child in self.get_children(path, ListRequestType::All)? {
            self.remove_recursive(&join(path, &child))?;
        }
        self.remove(path, -1)
    }

    /// Like [`remove_recursive`](Self::remove_recursive), tolerating nodes
    /// that disappear concurrently.
    fn try_remove_recursive(&self, path: &str) -> KeeperResult<()> {
        self.try_remove_children_recursive(path, None)?;
        match self.try_remove(path, -1)? {
            Ok(()) | Err(ErrorCode::NoNode) => Ok(()),
            Err(code) => Err(KeeperError::from_path(code, path)),
        }
    }

    /// Removes every child of `path`. Children must be leaves.
    fn remove_children(&self, path: &str) -> KeeperResult<()> {
        for child in self.get_children(path, ListRequestType::All)? {
            self.remove(&join(path, &child), -1)?;
        }
        Ok(())
    }

    /// Removes the subtree below `path`, keeping `keep_child` if given.
    ///
    /// Returns `true` when every removal succeeded.
    fn try_remove_children_recursive(
        &self,
        path: &str,
        keep_child: Option<&str>,
    ) -> KeeperResult<bool> {
        let Some(children) = self.try_get_children(path, ListRequestType::All)? else {
            return Ok(true);
        };
        let mut removed_all = true;
        for child in children {
            if keep_child == Some(child.as_str()) {
                continue;
            }
            let child_path = join(path, &child);
            removed_all &= self.try_remove_children_recursive(&child_path, None)?;
            match self.try_remove(&child_path, -1)? {
                Ok(()) | Err(ErrorCode::NoNode) => {}
                Err(_) => removed_all = false,
            }
        }
        Ok(removed_all)
    }

    /// Deletes an ephemeral node if it still holds `expected`; otherwise
    /// waits for its owner to let it go.
    fn delete_ephemeral_node_if_content_matches(
        &self,
        path: &str,
        expected: &[u8],
    ) -> KeeperResult<()> {
        let Some(node) = self.try_get(path)? else {
            return Ok(());
        };

        if node.data.as_ref() == expected {
            return match self.try_remove(path, node.stat.version)? {
                Ok(()) | Err(ErrorCode::NoNode) => Ok(()),
                Err(code) => Err(KeeperError::from_path(code, path)),
            };
        }

        tracing::warn!(path = %path, "ephemeral node still exists, waiting for it to disappear");
        if self.wait_for_disappear(path)? {
            Ok(())
        } else {
            Err(KeeperError::new(
                ErrorCode::NodeExists,
                format!("ephemeral node {path} still exists, probably it's owned by someone else"),
            ))
        }
    }

    /// Submits a transaction, failing if any sub-operation fails.
    fn multi(&self, requests: &[Request]) -> KeeperResult<Vec<Response>> {
        let response = self.try_multi(requests)?;
        if response.error.is_ok() {
            return Ok(response.responses);
        }

        let failed = response
            .responses
            .iter()
            .position(|r| r.error() == response.error)
            .unwrap_or(0);
        let path = requests.get(failed).map_or("", Request::path);
        Err(KeeperError::new(
            response.error,
            format!("transaction failed at op #{failed}, path: {path}"),
        ))
    }
}

/// Ancestors of `path`, shallowest first, excluding the root and `path`.
fn ancestors(path: &str) -> impl Iterator<Item = &str> {
    path.match_indices('/')
        .map(|(index, _)| index)
        .filter(|&index| index > 0)
        .map(move |index| &path[..index])
}

/// Joins a parent path and a child name.
pub fn join(parent: &str, child: &str) -> String {
    if parent == "/" {
        format!("/{child}")
    } else {
        format!("{parent}/{child}")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ancestors_skip_root_and_self() {
        let found: Vec<&str> = ancestors("/a/b/c").collect();
        assert_eq!(found, vec!["/a", "/a/b"]);
        assert_eq!(ancestors("/a").count(), 0);
    }

    #[test]
    fn join_handles_root() {
        assert_eq!(join("/", "a"), "/a");
        assert_eq!(join("/a", "b"), "/a/b");
    }
}
