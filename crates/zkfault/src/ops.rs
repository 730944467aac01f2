//! Synchronous operations.
//!
//! Each method mirrors the [`CoordinationClient`](zkfault_client::CoordinationClient)
//! operation of the same name. Throwing forms raise every error. Try forms
//! return the codes listed in the client's `TRY_*_RECOVERABLE` tables as
//! values and raise everything else, including injected faults.

use zkfault_client::{
    CreateMode, ErrorCode, ExistsResponse, GetResponse, KeeperError, ListRequestType,
    ListResponse, MultiResponse, Node, Request, Response, Stat, TRY_CREATE_RECOVERABLE,
    TRY_MULTI_RECOVERABLE, TRY_REMOVE_RECOVERABLE, TRY_SET_RECOVERABLE, WatchCallback,
};

use crate::adapter::{Compensation, Contract};
use crate::error::Result;
use crate::proxy::FaultInjectingClient;
use crate::tracker::for_each_created_ephemeral;

fn first_path(paths: &[String]) -> &str {
    paths.first().map_or("", String::as_str)
}

fn first_request_path(requests: &[Request]) -> &str {
    requests.first().map_or("", Request::path)
}

fn missing_as_none<T>(code: ErrorCode) -> Option<Option<T>> {
    (code == ErrorCode::NoNode).then_some(None)
}

fn listed(code: ErrorCode, recoverable: &[ErrorCode]) -> bool {
    recoverable.contains(&code)
}

/// Deletes the ephemeral nodes a committed transaction created.
fn undo_committed(
    method: &'static str,
    requests: &[Request],
    compensation: &Compensation<'_>,
    error: ErrorCode,
    responses: &[Response],
) -> Result<()> {
    if !error.is_ok() {
        return Ok(());
    }
    for_each_created_ephemeral(method, requests, responses, |path_created| {
        compensation.remove_created(path_created);
    })
}

impl FaultInjectingClient {
    // ------------------------------------------------------------------
    // Children
    // ------------------------------------------------------------------

    pub fn get_children(&mut self, path: &str, list: ListRequestType) -> Result<Vec<String>> {
        self.adapter.execute("get_children", path, Contract::Throw, |client| {
            client.get_children(path, list)
        })
    }

    pub fn get_children_watch(
        &mut self,
        path: &str,
        list: ListRequestType,
        watch: WatchCallback,
    ) -> Result<Vec<String>> {
        self.adapter
            .execute("get_children_watch", path, Contract::Throw, |client| {
                client.get_children_watch(path, list, watch)
            })
    }

    pub fn get_children_many(
        &mut self,
        paths: &[String],
        list: ListRequestType,
    ) -> Result<Vec<ListResponse>> {
        self.adapter.execute(
            "get_children_many",
            first_path(paths),
            Contract::Throw,
            |client| client.get_children_many(paths, list),
        )
    }

    /// Returns `None` when the node does not exist.
    pub fn try_get_children(
        &mut self,
        path: &str,
        list: ListRequestType,
    ) -> Result<Option<Vec<String>>> {
        self.adapter.execute(
            "try_get_children",
            path,
            Contract::Try(&missing_as_none::<Vec<String>>),
            |client| client.try_get_children(path, list),
        )
    }

    pub fn try_get_children_watch(
        &mut self,
        path: &str,
        list: ListRequestType,
        watch: WatchCallback,
    ) -> Result<Option<Vec<String>>> {
        self.adapter.execute(
            "try_get_children_watch",
            path,
            Contract::Try(&missing_as_none::<Vec<String>>),
            |client| client.try_get_children_watch(path, list, watch),
        )
    }

    pub fn try_get_children_many(
        &mut self,
        paths: &[String],
        list: ListRequestType,
    ) -> Result<Vec<ListResponse>> {
        self.adapter.execute(
            "try_get_children_many",
            first_path(paths),
            Contract::Throw,
            |client| client.try_get_children_many(paths, list),
        )
    }

    // ------------------------------------------------------------------
    // Reads
    // ------------------------------------------------------------------

    pub fn get(&mut self, path: &str) -> Result<Node> {
        self.adapter
            .execute("get", path, Contract::Throw, |client| client.get(path))
    }

    pub fn get_many(&mut self, paths: &[String]) -> Result<Vec<GetResponse>> {
        self.adapter
            .execute("get_many", first_path(paths), Contract::Throw, |client| {
                client.get_many(paths)
            })
    }

    /// Returns `None` when the node does not exist.
    pub fn try_get(&mut self, path: &str) -> Result<Option<Node>> {
        self.adapter.execute(
            "try_get",
            path,
            Contract::Try(&missing_as_none::<Node>),
            |client| client.try_get(path),
        )
    }

    pub fn try_get_watch(&mut self, path: &str, watch: WatchCallback) -> Result<Option<Node>> {
        self.adapter.execute(
            "try_get_watch",
            path,
            Contract::Try(&missing_as_none::<Node>),
            |client| client.try_get_watch(path, watch),
        )
    }

    pub fn try_get_many(&mut self, paths: &[String]) -> Result<Vec<GetResponse>> {
        self.adapter
            .execute("try_get_many", first_path(paths), Contract::Throw, |client| {
                client.try_get_many(paths)
            })
    }

    pub fn exists(&mut self, path: &str) -> Result<Option<Stat>> {
        self.adapter
            .execute("exists", path, Contract::Throw, |client| client.exists(path))
    }

    pub fn exists_many(&mut self, paths: &[String]) -> Result<Vec<ExistsResponse>> {
        self.adapter
            .execute("exists_many", first_path(paths), Contract::Throw, |client| {
                client.exists_many(paths)
            })
    }

    pub fn sync(&mut self, path: &str) -> Result<String> {
        self.adapter
            .execute("sync", path, Contract::Throw, |client| client.sync(path))
    }

    pub fn wait_for_disappear(&mut self, path: &str) -> Result<bool> {
        self.adapter
            .execute("wait_for_disappear", path, Contract::Throw, |client| {
                client.wait_for_disappear(path)
            })
    }

    // ------------------------------------------------------------------
    // Create
    // ------------------------------------------------------------------

    /// Creates a node, raising any non-success code.
    pub fn create(&mut self, path: &str, data: &[u8], mode: CreateMode) -> Result<String> {
        self.try_create(path, data, mode)?
            .map_err(|code| KeeperError::from_path(code, path).into())
    }

    /// Creates a node. On success the created path is returned and, for
    /// ephemeral modes, tracked for [`cleanup_ephemeral_nodes`](Self::cleanup_ephemeral_nodes).
    ///
    /// If a fault is injected after a successful ephemeral create, the node
    /// is deleted before the fault is reported.
    pub fn try_create(
        &mut self,
        path: &str,
        data: &[u8],
        mode: CreateMode,
    ) -> Result<std::result::Result<String, ErrorCode>> {
        let result: std::result::Result<String, ErrorCode> = self.adapter.execute_compensated(
            "try_create",
            path,
            Contract::Try(&|code| listed(code, TRY_CREATE_RECOVERABLE).then_some(Err(code))),
            |client| client.try_create(path, data, mode),
            |compensation, created| {
                if let Ok(path_created) = created
                    && mode.is_ephemeral()
                {
                    compensation.remove_created(path_created);
                }
                Ok(())
            },
        )?;

        if let Ok(path_created) = &result
            && mode.is_ephemeral()
        {
            self.track(path_created);
        }
        Ok(result)
    }

    /// Creates a persistent node; an existing node counts as success.
    pub fn create_if_not_exists(&mut self, path: &str, data: &[u8]) -> Result<()> {
        match self.try_create(path, data, CreateMode::Persistent)? {
            Ok(_) | Err(ErrorCode::NodeExists) => Ok(()),
            Err(code) => Err(KeeperError::from_path(code, path).into()),
        }
    }

    pub fn create_or_update(&mut self, path: &str, data: &[u8], mode: CreateMode) -> Result<()> {
        self.adapter
            .execute("create_or_update", path, Contract::Throw, |client| {
                client.create_or_update(path, data, mode)
            })
    }

    pub fn create_ancestors(&mut self, path: &str) -> Result<()> {
        self.adapter
            .execute("create_ancestors", path, Contract::Throw, |client| {
                client.create_ancestors(path)
            })
    }

    pub fn check_exists_and_get_create_ancestors_ops(
        &mut self,
        path: &str,
        requests: &mut Vec<Request>,
    ) -> Result<()> {
        self.adapter.execute(
            "check_exists_and_get_create_ancestors_ops",
            path,
            Contract::Throw,
            |client| client.check_exists_and_get_create_ancestors_ops(path, requests),
        )
    }

    // ------------------------------------------------------------------
    // Set
    // ------------------------------------------------------------------

    pub fn set(&mut self, path: &str, data: &[u8], version: i32) -> Result<Stat> {
        self.adapter.execute("set", path, Contract::Throw, |client| {
            client.set(path, data, version)
        })
    }

    pub fn try_set(
        &mut self,
        path: &str,
        data: &[u8],
        version: i32,
    ) -> Result<std::result::Result<Stat, ErrorCode>> {
        self.adapter.execute(
            "try_set",
            path,
            Contract::Try(&|code| listed(code, TRY_SET_RECOVERABLE).then_some(Err(code))),
            |client| client.try_set(path, data, version),
        )
    }

    // ------------------------------------------------------------------
    // Remove
    // ------------------------------------------------------------------

    pub fn remove(&mut self, path: &str, version: i32) -> Result<()> {
        self.adapter.execute("remove", path, Contract::Throw, |client| {
            client.remove(path, version)
        })
    }

    pub fn try_remove(
        &mut self,
        path: &str,
        version: i32,
    ) -> Result<std::result::Result<(), ErrorCode>> {
        self.adapter.execute(
            "try_remove",
            path,
            Contract::Try(&|code| listed(code, TRY_REMOVE_RECOVERABLE).then_some(Err(code))),
            |client| client.try_remove(path, version),
        )
    }

    pub fn remove_recursive(&mut self, path: &str) -> Result<()> {
        self.adapter
            .execute("remove_recursive", path, Contract::Throw, |client| {
                client.remove_recursive(path)
            })
    }

    pub fn try_remove_recursive(&mut self, path: &str) -> Result<()> {
        self.adapter
            .execute("try_remove_recursive", path, Contract::Throw, |client| {
                client.try_remove_recursive(path)
            })
    }

    pub fn remove_children(&mut self, path: &str) -> Result<()> {
        self.adapter
            .execute("remove_children", path, Contract::Throw, |client| {
                client.remove_children(path)
            })
    }

    /// Removes the subtree below `path`, keeping `keep_child`. Returns
    /// `true` when every removal succeeded.
    pub fn try_remove_children_recursive(
        &mut self,
        path: &str,
        keep_child: Option<&str>,
    ) -> Result<bool> {
        self.adapter.execute(
            "try_remove_children_recursive",
            path,
            Contract::Throw,
            |client| client.try_remove_children_recursive(path, keep_child),
        )
    }

    pub fn delete_ephemeral_node_if_content_matches(
        &mut self,
        path: &str,
        expected: &[u8],
    ) -> Result<()> {
        self.adapter.execute(
            "delete_ephemeral_node_if_content_matches",
            path,
            Contract::Throw,
            |client| client.delete_ephemeral_node_if_content_matches(path, expected),
        )
    }

    // ------------------------------------------------------------------
    // Transactions
    // ------------------------------------------------------------------

    /// Submits a transaction, raising any failure.
    ///
    /// If a fault is injected after the transaction committed, every
    /// ephemeral node it created is deleted before the fault is reported.
    pub fn multi(&mut self, requests: &[Request]) -> Result<Vec<Response>> {
        const METHOD: &str = "multi";
        let responses = self.adapter.execute_compensated(
            METHOD,
            first_request_path(requests),
            Contract::Throw,
            |client| client.multi(requests),
            |compensation, responses| {
                undo_committed(METHOD, requests, compensation, ErrorCode::Ok, responses)
            },
        )?;

        self.track_committed(METHOD, requests, ErrorCode::Ok, &responses)?;
        Ok(responses)
    }

    /// Submits a transaction. Failures of individual sub-operations are
    /// reported through the response; session and connection failures are
    /// raised.
    pub fn try_multi(&mut self, requests: &[Request]) -> Result<MultiResponse> {
        const METHOD: &str = "try_multi";
        let response = self.adapter.execute_compensated(
            METHOD,
            first_request_path(requests),
            Contract::Try(&|code| {
                listed(code, TRY_MULTI_RECOVERABLE).then(|| MultiResponse::failed(requests, code))
            }),
            |client| client.try_multi(requests),
            |compensation, response| {
                undo_committed(METHOD, requests, compensation, response.error, &response.responses)
            },
        )?;

        self.track_committed(METHOD, requests, response.error, &response.responses)?;
        Ok(response)
    }

    /// Submits a transaction, reporting every failure, injected ones
    /// included, through the response. Faults are only injected after the
    /// call.
    pub fn try_multi_no_throw(&mut self, requests: &[Request]) -> Result<MultiResponse> {
        const METHOD: &str = "try_multi_no_throw";
        let response = self.adapter.execute_compensated(
            METHOD,
            first_request_path(requests),
            Contract::NoThrow {
                recover: &|code| MultiResponse::failed(requests, code),
                reported: |response| response.error,
            },
            |client| Ok(client.try_multi_no_throw(requests)),
            |compensation, response| {
                undo_committed(METHOD, requests, compensation, response.error, &response.responses)
            },
        )?;

        self.track_committed(METHOD, requests, response.error, &response.responses)?;
        Ok(response)
    }

    fn track_committed(
        &mut self,
        method: &'static str,
        requests: &[Request],
        error: ErrorCode,
        responses: &[Response],
    ) -> Result<()> {
        if !error.is_ok() || !self.adapter.policy().is_active() {
            return Ok(());
        }
        let mut created = Vec::new();
        for_each_created_ephemeral(method, requests, responses, |path| {
            created.push(path.to_string());
        })?;
        for path in created {
            self.ephemeral_nodes.record(path);
        }
        Ok(())
    }
}
