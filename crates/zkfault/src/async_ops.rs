//! Asynchronous operations.
//!
//! The before-checkpoint runs on the calling thread: if it fires, the
//! returned future is already resolved and no request is issued. The
//! after-checkpoint runs inside the completion continuation, on whatever
//! thread the client completes on. An after-fault hides the real response
//! without undoing its effect on the server.

use std::sync::Arc;

use zkfault_client::{
    CoordinationClient, CreateMode, CreateResponse, ErrorCode, ExistsResponse, GetResponse,
    KeeperError, MultiResponse, RemoveResponse, Request, ResponseCallback, WatchCallback,
};

use crate::error::{Result, injected_after};
use crate::future::{ResponseFuture, resolve};
use crate::proxy::FaultInjectingClient;

const EXISTS_ACCEPTED: &[ErrorCode] = &[ErrorCode::Ok, ErrorCode::NoNode];
const TRY_GET_ACCEPTED: &[ErrorCode] = &[ErrorCode::Ok, ErrorCode::NoNode];
const TRY_REMOVE_ACCEPTED: &[ErrorCode] = &[
    ErrorCode::Ok,
    ErrorCode::NoNode,
    ErrorCode::BadVersion,
    ErrorCode::NotEmpty,
];

/// How a future reports failures.
enum Resolution<R> {
    /// Responses with a code outside `accepted`, and injected faults,
    /// resolve to an error.
    Accept {
        accepted: &'static [ErrorCode],
        error: fn(&R) -> ErrorCode,
    },
    /// Everything resolves to a response; injected faults are built by the
    /// function from their code.
    NoThrow(Arc<dyn Fn(ErrorCode) -> R + Send + Sync>),
}

impl<R> Resolution<R> {
    fn fault(&self, err: KeeperError) -> Result<R> {
        match self {
            Self::Accept { .. } => Err(err.into()),
            Self::NoThrow(build) => Ok(build(err.code())),
        }
    }

    fn settle(&self, response: R, path: &str) -> Result<R> {
        match self {
            Self::Accept { accepted, error } => {
                let code = error(&response);
                if accepted.contains(&code) {
                    Ok(response)
                } else {
                    Err(KeeperError::from_path(code, path).into())
                }
            }
            Self::NoThrow(_) => Ok(response),
        }
    }
}

impl FaultInjectingClient {
    /// Checks existence. `NoNode` resolves to a response; other errors and
    /// injected faults resolve to an error.
    pub fn exists_async(
        &self,
        path: &str,
        watch: Option<WatchCallback>,
    ) -> ResponseFuture<ExistsResponse> {
        let resolution: Resolution<ExistsResponse> = Resolution::Accept {
            accepted: EXISTS_ACCEPTED,
            error: |response: &ExistsResponse| response.error,
        };
        self.dispatch("exists_async", path, resolution, |client, callback| {
            client.exists_async(path, watch, callback);
        })
    }

    /// Reads a node. `NoNode` resolves to a response.
    pub fn try_get_async(&self, path: &str) -> ResponseFuture<GetResponse> {
        let resolution: Resolution<GetResponse> = Resolution::Accept {
            accepted: TRY_GET_ACCEPTED,
            error: |response: &GetResponse| response.error,
        };
        self.dispatch("try_get_async", path, resolution, |client, callback| {
            client.get_async(path, callback);
        })
    }

    /// Removes a node. `NoNode`, `BadVersion` and `NotEmpty` resolve to a
    /// response.
    pub fn try_remove_async(&self, path: &str, version: i32) -> ResponseFuture<RemoveResponse> {
        let resolution: Resolution<RemoveResponse> = Resolution::Accept {
            accepted: TRY_REMOVE_ACCEPTED,
            error: |response: &RemoveResponse| response.error,
        };
        self.dispatch("try_remove_async", path, resolution, |client, callback| {
            client.remove_async(path, version, callback);
        })
    }

    /// Removes a node; every outcome resolves to a response.
    pub fn try_remove_no_throw_async(
        &self,
        path: &str,
        version: i32,
    ) -> ResponseFuture<RemoveResponse> {
        let resolution = Resolution::NoThrow(Arc::new(|error: ErrorCode| RemoveResponse {
            error,
        }));
        self.dispatch(
            "try_remove_no_throw_async",
            path,
            resolution,
            |client, callback| client.remove_async(path, version, callback),
        )
    }

    /// Creates a node; every outcome resolves to a response.
    ///
    /// Nodes created this way are not tracked for cleanup.
    pub fn try_create_no_throw_async(
        &self,
        path: &str,
        data: &[u8],
        mode: CreateMode,
    ) -> ResponseFuture<CreateResponse> {
        let resolution = Resolution::NoThrow(Arc::new(|error: ErrorCode| CreateResponse {
            error,
            path_created: String::new(),
        }));
        self.dispatch(
            "try_create_no_throw_async",
            path,
            resolution,
            |client, callback| client.create_async(path, data, mode, callback),
        )
    }

    /// Submits a transaction; every outcome resolves to a response. An
    /// injected fault yields one error response per request.
    pub fn try_multi_no_throw_async(&self, requests: &[Request]) -> ResponseFuture<MultiResponse> {
        let path = requests.first().map_or("", Request::path);
        let template: Vec<Request> = requests.to_vec();
        let resolution = Resolution::NoThrow(Arc::new(move |error: ErrorCode| {
            MultiResponse::failed(&template, error)
        }));
        self.dispatch(
            "try_multi_no_throw_async",
            path,
            resolution,
            |client, callback| client.multi_async(requests, callback),
        )
    }

    fn dispatch<R: Send + 'static>(
        &self,
        method: &'static str,
        path: &str,
        resolution: Resolution<R>,
        issue: impl FnOnce(&dyn CoordinationClient, ResponseCallback<R>),
    ) -> ResponseFuture<R> {
        let (sender, future) = ResponseFuture::channel();

        let client = match self.adapter.begin_async(method, path) {
            Ok(client) => client,
            Err(err) => {
                resolve(sender, resolution.fault(err));
                return future;
            }
        };

        let checkpoint = self.adapter.checkpoint();
        let path = path.to_string();
        issue(
            client.as_ref(),
            Box::new(move |response| {
                let outcome = if checkpoint.fails_after(method, &path) {
                    resolution.fault(injected_after())
                } else {
                    resolution.settle(response, &path)
                };
                resolve(sender, outcome);
            }),
        );
        future
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn accepting(accepted: &'static [ErrorCode]) -> Resolution<RemoveResponse> {
        Resolution::Accept {
            accepted,
            error: |response| response.error,
        }
    }

    fn removed(error: ErrorCode) -> RemoveResponse {
        RemoveResponse { error }
    }

    #[test]
    fn accepted_codes_resolve_to_the_response() {
        let resolution = accepting(TRY_REMOVE_ACCEPTED);

        for code in TRY_REMOVE_ACCEPTED {
            let settled = resolution.settle(removed(*code), "/a").unwrap();
            assert_eq!(settled.error, *code);
        }
    }

    #[test]
    fn other_codes_resolve_to_an_error_naming_the_path() {
        let resolution = accepting(EXISTS_ACCEPTED);

        let err = resolution
            .settle(removed(ErrorCode::BadVersion), "/a")
            .unwrap_err();

        assert_eq!(err.code(), Some(ErrorCode::BadVersion));
        assert!(err.to_string().contains("/a"));
    }

    #[test]
    fn injected_faults_follow_the_resolution() {
        let err = accepting(TRY_GET_ACCEPTED)
            .fault(injected_after())
            .unwrap_err();
        assert!(err.is_injected());

        let build: Arc<dyn Fn(ErrorCode) -> RemoveResponse + Send + Sync> = Arc::new(removed);
        let no_throw = Resolution::NoThrow(build);
        let response = no_throw.fault(injected_after()).unwrap();
        assert_eq!(response.error, ErrorCode::OperationTimeout);
        let response = no_throw.settle(removed(ErrorCode::SystemError), "/a").unwrap();
        assert_eq!(response.error, ErrorCode::SystemError);
    }
}
