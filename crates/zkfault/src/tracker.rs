//! Ephemeral nodes created through the proxy.

use std::mem;

use zkfault_client::{Request, Response};

use crate::error::{Error, Result};

/// Paths of ephemeral nodes created by calls that were reported as
/// successful, in creation order.
#[derive(Debug, Default, Clone)]
pub struct EphemeralTracker {
    paths: Vec<String>,
}

impl EphemeralTracker {
    pub fn record(&mut self, path: impl Into<String>) {
        self.paths.push(path.into());
    }

    pub fn paths(&self) -> &[String] {
        &self.paths
    }

    pub fn len(&self) -> usize {
        self.paths.len()
    }

    pub fn is_empty(&self) -> bool {
        self.paths.is_empty()
    }

    /// Takes every tracked path, leaving the tracker empty.
    pub fn take(&mut self) -> Vec<String> {
        mem::take(&mut self.paths)
    }
}

/// Calls `action` with the created path of every ephemeral create in a
/// committed transaction.
///
/// An empty response list means nothing was reported and is skipped. Any
/// other mismatch between requests and responses is a consistency defect.
pub(crate) fn for_each_created_ephemeral(
    method: &'static str,
    requests: &[Request],
    responses: &[Response],
    mut action: impl FnMut(&str),
) -> Result<()> {
    if responses.is_empty() {
        return Ok(());
    }
    if responses.len() != requests.len() {
        return Err(Error::ResponseCountMismatch {
            method,
            requests: requests.len(),
            responses: responses.len(),
        });
    }

    for (index, (request, response)) in requests.iter().zip(responses).enumerate() {
        if !request.is_ephemeral_create() {
            continue;
        }
        let Some(path_created) = response.created_path() else {
            return Err(Error::UnexpectedResponse {
                method,
                index,
                path: request.path().to_string(),
            });
        };
        action(path_created);
    }
    Ok(())
}
