//! Execution core shared by every instrumented operation.
//!
//! ```text
//! NotStarted → BeforeCheck → Executing → AfterCheck → Done
//!                   │            │            │
//!                   └────────────┴────────────┴──────→ Failed
//! ```
//!
//! A call fails at `BeforeCheck` when the proxy holds no client or the
//! policy injects a fault (the real client is never invoked), at
//! `Executing` when the real client returns an error, and at `AfterCheck`
//! when the policy injects a fault after a real call. In the last case the
//! operation's compensation runs first so visible side effects (ephemeral
//! nodes) are undone before the caller is told the call failed.

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use zkfault_client::{CoordinationClient, ErrorCode, KeeperError, KeeperResult};

use crate::error::{Error, Result, injected_after, injected_before, null_client};
use crate::logger::{FaultEvent, FaultKind, FaultLogger};
use crate::policy::FaultPolicy;

/// Progress of one instrumented call.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum Stage {
    #[default]
    NotStarted,
    BeforeCheck,
    Executing,
    AfterCheck,
    Done,
    Failed,
}

/// How an operation reports failures to its caller.
pub(crate) enum Contract<'a, T> {
    /// Every error is raised.
    Throw,
    /// Codes the function maps to `Some` are returned as values; every
    /// other code, and every hardware code, is raised.
    Try(&'a dyn Fn(ErrorCode) -> Option<T>),
    /// Every error becomes a value. There is no before-checkpoint, and a
    /// hardware code reported by the real call skips the after-checkpoint.
    NoThrow {
        recover: &'a dyn Fn(ErrorCode) -> T,
        reported: fn(&T) -> ErrorCode,
    },
}

impl<T> Contract<'_, T> {
    fn checks_before(&self) -> bool {
        !matches!(self, Self::NoThrow { .. })
    }

    fn reports_hardware(&self, value: &T) -> bool {
        match self {
            Self::NoThrow { reported, .. } => reported(value).is_hardware(),
            _ => false,
        }
    }

    fn settle(&self, err: KeeperError) -> Result<T> {
        match self {
            Self::Throw => Err(err.into()),
            Self::Try(recover) => {
                if err.is_hardware() {
                    return Err(err.into());
                }
                recover(err.code()).ok_or_else(|| err.into())
            }
            Self::NoThrow { recover, .. } => Ok(recover(err.code())),
        }
    }
}

/// Undoes the visible effects of a call whose success is being hidden.
pub(crate) struct Compensation<'a> {
    client: &'a dyn CoordinationClient,
    logger: &'a dyn FaultLogger,
    method: &'static str,
    path: &'a str,
}

impl Compensation<'_> {
    /// Deletes a node the hidden call created. Failures are logged only.
    pub(crate) fn remove_created(&self, path_created: &str) {
        let (kind, code) = match self.client.remove(path_created, -1) {
            Ok(()) => (FaultKind::Compensated, None),
            Err(err) => (FaultKind::CompensationFailed, Some(err.code())),
        };
        self.logger.record(&FaultEvent {
            kind,
            method: self.method,
            path: self.path,
            stage: Stage::AfterCheck,
            code,
            detail: path_created,
        });
    }
}

/// After-checkpoint handle moved into asynchronous continuations.
pub(crate) struct Checkpoint {
    policy: Arc<Mutex<FaultPolicy>>,
    logger: Arc<dyn FaultLogger>,
}

impl Checkpoint {
    /// Whether the after-checkpoint injects a fault; logs it if so.
    pub(crate) fn fails_after(&self, method: &'static str, path: &str) -> bool {
        let fails = lock(&self.policy).decide_after();
        if fails {
            record_injection(self.logger.as_ref(), FaultKind::InjectedAfter, method, path);
        }
        fails
    }
}

pub(crate) struct OperationAdapter {
    current: Option<Arc<dyn CoordinationClient>>,
    previous: Option<Arc<dyn CoordinationClient>>,
    policy: Arc<Mutex<FaultPolicy>>,
    logger: Arc<dyn FaultLogger>,
    last_stage: Stage,
}

impl OperationAdapter {
    pub(crate) fn new(
        client: Option<Arc<dyn CoordinationClient>>,
        policy: FaultPolicy,
        logger: Arc<dyn FaultLogger>,
    ) -> Self {
        Self {
            current: client,
            previous: None,
            policy: Arc::new(Mutex::new(policy)),
            logger,
            last_stage: Stage::NotStarted,
        }
    }

    pub(crate) fn current(&self) -> Option<&Arc<dyn CoordinationClient>> {
        self.current.as_ref()
    }

    pub(crate) fn set_current(&mut self, client: Option<Arc<dyn CoordinationClient>>) {
        self.current = client;
    }

    /// The current client while its session is live; otherwise the last
    /// client that served a failed call, falling back to the current one.
    pub(crate) fn cleanup_target(&self) -> Option<Arc<dyn CoordinationClient>> {
        match &self.current {
            Some(current) if !current.expired() => Some(Arc::clone(current)),
            _ => self.previous.clone().or_else(|| self.current.clone()),
        }
    }

    pub(crate) fn policy(&self) -> MutexGuard<'_, FaultPolicy> {
        lock(&self.policy)
    }

    pub(crate) fn logger(&self) -> &dyn FaultLogger {
        self.logger.as_ref()
    }

    pub(crate) fn set_logger(&mut self, logger: Arc<dyn FaultLogger>) {
        self.logger = logger;
    }

    pub(crate) fn last_stage(&self) -> Stage {
        self.last_stage
    }

    pub(crate) fn checkpoint(&self) -> Checkpoint {
        Checkpoint {
            policy: Arc::clone(&self.policy),
            logger: Arc::clone(&self.logger),
        }
    }

    /// Runs `call` between the two fault checkpoints without compensation.
    pub(crate) fn execute<T>(
        &mut self,
        method: &'static str,
        path: &str,
        contract: Contract<'_, T>,
        call: impl FnOnce(&dyn CoordinationClient) -> KeeperResult<T>,
    ) -> Result<T> {
        self.execute_compensated(method, path, contract, call, |_, _| Ok(()))
    }

    /// Runs `call` between the two fault checkpoints. When the
    /// after-checkpoint fires, `compensate` receives the real result before
    /// it is discarded; an error from it is raised unchanged.
    pub(crate) fn execute_compensated<T>(
        &mut self,
        method: &'static str,
        path: &str,
        contract: Contract<'_, T>,
        call: impl FnOnce(&dyn CoordinationClient) -> KeeperResult<T>,
        compensate: impl FnOnce(&Compensation<'_>, &T) -> Result<()>,
    ) -> Result<T> {
        self.execute_guarded(method, path, contract, || {}, call, compensate)
    }

    /// Like [`execute_compensated`](Self::execute_compensated), with
    /// `on_before_failure` run once when the call fails at the
    /// before-checkpoint, before the error is returned.
    pub(crate) fn execute_guarded<T>(
        &mut self,
        method: &'static str,
        path: &str,
        contract: Contract<'_, T>,
        on_before_failure: impl FnOnce(),
        call: impl FnOnce(&dyn CoordinationClient) -> KeeperResult<T>,
        compensate: impl FnOnce(&Compensation<'_>, &T) -> Result<()>,
    ) -> Result<T> {
        let mut stage = Stage::NotStarted;
        let outcome = self.run(
            &mut stage,
            method,
            path,
            &contract,
            on_before_failure,
            call,
            compensate,
        );

        match outcome {
            Ok(value) => {
                self.last_stage = Stage::Done;
                Ok(value)
            }
            Err(Error::Keeper(err)) => {
                self.last_stage = Stage::Failed;
                self.logger.record(&FaultEvent {
                    kind: FaultKind::CallFailed,
                    method,
                    path,
                    stage,
                    code: Some(err.code()),
                    detail: err.message(),
                });
                if self.current.is_some() {
                    self.previous.clone_from(&self.current);
                }
                contract.settle(err)
            }
            Err(fatal) => {
                self.last_stage = Stage::Failed;
                self.logger.record(&FaultEvent {
                    kind: FaultKind::CallFailed,
                    method,
                    path,
                    stage,
                    code: None,
                    detail: &fatal.to_string(),
                });
                Err(fatal)
            }
        }
    }

    #[allow(clippy::too_many_arguments)]
    fn run<T>(
        &self,
        stage: &mut Stage,
        method: &'static str,
        path: &str,
        contract: &Contract<'_, T>,
        on_before_failure: impl FnOnce(),
        call: impl FnOnce(&dyn CoordinationClient) -> KeeperResult<T>,
        compensate: impl FnOnce(&Compensation<'_>, &T) -> Result<()>,
    ) -> Result<T> {
        *stage = Stage::BeforeCheck;
        let Some(client) = self.current.clone() else {
            on_before_failure();
            return Err(null_client().into());
        };
        if contract.checks_before() && self.policy().decide_before() {
            record_injection(self.logger.as_ref(), FaultKind::InjectedBefore, method, path);
            on_before_failure();
            return Err(injected_before().into());
        }

        *stage = Stage::Executing;
        let value = call(client.as_ref())?;

        // A connectivity failure the call reported itself is not faulted again.
        if contract.reports_hardware(&value) {
            return Ok(value);
        }

        *stage = Stage::AfterCheck;
        if self.policy().decide_after() {
            record_injection(self.logger.as_ref(), FaultKind::InjectedAfter, method, path);
            let compensation = Compensation {
                client: client.as_ref(),
                logger: self.logger.as_ref(),
                method,
                path,
            };
            compensate(&compensation, &value)?;
            return Err(injected_after().into());
        }

        *stage = Stage::Done;
        Ok(value)
    }

    /// Before-checkpoint for asynchronous calls: the client to issue the
    /// request on, or the error the future must resolve with.
    pub(crate) fn begin_async(
        &self,
        method: &'static str,
        path: &str,
    ) -> std::result::Result<Arc<dyn CoordinationClient>, KeeperError> {
        let Some(client) = self.current.clone() else {
            return Err(null_client());
        };
        if self.policy().decide_before() {
            record_injection(self.logger.as_ref(), FaultKind::InjectedBefore, method, path);
            return Err(injected_before());
        }
        Ok(client)
    }
}

fn lock(policy: &Mutex<FaultPolicy>) -> MutexGuard<'_, FaultPolicy> {
    policy.lock().unwrap_or_else(PoisonError::into_inner)
}

fn record_injection(logger: &dyn FaultLogger, kind: FaultKind, method: &str, path: &str) {
    let (stage, err) = match kind {
        FaultKind::InjectedBefore => (Stage::BeforeCheck, injected_before()),
        _ => (Stage::AfterCheck, injected_after()),
    };
    logger.record(&FaultEvent {
        kind,
        method,
        path,
        stage,
        code: Some(err.code()),
        detail: err.message(),
    });
}
