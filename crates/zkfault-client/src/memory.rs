//! In-process coordination tree.
//!
//! [`MemoryServer`] holds one tree shared by any number of sessions;
//! [`MemoryClient`] is a session implementing [`CoordinationClient`].
//! Every trait call is recorded in the session's call log, which lets
//! tests assert exactly which requests reached the "server".
//!
//! ```text
//! MemoryServer (Arc<Mutex<ServerState>>)
//!   ├── MemoryClient (session 1)
//!   └── MemoryClient (session 2)
//! ```
//!
//! Asynchronous callbacks and watches run on the calling thread after the
//! tree lock is released.

use std::collections::{BTreeMap, BTreeSet, HashMap, HashSet, VecDeque};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use bytes::Bytes;

use crate::client::{TRY_CREATE_RECOVERABLE, TRY_REMOVE_RECOVERABLE, TRY_SET_RECOVERABLE, join};
use crate::{
    CoordinationClient, CreateMode, CreateResponse, ErrorCode, ExistsResponse, FeatureFlag,
    GetResponse, KeeperError, KeeperResult, ListRequestType, ListResponse, MultiResponse, Node,
    RemoveResponse, Request, Response, ResponseCallback, Stat, WatchCallback, WatchEvent,
    WatchEventKind,
};

// ============================================================================
// Tree
// ============================================================================

#[derive(Debug, Clone, Default)]
struct Znode {
    data: Bytes,
    stat: Stat,
    children: BTreeSet<String>,
}

/// Node map plus the transaction counter. Cloned to stage transactions.
#[derive(Debug, Clone)]
struct Tree {
    nodes: BTreeMap<String, Znode>,
    zxid: i64,
}

type Trigger = (WatchEventKind, String);

impl Tree {
    fn new() -> Self {
        let mut nodes = BTreeMap::new();
        nodes.insert("/".to_string(), Znode::default());
        Self { nodes, zxid: 0 }
    }

    fn node(&self, path: &str) -> Result<&Znode, ErrorCode> {
        validate_path(path)?;
        self.nodes.get(path).ok_or(ErrorCode::NoNode)
    }

    fn create(
        &mut self,
        path: &str,
        data: &[u8],
        mode: CreateMode,
        session_id: i64,
        triggers: &mut Vec<Trigger>,
    ) -> Result<String, ErrorCode> {
        validate_path(path)?;
        if path == "/" {
            return Err(ErrorCode::NodeExists);
        }
        let parent_path = parent_of(path);

        let parent = self.nodes.get(parent_path).ok_or(ErrorCode::NoNode)?;
        if parent.stat.ephemeral_owner != 0 {
            return Err(ErrorCode::NoChildrenForEphemerals);
        }

        let created = if mode.is_sequential() {
            format!("{path}{:010}", parent.stat.cversion)
        } else {
            path.to_string()
        };
        if self.nodes.contains_key(&created) {
            return Err(ErrorCode::NodeExists);
        }

        self.zxid += 1;
        let zxid = self.zxid;
        let name = created[parent_path.len()..].trim_start_matches('/').to_string();

        if let Some(parent) = self.nodes.get_mut(parent_path) {
            parent.children.insert(name);
            parent.stat.cversion += 1;
            parent.stat.num_children += 1;
            parent.stat.pzxid = zxid;
        }

        let stat = Stat {
            czxid: zxid,
            mzxid: zxid,
            pzxid: zxid,
            ephemeral_owner: if mode.is_ephemeral() { session_id } else { 0 },
            data_length: data.len() as i32,
            ..Stat::default()
        };
        self.nodes.insert(
            created.clone(),
            Znode {
                data: Bytes::copy_from_slice(data),
                stat,
                children: BTreeSet::new(),
            },
        );

        triggers.push((WatchEventKind::Created, created.clone()));
        triggers.push((WatchEventKind::ChildrenChanged, parent_path.to_string()));
        Ok(created)
    }

    fn remove(
        &mut self,
        path: &str,
        version: i32,
        triggers: &mut Vec<Trigger>,
    ) -> Result<(), ErrorCode> {
        validate_path(path)?;
        if path == "/" {
            return Err(ErrorCode::BadArguments);
        }
        let node = self.nodes.get(path).ok_or(ErrorCode::NoNode)?;
        if version != -1 && version != node.stat.version {
            return Err(ErrorCode::BadVersion);
        }
        if !node.children.is_empty() {
            return Err(ErrorCode::NotEmpty);
        }

        self.nodes.remove(path);
        self.zxid += 1;
        let parent_path = parent_of(path);
        let name = path[parent_path.len()..].trim_start_matches('/');
        if let Some(parent) = self.nodes.get_mut(parent_path) {
            parent.children.remove(name);
            parent.stat.cversion += 1;
            parent.stat.num_children -= 1;
            parent.stat.pzxid = self.zxid;
        }

        triggers.push((WatchEventKind::Deleted, path.to_string()));
        triggers.push((WatchEventKind::ChildrenChanged, parent_path.to_string()));
        Ok(())
    }

    fn set(
        &mut self,
        path: &str,
        data: &[u8],
        version: i32,
        triggers: &mut Vec<Trigger>,
    ) -> Result<Stat, ErrorCode> {
        validate_path(path)?;
        let zxid = self.zxid + 1;
        let node = self.nodes.get_mut(path).ok_or(ErrorCode::NoNode)?;
        if version != -1 && version != node.stat.version {
            return Err(ErrorCode::BadVersion);
        }

        self.zxid = zxid;
        node.data = Bytes::copy_from_slice(data);
        node.stat.version += 1;
        node.stat.mzxid = zxid;
        node.stat.data_length = data.len() as i32;

        triggers.push((WatchEventKind::DataChanged, path.to_string()));
        Ok(node.stat)
    }

    fn check(&self, path: &str, version: i32) -> Result<(), ErrorCode> {
        let node = self.node(path)?;
        if version != -1 && version != node.stat.version {
            return Err(ErrorCode::BadVersion);
        }
        Ok(())
    }

    fn get(&self, path: &str) -> Result<Node, ErrorCode> {
        self.node(path).map(|node| Node {
            data: node.data.clone(),
            stat: node.stat,
        })
    }

    fn children(&self, path: &str, list: ListRequestType) -> Result<(Vec<String>, Stat), ErrorCode> {
        let node = self.node(path)?;
        let names = node
            .children
            .iter()
            .filter(|name| {
                let owner = self
                    .nodes
                    .get(&join(path, name))
                    .map_or(0, |child| child.stat.ephemeral_owner);
                match list {
                    ListRequestType::All => true,
                    ListRequestType::PersistentOnly => owner == 0,
                    ListRequestType::EphemeralOnly => owner != 0,
                }
            })
            .cloned()
            .collect();
        Ok((names, node.stat))
    }

    /// Applies a transaction all-or-nothing.
    fn multi(
        &mut self,
        requests: &[Request],
        session_id: i64,
        triggers: &mut Vec<Trigger>,
    ) -> MultiResponse {
        let mut staged = self.clone();
        let mut staged_triggers = Vec::new();
        let mut responses = Vec::with_capacity(requests.len());

        for (index, request) in requests.iter().enumerate() {
            let result = match request {
                Request::Create { path, data, mode } => staged
                    .create(path, data, *mode, session_id, &mut staged_triggers)
                    .map(|path_created| Response::Create { path_created }),
                Request::Remove { path, version } => staged
                    .remove(path, *version, &mut staged_triggers)
                    .map(|()| Response::Remove),
                Request::Set {
                    path,
                    data,
                    version,
                } => staged
                    .set(path, data, *version, &mut staged_triggers)
                    .map(|stat| Response::Set { stat }),
                Request::Check { path, version } => {
                    staged.check(path, *version).map(|()| Response::Check)
                }
            };

            match result {
                Ok(response) => responses.push(response),
                Err(error) => {
                    let responses = (0..requests.len())
                        .map(|i| Response::Error {
                            error: if i == index {
                                error
                            } else {
                                ErrorCode::RuntimeInconsistency
                            },
                        })
                        .collect();
                    return MultiResponse { error, responses };
                }
            }
        }

        *self = staged;
        triggers.extend(staged_triggers);
        MultiResponse {
            error: ErrorCode::Ok,
            responses,
        }
    }

    /// Removes every node owned by `session_id`.
    fn drop_session(&mut self, session_id: i64, triggers: &mut Vec<Trigger>) {
        let owned: Vec<String> = self
            .nodes
            .iter()
            .filter(|(_, node)| node.stat.ephemeral_owner == session_id)
            .map(|(path, _)| path.clone())
            .collect();
        for path in owned {
            // Ephemeral nodes are always leaves.
            let _ = self.remove(&path, -1, triggers);
        }
    }
}

fn validate_path(path: &str) -> Result<(), ErrorCode> {
    if !path.starts_with('/') {
        return Err(ErrorCode::BadArguments);
    }
    if path != "/" && (path.ends_with('/') || path.contains("//")) {
        return Err(ErrorCode::BadArguments);
    }
    Ok(())
}

fn parent_of(path: &str) -> &str {
    match path.rfind('/') {
        Some(0) | None => "/",
        Some(index) => &path[..index],
    }
}

// ============================================================================
// Watches
// ============================================================================

#[derive(Default)]
struct Watches {
    data: HashMap<String, Vec<WatchCallback>>,
    children: HashMap<String, Vec<WatchCallback>>,
}

impl Watches {
    /// Removes the watches the triggers fire, paired with their events.
    fn take(&mut self, triggers: &[Trigger]) -> Vec<(WatchCallback, WatchEvent)> {
        let mut fired = Vec::new();
        for (kind, path) in triggers {
            let mut sources = Vec::new();
            match kind {
                WatchEventKind::Created | WatchEventKind::DataChanged => sources.push(&mut self.data),
                WatchEventKind::ChildrenChanged => sources.push(&mut self.children),
                WatchEventKind::Deleted => {
                    sources.push(&mut self.data);
                    sources.push(&mut self.children);
                }
                WatchEventKind::SessionExpired => {}
            }
            for source in sources {
                for callback in source.remove(path).unwrap_or_default() {
                    let event = WatchEvent {
                        kind: *kind,
                        path: path.clone(),
                    };
                    fired.push((callback, event));
                }
            }
        }
        fired
    }
}

// ============================================================================
// Server
// ============================================================================

struct ServerState {
    tree: Tree,
    watches: Watches,
    next_session_id: i64,
}

/// A coordination tree shared by every session connected to it.
#[derive(Clone)]
pub struct MemoryServer {
    state: Arc<Mutex<ServerState>>,
}

impl MemoryServer {
    /// Creates a server holding only the root node.
    pub fn new() -> Self {
        Self {
            state: Arc::new(Mutex::new(ServerState {
                tree: Tree::new(),
                watches: Watches::default(),
                next_session_id: 1,
            })),
        }
    }

    /// Opens a new session with every feature flag enabled.
    pub fn connect(&self) -> MemoryClient {
        self.connect_with_features(FeatureFlag::ALL)
    }

    /// Opens a new session advertising only `features`.
    pub fn connect_with_features(
        &self,
        features: impl IntoIterator<Item = FeatureFlag>,
    ) -> MemoryClient {
        let session_id = {
            let mut state = self.lock();
            let id = state.next_session_id;
            state.next_session_id += 1;
            id
        };
        tracing::debug!(session_id, "memory session opened");
        MemoryClient {
            server: self.clone(),
            session_id,
            expired: AtomicBool::new(false),
            features: features.into_iter().collect(),
            calls: Mutex::new(Vec::new()),
            sabotage: Mutex::new(VecDeque::new()),
        }
    }

    /// Whether `path` exists. Not recorded in any session's call log.
    pub fn exists(&self, path: &str) -> bool {
        self.lock().tree.nodes.contains_key(path)
    }

    /// Reads `path` directly. Not recorded in any session's call log.
    pub fn node(&self, path: &str) -> Option<Node> {
        self.lock().tree.get(path).ok()
    }

    /// Child names of `path`, empty if it does not exist.
    pub fn children(&self, path: &str) -> Vec<String> {
        self.lock()
            .tree
            .children(path, ListRequestType::All)
            .map(|(names, _)| names)
            .unwrap_or_default()
    }

    /// Number of nodes, including the root.
    pub fn node_count(&self) -> usize {
        self.lock().tree.nodes.len()
    }

    fn lock(&self) -> MutexGuard<'_, ServerState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Runs `f` under the lock, then fires the watches it triggered.
    fn mutate<R>(&self, f: impl FnOnce(&mut Tree, &mut Vec<Trigger>) -> R) -> R {
        let mut triggers = Vec::new();
        let (result, fired) = {
            let mut state = self.lock();
            let result = f(&mut state.tree, &mut triggers);
            let fired = state.watches.take(&triggers);
            (result, fired)
        };
        for (callback, event) in fired {
            callback(event);
        }
        result
    }

    fn read<R>(&self, f: impl FnOnce(&Tree) -> R) -> R {
        f(&self.lock().tree)
    }

    fn watch_data(&self, path: &str, watch: WatchCallback) {
        self.lock()
            .watches
            .data
            .entry(path.to_string())
            .or_default()
            .push(watch);
    }

    fn watch_children(&self, path: &str, watch: WatchCallback) {
        self.lock()
            .watches
            .children
            .entry(path.to_string())
            .or_default()
            .push(watch);
    }
}

impl Default for MemoryServer {
    fn default() -> Self {
        Self::new()
    }
}

// ============================================================================
// Session
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Sabotage {
    Fail(ErrorCode),
    TruncateMulti,
}

/// One session against a [`MemoryServer`].
pub struct MemoryClient {
    server: MemoryServer,
    session_id: i64,
    expired: AtomicBool,
    features: HashSet<FeatureFlag>,
    calls: Mutex<Vec<&'static str>>,
    sabotage: Mutex<VecDeque<Sabotage>>,
}

impl MemoryClient {
    pub fn server(&self) -> &MemoryServer {
        &self.server
    }

    /// Number of trait calls this session has received.
    pub fn call_count(&self) -> usize {
        self.calls.lock().unwrap_or_else(PoisonError::into_inner).len()
    }

    /// Names of the trait calls this session has received, in order.
    pub fn calls(&self) -> Vec<&'static str> {
        self.calls.lock().unwrap_or_else(PoisonError::into_inner).clone()
    }

    /// Ends the session: owned ephemeral nodes vanish and every later call
    /// fails with `SessionExpired`.
    pub fn expire(&self) {
        self.expired.store(true, Ordering::SeqCst);
        let session_id = self.session_id;
        self.server
            .mutate(|tree, triggers| tree.drop_session(session_id, triggers));
        tracing::debug!(session_id, "memory session expired");
    }

    /// Makes the next call fail natively with `code`, whatever its contract.
    pub fn fail_next(&self, code: ErrorCode) {
        self.push_sabotage(Sabotage::Fail(code));
    }

    /// Makes the next committed transaction report one response fewer than
    /// it had requests.
    pub fn truncate_next_multi(&self) {
        self.push_sabotage(Sabotage::TruncateMulti);
    }

    fn push_sabotage(&self, sabotage: Sabotage) {
        self.sabotage
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push_back(sabotage);
    }

    /// Records the call and applies session state and pending failures.
    fn enter(&self, method: &'static str) -> KeeperResult<()> {
        self.calls
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(method);

        if self.expired.load(Ordering::SeqCst) {
            return Err(KeeperError::new(
                ErrorCode::SessionExpired,
                format!("session {} expired", self.session_id),
            ));
        }

        let mut sabotage = self.sabotage.lock().unwrap_or_else(PoisonError::into_inner);
        if let Some(Sabotage::Fail(code)) = sabotage.front().copied() {
            sabotage.pop_front();
            return Err(KeeperError::new(code, format!("injected by test in {method}")));
        }
        Ok(())
    }

    fn take_truncation(&self) -> bool {
        let mut sabotage = self.sabotage.lock().unwrap_or_else(PoisonError::into_inner);
        if sabotage.front() == Some(&Sabotage::TruncateMulti) {
            sabotage.pop_front();
            return true;
        }
        false
    }

    fn apply_multi(&self, requests: &[Request]) -> MultiResponse {
        let session_id = self.session_id;
        let mut response = self
            .server
            .mutate(|tree, triggers| tree.multi(requests, session_id, triggers));
        if response.error.is_ok() && self.take_truncation() {
            response.responses.pop();
        }
        response
    }

    fn read_list(&self, path: &str, list: ListRequestType) -> ListResponse {
        match self.server.read(|tree| tree.children(path, list)) {
            Ok((names, stat)) => ListResponse {
                error: ErrorCode::Ok,
                names,
                stat: Some(stat),
            },
            Err(error) => ListResponse {
                error,
                ..ListResponse::default()
            },
        }
    }

    fn read_node(&self, path: &str) -> GetResponse {
        match self.server.read(|tree| tree.get(path)) {
            Ok(node) => GetResponse {
                error: ErrorCode::Ok,
                node: Some(node),
            },
            Err(error) => GetResponse { error, node: None },
        }
    }
}

/// Splits a tree result into the try-form shape: listed codes are values,
/// anything else is raised.
fn recoverable<T>(
    result: Result<T, ErrorCode>,
    listed: &[ErrorCode],
    path: &str,
) -> KeeperResult<Result<T, ErrorCode>> {
    match result {
        Err(code) if !listed.contains(&code) => Err(KeeperError::from_path(code, path)),
        other => Ok(other),
    }
}

fn missing_is_none<T>(result: Result<T, ErrorCode>, path: &str) -> KeeperResult<Option<T>> {
    match result {
        Ok(value) => Ok(Some(value)),
        Err(ErrorCode::NoNode) => Ok(None),
        Err(code) => Err(KeeperError::from_path(code, path)),
    }
}

impl CoordinationClient for MemoryClient {
    fn session_id(&self) -> i64 {
        self.session_id
    }

    fn expired(&self) -> bool {
        self.expired.load(Ordering::SeqCst)
    }

    fn is_feature_enabled(&self, flag: FeatureFlag) -> bool {
        self.features.contains(&flag)
    }

    fn try_get(&self, path: &str) -> KeeperResult<Option<Node>> {
        self.enter("try_get")?;
        missing_is_none(self.server.read(|tree| tree.get(path)), path)
    }

    fn try_get_watch(&self, path: &str, watch: WatchCallback) -> KeeperResult<Option<Node>> {
        self.enter("try_get_watch")?;
        let node = missing_is_none(self.server.read(|tree| tree.get(path)), path)?;
        self.server.watch_data(path, watch);
        Ok(node)
    }

    fn get_many(&self, paths: &[String]) -> KeeperResult<Vec<GetResponse>> {
        self.enter("get_many")?;
        paths
            .iter()
            .map(|path| {
                let response = self.read_node(path);
                if response.error.is_ok() {
                    Ok(response)
                } else {
                    Err(KeeperError::from_path(response.error, path))
                }
            })
            .collect()
    }

    fn try_get_many(&self, paths: &[String]) -> KeeperResult<Vec<GetResponse>> {
        self.enter("try_get_many")?;
        paths
            .iter()
            .map(|path| {
                let response = self.read_node(path);
                match response.error {
                    ErrorCode::Ok | ErrorCode::NoNode => Ok(response),
                    code => Err(KeeperError::from_path(code, path)),
                }
            })
            .collect()
    }

    fn exists(&self, path: &str) -> KeeperResult<Option<Stat>> {
        self.enter("exists")?;
        missing_is_none(self.server.read(|tree| tree.node(path).map(|n| n.stat)), path)
    }

    fn exists_many(&self, paths: &[String]) -> KeeperResult<Vec<ExistsResponse>> {
        self.enter("exists_many")?;
        paths
            .iter()
            .map(|path| match self.server.read(|tree| tree.node(path).map(|n| n.stat)) {
                Ok(stat) => Ok(ExistsResponse {
                    error: ErrorCode::Ok,
                    stat: Some(stat),
                }),
                Err(ErrorCode::NoNode) => Ok(ExistsResponse {
                    error: ErrorCode::NoNode,
                    stat: None,
                }),
                Err(code) => Err(KeeperError::from_path(code, path)),
            })
            .collect()
    }

    fn try_get_children(
        &self,
        path: &str,
        list: ListRequestType,
    ) -> KeeperResult<Option<Vec<String>>> {
        self.enter("try_get_children")?;
        missing_is_none(
            self.server.read(|tree| tree.children(path, list)).map(|(names, _)| names),
            path,
        )
    }

    fn try_get_children_watch(
        &self,
        path: &str,
        list: ListRequestType,
        watch: WatchCallback,
    ) -> KeeperResult<Option<Vec<String>>> {
        self.enter("try_get_children_watch")?;
        let names = missing_is_none(
            self.server.read(|tree| tree.children(path, list)).map(|(names, _)| names),
            path,
        )?;
        if names.is_some() {
            self.server.watch_children(path, watch);
        }
        Ok(names)
    }

    fn get_children_many(
        &self,
        paths: &[String],
        list: ListRequestType,
    ) -> KeeperResult<Vec<ListResponse>> {
        self.enter("get_children_many")?;
        paths
            .iter()
            .map(|path| {
                let response = self.read_list(path, list);
                if response.error.is_ok() {
                    Ok(response)
                } else {
                    Err(KeeperError::from_path(response.error, path))
                }
            })
            .collect()
    }

    fn try_get_children_many(
        &self,
        paths: &[String],
        list: ListRequestType,
    ) -> KeeperResult<Vec<ListResponse>> {
        self.enter("try_get_children_many")?;
        paths
            .iter()
            .map(|path| {
                let response = self.read_list(path, list);
                match response.error {
                    ErrorCode::Ok | ErrorCode::NoNode => Ok(response),
                    code => Err(KeeperError::from_path(code, path)),
                }
            })
            .collect()
    }

    fn sync(&self, path: &str) -> KeeperResult<String> {
        self.enter("sync")?;
        validate_path(path).map_err(|code| KeeperError::from_path(code, path))?;
        Ok(path.to_string())
    }

    fn wait_for_disappear(&self, path: &str) -> KeeperResult<bool> {
        self.enter("wait_for_disappear")?;
        // Nothing else can delete the node while this thread waits, so a
        // present node means the wait would never end.
        Ok(!self.server.exists(path))
    }

    fn try_create(
        &self,
        path: &str,
        data: &[u8],
        mode: CreateMode,
    ) -> KeeperResult<Result<String, ErrorCode>> {
        self.enter("try_create")?;
        let session_id = self.session_id;
        let result = self
            .server
            .mutate(|tree, triggers| tree.create(path, data, mode, session_id, triggers));
        recoverable(result, TRY_CREATE_RECOVERABLE, path)
    }

    fn try_set(
        &self,
        path: &str,
        data: &[u8],
        version: i32,
    ) -> KeeperResult<Result<Stat, ErrorCode>> {
        self.enter("try_set")?;
        let result = self
            .server
            .mutate(|tree, triggers| tree.set(path, data, version, triggers));
        recoverable(result, TRY_SET_RECOVERABLE, path)
    }

    fn try_remove(&self, path: &str, version: i32) -> KeeperResult<Result<(), ErrorCode>> {
        self.enter("try_remove")?;
        let result = self
            .server
            .mutate(|tree, triggers| tree.remove(path, version, triggers));
        recoverable(result, TRY_REMOVE_RECOVERABLE, path)
    }

    fn try_multi(&self, requests: &[Request]) -> KeeperResult<MultiResponse> {
        self.enter("try_multi")?;
        let response = self.apply_multi(requests);
        if response.error.is_ok() || response.error.is_user() {
            Ok(response)
        } else {
            let path = requests.first().map_or("", Request::path);
            Err(KeeperError::from_path(response.error, path))
        }
    }

    fn try_multi_no_throw(&self, requests: &[Request]) -> MultiResponse {
        if let Err(err) = self.enter("try_multi_no_throw") {
            return MultiResponse::failed(requests, err.code());
        }
        self.apply_multi(requests)
    }

    fn exists_async(
        &self,
        path: &str,
        watch: Option<WatchCallback>,
        callback: ResponseCallback<ExistsResponse>,
    ) {
        let response = match self.enter("exists_async") {
            Err(err) => ExistsResponse {
                error: err.code(),
                stat: None,
            },
            Ok(()) => {
                let result = self.server.read(|tree| tree.node(path).map(|n| n.stat));
                if let Some(watch) = watch {
                    self.server.watch_data(path, watch);
                }
                match result {
                    Ok(stat) => ExistsResponse {
                        error: ErrorCode::Ok,
                        stat: Some(stat),
                    },
                    Err(error) => ExistsResponse { error, stat: None },
                }
            }
        };
        callback(response);
    }

    fn get_async(&self, path: &str, callback: ResponseCallback<GetResponse>) {
        let response = match self.enter("get_async") {
            Err(err) => GetResponse {
                error: err.code(),
                node: None,
            },
            Ok(()) => self.read_node(path),
        };
        callback(response);
    }

    fn create_async(
        &self,
        path: &str,
        data: &[u8],
        mode: CreateMode,
        callback: ResponseCallback<CreateResponse>,
    ) {
        let response = match self.enter("create_async") {
            Err(err) => CreateResponse {
                error: err.code(),
                path_created: String::new(),
            },
            Ok(()) => {
                let session_id = self.session_id;
                match self
                    .server
                    .mutate(|tree, triggers| tree.create(path, data, mode, session_id, triggers))
                {
                    Ok(path_created) => CreateResponse {
                        error: ErrorCode::Ok,
                        path_created,
                    },
                    Err(error) => CreateResponse {
                        error,
                        path_created: String::new(),
                    },
                }
            }
        };
        callback(response);
    }

    fn remove_async(&self, path: &str, version: i32, callback: ResponseCallback<RemoveResponse>) {
        let error = match self.enter("remove_async") {
            Err(err) => err.code(),
            Ok(()) => match self
                .server
                .mutate(|tree, triggers| tree.remove(path, version, triggers))
            {
                Ok(()) => ErrorCode::Ok,
                Err(code) => code,
            },
        };
        callback(RemoveResponse { error });
    }

    fn multi_async(&self, requests: &[Request], callback: ResponseCallback<MultiResponse>) {
        let response = match self.enter("multi_async") {
            Err(err) => MultiResponse::failed(requests, err.code()),
            Ok(()) => self.apply_multi(requests),
        };
        callback(response);
    }
}

impl Drop for MemoryClient {
    fn drop(&mut self) {
        if !self.expired.load(Ordering::SeqCst) {
            let session_id = self.session_id;
            self.server
                .mutate(|tree, triggers| tree.drop_session(session_id, triggers));
        }
    }
}
