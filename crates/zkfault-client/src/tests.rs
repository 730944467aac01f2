//! Behavioral tests for the in-memory coordination tree.

use std::sync::{Arc, Mutex};

use proptest::prelude::*;
use test_case::test_case;

use crate::{
    CoordinationClient, CreateMode, ErrorCode, ListRequestType, MemoryServer, Request, Response,
    WatchEventKind,
};

fn session() -> (MemoryServer, crate::MemoryClient) {
    let server = MemoryServer::new();
    let client = server.connect();
    (server, client)
}

#[test]
fn create_get_set_remove_lifecycle() {
    let (server, client) = session();

    let created = client.create("/a", b"one", CreateMode::Persistent).unwrap();
    assert_eq!(created, "/a");

    let node = client.get("/a").unwrap();
    assert_eq!(&node.data[..], b"one");
    assert_eq!(node.stat.version, 0);

    let stat = client.set("/a", b"two", 0).unwrap();
    assert_eq!(stat.version, 1);
    assert_eq!(stat.data_length, 3);

    client.remove("/a", 1).unwrap();
    assert!(!server.exists("/a"));
    assert_eq!(client.try_get("/a").unwrap(), None);
}

#[test_case("/missing/child", CreateMode::Persistent => ErrorCode::NoNode; "missing parent")]
#[test_case("/a", CreateMode::Persistent => ErrorCode::NodeExists; "already exists")]
#[test_case("/e/child", CreateMode::Persistent => ErrorCode::NoChildrenForEphemerals; "ephemeral parent")]
fn try_create_returns_user_codes(path: &str, mode: CreateMode) -> ErrorCode {
    let (_server, client) = session();
    client.create("/a", b"", CreateMode::Persistent).unwrap();
    client.create("/e", b"", CreateMode::Ephemeral).unwrap();

    client.try_create(path, b"", mode).unwrap().unwrap_err()
}

#[test_case("relative"; "no leading slash")]
#[test_case("/trailing/"; "trailing slash")]
#[test_case("/double//slash"; "empty component")]
fn invalid_paths_are_raised(path: &str) {
    let (_server, client) = session();
    let err = client.try_create(path, b"", CreateMode::Persistent).unwrap_err();
    assert_eq!(err.code(), ErrorCode::BadArguments);
}

#[test]
fn version_mismatch_is_a_value_for_try_forms() {
    let (_server, client) = session();
    client.create("/a", b"", CreateMode::Persistent).unwrap();

    assert_eq!(client.try_set("/a", b"x", 7).unwrap(), Err(ErrorCode::BadVersion));
    assert_eq!(client.try_remove("/a", 7).unwrap(), Err(ErrorCode::BadVersion));
    assert_eq!(client.set("/a", b"x", 7).unwrap_err().code(), ErrorCode::BadVersion);
}

#[test]
fn remove_of_non_empty_node_reports_not_empty() {
    let (_server, client) = session();
    client.create("/a", b"", CreateMode::Persistent).unwrap();
    client.create("/a/b", b"", CreateMode::Persistent).unwrap();

    assert_eq!(client.try_remove("/a", -1).unwrap(), Err(ErrorCode::NotEmpty));
}

#[test]
fn sequential_nodes_use_parent_cversion() {
    let (_server, client) = session();
    client.create("/q", b"", CreateMode::Persistent).unwrap();

    let first = client.create("/q/n-", b"", CreateMode::PersistentSequential).unwrap();
    let second = client.create("/q/n-", b"", CreateMode::PersistentSequential).unwrap();

    assert_eq!(first, "/q/n-0000000000");
    assert_eq!(second, "/q/n-0000000001");
}

#[test]
fn expired_session_drops_its_ephemeral_nodes() {
    let (server, client) = session();
    let other = server.connect();
    client.create("/mine", b"", CreateMode::Ephemeral).unwrap();
    other.create("/theirs", b"", CreateMode::Ephemeral).unwrap();

    client.expire();

    assert!(client.expired());
    assert!(!server.exists("/mine"));
    assert!(server.exists("/theirs"));
    let err = client.exists("/theirs").unwrap_err();
    assert_eq!(err.code(), ErrorCode::SessionExpired);
}

#[test]
fn dropping_a_session_drops_its_ephemeral_nodes() {
    let server = MemoryServer::new();
    {
        let client = server.connect();
        client.create("/gone", b"", CreateMode::Ephemeral).unwrap();
        assert!(server.exists("/gone"));
    }
    assert!(!server.exists("/gone"));
}

#[test]
fn children_listing_filters_by_kind() {
    let (_server, client) = session();
    client.create("/p", b"", CreateMode::Persistent).unwrap();
    client.create("/p/durable", b"", CreateMode::Persistent).unwrap();
    client.create("/p/session", b"", CreateMode::Ephemeral).unwrap();

    let all = client.get_children("/p", ListRequestType::All).unwrap();
    assert_eq!(all, vec!["durable", "session"]);
    let ephemeral = client
        .get_children("/p", ListRequestType::EphemeralOnly)
        .unwrap();
    assert_eq!(ephemeral, vec!["session"]);
    let persistent = client
        .get_children("/p", ListRequestType::PersistentOnly)
        .unwrap();
    assert_eq!(persistent, vec!["durable"]);

    assert_eq!(
        client.try_get_children("/nope", ListRequestType::All).unwrap(),
        None
    );
}

#[test]
fn multi_is_all_or_nothing() {
    let (server, client) = session();
    let requests = vec![
        Request::create("/x", "", CreateMode::Persistent),
        Request::create("/x/y", "", CreateMode::Persistent),
        Request::remove("/absent", -1),
    ];

    let response = client.try_multi(&requests).unwrap();

    assert_eq!(response.error, ErrorCode::NoNode);
    assert_eq!(response.responses.len(), 3);
    assert_eq!(response.responses[2].error(), ErrorCode::NoNode);
    assert_eq!(
        response.responses[0].error(),
        ErrorCode::RuntimeInconsistency
    );
    assert!(!server.exists("/x"));
}

#[test]
fn committed_multi_reports_created_paths() {
    let (server, client) = session();
    let requests = vec![
        Request::create("/x", "", CreateMode::Persistent),
        Request::create("/x/e", "", CreateMode::Ephemeral),
        Request::check("/x", 0),
    ];

    let responses = client.multi(&requests).unwrap();

    assert_eq!(responses[0].created_path(), Some("/x"));
    assert_eq!(responses[1].created_path(), Some("/x/e"));
    assert_eq!(responses[2], Response::Check);
    assert!(server.exists("/x/e"));
}

#[test]
fn failed_multi_names_the_failing_op() {
    let (_server, client) = session();
    let requests = vec![Request::check("/", -1), Request::check("/absent", -1)];

    let err = client.multi(&requests).unwrap_err();

    assert_eq!(err.code(), ErrorCode::NoNode);
    assert!(err.message().contains("op #1"), "{}", err.message());
}

#[test]
fn truncated_multi_drops_last_response() {
    let (server, client) = session();
    client.truncate_next_multi();
    let requests = vec![
        Request::create("/a", "", CreateMode::Ephemeral),
        Request::create("/b", "", CreateMode::Ephemeral),
    ];

    let response = client.try_multi_no_throw(&requests);

    assert!(response.error.is_ok());
    assert_eq!(response.responses.len(), 1);
    assert!(server.exists("/b"));
}

#[test]
fn fail_next_applies_to_exactly_one_call() {
    let (_server, client) = session();
    client.fail_next(ErrorCode::ConnectionLoss);

    let err = client.exists("/").unwrap_err();
    assert_eq!(err.code(), ErrorCode::ConnectionLoss);
    assert!(client.exists("/").unwrap().is_some());
    assert_eq!(client.calls(), vec!["exists", "exists"]);
    assert_eq!(client.call_count(), 2);
}

#[test]
fn no_throw_multi_reports_native_failure_per_request() {
    let (_server, client) = session();
    client.fail_next(ErrorCode::OperationTimeout);
    let requests = vec![Request::check("/", -1), Request::check("/", -1)];

    let response = client.try_multi_no_throw(&requests);

    assert_eq!(response.error, ErrorCode::OperationTimeout);
    assert_eq!(response.responses.len(), 2);
}

#[test]
fn data_watch_fires_once_after_change() {
    let (_server, client) = session();
    client.create("/w", b"", CreateMode::Persistent).unwrap();
    let events = Arc::new(Mutex::new(Vec::new()));

    let sink = Arc::clone(&events);
    client
        .try_get_watch("/w", Box::new(move |event| sink.lock().unwrap().push(event)))
        .unwrap();
    client.set("/w", b"1", -1).unwrap();
    client.set("/w", b"2", -1).unwrap();

    let events = events.lock().unwrap();
    assert_eq!(events.len(), 1);
    assert_eq!(events[0].kind, WatchEventKind::DataChanged);
    assert_eq!(events[0].path, "/w");
}

#[test]
fn children_watch_fires_on_child_create() {
    let (_server, client) = session();
    client.create("/p", b"", CreateMode::Persistent).unwrap();
    let events = Arc::new(Mutex::new(Vec::new()));

    let sink = Arc::clone(&events);
    client
        .get_children_watch(
            "/p",
            ListRequestType::All,
            Box::new(move |event| sink.lock().unwrap().push(event.kind)),
        )
        .unwrap();
    client.create("/p/c", b"", CreateMode::Persistent).unwrap();

    assert_eq!(*events.lock().unwrap(), vec![WatchEventKind::ChildrenChanged]);
}

#[test]
fn async_callbacks_resolve_inline() {
    let (_server, client) = session();
    let seen = Arc::new(Mutex::new(None));

    let sink = Arc::clone(&seen);
    client.create_async(
        "/async",
        b"v",
        CreateMode::Persistent,
        Box::new(move |response| *sink.lock().unwrap() = Some(response)),
    );

    let response = seen.lock().unwrap().take().unwrap();
    assert_eq!(response.error, ErrorCode::Ok);
    assert_eq!(response.path_created, "/async");
}

#[test]
fn recursive_removal_clears_the_subtree() {
    let (server, client) = session();
    client.create_ancestors("/a/b/c/leaf").unwrap();
    client.create("/a/b/c/leaf", b"", CreateMode::Persistent).unwrap();
    client.create("/a/keep", b"", CreateMode::Persistent).unwrap();

    assert!(client.try_remove_children_recursive("/a", Some("keep")).unwrap());
    assert_eq!(server.children("/a"), vec!["keep"]);

    client.remove_recursive("/a").unwrap();
    assert_eq!(server.node_count(), 1);
}

#[test]
fn ancestor_ops_cover_only_missing_nodes() {
    let (_server, client) = session();
    client.create("/a", b"", CreateMode::Persistent).unwrap();

    let mut requests = Vec::new();
    client
        .check_exists_and_get_create_ancestors_ops("/a/b/c/d", &mut requests)
        .unwrap();

    let paths: Vec<&str> = requests.iter().map(Request::path).collect();
    assert_eq!(paths, vec!["/a/b", "/a/b/c"]);
}

#[test]
fn create_or_update_overwrites_existing_data() {
    let (server, client) = session();
    client.create_or_update("/c", b"first", CreateMode::Persistent).unwrap();
    client.create_or_update("/c", b"second", CreateMode::Persistent).unwrap();

    assert_eq!(&server.node("/c").unwrap().data[..], b"second");
}

#[test]
fn delete_ephemeral_if_content_matches_removes_own_node() {
    let (server, client) = session();
    client.create("/lock", b"me", CreateMode::Ephemeral).unwrap();

    client
        .delete_ephemeral_node_if_content_matches("/lock", b"me")
        .unwrap();

    assert!(!server.exists("/lock"));
}

#[test]
fn delete_ephemeral_with_foreign_content_fails() {
    let (server, client) = session();
    let owner = server.connect();
    owner.create("/lock", b"them", CreateMode::Ephemeral).unwrap();

    let err = client
        .delete_ephemeral_node_if_content_matches("/lock", b"me")
        .unwrap_err();

    assert_eq!(err.code(), ErrorCode::NodeExists);
    assert!(server.exists("/lock"));
}

proptest! {
    #[test]
    fn sequential_suffixes_are_unique_and_increasing(count in 1usize..20) {
        let (_server, client) = session();
        client.create("/seq", b"", CreateMode::Persistent).unwrap();

        let created: Vec<String> = (0..count)
            .map(|_| client.create("/seq/n", b"", CreateMode::PersistentSequential).unwrap())
            .collect();

        let mut sorted = created.clone();
        sorted.sort();
        sorted.dedup();
        prop_assert_eq!(sorted, created);
    }

    #[test]
    fn failed_multi_leaves_the_tree_untouched(names in proptest::collection::vec("[a-z]{1,6}", 1..6)) {
        let (server, client) = session();
        let before = server.node_count();

        let mut requests: Vec<Request> = names
            .iter()
            .map(|name| Request::create(format!("/{name}"), "", CreateMode::Persistent))
            .collect();
        requests.push(Request::check("/definitely/absent", -1));

        let response = client.try_multi(&requests).unwrap();
        prop_assert!(!response.error.is_ok());
        prop_assert_eq!(server.node_count(), before);
    }
}
