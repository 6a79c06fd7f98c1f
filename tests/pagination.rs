//! Purpose: End-to-end tests for paginated queries and cursors.
//! Exports: None (integration test module).
//! Role: Validate page sizing, bookmark threading, policy reapplication, and resume.
//! Invariants: Configuration errors happen before any stream request.

mod common;

use common::{MemoryCluster, init_tracing, records};
use tessera::api::{Client, ErrorKind, QueryPolicy, Record, UdfCall};

fn client(count: usize) -> Client<MemoryCluster> {
    init_tracing();
    Client::new(MemoryCluster::new().with_records(records(count)))
}

#[tokio::test]
async fn seven_records_in_pages_of_two() {
    let client = client(7);
    let mut query = client
        .query("test", Some("demo"))
        .paginate(true)
        .max_records(2);
    assert!(query.has_next_page());

    let mut sizes = Vec::new();
    let mut paged: Vec<Record> = Vec::new();
    while query.has_next_page() {
        let page = query.results().await.expect("page");
        sizes.push(page.len());
        paged.extend(page);
        if sizes.len() < 4 {
            assert!(query.has_next_page(), "page {} should not be last", sizes.len());
        }
    }
    assert_eq!(sizes, vec![2, 2, 2, 1]);
    assert!(!query.has_next_page());
    assert!(query.results().await.expect("after end").is_empty());

    let full = client
        .query("test", Some("demo"))
        .results()
        .await
        .expect("full");
    assert_eq!(paged, full);
}

#[tokio::test]
async fn every_page_carries_the_same_policy_and_the_previous_bookmark() {
    let client = client(5);
    let policy = QueryPolicy {
        ttl: Some(300),
        records_per_second: 50,
        ..QueryPolicy::default()
    };
    let mut query = client
        .scan("test", Some("demo"))
        .with_policy(policy.clone())
        .paginate(true)
        .max_records(2);
    let mut ends = Vec::new();
    while query.has_next_page() {
        query.next_page().await.expect("page");
        ends.push(query.saved_state().map(|state| state.bookmark().clone()));
    }

    let requests = client.cluster().stream_requests();
    assert_eq!(requests.len(), 3);
    for (index, request) in requests.iter().enumerate() {
        assert_eq!(request.policy, policy);
        let page = request.page.as_ref().expect("page request");
        assert_eq!(page.max_records, 2);
        let expected = if index == 0 { None } else { ends[index - 1].clone() };
        assert_eq!(page.bookmark, expected);
    }
    assert_eq!(ends.last(), Some(&None));
}

#[tokio::test]
async fn aggregation_and_pagination_fail_fast() {
    let client = client(4);
    let mut query = client
        .query("test", Some("demo"))
        .apply(UdfCall::new("stats", "sum", vec![]))
        .paginate(true)
        .max_records(2);

    let err = query.results().await.expect_err("usage");
    assert_eq!(err.kind(), ErrorKind::Usage);
    assert!(err.message().expect("message").contains("pagination"));
    assert_eq!(query.cursor().err().expect("usage").kind(), ErrorKind::Usage);
    assert_eq!(query.validate().expect_err("usage").kind(), ErrorKind::Usage);
    assert!(client.cluster().stream_requests().is_empty());
}

#[tokio::test]
async fn pagination_without_page_size_is_rejected() {
    let client = client(4);
    let mut query = client.query("test", None).paginate(true);
    let err = query.next_page().await.expect_err("usage");
    assert_eq!(err.kind(), ErrorKind::Usage);
    assert!(client.cluster().stream_requests().is_empty());
}

#[tokio::test]
async fn saved_state_resumes_in_a_new_query() {
    let client = client(6);
    let mut first = client
        .query("test", Some("demo"))
        .paginate(true)
        .max_records(4);
    let page = first.next_page().await.expect("page");
    assert_eq!(page.items.len(), 4);
    assert!(page.has_more);
    let saved = first.saved_state().cloned().expect("state");

    let mut resumed = client
        .query("test", Some("demo"))
        .paginate(true)
        .max_records(4)
        .query_state(saved.clone());
    let rest = resumed.next_page().await.expect("page");
    assert_eq!(rest.items.len(), 2);
    assert!(!rest.has_more);

    let mut foreign = client
        .scan("test", Some("demo"))
        .paginate(true)
        .max_records(4)
        .query_state(saved);
    let err = foreign.next_page().await.expect_err("usage");
    assert_eq!(err.kind(), ErrorKind::Usage);
}

#[tokio::test]
async fn standalone_cursor_drains_all_pages() {
    let client = client(9);
    let query = client.query("test", Some("demo")).max_records(4);
    let mut cursor = query.cursor().expect("cursor");
    assert_eq!(cursor.max_records(), 4);
    let all = cursor.results().await.expect("results");
    assert_eq!(all.len(), 9);
    assert!(!cursor.has_next_page());
    assert_eq!(client.cluster().stream_requests().len(), 3);
}

#[tokio::test]
async fn config_page_size_applies_to_new_queries() {
    init_tracing();
    let config = tessera::api::ClientConfig::from_json(r#"{"max_records_per_page": 3}"#)
        .expect("config");
    let client = Client::new(MemoryCluster::new().with_records(records(7))).with_config(config);
    let mut query = client.query("test", Some("demo")).paginate(true);
    let page = query.next_page().await.expect("page");
    assert_eq!(page.items.len(), 3);
}
