//! End-to-end tests for `SearchOrchestrator` with a mocked Places API.

use std::sync::Arc;
use std::time::Duration;

use anyhow::anyhow;
use async_trait::async_trait;
use serde_json::json;
use wiremock::matchers::{method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

use placefinder_core::{Coordinates, SearchRequest};
use placefinder_places::{
    CancellationToken, CoordinateGeocoder, Geocoder, HistoryStore, MemoryHistoryStore,
    PagingPolicy, PlacesClient, RetryPolicy, SearchError, SearchOrchestrator, SearchOutcome,
    SearchSettings,
};

const AUSTIN: &str = "30.2672,-97.7431";

struct FailingGeocoder;

#[async_trait]
impl Geocoder for FailingGeocoder {
    async fn geocode(&self, _location_text: &str) -> anyhow::Result<Vec<Coordinates>> {
        Err(anyhow!("geocoder unreachable"))
    }
}

fn test_client(server: &MockServer) -> PlacesClient {
    PlacesClient::with_base_url("test-key", 5, "placefinder-test/0.1", &server.uri())
        .expect("failed to build test PlacesClient")
}

fn fast_settings() -> SearchSettings {
    SearchSettings {
        retry: RetryPolicy::new(3, Duration::ZERO),
        paging: PagingPolicy {
            settle_delay: Duration::ZERO,
            inter_page_delay: Duration::ZERO,
            ..PagingPolicy::default()
        },
        deadline: None,
        ..SearchSettings::default()
    }
}

fn orchestrator(server: &MockServer, settings: SearchSettings) -> SearchOrchestrator {
    SearchOrchestrator::new(test_client(server), Arc::new(CoordinateGeocoder), settings)
}

async fn mount_search(server: &MockServer, count: usize) {
    let results: Vec<serde_json::Value> = (0..count)
        .map(|n| json!({"place_id": format!("p{n}"), "name": format!("Stub {n}")}))
        .collect();
    Mock::given(method("GET"))
        .and(path("/textsearch/json"))
        .respond_with(
            ResponseTemplate::new(200).set_body_json(&json!({"status": "OK", "results": results})),
        )
        .mount(server)
        .await;
}

async fn mount_all_details(server: &MockServer, delay: Option<Duration>) {
    let mut template = ResponseTemplate::new(200).set_body_json(&json!({
        "status": "OK",
        "result": {"name": "Detailed", "formatted_address": "1 Main St"}
    }));
    if let Some(delay) = delay {
        template = template.set_delay(delay);
    }
    Mock::given(method("GET"))
        .and(path("/details/json"))
        .respond_with(template)
        .mount(server)
        .await;
}

#[tokio::test]
async fn unknown_location_fails_before_any_search_request() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/textsearch/json"))
        .respond_with(ResponseTemplate::new(200).set_body_json(&json!({"status": "OK"})))
        .expect(0)
        .mount(&server)
        .await;

    let request = SearchRequest::new("coffee shop", "Atlantis", None);
    let result = orchestrator(&server, fast_settings()).run(&request).await;

    assert!(
        matches!(result, Err(SearchError::LocationNotFound { ref location, .. }) if location == "Atlantis"),
        "expected LocationNotFound, got {result:?}"
    );
}

#[tokio::test]
async fn geocoder_failure_surfaces_as_geocoding_error() {
    let server = MockServer::start().await;
    let orchestrator =
        SearchOrchestrator::new(test_client(&server), Arc::new(FailingGeocoder), fast_settings());

    let result = orchestrator
        .run(&SearchRequest::new("coffee shop", AUSTIN, None))
        .await;

    match result {
        Err(SearchError::Geocoding { message }) => assert!(message.contains("unreachable")),
        other => panic!("expected Geocoding error, got {other:?}"),
    }
}

#[tokio::test]
async fn full_flow_returns_enriched_results_and_records_history() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/textsearch/json"))
        .and(query_param("query", "coffee shop"))
        .and(query_param("location", AUSTIN))
        .and(query_param("radius", "50000"))
        .and(query_param("key", "test-key"))
        .respond_with(ResponseTemplate::new(200).set_body_json(&json!({
            "status": "OK",
            "results": [
                {"place_id": "p0", "name": "Stub 0"},
                {"place_id": "p1", "name": "Stub 1"},
                {"place_id": "p2", "name": "Stub 2"}
            ]
        })))
        .expect(1)
        .mount(&server)
        .await;
    mount_all_details(&server, None).await;

    let history = Arc::new(MemoryHistoryStore::new());
    let orchestrator = orchestrator(&server, fast_settings()).with_history(history.clone());

    let outcome = orchestrator
        .run(&SearchRequest::new("coffee shop", AUSTIN, Some(3)))
        .await
        .expect("search should succeed");

    assert!(matches!(outcome, SearchOutcome::Complete(_)));
    assert_eq!(outcome.results().len(), 3);
    assert_eq!(outcome.results()[0].address, "1 Main St");

    // History is written on a detached task.
    let mut saved = Vec::new();
    for _ in 0..50 {
        saved = history.list().await.expect("list history");
        if !saved.is_empty() {
            break;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    assert_eq!(saved.len(), 1);
    assert_eq!(saved[0].query, "coffee shop");
    assert_eq!(saved[0].location, AUSTIN);
    assert_eq!(saved[0].result_count, 3);
}

#[tokio::test]
async fn zero_results_is_no_results_outcome() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/textsearch/json"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(&json!({"status": "ZERO_RESULTS", "results": []})),
        )
        .mount(&server)
        .await;

    let outcome = orchestrator(&server, fast_settings())
        .run(&SearchRequest::new("unicorn stables", AUSTIN, None))
        .await
        .expect("no results is not an error");

    assert_eq!(outcome, SearchOutcome::NoResults);
}

#[tokio::test]
async fn every_detail_failing_is_no_results_outcome() {
    let server = MockServer::start().await;
    mount_search(&server, 3).await;
    Mock::given(method("GET"))
        .and(path("/details/json"))
        .respond_with(ResponseTemplate::new(200).set_body_json(&json!({"status": "NOT_FOUND"})))
        .mount(&server)
        .await;

    let outcome = orchestrator(&server, fast_settings())
        .run(&SearchRequest::new("coffee shop", AUSTIN, None))
        .await
        .expect("enrichment failures are not errors");

    assert_eq!(outcome, SearchOutcome::NoResults);
}

#[tokio::test]
async fn provider_error_hides_raw_status() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/textsearch/json"))
        .respond_with(ResponseTemplate::new(200).set_body_json(&json!({
            "status": "REQUEST_DENIED",
            "error_message": "The provided API key is invalid."
        })))
        .mount(&server)
        .await;

    let result = orchestrator(&server, fast_settings())
        .run(&SearchRequest::new("coffee shop", AUSTIN, None))
        .await;

    let err = result.expect_err("provider failure expected");
    assert!(matches!(err, SearchError::Provider(_)));
    assert!(!err.to_string().contains("REQUEST_DENIED"));
}

#[tokio::test]
async fn pre_cancelled_run_is_cancelled() {
    let server = MockServer::start().await;
    mount_search(&server, 3).await;

    let cancel = CancellationToken::new();
    cancel.cancel();
    let result = orchestrator(&server, fast_settings())
        .run_with_cancel(&SearchRequest::new("coffee shop", AUSTIN, None), &cancel)
        .await;

    assert!(matches!(result, Err(SearchError::Cancelled)));
}

#[tokio::test]
async fn deadline_during_enrichment_returns_partial_results() {
    let server = MockServer::start().await;
    mount_search(&server, 7).await;
    // Batch one answers at once; batch two outlives the deadline.
    for n in 0..5 {
        Mock::given(method("GET"))
            .and(path("/details/json"))
            .and(query_param("place_id", format!("p{n}")))
            .respond_with(ResponseTemplate::new(200).set_body_json(&json!({
                "status": "OK",
                "result": {"name": format!("Fast {n}")}
            })))
            .mount(&server)
            .await;
    }
    mount_all_details(&server, Some(Duration::from_secs(4))).await;

    let settings = SearchSettings {
        deadline: Some(Duration::from_secs(1)),
        ..fast_settings()
    };
    let outcome = orchestrator(&server, settings)
        .run(&SearchRequest::new("coffee shop", AUSTIN, None))
        .await
        .expect("deadline keeps the first batch");

    assert!(outcome.is_partial());
    let names: Vec<&str> = outcome.results().iter().map(|r| r.name.as_str()).collect();
    assert_eq!(names, vec!["Fast 0", "Fast 1", "Fast 2", "Fast 3", "Fast 4"]);
}

#[tokio::test]
async fn result_limit_bounds_final_list() {
    let server = MockServer::start().await;
    mount_search(&server, 20).await;
    mount_all_details(&server, None).await;

    let outcome = orchestrator(&server, fast_settings())
        .run(&SearchRequest::new("coffee shop", AUSTIN, Some(4)))
        .await
        .expect("search should succeed");

    assert_eq!(outcome.results().len(), 4);
}
