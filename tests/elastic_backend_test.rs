//! Elasticsearch backend tests against a mock HTTP server

use federated_search::federation::*;
use mockito::Matcher;
use serde_json::json;
use std::collections::BTreeSet;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};

fn backend(url: String, timeout_secs: u64) -> ElasticBackend {
    ElasticBackend::new(ElasticConfig {
        url,
        index: "sd".to_string(),
        timeout_secs,
    })
    .unwrap()
}

fn composed(repos: &[RepositoryId], stages: &[&str]) -> ComposedQuery {
    let composer = QueryComposer::new(Arc::new(FederationConfig::default()));
    let stages: BTreeSet<StageId> = stages.iter().map(|s| s.to_string()).collect();
    composer
        .compose(&SearchRequest::new(), repos, &stages, None)
        .unwrap()
}

/// Consume one HTTP request (headers plus Content-Length body)
async fn read_request(stream: &mut TcpStream) {
    let mut buf = Vec::new();
    let mut chunk = [0u8; 1024];

    let header_end = loop {
        let n = stream.read(&mut chunk).await.unwrap();
        if n == 0 {
            return;
        }
        buf.extend_from_slice(&chunk[..n]);
        if let Some(pos) = buf.windows(4).position(|w| w == b"\r\n\r\n") {
            break pos + 4;
        }
    };

    let headers = String::from_utf8_lossy(&buf[..header_end]).to_lowercase();
    let content_length: usize = headers
        .lines()
        .find_map(|line| line.strip_prefix("content-length:"))
        .map(|v| v.trim().parse().unwrap())
        .unwrap_or(0);

    while buf.len() < header_end + content_length {
        let n = stream.read(&mut chunk).await.unwrap();
        if n == 0 {
            return;
        }
        buf.extend_from_slice(&chunk[..n]);
    }
}

#[tokio::test]
async fn test_search_posts_composed_body_to_all_types() {
    let mut server = mockito::Server::new_async().await;
    let mock = server
        .mock("POST", "/sd/ingest,published/_search")
        .match_body(Matcher::PartialJson(json!({
            "_source": ["headline"],
            "query": {
                "filtered": {
                    "filter": {
                        "or": [
                            { "and": [ { "term": { "_type": "ingest" } } ] },
                            {
                                "and": [
                                    { "term": { "_type": "published" } },
                                    { "terms": { "state": catalog::PUBLISHED_STATES } },
                                    { "not": { "terms": { "task.stage": ["s1"] } } }
                                ]
                            }
                        ]
                    }
                }
            }
        })))
        .with_status(200)
        .with_header("content-type", "application/json")
        .with_body(
            json!({
                "hits": {
                    "total": 2,
                    "hits": [
                        { "_id": "p1", "_type": "published", "_source": { "headline": "A" } },
                        { "_id": "i1", "_type": "ingest", "_source": { "headline": "B" } }
                    ]
                }
            })
            .to_string(),
        )
        .create_async()
        .await;

    let repos = [RepositoryId::Ingest, RepositoryId::Published];
    let projection = vec!["headline".to_string()];
    let response = backend(server.url(), 5)
        .search(&composed(&repos, &["s1"]), &repos, Some(&projection))
        .await
        .unwrap();

    mock.assert_async().await;
    assert_eq!(response.total, 2);
    assert_eq!(response.hits[0].id, "p1");
    assert_eq!(response.hits[0].doc_type, "published");
    assert_eq!(response.hits[1].document["headline"], json!("B"));
}

#[tokio::test]
async fn test_executor_tags_elastic_hits() {
    let mut server = mockito::Server::new_async().await;
    let _mock = server
        .mock("POST", "/sd/archive/_search")
        .with_status(200)
        .with_body(
            json!({
                "hits": { "total": 1, "hits": [ { "_id": "a1", "_type": "archive", "_source": {} } ] }
            })
            .to_string(),
        )
        .create_async()
        .await;

    let executor = SearchExecutor::new(Arc::new(backend(server.url(), 5)));
    let repos = [RepositoryId::Archive];
    let outcome = executor
        .execute(&composed(&repos, &[]), &repos, None)
        .await
        .unwrap();

    assert_eq!(outcome.hits[0].repo, RepositoryId::Archive);
    assert_eq!(outcome.hits[0].get("_id"), Some(&json!("a1")));
}

#[tokio::test]
async fn test_server_error_is_backend_error() {
    let mut server = mockito::Server::new_async().await;
    let _mock = server
        .mock("POST", "/sd/ingest/_search")
        .with_status(503)
        .with_body("cluster unavailable")
        .create_async()
        .await;

    let repos = [RepositoryId::Ingest];
    let err = backend(server.url(), 5)
        .search(&composed(&repos, &[]), &repos, None)
        .await
        .unwrap_err();

    assert!(matches!(err, FederationError::SearchBackend(_)));
    assert!(err.to_string().contains("503"));
}

#[tokio::test]
async fn test_unparseable_body_is_backend_error() {
    let mut server = mockito::Server::new_async().await;
    let _mock = server
        .mock("POST", "/sd/ingest/_search")
        .with_status(200)
        .with_body("<html>proxy</html>")
        .create_async()
        .await;

    let repos = [RepositoryId::Ingest];
    let err = backend(server.url(), 5)
        .search(&composed(&repos, &[]), &repos, None)
        .await
        .unwrap_err();

    assert!(err.is_backend());
}

#[tokio::test]
async fn test_find_first_probes_single_type() {
    let mut server = mockito::Server::new_async().await;
    let mock = server
        .mock("POST", "/sd/published/_search")
        .match_body(Matcher::PartialJson(json!({
            "size": 1,
            "query": { "filtered": { "filter": { "and": [
                { "term": { "_type": "published" } },
                { "terms": { "state": catalog::PUBLISHED_STATES } },
                { "term": { "item_id": "a1" } }
            ] } } }
        })))
        .with_status(200)
        .with_body(
            json!({
                "hits": { "total": 1, "hits": [ { "_id": "a1:2", "_type": "published", "_source": { "item_id": "a1" } } ] }
            })
            .to_string(),
        )
        .create_async()
        .await;

    let filter = filter_for(RepositoryId::Published, None)
        .and_also(SecurityFilter::term(RepositoryId::Published.id_field(), "a1"));
    let hit = backend(server.url(), 5)
        .find_first(RepositoryId::Published, &filter)
        .await
        .unwrap()
        .unwrap();

    mock.assert_async().await;
    assert_eq!(hit.id, "a1:2");
}

#[tokio::test]
async fn test_lookup_over_elastic_stops_at_first_hit() {
    let mut server = mockito::Server::new_async().await;
    let ingest = server
        .mock("POST", "/sd/ingest/_search")
        .with_status(200)
        .with_body(json!({ "hits": { "total": 0, "hits": [] } }).to_string())
        .expect(1)
        .create_async()
        .await;
    let archive = server
        .mock("POST", "/sd/archive/_search")
        .with_status(200)
        .with_body(
            json!({ "hits": { "total": 1, "hits": [ { "_id": "x", "_type": "archive", "_source": {} } ] } })
                .to_string(),
        )
        .expect(1)
        .create_async()
        .await;
    let published = server
        .mock("POST", "/sd/published/_search")
        .expect(0)
        .create_async()
        .await;

    let lookup = CrossRepositoryLookup::new(
        Arc::new(backend(server.url(), 5)),
        RepositoryId::ALL.to_vec(),
    );
    let hit = lookup
        .find_one("x", &RepoSelector::All, None)
        .await
        .unwrap()
        .unwrap();

    assert_eq!(hit.repo, RepositoryId::Archive);
    ingest.assert_async().await;
    archive.assert_async().await;
    published.assert_async().await;
}

#[tokio::test]
async fn test_truncated_body_keeps_transport_cause() {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let url = format!("http://{}", listener.local_addr().unwrap());

    tokio::spawn(async move {
        let (mut stream, _) = listener.accept().await.unwrap();
        read_request(&mut stream).await;
        stream
            .write_all(
                b"HTTP/1.1 200 OK\r\ncontent-type: application/json\r\ncontent-length: 500\r\n\r\n{\"hits\": {",
            )
            .await
            .unwrap();
        stream.flush().await.unwrap();
        // Connection drops with 490 bytes still owed
    });

    let repos = [RepositoryId::Ingest];
    let err = backend(url, 5)
        .search(&composed(&repos, &[]), &repos, None)
        .await
        .unwrap_err();

    assert!(matches!(err, FederationError::SearchBackend(_)), "{:?}", err);
    assert!(!err.to_string().contains("malformed response body"), "{}", err);
}

#[tokio::test]
async fn test_silent_backend_times_out_without_retry() {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let url = format!("http://{}", listener.local_addr().unwrap());
    let connections = Arc::new(AtomicUsize::new(0));

    let accepted = connections.clone();
    tokio::spawn(async move {
        let mut open = Vec::new();
        loop {
            let (mut stream, _) = listener.accept().await.unwrap();
            accepted.fetch_add(1, Ordering::SeqCst);
            read_request(&mut stream).await;
            // Hold the connection open and never answer
            open.push(stream);
        }
    });

    let executor = SearchExecutor::new(Arc::new(backend(url, 1)));
    let repos = [RepositoryId::Archive];
    let err = tokio::time::timeout(
        Duration::from_secs(10),
        executor.execute(&composed(&repos, &[]), &repos, None),
    )
    .await
    .unwrap()
    .unwrap_err();

    assert!(matches!(err, FederationError::BackendTimeout(_)), "{:?}", err);
    assert_eq!(connections.load(Ordering::SeqCst), 1);

    let app: federated_search::AppError = err.into();
    assert_eq!(app.status_code(), axum::http::StatusCode::GATEWAY_TIMEOUT);
}
