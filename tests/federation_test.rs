//! End-to-end tests for federated search over the in-memory backend

use federated_search::federation::*;
use serde_json::{json, Value};
use std::collections::BTreeSet;
use std::sync::{Arc, Mutex};

/// Helper to create a document
fn doc(id: &str, repo: &str, state: &str, stage: &str) -> Value {
    json!({
        "_id": id,
        "_type": repo,
        "state": state,
        "headline": format!("Story {}", id),
        "task": { "stage": stage, "desk": "news" }
    })
}

/// Helper to create a service over the given documents
fn create_service(
    documents: Vec<Value>,
    directory: StaticUserDirectory,
) -> (FederatedSearchService, Arc<InMemoryBackend>) {
    let backend = Arc::new(InMemoryBackend::with_documents(documents));
    let service =
        FederatedSearchService::new(FederationConfig::default(), backend.clone(), Arc::new(directory))
            .unwrap();
    (service, backend)
}

fn ids(hits: &[Hit]) -> Vec<&str> {
    hits.iter().map(|h| h.id.as_str()).collect()
}

#[tokio::test]
async fn test_inbound_and_published_with_hidden_stage() {
    let directory = StaticUserDirectory::default().with_user("editor", ["in-progress"]);
    let (service, backend) = create_service(
        vec![
            doc("in1", "ingest", "ingested", "new"),
            doc("in2", "ingest", "ingested", "in-progress"),
            doc("pub1", "published", "published", "published"),
            doc("pub2", "published", "published", "in-progress"),
        ],
        directory,
    );

    let grouped: Arc<Mutex<Vec<(RepositoryId, Vec<String>)>>> = Arc::new(Mutex::new(Vec::new()));
    let recorder = grouped.clone();
    let hooks = HookRegistry::new(Arc::new(NoopHook), move |_| {
        let recorder = recorder.clone();
        Arc::new(move |repo: RepositoryId, items: &mut Vec<Hit>| {
            recorder
                .lock()
                .unwrap()
                .push((repo, items.iter().map(|h| h.id.clone()).collect()));
        })
    });
    let service = service.with_hooks(hooks);

    let request = SearchRequest::new().with_repo(RepoSelector::parse(Some("ingest,published")));
    let response = service
        .search(&request, &UserContext::identified("editor"))
        .await
        .unwrap();

    assert_eq!(ids(&response.items), vec!["in1", "in2", "pub1"]);
    assert_eq!(backend.search_count(), 1);

    let grouped = grouped.lock().unwrap();
    assert_eq!(
        *grouped,
        vec![
            (RepositoryId::Ingest, vec!["in1".to_string(), "in2".to_string()]),
            (RepositoryId::Published, vec!["pub1".to_string()]),
        ]
    );
}

#[tokio::test]
async fn test_published_only_returns_published_states() {
    let (service, _) = create_service(
        vec![
            doc("p1", "published", "published", "s"),
            doc("p2", "published", "draft", "s"),
            doc("p3", "published", "in_progress", "s"),
            doc("p4", "published", "killed", "s"),
            doc("p5", "published", "being_corrected", "s"),
            doc("a1", "archive", "published", "s"),
        ],
        StaticUserDirectory::default(),
    );

    let request = SearchRequest::new().with_repo(RepoSelector::named(["published"]));
    let response = service.search(&request, &UserContext::anonymous()).await.unwrap();

    assert_eq!(ids(&response.items), vec!["p1", "p4", "p5"]);
    for hit in &response.items {
        let state = hit.get("state").and_then(Value::as_str).unwrap();
        assert!(catalog::PUBLISHED_STATES.contains(&state));
        assert_eq!(hit.repo, RepositoryId::Published);
    }
}

#[tokio::test]
async fn test_hidden_stages_excluded_outside_inbound() {
    let directory = StaticUserDirectory::default().with_user("u1", ["s1", "s2"]);
    let (service, _) = create_service(
        vec![
            doc("a1", "archive", "in_progress", "s1"),
            doc("a2", "archive", "in_progress", "s3"),
            doc("p1", "published", "published", "s2"),
            doc("p2", "published", "corrected", "s3"),
            doc("x1", "archived", "published", "s1"),
            doc("x2", "archived", "published", "s4"),
        ],
        directory,
    );

    let request =
        SearchRequest::new().with_repo(RepoSelector::parse(Some("archive,published,archived")));
    let response = service
        .search(&request, &UserContext::identified("u1"))
        .await
        .unwrap();

    assert_eq!(ids(&response.items), vec!["a2", "p2", "x2"]);
    let hidden: BTreeSet<&str> = ["s1", "s2"].into_iter().collect();
    for hit in &response.items {
        let stage = hit.document_value()["task"]["stage"].as_str().unwrap().to_string();
        assert!(!hidden.contains(stage.as_str()));
    }
}

#[tokio::test]
async fn test_user_record_stages_skip_directory() {
    let (service, _) = create_service(
        vec![
            doc("a1", "archive", "in_progress", "s1"),
            doc("a2", "archive", "in_progress", "s2"),
        ],
        StaticUserDirectory::default().with_user("u1", ["s2"]),
    );

    // The record says s1; the directory's s2 must not be consulted
    let user = UserContext::identified("u1").with_invisible_stages(["s1"]);
    let response = service.search(&SearchRequest::new(), &user).await.unwrap();
    assert_eq!(ids(&response.items), vec!["a2"]);
}

#[tokio::test]
async fn test_drafts_visible_only_to_creator() {
    let mut mine = doc("d1", "archive", "draft", "s");
    mine["original_creator"] = json!("u1");
    let mut theirs = doc("d2", "archive", "draft", "s");
    theirs["original_creator"] = json!("u2");

    let (service, _) = create_service(
        vec![mine, theirs, doc("a1", "archive", "in_progress", "s")],
        StaticUserDirectory::default(),
    );

    let request = SearchRequest::new().with_repo(RepoSelector::named(["archive"]));

    let response = service
        .search(&request, &UserContext::identified("u1"))
        .await
        .unwrap();
    assert_eq!(ids(&response.items), vec!["d1", "a1"]);

    let response = service.search(&request, &UserContext::anonymous()).await.unwrap();
    assert_eq!(ids(&response.items), vec!["a1"]);
}

#[test]
fn test_resolve_follows_declaration_order() {
    let known = [RepositoryId::Ingest, RepositoryId::Archive, RepositoryId::Published];

    assert_eq!(resolve(&RepoSelector::All, &known).unwrap(), known.to_vec());
    assert_eq!(resolve(&RepoSelector::parse(Some("")), &known).unwrap(), known.to_vec());
    assert_eq!(
        resolve(&RepoSelector::parse(Some("published,,ingest,published")), &known).unwrap(),
        vec![RepositoryId::Ingest, RepositoryId::Published]
    );
}

#[test]
fn test_resolve_rejects_unknown_names() {
    let known = [RepositoryId::Ingest, RepositoryId::Archive, RepositoryId::Published];

    match resolve(&RepoSelector::named(["Z"]), &known) {
        Err(FederationError::Validation { value, .. }) => assert_eq!(value, "Z"),
        other => panic!("expected validation error, got {:?}", other),
    }

    // Well-formed but not configured
    assert!(resolve(&RepoSelector::named(["archived"]), &known)
        .unwrap_err()
        .is_validation());
}

#[test]
fn test_composition_is_repeatable() {
    let composer = QueryComposer::new(Arc::new(
        FederationConfigBuilder::new()
            .max_search_depth(SearchDepth::limited(250))
            .build(),
    ));
    let request = SearchRequest::new()
        .with_source(r#"{"query": {"filtered": {"query": {"query_string": {"query": "rust*"}}}}}"#)
        .with_aggregations(true)
        .with_highlight(true);
    let stages: BTreeSet<StageId> = ["s2", "s1"].iter().map(|s| s.to_string()).collect();
    let repos = RepositoryId::ALL;

    let first = composer.compose(&request, &repos, &stages, None).unwrap();
    let second = composer.compose(&request, &repos, &stages, None).unwrap();

    assert_eq!(first, second);
    assert_eq!(
        serde_json::to_string(&first.to_body()).unwrap(),
        serde_json::to_string(&second.to_body()).unwrap()
    );
}

#[tokio::test]
async fn test_lookup_probes_in_order_without_merged_query() {
    let (service, backend) = create_service(
        vec![doc("x", "archive", "in_progress", "s")],
        StaticUserDirectory::default(),
    );

    let hit = service
        .find_one("x", &RepoSelector::named(["published", "archive"]), &UserContext::anonymous())
        .await
        .unwrap()
        .unwrap();

    assert_eq!(hit.repo, RepositoryId::Archive);
    assert_eq!(hit.links.unwrap().self_link.href, "/archive/x");
    assert_eq!(backend.search_count(), 0);

    // With published ahead of archive, both are probed one after the other
    let backend = Arc::new(InMemoryBackend::with_documents(vec![doc(
        "x",
        "archive",
        "in_progress",
        "s",
    )]));
    let config = FederationConfigBuilder::new()
        .repositories(vec![RepositoryId::Published, RepositoryId::Archive])
        .build();
    let service = FederatedSearchService::new(
        config,
        backend.clone(),
        Arc::new(StaticUserDirectory::default()),
    )
    .unwrap();

    let hit = service
        .find_one("x", &RepoSelector::named(["published", "archive"]), &UserContext::anonymous())
        .await
        .unwrap()
        .unwrap();
    assert_eq!(hit.repo, RepositoryId::Archive);
    assert_eq!(backend.probe_count(), 2);
    assert_eq!(backend.search_count(), 0);
}

#[tokio::test]
async fn test_lookup_miss_returns_none() {
    let (service, backend) = create_service(vec![], StaticUserDirectory::default());

    let result = service
        .find_one("missing", &RepoSelector::All, &UserContext::anonymous())
        .await
        .unwrap();

    assert!(result.is_none());
    assert_eq!(backend.probe_count(), RepositoryId::ALL.len());
}

#[test]
fn test_unlimited_depth_has_no_scan_limit() {
    let depth = SearchDepth::try_from(-1).unwrap();
    let composer = QueryComposer::new(Arc::new(
        FederationConfigBuilder::new().max_search_depth(depth).build(),
    ));

    let composed = composer
        .compose(&SearchRequest::new(), &RepositoryId::ALL, &BTreeSet::new(), None)
        .unwrap();

    assert_eq!(composed.scan_cap, None);
    assert!(composed.to_body().get("terminate_after").is_none());
}

#[tokio::test]
async fn test_aggregations_and_projection_end_to_end() {
    let (service, _) = create_service(
        vec![
            doc("i1", "ingest", "ingested", "s1"),
            doc("i2", "ingest", "ingested", "s2"),
            doc("a1", "archive", "in_progress", "s1"),
        ],
        StaticUserDirectory::default(),
    );

    let request = SearchRequest::new()
        .with_aggregations(true)
        .with_projection(["headline"]);
    let response = service.search(&request, &UserContext::anonymous()).await.unwrap();

    assert_eq!(response.total(), 3);
    let aggregations = response.aggregations.unwrap();
    assert_eq!(
        aggregations["stage"]["buckets"],
        json!([
            { "key": "s1", "doc_count": 2 },
            { "key": "s2", "doc_count": 1 }
        ])
    );

    let first = &response.items[0];
    assert!(first.get("headline").is_some());
    assert!(first.get("task").is_none());
    assert_eq!(first.get("_type"), Some(&json!("ingest")));
}

#[tokio::test]
async fn test_free_text_query() {
    let (service, _) = create_service(
        vec![
            json!({ "_id": "i1", "_type": "ingest", "headline": "Flood warning issued" }),
            json!({ "_id": "i2", "_type": "ingest", "headline": "Market update" }),
        ],
        StaticUserDirectory::default(),
    );

    let request = SearchRequest::new()
        .with_source(r#"{"query": {"filtered": {"query": {"query_string": {"query": "flood*"}}}}}"#);
    let response = service.search(&request, &UserContext::anonymous()).await.unwrap();

    assert_eq!(ids(&response.items), vec!["i1"]);
}
