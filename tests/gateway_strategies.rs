// tests/gateway_strategies.rs
//
// Exercises the delivery strategies against a real warp origin on an
// ephemeral port, and against an unreachable origin for the offline paths.
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use tempfile::TempDir;
use warp::Filter;

use gold_portfolio_feed::errors::FeedError;
use gold_portfolio_feed::handlers::gateway::Gateway;
use gold_portfolio_feed::router::{self, InterceptedRequest, RouteClass};
use gold_portfolio_feed::routes;
use gold_portfolio_feed::services::store::{self, cache_name, CacheStore, StoredResponse};

/// Serves the happy-path origin: app shell root + index, one counted asset,
/// and the live price file. Manifest and icons intentionally 404.
async fn spawn_origin() -> (String, Arc<AtomicUsize>) {
    let asset_hits = Arc::new(AtomicUsize::new(0));
    let counter = asset_hits.clone();

    let price = warp::path!("data" / "price.json")
        .map(|| warp::reply::json(&serde_json::json!({ "asOf": "2026-02-06T22:05:00Z" })));
    let index = warp::path("index.html").map(|| warp::reply::html("<html>shell</html>"));
    let root = warp::path::end().map(|| warp::reply::html("<html>shell</html>"));
    let asset = warp::path("app.js").map(move || {
        counter.fetch_add(1, Ordering::SeqCst);
        "console.log('app')"
    });
    let routes = warp::get().and(price.or(index).or(root).or(asset));

    let (addr, server) = warp::serve(routes).bind_ephemeral(([127, 0, 0, 1], 0));
    tokio::spawn(server);
    (format!("http://{}", addr), asset_hits)
}

/// An origin that refuses connections: bind, take the port, drop the socket.
fn dead_origin() -> String {
    let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
    let addr = listener.local_addr().unwrap();
    drop(listener);
    format!("http://{}", addr)
}

fn open_store(root: &std::path::Path) -> CacheStore {
    CacheStore::open(root, &cache_name("v4"))
}

fn stored(body: &str) -> StoredResponse {
    StoredResponse {
        status: 200,
        content_type: Some("application/json".to_string()),
        body: body.as_bytes().to_vec(),
    }
}

#[tokio::test]
async fn live_data_is_never_written_to_the_store() {
    let (origin, _) = spawn_origin().await;
    let root = TempDir::new().unwrap();
    let store = open_store(root.path());
    let client = reqwest::Client::new();
    let req = InterceptedRequest::get("/data/price.json");
    assert_eq!(router::classify(&req), RouteClass::LiveData);

    for _ in 0..3 {
        let resp = router::dispatch(RouteClass::LiveData, &client, &origin, &req, &store)
            .await
            .unwrap();
        assert_eq!(resp.status, 200);
    }

    assert!(store.lookup(&req.key(), true).is_none());
}

#[tokio::test]
async fn live_data_falls_back_to_any_entry_for_the_path_when_offline() {
    let root = TempDir::new().unwrap();
    let store = open_store(root.path());
    let client = reqwest::Client::new();

    // Entry left behind by an earlier strategy version, different query string
    let old = InterceptedRequest {
        query: Some("v=1".to_string()),
        ..InterceptedRequest::get("/data/price.json")
    };
    store.put(&old.key(), &stored("{\"eurPerOz\":4189.56}")).unwrap();

    let req = InterceptedRequest {
        query: Some("t=999".to_string()),
        ..InterceptedRequest::get("/data/price.json")
    };
    let resp = router::network_only_with_fallback(&client, &dead_origin(), &req, &store)
        .await
        .unwrap();
    assert_eq!(resp.body, b"{\"eurPerOz\":4189.56}".to_vec());
}

#[tokio::test]
async fn live_data_failure_without_cache_propagates() {
    let root = TempDir::new().unwrap();
    let store = open_store(root.path());
    let client = reqwest::Client::new();

    let req = InterceptedRequest::get("/data/history.jsonl");
    let err = router::network_only_with_fallback(&client, &dead_origin(), &req, &store)
        .await
        .unwrap_err();
    assert!(matches!(err, FeedError::UpstreamUnavailable(_)));
}

#[tokio::test]
async fn markup_is_cached_online_and_served_from_cache_offline() {
    let (origin, _) = spawn_origin().await;
    let root = TempDir::new().unwrap();
    let store = open_store(root.path());
    let client = reqwest::Client::new();

    let req = InterceptedRequest {
        accept: Some("text/html".to_string()),
        ..InterceptedRequest::get("/index.html")
    };
    assert_eq!(router::classify(&req), RouteClass::Markup);

    let fresh = router::dispatch(RouteClass::Markup, &client, &origin, &req, &store)
        .await
        .unwrap();
    assert_eq!(fresh.status, 200);
    assert!(store.lookup(&req.key(), true).is_some());

    let offline = router::network_first(&client, &dead_origin(), &req, &store)
        .await
        .unwrap();
    assert_eq!(offline.body, fresh.body);
}

#[tokio::test]
async fn assets_are_fetched_once_then_served_from_cache() {
    let (origin, hits) = spawn_origin().await;
    let root = TempDir::new().unwrap();
    let store = open_store(root.path());
    let client = reqwest::Client::new();

    let req = InterceptedRequest::get("/app.js");
    assert_eq!(router::classify(&req), RouteClass::StaticAsset);

    let first = router::dispatch(RouteClass::StaticAsset, &client, &origin, &req, &store)
        .await
        .unwrap();
    let second = router::dispatch(RouteClass::StaticAsset, &client, &origin, &req, &store)
        .await
        .unwrap();

    assert_eq!(hits.load(Ordering::SeqCst), 1);
    assert_eq!(first.body, second.body);
}

#[tokio::test]
async fn asset_miss_with_network_failure_propagates() {
    let root = TempDir::new().unwrap();
    let store = open_store(root.path());
    let client = reqwest::Client::new();

    let req = InterceptedRequest::get("/missing.js");
    let err = router::cache_first(&client, &dead_origin(), &req, &store)
        .await
        .unwrap_err();
    assert!(matches!(err, FeedError::UpstreamUnavailable(_)));
}

#[tokio::test]
async fn install_tolerates_missing_shell_entries_and_activation_purges() {
    let (origin, _) = spawn_origin().await;
    let root = TempDir::new().unwrap();
    let client = reqwest::Client::new();

    let superseded = CacheStore::open(root.path(), &cache_name("v3"));
    superseded
        .put(&InterceptedRequest::get("/index.html").key(), &stored("old shell"))
        .unwrap();

    let store = open_store(root.path());
    router::install(&client, &origin, &store).await;

    // Served shell entries are stored; the 404ing manifest/icons are skipped
    assert!(store
        .lookup(&InterceptedRequest::get("/index.html").key(), false)
        .is_some());
    assert!(store
        .lookup(&InterceptedRequest::get("/").key(), false)
        .is_some());
    assert!(store
        .lookup(&InterceptedRequest::get("/manifest.json").key(), false)
        .is_none());

    router::activate(root.path(), &store);
    let generations = store::list_generations(root.path()).unwrap();
    assert_eq!(
        generations.into_iter().collect::<Vec<_>>(),
        vec![cache_name("v4")]
    );
}

#[tokio::test]
async fn full_gateway_serves_markup_and_reports_unreachable_assets() {
    let (origin, _) = spawn_origin().await;
    let root = TempDir::new().unwrap();

    let gateway = Arc::new(Gateway {
        client: reqwest::Client::new(),
        upstream: origin,
        cache_root: root.path().to_path_buf(),
        store: open_store(root.path()),
    });
    let api = routes::routes(gateway);

    let res = warp::test::request()
        .method("GET")
        .path("/index.html")
        .reply(&api)
        .await;
    assert_eq!(res.status(), 200);
    assert_eq!(res.body().as_ref(), b"<html>shell</html>");

    let offline = Arc::new(Gateway {
        client: reqwest::Client::new(),
        upstream: dead_origin(),
        cache_root: root.path().to_path_buf(),
        store: CacheStore::open(root.path(), &cache_name("v5")),
    });
    let api = routes::routes(offline);

    let res = warp::test::request()
        .method("GET")
        .path("/app.js")
        .reply(&api)
        .await;
    assert_eq!(res.status(), 502);
    let body: serde_json::Value = serde_json::from_slice(res.body()).unwrap();
    assert!(body["error"].as_str().unwrap().contains("upstream unavailable"));
}
