//! Route tests: the router is driven in-process with `oneshot`, backed by a
//! real store in a temp dir and a scripted downloader.

use axum::body::{to_bytes, Body};
use axum::http::{header, Request, StatusCode};
use axum::Router;
use pretty_assertions::assert_eq;
use std::sync::Arc;
use std::time::Duration;
use tempfile::{tempdir, TempDir};
use tower::ServiceExt;

use tubecore::core::options::{Options, OptionsStore};
use tubecore::testing::MockDownloader;
use tubecore::{create_pool, EventBus, SubscriptionService};
use tubeweb::{router, AppState};

const VIDEO_URL: &str = "https://youtu.be/dQw4w9WgXcQ";
const VIDEO_URL_ENCODED: &str = "https%3A%2F%2Fyoutu.be%2FdQw4w9WgXcQ";

struct TestApp {
    app: Router,
    service: Arc<SubscriptionService>,
    mock: Arc<MockDownloader>,
    _dir: TempDir,
}

fn app_with(mock: MockDownloader) -> TestApp {
    let dir = tempdir().unwrap();
    let pool = create_pool(dir.path().join("config/app.db")).unwrap();
    let mock = Arc::new(mock);
    let service = Arc::new(
        SubscriptionService::new(
            pool,
            mock.clone(),
            Arc::new(OptionsStore::in_memory(Options::default())),
            EventBus::new(64),
            dir.path().join("data"),
        )
        .unwrap(),
    );
    TestApp {
        app: router(AppState::new(Arc::clone(&service))),
        service,
        mock,
        _dir: dir,
    }
}

async fn send(app: &Router, request: Request<Body>) -> (StatusCode, String) {
    let response = app.clone().oneshot(request).await.unwrap();
    let status = response.status();
    let body = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    (status, String::from_utf8_lossy(&body).into_owned())
}

fn get(uri: &str) -> Request<Body> {
    Request::builder().uri(uri).body(Body::empty()).unwrap()
}

fn form(method: &str, uri: &str, body: &str) -> Request<Body> {
    Request::builder()
        .method(method)
        .uri(uri)
        .header(header::CONTENT_TYPE, "application/x-www-form-urlencoded")
        .body(Body::from(body.to_string()))
        .unwrap()
}

fn empty(method: &str, uri: &str) -> Request<Body> {
    Request::builder().method(method).uri(uri).body(Body::empty()).unwrap()
}

// ── pages ──────────────────────────────────────────────────────────────────

#[tokio::test]
async fn health_says_ok() {
    let t = app_with(MockDownloader::new());
    assert_eq!(send(&t.app, get("/health")).await, (StatusCode::OK, "ok".to_string()));
}

#[tokio::test]
async fn index_renders_forms_and_parameters() {
    let t = app_with(MockDownloader::new());
    t.service.set_parameters("-f best").unwrap();

    let (status, body) = send(&t.app, get("/")).await;

    assert_eq!(status, StatusCode::OK);
    assert!(body.contains(r#"hx-post="/add""#));
    assert!(body.contains(r#"value="-f best""#));
    assert!(body.contains(r#"hx-get="/subscriptions""#));
}

#[tokio::test]
async fn items_is_an_alias_of_subscriptions() {
    let t = app_with(MockDownloader::new());
    t.service.add(VIDEO_URL).await.unwrap();

    let (_, subscriptions) = send(&t.app, get("/subscriptions")).await;
    let (_, items) = send(&t.app, get("/items")).await;

    assert_eq!(subscriptions, items);
    assert!(items.contains(VIDEO_URL));
}

#[tokio::test]
async fn cards_target_the_encoded_url() {
    let t = app_with(MockDownloader::new());
    t.service.add(VIDEO_URL).await.unwrap();

    let (_, body) = send(&t.app, get("/subscriptions")).await;

    assert!(body.contains(&format!(r#"hx-post="/update/{}""#, VIDEO_URL_ENCODED)));
    assert!(body.contains(&format!(r#"hx-delete="/remove/{}""#, VIDEO_URL_ENCODED)));
}

// ── add / remove ───────────────────────────────────────────────────────────

#[tokio::test]
async fn add_returns_list_with_placeholder() {
    let t = app_with(MockDownloader::new());

    let (status, body) = send(&t.app, form("POST", "/add", &format!("item={}", VIDEO_URL_ENCODED))).await;

    assert_eq!(status, StatusCode::OK);
    assert!(body.contains(VIDEO_URL));
    assert!(body.contains("Processing..."));
    assert_eq!(t.service.list().unwrap().len(), 1);
}

#[tokio::test]
async fn add_duplicate_shows_inline_warning() {
    let t = app_with(MockDownloader::new());
    t.service.add(VIDEO_URL).await.unwrap();

    let (status, body) = send(&t.app, form("POST", "/add", &format!("item={}", VIDEO_URL_ENCODED))).await;

    assert_eq!(status, StatusCode::OK);
    assert!(body.contains(r#"class="notice warning""#));
    assert!(body.contains("Already subscribed"));
    assert_eq!(t.service.list().unwrap().len(), 1);
}

#[tokio::test]
async fn add_unrecognised_url_shows_inline_error() {
    let t = app_with(MockDownloader::new());

    let (status, body) = send(&t.app, form("POST", "/add", "item=not+a+url")).await;

    assert_eq!(status, StatusCode::OK);
    assert!(body.contains(r#"class="notice error""#));
    assert!(body.contains("No subscriptions yet"));
    assert!(t.service.list().unwrap().is_empty());
}

#[tokio::test]
async fn add_empty_form_just_lists() {
    let t = app_with(MockDownloader::new());

    let (status, body) = send(&t.app, form("POST", "/add", "item=")).await;

    assert_eq!(status, StatusCode::OK);
    assert!(!body.contains("notice"));
}

#[tokio::test]
async fn remove_decodes_the_url() {
    let t = app_with(MockDownloader::new());
    t.service.add(VIDEO_URL).await.unwrap();

    let (status, body) = send(&t.app, empty("DELETE", &format!("/remove/{}", VIDEO_URL_ENCODED))).await;

    assert_eq!(status, StatusCode::OK);
    assert!(body.contains("No subscriptions yet"));
    assert!(t.service.list().unwrap().is_empty());
}

#[tokio::test]
async fn remove_unknown_is_a_noop() {
    let t = app_with(MockDownloader::new());
    t.service.add(VIDEO_URL).await.unwrap();

    let (status, body) = send(&t.app, empty("DELETE", "/remove/https%3A%2F%2Fyoutu.be%2Fmissing1234")).await;

    assert_eq!(status, StatusCode::OK);
    assert!(body.contains("No subscription for https://youtu.be/missing1234"));
    assert_eq!(t.service.list().unwrap().len(), 1);
}

// ── update / parameters ────────────────────────────────────────────────────

#[tokio::test]
async fn update_unknown_is_404() {
    let t = app_with(MockDownloader::new());

    let (status, _) = send(&t.app, empty("POST", &format!("/update/{}", VIDEO_URL_ENCODED))).await;

    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn update_queues_a_download() {
    let t = app_with(MockDownloader::new());
    t.service.add(VIDEO_URL).await.unwrap();
    t.service.set_parameters("-f best").unwrap();

    let (status, body) = send(&t.app, empty("POST", &format!("/update/{}", VIDEO_URL_ENCODED))).await;
    assert_eq!(status, StatusCode::OK);
    assert!(body.contains("Update queued"));

    for _ in 0..100 {
        if !t.mock.downloaded_urls().is_empty() {
            break;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    assert_eq!(t.mock.downloaded_urls(), vec![VIDEO_URL.to_string()]);
    assert_eq!(t.mock.last_parameters().as_deref(), Some("-f best"));
}

#[tokio::test]
async fn set_parameters_accepts_valid_input() {
    let t = app_with(MockDownloader::new());

    let (status, body) = send(
        &t.app,
        form("POST", "/set-parameters", "parameters=-f+best+-o+%22%25(title)s.%25(ext)s%22"),
    )
    .await;

    assert_eq!(status, StatusCode::NO_CONTENT);
    assert!(body.is_empty());
    assert_eq!(t.service.parameters(), r#"-f best -o "%(title)s.%(ext)s""#);
}

#[tokio::test]
async fn set_parameters_rejects_unbalanced_quotes() {
    let t = app_with(MockDownloader::new());
    t.service.set_parameters("-f best").unwrap();

    let (status, _) = send(&t.app, form("POST", "/set-parameters", "parameters=-o+%22unterminated")).await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(t.service.parameters(), "-f best");
}

// ── videos / static / ws ───────────────────────────────────────────────────

#[tokio::test]
async fn videos_for_unknown_channel_is_empty() {
    let t = app_with(MockDownloader::new());

    let (status, body) = send(&t.app, get("/videos/unknown")).await;

    assert_eq!(status, StatusCode::OK);
    assert!(body.contains("No videos discovered yet"));
}

#[tokio::test]
async fn videos_lists_discovered_videos() {
    let mock = MockDownloader::new().with_metadata(
        VIDEO_URL,
        r#"{"_type": "video", "id": "dQw4w9WgXcQ", "title": "Never Gonna", "uploader": "Rick",
            "channel_id": "UCrick", "filesize": 2048}"#,
    );
    let t = app_with(mock);
    let (sub, prefetched) = t.service.add(VIDEO_URL).await.unwrap();
    t.service.enrich(&sub.url, prefetched).await.unwrap();

    let (status, body) = send(&t.app, get("/videos/UCrick")).await;

    assert_eq!(status, StatusCode::OK);
    assert!(body.contains("Never Gonna"));
    assert!(body.contains(r#"<span class="status pending">pending</span>"#));
    assert!(body.contains("0 B / 2.0 KB"));
}

#[tokio::test]
async fn static_data_serves_the_data_root() {
    let t = app_with(MockDownloader::new());
    let poster = t.service.data_root().join("Rick/poster.jpg");
    std::fs::create_dir_all(poster.parent().unwrap()).unwrap();
    std::fs::write(&poster, b"jpeg").unwrap();

    let (status, body) = send(&t.app, get("/static/data/Rick/poster.jpg")).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, "jpeg");
}

#[tokio::test]
async fn ws_requires_an_upgrade() {
    let t = app_with(MockDownloader::new());

    let (status, _) = send(&t.app, get("/ws")).await;

    assert!(status.is_client_error());
}
