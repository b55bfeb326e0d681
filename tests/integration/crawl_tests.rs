//! Integration tests for the crawler
//!
//! These tests use wiremock to create mock HTTP servers and test
//! the full crawl cycle end-to-end.

use std::collections::HashSet;
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};
use stevie_crawler::config::Config;
use stevie_crawler::crawler::{crawl, Coordinator};
use stevie_crawler::extract::EntityKind;
use stevie_crawler::storage::{MemoryStore, ResultStore, SqliteStore};
use stevie_crawler::CrawlerError;
use tokio_util::sync::CancellationToken;
use wiremock::matchers::{method, path, path_regex};
use wiremock::{Mock, MockServer, Request, Respond, ResponseTemplate};

/// Creates a fast test configuration seeded with the mock server's root
fn create_test_config(server: &MockServer) -> Config {
    let mut config = Config::with_seeds([format!("{}/", server.uri())]);
    config.crawler.request_delay_ms = 0;
    config.crawler.respect_robots_txt = false;
    config.crawler.user_agent = "TestBot/1.0".to_string();
    config.rate_limit.min_delay_ms = 0;
    config.rate_limit.max_concurrent_per_domain = 3;
    config.fetch.timeout_secs = 5;
    config.fetch.retry_base_delay_ms = 5;
    config
}

fn html(body: &str) -> ResponseTemplate {
    ResponseTemplate::new(200).set_body_raw(body.to_string(), "text/html; charset=utf-8")
}

fn page_with_links(title: &str, hrefs: &[&str]) -> ResponseTemplate {
    let links: String = hrefs
        .iter()
        .map(|href| format!(r#"<li><a href="{}">{}</a></li>"#, href, href))
        .collect();
    html(&format!(
        "<html><head><title>{}</title></head><body><ul>{}</ul></body></html>",
        title, links
    ))
}

/// Serves `/p/N` pages that each link to two fresh pages, so the frontier never drains
struct EndlessPages;

impl Respond for EndlessPages {
    fn respond(&self, request: &Request) -> ResponseTemplate {
        let n: u64 = request
            .url
            .path()
            .trim_start_matches("/p/")
            .parse()
            .unwrap_or(0);
        page_with_links(
            &format!("Page {}", n),
            &[&format!("/p/{}", n * 2 + 1), &format!("/p/{}", n * 2 + 2)],
        )
    }
}

/// Records when each request arrives; the first request to each listed path
/// gets `status` instead of a page
struct TimedResponder {
    arrivals: Arc<Mutex<Vec<(String, Instant)>>>,
    fail_once: Mutex<HashSet<String>>,
    status: u16,
}

impl TimedResponder {
    fn new(status: u16, fail_once: &[&str]) -> (Self, Arc<Mutex<Vec<(String, Instant)>>>) {
        let arrivals = Arc::new(Mutex::new(Vec::new()));
        let responder = Self {
            arrivals: Arc::clone(&arrivals),
            fail_once: Mutex::new(fail_once.iter().map(|p| p.to_string()).collect()),
            status,
        };
        (responder, arrivals)
    }
}

impl Respond for TimedResponder {
    fn respond(&self, request: &Request) -> ResponseTemplate {
        let path = request.url.path().to_string();
        self.arrivals
            .lock()
            .unwrap()
            .push((path.clone(), Instant::now()));

        if self.fail_once.lock().unwrap().remove(&path) {
            ResponseTemplate::new(self.status)
        } else {
            page_with_links(&path, &[])
        }
    }
}

/// Smallest gap between consecutive arrivals, in arrival order
fn min_arrival_gap(arrivals: &[(String, Instant)]) -> Duration {
    let mut times: Vec<Instant> = arrivals.iter().map(|(_, at)| *at).collect();
    times.sort();
    times
        .windows(2)
        .map(|pair| pair[1] - pair[0])
        .min()
        .unwrap_or(Duration::MAX)
}

async fn run_with_memory_store(config: Config) -> (stevie_crawler::CrawlReport, Arc<MemoryStore>) {
    let store = Arc::new(MemoryStore::new());
    let report = Coordinator::new(config, store.clone())
        .expect("valid config")
        .run()
        .await
        .expect("run completes");
    (report, store)
}

#[tokio::test]
async fn test_depth_zero_ignores_links() {
    let server = MockServer::start().await;
    let hrefs: Vec<String> = (0..10).map(|i| format!("/page{}", i)).collect();
    let href_refs: Vec<&str> = hrefs.iter().map(String::as_str).collect();

    Mock::given(method("GET"))
        .and(path("/"))
        .respond_with(page_with_links("Home", &href_refs))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path_regex(r"^/page\d+$"))
        .respond_with(html("<p>never fetched</p>"))
        .expect(0)
        .mount(&server)
        .await;

    let mut config = create_test_config(&server);
    config.crawler.max_depth = 0;

    let (report, store) = run_with_memory_store(config).await;

    assert_eq!(report.completed, 1);
    assert_eq!(report.failed, 0);
    assert_eq!(report.skipped_total(), 0);
    assert_eq!(store.count().unwrap(), 1);
    assert_eq!(report.records[0].title, "Home");
    assert_eq!(report.records[0].metadata.depth, 0);
}

#[tokio::test]
async fn test_links_followed_up_to_max_depth() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/"))
        .respond_with(page_with_links("Home", &["/a", "/b", "/a"]))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/a"))
        .respond_with(page_with_links("A", &["/", "/a/deeper"]))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/b"))
        .respond_with(page_with_links("B", &["/a"]))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/a/deeper"))
        .respond_with(html("<p>too deep</p>"))
        .expect(0)
        .mount(&server)
        .await;

    let mut config = create_test_config(&server);
    config.crawler.max_depth = 1;

    let (report, store) = run_with_memory_store(config).await;

    assert_eq!(report.completed, 3);
    assert_eq!(store.count().unwrap(), 3);

    let a_url = format!("{}/a", server.uri());
    let a = store.latest_by_url(&a_url).unwrap().expect("page a stored");
    assert_eq!(a.metadata.depth, 1);
}

#[tokio::test]
async fn test_request_budget_caps_processed_items() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/"))
        .respond_with(page_with_links("Root", &["/p/1", "/p/2"]))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path_regex(r"^/p/\d+$"))
        .respond_with(EndlessPages)
        .mount(&server)
        .await;

    let mut config = create_test_config(&server);
    config.crawler.max_requests_per_crawl = 5;
    config.crawler.max_depth = 100;

    let (report, store) = run_with_memory_store(config).await;

    assert_eq!(report.completed, 5);
    assert_eq!(store.count().unwrap(), 5);
    assert!(report.skipped.unprocessed > 0);

    let requests = server.received_requests().await.unwrap();
    assert_eq!(requests.len(), 5);
}

#[tokio::test]
async fn test_persistent_server_errors_fail_item() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/"))
        .respond_with(page_with_links("Home", &["/broken"]))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/broken"))
        .respond_with(ResponseTemplate::new(500))
        .expect(3)
        .mount(&server)
        .await;

    let (report, store) = run_with_memory_store(create_test_config(&server)).await;

    let broken_url = format!("{}/broken", server.uri());
    assert_eq!(report.completed, 1);
    assert_eq!(report.failed, 1);
    assert_eq!(report.failures[0].url, broken_url);
    assert!(report.failures[0].reason.contains("HTTP 500"));
    assert!(store.get_by_url(&broken_url).unwrap().is_empty());
}

#[tokio::test]
async fn test_connection_failures_fail_item() {
    // Reserve a port, then free it so nothing is listening there
    let port = {
        let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
        listener.local_addr().unwrap().port()
    };

    let mut config = Config::with_seeds([format!("http://127.0.0.1:{}/", port)]);
    config.crawler.request_delay_ms = 0;
    config.crawler.respect_robots_txt = false;
    config.rate_limit.min_delay_ms = 0;
    config.fetch.timeout_secs = 2;
    config.fetch.retry_base_delay_ms = 5;

    let (report, store) = run_with_memory_store(config).await;

    assert_eq!(report.completed, 0);
    assert_eq!(report.failed, 1);
    assert!(report.failures[0].reason.contains("gave up after 3 attempts"));
    assert_eq!(store.count().unwrap(), 0);
}

#[tokio::test]
async fn test_retry_then_success_stores_once() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/"))
        .respond_with(ResponseTemplate::new(503))
        .up_to_n_times(2)
        .expect(2)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/"))
        .respond_with(html(
            "<html><head><title>Recovered</title></head><body></body></html>",
        ))
        .expect(1)
        .mount(&server)
        .await;

    let (report, store) = run_with_memory_store(create_test_config(&server)).await;

    assert_eq!(report.completed, 1);
    assert_eq!(report.failed, 0);

    let stored = store.get_by_url(&format!("{}/", server.uri())).unwrap();
    assert_eq!(stored.len(), 1);
    assert_eq!(stored[0].title, "Recovered");
}

#[tokio::test]
async fn test_rate_limited_response_is_retried() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/"))
        .respond_with(ResponseTemplate::new(429).insert_header("Retry-After", "0"))
        .up_to_n_times(1)
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/"))
        .respond_with(html("<title>After the wait</title>"))
        .expect(1)
        .mount(&server)
        .await;

    let (report, store) = run_with_memory_store(create_test_config(&server)).await;

    assert_eq!(report.completed, 1);
    assert_eq!(report.failed, 0);
    assert_eq!(store.count().unwrap(), 1);
}

#[tokio::test]
async fn test_out_of_scope_links_are_not_fetched() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/"))
        .respond_with(page_with_links(
            "Home",
            &[
                "/about",
                "/login",
                "/media/brochure.pdf",
                "/cart/checkout",
                "https://unrelated.example.org/",
                "mailto:help@stevieawards.com",
                "#top",
            ],
        ))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/about"))
        .respond_with(html("<title>About</title>"))
        .expect(1)
        .mount(&server)
        .await;
    for denied in ["/login", "/media/brochure.pdf", "/cart/checkout"] {
        Mock::given(method("GET"))
            .and(path(denied))
            .respond_with(html("<title>denied</title>"))
            .expect(0)
            .mount(&server)
            .await;
    }

    let (report, _store) = run_with_memory_store(create_test_config(&server)).await;

    assert_eq!(report.completed, 2);
    assert_eq!(report.skipped.out_of_scope, 4);
}

#[tokio::test]
async fn test_robots_disallowed_items_are_skipped() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/robots.txt"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_raw("User-agent: *\nDisallow: /private\n", "text/plain"),
        )
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/"))
        .respond_with(page_with_links("Home", &["/private/winners", "/public"]))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/public"))
        .respond_with(html("<title>Public</title>"))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/private/winners"))
        .respond_with(html("<title>Private</title>"))
        .expect(0)
        .mount(&server)
        .await;

    let mut config = create_test_config(&server);
    config.crawler.respect_robots_txt = true;

    let (report, _store) = run_with_memory_store(config).await;

    assert_eq!(report.completed, 2);
    assert_eq!(report.skipped.robots, 1);
}

#[tokio::test]
async fn test_non_html_items_are_skipped() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/"))
        .respond_with(page_with_links("Home", &["/feed.json"]))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/feed.json"))
        .respond_with(ResponseTemplate::new(200).set_body_raw("{}", "application/json"))
        .expect(1)
        .mount(&server)
        .await;

    let (report, store) = run_with_memory_store(create_test_config(&server)).await;

    assert_eq!(report.completed, 1);
    assert_eq!(report.skipped.non_html, 1);
    assert_eq!(store.count().unwrap(), 1);
}

#[tokio::test]
async fn test_full_extraction_persisted_to_sqlite() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/"))
        .respond_with(html(
            r#"<html>
            <head><title>Stevie Awards for Women in Business</title></head>
            <body>
              <h1>Women in Business</h1>
              <h2>Entry Deadlines</h2>
              <p>The Stevie Awards for Women in Business opens March 1, 2024. Fee: $695.00.</p>
              <p>Category: Entrepreneur of the Year</p>
              <ul><li>Early-bird deadline 2024-05-15</li><li>Home</li></ul>
              <table>
                <thead><tr><th>Deadline</th><th>Fee</th></tr></thead>
                <tr><td>Early</td><td>$595</td></tr>
                <tr><td>Final</td><td>$795</td></tr>
              </table>
            </body></html>"#,
        ))
        .mount(&server)
        .await;

    let dir = tempfile::tempdir().unwrap();
    let store = Arc::new(SqliteStore::open(&dir.path().join("crawl.db")).unwrap());

    let report = crawl(
        create_test_config(&server),
        store.clone(),
        CancellationToken::new(),
    )
    .await
    .unwrap();
    assert_eq!(report.completed, 1);

    let record = store
        .latest_by_url(&format!("{}/", server.uri()))
        .unwrap()
        .expect("record stored");

    assert_eq!(record.title, "Stevie Awards for Women in Business");
    assert_eq!(record.headings, vec!["Women in Business", "Entry Deadlines"]);
    assert!(record.content.contains("opens March 1, 2024"));
    assert!(record.content.contains("Early-bird deadline 2024-05-15"));
    assert!(!record.content.contains("\n\nHome"));

    assert_eq!(record.tables.len(), 1);
    assert_eq!(record.tables[0].headers, vec!["Deadline", "Fee"]);
    assert_eq!(
        record.tables[0].rows,
        vec![vec!["Early", "$595"], vec!["Final", "$795"]]
    );

    let values = |kind: EntityKind| -> Vec<String> {
        record
            .entities
            .iter()
            .filter(|e| e.kind == kind)
            .map(|e| e.value.clone())
            .collect()
    };
    assert!(values(EntityKind::Award)
        .iter()
        .any(|v| v.contains("Women in Business")));
    assert!(values(EntityKind::Date).contains(&"March 1, 2024".to_string()));
    assert!(values(EntityKind::Date).contains(&"2024-05-15".to_string()));
    assert!(values(EntityKind::Price).contains(&"$695.00".to_string()));
    assert_eq!(values(EntityKind::Category), vec!["Entrepreneur of the Year"]);
}

#[tokio::test]
async fn test_cancellation_abandons_in_flight_items() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/"))
        .respond_with(html("<title>Slow</title>").set_delay(Duration::from_secs(10)))
        .mount(&server)
        .await;

    let store = Arc::new(MemoryStore::new());
    let cancel = CancellationToken::new();
    {
        let cancel = cancel.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(200)).await;
            cancel.cancel();
        });
    }

    let report = tokio::time::timeout(
        Duration::from_secs(5),
        crawl(create_test_config(&server), store.clone(), cancel),
    )
    .await
    .expect("cancellation ends the run promptly")
    .unwrap();

    assert!(report.cancelled);
    assert_eq!(report.completed, 0);
    assert_eq!(report.skipped.cancelled, 1);
    assert_eq!(store.count().unwrap(), 0);
}

#[tokio::test]
async fn test_invalid_config_fails_before_any_request() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(html("<title>unused</title>"))
        .expect(0)
        .mount(&server)
        .await;

    let mut config = create_test_config(&server);
    config.rate_limit.backoff_base = 1.0;

    let result = Coordinator::new(config, Arc::new(MemoryStore::new()));
    assert!(matches!(result, Err(CrawlerError::Config(_))));
}

#[tokio::test]
async fn test_retry_under_held_slot_keeps_domain_spacing() {
    let server = MockServer::start().await;
    let (responder, arrivals) = TimedResponder::new(503, &["/a"]);
    Mock::given(method("GET"))
        .respond_with(responder)
        .mount(&server)
        .await;

    let mut config = create_test_config(&server);
    config.seeds = vec![format!("{}/a", server.uri()), format!("{}/b", server.uri())];
    config.crawler.max_concurrency = 2;
    config.crawler.max_depth = 0;
    config.rate_limit.min_delay_ms = 400;
    config.fetch.retry_base_delay_ms = 400;

    let (report, store) = run_with_memory_store(config).await;

    assert_eq!(report.completed, 2);
    assert_eq!(report.failed, 0);
    assert_eq!(store.count().unwrap(), 2);

    let arrivals = arrivals.lock().unwrap().clone();
    assert_eq!(arrivals.len(), 3, "{:?}", arrivals);
    let gap = min_arrival_gap(&arrivals);
    assert!(gap >= Duration::from_millis(350), "requests {:?} apart: {:?}", gap, arrivals);
}

#[tokio::test]
async fn test_retry_after_429_keeps_domain_spacing() {
    let server = MockServer::start().await;
    let (responder, arrivals) = TimedResponder::new(429, &["/a"]);
    Mock::given(method("GET"))
        .respond_with(responder)
        .mount(&server)
        .await;

    let mut config = create_test_config(&server);
    config.seeds = vec![format!("{}/a", server.uri()), format!("{}/b", server.uri())];
    config.crawler.max_concurrency = 2;
    config.crawler.max_depth = 0;
    config.rate_limit.min_delay_ms = 300;
    config.rate_limit.backoff_base = 2.0;

    let (report, store) = run_with_memory_store(config).await;

    assert_eq!(report.completed, 2);
    assert_eq!(store.get_by_url(&format!("{}/a", server.uri())).unwrap().len(), 1);

    let arrivals = arrivals.lock().unwrap().clone();
    assert_eq!(arrivals.len(), 3, "{:?}", arrivals);
    let gap = min_arrival_gap(&arrivals);
    assert!(gap >= Duration::from_millis(250), "requests {:?} apart: {:?}", gap, arrivals);
}
