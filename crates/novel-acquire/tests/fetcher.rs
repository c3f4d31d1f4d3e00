mod common;

use std::time::{Duration, Instant};

use serde_json::json;
use tracing::Level;
use wiremock::matchers::{header, method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

use common::{article_body, config_for, LogCapture, API_PATH};
use novel_acquire::{ChapterFetcher, FetchConfig, RetryPolicy};

const FIRST_FAILURE: &str = "Chapter fetch failed, retrying";
const RETRY_COUNT: &str = "Retry (";
const EXHAUSTED: &str = "Chapter fetch failed, retry budget exhausted";

async fn requests(server: &MockServer) -> usize {
    server.received_requests().await.map(|r| r.len()).unwrap_or(0)
}

#[tokio::test]
async fn sends_contract_query_and_headers() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path(API_PATH))
        .and(query_param("device_platform", "android"))
        .and(query_param("parent_enterfrom", "novel_channel_search.tab."))
        .and(query_param("aid", "2329"))
        .and(query_param("platform_id", "1"))
        .and(query_param("group_id", "7001"))
        .and(query_param("item_id", "7001"))
        .and(header("user-agent", "novel-test/1.0"))
        .respond_with(ResponseTemplate::new(200).set_body_json(article_body("<article><p>你好</p></article>")))
        .expect(1)
        .mount(&server)
        .await;

    let fetcher = ChapterFetcher::new(config_for(&server)).unwrap();
    let result = fetcher.fetch("7001", "第一章").await;

    assert_eq!(result.chapter_id, "7001");
    assert_eq!(result.title, "第一章");
    assert_eq!(
        result.raw_article_markup.as_deref(),
        Some("<article><p>你好</p></article>")
    );
    assert_eq!(result.attempts, 1);
}

#[tokio::test]
async fn recovers_on_fifth_attempt_after_transport_faults() {
    let logs = LogCapture::default();
    let _guard = logs.install();

    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path(API_PATH))
        .respond_with(ResponseTemplate::new(502).set_body_string("<html>bad gateway</html>"))
        .up_to_n_times(4)
        .with_priority(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path(API_PATH))
        .respond_with(ResponseTemplate::new(200).set_body_json(article_body("<article>ok</article>")))
        .with_priority(2)
        .mount(&server)
        .await;

    let fetcher = ChapterFetcher::new(config_for(&server)).unwrap();
    let result = fetcher.fetch("7002", "第二章").await;

    assert_eq!(result.raw_article_markup.as_deref(), Some("<article>ok</article>"));
    assert_eq!(result.attempts, 5);
    assert_eq!(requests(&server).await, 5);

    // One retry warning per failed attempt; the fifth attempt succeeded.
    assert_eq!(logs.count(Level::WARN, FIRST_FAILURE), 1);
    assert_eq!(logs.count(Level::WARN, RETRY_COUNT), 4);
    assert!(logs.at(Level::WARN)[4].message.starts_with("Retry (4/5)"));
    assert!(logs.at(Level::ERROR).is_empty());

    let first = &logs.at(Level::WARN)[0];
    assert_eq!(first.field("chapter_id"), Some("7002"));
    assert_eq!(first.field("title"), Some("第二章"));
    assert!(first.field("error").unwrap().contains("not valid JSON"));
}

#[tokio::test]
async fn missing_content_field_counts_as_failure() {
    let logs = LogCapture::default();
    let _guard = logs.install();

    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path(API_PATH))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"code": 0, "data": {}})))
        .up_to_n_times(2)
        .with_priority(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path(API_PATH))
        .respond_with(ResponseTemplate::new(200).set_body_json(article_body("<article>x</article>")))
        .with_priority(2)
        .mount(&server)
        .await;

    let fetcher = ChapterFetcher::new(config_for(&server)).unwrap();
    let result = fetcher.fetch("7003", "第三章").await;

    assert_eq!(result.raw_article_markup.as_deref(), Some("<article>x</article>"));
    assert_eq!(result.attempts, 3);
    assert_eq!(logs.count(Level::WARN, FIRST_FAILURE), 1);
    assert_eq!(logs.count(Level::WARN, RETRY_COUNT), 2);
    assert!(logs.at(Level::WARN)[0]
        .field("error")
        .unwrap()
        .contains("data.content"));
}

#[tokio::test]
async fn exhausts_after_five_failures() {
    let logs = LogCapture::default();
    let _guard = logs.install();

    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path(API_PATH))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"code": -1, "message": "item not found"})))
        .mount(&server)
        .await;

    let fetcher = ChapterFetcher::new(config_for(&server)).unwrap();
    let result = fetcher.fetch("7004", "第四章").await;

    assert!(result.is_exhausted());
    assert_eq!(result.attempts, 5);
    assert_eq!(requests(&server).await, 5);

    assert_eq!(logs.count(Level::WARN, FIRST_FAILURE), 1);
    assert_eq!(logs.count(Level::WARN, RETRY_COUNT), 5);

    let errors = logs.at(Level::ERROR);
    assert_eq!(errors.len(), 1);
    assert!(errors[0].message.starts_with(EXHAUSTED));
    assert_eq!(errors[0].field("chapter_id"), Some("7004"));
    assert_eq!(errors[0].field("title"), Some("第四章"));
}

#[tokio::test]
async fn timeout_counts_as_one_attempt() {
    let logs = LogCapture::default();
    let _guard = logs.install();

    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path(API_PATH))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(article_body("<article>late</article>"))
                .set_delay(Duration::from_secs(5)),
        )
        .mount(&server)
        .await;

    let mut config = config_for(&server);
    config.timeout = Duration::from_millis(150);
    config.retry = RetryPolicy::new(2, Duration::ZERO);

    let fetcher = ChapterFetcher::new(config).unwrap();
    let result = fetcher.fetch("7005", "第五章").await;

    assert!(result.is_exhausted());
    assert_eq!(result.attempts, 2);
    assert!(logs.at(Level::WARN)[0]
        .field("error")
        .unwrap()
        .contains("timed out"));
    assert_eq!(logs.at(Level::ERROR).len(), 1);
}

#[tokio::test]
async fn connection_refused_is_retried_then_skipped() {
    let mut config = FetchConfig::with_user_agent("novel-test/1.0");
    config.api_base = "http://127.0.0.1:1/api/".into();
    config.timeout = Duration::from_millis(500);

    let fetcher = ChapterFetcher::new(config).unwrap();
    let result = fetcher.fetch("7006", "第六章").await;

    assert!(result.is_exhausted());
    assert_eq!(result.attempts, 5);
}

#[tokio::test]
async fn retry_delay_is_applied_between_attempts() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path(API_PATH))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"data": null})))
        .mount(&server)
        .await;

    let mut config = config_for(&server);
    config.retry = RetryPolicy::new(3, Duration::from_millis(60));

    let fetcher = ChapterFetcher::new(config).unwrap();
    let started = Instant::now();
    let result = fetcher.fetch("7007", "第七章").await;

    assert!(result.is_exhausted());
    assert_eq!(requests(&server).await, 3);
    // Two pauses: after attempt 1 and after attempt 2, none after the last.
    assert!(started.elapsed() >= Duration::from_millis(120));
}
