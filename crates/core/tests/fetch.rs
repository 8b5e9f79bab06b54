//! Fetch client tests against a local mock server
use std::time::Duration;

use ferret_core::{FetchConfig, FetchErrorKind, HttpFetcher, Identity, PageFetcher};
use rstest::rstest;
use wiremock::matchers::{header, header_regex, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

#[tokio::test]
async fn test_fetch_returns_html_and_content_type() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/story"))
        .respond_with(ResponseTemplate::new(200).set_body_raw("<html>ok</html>", "text/html; charset=utf-8"))
        .mount(&server)
        .await;

    let fetcher = HttpFetcher::new(FetchConfig::default()).unwrap();
    let url = format!("{}/story", server.uri());

    let page = fetcher.fetch(&url, Identity::Browser).await.expect("fetch ok");
    assert_eq!(page.html, "<html>ok</html>");
    assert_eq!(page.final_url, url);
    assert_eq!(page.content_length, 15);
    assert!(page.content_type.unwrap().starts_with("text/html"));
}

#[tokio::test]
async fn test_fetch_reports_final_url_after_redirect() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/old"))
        .respond_with(ResponseTemplate::new(301).insert_header("Location", format!("{}/new", server.uri()).as_str()))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/new"))
        .respond_with(ResponseTemplate::new(200).set_body_string("<html>moved</html>"))
        .mount(&server)
        .await;

    let fetcher = HttpFetcher::new(FetchConfig::default()).unwrap();
    let page = fetcher.fetch(&format!("{}/old", server.uri()), Identity::Browser).await.unwrap();
    assert_eq!(page.final_url, format!("{}/new", server.uri()));
}

#[tokio::test]
async fn test_identities_send_distinct_headers() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(header_regex("user-agent", "Googlebot"))
        .respond_with(ResponseTemplate::new(200).set_body_string("crawler"))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(header("sec-fetch-mode", "navigate"))
        .respond_with(ResponseTemplate::new(200).set_body_string("browser"))
        .mount(&server)
        .await;

    let fetcher = HttpFetcher::new(FetchConfig::default()).unwrap();
    let url = format!("{}/page", server.uri());

    assert_eq!(fetcher.fetch(&url, Identity::Crawler).await.unwrap().html, "crawler");
    assert_eq!(fetcher.fetch(&url, Identity::Browser).await.unwrap().html, "browser");
}

#[rstest]
#[case(403, FetchErrorKind::Blocked)]
#[case(451, FetchErrorKind::Blocked)]
#[case(404, FetchErrorKind::Http)]
#[case(502, FetchErrorKind::Http)]
#[tokio::test]
async fn test_status_classification(#[case] status: u16, #[case] kind: FetchErrorKind) {
    let server = MockServer::start().await;
    Mock::given(method("GET")).respond_with(ResponseTemplate::new(status)).mount(&server).await;

    let fetcher = HttpFetcher::new(FetchConfig::default()).unwrap();
    let err = fetcher.fetch(&format!("{}/x", server.uri()), Identity::Browser).await.unwrap_err();
    assert_eq!(err.kind, kind);
    assert_eq!(err.status_code, Some(status));
}

#[tokio::test]
async fn test_fetch_times_out() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(200).set_delay(Duration::from_millis(500)).set_body_string("slow"))
        .mount(&server)
        .await;

    let config = FetchConfig { crawler_timeout: Duration::from_millis(50), ..FetchConfig::default() };
    let fetcher = HttpFetcher::new(config).unwrap();

    let err = fetcher.fetch(&format!("{}/slow", server.uri()), Identity::Crawler).await.unwrap_err();
    assert_eq!(err.kind, FetchErrorKind::Timeout);
}

#[tokio::test]
async fn test_connection_refused_is_network() {
    let url = "http://127.0.0.1:1/gone";

    let fetcher = HttpFetcher::new(FetchConfig::default()).unwrap();
    let err = fetcher.fetch(url, Identity::Browser).await.unwrap_err();
    assert_eq!(err.kind, FetchErrorKind::Network);
}
