use proxy_harvester::{
    Candidate, CrawlerConfig, Fetch, HarvestError, Protocol, ProxyCrawler, ProxySource,
};
use std::time::Duration;
use wiremock::matchers::{header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn crawler() -> ProxyCrawler {
    ProxyCrawler::with_config(CrawlerConfig::new().with_timeout(Duration::from_secs(5))).unwrap()
}

#[tokio::test]
async fn fetch_extracts_ipv4_candidates() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/socks5.txt"))
        .respond_with(ResponseTemplate::new(200).set_body_string(
            "socks5://1.1.1.1:1080\r\n2.2.2.2:1080\n\nexample.com:1080\n2.2.2.2:1080\n",
        ))
        .mount(&server)
        .await;

    let source = ProxySource::new(&format!("{}/socks5.txt", server.uri()), Protocol::Socks5);
    let candidates = crawler().fetch(&source).await;

    assert_eq!(candidates.len(), 2);
    assert!(candidates.contains(&Candidate::new("1.1.1.1:1080", Protocol::Socks5)));
    assert!(candidates.contains(&Candidate::new("2.2.2.2:1080", Protocol::Socks5)));
}

#[tokio::test]
async fn non_success_status_is_reported() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/gone"))
        .respond_with(ResponseTemplate::new(404).set_body_string("1.1.1.1:80"))
        .mount(&server)
        .await;

    let source = ProxySource::new(&format!("{}/gone", server.uri()), Protocol::Http);
    let crawler = crawler();

    let err = crawler.try_fetch(&source).await.unwrap_err();
    match err {
        HarvestError::SourceStatus { status, .. } => assert_eq!(status.as_u16(), 404),
        other => panic!("unexpected error: {}", other),
    }
    assert!(crawler.fetch(&source).await.is_empty());
}

#[tokio::test]
async fn slow_source_times_out() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/slow"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_string("1.1.1.1:80")
                .set_delay(Duration::from_secs(3)),
        )
        .mount(&server)
        .await;

    let crawler =
        ProxyCrawler::with_config(CrawlerConfig::new().with_timeout(Duration::from_millis(300)))
            .unwrap();
    let source = ProxySource::new(&format!("{}/slow", server.uri()), Protocol::Http);

    let err = crawler.try_fetch(&source).await.unwrap_err();
    assert!(matches!(err, HarvestError::SourceFetch { .. }));
}

#[tokio::test]
async fn configured_user_agent_is_sent() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(header("user-agent", "harvest-test"))
        .respond_with(ResponseTemplate::new(200).set_body_string("5.5.5.5:8080"))
        .mount(&server)
        .await;

    let crawler = ProxyCrawler::with_config(
        CrawlerConfig::new().with_user_agent("harvest-test".to_string()),
    )
    .unwrap();
    let source = ProxySource::new(&format!("{}/list", server.uri()), Protocol::Http);

    assert_eq!(crawler.fetch(&source).await.len(), 1);
}
