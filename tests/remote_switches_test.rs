use fabrica_watch::sender::{ClientConfig, HttpClient};
use fabrica_watch::switch::PollerOptions;
use fabrica_watch::{Level, MatchMode, RemoteSwitchSource, SwitchError, SwitchRegistry, SwitchSource};
use std::time::Duration;
use wiremock::matchers::{method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn source(server: &MockServer, options: PollerOptions) -> RemoteSwitchSource {
    let client = HttpClient::new(ClientConfig {
        base_url: server.uri(),
        timeout: Duration::from_secs(2),
        ..Default::default()
    })
    .unwrap();
    RemoteSwitchSource::new(
        client,
        "orders",
        SwitchRegistry::new(Level::Warning, MatchMode::Ordinal),
        options,
    )
    .unwrap()
}

fn switches_body() -> serde_json::Value {
    serde_json::json!([
        { "Pattern": "Fabrica", "Tag": "core", "Level": 9, "Color": -16711936 },
        { "Pattern": "Fabrica.Data", "Tag": "db", "Level": -3 },
        { "Pattern": "Fabrica.Web", "Level": 2, "Color": 4278190335u32 }
    ])
}

#[tokio::test]
async fn test_manual_refresh_applies_clamped_switches() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/api/switches"))
        .and(query_param("domain", "orders"))
        .respond_with(ResponseTemplate::new(200).set_body_json(switches_body()))
        .expect(1)
        .mount(&server)
        .await;

    let source = source(&server, PollerOptions::default());
    let version = tokio_test::assert_ok!(source.update_async().await);
    assert_eq!(version, 1);
    assert_eq!(source.version(), 1);

    let core = source.lookup("Fabrica.Jobs").unwrap();
    assert_eq!(core.level(), Level::Quiet);
    assert!(core.is_quiet());
    assert_eq!(core.color(), 0xFF00_FF00);

    let data = source.lookup("Fabrica.Data.Sql").unwrap();
    assert_eq!(data.pattern(), "Fabrica.Data");
    assert_eq!(data.level(), Level::Trace);
    assert_eq!(data.tag(), "db");

    let web = source.lookup("Fabrica.Web.Api").unwrap();
    assert_eq!(web.level(), Level::Info);
    assert_eq!(web.color(), 0xFF00_00FF);

    let other = source.lookup("Billing").unwrap();
    assert_eq!(other.pattern(), "");
    assert_eq!(other.level(), Level::Warning);

    assert_eq!(source.stats().fetches(), 1);
    assert_eq!(source.stats().failures(), 0);
}

#[tokio::test]
async fn test_server_error_leaves_registry_untouched() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/api/switches"))
        .respond_with(ResponseTemplate::new(500))
        .mount(&server)
        .await;

    let source = source(&server, PollerOptions::default());
    let result = source.update_async().await;

    assert!(matches!(result, Err(SwitchError::Status { status: 500 })));
    assert_eq!(source.version(), 0);
    assert_eq!(source.stats().failures(), 1);
    assert_eq!(source.lookup("Fabrica").unwrap().level(), Level::Warning);
}

#[tokio::test]
async fn test_malformed_body_is_a_decode_error() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/api/switches"))
        .respond_with(ResponseTemplate::new(200).set_body_string("{ not json"))
        .mount(&server)
        .await;

    let source = source(&server, PollerOptions::default());
    assert!(matches!(
        source.update_async().await,
        Err(SwitchError::Decode(_))
    ));
    assert_eq!(source.version(), 0);
}

#[tokio::test]
async fn test_poller_primes_then_keeps_polling() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/api/switches"))
        .respond_with(ResponseTemplate::new(200).set_body_json(switches_body()))
        .mount(&server)
        .await;

    let source = source(
        &server,
        PollerOptions {
            poll_interval: Duration::from_millis(20),
            ..Default::default()
        },
    );
    source.start().unwrap();
    source.start().unwrap();
    assert!(source.is_running());

    let deadline = tokio::time::Instant::now() + Duration::from_secs(5);
    while source.version() < 3 {
        assert!(tokio::time::Instant::now() < deadline, "poller stalled");
        tokio::time::sleep(Duration::from_millis(10)).await;
    }

    source.close().await;
    assert!(!source.is_running());
    let version = source.version();
    tokio::time::sleep(Duration::from_millis(60)).await;
    assert_eq!(source.version(), version, "no fetches after close");

    source.stop();
    source.close().await;
}

#[tokio::test]
async fn test_failed_polls_are_retried() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/api/switches"))
        .respond_with(ResponseTemplate::new(503))
        .up_to_n_times(2)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/api/switches"))
        .respond_with(ResponseTemplate::new(200).set_body_json(switches_body()))
        .mount(&server)
        .await;

    let source = source(
        &server,
        PollerOptions {
            poll_interval: Duration::from_millis(20),
            ..Default::default()
        },
    );
    source.start().unwrap();

    let deadline = tokio::time::Instant::now() + Duration::from_secs(5);
    while source.version() == 0 {
        assert!(tokio::time::Instant::now() < deadline, "poller gave up");
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    source.close().await;

    assert!(source.stats().failures() >= 2);
    assert_eq!(source.lookup("Fabrica.Data").unwrap().level(), Level::Trace);
}

#[tokio::test]
async fn test_primer_only_when_polling_disabled() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/api/switches"))
        .respond_with(ResponseTemplate::new(200).set_body_json(switches_body()))
        .expect(1)
        .mount(&server)
        .await;

    let source = source(
        &server,
        PollerOptions {
            poll_interval: Duration::from_millis(10),
            polling_enabled: false,
            ..Default::default()
        },
    );
    source.start().unwrap();

    let deadline = tokio::time::Instant::now() + Duration::from_secs(5);
    while source.version() == 0 {
        assert!(tokio::time::Instant::now() < deadline, "primer fetch missing");
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    tokio::time::sleep(Duration::from_millis(50)).await;
    assert_eq!(source.version(), 1);
    source.close().await;
}

#[test]
fn test_start_outside_runtime_is_rejected() {
    let client = HttpClient::new(ClientConfig::default()).unwrap();
    let source = RemoteSwitchSource::new(
        client,
        "orders",
        SwitchRegistry::default(),
        PollerOptions::default(),
    )
    .unwrap();

    assert!(matches!(source.start(), Err(SwitchError::Runtime(_))));
    assert!(!source.is_running());
}
