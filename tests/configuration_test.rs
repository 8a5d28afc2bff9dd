use fabrica_watch::config::{ConfigError, LogLevel};
use fabrica_watch::sender::WireFormat;
use fabrica_watch::{Destination, Level, MatchMode, WatchConfig};
use std::io::Write;
use std::time::Duration;
use tempfile::NamedTempFile;

const SAMPLE: &str = r#"
base_url = "https://collector.internal:8443/watch"
domain = "orders"
batch_size = 50
flush_interval = 250
poll_interval = 10000
failure_threshold = 5
base_retry_delay = 1000
max_retry_delay = 60000
wire_format = "json"
destination = "console"
match_mode = "ignore_ascii_case"
default_level = "info"
log_level = "debug"
remote_switches = false

[[switches]]
Pattern = "Orders.Payments"
Tag = "payments"
Level = 1

[[switches]]
Pattern = "Orders.Noise"
IsQuiet = true
"#;

#[test]
fn test_load_from_file() {
    let mut file = NamedTempFile::new().unwrap();
    file.write_all(SAMPLE.as_bytes()).unwrap();

    let config = WatchConfig::from_file(file.path()).unwrap();
    assert_eq!(config.domain, "orders");
    assert_eq!(config.batch_size, 50);
    assert_eq!(config.flush_interval, Duration::from_millis(250));
    assert_eq!(config.poll_interval, Duration::from_secs(10));
    assert_eq!(config.wire_format, WireFormat::Json);
    assert_eq!(config.destination, Destination::Console);
    assert_eq!(config.match_mode, MatchMode::IgnoreAsciiCase);
    assert_eq!(config.default_level, Level::Info);
    assert_eq!(config.log_level, LogLevel::Debug);
    assert!(!config.remote_switches);
    assert_eq!(config.switches.len(), 2);
    assert_eq!(config.switches[0].level, 1);
    assert!(config.switches[1].is_quiet);

    // Unset keys keep their defaults
    assert_eq!(config.max_critical_buffer_size, 1000);

    let options = config.sink_options();
    assert_eq!(options.domain, "orders");
    assert_eq!(options.circuit.failure_threshold, 5);
    assert_eq!(options.circuit.base_retry_delay, Duration::from_secs(1));
    assert_eq!(config.client_config().base_url, "https://collector.internal:8443/watch");
}

#[test]
fn test_missing_file_is_a_file_error() {
    let result = WatchConfig::from_file("/nonexistent/watch.toml");
    assert!(matches!(result, Err(ConfigError::FileError(_))));
}

#[test]
fn test_malformed_toml_is_a_parse_error() {
    let result = WatchConfig::from_toml_str("batch_size = \"many\"");
    assert!(matches!(result, Err(ConfigError::ParseError(_))));
}

#[test]
fn test_validation_runs_on_load() {
    let result = WatchConfig::from_toml_str("batch_size = 0");
    assert!(matches!(result, Err(ConfigError::InvalidConfig(_))));

    let result = WatchConfig::from_toml_str("domain = \"  \"");
    assert!(matches!(result, Err(ConfigError::InvalidConfig(_))));
}

#[tokio::test]
async fn test_console_destination_from_config() {
    let config = WatchConfig::from_toml_str(SAMPLE).unwrap();
    let watch = fabrica_watch::WatchSink::from_config(&config).unwrap();

    assert!(matches!(
        watch.sink(),
        fabrica_watch::EventSinkKind::Console(_)
    ));
    // Seeded switches are matched case-insensitively
    let logger = watch
        .logger("orders.payments.refunds", fabrica_watch::EmitContext::default())
        .unwrap();
    assert!(logger.is_enabled(Level::Debug));
    assert!(!watch
        .logger("Orders.Noise", fabrica_watch::EmitContext::default())
        .unwrap()
        .is_enabled(Level::Error));

    logger.info("printed to stdout");
    watch.shutdown().await;
    assert_eq!(watch.health().events_delivered, 1);
}
