// Kept in its own test binary: it mutates the process environment.
use fabrica_watch::config::ConfigError;
use fabrica_watch::sender::WireFormat;
use fabrica_watch::{Level, WatchConfig};
use std::time::Duration;

#[test]
fn test_environment_overrides() {
    // SAFETY: no other test in this binary touches the environment
    unsafe {
        std::env::set_var("WATCH_CONFIG", "domain = \"from-toml\"\nbatch_size = 20");
        std::env::set_var("WATCH_BASE_URL", "http://collector:9000");
        std::env::set_var("WATCH_BATCH_SIZE", "64");
        std::env::set_var("WATCH_FLUSH_INTERVAL_MS", "40");
        std::env::set_var("WATCH_WIRE_FORMAT", "JSON");
        std::env::set_var("WATCH_DEFAULT_LEVEL", "error");
    }

    let config = WatchConfig::from_env().unwrap();
    assert_eq!(config.domain, "from-toml");
    assert_eq!(config.base_url, "http://collector:9000");
    assert_eq!(config.batch_size, 64);
    assert_eq!(config.flush_interval, Duration::from_millis(40));
    assert_eq!(config.wire_format, WireFormat::Json);
    assert_eq!(config.default_level, Level::Error);

    unsafe {
        std::env::set_var("WATCH_BATCH_SIZE", "lots");
    }
    assert!(matches!(
        WatchConfig::from_env(),
        Err(ConfigError::EnvError(_))
    ));

    unsafe {
        std::env::set_var("WATCH_BATCH_SIZE", "64");
        std::env::set_var("WATCH_MATCH_MODE", "fuzzy");
    }
    assert!(matches!(
        WatchConfig::from_env(),
        Err(ConfigError::EnvError(_))
    ));
}
