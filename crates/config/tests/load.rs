use std::time::Duration;

use app_config::{AppConfig, StorageBackend};

fn from_defaults(overrides: &[(&str, &str)]) -> AppConfig {
    let mut builder = AppConfig::defaults().unwrap();
    for (key, value) in overrides {
        builder = builder.set_override(*key, *value).unwrap();
    }
    builder.build().unwrap().try_deserialize().unwrap()
}

#[test]
fn test_defaults() {
    let cfg = from_defaults(&[]);
    assert_eq!(cfg.storage, StorageBackend::Postgres);
    assert_eq!(cfg.db_host, "localhost");
    assert_eq!(cfg.db_port, 5432);
    assert_eq!(cfg.default_page_size, 5);
    assert_eq!(cfg.token_lifetime, Duration::from_secs(24 * 60 * 60));
    assert_eq!(cfg.shutdown_timeout, Duration::from_secs(5));
    assert!(cfg.admin_login.is_none());
}

#[test]
fn test_overrides() {
    let cfg = from_defaults(&[
        ("storage", "memory"),
        ("token_lifetime", "2h"),
        ("http_port", "9000"),
        ("admin_login", "root"),
    ]);
    assert_eq!(cfg.storage, StorageBackend::Memory);
    assert_eq!(cfg.token_lifetime, Duration::from_secs(2 * 60 * 60));
    assert_eq!(cfg.http_port, 9000);
    assert_eq!(cfg.admin_login.as_deref(), Some("root"));
}

#[test]
fn test_invalid_duration_is_rejected() {
    let result = AppConfig::defaults()
        .unwrap()
        .set_override("token_lifetime", "soon")
        .unwrap()
        .build()
        .unwrap()
        .try_deserialize::<AppConfig>();
    assert!(result.is_err());
}
