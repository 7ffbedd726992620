use super::load_config;
use super::settings::Settings;
use serial_test::serial;
use std::env;
use std::fs;
use tempfile::TempDir;

#[test]
fn test_default_settings() {
    let settings = Settings::default();
    assert_eq!(settings.server.host, "127.0.0.1");
    assert_eq!(settings.server.port, 8080);
    assert_eq!(settings.broker.key_range, 1000);
    assert_eq!(settings.broker.partitions, 10);
    assert_eq!(settings.broker.queue_capacity, 100);
    assert_eq!(settings.persistence.batch_threshold, 50);
    assert!(settings.validate().is_ok());
}

#[test]
fn test_validate_rejects_bad_partitioning() {
    let mut settings = Settings::default();
    settings.broker.partitions = 0;
    assert!(settings.validate().is_err());

    let mut settings = Settings::default();
    settings.broker.key_range = 5;
    settings.broker.partitions = 10;
    assert!(settings.validate().is_err());

    let mut settings = Settings::default();
    settings.broker.queue_capacity = 0;
    assert!(settings.validate().is_err());

    let mut settings = Settings::default();
    settings.persistence.batch_threshold = 0;
    assert!(settings.validate().is_err());
}

#[test]
#[serial]
fn load_config_from_file_overrides_defaults() {
    // load_config reads config/default.toml relative to the current dir.
    let tmp = TempDir::new().expect("create tempdir");
    let orig = env::current_dir().expect("current_dir");
    env::set_current_dir(tmp.path()).expect("set current dir");

    fs::create_dir_all("config").expect("create config dir");
    let toml = r#"
        [server]
        host = "0.0.0.0"
        port = 9000

        [broker]
        partitions = 4
        queue_capacity = 16

        [retry]
        max_retries = 2
    "#;
    fs::write("config/default.toml", toml).expect("write config file");

    let cfg = load_config();

    // restore cwd before asserting so a failure doesn't leak into other tests
    env::set_current_dir(orig).expect("restore cwd");

    let cfg = cfg.expect("load_config failed");
    assert_eq!(cfg.server.host, "0.0.0.0");
    assert_eq!(cfg.server.port, 9000);
    assert_eq!(cfg.broker.partitions, 4);
    assert_eq!(cfg.broker.queue_capacity, 16);
    assert_eq!(cfg.broker.key_range, 1000);
    assert_eq!(cfg.retry.max_retries, 2);
    assert_eq!(cfg.retry.base_delay_ms, 1000);
}

#[test]
#[serial]
fn load_config_from_env_overrides_defaults() {
    temp_env::with_vars(
        [
            ("SHARDSUB_BROKER__KEY_RANGE", Some("64")),
            ("SHARDSUB_BROKER__PARTITIONS", Some("8")),
            ("SHARDSUB_PERSISTENCE__ENABLED", Some("false")),
        ],
        || {
            let cfg = load_config().expect("load_config failed");
            assert_eq!(cfg.broker.key_range, 64);
            assert_eq!(cfg.broker.partitions, 8);
            assert!(!cfg.persistence.enabled);
            assert_eq!(cfg.server.port, 8080);
        },
    );
}
