//! Configuration loading

use std::fs;
use std::path::PathBuf;
use std::time::Duration;

use isthmus_config::{ConfigError, DEFAULT_BENCH_ITERATIONS, IsthmusConfig};
use isthmus_types::GatherPolicy;

fn write_config(content: &str) -> (tempfile::TempDir, PathBuf) {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("config.toml");
    fs::write(&path, content).unwrap();
    (dir, path)
}

#[test]
fn full_config_round_trips_into_accessors() {
    let (_dir, path) = write_config(
        r#"
[fetch]
base_url = "http://127.0.0.1:9999"
request_timeout_ms = 1500
connect_timeout_ms = 250
max_retries = 0
https_only = false

[foreign]
thread_name = "host-loop"
call_timeout_ms = 2000
cancel_grace_ms = 10

[gather]
policy = "first_error_fast"

[bench]
iterations = 500
scenarios = ["no_op", "push"]
"#,
    );
    let config = IsthmusConfig::load_from(&path).unwrap();
    assert_eq!(config.status_base_url(), "http://127.0.0.1:9999");
    assert_eq!(config.request_timeout(), Duration::from_millis(1500));
    assert_eq!(config.connect_timeout(), Duration::from_millis(250));
    assert_eq!(config.max_retries(), 0);
    assert!(!config.https_only());
    assert_eq!(config.foreign_thread_name(), "host-loop");
    assert_eq!(config.foreign_call_timeout(), Some(Duration::from_secs(2)));
    assert_eq!(config.cancel_grace(), Duration::from_millis(10));
    assert_eq!(config.gather_policy(), GatherPolicy::FirstErrorFast);
    assert_eq!(config.bench_iterations(), 500);
    assert_eq!(
        config.bench_scenarios(),
        Some(&["no_op".to_owned(), "push".to_owned()][..])
    );
}

#[test]
fn empty_config_uses_defaults() {
    let (_dir, path) = write_config("");
    let config = IsthmusConfig::load_from(&path).unwrap();
    assert!(config.https_only());
    assert_eq!(config.gather_policy(), GatherPolicy::AllOrFirstError);
    assert_eq!(config.bench_iterations(), DEFAULT_BENCH_ITERATIONS);
    assert_eq!(config.foreign_call_timeout(), None);
}

#[test]
fn unknown_keys_and_bad_values_are_parse_errors() {
    for content in ["[fetch]\nretries = 3\n", "[gather]\npolicy = \"sometimes\"\n"] {
        let (_dir, path) = write_config(content);
        let err = IsthmusConfig::load_from(&path).unwrap_err();
        assert!(matches!(err, ConfigError::Parse { .. }));
        assert_eq!(err.path(), path.as_path());
    }
}

#[test]
fn missing_file_is_a_read_error() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("absent.toml");
    let err = IsthmusConfig::load_from(&path).unwrap_err();
    assert!(matches!(err, ConfigError::Read { .. }));
}
