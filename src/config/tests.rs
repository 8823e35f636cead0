//! Config module tests

use super::*;
use test_case::test_case;

#[test]
fn test_substitute_env_vars_simple() {
    std::env::set_var("JSONKV_TEST_VAR_SIMPLE", "hello");
    let result = substitute_env_vars("value = \"${JSONKV_TEST_VAR_SIMPLE}\"");
    assert_eq!(result, "value = \"hello\"");
    std::env::remove_var("JSONKV_TEST_VAR_SIMPLE");
}

#[test]
fn test_substitute_env_vars_with_default() {
    // Unset var should use default
    std::env::remove_var("JSONKV_TEST_VAR_UNSET");
    let result = substitute_env_vars("value = \"${JSONKV_TEST_VAR_UNSET:-default_value}\"");
    assert_eq!(result, "value = \"default_value\"");

    // Set var should use env value
    std::env::set_var("JSONKV_TEST_VAR_SET", "env_value");
    let result = substitute_env_vars("value = \"${JSONKV_TEST_VAR_SET:-default_value}\"");
    assert_eq!(result, "value = \"env_value\"");
    std::env::remove_var("JSONKV_TEST_VAR_SET");
}

#[test]
fn test_substitute_env_vars_missing_no_default() {
    std::env::remove_var("JSONKV_TEST_VAR_MISSING");
    let result = substitute_env_vars("value = \"${JSONKV_TEST_VAR_MISSING}\"");
    assert_eq!(result, "value = \"\"");
}

#[test]
fn test_load_config_with_env_substitution() {
    let temp_dir = tempfile::tempdir().unwrap();
    let config_path = temp_dir.path().join("jsonkv_test_config.toml");

    std::env::set_var("JSONKV_TEST_DATA_DIR", "/srv/data");

    let config_content = r#"
[db]
location = "${JSONKV_TEST_DATA_DIR}/databases"
idle_timeout_ms = ${JSONKV_TEST_IDLE:-1000}
"#;

    std::fs::write(&config_path, config_content).unwrap();

    let config = Config::load(&config_path).unwrap();
    assert_eq!(
        config.db.location,
        Some(PathBuf::from("/srv/data/databases"))
    );
    assert_eq!(config.db.idle_timeout_ms, Some(1000)); // Uses default
    assert_eq!(config.db.flush_interval_ms, None);
    assert_eq!(config.log.level, "info");

    std::env::remove_var("JSONKV_TEST_DATA_DIR");
}

#[test]
fn test_load_missing_file_uses_defaults() {
    let temp_dir = tempfile::tempdir().unwrap();
    let config = Config::load(temp_dir.path().join("absent.toml")).unwrap();
    assert_eq!(config.log.level, "info");
    assert_eq!(config.database().idle_timeout, Some(Duration::from_secs(300)));
}

#[test]
fn test_default_config() {
    let config = DbConfig::default();
    assert!(config.location.ends_with("databases"));
    assert_eq!(config.idle_timeout, Some(Duration::from_millis(300_000)));
    assert_eq!(config.flush_interval, None);
    assert_eq!(config.fallback, Fallback::Falsy);
}

#[test]
fn test_resolve_fills_only_missing_fields() {
    let options = DbOptions {
        location: Some(PathBuf::from("/tmp/dbs")),
        idle_timeout_ms: None,
        flush_interval_ms: Some(500),
        fallback: None,
    };
    let snapshot = options.clone();

    let config = DbConfig::resolve(Some(&options));
    assert_eq!(config.location, PathBuf::from("/tmp/dbs"));
    assert_eq!(config.idle_timeout, Some(Duration::from_millis(300_000)));
    assert_eq!(config.flush_interval, Some(Duration::from_millis(500)));
    assert_eq!(config.fallback, Fallback::Falsy);

    // Caller's options are untouched
    assert_eq!(options, snapshot);
}

#[test_case(-1, None ; "minus one disables")]
#[test_case(-5, None ; "any negative disables")]
#[test_case(0, Some(Duration::ZERO) ; "zero closes immediately")]
#[test_case(10_000, Some(Duration::from_secs(10)) ; "positive is milliseconds")]
fn test_resolve_idle_timeout(ms: i64, expected: Option<Duration>) {
    let options = DbOptions {
        idle_timeout_ms: Some(ms),
        ..Default::default()
    };
    assert_eq!(DbConfig::resolve(Some(&options)).idle_timeout, expected);
}

#[test_case(-1, None ; "negative is unlimited")]
#[test_case(0, None ; "zero is unlimited")]
#[test_case(250, Some(Duration::from_millis(250)) ; "positive is a window")]
fn test_resolve_flush_interval(ms: i64, expected: Option<Duration>) {
    let options = DbOptions {
        flush_interval_ms: Some(ms),
        ..Default::default()
    };
    assert_eq!(DbConfig::resolve(Some(&options)).flush_interval, expected);
}

#[test]
fn test_database_path() {
    let config = DbConfig::resolve(Some(&DbOptions {
        location: Some(PathBuf::from("/var/lib/jsonkv/")),
        ..Default::default()
    }));
    assert_eq!(
        config.database_path("users"),
        PathBuf::from("/var/lib/jsonkv/users.db.json")
    );
}

#[test]
fn test_parse_full_config() {
    let config = Config::parse(
        r#"
[log]
level = "debug"

[db]
location = "./data"
idle_timeout_ms = -1
flush_interval_ms = 500
fallback = "absent"
"#,
    )
    .unwrap();

    assert_eq!(config.log.level, "debug");
    let db = config.database();
    assert_eq!(db.location, PathBuf::from("./data"));
    assert_eq!(db.idle_timeout, None);
    assert_eq!(db.flush_interval, Some(Duration::from_millis(500)));
    assert_eq!(db.fallback, Fallback::Absent);
}

#[test]
fn test_parse_rejects_invalid_idle_timeout() {
    let result = Config::parse("[db]\nidle_timeout_ms = -2\n");
    assert!(matches!(result, Err(ConfigError::Validation(_))));
}

#[test]
fn test_parse_rejects_unknown_fallback() {
    let result = Config::parse("[db]\nfallback = \"sometimes\"\n");
    assert!(matches!(result, Err(ConfigError::Parse(_))));
}
