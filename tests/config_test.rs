//! Configuration loading through the public API.

use std::time::Duration;

use portfwd::config::{
    BasicValidator, ConfigError, ConfigLoader, LogFormat, LogOutput, PortConflictValidator,
};
use portfwd::forwarder::{Destination, ListenAddr};
use tempfile::tempdir;

fn loader() -> ConfigLoader {
    ConfigLoader::new()
        .with_validator(BasicValidator::new())
        .with_validator(PortConflictValidator::new())
}

#[test]
fn test_toml_file_to_rules() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("portfwd.toml");
    std::fs::write(
        &path,
        r#"
        [logging]
        format = "compact"
        output = "stderr"

        [forwarding]
        connect_timeout_secs = 2

        [forwards]
        "TCP://*:9000" = "127.0.0.1:80"
        "tcp://[::1]:2222" = "backend.internal:22"
        "#,
    )
    .unwrap();

    let loaded = loader().load(&path).unwrap();
    assert!(loaded.warnings.is_empty());
    let config = loaded.config;
    assert_eq!(config.logging.format, LogFormat::Compact);
    assert_eq!(config.logging.output, LogOutput::Stderr);

    let settings = config.forwarding.session_settings();
    assert_eq!(settings.connect_timeout, Some(Duration::from_secs(2)));

    let rules = config.rules().unwrap();
    assert_eq!(rules.len(), 2);
    assert_eq!(rules[0].listen, ListenAddr::any(9000));
    assert_eq!(rules[0].destination, Destination::new("127.0.0.1", 80));
    assert_eq!(rules[1].listen, ListenAddr::named("::1", 2222));
    assert_eq!(rules[1].destination, Destination::new("backend.internal", 22));
}

#[test]
fn test_json_file_to_rules() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("portfwd.json");
    std::fs::write(
        &path,
        r#"{ "forwards": { "tcp://*:8080": "10.1.2.3:8080" } }"#,
    )
    .unwrap();

    let rules = loader().load(&path).unwrap().config.rules().unwrap();
    assert_eq!(rules.len(), 1);
    assert_eq!(rules[0].to_string(), "tcp://*:8080 => 10.1.2.3:8080");
}

#[test]
fn test_overlapping_listeners_reported_as_warnings() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("portfwd.json");
    std::fs::write(
        &path,
        r#"{
            // both bind port 9000
            "forwards": {
                "tcp://*:9000": "127.0.0.1:80",
                "tcp://127.0.0.1:9000": "127.0.0.1:81"
            }
        }"#,
    )
    .unwrap();

    let loaded = loader().load(&path).unwrap();
    assert_eq!(loaded.config.rules().unwrap().len(), 2);
    assert_eq!(loaded.warnings.len(), 1);
    assert!(loaded.warnings[0].to_string().contains("conflicts with *:9000"));
}

#[test]
fn test_rejects_bad_forward() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("portfwd.toml");
    std::fs::write(&path, "[forwards]\n\"tcp://*:70000\" = \"127.0.0.1:80\"\n").unwrap();

    let err = loader().load(&path).unwrap_err();
    assert!(matches!(err, ConfigError::ValidationError(_)));
}

#[test]
fn test_missing_file() {
    let dir = tempdir().unwrap();
    let err = loader().load(dir.path().join("absent.toml")).unwrap_err();
    assert!(matches!(err, ConfigError::NotFound(_)));
}
