use std::fs;
use std::path::PathBuf;
use std::time::Duration;

use switch_harness::config::{Config, ConfigError, RecordSetting};
use switch_harness::server::{RecordFile, ValidationError};

fn write_config(content: &str) -> (tempfile::TempDir, PathBuf) {
    let dir = tempfile::tempdir().expect("Failed to create temp dir");
    let path = dir.path().join("config.toml");
    fs::write(&path, content).expect("Failed to write config");
    (dir, path)
}

/// Defaults match the server's own defaults.
#[test]
fn test_config_default_values() {
    let config = Config::default();

    assert_eq!(config.server.video_port, 3000);
    assert_eq!(config.server.audio_port, 4000);
    assert_eq!(config.server.controller_address, "tcp:host=0.0.0.0,port=5000");
    assert_eq!(config.server.record, RecordSetting::Flag(false));
    assert!(config.server.path.is_none());
    assert!(config.harness.log_to_file);
    assert_eq!(config.log_file(), Some(PathBuf::from("server.log")));
    assert_eq!(config.startup_pattern(), "tcp:host=0.0.0.0,port=5000");
    assert_eq!(config.startup_timeout(), Duration::from_secs(5));
    assert!(config.validate().is_ok());
}

#[test]
fn test_config_path_ends_with_expected() {
    let path = Config::config_path();
    assert!(path.ends_with("switch-harness/config.toml"));
}

#[test]
fn test_load_full_file() {
    let (_dir, path) = write_config(
        r#"
[server]
path = "/opt/gst-switch/bin"
video_port = 3100
audio_port = 4100
controller_address = "tcp:host=127.0.0.1,port=5100"
record = "session.data"
video_format = "debug"
gst_option = "--gst-debug-no-color"

[harness]
log_to_file = false
startup_pattern = "ready"
startup_timeout_secs = 12
"#,
    );

    let config = Config::load_from(&path).expect("Should load config");

    assert_eq!(config.server.gst_option, "--gst-debug-no-color");
    assert_eq!(config.log_file(), None);
    assert_eq!(config.startup_pattern(), "ready");
    assert_eq!(config.startup_timeout(), Duration::from_secs(12));

    let options = config.server_options().unwrap();
    assert_eq!(options.path, Some(PathBuf::from("/opt/gst-switch/bin")));
    assert_eq!(options.video_port.get(), 3100);
    assert_eq!(options.audio_port.get(), 4100);
    assert_eq!(options.controller_address.as_str(), "tcp:host=127.0.0.1,port=5100");
    assert_eq!(options.record_file, RecordFile::Named("session.data".into()));
    assert_eq!(options.video_format.as_deref(), Some("debug"));
}

#[test]
fn test_record_flag_accepts_bool() {
    let config: Config = toml::from_str("[server]\nrecord = true\n").unwrap();
    assert_eq!(config.server_options().unwrap().record_file, RecordFile::Default);
}

#[test]
fn test_missing_sections_use_defaults() {
    let (_dir, path) = write_config("");
    assert_eq!(Config::load_from(&path).unwrap(), Config::default());
}

#[test]
fn test_missing_file_is_read_error() {
    let dir = tempfile::tempdir().unwrap();
    let err = Config::load_from(&dir.path().join("absent.toml")).unwrap_err();
    assert!(matches!(err, ConfigError::ReadError { .. }));
}

#[test]
fn test_invalid_toml_is_parse_error() {
    let (_dir, path) = write_config("this is not valid toml [[[");
    let err = Config::load_from(&path).unwrap_err();
    assert!(matches!(err, ConfigError::ParseError { .. }));
}

#[test]
fn test_out_of_range_port_fails_validation() {
    let (_dir, path) = write_config("[server]\nvideo_port = 70000\n");
    let err = Config::load_from(&path).unwrap_err();
    assert!(matches!(
        err,
        ConfigError::ValidationError(ValidationError::PortRange { value: 70000, .. })
    ));
}

#[test]
fn test_address_without_delimiter_fails_validation() {
    let (_dir, path) = write_config("[server]\ncontroller_address = \"localhost\"\n");
    let err = Config::load_from(&path).unwrap_err();
    assert!(matches!(
        err,
        ConfigError::ValidationError(ValidationError::AddressMissingDelimiter(_))
    ));
}

#[test]
fn test_record_name_with_slash_fails_validation() {
    let (_dir, path) = write_config("[server]\nrecord = \"dir/out.data\"\n");
    let err = Config::load_from(&path).unwrap_err();
    assert!(matches!(
        err,
        ConfigError::ValidationError(ValidationError::RecordFileSlash(_))
    ));
}

#[test]
fn test_config_roundtrip() {
    let mut config = Config::default();
    config.server.record = RecordSetting::Name("take1.data".into());
    config.harness.tools_dir = Some(PathBuf::from("/src/gst-switch"));

    let serialized = toml::to_string_pretty(&config).unwrap();
    let parsed: Config = toml::from_str(&serialized).unwrap();

    assert_eq!(parsed, config);
}
