use std::io::Write;

use motion_link_lib::config::{ConfigError, LinkConfig, Parity, StopBits, Verbosity};
use motion_link_lib::serial::{FrameTransport, LinkVariant};

#[test]
fn test_load_link_config_from_file() {
    let mut file = tempfile::NamedTempFile::new().expect("temp file");
    write!(
        file,
        r#"{{
            "port": "/dev/ttyACM0",
            "baud_rate": 1000000,
            "parity": "even",
            "stop_bits": "two",
            "node_id": 144,
            "variant": "framed_stuffed",
            "verbosity": 1,
            "read_timeout_ms": 50,
            "verify_response_crc": false
        }}"#
    )
    .expect("write config");

    let config = LinkConfig::from_file(file.path()).expect("config loads");
    config.validate().expect("config is valid");

    assert_eq!(config.serial.port, "/dev/ttyACM0");
    assert_eq!(config.serial.baud_rate, 1_000_000);
    assert_eq!(config.serial.parity, Parity::Even);
    assert_eq!(config.serial.stop_bits, StopBits::Two);
    assert_eq!(config.verbosity, Verbosity::Summary);
    assert!(!config.verify_response_crc);

    let transport = FrameTransport::from_config(&config);
    assert_eq!(transport.variant(), LinkVariant::FramedStuffed);
    assert_eq!(transport.node_id(), 0x90);
}

#[test]
fn test_missing_file_is_an_io_error() {
    let dir = tempfile::tempdir().expect("temp dir");
    let result = LinkConfig::from_file(dir.path().join("absent.json"));
    assert!(matches!(result, Err(ConfigError::Io(_))));
}

#[test]
fn test_malformed_file_is_a_parse_error() {
    let mut file = tempfile::NamedTempFile::new().expect("temp file");
    write!(file, "{{ \"port\": ").expect("write config");
    assert!(matches!(LinkConfig::from_file(file.path()), Err(ConfigError::Parse(_))));
}
