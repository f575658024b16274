//! Unit tests for `AppError` display format and conversions.

use groupctl::{AppError, RelayDirection};

#[test]
fn prefixes_identify_the_variant() {
    let cases = [
        (AppError::Config("x".into()), "config: x"),
        (AppError::Validation("x".into()), "invalid spec: x"),
        (AppError::AlreadyExists("x".into()), "already exists: x"),
        (AppError::NotFound("x".into()), "not found: x"),
        (AppError::Transport("x".into()), "transport: x"),
        (AppError::Unauthorized("x".into()), "unauthorized: x"),
        (AppError::Timeout("x".into()), "timeout: x"),
        (AppError::Cancelled("x".into()), "cancelled: x"),
        (AppError::Io("x".into()), "io: x"),
    ];
    for (err, expected) in cases {
        assert_eq!(err.to_string(), expected);
    }
}

#[test]
fn configuration_failed_names_the_group() {
    let err = AppError::ConfigurationFailed {
        group: "g1".into(),
        reason: "transport: connection refused".into(),
    };
    let message = err.to_string();
    assert!(message.contains("\"g1\""), "{message}");
    assert!(message.contains("was created"), "{message}");
    assert!(message.ends_with("connection refused"), "{message}");
}

#[test]
fn relay_errors_carry_direction_specific_messages() {
    let down = AppError::relay(RelayDirection::Downstream, "websocket: reset");
    let up = AppError::relay(RelayDirection::Upstream, "io: broken pipe");

    assert_eq!(
        down.to_string(),
        "relay (downstream): failed to read input from container: websocket: reset"
    );
    assert_eq!(
        up.to_string(),
        "relay (upstream): failed to send input to container: io: broken pipe"
    );
}

#[test]
fn only_not_found_is_not_found() {
    assert!(AppError::NotFound("g1".into()).is_not_found());
    assert!(!AppError::Transport("HTTP 404".into()).is_not_found());
}

#[test]
fn io_errors_convert_to_io_variant() {
    let err: AppError = std::io::Error::new(std::io::ErrorKind::BrokenPipe, "pipe").into();
    assert!(matches!(err, AppError::Io(_)), "{err}");
}

#[test]
fn toml_errors_convert_to_config_variant() {
    let parse: Result<toml::Value, toml::de::Error> = toml::from_str("a = ");
    let err: AppError = parse.expect_err("invalid toml").into();
    assert!(matches!(err, AppError::Config(_)), "{err}");
}

#[test]
fn websocket_errors_convert_to_transport_variant() {
    let err: AppError = tokio_tungstenite::tungstenite::Error::ConnectionClosed.into();
    assert!(err.to_string().starts_with("transport: websocket"), "{err}");
}

#[test]
fn error_message_has_no_trailing_period() {
    let err = AppError::Timeout("create did not complete within 900s".into());
    assert!(!err.to_string().ends_with('.'));
}
