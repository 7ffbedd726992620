use super::error::{BrokerError, DeliveryError};
use super::logging;

#[test]
fn logging_init_accepts_levels() {
    // Should not panic
    logging::init("info");
    logging::init("debug");
    logging::init("warn");
}

#[test]
fn test_level_from_str() {
    assert_eq!(logging::level_from_str("ERROR"), tracing::Level::ERROR);
    assert_eq!(logging::level_from_str("warning"), tracing::Level::WARN);
    assert_eq!(logging::level_from_str("trace"), tracing::Level::TRACE);
    assert_eq!(logging::level_from_str("nonsense"), tracing::Level::INFO);
}

#[test]
fn test_error_messages() {
    let err = BrokerError::InvalidOperation {
        action: "Subscribe".to_string(),
        topic: "orders".to_string(),
    };
    assert_eq!(
        err.to_string(),
        "cannot Subscribe on topic 'orders': topic does not exist"
    );

    let err = DeliveryError::Rejected { status: 503 };
    assert_eq!(
        err.to_string(),
        "subscriber rejected delivery with status 503"
    );
}
