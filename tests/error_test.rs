use std::time::Duration;

use draupnir::{DraupnirError, OutputFormat, Result, classify_backend_message};

#[test]
fn test_error_display() {
    let err = DraupnirError::TemplateNotFound("dockerfile-gen".to_string());
    assert_eq!(err.to_string(), "template not found: dockerfile-gen");
}

#[test]
fn test_missing_variables_display() {
    let err = DraupnirError::MissingRequiredVariables {
        template_id: "t".into(),
        missing: vec!["app_name".into(), "language".into()],
    };
    assert_eq!(
        err.to_string(),
        "template 't' is missing required variables: app_name, language"
    );
}

#[test]
fn test_format_validation_display() {
    let err = DraupnirError::FormatValidation {
        format: OutputFormat::Yaml,
        message: "bad indent".into(),
    };
    assert_eq!(err.to_string(), "response is not valid YAML: bad indent");
}

#[test]
fn test_result_alias() {
    fn returns_error() -> Result<()> {
        Err(DraupnirError::NoCandidatesGenerated)
    }
    assert!(returns_error().is_err());
}

#[test]
fn test_from_serde_json() {
    fn parse() -> Result<serde_json::Value> {
        Ok(serde_json::from_str("{")?)
    }
    assert!(matches!(parse(), Err(DraupnirError::Json(_))));
}

// ============================================================================
// Transient error classification
// ============================================================================

#[test]
fn transient_errors() {
    assert!(DraupnirError::RateLimited { retry_after: None }.is_transient());
    assert!(DraupnirError::Timeout(Duration::from_secs(1)).is_transient());
    assert!(DraupnirError::Network("connection reset".into()).is_transient());
}

#[test]
fn permanent_errors() {
    assert!(!DraupnirError::InvalidRequest("bad".into()).is_transient());
    assert!(!DraupnirError::TemplateNotFound("x".into()).is_transient());
    assert!(!DraupnirError::SchemaViolation("x".into()).is_transient());
    assert!(!DraupnirError::Cancelled.is_transient());
    assert!(
        !DraupnirError::RetriesExhausted {
            attempts: 4,
            last_error: "timeout".into()
        }
        .is_transient()
    );
}

#[test]
fn retry_after_hint() {
    let hinted = DraupnirError::RateLimited {
        retry_after: Some(Duration::from_secs(7)),
    };
    assert_eq!(hinted.retry_after(), Some(Duration::from_secs(7)));
    assert_eq!(DraupnirError::Timeout(Duration::ZERO).retry_after(), None);
}

#[test]
fn cancelled_is_recognised() {
    assert!(DraupnirError::Cancelled.is_cancelled());
    assert!(!DraupnirError::Network("x".into()).is_cancelled());
}

// ============================================================================
// Message classification
// ============================================================================

#[test]
fn classify_maps_messages_to_variants() {
    assert!(matches!(
        classify_backend_message("429 Too Many Requests"),
        DraupnirError::RateLimited { .. }
    ));
    assert!(matches!(
        classify_backend_message("upstream request timeout"),
        DraupnirError::Timeout(_)
    ));
    assert!(matches!(
        classify_backend_message("connect ECONNREFUSED: connection refused"),
        DraupnirError::Network(_)
    ));
    assert!(matches!(
        classify_backend_message("context length exceeded"),
        DraupnirError::InvalidRequest(_)
    ));
}
