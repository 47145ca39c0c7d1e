use std::time::Duration;

use draupnir::RetryConfig;

#[test]
fn retry_config_defaults() {
    let config = RetryConfig::default();
    assert_eq!(config.retry_attempts, 3);
    assert_eq!(config.retry_delay, Duration::from_secs(1));
    assert_eq!(config.max_delay, Duration::from_secs(30));
    assert_eq!(config.timeout, Duration::from_secs(60));
    assert_eq!(config.max_invocations(), 4);
}

#[test]
fn retry_config_builder() {
    let config = RetryConfig::new()
        .retry_attempts(5)
        .retry_delay(Duration::from_millis(100))
        .max_delay(Duration::from_secs(10))
        .timeout(Duration::from_secs(2));

    assert_eq!(config.retry_attempts, 5);
    assert_eq!(config.retry_delay, Duration::from_millis(100));
    assert_eq!(config.max_delay, Duration::from_secs(10));
    assert_eq!(config.timeout, Duration::from_secs(2));
}

#[test]
fn retry_config_disabled() {
    let config = RetryConfig::disabled();
    assert_eq!(config.retry_attempts, 0);
    assert_eq!(config.max_invocations(), 1);
}

#[test]
fn retry_config_delay_calculation() {
    let config = RetryConfig::new()
        .retry_delay(Duration::from_millis(100))
        .max_delay(Duration::from_secs(10));

    // Linear backoff: 100ms, 200ms, 300ms, ...
    assert_eq!(config.delay_for_retry(1), Duration::from_millis(100));
    assert_eq!(config.delay_for_retry(2), Duration::from_millis(200));
    assert_eq!(config.delay_for_retry(3), Duration::from_millis(300));
}

#[test]
fn retry_config_delay_capped_at_max() {
    let config = RetryConfig::new()
        .retry_delay(Duration::from_secs(2))
        .max_delay(Duration::from_secs(5));

    assert_eq!(config.delay_for_retry(3), Duration::from_secs(5));
    assert_eq!(config.delay_for_retry(u32::MAX), Duration::from_secs(5));
}

#[test]
fn retry_config_respects_retry_after() {
    let config = RetryConfig::new()
        .retry_delay(Duration::from_millis(100))
        .max_delay(Duration::from_secs(10));

    assert_eq!(
        config.effective_delay(1, Some(Duration::from_secs(3))),
        Duration::from_secs(3)
    );
    assert_eq!(
        config.effective_delay(1, Some(Duration::from_secs(60))),
        Duration::from_secs(10)
    );
    assert_eq!(config.effective_delay(2, None), Duration::from_millis(200));
}
