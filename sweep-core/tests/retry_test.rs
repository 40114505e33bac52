use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use sweep_core::{with_retry, BackoffConfig};

#[tokio::test]
async fn retry_success_first_try() {
    let counter = Arc::new(AtomicUsize::new(0));
    let config = BackoffConfig::new(10, 300).without_jitter();

    let result: Result<String, anyhow::Error> = with_retry(config, 3, "test_op", || async {
        counter.fetch_add(1, Ordering::SeqCst);
        Ok("success".to_string())
    })
    .await;

    assert!(result.is_ok());
    assert_eq!(counter.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn retry_success_after_failures() {
    let counter = Arc::new(AtomicUsize::new(0));
    let config = BackoffConfig::new(10, 300).without_jitter();

    let result: Result<String, anyhow::Error> = with_retry(config, 3, "test_op", || async {
        let count = counter.fetch_add(1, Ordering::SeqCst) + 1;
        if count < 3 {
            Err(anyhow::anyhow!("temporary error"))
        } else {
            Ok("success".to_string())
        }
    })
    .await;

    assert!(result.is_ok());
    assert_eq!(counter.load(Ordering::SeqCst), 3);
}

#[tokio::test]
async fn retry_all_failures() {
    let counter = Arc::new(AtomicUsize::new(0));
    let config = BackoffConfig::new(10, 300).without_jitter();

    let result: Result<String, anyhow::Error> = with_retry(config, 3, "test_op", || async {
        counter.fetch_add(1, Ordering::SeqCst);
        Err(anyhow::anyhow!("permanent error"))
    })
    .await;

    assert!(result.is_err());
    assert_eq!(counter.load(Ordering::SeqCst), 4);
}

#[tokio::test]
async fn retry_sleeps_between_attempts() {
    let counter = Arc::new(AtomicUsize::new(0));
    let config = BackoffConfig::new(50, 10_000).without_jitter();

    let start = tokio::time::Instant::now();
    let _: Result<String, anyhow::Error> = with_retry(config, 2, "test_op", || async {
        let count = counter.fetch_add(1, Ordering::SeqCst) + 1;
        if count < 3 {
            Err(anyhow::anyhow!("temp"))
        } else {
            Ok("done".to_string())
        }
    })
    .await;

    // Two failures: 50ms + 100ms of backoff before the third attempt.
    assert!(start.elapsed() >= Duration::from_millis(100));
}

#[test]
fn backoff_schedule_is_pure_and_exponential() {
    let config = BackoffConfig::new(250, 60_000).without_jitter();
    let first = config.delay_for_attempt(1);
    assert_eq!(first, Duration::from_millis(250));
    assert_eq!(config.delay_for_attempt(1), first);
    assert_eq!(config.delay_for_attempt(3), Duration::from_millis(1_000));
}

#[test]
fn backoff_respects_the_cap_even_with_jitter() {
    let config = BackoffConfig::new(1_000, 5_000);
    for attempt in 1..=12 {
        assert!(config.delay_for_attempt(attempt) <= Duration::from_millis(5_000));
    }
}
