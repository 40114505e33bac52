use anyhow::{Context, Result};
use rand::Rng;
use std::future::Future;
use std::time::Duration;
use tracing::debug;

/// Exponential backoff schedule. The delay is a pure function of the
/// attempt number so retry timing can be asserted without real timers.
#[derive(Debug, Clone)]
pub struct BackoffConfig {
    pub base_delay_ms: u64,
    pub max_delay_ms: u64,
    pub exponential_base: f64,
    pub jitter: bool,
}

impl Default for BackoffConfig {
    fn default() -> Self {
        Self {
            base_delay_ms: 1_000,
            max_delay_ms: 30_000,
            exponential_base: 2.0,
            jitter: true,
        }
    }
}

impl BackoffConfig {
    pub fn new(base_delay_ms: u64, max_delay_ms: u64) -> Self {
        Self {
            base_delay_ms,
            max_delay_ms,
            ..Default::default()
        }
    }

    pub fn without_jitter(mut self) -> Self {
        self.jitter = false;
        self
    }

    /// Delay before retrying after failed attempt `attempt` (1-based):
    /// `base * 2^(attempt-1)`, capped, with optional +/-50% jitter.
    pub fn delay_for_attempt(&self, attempt: u32) -> Duration {
        let exponent = attempt.saturating_sub(1) as i32;
        let delay_ms = self.base_delay_ms as f64 * self.exponential_base.powi(exponent);
        let delay_ms = delay_ms.min(self.max_delay_ms as f64);

        let delay_ms = if self.jitter {
            let factor = rand::thread_rng().gen_range(0.5..=1.5);
            (delay_ms * factor).min(self.max_delay_ms as f64)
        } else {
            delay_ms
        };

        Duration::from_millis(delay_ms as u64)
    }
}

/// Run `operation` up to `max_retries + 1` times with backoff between
/// failures. Used for idempotent read queries (balance, nonce, gas
/// price); the coordinator's submit path has its own attempt loop because
/// a resubmission needs a freshly rebuilt transaction.
pub async fn with_retry<T, F, Fut>(
    config: BackoffConfig,
    max_retries: u32,
    operation_name: &str,
    operation: F,
) -> Result<T>
where
    F: Fn() -> Fut,
    Fut: Future<Output = Result<T>>,
{
    for attempt in 0..=max_retries {
        match operation().await {
            Ok(result) => {
                if attempt > 0 {
                    debug!("{} succeeded on attempt {}", operation_name, attempt + 1);
                }
                return Ok(result);
            }
            Err(e) => {
                if attempt == max_retries {
                    let last = format!("{}", e);
                    return Err(e).context(format!(
                        "{} failed after {} attempts. Last error: {}",
                        operation_name,
                        max_retries + 1,
                        last
                    ));
                }

                let delay = config.delay_for_attempt(attempt + 1);
                debug!(
                    "{} failed (attempt {}/{}). Retrying in {:?}: {}",
                    operation_name,
                    attempt + 1,
                    max_retries + 1,
                    delay,
                    e
                );

                tokio::time::sleep(delay).await;
            }
        }
    }

    unreachable!()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn delay_doubles_per_attempt() {
        let config = BackoffConfig::new(100, 10_000).without_jitter();
        assert_eq!(config.delay_for_attempt(1), Duration::from_millis(100));
        assert_eq!(config.delay_for_attempt(2), Duration::from_millis(200));
        assert_eq!(config.delay_for_attempt(3), Duration::from_millis(400));
    }

    #[test]
    fn delay_is_capped() {
        let config = BackoffConfig::new(1_000, 4_000).without_jitter();
        assert_eq!(config.delay_for_attempt(10), Duration::from_millis(4_000));
    }

    #[test]
    fn jitter_stays_within_cap() {
        let config = BackoffConfig::new(1_000, 2_000);
        for attempt in 1..=8 {
            assert!(config.delay_for_attempt(attempt) <= Duration::from_millis(2_000));
        }
    }
}
