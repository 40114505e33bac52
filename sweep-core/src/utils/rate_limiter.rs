//! Submission pacing for the shared RPC endpoint.
//!
//! A token bucket bounds the global transaction submission rate, with one
//! sub-bucket per wallet so a single retry-looping pipeline cannot starve
//! the others.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, OnceLock};
use std::time::{Duration, Instant};
use tokio::time::sleep;
use tracing::debug;

fn now_ms() -> u64 {
    static EPOCH: OnceLock<Instant> = OnceLock::new();
    EPOCH.get_or_init(Instant::now).elapsed().as_millis() as u64
}

/// Thread-safe token bucket.
#[derive(Debug)]
pub struct TokenBucket {
    tokens: AtomicU64,
    capacity: u64,
    refill_per_sec: u64,
    last_refill: AtomicU64,
}

impl TokenBucket {
    pub fn new(capacity: u64, refill_per_sec: u64) -> Self {
        Self {
            tokens: AtomicU64::new(capacity),
            capacity,
            refill_per_sec,
            last_refill: AtomicU64::new(now_ms()),
        }
    }

    fn refill(&self) {
        let now = now_ms();
        let last = self.last_refill.load(Ordering::SeqCst);
        let elapsed = now.saturating_sub(last);

        if elapsed > 0 {
            let added = (elapsed * self.refill_per_sec) / 1000;
            if added == 0 {
                return;
            }
            let current = self.tokens.load(Ordering::SeqCst);
            let new_tokens = (current + added).min(self.capacity);

            if self
                .tokens
                .compare_exchange(current, new_tokens, Ordering::SeqCst, Ordering::Relaxed)
                .is_ok()
            {
                self.last_refill.store(now, Ordering::SeqCst);
            }
        }
    }

    /// Try to take `cost` tokens; false when the bucket is drained.
    pub fn try_acquire(&self, cost: u64) -> bool {
        self.refill();
        loop {
            let current = self.tokens.load(Ordering::SeqCst);

            if current < cost {
                return false;
            }
            if self
                .tokens
                .compare_exchange(current, current - cost, Ordering::SeqCst, Ordering::Relaxed)
                .is_ok()
            {
                return true;
            }
        }
    }

    pub fn available(&self) -> u64 {
        self.refill();
        self.tokens.load(Ordering::SeqCst)
    }
}

#[derive(Debug, Clone)]
pub struct RateLimiterConfig {
    /// Submissions per second across all wallets.
    pub tps: u32,
    /// Burst headroom: bucket capacity = tps * burst_multiplier.
    pub burst_multiplier: u32,
}

impl Default for RateLimiterConfig {
    fn default() -> Self {
        Self {
            tps: 10,
            burst_multiplier: 2,
        }
    }
}

/// Global + per-wallet submission limiter.
#[derive(Debug)]
pub struct SubmitLimiter {
    wallet_buckets: Mutex<HashMap<String, Arc<TokenBucket>>>,
    global_bucket: TokenBucket,
    config: RateLimiterConfig,
}

impl SubmitLimiter {
    pub fn new(tps: u32) -> Self {
        Self::with_config(RateLimiterConfig {
            tps,
            ..Default::default()
        })
    }

    pub fn with_config(config: RateLimiterConfig) -> Self {
        let capacity = (config.tps as u64) * config.burst_multiplier as u64;
        Self {
            wallet_buckets: Mutex::new(HashMap::new()),
            global_bucket: TokenBucket::new(capacity.max(1), config.tps as u64),
            config,
        }
    }

    fn bucket_for(&self, wallet: &str) -> Arc<TokenBucket> {
        let mut buckets = self.wallet_buckets.lock().unwrap();
        if let Some(bucket) = buckets.get(wallet) {
            return bucket.clone();
        }
        let capacity = (self.config.tps as u64) * self.config.burst_multiplier as u64;
        let bucket = Arc::new(TokenBucket::new(
            capacity.max(1),
            self.config.tps as u64,
        ));
        buckets.insert(wallet.to_string(), bucket.clone());
        bucket
    }

    fn try_acquire(&self, wallet: &str) -> bool {
        self.bucket_for(wallet).try_acquire(1) && self.global_bucket.try_acquire(1)
    }

    /// Take a submission slot for `wallet`, sleeping until one frees up.
    pub async fn acquire(&self, wallet: &str) {
        let poll = Duration::from_millis(1000 / self.config.tps.max(1) as u64);
        while !self.try_acquire(wallet) {
            debug!("submit limiter saturated, wallet {} waiting", wallet);
            sleep(poll).await;
        }
    }

    pub fn tracked_wallets(&self) -> usize {
        self.wallet_buckets.lock().unwrap().len()
    }
}
