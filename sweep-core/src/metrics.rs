use chrono::Utc;
use serde::Serialize;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, Instant};

#[derive(Debug, Clone, Serialize)]
pub struct MetricsSnapshot {
    pub timestamp: String,
    pub pipelines: PipelineMetrics,
    pub rpc: RpcMetrics,
}

#[derive(Debug, Clone, Serialize)]
pub struct PipelineMetrics {
    pub total: u64,
    pub succeeded: u64,
    pub skipped: u64,
    pub failed: u64,
    pub retries: u64,
    pub avg_duration_ms: f64,
    pub max_duration_ms: u64,
}

#[derive(Debug, Clone, Serialize)]
pub struct RpcMetrics {
    pub total_calls: u64,
    pub avg_latency_ms: f64,
    pub min_latency_ms: u64,
    pub max_latency_ms: u64,
}

/// Lock-free counters for one process lifetime. Wallet pipelines record
/// their terminal status; the chain adapter records per-call RPC latency.
#[derive(Debug)]
pub struct SweepMetrics {
    pipelines_total: AtomicU64,
    pipelines_succeeded: AtomicU64,
    pipelines_skipped: AtomicU64,
    pipelines_failed: AtomicU64,
    retries: AtomicU64,
    pipeline_duration_sum_ms: AtomicU64,
    pipeline_max_duration_ms: AtomicU64,
    rpc_calls: AtomicU64,
    rpc_latency_sum_ms: AtomicU64,
    rpc_min_latency_ms: AtomicU64,
    rpc_max_latency_ms: AtomicU64,
    start_time: Instant,
}

impl Default for SweepMetrics {
    fn default() -> Self {
        Self {
            pipelines_total: AtomicU64::new(0),
            pipelines_succeeded: AtomicU64::new(0),
            pipelines_skipped: AtomicU64::new(0),
            pipelines_failed: AtomicU64::new(0),
            retries: AtomicU64::new(0),
            pipeline_duration_sum_ms: AtomicU64::new(0),
            pipeline_max_duration_ms: AtomicU64::new(0),
            rpc_calls: AtomicU64::new(0),
            rpc_latency_sum_ms: AtomicU64::new(0),
            rpc_min_latency_ms: AtomicU64::new(u64::MAX),
            rpc_max_latency_ms: AtomicU64::new(0),
            start_time: Instant::now(),
        }
    }
}

impl SweepMetrics {
    pub fn record_pipeline(&self, label: &str, duration: Duration, attempts: u32) {
        self.pipelines_total.fetch_add(1, Ordering::SeqCst);
        let ms = duration.as_millis() as u64;
        self.pipeline_duration_sum_ms.fetch_add(ms, Ordering::SeqCst);
        self.pipeline_max_duration_ms.fetch_max(ms, Ordering::SeqCst);
        self.retries
            .fetch_add(attempts.saturating_sub(1) as u64, Ordering::SeqCst);

        match label {
            "Succeeded" => self.pipelines_succeeded.fetch_add(1, Ordering::SeqCst),
            "Skipped" => self.pipelines_skipped.fetch_add(1, Ordering::SeqCst),
            _ => self.pipelines_failed.fetch_add(1, Ordering::SeqCst),
        };
    }

    pub fn record_rpc_latency(&self, latency: Duration) {
        self.rpc_calls.fetch_add(1, Ordering::SeqCst);
        let ms = latency.as_millis() as u64;
        self.rpc_latency_sum_ms.fetch_add(ms, Ordering::SeqCst);
        self.rpc_min_latency_ms.fetch_min(ms, Ordering::SeqCst);
        self.rpc_max_latency_ms.fetch_max(ms, Ordering::SeqCst);
    }

    pub fn pipelines_total(&self) -> u64 {
        self.pipelines_total.load(Ordering::SeqCst)
    }

    pub fn uptime(&self) -> Duration {
        self.start_time.elapsed()
    }

    pub fn snapshot(&self) -> MetricsSnapshot {
        let total = self.pipelines_total.load(Ordering::SeqCst);
        let duration_sum = self.pipeline_duration_sum_ms.load(Ordering::SeqCst);
        let rpc_calls = self.rpc_calls.load(Ordering::SeqCst);
        let rpc_sum = self.rpc_latency_sum_ms.load(Ordering::SeqCst);
        let rpc_min = self.rpc_min_latency_ms.load(Ordering::SeqCst);

        MetricsSnapshot {
            timestamp: Utc::now().to_rfc3339(),
            pipelines: PipelineMetrics {
                total,
                succeeded: self.pipelines_succeeded.load(Ordering::SeqCst),
                skipped: self.pipelines_skipped.load(Ordering::SeqCst),
                failed: self.pipelines_failed.load(Ordering::SeqCst),
                retries: self.retries.load(Ordering::SeqCst),
                avg_duration_ms: if total > 0 {
                    duration_sum as f64 / total as f64
                } else {
                    0.0
                },
                max_duration_ms: self.pipeline_max_duration_ms.load(Ordering::SeqCst),
            },
            rpc: RpcMetrics {
                total_calls: rpc_calls,
                avg_latency_ms: if rpc_calls > 0 {
                    rpc_sum as f64 / rpc_calls as f64
                } else {
                    0.0
                },
                min_latency_ms: if rpc_min == u64::MAX { 0 } else { rpc_min },
                max_latency_ms: self.rpc_max_latency_ms.load(Ordering::SeqCst),
            },
        }
    }

    pub fn to_json(&self) -> String {
        serde_json::to_string_pretty(&self.snapshot()).unwrap_or_else(|_| "{}".to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pipeline_counters() {
        let metrics = SweepMetrics::default();

        metrics.record_pipeline("Succeeded", Duration::from_millis(100), 3);
        metrics.record_pipeline("Skipped", Duration::from_millis(10), 1);
        metrics.record_pipeline("Failed", Duration::from_millis(200), 2);

        let snap = metrics.snapshot();
        assert_eq!(snap.pipelines.total, 3);
        assert_eq!(snap.pipelines.succeeded, 1);
        assert_eq!(snap.pipelines.skipped, 1);
        assert_eq!(snap.pipelines.failed, 1);
        assert_eq!(snap.pipelines.retries, 3);
        assert_eq!(snap.pipelines.max_duration_ms, 200);
    }

    #[test]
    fn rpc_latency_bounds() {
        let metrics = SweepMetrics::default();
        metrics.record_rpc_latency(Duration::from_millis(50));
        metrics.record_rpc_latency(Duration::from_millis(150));

        let snap = metrics.snapshot();
        assert_eq!(snap.rpc.total_calls, 2);
        assert_eq!(snap.rpc.min_latency_ms, 50);
        assert_eq!(snap.rpc.max_latency_ms, 150);
        assert!((snap.rpc.avg_latency_ms - 100.0).abs() < f64::EPSILON);
    }
}
