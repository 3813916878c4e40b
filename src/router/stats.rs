//! Per-engine statistics. Counters are plain atomics (lock-free on the hot
//! path); the latency history is a single-writer append-only ring buffer,
//! per the concurrency idiom in SPEC_FULL §5/§9.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicU64, Ordering};
use tokio::sync::RwLock;

const LATENCY_HISTORY_LEN: usize = 32;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct EngineStatsSnapshot {
    pub requests: u64,
    pub successes: u64,
    pub failures: u64,
    pub success_rate: f64,
    pub avg_latency_ms: f64,
}

/// `requests == successes + failures` always holds: both are only ever
/// incremented together with `requests` inside [`EngineStats::record`].
pub struct EngineStats {
    requests: AtomicU64,
    successes: AtomicU64,
    failures: AtomicU64,
    latencies_ms: RwLock<VecDeque<f64>>,
    last_error: RwLock<Option<String>>,
}

impl EngineStats {
    pub fn new() -> Self {
        Self {
            requests: AtomicU64::new(0),
            successes: AtomicU64::new(0),
            failures: AtomicU64::new(0),
            latencies_ms: RwLock::new(VecDeque::with_capacity(LATENCY_HISTORY_LEN)),
            last_error: RwLock::new(None),
        }
    }

    pub async fn record_success(&self, latency_ms: f64) {
        self.requests.fetch_add(1, Ordering::Relaxed);
        self.successes.fetch_add(1, Ordering::Relaxed);
        self.push_latency(latency_ms).await;
    }

    pub async fn record_failure(&self, latency_ms: f64, error: String) {
        self.requests.fetch_add(1, Ordering::Relaxed);
        self.failures.fetch_add(1, Ordering::Relaxed);
        self.push_latency(latency_ms).await;
        *self.last_error.write().await = Some(error);
    }

    async fn push_latency(&self, latency_ms: f64) {
        let mut history = self.latencies_ms.write().await;
        if history.len() == LATENCY_HISTORY_LEN {
            history.pop_front();
        }
        history.push_back(latency_ms);
    }

    pub async fn snapshot(&self) -> EngineStatsSnapshot {
        let requests = self.requests.load(Ordering::Relaxed);
        let successes = self.successes.load(Ordering::Relaxed);
        let failures = self.failures.load(Ordering::Relaxed);
        let history = self.latencies_ms.read().await;
        let avg_latency_ms = if history.is_empty() {
            0.0
        } else {
            history.iter().sum::<f64>() / history.len() as f64
        };
        EngineStatsSnapshot {
            requests,
            successes,
            failures,
            success_rate: successes as f64 / requests.max(1) as f64,
            avg_latency_ms,
        }
    }

    pub fn reset(&self) {
        self.requests.store(0, Ordering::Relaxed);
        self.successes.store(0, Ordering::Relaxed);
        self.failures.store(0, Ordering::Relaxed);
    }

    pub async fn last_error(&self) -> Option<String> {
        self.last_error.read().await.clone()
    }
}

impl Default for EngineStats {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn requests_equals_success_plus_failure() {
        let stats = EngineStats::new();
        stats.record_success(10.0).await;
        stats.record_failure(20.0, "boom".into()).await;
        stats.record_success(15.0).await;
        let snap = stats.snapshot().await;
        assert_eq!(snap.requests, snap.successes + snap.failures);
        assert_eq!(snap.requests, 3);
    }

    #[tokio::test]
    async fn reset_zeroes_counters() {
        let stats = EngineStats::new();
        stats.record_success(1.0).await;
        stats.reset();
        let snap = stats.snapshot().await;
        assert_eq!(snap.requests, 0);
    }
}
