//! Bot-wide counters, per spec §3. Derived averages are computed on read,
//! never maintained incrementally, per §4.6 "derive averages on read, not
//! on update".

use std::sync::atomic::{AtomicU64, Ordering};

#[derive(Debug, Default, Clone, Copy)]
pub struct BotStatsSnapshot {
    pub messages_processed: u64,
    pub synthesis_requests: u64,
    pub cache_hits: u64,
    pub cache_misses: u64,
    pub engine_failures: u64,
    pub total_processing_time_secs: f64,
    pub avg_processing_time_secs: f64,
    pub cache_hit_rate: f64,
}

#[derive(Default)]
pub struct BotStats {
    messages_processed: AtomicU64,
    synthesis_requests: AtomicU64,
    cache_hits: AtomicU64,
    cache_misses: AtomicU64,
    engine_failures: AtomicU64,
    // Stored as whole microseconds so it can live in an AtomicU64.
    total_processing_time_micros: AtomicU64,
}

impl BotStats {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record_message(&self) {
        self.messages_processed.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_synthesis_request(&self) {
        self.synthesis_requests.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_cache_hit(&self) {
        self.cache_hits.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_cache_miss(&self) {
        self.cache_misses.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_engine_failure(&self) {
        self.engine_failures.fetch_add(1, Ordering::Relaxed);
    }

    pub fn add_processing_time(&self, duration: std::time::Duration) {
        self.total_processing_time_micros
            .fetch_add(duration.as_micros() as u64, Ordering::Relaxed);
    }

    pub fn snapshot(&self) -> BotStatsSnapshot {
        let messages_processed = self.messages_processed.load(Ordering::Relaxed);
        let synthesis_requests = self.synthesis_requests.load(Ordering::Relaxed);
        let cache_hits = self.cache_hits.load(Ordering::Relaxed);
        let cache_misses = self.cache_misses.load(Ordering::Relaxed);
        let engine_failures = self.engine_failures.load(Ordering::Relaxed);
        let total_processing_time_secs =
            self.total_processing_time_micros.load(Ordering::Relaxed) as f64 / 1_000_000.0;

        let avg_processing_time_secs = if synthesis_requests > 0 {
            total_processing_time_secs / synthesis_requests as f64
        } else {
            0.0
        };
        let total_cache_lookups = cache_hits + cache_misses;
        let cache_hit_rate = if total_cache_lookups > 0 {
            cache_hits as f64 / total_cache_lookups as f64
        } else {
            0.0
        };

        BotStatsSnapshot {
            messages_processed,
            synthesis_requests,
            cache_hits,
            cache_misses,
            engine_failures,
            total_processing_time_secs,
            avg_processing_time_secs,
            cache_hit_rate,
        }
    }

    pub fn reset(&self) {
        self.messages_processed.store(0, Ordering::Relaxed);
        self.synthesis_requests.store(0, Ordering::Relaxed);
        self.cache_hits.store(0, Ordering::Relaxed);
        self.cache_misses.store(0, Ordering::Relaxed);
        self.engine_failures.store(0, Ordering::Relaxed);
        self.total_processing_time_micros.store(0, Ordering::Relaxed);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn averages_derived_on_read() {
        let stats = BotStats::new();
        stats.record_synthesis_request();
        stats.record_synthesis_request();
        stats.add_processing_time(std::time::Duration::from_secs(4));
        let snap = stats.snapshot();
        assert_eq!(snap.avg_processing_time_secs, 2.0);
    }

    #[test]
    fn reset_zeroes_all_counters() {
        let stats = BotStats::new();
        stats.record_message();
        stats.record_cache_hit();
        stats.reset();
        let snap = stats.snapshot();
        assert_eq!(snap.messages_processed, 0);
        assert_eq!(snap.cache_hits, 0);
    }
}
