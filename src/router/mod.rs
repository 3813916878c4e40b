//! The smart router: given `(text, lang, requirements)`, picks an engine
//! ordering, tries candidates in sequence, records per-engine statistics,
//! and returns the first successful audio. Grounded in the teacher's
//! `TtsRouter::select_provider` (`tts/router.rs`), generalized from a
//! capability-match-only score to the stats-based
//! `score(e) = success_rate(e) - latency_penalty(e)` formula spec §4.3
//! requires.

pub mod registry;
pub mod stats;

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Instant;
use tokio::sync::RwLock;

use crate::error::RouterError;
use crate::tts_engine::SynthesisRequest;
use registry::EngineRegistry;
use stats::{EngineStats, EngineStatsSnapshot};

/// Normalizes a raw latency average into a `[0, 1]` penalty: 0 at 0ms,
/// approaching 1 as latency grows, so it can be subtracted from a
/// `[0, 1]` success rate without dominating it.
fn latency_penalty(avg_latency_ms: f64) -> f64 {
    if avg_latency_ms <= 0.0 {
        return 0.0;
    }
    avg_latency_ms / (avg_latency_ms + 1000.0)
}

pub struct SmartRouter {
    registry: Arc<EngineRegistry>,
    stats: RwLock<HashMap<String, Arc<EngineStats>>>,
}

impl SmartRouter {
    pub fn new(registry: Arc<EngineRegistry>) -> Self {
        Self {
            registry,
            stats: RwLock::new(HashMap::new()),
        }
    }

    async fn stats_for(&self, name: &str) -> Arc<EngineStats> {
        if let Some(stats) = self.stats.read().await.get(name) {
            return stats.clone();
        }
        let mut stats = self.stats.write().await;
        stats
            .entry(name.to_string())
            .or_insert_with(|| Arc::new(EngineStats::new()))
            .clone()
    }

    /// Step 1-4 of §4.3's selection algorithm: build, filter, and score
    /// candidates, without touching stats for the attempt itself.
    async fn ordered_candidates(
        &self,
        lang: &str,
        request: &SynthesisRequest,
    ) -> Result<Vec<String>, RouterError> {
        let policy = self.registry.policy_for(lang).await;

        let mut candidates = Vec::new();
        for name in &policy {
            let Some(engine) = self.registry.get(name).await else {
                continue;
            };
            let descriptor = engine.descriptor();
            if !descriptor.meets(&request.requirements) {
                continue;
            }
            if let Some(voice) = &request.voice {
                if !descriptor.supports_voice(voice) {
                    continue;
                }
            }
            candidates.push(name.clone());
        }

        if candidates.is_empty() {
            return Err(RouterError::EngineNotFound {
                lang: lang.to_string(),
            });
        }

        self.score_and_sort(candidates).await
    }

    /// Scores candidates by `success_rate - latency_penalty`; engines with
    /// zero recorded requests get a neutral score midway between the best
    /// and worst observed, so they're tried but not preferred over proven
    /// engines. Ties keep the original policy order (stable sort).
    async fn score_and_sort(&self, candidates: Vec<String>) -> Result<Vec<String>, RouterError> {
        let mut scored = Vec::with_capacity(candidates.len());
        let mut observed_scores = Vec::new();

        for name in &candidates {
            let snapshot = self.stats_for(name).await.snapshot().await;
            if snapshot.requests > 0 {
                let score = snapshot.success_rate - latency_penalty(snapshot.avg_latency_ms);
                observed_scores.push(score);
            }
        }

        let neutral_score = if observed_scores.is_empty() {
            0.5
        } else {
            let best = observed_scores.iter().cloned().fold(f64::MIN, f64::max);
            let worst = observed_scores.iter().cloned().fold(f64::MAX, f64::min);
            (best + worst) / 2.0
        };

        for name in &candidates {
            let snapshot = self.stats_for(name).await.snapshot().await;
            let score = if snapshot.requests == 0 {
                neutral_score
            } else {
                snapshot.success_rate - latency_penalty(snapshot.avg_latency_ms)
            };
            scored.push((name.clone(), score));
        }

        // Stable sort descending by score; equal scores preserve the
        // original (policy) order since `sort_by` is stable.
        scored.sort_by(|a, b| b.1.partial_cmp(&a.1).unwrap_or(std::cmp::Ordering::Equal));
        Ok(scored.into_iter().map(|(name, _)| name).collect())
    }

    /// `synth_async(text, lang, requirements?, voice?, rate, pitch) ->
    /// (bytes, engine_name)` per spec §4.3.
    pub async fn synth_async(
        &self,
        request: SynthesisRequest,
    ) -> Result<(Vec<u8>, String), RouterError> {
        let lang = request.lang.clone();
        let ordered = self.ordered_candidates(&lang, &request).await?;
        let attempted = ordered.len();

        for name in &ordered {
            let Some(engine) = self.registry.get(name).await else {
                continue;
            };
            let stats = self.stats_for(name).await;
            let start = Instant::now();
            match engine.synth(&request).await {
                Ok(bytes) => {
                    stats
                        .record_success(start.elapsed().as_secs_f64() * 1000.0)
                        .await;
                    return Ok((bytes, name.clone()));
                }
                Err(e) => {
                    stats
                        .record_failure(start.elapsed().as_secs_f64() * 1000.0, e.to_string())
                        .await;
                    tracing::debug!(engine = %name, error = %e, "engine failed, trying next candidate");
                }
            }
        }

        Err(RouterError::AllEnginesFailed { lang, attempted })
    }

    /// Synthesizes with exactly one named engine, no fallback — used when
    /// the caller pinned an engine explicitly (the `{engine}` command
    /// prefix) rather than asking the router to pick one. Skips the
    /// capability-requirements gate `ordered_candidates` applies: those
    /// requirements (e.g. the default `offline: false`) exist to steer
    /// automatic selection away from engines the caller didn't ask for,
    /// not to second-guess an explicit choice.
    pub async fn synth_pinned(
        &self,
        engine_name: &str,
        request: SynthesisRequest,
    ) -> Result<(Vec<u8>, String), RouterError> {
        let lang = request.lang.clone();
        let Some(engine) = self.registry.get(engine_name).await else {
            return Err(RouterError::EngineNotFound { lang });
        };

        let stats = self.stats_for(engine_name).await;
        let start = Instant::now();
        match engine.synth(&request).await {
            Ok(bytes) => {
                stats
                    .record_success(start.elapsed().as_secs_f64() * 1000.0)
                    .await;
                Ok((bytes, engine_name.to_string()))
            }
            Err(e) => {
                stats
                    .record_failure(start.elapsed().as_secs_f64() * 1000.0, e.to_string())
                    .await;
                Err(RouterError::AllEnginesFailed { lang, attempted: 1 })
            }
        }
    }

    pub async fn get_all_stats(&self) -> HashMap<String, EngineStatsSnapshot> {
        let stats = self.stats.read().await;
        let mut out = HashMap::with_capacity(stats.len());
        for (name, s) in stats.iter() {
            out.insert(name.clone(), s.snapshot().await);
        }
        out
    }

    /// The ordered `(name, score)` list the next `synth_async` call for
    /// `lang` would produce.
    pub async fn get_engine_ranking(&self, lang: &str) -> Vec<(String, f64)> {
        let policy = self.registry.policy_for(lang).await;
        let mut ranked = Vec::new();
        for name in &policy {
            if self.registry.get(name).await.is_none() {
                continue;
            }
            let snapshot = self.stats_for(name).await.snapshot().await;
            let score = if snapshot.requests == 0 {
                0.5
            } else {
                snapshot.success_rate - latency_penalty(snapshot.avg_latency_ms)
            };
            ranked.push((name.clone(), score));
        }
        ranked.sort_by(|a, b| b.1.partial_cmp(&a.1).unwrap_or(std::cmp::Ordering::Equal));
        ranked
    }

    pub async fn reset_stats(&self) {
        let stats = self.stats.read().await;
        for s in stats.values() {
            s.reset();
        }
    }

    pub fn registry(&self) -> &Arc<EngineRegistry> {
        &self.registry
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::EngineError;
    use crate::tts_engine::TtsEngine;
    use async_trait::async_trait;
    use std::collections::HashSet;
    use std::sync::atomic::{AtomicBool, Ordering as AtomicOrdering};

    struct AlwaysOk(&'static str);

    #[async_trait]
    impl TtsEngine for AlwaysOk {
        fn descriptor(&self) -> registry::EngineDescriptor {
            registry::EngineDescriptor {
                name: self.0.to_string(),
                offline: true,
                languages: HashSet::new(),
                voices: HashSet::new(),
                supports_ssml: false,
                supports_rate: false,
                supports_pitch: false,
            }
        }
        async fn synth(&self, _request: &SynthesisRequest) -> Result<Vec<u8>, EngineError> {
            Ok(b"ok".to_vec())
        }
    }

    struct AlwaysFail(&'static str);

    #[async_trait]
    impl TtsEngine for AlwaysFail {
        fn descriptor(&self) -> registry::EngineDescriptor {
            registry::EngineDescriptor {
                name: self.0.to_string(),
                offline: true,
                languages: HashSet::new(),
                voices: HashSet::new(),
                supports_ssml: false,
                supports_rate: false,
                supports_pitch: false,
            }
        }
        async fn synth(&self, _request: &SynthesisRequest) -> Result<Vec<u8>, EngineError> {
            Err(EngineError::SynthesisFailed("nope".into()))
        }
    }

    /// Fails the first `fail_times` calls, then always succeeds.
    struct FailThenOk {
        name: &'static str,
        remaining_failures: AtomicBool,
    }

    #[async_trait]
    impl TtsEngine for FailThenOk {
        fn descriptor(&self) -> registry::EngineDescriptor {
            registry::EngineDescriptor {
                name: self.name.to_string(),
                offline: true,
                languages: HashSet::new(),
                voices: HashSet::new(),
                supports_ssml: false,
                supports_rate: false,
                supports_pitch: false,
            }
        }
        async fn synth(&self, _request: &SynthesisRequest) -> Result<Vec<u8>, EngineError> {
            if self.remaining_failures.swap(false, AtomicOrdering::SeqCst) {
                Err(EngineError::SynthesisFailed("first try fails".into()))
            } else {
                Ok(b"ok".to_vec())
            }
        }
    }

    #[tokio::test]
    async fn falls_back_to_next_candidate_on_failure() {
        let registry = Arc::new(EngineRegistry::new());
        registry.register(Arc::new(AlwaysFail("edge"))).await;
        registry.register(Arc::new(AlwaysOk("piper"))).await;
        registry
            .set_policy("fa", vec!["edge".into(), "piper".into(), "gtts".into()])
            .await;

        let router = SmartRouter::new(registry.clone());
        let request = SynthesisRequest::new("سلام دنیا", "fa");
        let (bytes, engine) = router.synth_async(request).await.unwrap();
        assert_eq!(engine, "piper");
        assert_eq!(bytes, b"ok".to_vec());

        let all_stats = router.get_all_stats().await;
        assert_eq!(all_stats["edge"].failures, 1);
        assert_eq!(all_stats["piper"].successes, 1);
    }

    #[tokio::test]
    async fn all_engines_failing_is_all_engines_failed() {
        let registry = Arc::new(EngineRegistry::new());
        registry.register(Arc::new(AlwaysFail("a"))).await;
        registry.register(Arc::new(AlwaysFail("b"))).await;
        registry.set_policy("en", vec!["a".into(), "b".into()]).await;

        let router = SmartRouter::new(registry);
        let request = SynthesisRequest::new("hello", "en");
        let err = router.synth_async(request).await.unwrap_err();
        assert!(matches!(err, RouterError::AllEnginesFailed { attempted: 2, .. }));
    }

    #[tokio::test]
    async fn no_candidates_is_engine_not_found() {
        let registry = Arc::new(EngineRegistry::new());
        let router = SmartRouter::new(registry);
        let request = SynthesisRequest::new("hello", "xx");
        let err = router.synth_async(request).await.unwrap_err();
        assert!(matches!(err, RouterError::EngineNotFound { .. }));
    }

    #[tokio::test]
    async fn requirements_filter_out_non_matching_engines() {
        let registry = Arc::new(EngineRegistry::new());
        registry.register(Arc::new(AlwaysOk("cloud"))).await;
        registry.set_policy("en", vec!["cloud".into()]).await;

        let router = SmartRouter::new(registry);

        // `cloud` is offline=true, so a requirement of offline=false must
        // exclude it, not just no-op when the engine lacks "online" support.
        let mut request = SynthesisRequest::new("hello", "en");
        request.requirements.insert("offline".to_string(), false);
        let err = router.synth_async(request).await.unwrap_err();
        assert!(matches!(err, RouterError::EngineNotFound { .. }));

        // `cloud` lacks ssml support, so a requirement of ssml=true excludes it too.
        let mut request = SynthesisRequest::new("hello", "en");
        request.requirements.insert("ssml".to_string(), true);
        let err = router.synth_async(request).await.unwrap_err();
        assert!(matches!(err, RouterError::EngineNotFound { .. }));
    }

    #[tokio::test]
    async fn proven_engine_is_preferred_over_untried_after_failures() {
        let registry = Arc::new(EngineRegistry::new());
        registry
            .register(Arc::new(FailThenOk {
                name: "flaky",
                remaining_failures: AtomicBool::new(true),
            }))
            .await;
        registry.register(Arc::new(AlwaysOk("reliable"))).await;
        registry
            .set_policy("en", vec!["flaky".into(), "reliable".into()])
            .await;

        let router = SmartRouter::new(registry);

        // First call: flaky fails, falls back to reliable.
        let (_, engine) = router
            .synth_async(SynthesisRequest::new("one", "en"))
            .await
            .unwrap();
        assert_eq!(engine, "reliable");

        // Second call: reliable now has a perfect record and should rank
        // ahead of flaky (which has a recorded failure).
        let ranking = router.get_engine_ranking("en").await;
        let reliable_rank = ranking.iter().position(|(n, _)| n == "reliable").unwrap();
        let flaky_rank = ranking.iter().position(|(n, _)| n == "flaky").unwrap();
        assert!(reliable_rank < flaky_rank);
    }

    #[tokio::test]
    async fn synth_pinned_uses_only_the_named_engine() {
        let registry = Arc::new(EngineRegistry::new());
        registry.register(Arc::new(AlwaysOk("piper"))).await;
        registry.register(Arc::new(AlwaysFail("edge"))).await;
        registry
            .set_policy("en", vec!["edge".into(), "piper".into()])
            .await;

        let router = SmartRouter::new(registry);
        let (_, name) = router
            .synth_pinned("piper", SynthesisRequest::new("hi", "en"))
            .await
            .unwrap();
        assert_eq!(name, "piper");
    }

    #[tokio::test]
    async fn synth_pinned_to_unknown_engine_is_engine_not_found() {
        let registry = Arc::new(EngineRegistry::new());
        registry.register(Arc::new(AlwaysOk("piper"))).await;
        let router = SmartRouter::new(registry);
        let err = router
            .synth_pinned("ghost", SynthesisRequest::new("hi", "en"))
            .await
            .unwrap_err();
        assert!(matches!(err, RouterError::EngineNotFound { .. }));
    }

    #[tokio::test]
    async fn reset_stats_zeroes_everything() {
        let registry = Arc::new(EngineRegistry::new());
        registry.register(Arc::new(AlwaysOk("a"))).await;
        registry.set_policy("en", vec!["a".into()]).await;
        let router = SmartRouter::new(registry);
        router
            .synth_async(SynthesisRequest::new("hi", "en"))
            .await
            .unwrap();
        router.reset_stats().await;
        let stats = router.get_all_stats().await;
        assert_eq!(stats["a"].requests, 0);
    }
}
