//! Engine registry: names, holds, and describes installed engines, and
//! stores per-language engine priority lists ("policies"). Grounded in the
//! teacher's `tts/voice_registry.rs` (a `HashMap<String, _>` registry with
//! lookup-by-capability helpers), generalized to also own policies per
//! spec §4.2.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use tokio::sync::RwLock;

use crate::tts_engine::TtsEngine;

#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct EngineDescriptor {
    pub name: String,
    pub offline: bool,
    pub languages: HashSet<String>,
    pub voices: HashSet<String>,
    pub supports_ssml: bool,
    pub supports_rate: bool,
    pub supports_pitch: bool,
}

impl EngineDescriptor {
    /// Whether this engine satisfies the given requirement flags. Unknown
    /// requirement keys are ignored; only the ones the descriptor models
    /// (`offline`, `ssml`, `rate`, `pitch`) are checked. A `true` requirement
    /// excludes engines lacking the capability; a `false` requirement
    /// excludes engines that have it (e.g. `{offline: false}` rules out
    /// offline-only engines, not just ones missing an "online" flag).
    pub fn meets(&self, requirements: &HashMap<String, bool>) -> bool {
        for (key, &wanted) in requirements {
            let have = match key.as_str() {
                "offline" => self.offline,
                "ssml" => self.supports_ssml,
                "rate" => self.supports_rate,
                "pitch" => self.supports_pitch,
                _ => continue,
            };
            if wanted != have {
                return false;
            }
        }
        true
    }

    /// An empty voice set means "any voice is fine".
    pub fn supports_voice(&self, voice: &str) -> bool {
        self.voices.is_empty() || self.voices.contains(voice)
    }
}

/// Per-language ordered list of engine names. Names absent from the
/// registry at routing time are silently skipped.
pub type EnginePolicy = Vec<String>;

pub struct EngineRegistry {
    engines: RwLock<HashMap<String, Arc<dyn TtsEngine>>>,
    policies: RwLock<HashMap<String, EnginePolicy>>,
    default_policy: RwLock<EnginePolicy>,
}

impl EngineRegistry {
    pub fn new() -> Self {
        Self {
            engines: RwLock::new(HashMap::new()),
            policies: RwLock::new(HashMap::new()),
            default_policy: RwLock::new(Vec::new()),
        }
    }

    pub async fn register(&self, engine: Arc<dyn TtsEngine>) {
        let name = engine.descriptor().name.clone();
        self.engines.write().await.insert(name, engine);
    }

    pub async fn get(&self, name: &str) -> Option<Arc<dyn TtsEngine>> {
        self.engines.read().await.get(name).cloned()
    }

    pub async fn list_names(&self) -> Vec<String> {
        self.engines.read().await.keys().cloned().collect()
    }

    pub async fn descriptors(&self) -> Vec<EngineDescriptor> {
        self.engines
            .read()
            .await
            .values()
            .map(|e| e.descriptor())
            .collect()
    }

    /// Replaces the policy list for `lang`.
    pub async fn set_policy(&self, lang: &str, policy: EnginePolicy) {
        self.policies.write().await.insert(lang.to_string(), policy);
    }

    pub async fn set_default_policy(&self, policy: EnginePolicy) {
        *self.default_policy.write().await = policy;
    }

    /// The policy for `lang` if one was set, else the default policy, else
    /// every registered engine name (insertion order is not guaranteed, but
    /// this path only matters before any policy has ever been configured).
    pub async fn policy_for(&self, lang: &str) -> EnginePolicy {
        if let Some(policy) = self.policies.read().await.get(lang).cloned() {
            return policy;
        }
        let default = self.default_policy.read().await.clone();
        if !default.is_empty() {
            return default;
        }
        self.list_names().await
    }

    /// Moves `engine_name` to the front of the policy for `lang`, creating
    /// the policy from the current one (or all engines) if none was set.
    pub async fn promote(&self, lang: &str, engine_name: &str) {
        let mut policy = self.policy_for(lang).await;
        policy.retain(|n| n != engine_name);
        policy.insert(0, engine_name.to_string());
        self.set_policy(lang, policy).await;
    }
}

impl Default for EngineRegistry {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn set_policy_is_idempotent() {
        let registry = EngineRegistry::new();
        let policy = vec!["edge".to_string(), "gtts".to_string()];
        registry.set_policy("en", policy.clone()).await;
        registry.set_policy("en", policy.clone()).await;
        assert_eq!(registry.policy_for("en").await, policy);
    }

    #[tokio::test]
    async fn promote_moves_engine_to_front() {
        let registry = EngineRegistry::new();
        registry
            .set_policy("fa", vec!["piper".into(), "edge".into(), "gtts".into()])
            .await;
        registry.promote("fa", "edge").await;
        assert_eq!(
            registry.policy_for("fa").await,
            vec!["edge".to_string(), "piper".to_string(), "gtts".to_string()]
        );
    }

    #[test]
    fn empty_voice_set_means_any() {
        let descriptor = EngineDescriptor {
            name: "x".into(),
            offline: true,
            languages: HashSet::new(),
            voices: HashSet::new(),
            supports_ssml: false,
            supports_rate: true,
            supports_pitch: true,
        };
        assert!(descriptor.supports_voice("anything"));
    }
}
