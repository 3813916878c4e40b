//! The bot orchestrator: wires the adapter, engine registry, router, and
//! cache together, enforces rate limiting, dispatches commands/callbacks,
//! and drives the TTS request pipeline. Grounded in
//! `examples/original_source/ttskit/bot/unified_bot.py::UnifiedTTSBot`,
//! re-expressed with the teacher's dependency-injection pattern
//! (`TtsService::new` in `tts/manager.rs`) instead of the Python original's
//! module-level singletons, per SPEC_FULL §9.

pub mod callback_action;
pub mod registry;
pub mod stats;

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Instant;
use tokio::sync::RwLock;

use crate::audio_pipeline::AudioPipeline;
use crate::cache::{fingerprint, AudioCache};
use crate::error::RouterError;
use crate::rate_limit::{RateLimitDecision, RateLimiter};
use crate::router::registry::EngineRegistry;
use crate::router::SmartRouter;
use crate::telegram::command_parser::{parse_command, TTS_COMMAND_TOKENS};
use crate::telegram::{InboundMessage, Kind, TransportAdapter};
use crate::tts_engine::SynthesisRequest;
use callback_action::{parse_callback, CallbackAction, DEFAULT_ENGINE_SELECTION_LANGS};
use registry::{CallbackRegistry, CommandRegistry, DispatchOutcome};
use stats::{BotStats, BotStatsSnapshot};

/// Per-language TTS engine priority used when no user override exists,
/// grounded in the original's `_setup_engine_preferences` default table.
pub fn default_engine_policy() -> Vec<String> {
    vec!["edge".to_string(), "silence".to_string()]
}

pub const DEFAULT_POLICY_LANGS: &[&str] = &[
    "fa", "en", "ar", "es", "fr", "de", "it", "pt", "ru", "ja", "ko", "zh",
];

pub struct Orchestrator {
    pub adapter: Arc<dyn TransportAdapter>,
    pub registry: Arc<EngineRegistry>,
    pub router: Arc<SmartRouter>,
    pub cache: Arc<AudioCache>,
    pub rate_limiter: Arc<dyn RateLimiter>,
    pub audio_pipeline: Arc<dyn AudioPipeline>,
    pub stats: Arc<BotStats>,
    commands: RwLock<CommandRegistry>,
    callbacks: RwLock<CallbackRegistry>,
    sudo_user_ids: Vec<i64>,
    fallback_lang: String,
    running: AtomicBool,
    cache_enabled: AtomicBool,
    audio_processing: AtomicBool,
}

impl Orchestrator {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        adapter: Arc<dyn TransportAdapter>,
        registry: Arc<EngineRegistry>,
        router: Arc<SmartRouter>,
        cache: Arc<AudioCache>,
        rate_limiter: Arc<dyn RateLimiter>,
        audio_pipeline: Arc<dyn AudioPipeline>,
        sudo_user_ids: Vec<i64>,
        fallback_lang: String,
        cache_enabled: bool,
        audio_processing: bool,
    ) -> Arc<Self> {
        Arc::new(Self {
            adapter,
            registry,
            router,
            cache,
            rate_limiter,
            audio_pipeline,
            stats: Arc::new(BotStats::new()),
            commands: RwLock::new(CommandRegistry::new()),
            callbacks: RwLock::new(CallbackRegistry::new()),
            sudo_user_ids,
            fallback_lang,
            running: AtomicBool::new(false),
            cache_enabled: AtomicBool::new(cache_enabled),
            audio_processing: AtomicBool::new(audio_processing),
        })
    }

    pub fn is_sudo(&self, user_id: i64) -> bool {
        self.sudo_user_ids.contains(&user_id)
    }

    pub fn cache_enabled(&self) -> bool {
        self.cache_enabled.load(Ordering::Relaxed)
    }

    pub fn audio_processing_enabled(&self) -> bool {
        self.audio_processing.load(Ordering::Relaxed)
    }

    /// §4.5's default command/admin-command table, each wired to a small
    /// closure over the orchestrator the way
    /// `_setup_default_commands`/`_setup_default_callbacks` wire methods
    /// onto `self` in the original.
    async fn install_default_commands(&self) {
        let mut commands = self.commands.write().await;

        commands.register(
            "start",
            false,
            Arc::new(|orchestrator, message| {
                Box::pin(async move {
                    orchestrator
                        .adapter
                        .send_message(
                            message.chat_id,
                            "Send me any text and I'll read it aloud. Try [fa]: سلام for Persian.",
                            Some(message.id),
                        )
                        .await
                        .ok();
                    true
                })
            }),
        );

        commands.register(
            "help",
            false,
            Arc::new(|orchestrator, message| {
                Box::pin(async move {
                    let help = "Commands: /start /help /status /engines /voices /languages\n\
                                Prefixes: [lang]: {engine} (voice:name) +N% @+Nst";
                    orchestrator
                        .adapter
                        .send_message(message.chat_id, help, Some(message.id))
                        .await
                        .ok();
                    true
                })
            }),
        );

        commands.register(
            "status",
            false,
            Arc::new(|orchestrator, message| {
                Box::pin(async move {
                    let snap = orchestrator.stats_snapshot();
                    let text = format!(
                        "messages: {}\nsynthesis requests: {}\ncache hit rate: {:.2}\navg processing: {:.3}s",
                        snap.messages_processed,
                        snap.synthesis_requests,
                        snap.cache_hit_rate,
                        snap.avg_processing_time_secs
                    );
                    orchestrator
                        .adapter
                        .send_message(message.chat_id, &text, Some(message.id))
                        .await
                        .ok();
                    true
                })
            }),
        );

        commands.register(
            "engines",
            false,
            Arc::new(|orchestrator, message| {
                Box::pin(async move {
                    let names = orchestrator.registry.list_names().await;
                    let text = if names.is_empty() {
                        "No engines registered.".to_string()
                    } else {
                        format!("Available engines: {}", names.join(", "))
                    };
                    orchestrator
                        .adapter
                        .send_message(message.chat_id, &text, Some(message.id))
                        .await
                        .ok();
                    true
                })
            }),
        );

        commands.register(
            "voices",
            false,
            Arc::new(|orchestrator, message| {
                Box::pin(async move {
                    let descriptors = orchestrator.registry.descriptors().await;
                    let mut lines = Vec::new();
                    for d in descriptors {
                        if d.voices.is_empty() {
                            lines.push(format!("{}: any voice", d.name));
                        } else {
                            let mut voices: Vec<&String> = d.voices.iter().collect();
                            voices.sort();
                            let voices: Vec<&str> = voices.into_iter().map(String::as_str).collect();
                            lines.push(format!("{}: {}", d.name, voices.join(", ")));
                        }
                    }
                    let text = if lines.is_empty() {
                        "No engines registered.".to_string()
                    } else {
                        lines.join("\n")
                    };
                    orchestrator
                        .adapter
                        .send_message(message.chat_id, &text, Some(message.id))
                        .await
                        .ok();
                    true
                })
            }),
        );

        commands.register(
            "languages",
            false,
            Arc::new(|orchestrator, message| {
                Box::pin(async move {
                    let text = format!("Supported languages: {}", DEFAULT_POLICY_LANGS.join(", "));
                    orchestrator
                        .adapter
                        .send_message(message.chat_id, &text, Some(message.id))
                        .await
                        .ok();
                    true
                })
            }),
        );

        commands.register(
            "stats",
            true,
            Arc::new(|orchestrator, message| {
                Box::pin(async move {
                    let snap = orchestrator.stats_snapshot();
                    let cache_stats = orchestrator.cache.stats().await;
                    let text = format!(
                        "messages: {}\nsynthesis: {}\nengine failures: {}\ncache: {}/{} hits, {} files",
                        snap.messages_processed,
                        snap.synthesis_requests,
                        snap.engine_failures,
                        cache_stats.hits,
                        cache_stats.total_requests,
                        cache_stats.file_count
                    );
                    orchestrator
                        .adapter
                        .send_message(message.chat_id, &text, Some(message.id))
                        .await
                        .ok();
                    true
                })
            }),
        );

        commands.register(
            "reset_stats",
            true,
            Arc::new(|orchestrator, message| {
                Box::pin(async move {
                    orchestrator.reset_stats().await;
                    orchestrator
                        .adapter
                        .send_message(message.chat_id, "Statistics reset.", Some(message.id))
                        .await
                        .ok();
                    true
                })
            }),
        );

        commands.register(
            "clear_cache",
            true,
            Arc::new(|orchestrator, message| {
                Box::pin(async move {
                    orchestrator.cache.clear().await;
                    orchestrator
                        .adapter
                        .send_message(message.chat_id, "Cache cleared.", Some(message.id))
                        .await
                        .ok();
                    true
                })
            }),
        );

        commands.register(
            "restart",
            true,
            Arc::new(|orchestrator, message| {
                Box::pin(async move {
                    orchestrator
                        .adapter
                        .send_message(
                            message.chat_id,
                            "Restart requested; process supervisor should restart this service.",
                            Some(message.id),
                        )
                        .await
                        .ok();
                    true
                })
            }),
        );

        commands.register(
            "shutdown",
            true,
            Arc::new(|orchestrator, message| {
                Box::pin(async move {
                    orchestrator
                        .adapter
                        .send_message(message.chat_id, "Shutting down.", Some(message.id))
                        .await
                        .ok();
                    orchestrator.shutdown().await;
                    true
                })
            }),
        );
    }

    async fn install_default_policies(&self, overrides: &HashMap<String, Vec<String>>) {
        self.registry
            .set_default_policy(default_engine_policy())
            .await;
        for lang in DEFAULT_POLICY_LANGS {
            self.registry
                .set_policy(lang, default_engine_policy())
                .await;
        }
        for (lang, policy) in overrides {
            self.registry.set_policy(lang, policy.clone()).await;
        }
    }

    /// §4.6 Startup: set handler callbacks, register default commands and
    /// callbacks, install engine policies, start the adapter.
    pub async fn initialize(
        self: &Arc<Self>,
        engine_policy_overrides: &HashMap<String, Vec<String>>,
    ) -> Result<(), crate::error::AdapterError> {
        self.install_default_policies(engine_policy_overrides).await;
        self.install_default_commands().await;

        {
            let this = self.clone();
            self.adapter.set_message_handler(Arc::new(move |message| {
                let this = this.clone();
                Box::pin(async move {
                    this.handle_inbound(message).await;
                })
            }));
        }
        {
            let this = self.clone();
            self.adapter
                .set_callback_handler(Arc::new(move |message, payload| {
                    let this = this.clone();
                    Box::pin(async move {
                        this.handle_callback(message, payload).await;
                    })
                }));
        }
        {
            let this = self.clone();
            self.adapter.set_error_handler(Arc::new(move |error| {
                let this = this.clone();
                Box::pin(async move {
                    tracing::error!(error = %error, "adapter error");
                    let _ = &this;
                })
            }));
        }

        self.running.store(true, Ordering::SeqCst);
        self.adapter.start().await
    }

    pub async fn shutdown(&self) {
        self.running.store(false, Ordering::SeqCst);
        let _ = self.adapter.stop().await;
    }

    pub fn stats_snapshot(&self) -> BotStatsSnapshot {
        self.stats.snapshot()
    }

    pub async fn reset_stats(&self) {
        self.stats.reset();
        self.router.reset_stats().await;
    }

    /// §4.6 Inbound handling.
    pub async fn handle_inbound(self: &Arc<Self>, message: InboundMessage) {
        self.stats.record_message();

        let Some(text) = message.text.clone().filter(|t| {
            !t.trim().is_empty() && message.kind == Kind::Text
        }) else {
            return;
        };

        if text.starts_with('/') {
            let token = text
                .split_whitespace()
                .next()
                .unwrap_or("")
                .trim_start_matches('/')
                .to_lowercase();
            let commands = self.commands.read().await;
            let outcome = commands
                .dispatch(
                    self.clone(),
                    &token,
                    message.user.as_ref().map(|u| self.is_sudo(u.id)).unwrap_or(false),
                    message.clone(),
                )
                .await;
            drop(commands);
            if outcome == DispatchOutcome::Handled {
                return;
            }
        }

        if !is_tts_request(&text) {
            return;
        }

        let user_id = message
            .user
            .as_ref()
            .map(|u| u.id.to_string())
            .unwrap_or_default();
        if let RateLimitDecision::Denied { message: reply } =
            self.rate_limiter.check(&user_id).await
        {
            self.adapter
                .send_message(message.chat_id, &reply, Some(message.id))
                .await
                .ok();
            return;
        }

        let parsed = parse_command(&text, &self.fallback_lang);
        let clean_text = parsed.text;
        let lang = parsed.lang;

        if clean_text.is_empty() {
            self.adapter
                .send_message(message.chat_id, "Text is empty after cleaning.", Some(message.id))
                .await
                .ok();
            return;
        }

        self.process_tts(
            message,
            clean_text,
            lang,
            parsed.engine,
            parsed.voice,
            parsed.rate,
            parsed.pitch,
        )
        .await;
    }

    /// §4.6 "Processing a TTS request".
    #[allow(clippy::too_many_arguments)]
    async fn process_tts(
        self: &Arc<Self>,
        message: InboundMessage,
        text: String,
        lang: String,
        engine: Option<String>,
        voice: Option<String>,
        rate: f32,
        pitch: f32,
    ) {
        let started = Instant::now();
        self.stats.record_synthesis_request();

        let status = self
            .adapter
            .send_message(message.chat_id, "Processing…", Some(message.id))
            .await
            .ok();
        let status_id = status.map(|m| m.id);

        let cached = if self.cache_enabled() {
            self.cache.get(&text, &lang, engine.as_deref()).await
        } else {
            None
        };

        let (bytes, used_engine) = if let Some(bytes) = cached {
            self.stats.record_cache_hit();
            (bytes, engine.clone().unwrap_or_else(|| "cache".to_string()))
        } else {
            self.stats.record_cache_miss();

            let mut request = SynthesisRequest::new(text.clone(), lang.clone());
            request.voice = voice.clone();
            request.rate = rate;
            request.pitch = pitch;
            // §4.6 routes with requirements={offline: false} unless the
            // caller overrides it; nothing here currently offers that
            // override, so it's always the default.
            request.requirements.insert("offline".to_string(), false);

            let synth_result = match &engine {
                Some(name) => self.router.synth_pinned(name, request).await,
                None => self.router.synth_async(request).await,
            };

            match synth_result {
                Ok((bytes, name)) => {
                    if self.cache_enabled() {
                        let key = fingerprint(&text, &lang, engine.as_deref());
                        let mut metadata = HashMap::new();
                        metadata.insert("engine".to_string(), name.clone());
                        metadata.insert("lang".to_string(), lang.clone());
                        self.cache.put(&key, &bytes, "ogg", metadata).await.ok();
                    }
                    (bytes, name)
                }
                Err(RouterError::EngineNotFound { .. }) => {
                    self.stats.record_engine_failure();
                    self.adapter
                        .send_message(
                            message.chat_id,
                            "No engine is available for this request.",
                            Some(message.id),
                        )
                        .await
                        .ok();
                    if let Some(id) = status_id {
                        self.adapter.delete_message(message.chat_id, id).await;
                    }
                    return;
                }
                Err(RouterError::AllEnginesFailed { .. }) => {
                    self.stats.record_engine_failure();
                    self.adapter
                        .send_message(
                            message.chat_id,
                            "Sorry, speech synthesis failed. Please try again.",
                            Some(message.id),
                        )
                        .await
                        .ok();
                    if let Some(id) = status_id {
                        self.adapter.delete_message(message.chat_id, id).await;
                    }
                    return;
                }
            }
        };
        tracing::debug!(engine = %used_engine, chat_id = message.chat_id, "synthesized tts reply");

        let duration = if self.audio_processing_enabled() {
            self.audio_pipeline.info(&bytes).await.duration_seconds
        } else {
            None
        };

        let caption = if text.chars().count() > 100 {
            format!("{}...", text.chars().take(100).collect::<String>())
        } else {
            text.clone()
        };

        self.adapter
            .send_voice(
                message.chat_id,
                bytes,
                Some(&caption),
                Some(message.id),
                duration.map(|d| d.max(0.0) as u32).or(Some(5)),
            )
            .await
            .ok();

        if let Some(id) = status_id {
            self.adapter.delete_message(message.chat_id, id).await;
        }

        self.stats.add_processing_time(started.elapsed());
    }

    /// §4.6 "Callback handling".
    async fn handle_callback(self: &Arc<Self>, message: InboundMessage, payload: String) {
        let is_sudo = message.user.as_ref().map(|u| self.is_sudo(u.id)).unwrap_or(false);
        let callbacks = self.callbacks.read().await;
        let outcome = callbacks
            .dispatch(self.clone(), &payload, is_sudo, message.clone())
            .await;
        drop(callbacks);

        if outcome == DispatchOutcome::Handled {
            return;
        }

        match parse_callback(&payload) {
            CallbackAction::SelectEngine { engine, lang } => {
                let langs: Vec<String> = match lang {
                    Some(l) => vec![l],
                    None => DEFAULT_ENGINE_SELECTION_LANGS
                        .iter()
                        .map(|s| s.to_string())
                        .collect(),
                };
                for lang in &langs {
                    self.registry.promote(lang, &engine).await;
                }
                self.adapter
                    .send_message(
                        message.chat_id,
                        &format!("Engine preference updated to {engine}."),
                        None,
                    )
                    .await
                    .ok();
            }
            CallbackAction::ToggleSetting { flag, enabled } => {
                match flag {
                    callback_action::SettingsFlag::Cache => {
                        self.cache_enabled.store(enabled, Ordering::SeqCst)
                    }
                    callback_action::SettingsFlag::AudioProcessing => {
                        self.audio_processing.store(enabled, Ordering::SeqCst)
                    }
                }
                self.adapter
                    .send_message(message.chat_id, "Setting updated.", None)
                    .await
                    .ok();
            }
            CallbackAction::Admin { .. } | CallbackAction::Unknown(_) => {}
        }
    }

    pub async fn register_command(&self, name: &str, admin_only: bool, handler: registry::CommandFn) {
        self.commands.write().await.register(name, admin_only, handler);
    }

    pub async fn register_callback(&self, key: &str, admin_only: bool, handler: registry::CallbackFn) {
        self.callbacks.write().await.register(key, admin_only, handler);
    }

    pub async fn register_callback_prefix(
        &self,
        prefix: &str,
        admin_only: bool,
        handler: registry::CallbackFn,
    ) {
        self.callbacks
            .write()
            .await
            .register_prefix(prefix, admin_only, handler);
    }
}

/// Classifies a non-slash (or TTS-command-prefixed) message as a TTS
/// request, per §4.6: any known TTS-command prefix, or plain free text.
fn is_tts_request(text: &str) -> bool {
    let lower = text.to_lowercase();
    if TTS_COMMAND_TOKENS.iter().any(|t| lower.starts_with(&t.to_lowercase())) {
        return true;
    }
    !text.starts_with('/')
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn plain_text_is_a_tts_request() {
        assert!(is_tts_request("hello there"));
    }

    #[test]
    fn tts_prefixed_command_is_a_tts_request() {
        assert!(is_tts_request("/tts hello"));
    }

    #[test]
    fn other_slash_commands_are_not_tts_requests() {
        assert!(!is_tts_request("/status"));
    }
}
