//! Process entry point: loads configuration, wires every collaborator
//! together, and runs the bot until interrupted. Grounded in
//! `examples/original_source/ttskit/bot/unified_bot.py`'s top-level
//! `main()` / `asyncio.run(bot.run())`, re-expressed with `tokio::main`
//! the way the teacher's own `src-tauri` binary entry drives its async
//! runtime.

use std::path::PathBuf;
use std::sync::Arc;

use ttskit_rs::audio_pipeline::HeaderSniffPipeline;
use ttskit_rs::cache::AudioCache;
use ttskit_rs::config::{load_json_config, AppConfig};
use ttskit_rs::logging;
use ttskit_rs::orchestrator::Orchestrator;
use ttskit_rs::rate_limit::InMemoryRateLimiter;
use ttskit_rs::router::registry::EngineRegistry;
use ttskit_rs::router::SmartRouter;
use ttskit_rs::telegram::factory::AdapterFactory;
use ttskit_rs::tts_engine::edge::EdgeEngine;
use ttskit_rs::tts_engine::silence::SilenceEngine;

fn config_path() -> PathBuf {
    std::env::var("TTSKIT_CONFIG")
        .map(PathBuf::from)
        .unwrap_or_else(|_| PathBuf::from("ttskit_config.json"))
}

#[tokio::main]
async fn main() {
    logging::init();

    let config: AppConfig = load_json_config(&config_path(), "app");

    let Some(bot_token) = config.resolved_bot_token() else {
        tracing::error!("no bot token configured (set bot_token or TELOXIDE_TOKEN)");
        std::process::exit(1);
    };

    let registry = Arc::new(EngineRegistry::new());
    registry.register(Arc::new(SilenceEngine::default())).await;
    registry
        .register(Arc::new(EdgeEngine::new(
            "https://api.edge-tts.invalid/v1/synthesize",
        )))
        .await;

    let router = Arc::new(SmartRouter::new(registry.clone()));

    let cache = match AudioCache::new(
        config.cache_dir.clone(),
        config.max_cache_size,
        config.max_file_age_secs,
    )
    .await
    {
        Ok(cache) => Arc::new(cache),
        Err(e) => {
            tracing::error!(error = %e, "failed to initialize audio cache");
            std::process::exit(1);
        }
    };

    let rate_limiter = Arc::new(InMemoryRateLimiter::new(
        std::time::Duration::from_secs(config.rate_limit_window_secs),
        config.rate_limit_max_requests,
    ));
    let audio_pipeline = Arc::new(HeaderSniffPipeline);

    let adapter = match AdapterFactory::create_adapter(
        config.adapter,
        &bot_token,
        config.api_id,
        config.api_hash.as_deref(),
    ) {
        Ok(adapter) => adapter,
        Err(e) => {
            tracing::error!(error = %e, "failed to build transport adapter");
            std::process::exit(1);
        }
    };

    let orchestrator = Orchestrator::new(
        adapter,
        registry,
        router,
        cache,
        rate_limiter,
        audio_pipeline,
        config.sudo_user_ids.clone(),
        config.fallback_lang.clone(),
        config.cache_enabled,
        config.audio_processing,
    );

    if let Err(e) = orchestrator.initialize(&config.engine_policies).await {
        tracing::error!(error = %e, "failed to start bot");
        std::process::exit(1);
    }

    tracing::info!("ttskit-rs running, press ctrl-c to stop");
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::warn!(error = %e, "failed to listen for ctrl-c");
    }

    tracing::info!("shutting down");
    orchestrator.shutdown().await;
}
