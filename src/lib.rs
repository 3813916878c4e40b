pub mod audio_pipeline;
pub mod cache;
pub mod config;
pub mod error;
pub mod logging;
pub mod orchestrator;
pub mod rate_limit;
pub mod router;
pub mod telegram;
pub mod tts_engine;
pub mod utils;

pub use config::AppConfig;
pub use error::{AdapterError, CacheError, EngineError, InputValidationError, RouterError};
pub use orchestrator::Orchestrator;
