//! Crate-wide error taxonomy.
//!
//! Each variant here corresponds to one of the error kinds named by the
//! system's error-handling design: adapters never let these escape to the
//! upstream library, the router only lets `EngineNotFound`/`AllEnginesFailed`
//! leave its own scope, and cache errors are always swallowed by the caller
//! into a miss/no-op.

use thiserror::Error;

/// Failure talking to (or hearing from) the upstream transport provider.
/// Logged and forwarded to the adapter's error handler; not user-visible by
/// default.
#[derive(Debug, Error)]
pub enum AdapterError {
    #[error("transport error: {0}")]
    Transport(String),
    #[error("missing credentials for adapter '{adapter}': {detail}")]
    MissingCredentials { adapter: String, detail: String },
    #[error("unknown adapter type '{0}'")]
    UnknownAdapter(String),
    #[error("malformed bot token")]
    MalformedToken,
}

/// Errors raised by the smart router. Only these two ever leave
/// `SmartRouter::synth_async` — per-engine synthesis failures are caught and
/// folded into the next candidate attempt.
#[derive(Debug, Error)]
pub enum RouterError {
    #[error("no engine satisfies the request for language '{lang}'")]
    EngineNotFound { lang: String },
    #[error("all {attempted} candidate engine(s) failed for language '{lang}'")]
    AllEnginesFailed { lang: String, attempted: usize },
}

/// A single engine's synthesis failure, caught internally by the router and
/// recorded into that engine's stats before falling back to the next
/// candidate.
#[derive(Debug, Error, Clone)]
pub enum EngineError {
    #[error("synthesis failed: {0}")]
    SynthesisFailed(String),
    #[error("request timed out after {0:?}")]
    Timeout(std::time::Duration),
    #[error("engine unavailable: {0}")]
    Unavailable(String),
}

/// Cache failures. Always logged, never propagated: a failed read degrades
/// to a miss, a failed write is a forfeited `put`.
#[derive(Debug, Error)]
pub enum CacheError {
    #[error("cache I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("cache index was malformed: {0}")]
    MalformedIndex(String),
}

/// User-input validation failures: empty text, or rate/pitch outside the
/// accepted bounds.
#[derive(Debug, Error)]
pub enum InputValidationError {
    #[error("text is empty after cleaning")]
    EmptyText,
    #[error("rate {0} is outside [0.5, 2.0]")]
    RateOutOfBounds(f32),
    #[error("pitch {0} is outside [-12.0, 12.0]")]
    PitchOutOfBounds(f32),
}
