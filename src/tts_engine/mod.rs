//! TTS engines are opaque external collaborators: `synth(text, lang, voice,
//! rate, pitch) -> bytes` behind a declared capability set. Grounded in the
//! teacher's `TtsProvider` trait (`tts/interface.rs`).

pub mod edge;
pub mod silence;

use async_trait::async_trait;
use std::time::Duration;

use crate::error::EngineError;
use crate::router::registry::EngineDescriptor;

/// `(text, lang, voice?, rate, pitch, requirements?)` per spec §3.
#[derive(Debug, Clone)]
pub struct SynthesisRequest {
    pub text: String,
    pub lang: String,
    pub voice: Option<String>,
    pub rate: f32,
    pub pitch: f32,
    pub requirements: std::collections::HashMap<String, bool>,
    pub timeout: Option<Duration>,
}

impl SynthesisRequest {
    pub fn new(text: impl Into<String>, lang: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            lang: lang.into(),
            voice: None,
            rate: 1.0,
            pitch: 0.0,
            requirements: std::collections::HashMap::new(),
            timeout: None,
        }
    }
}

#[async_trait]
pub trait TtsEngine: Send + Sync {
    fn descriptor(&self) -> EngineDescriptor;
    async fn synth(&self, request: &SynthesisRequest) -> Result<Vec<u8>, EngineError>;
}
