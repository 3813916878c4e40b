//! An offline engine that always succeeds, emitting a minimal silent WAV
//! clip. The moral equivalent of the Python original's always-available
//! `gtts`/`piper` fallback — useful as a registry default and in tests so
//! the router has a real candidate that never fails.

use async_trait::async_trait;
use std::collections::HashSet;
use std::io::Cursor;

use crate::error::EngineError;
use crate::router::registry::EngineDescriptor;
use crate::tts_engine::{SynthesisRequest, TtsEngine};

pub struct SilenceEngine {
    sample_rate: u32,
}

impl SilenceEngine {
    pub fn new() -> Self {
        Self { sample_rate: 16_000 }
    }
}

impl Default for SilenceEngine {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl TtsEngine for SilenceEngine {
    fn descriptor(&self) -> EngineDescriptor {
        EngineDescriptor {
            name: "silence".to_string(),
            offline: true,
            languages: HashSet::new(),
            voices: HashSet::new(),
            supports_ssml: false,
            supports_rate: false,
            supports_pitch: false,
        }
    }

    async fn synth(&self, request: &SynthesisRequest) -> Result<Vec<u8>, EngineError> {
        let duration_secs = (request.text.split_whitespace().count() as f32 * 0.3).max(0.5);
        let num_samples = (self.sample_rate as f32 * duration_secs) as u32;

        let spec = hound::WavSpec {
            channels: 1,
            sample_rate: self.sample_rate,
            bits_per_sample: 16,
            sample_format: hound::SampleFormat::Int,
        };

        let mut cursor = Cursor::new(Vec::new());
        {
            let mut writer = hound::WavWriter::new(&mut cursor, spec)
                .map_err(|e| EngineError::SynthesisFailed(e.to_string()))?;
            for _ in 0..num_samples {
                writer
                    .write_sample(0i16)
                    .map_err(|e| EngineError::SynthesisFailed(e.to_string()))?;
            }
            writer
                .finalize()
                .map_err(|e| EngineError::SynthesisFailed(e.to_string()))?;
        }
        Ok(cursor.into_inner())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn always_succeeds() {
        let engine = SilenceEngine::new();
        let request = SynthesisRequest::new("hello world", "en");
        let bytes = engine.synth(&request).await.unwrap();
        assert!(!bytes.is_empty());
        assert_eq!(&bytes[0..4], b"RIFF");
    }
}
