//! HTTP-backed engine stub, grounded in the teacher's cloud-TTS provider
//! shape (`CloudTTSProvider` / `edge-tts-rust` dependency): a thin client
//! over a configurable synthesis endpoint.

use async_trait::async_trait;
use std::collections::HashSet;
use std::time::Instant;

use crate::error::EngineError;
use crate::router::registry::EngineDescriptor;
use crate::tts_engine::{SynthesisRequest, TtsEngine};
use crate::utils::http::request_with_retry;

pub struct EdgeEngine {
    endpoint: String,
    client: reqwest::Client,
}

impl EdgeEngine {
    pub fn new(endpoint: impl Into<String>) -> Self {
        Self {
            endpoint: endpoint.into(),
            client: reqwest::Client::new(),
        }
    }
}

#[async_trait]
impl TtsEngine for EdgeEngine {
    fn descriptor(&self) -> EngineDescriptor {
        EngineDescriptor {
            name: "edge".to_string(),
            offline: false,
            languages: HashSet::new(),
            voices: HashSet::new(),
            supports_ssml: true,
            supports_rate: true,
            supports_pitch: true,
        }
    }

    async fn synth(&self, request: &SynthesisRequest) -> Result<Vec<u8>, EngineError> {
        let start = Instant::now();
        let body = serde_json::json!({
            "text": request.text,
            "lang": request.lang,
            "voice": request.voice,
            "rate": request.rate,
            "pitch": request.pitch,
        });

        let endpoint = self.endpoint.clone();
        let client = self.client.clone();
        let response = request_with_retry(
            || {
                let client = client.clone();
                let endpoint = endpoint.clone();
                let body = body.clone();
                async move { client.post(&endpoint).json(&body).send().await }
            },
            2,
        )
        .await
        .map_err(EngineError::SynthesisFailed)?;

        if let Some(timeout) = request.timeout {
            if start.elapsed() > timeout {
                return Err(EngineError::Timeout(timeout));
            }
        }

        if !response.status().is_success() {
            return Err(EngineError::SynthesisFailed(format!(
                "edge endpoint returned {}",
                response.status()
            )));
        }

        response
            .bytes()
            .await
            .map(|b| b.to_vec())
            .map_err(|e| EngineError::SynthesisFailed(e.to_string()))
    }
}
