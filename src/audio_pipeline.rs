//! The audio codec/resampler is an external collaborator with a narrow
//! contract: sniff container info, or convert between containers. The
//! default implementation here does header-sniffing only (no real
//! resampling), following the magic-byte detection in
//! `examples/original_source/ttskit/utils/audio_manager.py::get_audio_info`
//! — but unlike that original, a format we cannot identify is reported as
//! `"unknown"` rather than padded out with fabricated sample-rate/bitrate
//! numbers. Callers already tolerate missing duration/conversion (§9).

use async_trait::async_trait;

#[derive(Debug, Clone, PartialEq)]
pub struct AudioInfo {
    pub duration_seconds: Option<f64>,
    pub sample_rate: Option<u32>,
    pub channels: Option<u8>,
    pub bitrate_kbps: Option<u32>,
    pub size_bytes: usize,
    pub format: String,
}

#[async_trait]
pub trait AudioPipeline: Send + Sync {
    async fn info(&self, bytes: &[u8]) -> AudioInfo;
    async fn convert(&self, bytes: &[u8], in_fmt: &str, out_fmt: &str) -> Vec<u8>;
}

/// Sniffs container format from magic bytes only; never fabricates
/// duration/sample-rate/bitrate it cannot actually measure.
pub struct HeaderSniffPipeline;

fn sniff_format(bytes: &[u8]) -> &'static str {
    if bytes.len() >= 4 && &bytes[0..4] == b"OggS" {
        "ogg"
    } else if bytes.len() >= 3 && &bytes[0..3] == b"ID3" {
        "mp3"
    } else if bytes.len() >= 2 && bytes[0] == 0xff && (bytes[1] & 0xe0) == 0xe0 {
        "mp3"
    } else if bytes.len() >= 4 && &bytes[0..4] == b"RIFF" {
        "wav"
    } else if bytes.len() >= 8 && &bytes[4..8] == b"ftyp" {
        "m4a"
    } else {
        "unknown"
    }
}

#[async_trait]
impl AudioPipeline for HeaderSniffPipeline {
    async fn info(&self, bytes: &[u8]) -> AudioInfo {
        let format = sniff_format(bytes);
        let (sample_rate, channels) = if format == "wav" {
            parse_wav_header(bytes)
        } else {
            (None, None)
        };
        AudioInfo {
            duration_seconds: None,
            sample_rate,
            channels,
            bitrate_kbps: None,
            size_bytes: bytes.len(),
            format: format.to_string(),
        }
    }

    async fn convert(&self, bytes: &[u8], in_fmt: &str, out_fmt: &str) -> Vec<u8> {
        if in_fmt == out_fmt {
            return bytes.to_vec();
        }
        tracing::debug!(in_fmt, out_fmt, "no real codec wired up, passing bytes through");
        bytes.to_vec()
    }
}

/// WAV's header is plain enough to read sample rate/channels without a
/// full decode.
fn parse_wav_header(bytes: &[u8]) -> (Option<u32>, Option<u8>) {
    if bytes.len() < 24 {
        return (None, None);
    }
    let channels = u16::from_le_bytes([bytes[22], bytes[23]]) as u8;
    let sample_rate = u32::from_le_bytes([bytes[24], bytes[25], bytes[26], bytes[27]]);
    (Some(sample_rate), Some(channels))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn sniffs_ogg_magic_bytes() {
        let pipeline = HeaderSniffPipeline;
        let info = pipeline.info(b"OggS\x00rest-of-file").await;
        assert_eq!(info.format, "ogg");
        assert_eq!(info.sample_rate, None);
    }

    #[tokio::test]
    async fn unknown_format_is_not_fabricated() {
        let pipeline = HeaderSniffPipeline;
        let info = pipeline.info(b"not audio data at all").await;
        assert_eq!(info.format, "unknown");
        assert_eq!(info.sample_rate, None);
        assert_eq!(info.bitrate_kbps, None);
    }
}
