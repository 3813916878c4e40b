//! Parses the TTS command grammar (spec §4.1/§6) from raw chat text.
//! Grounded in
//! `examples/original_source/ttskit/telegram/base.py::TelegramAdapter.parse_command`,
//! re-expressed with the `regex` crate instead of Python's `re.match`.

use regex::Regex;

use crate::utils::text::{clean_text_for_tts, detect_rtl_language};

pub const TTS_COMMAND_TOKENS: &[&str] = &["/tts", "/speak", "/voice", "/صدا", "/تکلم"];

#[derive(Debug, Clone, PartialEq)]
pub struct ParsedCommand {
    pub text: String,
    pub lang: String,
    pub engine: Option<String>,
    pub voice: Option<String>,
    pub rate: f32,
    pub pitch: f32,
}

fn lang_re() -> Regex {
    Regex::new(r"(?i)^\[([a-z]{2})\]:\s*(.*)$").unwrap()
}
fn engine_re() -> Regex {
    Regex::new(r"(?i)^\{([a-z]+)\}\s*(.*)$").unwrap()
}
fn voice_re() -> Regex {
    Regex::new(r"(?i)^\(voice:([^)]+)\)\s*(.*)$").unwrap()
}
fn rate_re() -> Regex {
    Regex::new(r"^([+-]?\d+(?:\.\d+)?(?:%|st)?)\s*(.*)$").unwrap()
}
fn pitch_re() -> Regex {
    Regex::new(r"^@([+-]?\d+(?:\.\d+)?(?:st)?)\s*(.*)$").unwrap()
}

/// Strips a leading TTS-command token (`/tts`, `/speak`, ...) if present.
fn strip_tts_command(text: &str) -> &str {
    let lower = text.to_lowercase();
    for command in TTS_COMMAND_TOKENS {
        if lower.starts_with(&command.to_lowercase()) {
            return text[command.len()..].trim_start();
        }
    }
    text
}

fn parse_rate(rate_str: &str) -> Option<f32> {
    if let Some(stripped) = rate_str.strip_suffix('%') {
        let pct: f32 = stripped.parse().ok()?;
        Some(pct / 100.0 + 1.0)
    } else if let Some(stripped) = rate_str.strip_suffix("st") {
        let semitones: f32 = stripped.parse().ok()?;
        Some(2f32.powf(semitones / 12.0))
    } else {
        rate_str.parse().ok()
    }
}

fn parse_pitch(pitch_str: &str) -> Option<f32> {
    if let Some(stripped) = pitch_str.strip_suffix("st") {
        stripped.parse().ok()
    } else {
        pitch_str.parse().ok()
    }
}

/// Applies each grammar prefix left-to-right on `raw`, per spec §4.1's
/// table. Invalid prefixes (out-of-bounds rate/pitch) are left in the text
/// unchanged — the regex still consumed them textually in the Python
/// original, but here an out-of-bounds value simply isn't applied, leaving
/// the default in its place while the matched text is still stripped, to
/// match the original's behavior exactly.
pub fn parse_command(raw: &str, default_lang: &str) -> ParsedCommand {
    let mut lang: Option<String> = None;
    let mut engine = None;
    let mut voice = None;
    let mut rate = 1.0f32;
    let mut pitch = 0.0f32;

    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return ParsedCommand {
            text: String::new(),
            lang: default_lang.to_string(),
            engine: None,
            voice: None,
            rate: 1.0,
            pitch: 0.0,
        };
    }

    let mut text = strip_tts_command(trimmed).to_string();

    if let Some(caps) = lang_re().captures(&text) {
        let candidate = caps[1].to_lowercase();
        let rest = caps[2].to_string();
        if candidate.len() == 2 {
            lang = Some(candidate);
        }
        text = rest;
    }

    if let Some(caps) = engine_re().captures(&text) {
        let candidate = caps[1].to_lowercase();
        text = caps[2].to_string();
        engine = Some(candidate);
    }

    if let Some(caps) = voice_re().captures(&text) {
        voice = Some(caps[1].trim().to_string());
        text = caps[2].to_string();
    }

    if let Some(caps) = rate_re().captures(&text) {
        let rest = caps[2].to_string();
        if let Some(parsed) = parse_rate(&caps[1]) {
            if crate::utils::text::validate_rate(parsed).is_ok() {
                rate = parsed;
            }
        }
        text = rest;
    }

    if let Some(caps) = pitch_re().captures(&text) {
        let rest = caps[2].to_string();
        if let Some(parsed) = parse_pitch(&caps[1]) {
            if crate::utils::text::validate_pitch(parsed).is_ok() {
                pitch = parsed;
            }
        }
        text = rest;
    }

    let resolved_lang = match lang {
        Some(l) => l,
        None => detect_rtl_language(&text, default_lang),
    };

    ParsedCommand {
        text: clean_text_for_tts(&text),
        lang: resolved_lang,
        engine,
        voice,
        rate,
        pitch,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_with_no_prefixes() {
        let parsed = parse_command("hello world", "en");
        assert_eq!(parsed.text, "hello world");
        assert_eq!(parsed.lang, "en");
        assert_eq!(parsed.rate, 1.0);
        assert_eq!(parsed.pitch, 0.0);
        assert_eq!(parsed.engine, None);
        assert_eq!(parsed.voice, None);
    }

    #[test]
    fn lang_prefix_sets_lang() {
        let parsed = parse_command("[fa]: سلام", "en");
        assert_eq!(parsed.lang, "fa");
        assert_eq!(parsed.text, "سلام");
    }

    #[test]
    fn engine_prefix_sets_engine() {
        let parsed = parse_command("{edge} hi", "en");
        assert_eq!(parsed.engine.as_deref(), Some("edge"));
        assert_eq!(parsed.text, "hi");
    }

    #[test]
    fn voice_prefix_sets_voice() {
        let parsed = parse_command("(voice:en-US-Aria) hi", "en");
        assert_eq!(parsed.voice.as_deref(), Some("en-US-Aria"));
        assert_eq!(parsed.text, "hi");
    }

    #[test]
    fn percent_rate_normalizes() {
        let parsed = parse_command("+0% hi", "en");
        assert_eq!(parsed.rate, 1.0);
        let parsed = parse_command("+10% hi", "en");
        assert!((parsed.rate - 1.10).abs() < 1e-6);
    }

    #[test]
    fn out_of_bounds_percent_rate_is_rejected() {
        let parsed = parse_command("-100% hi", "en");
        assert_eq!(parsed.rate, 1.0);
    }

    #[test]
    fn semitone_rate_within_bounds_accepted() {
        let parsed = parse_command("+12st hi", "en");
        assert!((parsed.rate - 2.0).abs() < 1e-3);
    }

    #[test]
    fn semitone_rate_exceeding_bounds_rejected() {
        let parsed = parse_command("+13st hi", "en");
        assert_eq!(parsed.rate, 1.0);
    }

    #[test]
    fn pitch_prefix_sets_pitch() {
        let parsed = parse_command("@+2st hi", "en");
        assert_eq!(parsed.pitch, 2.0);
    }

    #[test]
    fn strips_leading_tts_command_token() {
        let parsed = parse_command("/tts [fa]: سلام دنیا", "en");
        assert_eq!(parsed.lang, "fa");
        assert_eq!(parsed.text, "سلام دنیا");
    }

    #[test]
    fn falls_back_to_rtl_detection_when_lang_absent() {
        let parsed = parse_command("سلام دنیا", "en");
        assert_eq!(parsed.lang, "fa");
    }

    #[test]
    fn text_is_suffix_of_input_after_stripping_prefixes() {
        let input = "[fa]: {edge} (voice:x) +10% @+1st سلام";
        let parsed = parse_command(input, "en");
        assert!(input.ends_with(&parsed.text) || parsed.text.is_empty());
    }
}
