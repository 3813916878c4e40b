//! Text cleaning, RTL language detection, and rate/pitch validation shared
//! by the command parser and the orchestrator.

/// Characters in these Unicode blocks (Arabic, Hebrew, and their
/// presentation-form extensions) mark a string as right-to-left.
fn is_rtl_char(c: char) -> bool {
    matches!(c as u32,
        0x0590..=0x05FF   // Hebrew
        | 0x0600..=0x06FF // Arabic
        | 0x0700..=0x074F // Syriac
        | 0x0750..=0x077F // Arabic Supplement
        | 0xFB50..=0xFDFF // Arabic Presentation Forms-A
        | 0xFE70..=0xFEFF // Arabic Presentation Forms-B
    )
}

/// Picks `fa` when Arabic-script characters dominate the text, else falls
/// back to the caller-supplied default. Mirrors the source's RTL-detection
/// fallback used when no explicit `[lang]:` prefix is present.
pub fn detect_rtl_language(text: &str, default_lang: &str) -> String {
    let total = text.chars().filter(|c| c.is_alphabetic()).count();
    if total == 0 {
        return default_lang.to_string();
    }
    let rtl = text.chars().filter(|c| is_rtl_char(*c)).count();
    if rtl * 2 > total {
        "fa".to_string()
    } else {
        default_lang.to_string()
    }
}

/// Collapses whitespace and strips characters that confuse most TTS
/// engines (control characters, zero-width marks). Leaves punctuation and
/// script-specific diacritics untouched.
pub fn clean_text_for_tts(text: &str) -> String {
    let stripped: String = text
        .chars()
        .filter(|c| !c.is_control() || *c == '\n')
        .filter(|c| !matches!(*c as u32, 0x200B..=0x200F | 0xFEFF))
        .collect();

    stripped.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// `rate ∈ [0.5, 2.0]`.
pub fn validate_rate(rate: f32) -> Result<f32, crate::error::InputValidationError> {
    if (0.5..=2.0).contains(&rate) {
        Ok(rate)
    } else {
        Err(crate::error::InputValidationError::RateOutOfBounds(rate))
    }
}

/// `pitch ∈ [-12.0, 12.0]` semitones.
pub fn validate_pitch(pitch: f32) -> Result<f32, crate::error::InputValidationError> {
    if (-12.0..=12.0).contains(&pitch) {
        Ok(pitch)
    } else {
        Err(crate::error::InputValidationError::PitchOutOfBounds(pitch))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn detects_persian_text_as_fa() {
        assert_eq!(detect_rtl_language("سلام دنیا", "en"), "fa");
    }

    #[test]
    fn latin_text_keeps_default() {
        assert_eq!(detect_rtl_language("hello world", "en"), "en");
    }

    #[test]
    fn empty_text_keeps_default() {
        assert_eq!(detect_rtl_language("   ", "en"), "en");
    }

    #[test]
    fn cleans_whitespace_and_zero_width_marks() {
        assert_eq!(clean_text_for_tts("hello\u{200B}  world\t\t!"), "hello world !");
    }

    #[test]
    fn rate_bounds() {
        assert!(validate_rate(1.0).is_ok());
        assert!(validate_rate(0.5).is_ok());
        assert!(validate_rate(2.0).is_ok());
        assert!(validate_rate(0.49).is_err());
        assert!(validate_rate(2.01).is_err());
    }

    #[test]
    fn pitch_bounds() {
        assert!(validate_pitch(0.0).is_ok());
        assert!(validate_pitch(-12.0).is_ok());
        assert!(validate_pitch(12.0).is_ok());
        assert!(validate_pitch(13.0).is_err());
    }
}
