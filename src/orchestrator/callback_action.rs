//! Callback payloads are strings that encode state transitions
//! (`engine_edge:fa`, `settings_cache_off`, `admin_<action>`). Per
//! SPEC_FULL §9's "dynamic messages masquerading as state transitions"
//! note, they're parsed once here into a tagged enum and applied through
//! the same setters the admin commands use, instead of scattering string
//! matching through the handlers. Grounded in
//! `examples/original_source/ttskit/bot/unified_bot.py::_handle_engine_selection`
//! / `_handle_settings_callback`.

#[derive(Debug, Clone, PartialEq)]
pub enum SettingsFlag {
    Cache,
    AudioProcessing,
}

#[derive(Debug, Clone, PartialEq)]
pub enum CallbackAction {
    /// `engine_<name>[:lang]` — promote `name` for `lang`, or for the
    /// default language set when none is specified.
    SelectEngine {
        engine: String,
        lang: Option<String>,
    },
    /// `settings_{cache|audio}_{on|off}`
    ToggleSetting { flag: SettingsFlag, enabled: bool },
    /// `admin_<action>`
    Admin { action: String },
    Unknown(String),
}

pub fn parse_callback(payload: &str) -> CallbackAction {
    if let Some(rest) = payload.strip_prefix("engine_") {
        return match rest.split_once(':') {
            Some((engine, lang)) => CallbackAction::SelectEngine {
                engine: engine.to_string(),
                lang: Some(lang.to_string()),
            },
            None => CallbackAction::SelectEngine {
                engine: rest.to_string(),
                lang: None,
            },
        };
    }

    if let Some(rest) = payload.strip_prefix("settings_") {
        if let Some(flag_str) = rest.strip_suffix("_on") {
            if let Some(flag) = parse_settings_flag(flag_str) {
                return CallbackAction::ToggleSetting { flag, enabled: true };
            }
        }
        if let Some(flag_str) = rest.strip_suffix("_off") {
            if let Some(flag) = parse_settings_flag(flag_str) {
                return CallbackAction::ToggleSetting { flag, enabled: false };
            }
        }
    }

    if let Some(action) = payload.strip_prefix("admin_") {
        return CallbackAction::Admin {
            action: action.to_string(),
        };
    }

    CallbackAction::Unknown(payload.to_string())
}

fn parse_settings_flag(s: &str) -> Option<SettingsFlag> {
    match s {
        "cache" => Some(SettingsFlag::Cache),
        "audio" => Some(SettingsFlag::AudioProcessing),
        _ => None,
    }
}

/// Languages affected by an engine-selection callback that didn't pin a
/// language, per spec §4.6 ("a default set of languages when none is
/// specified").
pub const DEFAULT_ENGINE_SELECTION_LANGS: &[&str] = &["fa", "en", "ar"];

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_engine_selection_with_lang() {
        assert_eq!(
            parse_callback("engine_edge:fa"),
            CallbackAction::SelectEngine {
                engine: "edge".to_string(),
                lang: Some("fa".to_string())
            }
        );
    }

    #[test]
    fn parses_engine_selection_without_lang() {
        assert_eq!(
            parse_callback("engine_piper"),
            CallbackAction::SelectEngine {
                engine: "piper".to_string(),
                lang: None
            }
        );
    }

    #[test]
    fn parses_settings_toggle() {
        assert_eq!(
            parse_callback("settings_cache_off"),
            CallbackAction::ToggleSetting {
                flag: SettingsFlag::Cache,
                enabled: false
            }
        );
        assert_eq!(
            parse_callback("settings_audio_on"),
            CallbackAction::ToggleSetting {
                flag: SettingsFlag::AudioProcessing,
                enabled: true
            }
        );
    }

    #[test]
    fn parses_admin_action() {
        assert_eq!(
            parse_callback("admin_restart"),
            CallbackAction::Admin {
                action: "restart".to_string()
            }
        );
    }

    #[test]
    fn unrecognized_payload_is_unknown() {
        assert_eq!(
            parse_callback("garbage"),
            CallbackAction::Unknown("garbage".to_string())
        );
    }
}
