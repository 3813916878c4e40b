//! The uniform message model every adapter normalizes provider updates
//! into. Grounded in
//! `examples/original_source/ttskit/telegram/base.py`'s
//! `MessageType`/`TelegramUser`/`TelegramMessage`/`TelegramChat`
//! dataclasses, re-expressed as Rust structs/enums.

use std::collections::HashMap;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Kind {
    Text,
    Voice,
    Audio,
    Document,
    Photo,
    Video,
    Sticker,
    Location,
    Contact,
    Poll,
    Unknown,
}

#[derive(Debug, Clone, PartialEq)]
pub struct User {
    pub id: i64,
    pub username: Option<String>,
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub language_code: Option<String>,
    pub is_bot: bool,
    pub is_premium: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChatType {
    Private,
    Group,
    Supergroup,
    Channel,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Chat {
    pub id: i64,
    pub chat_type: ChatType,
    pub title: Option<String>,
    pub username: Option<String>,
    pub description: Option<String>,
    pub invite_link: Option<String>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct TextEntity {
    pub kind: String,
    pub offset: usize,
    pub length: usize,
}

/// The normalized form every adapter produces from a provider update.
/// Never mutated after construction; discarded once orchestration of the
/// update completes.
#[derive(Debug, Clone)]
pub struct InboundMessage {
    pub id: i64,
    pub chat_id: i64,
    pub user: Option<User>,
    pub text: Option<String>,
    pub kind: Kind,
    pub reply_to_id: Option<i64>,
    pub sent_at: Option<i64>,
    pub edited_at: Option<i64>,
    pub media_group_id: Option<String>,
    pub caption: Option<String>,
    pub entities: Vec<TextEntity>,
    /// Debug-only pointer to the raw provider payload; never inspected by
    /// orchestration logic, only logged.
    pub raw_debug: Option<String>,
}

impl InboundMessage {
    /// Builds the `InboundMessage` for a callback-query event: the payload
    /// string becomes `text`, kind is always `Text`, and ids fall back to
    /// zero when the provider supplied no originating message.
    pub fn from_callback(
        chat_id: i64,
        user: Option<User>,
        payload: String,
        message_id: Option<i64>,
    ) -> Self {
        Self {
            id: message_id.unwrap_or(0),
            chat_id,
            user,
            text: Some(payload),
            kind: Kind::Text,
            reply_to_id: None,
            sent_at: None,
            edited_at: None,
            media_group_id: None,
            caption: None,
            entities: Vec::new(),
            raw_debug: None,
        }
    }
}

#[derive(Debug, Default, Clone)]
pub struct MediaFieldPresence {
    pub voice: bool,
    pub audio: bool,
    pub document: bool,
    pub photo: bool,
    pub video: bool,
    pub sticker: bool,
    pub location: bool,
    pub contact: bool,
    pub poll: bool,
}

/// Maps provider media-field presence to [`Kind`] using the priority order
/// in spec §4.1: voice → audio → document → photo → video → sticker →
/// location/geo → contact → poll → else text/unknown.
pub fn classify_kind(media: &MediaFieldPresence, has_text: bool) -> Kind {
    if media.voice {
        Kind::Voice
    } else if media.audio {
        Kind::Audio
    } else if media.document {
        Kind::Document
    } else if media.photo {
        Kind::Photo
    } else if media.video {
        Kind::Video
    } else if media.sticker {
        Kind::Sticker
    } else if media.location {
        Kind::Location
    } else if media.contact {
        Kind::Contact
    } else if media.poll {
        Kind::Poll
    } else if has_text {
        Kind::Text
    } else {
        Kind::Unknown
    }
}

pub type Metadata = HashMap<String, String>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn priority_order_prefers_voice_over_everything() {
        let mut media = MediaFieldPresence::default();
        media.voice = true;
        media.photo = true;
        assert_eq!(classify_kind(&media, true), Kind::Voice);
    }

    #[test]
    fn falls_back_to_text_when_no_media_present() {
        let media = MediaFieldPresence::default();
        assert_eq!(classify_kind(&media, true), Kind::Text);
        assert_eq!(classify_kind(&media, false), Kind::Unknown);
    }

    #[test]
    fn callback_event_carries_payload_as_text() {
        let msg = InboundMessage::from_callback(42, None, "engine_edge:fa".to_string(), None);
        assert_eq!(msg.kind, Kind::Text);
        assert_eq!(msg.text.as_deref(), Some("engine_edge:fa"));
        assert_eq!(msg.id, 0);
        assert_eq!(msg.chat_id, 42);
    }
}
