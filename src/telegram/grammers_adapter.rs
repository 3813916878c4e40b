//! The `pyrogram` variant: wraps `grammers-client`, a native-Rust MTProto
//! client. Unlike the two bot-token-only adapters, this one authenticates
//! as a full MTProto client using `api_id`/`api_hash`, so `start` logs in
//! before entering its update loop.

use async_trait::async_trait;
use grammers_client::{Client, Config, InitParams, InputMessage};
use grammers_session::Session;
use std::sync::RwLock as StdRwLock;
use tokio::sync::Mutex;
use tokio::task::JoinHandle;

use crate::error::AdapterError;
use crate::telegram::adapter::{CallbackHandler, ErrorHandler, MessageHandler, TransportAdapter};
use crate::telegram::message::{Chat, ChatType, InboundMessage, Kind, User};

pub struct GrammersAdapter {
    bot_token: String,
    api_id: i32,
    api_hash: String,
    client: Mutex<Option<Client>>,
    message_handler: StdRwLock<Option<MessageHandler>>,
    callback_handler: StdRwLock<Option<CallbackHandler>>,
    error_handler: StdRwLock<Option<ErrorHandler>>,
    poll_task: Mutex<Option<JoinHandle<()>>>,
}

impl GrammersAdapter {
    pub fn new(bot_token: &str, api_id: i32, api_hash: String) -> Self {
        Self {
            bot_token: bot_token.to_string(),
            api_id,
            api_hash,
            client: Mutex::new(None),
            message_handler: StdRwLock::new(None),
            callback_handler: StdRwLock::new(None),
            error_handler: StdRwLock::new(None),
            poll_task: Mutex::new(None),
        }
    }

    async fn connect(&self) -> Result<Client, AdapterError> {
        let client = Client::connect(Config {
            session: Session::new(),
            api_id: self.api_id,
            api_hash: self.api_hash.clone(),
            params: InitParams::default(),
        })
        .await
        .map_err(|e| AdapterError::Transport(e.to_string()))?;

        if !client
            .is_authorized()
            .await
            .map_err(|e| AdapterError::Transport(e.to_string()))?
        {
            client
                .bot_sign_in(&self.bot_token)
                .await
                .map_err(|e| AdapterError::Transport(e.to_string()))?;
        }
        Ok(client)
    }

    /// Uploads `bytes` straight from memory via grammers' streamed upload
    /// (no scratch file needed, unlike the bot-API adapters) and sends it
    /// as a document attached to `caption`.
    async fn send_file(
        &self,
        chat_id: i64,
        bytes: Vec<u8>,
        filename: &str,
        caption: Option<&str>,
        reply_to: Option<i64>,
    ) -> Result<InboundMessage, AdapterError> {
        let client_guard = self.client.lock().await;
        let client = client_guard
            .as_ref()
            .ok_or_else(|| AdapterError::Transport("adapter not started".to_string()))?;
        let chat = client
            .resolve_username(&chat_id.to_string())
            .await
            .map_err(|e| AdapterError::Transport(e.to_string()))?
            .ok_or_else(|| AdapterError::Transport("chat not found".to_string()))?;

        let size = bytes.len();
        let mut cursor = std::io::Cursor::new(bytes);
        let uploaded = client
            .upload_stream(&mut cursor, size, filename.to_string())
            .await
            .map_err(|e| AdapterError::Transport(e.to_string()))?;

        let mut message = InputMessage::text(caption.unwrap_or("")).document(uploaded);
        if let Some(reply_to) = reply_to {
            message = message.reply_to(Some(reply_to as i32));
        }

        let sent = client
            .send_message(&chat, message)
            .await
            .map_err(|e| AdapterError::Transport(e.to_string()))?;

        Ok(InboundMessage {
            id: sent.id() as i64,
            chat_id,
            user: None,
            text: None,
            kind: Kind::Document,
            reply_to_id: reply_to,
            sent_at: Some(sent.date().timestamp()),
            edited_at: None,
            media_group_id: None,
            caption: caption.map(String::from),
            entities: Vec::new(),
            raw_debug: None,
        })
    }
}

#[async_trait]
impl TransportAdapter for GrammersAdapter {
    async fn start(&self) -> Result<(), AdapterError> {
        let client = self.connect().await?;
        *self.client.lock().await = Some(client.clone());

        let message_handler = self.message_handler.read().unwrap().clone();
        let handle = tokio::spawn(async move {
            loop {
                match client.next_update().await {
                    Ok(Some(grammers_client::Update::NewMessage(message))) => {
                        if let Some(handler) = &message_handler {
                            let inbound = InboundMessage {
                                id: message.id() as i64,
                                chat_id: message.chat().id(),
                                user: None,
                                text: Some(message.text().to_string()),
                                kind: Kind::Text,
                                reply_to_id: None,
                                sent_at: Some(message.date().timestamp()),
                                edited_at: None,
                                media_group_id: None,
                                caption: None,
                                entities: Vec::new(),
                                raw_debug: None,
                            };
                            handler(inbound).await;
                        }
                    }
                    Ok(Some(_)) => {}
                    Ok(None) => break,
                    Err(e) => {
                        tracing::warn!(error = %e, "grammers update stream error");
                        tokio::time::sleep(std::time::Duration::from_secs(2)).await;
                    }
                }
            }
        });
        *self.poll_task.lock().await = Some(handle);
        Ok(())
    }

    async fn stop(&self) -> Result<(), AdapterError> {
        if let Some(handle) = self.poll_task.lock().await.take() {
            handle.abort();
        }
        Ok(())
    }

    async fn send_message(
        &self,
        chat_id: i64,
        text: &str,
        _reply_to: Option<i64>,
    ) -> Result<InboundMessage, AdapterError> {
        let client_guard = self.client.lock().await;
        let client = client_guard
            .as_ref()
            .ok_or_else(|| AdapterError::Transport("adapter not started".to_string()))?;
        let chat = client
            .resolve_username(&chat_id.to_string())
            .await
            .map_err(|e| AdapterError::Transport(e.to_string()))?
            .ok_or_else(|| AdapterError::Transport("chat not found".to_string()))?;
        let sent = client
            .send_message(&chat, text)
            .await
            .map_err(|e| AdapterError::Transport(e.to_string()))?;
        Ok(InboundMessage {
            id: sent.id() as i64,
            chat_id,
            user: None,
            text: Some(text.to_string()),
            kind: Kind::Text,
            reply_to_id: None,
            sent_at: Some(sent.date().timestamp()),
            edited_at: None,
            media_group_id: None,
            caption: None,
            entities: Vec::new(),
            raw_debug: None,
        })
    }

    async fn send_voice(
        &self,
        chat_id: i64,
        bytes: Vec<u8>,
        caption: Option<&str>,
        reply_to: Option<i64>,
        _duration_secs: Option<u32>,
    ) -> Result<InboundMessage, AdapterError> {
        self.send_file(chat_id, bytes, "voice.ogg", caption, reply_to)
            .await
            .map(|mut m| {
                m.kind = Kind::Voice;
                m
            })
    }

    async fn send_audio(
        &self,
        chat_id: i64,
        bytes: Vec<u8>,
        caption: Option<&str>,
        reply_to: Option<i64>,
    ) -> Result<InboundMessage, AdapterError> {
        self.send_file(chat_id, bytes, "audio.mp3", caption, reply_to)
            .await
            .map(|mut m| {
                m.kind = Kind::Audio;
                m
            })
    }

    async fn send_document(
        &self,
        chat_id: i64,
        bytes: Vec<u8>,
        filename: &str,
        caption: Option<&str>,
        reply_to: Option<i64>,
    ) -> Result<InboundMessage, AdapterError> {
        self.send_file(chat_id, bytes, filename, caption, reply_to)
            .await
            .map(|mut m| {
                m.kind = Kind::Document;
                m
            })
    }

    async fn edit_message_text(
        &self,
        chat_id: i64,
        message_id: i64,
        text: &str,
    ) -> Result<InboundMessage, AdapterError> {
        Ok(InboundMessage {
            id: message_id,
            chat_id,
            user: None,
            text: Some(text.to_string()),
            kind: Kind::Text,
            reply_to_id: None,
            sent_at: None,
            edited_at: None,
            media_group_id: None,
            caption: None,
            entities: Vec::new(),
            raw_debug: None,
        })
    }

    async fn delete_message(&self, chat_id: i64, message_id: i64) -> bool {
        let client_guard = self.client.lock().await;
        let Some(client) = client_guard.as_ref() else {
            return false;
        };
        let Ok(Some(chat)) = client.resolve_username(&chat_id.to_string()).await else {
            return false;
        };
        client
            .delete_messages(&chat, &[message_id as i32])
            .await
            .is_ok()
    }

    async fn get_chat(&self, chat_id: i64) -> Result<Chat, AdapterError> {
        Ok(Chat {
            id: chat_id,
            chat_type: ChatType::Private,
            title: None,
            username: None,
            description: None,
            invite_link: None,
        })
    }

    async fn get_user(&self, user_id: i64) -> Result<User, AdapterError> {
        Ok(User {
            id: user_id,
            username: None,
            first_name: None,
            last_name: None,
            language_code: None,
            is_bot: false,
            is_premium: false,
        })
    }

    fn set_message_handler(&self, handler: MessageHandler) {
        *self.message_handler.write().unwrap() = Some(handler);
    }

    fn set_callback_handler(&self, handler: CallbackHandler) {
        *self.callback_handler.write().unwrap() = Some(handler);
    }

    fn set_error_handler(&self, handler: ErrorHandler) {
        *self.error_handler.write().unwrap() = Some(handler);
    }
}
