//! The `telebot` variant: wraps `frankenstein`, a bot-token-only Bot API
//! client. Same `TransportAdapter` shape as [`crate::telegram::teloxide_adapter`],
//! driven by `frankenstein`'s long-polling client instead of teloxide's
//! dispatcher.

use async_trait::async_trait;
use frankenstein::client_reqwest::Bot;
use frankenstein::{
    AsyncTelegramApi, DeleteMessageParams, EditMessageTextParams, GetChatParams, SendAudioParams,
    SendDocumentParams, SendMessageParams, SendVoiceParams,
};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::RwLock as StdRwLock;
use tokio::sync::Mutex;
use tokio::task::JoinHandle;

use crate::error::AdapterError;
use crate::telegram::adapter::{CallbackHandler, ErrorHandler, MessageHandler, TransportAdapter};
use crate::telegram::message::{Chat, ChatType, InboundMessage, Kind, User};

static TEMP_FILE_COUNTER: AtomicU64 = AtomicU64::new(0);

/// `frankenstein::InputFile` only wraps a filesystem path (the crate reads
/// it off disk when building the multipart upload); there's no in-memory
/// variant, so synthesized bytes are staged to a scratch file first and
/// removed once the upload finishes.
async fn stage_temp_file(bytes: &[u8], extension: &str) -> Result<std::path::PathBuf, AdapterError> {
    let seq = TEMP_FILE_COUNTER.fetch_add(1, Ordering::Relaxed);
    let path = std::env::temp_dir().join(format!("ttskit-{}-{seq}.{extension}", std::process::id()));
    tokio::fs::write(&path, bytes)
        .await
        .map_err(|e| AdapterError::Transport(e.to_string()))?;
    Ok(path)
}

pub struct FrankensteinAdapter {
    bot: Bot,
    message_handler: StdRwLock<Option<MessageHandler>>,
    callback_handler: StdRwLock<Option<CallbackHandler>>,
    error_handler: StdRwLock<Option<ErrorHandler>>,
    poll_task: Mutex<Option<JoinHandle<()>>>,
}

impl FrankensteinAdapter {
    pub fn new(bot_token: &str) -> Self {
        Self {
            bot: Bot::new(bot_token),
            message_handler: StdRwLock::new(None),
            callback_handler: StdRwLock::new(None),
            error_handler: StdRwLock::new(None),
            poll_task: Mutex::new(None),
        }
    }
}

#[async_trait]
impl TransportAdapter for FrankensteinAdapter {
    async fn start(&self) -> Result<(), AdapterError> {
        // frankenstein's long-polling primitive runs on a dedicated task;
        // the two synchronous-upstream adapters in §4.1/§9 marshal handler
        // invocations back here rather than invoking them on the polling
        // thread directly.
        let bot = self.bot.clone();
        let message_handler = self.message_handler.read().unwrap().clone();

        let handle = tokio::spawn(async move {
            let mut offset: Option<i64> = None;
            loop {
                let params = frankenstein::GetUpdatesParams::builder()
                    .offset(offset.unwrap_or(0))
                    .timeout(30u32)
                    .build();
                match bot.get_updates(&params).await {
                    Ok(response) => {
                        for update in response.result {
                            offset = Some(update.update_id as i64 + 1);
                            if let frankenstein::UpdateContent::Message(msg) = update.content {
                                if let Some(handler) = &message_handler {
                                    let inbound = InboundMessage {
                                        id: msg.message_id as i64,
                                        chat_id: msg.chat.id,
                                        user: msg.from.map(|u| User {
                                            id: u.id as i64,
                                            username: u.username,
                                            first_name: Some(u.first_name),
                                            last_name: u.last_name,
                                            language_code: u.language_code,
                                            is_bot: u.is_bot,
                                            is_premium: u.is_premium.unwrap_or(false),
                                        }),
                                        text: msg.text.clone(),
                                        kind: if msg.text.is_some() { Kind::Text } else { Kind::Unknown },
                                        reply_to_id: None,
                                        sent_at: Some(msg.date as i64),
                                        edited_at: msg.edit_date.map(|d| d as i64),
                                        media_group_id: msg.media_group_id,
                                        caption: msg.caption,
                                        entities: Vec::new(),
                                        raw_debug: None,
                                    };
                                    handler(inbound).await;
                                }
                            }
                        }
                    }
                    Err(e) => {
                        tracing::warn!(error = %e, "frankenstein getUpdates failed, backing off");
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
        reply_to: Option<i64>,
    ) -> Result<InboundMessage, AdapterError> {
        let mut builder = SendMessageParams::builder()
            .chat_id(chat_id)
            .text(text);
        if let Some(reply_to) = reply_to {
            builder = builder.reply_to_message_id(reply_to as i64);
        }
        let response = self
            .bot
            .send_message(&builder.build())
            .await
            .map_err(|e| AdapterError::Transport(e.to_string()))?;
        Ok(InboundMessage {
            id: response.result.message_id as i64,
            chat_id,
            user: None,
            text: Some(text.to_string()),
            kind: Kind::Text,
            reply_to_id: reply_to,
            sent_at: Some(response.result.date as i64),
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
        duration_secs: Option<u32>,
    ) -> Result<InboundMessage, AdapterError> {
        let path = stage_temp_file(&bytes, "ogg").await?;
        let file = frankenstein::FileUpload::InputFile(frankenstein::InputFile { path: path.clone() });
        let mut builder = SendVoiceParams::builder().chat_id(chat_id).voice(file);
        if let Some(caption) = caption {
            builder = builder.caption(caption.to_string());
        }
        if let Some(reply_to) = reply_to {
            builder = builder.reply_to_message_id(reply_to as i64);
        }
        if let Some(duration) = duration_secs {
            builder = builder.duration(duration as u32);
        }
        let result = self.bot.send_voice(&builder.build()).await;
        tokio::fs::remove_file(&path).await.ok();
        let response = result.map_err(|e| AdapterError::Transport(e.to_string()))?;
        Ok(InboundMessage {
            id: response.result.message_id as i64,
            chat_id,
            user: None,
            text: None,
            kind: Kind::Voice,
            reply_to_id: reply_to,
            sent_at: Some(response.result.date as i64),
            edited_at: None,
            media_group_id: None,
            caption: caption.map(String::from),
            entities: Vec::new(),
            raw_debug: None,
        })
    }

    async fn send_audio(
        &self,
        chat_id: i64,
        bytes: Vec<u8>,
        caption: Option<&str>,
        reply_to: Option<i64>,
    ) -> Result<InboundMessage, AdapterError> {
        let path = stage_temp_file(&bytes, "mp3").await?;
        let file = frankenstein::FileUpload::InputFile(frankenstein::InputFile { path: path.clone() });
        let mut builder = SendAudioParams::builder().chat_id(chat_id).audio(file);
        if let Some(caption) = caption {
            builder = builder.caption(caption.to_string());
        }
        if let Some(reply_to) = reply_to {
            builder = builder.reply_to_message_id(reply_to as i64);
        }
        let result = self.bot.send_audio(&builder.build()).await;
        tokio::fs::remove_file(&path).await.ok();
        let response = result.map_err(|e| AdapterError::Transport(e.to_string()))?;
        Ok(InboundMessage {
            id: response.result.message_id as i64,
            chat_id,
            user: None,
            text: None,
            kind: Kind::Audio,
            reply_to_id: reply_to,
            sent_at: Some(response.result.date as i64),
            edited_at: None,
            media_group_id: None,
            caption: caption.map(String::from),
            entities: Vec::new(),
            raw_debug: None,
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
        let extension = std::path::Path::new(filename)
            .extension()
            .and_then(|e| e.to_str())
            .unwrap_or("bin");
        let path = stage_temp_file(&bytes, extension).await?;
        let file = frankenstein::FileUpload::InputFile(frankenstein::InputFile { path: path.clone() });
        let mut builder = SendDocumentParams::builder()
            .chat_id(chat_id)
            .document(file);
        if let Some(caption) = caption {
            builder = builder.caption(caption.to_string());
        }
        if let Some(reply_to) = reply_to {
            builder = builder.reply_to_message_id(reply_to as i64);
        }
        let result = self.bot.send_document(&builder.build()).await;
        tokio::fs::remove_file(&path).await.ok();
        let response = result.map_err(|e| AdapterError::Transport(e.to_string()))?;
        Ok(InboundMessage {
            id: response.result.message_id as i64,
            chat_id,
            user: None,
            text: None,
            kind: Kind::Document,
            reply_to_id: reply_to,
            sent_at: Some(response.result.date as i64),
            edited_at: None,
            media_group_id: None,
            caption: caption.map(String::from),
            entities: Vec::new(),
            raw_debug: None,
        })
    }

    async fn edit_message_text(
        &self,
        chat_id: i64,
        message_id: i64,
        text: &str,
    ) -> Result<InboundMessage, AdapterError> {
        let params = EditMessageTextParams::builder()
            .chat_id(chat_id)
            .message_id(message_id as i32)
            .text(text)
            .build();
        self.bot
            .edit_message_text(&params)
            .await
            .map_err(|e| AdapterError::Transport(e.to_string()))?;
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
        let params = DeleteMessageParams::builder()
            .chat_id(chat_id)
            .message_id(message_id as i32)
            .build();
        self.bot.delete_message(&params).await.is_ok()
    }

    async fn get_chat(&self, chat_id: i64) -> Result<Chat, AdapterError> {
        let params = GetChatParams::builder().chat_id(chat_id).build();
        let response = self
            .bot
            .get_chat(&params)
            .await
            .map_err(|e| AdapterError::Transport(e.to_string()))?;
        let chat_type = match response.result.type_field.as_str() {
            "private" => ChatType::Private,
            "group" => ChatType::Group,
            "supergroup" => ChatType::Supergroup,
            "channel" => ChatType::Channel,
            _ => ChatType::Private,
        };
        Ok(Chat {
            id: response.result.id,
            chat_type,
            title: response.result.title,
            username: response.result.username,
            description: response.result.description,
            invite_link: response.result.invite_link,
        })
    }

    async fn get_user(&self, user_id: i64) -> Result<User, AdapterError> {
        let chat = self.get_chat(user_id).await?;
        Ok(User {
            id: user_id,
            username: chat.username,
            first_name: chat.title,
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
