//! The `aiogram` variant: wraps `teloxide`, the teacher's existing Telegram
//! Bot API dependency. The most fully fleshed adapter — grounded directly
//! in the teacher's `telegram/bot.rs` (`run_polling`, `Dispatcher`,
//! `InputFile::memory`, `oneshot`-channel shutdown).

use async_trait::async_trait;
use teloxide::prelude::*;
use teloxide::types::{InputFile, ParseMode};
use tokio::sync::oneshot;

use crate::error::AdapterError;
use crate::telegram::adapter::{CallbackHandler, ErrorHandler, MessageHandler, TransportAdapter};
use crate::telegram::message::{Chat, ChatType, InboundMessage, MediaFieldPresence, User};

pub struct TeloxideAdapter {
    bot: Bot,
    message_handler: std::sync::RwLock<Option<MessageHandler>>,
    callback_handler: std::sync::RwLock<Option<CallbackHandler>>,
    error_handler: std::sync::RwLock<Option<ErrorHandler>>,
    shutdown_tx: tokio::sync::Mutex<Option<oneshot::Sender<()>>>,
}

impl TeloxideAdapter {
    pub fn new(bot_token: &str) -> Self {
        Self {
            bot: Bot::new(bot_token),
            message_handler: std::sync::RwLock::new(None),
            callback_handler: std::sync::RwLock::new(None),
            error_handler: std::sync::RwLock::new(None),
            shutdown_tx: tokio::sync::Mutex::new(None),
        }
    }

    fn to_inbound(message: &teloxide::types::Message) -> InboundMessage {
        let media = MediaFieldPresence {
            voice: message.voice().is_some(),
            audio: message.audio().is_some(),
            document: message.document().is_some(),
            photo: message.photo().is_some(),
            video: message.video().is_some(),
            sticker: message.sticker().is_some(),
            location: message.location().is_some(),
            contact: message.contact().is_some(),
            poll: message.poll().is_some(),
        };
        let has_text = message.text().is_some();
        let kind = crate::telegram::message::classify_kind(&media, has_text);

        let user = message.from().map(|u| User {
            id: u.id.0 as i64,
            username: u.username.clone(),
            first_name: Some(u.first_name.clone()),
            last_name: u.last_name.clone(),
            language_code: u.language_code.clone(),
            is_bot: u.is_bot,
            is_premium: u.is_premium,
        });

        InboundMessage {
            id: message.id.0 as i64,
            chat_id: message.chat.id.0,
            user,
            text: message.text().map(String::from).or_else(|| message.caption().map(String::from)),
            kind,
            reply_to_id: message.reply_to_message().map(|m| m.id.0 as i64),
            sent_at: Some(message.date.timestamp()),
            edited_at: message.edit_date().map(|d| d.timestamp()),
            media_group_id: message.media_group_id().map(String::from),
            caption: message.caption().map(String::from),
            entities: Vec::new(),
            raw_debug: None,
        }
    }
}

#[async_trait]
impl TransportAdapter for TeloxideAdapter {
    async fn start(&self) -> Result<(), AdapterError> {
        let bot = self.bot.clone();
        let message_handler = self.message_handler.read().unwrap().clone();
        let callback_handler = self.callback_handler.read().unwrap().clone();

        let (tx, rx) = oneshot::channel();
        *self.shutdown_tx.lock().await = Some(tx);

        tokio::spawn(async move {
            let handler = dptree::entry()
                .branch(Update::filter_message().endpoint({
                    let message_handler = message_handler.clone();
                    move |msg: teloxide::types::Message| {
                        let message_handler = message_handler.clone();
                        async move {
                            if let Some(handler) = message_handler {
                                handler(TeloxideAdapter::to_inbound(&msg)).await;
                            }
                            respond(())
                        }
                    }
                }))
                .branch(Update::filter_callback_query().endpoint({
                    let callback_handler = callback_handler.clone();
                    move |cq: CallbackQuery| {
                        let callback_handler = callback_handler.clone();
                        async move {
                            if let Some(handler) = callback_handler {
                                let payload = cq.data.clone().unwrap_or_default();
                                let chat_id = cq
                                    .message
                                    .as_ref()
                                    .map(|m| m.chat().id.0)
                                    .unwrap_or(0);
                                let message_id = cq.message.as_ref().map(|m| m.id().0 as i64);
                                let user = Some(User {
                                    id: cq.from.id.0 as i64,
                                    username: cq.from.username.clone(),
                                    first_name: Some(cq.from.first_name.clone()),
                                    last_name: cq.from.last_name.clone(),
                                    language_code: cq.from.language_code.clone(),
                                    is_bot: cq.from.is_bot,
                                    is_premium: cq.from.is_premium,
                                });
                                let inbound =
                                    InboundMessage::from_callback(chat_id, user, payload.clone(), message_id);
                                handler(inbound, payload).await;
                            }
                            respond(())
                        }
                    }
                }));

            let mut dispatcher = Dispatcher::builder(bot, handler).build();
            let shutdown_token = dispatcher.shutdown_token();

            tokio::spawn(async move {
                let _ = rx.await;
                let _ = shutdown_token.shutdown();
            });

            dispatcher.dispatch().await;
        });

        Ok(())
    }

    async fn stop(&self) -> Result<(), AdapterError> {
        if let Some(tx) = self.shutdown_tx.lock().await.take() {
            let _ = tx.send(());
        }
        Ok(())
    }

    async fn send_message(
        &self,
        chat_id: i64,
        text: &str,
        reply_to: Option<i64>,
    ) -> Result<InboundMessage, AdapterError> {
        let mut request = self
            .bot
            .send_message(ChatId(chat_id), text)
            .parse_mode(ParseMode::Html);
        if let Some(reply_to) = reply_to {
            request = request.reply_to_message_id(teloxide::types::MessageId(reply_to as i32));
        }
        let message = request
            .await
            .map_err(|e| AdapterError::Transport(e.to_string()))?;
        Ok(Self::to_inbound(&message))
    }

    async fn send_voice(
        &self,
        chat_id: i64,
        bytes: Vec<u8>,
        caption: Option<&str>,
        reply_to: Option<i64>,
        duration_secs: Option<u32>,
    ) -> Result<InboundMessage, AdapterError> {
        let file = InputFile::memory(bytes).file_name("voice.ogg");
        let mut request = self.bot.send_voice(ChatId(chat_id), file);
        if let Some(caption) = caption {
            request = request.caption(caption);
        }
        if let Some(reply_to) = reply_to {
            request = request.reply_to_message_id(teloxide::types::MessageId(reply_to as i32));
        }
        request = request.duration(duration_secs.unwrap_or(5));
        let message = request
            .await
            .map_err(|e| AdapterError::Transport(e.to_string()))?;
        Ok(Self::to_inbound(&message))
    }

    async fn send_audio(
        &self,
        chat_id: i64,
        bytes: Vec<u8>,
        caption: Option<&str>,
        reply_to: Option<i64>,
    ) -> Result<InboundMessage, AdapterError> {
        let file = InputFile::memory(bytes).file_name("audio.mp3");
        let mut request = self.bot.send_audio(ChatId(chat_id), file);
        if let Some(caption) = caption {
            request = request.caption(caption);
        }
        if let Some(reply_to) = reply_to {
            request = request.reply_to_message_id(teloxide::types::MessageId(reply_to as i32));
        }
        let message = request
            .await
            .map_err(|e| AdapterError::Transport(e.to_string()))?;
        Ok(Self::to_inbound(&message))
    }

    async fn send_document(
        &self,
        chat_id: i64,
        bytes: Vec<u8>,
        filename: &str,
        caption: Option<&str>,
        reply_to: Option<i64>,
    ) -> Result<InboundMessage, AdapterError> {
        let file = InputFile::memory(bytes).file_name(filename.to_string());
        let mut request = self.bot.send_document(ChatId(chat_id), file);
        if let Some(caption) = caption {
            request = request.caption(caption);
        }
        if let Some(reply_to) = reply_to {
            request = request.reply_to_message_id(teloxide::types::MessageId(reply_to as i32));
        }
        let message = request
            .await
            .map_err(|e| AdapterError::Transport(e.to_string()))?;
        Ok(Self::to_inbound(&message))
    }

    async fn edit_message_text(
        &self,
        chat_id: i64,
        message_id: i64,
        text: &str,
    ) -> Result<InboundMessage, AdapterError> {
        let message = self
            .bot
            .edit_message_text(ChatId(chat_id), teloxide::types::MessageId(message_id as i32), text)
            .await
            .map_err(|e| AdapterError::Transport(e.to_string()))?;
        Ok(Self::to_inbound(&message))
    }

    async fn delete_message(&self, chat_id: i64, message_id: i64) -> bool {
        self.bot
            .delete_message(ChatId(chat_id), teloxide::types::MessageId(message_id as i32))
            .await
            .is_ok()
    }

    async fn get_chat(&self, chat_id: i64) -> Result<Chat, AdapterError> {
        let chat = self
            .bot
            .get_chat(ChatId(chat_id))
            .await
            .map_err(|e| AdapterError::Transport(e.to_string()))?;
        let chat_type = match chat.kind {
            teloxide::types::ChatKind::Private(_) => ChatType::Private,
            teloxide::types::ChatKind::Public(ref public) => match public.kind {
                teloxide::types::PublicChatKind::Group(_) => ChatType::Group,
                teloxide::types::PublicChatKind::Supergroup(_) => ChatType::Supergroup,
                teloxide::types::PublicChatKind::Channel(_) => ChatType::Channel,
            },
        };
        Ok(Chat {
            id: chat.id.0,
            chat_type,
            title: chat.title().map(String::from),
            username: chat.username().map(String::from),
            description: chat.description().map(String::from),
            invite_link: chat.invite_link().map(String::from),
        })
    }

    async fn get_user(&self, user_id: i64) -> Result<User, AdapterError> {
        // teloxide has no standalone "get user" endpoint; the Bot API only
        // exposes user info embedded in messages/chats, so this resolves
        // it via `get_chat` against the user's private chat id.
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
