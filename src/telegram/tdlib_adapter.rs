//! The `telethon` variant: wraps `rust-tdlib`, bindings over the TDLib
//! MTProto client. TDLib's own event loop is synchronous-style (an
//! `Rc`/blocking receive loop internally); this adapter runs it on a
//! dedicated task and marshals updates back to the orchestrator's handler,
//! mirroring the "schedule coroutine on captured loop" bridge in §5/§9.
//! Outbound sends reuse the `client_id` the polling task's `start()` logged
//! in with, via `rust_tdlib::functions`' generated request wrappers.

use async_trait::async_trait;
use rust_tdlib::client::{Client as TdClient, ClientIdentifier, Worker};
use rust_tdlib::functions;
use rust_tdlib::tdjson;
use rust_tdlib::types::{
    FormattedText, InputFile as TdInputFile, InputFileLocal, InputMessageAudio,
    InputMessageContent, InputMessageDocument, InputMessageText, InputMessageVoiceNote,
    TdlibParameters, UpdateAuthorizationState,
};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::RwLock as StdRwLock;
use tokio::sync::Mutex;
use tokio::task::JoinHandle;

use crate::error::AdapterError;
use crate::telegram::adapter::{CallbackHandler, ErrorHandler, MessageHandler, TransportAdapter};
use crate::telegram::message::{Chat, ChatType, InboundMessage, Kind, User};

static TEMP_FILE_COUNTER: AtomicU64 = AtomicU64::new(0);

/// TDLib only accepts local file paths for outbound media (no in-memory
/// upload), so synthesized bytes are staged to a scratch file first and
/// removed once the send completes.
async fn stage_temp_file(bytes: &[u8], extension: &str) -> Result<std::path::PathBuf, AdapterError> {
    let seq = TEMP_FILE_COUNTER.fetch_add(1, Ordering::Relaxed);
    let path = std::env::temp_dir().join(format!("ttskit-{}-{seq}.{extension}", std::process::id()));
    tokio::fs::write(&path, bytes)
        .await
        .map_err(|e| AdapterError::Transport(e.to_string()))?;
    Ok(path)
}

pub struct TdlibAdapter {
    bot_token: String,
    api_id: i32,
    api_hash: String,
    worker: Mutex<Option<Worker>>,
    client_id: Mutex<Option<ClientIdentifier>>,
    message_handler: StdRwLock<Option<MessageHandler>>,
    callback_handler: StdRwLock<Option<CallbackHandler>>,
    error_handler: StdRwLock<Option<ErrorHandler>>,
    poll_task: Mutex<Option<JoinHandle<()>>>,
}

impl TdlibAdapter {
    pub fn new(bot_token: &str, api_id: i32, api_hash: String) -> Self {
        let _ = tdjson::set_log_verbosity_level;
        Self {
            bot_token: bot_token.to_string(),
            api_id,
            api_hash,
            worker: Mutex::new(None),
            client_id: Mutex::new(None),
            message_handler: StdRwLock::new(None),
            callback_handler: StdRwLock::new(None),
            error_handler: StdRwLock::new(None),
            poll_task: Mutex::new(None),
        }
    }

    fn tdlib_params(&self) -> TdlibParameters {
        TdlibParameters::builder()
            .api_id(self.api_id)
            .api_hash(self.api_hash.clone())
            .use_test_dc(false)
            .database_directory("tdlib_db".to_string())
            .build()
    }

    /// The `(worker, client_id)` pair `start()` logged in with, needed by
    /// every outbound call. `None` before `start()` runs or after `stop()`.
    async fn live_client(&self) -> Result<ClientIdentifier, AdapterError> {
        self.client_id
            .lock()
            .await
            .as_ref()
            .copied()
            .ok_or_else(|| AdapterError::Transport("adapter not started".to_string()))
    }
}

#[async_trait]
impl TransportAdapter for TdlibAdapter {
    async fn start(&self) -> Result<(), AdapterError> {
        let params = self.tdlib_params();
        let bot_token = self.bot_token.clone();
        let message_handler = self.message_handler.read().unwrap().clone();

        let (worker, mut receiver) = Worker::builder()
            .build()
            .map_err(|e| AdapterError::Transport(e.to_string()))?;
        let client = TdClient::builder()
            .with_tdlib_parameters(params)
            .build()
            .map_err(|e| AdapterError::Transport(e.to_string()))?;

        let client_id = worker
            .bot_login(client, bot_token)
            .await
            .map_err(|e| AdapterError::Transport(e.to_string()))?;

        *self.worker.lock().await = Some(worker);
        *self.client_id.lock().await = Some(client_id);

        let handle = tokio::spawn(async move {
            loop {
                match receiver.recv().await {
                    Some(rust_tdlib::types::Update::NewMessage(update)) => {
                        if let Some(handler) = &message_handler {
                            let msg = update.message();
                            let text = msg
                                .content()
                                .as_message_text()
                                .map(|t| t.text().text().to_string());
                            let inbound = InboundMessage {
                                id: msg.id() as i64,
                                chat_id: msg.chat_id(),
                                user: None,
                                text,
                                kind: Kind::Text,
                                reply_to_id: None,
                                sent_at: Some(msg.date() as i64),
                                edited_at: msg.edit_date().map(|d| d as i64).filter(|&d| d > 0),
                                media_group_id: None,
                                caption: None,
                                entities: Vec::new(),
                                raw_debug: None,
                            };
                            handler(inbound).await;
                        }
                    }
                    Some(rust_tdlib::types::Update::AuthorizationState(state)) => {
                        if let UpdateAuthorizationState::_AuthorizationStateClosed(_) = state {
                            break;
                        }
                    }
                    Some(_) => {}
                    None => break,
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
        self.worker.lock().await.take();
        self.client_id.lock().await.take();
        Ok(())
    }

    async fn send_message(
        &self,
        chat_id: i64,
        text: &str,
        reply_to: Option<i64>,
    ) -> Result<InboundMessage, AdapterError> {
        let client_id = self.live_client().await?;
        let content = InputMessageContent::InputMessageText(
            InputMessageText::builder()
                .text(FormattedText::builder().text(text).build())
                .build(),
        );
        let message = functions::send_message(
            chat_id,
            0,
            reply_to.unwrap_or(0),
            None,
            None,
            content,
            client_id,
        )
        .await
        .map_err(|e| AdapterError::Transport(format!("{e:?}")))?;
        Ok(InboundMessage {
            id: message.id(),
            chat_id,
            user: None,
            text: Some(text.to_string()),
            kind: Kind::Text,
            reply_to_id: reply_to,
            sent_at: Some(message.date() as i64),
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
        let client_id = self.live_client().await?;
        let path = stage_temp_file(&bytes, "ogg").await?;
        let content = InputMessageContent::InputMessageVoiceNote(
            InputMessageVoiceNote::builder()
                .voice_note(TdInputFile::Local(
                    InputFileLocal::builder()
                        .path(path.to_string_lossy().to_string())
                        .build(),
                ))
                .duration(duration_secs.unwrap_or(0) as i32)
                .caption(FormattedText::builder().text(caption.unwrap_or("")).build())
                .build(),
        );
        let result = functions::send_message(
            chat_id,
            0,
            reply_to.unwrap_or(0),
            None,
            None,
            content,
            client_id,
        )
        .await;
        tokio::fs::remove_file(&path).await.ok();
        let message = result.map_err(|e| AdapterError::Transport(format!("{e:?}")))?;
        Ok(InboundMessage {
            id: message.id(),
            chat_id,
            user: None,
            text: None,
            kind: Kind::Voice,
            reply_to_id: reply_to,
            sent_at: Some(message.date() as i64),
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
        let client_id = self.live_client().await?;
        let path = stage_temp_file(&bytes, "mp3").await?;
        let content = InputMessageContent::InputMessageAudio(
            InputMessageAudio::builder()
                .audio(TdInputFile::Local(
                    InputFileLocal::builder()
                        .path(path.to_string_lossy().to_string())
                        .build(),
                ))
                .caption(FormattedText::builder().text(caption.unwrap_or("")).build())
                .build(),
        );
        let result = functions::send_message(
            chat_id,
            0,
            reply_to.unwrap_or(0),
            None,
            None,
            content,
            client_id,
        )
        .await;
        tokio::fs::remove_file(&path).await.ok();
        let message = result.map_err(|e| AdapterError::Transport(format!("{e:?}")))?;
        Ok(InboundMessage {
            id: message.id(),
            chat_id,
            user: None,
            text: None,
            kind: Kind::Audio,
            reply_to_id: reply_to,
            sent_at: Some(message.date() as i64),
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
        let client_id = self.live_client().await?;
        let extension = std::path::Path::new(filename)
            .extension()
            .and_then(|e| e.to_str())
            .unwrap_or("bin");
        let path = stage_temp_file(&bytes, extension).await?;
        let content = InputMessageContent::InputMessageDocument(
            InputMessageDocument::builder()
                .document(TdInputFile::Local(
                    InputFileLocal::builder()
                        .path(path.to_string_lossy().to_string())
                        .build(),
                ))
                .caption(FormattedText::builder().text(caption.unwrap_or("")).build())
                .build(),
        );
        let result = functions::send_message(
            chat_id,
            0,
            reply_to.unwrap_or(0),
            None,
            None,
            content,
            client_id,
        )
        .await;
        tokio::fs::remove_file(&path).await.ok();
        let message = result.map_err(|e| AdapterError::Transport(format!("{e:?}")))?;
        Ok(InboundMessage {
            id: message.id(),
            chat_id,
            user: None,
            text: None,
            kind: Kind::Document,
            reply_to_id: reply_to,
            sent_at: Some(message.date() as i64),
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
        let client_id = self.live_client().await?;
        let content = InputMessageContent::InputMessageText(
            InputMessageText::builder()
                .text(FormattedText::builder().text(text).build())
                .build(),
        );
        functions::edit_message_text(chat_id, message_id, None, content, client_id)
            .await
            .map_err(|e| AdapterError::Transport(format!("{e:?}")))?;
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
        let Ok(client_id) = self.live_client().await else {
            return false;
        };
        functions::delete_messages(chat_id, vec![message_id], true, client_id)
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
