//! The transport-adapter capability interface every provider-specific
//! client implements. Grounded in
//! `examples/original_source/ttskit/telegram/base.py::TelegramAdapter`
//! (the abstract base) re-expressed as a Rust async trait, following the
//! teacher's `TtsProvider` trait shape (`tts/interface.rs`).

use async_trait::async_trait;
use std::sync::Arc;

use crate::error::AdapterError;
use crate::telegram::message::{Chat, InboundMessage, User};

pub type MessageHandler =
    Arc<dyn Fn(InboundMessage) -> futures::future::BoxFuture<'static, ()> + Send + Sync>;
pub type CallbackHandler = Arc<
    dyn Fn(InboundMessage, String) -> futures::future::BoxFuture<'static, ()> + Send + Sync,
>;
pub type ErrorHandler =
    Arc<dyn Fn(AdapterError) -> futures::future::BoxFuture<'static, ()> + Send + Sync>;

#[async_trait]
pub trait TransportAdapter: Send + Sync {
    /// Starts the adapter. May spawn a background task for its own
    /// internal update loop; must return control to the caller rather than
    /// blocking the calling task forever.
    async fn start(&self) -> Result<(), AdapterError>;

    async fn stop(&self) -> Result<(), AdapterError>;

    async fn send_message(
        &self,
        chat_id: i64,
        text: &str,
        reply_to: Option<i64>,
    ) -> Result<InboundMessage, AdapterError>;

    async fn send_voice(
        &self,
        chat_id: i64,
        bytes: Vec<u8>,
        caption: Option<&str>,
        reply_to: Option<i64>,
        duration_secs: Option<u32>,
    ) -> Result<InboundMessage, AdapterError>;

    async fn send_audio(
        &self,
        chat_id: i64,
        bytes: Vec<u8>,
        caption: Option<&str>,
        reply_to: Option<i64>,
    ) -> Result<InboundMessage, AdapterError>;

    async fn send_document(
        &self,
        chat_id: i64,
        bytes: Vec<u8>,
        filename: &str,
        caption: Option<&str>,
        reply_to: Option<i64>,
    ) -> Result<InboundMessage, AdapterError>;

    async fn edit_message_text(
        &self,
        chat_id: i64,
        message_id: i64,
        text: &str,
    ) -> Result<InboundMessage, AdapterError>;

    /// Never raises: failures are logged and `false` is returned.
    async fn delete_message(&self, chat_id: i64, message_id: i64) -> bool;

    async fn get_chat(&self, chat_id: i64) -> Result<Chat, AdapterError>;

    async fn get_user(&self, user_id: i64) -> Result<User, AdapterError>;

    fn set_message_handler(&self, handler: MessageHandler);
    fn set_callback_handler(&self, handler: CallbackHandler);
    fn set_error_handler(&self, handler: ErrorHandler);
}
