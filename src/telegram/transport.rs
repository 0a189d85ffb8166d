//! Transport abstraction used by command handlers and plugins.
//!
//! Handlers never touch the MTProto client directly. They receive a
//! [`Transport`] and the [`IncomingMessage`] that triggered them.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use thiserror::Error;

/// Errors that can occur while talking to Telegram.
#[derive(Debug, Error)]
pub enum TransportError {
    #[error("Not authorized. Please sign in first.")]
    NotAuthorized,

    #[error("Sign in failed: {0}")]
    SignInFailed(String),

    #[error("Flood wait required: {0} seconds")]
    FloodWait(u32),

    #[error("Connection error: {0}")]
    Connection(String),

    #[error("Session error: {0}")]
    Session(String),

    #[error("Unknown chat: {0}")]
    UnknownChat(i64),

    #[error("Message is no longer available")]
    MessageGone,

    #[error("Upload failed: {0}")]
    Upload(String),

    #[error("API invocation error: {0}")]
    Invocation(String),
}

/// Kind of chat a message arrived in.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChatKind {
    Private,
    Group,
    Supergroup,
    Channel,
}

impl ChatKind {
    /// Whether the chat is a group of any kind.
    #[must_use]
    pub const fn is_group(self) -> bool {
        matches!(self, Self::Group | Self::Supergroup)
    }
}

/// Minimal chat reference carried with every message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChatRef {
    pub id: i64,
    pub kind: ChatKind,
    pub title: Option<String>,
}

/// Sender of a message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Sender {
    pub id: i64,
    pub display_name: String,
    pub username: Option<String>,
}

/// A text message delivered by the transport.
#[derive(Debug, Clone)]
pub struct IncomingMessage {
    pub id: i32,
    pub chat: ChatRef,
    pub sender: Option<Sender>,
    pub text: String,
    pub outgoing: bool,
    pub reply_to: Option<i32>,
    pub date: DateTime<Utc>,
}

impl IncomingMessage {
    /// Id of the sender, or zero for anonymous senders.
    #[must_use]
    pub fn sender_id(&self) -> i64 {
        self.sender.as_ref().map_or(0, |s| s.id)
    }

    /// Display name of the sender, if known.
    #[must_use]
    pub fn sender_name(&self) -> &str {
        self.sender.as_ref().map_or("unknown", |s| s.display_name.as_str())
    }
}

/// Account details of the logged-in user or bot.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AccountInfo {
    pub id: i64,
    pub first_name: String,
    pub last_name: Option<String>,
    pub username: Option<String>,
    pub phone: Option<String>,
    pub is_bot: bool,
}

/// A dialog (chat) the account participates in.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DialogInfo {
    pub id: i64,
    pub kind: ChatKind,
    pub title: String,
}

/// How outgoing media should be presented.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MediaKind {
    Photo,
    Sticker,
}

/// Media produced by a handler.
#[derive(Debug, Clone)]
pub struct OutgoingMedia {
    pub kind: MediaKind,
    pub file_name: String,
    pub bytes: Vec<u8>,
    pub caption: Option<String>,
}

impl OutgoingMedia {
    /// Creates a photo with an optional caption.
    #[must_use]
    pub fn photo(file_name: impl Into<String>, bytes: Vec<u8>, caption: Option<String>) -> Self {
        Self {
            kind: MediaKind::Photo,
            file_name: file_name.into(),
            bytes,
            caption,
        }
    }

    /// Creates a sticker from WebP bytes.
    #[must_use]
    pub fn sticker(bytes: Vec<u8>) -> Self {
        Self {
            kind: MediaKind::Sticker,
            file_name: "sticker.webp".to_owned(),
            bytes,
            caption: None,
        }
    }
}

/// Capabilities the userbot needs from a messaging client.
#[async_trait]
pub trait Transport: Send + Sync {
    /// Presents `text` as the answer to `message`.
    ///
    /// The self account edits the triggering message in place. The bot
    /// account replies once and edits that reply on later calls.
    async fn respond(&self, message: &IncomingMessage, text: &str) -> Result<(), TransportError>;

    /// Sends `text` as a new message replying to `message`.
    async fn reply(&self, message: &IncomingMessage, text: &str) -> Result<(), TransportError>;

    /// Deletes the triggering message.
    async fn delete(&self, message: &IncomingMessage) -> Result<(), TransportError>;

    /// Sends media into the chat of `message`.
    async fn send_media(
        &self,
        message: &IncomingMessage,
        media: OutgoingMedia,
    ) -> Result<(), TransportError>;

    /// Text of the message `message` replies to, if any.
    async fn replied_text(&self, message: &IncomingMessage) -> Result<Option<String>, TransportError>;

    /// Details of the logged-in account.
    async fn me(&self) -> Result<AccountInfo, TransportError>;

    /// All dialogs of the account.
    async fn dialogs(&self) -> Result<Vec<DialogInfo>, TransportError>;

    /// Sends `text` as a new message into a group or channel by id.
    async fn send_text(&self, chat_id: i64, text: &str) -> Result<(), TransportError>;

    /// Leaves a group or channel.
    async fn leave_chat(&self, chat_id: i64) -> Result<(), TransportError>;
}
