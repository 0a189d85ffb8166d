//! In-memory transport for unit tests.

use std::collections::HashMap;
use std::sync::Mutex;

use async_trait::async_trait;
use chrono::Utc;

use super::{
    AccountInfo, ChatKind, ChatRef, DialogInfo, IncomingMessage, MediaKind, OutgoingMedia,
    Sender, Transport, TransportError,
};

/// Records every call made through it.
#[derive(Debug, Default)]
pub struct RecordingTransport {
    pub responses: Mutex<Vec<(i32, String)>>,
    pub sent: Mutex<Vec<(i64, String)>>,
    pub deleted: Mutex<Vec<i32>>,
    pub media: Mutex<Vec<(MediaKind, usize)>>,
    pub left: Mutex<Vec<i64>>,
    pub dialogs: Vec<DialogInfo>,
    pub replies: HashMap<i32, String>,
}

impl RecordingTransport {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_dialogs(dialogs: Vec<DialogInfo>) -> Self {
        Self {
            dialogs,
            ..Self::default()
        }
    }

    pub fn responses(&self) -> Vec<String> {
        self.responses
            .lock()
            .unwrap()
            .iter()
            .map(|(_, text)| text.clone())
            .collect()
    }

    pub fn last_response(&self) -> Option<String> {
        self.responses().last().cloned()
    }

    pub fn sent(&self) -> Vec<String> {
        self.sent
            .lock()
            .unwrap()
            .iter()
            .map(|(_, text)| text.clone())
            .collect()
    }

    /// Texts sent into `chat_id`, by reply or by id.
    pub fn sent_to(&self, chat_id: i64) -> Vec<String> {
        self.sent
            .lock()
            .unwrap()
            .iter()
            .filter(|(chat, _)| *chat == chat_id)
            .map(|(_, text)| text.clone())
            .collect()
    }

    pub fn media_kinds(&self) -> Vec<MediaKind> {
        self.media.lock().unwrap().iter().map(|(k, _)| *k).collect()
    }
}

#[async_trait]
impl Transport for RecordingTransport {
    async fn respond(&self, message: &IncomingMessage, text: &str) -> Result<(), TransportError> {
        self.responses
            .lock()
            .unwrap()
            .push((message.id, text.to_owned()));
        Ok(())
    }

    async fn reply(&self, message: &IncomingMessage, text: &str) -> Result<(), TransportError> {
        self.sent
            .lock()
            .unwrap()
            .push((message.chat.id, text.to_owned()));
        Ok(())
    }

    async fn delete(&self, message: &IncomingMessage) -> Result<(), TransportError> {
        self.deleted.lock().unwrap().push(message.id);
        Ok(())
    }

    async fn send_media(
        &self,
        _message: &IncomingMessage,
        media: OutgoingMedia,
    ) -> Result<(), TransportError> {
        self.media
            .lock()
            .unwrap()
            .push((media.kind, media.bytes.len()));
        Ok(())
    }

    async fn replied_text(&self, message: &IncomingMessage) -> Result<Option<String>, TransportError> {
        Ok(message
            .reply_to
            .and_then(|id| self.replies.get(&id).cloned()))
    }

    async fn me(&self) -> Result<AccountInfo, TransportError> {
        Ok(AccountInfo {
            id: 1000,
            first_name: "Test".to_owned(),
            last_name: None,
            username: Some("tester".to_owned()),
            phone: None,
            is_bot: false,
        })
    }

    async fn dialogs(&self) -> Result<Vec<DialogInfo>, TransportError> {
        Ok(self.dialogs.clone())
    }

    async fn send_text(&self, chat_id: i64, text: &str) -> Result<(), TransportError> {
        self.sent.lock().unwrap().push((chat_id, text.to_owned()));
        Ok(())
    }

    async fn leave_chat(&self, chat_id: i64) -> Result<(), TransportError> {
        self.left.lock().unwrap().push(chat_id);
        Ok(())
    }
}

/// An outgoing private message with the given text, sent by user 42.
pub fn message(text: &str) -> IncomingMessage {
    message_from(42, text)
}

/// An outgoing private message from `user_id`.
pub fn message_from(user_id: i64, text: &str) -> IncomingMessage {
    IncomingMessage {
        id: 1,
        chat: ChatRef {
            id: user_id,
            kind: ChatKind::Private,
            title: None,
        },
        sender: Some(Sender {
            id: user_id,
            display_name: "Tester".to_owned(),
            username: None,
        }),
        text: text.to_owned(),
        outgoing: true,
        reply_to: None,
        date: Utc::now(),
    }
}

/// A private message received from `user_id`.
pub fn incoming_from(user_id: i64, first_name: &str, text: &str) -> IncomingMessage {
    let mut msg = message_from(user_id, text);
    msg.outgoing = false;
    if let Some(sender) = msg.sender.as_mut() {
        sender.display_name = first_name.to_owned();
    }
    msg
}

/// A message posted in a group chat.
pub fn group_message(chat_id: i64, text: &str) -> IncomingMessage {
    let mut msg = message(text);
    msg.chat = ChatRef {
        id: chat_id,
        kind: ChatKind::Supergroup,
        title: Some("Test group".to_owned()),
    };
    msg
}
