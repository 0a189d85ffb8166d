//! Telegram client wrapper implementing [`Transport`].

use std::collections::HashMap;
use std::future::Future;
use std::io::Cursor;
use std::num::NonZeroUsize;
use std::path::Path;
use std::sync::Arc;
use std::time::Instant;

use async_trait::async_trait;
use grammers_client::client::{LoginToken, PasswordToken};
use grammers_client::message::{InputMessage, Message};
use grammers_client::update::Update;
use grammers_client::{
    Client, InvocationError, SenderPool, SignInError, UpdatesConfiguration, sender,
};
use grammers_session::storages::SqliteSession;
use grammers_tl_types as tl;
use lru::LruCache;
use thiserror::Error;
use tokio::sync::{Mutex, mpsc};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use super::{
    AccountInfo, ChatKind, ChatRef, DialogInfo, IncomingMessage, MediaKind, OutgoingMedia,
    SendThrottle, Sender, Transport, TransportError,
};

/// Re-export types for external use.
pub use grammers_client::client::{LoginToken as Token, PasswordToken as PwdToken};

/// Messages kept for later edits, deletes and replies.
const MESSAGE_CACHE_SIZE: NonZeroUsize = match NonZeroUsize::new(512) {
    Some(size) => size,
    None => NonZeroUsize::MIN,
};

/// Dialogs fetched per `dialogs()` call.
const DIALOG_LIMIT: i32 = 100;

/// Offset between a channel id and its dialog id.
const CHANNEL_ID_OFFSET: i64 = 1_000_000_000_000;

/// Errors of the interactive sign-in flow.
#[derive(Debug, Error)]
pub enum AuthError {
    #[error("Sign in failed: {0}")]
    SignInFailed(String),

    #[error("Password required for 2FA")]
    PasswordRequired(PasswordToken),

    #[error("Invalid password")]
    InvalidPassword(PasswordToken),

    #[error(transparent)]
    Transport(#[from] TransportError),
}

impl From<InvocationError> for TransportError {
    fn from(err: InvocationError) -> Self {
        let err_str = err.to_string();

        // Check for flood wait errors
        if (err_str.contains("FLOOD_WAIT") || err_str.contains("flood"))
            && let Some(seconds) = extract_flood_wait_seconds(&err_str)
        {
            return Self::FloodWait(seconds);
        }

        Self::Invocation(err_str)
    }
}

/// Extracts flood wait seconds from an error message.
fn extract_flood_wait_seconds(err_msg: &str) -> Option<u32> {
    let patterns = ["FLOOD_WAIT_", "flood wait "];

    for pattern in patterns {
        if let Some(idx) = err_msg.to_lowercase().find(&pattern.to_lowercase()) {
            let start = idx + pattern.len();
            let num_str: String = err_msg[start..]
                .chars()
                .take_while(char::is_ascii_digit)
                .collect();
            if let Ok(seconds) = num_str.parse() {
                return Some(seconds);
            }
        }
    }
    None
}

/// Result of QR code authentication attempt.
#[derive(Debug, Clone)]
pub enum QrAuthResult {
    /// Got a token to display as QR code.
    Token {
        /// Raw token bytes (encode as base64 for URL).
        token: Vec<u8>,
        /// Unix timestamp when the token expires.
        expires: i32,
    },
    /// Need to migrate to another DC.
    MigrateTo {
        /// Target datacenter ID.
        dc_id: i32,
    },
    /// Authentication successful.
    Success {
        user_id: i64,
        username: Option<String>,
    },
    /// 2FA password is required.
    PasswordRequired,
}

/// How [`Transport::respond`] presents answers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResponseMode {
    /// The account edits its own command message.
    EditInPlace,
    /// The account replies once and edits that reply afterwards.
    ReplyOnce,
}

/// How to address a group or channel.
#[derive(Debug, Clone, Copy)]
enum ChatTarget {
    BasicGroup(i64),
    Channel { id: i64, access_hash: i64 },
    Unsupported,
}

impl ChatTarget {
    fn input_peer(self) -> Option<tl::enums::InputPeer> {
        match self {
            Self::BasicGroup(chat_id) => {
                Some(tl::enums::InputPeer::Chat(tl::types::InputPeerChat { chat_id }))
            }
            Self::Channel { id, access_hash } => {
                Some(tl::enums::InputPeer::Channel(tl::types::InputPeerChannel {
                    channel_id: id,
                    access_hash,
                }))
            }
            Self::Unsupported => None,
        }
    }
}

#[derive(Debug, Clone)]
struct PeerEntry {
    kind: ChatKind,
    title: String,
    target: ChatTarget,
}

type MessageKey = (i64, i32);
type UpdateStarter = Box<dyn FnOnce() -> JoinHandle<()> + Send>;

/// High-level Telegram client wrapper.
pub struct TelegramBot {
    /// The underlying grammers client.
    client: Client,

    /// Handle to the sender pool for disconnection.
    handle: sender::SenderPoolHandle,

    mode: ResponseMode,

    /// Throttle for API calls.
    throttle: SendThrottle,

    messages: Mutex<LruCache<MessageKey, Message>>,
    replies: Mutex<LruCache<MessageKey, Message>>,
    peers: Mutex<HashMap<i64, PeerEntry>>,
    self_id: Mutex<Option<i64>>,

    update_starter: Mutex<Option<UpdateStarter>>,
    updates: Mutex<mpsc::UnboundedReceiver<Update>>,

    /// Background task running the sender pool.
    _pool_task: JoinHandle<()>,
}

impl TelegramBot {
    /// Connects to Telegram using the session at `session_path`.
    ///
    /// Updates are not received until [`start_updates`](Self::start_updates)
    /// is called.
    ///
    /// # Errors
    ///
    /// Returns an error if connection fails.
    pub async fn connect(
        api_id: i32,
        session_path: &Path,
        mode: ResponseMode,
        throttle: SendThrottle,
    ) -> Result<Self, TransportError> {
        info!("Connecting to Telegram ({})...", session_path.display());

        let session = Arc::new(
            SqliteSession::open(session_path)
                .await
                .map_err(|e| TransportError::Session(e.to_string()))?,
        );

        let SenderPool {
            runner,
            updates,
            handle,
        } = SenderPool::new(Arc::clone(&session), api_id);

        let client = Client::new(handle.clone());

        // Spawn the sender pool runner
        let pool_task = tokio::spawn(async move {
            runner.run().await;
        });

        let (update_tx, update_rx) = mpsc::unbounded_channel();
        let stream_client = client.clone();
        let update_starter: UpdateStarter = Box::new(move || {
            tokio::spawn(async move {
                let mut stream = stream_client.stream_updates(
                    updates,
                    UpdatesConfiguration {
                        catch_up: false,
                        ..Default::default()
                    },
                );
                loop {
                    match stream.next().await {
                        Ok(update) => {
                            if update_tx.send(update).is_err() {
                                break;
                            }
                        }
                        Err(e) => {
                            warn!("Update stream stopped: {}", e);
                            break;
                        }
                    }
                }
            })
        });

        let is_authorized = client
            .is_authorized()
            .await
            .map_err(|e| TransportError::Connection(e.to_string()))?;

        info!("Connected to Telegram. Authorized: {}", is_authorized);

        Ok(Self {
            client,
            handle: handle.thin,
            mode,
            throttle,
            messages: Mutex::new(LruCache::new(MESSAGE_CACHE_SIZE)),
            replies: Mutex::new(LruCache::new(MESSAGE_CACHE_SIZE)),
            peers: Mutex::new(HashMap::new()),
            self_id: Mutex::new(None),
            update_starter: Mutex::new(Some(update_starter)),
            updates: Mutex::new(update_rx),
            _pool_task: pool_task,
        })
    }

    /// Checks if the client is authorized.
    ///
    /// # Errors
    ///
    /// Returns an error if the check fails.
    pub async fn is_authorized(&self) -> Result<bool, TransportError> {
        self.client
            .is_authorized()
            .await
            .map_err(|e| TransportError::Connection(e.to_string()))
    }

    /// Requests a login code to be sent to the phone number.
    ///
    /// # Errors
    ///
    /// Returns an error if the request fails.
    pub async fn request_login_code(
        &self,
        phone: &str,
        api_hash: &str,
    ) -> Result<LoginToken, AuthError> {
        info!("Requesting login code for phone: {}...", mask_phone(phone));

        self.client
            .request_login_code(phone, api_hash)
            .await
            .map_err(|e| AuthError::SignInFailed(e.to_string()))
    }

    /// Signs in with the login code.
    ///
    /// # Errors
    ///
    /// Returns an error if sign in fails.
    pub async fn sign_in(&self, token: &LoginToken, code: &str) -> Result<(), AuthError> {
        info!("Signing in with login code...");

        match self.client.sign_in(token, code).await {
            Ok(_user) => {
                info!("Successfully signed in!");
                Ok(())
            }
            Err(SignInError::PasswordRequired(password_token)) => {
                debug!(
                    "2FA password required, hint: {:?}",
                    password_token.hint()
                );
                Err(AuthError::PasswordRequired(password_token))
            }
            Err(SignInError::InvalidCode) => {
                Err(AuthError::SignInFailed("Invalid code".to_owned()))
            }
            Err(e) => Err(AuthError::SignInFailed(e.to_string())),
        }
    }

    /// Checks the 2FA password.
    ///
    /// # Errors
    ///
    /// Returns an error if the password is invalid.
    pub async fn check_password(
        &self,
        password_token: PasswordToken,
        password: &str,
    ) -> Result<(), AuthError> {
        info!("Checking 2FA password...");

        match self.client.check_password(password_token, password).await {
            Ok(_user) => {
                info!("Successfully authenticated with 2FA!");
                Ok(())
            }
            Err(SignInError::InvalidPassword(token)) => Err(AuthError::InvalidPassword(token)),
            Err(e) => Err(AuthError::SignInFailed(e.to_string())),
        }
    }

    /// Signs in a bot account with its `BotFather` token.
    ///
    /// # Errors
    ///
    /// Returns an error if the token is rejected.
    pub async fn bot_sign_in(&self, token: &str, api_hash: &str) -> Result<(), AuthError> {
        info!("Signing in bot account...");
        self.client
            .bot_sign_in(token, api_hash)
            .await
            .map(|_| ())
            .map_err(|e| AuthError::SignInFailed(e.to_string()))
    }

    /// Performs QR code authentication.
    ///
    /// Returns the login token bytes that should be displayed as a QR code.
    /// The QR code URL format is: `tg://login?token=BASE64_TOKEN`
    ///
    /// # Errors
    ///
    /// Returns an error if the request fails.
    pub async fn export_login_token(
        &self,
        api_id: i32,
        api_hash: &str,
    ) -> Result<QrAuthResult, AuthError> {
        debug!("Requesting QR login token...");

        let request = tl::functions::auth::ExportLoginToken {
            api_id,
            api_hash: api_hash.to_owned(),
            except_ids: vec![],
        };

        match self.client.invoke(&request).await {
            Ok(tl::enums::auth::LoginToken::Token(token)) => {
                debug!("Got login token, expires: {}", token.expires);
                Ok(QrAuthResult::Token {
                    token: token.token,
                    expires: token.expires,
                })
            }
            Ok(tl::enums::auth::LoginToken::MigrateTo(migrate)) => {
                debug!("Need to migrate to DC {}", migrate.dc_id);
                Ok(QrAuthResult::MigrateTo { dc_id: migrate.dc_id })
            }
            Ok(tl::enums::auth::LoginToken::Success(success)) => {
                debug!("QR login successful!");
                if let tl::enums::auth::Authorization::Authorization(auth) = success.authorization
                    && let tl::enums::User::User(user) = auth.user
                {
                    return Ok(QrAuthResult::Success {
                        user_id: user.id,
                        username: user.username,
                    });
                }
                Ok(QrAuthResult::Success {
                    user_id: 0,
                    username: None,
                })
            }
            Err(e) => {
                let err_str = e.to_string();
                if err_str.contains("SESSION_PASSWORD_NEEDED") {
                    return Ok(QrAuthResult::PasswordRequired);
                }
                Err(AuthError::SignInFailed(err_str))
            }
        }
    }

    /// Starts receiving updates. Later calls do nothing.
    pub async fn start_updates(&self) {
        if let Some(start) = self.update_starter.lock().await.take() {
            debug!("Starting update stream");
            start();
        }
    }

    /// Waits for the next new message.
    ///
    /// Returns `None` once the update stream has ended.
    pub async fn next_message(&self) -> Option<IncomingMessage> {
        let mut updates = self.updates.lock().await;
        loop {
            if let Update::NewMessage(message) = updates.recv().await? {
                return Some(self.remember(message).await);
            }
        }
    }

    /// Caches a grammers message and converts it.
    async fn remember(&self, message: Message) -> IncomingMessage {
        let chat_id = message.peer_id().bot_api_dialog_id();
        let id = message.id();

        let (kind, title) = match self.peers.lock().await.get(&chat_id) {
            Some(peer) => (peer.kind, Some(peer.title.clone())),
            None => (kind_from_dialog_id(chat_id), None),
        };

        let outgoing = message.outgoing();
        let sender_id = if outgoing {
            *self.self_id.lock().await
        } else {
            message
                .sender_id()
                .map(|peer| peer.bot_api_dialog_id())
                .or((kind == ChatKind::Private).then_some(chat_id))
        };
        let sender = match sender_id {
            Some(id) => Some(Sender {
                id,
                display_name: self
                    .peers
                    .lock()
                    .await
                    .get(&id)
                    .map_or_else(|| format!("user {id}"), |p| p.title.clone()),
                username: None,
            }),
            None => None,
        };

        let incoming = IncomingMessage {
            id,
            chat: ChatRef {
                id: chat_id,
                kind,
                title,
            },
            sender,
            text: message.text().to_owned(),
            outgoing,
            reply_to: message.reply_to_message_id(),
            date: message.date(),
        };
        self.messages.lock().await.put((chat_id, id), message);
        incoming
    }

    async fn cached(&self, message: &IncomingMessage) -> Result<Message, TransportError> {
        self.messages
            .lock()
            .await
            .get(&(message.chat.id, message.id))
            .cloned()
            .ok_or(TransportError::MessageGone)
    }

    /// Runs one API call behind the throttle.
    async fn call<T>(
        &self,
        request: impl Future<Output = Result<T, InvocationError>>,
    ) -> Result<T, TransportError> {
        self.throttle.acquire().await;
        match request.await {
            Ok(value) => Ok(value),
            Err(e) => {
                let err = TransportError::from(e);
                if let TransportError::FloodWait(seconds) = &err {
                    self.throttle.penalize(*seconds, Instant::now()).await;
                }
                Err(err)
            }
        }
    }

    /// Re-reads the dialog list into the peer cache.
    async fn refresh_peers(&self) -> Result<Vec<DialogInfo>, TransportError> {
        // TODO: page through dialogs past the first DIALOG_LIMIT.
        let request = tl::functions::messages::GetDialogs {
            exclude_pinned: false,
            folder_id: None,
            offset_date: 0,
            offset_id: 0,
            offset_peer: tl::enums::InputPeer::Empty,
            limit: DIALOG_LIMIT,
            hash: 0,
        };

        let (chats, users) = match self.call(self.client.invoke(&request)).await? {
            tl::enums::messages::Dialogs::Dialogs(d) => (d.chats, d.users),
            tl::enums::messages::Dialogs::Slice(d) => (d.chats, d.users),
            tl::enums::messages::Dialogs::NotModified(_) => (Vec::new(), Vec::new()),
        };

        let mut entries: Vec<(i64, PeerEntry)> = chats.iter().filter_map(chat_entry).collect();
        entries.extend(users.iter().filter_map(user_entry));

        let mut peers = self.peers.lock().await;
        let dialogs = entries
            .into_iter()
            .map(|(id, entry)| {
                let info = DialogInfo {
                    id,
                    kind: entry.kind,
                    title: entry.title.clone(),
                };
                peers.insert(id, entry);
                info
            })
            .collect();
        Ok(dialogs)
    }

    /// Cached target of a group or channel, refreshing the cache once on a miss.
    async fn chat_target(&self, chat_id: i64) -> Result<ChatTarget, TransportError> {
        if let Some(peer) = self.peers.lock().await.get(&chat_id) {
            return Ok(peer.target);
        }
        if kind_from_dialog_id(chat_id) == ChatKind::Group {
            return Ok(ChatTarget::BasicGroup(-chat_id));
        }
        self.refresh_peers().await?;
        self.peers
            .lock()
            .await
            .get(&chat_id)
            .map(|p| p.target)
            .ok_or(TransportError::UnknownChat(chat_id))
    }

    /// Disconnects from Telegram.
    pub fn disconnect(&self) {
        info!("Disconnecting from Telegram...");
        self.handle.quit();
    }
}

fn chat_entry(chat: &tl::enums::Chat) -> Option<(i64, PeerEntry)> {
    match chat {
        tl::enums::Chat::Chat(c) if !c.left && !c.deactivated => Some((
            -c.id,
            PeerEntry {
                kind: ChatKind::Group,
                title: c.title.clone(),
                target: ChatTarget::BasicGroup(c.id),
            },
        )),
        tl::enums::Chat::Channel(c) if !c.left => Some((
            -(CHANNEL_ID_OFFSET + c.id),
            PeerEntry {
                kind: if c.megagroup {
                    ChatKind::Supergroup
                } else {
                    ChatKind::Channel
                },
                title: c.title.clone(),
                leave: c.access_hash.map_or(ChatTarget::Unsupported, |access_hash| {
                    ChatTarget::Channel {
                        id: c.id,
                        access_hash,
                    }
                }),
            },
        )),
        _ => None,
    }
}

fn user_entry(user: &tl::enums::User) -> Option<(i64, PeerEntry)> {
    match user {
        tl::enums::User::User(u) => Some((
            u.id,
            PeerEntry {
                kind: ChatKind::Private,
                title: match (&u.first_name, &u.last_name) {
                    (Some(first), Some(last)) => format!("{first} {last}"),
                    (Some(first), None) => first.clone(),
                    _ => u.username.clone().unwrap_or_else(|| u.id.to_string()),
                },
                target: ChatTarget::Unsupported,
            },
        )),
        tl::enums::User::Empty(_) => None,
    }
}

/// Chat kind implied by a Bot API style dialog id.
fn kind_from_dialog_id(id: i64) -> ChatKind {
    if id > 0 {
        ChatKind::Private
    } else if id <= -CHANNEL_ID_OFFSET {
        ChatKind::Supergroup
    } else {
        ChatKind::Group
    }
}

#[async_trait]
impl Transport for TelegramBot {
    async fn respond(&self, message: &IncomingMessage, text: &str) -> Result<(), TransportError> {
        let original = self.cached(message).await?;
        let input = InputMessage::new().markdown(text);

        let result = match self.mode {
            ResponseMode::EditInPlace => self.call(original.edit(input)).await,
            ResponseMode::ReplyOnce => {
                let key = (message.chat.id, message.id);
                let existing = self.replies.lock().await.get(&key).cloned();
                match existing {
                    Some(reply) => self.call(reply.edit(input)).await,
                    None => {
                        let reply = self.call(original.reply(input)).await?;
                        self.replies.lock().await.put(key, reply);
                        Ok(())
                    }
                }
            }
        };

        match result {
            Err(TransportError::Invocation(e)) if e.contains("MESSAGE_NOT_MODIFIED") => Ok(()),
            other => other,
        }
    }

    async fn reply(&self, message: &IncomingMessage, text: &str) -> Result<(), TransportError> {
        let original = self.cached(message).await?;
        self.call(original.reply(InputMessage::new().markdown(text)))
            .await
            .map(|_| ())
    }

    async fn delete(&self, message: &IncomingMessage) -> Result<(), TransportError> {
        let original = self.cached(message).await?;
        self.call(original.delete()).await?;
        self.replies
            .lock()
            .await
            .remove(&(message.chat.id, message.id));
        Ok(())
    }

    async fn send_media(
        &self,
        message: &IncomingMessage,
        media: OutgoingMedia,
    ) -> Result<(), TransportError> {
        let original = self.cached(message).await?;

        let size = media.bytes.len();
        let mut stream = Cursor::new(media.bytes);
        let uploaded = self
            .client
            .upload_stream(&mut stream, size, media.file_name)
            .await
            .map_err(|e| TransportError::Upload(e.to_string()))?;

        let input = match media.kind {
            MediaKind::Photo => InputMessage::new()
                .markdown(media.caption.unwrap_or_default())
                .photo(uploaded),
            MediaKind::Sticker => InputMessage::new().document(uploaded),
        };
        self.call(original.respond(input)).await?;
        Ok(())
    }

    async fn replied_text(&self, message: &IncomingMessage) -> Result<Option<String>, TransportError> {
        if message.reply_to.is_none() {
            return Ok(None);
        }
        let original = self.cached(message).await?;
        let reply = self.call(original.get_reply()).await?;
        Ok(reply.map(|r| r.text().to_owned()).filter(|t| !t.is_empty()))
    }

    async fn me(&self) -> Result<AccountInfo, TransportError> {
        let request = tl::functions::users::GetUsers {
            id: vec![tl::enums::InputUser::UserSelf],
        };

        let users = self.call(self.client.invoke(&request)).await?;
        let Some(tl::enums::User::User(user)) = users.into_iter().next() else {
            return Err(TransportError::NotAuthorized);
        };

        *self.self_id.lock().await = Some(user.id);
        Ok(AccountInfo {
            id: user.id,
            first_name: user.first_name.unwrap_or_default(),
            last_name: user.last_name,
            username: user.username,
            phone: user.phone,
            is_bot: user.bot,
        })
    }

    async fn dialogs(&self) -> Result<Vec<DialogInfo>, TransportError> {
        self.refresh_peers().await
    }

    async fn send_text(&self, chat_id: i64, text: &str) -> Result<(), TransportError> {
        let peer = self
            .chat_target(chat_id)
            .await?
            .input_peer()
            .ok_or(TransportError::UnknownChat(chat_id))?;
        let request = tl::functions::messages::SendMessage {
            no_webpage: true,
            silent: false,
            background: false,
            clear_draft: false,
            noforwards: false,
            update_stickersets_order: false,
            invert_media: false,
            allow_paid_floodskip: false,
            peer,
            reply_to: None,
            message: text.to_owned(),
            random_id: random_id(),
            reply_markup: None,
            entities: None,
            schedule_date: None,
            send_as: None,
            quick_reply_shortcut: None,
            effect: None,
            allow_paid_stars: None,
            suggested_post: None,
        };
        self.call(self.client.invoke(&request)).await?;
        Ok(())
    }

    async fn leave_chat(&self, chat_id: i64) -> Result<(), TransportError> {
        match self.chat_target(chat_id).await? {
            ChatTarget::BasicGroup(id) => {
                let request = tl::functions::messages::DeleteChatUser {
                    revoke_history: false,
                    chat_id: id,
                    user_id: tl::enums::InputUser::UserSelf,
                };
                self.call(self.client.invoke(&request)).await?;
            }
            ChatTarget::Channel { id, access_hash } => {
                let request = tl::functions::channels::LeaveChannel {
                    channel: tl::enums::InputChannel::Channel(tl::types::InputChannel {
                        channel_id: id,
                        access_hash,
                    }),
                };
                self.call(self.client.invoke(&request)).await?;
            }
            ChatTarget::Unsupported => return Err(TransportError::UnknownChat(chat_id)),
        }

        self.peers.lock().await.remove(&chat_id);
        info!("Left chat {}", chat_id);
        Ok(())
    }
}

impl std::fmt::Debug for TelegramBot {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TelegramBot")
            .field("mode", &self.mode)
            .field("throttle", &self.throttle)
            .finish_non_exhaustive()
    }
}

/// Client-side id that deduplicates a sent message.
fn random_id() -> i64 {
    chrono::Utc::now()
        .timestamp_nanos_opt()
        .unwrap_or_else(|| chrono::Utc::now().timestamp_micros())
}

/// Masks a phone number for logging (shows last 4 digits).
fn mask_phone(phone: &str) -> String {
    let digits: String = phone.chars().filter(char::is_ascii_digit).collect();
    if digits.len() > 4 {
        format!("***{}", &digits[digits.len() - 4..])
    } else {
        "****".to_owned()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_mask_phone() {
        assert_eq!(mask_phone("+1234567890"), "***7890");
        assert_eq!(mask_phone("123"), "****");
        assert_eq!(mask_phone("+7 (999) 123-45-67"), "***4567");
    }

    #[test]
    fn test_extract_flood_wait() {
        assert_eq!(extract_flood_wait_seconds("FLOOD_WAIT_120"), Some(120));
        assert_eq!(extract_flood_wait_seconds("flood wait 60 seconds"), Some(60));
        assert_eq!(extract_flood_wait_seconds("some other error"), None);
    }

    #[test]
    fn test_kind_from_dialog_id() {
        assert_eq!(kind_from_dialog_id(42), ChatKind::Private);
        assert_eq!(kind_from_dialog_id(-4242), ChatKind::Group);
        assert_eq!(kind_from_dialog_id(-1_001_234_567_890), ChatKind::Supergroup);
    }

    #[test]
    fn test_message_cache_evicts_least_recent() {
        let mut cache: LruCache<MessageKey, &str> = LruCache::new(NonZeroUsize::new(2).unwrap());
        cache.put((1, 1), "a");
        cache.put((1, 2), "b");
        cache.put((1, 1), "a2");
        cache.put((1, 3), "c");

        assert_eq!(cache.len(), 2);
        assert_eq!(cache.get(&(1, 2)), None);
        assert_eq!(cache.get(&(1, 1)).copied(), Some("a2"));
        assert_eq!(cache.get(&(1, 3)).copied(), Some("c"));
        assert_eq!(cache.pop(&(1, 3)), Some("c"));
        assert!(!cache.is_empty());
    }

    #[test]
    fn test_chat_target_input_peer() {
        assert!(matches!(
            ChatTarget::BasicGroup(4242).input_peer(),
            Some(tl::enums::InputPeer::Chat(tl::types::InputPeerChat { chat_id: 4242 }))
        ));
        assert!(matches!(
            ChatTarget::Channel { id: 7, access_hash: 99 }.input_peer(),
            Some(tl::enums::InputPeer::Channel(tl::types::InputPeerChannel {
                channel_id: 7,
                access_hash: 99
            }))
        ));
        assert!(ChatTarget::Unsupported.input_peer().is_none());
    }

    #[test]
    fn test_message_cache_capacity() {
        assert_eq!(MESSAGE_CACHE_SIZE.get(), 512);
    }
}
