//! Automatic replies to incoming private messages.

use std::collections::{HashMap, VecDeque};
use std::fmt::Write as _;
use std::time::{Duration, Instant};

use tokio::sync::Mutex;
use tracing::{info, warn};

use crate::commands::CooldownLedger;
use crate::config::AssistantSettings;
use crate::telegram::{ChatKind, IncomingMessage, Transport, TransportError};

/// Messages allowed per window before a sender counts as flooding.
pub const FLOOD_MAX_MESSAGES: usize = 5;

/// Length of the flood window.
pub const FLOOD_WINDOW: Duration = Duration::from_secs(60);

const AUTO_REPLY_KEY: &str = "auto_response";

/// Sliding-window message counter per sender.
#[derive(Debug)]
pub struct FloodGuard {
    max_messages: usize,
    window: Duration,
    hits: Mutex<HashMap<i64, VecDeque<Instant>>>,
}

impl Default for FloodGuard {
    fn default() -> Self {
        Self::new(FLOOD_MAX_MESSAGES, FLOOD_WINDOW)
    }
}

impl FloodGuard {
    #[must_use]
    pub fn new(max_messages: usize, window: Duration) -> Self {
        Self {
            max_messages,
            window,
            hits: Mutex::new(HashMap::new()),
        }
    }

    /// Records a message from `user_id` and reports whether they are flooding.
    pub async fn is_flooding(&self, user_id: i64, now: Instant) -> bool {
        let mut hits = self.hits.lock().await;
        let times = hits.entry(user_id).or_default();
        while times
            .front()
            .is_some_and(|t| now.saturating_duration_since(*t) >= self.window)
        {
            times.pop_front();
        }
        times.push_back(now);
        times.len() > self.max_messages
    }

    /// Drops senders with no message inside the window.
    pub async fn prune(&self, now: Instant) -> usize {
        let mut hits = self.hits.lock().await;
        let before = hits.len();
        hits.retain(|_, times| {
            times
                .back()
                .is_some_and(|t| now.saturating_duration_since(*t) < self.window)
        });
        before - hits.len()
    }
}

/// Why a message did or did not get an automatic reply.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AutoReply {
    Sent,
    Outgoing,
    NotPrivate,
    Filtered,
    Flooding,
    TooSoon,
}

/// Answers private messages while the owner is away.
#[derive(Debug)]
pub struct AutoResponder {
    settings: AssistantSettings,
    signature: String,
    bot_username: Option<String>,
    replies: CooldownLedger,
    flood: Option<FloodGuard>,
}

impl AutoResponder {
    /// Creates a responder. `signature` closes every reply.
    #[must_use]
    pub fn new(settings: AssistantSettings, signature: impl Into<String>) -> Self {
        let flood = settings.flood_protection.then(FloodGuard::default);
        Self {
            settings,
            signature: signature.into(),
            bot_username: None,
            replies: CooldownLedger::new(),
            flood,
        }
    }

    /// Points senders at the companion bot.
    #[must_use]
    pub fn with_bot_username(mut self, username: Option<String>) -> Self {
        self.bot_username = username;
        self
    }

    fn delay(&self) -> Duration {
        Duration::from_secs(self.settings.auto_response_delay_secs)
    }

    /// Text sent to `first_name`.
    #[must_use]
    pub fn compose(&self, first_name: &str) -> String {
        let mut text = if first_name.is_empty() {
            self.settings.auto_response_message.clone()
        } else {
            format!("Hi {first_name}! {}", self.settings.auto_response_message)
        };
        if let Some(username) = &self.bot_username {
            let _ = write!(
                text,
                "\n\n💬 **For quick assistance, chat with me at @{username}**"
            );
        }
        text.push_str("\n\n");
        text.push_str(&self.signature);
        text
    }

    /// Handles one message using the current time.
    ///
    /// # Errors
    ///
    /// Returns an error if the reply could not be sent.
    pub async fn handle(
        &self,
        transport: &dyn Transport,
        message: &IncomingMessage,
    ) -> Result<AutoReply, TransportError> {
        self.handle_at(transport, message, Instant::now()).await
    }

    /// Handles one message as if it arrived at `now`.
    ///
    /// # Errors
    ///
    /// Returns an error if the reply could not be sent.
    pub async fn handle_at(
        &self,
        transport: &dyn Transport,
        message: &IncomingMessage,
        now: Instant,
    ) -> Result<AutoReply, TransportError> {
        if message.outgoing {
            return Ok(AutoReply::Outgoing);
        }
        if message.chat.kind != ChatKind::Private {
            return Ok(AutoReply::NotPrivate);
        }
        let Some(sender) = &message.sender else {
            return Ok(AutoReply::Filtered);
        };
        if !self.settings.is_user_allowed(sender.id) {
            return Ok(AutoReply::Filtered);
        }

        if let Some(flood) = &self.flood
            && flood.is_flooding(sender.id, now).await
        {
            warn!("Flood protection triggered for user {}", sender.id);
            return Ok(AutoReply::Flooding);
        }

        if !self
            .replies
            .admit(sender.id, AUTO_REPLY_KEY, self.delay(), now)
            .await
        {
            return Ok(AutoReply::TooSoon);
        }

        let first_name = sender
            .display_name
            .split_whitespace()
            .next()
            .unwrap_or_default();
        transport.reply(message, &self.compose(first_name)).await?;
        info!(
            "Auto-response sent to {} ({})",
            sender.display_name, sender.id
        );
        Ok(AutoReply::Sent)
    }

    /// Forgets stale reply and flood records.
    pub async fn prune(&self, now: Instant) -> usize {
        let mut removed = self.replies.prune(now, self.delay()).await;
        if let Some(flood) = &self.flood {
            removed += flood.prune(now).await;
        }
        removed
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::telegram::testing::{RecordingTransport, group_message, incoming_from};

    fn settings() -> AssistantSettings {
        AssistantSettings {
            enable_auto_response: true,
            auto_response_message: "I am away.".to_owned(),
            auto_response_delay_secs: 60,
            ..AssistantSettings::default()
        }
    }

    #[tokio::test]
    async fn test_flood_guard_window() {
        let guard = FloodGuard::new(5, Duration::from_secs(60));
        let t0 = Instant::now();

        for i in 0..5 {
            assert!(!guard.is_flooding(7, t0 + Duration::from_secs(i)).await);
        }
        assert!(guard.is_flooding(7, t0 + Duration::from_secs(10)).await);
        assert!(!guard.is_flooding(8, t0 + Duration::from_secs(10)).await);

        // Older messages have left the window.
        assert!(!guard.is_flooding(7, t0 + Duration::from_secs(75)).await);

        assert_eq!(guard.prune(t0 + Duration::from_secs(200)).await, 2);
    }

    #[tokio::test]
    async fn test_reply_once_per_delay() {
        let responder = AutoResponder::new(settings(), "🤖 Powered by Nexus Userbot v2.0");
        let t = RecordingTransport::new();
        let msg = incoming_from(7, "Alex Doe", "hello?");
        let t0 = Instant::now();

        assert_eq!(responder.handle_at(&t, &msg, t0).await.unwrap(), AutoReply::Sent);
        assert_eq!(
            responder
                .handle_at(&t, &msg, t0 + Duration::from_secs(30))
                .await
                .unwrap(),
            AutoReply::TooSoon
        );
        assert_eq!(
            responder
                .handle_at(&t, &msg, t0 + Duration::from_secs(61))
                .await
                .unwrap(),
            AutoReply::Sent
        );

        let sent = t.sent();
        assert_eq!(sent.len(), 2);
        assert_eq!(sent[0], "Hi Alex! I am away.\n\n🤖 Powered by Nexus Userbot v2.0");
    }

    #[tokio::test]
    async fn test_skips_outgoing_groups_and_filtered_users() {
        let responder = AutoResponder::new(
            AssistantSettings {
                blacklisted_users: vec![13],
                ..settings()
            },
            "sig",
        );
        let t = RecordingTransport::new();

        let mut own = incoming_from(7, "Me", "hi");
        own.outgoing = true;
        assert_eq!(responder.handle(&t, &own).await.unwrap(), AutoReply::Outgoing);

        let mut in_group = group_message(-100, "hi");
        in_group.outgoing = false;
        assert_eq!(
            responder.handle(&t, &in_group).await.unwrap(),
            AutoReply::NotPrivate
        );

        let blocked = incoming_from(13, "Spam", "hi");
        assert_eq!(responder.handle(&t, &blocked).await.unwrap(), AutoReply::Filtered);
        assert!(t.sent().is_empty());
    }

    #[tokio::test]
    async fn test_flooding_sender_is_ignored() {
        let responder = AutoResponder::new(
            AssistantSettings {
                auto_response_delay_secs: 0,
                ..settings()
            },
            "sig",
        );
        let t = RecordingTransport::new();
        let msg = incoming_from(7, "Alex", "hi");
        let t0 = Instant::now();

        for _ in 0..FLOOD_MAX_MESSAGES {
            assert_eq!(responder.handle_at(&t, &msg, t0).await.unwrap(), AutoReply::Sent);
        }
        assert_eq!(
            responder.handle_at(&t, &msg, t0).await.unwrap(),
            AutoReply::Flooding
        );
    }

    #[test]
    fn test_compose_mentions_bot() {
        let responder =
            AutoResponder::new(settings(), "sig").with_bot_username(Some("nexus_bot".to_owned()));
        assert_eq!(
            responder.compose(""),
            "I am away.\n\n💬 **For quick assistance, chat with me at @nexus_bot**\n\nsig"
        );
    }
}
