//! Reports of companion bot activity sent to a log group.

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use chrono::{DateTime, Utc};
use tracing::warn;

use crate::commands::{DispatchOutcome, UsageCounter};
use crate::config::AssistantSettings;
use crate::telegram::{IncomingMessage, Transport};

/// Kind of a log group report.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogKind {
    Command,
    Error,
}

impl LogKind {
    fn label(self) -> &'static str {
        match self {
            Self::Command => "COMMAND",
            Self::Error => "ERROR",
        }
    }
}

/// Sends command and error reports into the configured log group.
pub struct LogReporter {
    chat_id: i64,
    log_commands: bool,
    log_errors: bool,
    sink: Arc<dyn Transport>,
    errors: AtomicU64,
}

impl LogReporter {
    /// Creates a reporter, or `None` when reporting is disabled.
    #[must_use]
    pub fn from_settings(settings: &AssistantSettings, sink: Arc<dyn Transport>) -> Option<Self> {
        let chat_id = settings.log_group()?;
        Some(Self {
            chat_id,
            log_commands: settings.log_all_commands,
            log_errors: settings.log_errors,
            sink,
            errors: AtomicU64::new(0),
        })
    }

    /// Chat the reports go to.
    #[must_use]
    pub fn chat_id(&self) -> i64 {
        self.chat_id
    }

    /// Errors reported so far.
    #[must_use]
    pub fn error_count(&self) -> u64 {
        self.errors.load(Ordering::Relaxed)
    }

    /// Reports the outcome of one dispatched message.
    ///
    /// `command` is the canonical name the dispatcher ran, if any.
    pub async fn record(
        &self,
        message: &IncomingMessage,
        command: Option<&str>,
        outcome: &DispatchOutcome,
        usage: &UsageCounter,
    ) {
        let (kind, details) = match (outcome, command) {
            (DispatchOutcome::Handled, Some(command)) if self.log_commands => (
                LogKind::Command,
                format!(
                    "Command: /{command}\nUsage Count: {}",
                    usage.count(command).await
                ),
            ),
            (DispatchOutcome::HandlerError(detail), _) if self.log_errors => {
                self.errors.fetch_add(1, Ordering::Relaxed);
                let details = match command {
                    Some(command) => format!("Error in {command}: {detail}"),
                    None => format!("Error: {detail}"),
                };
                (LogKind::Error, details)
            }
            _ => return,
        };

        let text = format_report(
            kind,
            Utc::now(),
            user_info(message).as_deref(),
            &details,
            usage.total().await,
            self.error_count(),
        );
        if let Err(e) = self.sink.send_text(self.chat_id, &text).await {
            warn!("Failed to log to group {}: {}", self.chat_id, e);
        }
    }
}

impl std::fmt::Debug for LogReporter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LogReporter")
            .field("chat_id", &self.chat_id)
            .field("log_commands", &self.log_commands)
            .field("log_errors", &self.log_errors)
            .finish_non_exhaustive()
    }
}

fn user_info(message: &IncomingMessage) -> Option<String> {
    let sender = message.sender.as_ref()?;
    Some(match &sender.username {
        Some(username) => format!("@{username} ({})", sender.id),
        None => format!("ID: {}", sender.id),
    })
}

/// Renders one report.
#[must_use]
pub fn format_report(
    kind: LogKind,
    time: DateTime<Utc>,
    user: Option<&str>,
    details: &str,
    commands: u64,
    errors: u64,
) -> String {
    let user = user.map(|u| format!("User: {u}\n")).unwrap_or_default();
    format!(
        "🔸 NEXUS BOT LOG\n\n\
         Type: {}\n\
         Time: {} UTC\n\
         {user}\n\
         Details:\n{details}\n\n\
         Stats:\n\
         • Commands: {commands}\n\
         • Errors: {errors}",
        kind.label(),
        time.format("%Y-%m-%d %H:%M:%S"),
    )
}

#[cfg(test)]
mod tests {
    use chrono::TimeZone;

    use super::*;
    use crate::telegram::testing::{RecordingTransport, incoming_from};

    const LOG_CHAT: i64 = -1_001_234_567_890;

    fn reporter(sink: &Arc<RecordingTransport>, commands: bool, errors: bool) -> LogReporter {
        let settings = AssistantSettings {
            log_group_id: Some(LOG_CHAT),
            enable_log_group: true,
            log_all_commands: commands,
            log_errors: errors,
            ..AssistantSettings::default()
        };
        let sink: Arc<dyn Transport> = Arc::clone(sink) as Arc<dyn Transport>;
        LogReporter::from_settings(&settings, sink).unwrap()
    }

    #[test]
    fn test_format_report() {
        let time = Utc.with_ymd_and_hms(2026, 10, 18, 9, 30, 0).unwrap();
        let text = format_report(LogKind::Command, time, Some("ID: 7"), "Command: /ping", 3, 1);
        assert_eq!(
            text,
            "🔸 NEXUS BOT LOG\n\nType: COMMAND\nTime: 2026-10-18 09:30:00 UTC\nUser: ID: 7\n\n\
             Details:\nCommand: /ping\n\nStats:\n• Commands: 3\n• Errors: 1"
        );
    }

    #[test]
    fn test_disabled_without_group() {
        let sink: Arc<dyn Transport> = Arc::new(RecordingTransport::new());
        assert!(LogReporter::from_settings(&AssistantSettings::default(), sink).is_none());
    }

    #[tokio::test]
    async fn test_reports_handled_commands() {
        let sink = Arc::new(RecordingTransport::new());
        let reporter = reporter(&sink, true, true);
        let usage = UsageCounter::new();
        usage.record("ping").await;
        usage.record("ping").await;

        let msg = incoming_from(7, "Alex", "/ping");
        reporter
            .record(&msg, Some("ping"), &DispatchOutcome::Handled, &usage)
            .await;

        let sent = sink.sent_to(LOG_CHAT);
        assert_eq!(sent.len(), 1);
        assert!(sent[0].contains("Type: COMMAND"));
        assert!(sent[0].contains("Command: /ping\nUsage Count: 2"));
        assert!(sent[0].contains("• Commands: 2"));
    }

    #[tokio::test]
    async fn test_reports_errors_and_counts_them() {
        let sink = Arc::new(RecordingTransport::new());
        let reporter = reporter(&sink, false, true);
        let usage = UsageCounter::new();
        let msg = incoming_from(7, "Alex", "/webshot x");

        reporter
            .record(&msg, Some("ping"), &DispatchOutcome::Handled, &usage)
            .await;
        assert!(sink.sent_to(LOG_CHAT).is_empty());

        let failed = DispatchOutcome::HandlerError("network error".to_owned());
        reporter.record(&msg, Some("webshot"), &failed, &usage).await;

        assert_eq!(reporter.error_count(), 1);
        let sent = sink.sent_to(LOG_CHAT);
        assert_eq!(sent.len(), 1);
        assert!(sent[0].contains("Type: ERROR"));
        assert!(sent[0].contains("Error in webshot: network error"));
        assert!(sent[0].contains("• Errors: 1"));
    }

    #[tokio::test]
    async fn test_error_logging_can_be_disabled() {
        let sink = Arc::new(RecordingTransport::new());
        let reporter = reporter(&sink, true, false);
        let failed = DispatchOutcome::HandlerError("boom".to_owned());

        reporter
            .record(&incoming_from(7, "Alex", "/ping"), Some("ping"), &failed, &UsageCounter::new())
            .await;
        assert!(sink.sent_to(LOG_CHAT).is_empty());
        assert_eq!(reporter.error_count(), 0);
    }
}
