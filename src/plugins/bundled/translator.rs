//! Text translation through the public Google Translate endpoint.

use std::sync::Arc;

use async_trait::async_trait;
use serde_json::Value;
use tracing::debug;

use super::ensure_known_commands;
use crate::commands::{CommandError, CommandResult};
use crate::plugins::{PluginEntry, PluginError, PluginHost, PluginManifest, RegistrationHandle};
use crate::telegram::{RouteContext, RouteHandler};

const COMMANDS: &[&str] = &["tr", "translate"];

const DEFAULT_ENDPOINT: &str = "https://translate.googleapis.com/translate_a/single";

/// Entry point `translator`.
pub struct TranslatorEntry;

#[async_trait]
impl PluginEntry for TranslatorEntry {
    fn name(&self) -> &'static str {
        "translator"
    }

    async fn register(
        &self,
        host: &PluginHost,
        manifest: &PluginManifest,
    ) -> Result<RegistrationHandle, PluginError> {
        ensure_known_commands(manifest, COMMANDS)?;
        let handler = Translator {
            http: host.http.clone(),
            endpoint: manifest
                .setting("endpoint")
                .unwrap_or(DEFAULT_ENDPOINT)
                .to_owned(),
        };
        Ok(host.bind_manifest_commands(manifest, Arc::new(handler)).await)
    }
}

struct Translator {
    http: reqwest::Client,
    endpoint: String,
}

/// A parsed translation response.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Translation {
    pub text: String,
    pub detected_language: String,
}

/// Extracts the translation from a `translate_a/single` response.
///
/// The response is a nested array: segments in `[0][i][0]`, the detected
/// source language in `[2]`.
#[must_use]
pub fn parse_translation(body: &Value) -> Option<Translation> {
    let segments = body.get(0)?.as_array()?;
    let text: String = segments
        .iter()
        .filter_map(|segment| segment.get(0).and_then(Value::as_str))
        .collect();
    if text.is_empty() {
        return None;
    }
    let detected_language = body
        .get(2)
        .and_then(Value::as_str)
        .unwrap_or("auto")
        .to_owned();
    Some(Translation {
        text,
        detected_language,
    })
}

fn usage(prefix: &str) -> String {
    format!(
        "**🌐 TRANSLATOR USAGE**\n\n\
         `{prefix}tr <lang_code> <text>` - Translate text\n\
         `{prefix}tr <lang_code>` - Translate replied message\n\n\
         **Language Codes:**\n\
         • en - English\n• es - Spanish\n• fr - French\n• de - German\n\
         • it - Italian\n• pt - Portuguese\n• ru - Russian\n• ar - Arabic\n\
         • hi - Hindi\n• ja - Japanese\n• ko - Korean\n• zh - Chinese\n\n\
         **Example:** `{prefix}tr en Hola mundo`"
    )
}

#[async_trait]
impl RouteHandler for Translator {
    async fn handle(&self, ctx: &RouteContext<'_>) -> Result<CommandResult, CommandError> {
        let Some(target) = ctx.invocation.arg(0).map(str::to_lowercase) else {
            return Ok(CommandResult::success(usage(ctx.prefix)));
        };

        let inline = ctx
            .invocation
            .rest
            .split_once(char::is_whitespace)
            .map(|(_, text)| text.trim().to_owned())
            .filter(|text| !text.is_empty());
        let source_text = match inline {
            Some(text) => text,
            None => match ctx.transport.replied_text(ctx.message).await? {
                Some(text) if !text.trim().is_empty() => text,
                _ => {
                    return Ok(CommandResult::error(
                        "❌ **No text to translate**\nProvide text or reply to a message",
                    ));
                }
            },
        };

        ctx.transport
            .respond(
                ctx.message,
                &format!("🌐 **Translating to {}...**", target.to_uppercase()),
            )
            .await?;

        let response = self
            .http
            .get(&self.endpoint)
            .query(&[
                ("client", "gtx"),
                ("sl", "auto"),
                ("tl", target.as_str()),
                ("dt", "t"),
                ("q", source_text.as_str()),
            ])
            .send()
            .await?;

        if !response.status().is_success() {
            debug!("Translation endpoint answered {}", response.status());
            return Ok(CommandResult::error(
                "❌ **Translation failed**\nCheck language code and try again",
            ));
        }

        let body: Value = response.json().await?;
        let Some(translation) = parse_translation(&body) else {
            return Ok(CommandResult::error(
                "❌ **Translation failed**\nUnexpected response from the translation service",
            ));
        };

        Ok(CommandResult::success(format!(
            "🌐 **TRANSLATION RESULT**\n\n\
             **Original ({}):**\n{source_text}\n\n\
             **Translated ({}):**\n{}",
            translation.detected_language.to_uppercase(),
            target.to_uppercase(),
            translation.text
        )))
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;
    use crate::commands::Invocation;
    use crate::telegram::testing::{RecordingTransport, message};

    #[test]
    fn test_parse_translation_joins_segments() {
        let body = json!([
            [["Hello ", "Hola ", null, null], ["world", "mundo", null, null]],
            null,
            "es"
        ]);
        assert_eq!(
            parse_translation(&body),
            Some(Translation {
                text: "Hello world".to_owned(),
                detected_language: "es".to_owned(),
            })
        );
    }

    #[test]
    fn test_parse_translation_rejects_garbage() {
        assert_eq!(parse_translation(&json!({"error": 1})), None);
        assert_eq!(parse_translation(&json!([[]])), None);
    }

    async fn run(t: &RecordingTransport, text: &str) -> CommandResult {
        let translator = Translator {
            http: reqwest::Client::new(),
            endpoint: "http://127.0.0.1:9/unused".to_owned(),
        };
        let msg = message(text);
        let invocation = Invocation::parse(text, ".").unwrap();
        let ctx = RouteContext {
            transport: t,
            message: &msg,
            invocation: &invocation,
            prefix: ".",
        };
        translator.handle(&ctx).await.unwrap()
    }

    #[tokio::test]
    async fn test_usage_without_arguments() {
        let t = RecordingTransport::new();
        let result = run(&t, ".tr").await;
        assert!(result.message.unwrap().contains("`.tr en Hola mundo`"));
    }

    #[tokio::test]
    async fn test_language_without_text_or_reply() {
        let t = RecordingTransport::new();
        let result = run(&t, ".tr en").await;
        assert!(!result.success);
        assert!(t.responses().is_empty());
    }
}
