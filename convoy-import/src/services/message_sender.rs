//! Message send
//!
//! Turns one canonical [`Message`] into the platform's outbound payload and
//! sends it. Failures here never abort the conversation: they are logged and
//! reported back as a [`SendDisposition`].

use super::chat_client::{ChatApi, MessageAuthor, MessageContent, OutboundMessage};
use crate::models::{Message, MessageFrom, MessageKind, MessageUser, OriginalContent, PlanLimits};
use once_cell::sync::Lazy;
use regex::{Captures, Regex};
use std::borrow::Cow;

/// Maximum characters of text/note content
pub const MESSAGE_CONTENT_MAX: usize = 2000;

/// Inlined images longer than this (characters) are stripped from `original`
pub const INLINED_IMAGE_MAX: usize = 100_000;

static INLINED_IMAGE_REGEX: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r#"src="(data:image/[^;]+;base64[^"]+)""#).expect("inlined image pattern is valid")
});

/// Size limits applied to outbound messages
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SendLimits {
    pub max_content_chars: usize,
    pub inlined_image_max: usize,
}

impl Default for SendLimits {
    fn default() -> Self {
        Self {
            max_content_chars: MESSAGE_CONTENT_MAX,
            inlined_image_max: INLINED_IMAGE_MAX,
        }
    }
}

/// What happened to one message
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SendDisposition {
    Sent,
    /// Note not allowed on the active plan
    SkippedNote,
    /// Text or note message without content
    SkippedEmpty,
    /// Remote call failed (logged)
    Failed,
}

/// Builds and sends outbound messages
#[derive(Debug, Clone)]
pub struct MessageSender {
    limits: SendLimits,
    plan: PlanLimits,
    /// Origin used when a message has none (the import URN)
    default_origin: String,
    default_nickname: Option<String>,
}

impl MessageSender {
    pub fn new(
        limits: SendLimits,
        plan: PlanLimits,
        default_origin: String,
        default_nickname: Option<String>,
    ) -> Self {
        Self {
            limits,
            plan,
            default_origin,
            default_nickname,
        }
    }

    /// Derive the outbound payload, or None when there is nothing to send
    pub fn build(&self, message: &Message, user: &MessageUser) -> Option<OutboundMessage> {
        let kind = message.kind();
        let from = message.from;

        let content = match kind {
            MessageKind::File => MessageContent::File(message.file.clone()?),
            MessageKind::Note => MessageContent::Text(truncate_chars(
                message.note.as_deref()?,
                self.limits.max_content_chars,
            )),
            MessageKind::Text => {
                let text = message.text.as_deref().filter(|t| !t.is_empty())?;
                MessageContent::Text(truncate_chars(text, self.limits.max_content_chars))
            }
        };

        // Operator messages would otherwise reach the end user's mailbox;
        // notes are internal and never notify anyone
        let stealth = from == MessageFrom::Operator && kind != MessageKind::Note;

        let original = message
            .original
            .as_ref()
            .filter(|original| original.content.as_deref().is_some_and(|c| !c.is_empty()))
            .map(|original| OriginalContent {
                content_type: original.content_type.clone(),
                content: original
                    .content
                    .as_deref()
                    .map(|c| strip_inlined_images(c, self.limits.inlined_image_max).into_owned()),
            });

        Some(OutboundMessage {
            kind,
            content,
            from,
            origin: message
                .origin
                .clone()
                .unwrap_or_else(|| self.default_origin.clone()),
            user: MessageAuthor {
                nickname: user.name.clone().or_else(|| self.default_nickname.clone()),
                avatar: user.avatar.clone(),
            },
            stealth,
            timestamp: message.date,
            original,
            fingerprint: message.fingerprint,
        })
    }

    /// Build and send one message; never fails the caller
    pub async fn send(
        &self,
        api: &dyn ChatApi,
        session_id: &str,
        message: &Message,
        user: &MessageUser,
    ) -> SendDisposition {
        let Some(outbound) = self.build(message, user) else {
            tracing::warn!(
                session_id,
                date = message.date,
                "Skipping {} message without content",
                message.kind().as_str()
            );
            return SendDisposition::SkippedEmpty;
        };

        if outbound.kind == MessageKind::Note && !self.plan.notes_allowed {
            tracing::warn!(
                session_id,
                "Skipping note message because plan is {}",
                self.plan.name
            );
            return SendDisposition::SkippedNote;
        }

        match api.send_message(session_id, &outbound).await {
            Ok(()) => SendDisposition::Sent,
            Err(e) => {
                tracing::error!(
                    session_id,
                    kind = outbound.kind.as_str(),
                    timestamp = outbound.timestamp,
                    error = %e,
                    "Couldn't send message"
                );
                SendDisposition::Failed
            }
        }
    }
}

/// Left-anchored prefix of at most `max` characters
pub fn truncate_chars(input: &str, max: usize) -> String {
    match input.char_indices().nth(max) {
        Some((byte_index, _)) => input[..byte_index].to_string(),
        None => input.to_string(),
    }
}

/// Remove inlined base64 image attributes longer than `max` characters,
/// leaving the rest of the markup untouched
pub fn strip_inlined_images(html: &str, max: usize) -> Cow<'_, str> {
    INLINED_IMAGE_REGEX.replace_all(html, |caps: &Captures| {
        let matched = &caps[0];
        if matched.chars().count() > max {
            String::new()
        } else {
            matched.to_string()
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{plan, FilePayload};

    fn sender(plan: PlanLimits) -> MessageSender {
        MessageSender::new(
            SendLimits::default(),
            plan,
            "urn:convoy:import:0".to_string(),
            Some("Visitor".to_string()),
        )
    }

    #[test]
    fn test_truncate_chars() {
        assert_eq!(truncate_chars("abcdef", 3), "abc");
        assert_eq!(truncate_chars("abc", 3), "abc");
        assert_eq!(truncate_chars("héllo", 2), "hé");
        assert_eq!(truncate_chars("", 5), "");
    }

    #[test]
    fn test_long_text_is_truncated_to_max() {
        let text = "x".repeat(3000);
        let message = Message::text(MessageFrom::User, 1, text.clone());

        let outbound = sender(plan::UNLIMITED)
            .build(&message, &MessageUser::default())
            .unwrap();

        let content = outbound.content.as_text().unwrap();
        assert_eq!(content.chars().count(), MESSAGE_CONTENT_MAX);
        assert_eq!(content, &text[..MESSAGE_CONTENT_MAX]);
    }

    #[test]
    fn test_stealth_rules() {
        let sender = sender(plan::UNLIMITED);
        let user = MessageUser::default();

        let operator_text = Message::text(MessageFrom::Operator, 1, "hi");
        assert!(sender.build(&operator_text, &user).unwrap().stealth);

        let operator_note = Message::note(1, "internal");
        assert!(!sender.build(&operator_note, &user).unwrap().stealth);

        let user_text = Message::text(MessageFrom::User, 1, "hello");
        assert!(!sender.build(&user_text, &user).unwrap().stealth);
    }

    #[test]
    fn test_origin_and_nickname_defaults() {
        let sender = sender(plan::UNLIMITED);
        let mut message = Message::text(MessageFrom::User, 5, "hi");

        let outbound = sender.build(&message, &MessageUser::default()).unwrap();
        assert_eq!(outbound.origin, "urn:convoy:import:0");
        assert_eq!(outbound.user.nickname.as_deref(), Some("Visitor"));
        assert_eq!(outbound.timestamp, 5);

        message.origin = Some("email".to_string());
        let user = MessageUser {
            name: Some("Jane".to_string()),
            avatar: Some("https://img.example.com/jane.png".to_string()),
        };
        let outbound = sender.build(&message, &user).unwrap();
        assert_eq!(outbound.origin, "email");
        assert_eq!(outbound.user.nickname.as_deref(), Some("Jane"));
        assert!(outbound.user.avatar.is_some());
    }

    #[test]
    fn test_file_message_carries_payload() {
        let mut message = Message::text(MessageFrom::User, 1, "ignored");
        message.file = Some(FilePayload {
            url: "https://files.example.com/report.pdf".to_string(),
            name: "report.pdf".to_string(),
            mime_type: "application/pdf".to_string(),
        });

        let outbound = sender(plan::UNLIMITED)
            .build(&message, &MessageUser::default())
            .unwrap();

        assert_eq!(outbound.kind, MessageKind::File);
        assert!(matches!(outbound.content, MessageContent::File(ref f) if f.name == "report.pdf"));
    }

    #[test]
    fn test_message_without_content_is_not_built() {
        let mut message = Message::text(MessageFrom::User, 1, "");
        message.text = None;
        assert!(sender(plan::UNLIMITED)
            .build(&message, &MessageUser::default())
            .is_none());
    }

    #[test]
    fn test_fingerprint_is_forwarded_only_when_present() {
        let sender = sender(plan::UNLIMITED);
        let mut message = Message::text(MessageFrom::User, 1, "hi");

        assert!(sender.build(&message, &MessageUser::default()).unwrap().fingerprint.is_none());

        message.fingerprint = Some(991);
        assert_eq!(
            sender.build(&message, &MessageUser::default()).unwrap().fingerprint,
            Some(991)
        );
    }

    #[test]
    fn test_large_inlined_image_is_stripped() {
        let payload = "A".repeat(INLINED_IMAGE_MAX + 10);
        let html = format!(
            r#"<p>Before</p><img alt="shot" src="data:image/png;base64,{}"><p>After</p>"#,
            payload
        );

        let stripped = strip_inlined_images(&html, INLINED_IMAGE_MAX);

        assert_eq!(stripped, r#"<p>Before</p><img alt="shot" ><p>After</p>"#);
    }

    #[test]
    fn test_small_inlined_image_is_kept() {
        let html = r#"<img src="data:image/gif;base64,R0lGODlhAQABAAAAACw=">"#;
        assert_eq!(strip_inlined_images(html, INLINED_IMAGE_MAX), html);
    }

    #[test]
    fn test_image_at_threshold_is_kept() {
        // The match covers `src="` + payload + `"`
        let prefix = r#"src="data:image/png;base64,"#;
        let payload = "B".repeat(100 - prefix.len() - 1);
        let html = format!(r#"<img {}{}">"#, prefix, payload);

        assert_eq!(strip_inlined_images(&html, 100), html.as_str());
        assert_eq!(strip_inlined_images(&html, 99), "<img >");
    }

    #[test]
    fn test_original_is_carried_with_images_stripped() {
        let mut message = Message::text(MessageFrom::Operator, 1, "plain");
        message.original = Some(OriginalContent {
            content_type: Some("text/html".to_string()),
            content: Some(format!(
                r#"<b>plain</b><img src="data:image/jpeg;base64,{}">"#,
                "C".repeat(INLINED_IMAGE_MAX)
            )),
        });

        let outbound = sender(plan::UNLIMITED)
            .build(&message, &MessageUser::default())
            .unwrap();

        let original = outbound.original.unwrap();
        assert_eq!(original.content_type.as_deref(), Some("text/html"));
        assert_eq!(original.content.as_deref(), Some("<b>plain</b><img >"));
        assert_eq!(outbound.content.as_text(), Some("plain"));
    }
}
