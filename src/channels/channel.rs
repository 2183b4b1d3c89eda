//! Channel trait and the platform-neutral message types that flow through it.

use std::path::PathBuf;
use std::pin::Pin;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use futures::Stream;

use crate::error::ChannelError;

/// Stream of inbound events produced by a started channel.
pub type MessageStream = Pin<Box<dyn Stream<Item = IncomingMessage> + Send>>;

/// Where an inbound event was posted.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChatScope {
    /// One-to-one conversation with the bot.
    Direct,
    /// Shared group/guild channel.
    Group,
}

/// A component interaction (button press or menu submission).
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Interaction {
    Button { id: String },
    Select { menu_id: String, values: Vec<String> },
}

/// Where the bytes of an attachment can be fetched from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AttachmentSource {
    Url(String),
    Path(PathBuf),
    /// The platform could not hand the file over; holds the reason.
    Unavailable(String),
}

/// A file attached to an inbound message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Attachment {
    pub file_name: String,
    pub source: AttachmentSource,
    pub size: Option<u64>,
}

/// A raw inbound event from any channel.
#[derive(Debug, Clone)]
pub struct IncomingMessage {
    /// Platform event id, unique per delivery.
    pub id: String,
    /// Name of the channel that produced the event.
    pub channel: String,
    pub user_id: String,
    pub user_name: Option<String>,
    pub content: String,
    pub scope: ChatScope,
    /// Set when the author is a bot account (including ourselves).
    pub from_bot: bool,
    /// Set when the author may run admin commands.
    pub is_admin: bool,
    pub interaction: Option<Interaction>,
    pub attachments: Vec<Attachment>,
    /// Channel-specific routing data (e.g. chat ids).
    pub metadata: serde_json::Value,
    pub received_at: DateTime<Utc>,
}

impl IncomingMessage {
    pub fn new(channel: &str, user_id: &str, content: &str) -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            channel: channel.to_string(),
            user_id: user_id.to_string(),
            user_name: None,
            content: content.to_string(),
            scope: ChatScope::Direct,
            from_bot: false,
            is_admin: false,
            interaction: None,
            attachments: Vec::new(),
            metadata: serde_json::json!({}),
            received_at: Utc::now(),
        }
    }

    pub fn with_id(mut self, id: impl Into<String>) -> Self {
        self.id = id.into();
        self
    }

    pub fn with_user_name(mut self, name: &str) -> Self {
        self.user_name = Some(name.to_string());
        self
    }

    pub fn with_scope(mut self, scope: ChatScope) -> Self {
        self.scope = scope;
        self
    }

    pub fn with_metadata(mut self, metadata: serde_json::Value) -> Self {
        self.metadata = metadata;
        self
    }

    pub fn with_interaction(mut self, interaction: Interaction) -> Self {
        self.interaction = Some(interaction);
        self
    }

    pub fn with_attachment(mut self, attachment: Attachment) -> Self {
        self.attachments.push(attachment);
        self
    }

    pub fn from_bot(mut self, from_bot: bool) -> Self {
        self.from_bot = from_bot;
        self
    }

    pub fn admin(mut self, is_admin: bool) -> Self {
        self.is_admin = is_admin;
        self
    }
}

/// Visual weight of a button.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ButtonStyle {
    Primary,
    Secondary,
    Success,
    Danger,
    /// Opens `url` instead of emitting an interaction.
    Link,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Button {
    pub id: String,
    pub label: String,
    pub style: ButtonStyle,
    pub url: Option<String>,
}

impl Button {
    pub fn new(id: &str, label: &str, style: ButtonStyle) -> Self {
        Self {
            id: id.to_string(),
            label: label.to_string(),
            style,
            url: None,
        }
    }

    pub fn link(url: &str, label: &str) -> Self {
        Self {
            id: String::new(),
            label: label.to_string(),
            style: ButtonStyle::Link,
            url: Some(url.to_string()),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MenuOption {
    pub label: String,
    pub value: String,
}

/// A bounded choice list.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SelectMenu {
    pub id: String,
    pub placeholder: String,
    pub options: Vec<MenuOption>,
    pub max_values: usize,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Component {
    Buttons(Vec<Button>),
    Menu(SelectMenu),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CardField {
    pub name: String,
    pub value: String,
    pub inline: bool,
}

/// Structured rich message (Discord "embed").
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Card {
    pub title: String,
    pub url: Option<String>,
    pub description: String,
    pub fields: Vec<CardField>,
    pub footer: Option<String>,
}

impl Card {
    /// Plain-text rendering for channels without native rich messages.
    pub fn to_text(&self) -> String {
        let mut parts = vec![format!("*{}*", self.title)];
        if !self.description.is_empty() {
            parts.push(self.description.clone());
        }
        for field in &self.fields {
            parts.push(format!("{}: {}", field.name, field.value));
        }
        if let Some(ref footer) = self.footer {
            parts.push(format!("_{footer}_"));
        }
        parts.join("\n")
    }
}

/// An outbound message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutgoingResponse {
    pub content: String,
    pub card: Option<Card>,
    pub components: Vec<Component>,
}

impl OutgoingResponse {
    pub fn text(content: impl Into<String>) -> Self {
        Self {
            content: content.into(),
            card: None,
            components: Vec::new(),
        }
    }

    pub fn with_buttons(mut self, buttons: Vec<Button>) -> Self {
        self.components.push(Component::Buttons(buttons));
        self
    }

    pub fn with_menu(mut self, menu: SelectMenu) -> Self {
        self.components.push(Component::Menu(menu));
        self
    }

    pub fn with_card(mut self, card: Card) -> Self {
        self.card = Some(card);
        self
    }

    /// Truncate `content` to at most `max_chars` characters.
    pub fn truncated(mut self, max_chars: usize) -> Self {
        if self.content.chars().count() > max_chars {
            let keep = max_chars.saturating_sub(1);
            let byte_offset = self
                .content
                .char_indices()
                .nth(keep)
                .map(|(i, _)| i)
                .unwrap_or(self.content.len());
            self.content.truncate(byte_offset);
            self.content.push('…');
        }
        self
    }
}

/// A message I/O backend (chat platform, terminal, ...).
#[async_trait]
pub trait Channel: Send + Sync {
    fn name(&self) -> &str;

    /// Start listening. Events arrive on the returned stream.
    async fn start(&self) -> Result<MessageStream, ChannelError>;

    /// Reply in the conversation `msg` came from.
    async fn respond(
        &self,
        msg: &IncomingMessage,
        response: OutgoingResponse,
    ) -> Result<(), ChannelError>;

    /// Send to the user's private conversation.
    async fn send_direct(
        &self,
        user_id: &str,
        response: OutgoingResponse,
    ) -> Result<(), ChannelError>;

    /// Delete up to `limit` recent messages in the conversation `msg` came
    /// from. Returns how many were removed.
    async fn purge(&self, _msg: &IncomingMessage, _limit: usize) -> Result<usize, ChannelError> {
        Err(ChannelError::Unsupported {
            name: self.name().to_string(),
            operation: "purge".to_string(),
        })
    }

    /// Longest text a single message may carry.
    fn max_message_length(&self) -> usize {
        2000
    }

    async fn health_check(&self) -> Result<(), ChannelError>;

    async fn shutdown(&self) -> Result<(), ChannelError> {
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn truncated_respects_char_boundaries() {
        let resp = OutgoingResponse::text("héllo wörld").truncated(5);
        assert_eq!(resp.content.chars().count(), 5);
        assert_eq!(resp.content, "héll…");
    }

    #[test]
    fn truncated_keeps_short_text() {
        let resp = OutgoingResponse::text("short").truncated(2000);
        assert_eq!(resp.content, "short");
    }

    #[test]
    fn card_to_text_lists_fields() {
        let card = Card {
            title: "📌 Backend Intern".into(),
            url: None,
            description: "Build APIs".into(),
            fields: vec![CardField {
                name: "🏢 Company".into(),
                value: "NovaTech".into(),
                inline: true,
            }],
            footer: Some("Powered by EXPERTS.AI".into()),
        };
        let text = card.to_text();
        assert!(text.starts_with("*📌 Backend Intern*"));
        assert!(text.contains("🏢 Company: NovaTech"));
        assert!(text.ends_with("_Powered by EXPERTS.AI_"));
    }

    #[test]
    fn builder_sets_fields() {
        let msg = IncomingMessage::new("cli", "u1", "hi")
            .with_id("evt-1")
            .with_scope(ChatScope::Group)
            .with_interaction(Interaction::Button { id: "start".into() })
            .from_bot(true)
            .admin(true);
        assert_eq!(msg.id, "evt-1");
        assert_eq!(msg.scope, ChatScope::Group);
        assert!(msg.from_bot);
        assert!(msg.is_admin);
        assert!(matches!(msg.interaction, Some(Interaction::Button { .. })));
    }
}
