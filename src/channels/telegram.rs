//! Telegram channel: long-polls the Bot API for updates.
//!
//! Buttons become inline keyboards whose callback data is prefixed with
//! `b:`. Select menus are rendered as one toggle button per option plus a
//! "Done" button; the current selection is kept per (chat, message) and the
//! menu is submitted to the bot as a single [`Interaction::Select`] when
//! "Done" is pressed. Single-choice menus submit on the first tap.

use std::collections::{HashMap, VecDeque};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use serde_json::Value;

use crate::channels::{
    Attachment, AttachmentSource, Button, ChatScope, Channel, Component, IncomingMessage,
    Interaction, MessageStream, OutgoingResponse, SelectMenu,
};
use crate::error::ChannelError;

/// Maximum message length for Telegram's sendMessage API.
const TELEGRAM_MAX_MESSAGE_LENGTH: usize = 4096;

/// Message ids remembered per chat for `purge`.
const TRACKED_MESSAGES_PER_CHAT: usize = 200;

const DONE_LABEL: &str = "✔️ Done";

/// Telegram channel: connects to the Bot API via long-polling.
pub struct TelegramChannel {
    bot_token: String,
    admin_users: Vec<String>,
    client: reqwest::Client,
    state: Arc<ChatState>,
}

/// Open menus and recently seen message ids, shared with the poller.
#[derive(Default)]
struct ChatState {
    menus: Mutex<HashMap<(String, i64), MenuSelection>>,
    history: Mutex<HashMap<String, VecDeque<i64>>>,
}

impl ChatState {
    fn remember(&self, chat_id: &str, message_id: i64) {
        let mut history = self.history.lock().unwrap_or_else(|e| e.into_inner());
        let ids = history.entry(chat_id.to_string()).or_default();
        ids.push_back(message_id);
        while ids.len() > TRACKED_MESSAGES_PER_CHAT {
            ids.pop_front();
        }
    }

    /// Track `menu` as the chat's open menu. Older menus in the same chat
    /// stop accepting taps.
    fn open_menu(&self, chat_id: &str, message_id: i64, menu: SelectMenu) {
        let mut menus = self.menus.lock().unwrap_or_else(|e| e.into_inner());
        menus.retain(|(chat, _), _| chat != chat_id);
        menus.insert((chat_id.to_string(), message_id), MenuSelection::new(menu));
    }

    /// Take up to `limit` of the most recent message ids in `chat_id`.
    fn take_recent(&self, chat_id: &str, limit: usize) -> Vec<i64> {
        let mut history = self.history.lock().unwrap_or_else(|e| e.into_inner());
        let Some(ids) = history.get_mut(chat_id) else {
            return Vec::new();
        };
        let keep = ids.len().saturating_sub(limit);
        ids.split_off(keep).into_iter().rev().collect()
    }
}

/// A select menu waiting for its "Done" press.
#[derive(Debug, Clone)]
struct MenuSelection {
    menu: SelectMenu,
    chosen: Vec<String>,
}

impl MenuSelection {
    fn new(menu: SelectMenu) -> Self {
        Self {
            menu,
            chosen: Vec::new(),
        }
    }

    /// Flip `value`. New values are refused once `max_values` are chosen.
    fn toggle(&mut self, value: &str) {
        if let Some(pos) = self.chosen.iter().position(|v| v == value) {
            self.chosen.remove(pos);
        } else if self.chosen.len() < self.menu.max_values {
            self.chosen.push(value.to_string());
        }
    }
}

/// What a callback button press means.
#[derive(Debug, Clone, PartialEq, Eq)]
enum CallbackAction {
    Button(String),
    Toggle { menu: String, value: String },
    Submit { menu: String },
}

fn parse_callback_data(data: &str) -> Option<CallbackAction> {
    let (kind, rest) = data.split_once(':')?;
    match kind {
        "b" => Some(CallbackAction::Button(rest.to_string())),
        "m" => {
            let (menu, value) = rest.split_once(':')?;
            Some(CallbackAction::Toggle {
                menu: menu.to_string(),
                value: value.to_string(),
            })
        }
        "d" => Some(CallbackAction::Submit {
            menu: rest.to_string(),
        }),
        _ => None,
    }
}

/// A document waiting for its download URL.
#[derive(Debug, Clone, PartialEq, Eq)]
struct DocumentRef {
    file_id: String,
    file_name: String,
    size: Option<u64>,
}

impl TelegramChannel {
    pub fn new(bot_token: String, admin_users: Vec<String>) -> Self {
        Self {
            bot_token,
            admin_users,
            client: reqwest::Client::new(),
            state: Arc::new(ChatState::default()),
        }
    }

    fn api_url(&self, method: &str) -> String {
        api_url(&self.bot_token, method)
    }

    /// Check if a username or numeric id may run admin commands.
    pub fn is_admin(&self, identity: &str) -> bool {
        check_user_allowed(&self.admin_users, [identity])
    }

    /// Send a full response: text and card, split to fit, with the keyboard
    /// attached to the last chunk.
    async fn send_response(
        &self,
        chat_id: &str,
        response: &OutgoingResponse,
    ) -> Result<(), ChannelError> {
        let text = response_text(response);
        let menu = response.components.iter().find_map(|c| match c {
            Component::Menu(menu) => Some(menu.clone()),
            Component::Buttons(_) => None,
        });
        let keyboard = inline_keyboard(&response.components);

        let chunks = split_message(&text, TELEGRAM_MAX_MESSAGE_LENGTH);
        let last = chunks.len().saturating_sub(1);
        for (i, chunk) in chunks.iter().enumerate() {
            let markup = if i == last { keyboard.as_ref() } else { None };
            let message_id = self.send_message_chunk(chat_id, chunk, markup).await?;

            if let Some(id) = message_id {
                self.state.remember(chat_id, id);
                if i == last
                    && let Some(ref menu) = menu
                {
                    self.state.open_menu(chat_id, id, menu.clone());
                }
            }
        }
        Ok(())
    }

    /// Send a single message chunk (≤4096 chars), Markdown-first with
    /// fallback. Returns the new message id when Telegram reports one.
    async fn send_message_chunk(
        &self,
        chat_id: &str,
        text: &str,
        keyboard: Option<&Value>,
    ) -> Result<Option<i64>, ChannelError> {
        let mut markdown_body = serde_json::json!({
            "chat_id": chat_id,
            "text": to_telegram_markdown(text),
            "parse_mode": "Markdown"
        });
        if let Some(kb) = keyboard {
            markdown_body["reply_markup"] = kb.clone();
        }

        let markdown_resp = self
            .client
            .post(self.api_url("sendMessage"))
            .json(&markdown_body)
            .send()
            .await
            .map_err(|e| ChannelError::SendFailed {
                name: "telegram".into(),
                reason: e.to_string(),
            })?;

        if markdown_resp.status().is_success() {
            return Ok(sent_message_id(markdown_resp).await);
        }

        let markdown_status = markdown_resp.status();
        tracing::warn!(
            status = ?markdown_status,
            "Telegram sendMessage with Markdown failed; retrying without parse_mode"
        );

        let mut plain_body = serde_json::json!({
            "chat_id": chat_id,
            "text": text.replace("**", ""),
        });
        if let Some(kb) = keyboard {
            plain_body["reply_markup"] = kb.clone();
        }
        let plain_resp = self
            .client
            .post(self.api_url("sendMessage"))
            .json(&plain_body)
            .send()
            .await
            .map_err(|e| ChannelError::SendFailed {
                name: "telegram".into(),
                reason: e.to_string(),
            })?;

        if !plain_resp.status().is_success() {
            let plain_err = plain_resp.text().await.unwrap_or_default();
            return Err(ChannelError::SendFailed {
                name: "telegram".into(),
                reason: format!(
                    "sendMessage failed (markdown: {}, plain: {})",
                    markdown_status, plain_err
                ),
            });
        }

        Ok(sent_message_id(plain_resp).await)
    }

    async fn delete_message(&self, chat_id: &str, message_id: i64) -> bool {
        let resp = self
            .client
            .post(self.api_url("deleteMessage"))
            .json(&serde_json::json!({"chat_id": chat_id, "message_id": message_id}))
            .send()
            .await;
        matches!(resp, Ok(r) if r.status().is_success())
    }
}

// ── Channel trait implementation ────────────────────────────────────

#[async_trait]
impl Channel for TelegramChannel {
    fn name(&self) -> &str {
        "telegram"
    }

    async fn start(&self) -> Result<MessageStream, ChannelError> {
        let (tx, rx) = tokio::sync::mpsc::unbounded_channel();
        let bot_token = self.bot_token.clone();
        let admin_users = self.admin_users.clone();
        let client = self.client.clone();
        let state = Arc::clone(&self.state);

        tokio::spawn(async move {
            let mut offset: i64 = 0;

            tracing::info!("Telegram channel listening for messages...");

            loop {
                let body = serde_json::json!({
                    "offset": offset,
                    "timeout": 30,
                    "allowed_updates": ["message", "callback_query"]
                });

                let resp = match client
                    .post(api_url(&bot_token, "getUpdates"))
                    .json(&body)
                    .send()
                    .await
                {
                    Ok(r) => r,
                    Err(e) => {
                        tracing::warn!("Telegram poll error: {e}");
                        tokio::time::sleep(std::time::Duration::from_secs(5)).await;
                        continue;
                    }
                };

                let data: Value = match resp.json().await {
                    Ok(d) => d,
                    Err(e) => {
                        tracing::warn!("Telegram parse error: {e}");
                        tokio::time::sleep(std::time::Duration::from_secs(5)).await;
                        continue;
                    }
                };

                let Some(results) = data.get("result").and_then(Value::as_array) else {
                    continue;
                };

                for update in results {
                    if let Some(uid) = update.get("update_id").and_then(Value::as_i64) {
                        offset = uid + 1;
                    }

                    let incoming = if let Some(message) = update.get("message") {
                        let Some((incoming, document)) = parse_message(message, &admin_users)
                        else {
                            continue;
                        };
                        if let (Some(chat_id), Some(message_id)) =
                            (incoming.metadata["chat_id"].as_str(), message_id_of(message))
                        {
                            state.remember(chat_id, message_id);
                        }
                        if let Some(doc) = document {
                            // getFile runs off the poll loop; the event is
                            // forwarded even when it fails.
                            let (client, bot_token, tx) =
                                (client.clone(), bot_token.clone(), tx.clone());
                            tokio::spawn(async move {
                                let resolved =
                                    resolve_file_url(&client, &bot_token, &doc.file_id).await;
                                let incoming =
                                    incoming.with_attachment(document_attachment(doc, resolved));
                                let _ = tx.send(incoming);
                            });
                            continue;
                        }
                        incoming
                    } else if let Some(query) = update.get("callback_query") {
                        match handle_callback(&client, &bot_token, &state, query, &admin_users)
                            .await
                        {
                            Some(incoming) => incoming,
                            None => continue,
                        }
                    } else {
                        continue;
                    };

                    if tx.send(incoming).is_err() {
                        tracing::info!("Telegram listener channel closed");
                        return;
                    }
                }
            }
        });

        let stream = futures::stream::unfold(rx, |mut rx| async move {
            rx.recv().await.map(|msg| (msg, rx))
        });

        Ok(Box::pin(stream))
    }

    async fn respond(
        &self,
        msg: &IncomingMessage,
        response: OutgoingResponse,
    ) -> Result<(), ChannelError> {
        let chat_id = msg
            .metadata
            .get("chat_id")
            .and_then(|v| v.as_str())
            .ok_or_else(|| ChannelError::SendFailed {
                name: "telegram".into(),
                reason: "No chat_id in message metadata".into(),
            })?;

        self.send_response(chat_id, &response).await
    }

    async fn send_direct(
        &self,
        user_id: &str,
        response: OutgoingResponse,
    ) -> Result<(), ChannelError> {
        // A private chat's id is the user's id.
        self.send_response(user_id, &response).await
    }

    async fn purge(&self, msg: &IncomingMessage, limit: usize) -> Result<usize, ChannelError> {
        let chat_id = msg
            .metadata
            .get("chat_id")
            .and_then(|v| v.as_str())
            .ok_or_else(|| ChannelError::SendFailed {
                name: "telegram".into(),
                reason: "No chat_id in message metadata".into(),
            })?;

        let mut deleted = 0;
        for message_id in self.state.take_recent(chat_id, limit) {
            if self.delete_message(chat_id, message_id).await {
                deleted += 1;
            }
        }
        tracing::info!(chat_id, deleted, "Telegram purge finished");
        Ok(deleted)
    }

    fn max_message_length(&self) -> usize {
        TELEGRAM_MAX_MESSAGE_LENGTH
    }

    async fn health_check(&self) -> Result<(), ChannelError> {
        let resp = self
            .client
            .get(self.api_url("getMe"))
            .send()
            .await
            .map_err(|e| ChannelError::StartupFailed {
                name: "telegram".into(),
                reason: e.to_string(),
            })?;

        if resp.status().is_success() {
            Ok(())
        } else {
            Err(ChannelError::StartupFailed {
                name: "telegram".into(),
                reason: format!("getMe returned {}", resp.status()),
            })
        }
    }

    async fn shutdown(&self) -> Result<(), ChannelError> {
        tracing::info!("Telegram channel shutting down");
        Ok(())
    }
}

// ── Polling helpers ─────────────────────────────────────────────────

fn api_url(bot_token: &str, method: &str) -> String {
    format!("https://api.telegram.org/bot{bot_token}/{method}")
}

async fn sent_message_id(resp: reqwest::Response) -> Option<i64> {
    let body: Value = resp.json().await.ok()?;
    body.get("result").and_then(message_id_of)
}

fn message_id_of(message: &Value) -> Option<i64> {
    message.get("message_id").and_then(Value::as_i64)
}

fn chat_scope(chat: &Value) -> ChatScope {
    match chat.get("type").and_then(Value::as_str) {
        Some("private") => ChatScope::Direct,
        _ => ChatScope::Group,
    }
}

/// Build the author-related part of an event from a `from` object.
fn author(
    from: &Value,
    chat: &Value,
    event_id: String,
    content: &str,
    admin_users: &[String],
) -> Option<IncomingMessage> {
    let user_id = from.get("id").and_then(Value::as_i64)?.to_string();
    let username = from.get("username").and_then(Value::as_str).unwrap_or("unknown");
    let first_name = from.get("first_name").and_then(Value::as_str);
    let is_bot = from.get("is_bot").and_then(Value::as_bool).unwrap_or(false);
    let chat_id = chat.get("id").and_then(Value::as_i64)?.to_string();

    let is_admin = check_user_allowed(admin_users, [username, user_id.as_str()]);

    Some(
        IncomingMessage::new("telegram", &user_id, content)
            .with_id(event_id)
            .with_user_name(first_name.unwrap_or(username))
            .with_scope(chat_scope(chat))
            .with_metadata(serde_json::json!({
                "chat_id": chat_id,
                "username": username,
            }))
            .from_bot(is_bot)
            .admin(is_admin),
    )
}

/// Parse a `message` update. The document, if any, still needs its
/// download URL resolved.
fn parse_message(
    message: &Value,
    admin_users: &[String],
) -> Option<(IncomingMessage, Option<DocumentRef>)> {
    let from = message.get("from")?;
    let chat = message.get("chat")?;
    let text = message
        .get("text")
        .or_else(|| message.get("caption"))
        .and_then(Value::as_str)
        .unwrap_or("");

    let document = message.get("document").and_then(|doc| {
        Some(DocumentRef {
            file_id: doc.get("file_id").and_then(Value::as_str)?.to_string(),
            file_name: doc
                .get("file_name")
                .and_then(Value::as_str)
                .unwrap_or("document")
                .to_string(),
            size: doc.get("file_size").and_then(Value::as_u64),
        })
    });

    if text.is_empty() && document.is_none() {
        return None;
    }

    let chat_id = chat.get("id").and_then(Value::as_i64)?;
    let event_id = format!("{chat_id}:{}", message_id_of(message)?);
    let incoming = author(from, chat, event_id, text, admin_users)?;
    Some((incoming, document))
}

async fn resolve_file_url(
    client: &reqwest::Client,
    bot_token: &str,
    file_id: &str,
) -> anyhow::Result<String> {
    let resp = client
        .post(api_url(bot_token, "getFile"))
        .json(&serde_json::json!({"file_id": file_id}))
        .send()
        .await?;

    if !resp.status().is_success() {
        let err = resp.text().await?;
        anyhow::bail!("Telegram getFile failed: {err}");
    }

    let body: Value = resp.json().await?;
    let Some(path) = body
        .get("result")
        .and_then(|r| r.get("file_path"))
        .and_then(Value::as_str)
    else {
        anyhow::bail!("Telegram getFile returned no file_path");
    };
    Ok(format!("https://api.telegram.org/file/bot{bot_token}/{path}"))
}

/// Build the attachment for a document, keeping the failure reason when
/// Telegram would not hand out a download URL.
fn document_attachment(doc: DocumentRef, resolved: anyhow::Result<String>) -> Attachment {
    let source = match resolved {
        Ok(url) => AttachmentSource::Url(url),
        Err(e) => {
            tracing::warn!(file = %doc.file_name, "Telegram getFile failed: {e}");
            AttachmentSource::Unavailable(e.to_string())
        }
    };
    Attachment {
        file_name: doc.file_name,
        source,
        size: doc.size,
    }
}

/// Handle a `callback_query`. Menu toggles are absorbed here; only button
/// presses and menu submissions become events.
async fn handle_callback(
    client: &reqwest::Client,
    bot_token: &str,
    state: &ChatState,
    query: &Value,
    admin_users: &[String],
) -> Option<IncomingMessage> {
    let query_id = query.get("id").and_then(Value::as_str)?;
    let _ = client
        .post(api_url(bot_token, "answerCallbackQuery"))
        .json(&serde_json::json!({"callback_query_id": query_id}))
        .send()
        .await;

    let message = query.get("message")?;
    let chat = message.get("chat")?;
    let chat_id = chat.get("id").and_then(Value::as_i64)?.to_string();
    let message_id = message_id_of(message)?;
    let data = query.get("data").and_then(Value::as_str)?;

    let interaction = match parse_callback_data(data)? {
        CallbackAction::Button(id) => Interaction::Button { id },
        CallbackAction::Toggle { menu, value } => {
            let keyboard = {
                let mut menus = state.menus.lock().unwrap_or_else(|e| e.into_inner());
                let key = (chat_id.clone(), message_id);
                let Some(selection) = menus.get_mut(&key) else {
                    tracing::debug!(chat_id, message_id, "Toggle on unknown menu");
                    return None;
                };
                if selection.menu.id != menu {
                    return None;
                }
                if selection.menu.max_values <= 1 {
                    menus.remove(&key);
                    None
                } else {
                    selection.toggle(&value);
                    Some(menu_keyboard(&selection.menu, &selection.chosen))
                }
            };
            match keyboard {
                Some(keyboard) => {
                    edit_keyboard(client, bot_token, &chat_id, message_id, keyboard).await;
                    return None;
                }
                // Single-choice menus submit on the first tap.
                None => {
                    clear_keyboard(client, bot_token, &chat_id, message_id).await;
                    Interaction::Select {
                        menu_id: menu,
                        values: vec![value],
                    }
                }
            }
        }
        CallbackAction::Submit { menu } => {
            let values = state
                .menus
                .lock()
                .unwrap_or_else(|e| e.into_inner())
                .remove(&(chat_id.clone(), message_id))
                .map(|s| s.chosen)
                .unwrap_or_default();
            clear_keyboard(client, bot_token, &chat_id, message_id).await;
            Interaction::Select {
                menu_id: menu,
                values,
            }
        }
    };

    let from = query.get("from")?;
    let incoming = author(from, chat, query_id.to_string(), "", admin_users)?;
    Some(incoming.with_interaction(interaction))
}

async fn edit_keyboard(
    client: &reqwest::Client,
    bot_token: &str,
    chat_id: &str,
    message_id: i64,
    keyboard: Value,
) {
    let resp = client
        .post(api_url(bot_token, "editMessageReplyMarkup"))
        .json(&serde_json::json!({
            "chat_id": chat_id,
            "message_id": message_id,
            "reply_markup": keyboard,
        }))
        .send()
        .await;
    if let Err(e) = resp {
        tracing::debug!(chat_id, message_id, "editMessageReplyMarkup failed: {e}");
    }
}

async fn clear_keyboard(client: &reqwest::Client, bot_token: &str, chat_id: &str, message_id: i64) {
    let empty = serde_json::json!({"inline_keyboard": []});
    edit_keyboard(client, bot_token, chat_id, message_id, empty).await;
}

// ── Rendering ───────────────────────────────────────────────────────

/// Telegram's legacy Markdown uses single asterisks for bold.
fn to_telegram_markdown(text: &str) -> String {
    text.replace("**", "*")
}

fn response_text(response: &OutgoingResponse) -> String {
    match (&response.card, response.content.is_empty()) {
        (Some(card), true) => card.to_text(),
        (Some(card), false) => format!("{}\n\n{}", response.content, card.to_text()),
        (None, _) => response.content.clone(),
    }
}

fn button_json(button: &Button) -> Value {
    match button.url {
        Some(ref url) => serde_json::json!({"text": button.label, "url": url}),
        None => serde_json::json!({
            "text": button.label,
            "callback_data": format!("b:{}", button.id),
        }),
    }
}

fn menu_keyboard(menu: &SelectMenu, chosen: &[String]) -> Value {
    let mut rows: Vec<Value> = menu
        .options
        .chunks(2)
        .map(|pair| {
            Value::Array(
                pair.iter()
                    .map(|opt| {
                        let mark = if chosen.contains(&opt.value) { "✅ " } else { "" };
                        serde_json::json!({
                            "text": format!("{mark}{}", opt.label),
                            "callback_data": format!("m:{}:{}", menu.id, opt.value),
                        })
                    })
                    .collect(),
            )
        })
        .collect();
    rows.push(serde_json::json!([
        {"text": DONE_LABEL, "callback_data": format!("d:{}", menu.id)}
    ]));
    serde_json::json!({ "inline_keyboard": rows })
}

/// Inline keyboard for a response's components, two buttons per row.
fn inline_keyboard(components: &[Component]) -> Option<Value> {
    let mut rows: Vec<Value> = Vec::new();
    for component in components {
        match component {
            Component::Buttons(buttons) => {
                rows.extend(
                    buttons
                        .chunks(2)
                        .map(|pair| Value::Array(pair.iter().map(button_json).collect())),
                );
            }
            Component::Menu(menu) => {
                if let Some(menu_rows) = menu_keyboard(menu, &[])["inline_keyboard"].as_array() {
                    rows.extend(menu_rows.iter().cloned());
                }
            }
        }
    }
    if rows.is_empty() {
        None
    } else {
        Some(serde_json::json!({ "inline_keyboard": rows }))
    }
}

/// Check if any identity in the iterator matches the allowed users list.
fn check_user_allowed<'a>(
    allowed_users: &[String],
    identities: impl IntoIterator<Item = &'a str>,
) -> bool {
    let ids: Vec<&str> = identities.into_iter().collect();
    allowed_users
        .iter()
        .any(|u| u == "*" || ids.contains(&u.as_str()))
}

/// Split a message into chunks that fit Telegram's character limit.
/// Tries to split on newlines, then spaces, then hard-cuts on a char
/// boundary.
fn split_message(text: &str, max_len: usize) -> Vec<String> {
    if text.len() <= max_len {
        return vec![text.to_string()];
    }

    let mut chunks = Vec::new();
    let mut remaining = text;

    while !remaining.is_empty() {
        if remaining.len() <= max_len {
            chunks.push(remaining.to_string());
            break;
        }

        let mut cut = max_len;
        while !remaining.is_char_boundary(cut) {
            cut -= 1;
        }
        let chunk = &remaining[..cut];
        let split_at = chunk
            .rfind('\n')
            .or_else(|| chunk.rfind(' '))
            .unwrap_or(cut);

        // Don't split at position 0 (infinite loop guard)
        let split_at = if split_at == 0 { cut } else { split_at };

        chunks.push(remaining[..split_at].to_string());
        remaining = remaining[split_at..].trim_start();
    }

    chunks
}

// ── Tests ───────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use crate::channels::{ButtonStyle, MenuOption};

    fn skills_menu(max_values: usize) -> SelectMenu {
        SelectMenu {
            id: "select_skills".into(),
            placeholder: "Pick".into(),
            options: ["java", "python", "rust"]
                .iter()
                .map(|v| MenuOption {
                    label: v.to_uppercase(),
                    value: v.to_string(),
                })
                .collect(),
            max_values,
        }
    }

    #[test]
    fn telegram_channel_name() {
        let ch = TelegramChannel::new("fake-token".into(), vec![]);
        assert_eq!(ch.name(), "telegram");
        assert_eq!(ch.max_message_length(), 4096);
    }

    #[test]
    fn telegram_api_url() {
        let ch = TelegramChannel::new("123:ABC".into(), vec![]);
        assert_eq!(
            ch.api_url("getMe"),
            "https://api.telegram.org/bot123:ABC/getMe"
        );
    }

    #[test]
    fn telegram_admin_wildcard_and_specific() {
        let ch = TelegramChannel::new("t".into(), vec!["*".into()]);
        assert!(ch.is_admin("anyone"));

        let ch = TelegramChannel::new("t".into(), vec!["alice".into(), "42".into()]);
        assert!(ch.is_admin("alice"));
        assert!(ch.is_admin("42"));
        assert!(!ch.is_admin("Alice"));
        assert!(!ch.is_admin("alic"));
        assert!(!ch.is_admin(""));
    }

    #[test]
    fn telegram_no_admins_by_default() {
        assert!(!check_user_allowed(&[], ["alice", "42"]));
    }

    #[test]
    fn parse_private_text_message() {
        let msg = serde_json::json!({
            "message_id": 7,
            "from": {"id": 42, "is_bot": false, "first_name": "Ada", "username": "ada"},
            "chat": {"id": 42, "type": "private"},
            "text": "a@b.co"
        });
        let (incoming, doc) = parse_message(&msg, &["ada".into()]).unwrap();
        assert_eq!(incoming.id, "42:7");
        assert_eq!(incoming.user_id, "42");
        assert_eq!(incoming.user_name.as_deref(), Some("Ada"));
        assert_eq!(incoming.scope, ChatScope::Direct);
        assert_eq!(incoming.metadata["chat_id"], "42");
        assert!(incoming.is_admin);
        assert!(!incoming.from_bot);
        assert!(doc.is_none());
    }

    #[test]
    fn parse_group_document_with_caption() {
        let msg = serde_json::json!({
            "message_id": 9,
            "from": {"id": 42, "is_bot": false, "username": "ada"},
            "chat": {"id": -100, "type": "supergroup"},
            "caption": "my cv",
            "document": {"file_id": "F1", "file_name": "cv.pdf", "file_size": 2048}
        });
        let (incoming, doc) = parse_message(&msg, &[]).unwrap();
        assert_eq!(incoming.scope, ChatScope::Group);
        assert_eq!(incoming.content, "my cv");
        assert!(!incoming.is_admin);
        assert_eq!(
            doc,
            Some(DocumentRef {
                file_id: "F1".into(),
                file_name: "cv.pdf".into(),
                size: Some(2048),
            })
        );
    }

    #[test]
    fn parse_bot_author_and_empty_messages() {
        let bot = serde_json::json!({
            "message_id": 1,
            "from": {"id": 1, "is_bot": true, "username": "other_bot"},
            "chat": {"id": 1, "type": "private"},
            "text": "hi"
        });
        assert!(parse_message(&bot, &[]).unwrap().0.from_bot);

        let sticker = serde_json::json!({
            "message_id": 2,
            "from": {"id": 1, "is_bot": false},
            "chat": {"id": 1, "type": "private"},
            "sticker": {}
        });
        assert!(parse_message(&sticker, &[]).is_none());
    }

    #[test]
    fn callback_data_round_trips_through_keyboard() {
        assert_eq!(
            parse_callback_data("b:cv_yes"),
            Some(CallbackAction::Button("cv_yes".into()))
        );
        assert_eq!(
            parse_callback_data("m:select_skills:java"),
            Some(CallbackAction::Toggle {
                menu: "select_skills".into(),
                value: "java".into()
            })
        );
        assert_eq!(
            parse_callback_data("d:select_skills"),
            Some(CallbackAction::Submit {
                menu: "select_skills".into()
            })
        );
        assert_eq!(parse_callback_data("x:1"), None);
        assert_eq!(parse_callback_data("nocolon"), None);
    }

    #[test]
    fn buttons_render_two_per_row() {
        let components = vec![Component::Buttons(vec![
            Button::new("a", "A", ButtonStyle::Primary),
            Button::new("b", "B", ButtonStyle::Primary),
            Button::link("https://example.com", "Apply"),
        ])];
        let kb = inline_keyboard(&components).unwrap();
        let rows = kb["inline_keyboard"].as_array().unwrap();
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0][0]["callback_data"], "b:a");
        assert_eq!(rows[1][0]["url"], "https://example.com");
        assert!(inline_keyboard(&[]).is_none());
    }

    #[test]
    fn menu_marks_chosen_options_and_ends_with_done() {
        let kb = menu_keyboard(&skills_menu(5), &["python".into()]);
        let rows = kb["inline_keyboard"].as_array().unwrap();
        assert_eq!(rows[0][0]["text"], "JAVA");
        assert_eq!(rows[0][1]["text"], "✅ PYTHON");
        assert_eq!(rows.last().unwrap()[0]["callback_data"], "d:select_skills");
    }

    #[test]
    fn menu_toggle_respects_max_values() {
        let mut sel = MenuSelection::new(skills_menu(2));
        sel.toggle("java");
        sel.toggle("python");
        sel.toggle("rust");
        assert_eq!(sel.chosen, vec!["java", "python"]);
        sel.toggle("java");
        assert_eq!(sel.chosen, vec!["python"]);
    }

    #[test]
    fn failed_file_lookup_still_yields_an_attachment() {
        let doc = DocumentRef {
            file_id: "f1".into(),
            file_name: "cv.pdf".into(),
            size: Some(25 * 1024 * 1024),
        };
        let attachment =
            document_attachment(doc.clone(), Err(anyhow::anyhow!("Bad Request: file is too big")));
        assert_eq!(attachment.file_name, "cv.pdf");
        assert_eq!(attachment.size, Some(25 * 1024 * 1024));
        assert!(matches!(
            attachment.source,
            AttachmentSource::Unavailable(ref reason) if reason.contains("too big")
        ));

        let ok = document_attachment(doc, Ok("https://api.telegram.org/file/botT/cv.pdf".into()));
        assert_eq!(
            ok.source,
            AttachmentSource::Url("https://api.telegram.org/file/botT/cv.pdf".into())
        );
    }

    #[test]
    fn new_menu_replaces_older_ones_in_same_chat() {
        let state = ChatState::default();
        state.open_menu("c", 1, skills_menu(5));
        state.open_menu("c", 2, skills_menu(5));
        state.open_menu("c", 3, skills_menu(5));
        state.open_menu("other", 7, skills_menu(1));

        let menus = state.menus.lock().unwrap();
        assert_eq!(menus.len(), 2);
        assert!(menus.contains_key(&("c".to_string(), 3)));
        assert!(menus.contains_key(&("other".to_string(), 7)));
    }

    #[test]
    fn history_returns_most_recent_first() {
        let state = ChatState::default();
        for id in 1..=5 {
            state.remember("c", id);
        }
        assert_eq!(state.take_recent("c", 2), vec![5, 4]);
        assert_eq!(state.take_recent("c", 10), vec![3, 2, 1]);
        assert!(state.take_recent("other", 3).is_empty());
    }

    #[test]
    fn bold_is_converted_for_telegram() {
        assert_eq!(to_telegram_markdown("**Hi** there"), "*Hi* there");
    }

    // ── Message splitting tests ─────────────────────────────────────

    #[test]
    fn split_message_short() {
        let chunks = split_message("Hello", 4096);
        assert_eq!(chunks, vec!["Hello"]);
    }

    #[test]
    fn split_message_exact_limit() {
        let msg = "a".repeat(4096);
        let chunks = split_message(&msg, 4096);
        assert_eq!(chunks.len(), 1);
        assert_eq!(chunks[0].len(), 4096);
    }

    #[test]
    fn split_message_over_limit_on_newline() {
        let msg = format!("{}\n{}", "a".repeat(2000), "b".repeat(3000));
        let chunks = split_message(&msg, 4096);
        assert_eq!(chunks.len(), 2);
        assert_eq!(chunks[0], "a".repeat(2000));
        assert_eq!(chunks[1], "b".repeat(3000));
    }

    #[test]
    fn split_message_no_good_split_point() {
        let msg = "a".repeat(5000);
        let chunks = split_message(&msg, 4096);
        assert_eq!(chunks.len(), 2);
        assert_eq!(chunks[0].len(), 4096);
        assert_eq!(chunks[1].len(), 904);
    }

    #[test]
    fn split_message_multibyte_does_not_panic() {
        let msg = "é".repeat(3000);
        let chunks = split_message(&msg, 4096);
        assert_eq!(chunks.len(), 2);
        assert_eq!(chunks.concat(), msg);
    }

    #[test]
    fn card_only_response_uses_card_text() {
        let card = crate::channels::Card {
            title: "📌 Intern".into(),
            url: None,
            description: "Build APIs".into(),
            fields: vec![],
            footer: None,
        };
        let resp = OutgoingResponse::text("").with_card(card.clone());
        assert_eq!(response_text(&resp), card.to_text());
    }

    #[test]
    fn incoming_message_missing_chat_id() {
        let msg = IncomingMessage::new("telegram", "user123", "hello");
        let chat_id = msg.metadata.get("chat_id").and_then(|v| v.as_str());
        assert_eq!(chat_id, None);
    }
}
