//! CLI channel: stdin/stdout REPL for local testing.
//!
//! Besides plain text, a few slash-commands stand in for platform widgets:
//!
//! ```text
//! /click <button-id>
//! /select <menu-id> <value>[,<value>...]
//! /upload <path>
//! /group <anything>      # same, but as if posted in a group chat
//! ```

use std::path::PathBuf;

use async_trait::async_trait;
use futures::stream;
use tokio::io::{AsyncBufReadExt, BufReader};

use crate::channels::{
    Attachment, AttachmentSource, Channel, ChatScope, Component, IncomingMessage, Interaction,
    MessageStream, OutgoingResponse,
};
use crate::error::ChannelError;

const CLI_USER: &str = "local-user";

/// A simple CLI channel that reads from stdin and writes to stdout.
#[derive(Default)]
pub struct CliChannel;

impl CliChannel {
    pub fn new() -> Self {
        Self
    }
}

/// Turn one input line into an event. The local operator is an admin.
fn parse_line(line: &str) -> IncomingMessage {
    if let Some(rest) = line.strip_prefix("/group ") {
        return parse_line(rest.trim()).with_scope(ChatScope::Group);
    }

    let base = || IncomingMessage::new("cli", CLI_USER, "").admin(true);

    if let Some(id) = line.strip_prefix("/click ") {
        return base().with_interaction(Interaction::Button {
            id: id.trim().to_string(),
        });
    }

    if let Some(rest) = line.strip_prefix("/select ") {
        let (menu_id, values) = rest.trim().split_once(' ').unwrap_or((rest.trim(), ""));
        let values = values
            .split(',')
            .map(str::trim)
            .filter(|v| !v.is_empty())
            .map(String::from)
            .collect();
        return base().with_interaction(Interaction::Select {
            menu_id: menu_id.to_string(),
            values,
        });
    }

    if let Some(path) = line.strip_prefix("/upload ") {
        let path = PathBuf::from(path.trim());
        let file_name = path
            .file_name()
            .and_then(|n| n.to_str())
            .unwrap_or("file")
            .to_string();
        let size = std::fs::metadata(&path).ok().map(|m| m.len());
        return base().with_attachment(Attachment {
            file_name,
            source: AttachmentSource::Path(path),
            size,
        });
    }

    IncomingMessage::new("cli", CLI_USER, line).admin(true)
}

/// Render a response as terminal text, listing its widgets.
fn render(response: &OutgoingResponse) -> String {
    let mut out = Vec::new();
    if !response.content.is_empty() {
        out.push(response.content.clone());
    }
    if let Some(ref card) = response.card {
        out.push(card.to_text());
    }
    for component in &response.components {
        match component {
            Component::Buttons(buttons) => {
                for b in buttons {
                    match b.url {
                        Some(ref url) => out.push(format!("  🔗 {} → {url}", b.label)),
                        None => out.push(format!("  [/click {}] {}", b.id, b.label)),
                    }
                }
            }
            Component::Menu(menu) => {
                let values: Vec<&str> = menu.options.iter().map(|o| o.value.as_str()).collect();
                out.push(format!(
                    "  [/select {} …] {} (up to {}): {}",
                    menu.id,
                    menu.placeholder,
                    menu.max_values,
                    values.join(", ")
                ));
            }
        }
    }
    out.join("\n")
}

#[async_trait]
impl Channel for CliChannel {
    fn name(&self) -> &str {
        "cli"
    }

    async fn start(&self) -> Result<MessageStream, ChannelError> {
        let (tx, rx) = tokio::sync::mpsc::unbounded_channel();

        tokio::spawn(async move {
            let stdin = tokio::io::stdin();
            let reader = BufReader::new(stdin);
            let mut lines = reader.lines();

            eprint!("> ");

            loop {
                match lines.next_line().await {
                    Ok(Some(line)) => {
                        let line = line.trim().to_string();
                        if line.is_empty() {
                            eprint!("> ");
                            continue;
                        }
                        if tx.send(parse_line(&line)).is_err() {
                            break;
                        }
                    }
                    Ok(None) => break, // EOF
                    Err(e) => {
                        tracing::error!("Error reading stdin: {}", e);
                        break;
                    }
                }
            }
        });

        let stream = stream::unfold(rx, |mut rx| async move {
            rx.recv().await.map(|msg| (msg, rx))
        });

        Ok(Box::pin(stream))
    }

    async fn respond(
        &self,
        _msg: &IncomingMessage,
        response: OutgoingResponse,
    ) -> Result<(), ChannelError> {
        println!("\n{}\n", render(&response));
        eprint!("> ");
        Ok(())
    }

    async fn send_direct(
        &self,
        _user_id: &str,
        response: OutgoingResponse,
    ) -> Result<(), ChannelError> {
        println!("\n(DM) {}\n", render(&response));
        eprint!("> ");
        Ok(())
    }

    async fn purge(&self, _msg: &IncomingMessage, limit: usize) -> Result<usize, ChannelError> {
        // Nothing to delete in a terminal; report it as done.
        Ok(limit)
    }

    async fn health_check(&self) -> Result<(), ChannelError> {
        Ok(())
    }
}
