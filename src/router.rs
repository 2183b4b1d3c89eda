//! Input router: classifies raw channel events.
//!
//! Global commands and menu buttons are recognised here and never reach the
//! step engine. Everything else becomes a [`StepInput`], but only in direct
//! conversations; group chatter is dropped.

use crate::channels::{ChatScope, IncomingMessage, Interaction};
use crate::onboarding::engine::StepInput;
use crate::onboarding::prompts::ids;

/// Messages removed by `clean` when no count is given.
pub const DEFAULT_PURGE: usize = 10;
pub const MAX_PURGE: usize = 100;

/// Commands available regardless of onboarding state.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    Status,
    /// Create or restart a profile.
    Start,
    /// `ask <question>`; `None` when the question is missing.
    Ask(Option<String>),
    /// The "Ask GPT" button, which only explains how to ask.
    AskHint,
    /// Match opportunities against the profile.
    Fetch,
    ViewProfile,
    DeleteProfile,
    /// Admin message purge.
    Clean(usize),
    Feedback { stars: Option<u8>, text: String },
}

/// Where an event should go.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Route {
    Ignore,
    Command(Command),
    Step(StepInput),
}

/// Classify `msg`.
pub fn route(msg: &IncomingMessage) -> Route {
    if msg.from_bot {
        return Route::Ignore;
    }

    if let Some(ref interaction) = msg.interaction {
        return route_interaction(interaction, msg.scope);
    }

    let text = msg.content.trim();
    if let Some(command) = parse_command(text) {
        return Route::Command(command);
    }

    if msg.scope == ChatScope::Group {
        return Route::Ignore;
    }

    if let Some(attachment) = msg.attachments.first() {
        return Route::Step(StepInput::Upload(attachment.clone()));
    }

    if text.is_empty() {
        return Route::Ignore;
    }
    Route::Step(StepInput::Text(text.to_string()))
}

fn route_interaction(interaction: &Interaction, scope: ChatScope) -> Route {
    match interaction {
        Interaction::Button { id } => {
            if let Some(command) = button_command(id) {
                return Route::Command(command);
            }
            if scope == ChatScope::Group {
                return Route::Ignore;
            }
            Route::Step(StepInput::Button(id.clone()))
        }
        Interaction::Select { menu_id, values } => {
            if scope == ChatScope::Group {
                return Route::Ignore;
            }
            Route::Step(StepInput::Selection {
                menu: menu_id.clone(),
                values: values.clone(),
            })
        }
    }
}

fn button_command(id: &str) -> Option<Command> {
    let command = match id {
        ids::START | ids::CREATE_PROFILE => Command::Start,
        ids::VIEW_PROFILE => Command::ViewProfile,
        ids::DELETE_PROFILE => Command::DeleteProfile,
        ids::MATCH_JOBS => Command::Fetch,
        ids::GPT_ASK => Command::AskHint,
        _ => return None,
    };
    Some(command)
}

/// Parse `!name args` or `/name args` (a `@botname` suffix is dropped).
pub fn parse_command(text: &str) -> Option<Command> {
    let body = text
        .strip_prefix('!')
        .or_else(|| text.strip_prefix('/'))?;
    let (head, args) = match body.split_once(char::is_whitespace) {
        Some((head, args)) => (head, args.trim()),
        None => (body, ""),
    };
    let name = head.split('@').next().unwrap_or(head).to_ascii_lowercase();

    let command = match name.as_str() {
        "status" => Command::Status,
        "start" => Command::Start,
        "ask" => Command::Ask((!args.is_empty()).then(|| args.to_string())),
        "fetch" | "match" => Command::Fetch,
        "profile" | "view" => Command::ViewProfile,
        "delete" | "reset" => Command::DeleteProfile,
        "clean" => Command::Clean(parse_purge_count(args)),
        "feedback" => parse_feedback(args),
        _ => return None,
    };
    Some(command)
}

fn parse_purge_count(args: &str) -> usize {
    args.split_whitespace()
        .next()
        .and_then(|n| n.parse::<usize>().ok())
        .unwrap_or(DEFAULT_PURGE)
        .clamp(1, MAX_PURGE)
}

fn parse_feedback(args: &str) -> Command {
    let (first, rest) = match args.split_once(char::is_whitespace) {
        Some((first, rest)) => (first, rest.trim()),
        None => (args, ""),
    };
    match first.parse::<u8>() {
        Ok(stars @ 1..=5) => Command::Feedback {
            stars: Some(stars),
            text: rest.to_string(),
        },
        _ => Command::Feedback {
            stars: None,
            text: args.to_string(),
        },
    }
}
