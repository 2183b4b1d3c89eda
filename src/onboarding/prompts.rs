//! Prompt renderer: turns engine decisions into outbound messages.
//!
//! Component ids and tag vocabularies live here too, so the engine and the
//! renderer agree on what a menu submission can contain.

use crate::channels::{Button, ButtonStyle, MenuOption, OutgoingResponse, SelectMenu};

use super::model::Profile;
use super::state::OnboardingStep;

/// Component ids understood by the bot.
pub mod ids {
    pub const START: &str = "start";
    pub const CREATE_PROFILE: &str = "create_profile";
    pub const VIEW_PROFILE: &str = "view_profile";
    pub const DELETE_PROFILE: &str = "delete_profile";
    pub const MATCH_JOBS: &str = "match_jobs";
    pub const GPT_ASK: &str = "gpt_ask";
    pub const CV_YES: &str = "cv_yes";
    pub const CV_NO: &str = "cv_no";
    pub const SKIP_DESCRIPTION: &str = "skip_resume_description";
    pub const SELECT_SKILLS: &str = "select_skills";
    pub const SELECT_POSITION: &str = "select_position";

    /// Escape-valve option on menus.
    pub const OTHER: &str = "other";
}

/// (value, label) pairs for the skills menu.
pub const SKILL_TAGS: &[(&str, &str)] = &[
    ("java", "Java"),
    ("python", "Python"),
    ("javascript", "JavaScript"),
    ("react", "React"),
    ("spring", "Spring Boot"),
    ("node", "Node.js"),
    ("cpp", "C++"),
    ("sql", "SQL"),
    ("git", "Git"),
    ("docker", "Docker"),
    (ids::OTHER, "Other"),
];

/// (value, label) pairs for the position menu.
pub const POSITION_TAGS: &[(&str, &str)] = &[
    ("backend", "Backend"),
    ("frontend", "Frontend"),
    ("fullstack", "Full Stack"),
    ("mobile", "Mobile"),
    ("qa", "QA"),
    ("devops", "DevOps"),
    ("data", "Data Science"),
    (ids::OTHER, "Other"),
];

pub const MAX_SKILLS: usize = 5;
pub const MAX_POSITIONS: usize = 1;

/// Document extensions accepted on the resume upload step.
pub const DOCUMENT_EXTENSIONS: &[&str] = &["pdf", "txt"];

/// Whether `file_name` carries a recognised document extension.
pub fn is_document(file_name: &str) -> bool {
    std::path::Path::new(file_name)
        .extension()
        .and_then(|ext| ext.to_str())
        .is_some_and(|ext| {
            DOCUMENT_EXTENSIONS
                .iter()
                .any(|allowed| ext.eq_ignore_ascii_case(allowed))
        })
}

/// The question the user should answer next.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Prompt {
    ResumeChoice,
    /// `retry` prefixes a correction after a malformed address.
    Email { retry: bool },
    Name,
    Skills,
    SkillsManual,
    Position,
    PositionManual,
    ResumeDescription,
    ResumeFile,
    /// Onboarding finished; offers the main menu.
    Completed,
}

impl Prompt {
    /// The prompt that asks the question pending in `step`.
    pub fn for_step(step: OnboardingStep) -> Option<Prompt> {
        use OnboardingStep::*;
        match step {
            Idle => None,
            AwaitingResumeChoice => Some(Prompt::ResumeChoice),
            AwaitingEmail => Some(Prompt::Email { retry: false }),
            AwaitingName => Some(Prompt::Name),
            AwaitingSkills => Some(Prompt::Skills),
            AwaitingSkillsManual => Some(Prompt::SkillsManual),
            AwaitingPosition => Some(Prompt::Position),
            AwaitingPositionManual => Some(Prompt::PositionManual),
            AwaitingResumeDescription => Some(Prompt::ResumeDescription),
            AwaitingResumeFile => Some(Prompt::ResumeFile),
            Complete => Some(Prompt::Completed),
        }
    }

    pub fn render(&self) -> OutgoingResponse {
        match self {
            Prompt::ResumeChoice => OutgoingResponse::text("📄 Do you have a resume (CV)?")
                .with_buttons(vec![
                    Button::new(ids::CV_YES, "✅ Yes", ButtonStyle::Success),
                    Button::new(ids::CV_NO, "❌ No", ButtonStyle::Danger),
                ]),
            Prompt::Email { retry: false } => {
                OutgoingResponse::text("📧 **1. What is your email address?**")
            }
            Prompt::Email { retry: true } => OutgoingResponse::text(
                "⚠️ That doesn't look like a valid email address (e.g. name@example.com).\n\
                 📧 **1. What is your email address?**",
            ),
            Prompt::Name => OutgoingResponse::text("👤 **2. What's your full name?**"),
            Prompt::Skills => OutgoingResponse::text(
                "💻 **3. What are your top skills or technologies?**",
            )
            .with_menu(menu(
                ids::SELECT_SKILLS,
                "💻 Select up to 5 skills",
                SKILL_TAGS,
                MAX_SKILLS,
            )),
            Prompt::SkillsManual => OutgoingResponse::text(
                "✍️ Please type your skills manually, separated by commas.",
            ),
            Prompt::Position => OutgoingResponse::text(
                "🧾 **4. What type of position are you looking for?**",
            )
            .with_menu(menu(
                ids::SELECT_POSITION,
                "📌 Choose your preferred position",
                POSITION_TAGS,
                MAX_POSITIONS,
            )),
            Prompt::PositionManual => {
                OutgoingResponse::text("✍️ Please type your preferred position.")
            }
            Prompt::ResumeDescription => OutgoingResponse::text(
                "📄 **5. Optionally, describe your resume or paste a link.**",
            )
            .with_buttons(vec![Button::new(
                ids::SKIP_DESCRIPTION,
                "⏭️ Skip",
                ButtonStyle::Secondary,
            )]),
            Prompt::ResumeFile => OutgoingResponse::text(
                "📄 Great! Please upload your resume as a PDF in this chat.",
            ),
            Prompt::Completed => OutgoingResponse::text(
                "🎉 **Your profile is complete!** You'll receive opportunities soon. \
                 What would you like to do next?",
            )
            .with_buttons(main_menu()),
        }
    }
}

/// Anything the bot says that is not the next onboarding question.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Notice {
    Status,
    /// Posted in a group when someone starts onboarding there.
    CheckDirectMessages,
    Welcome,
    Unrecognized,
    FileNotExpected,
    WrongFileType { file_name: String },
    MissingAttachment,
    ResumeUnreadable,
    ReadingResume,
    ResumeSaved { backfilled: bool },
    TransientFailure,
    PersistenceFailure,
    ProfileIncomplete,
    NoProfile,
    Profile(String),
    Deleted,
    NothingToDelete,
    AskHint,
    AskUsage,
    AskUnavailable,
    Answer(String),
    OpportunitiesFound(usize),
    NoOpportunities,
    NoNewOpportunities,
    /// Most recently delivered opportunities as (title, company).
    RecentOpportunities(Vec<(String, String)>),
    NotPermitted,
    Purged(usize),
    FeedbackThanks,
    FeedbackUsage,
}

impl Notice {
    pub fn render(&self) -> OutgoingResponse {
        match self {
            Notice::Status => OutgoingResponse::text("✅ I'm alive and ready!"),
            Notice::CheckDirectMessages => OutgoingResponse::text(
                "👋 **Welcome to the EXPERTS.AI Career Hub!** Check your DMs to get started!",
            ),
            Notice::Welcome => OutgoingResponse::text(
                "👋 Hey there! I'm your personal assistant from **EXPERTS.AI**, here to help you \
                 discover internships, jobs and thesis topics that match your profile.",
            ),
            Notice::Unrecognized => {
                OutgoingResponse::text("⚠️ Sorry, I didn't recognize that option.")
            }
            Notice::FileNotExpected => OutgoingResponse::text(
                "📎 I'm not expecting a file right now. Please answer the question above.",
            ),
            Notice::WrongFileType { file_name } => OutgoingResponse::text(format!(
                "⚠️ `{file_name}` is not a supported document. Please upload your resume as a PDF."
            )),
            Notice::MissingAttachment => OutgoingResponse::text(
                "📎 I'm waiting for your resume. Please attach the PDF to a message.",
            ),
            Notice::ResumeUnreadable => OutgoingResponse::text(
                "⚠️ I couldn't read any text from that file. Please upload a text-based PDF.",
            ),
            Notice::ReadingResume => OutgoingResponse::text("⏳ Reading your resume…"),
            Notice::ResumeSaved { backfilled: true } => OutgoingResponse::text(
                "✅ Resume received! I filled in your profile from it. Use View Profile to check.",
            ),
            Notice::ResumeSaved { backfilled: false } => OutgoingResponse::text(
                "✅ Resume received and saved to your profile.",
            ),
            Notice::TransientFailure => OutgoingResponse::text(
                "⏳ The service is not responding right now. Please try again in a moment.",
            ),
            Notice::PersistenceFailure => OutgoingResponse::text(
                "❌ Something went wrong while saving. Please send that again.",
            ),
            Notice::ProfileIncomplete => {
                OutgoingResponse::text("❗ You need to complete your profile first.")
            }
            Notice::NoProfile => OutgoingResponse::text(
                "⚠️ You don't have a profile yet. Select 'Create Profile' to start.",
            )
            .with_buttons(vec![Button::new(
                ids::CREATE_PROFILE,
                "📝 Create Profile",
                ButtonStyle::Success,
            )]),
            Notice::Profile(summary) => OutgoingResponse::text(summary.clone()),
            Notice::Deleted => OutgoingResponse::text(
                "🗑️ Your profile has been deleted. You can start over with `!start`.",
            ),
            Notice::NothingToDelete => OutgoingResponse::text("ℹ️ There is no profile to delete."),
            Notice::AskHint => OutgoingResponse::text(
                "✍️ You can ask the AI by typing `!ask <your question>` here.",
            ),
            Notice::AskUsage => OutgoingResponse::text("Usage: `!ask <your question>`"),
            Notice::AskUnavailable => {
                OutgoingResponse::text("🤖 The AI assistant is not available right now.")
            }
            Notice::Answer(text) => OutgoingResponse::text(text.clone()),
            Notice::OpportunitiesFound(count) => OutgoingResponse::text(format!(
                "🎯 Found {count} {} for you:",
                if *count == 1 { "opportunity" } else { "opportunities" }
            )),
            Notice::NoOpportunities => {
                OutgoingResponse::text("😢 No opportunities found for your profile.")
            }
            Notice::NoNewOpportunities => OutgoingResponse::text(
                "📭 No new opportunities since last time. Check back soon!",
            ),
            Notice::RecentOpportunities(recent) => {
                let mut lines = vec!["📬 **Recently sent to you:**".to_string()];
                lines.extend(
                    recent
                        .iter()
                        .map(|(title, company)| format!("• {title} ({company})")),
                );
                OutgoingResponse::text(lines.join("\n"))
            }
            Notice::NotPermitted => {
                OutgoingResponse::text("⛔ You don't have permission to do that.")
            }
            Notice::Purged(count) => OutgoingResponse::text(format!("🧹 {count} messages deleted.")),
            Notice::FeedbackThanks => OutgoingResponse::text("🙏 Thanks for your feedback!"),
            Notice::FeedbackUsage => {
                OutgoingResponse::text("Usage: `!feedback [1-5] <your feedback>`")
            }
        }
    }
}

/// Buttons shown after onboarding and on guild start.
pub fn main_menu() -> Vec<Button> {
    vec![
        Button::new(ids::GPT_ASK, "🤖 Ask GPT", ButtonStyle::Primary),
        Button::new(ids::VIEW_PROFILE, "👤 View Profile", ButtonStyle::Primary),
        Button::new(ids::CREATE_PROFILE, "📝 Create Profile", ButtonStyle::Success),
        Button::new(ids::MATCH_JOBS, "🎯 Match Me", ButtonStyle::Secondary),
        Button::new(ids::DELETE_PROFILE, "🗑️ Delete Profile", ButtonStyle::Danger),
    ]
}

/// Render the profile summary notice.
pub fn profile_notice(profile: &Profile) -> Notice {
    Notice::Profile(profile.to_summary())
}

fn menu(id: &str, placeholder: &str, tags: &[(&str, &str)], max_values: usize) -> SelectMenu {
    SelectMenu {
        id: id.to_string(),
        placeholder: placeholder.to_string(),
        options: tags
            .iter()
            .map(|(value, label)| MenuOption {
                label: label.to_string(),
                value: value.to_string(),
            })
            .collect(),
        max_values,
    }
}
