//! Step engine: pure transitions over the onboarding state machine.
//!
//! `apply` never performs I/O. It either returns the updated profile for the
//! caller to persist, asks the caller to stay put (optionally with a
//! corrective notice), or hands back work that needs an adapter (resume
//! ingestion) which is finished later through [`complete_resume`].

use std::sync::LazyLock;

use chrono::{DateTime, Utc};
use regex::Regex;

use crate::channels::Attachment;

use super::model::{Profile, ResumeChoice, ResumeFields};
use super::prompts::{
    MAX_POSITIONS, MAX_SKILLS, Notice, POSITION_TAGS, Prompt, SKILL_TAGS, ids, is_document,
};
use super::state::OnboardingStep;

static EMAIL_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^[^@\s]+@[^@\s]+\.[^@\s]+$")
        .unwrap_or_else(|e| panic!("email pattern: {e}"))
});

/// Whether `text` looks like an email address.
pub fn is_valid_email(text: &str) -> bool {
    EMAIL_RE.is_match(text)
}

/// Component ids whose meaning depends on the current step.
pub const STEP_COMPONENTS: &[&str] = &[
    ids::CV_YES,
    ids::CV_NO,
    ids::SKIP_DESCRIPTION,
    ids::SELECT_SKILLS,
    ids::SELECT_POSITION,
];

/// A normalized answer to the pending question.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StepInput {
    Button(String),
    Selection { menu: String, values: Vec<String> },
    /// Trimmed message text.
    Text(String),
    Upload(Attachment),
}

/// Outcome of feeding one input to the engine.
#[derive(Debug, Clone, PartialEq)]
pub enum Transition {
    /// Commit `profile` and send `prompt`.
    Advance { profile: Box<Profile>, prompt: Prompt },
    /// No state change. Re-render `prompt`, preceded by `notice` if any.
    Stay { notice: Option<Notice>, prompt: Prompt },
    /// The answer is acceptable but needs the document adapters before the
    /// step can complete.
    IngestResume(Attachment),
    /// Unknown component id; profile untouched.
    Unrecognized,
    /// Nothing to do (stale button, chatter after completion, ...).
    Ignored,
}

impl Transition {
    fn stay(prompt: Prompt) -> Self {
        Transition::Stay {
            notice: None,
            prompt,
        }
    }

    fn stay_with(notice: Notice, prompt: Prompt) -> Self {
        Transition::Stay {
            notice: Some(notice),
            prompt,
        }
    }
}

/// Compute the transition for `input` against `profile`.
pub fn apply(profile: &Profile, input: &StepInput, now: DateTime<Utc>) -> Transition {
    use OnboardingStep::*;

    if let Some(id) = component_id(input) {
        if !STEP_COMPONENTS.contains(&id) {
            return Transition::Unrecognized;
        }
    }

    match (profile.step, input) {
        (Idle | Complete, _) => Transition::Ignored,

        (AwaitingResumeChoice, StepInput::Button(id)) if id == ids::CV_YES => {
            let mut next = profile.clone();
            next.has_resume = ResumeChoice::Yes;
            advance(next, AwaitingResumeFile, now)
        }
        (AwaitingResumeChoice, StepInput::Button(id)) if id == ids::CV_NO => {
            let mut next = profile.clone();
            next.has_resume = ResumeChoice::No;
            advance(next, AwaitingEmail, now)
        }

        (AwaitingEmail, StepInput::Text(text)) => {
            if !is_valid_email(text) {
                return Transition::stay(Prompt::Email { retry: true });
            }
            let mut next = profile.clone();
            next.email = Some(text.clone());
            advance(next, AwaitingName, now)
        }

        (AwaitingName, StepInput::Text(text)) => {
            if text.is_empty() {
                return Transition::stay(Prompt::Name);
            }
            let mut next = profile.clone();
            next.name = Some(text.clone());
            advance(next, AwaitingSkills, now)
        }

        (AwaitingSkills, StepInput::Selection { menu, values }) if menu == ids::SELECT_SKILLS => {
            match validate_selection(values, SKILL_TAGS, MAX_SKILLS) {
                Selection::Invalid => Transition::stay_with(Notice::Unrecognized, Prompt::Skills),
                Selection::Empty => Transition::stay(Prompt::Skills),
                Selection::Other => advance(profile.clone(), AwaitingSkillsManual, now),
                Selection::Tags(tags) => {
                    let mut next = profile.clone();
                    next.skills = Some(tags);
                    advance(next, AwaitingPosition, now)
                }
            }
        }

        (AwaitingSkillsManual, StepInput::Text(text)) => match split_list(text) {
            Some(skills) => {
                let mut next = profile.clone();
                next.skills = Some(skills);
                advance(next, AwaitingPosition, now)
            }
            None => Transition::stay(Prompt::SkillsManual),
        },

        (AwaitingPosition, StepInput::Selection { menu, values })
            if menu == ids::SELECT_POSITION =>
        {
            match validate_selection(values, POSITION_TAGS, MAX_POSITIONS) {
                Selection::Invalid => {
                    Transition::stay_with(Notice::Unrecognized, Prompt::Position)
                }
                Selection::Empty => Transition::stay(Prompt::Position),
                Selection::Other => advance(profile.clone(), AwaitingPositionManual, now),
                Selection::Tags(tags) => {
                    let mut next = profile.clone();
                    next.position_interest = Some(tags);
                    advance(next, AwaitingResumeDescription, now)
                }
            }
        }

        (AwaitingPositionManual, StepInput::Text(text)) => match split_list(text) {
            Some(positions) => {
                let mut next = profile.clone();
                next.position_interest = Some(positions);
                advance(next, AwaitingResumeDescription, now)
            }
            None => Transition::stay(Prompt::PositionManual),
        },

        (AwaitingResumeDescription, StepInput::Text(text)) => {
            let mut next = profile.clone();
            next.resume_description = Some(text.clone());
            advance(next, Complete, now)
        }
        (AwaitingResumeDescription, StepInput::Button(id)) if id == ids::SKIP_DESCRIPTION => {
            let mut next = profile.clone();
            next.resume_description = Some(String::new());
            advance(next, Complete, now)
        }

        (AwaitingResumeFile, StepInput::Upload(attachment)) => {
            if is_document(&attachment.file_name) {
                Transition::IngestResume(attachment.clone())
            } else {
                Transition::stay_with(
                    Notice::WrongFileType {
                        file_name: attachment.file_name.clone(),
                    },
                    Prompt::ResumeFile,
                )
            }
        }
        (AwaitingResumeFile, StepInput::Text(_)) => {
            Transition::stay_with(Notice::MissingAttachment, Prompt::ResumeFile)
        }

        (step, StepInput::Upload(_)) => match Prompt::for_step(step) {
            Some(prompt) => Transition::stay_with(Notice::FileNotExpected, prompt),
            None => Transition::Ignored,
        },

        // Typing while a menu or button question is open re-shows it.
        (step @ (AwaitingResumeChoice | AwaitingSkills | AwaitingPosition), StepInput::Text(_)) => {
            match Prompt::for_step(step) {
                Some(prompt) => Transition::stay(prompt),
                None => Transition::Ignored,
            }
        }

        // Known component, wrong step: a stale or double-pressed control.
        _ => Transition::Ignored,
    }
}

/// Finish the resume branch once the document text (and optionally the
/// extracted fields) are available.
///
/// Returns `Ignored` when the profile is no longer waiting for a file, so a
/// late result never rewinds a flow that moved on.
pub fn complete_resume(
    profile: &Profile,
    resume_text: &str,
    fields: Option<&ResumeFields>,
    now: DateTime<Utc>,
) -> Transition {
    if profile.step != OnboardingStep::AwaitingResumeFile {
        return Transition::Ignored;
    }
    let resume_text = resume_text.trim();
    if resume_text.is_empty() {
        return Transition::stay_with(Notice::ResumeUnreadable, Prompt::ResumeFile);
    }

    let mut next = profile.clone();
    next.resume_text = Some(resume_text.to_string());
    if let Some(fields) = fields {
        backfill(&mut next, fields);
    }
    advance(next, OnboardingStep::Complete, now)
}

/// Copy extracted values into fields that are still absent. Returns whether
/// anything was filled.
pub fn backfill(profile: &mut Profile, fields: &ResumeFields) -> bool {
    let mut filled = false;

    if profile.name.is_none() {
        if let Some(name) = fields.name.as_deref().map(str::trim).filter(|n| !n.is_empty()) {
            profile.name = Some(name.to_string());
            filled = true;
        }
    }
    if profile.email.is_none() {
        if let Some(email) = fields.email.as_deref().map(str::trim).filter(|e| is_valid_email(e)) {
            profile.email = Some(email.to_string());
            filled = true;
        }
    }
    if profile.skills.is_none() {
        if let Some(skills) = clean_list(&fields.skills) {
            profile.skills = Some(skills);
            filled = true;
        }
    }
    if profile.position_interest.is_none() {
        if let Some(positions) = clean_list(&fields.position_interest) {
            profile.position_interest = Some(positions);
            filled = true;
        }
    }

    filled
}

fn advance(mut profile: Profile, step: OnboardingStep, now: DateTime<Utc>) -> Transition {
    debug_assert!(profile.step.can_transition_to(step), "{} -> {step}", profile.step);
    profile.step = step;
    profile.updated_at = now;
    if step.is_terminal() {
        profile.completed_at = Some(now);
    }
    let prompt = Prompt::for_step(step).unwrap_or(Prompt::Completed);
    Transition::Advance {
        profile: Box::new(profile),
        prompt,
    }
}

fn component_id(input: &StepInput) -> Option<&str> {
    match input {
        StepInput::Button(id) => Some(id),
        StepInput::Selection { menu, .. } => Some(menu),
        _ => None,
    }
}

enum Selection {
    /// A value outside the vocabulary or too many values.
    Invalid,
    Empty,
    Other,
    Tags(Vec<String>),
}

fn validate_selection(values: &[String], vocabulary: &[(&str, &str)], max: usize) -> Selection {
    if values.is_empty() {
        return Selection::Empty;
    }
    if values.len() > max
        || values
            .iter()
            .any(|v| !vocabulary.iter().any(|(tag, _)| tag == v))
    {
        return Selection::Invalid;
    }
    if values.iter().any(|v| v == ids::OTHER) {
        return Selection::Other;
    }
    let mut tags: Vec<String> = Vec::with_capacity(values.len());
    for value in values {
        if !tags.contains(value) {
            tags.push(value.clone());
        }
    }
    Selection::Tags(tags)
}

/// Split free text on commas. `None` when nothing usable remains.
fn split_list(text: &str) -> Option<Vec<String>> {
    let items: Vec<String> = text.split(',').map(str::to_string).collect();
    clean_list(&items)
}

fn clean_list(items: &[String]) -> Option<Vec<String>> {
    let cleaned: Vec<String> = items
        .iter()
        .map(|s| s.trim())
        .filter(|s| !s.is_empty() && !s.eq_ignore_ascii_case(ids::OTHER))
        .map(str::to_string)
        .collect();
    (!cleaned.is_empty()).then_some(cleaned)
}
