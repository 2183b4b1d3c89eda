//! Profile data model collected during onboarding.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::state::OnboardingStep;

/// Answer to "Do you have a resume?".
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ResumeChoice {
    #[default]
    Unknown,
    Yes,
    No,
}

impl ResumeChoice {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Unknown => "unknown",
            Self::Yes => "yes",
            Self::No => "no",
        }
    }

    pub fn parse(s: &str) -> Self {
        match s {
            "yes" => Self::Yes,
            "no" => Self::No,
            _ => Self::Unknown,
        }
    }
}

/// One user's onboarding record.
///
/// Optional fields stay `None` until the step that collects them accepts an
/// answer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Profile {
    pub user_id: String,
    /// Identifies one pass through the flow. Regenerated on every start so
    /// results computed for an older pass can be recognised and dropped.
    pub flow_id: Uuid,
    pub step: OnboardingStep,
    pub has_resume: ResumeChoice,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub skills: Option<Vec<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub position_interest: Option<Vec<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub resume_text: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub resume_description: Option<String>,
    /// Platform id of the last event committed for this user.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_event_id: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub completed_at: Option<DateTime<Utc>>,
}

impl Profile {
    /// A fresh profile positioned at the resume question.
    pub fn new(user_id: &str) -> Self {
        let now = Utc::now();
        Self {
            user_id: user_id.to_string(),
            flow_id: Uuid::new_v4(),
            step: OnboardingStep::AwaitingResumeChoice,
            has_resume: ResumeChoice::Unknown,
            name: None,
            email: None,
            skills: None,
            position_interest: None,
            resume_text: None,
            resume_description: None,
            last_event_id: None,
            created_at: now,
            updated_at: now,
            completed_at: None,
        }
    }

    pub fn is_complete(&self) -> bool {
        self.step.is_terminal()
    }

    /// Keyword query used for opportunity matching, or `None` while skills or
    /// position interest are still missing.
    pub fn match_keywords(&self) -> Option<String> {
        let skills = non_empty(self.skills.as_deref())?;
        let positions = non_empty(self.position_interest.as_deref())?;
        Some(
            skills
                .iter()
                .chain(positions.iter())
                .map(String::as_str)
                .collect::<Vec<_>>()
                .join(" "),
        )
    }

    /// Render every set field as a Markdown summary for the "view profile"
    /// action.
    pub fn to_summary(&self) -> String {
        let mut parts = vec!["**Your Profile**".to_string()];

        if let Some(ref name) = self.name {
            parts.push(format!("**Name:** {name}"));
        }
        if let Some(ref email) = self.email {
            parts.push(format!("**Email:** {email}"));
        }
        if let Some(skills) = non_empty(self.skills.as_deref()) {
            parts.push(format!("**Skills:** {}", skills.join(", ")));
        }
        if let Some(positions) = non_empty(self.position_interest.as_deref()) {
            parts.push(format!("**Career Interest:** {}", positions.join(", ")));
        }
        if let Some(ref description) = self.resume_description {
            if !description.trim().is_empty() {
                parts.push(format!("**CV:** {description}"));
            }
        }
        if let Some(ref text) = self.resume_text {
            parts.push(format!("**Resume:** uploaded ({} characters)", text.chars().count()));
        }

        let status = if self.is_complete() {
            "complete".to_string()
        } else {
            format!("in progress ({})", self.step)
        };
        parts.push(format!("**Status:** {status}"));

        parts.join("\n")
    }
}

fn non_empty(values: Option<&[String]>) -> Option<&[String]> {
    values.filter(|v| v.iter().any(|s| !s.trim().is_empty()))
}

/// Structured fields recovered from a resume by the extraction adapter.
/// Every field is optional; only present values are merged.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResumeFields {
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub skills: Vec<String>,
    #[serde(default, alias = "position", alias = "positions")]
    pub position_interest: Vec<String>,
}

impl ResumeFields {
    pub fn is_empty(&self) -> bool {
        self.name.is_none()
            && self.email.is_none()
            && self.skills.is_empty()
            && self.position_interest.is_empty()
    }
}
