//! Onboarding state machine: which question is pending for a user.

use serde::{Deserialize, Serialize};

/// The steps of the onboarding conversation.
///
/// Two branches leave `AwaitingResumeChoice`: the resume branch jumps
/// straight to `AwaitingResumeFile`; the manual branch walks email → name →
/// skills → position → resume description. The `*Manual` steps are the
/// free-text fallbacks for the "other" menu option and rejoin the menu path.
///
/// `Idle` is never persisted: a user without a profile row is idle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OnboardingStep {
    Idle,
    AwaitingResumeChoice,
    AwaitingEmail,
    AwaitingName,
    AwaitingSkills,
    AwaitingSkillsManual,
    AwaitingPosition,
    AwaitingPositionManual,
    AwaitingResumeDescription,
    AwaitingResumeFile,
    Complete,
}

impl OnboardingStep {
    pub const ALL: [OnboardingStep; 11] = [
        Self::Idle,
        Self::AwaitingResumeChoice,
        Self::AwaitingEmail,
        Self::AwaitingName,
        Self::AwaitingSkills,
        Self::AwaitingSkillsManual,
        Self::AwaitingPosition,
        Self::AwaitingPositionManual,
        Self::AwaitingResumeDescription,
        Self::AwaitingResumeFile,
        Self::Complete,
    ];

    /// Check if a transition from `self` to `target` appears in the
    /// transition table. Restarting is handled outside the table.
    pub fn can_transition_to(&self, target: OnboardingStep) -> bool {
        use OnboardingStep::*;
        matches!(
            (self, target),
            (Idle, AwaitingResumeChoice)
                | (AwaitingResumeChoice, AwaitingResumeFile)
                | (AwaitingResumeChoice, AwaitingEmail)
                | (AwaitingEmail, AwaitingName)
                | (AwaitingName, AwaitingSkills)
                | (AwaitingSkills, AwaitingSkillsManual)
                | (AwaitingSkills, AwaitingPosition)
                | (AwaitingSkillsManual, AwaitingPosition)
                | (AwaitingPosition, AwaitingPositionManual)
                | (AwaitingPosition, AwaitingResumeDescription)
                | (AwaitingPositionManual, AwaitingResumeDescription)
                | (AwaitingResumeDescription, Complete)
                | (AwaitingResumeFile, Complete)
        )
    }

    /// Whether this step is terminal (onboarding is done).
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Complete)
    }

    /// Whether answers typed as plain text are meaningful in this step.
    pub fn expects_text(&self) -> bool {
        matches!(
            self,
            Self::AwaitingEmail
                | Self::AwaitingName
                | Self::AwaitingSkillsManual
                | Self::AwaitingPositionManual
                | Self::AwaitingResumeDescription
        )
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Idle => "idle",
            Self::AwaitingResumeChoice => "awaiting_resume_choice",
            Self::AwaitingEmail => "awaiting_email",
            Self::AwaitingName => "awaiting_name",
            Self::AwaitingSkills => "awaiting_skills",
            Self::AwaitingSkillsManual => "awaiting_skills_manual",
            Self::AwaitingPosition => "awaiting_position",
            Self::AwaitingPositionManual => "awaiting_position_manual",
            Self::AwaitingResumeDescription => "awaiting_resume_description",
            Self::AwaitingResumeFile => "awaiting_resume_file",
            Self::Complete => "complete",
        }
    }
}

impl Default for OnboardingStep {
    fn default() -> Self {
        Self::Idle
    }
}

impl std::fmt::Display for OnboardingStep {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for OnboardingStep {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|step| step.as_str() == s)
            .ok_or_else(|| format!("unknown onboarding step: {s}"))
    }
}
