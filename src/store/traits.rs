//! `Database` trait: single async interface for all persistence.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::error::DatabaseError;
use crate::onboarding::model::Profile;
use crate::opportunities::Opportunity;

/// An opportunity already shown to a user.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeliveredOpportunity {
    pub user_id: String,
    pub opportunity_id: String,
    pub title: String,
    pub company: String,
    pub url: Option<String>,
    pub delivered_at: DateTime<Utc>,
}

/// Free-form feedback left with the `feedback` command.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Feedback {
    pub id: Uuid,
    pub user_id: String,
    /// 1–5 when given.
    pub stars: Option<u8>,
    pub text: String,
    pub created_at: DateTime<Utc>,
}

impl Feedback {
    pub fn new(user_id: &str, stars: Option<u8>, text: &str) -> Self {
        Self {
            id: Uuid::new_v4(),
            user_id: user_id.to_string(),
            stars,
            text: text.to_string(),
            created_at: Utc::now(),
        }
    }
}

/// Backend-agnostic database trait covering profiles, delivery tracking and
/// feedback.
#[async_trait]
pub trait Database: Send + Sync {
    /// Run all pending schema migrations.
    async fn run_migrations(&self) -> Result<(), DatabaseError>;

    // ── Profiles ────────────────────────────────────────────────────

    /// Load a user's profile. `None` means the user is idle.
    async fn get_profile(&self, user_id: &str) -> Result<Option<Profile>, DatabaseError>;

    /// Insert or replace the single row for `profile.user_id`.
    async fn upsert_profile(&self, profile: &Profile) -> Result<(), DatabaseError>;

    /// Remove a profile. Returns whether a row existed.
    async fn delete_profile(&self, user_id: &str) -> Result<bool, DatabaseError>;

    // ── Delivered opportunities ─────────────────────────────────────

    async fn is_opportunity_delivered(
        &self,
        user_id: &str,
        opportunity_id: &str,
    ) -> Result<bool, DatabaseError>;

    /// Remember that `opportunity` was shown to `user_id`. Repeats are no-ops.
    async fn record_delivered_opportunity(
        &self,
        user_id: &str,
        opportunity: &Opportunity,
    ) -> Result<(), DatabaseError>;

    /// Deliveries for a user, most recent first.
    async fn list_delivered_opportunities(
        &self,
        user_id: &str,
    ) -> Result<Vec<DeliveredOpportunity>, DatabaseError>;

    // ── Feedback ────────────────────────────────────────────────────

    async fn insert_feedback(&self, feedback: &Feedback) -> Result<(), DatabaseError>;
}
