//! OnboardingManager: coordinates the step engine, persistence and the
//! external adapters.
//!
//! Every read-modify-write of a profile happens under that user's lock.
//! Adapter calls for the resume branch run *outside* the lock and are
//! re-validated against the stored profile (same flow, same step) before
//! their result is committed, so a restart while a download or extraction
//! is in flight simply drops the late result.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use chrono::Utc;
use tokio::sync::OwnedMutexGuard;
use uuid::Uuid;

use crate::channels::{Attachment, ChatScope, OutgoingResponse};
use crate::error::{AdapterError, with_timeout};
use crate::llm::{ChatMessage, CompletionRequest, LlmProvider};
use crate::opportunities::OpportunitySearch;
use crate::resume::DocumentSource;
use crate::router::Command;
use crate::store::{Database, Feedback};

use super::engine::{self, StepInput, Transition};
use super::extraction::extract_resume_fields;
use super::model::Profile;
use super::prompts::{Notice, Prompt, main_menu, profile_notice};
use super::state::OnboardingStep;

/// Delivered opportunities listed under the profile summary.
const RECENT_DELIVERIES: usize = 5;

// ── Per-user locking ────────────────────────────────────────────────

/// One async mutex per user id. Entries are dropped once nobody holds or
/// waits on them.
#[derive(Default)]
pub struct UserLocks {
    inner: Mutex<HashMap<String, Arc<tokio::sync::Mutex<()>>>>,
}

/// Held while a user's profile is being read and written.
pub struct UserGuard<'a> {
    locks: &'a UserLocks,
    user_id: String,
    guard: Option<OwnedMutexGuard<()>>,
}

impl UserLocks {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn lock(&self, user_id: &str) -> UserGuard<'_> {
        let mutex = {
            let mut map = self.inner.lock().unwrap_or_else(|e| e.into_inner());
            Arc::clone(map.entry(user_id.to_string()).or_default())
        };
        let guard = mutex.lock_owned().await;
        UserGuard {
            locks: self,
            user_id: user_id.to_string(),
            guard: Some(guard),
        }
    }

    /// Number of users with a live lock entry.
    #[cfg(test)]
    fn active(&self) -> usize {
        self.inner.lock().unwrap_or_else(|e| e.into_inner()).len()
    }
}

impl Drop for UserGuard<'_> {
    fn drop(&mut self) {
        drop(self.guard.take());
        let mut map = self.locks.inner.lock().unwrap_or_else(|e| e.into_inner());
        if map
            .get(&self.user_id)
            .is_some_and(|m| Arc::strong_count(m) == 1)
        {
            map.remove(&self.user_id);
        }
    }
}

// ── Outcomes ────────────────────────────────────────────────────────

/// Where a reply goes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Delivery {
    /// The conversation the event came from.
    InPlace,
    /// The user's private conversation.
    Direct,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Reply {
    pub delivery: Delivery,
    pub response: OutgoingResponse,
}

impl Reply {
    fn here(response: OutgoingResponse) -> Self {
        Self {
            delivery: Delivery::InPlace,
            response,
        }
    }

    fn direct(response: OutgoingResponse) -> Self {
        Self {
            delivery: Delivery::Direct,
            response,
        }
    }
}

/// Work to run after the immediate replies have been sent.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Deferred {
    IngestResume {
        user_id: String,
        flow_id: Uuid,
        event_id: String,
        attachment: Attachment,
    },
    Match {
        user_id: String,
    },
}

/// Replies for one event plus any follow-up work.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Outcome {
    pub replies: Vec<Reply>,
    pub deferred: Option<Deferred>,
}

impl Outcome {
    pub fn none() -> Self {
        Self::default()
    }

    pub fn notice(notice: Notice) -> Self {
        Self::reply(notice.render())
    }

    fn reply(response: OutgoingResponse) -> Self {
        Self {
            replies: vec![Reply::here(response)],
            deferred: None,
        }
    }

    fn push(&mut self, response: OutgoingResponse) {
        self.replies.push(Reply::here(response));
    }

    /// Send every reply to the user's private conversation instead.
    fn into_direct(mut self) -> Self {
        for reply in &mut self.replies {
            reply.delivery = Delivery::Direct;
        }
        self
    }

    /// Rendered text of every reply, in order.
    pub fn texts(&self) -> Vec<&str> {
        self.replies
            .iter()
            .map(|r| r.response.content.as_str())
            .collect()
    }
}

// ── Manager ─────────────────────────────────────────────────────────

/// External collaborators used by the manager.
pub struct OnboardingDeps {
    pub db: Arc<dyn Database>,
    /// `None` disables `ask` and resume backfill.
    pub llm: Option<Arc<dyn LlmProvider>>,
    pub search: Arc<dyn OpportunitySearch>,
    pub documents: Arc<dyn DocumentSource>,
}

/// Coordinates onboarding: per-user locking, engine transitions,
/// persistence and adapter calls.
pub struct OnboardingManager {
    deps: OnboardingDeps,
    locks: UserLocks,
    adapter_timeout: Duration,
    ask_prompt: String,
}

impl OnboardingManager {
    pub fn new(
        deps: OnboardingDeps,
        adapter_timeout: Duration,
        ask_prompt: impl Into<String>,
    ) -> Self {
        Self {
            deps,
            locks: UserLocks::new(),
            adapter_timeout,
            ask_prompt: ask_prompt.into(),
        }
    }

    /// Load a profile for read-only use (REST, view).
    pub async fn profile(
        &self,
        user_id: &str,
    ) -> Result<Option<Profile>, crate::error::DatabaseError> {
        self.deps.db.get_profile(user_id).await
    }

    // ── Commands ────────────────────────────────────────────────────

    /// Run a global command. `Clean` is a channel operation and yields no
    /// outcome here. Commands that touch the user's own profile answer in
    /// private when invoked from a group.
    pub async fn handle_command(
        &self,
        user_id: &str,
        event_id: &str,
        scope: ChatScope,
        command: Command,
        max_message_length: usize,
    ) -> Outcome {
        let private = scope == ChatScope::Group
            && matches!(
                command,
                Command::Fetch
                    | Command::ViewProfile
                    | Command::DeleteProfile
                    | Command::Feedback { .. }
            );

        let outcome = match command {
            Command::Status => Outcome::notice(Notice::Status),
            Command::Start => self.start(user_id, event_id, scope).await,
            Command::Ask(None) | Command::AskHint if self.deps.llm.is_none() => {
                Outcome::notice(Notice::AskUnavailable)
            }
            Command::Ask(None) => Outcome::notice(Notice::AskUsage),
            Command::AskHint => Outcome::notice(Notice::AskHint),
            Command::Ask(Some(question)) => self.ask(&question, max_message_length).await,
            Command::Fetch => self.match_opportunities(user_id).await,
            Command::ViewProfile => self.view(user_id).await,
            Command::DeleteProfile => self.delete(user_id).await,
            Command::Feedback { stars, text } => self.feedback(user_id, stars, &text).await,
            Command::Clean(_) => Outcome::none(),
        };

        if private { outcome.into_direct() } else { outcome }
    }

    /// Create or reset the user's profile and ask the first question.
    pub async fn start(&self, user_id: &str, event_id: &str, scope: ChatScope) -> Outcome {
        let _guard = self.locks.lock(user_id).await;

        match self.deps.db.get_profile(user_id).await {
            Ok(Some(existing)) if existing.last_event_id.as_deref() == Some(event_id) => {
                tracing::debug!(user_id, event_id, "Duplicate start ignored");
                return Outcome::none();
            }
            Ok(_) => {}
            Err(e) => {
                tracing::warn!(user_id, "Failed to load profile on start: {e}");
            }
        }

        let mut profile = Profile::new(user_id);
        profile.last_event_id = Some(event_id.to_string());
        if let Err(e) = self.deps.db.upsert_profile(&profile).await {
            tracing::warn!(user_id, "Failed to create profile: {e}");
            return Outcome::notice(Notice::PersistenceFailure);
        }
        tracing::info!(user_id, flow_id = %profile.flow_id, "Onboarding started");

        let first = Prompt::ResumeChoice.render();
        match scope {
            ChatScope::Direct => Outcome {
                replies: vec![Reply::here(Notice::Welcome.render()), Reply::here(first)],
                deferred: None,
            },
            ChatScope::Group => Outcome {
                replies: vec![
                    Reply::here(Notice::CheckDirectMessages.render().with_buttons(main_menu())),
                    Reply::direct(Notice::Welcome.render()),
                    Reply::direct(first),
                ],
                deferred: None,
            },
        }
    }

    // ── Step input ──────────────────────────────────────────────────

    /// Feed one normalized answer to the engine and commit the result.
    pub async fn handle_step(&self, user_id: &str, event_id: &str, input: StepInput) -> Outcome {
        let _guard = self.locks.lock(user_id).await;

        let profile = match self.deps.db.get_profile(user_id).await {
            Ok(Some(profile)) => profile,
            Ok(None) => Profile {
                step: OnboardingStep::Idle,
                ..Profile::new(user_id)
            },
            Err(e) => {
                tracing::warn!(user_id, "Failed to load profile: {e}");
                return Outcome::notice(Notice::PersistenceFailure);
            }
        };

        if profile.last_event_id.as_deref() == Some(event_id) {
            tracing::debug!(user_id, event_id, "Duplicate event ignored");
            return Outcome::none();
        }

        match engine::apply(&profile, &input, Utc::now()) {
            Transition::Advance { profile: next, prompt } => {
                self.commit(*next, event_id, prompt).await
            }
            Transition::Stay { notice, prompt } => stay(notice, prompt),
            Transition::IngestResume(attachment) => {
                tracing::info!(user_id, file = %attachment.file_name, "Resume received");
                Outcome {
                    replies: vec![Reply::here(Notice::ReadingResume.render())],
                    deferred: Some(Deferred::IngestResume {
                        user_id: user_id.to_string(),
                        flow_id: profile.flow_id,
                        event_id: event_id.to_string(),
                        attachment,
                    }),
                }
            }
            Transition::Unrecognized => {
                tracing::debug!(user_id, ?input, "Unrecognized interaction");
                Outcome::notice(Notice::Unrecognized)
            }
            Transition::Ignored => Outcome::none(),
        }
    }

    async fn save(&self, next: &mut Profile, event_id: &str) -> bool {
        next.last_event_id = Some(event_id.to_string());
        match self.deps.db.upsert_profile(next).await {
            Ok(()) => {
                tracing::info!(user_id = %next.user_id, step = %next.step, "Onboarding advanced");
                true
            }
            Err(e) => {
                tracing::warn!(
                    user_id = %next.user_id,
                    step = %next.step,
                    "Failed to save profile: {e}"
                );
                false
            }
        }
    }

    async fn commit(&self, mut next: Profile, event_id: &str, prompt: Prompt) -> Outcome {
        if !self.save(&mut next, event_id).await {
            return Outcome::notice(Notice::PersistenceFailure);
        }
        Outcome::reply(prompt.render())
    }

    // ── Deferred work ───────────────────────────────────────────────

    pub async fn run_deferred(&self, deferred: Deferred) -> Outcome {
        match deferred {
            Deferred::IngestResume {
                user_id,
                flow_id,
                event_id,
                attachment,
            } => {
                self.ingest_resume(&user_id, flow_id, &event_id, &attachment)
                    .await
            }
            Deferred::Match { user_id } => self.match_opportunities(&user_id).await,
        }
    }

    async fn ingest_resume(
        &self,
        user_id: &str,
        flow_id: Uuid,
        event_id: &str,
        attachment: &Attachment,
    ) -> Outcome {
        let read = with_timeout(
            "document_reader",
            self.adapter_timeout,
            self.deps.documents.read_text(attachment),
        )
        .await;

        if let Err(ref e) = read {
            tracing::warn!(user_id, file = %attachment.file_name, "Resume read failed: {e}");
        }

        let fields = match (&read, &self.deps.llm) {
            (Ok(text), Some(llm)) if !text.trim().is_empty() => {
                let extracted = with_timeout("resume_extraction", self.adapter_timeout, async {
                    extract_resume_fields(llm.as_ref(), text)
                        .await
                        .map_err(AdapterError::from)
                })
                .await;
                match extracted {
                    Ok(Some(fields)) if fields.is_empty() => {
                        tracing::debug!(user_id, "Resume extraction found no fields");
                        None
                    }
                    Ok(fields) => fields,
                    Err(e) => {
                        tracing::warn!(user_id, "Resume extraction failed: {e}");
                        None
                    }
                }
            }
            _ => None,
        };

        let _guard = self.locks.lock(user_id).await;
        let profile = match self.deps.db.get_profile(user_id).await {
            Ok(Some(p))
                if p.flow_id == flow_id && p.step == OnboardingStep::AwaitingResumeFile =>
            {
                p
            }
            Ok(_) => {
                tracing::info!(user_id, "Dropping stale resume result");
                return Outcome::none();
            }
            Err(e) => {
                tracing::warn!(user_id, "Failed to reload profile: {e}");
                return Outcome::notice(Notice::PersistenceFailure);
            }
        };

        let text = match read {
            Ok(text) => text,
            Err(AdapterError::Extraction { .. } | AdapterError::UnsupportedDocument { .. }) => {
                return stay(Some(Notice::ResumeUnreadable), Prompt::ResumeFile);
            }
            Err(_) => return stay(Some(Notice::TransientFailure), Prompt::ResumeFile),
        };

        match engine::complete_resume(&profile, &text, fields.as_ref(), Utc::now()) {
            Transition::Advance { profile: next, prompt } => {
                let mut next = *next;
                let backfilled = next.name != profile.name
                    || next.email != profile.email
                    || next.skills != profile.skills
                    || next.position_interest != profile.position_interest;
                if !self.save(&mut next, event_id).await {
                    return Outcome::notice(Notice::PersistenceFailure);
                }
                Outcome {
                    replies: vec![
                        Reply::here(Notice::ResumeSaved { backfilled }.render()),
                        Reply::here(prompt.render()),
                    ],
                    deferred: next.match_keywords().map(|_| Deferred::Match {
                        user_id: user_id.to_string(),
                    }),
                }
            }
            Transition::Stay { notice, prompt } => stay(notice, prompt),
            _ => Outcome::none(),
        }
    }

    // ── Matching ────────────────────────────────────────────────────

    /// Search for opportunities matching the profile and return the ones not
    /// yet delivered to this user.
    pub async fn match_opportunities(&self, user_id: &str) -> Outcome {
        let keywords = match self.deps.db.get_profile(user_id).await {
            Ok(profile) => profile.and_then(|p| p.match_keywords()),
            Err(e) => {
                tracing::warn!(user_id, "Failed to load profile for matching: {e}");
                return Outcome::notice(Notice::TransientFailure);
            }
        };
        let Some(keywords) = keywords else {
            return Outcome::notice(Notice::ProfileIncomplete);
        };

        let found = match with_timeout(
            "opportunity_search",
            self.adapter_timeout,
            self.deps.search.search(&keywords),
        )
        .await
        {
            Ok(found) => found,
            Err(e) => {
                tracing::warn!(user_id, "Opportunity search failed: {e}");
                return Outcome::notice(Notice::TransientFailure);
            }
        };

        if found.is_empty() {
            return Outcome::notice(Notice::NoOpportunities);
        }

        let mut fresh = Vec::new();
        for op in found {
            match self.deps.db.is_opportunity_delivered(user_id, &op.id).await {
                Ok(true) => continue,
                Ok(false) => fresh.push(op),
                Err(e) => {
                    tracing::warn!(user_id, opportunity = %op.id, "Delivery check failed: {e}");
                    fresh.push(op);
                }
            }
        }

        if fresh.is_empty() {
            return Outcome::notice(Notice::NoNewOpportunities);
        }

        tracing::info!(user_id, count = fresh.len(), "Delivering opportunities");
        let mut outcome = Outcome::notice(Notice::OpportunitiesFound(fresh.len()));
        for op in &fresh {
            if let Err(e) = self.deps.db.record_delivered_opportunity(user_id, op).await {
                tracing::warn!(user_id, opportunity = %op.id, "Failed to record delivery: {e}");
            }
            outcome.push(op.to_response());
        }
        outcome
    }

    // ── Other commands ──────────────────────────────────────────────

    async fn ask(&self, question: &str, max_message_length: usize) -> Outcome {
        let Some(ref llm) = self.deps.llm else {
            return Outcome::notice(Notice::AskUnavailable);
        };

        let request = CompletionRequest::new(vec![
            ChatMessage::system(self.ask_prompt.clone()),
            ChatMessage::user(question),
        ])
        .with_max_tokens(1024);

        let answer = with_timeout("chat_completion", self.adapter_timeout, async {
            llm.complete(request).await.map_err(AdapterError::from)
        })
        .await;

        match answer {
            Ok(response) => Outcome::reply(
                Notice::Answer(response.content)
                    .render()
                    .truncated(max_message_length),
            ),
            Err(e) => {
                tracing::warn!("Ask failed: {e}");
                Outcome::notice(Notice::TransientFailure)
            }
        }
    }

    async fn view(&self, user_id: &str) -> Outcome {
        match self.deps.db.get_profile(user_id).await {
            Ok(Some(profile)) => {
                let mut outcome = Outcome::notice(profile_notice(&profile));
                match self.deps.db.list_delivered_opportunities(user_id).await {
                    Ok(delivered) if !delivered.is_empty() => {
                        let recent = delivered
                            .into_iter()
                            .take(RECENT_DELIVERIES)
                            .map(|d| (d.title, d.company))
                            .collect();
                        outcome.push(Notice::RecentOpportunities(recent).render());
                    }
                    Ok(_) => {}
                    Err(e) => tracing::warn!(user_id, "Failed to list deliveries: {e}"),
                }
                outcome
            }
            Ok(None) => Outcome::notice(Notice::NoProfile),
            Err(e) => {
                tracing::warn!(user_id, "Failed to load profile: {e}");
                Outcome::notice(Notice::TransientFailure)
            }
        }
    }

    async fn delete(&self, user_id: &str) -> Outcome {
        let _guard = self.locks.lock(user_id).await;
        match self.deps.db.delete_profile(user_id).await {
            Ok(true) => {
                tracing::info!(user_id, "Profile deleted");
                Outcome::notice(Notice::Deleted)
            }
            Ok(false) => Outcome::notice(Notice::NothingToDelete),
            Err(e) => {
                tracing::warn!(user_id, "Failed to delete profile: {e}");
                Outcome::notice(Notice::PersistenceFailure)
            }
        }
    }

    async fn feedback(&self, user_id: &str, stars: Option<u8>, text: &str) -> Outcome {
        if text.trim().is_empty() {
            return Outcome::notice(Notice::FeedbackUsage);
        }
        match self
            .deps
            .db
            .insert_feedback(&Feedback::new(user_id, stars, text.trim()))
            .await
        {
            Ok(()) => Outcome::notice(Notice::FeedbackThanks),
            Err(e) => {
                tracing::warn!(user_id, "Failed to store feedback: {e}");
                Outcome::notice(Notice::PersistenceFailure)
            }
        }
    }
}

fn stay(notice: Option<Notice>, prompt: Prompt) -> Outcome {
    let mut outcome = Outcome::none();
    if let Some(notice) = notice {
        outcome.push(notice.render());
    }
    outcome.push(prompt.render());
    outcome
}
