//! End-to-end onboarding tests.
//!
//! Events go through the real router, manager and channel manager; the
//! channel records what would have been sent, the store is in-memory and
//! the opportunity search is stubbed.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;

use jobify_bot::bot::handle_event;
use jobify_bot::channels::{
    Attachment, AttachmentSource, Channel, ChannelManager, ChatScope, IncomingMessage, Interaction,
    MessageStream, OutgoingResponse,
};
use jobify_bot::error::{AdapterError, ChannelError};
use jobify_bot::onboarding::prompts::ids;
use jobify_bot::onboarding::{OnboardingDeps, OnboardingManager, OnboardingStep};
use jobify_bot::opportunities::{Opportunity, OpportunitySearch};
use jobify_bot::resume::DocumentReader;
use jobify_bot::store::{Database, LibSqlBackend};

#[derive(Debug, Clone)]
struct Sent {
    direct: bool,
    response: OutgoingResponse,
}

/// Channel that records every outgoing response.
#[derive(Clone, Default)]
struct RecordingChannel {
    sent: Arc<Mutex<Vec<Sent>>>,
}

impl RecordingChannel {
    fn take(&self) -> Vec<Sent> {
        std::mem::take(&mut *self.sent.lock().unwrap())
    }
}

#[async_trait]
impl Channel for RecordingChannel {
    fn name(&self) -> &str {
        "test"
    }

    async fn start(&self) -> Result<MessageStream, ChannelError> {
        Ok(Box::pin(futures::stream::empty()))
    }

    async fn respond(
        &self,
        _msg: &IncomingMessage,
        response: OutgoingResponse,
    ) -> Result<(), ChannelError> {
        self.sent.lock().unwrap().push(Sent { direct: false, response });
        Ok(())
    }

    async fn send_direct(
        &self,
        _user_id: &str,
        response: OutgoingResponse,
    ) -> Result<(), ChannelError> {
        self.sent.lock().unwrap().push(Sent { direct: true, response });
        Ok(())
    }

    async fn purge(&self, _msg: &IncomingMessage, limit: usize) -> Result<usize, ChannelError> {
        Ok(limit)
    }

    async fn health_check(&self) -> Result<(), ChannelError> {
        Ok(())
    }
}

struct StubSearch {
    calls: AtomicUsize,
}

#[async_trait]
impl OpportunitySearch for StubSearch {
    async fn search(&self, _keywords: &str) -> Result<Vec<Opportunity>, AdapterError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Ok(vec![Opportunity {
            id: "op-1".into(),
            title: "Backend Intern".into(),
            description: "Build APIs in Java".into(),
            company: "NovaTech".into(),
            job_type: "Type 1".into(),
            deadline: "2026-12-31".into(),
            url: Some("https://example.com/op-1".into()),
            wage: None,
            home_office: None,
            benefits: None,
            formal_requirements: None,
            technical_requirements: None,
            contact: None,
        }])
    }
}

struct Harness {
    manager: OnboardingManager,
    channels: ChannelManager,
    recorder: RecordingChannel,
    db: Arc<LibSqlBackend>,
    search: Arc<StubSearch>,
    next_event: AtomicUsize,
}

impl Harness {
    async fn new() -> Self {
        let db = Arc::new(LibSqlBackend::new_memory().await.unwrap());
        let search = Arc::new(StubSearch {
            calls: AtomicUsize::new(0),
        });
        let manager = OnboardingManager::new(
            OnboardingDeps {
                db: db.clone(),
                llm: None,
                search: search.clone(),
                documents: Arc::new(DocumentReader::new()),
            },
            Duration::from_secs(5),
            "be helpful",
        );
        let recorder = RecordingChannel::default();
        let mut channels = ChannelManager::new();
        channels.add(Box::new(recorder.clone()));
        Self {
            manager,
            channels,
            recorder,
            db,
            search,
            next_event: AtomicUsize::new(0),
        }
    }

    fn event(&self, content: &str) -> IncomingMessage {
        let n = self.next_event.fetch_add(1, Ordering::SeqCst);
        IncomingMessage::new("test", "u1", content).with_id(format!("evt-{n}"))
    }

    async fn send(&self, msg: IncomingMessage) -> Vec<Sent> {
        handle_event(&self.manager, &self.channels, msg).await;
        self.recorder.take()
    }

    async fn say(&self, text: &str) -> Vec<String> {
        contents(self.send(self.event(text)).await)
    }

    async fn click(&self, id: &str) -> Vec<String> {
        let msg = self.event("").with_interaction(Interaction::Button { id: id.into() });
        contents(self.send(msg).await)
    }

    async fn select(&self, menu: &str, values: &[&str]) -> Vec<String> {
        let msg = self.event("").with_interaction(Interaction::Select {
            menu_id: menu.into(),
            values: values.iter().map(|v| v.to_string()).collect(),
        });
        contents(self.send(msg).await)
    }

    async fn step(&self) -> OnboardingStep {
        self.db.get_profile("u1").await.unwrap().unwrap().step
    }
}

fn contents(sent: Vec<Sent>) -> Vec<String> {
    sent.into_iter().map(|s| s.response.content).collect()
}

#[tokio::test]
async fn manual_branch_end_to_end() {
    let h = Harness::new().await;

    let replies = h.say("/start").await;
    assert_eq!(replies.len(), 2);
    assert!(replies[1].contains("Do you have a resume"));

    let replies = h.click(ids::CV_NO).await;
    assert!(replies[0].contains("email address"));

    let replies = h.say("not-an-email").await;
    assert!(replies[0].contains("doesn't look like a valid email"));
    assert_eq!(h.step().await, OnboardingStep::AwaitingEmail);

    h.say("ada@example.com").await;
    let replies = h.say("Ada Lovelace").await;
    assert!(replies[0].contains("top skills"));

    let replies = h.select(ids::SELECT_SKILLS, &["java", "python"]).await;
    assert!(replies[0].contains("type of position"));

    let replies = h.select(ids::SELECT_POSITION, &["backend"]).await;
    assert!(replies[0].contains("describe your resume"));

    let replies = h.say("I build APIs").await;
    assert!(replies[0].contains("profile is complete"));

    let profile = h.db.get_profile("u1").await.unwrap().unwrap();
    assert_eq!(profile.step, OnboardingStep::Complete);
    assert_eq!(profile.email.as_deref(), Some("ada@example.com"));
    assert_eq!(profile.name.as_deref(), Some("Ada Lovelace"));
    assert_eq!(profile.skills, Some(vec!["java".to_string(), "python".to_string()]));
    assert_eq!(profile.position_interest, Some(vec!["backend".to_string()]));
    assert_eq!(profile.resume_description.as_deref(), Some("I build APIs"));
    assert!(profile.completed_at.is_some());

    // Text after completion is ignored.
    assert!(h.say("hello?").await.is_empty());

    let sent = h.send(h.event("!fetch")).await;
    assert_eq!(sent.len(), 2);
    assert!(sent[0].response.content.contains("Found 1 opportunity"));
    assert!(sent[1].response.card.is_some());

    let replies = h.say("!fetch").await;
    assert!(replies[0].contains("No new opportunities"));
    assert_eq!(h.search.calls.load(Ordering::SeqCst), 2);
}

#[tokio::test]
async fn skills_other_goes_to_manual_entry() {
    let h = Harness::new().await;
    h.say("/start").await;
    h.click(ids::CV_NO).await;
    h.say("ada@example.com").await;
    h.say("Ada").await;

    let replies = h.select(ids::SELECT_SKILLS, &[ids::OTHER]).await;
    assert!(replies[0].contains("type your skills manually"));
    assert_eq!(h.step().await, OnboardingStep::AwaitingSkillsManual);

    h.say("Rust, Go ,  ").await;
    let profile = h.db.get_profile("u1").await.unwrap().unwrap();
    assert_eq!(profile.skills, Some(vec!["Rust".to_string(), "Go".to_string()]));
    assert_eq!(profile.step, OnboardingStep::AwaitingPosition);
}

#[tokio::test]
async fn resume_branch_reads_uploaded_text_file() {
    let h = Harness::new().await;
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("resume.txt");
    std::fs::write(&path, "Ada Lovelace\nAnalytical engines\n").unwrap();

    h.say("/start").await;
    let replies = h.click(ids::CV_YES).await;
    assert!(replies[0].contains("upload your resume"));

    // Wrong step input first: plain text instead of a file.
    let replies = h.say("here it comes").await;
    assert!(replies[0].contains("waiting for your resume"));

    let wrong = h.event("").with_attachment(Attachment {
        file_name: "photo.png".into(),
        source: AttachmentSource::Path(path.clone()),
        size: None,
    });
    let replies = contents(h.send(wrong).await);
    assert!(replies[0].contains("not a supported document"));
    assert_eq!(h.step().await, OnboardingStep::AwaitingResumeFile);

    let upload = h.event("").with_attachment(Attachment {
        file_name: "resume.txt".into(),
        source: AttachmentSource::Path(path),
        size: None,
    });
    let replies = contents(h.send(upload).await);
    assert!(replies[0].contains("Reading your resume"));
    assert!(replies[1].contains("Resume received"));
    assert!(replies[2].contains("profile is complete"));

    let profile = h.db.get_profile("u1").await.unwrap().unwrap();
    assert_eq!(profile.step, OnboardingStep::Complete);
    assert_eq!(profile.resume_text.as_deref(), Some("Ada Lovelace\nAnalytical engines"));
    // No skills, so no automatic matching.
    assert_eq!(h.search.calls.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn fetch_before_completion_never_searches() {
    let h = Harness::new().await;
    let replies = h.say("!fetch").await;
    assert!(replies[0].contains("complete your profile"));
    h.say("/start").await;
    h.click(ids::MATCH_JOBS).await;
    assert_eq!(h.search.calls.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn group_start_opens_direct_conversation() {
    let h = Harness::new().await;
    let sent = h.send(h.event("!start").with_scope(ChatScope::Group)).await;
    let directs: Vec<bool> = sent.iter().map(|s| s.direct).collect();
    assert_eq!(directs, vec![false, true, true]);
    assert!(sent[0].response.content.contains("Check your DMs"));

    // Answers posted in the group are not taken as onboarding input.
    let replies = contents(h.send(h.event("ada@example.com").with_scope(ChatScope::Group)).await);
    assert!(replies.is_empty());
    assert_eq!(h.step().await, OnboardingStep::AwaitingResumeChoice);
}

#[tokio::test]
async fn profile_requested_in_group_is_sent_privately() {
    let h = Harness::new().await;
    h.say("/start").await;
    h.click(ids::CV_NO).await;
    h.say("secret@example.com").await;

    let sent = h.send(h.event("!profile").with_scope(ChatScope::Group)).await;
    assert_eq!(sent.len(), 1);
    assert!(sent[0].direct);
    assert!(sent[0].response.content.contains("secret@example.com"));

    let msg = h
        .event("")
        .with_scope(ChatScope::Group)
        .with_interaction(Interaction::Button {
            id: ids::VIEW_PROFILE.into(),
        });
    let sent = h.send(msg).await;
    assert!(sent.iter().all(|s| s.direct));

    let sent = h.send(h.event("!status").with_scope(ChatScope::Group)).await;
    assert!(!sent[0].direct);
}

#[tokio::test]
async fn duplicate_delivery_is_a_no_op() {
    let h = Harness::new().await;
    h.say("/start").await;
    h.click(ids::CV_NO).await;

    let msg = h.event("ada@example.com");
    assert_eq!(h.send(msg.clone()).await.len(), 1);
    assert!(h.send(msg).await.is_empty());

    let profile = h.db.get_profile("u1").await.unwrap().unwrap();
    assert_eq!(profile.step, OnboardingStep::AwaitingName);
    assert!(profile.name.is_none());
}

#[tokio::test]
async fn stale_and_unknown_buttons() {
    let h = Harness::new().await;
    h.say("/start").await;
    h.click(ids::CV_NO).await;

    // A known button from an earlier step is ignored silently.
    assert!(h.click(ids::CV_YES).await.is_empty());
    assert_eq!(h.step().await, OnboardingStep::AwaitingEmail);

    let replies = h.click("no_such_button").await;
    assert!(replies[0].contains("didn't recognize"));
}

#[tokio::test]
async fn delete_then_start_is_fresh() {
    let h = Harness::new().await;
    h.say("/start").await;
    h.click(ids::CV_NO).await;
    h.say("ada@example.com").await;
    let old_flow = h.db.get_profile("u1").await.unwrap().unwrap().flow_id;

    let replies = h.click(ids::DELETE_PROFILE).await;
    assert!(replies[0].contains("deleted"));
    assert!(h.db.get_profile("u1").await.unwrap().is_none());

    let replies = h.say("!profile").await;
    assert!(replies[0].contains("don't have a profile"));

    h.say("/start").await;
    let profile = h.db.get_profile("u1").await.unwrap().unwrap();
    assert!(profile.email.is_none());
    assert_ne!(profile.flow_id, old_flow);
}

#[tokio::test]
async fn clean_requires_admin() {
    let h = Harness::new().await;
    let replies = h.say("!clean 5").await;
    assert!(replies[0].contains("permission"));

    let replies = contents(h.send(h.event("!clean 5").admin(true)).await);
    assert_eq!(replies, vec!["🧹 5 messages deleted.".to_string()]);
}

#[tokio::test]
async fn ask_without_model_is_unavailable() {
    let h = Harness::new().await;
    let replies = h.say("!ask what should I learn?").await;
    assert!(replies[0].contains("not available"));
}
