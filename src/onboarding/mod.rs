//! Onboarding: the per-user conversation that builds a candidate profile.
//!
//! The step table lives in [`engine`] as a pure function over the stored
//! [`Profile`]; [`manager`] wraps it with per-user locking, persistence and
//! the resume, search and chat adapters.

pub mod engine;
pub mod extraction;
pub mod manager;
pub mod model;
pub mod prompts;
pub mod routes;
pub mod state;

pub use engine::{StepInput, Transition};
pub use manager::{Deferred, Delivery, OnboardingDeps, OnboardingManager, Outcome, Reply, UserLocks};
pub use model::{Profile, ResumeChoice, ResumeFields};
pub use routes::{OnboardingRouteState, onboarding_routes};
pub use state::OnboardingStep;
