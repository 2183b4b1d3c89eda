//! Jobify: onboarding and opportunity-matching bot for the EXPERTS.AI
//! career hub.

pub mod bot;
pub mod channels;
pub mod config;
pub mod error;
pub mod llm;
pub mod onboarding;
pub mod opportunities;
pub mod resume;
pub mod router;
pub mod store;
