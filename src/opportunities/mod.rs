//! Opportunity search adapter.

mod client;
pub mod model;

pub use client::{ExpertsClient, parse_opportunities, search_terms};
pub use model::Opportunity;

use async_trait::async_trait;

use crate::error::AdapterError;

/// Keyword search over an external opportunity catalogue.
#[async_trait]
pub trait OpportunitySearch: Send + Sync {
    /// Search for `keywords`. Results are unique by id.
    async fn search(&self, keywords: &str) -> Result<Vec<Opportunity>, AdapterError>;
}
