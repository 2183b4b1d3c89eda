//! Persistence layer: libSQL-backed storage for profiles, deliveries and
//! feedback.

mod libsql_backend;
mod migrations;
pub mod traits;

pub use libsql_backend::LibSqlBackend;
pub use traits::{Database, DeliveredOpportunity, Feedback};
