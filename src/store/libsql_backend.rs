//! libSQL backend: async `Database` trait implementation.
//!
//! Supports local file and in-memory databases.

use std::path::Path;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use libsql::{Connection, Database as LibSqlDatabase, params};
use tracing::{debug, info};
use uuid::Uuid;

use crate::error::DatabaseError;
use crate::onboarding::model::{Profile, ResumeChoice};
use crate::onboarding::state::OnboardingStep;
use crate::opportunities::Opportunity;
use crate::store::migrations;
use crate::store::traits::{Database, DeliveredOpportunity, Feedback};

/// libSQL database backend.
///
/// Stores a single connection that is reused for all operations.
/// `libsql::Connection` is `Send + Sync` and safe for concurrent async use.
pub struct LibSqlBackend {
    #[allow(dead_code)]
    db: Arc<LibSqlDatabase>,
    conn: Connection,
}

impl LibSqlBackend {
    /// Open (or create) a local database file and run migrations.
    pub async fn new_local(path: &Path) -> Result<Self, DatabaseError> {
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent).map_err(|e| {
                DatabaseError::Pool(format!("Failed to create database directory: {e}"))
            })?;
        }

        let db = libsql::Builder::new_local(path)
            .build()
            .await
            .map_err(|e| DatabaseError::Pool(format!("Failed to open libSQL database: {e}")))?;

        let backend = Self::from_database(db)?;
        backend.run_migrations().await?;
        info!(path = %path.display(), "Database opened");
        Ok(backend)
    }

    /// Create an in-memory database (for tests).
    pub async fn new_memory() -> Result<Self, DatabaseError> {
        let db = libsql::Builder::new_local(":memory:")
            .build()
            .await
            .map_err(|e| {
                DatabaseError::Pool(format!("Failed to create in-memory database: {e}"))
            })?;

        let backend = Self::from_database(db)?;
        backend.run_migrations().await?;
        Ok(backend)
    }

    fn from_database(db: LibSqlDatabase) -> Result<Self, DatabaseError> {
        let conn = db
            .connect()
            .map_err(|e| DatabaseError::Pool(format!("Failed to create connection: {e}")))?;
        Ok(Self {
            db: Arc::new(db),
            conn,
        })
    }

    fn conn(&self) -> &Connection {
        &self.conn
    }
}

// ── Helper functions ────────────────────────────────────────────────

/// Parse an RFC 3339 or SQLite datetime string into DateTime<Utc>.
fn parse_datetime(s: &str) -> DateTime<Utc> {
    if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
        return dt.with_timezone(&Utc);
    }
    if let Ok(ndt) = chrono::NaiveDateTime::parse_from_str(s, "%Y-%m-%d %H:%M:%S%.f") {
        return ndt.and_utc();
    }
    if let Ok(ndt) = chrono::NaiveDateTime::parse_from_str(s, "%Y-%m-%d %H:%M:%S") {
        return ndt.and_utc();
    }
    DateTime::<Utc>::MIN_UTC
}

fn opt_text(s: Option<&str>) -> libsql::Value {
    match s {
        Some(s) => libsql::Value::Text(s.to_string()),
        None => libsql::Value::Null,
    }
}

/// Tag lists are stored as JSON arrays.
fn opt_list(list: Option<&Vec<String>>) -> Result<libsql::Value, DatabaseError> {
    match list {
        Some(items) => serde_json::to_string(items)
            .map(libsql::Value::Text)
            .map_err(|e| DatabaseError::Serialization(e.to_string())),
        None => Ok(libsql::Value::Null),
    }
}

fn parse_list(s: Option<String>) -> Option<Vec<String>> {
    s.and_then(|json| serde_json::from_str(&json).ok())
}

const PROFILE_COLUMNS: &str = "user_id, flow_id, step, has_resume, name, email, skills, \
     position_interest, resume_text, resume_description, last_event_id, created_at, updated_at, \
     completed_at";

/// Map a libsql Row to a Profile. Column order matches PROFILE_COLUMNS.
fn row_to_profile(row: &libsql::Row) -> Result<Profile, DatabaseError> {
    let get = |idx: i32| -> Result<String, DatabaseError> {
        row.get::<String>(idx)
            .map_err(|e| DatabaseError::Query(format!("row_to_profile[{idx}]: {e}")))
    };
    let opt = |idx: i32| row.get::<String>(idx).ok();

    let step_str = get(2)?;
    let step: OnboardingStep = step_str
        .parse()
        .map_err(|e: String| DatabaseError::Serialization(e))?;
    let flow_id = Uuid::parse_str(&get(1)?)
        .map_err(|e| DatabaseError::Serialization(format!("flow_id: {e}")))?;

    Ok(Profile {
        user_id: get(0)?,
        flow_id,
        step,
        has_resume: ResumeChoice::parse(&get(3)?),
        name: opt(4),
        email: opt(5),
        skills: parse_list(opt(6)),
        position_interest: parse_list(opt(7)),
        resume_text: opt(8),
        resume_description: opt(9),
        last_event_id: opt(10),
        created_at: parse_datetime(&get(11)?),
        updated_at: parse_datetime(&get(12)?),
        completed_at: opt(13).map(|s| parse_datetime(&s)),
    })
}

// ── Trait implementation ────────────────────────────────────────────

#[async_trait]
impl Database for LibSqlBackend {
    async fn run_migrations(&self) -> Result<(), DatabaseError> {
        migrations::run_migrations(self.conn()).await
    }

    // ── Profiles ────────────────────────────────────────────────────

    async fn get_profile(&self, user_id: &str) -> Result<Option<Profile>, DatabaseError> {
        let conn = self.conn();
        let sql = format!("SELECT {PROFILE_COLUMNS} FROM profiles WHERE user_id = ?1");
        let mut rows = conn
            .query(&sql, params![user_id])
            .await
            .map_err(|e| DatabaseError::Query(format!("get_profile: {e}")))?;

        match rows.next().await {
            Ok(Some(row)) => Ok(Some(row_to_profile(&row)?)),
            Ok(None) => Ok(None),
            Err(e) => Err(DatabaseError::Query(format!("get_profile: {e}"))),
        }
    }

    async fn upsert_profile(&self, profile: &Profile) -> Result<(), DatabaseError> {
        let conn = self.conn();
        let skills = opt_list(profile.skills.as_ref())?;
        let positions = opt_list(profile.position_interest.as_ref())?;
        let completed_at = opt_text(profile.completed_at.map(|t| t.to_rfc3339()).as_deref());

        conn.execute(
            "INSERT INTO profiles (user_id, flow_id, step, has_resume, name, email, skills,
                 position_interest, resume_text, resume_description, last_event_id,
                 created_at, updated_at, completed_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14)
             ON CONFLICT (user_id) DO UPDATE SET
                 flow_id = ?2, step = ?3, has_resume = ?4, name = ?5, email = ?6,
                 skills = ?7, position_interest = ?8, resume_text = ?9,
                 resume_description = ?10, last_event_id = ?11, created_at = ?12,
                 updated_at = ?13, completed_at = ?14",
            params![
                profile.user_id.as_str(),
                profile.flow_id.to_string(),
                profile.step.as_str(),
                profile.has_resume.as_str(),
                opt_text(profile.name.as_deref()),
                opt_text(profile.email.as_deref()),
                skills,
                positions,
                opt_text(profile.resume_text.as_deref()),
                opt_text(profile.resume_description.as_deref()),
                opt_text(profile.last_event_id.as_deref()),
                profile.created_at.to_rfc3339(),
                profile.updated_at.to_rfc3339(),
                completed_at,
            ],
        )
        .await
        .map_err(|e| DatabaseError::Query(format!("upsert_profile: {e}")))?;

        debug!(user_id = %profile.user_id, step = %profile.step, "Profile saved");
        Ok(())
    }

    async fn delete_profile(&self, user_id: &str) -> Result<bool, DatabaseError> {
        let conn = self.conn();
        let count = conn
            .execute("DELETE FROM profiles WHERE user_id = ?1", params![user_id])
            .await
            .map_err(|e| DatabaseError::Query(format!("delete_profile: {e}")))?;
        Ok(count > 0)
    }

    // ── Delivered opportunities ─────────────────────────────────────

    async fn is_opportunity_delivered(
        &self,
        user_id: &str,
        opportunity_id: &str,
    ) -> Result<bool, DatabaseError> {
        let conn = self.conn();
        let mut rows = conn
            .query(
                "SELECT COUNT(*) FROM delivered_opportunities
                 WHERE user_id = ?1 AND opportunity_id = ?2",
                params![user_id, opportunity_id],
            )
            .await
            .map_err(|e| DatabaseError::Query(format!("is_opportunity_delivered: {e}")))?;

        match rows.next().await {
            Ok(Some(row)) => Ok(row.get::<i64>(0).unwrap_or(0) > 0),
            Ok(None) => Ok(false),
            Err(e) => Err(DatabaseError::Query(format!("is_opportunity_delivered: {e}"))),
        }
    }

    async fn record_delivered_opportunity(
        &self,
        user_id: &str,
        opportunity: &Opportunity,
    ) -> Result<(), DatabaseError> {
        let conn = self.conn();
        conn.execute(
            "INSERT OR IGNORE INTO delivered_opportunities
                 (user_id, opportunity_id, title, company, url, delivered_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
            params![
                user_id,
                opportunity.id.as_str(),
                opportunity.title.as_str(),
                opportunity.company.as_str(),
                opt_text(opportunity.url.as_deref()),
                Utc::now().to_rfc3339(),
            ],
        )
        .await
        .map_err(|e| DatabaseError::Query(format!("record_delivered_opportunity: {e}")))?;
        Ok(())
    }

    async fn list_delivered_opportunities(
        &self,
        user_id: &str,
    ) -> Result<Vec<DeliveredOpportunity>, DatabaseError> {
        let conn = self.conn();
        let mut rows = conn
            .query(
                "SELECT user_id, opportunity_id, title, company, url, delivered_at
                 FROM delivered_opportunities WHERE user_id = ?1
                 ORDER BY delivered_at DESC",
                params![user_id],
            )
            .await
            .map_err(|e| DatabaseError::Query(format!("list_delivered_opportunities: {e}")))?;

        let mut delivered = Vec::new();
        while let Some(row) = rows
            .next()
            .await
            .map_err(|e| DatabaseError::Query(format!("list_delivered_opportunities: {e}")))?
        {
            let text = |idx: i32| {
                row.get::<String>(idx).map_err(|e| {
                    DatabaseError::Query(format!("list_delivered_opportunities[{idx}]: {e}"))
                })
            };
            delivered.push(DeliveredOpportunity {
                user_id: text(0)?,
                opportunity_id: text(1)?,
                title: text(2)?,
                company: text(3)?,
                url: row.get::<String>(4).ok(),
                delivered_at: parse_datetime(&text(5)?),
            });
        }
        Ok(delivered)
    }

    // ── Feedback ────────────────────────────────────────────────────

    async fn insert_feedback(&self, feedback: &Feedback) -> Result<(), DatabaseError> {
        let conn = self.conn();
        let stars = match feedback.stars {
            Some(s) => libsql::Value::Integer(i64::from(s)),
            None => libsql::Value::Null,
        };
        conn.execute(
            "INSERT INTO feedback (id, user_id, stars, feedback_text, created_at)
             VALUES (?1, ?2, ?3, ?4, ?5)",
            params![
                feedback.id.to_string(),
                feedback.user_id.as_str(),
                stars,
                feedback.text.as_str(),
                feedback.created_at.to_rfc3339(),
            ],
        )
        .await
        .map_err(|e| DatabaseError::Query(format!("insert_feedback: {e}")))?;
        Ok(())
    }
}
