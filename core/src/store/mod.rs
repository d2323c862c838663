//! SQLite persistence layer.
//!
//! RULE: Only the store modules talk to the database.
//! Subsystems call store methods and never execute SQL directly.
//! Any operation that touches more than one row runs in a single
//! transaction, so a refused transfer leaves nothing half-applied.

use crate::{
    error::BotResult,
    event::EventLogEntry,
    types::{CompanyId, Money, RequestId, RoleId, UserId},
};
use chrono::NaiveDateTime;
use rusqlite::{params, Connection};
use serde::{Deserialize, Serialize};

mod company;
mod ledger;
mod moderation;
mod request;

pub use company::MembershipChange;
pub use ledger::{ActivityBonus, DailyClaim};

pub struct BotStore {
    conn: Connection,
    path: Option<String>, // None for :memory:, Some(path) for file
}

// ── Rows ───────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UserRow {
    pub user_id: UserId,
    pub wallet: Money,
    pub bank: Money,
    pub last_daily: Option<NaiveDateTime>,
    pub company_id: Option<CompanyId>,
    pub last_activity: NaiveDateTime,
}

impl UserRow {
    pub fn net_worth(&self) -> Money {
        self.wallet + self.bank
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CompanyRow {
    pub company_id: CompanyId,
    pub name: String,
    pub owner_id: UserId,
    pub created_at: NaiveDateTime,
    pub creator_role_id: Option<RoleId>,
    /// Employees in join order. The owner is not listed.
    pub employees: Vec<UserId>,
}

impl CompanyRow {
    /// Employees plus the owner.
    pub fn member_count(&self) -> usize {
        self.employees.len() + 1
    }

    pub fn is_member(&self, user_id: UserId) -> bool {
        self.owner_id == user_id || self.employees.contains(&user_id)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RequestStatus {
    Pending,
    Accepted,
    Rejected,
}

impl RequestStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pending  => "pending",
            Self::Accepted => "accepted",
            Self::Rejected => "rejected",
        }
    }

    fn parse(s: &str) -> Self {
        match s {
            "accepted" => Self::Accepted,
            "rejected" => Self::Rejected,
            _          => Self::Pending,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MoneyRequestRow {
    pub request_id: RequestId,
    pub requester_id: UserId,
    pub recipient_id: UserId,
    pub amount: Money,
    pub reason: Option<String>,
    pub status: RequestStatus,
    pub created_at: NaiveDateTime,
    pub resolved_at: Option<NaiveDateTime>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TimeoutLogRow {
    pub id: i64,
    pub moderator_id: UserId,
    pub user_id: UserId,
    pub duration_secs: u64,
    pub created_at: NaiveDateTime,
}

impl BotStore {
    pub fn open(path: &str) -> BotResult<Self> {
        if let Some(parent) = std::path::Path::new(path).parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)
                    .map_err(|e| anyhow::anyhow!("cannot create {}: {e}", parent.display()))?;
            }
        }
        let conn = Connection::open(path)?;
        // WAL mode only for real files (:memory: ignores it).
        let _ = conn.execute_batch("PRAGMA journal_mode=WAL;");
        conn.execute_batch("PRAGMA foreign_keys=ON;")?;
        Ok(Self {
            conn,
            path: Some(path.to_string()),
        })
    }

    /// Open an in-memory database (used in tests).
    pub fn in_memory() -> BotResult<Self> {
        let conn = Connection::open_in_memory()?;
        conn.execute_batch("PRAGMA foreign_keys=ON;")?;
        Ok(Self { conn, path: None })
    }

    pub fn path(&self) -> Option<&str> {
        self.path.as_deref()
    }

    /// Apply all schema migrations in order. Idempotent.
    pub fn migrate(&self) -> BotResult<()> {
        self.conn
            .execute_batch(include_str!("../../../migrations/001_foundation.sql"))?;
        self.conn
            .execute_batch(include_str!("../../../migrations/002_ledger.sql"))?;
        self.conn
            .execute_batch(include_str!("../../../migrations/003_companies.sql"))?;
        self.conn
            .execute_batch(include_str!("../../../migrations/004_requests.sql"))?;
        self.conn
            .execute_batch(include_str!("../../../migrations/005_moderation.sql"))?;
        Ok(())
    }

    // ── Session ────────────────────────────────────────────────

    pub fn insert_session(
        &self,
        session_id: &str,
        seed: u64,
        version: &str,
        started_at: NaiveDateTime,
    ) -> BotResult<()> {
        self.conn.execute(
            "INSERT INTO session (session_id, seed, version, started_at) VALUES (?1, ?2, ?3, ?4)",
            params![session_id, seed as i64, version, started_at],
        )?;
        Ok(())
    }

    // ── Event log ──────────────────────────────────────────────

    pub fn append_event(&self, entry: &EventLogEntry) -> BotResult<()> {
        self.conn.execute(
            "INSERT INTO event_log (occurred_at, subsystem, event_type, payload)
             VALUES (?1, ?2, ?3, ?4)",
            params![entry.occurred_at, entry.subsystem, entry.event_type, entry.payload],
        )?;
        Ok(())
    }

    pub fn events_of_type(&self, event_type: &str) -> BotResult<Vec<EventLogEntry>> {
        let mut stmt = self.conn.prepare(
            "SELECT id, occurred_at, subsystem, event_type, payload
             FROM event_log WHERE event_type = ?1
             ORDER BY id ASC",
        )?;
        let entries = stmt
            .query_map(params![event_type], |row| {
                Ok(EventLogEntry {
                    id: Some(row.get(0)?),
                    occurred_at: row.get(1)?,
                    subsystem: row.get(2)?,
                    event_type: row.get(3)?,
                    payload: row.get(4)?,
                })
            })?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(entries)
    }

    pub fn event_count(&self) -> BotResult<i64> {
        let count = self
            .conn
            .query_row("SELECT COUNT(*) FROM event_log", [], |row| row.get(0))?;
        Ok(count)
    }
}
