//! Domain events: the audit trail of everything that moved money or
//! changed membership.
//!
//! RULE: Every state change a subsystem makes is reported as an event.
//! The engine persists them to the event log after each handler runs.

use crate::types::{CompanyId, Money, RequestId, UserId};
use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};

/// Variants are append-only: never removed or reordered.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum BotEvent {
    // ── Engine events ──────────────────────────────
    SessionStarted {
        session_id: String,
        seed: u64,
    },
    CommandReceived {
        user_id: UserId,
        command: String,
    },

    // ── Ledger events ──────────────────────────────
    DailyClaimed {
        user_id: UserId,
        amount: Money,
    },
    DailySweep {
        users: usize,
        amount: Money,
    },
    Deposited {
        user_id: UserId,
        amount: Money,
    },
    Withdrawn {
        user_id: UserId,
        amount: Money,
    },
    Transferred {
        from: UserId,
        to: UserId,
        amount: Money,
    },
    ActivityBonusPaid {
        user_id: UserId,
        company_id: CompanyId,
        amount: Money,
    },

    // ── Request events ─────────────────────────────
    RequestCreated {
        request_id: RequestId,
        requester_id: UserId,
        recipient_id: UserId,
        amount: Money,
    },
    RequestResolved {
        request_id: RequestId,
        accepted: bool,
    },

    // ── Robbery events ─────────────────────────────
    RobberyJoined {
        target_id: UserId,
        robber_id: UserId,
        participants: usize,
    },
    RobberyCompleted {
        target_id: UserId,
        robbers: Vec<UserId>,
        amount: Money,
        share: Money,
    },

    // ── Quest events ───────────────────────────────
    QuestOffered {
        user_id: UserId,
        title: String,
        reward: Money,
    },
    QuestAccepted {
        user_id: UserId,
        due_at: NaiveDateTime,
    },
    QuestFinished {
        user_id: UserId,
        succeeded: bool,
        reward: Money,
    },

    // ── Company events ─────────────────────────────
    CompanyCreated {
        company_id: CompanyId,
        owner_id: UserId,
        name: String,
    },
    MemberJoined {
        company_id: CompanyId,
        user_id: UserId,
        member_count: usize,
    },
    MemberLeft {
        company_id: CompanyId,
        user_id: UserId,
        member_count: usize,
        kicked: bool,
    },
    SizeBonusUnlocked {
        company_id: CompanyId,
        bonus: Money,
    },
    SizeBonusLost {
        company_id: CompanyId,
        bonus: Money,
    },
    CompanyDisbanded {
        company_id: CompanyId,
        released: Vec<UserId>,
    },

    // ── Moderation events ──────────────────────────
    TimeoutApplied {
        moderator_id: UserId,
        target_id: UserId,
        duration_secs: u64,
        cost: Money,
    },
    TimeoutRefunded {
        moderator_id: UserId,
        target_id: UserId,
        cost: Money,
    },
}

impl BotEvent {
    /// Stable string name for the event_type column of event_log.
    pub fn type_name(&self) -> &'static str {
        match self {
            Self::SessionStarted { .. }    => "session_started",
            Self::CommandReceived { .. }   => "command_received",
            Self::DailyClaimed { .. }      => "daily_claimed",
            Self::DailySweep { .. }        => "daily_sweep",
            Self::Deposited { .. }         => "deposited",
            Self::Withdrawn { .. }         => "withdrawn",
            Self::Transferred { .. }       => "transferred",
            Self::ActivityBonusPaid { .. } => "activity_bonus_paid",
            Self::RequestCreated { .. }    => "request_created",
            Self::RequestResolved { .. }   => "request_resolved",
            Self::RobberyJoined { .. }     => "robbery_joined",
            Self::RobberyCompleted { .. }  => "robbery_completed",
            Self::QuestOffered { .. }      => "quest_offered",
            Self::QuestAccepted { .. }     => "quest_accepted",
            Self::QuestFinished { .. }     => "quest_finished",
            Self::CompanyCreated { .. }    => "company_created",
            Self::MemberJoined { .. }      => "member_joined",
            Self::MemberLeft { .. }        => "member_left",
            Self::SizeBonusUnlocked { .. } => "size_bonus_unlocked",
            Self::SizeBonusLost { .. }     => "size_bonus_lost",
            Self::CompanyDisbanded { .. }  => "company_disbanded",
            Self::TimeoutApplied { .. }    => "timeout_applied",
            Self::TimeoutRefunded { .. }   => "timeout_refunded",
        }
    }
}

/// A persisted event_log row.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EventLogEntry {
    pub id:          Option<i64>,
    pub occurred_at: NaiveDateTime,
    pub subsystem:   String,
    pub event_type:  String,
    pub payload:     String,
}
