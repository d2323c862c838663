//! The seam to the chat platform.
//!
//! The gateway client (message delivery, role model, timeouts) lives
//! outside this crate. Subsystems only see the Platform trait; the
//! runner and tests plug in RecordingPlatform.

use crate::{
    response::Reply,
    types::{ChannelId, RoleId, UserId},
};
use serde::{Deserialize, Serialize};
use std::{any::Any, collections::HashMap};
use thiserror::Error;

/// A guild member as the platform reports it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Member {
    pub user_id: UserId,
    pub display_name: String,
    #[serde(default)]
    pub role_ids: Vec<RoleId>,
    #[serde(default)]
    pub is_admin: bool,
}

impl Member {
    pub fn new(user_id: UserId, display_name: impl Into<String>) -> Self {
        Self {
            user_id,
            display_name: display_name.into(),
            role_ids: Vec::new(),
            is_admin: false,
        }
    }

    pub fn with_roles(mut self, roles: &[RoleId]) -> Self {
        self.role_ids.extend_from_slice(roles);
        self
    }

    pub fn admin(mut self) -> Self {
        self.is_admin = true;
        self
    }

    pub fn mention(&self) -> String {
        format!("<@{}>", self.user_id)
    }
}

/// Where a notice goes.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "id", rename_all = "snake_case")]
pub enum NoticeTarget {
    /// Direct message to a user.
    User(UserId),
    /// Post in a channel.
    Channel(ChannelId),
    /// Post in whatever channel the triggering command came from.
    Origin,
}

/// A side message produced by a handler, delivered best-effort.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Notice {
    pub target: NoticeTarget,
    pub reply: Reply,
    /// Posted in the origin channel instead when delivery fails.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub fallback: Option<Reply>,
}

impl Notice {
    pub fn dm(user_id: UserId, reply: Reply) -> Self {
        Self { target: NoticeTarget::User(user_id), reply, fallback: None }
    }

    pub fn channel(channel_id: ChannelId, reply: Reply) -> Self {
        Self { target: NoticeTarget::Channel(channel_id), reply, fallback: None }
    }

    pub fn origin(reply: Reply) -> Self {
        Self { target: NoticeTarget::Origin, reply, fallback: None }
    }

    pub fn or_in_channel(mut self, fallback: Reply) -> Self {
        self.fallback = Some(fallback);
        self
    }
}

#[derive(Error, Debug, Clone, PartialEq)]
pub enum PlatformError {
    #[error("missing permission: {0}")]
    Forbidden(String),

    #[error("unknown member {0}")]
    UnknownMember(UserId),

    #[error("platform unavailable: {0}")]
    Unavailable(String),
}

pub trait Platform: Send {
    /// Look a member up by id. None when they are not in the guild.
    fn member(&self, user_id: UserId) -> Option<Member>;

    /// Deliver a notice. Callers treat failures as non-fatal.
    fn deliver(&mut self, notice: &Notice) -> Result<(), PlatformError>;

    /// Mute `user_id` for `seconds`.
    fn apply_timeout(&mut self, user_id: UserId, seconds: u64, reason: &str) -> Result<(), PlatformError>;

    /// Gateway round-trip latency in milliseconds.
    fn latency_ms(&self) -> u64;

    /// Re-register slash commands with the platform.
    fn sync_commands(&mut self) -> Result<usize, PlatformError>;

    fn guild_count(&self) -> usize {
        1
    }

    /// For downcasting in tests and tooling only.
    fn as_any(&self) -> &dyn Any;

    fn as_any_mut(&mut self) -> &mut dyn Any;
}

/// Display name for a user, falling back to `User <id>` when the
/// platform no longer knows them.
pub fn display_name(platform: &dyn Platform, user_id: UserId) -> String {
    platform
        .member(user_id)
        .map(|m| m.display_name)
        .unwrap_or_else(|| format!("User {user_id}"))
}

/// In-process platform: a member directory plus a record of every
/// delivered notice and applied timeout. Individual users can be set
/// to refuse DMs or timeouts to exercise the fallback paths.
#[derive(Debug, Default)]
pub struct RecordingPlatform {
    members: HashMap<UserId, Member>,
    pub delivered: Vec<Notice>,
    pub timeouts: Vec<(UserId, u64)>,
    pub syncs: usize,
    dm_blocked: Vec<UserId>,
    timeout_immune: Vec<UserId>,
    offline: bool,
    latency_ms: u64,
}

impl RecordingPlatform {
    pub fn new() -> Self {
        Self { latency_ms: 42, ..Self::default() }
    }

    pub fn add_member(&mut self, member: Member) {
        self.members.insert(member.user_id, member);
    }

    pub fn block_dms(&mut self, user_id: UserId) {
        self.dm_blocked.push(user_id);
    }

    pub fn refuse_timeouts_for(&mut self, user_id: UserId) {
        self.timeout_immune.push(user_id);
    }

    /// Gateway down: command sync fails until this is cleared.
    pub fn set_offline(&mut self, offline: bool) {
        self.offline = offline;
    }

    pub fn member_count(&self) -> usize {
        self.members.len()
    }

    /// Hand over everything delivered so far.
    pub fn take_delivered(&mut self) -> Vec<Notice> {
        std::mem::take(&mut self.delivered)
    }

    /// Notices delivered to one user by DM.
    pub fn dms_to(&self, user_id: UserId) -> Vec<&Notice> {
        self.delivered
            .iter()
            .filter(|n| n.target == NoticeTarget::User(user_id))
            .collect()
    }
}

impl Platform for RecordingPlatform {
    fn member(&self, user_id: UserId) -> Option<Member> {
        self.members.get(&user_id).cloned()
    }

    fn deliver(&mut self, notice: &Notice) -> Result<(), PlatformError> {
        if let NoticeTarget::User(user_id) = notice.target {
            if self.dm_blocked.contains(&user_id) {
                return Err(PlatformError::Forbidden(format!("cannot DM user {user_id}")));
            }
        }
        self.delivered.push(notice.clone());
        Ok(())
    }

    fn apply_timeout(&mut self, user_id: UserId, seconds: u64, _reason: &str) -> Result<(), PlatformError> {
        if !self.members.contains_key(&user_id) {
            return Err(PlatformError::UnknownMember(user_id));
        }
        if self.timeout_immune.contains(&user_id) {
            return Err(PlatformError::Forbidden(format!("cannot time out user {user_id}")));
        }
        self.timeouts.push((user_id, seconds));
        Ok(())
    }

    fn latency_ms(&self) -> u64 {
        self.latency_ms
    }

    fn sync_commands(&mut self) -> Result<usize, PlatformError> {
        if self.offline {
            return Err(PlatformError::Unavailable("gateway offline".into()));
        }
        self.syncs += 1;
        Ok(crate::utility_subsystem::SLASH_COMMAND_COUNT)
    }

    fn as_any(&self) -> &dyn Any {
        self
    }

    fn as_any_mut(&mut self) -> &mut dyn Any {
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn timeouts_need_a_known_member() {
        let mut platform = RecordingPlatform::new();
        assert_eq!(platform.apply_timeout(7, 30, "test"), Err(PlatformError::UnknownMember(7)));

        platform.add_member(Member::new(7, "seven"));
        platform.apply_timeout(7, 30, "test").unwrap();
        assert_eq!(platform.timeouts, vec![(7, 30)]);
    }

    #[test]
    fn offline_gateway_refuses_sync() {
        let mut platform = RecordingPlatform::new();
        platform.set_offline(true);
        assert!(matches!(platform.sync_commands(), Err(PlatformError::Unavailable(_))));
        assert_eq!(platform.syncs, 0);
        platform.set_offline(false);
        assert_eq!(platform.sync_commands(), Ok(crate::utility_subsystem::SLASH_COMMAND_COUNT));
    }
}
