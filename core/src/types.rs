//! Shared primitive types used across the entire bot.

/// A platform user identifier (snowflake).
pub type UserId = u64;

/// A platform role identifier (snowflake).
pub type RoleId = u64;

/// A platform channel identifier (snowflake).
pub type ChannelId = u64;

/// Sequential company identifier assigned by the store.
pub type CompanyId = i64;

/// Sequential money request identifier assigned by the store.
pub type RequestId = i64;

/// Whole currency units. Signed so that arithmetic never wraps silently.
pub type Money = i64;

/// The canonical engine session identifier.
pub type SessionId = String;
