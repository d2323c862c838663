use crate::types::{CompanyId, Money, RequestId};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum BotError {
    #[error("Database error: {0}")]
    Database(#[from] rusqlite::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    // ── Ledger refusals ────────────────────────────────────────
    #[error("Not enough money in wallet (have ${available}, need ${needed})")]
    InsufficientWallet { needed: Money, available: Money },

    #[error("Not enough money in bank (have ${available}, need ${needed})")]
    InsufficientBank { needed: Money, available: Money },

    #[error("{0}")]
    InvalidAmount(String),

    #[error("{0}")]
    SelfTarget(&'static str),

    #[error("User not found")]
    UserNotFound,

    // ── Request refusals ───────────────────────────────────────
    #[error("Request #{0} not found!")]
    RequestNotFound(RequestId),

    #[error("This request has already been resolved!")]
    RequestAlreadyResolved,

    // ── Company refusals ───────────────────────────────────────
    #[error("Company #{0} not found")]
    CompanyIdNotFound(CompanyId),

    #[error("A company with the name '{0}' already exists!")]
    CompanyNameTaken(String),

    #[error("Your company has reached the maximum member limit of {max}!")]
    CompanyFull { max: usize },

    #[error("{0}")]
    Membership(String),

    // ── Generic refusals ───────────────────────────────────────
    #[error("{0}")]
    PermissionDenied(String),

    #[error("{0}")]
    Cooldown(String),

    #[error("{0}")]
    Refused(String),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl BotError {
    /// True for refusals that are rendered back to the invoking user.
    /// False for infrastructure failures, which are logged instead.
    pub fn is_user_facing(&self) -> bool {
        !matches!(
            self,
            Self::Database(_) | Self::Serialization(_) | Self::Other(_)
        )
    }
}

pub type BotResult<T> = Result<T, BotError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn refusals_are_user_facing() {
        let err = BotError::InsufficientWallet { needed: 50, available: 10 };
        assert!(err.is_user_facing());
        assert_eq!(err.to_string(), "Not enough money in wallet (have $10, need $50)");
    }

    #[test]
    fn database_errors_are_not_user_facing() {
        let err = BotError::Database(rusqlite::Error::QueryReturnedNoRows);
        assert!(!err.is_user_facing());
    }
}
