use super::{BotStore, UserRow};
use crate::{
    config::BonusPolicy,
    error::{BotError, BotResult},
    types::{CompanyId, Money, RoleId, UserId},
};
use chrono::{Duration, NaiveDateTime};
use rusqlite::{params, Connection, OptionalExtension};

const USER_COLUMNS: &str = "user_id, wallet, bank, last_daily, company_id, last_activity";

fn user_row_mapper(row: &rusqlite::Row<'_>) -> rusqlite::Result<UserRow> {
    Ok(UserRow {
        user_id: row.get::<_, i64>(0)? as u64,
        wallet: row.get(1)?,
        bank: row.get(2)?,
        last_daily: row.get(3)?,
        company_id: row.get(4)?,
        last_activity: row.get(5)?,
    })
}

pub(super) fn load_user(conn: &Connection, user_id: UserId) -> rusqlite::Result<Option<UserRow>> {
    conn.query_row(
        &format!("SELECT {USER_COLUMNS} FROM bot_user WHERE user_id = ?1"),
        params![user_id as i64],
        user_row_mapper,
    )
    .optional()
}

/// Insert a zero-balance user if absent, then load them.
pub(super) fn ensure_user(conn: &Connection, user_id: UserId, now: NaiveDateTime) -> BotResult<UserRow> {
    conn.execute(
        "INSERT OR IGNORE INTO bot_user (user_id, wallet, bank, last_activity) VALUES (?1, 0, 0, ?2)",
        params![user_id as i64, now],
    )?;
    load_user(conn, user_id)?.ok_or(BotError::UserNotFound)
}

pub(super) fn adjust_wallet(conn: &Connection, user_id: UserId, delta: Money) -> BotResult<()> {
    conn.execute(
        "UPDATE bot_user SET wallet = wallet + ?1 WHERE user_id = ?2",
        params![delta, user_id as i64],
    )?;
    Ok(())
}

fn require_positive(amount: Money) -> BotResult<()> {
    if amount <= 0 {
        return Err(BotError::InvalidAmount("Amount must be positive!".into()));
    }
    Ok(())
}

/// Result of a daily claim attempt.
#[derive(Debug, Clone, PartialEq)]
pub enum DailyClaim {
    Claimed { amount: Money, new_balance: Money },
    /// Already claimed today; the reward reopens at local midnight.
    AlreadyClaimed { next_available: NaiveDateTime },
}

/// An activity bonus credited by record_activity().
#[derive(Debug, Clone, PartialEq)]
pub struct ActivityBonus {
    pub company_id: CompanyId,
    pub amount: Money,
    pub new_wallet: Money,
}

impl BotStore {
    // ── Users ──────────────────────────────────────────────────────

    pub fn get_or_create_user(&self, user_id: UserId, now: NaiveDateTime) -> BotResult<UserRow> {
        ensure_user(&self.conn, user_id, now)
    }

    pub fn user(&self, user_id: UserId) -> BotResult<Option<UserRow>> {
        Ok(load_user(&self.conn, user_id)?)
    }

    pub fn user_count(&self) -> BotResult<i64> {
        let count = self
            .conn
            .query_row("SELECT COUNT(*) FROM bot_user", [], |row| row.get(0))?;
        Ok(count)
    }

    /// Sum of every wallet and bank. Money only enters through rewards
    /// and bonuses, and only leaves through timeout costs and robbery
    /// remainders.
    pub fn total_money(&self) -> BotResult<Money> {
        let total = self.conn.query_row(
            "SELECT COALESCE(SUM(wallet + bank), 0) FROM bot_user",
            [],
            |row| row.get(0),
        )?;
        Ok(total)
    }

    /// Top users by wallet + bank, richest first.
    pub fn leaderboard(&self, limit: usize) -> BotResult<Vec<UserRow>> {
        let mut stmt = self.conn.prepare(&format!(
            "SELECT {USER_COLUMNS} FROM bot_user
             ORDER BY wallet + bank DESC, user_id ASC
             LIMIT ?1"
        ))?;
        let rows = stmt.query_map(params![limit as i64], user_row_mapper)?;
        rows.collect::<Result<Vec<_>, _>>().map_err(Into::into)
    }

    // ── Wallet ─────────────────────────────────────────────────────

    pub fn add_money(&self, user_id: UserId, amount: Money, now: NaiveDateTime) -> BotResult<Money> {
        let tx = self.conn.unchecked_transaction()?;
        ensure_user(&tx, user_id, now)?;
        adjust_wallet(&tx, user_id, amount)?;
        let user = load_user(&tx, user_id)?.ok_or(BotError::UserNotFound)?;
        tx.commit()?;
        Ok(user.wallet)
    }

    /// Take `amount` out of a wallet, refusing if it would go negative.
    pub fn remove_money(&self, user_id: UserId, amount: Money) -> BotResult<Money> {
        require_positive(amount)?;
        let tx = self.conn.unchecked_transaction()?;
        let user = load_user(&tx, user_id)?.ok_or(BotError::UserNotFound)?;
        if user.wallet < amount {
            return Err(BotError::InsufficientWallet { needed: amount, available: user.wallet });
        }
        adjust_wallet(&tx, user_id, -amount)?;
        tx.commit()?;
        Ok(user.wallet - amount)
    }

    // ── Daily reward ───────────────────────────────────────────────

    /// Claim the daily reward. Eligible when the last claim fell on an
    /// earlier calendar date than `now`.
    pub fn claim_daily(&self, user_id: UserId, now: NaiveDateTime, amount: Money) -> BotResult<DailyClaim> {
        let tx = self.conn.unchecked_transaction()?;
        let user = ensure_user(&tx, user_id, now)?;
        if let Some(last) = user.last_daily {
            if last.date() >= now.date() {
                let next_available = last
                    .date()
                    .succ_opt()
                    .and_then(|d| d.and_hms_opt(0, 0, 0))
                    .unwrap_or(now);
                tx.commit()?;
                return Ok(DailyClaim::AlreadyClaimed { next_available });
            }
        }
        tx.execute(
            "UPDATE bot_user SET wallet = wallet + ?1, last_daily = ?2 WHERE user_id = ?3",
            params![amount, now, user_id as i64],
        )?;
        tx.commit()?;
        Ok(DailyClaim::Claimed { amount, new_balance: user.wallet + amount })
    }

    /// Grant the daily reward to every known user and stamp their claim.
    /// Returns how many users were paid.
    pub fn grant_daily_to_all(&self, now: NaiveDateTime, amount: Money) -> BotResult<usize> {
        let paid = self.conn.execute(
            "UPDATE bot_user SET wallet = wallet + ?1, last_daily = ?2",
            params![amount, now],
        )?;
        Ok(paid)
    }

    // ── Bank ───────────────────────────────────────────────────────

    pub fn deposit(&self, user_id: UserId, amount: Money) -> BotResult<UserRow> {
        require_positive(amount)?;
        let tx = self.conn.unchecked_transaction()?;
        let user = load_user(&tx, user_id)?.ok_or(BotError::UserNotFound)?;
        if user.wallet < amount {
            return Err(BotError::InsufficientWallet { needed: amount, available: user.wallet });
        }
        tx.execute(
            "UPDATE bot_user SET wallet = wallet - ?1, bank = bank + ?1 WHERE user_id = ?2",
            params![amount, user_id as i64],
        )?;
        let updated = load_user(&tx, user_id)?.ok_or(BotError::UserNotFound)?;
        tx.commit()?;
        Ok(updated)
    }

    pub fn withdraw(&self, user_id: UserId, amount: Money) -> BotResult<UserRow> {
        require_positive(amount)?;
        let tx = self.conn.unchecked_transaction()?;
        let user = load_user(&tx, user_id)?.ok_or(BotError::UserNotFound)?;
        if user.bank < amount {
            return Err(BotError::InsufficientBank { needed: amount, available: user.bank });
        }
        tx.execute(
            "UPDATE bot_user SET bank = bank - ?1, wallet = wallet + ?1 WHERE user_id = ?2",
            params![amount, user_id as i64],
        )?;
        let updated = load_user(&tx, user_id)?.ok_or(BotError::UserNotFound)?;
        tx.commit()?;
        Ok(updated)
    }

    // ── Transfers ──────────────────────────────────────────────────

    /// Move `amount` between wallets. The recipient is created if new.
    /// Returns (sender, recipient) after the move.
    pub fn transfer(
        &self,
        from: UserId,
        to: UserId,
        amount: Money,
        now: NaiveDateTime,
    ) -> BotResult<(UserRow, UserRow)> {
        if from == to {
            return Err(BotError::SelfTarget("You can't transfer money to yourself!"));
        }
        require_positive(amount)?;
        let tx = self.conn.unchecked_transaction()?;
        let sender = load_user(&tx, from)?.ok_or(BotError::UserNotFound)?;
        if sender.wallet < amount {
            return Err(BotError::InsufficientWallet { needed: amount, available: sender.wallet });
        }
        ensure_user(&tx, to, now)?;
        adjust_wallet(&tx, from, -amount)?;
        adjust_wallet(&tx, to, amount)?;
        let sender = load_user(&tx, from)?.ok_or(BotError::UserNotFound)?;
        let recipient = load_user(&tx, to)?.ok_or(BotError::UserNotFound)?;
        tx.commit()?;
        Ok((sender, recipient))
    }

    /// Take all of `take` from the target's wallet and pay each robber an
    /// equal floor share. The division remainder leaves the economy.
    /// Returns the per-robber share.
    pub fn execute_robbery(
        &self,
        target: UserId,
        robbers: &[UserId],
        take: Money,
        now: NaiveDateTime,
    ) -> BotResult<Money> {
        require_positive(take)?;
        if robbers.is_empty() {
            return Err(BotError::Refused("A robbery needs robbers!".into()));
        }
        let tx = self.conn.unchecked_transaction()?;
        let victim = load_user(&tx, target)?.ok_or(BotError::UserNotFound)?;
        if victim.wallet < take {
            return Err(BotError::InsufficientWallet { needed: take, available: victim.wallet });
        }
        let share = take / robbers.len() as Money;
        adjust_wallet(&tx, target, -take)?;
        for &robber in robbers {
            ensure_user(&tx, robber, now)?;
            adjust_wallet(&tx, robber, share)?;
        }
        tx.commit()?;
        Ok(share)
    }

    // ── Activity ───────────────────────────────────────────────────

    /// Record that a user was active at `now`, creating them if new.
    ///
    /// If they belong to a company and their previous activity is older
    /// than the policy's idle window, the company's current bonus is paid.
    /// Last activity is updated either way.
    pub fn record_activity(
        &self,
        user_id: UserId,
        now: NaiveDateTime,
        policy: &BonusPolicy,
    ) -> BotResult<Option<ActivityBonus>> {
        let tx = self.conn.unchecked_transaction()?;
        let user = ensure_user(&tx, user_id, now)?;

        let mut bonus = None;
        if let Some(company_id) = user.company_id {
            if now - user.last_activity > Duration::seconds(policy.idle_window_secs) {
                let company: Option<(Option<i64>, i64)> = tx
                    .query_row(
                        "SELECT c.creator_role_id,
                                (SELECT COUNT(*) FROM company_member m WHERE m.company_id = c.company_id)
                         FROM company c WHERE c.company_id = ?1",
                        params![company_id],
                        |row| Ok((row.get(0)?, row.get(1)?)),
                    )
                    .optional()?;
                let amount = match company {
                    Some((role, employees)) => {
                        let role: Option<RoleId> = role.map(|r| r as u64);
                        policy.activity_bonus(role, employees as usize + 1)
                    }
                    None => policy.default_base,
                };
                adjust_wallet(&tx, user_id, amount)?;
                bonus = Some(ActivityBonus {
                    company_id,
                    amount,
                    new_wallet: user.wallet + amount,
                });
            }
        }

        tx.execute(
            "UPDATE bot_user SET last_activity = ?1 WHERE user_id = ?2",
            params![now, user_id as i64],
        )?;
        tx.commit()?;
        Ok(bonus)
    }
}
