use super::{
    ledger::{adjust_wallet, ensure_user, load_user},
    BotStore, MoneyRequestRow, RequestStatus,
};
use crate::{
    error::{BotError, BotResult},
    types::{Money, RequestId, UserId},
};
use chrono::NaiveDateTime;
use rusqlite::{params, Connection, OptionalExtension};

const REQUEST_COLUMNS: &str =
    "request_id, requester_id, recipient_id, amount, reason, status, created_at, resolved_at";

fn request_row_mapper(row: &rusqlite::Row<'_>) -> rusqlite::Result<MoneyRequestRow> {
    Ok(MoneyRequestRow {
        request_id: row.get(0)?,
        requester_id: row.get::<_, i64>(1)? as u64,
        recipient_id: row.get::<_, i64>(2)? as u64,
        amount: row.get(3)?,
        reason: row.get(4)?,
        status: RequestStatus::parse(&row.get::<_, String>(5)?),
        created_at: row.get(6)?,
        resolved_at: row.get(7)?,
    })
}

fn load_request(conn: &Connection, request_id: RequestId) -> rusqlite::Result<Option<MoneyRequestRow>> {
    conn.query_row(
        &format!("SELECT {REQUEST_COLUMNS} FROM money_request WHERE request_id = ?1"),
        params![request_id],
        request_row_mapper,
    )
    .optional()
}

impl BotStore {
    // ── Money requests ─────────────────────────────────────────────

    pub fn create_request(
        &self,
        requester_id: UserId,
        recipient_id: UserId,
        amount: Money,
        reason: Option<&str>,
        now: NaiveDateTime,
    ) -> BotResult<MoneyRequestRow> {
        if requester_id == recipient_id {
            return Err(BotError::SelfTarget("You can't request money from yourself!"));
        }
        if amount <= 0 {
            return Err(BotError::InvalidAmount("Amount must be positive!".into()));
        }
        let tx = self.conn.unchecked_transaction()?;
        ensure_user(&tx, requester_id, now)?;
        ensure_user(&tx, recipient_id, now)?;
        tx.execute(
            "INSERT INTO money_request (requester_id, recipient_id, amount, reason, status, created_at)
             VALUES (?1, ?2, ?3, ?4, 'pending', ?5)",
            params![requester_id as i64, recipient_id as i64, amount, reason, now],
        )?;
        let request_id = tx.last_insert_rowid();
        let row = load_request(&tx, request_id)?.ok_or(BotError::RequestNotFound(request_id))?;
        tx.commit()?;
        Ok(row)
    }

    pub fn request(&self, request_id: RequestId) -> BotResult<Option<MoneyRequestRow>> {
        Ok(load_request(&self.conn, request_id)?)
    }

    /// Pending requests addressed to `user_id`, newest first.
    pub fn pending_requests_to(&self, user_id: UserId, limit: usize) -> BotResult<Vec<MoneyRequestRow>> {
        self.pending_where("recipient_id", user_id, limit)
    }

    /// Pending requests made by `user_id`, newest first.
    pub fn pending_requests_from(&self, user_id: UserId, limit: usize) -> BotResult<Vec<MoneyRequestRow>> {
        self.pending_where("requester_id", user_id, limit)
    }

    fn pending_where(&self, column: &str, user_id: UserId, limit: usize) -> BotResult<Vec<MoneyRequestRow>> {
        let mut stmt = self.conn.prepare(&format!(
            "SELECT {REQUEST_COLUMNS} FROM money_request
             WHERE {column} = ?1 AND status = 'pending'
             ORDER BY created_at DESC, request_id DESC
             LIMIT ?2"
        ))?;
        let rows = stmt.query_map(params![user_id as i64, limit as i64], request_row_mapper)?;
        rows.collect::<Result<Vec<_>, _>>().map_err(Into::into)
    }

    pub fn pending_request_count(&self, user_id: UserId) -> BotResult<i64> {
        let count = self.conn.query_row(
            "SELECT COUNT(*) FROM money_request
             WHERE status = 'pending' AND (requester_id = ?1 OR recipient_id = ?1)",
            params![user_id as i64],
            |row| row.get(0),
        )?;
        Ok(count)
    }

    /// Accept or reject a pending request on behalf of `actor_id`.
    ///
    /// Only the recipient may resolve a request, and only once. Accepting
    /// pays the requester from the recipient's wallet in the same
    /// transaction; if the wallet is short the request stays pending.
    pub fn resolve_request(
        &self,
        request_id: RequestId,
        actor_id: UserId,
        accept: bool,
        now: NaiveDateTime,
    ) -> BotResult<MoneyRequestRow> {
        let tx = self.conn.unchecked_transaction()?;
        let request = load_request(&tx, request_id)?.ok_or(BotError::RequestNotFound(request_id))?;
        if request.recipient_id != actor_id {
            let verb = if accept { "accept" } else { "reject" };
            return Err(BotError::PermissionDenied(format!(
                "You can only {verb} requests sent to you!"
            )));
        }
        if request.status != RequestStatus::Pending {
            return Err(BotError::RequestAlreadyResolved);
        }

        if accept {
            let payer = load_user(&tx, request.recipient_id)?.ok_or(BotError::UserNotFound)?;
            if payer.wallet < request.amount {
                return Err(BotError::InsufficientWallet {
                    needed: request.amount,
                    available: payer.wallet,
                });
            }
            ensure_user(&tx, request.requester_id, now)?;
            adjust_wallet(&tx, request.recipient_id, -request.amount)?;
            adjust_wallet(&tx, request.requester_id, request.amount)?;
        }

        let status = if accept { RequestStatus::Accepted } else { RequestStatus::Rejected };
        let updated = tx.execute(
            "UPDATE money_request SET status = ?1, resolved_at = ?2
             WHERE request_id = ?3 AND status = 'pending'",
            params![status.as_str(), now, request_id],
        )?;
        if updated != 1 {
            return Err(BotError::RequestAlreadyResolved);
        }
        let row = load_request(&tx, request_id)?.ok_or(BotError::RequestNotFound(request_id))?;
        tx.commit()?;
        Ok(row)
    }
}
