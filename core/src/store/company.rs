use super::{ledger::ensure_user, BotStore, CompanyRow};
use crate::{
    error::{BotError, BotResult},
    types::{CompanyId, RoleId, UserId},
};
use chrono::NaiveDateTime;
use rusqlite::{params, Connection, OptionalExtension};

/// Member counts (owner included) either side of a join or a leave.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MembershipChange {
    pub before: usize,
    pub after: usize,
}

impl MembershipChange {
    /// True when the count moved from at-or-below `threshold` to above it.
    pub fn crossed_above(&self, threshold: usize) -> bool {
        self.before <= threshold && self.after > threshold
    }

    /// True when the count moved from above `threshold` to at-or-below it.
    pub fn crossed_below(&self, threshold: usize) -> bool {
        self.before > threshold && self.after <= threshold
    }
}

fn employees_of(conn: &Connection, company_id: CompanyId) -> rusqlite::Result<Vec<UserId>> {
    let mut stmt = conn.prepare(
        "SELECT user_id FROM company_member WHERE company_id = ?1 ORDER BY seq ASC",
    )?;
    let rows = stmt.query_map(params![company_id], |row| Ok(row.get::<_, i64>(0)? as u64))?;
    rows.collect()
}

fn load_company_where(
    conn: &Connection,
    clause: &str,
    param: &dyn rusqlite::ToSql,
) -> rusqlite::Result<Option<CompanyRow>> {
    let row = conn
        .query_row(
            &format!(
                "SELECT company_id, name, owner_id, created_at, creator_role_id
                 FROM company WHERE {clause}"
            ),
            params![param],
            |row| {
                Ok(CompanyRow {
                    company_id: row.get(0)?,
                    name: row.get(1)?,
                    owner_id: row.get::<_, i64>(2)? as u64,
                    created_at: row.get(3)?,
                    creator_role_id: row.get::<_, Option<i64>>(4)?.map(|r| r as u64),
                    employees: Vec::new(),
                })
            },
        )
        .optional()?;
    match row {
        Some(mut company) => {
            company.employees = employees_of(conn, company.company_id)?;
            Ok(Some(company))
        }
        None => Ok(None),
    }
}

/// Lookup key for company names: trimmed, Unicode-lowercased.
fn name_key(name: &str) -> String {
    name.trim().to_lowercase()
}

fn load_company(conn: &Connection, company_id: CompanyId) -> rusqlite::Result<Option<CompanyRow>> {
    load_company_where(conn, "company_id = ?1", &company_id)
}

fn set_user_company(conn: &Connection, user_id: UserId, company_id: Option<CompanyId>) -> rusqlite::Result<()> {
    conn.execute(
        "UPDATE bot_user SET company_id = ?1 WHERE user_id = ?2",
        params![company_id, user_id as i64],
    )?;
    Ok(())
}

impl BotStore {
    // ── Companies ──────────────────────────────────────────────────

    /// Create a company owned by `owner_id`. The owner must not already
    /// own or belong to one, and the name must be unused (ignoring case).
    pub fn create_company(
        &self,
        owner_id: UserId,
        name: &str,
        creator_role_id: Option<RoleId>,
        now: NaiveDateTime,
    ) -> BotResult<CompanyRow> {
        let name = name.trim();
        if name.is_empty() {
            return Err(BotError::Refused("Company name cannot be empty!".into()));
        }
        let tx = self.conn.unchecked_transaction()?;
        let owner = ensure_user(&tx, owner_id, now)?;

        let key = name_key(name);
        if load_company_where(&tx, "name_key = ?1", &key)?.is_some() {
            return Err(BotError::CompanyNameTaken(name.to_string()));
        }
        if load_company_where(&tx, "owner_id = ?1", &(owner_id as i64))?.is_some() {
            return Err(BotError::Membership("You already own a company!".into()));
        }
        if owner.company_id.is_some() {
            return Err(BotError::Membership(
                "You're already a member of a company! Leave it first.".into(),
            ));
        }

        tx.execute(
            "INSERT INTO company (name, name_key, owner_id, created_at, creator_role_id)
             VALUES (?1, ?2, ?3, ?4, ?5)",
            params![name, key, owner_id as i64, now, creator_role_id.map(|r| r as i64)],
        )?;
        let company_id = tx.last_insert_rowid();
        set_user_company(&tx, owner_id, Some(company_id))?;
        let company = load_company(&tx, company_id)?.ok_or(BotError::CompanyIdNotFound(company_id))?;
        tx.commit()?;
        log::info!("company: created #{company_id} '{name}' owner={owner_id}");
        Ok(company)
    }

    pub fn company(&self, company_id: CompanyId) -> BotResult<Option<CompanyRow>> {
        Ok(load_company(&self.conn, company_id)?)
    }

    /// Case-insensitive lookup by name.
    pub fn company_by_name(&self, name: &str) -> BotResult<Option<CompanyRow>> {
        Ok(load_company_where(&self.conn, "name_key = ?1", &name_key(name))?)
    }

    /// The company a user owns, if any.
    pub fn owned_company(&self, user_id: UserId) -> BotResult<Option<CompanyRow>> {
        Ok(load_company_where(&self.conn, "owner_id = ?1", &(user_id as i64))?)
    }

    /// The company a user belongs to, as owner or employee.
    pub fn company_of_user(&self, user_id: UserId) -> BotResult<Option<CompanyRow>> {
        if let Some(owned) = self.owned_company(user_id)? {
            return Ok(Some(owned));
        }
        let company_id: Option<CompanyId> = self
            .conn
            .query_row(
                "SELECT company_id FROM company_member WHERE user_id = ?1",
                params![user_id as i64],
                |row| row.get(0),
            )
            .optional()?;
        match company_id {
            Some(id) => self.company(id),
            None => Ok(None),
        }
    }

    /// Every company in creation order.
    pub fn all_companies(&self) -> BotResult<Vec<CompanyRow>> {
        let ids: Vec<CompanyId> = {
            let mut stmt = self.conn.prepare("SELECT company_id FROM company ORDER BY company_id ASC")?;
            let rows = stmt.query_map([], |row| row.get(0))?;
            rows.collect::<Result<Vec<_>, _>>()?
        };
        let mut companies = Vec::with_capacity(ids.len());
        for id in ids {
            if let Some(company) = load_company(&self.conn, id)? {
                companies.push(company);
            }
        }
        Ok(companies)
    }

    pub fn company_count(&self) -> BotResult<i64> {
        let count = self
            .conn
            .query_row("SELECT COUNT(*) FROM company", [], |row| row.get(0))?;
        Ok(count)
    }

    /// Add an employee, re-checking the cap and the user's membership
    /// inside the transaction.
    pub fn add_employee(
        &self,
        company_id: CompanyId,
        user_id: UserId,
        max_members: usize,
        now: NaiveDateTime,
    ) -> BotResult<MembershipChange> {
        let tx = self.conn.unchecked_transaction()?;
        let company = load_company(&tx, company_id)?.ok_or(BotError::CompanyIdNotFound(company_id))?;
        let user = ensure_user(&tx, user_id, now)?;

        if company.is_member(user_id) {
            return Err(BotError::Membership("User is already an employee of this company!".into()));
        }
        if user.company_id.is_some() {
            return Err(BotError::Membership("That user is already in a company!".into()));
        }
        let before = company.member_count();
        if before >= max_members {
            return Err(BotError::CompanyFull { max: max_members });
        }

        tx.execute(
            "INSERT INTO company_member (company_id, user_id) VALUES (?1, ?2)",
            params![company_id, user_id as i64],
        )?;
        set_user_company(&tx, user_id, Some(company_id))?;
        tx.commit()?;
        Ok(MembershipChange { before, after: before + 1 })
    }

    /// Remove an employee. Owners cannot be removed this way.
    pub fn remove_employee(&self, company_id: CompanyId, user_id: UserId) -> BotResult<MembershipChange> {
        let tx = self.conn.unchecked_transaction()?;
        let company = load_company(&tx, company_id)?.ok_or(BotError::CompanyIdNotFound(company_id))?;
        if !company.employees.contains(&user_id) {
            return Err(BotError::Membership("User is not an employee of this company!".into()));
        }
        let before = company.member_count();
        tx.execute(
            "DELETE FROM company_member WHERE company_id = ?1 AND user_id = ?2",
            params![company_id, user_id as i64],
        )?;
        set_user_company(&tx, user_id, None)?;
        tx.commit()?;
        Ok(MembershipChange { before, after: before - 1 })
    }

    /// Delete a company and clear the company reference of everyone in
    /// it. Returns the released users, owner first.
    pub fn delete_company(&self, company_id: CompanyId) -> BotResult<Vec<UserId>> {
        let tx = self.conn.unchecked_transaction()?;
        let company = load_company(&tx, company_id)?.ok_or(BotError::CompanyIdNotFound(company_id))?;
        let mut released = vec![company.owner_id];
        released.extend(company.employees.iter().copied());

        tx.execute(
            "UPDATE bot_user SET company_id = NULL WHERE company_id = ?1",
            params![company_id],
        )?;
        tx.execute("DELETE FROM company_member WHERE company_id = ?1", params![company_id])?;
        tx.execute("DELETE FROM company WHERE company_id = ?1", params![company_id])?;
        tx.commit()?;
        log::info!("company: disbanded #{company_id}, released {} member(s)", released.len());
        Ok(released)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn name_key_folds_non_ascii_case() {
        assert_eq!(name_key("  Ünicorn Labs "), name_key("ünicorn labs"));
        assert_ne!(name_key("Acme"), name_key("Acme2"));
    }

    #[test]
    fn threshold_crossings_are_one_sided() {
        let up = MembershipChange { before: 5, after: 6 };
        assert!(up.crossed_above(5));
        assert!(!up.crossed_below(5));
        let down = MembershipChange { before: 6, after: 5 };
        assert!(down.crossed_below(5));
        let flat = MembershipChange { before: 6, after: 7 };
        assert!(!flat.crossed_above(5));
    }
}
