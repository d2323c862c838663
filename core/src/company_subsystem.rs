//! Company subsystem.
//!
//! Companies are player-formed groups with an owner and a capped member
//! list. Members earn the company's activity bonus (see
//! store::record_activity); this subsystem announces when a company
//! crosses the size threshold that adds the size bonus, in either
//! direction.
//!
//! Invitations and disband confirmations are pending state with a
//! deadline. Answering after the deadline, or never, leaves nothing
//! changed; the timer pass drops and announces expired entries.

use crate::{
    command::BotCommand,
    config::{BonusPolicy, CompanyTier},
    error::{BotError, BotResult},
    event::BotEvent,
    platform::Notice,
    response::{money, Reply, Tone},
    store::{CompanyRow, MembershipChange},
    subsystem::{BotSubsystem, CommandContext, Outcome, TimerContext},
    types::{ChannelId, CompanyId, UserId},
};
use chrono::{Duration, NaiveDateTime};
use std::{any::Any, collections::BTreeMap};

#[derive(Debug, Clone, PartialEq)]
pub struct PendingInvite {
    pub company_id: CompanyId,
    pub company_name: String,
    pub inviter_id: UserId,
    pub expires_at: NaiveDateTime,
}

#[derive(Debug, Clone, PartialEq)]
pub struct PendingDisband {
    pub company_id: CompanyId,
    pub company_name: String,
    pub expires_at: NaiveDateTime,
}

#[derive(Default)]
pub struct CompanySubsystem {
    /// Keyed by invitee. One open invitation per user.
    invites: BTreeMap<UserId, PendingInvite>,
    /// Keyed by owner.
    disbands: BTreeMap<UserId, PendingDisband>,
}

/// Bonus text shared by `company` and the threshold announcements.
fn bonus_line(policy: &BonusPolicy, company: &CompanyRow) -> String {
    let amount = policy.activity_bonus(company.creator_role_id, company.member_count());
    let mut text = format!("{} per active member per hour", money(amount));
    if policy.has_size_bonus(company.member_count()) {
        text.push_str(&format!(
            " (includes +{} bonus for having more than {} members)",
            money(policy.size_bonus),
            policy.size_threshold
        ));
    }
    text
}

fn channel_notice(channel: Option<ChannelId>, reply: Reply) -> Option<Notice> {
    channel.map(|id| Notice::channel(id, reply))
}

impl CompanySubsystem {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn pending_invite(&self, invitee: UserId) -> Option<&PendingInvite> {
        self.invites.get(&invitee)
    }

    pub fn pending_disband(&self, owner: UserId) -> Option<&PendingDisband> {
        self.disbands.get(&owner)
    }

    fn owned_or_refuse(ctx: &CommandContext<'_>) -> BotResult<CompanyRow> {
        ctx.store
            .owned_company(ctx.actor.user_id)?
            .ok_or_else(|| BotError::PermissionDenied("You don't own a company!".into()))
    }

    /// Announcements for a membership change that crossed the size
    /// threshold. Returns the events and the text, if anything crossed.
    fn threshold_announcement(
        policy: &BonusPolicy,
        company: &CompanyRow,
        change: MembershipChange,
    ) -> Option<(BotEvent, String)> {
        let base = policy.base_bonus(company.creator_role_id);
        if change.crossed_above(policy.size_threshold) {
            let bonus = base + policy.size_bonus;
            let text = format!(
                "🎉 **BONUS UNLOCKED!** 🎉\n{} now has {} members and qualifies for the +{} bonus per active member!\nNew activity bonus: {} per active member per hour",
                company.name,
                change.after,
                money(policy.size_bonus),
                money(bonus)
            );
            return Some((BotEvent::SizeBonusUnlocked { company_id: company.company_id, bonus }, text));
        }
        if change.crossed_below(policy.size_threshold) {
            let text = format!(
                "**NOTICE:** {} now has {} members and has lost the +{} activity bonus! The company now earns {} per active member per hour.",
                company.name,
                change.after,
                money(policy.size_bonus),
                money(base)
            );
            return Some((BotEvent::SizeBonusLost { company_id: company.company_id, bonus: base }, text));
        }
        None
    }

    // ── Creation and lookup ────────────────────────────────────────

    fn create(&mut self, ctx: &mut CommandContext<'_>, name: &str) -> BotResult<Outcome> {
        let policy = &ctx.config.bonus;
        let tier: Option<&CompanyTier> = policy
            .tiers
            .iter()
            .find(|t| ctx.actor.role_ids.contains(&t.role_id));
        let Some(tier) = tier else {
            let names: Vec<String> = policy.tiers.iter().map(|t| format!("'{}'", t.name)).collect();
            return Err(BotError::PermissionDenied(format!(
                "You need the {} role to create a company!",
                names.join(" or ")
            )));
        };

        let owner_id = ctx.actor.user_id;
        if let Some(owned) = ctx.store.owned_company(owner_id)? {
            return Err(BotError::Membership(format!(
                "You already own a company called '{}'!",
                owned.name
            )));
        }
        if let Some(member_of) = ctx.store.company_of_user(owner_id)? {
            return Err(BotError::Membership(format!(
                "You're already a member of '{}'. You must leave it first!",
                member_of.name
            )));
        }
        if ctx.store.company_by_name(name)?.is_some() {
            return Err(BotError::CompanyNameTaken(name.trim().to_string()));
        }

        let company = ctx.store.create_company(owner_id, name, Some(tier.role_id), ctx.now)?;
        let p = &ctx.config.prefix;
        let reply = Reply::success(
            "Company Created",
            format!("Congratulations! You've created '{}'!", company.name),
        )
        .field("Owner", ctx.actor.mention())
        .field("Activity Bonus", format!("{} per hour per active member", money(tier.base_bonus)))
        .field("Member Limit", format!("Maximum of {} members", ctx.config.company.max_members))
        .field("Next Steps", format!("Invite members using `{p}invite @user`"));

        let mut outcome = Outcome::reply(reply).with_event(BotEvent::CompanyCreated {
            company_id: company.company_id,
            owner_id,
            name: company.name.clone(),
        });
        if let Some(notice) = channel_notice(
            ctx.config.company.notification_channel_id,
            Reply::info(
                "New Company Created",
                format!(
                    "🏢 {} has created a new company called '{}'!",
                    ctx.actor.mention(),
                    company.name
                ),
            ),
        ) {
            outcome.notices.push(notice);
        }
        Ok(outcome)
    }

    fn info(&self, ctx: &mut CommandContext<'_>, name: Option<&str>) -> BotResult<Outcome> {
        let company = match name {
            Some(name) => ctx
                .store
                .company_by_name(name)?
                .ok_or_else(|| BotError::Refused(format!("Company '{}' not found!", name.trim())))?,
            None => ctx.store.company_of_user(ctx.actor.user_id)?.ok_or_else(|| {
                BotError::Membership("You are not part of any company! Join one or create your own.".into())
            })?,
        };

        let cfg = &ctx.config.company;
        let mut reply = Reply::new(Tone::Info, format!("{} - Company Info", company.name))
            .field("Owner", ctx.name_of(company.owner_id))
            .inline_field("Created", company.created_at.format("%Y-%m-%d").to_string())
            .inline_field("Members", format!("{}/{}", company.member_count(), cfg.max_members))
            .field("Activity Bonus", bonus_line(&ctx.config.bonus, &company));

        if !company.employees.is_empty() {
            let shown: Vec<String> = company
                .employees
                .iter()
                .take(cfg.list_limit)
                .map(|id| ctx.name_of(*id))
                .collect();
            let more = if company.employees.len() > cfg.list_limit { "..." } else { "" };
            reply = reply.field("Employee List", format!("{}{more}", shown.join(", ")));
        }
        Ok(Outcome::reply(reply))
    }

    fn list(&self, ctx: &mut CommandContext<'_>) -> BotResult<Outcome> {
        let companies = ctx.store.all_companies()?;
        if companies.is_empty() {
            return Ok(Outcome::reply(Reply::info(
                "Companies Directory",
                "There are no companies on this server yet!",
            )));
        }
        let limit = ctx.config.company.list_limit;
        let mut reply = Reply::new(Tone::Info, "Companies Directory")
            .describe(format!("There are {} companies on this server", companies.len()));
        for company in companies.iter().take(limit) {
            reply = reply.field(
                company.name.clone(),
                format!(
                    "👑 Owner: {}\n👥 Employees: {}",
                    ctx.name_of(company.owner_id),
                    company.employees.len()
                ),
            );
        }
        if companies.len() > limit {
            reply = reply.footer(format!("Showing {limit} of {} companies", companies.len()));
        }
        Ok(Outcome::reply(reply))
    }

    // ── Invitations ────────────────────────────────────────────────

    fn invite(&mut self, ctx: &mut CommandContext<'_>, invitee: UserId) -> BotResult<Outcome> {
        if invitee == ctx.actor.user_id {
            return Err(BotError::SelfTarget("You can't invite yourself!"));
        }
        let company = Self::owned_or_refuse(ctx)?;
        let cfg = &ctx.config.company;
        if company.member_count() >= cfg.max_members {
            return Err(BotError::CompanyFull { max: cfg.max_members });
        }
        let invitee_name = ctx.name_of(invitee);
        if ctx.store.company_of_user(invitee)?.is_some() {
            return Err(BotError::Membership(format!("{invitee_name} is already in a company!")));
        }
        if let Some(open) = self.invites.get(&invitee) {
            if ctx.now < open.expires_at {
                return Err(BotError::Refused(format!(
                    "{invitee_name} already has a pending invitation to '{}'!",
                    open.company_name
                )));
            }
        }

        let expires_at = ctx.now + Duration::seconds(cfg.invite_timeout_secs);
        self.invites.insert(
            invitee,
            PendingInvite {
                company_id: company.company_id,
                company_name: company.name.clone(),
                inviter_id: ctx.actor.user_id,
                expires_at,
            },
        );
        log::debug!("company: #{} invited user={invitee}", company.company_id);

        let p = &ctx.config.prefix;
        let how = format!(
            "`{p}acceptinvite` - Accept invitation\n`{p}declineinvite` - Decline invitation\nExpires in {} minutes.",
            cfg.invite_timeout_secs / 60
        );
        let reply = Reply::new(Tone::Info, "Company Invitation")
            .describe(format!(
                "<@{invitee}>, {} is inviting you to join '{}'!",
                ctx.actor.display_name, company.name
            ))
            .field("How to respond", how.clone());
        let dm = Reply::new(Tone::Info, "Company Invitation")
            .describe(format!(
                "{} is inviting you to join '{}'!",
                ctx.actor.display_name, company.name
            ))
            .field("How to respond", how);
        Ok(Outcome::reply(reply).with_notice(Notice::dm(invitee, dm)))
    }

    fn take_invite(&mut self, invitee: UserId, now: NaiveDateTime) -> BotResult<PendingInvite> {
        match self.invites.remove(&invitee) {
            Some(invite) if now < invite.expires_at => Ok(invite),
            Some(_) => Err(BotError::Refused("Your company invitation has expired.".into())),
            None => Err(BotError::Refused("You don't have a pending company invitation!".into())),
        }
    }

    fn accept_invite(&mut self, ctx: &mut CommandContext<'_>) -> BotResult<Outcome> {
        let invitee = ctx.actor.user_id;
        let invite = self.take_invite(invitee, ctx.now)?;
        let change = ctx.store.add_employee(
            invite.company_id,
            invitee,
            ctx.config.company.max_members,
            ctx.now,
        )?;
        let company = ctx
            .store
            .company(invite.company_id)?
            .ok_or(BotError::CompanyIdNotFound(invite.company_id))?;
        log::info!(
            "company: user={invitee} joined #{} ({} -> {} members)",
            company.company_id,
            change.before,
            change.after
        );

        let joined = format!("{} has joined {}!", ctx.actor.mention(), company.name);
        let mut outcome = Outcome::default().with_event(BotEvent::MemberJoined {
            company_id: company.company_id,
            user_id: invitee,
            member_count: change.after,
        });
        match Self::threshold_announcement(&ctx.config.bonus, &company, change) {
            Some((event, text)) => {
                let text = format!("{joined}\n{text}");
                outcome.reply = Some(Reply::success("Bonus Unlocked", text.clone()));
                outcome.events.push(event);
                if let Some(notice) = channel_notice(
                    ctx.config.company.notification_channel_id,
                    Reply::success("Bonus Unlocked", text),
                ) {
                    outcome.notices.push(notice);
                }
            }
            None => outcome.reply = Some(Reply::success("Invitation Accepted", joined)),
        }
        Ok(outcome)
    }

    fn decline_invite(&mut self, ctx: &mut CommandContext<'_>) -> BotResult<Outcome> {
        let invite = self.take_invite(ctx.actor.user_id, ctx.now)?;
        let text = format!("{} declined the invitation to '{}'.", ctx.actor.mention(), invite.company_name);
        Ok(Outcome::reply(Reply::info("Invitation Declined", text.clone()))
            .with_notice(Notice::dm(invite.inviter_id, Reply::info("Invitation Declined", text))))
    }

    // ── Leaving ────────────────────────────────────────────────────

    /// Shared tail of leave and kick: events plus bonus-lost notices.
    fn departure(
        ctx: &CommandContext<'_>,
        company: &CompanyRow,
        user_id: UserId,
        change: MembershipChange,
        kicked: bool,
        outcome: &mut Outcome,
    ) {
        outcome.events.push(BotEvent::MemberLeft {
            company_id: company.company_id,
            user_id,
            member_count: change.after,
            kicked,
        });
        if let Some((event, text)) = Self::threshold_announcement(&ctx.config.bonus, company, change) {
            outcome.events.push(event);
            outcome.notices.push(Notice::origin(Reply::warning("Bonus Lost", text.clone())));
            if company.owner_id != ctx.actor.user_id {
                outcome
                    .notices
                    .push(Notice::dm(company.owner_id, Reply::warning("Bonus Lost", text)));
            }
        }
    }

    fn leave(&mut self, ctx: &mut CommandContext<'_>) -> BotResult<Outcome> {
        let user_id = ctx.actor.user_id;
        let company = ctx
            .store
            .company_of_user(user_id)?
            .ok_or_else(|| BotError::Membership("You are not part of any company!".into()))?;
        if company.owner_id == user_id {
            return Err(BotError::Refused(format!(
                "As the owner, you cannot leave your company. Use `{}disband` to disband it instead.",
                ctx.config.prefix
            )));
        }
        let change = ctx.store.remove_employee(company.company_id, user_id)?;
        let mut outcome = Outcome::reply(Reply::success(
            "Left Company",
            format!("You have left '{}'!", company.name),
        ));
        Self::departure(ctx, &company, user_id, change, false, &mut outcome);
        Ok(outcome)
    }

    fn kick(&mut self, ctx: &mut CommandContext<'_>, target: UserId) -> BotResult<Outcome> {
        let company = Self::owned_or_refuse(ctx)?;
        let target_name = ctx.name_of(target);
        if !company.employees.contains(&target) {
            return Err(BotError::Membership(format!(
                "{target_name} is not a member of your company!"
            )));
        }
        let change = ctx.store.remove_employee(company.company_id, target)?;
        let mut outcome = Outcome::reply(Reply::success(
            "Member Kicked",
            format!("Kicked {target_name} from your company!"),
        ))
        .with_notice(Notice::dm(
            target,
            Reply::warning("Kicked", format!("You have been kicked from {}!", company.name)),
        ));
        Self::departure(ctx, &company, target, change, true, &mut outcome);
        Ok(outcome)
    }

    // ── Disbanding ─────────────────────────────────────────────────

    fn disband(&mut self, ctx: &mut CommandContext<'_>) -> BotResult<Outcome> {
        let company = Self::owned_or_refuse(ctx)?;
        let secs = ctx.config.company.disband_confirm_secs;
        self.disbands.insert(
            ctx.actor.user_id,
            PendingDisband {
                company_id: company.company_id,
                company_name: company.name.clone(),
                expires_at: ctx.now + Duration::seconds(secs),
            },
        );
        let p = &ctx.config.prefix;
        let reply = Reply::warning(
            "Confirm Company Disbanding",
            format!("Are you sure you want to disband '{}'? This cannot be undone!", company.name),
        )
        .field(
            "How to respond",
            format!(
                "`{p}confirmdisband` - Yes, disband company\n`{p}canceldisband` - No, keep company\nExpires in {secs} seconds."
            ),
        );
        Ok(Outcome::reply(reply))
    }

    fn take_disband(&mut self, owner: UserId, now: NaiveDateTime) -> BotResult<PendingDisband> {
        match self.disbands.remove(&owner) {
            Some(pending) if now < pending.expires_at => Ok(pending),
            Some(_) => Err(BotError::Refused("Disbanding confirmation timed out.".into())),
            None => Err(BotError::Refused("You have no company disbanding to confirm!".into())),
        }
    }

    fn confirm_disband(&mut self, ctx: &mut CommandContext<'_>) -> BotResult<Outcome> {
        let pending = self.take_disband(ctx.actor.user_id, ctx.now)?;
        let released = ctx.store.delete_company(pending.company_id)?;
        self.invites.retain(|_, invite| invite.company_id != pending.company_id);

        let mut outcome = Outcome::reply(Reply::success(
            "Company Disbanded",
            format!("'{}' has been disbanded.", pending.company_name),
        ));
        for &user_id in released.iter().filter(|id| **id != ctx.actor.user_id) {
            outcome.notices.push(Notice::dm(
                user_id,
                Reply::warning(
                    "Company Disbanded",
                    format!("'{}' has been disbanded by its owner.", pending.company_name),
                ),
            ));
        }
        outcome.events.push(BotEvent::CompanyDisbanded { company_id: pending.company_id, released });
        Ok(outcome)
    }

    fn cancel_disband(&mut self, ctx: &mut CommandContext<'_>) -> BotResult<Outcome> {
        self.take_disband(ctx.actor.user_id, ctx.now)?;
        Ok(Outcome::reply(Reply::info("Disband Cancelled", "Company disbanding cancelled.")))
    }
}

impl BotSubsystem for CompanySubsystem {
    fn name(&self) -> &'static str {
        "company"
    }

    fn handles(&self, command: &BotCommand) -> bool {
        matches!(
            command,
            BotCommand::CreateCompany { .. }
                | BotCommand::CompanyInfo { .. }
                | BotCommand::Invite { .. }
                | BotCommand::AcceptInvite
                | BotCommand::DeclineInvite
                | BotCommand::Leave
                | BotCommand::Kick { .. }
                | BotCommand::Disband
                | BotCommand::ConfirmDisband
                | BotCommand::CancelDisband
                | BotCommand::Companies
        )
    }

    fn handle(&mut self, ctx: &mut CommandContext<'_>, command: &BotCommand) -> BotResult<Outcome> {
        match command {
            BotCommand::CreateCompany { name } => self.create(ctx, name),
            BotCommand::CompanyInfo { name }   => self.info(ctx, name.as_deref()),
            BotCommand::Invite { user }        => self.invite(ctx, *user),
            BotCommand::AcceptInvite           => self.accept_invite(ctx),
            BotCommand::DeclineInvite          => self.decline_invite(ctx),
            BotCommand::Leave                  => self.leave(ctx),
            BotCommand::Kick { user }          => self.kick(ctx, *user),
            BotCommand::Disband                => self.disband(ctx),
            BotCommand::ConfirmDisband         => self.confirm_disband(ctx),
            BotCommand::CancelDisband          => self.cancel_disband(ctx),
            BotCommand::Companies              => self.list(ctx),
            other => Err(BotError::Other(anyhow::anyhow!("company cannot handle {}", other.name()))),
        }
    }

    fn on_timer(&mut self, ctx: &mut TimerContext<'_>) -> BotResult<Outcome> {
        let now = ctx.now;
        let mut outcome = Outcome::default();

        let expired: Vec<(UserId, PendingInvite)> = self
            .invites
            .iter()
            .filter(|(_, invite)| now >= invite.expires_at)
            .map(|(id, invite)| (*id, invite.clone()))
            .collect();
        for (invitee, invite) in expired {
            self.invites.remove(&invitee);
            outcome.notices.push(Notice::dm(
                invite.inviter_id,
                Reply::warning(
                    "Invitation Expired",
                    format!("The invitation to <@{invitee}> to join '{}' has expired.", invite.company_name),
                ),
            ));
        }

        let timed_out: Vec<UserId> = self
            .disbands
            .iter()
            .filter(|(_, pending)| now >= pending.expires_at)
            .map(|(owner, _)| *owner)
            .collect();
        for owner in timed_out {
            self.disbands.remove(&owner);
            outcome.notices.push(Notice::dm(
                owner,
                Reply::info("Disband", "Disbanding confirmation timed out."),
            ));
        }
        Ok(outcome)
    }

    fn as_any(&self) -> &dyn Any {
        self
    }

    fn as_any_mut(&mut self) -> &mut dyn Any {
        self
    }
}
