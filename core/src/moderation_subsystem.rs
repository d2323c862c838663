//! Moderation subsystem: paid, role-gated timeouts.
//!
//! A member holding a timeout-granting role may pay to mute another
//! member for the longest duration any of their roles grants. The cost
//! is debited before the platform call and refunded if the platform
//! refuses. Every applied timeout lands in the audit log.

use crate::{
    command::BotCommand,
    config::TimeoutGrant,
    error::{BotError, BotResult},
    event::BotEvent,
    response::{money, Reply, Tone},
    subsystem::{BotSubsystem, CommandContext, Outcome},
    types::UserId,
};
use std::any::Any;

#[derive(Default)]
pub struct ModerationSubsystem;

/// `45 seconds`, `1 minute`, `5 minutes`.
pub fn format_grant(seconds: u64) -> String {
    if seconds < 60 {
        return format!("{seconds} seconds");
    }
    let minutes = seconds / 60;
    format!("{minutes} minute{}", if minutes > 1 { "s" } else { "" })
}

impl ModerationSubsystem {
    pub fn new() -> Self {
        Self
    }

    fn grant_for<'c>(ctx: &'c CommandContext<'_>) -> Option<&'c TimeoutGrant> {
        ctx.config.moderation.best_grant(&ctx.actor.role_ids)
    }

    fn timeout(&self, ctx: &mut CommandContext<'_>, target: UserId) -> BotResult<Outcome> {
        let actor_id = ctx.actor.user_id;
        if target == actor_id {
            return Err(BotError::SelfTarget("You can't time yourself out!"));
        }
        let cfg = &ctx.config.moderation;
        let member = ctx
            .platform
            .member(target)
            .ok_or_else(|| BotError::Refused(format!("User {target} is not a member of this server!")))?;
        if let Some(role) = cfg.protected_role(&member.role_ids) {
            return Err(BotError::PermissionDenied(format!(
                "You cannot time out users with the {} role!",
                role.name
            )));
        }
        let seconds = Self::grant_for(ctx)
            .map(|g| g.seconds)
            .ok_or_else(|| BotError::PermissionDenied("You don't have permission to time out users!".into()))?;

        let cost = cfg.timeout_cost;
        let wallet = ctx.store.get_or_create_user(actor_id, ctx.now)?.wallet;
        if wallet < cost {
            return Err(BotError::InsufficientWallet { needed: cost, available: wallet });
        }
        ctx.store.remove_money(actor_id, cost)?;

        let reason = format!("Timed out by {}", ctx.actor.display_name);
        if let Err(err) = ctx.platform.apply_timeout(target, seconds, &reason) {
            log::warn!("moderation: timeout of user={target} failed ({err}), refunding {}", money(cost));
            ctx.store.add_money(actor_id, cost, ctx.now)?;
            let reply = Reply::error("I don't have permission to time out this user!");
            return Ok(Outcome::reply(reply).with_event(BotEvent::TimeoutRefunded {
                moderator_id: actor_id,
                target_id: target,
                cost,
            }));
        }

        ctx.store.add_timeout_log(actor_id, target, seconds, ctx.now)?;
        log::info!("moderation: user={actor_id} timed out user={target} for {seconds}s");
        let reply = Reply::new(Tone::Success, "💣 BOMB DEPLOYED! 💣")
            .describe(format!(
                "{} has been timed out for {seconds} seconds by {}!",
                member.mention(),
                ctx.actor.mention()
            ))
            .footer("The user has been temporarily muted");
        Ok(Outcome::reply(reply).with_event(BotEvent::TimeoutApplied {
            moderator_id: actor_id,
            target_id: target,
            duration_secs: seconds,
            cost,
        }))
    }

    fn cost(&self, ctx: &mut CommandContext<'_>) -> BotResult<Outcome> {
        let text = format!("It costs {} to time someone out!", money(ctx.config.moderation.timeout_cost));
        Ok(Outcome::reply(Reply::info("Timeout Cost", text).private()))
    }

    fn limit(&self, ctx: &mut CommandContext<'_>) -> BotResult<Outcome> {
        let reply = match Self::grant_for(ctx) {
            Some(grant) => Reply::info(
                "Timeout Limit",
                format!(
                    "With your role {}, you can time out users for {}!",
                    grant.name,
                    format_grant(grant.seconds)
                ),
            ),
            None => Reply::info("Timeout Limit", "You don't have any roles that allow you to time out users!"),
        };
        Ok(Outcome::reply(reply.private()))
    }

    fn history(&self, ctx: &mut CommandContext<'_>, user: Option<UserId>) -> BotResult<Outcome> {
        let target = user.unwrap_or(ctx.actor.user_id);
        let target_name = ctx.name_of(target);
        let logs = ctx
            .store
            .timeout_logs_for(target, ctx.config.moderation.history_limit)?;
        if logs.is_empty() {
            return Ok(Outcome::reply(Reply::info(
                "Timeout History",
                format!("{target_name} has no timeout history!"),
            )));
        }
        let mut reply = Reply::new(Tone::Warning, format!("💣 Timeout History for {target_name}"));
        for entry in &logs {
            reply = reply.field(
                entry.created_at.format("%Y-%m-%d %H:%M").to_string(),
                format!(
                    "By: {}\nDuration: {} seconds",
                    ctx.name_of(entry.moderator_id),
                    entry.duration_secs
                ),
            );
        }
        Ok(Outcome::reply(reply))
    }
}

impl BotSubsystem for ModerationSubsystem {
    fn name(&self) -> &'static str {
        "moderation"
    }

    fn handles(&self, command: &BotCommand) -> bool {
        matches!(
            command,
            BotCommand::Timeout { .. }
                | BotCommand::TimeoutCost
                | BotCommand::TimeoutLimit
                | BotCommand::TimeoutHistory { .. }
        )
    }

    fn handle(&mut self, ctx: &mut CommandContext<'_>, command: &BotCommand) -> BotResult<Outcome> {
        match command {
            BotCommand::Timeout { target }      => self.timeout(ctx, *target),
            BotCommand::TimeoutCost             => self.cost(ctx),
            BotCommand::TimeoutLimit            => self.limit(ctx),
            BotCommand::TimeoutHistory { user } => self.history(ctx, *user),
            other => Err(BotError::Other(anyhow::anyhow!("moderation cannot handle {}", other.name()))),
        }
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
    use super::format_grant;

    #[test]
    fn grants_read_in_seconds_then_minutes() {
        assert_eq!(format_grant(30), "30 seconds");
        assert_eq!(format_grant(60), "1 minute");
        assert_eq!(format_grant(300), "5 minutes");
    }
}
