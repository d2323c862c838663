//! Robbery subsystem.
//!
//! Robbing needs a crowd: attempts against a target accumulate distinct
//! robbers until the quorum is reached, then a random slice of the
//! target's wallet is split evenly between them. A robbed target is
//! immune for the cooldown.
//!
//! Attempts and cooldowns are in-memory only and reset on restart.

use crate::{
    command::BotCommand,
    error::{BotError, BotResult},
    event::BotEvent,
    response::{money, Reply},
    subsystem::{BotSubsystem, CommandContext, Outcome, TimerContext},
    types::{Money, UserId},
};
use chrono::{Duration, NaiveDateTime};
use std::{any::Any, collections::HashMap};

#[derive(Default)]
pub struct RobberySubsystem {
    /// Robbers gathered against each target, in join order.
    attempts: HashMap<UserId, Vec<UserId>>,
    /// When each target was last robbed.
    last_robbed: HashMap<UserId, NaiveDateTime>,
}

impl RobberySubsystem {
    pub fn new() -> Self {
        Self::default()
    }

    /// Robbers currently gathered against `target`.
    pub fn participants(&self, target: UserId) -> &[UserId] {
        self.attempts.get(&target).map(Vec::as_slice).unwrap_or(&[])
    }

    pub fn is_immune(&self, target: UserId, now: NaiveDateTime, cooldown_secs: i64) -> bool {
        self.last_robbed
            .get(&target)
            .is_some_and(|at| now < *at + Duration::seconds(cooldown_secs))
    }

    fn rob(&mut self, ctx: &mut CommandContext<'_>, target: UserId) -> BotResult<Outcome> {
        let robber = ctx.actor.user_id;
        let cfg = ctx.config.robbery.clone();
        if robber == target {
            return Err(BotError::SelfTarget("You can't rob yourself!"));
        }
        let target_name = ctx.name_of(target);
        if self.is_immune(target, ctx.now, cfg.cooldown_secs) {
            return Err(BotError::Cooldown(format!(
                "{target_name} has already been robbed recently. Try again later!"
            )));
        }

        let crew = self.attempts.entry(target).or_default();
        if crew.contains(&robber) {
            return Err(BotError::Refused("You're already part of this robbery attempt!".into()));
        }
        crew.push(robber);
        let participants = crew.len();
        let joined = BotEvent::RobberyJoined { target_id: target, robber_id: robber, participants };

        if participants < cfg.min_robbers {
            let reply = Reply::info(
                "Robbery Attempt",
                format!(
                    "{} wants to rob {target_name}! {} more people needed! Use {}rob {target_name} to join.",
                    ctx.actor.display_name,
                    cfg.min_robbers - participants,
                    ctx.config.prefix
                ),
            );
            return Ok(Outcome::reply(reply).with_event(joined));
        }

        let robbers = self.attempts.remove(&target).unwrap_or_default();
        let victim = ctx.store.get_or_create_user(target, ctx.now)?;
        if victim.wallet <= 0 {
            log::debug!("robbery: target={target} has an empty wallet, attempt discarded");
            let reply = Reply::warning(
                "Robbery Failed",
                format!("{target_name} has no money in their wallet to rob!"),
            );
            return Ok(Outcome::reply(reply).with_event(joined));
        }

        let fraction = ctx.rng.uniform(cfg.min_fraction, cfg.max_fraction);
        let take = Self::take_for(victim.wallet, fraction, cfg.min_take);
        let share = ctx.store.execute_robbery(target, &robbers, take, ctx.now)?;
        self.last_robbed.insert(target, ctx.now);
        log::info!(
            "robbery: {} robbers took {} from target={target}, share={}",
            robbers.len(),
            money(take),
            money(share)
        );

        let mentions: Vec<String> = robbers.iter().map(|id| format!("<@{id}>")).collect();
        let reply = Reply::success(
            "Robbery Successful",
            format!(
                "Robbery successful! {} robbed <@{target}> of {} and each got {}!",
                mentions.join(" "),
                money(take),
                money(share)
            ),
        );
        Ok(Outcome::reply(reply)
            .with_event(joined)
            .with_event(BotEvent::RobberyCompleted { target_id: target, robbers, amount: take, share }))
    }

    /// `fraction` of the wallet, at least `min_take`, never more than the wallet.
    pub fn take_for(wallet: Money, fraction: f64, min_take: Money) -> Money {
        let raw = (wallet as f64 * fraction) as Money;
        raw.max(min_take).min(wallet)
    }
}

impl BotSubsystem for RobberySubsystem {
    fn name(&self) -> &'static str {
        "robbery"
    }

    fn handles(&self, command: &BotCommand) -> bool {
        matches!(command, BotCommand::Rob { .. })
    }

    fn handle(&mut self, ctx: &mut CommandContext<'_>, command: &BotCommand) -> BotResult<Outcome> {
        match command {
            BotCommand::Rob { target } => self.rob(ctx, *target),
            other => Err(BotError::Other(anyhow::anyhow!("robbery cannot handle {}", other.name()))),
        }
    }

    fn on_timer(&mut self, ctx: &mut TimerContext<'_>) -> BotResult<Outcome> {
        let window = Duration::seconds(ctx.config.robbery.cooldown_secs);
        let now = ctx.now;
        self.last_robbed.retain(|_, at| now < *at + window);
        Ok(Outcome::default())
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
    fn take_is_clamped_between_minimum_and_wallet() {
        assert_eq!(RobberySubsystem::take_for(1000, 0.2, 10), 200);
        assert_eq!(RobberySubsystem::take_for(40, 0.1, 10), 10);
        assert_eq!(RobberySubsystem::take_for(7, 0.25, 10), 7);
    }
}
