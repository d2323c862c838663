//! Quest subsystem.
//!
//! STATE MACHINE (per user):
//!   idle ──quest──▶ offered ──acceptquest──▶ active ──deadline──▶ idle
//!                      │                                  (success roll)
//!                      ├──declinequest──▶ idle
//!                      └──offer timeout──▶ idle
//!
//! The per-user cooldown starts when the offer is made, whatever the
//! user does with it. Deadlines are resolved by the engine's timer pass.

use crate::{
    clock::format_remaining,
    command::BotCommand,
    error::{BotError, BotResult},
    event::BotEvent,
    platform::Notice,
    quest::{Quest, QuestGenerator, QuestSource},
    response::{money, Reply, Tone},
    subsystem::{BotSubsystem, CommandContext, Outcome, TimerContext},
    types::UserId,
};
use chrono::{Duration, NaiveDateTime};
use std::{any::Any, collections::BTreeMap};

#[derive(Debug, Clone)]
pub struct QuestOffer {
    pub quest: Quest,
    pub expires_at: NaiveDateTime,
}

#[derive(Debug, Clone)]
pub struct ActiveQuest {
    pub quest: Quest,
    pub due_at: NaiveDateTime,
}

pub struct QuestSubsystem {
    generator: QuestGenerator,
    cooldown_until: BTreeMap<UserId, NaiveDateTime>,
    offers: BTreeMap<UserId, QuestOffer>,
    active: BTreeMap<UserId, ActiveQuest>,
}

impl QuestSubsystem {
    pub fn new(generator: QuestGenerator) -> Self {
        Self {
            generator,
            cooldown_until: BTreeMap::new(),
            offers: BTreeMap::new(),
            active: BTreeMap::new(),
        }
    }

    /// Put an external generator ahead of the built-in table.
    pub fn set_source(&mut self, source: Box<dyn QuestSource>) {
        self.generator.set_primary(source);
    }

    pub fn offer_for(&self, user_id: UserId) -> Option<&QuestOffer> {
        self.offers.get(&user_id)
    }

    pub fn active_for(&self, user_id: UserId) -> Option<&ActiveQuest> {
        self.active.get(&user_id)
    }

    fn offer(&mut self, ctx: &mut CommandContext<'_>) -> BotResult<Outcome> {
        let user_id = ctx.actor.user_id;
        if let Some(until) = self.cooldown_until.get(&user_id) {
            if ctx.now < *until {
                return Err(BotError::Cooldown(format!(
                    "You need to wait {} before getting another quest!",
                    format_remaining(*until - ctx.now)
                )));
            }
        }
        if self.active.contains_key(&user_id) {
            return Err(BotError::Refused("You already have a quest in progress!".into()));
        }

        let quest = self.generator.generate(&ctx.actor.display_name, ctx.rng);
        let cfg = &ctx.config.quest;
        self.cooldown_until
            .insert(user_id, ctx.now + Duration::seconds(cfg.cooldown_secs));
        self.offers.insert(
            user_id,
            QuestOffer {
                quest: quest.clone(),
                expires_at: ctx.now + Duration::seconds(cfg.offer_timeout_secs),
            },
        );

        let p = &ctx.config.prefix;
        let reply = Reply::new(Tone::Info, format!("Quest for {}", ctx.actor.display_name))
            .describe(quest.description.clone())
            .field("Reward", money(quest.reward))
            .field("Time Limit", format!("{} minutes", quest.time_limit_minutes))
            .footer(format!(
                "Use {p}acceptquest or {p}declinequest within {} seconds.",
                cfg.offer_timeout_secs
            ));
        Ok(Outcome::reply(reply).with_event(BotEvent::QuestOffered {
            user_id,
            title: quest.title,
            reward: quest.reward,
        }))
    }

    /// Take the caller's offer, treating an expired one as absent.
    fn take_offer(&mut self, user_id: UserId, now: NaiveDateTime) -> BotResult<QuestOffer> {
        match self.offers.remove(&user_id) {
            Some(offer) if now < offer.expires_at => Ok(offer),
            Some(_) => Err(BotError::Refused("Your quest offer expired.".into())),
            None => Err(BotError::Refused("You don't have a quest offer to answer!".into())),
        }
    }

    fn accept(&mut self, ctx: &mut CommandContext<'_>) -> BotResult<Outcome> {
        let user_id = ctx.actor.user_id;
        let offer = self.take_offer(user_id, ctx.now)?;
        let minutes = offer.quest.time_limit_minutes;
        let due_at = ctx.now + Duration::minutes(minutes);
        self.active.insert(user_id, ActiveQuest { quest: offer.quest, due_at });
        let reply = Reply::success(
            "Quest Accepted",
            format!("Quest accepted! You have {minutes} minutes to complete it."),
        );
        Ok(Outcome::reply(reply).with_event(BotEvent::QuestAccepted { user_id, due_at }))
    }

    fn decline(&mut self, ctx: &mut CommandContext<'_>) -> BotResult<Outcome> {
        self.take_offer(ctx.actor.user_id, ctx.now)?;
        let minutes = ctx.config.quest.cooldown_secs / 60;
        Ok(Outcome::reply(Reply::info(
            "Quest Declined",
            format!("Quest declined. You can get another quest in {minutes} minutes."),
        )))
    }
}

impl BotSubsystem for QuestSubsystem {
    fn name(&self) -> &'static str {
        "quest"
    }

    fn handles(&self, command: &BotCommand) -> bool {
        matches!(command, BotCommand::Quest | BotCommand::AcceptQuest | BotCommand::DeclineQuest)
    }

    fn handle(&mut self, ctx: &mut CommandContext<'_>, command: &BotCommand) -> BotResult<Outcome> {
        match command {
            BotCommand::Quest        => self.offer(ctx),
            BotCommand::AcceptQuest  => self.accept(ctx),
            BotCommand::DeclineQuest => self.decline(ctx),
            other => Err(BotError::Other(anyhow::anyhow!("quest cannot handle {}", other.name()))),
        }
    }

    fn on_timer(&mut self, ctx: &mut TimerContext<'_>) -> BotResult<Outcome> {
        let now = ctx.now;
        let mut outcome = Outcome::default();

        let expired: Vec<UserId> = self
            .offers
            .iter()
            .filter(|(_, offer)| now >= offer.expires_at)
            .map(|(user_id, _)| *user_id)
            .collect();
        for user_id in expired {
            self.offers.remove(&user_id);
            outcome.notices.push(Notice::dm(
                user_id,
                Reply::warning("Quest", format!("<@{user_id}>, quest offer expired.")),
            ));
        }

        let due: Vec<UserId> = self
            .active
            .iter()
            .filter(|(_, active)| now >= active.due_at)
            .map(|(user_id, _)| *user_id)
            .collect();
        for user_id in due {
            let Some(active) = self.active.remove(&user_id) else {
                continue;
            };
            let reward = active.quest.reward;
            let succeeded = ctx.rng.chance(ctx.config.quest.success_chance);
            let reply = if succeeded {
                ctx.store.add_money(user_id, reward, now)?;
                Reply::success(
                    "Quest Complete",
                    format!("<@{user_id}>, you completed the quest and earned {}!", money(reward)),
                )
            } else {
                Reply::warning(
                    "Quest Failed",
                    format!("<@{user_id}>, you failed to complete the quest. Better luck next time!"),
                )
            };
            log::debug!("quest: user={user_id} '{}' succeeded={succeeded}", active.quest.title);
            outcome.notices.push(Notice::dm(user_id, reply));
            outcome.events.push(BotEvent::QuestFinished {
                user_id,
                succeeded,
                reward: if succeeded { reward } else { 0 },
            });
        }

        self.cooldown_until.retain(|_, until| now < *until);
        Ok(outcome)
    }

    fn as_any(&self) -> &dyn Any {
        self
    }

    fn as_any_mut(&mut self) -> &mut dyn Any {
        self
    }
}
