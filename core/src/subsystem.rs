//! Subsystem trait and handler context.
//!
//! RULE: Every feature implements BotSubsystem.
//! The engine offers each command to the subsystems in registration
//! order; the first whose handles() returns true runs it. On every timer
//! pass, on_timer() runs on all subsystems in that same order.

use crate::{
    config::BotConfig,
    error::BotResult,
    event::BotEvent,
    command::BotCommand,
    platform::{Member, Notice, Platform},
    response::Reply,
    rng::SubsystemRng,
    store::BotStore,
};
use chrono::NaiveDateTime;
use std::any::Any;

/// What a handler hands back to the engine.
#[derive(Debug, Default)]
pub struct Outcome {
    /// Reply to the invoking user, if any.
    pub reply: Option<Reply>,
    /// Side messages, delivered best-effort after the reply.
    pub notices: Vec<Notice>,
    /// Domain events to persist.
    pub events: Vec<BotEvent>,
}

impl Outcome {
    pub fn reply(reply: Reply) -> Self {
        Self { reply: Some(reply), ..Self::default() }
    }

    pub fn with_event(mut self, event: BotEvent) -> Self {
        self.events.push(event);
        self
    }

    pub fn with_notice(mut self, notice: Notice) -> Self {
        self.notices.push(notice);
        self
    }
}

/// Everything a handler may touch while running one command.
pub struct CommandContext<'a> {
    pub now: NaiveDateTime,
    pub actor: &'a Member,
    pub store: &'a BotStore,
    pub config: &'a BotConfig,
    pub platform: &'a mut dyn Platform,
    pub rng: &'a mut SubsystemRng,
}

impl CommandContext<'_> {
    /// Display name of any user, falling back to `User <id>`.
    pub fn name_of(&self, user_id: crate::types::UserId) -> String {
        if user_id == self.actor.user_id {
            return self.actor.display_name.clone();
        }
        crate::platform::display_name(&*self.platform, user_id)
    }
}

/// Everything a timer pass may touch.
pub struct TimerContext<'a> {
    pub now: NaiveDateTime,
    pub store: &'a BotStore,
    pub config: &'a BotConfig,
    pub platform: &'a mut dyn Platform,
    pub rng: &'a mut SubsystemRng,
}

/// The contract every subsystem must fulfill.
pub trait BotSubsystem: Send {
    /// Unique stable name for this subsystem.
    fn name(&self) -> &'static str;

    /// Whether this subsystem owns `command`.
    fn handles(&self, command: &BotCommand) -> bool;

    /// Run one command. Refusals come back as user-facing BotErrors;
    /// the engine renders them.
    fn handle(&mut self, ctx: &mut CommandContext<'_>, command: &BotCommand) -> BotResult<Outcome>;

    /// Resolve pending state whose deadline has passed.
    fn on_timer(&mut self, _ctx: &mut TimerContext<'_>) -> BotResult<Outcome> {
        Ok(Outcome::default())
    }

    /// For downcasting in tests and tooling only.
    fn as_any(&self) -> &dyn Any;

    fn as_any_mut(&mut self) -> &mut dyn Any;
}
