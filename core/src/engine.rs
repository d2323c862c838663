//! The bot engine: one dispatch stream for every inbound event.
//!
//! REGISTRATION ORDER (fixed, documented, never reordered):
//!   1. Utility subsystem
//!   2. Economy subsystem
//!   3. Request subsystem
//!   4. Robbery subsystem
//!   5. Quest subsystem
//!   6. Company subsystem
//!   7. Moderation subsystem
//!
//! RULES:
//!   - Inbound events are handled strictly one at a time (&mut self).
//!   - A command runs in the first subsystem whose handles() accepts it.
//!   - Timer passes run every subsystem's on_timer() in the order above.
//!   - All randomness flows through the RngBank.
//!   - All state changes are recorded in the event log.

use crate::{
    clock::BotClock,
    command::{parse_prefixed, BotCommand},
    company_subsystem::CompanySubsystem,
    config::BotConfig,
    economy_subsystem::EconomySubsystem,
    error::{BotError, BotResult},
    event::{BotEvent, EventLogEntry},
    moderation_subsystem::ModerationSubsystem,
    platform::{Member, Notice, Platform, RecordingPlatform},
    quest::{QuestGenerator, QuestSource},
    quest_subsystem::QuestSubsystem,
    request_subsystem::RequestSubsystem,
    response::Reply,
    rng::{RngBank, SubsystemRng, SubsystemSlot},
    robbery_subsystem::RobberySubsystem,
    store::BotStore,
    subsystem::{BotSubsystem, CommandContext, Outcome, TimerContext},
    types::{Money, SessionId},
    utility_subsystem::UtilitySubsystem,
};
use chrono::{NaiveDate, NaiveDateTime};
use serde::Serialize;

/// Shown for failures the user cannot act on. Details go to the log.
const GENERIC_FAILURE: &str = "Something went wrong while running that command. Please try again later.";

/// The engine's answer to one inbound event.
#[derive(Debug, Default)]
pub struct Dispatched {
    /// Reply to the invoking user. None for ordinary chat.
    pub reply: Option<Reply>,
    pub events: Vec<BotEvent>,
}

impl Dispatched {
    fn reply(reply: Reply) -> Self {
        Self { reply: Some(reply), events: Vec::new() }
    }
}

/// Point-in-time summary for the runner's `status` request.
#[derive(Debug, Clone, Serialize)]
pub struct EngineStatus {
    pub session_id: SessionId,
    pub seed: u64,
    pub now: NaiveDateTime,
    pub users: i64,
    pub companies: i64,
    pub total_money: Money,
    pub events: i64,
}

pub struct BotEngine {
    pub session_id: SessionId,
    pub clock: BotClock,
    rng_bank: RngBank,
    config: BotConfig,
    store: BotStore,
    platform: Box<dyn Platform>,
    subsystems: Vec<(SubsystemSlot, Box<dyn BotSubsystem>, SubsystemRng)>,
}

impl BotEngine {
    pub fn new(
        config: BotConfig,
        store: BotStore,
        platform: Box<dyn Platform>,
        clock: BotClock,
        seed: u64,
    ) -> Self {
        Self {
            session_id: uuid::Uuid::new_v4().to_string(),
            clock,
            rng_bank: RngBank::new(seed),
            config,
            store,
            platform,
            subsystems: Vec::new(),
        }
    }

    /// Build a fully wired engine with all subsystems registered and the
    /// session recorded. The store must already be migrated.
    pub fn build(
        config: BotConfig,
        store: BotStore,
        platform: Box<dyn Platform>,
        clock: BotClock,
        seed: u64,
    ) -> BotResult<Self> {
        let mut engine = Self::new(config, store, platform, clock, seed);

        // REGISTRATION ORDER: fixed, documented, never reordered.
        engine.register(SubsystemSlot::Utility, Box::new(UtilitySubsystem::new()));
        engine.register(SubsystemSlot::Economy, Box::new(EconomySubsystem::new()));
        engine.register(SubsystemSlot::Request, Box::new(RequestSubsystem::new()));
        engine.register(SubsystemSlot::Robbery, Box::new(RobberySubsystem::new()));
        engine.register(
            SubsystemSlot::Quest,
            Box::new(QuestSubsystem::new(QuestGenerator::fallback_only())),
        );
        engine.register(SubsystemSlot::Company, Box::new(CompanySubsystem::new()));
        engine.register(SubsystemSlot::Moderation, Box::new(ModerationSubsystem::new()));

        let now = engine.clock.now();
        engine
            .store
            .insert_session(&engine.session_id, seed, &engine.config.version, now)?;
        let started = BotEvent::SessionStarted { session_id: engine.session_id.clone(), seed };
        engine.persist("engine", now, std::slice::from_ref(&started))?;
        log::info!("engine: session {} started (seed {seed})", engine.session_id);
        Ok(engine)
    }

    /// In-memory store, test config, recording platform, and a clock
    /// frozen at 2025-03-01 12:00.
    pub fn build_test(seed: u64) -> BotResult<Self> {
        let store = BotStore::in_memory()?;
        store.migrate()?;
        let start = NaiveDate::from_ymd_opt(2025, 3, 1)
            .and_then(|d| d.and_hms_opt(12, 0, 0))
            .ok_or_else(|| anyhow::anyhow!("invalid test start time"))?;
        Self::build(
            BotConfig::default_test(),
            store,
            Box::new(RecordingPlatform::new()),
            BotClock::fixed(start),
            seed,
        )
    }

    /// Register a subsystem. Call in the documented order.
    pub fn register(&mut self, slot: SubsystemSlot, subsystem: Box<dyn BotSubsystem>) {
        let rng = self.rng_bank.for_subsystem(slot);
        self.subsystems.push((slot, subsystem, rng));
    }

    // ── Inbound events ─────────────────────────────────────────────

    /// Handle one chat message: run it as a command if it is one, then
    /// record the author's activity (which may pay the company bonus).
    pub fn on_message(&mut self, author: &Member, content: &str) -> BotResult<Dispatched> {
        let mut handled = match parse_prefixed(content, &self.config.prefix) {
            None => Dispatched::default(),
            Some(Ok(command)) => self.dispatch(author, &command)?,
            Some(Err(err)) => Dispatched::reply(Reply::error(err.message)),
        };

        let now = self.clock.now();
        if let Some(bonus) = self.store.record_activity(author.user_id, now, &self.config.bonus)? {
            log::debug!(
                "engine: activity bonus {} to user={} (company #{})",
                bonus.amount,
                author.user_id,
                bonus.company_id
            );
            let event = BotEvent::ActivityBonusPaid {
                user_id: author.user_id,
                company_id: bonus.company_id,
                amount: bonus.amount,
            };
            self.persist("economy", now, std::slice::from_ref(&event))?;
            handled.events.push(event);
        }
        Ok(handled)
    }

    /// Run one structured command (slash commands land here directly).
    pub fn dispatch(&mut self, actor: &Member, command: &BotCommand) -> BotResult<Dispatched> {
        let now = self.clock.now();
        log::debug!("engine: user={} command={}", actor.user_id, command.name());
        let received = BotEvent::CommandReceived {
            user_id: actor.user_id,
            command: command.name().to_string(),
        };
        self.persist("engine", now, std::slice::from_ref(&received))?;

        let Some(index) = self.subsystems.iter().position(|(_, s, _)| s.handles(command)) else {
            log::warn!("engine: no subsystem handles {}", command.name());
            return Ok(Dispatched::reply(Reply::error("Unknown command.")));
        };

        let (_, subsystem, rng) = &mut self.subsystems[index];
        let name = subsystem.name();
        let mut ctx = CommandContext {
            now,
            actor,
            store: &self.store,
            config: &self.config,
            platform: self.platform.as_mut(),
            rng,
        };
        let outcome = match subsystem.handle(&mut ctx, command) {
            Ok(outcome) => outcome,
            Err(err) => Outcome::reply(Self::render_error(name, command, err)),
        };
        self.finish(name, now, outcome)
    }

    /// Resolve every deadline that has passed: offers, invitations,
    /// confirmations, active quests, and the daily sweep.
    pub fn run_timers(&mut self) -> BotResult<Vec<BotEvent>> {
        let now = self.clock.now();
        let mut all_events = Vec::new();
        for index in 0..self.subsystems.len() {
            let (_, subsystem, rng) = &mut self.subsystems[index];
            let name = subsystem.name();
            let mut ctx = TimerContext {
                now,
                store: &self.store,
                config: &self.config,
                platform: self.platform.as_mut(),
                rng,
            };
            let outcome = match subsystem.on_timer(&mut ctx) {
                Ok(outcome) => outcome,
                Err(err) => {
                    log::error!("engine: {name} timer pass failed: {err}");
                    continue;
                }
            };
            all_events.extend(self.finish(name, now, outcome)?.events);
        }
        Ok(all_events)
    }

    fn render_error(subsystem: &str, command: &BotCommand, err: BotError) -> Reply {
        if err.is_user_facing() {
            log::debug!("engine: {subsystem} refused {}: {err}", command.name());
            Reply::error(err.to_string())
        } else {
            log::error!("engine: {subsystem} failed on {}: {err}", command.name());
            Reply::error(GENERIC_FAILURE)
        }
    }

    fn finish(&mut self, subsystem: &str, now: NaiveDateTime, outcome: Outcome) -> BotResult<Dispatched> {
        self.persist(subsystem, now, &outcome.events)?;
        for notice in &outcome.notices {
            self.deliver(notice);
        }
        Ok(Dispatched { reply: outcome.reply, events: outcome.events })
    }

    /// Best-effort delivery. A failed notice with a fallback is posted
    /// in the origin channel instead; anything else is only logged.
    fn deliver(&mut self, notice: &Notice) {
        let Err(err) = self.platform.deliver(notice) else {
            return;
        };
        log::warn!("engine: notice to {:?} not delivered: {err}", notice.target);
        if let Some(fallback) = &notice.fallback {
            if let Err(err) = self.platform.deliver(&Notice::origin(fallback.clone())) {
                log::warn!("engine: fallback notice not delivered: {err}");
            }
        }
    }

    fn persist(&self, subsystem: &str, now: NaiveDateTime, events: &[BotEvent]) -> BotResult<()> {
        for event in events {
            let entry = EventLogEntry {
                id: None,
                occurred_at: now,
                subsystem: subsystem.to_string(),
                event_type: event.type_name().to_string(),
                payload: serde_json::to_string(event)?,
            };
            self.store.append_event(&entry)?;
        }
        Ok(())
    }

    // ── Accessors ──────────────────────────────────────────────────

    pub fn now(&self) -> NaiveDateTime {
        self.clock.now()
    }

    pub fn seed(&self) -> u64 {
        self.rng_bank.master_seed()
    }

    pub fn config(&self) -> &BotConfig {
        &self.config
    }

    pub fn store(&self) -> &BotStore {
        &self.store
    }

    pub fn platform(&self) -> &dyn Platform {
        self.platform.as_ref()
    }

    /// The recording platform, when the engine runs on one.
    pub fn recording(&self) -> Option<&RecordingPlatform> {
        self.platform.as_any().downcast_ref()
    }

    pub fn recording_mut(&mut self) -> Option<&mut RecordingPlatform> {
        self.platform.as_any_mut().downcast_mut()
    }

    /// Look up a registered subsystem by concrete type.
    pub fn subsystem<T: 'static>(&self) -> Option<&T> {
        self.subsystems
            .iter()
            .find_map(|(_, sub, _)| sub.as_any().downcast_ref::<T>())
    }

    pub fn subsystem_mut<T: 'static>(&mut self) -> Option<&mut T> {
        self.subsystems
            .iter_mut()
            .find_map(|(_, sub, _)| sub.as_any_mut().downcast_mut::<T>())
    }

    /// Put an external quest generator ahead of the built-in table.
    pub fn set_quest_source(&mut self, source: Box<dyn QuestSource>) {
        match self.subsystem_mut::<QuestSubsystem>() {
            Some(quests) => quests.set_source(source),
            None => log::warn!("engine: no quest subsystem registered, source ignored"),
        }
    }

    pub fn status(&self) -> BotResult<EngineStatus> {
        Ok(EngineStatus {
            session_id: self.session_id.clone(),
            seed: self.seed(),
            now: self.clock.now(),
            users: self.store.user_count()?,
            companies: self.store.company_count()?,
            total_money: self.store.total_money()?,
            events: self.store.event_count()?,
        })
    }
}
