//! Quests: offer, accept, deadline resolution, expiry, cooldown, and
//! the fallback table behind a pluggable generator.

use chrono::Duration;
use econbot_core::{
    engine::BotEngine,
    event::BotEvent,
    platform::Member,
    quest::{Quest, QuestSource},
    quest_subsystem::QuestSubsystem,
    response::Reply,
    rng::SubsystemRng,
};

struct FixedSource {
    minutes: i64,
}

impl QuestSource for FixedSource {
    fn name(&self) -> &'static str {
        "fixed"
    }

    fn generate(&mut self, username: &str, _rng: &mut SubsystemRng) -> anyhow::Result<Quest> {
        Ok(Quest {
            title: "Lighthouse Keeper".into(),
            description: format!("{username}, keep the lamp lit."),
            reward: 500,
            time_limit_minutes: self.minutes,
        })
    }
}

struct BrokenSource;

impl QuestSource for BrokenSource {
    fn name(&self) -> &'static str {
        "broken"
    }

    fn generate(&mut self, _username: &str, _rng: &mut SubsystemRng) -> anyhow::Result<Quest> {
        anyhow::bail!("upstream returned 503")
    }
}

fn say(engine: &mut BotEngine, who: &Member, text: &str) -> Reply {
    engine.on_message(who, text).unwrap().reply.expect("command reply")
}

#[test]
fn accepted_quest_resolves_at_its_deadline() {
    for seed in 1..=8 {
        let mut engine = BotEngine::build_test(seed).unwrap();
        let ana = Member::new(1, "ana");
        let offer = say(&mut engine, &ana, "!quest");
        assert_eq!(offer.title, "Quest for ana");

        let reply = say(&mut engine, &ana, "!acceptquest");
        assert_eq!(reply.title, "Quest Accepted");
        let active = engine.subsystem::<QuestSubsystem>().unwrap().active_for(1).unwrap().clone();

        // Nothing happens a minute before the deadline.
        engine.clock.set(active.due_at - Duration::minutes(1));
        assert!(engine.run_timers().unwrap().is_empty());

        engine.clock.set(active.due_at);
        let events = engine.run_timers().unwrap();
        let wallet = engine.store().user(1).unwrap().unwrap().wallet;
        match events.as_slice() {
            [BotEvent::QuestFinished { succeeded: true, reward, .. }] => {
                assert_eq!(*reward, active.quest.reward);
                assert_eq!(wallet, active.quest.reward);
            }
            [BotEvent::QuestFinished { succeeded: false, reward, .. }] => {
                assert_eq!(*reward, 0);
                assert_eq!(wallet, 0);
            }
            other => panic!("seed {seed}: unexpected events {other:?}"),
        }
        assert!(engine.subsystem::<QuestSubsystem>().unwrap().active_for(1).is_none());
        assert_eq!(engine.recording().unwrap().dms_to(1).len(), 1);
    }
}

#[test]
fn unanswered_offer_expires_and_cooldown_still_applies() {
    let mut engine = BotEngine::build_test(2).unwrap();
    let ana = Member::new(1, "ana");
    say(&mut engine, &ana, "!quest");

    engine.clock.advance(Duration::seconds(61));
    engine.run_timers().unwrap();
    let dms = engine.recording().unwrap().dms_to(1);
    assert_eq!(dms[0].reply.description.as_deref(), Some("<@1>, quest offer expired."));

    let reply = say(&mut engine, &ana, "!acceptquest");
    assert_eq!(reply.description.as_deref(), Some("You don't have a quest offer to answer!"));

    let reply = say(&mut engine, &ana, "!quest");
    assert_eq!(
        reply.description.as_deref(),
        Some("You need to wait 28m 59s before getting another quest!")
    );

    engine.clock.advance(Duration::minutes(29));
    assert_eq!(say(&mut engine, &ana, "!quest").title, "Quest for ana");
}

#[test]
fn declining_frees_nothing_but_the_offer() {
    let mut engine = BotEngine::build_test(2).unwrap();
    let ana = Member::new(1, "ana");
    say(&mut engine, &ana, "!quest");
    let reply = say(&mut engine, &ana, "!declinequest");
    assert_eq!(
        reply.description.as_deref(),
        Some("Quest declined. You can get another quest in 30 minutes.")
    );
    assert!(engine.subsystem::<QuestSubsystem>().unwrap().offer_for(1).is_none());
    assert!(say(&mut engine, &ana, "!quest").is_error());
}

#[test]
fn one_quest_in_progress_at_a_time() {
    let mut engine = BotEngine::build_test(2).unwrap();
    engine.set_quest_source(Box::new(FixedSource { minutes: 120 }));
    let ana = Member::new(1, "ana");
    let offer = say(&mut engine, &ana, "!quest");
    assert_eq!(offer.field_value("Reward"), Some("$500"));
    say(&mut engine, &ana, "!acceptquest");

    engine.clock.advance(Duration::minutes(31));
    let reply = say(&mut engine, &ana, "!quest");
    assert_eq!(reply.description.as_deref(), Some("You already have a quest in progress!"));
}

#[test]
fn failing_generator_falls_back_to_the_table() {
    let mut engine = BotEngine::build_test(2).unwrap();
    engine.set_quest_source(Box::new(BrokenSource));
    let ana = Member::new(1, "ana");
    let offer = say(&mut engine, &ana, "!quest");
    assert!(!offer.is_error());
    assert!(offer.description.as_deref().unwrap().starts_with("Hey ana! "));
}

#[test]
fn same_seed_same_quests() {
    let run = |seed: u64| {
        let mut engine = BotEngine::build_test(seed).unwrap();
        let mut titles = Vec::new();
        for user_id in 1..=5 {
            let who = Member::new(user_id, format!("u{user_id}"));
            titles.push(engine.on_message(&who, "!quest").unwrap().reply.unwrap().description);
        }
        titles
    };
    assert_eq!(run(77), run(77));
}
