//! Daily reward: one claim per calendar date, plus the midnight sweep.

use chrono::Duration;
use econbot_core::{economy_subsystem::EconomySubsystem, engine::BotEngine, platform::Member};

fn wallet(engine: &BotEngine, user_id: u64) -> i64 {
    engine.store().user(user_id).unwrap().map(|u| u.wallet).unwrap_or(0)
}

#[test]
fn daily_is_once_per_calendar_date() {
    let mut engine = BotEngine::build_test(3).unwrap();
    let ana = Member::new(1, "ana");

    let reply = engine.on_message(&ana, "!daily").unwrap().reply.unwrap();
    assert_eq!(reply.title, "Daily Reward");
    assert_eq!(reply.field_value("New Balance"), Some("$100"));

    // Same date, eleven hours later: refused, with the time to midnight.
    engine.clock.advance(Duration::hours(11));
    let reply = engine.on_message(&ana, "!daily").unwrap().reply.unwrap();
    assert_eq!(reply.description.as_deref(), Some("You've already claimed your daily reward!"));
    assert_eq!(reply.field_value("Next Reward In"), Some("1h 0m 0s"));
    assert_eq!(wallet(&engine, 1), 100);

    // Just past midnight the next day: a fresh claim adds exactly 100.
    engine.clock.advance(Duration::hours(1) + Duration::seconds(1));
    let reply = engine.on_message(&ana, "!daily").unwrap().reply.unwrap();
    assert!(!reply.is_error());
    assert_eq!(wallet(&engine, 1), 200);
    assert_eq!(engine.store().events_of_type("daily_claimed").unwrap().len(), 2);
}

#[test]
fn first_timer_pass_only_records_the_date() {
    let mut engine = BotEngine::build_test(3).unwrap();
    engine.on_message(&Member::new(1, "ana"), "hi").unwrap();

    let events = engine.run_timers().unwrap();
    assert!(events.is_empty());
    assert_eq!(wallet(&engine, 1), 0);
    let economy = engine.subsystem::<EconomySubsystem>().unwrap();
    assert_eq!(economy.last_sweep(), Some(engine.now().date()));
}

#[test]
fn sweep_pays_every_known_user_once_per_new_date() {
    let mut engine = BotEngine::build_test(3).unwrap();
    engine.on_message(&Member::new(1, "ana"), "hi").unwrap();
    engine.on_message(&Member::new(2, "bo"), "hello").unwrap();
    engine.run_timers().unwrap();

    engine.clock.advance(Duration::hours(12) + Duration::minutes(5));
    let events = engine.run_timers().unwrap();
    assert_eq!(events.len(), 1);
    assert_eq!(wallet(&engine, 1), 100);
    assert_eq!(wallet(&engine, 2), 100);

    // A second pass on the same date pays nothing.
    engine.clock.advance(Duration::hours(1));
    assert!(engine.run_timers().unwrap().is_empty());
    assert_eq!(wallet(&engine, 1), 100);

    // The sweep stamped the claim, so a manual claim today is refused.
    let reply = engine.on_message(&Member::new(1, "ana"), "!daily").unwrap().reply.unwrap();
    assert_eq!(reply.description.as_deref(), Some("You've already claimed your daily reward!"));
}
