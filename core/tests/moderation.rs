//! Paid timeouts: role gates, protected targets, refunds, history.

use econbot_core::{engine::BotEngine, platform::Member, response::Reply};

const LEVEL_10: u64 = 1352694494797234235;
const LEVEL_50: u64 = 1352694494813749299;
const ADMIN: u64 = 1352694494813749308;

fn setup() -> (BotEngine, Member, Member) {
    let mut engine = BotEngine::build_test(13).unwrap();
    let mod_ = Member::new(1, "judge").with_roles(&[LEVEL_10, LEVEL_50]);
    let target = Member::new(2, "noisy");
    let platform = engine.recording_mut().unwrap();
    platform.add_member(mod_.clone());
    platform.add_member(target.clone());
    engine.store().add_money(1, 120, engine.now()).unwrap();
    (engine, mod_, target)
}

fn say(engine: &mut BotEngine, who: &Member, text: &str) -> Reply {
    engine.on_message(who, text).unwrap().reply.expect("command reply")
}

fn wallet(engine: &BotEngine, user_id: u64) -> i64 {
    engine.store().user(user_id).unwrap().map(|u| u.wallet).unwrap_or(0)
}

#[test]
fn timeout_uses_the_longest_grant_and_charges_the_cost() {
    let (mut engine, judge, _) = setup();
    let reply = say(&mut engine, &judge, "!timeout <@2>");
    assert!(!reply.is_error(), "{}", reply.to_plain_text());
    assert_eq!(
        reply.description.as_deref(),
        Some("<@2> has been timed out for 300 seconds by <@1>!")
    );
    assert_eq!(engine.recording().unwrap().timeouts, vec![(2, 300)]);
    assert_eq!(wallet(&engine, 1), 70);

    let logs = engine.store().timeout_logs_for(2, 10).unwrap();
    assert_eq!(logs.len(), 1);
    assert_eq!((logs[0].moderator_id, logs[0].duration_secs), (1, 300));
    assert_eq!(engine.store().timeout_count_for(2).unwrap(), 1);
}

#[test]
fn platform_refusal_refunds_the_cost() {
    let (mut engine, judge, _) = setup();
    engine.recording_mut().unwrap().refuse_timeouts_for(2);
    let reply = say(&mut engine, &judge, "!bomb <@2>");
    assert_eq!(reply.description.as_deref(), Some("I don't have permission to time out this user!"));
    assert_eq!(wallet(&engine, 1), 120);
    assert!(engine.store().timeout_logs_for(2, 10).unwrap().is_empty());
    assert_eq!(engine.store().events_of_type("timeout_refunded").unwrap().len(), 1);
}

#[test]
fn refusals_leave_the_wallet_alone() {
    let (mut engine, judge, target) = setup();

    let reply = say(&mut engine, &judge, "!timeout <@1>");
    assert_eq!(reply.description.as_deref(), Some("You can't time yourself out!"));

    let boss = Member::new(3, "boss").with_roles(&[ADMIN]);
    engine.recording_mut().unwrap().add_member(boss);
    let reply = say(&mut engine, &judge, "!timeout <@3>");
    assert_eq!(reply.description.as_deref(), Some("You cannot time out users with the Admin role!"));

    let reply = say(&mut engine, &target, "!timeout <@1>");
    assert_eq!(reply.description.as_deref(), Some("You don't have permission to time out users!"));

    assert_eq!(wallet(&engine, 1), 120);
    assert!(engine.recording().unwrap().timeouts.is_empty());
}

#[test]
fn short_wallet_cannot_pay() {
    let (mut engine, _, target) = setup();
    let poor = Member::new(4, "poor").with_roles(&[LEVEL_10]);
    engine.recording_mut().unwrap().add_member(poor.clone());
    engine.store().add_money(4, 49, engine.now()).unwrap();
    let reply = say(&mut engine, &poor, &format!("!timeout <@{}>", target.user_id));
    assert_eq!(
        reply.description.as_deref(),
        Some("Not enough money in wallet (have $49, need $50)")
    );
    assert_eq!(wallet(&engine, 4), 49);
}

#[test]
fn limit_cost_and_history_commands() {
    let (mut engine, judge, target) = setup();
    let reply = say(&mut engine, &judge, "!timeoutlimit");
    assert_eq!(
        reply.description.as_deref(),
        Some("With your role level 50, you can time out users for 5 minutes!")
    );
    let reply = say(&mut engine, &target, "!bomblimit");
    assert_eq!(
        reply.description.as_deref(),
        Some("You don't have any roles that allow you to time out users!")
    );
    let reply = say(&mut engine, &target, "!timeoutcost");
    assert_eq!(reply.description.as_deref(), Some("It costs $50 to time someone out!"));

    let reply = say(&mut engine, &target, "!timeouthistory");
    assert_eq!(reply.description.as_deref(), Some("noisy has no timeout history!"));

    say(&mut engine, &judge, "!timeout <@2>");
    let reply = say(&mut engine, &judge, "!timeouthistory <@2>");
    assert_eq!(reply.title, "💣 Timeout History for noisy");
    assert_eq!(reply.fields.len(), 1);
    assert_eq!(reply.fields[0].name, "2025-03-01 12:00");
    assert_eq!(reply.fields[0].value, "By: judge\nDuration: 300 seconds");
}
