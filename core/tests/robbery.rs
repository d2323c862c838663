//! Robbery: a crowd of five, a random slice of the wallet, a cooldown.

use chrono::Duration;
use econbot_core::{
    engine::BotEngine, event::BotEvent, platform::Member, response::Reply,
    robbery_subsystem::RobberySubsystem,
};

const TARGET: u64 = 100;

fn setup(seed: u64, target_wallet: i64) -> (BotEngine, Vec<Member>) {
    let mut engine = BotEngine::build_test(seed).unwrap();
    engine.recording_mut().unwrap().add_member(Member::new(TARGET, "mark"));
    engine.store().add_money(TARGET, target_wallet, engine.now()).unwrap();
    let robbers: Vec<Member> = (1..=6).map(|id| Member::new(id, format!("robber{id}"))).collect();
    (engine, robbers)
}

fn rob(engine: &mut BotEngine, robber: &Member) -> Reply {
    engine.on_message(robber, "!rob <@100>").unwrap().reply.expect("reply")
}

fn wallet(engine: &BotEngine, user_id: u64) -> i64 {
    engine.store().user(user_id).unwrap().map(|u| u.wallet).unwrap_or(0)
}

#[test]
fn robbery_waits_for_five_distinct_robbers() {
    let (mut engine, robbers) = setup(8, 1000);
    for (joined, robber) in robbers.iter().take(4).enumerate() {
        let reply = rob(&mut engine, robber);
        let needed = 4 - joined;
        assert!(
            reply.description.as_deref().unwrap().contains(&format!("{needed} more people needed!")),
            "{}",
            reply.to_plain_text()
        );
    }
    let repeat = rob(&mut engine, &robbers[0]);
    assert_eq!(repeat.description.as_deref(), Some("You're already part of this robbery attempt!"));
    assert_eq!(wallet(&engine, TARGET), 1000);

    let robbery = engine.subsystem::<RobberySubsystem>().unwrap();
    assert_eq!(robbery.participants(TARGET), &[1, 2, 3, 4]);
}

#[test]
fn completed_robbery_splits_a_bounded_slice_evenly() {
    for seed in [1, 2, 3, 4, 5] {
        let (mut engine, robbers) = setup(seed, 1000);
        let before = engine.store().total_money().unwrap();
        let mut last = None;
        for robber in robbers.iter().take(5) {
            last = Some(rob(&mut engine, robber));
        }
        assert_eq!(last.unwrap().title, "Robbery Successful");

        let share = wallet(&engine, 1);
        assert!((20..=50).contains(&share), "seed {seed}: share {share} outside 10%..25% / 5");
        for id in 2..=5 {
            assert_eq!(wallet(&engine, id), share);
        }
        let taken = 1000 - wallet(&engine, TARGET);
        assert_eq!(share, taken / 5);
        assert_eq!(engine.store().total_money().unwrap(), before - taken % 5);
    }
}

#[test]
fn small_wallets_lose_at_least_the_minimum_take() {
    let (mut engine, robbers) = setup(9, 40);
    for robber in robbers.iter().take(5) {
        rob(&mut engine, robber);
    }
    // 10..25% of 40 is under the minimum of 10, so exactly 10 is taken.
    assert_eq!(wallet(&engine, 1), 2);
    assert_eq!(wallet(&engine, TARGET), 30);
}

#[test]
fn empty_wallet_discards_the_attempt() {
    let (mut engine, robbers) = setup(9, 0);
    let mut last = None;
    for robber in robbers.iter().take(5) {
        last = Some(rob(&mut engine, robber));
    }
    assert_eq!(last.unwrap().description.as_deref(), Some("mark has no money in their wallet to rob!"));
    let robbery = engine.subsystem::<RobberySubsystem>().unwrap();
    assert!(robbery.participants(TARGET).is_empty());
    assert!(!robbery.is_immune(TARGET, engine.now(), 3600));
}

#[test]
fn robbed_target_is_immune_for_an_hour() {
    let (mut engine, robbers) = setup(4, 1000);
    for robber in robbers.iter().take(5) {
        rob(&mut engine, robber);
    }
    let reply = rob(&mut engine, &robbers[5]);
    assert_eq!(
        reply.description.as_deref(),
        Some("mark has already been robbed recently. Try again later!")
    );

    engine.clock.advance(Duration::seconds(3601));
    engine.run_timers().unwrap();
    let reply = rob(&mut engine, &robbers[5]);
    assert!(reply.description.as_deref().unwrap().contains("4 more people needed!"));
}

#[test]
fn robbing_yourself_is_refused() {
    let (mut engine, _) = setup(4, 1000);
    let mark = Member::new(TARGET, "mark");
    let reply = rob(&mut engine, &mark);
    assert_eq!(reply.description.as_deref(), Some("You can't rob yourself!"));
}

#[test]
fn target_loses_exactly_the_announced_amount() {
    // 7 split five ways: $1 each, the remaining $2 is still taken.
    let (mut engine, robbers) = setup(3, 7);
    let mut outcome = None;
    for robber in robbers.iter().take(5) {
        outcome = Some(engine.on_message(robber, "!rob <@100>").unwrap());
    }
    let outcome = outcome.unwrap();
    let announced = outcome.events.iter().find_map(|e| match e {
        BotEvent::RobberyCompleted { amount, share, .. } => Some((*amount, *share)),
        _ => None,
    });
    let (amount, share) = announced.expect("robbery completed event");
    assert_eq!((amount, share), (7, 1));
    assert_eq!(wallet(&engine, TARGET), 7 - amount);
    assert_eq!(
        outcome.reply.unwrap().description.as_deref(),
        Some("Robbery successful! <@1> <@2> <@3> <@4> <@5> robbed <@100> of $7 and each got $1!")
    );
}
