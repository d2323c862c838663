//! Ledger integration tests: balances, banking, transfers, leaderboard.

use econbot_core::{engine::BotEngine, platform::Member, response::Reply};

fn setup() -> (BotEngine, Member, Member) {
    let mut engine = BotEngine::build_test(11).unwrap();
    let ana = Member::new(1, "ana");
    let bo = Member::new(2, "bo");
    let platform = engine.recording_mut().unwrap();
    platform.add_member(ana.clone());
    platform.add_member(bo.clone());
    (engine, ana, bo)
}

fn fund(engine: &BotEngine, user_id: u64, amount: i64) {
    engine.store().add_money(user_id, amount, engine.now()).unwrap();
}

fn say(engine: &mut BotEngine, who: &Member, text: &str) -> Reply {
    engine.on_message(who, text).unwrap().reply.expect("command reply")
}

fn balances(engine: &BotEngine, user_id: u64) -> (i64, i64) {
    let user = engine.store().user(user_id).unwrap().expect("user exists");
    (user.wallet, user.bank)
}

#[test]
fn deposit_all_then_partial_withdraw() {
    let (mut engine, ana, _) = setup();
    fund(&engine, ana.user_id, 200);

    let reply = say(&mut engine, &ana, "!deposit all");
    assert!(!reply.is_error(), "{}", reply.to_plain_text());
    assert_eq!(balances(&engine, ana.user_id), (0, 200));

    let reply = say(&mut engine, &ana, "!withdraw 50");
    assert_eq!(reply.field_value("Wallet"), Some("$50"));
    assert_eq!(balances(&engine, ana.user_id), (50, 150));
}

#[test]
fn deposit_all_of_nothing_is_refused() {
    let (mut engine, ana, _) = setup();
    let reply = say(&mut engine, &ana, "!deposit all");
    assert!(reply.is_error());
    assert_eq!(
        reply.description.as_deref(),
        Some("You don't have any money in your wallet to deposit!")
    );
}

#[test]
fn transfer_conserves_total_and_notifies_recipient() {
    let (mut engine, ana, bo) = setup();
    fund(&engine, ana.user_id, 300);
    let before = engine.store().total_money().unwrap();

    let reply = say(&mut engine, &ana, "!transfer <@2> 120");
    assert!(!reply.is_error(), "{}", reply.to_plain_text());
    assert_eq!(balances(&engine, ana.user_id), (180, 0));
    assert_eq!(balances(&engine, bo.user_id), (120, 0));
    assert_eq!(engine.store().total_money().unwrap(), before);

    let dms = engine.recording().unwrap().dms_to(bo.user_id);
    assert_eq!(dms.len(), 1);
    assert_eq!(dms[0].reply.title, "Money Received!");
}

#[test]
fn overdrawn_transfer_changes_nothing() {
    let (mut engine, ana, bo) = setup();
    fund(&engine, ana.user_id, 300);

    let reply = say(&mut engine, &ana, "!pay <@2> 500");
    assert!(reply.is_error());
    assert_eq!(
        reply.description.as_deref(),
        Some("Not enough money in wallet (have $300, need $500)")
    );
    assert_eq!(balances(&engine, ana.user_id), (300, 0));
    assert!(engine.store().user(bo.user_id).unwrap().is_none());
}

#[test]
fn self_transfer_and_non_positive_amounts_are_refused() {
    let (mut engine, ana, _) = setup();
    fund(&engine, ana.user_id, 100);

    let reply = say(&mut engine, &ana, "!transfer <@1> 10");
    assert_eq!(reply.description.as_deref(), Some("You can't transfer money to yourself!"));

    let reply = say(&mut engine, &ana, "!transfer <@2> 0");
    assert_eq!(reply.description.as_deref(), Some("Amount must be positive!"));
    assert_eq!(balances(&engine, ana.user_id), (100, 0));
}

#[test]
fn malformed_arguments_get_usage_errors() {
    let (mut engine, ana, _) = setup();
    let reply = say(&mut engine, &ana, "!deposit lots");
    assert!(reply.is_error());
    assert_eq!(reply.description.as_deref(), Some("Please enter a valid amount or 'all'!"));
}

#[test]
fn ordinary_chat_gets_no_reply_but_registers_the_user() {
    let (mut engine, ana, _) = setup();
    let handled = engine.on_message(&ana, "good morning everyone").unwrap();
    assert!(handled.reply.is_none());
    assert_eq!(balances(&engine, ana.user_id), (0, 0));
}

#[test]
fn leaderboard_ranks_by_wallet_plus_bank() {
    let (mut engine, ana, bo) = setup();
    fund(&engine, ana.user_id, 100);
    fund(&engine, bo.user_id, 80);
    say(&mut engine, &bo, "!deposit 50");
    fund(&engine, bo.user_id, 40);

    let reply = say(&mut engine, &ana, "!leaderboard");
    let names: Vec<&str> = reply.fields.iter().map(|f| f.name.as_str()).collect();
    assert_eq!(names, vec!["1. bo", "2. ana"]);
    assert_eq!(reply.fields[0].value, "Wallet: $70 | Bank: $50 | Total: $120");
}

#[test]
fn slash_and_prefix_commands_reach_the_same_handler() {
    let (mut engine, ana, _) = setup();
    fund(&engine, ana.user_id, 60);
    let command = serde_json::from_str(r#"{"cmd":"deposit","amount":"all"}"#).unwrap();
    let reply = engine.dispatch(&ana, &command).unwrap().reply.unwrap();
    assert_eq!(reply.title, "Deposit Successful");
    assert_eq!(balances(&engine, ana.user_id), (0, 60));
}
