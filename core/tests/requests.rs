//! Money requests: only the recipient resolves, and only once.

use econbot_core::{
    engine::BotEngine,
    platform::{Member, NoticeTarget},
    response::Reply,
    store::RequestStatus,
};

fn setup() -> (BotEngine, Member, Member) {
    let mut engine = BotEngine::build_test(21).unwrap();
    let ana = Member::new(1, "ana");
    let bo = Member::new(2, "bo");
    let platform = engine.recording_mut().unwrap();
    platform.add_member(ana.clone());
    platform.add_member(bo.clone());
    (engine, ana, bo)
}

fn say(engine: &mut BotEngine, who: &Member, text: &str) -> Reply {
    engine.on_message(who, text).unwrap().reply.expect("command reply")
}

fn wallet(engine: &BotEngine, user_id: u64) -> i64 {
    engine.store().user(user_id).unwrap().map(|u| u.wallet).unwrap_or(0)
}

#[test]
fn accepted_request_pays_the_requester_once() {
    let (mut engine, ana, bo) = setup();
    engine.store().add_money(bo.user_id, 100, engine.now()).unwrap();

    let reply = say(&mut engine, &ana, "!request <@2> 40 concert tickets");
    assert_eq!(reply.title, "Money Request Sent");
    assert_eq!(reply.field_value("Reason"), Some("concert tickets"));
    assert_eq!(reply.field_value("Request ID"), Some("#1"));

    let dm = &engine.recording().unwrap().dms_to(bo.user_id)[0].reply;
    assert_eq!(dm.title, "Money Request Received");

    let reply = say(&mut engine, &bo, "!accept 1");
    assert_eq!(reply.title, "Request Accepted", "{}", reply.to_plain_text());
    assert_eq!(wallet(&engine, ana.user_id), 40);
    assert_eq!(wallet(&engine, bo.user_id), 60);

    for text in ["!accept 1", "!reject 1"] {
        let again = say(&mut engine, &bo, text);
        assert_eq!(again.description.as_deref(), Some("This request has already been resolved!"));
    }
    assert_eq!(wallet(&engine, ana.user_id), 40);
    let stored = engine.store().request(1).unwrap().unwrap();
    assert_eq!(stored.status, RequestStatus::Accepted);
    assert!(stored.resolved_at.is_some());
}

#[test]
fn only_the_recipient_may_resolve() {
    let (mut engine, ana, _) = setup();
    say(&mut engine, &ana, "!request <@2> 10");
    let reply = say(&mut engine, &ana, "!accept 1");
    assert_eq!(reply.description.as_deref(), Some("You can only accept requests sent to you!"));
    let reply = say(&mut engine, &ana, "!reject 1");
    assert_eq!(reply.description.as_deref(), Some("You can only reject requests sent to you!"));
    assert_eq!(engine.store().request(1).unwrap().unwrap().status, RequestStatus::Pending);
}

#[test]
fn short_wallet_leaves_the_request_pending() {
    let (mut engine, ana, bo) = setup();
    say(&mut engine, &ana, "!request <@2> 75");
    let reply = say(&mut engine, &bo, "!accept 1");
    assert!(reply.is_error());
    assert_eq!(engine.store().request(1).unwrap().unwrap().status, RequestStatus::Pending);

    // Rejecting still works afterwards, and tells the requester.
    let reply = say(&mut engine, &bo, "!decline 1");
    assert_eq!(reply.title, "Request Rejected");
    assert_eq!(engine.store().request(1).unwrap().unwrap().status, RequestStatus::Rejected);
    let dms = engine.recording().unwrap().dms_to(ana.user_id);
    assert_eq!(dms.last().unwrap().reply.title, "Money Request Rejected");
}

#[test]
fn unknown_request_and_self_request_are_refused() {
    let (mut engine, ana, _) = setup();
    let reply = say(&mut engine, &ana, "!accept 99");
    assert_eq!(reply.description.as_deref(), Some("Request #99 not found!"));
    let reply = say(&mut engine, &ana, "!request <@1> 5");
    assert_eq!(reply.description.as_deref(), Some("You can't request money from yourself!"));
}

#[test]
fn blocked_dms_fall_back_to_the_origin_channel() {
    let (mut engine, ana, bo) = setup();
    engine.recording_mut().unwrap().block_dms(bo.user_id);
    say(&mut engine, &ana, "!request <@2> 15");

    let platform = engine.recording().unwrap();
    assert!(platform.dms_to(bo.user_id).is_empty());
    let fallback = platform
        .delivered
        .iter()
        .find(|n| n.target == NoticeTarget::Origin)
        .expect("fallback notice");
    assert!(fallback.reply.description.as_deref().unwrap().starts_with("<@2>, you have received a money request!"));
}

#[test]
fn listing_shows_both_directions() {
    let (mut engine, ana, bo) = setup();
    say(&mut engine, &ana, "!request <@2> 15 lunch");
    say(&mut engine, &bo, "!request <@1> 5");

    let reply = say(&mut engine, &ana, "!requests");
    assert_eq!(reply.description.as_deref(), Some("You have 2 pending requests."));
    assert_eq!(reply.field_value("Money Requested From You"), Some("#2 | From: bo | Amount: $5"));
    assert_eq!(reply.field_value("Money You Requested"), Some("#1 | To: bo | Amount: $15 - lunch"));
}
