//! Inbound commands, in both of the platform's styles.
//!
//! Slash commands arrive already structured and deserialize straight
//! into BotCommand. Prefix commands arrive as message text and go
//! through parse_prefixed(). Both land in the same enum, so handlers
//! never know which style was used.

use crate::types::{RequestId, UserId};
use serde::{Deserialize, Serialize};
use std::str::FromStr;

/// An amount argument: a positive integer or the whole balance.
/// On the wire it is either a JSON number or the string "all".
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AmountArg {
    Exact(i64),
    All,
}

impl Serialize for AmountArg {
    fn serialize<S: serde::Serializer>(&self, s: S) -> Result<S::Ok, S::Error> {
        match self {
            Self::Exact(n) => s.serialize_i64(*n),
            Self::All => s.serialize_str("all"),
        }
    }
}

impl<'de> Deserialize<'de> for AmountArg {
    fn deserialize<D: serde::Deserializer<'de>>(d: D) -> Result<Self, D::Error> {
        match serde_json::Value::deserialize(d)? {
            serde_json::Value::Number(n) => n
                .as_i64()
                .map(Self::Exact)
                .ok_or_else(|| serde::de::Error::custom("amount must be an integer")),
            serde_json::Value::String(s) => s.parse().map_err(serde::de::Error::custom),
            _ => Err(serde::de::Error::custom("expected a number or 'all'")),
        }
    }
}

impl FromStr for AmountArg {
    type Err = ParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if s.eq_ignore_ascii_case("all") {
            return Ok(Self::All);
        }
        s.parse::<i64>()
            .map(Self::Exact)
            .map_err(|_| ParseError::new("Please enter a valid amount or 'all'!"))
    }
}

/// All commands users can issue.
/// Variants are append-only: never removed or reordered.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "cmd", rename_all = "snake_case")]
pub enum BotCommand {
    // ── Economy ───────────────────────────────────
    Balance,
    Daily,
    Deposit { amount: AmountArg },
    Withdraw { amount: AmountArg },
    Transfer { to: UserId, amount: i64 },
    Leaderboard,

    // ── Requests ──────────────────────────────────
    Request {
        to: UserId,
        amount: i64,
        #[serde(default)]
        reason: Option<String>,
    },
    Requests,
    Reject { request_id: RequestId },
    Accept { request_id: RequestId },

    // ── Robbery and quests ────────────────────────
    Rob { target: UserId },
    Quest,
    AcceptQuest,
    DeclineQuest,

    // ── Companies ─────────────────────────────────
    CreateCompany { name: String },
    CompanyInfo {
        #[serde(default)]
        name: Option<String>,
    },
    Invite { user: UserId },
    AcceptInvite,
    DeclineInvite,
    Leave,
    Kick { user: UserId },
    Disband,
    ConfirmDisband,
    CancelDisband,
    Companies,

    // ── Moderation ────────────────────────────────
    Timeout { target: UserId },
    TimeoutCost,
    TimeoutLimit,
    TimeoutHistory {
        #[serde(default)]
        user: Option<UserId>,
    },

    // ── Utility ───────────────────────────────────
    Help {
        #[serde(default)]
        category: Option<String>,
    },
    Ping,
    Info,
    Sync,
}

impl BotCommand {
    /// Stable name for logging and the command_received event.
    pub fn name(&self) -> &'static str {
        match self {
            Self::Balance             => "balance",
            Self::Daily               => "daily",
            Self::Deposit { .. }      => "deposit",
            Self::Withdraw { .. }     => "withdraw",
            Self::Transfer { .. }     => "transfer",
            Self::Leaderboard         => "leaderboard",
            Self::Request { .. }      => "request",
            Self::Requests            => "requests",
            Self::Reject { .. }       => "reject",
            Self::Accept { .. }       => "accept",
            Self::Rob { .. }          => "rob",
            Self::Quest               => "quest",
            Self::AcceptQuest         => "accept_quest",
            Self::DeclineQuest        => "decline_quest",
            Self::CreateCompany { .. }=> "create_company",
            Self::CompanyInfo { .. }  => "company_info",
            Self::Invite { .. }       => "invite",
            Self::AcceptInvite        => "accept_invite",
            Self::DeclineInvite       => "decline_invite",
            Self::Leave               => "leave",
            Self::Kick { .. }         => "kick",
            Self::Disband             => "disband",
            Self::ConfirmDisband      => "confirm_disband",
            Self::CancelDisband       => "cancel_disband",
            Self::Companies           => "companies",
            Self::Timeout { .. }      => "timeout",
            Self::TimeoutCost         => "timeout_cost",
            Self::TimeoutLimit        => "timeout_limit",
            Self::TimeoutHistory { .. }=> "timeout_history",
            Self::Help { .. }         => "help",
            Self::Ping                => "ping",
            Self::Info                => "info",
            Self::Sync                => "sync",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParseError {
    pub message: String,
}

impl ParseError {
    fn new(message: impl Into<String>) -> Self {
        Self { message: message.into() }
    }
}

impl std::fmt::Display for ParseError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.message)
    }
}

impl std::error::Error for ParseError {}

/// Parse a user argument: a mention (`<@123>`, `<@!123>`) or a raw id.
pub fn parse_user(arg: &str) -> Option<UserId> {
    let trimmed = arg
        .strip_prefix("<@")
        .and_then(|s| s.strip_suffix('>'))
        .map(|s| s.trim_start_matches('!'))
        .unwrap_or(arg);
    trimmed.parse().ok()
}

fn required_user(arg: Option<&str>, usage: &str) -> Result<UserId, ParseError> {
    arg.and_then(parse_user)
        .ok_or_else(|| ParseError::new(format!("You need to mention a user! Usage: {usage}")))
}

fn required_int(arg: Option<&str>, usage: &str) -> Result<i64, ParseError> {
    arg.and_then(|a| a.parse().ok())
        .ok_or_else(|| ParseError::new(format!("Please enter a valid number! Usage: {usage}")))
}

fn required_amount(arg: Option<&str>, usage: &str) -> Result<AmountArg, ParseError> {
    match arg {
        Some(a) => a.parse(),
        None => Err(ParseError::new(format!("Missing amount! Usage: {usage}"))),
    }
}

/// Everything after the command word, or None when blank.
fn rest_text(rest: &str) -> Option<String> {
    let text = rest.trim();
    (!text.is_empty()).then(|| text.to_string())
}

/// Parse a prefix-style message.
///
/// Returns None if the message does not start with `prefix` or names
/// an unknown command (ordinary chat), Some(Err) for a known command
/// with bad arguments.
pub fn parse_prefixed(content: &str, prefix: &str) -> Option<Result<BotCommand, ParseError>> {
    let body = content.trim().strip_prefix(prefix)?;
    let (word, rest) = match body.split_once(char::is_whitespace) {
        Some((w, r)) => (w, r.trim()),
        None => (body, ""),
    };
    let mut args = rest.split_whitespace();
    let p = prefix;

    let parsed = match word.to_ascii_lowercase().as_str() {
        "balance" | "bal" => Ok(BotCommand::Balance),
        "daily" => Ok(BotCommand::Daily),
        "deposit" | "dep" => required_amount(args.next(), &format!("{p}deposit <amount|all>"))
            .map(|amount| BotCommand::Deposit { amount }),
        "withdraw" | "with" => required_amount(args.next(), &format!("{p}withdraw <amount|all>"))
            .map(|amount| BotCommand::Withdraw { amount }),
        "transfer" | "pay" | "send" => {
            let usage = format!("{p}transfer @user <amount>");
            required_user(args.next(), &usage).and_then(|to| {
                required_int(args.next(), &usage).map(|amount| BotCommand::Transfer { to, amount })
            })
        }
        "leaderboard" | "lb" => Ok(BotCommand::Leaderboard),
        "request" | "req" => {
            let usage = format!("{p}request @user <amount> [reason]");
            required_user(args.next(), &usage).and_then(|to| {
                required_int(args.next(), &usage).map(|amount| {
                    let reason = args.collect::<Vec<_>>().join(" ");
                    BotCommand::Request { to, amount, reason: rest_text(&reason) }
                })
            })
        }
        "requests" | "reqs" => Ok(BotCommand::Requests),
        "reject" | "decline" => required_int(args.next(), &format!("{p}reject <request id>"))
            .map(|request_id| BotCommand::Reject { request_id }),
        "accept" => required_int(args.next(), &format!("{p}accept <request id>"))
            .map(|request_id| BotCommand::Accept { request_id }),
        "rob" => required_user(args.next(), &format!("{p}rob @user"))
            .map(|target| BotCommand::Rob { target }),
        "quest" => Ok(BotCommand::Quest),
        "acceptquest" => Ok(BotCommand::AcceptQuest),
        "declinequest" => Ok(BotCommand::DeclineQuest),
        "createcompany" | "newcompany" => match rest_text(rest) {
            Some(name) => Ok(BotCommand::CreateCompany { name }),
            None => Err(ParseError::new(format!("You need to name your company! Usage: {p}createcompany <name>"))),
        },
        "company" => Ok(BotCommand::CompanyInfo { name: rest_text(rest) }),
        "invite" => required_user(args.next(), &format!("{p}invite @user"))
            .map(|user| BotCommand::Invite { user }),
        "acceptinvite" => Ok(BotCommand::AcceptInvite),
        "declineinvite" => Ok(BotCommand::DeclineInvite),
        "leave" => Ok(BotCommand::Leave),
        "kick" => required_user(args.next(), &format!("{p}kick @user"))
            .map(|user| BotCommand::Kick { user }),
        "disband" => Ok(BotCommand::Disband),
        "confirmdisband" => Ok(BotCommand::ConfirmDisband),
        "canceldisband" => Ok(BotCommand::CancelDisband),
        "companies" => Ok(BotCommand::Companies),
        "timeout" | "bomb" => required_user(args.next(), &format!("{p}timeout @user"))
            .map(|target| BotCommand::Timeout { target }),
        "timeoutcost" | "bombcost" => Ok(BotCommand::TimeoutCost),
        "timeoutlimit" | "bomblimit" => Ok(BotCommand::TimeoutLimit),
        "timeouthistory" | "bombhistory" => match args.next() {
            None => Ok(BotCommand::TimeoutHistory { user: None }),
            Some(arg) => required_user(Some(arg), &format!("{p}timeouthistory [@user]"))
                .map(|user| BotCommand::TimeoutHistory { user: Some(user) }),
        },
        "help" => Ok(BotCommand::Help { category: args.next().map(str::to_string) }),
        "ping" => Ok(BotCommand::Ping),
        "info" => Ok(BotCommand::Info),
        "sync" => Ok(BotCommand::Sync),
        _ => return None,
    };
    Some(parsed)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(text: &str) -> BotCommand {
        parse_prefixed(text, "!").expect("known command").expect("valid args")
    }

    #[test]
    fn aliases_resolve_to_the_same_command() {
        assert_eq!(parse("!bal"), BotCommand::Balance);
        assert_eq!(parse("!dep all"), BotCommand::Deposit { amount: AmountArg::All });
        assert_eq!(parse("!pay <@!42> 15"), BotCommand::Transfer { to: 42, amount: 15 });
        assert_eq!(parse("!decline 3"), BotCommand::Reject { request_id: 3 });
    }

    #[test]
    fn request_keeps_the_whole_reason() {
        assert_eq!(
            parse("!request <@7> 25 pizza last friday"),
            BotCommand::Request { to: 7, amount: 25, reason: Some("pizza last friday".into()) }
        );
        assert_eq!(parse("!req 7 25"), BotCommand::Request { to: 7, amount: 25, reason: None });
    }

    #[test]
    fn company_names_may_contain_spaces() {
        assert_eq!(parse("!createcompany Acme  Rockets "), BotCommand::CreateCompany { name: "Acme  Rockets".into() });
        assert_eq!(parse("!company"), BotCommand::CompanyInfo { name: None });
    }

    #[test]
    fn bad_arguments_are_reported_not_ignored() {
        let err = parse_prefixed("!deposit lots", "!").unwrap().unwrap_err();
        assert_eq!(err.message, "Please enter a valid amount or 'all'!");
        assert!(parse_prefixed("!rob nobody", "!").unwrap().is_err());
    }

    #[test]
    fn ordinary_chat_is_not_a_command() {
        assert!(parse_prefixed("hello there", "!").is_none());
        assert!(parse_prefixed("!dance", "!").is_none());
    }

    #[test]
    fn slash_payloads_deserialize() {
        let cmd: BotCommand = serde_json::from_str(r#"{"cmd":"deposit","amount":"all"}"#).unwrap();
        assert_eq!(cmd, BotCommand::Deposit { amount: AmountArg::All });
        let cmd: BotCommand = serde_json::from_str(r#"{"cmd":"withdraw","amount":50}"#).unwrap();
        assert_eq!(cmd, BotCommand::Withdraw { amount: AmountArg::Exact(50) });
        let cmd: BotCommand = serde_json::from_str(r#"{"cmd":"company_info"}"#).unwrap();
        assert_eq!(cmd, BotCommand::CompanyInfo { name: None });
    }
}
