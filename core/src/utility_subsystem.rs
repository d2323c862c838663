//! Utility commands: help, ping, info and the admin-only slash sync.

use crate::{
    command::BotCommand,
    error::{BotError, BotResult},
    response::{Reply, Tone},
    subsystem::{BotSubsystem, CommandContext, Outcome},
};
use std::any::Any;

/// Slash commands registered with the platform on sync.
pub const SLASH_COMMANDS: &[&str] = &[
    "balance", "daily", "deposit", "withdraw", "transfer", "leaderboard",
    "request", "requests", "reject", "accept",
    "rob", "quest", "accept_quest", "decline_quest",
    "create_company", "company_info", "invite", "accept_invite", "decline_invite",
    "leave", "kick", "disband", "confirm_disband", "cancel_disband", "companies",
    "timeout", "timeout_cost", "timeout_limit", "timeout_history",
    "help", "ping", "info", "sync",
];

pub const SLASH_COMMAND_COUNT: usize = SLASH_COMMANDS.len();

const FEATURES: &str = "• Economy system with wallet and bank\n\
• Daily rewards for all users\n\
• Company creation and management\n\
• Generated quests for earning money\n\
• Role-based timeout system";

#[derive(Default)]
pub struct UtilitySubsystem;

/// (usage, description) pairs for one help category, or None if unknown.
fn category_commands(category: &str, p: &str, daily: i64) -> Option<(&'static str, &'static str, Vec<(String, String)>)> {
    let rows = |items: &[(&str, &str)]| -> Vec<(String, String)> {
        items.iter().map(|(u, d)| (format!("{p}{u}"), d.to_string())).collect()
    };
    let found = match category.to_ascii_lowercase().as_str() {
        "economy" => (
            "Economy Commands",
            "Commands for managing your money and earning rewards.",
            {
                let mut list = rows(&[
                    ("balance", "Check your current balance"),
                ]);
                list.push((format!("{p}daily"), format!("Claim your daily reward of ${daily}")));
                list.extend(rows(&[
                    ("deposit <amount|all>", "Deposit money to your bank"),
                    ("withdraw <amount|all>", "Withdraw money from your bank"),
                    ("transfer <@user> <amount>", "Send money to another user"),
                    ("request <@user> <amount> [reason]", "Ask another user for money"),
                    ("requests", "List your pending money requests"),
                    ("quest", "Get a random quest to earn money"),
                    ("rob <@user>", "Attempt to rob another user (requires 5+ people)"),
                    ("leaderboard", "Display the richest users on the server"),
                ]));
                list
            },
        ),
        "company" => (
            "Company Commands",
            "Commands for managing companies and employees.",
            rows(&[
                ("createcompany <name>", "Create a new company (requires higher role)"),
                ("company [name]", "Display info about your company or another company"),
                ("invite <@user>", "Invite a user to your company"),
                ("leave", "Leave your current company"),
                ("kick <@user>", "Kick a member from your company (owner only)"),
                ("disband", "Disband your company as the owner"),
                ("companies", "List all companies on the server"),
            ]),
        ),
        "moderation" => (
            "Moderation Commands",
            "Commands for moderating users with timeouts.",
            rows(&[
                ("timeout <@user>", "Timeout a user based on your role permissions"),
                ("timeoutcost", "Check the cost of using the timeout command"),
                ("timeoutlimit", "Check your timeout duration limit based on your roles"),
                ("timeouthistory [@user]", "View timeout history for yourself or another user"),
            ]),
        ),
        "general" => (
            "General Commands",
            "General utility commands.",
            rows(&[
                ("help [category]", "Display this help menu"),
                ("ping", "Check the bot's response time"),
                ("info", "Display information about the bot"),
            ]),
        ),
        _ => return None,
    };
    Some(found)
}

impl UtilitySubsystem {
    pub fn new() -> Self {
        Self
    }

    fn help(&self, ctx: &mut CommandContext<'_>, category: Option<&str>) -> BotResult<Outcome> {
        let p = &ctx.config.prefix;
        let mut reply = Reply::new(Tone::Info, "Discord Economy Bot - Help Menu")
            .describe(format!(
                "Use `{p}help <category>` to view specific commands.\nAll commands are also available as slash commands!"
            ))
            .footer(format!("Discord Economy Bot | Use {p}help or /help"));

        let Some(category) = category else {
            for (name, key, what) in [
                ("🏦 Economy", "economy", "Money, bank, and daily rewards"),
                ("🏢 Company", "company", "Company creation and management"),
                ("🛡️ Moderation", "moderation", "Role-based timeout commands"),
                ("📊 General", "general", "General utility commands"),
            ] {
                reply = reply.field(name, format!("`{p}help {key}` - {what}"));
            }
            return Ok(Outcome::reply(reply));
        };

        match category_commands(category, p, ctx.config.economy.daily_reward) {
            Some((title, description, commands)) => {
                reply.title = title.to_string();
                reply = reply.describe(description);
                for (usage, what) in commands {
                    reply = reply.field(usage, what);
                }
            }
            None => {
                reply.title = "Unknown Category".to_string();
                reply = reply.describe(format!(
                    "Category '{category}' not found. Use `{p}help` to see available categories."
                ));
            }
        }
        Ok(Outcome::reply(reply))
    }

    fn ping(&self, ctx: &mut CommandContext<'_>) -> BotResult<Outcome> {
        let latency = ctx.platform.latency_ms();
        Ok(Outcome::reply(
            Reply::info("Pong", format!("🏓 Pong! Latency: {latency}ms")).private(),
        ))
    }

    fn info(&self, ctx: &mut CommandContext<'_>) -> BotResult<Outcome> {
        let reply = Reply::info(
            "Discord Economy Bot",
            "A Discord economy bot with company creation, money management, bank system, and role-based timeout features",
        )
        .inline_field("Version", ctx.config.version.clone())
        .inline_field("Prefix", ctx.config.prefix.clone())
        .inline_field("Server Count", ctx.platform.guild_count().to_string())
        .field("Features", FEATURES)
        .footer("Made with ❤️ for Discord");
        Ok(Outcome::reply(reply))
    }

    fn sync(&self, ctx: &mut CommandContext<'_>) -> BotResult<Outcome> {
        if !ctx.actor.is_admin {
            return Err(BotError::PermissionDenied(
                "❌ You need administrator permissions to use this command!".into(),
            ));
        }
        log::info!("utility: admin {} syncing slash commands", ctx.actor.user_id);
        let reply = match ctx.platform.sync_commands() {
            Ok(count) => Reply::success("Sync", format!("✅ Synced {count} slash commands globally!")),
            Err(err) => {
                log::error!("utility: slash command sync failed: {err}");
                Reply::error(format!("❌ Error syncing slash commands: {err}"))
            }
        };
        Ok(Outcome::reply(reply.private()))
    }
}

impl BotSubsystem for UtilitySubsystem {
    fn name(&self) -> &'static str {
        "utility"
    }

    fn handles(&self, command: &BotCommand) -> bool {
        matches!(command, BotCommand::Help { .. } | BotCommand::Ping | BotCommand::Info | BotCommand::Sync)
    }

    fn handle(&mut self, ctx: &mut CommandContext<'_>, command: &BotCommand) -> BotResult<Outcome> {
        match command {
            BotCommand::Help { category } => self.help(ctx, category.as_deref()),
            BotCommand::Ping              => self.ping(ctx),
            BotCommand::Info              => self.info(ctx),
            BotCommand::Sync              => self.sync(ctx),
            other => Err(BotError::Other(anyhow::anyhow!("utility cannot handle {}", other.name()))),
        }
    }

    fn as_any(&self) -> &dyn Any {
        self
    }

    fn as_any_mut(&mut self) -> &mut dyn Any {
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn every_command_has_a_slash_entry() {
        assert_eq!(SLASH_COMMAND_COUNT, 33);
        assert!(SLASH_COMMANDS.contains(&BotCommand::Sync.name()));
        assert!(SLASH_COMMANDS.contains(&BotCommand::TimeoutHistory { user: None }.name()));
    }

    #[test]
    fn categories_are_case_insensitive() {
        let (title, _, commands) = category_commands("Economy", "!", 100).unwrap();
        assert_eq!(title, "Economy Commands");
        assert!(commands.iter().any(|(u, d)| u == "!daily" && d == "Claim your daily reward of $100"));
        assert!(category_commands("casino", "!", 100).is_none());
    }
}
