//! Economy subsystem: balances, the daily reward, banking, transfers
//! and the leaderboard.
//!
//! The daily sweep also lives here: the first timer pass on a new
//! calendar day pays every known user the daily reward.

use crate::{
    clock::format_remaining,
    command::{AmountArg, BotCommand},
    error::{BotError, BotResult},
    event::BotEvent,
    platform::Notice,
    response::{money, Reply, Tone},
    store::DailyClaim,
    subsystem::{BotSubsystem, CommandContext, Outcome, TimerContext},
    types::Money,
};
use chrono::NaiveDate;
use std::any::Any;

pub struct EconomySubsystem {
    /// Calendar date the last sweep ran for. None until the first pass,
    /// which only records the date.
    last_sweep: Option<NaiveDate>,
}

impl Default for EconomySubsystem {
    fn default() -> Self {
        Self::new()
    }
}

impl EconomySubsystem {
    pub fn new() -> Self {
        Self { last_sweep: None }
    }

    pub fn last_sweep(&self) -> Option<NaiveDate> {
        self.last_sweep
    }

    fn balance(&self, ctx: &mut CommandContext<'_>) -> BotResult<Outcome> {
        let user = ctx.store.get_or_create_user(ctx.actor.user_id, ctx.now)?;
        let reply = Reply::new(Tone::Info, format!("{}'s Balance", ctx.actor.display_name))
            .inline_field("Wallet", money(user.wallet))
            .inline_field("Bank", money(user.bank))
            .field("Total", money(user.net_worth()));
        Ok(Outcome::reply(reply))
    }

    fn daily(&self, ctx: &mut CommandContext<'_>) -> BotResult<Outcome> {
        let amount = ctx.config.economy.daily_reward;
        match ctx.store.claim_daily(ctx.actor.user_id, ctx.now, amount)? {
            DailyClaim::Claimed { amount, new_balance } => {
                let reply = Reply::success(
                    "Daily Reward",
                    format!("You've claimed your daily reward of {}!", money(amount)),
                )
                .field("New Balance", money(new_balance));
                Ok(Outcome::reply(reply).with_event(BotEvent::DailyClaimed {
                    user_id: ctx.actor.user_id,
                    amount,
                }))
            }
            DailyClaim::AlreadyClaimed { next_available } => {
                let reply = Reply::warning("Daily Reward", "You've already claimed your daily reward!")
                    .field("Next Reward In", format_remaining(next_available - ctx.now));
                Ok(Outcome::reply(reply))
            }
        }
    }

    /// Resolve "all" against the given balance. An "all" of nothing is a
    /// refusal rather than a zero-sized move.
    fn resolve(amount: AmountArg, available: Money, empty_message: &str) -> BotResult<Money> {
        match amount {
            AmountArg::Exact(n) if n <= 0 => Err(BotError::InvalidAmount("Amount must be positive!".into())),
            AmountArg::Exact(n) => Ok(n),
            AmountArg::All if available <= 0 => Err(BotError::InvalidAmount(empty_message.into())),
            AmountArg::All => Ok(available),
        }
    }

    fn deposit(&self, ctx: &mut CommandContext<'_>, amount: AmountArg) -> BotResult<Outcome> {
        let user = ctx.store.get_or_create_user(ctx.actor.user_id, ctx.now)?;
        let amount = Self::resolve(amount, user.wallet, "You don't have any money in your wallet to deposit!")?;
        let after = ctx.store.deposit(user.user_id, amount)?;
        let reply = Reply::success(
            "Deposit Successful",
            format!("You've deposited {} into your bank!", money(amount)),
        )
        .inline_field("Wallet", money(after.wallet))
        .inline_field("Bank", money(after.bank));
        Ok(Outcome::reply(reply).with_event(BotEvent::Deposited { user_id: user.user_id, amount }))
    }

    fn withdraw(&self, ctx: &mut CommandContext<'_>, amount: AmountArg) -> BotResult<Outcome> {
        let user = ctx.store.get_or_create_user(ctx.actor.user_id, ctx.now)?;
        let amount = Self::resolve(amount, user.bank, "You don't have any money in your bank to withdraw!")?;
        let after = ctx.store.withdraw(user.user_id, amount)?;
        let reply = Reply::success(
            "Withdrawal Successful",
            format!("You've withdrawn {} from your bank!", money(amount)),
        )
        .inline_field("Wallet", money(after.wallet))
        .inline_field("Bank", money(after.bank));
        Ok(Outcome::reply(reply).with_event(BotEvent::Withdrawn { user_id: user.user_id, amount }))
    }

    fn transfer(&self, ctx: &mut CommandContext<'_>, to: u64, amount: Money) -> BotResult<Outcome> {
        if to == ctx.actor.user_id {
            return Err(BotError::SelfTarget("You can't transfer money to yourself!"));
        }
        if amount <= 0 {
            return Err(BotError::InvalidAmount("Amount must be positive!".into()));
        }
        ctx.store.get_or_create_user(ctx.actor.user_id, ctx.now)?;
        let (sender, recipient) = ctx.store.transfer(ctx.actor.user_id, to, amount, ctx.now)?;
        let recipient_name = ctx.name_of(to);

        let reply = Reply::success(
            "Transfer Successful",
            format!("You've transferred {} to {recipient_name}!", money(amount)),
        )
        .inline_field("Your Balance", money(sender.wallet));
        let receipt = Reply::success(
            "Money Received!",
            format!("You've received {} from {}!", money(amount), ctx.actor.display_name),
        )
        .inline_field("New Balance", money(recipient.wallet));

        Ok(Outcome::reply(reply)
            .with_notice(Notice::dm(to, receipt))
            .with_event(BotEvent::Transferred { from: sender.user_id, to, amount }))
    }

    fn leaderboard(&self, ctx: &mut CommandContext<'_>) -> BotResult<Outcome> {
        let top = ctx.store.leaderboard(ctx.config.economy.leaderboard_size)?;
        if top.is_empty() {
            return Ok(Outcome::reply(Reply::info(
                "Economy Leaderboard",
                "No data available for the leaderboard yet!",
            )));
        }
        let mut reply = Reply::new(Tone::Info, "Economy Leaderboard").describe("The richest users in the server");
        for (rank, entry) in top.iter().enumerate() {
            reply = reply.field(
                format!("{}. {}", rank + 1, ctx.name_of(entry.user_id)),
                format!(
                    "Wallet: {} | Bank: {} | Total: {}",
                    money(entry.wallet),
                    money(entry.bank),
                    money(entry.net_worth())
                ),
            );
        }
        Ok(Outcome::reply(reply))
    }
}

impl BotSubsystem for EconomySubsystem {
    fn name(&self) -> &'static str {
        "economy"
    }

    fn handles(&self, command: &BotCommand) -> bool {
        matches!(
            command,
            BotCommand::Balance
                | BotCommand::Daily
                | BotCommand::Deposit { .. }
                | BotCommand::Withdraw { .. }
                | BotCommand::Transfer { .. }
                | BotCommand::Leaderboard
        )
    }

    fn handle(&mut self, ctx: &mut CommandContext<'_>, command: &BotCommand) -> BotResult<Outcome> {
        match command {
            BotCommand::Balance                => self.balance(ctx),
            BotCommand::Daily                  => self.daily(ctx),
            BotCommand::Deposit { amount }     => self.deposit(ctx, *amount),
            BotCommand::Withdraw { amount }    => self.withdraw(ctx, *amount),
            BotCommand::Transfer { to, amount }=> self.transfer(ctx, *to, *amount),
            BotCommand::Leaderboard            => self.leaderboard(ctx),
            other => Err(BotError::Other(anyhow::anyhow!("economy cannot handle {}", other.name()))),
        }
    }

    fn on_timer(&mut self, ctx: &mut TimerContext<'_>) -> BotResult<Outcome> {
        let today = ctx.now.date();
        let Some(last) = self.last_sweep else {
            self.last_sweep = Some(today);
            return Ok(Outcome::default());
        };
        if today <= last {
            return Ok(Outcome::default());
        }
        let amount = ctx.config.economy.daily_reward;
        let users = ctx.store.grant_daily_to_all(ctx.now, amount)?;
        self.last_sweep = Some(today);
        log::info!("economy: daily sweep paid {users} user(s) {}", money(amount));
        Ok(Outcome::default().with_event(BotEvent::DailySweep { users, amount }))
    }

    fn as_any(&self) -> &dyn Any {
        self
    }

    fn as_any_mut(&mut self) -> &mut dyn Any {
        self
    }
}
