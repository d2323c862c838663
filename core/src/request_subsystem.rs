//! Money request subsystem.
//!
//! A request asks another user for money. Only its recipient can
//! accept (paying the requester) or reject it, and only once.

use crate::{
    command::BotCommand,
    error::{BotError, BotResult},
    event::BotEvent,
    platform::Notice,
    response::{money, Reply, Tone},
    store::MoneyRequestRow,
    subsystem::{BotSubsystem, CommandContext, Outcome},
    types::{Money, RequestId, UserId},
};
use std::any::Any;

/// Requests shown per direction by `requests`.
const LIST_LIMIT: usize = 5;

#[derive(Default)]
pub struct RequestSubsystem;

impl RequestSubsystem {
    pub fn new() -> Self {
        Self
    }

    fn create(
        &self,
        ctx: &mut CommandContext<'_>,
        to: UserId,
        amount: Money,
        reason: Option<&str>,
    ) -> BotResult<Outcome> {
        if to == ctx.actor.user_id {
            return Err(BotError::SelfTarget("You can't request money from yourself!"));
        }
        let request = ctx.store.create_request(ctx.actor.user_id, to, amount, reason, ctx.now)?;
        let p = &ctx.config.prefix;
        let recipient_name = ctx.name_of(to);

        let mut reply = Reply::success(
            "Money Request Sent",
            format!("You've requested {} from {recipient_name}!", money(amount)),
        );
        if let Some(reason) = reason {
            reply = reply.field("Reason", reason);
        }
        reply = reply.inline_field("Request ID", format!("#{}", request.request_id));

        let mut dm = Reply::new(Tone::Info, "Money Request Received").describe(format!(
            "{} has requested {} from you!",
            ctx.actor.display_name,
            money(amount)
        ));
        if let Some(reason) = reason {
            dm = dm.field("Reason", reason);
        }
        dm = dm
            .inline_field("Request ID", format!("#{}", request.request_id))
            .field(
                "How to respond",
                format!(
                    "Use `{p}accept {id}` to accept\nor `{p}reject {id}` to decline",
                    id = request.request_id
                ),
            );
        let fallback = Reply::info(
            "Money Request",
            format!(
                "<@{to}>, you have received a money request! Check your DMs or use `{p}requests` to view it."
            ),
        );

        Ok(Outcome::reply(reply)
            .with_notice(Notice::dm(to, dm).or_in_channel(fallback))
            .with_event(BotEvent::RequestCreated {
                request_id: request.request_id,
                requester_id: ctx.actor.user_id,
                recipient_id: to,
                amount,
            }))
    }

    fn list_line(ctx: &CommandContext<'_>, request: &MoneyRequestRow, incoming: bool) -> String {
        let (label, other) = if incoming {
            ("From", request.requester_id)
        } else {
            ("To", request.recipient_id)
        };
        let reason = request
            .reason
            .as_deref()
            .map(|r| format!(" - {r}"))
            .unwrap_or_default();
        format!(
            "#{} | {label}: {} | Amount: {}{reason}",
            request.request_id,
            ctx.name_of(other),
            money(request.amount)
        )
    }

    fn list(&self, ctx: &mut CommandContext<'_>) -> BotResult<Outcome> {
        let user_id = ctx.actor.user_id;
        let incoming = ctx.store.pending_requests_to(user_id, LIST_LIMIT)?;
        let outgoing = ctx.store.pending_requests_from(user_id, LIST_LIMIT)?;
        if incoming.is_empty() && outgoing.is_empty() {
            return Ok(Outcome::reply(Reply::info(
                "Your Pending Money Requests",
                "You don't have any pending money requests!",
            )));
        }
        let total = ctx.store.pending_request_count(user_id)?;
        let p = &ctx.config.prefix;

        let mut reply = Reply::new(Tone::Info, "Your Pending Money Requests")
            .describe(format!("You have {total} pending requests."));
        if !incoming.is_empty() {
            let text: Vec<String> = incoming.iter().map(|r| Self::list_line(&*ctx, r, true)).collect();
            reply = reply.field("Money Requested From You", text.join("\n"));
        }
        if !outgoing.is_empty() {
            let text: Vec<String> = outgoing.iter().map(|r| Self::list_line(&*ctx, r, false)).collect();
            reply = reply.field("Money You Requested", text.join("\n"));
        }
        reply = reply.footer(format!(
            "Use {p}accept request_id to pay or {p}reject request_id to decline"
        ));
        Ok(Outcome::reply(reply))
    }

    fn resolve(&self, ctx: &mut CommandContext<'_>, request_id: RequestId, accept: bool) -> BotResult<Outcome> {
        let request = ctx.store.resolve_request(request_id, ctx.actor.user_id, accept, ctx.now)?;
        let event = BotEvent::RequestResolved { request_id, accepted: accept };
        let actor = &ctx.actor.display_name;

        if !accept {
            let reply = Reply::new(Tone::Error, "Request Rejected")
                .describe(format!("You've rejected the money request #{request_id}."));
            let dm = Reply::new(Tone::Error, "Money Request Rejected").describe(format!(
                "{actor} has rejected your request for {}.",
                money(request.amount)
            ));
            return Ok(Outcome::reply(reply)
                .with_notice(Notice::dm(request.requester_id, dm))
                .with_event(event));
        }

        let requester_name = ctx.name_of(request.requester_id);
        let reply = Reply::success(
            "Request Accepted",
            format!(
                "You've paid {} to {requester_name} for request #{request_id}.",
                money(request.amount)
            ),
        );
        let dm = Reply::success(
            "Money Request Accepted",
            format!("{actor} has paid your request for {}!", money(request.amount)),
        );
        Ok(Outcome::reply(reply)
            .with_notice(Notice::dm(request.requester_id, dm))
            .with_event(event)
            .with_event(BotEvent::Transferred {
                from: request.recipient_id,
                to: request.requester_id,
                amount: request.amount,
            }))
    }
}

impl BotSubsystem for RequestSubsystem {
    fn name(&self) -> &'static str {
        "request"
    }

    fn handles(&self, command: &BotCommand) -> bool {
        matches!(
            command,
            BotCommand::Request { .. }
                | BotCommand::Requests
                | BotCommand::Reject { .. }
                | BotCommand::Accept { .. }
        )
    }

    fn handle(&mut self, ctx: &mut CommandContext<'_>, command: &BotCommand) -> BotResult<Outcome> {
        match command {
            BotCommand::Request { to, amount, reason } => self.create(ctx, *to, *amount, reason.as_deref()),
            BotCommand::Requests                       => self.list(ctx),
            BotCommand::Reject { request_id }          => self.resolve(ctx, *request_id, false),
            BotCommand::Accept { request_id }          => self.resolve(ctx, *request_id, true),
            other => Err(BotError::Other(anyhow::anyhow!("request cannot handle {}", other.name()))),
        }
    }

    fn as_any(&self) -> &dyn Any {
        self
    }

    fn as_any_mut(&mut self) -> &mut dyn Any {
        self
    }
}
