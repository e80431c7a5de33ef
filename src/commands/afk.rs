//! Away Command
//!
//! `.afk [reason]` marks the operator away. The gateway clears it on the
//! operator's next message.

use chat_companion_core::InboundEvent;

use crate::services::remote::registry::CommandRegistry;
use crate::services::remote::response_mapper::ResponseMapper;
use crate::services::remote::types::{CommandContext, CommandFuture, CommandSpec};
use crate::utils::error::AppResult;

pub const MODULE: &str = "afk";

pub fn register(registry: &mut CommandRegistry) {
    registry.register(
        CommandSpec::new("afk", afk_handler)
            .with_help("Mark yourself away, with an optional reason: .afk [reason]")
            .in_module(MODULE),
    );
}

fn afk_handler(ctx: CommandContext, event: InboundEvent) -> CommandFuture {
    Box::pin(afk(ctx, event))
}

async fn afk(ctx: CommandContext, event: InboundEvent) -> AppResult<()> {
    let reason = event.argument().to_string();
    if !ctx.presence.set_away(reason.clone()) {
        return Ok(());
    }
    tracing::info!("[Presence] Away (reason: {:?})", reason);

    let mut text = String::from("<b>I will be afk for a while.</b>");
    if !reason.is_empty() {
        text.push_str(&format!(
            "\n<i>Reason:</i> {}",
            ResponseMapper::escape_html(&reason)
        ));
    }
    ctx.edit(&event, &text).await?;
    Ok(())
}
