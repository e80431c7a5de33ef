//! Plugin Commands
//!
//! `.plugins`, `.plugin <name>` and `.help [name]` describe the installed
//! command modules.

use chat_companion_core::InboundEvent;

use crate::services::remote::registry::CommandRegistry;
use crate::services::remote::response_mapper::ResponseMapper;
use crate::services::remote::types::{CommandContext, CommandFuture, CommandSpec};
use crate::utils::error::AppResult;

pub const MODULE: &str = "plugins";

pub fn register(registry: &mut CommandRegistry) {
    registry.register(
        CommandSpec::new("plugins", plugins_handler)
            .with_help("List installed plugins")
            .in_module(MODULE),
    );
    registry.register(
        CommandSpec::new("plugin", plugin_handler)
            .with_help("Show the commands of one plugin: .plugin <name>")
            .in_module(MODULE),
    );
    registry.register(
        CommandSpec::new("help", help_handler)
            .with_help("Show help for a command or plugin: .help [name]")
            .in_module(MODULE),
    );
}

fn plugins_handler(ctx: CommandContext, event: InboundEvent) -> CommandFuture {
    Box::pin(plugins(ctx, event))
}

fn plugin_handler(ctx: CommandContext, event: InboundEvent) -> CommandFuture {
    Box::pin(plugin(ctx, event))
}

fn help_handler(ctx: CommandContext, event: InboundEvent) -> CommandFuture {
    Box::pin(help(ctx, event))
}

/// Sorted module list.
pub fn render_plugins(registry: &CommandRegistry) -> String {
    let mut text = String::from("<b>Installed Plugins:</b>\n");
    for module in registry.modules().keys().filter(|m| !m.is_empty()) {
        text.push_str(&format!("\n{}", ResponseMapper::code(module)));
    }
    text
}

/// Commands of `module` with their help, or `None` when not installed.
pub fn render_plugin(registry: &CommandRegistry, module: &str) -> Option<String> {
    let modules = registry.modules();
    let specs = modules.get(module).filter(|_| !module.is_empty())?;

    let mut text = format!(
        "<b>Plugin Info For:</b> {}\n",
        ResponseMapper::code(module)
    );
    for spec in specs {
        let help = spec.help_text.as_deref().unwrap_or("");
        text.push_str(&format!(
            "\n{} : {}",
            ResponseMapper::code(&spec.name),
            ResponseMapper::escape_html(help)
        ));
    }
    Some(text)
}

async fn plugins(ctx: CommandContext, event: InboundEvent) -> AppResult<()> {
    ctx.reply(&event, &render_plugins(&ctx.registry)).await?;
    Ok(())
}

async fn plugin(ctx: CommandContext, event: InboundEvent) -> AppResult<()> {
    let name = event.argument();
    match render_plugin(&ctx.registry, name) {
        Some(text) => {
            ctx.reply(&event, &text).await?;
        }
        None => {
            ctx.edit(
                &event,
                &format!("Plugin {} is not installed", ResponseMapper::code(name)),
            )
            .await?;
        }
    }
    Ok(())
}

async fn help(ctx: CommandContext, event: InboundEvent) -> AppResult<()> {
    let name = event.argument();
    let text = if name.is_empty() {
        let names = ctx
            .registry
            .list()
            .iter()
            .map(|n| ResponseMapper::code(n))
            .collect::<Vec<_>>()
            .join(", ");
        format!("<b>Available commands:</b>\n{}", names)
    } else {
        match ctx.registry.help_for(name) {
            Some(help) => format!(
                "{}: {}",
                ResponseMapper::code(name),
                ResponseMapper::escape_html(help)
            ),
            None => format!("No help for {}", ResponseMapper::code(name)),
        }
    };
    ctx.edit(&event, &text).await?;
    Ok(())
}
