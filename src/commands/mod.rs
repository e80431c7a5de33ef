//! Chat Commands
//!
//! Handlers invoked by the gateway when an operator message resolves to a
//! registered command. Each module registers its own commands.

pub mod afk;
pub mod misc;
pub mod plugins;
pub mod terminals;

use crate::models::settings::AppConfig;
use crate::services::remote::registry::CommandRegistry;

/// Registry holding every built-in command enabled by `config`.
pub fn register_all(config: &AppConfig) -> CommandRegistry {
    let mut registry = CommandRegistry::new();
    misc::register(&mut registry);
    terminals::register(&mut registry, config.ssh.enabled);
    afk::register(&mut registry);
    plugins::register(&mut registry);
    registry
}
